//! Preprocessing Error Types

use thiserror::Error;

/// Errors while turning uploaded bytes into a model input tensor
#[derive(Debug, Clone, Error)]
pub enum PreprocessError {
    /// Bytes could not be decoded as an image
    #[error("Failed to preprocess image: {0}")]
    Decode(String),

    /// Requested resize target has a zero dimension
    #[error("Invalid target size {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },

    /// Target size string is not `width,height`
    #[error("Invalid image size '{0}': expected 'width,height'")]
    InvalidSizeFormat(String),
}

impl From<image::ImageError> for PreprocessError {
    fn from(err: image::ImageError) -> Self {
        PreprocessError::Decode(err.to_string())
    }
}
