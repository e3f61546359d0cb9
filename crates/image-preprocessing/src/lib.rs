//! Image Validation and Normalization
//!
//! Checks uploaded images against the extension allow-list and size ceiling,
//! and turns raw image bytes into the `(1, 3, H, W)` tensor the classifier expects.

mod error;
mod normalizer;
mod validator;

pub use error::PreprocessError;
pub use normalizer::{preprocess_image, TargetSize};
pub use validator::{validate_image_format, validate_image_size, ALLOWED_EXTENSIONS};
