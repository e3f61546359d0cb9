//! Image Decoding and Tensor Normalization

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use tracing::{debug, error};

use crate::error::PreprocessError;

/// Spatial size the classifier expects, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Tensor shape `(batch, channels, height, width)` for this size
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::new(224, 224)
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

impl FromStr for TargetSize {
    type Err = PreprocessError;

    /// Parse `"width,height"`; both parts must be positive integers
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [width, height] = parts.as_slice() else {
            return Err(PreprocessError::InvalidSizeFormat(s.to_string()));
        };

        let parse = |part: &str| {
            part.parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| PreprocessError::InvalidSizeFormat(s.to_string()))
        };

        Ok(Self::new(parse(*width)?, parse(*height)?))
    }
}

/// Decode `image_bytes` and normalize them into a `(1, 3, H, W)` tensor.
///
/// The image is converted to RGB, resized to `target` with a Lanczos filter
/// and every channel is scaled into `[0, 1]`.
pub fn preprocess_image(image_bytes: &[u8], target: TargetSize) -> Result<Array4<f32>, PreprocessError> {
    if target.width == 0 || target.height == 0 {
        return Err(PreprocessError::InvalidTargetSize {
            width: target.width,
            height: target.height,
        });
    }

    let decoded = image::load_from_memory(image_bytes).map_err(|e| {
        error!("Error preprocessing image: {}", e);
        PreprocessError::from(e)
    })?;

    debug!(
        "Decoded {}x{} image ({:?}), resizing to {}x{}",
        decoded.width(),
        decoded.height(),
        decoded.color(),
        target.width,
        target.height
    );

    let rgb = into_rgb(decoded);
    let resized = imageops::resize(&rgb, target.width, target.height, FilterType::Lanczos3);

    let (height, width) = (target.height as usize, target.width as usize);
    let tensor = Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });

    Ok(tensor)
}

fn into_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbaImage};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    #[test]
    fn test_output_shape_matches_target() {
        let bytes = gradient_png(500, 500);
        let tensor = preprocess_image(&bytes, TargetSize::new(224, 224)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_non_square_target_layout() {
        let bytes = gradient_png(64, 48);
        let tensor = preprocess_image(&bytes, TargetSize::new(32, 16)).unwrap();
        // width 32, height 16 -> (1, 3, 16, 32)
        assert_eq!(tensor.shape(), &[1, 3, 16, 32]);
    }

    #[test]
    fn test_jpeg_input() {
        let img = RgbImage::from_pixel(500, 500, Rgb([120, 30, 200]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);
        let tensor = preprocess_image(&bytes, TargetSize::default()).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_channel_order_and_scaling() {
        let img = RgbImage::from_pixel(40, 40, Rgb([255, 0, 0]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let tensor = preprocess_image(&bytes, TargetSize::new(8, 8)).unwrap();

        assert!(tensor.index_axis(ndarray::Axis(1), 0).iter().all(|v| (v - 1.0).abs() < 1e-2));
        assert!(tensor.index_axis(ndarray::Axis(1), 1).iter().all(|v| v.abs() < 1e-2));
        assert!(tensor.index_axis(ndarray::Axis(1), 2).iter().all(|v| v.abs() < 1e-2));
    }

    #[test]
    fn test_grayscale_converted_to_rgb() {
        let img = GrayImage::from_pixel(30, 30, Luma([128]));
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);
        let tensor = preprocess_image(&bytes, TargetSize::new(10, 10)).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 10, 10]);
        let expected = 128.0 / 255.0;
        assert!(tensor.iter().all(|v| (v - expected).abs() < 1e-2));
    }

    #[test]
    fn test_rgba_converted_to_rgb() {
        let img = RgbaImage::from_pixel(12, 12, image::Rgba([10, 20, 30, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let tensor = preprocess_image(&bytes, TargetSize::new(6, 6)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 6, 6]);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = preprocess_image(b"definitely not an image", TargetSize::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
        assert!(err.to_string().starts_with("Failed to preprocess image:"));
    }

    #[test]
    fn test_truncated_png_rejected() {
        let bytes = gradient_png(50, 50);
        let err = preprocess_image(&bytes[..bytes.len() / 2], TargetSize::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_zero_target_rejected() {
        let bytes = gradient_png(10, 10);
        let err = preprocess_image(&bytes, TargetSize::new(0, 10)).unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidTargetSize { .. }));
    }

    #[test]
    fn test_target_size_parsing() {
        assert_eq!("224,224".parse::<TargetSize>().unwrap(), TargetSize::new(224, 224));
        assert_eq!(" 320 , 240 ".parse::<TargetSize>().unwrap(), TargetSize::new(320, 240));
        assert!("224".parse::<TargetSize>().is_err());
        assert!("224,224,3".parse::<TargetSize>().is_err());
        assert!("0,224".parse::<TargetSize>().is_err());
        assert!("a,b".parse::<TargetSize>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_any_resolution_normalized(w in 1u32..96, h in 1u32..96, tw in 1u32..48, th in 1u32..48) {
            let bytes = gradient_png(w, h);
            let tensor = preprocess_image(&bytes, TargetSize::new(tw, th)).unwrap();
            prop_assert_eq!(tensor.shape(), &[1, 3, th as usize, tw as usize]);
            prop_assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        }

        #[test]
        fn prop_random_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = preprocess_image(&bytes, TargetSize::new(8, 8));
        }
    }
}
