//! Upload Validation

/// Extensions accepted for uploaded images
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Check that `filename` carries an allowed extension.
///
/// Returns false for an empty name or one without a `.`. The suffix after the
/// last `.` is compared case-insensitively.
pub fn validate_image_format<S: AsRef<str>>(filename: &str, allowed_extensions: &[S]) -> bool {
    if filename.is_empty() {
        return false;
    }

    match filename.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_lowercase();
            allowed_extensions.iter().any(|allowed| allowed.as_ref() == ext)
        }
        None => false,
    }
}

/// Check that the upload fits within `max_size` bytes (inclusive)
pub fn validate_image_size(image_bytes: &[u8], max_size: usize) -> bool {
    image_bytes.len() <= max_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_allowed_extensions() {
        for name in ["eye.png", "eye.jpg", "eye.jpeg", "eye.bmp", "eye.tiff"] {
            assert!(validate_image_format(name, &ALLOWED_EXTENSIONS), "{name}");
        }
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert!(validate_image_format("photo.JPG", &ALLOWED_EXTENSIONS));
        assert!(validate_image_format("scan.TiFf", &ALLOWED_EXTENSIONS));
    }

    #[test]
    fn test_rejected_names() {
        assert!(!validate_image_format("", &ALLOWED_EXTENSIONS));
        assert!(!validate_image_format("fundus", &ALLOWED_EXTENSIONS));
        assert!(!validate_image_format("x.gif", &ALLOWED_EXTENSIONS));
        assert!(!validate_image_format("archive.png.zip", &ALLOWED_EXTENSIONS));
        assert!(!validate_image_format("trailing.", &ALLOWED_EXTENSIONS));
    }

    #[test]
    fn test_last_suffix_wins() {
        assert!(validate_image_format("scan.v2.final.png", &ALLOWED_EXTENSIONS));
    }

    #[test]
    fn test_size_boundary() {
        let max = 16;
        assert!(validate_image_size(&[0u8; 0], max));
        assert!(validate_image_size(&[0u8; 16], max));
        assert!(!validate_image_size(&[0u8; 17], max));
    }

    proptest! {
        #[test]
        fn prop_names_without_dot_rejected(name in "[^.]*") {
            prop_assert!(!validate_image_format(&name, &ALLOWED_EXTENSIONS));
        }

        #[test]
        fn prop_allowed_suffix_any_case(
            stem in "[a-zA-Z0-9_-]{0,12}",
            idx in 0usize..ALLOWED_EXTENSIONS.len(),
            upper in proptest::collection::vec(any::<bool>(), 4),
        ) {
            let ext: String = ALLOWED_EXTENSIONS[idx]
                .chars()
                .zip(upper.iter().cycle())
                .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
                .collect();
            let name = format!("{stem}.{ext}");
            prop_assert!(validate_image_format(&name, &ALLOWED_EXTENSIONS));
        }

        #[test]
        fn prop_size_boundary_exact(max in 0usize..4096) {
            let at_limit = vec![0u8; max];
            let over_limit = vec![0u8; max + 1];
            prop_assert!(validate_image_size(&at_limit, max));
            prop_assert!(!validate_image_size(&over_limit, max));
        }
    }
}
