//! Photo classification and naming.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Unknown,
}

impl ImageType {
    /// JPEG is recognised by its SOI marker; everything else is opaque.
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(&[0xFF, 0xD8]) {
            ImageType::Jpeg
        } else {
            ImageType::Unknown
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Unknown => "image/unknown",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Jpeg => ".jpg",
            ImageType::Unknown => ".bin",
        }
    }

    /// A fresh, unguessable asset name with this type's extension.
    pub fn asset_name(&self) -> String {
        format!("{}{}", Uuid::new_v4(), self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_is_detected_from_soi_marker() {
        let kind = ImageType::detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]);
        assert_eq!(kind, ImageType::Jpeg);
        assert_eq!(kind.content_type(), "image/jpeg");
        assert_eq!(kind.extension(), ".jpg");
    }

    #[test]
    fn anything_else_is_unknown() {
        for data in [&b"\x89PNG\r\n"[..], &[0xFF][..], &[][..], &[0xD8, 0xFF][..]] {
            let kind = ImageType::detect(data);
            assert_eq!(kind, ImageType::Unknown);
            assert_eq!(kind.content_type(), "image/unknown");
            assert_eq!(kind.extension(), ".bin");
        }
    }

    #[test]
    fn asset_names_are_unique_uuids() {
        let a = ImageType::Jpeg.asset_name();
        let b = ImageType::Jpeg.asset_name();
        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert!(Uuid::parse_str(a.trim_end_matches(".jpg")).is_ok());
    }
}
