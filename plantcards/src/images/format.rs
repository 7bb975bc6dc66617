//! Image format detection.
//!
//! Browsers report whatever the operating system guessed, and phones happily label HEIC photos
//! as `image/jpeg`, so the file's leading bytes decide. The declared filename and content type
//! are only consulted for HEIC, whose container brands vary by device and whose bytes are checked
//! by the external converter anyway. Everything else must carry its own magic bytes.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    /// HEIC or HEIF (ISO base media file with an HEVC image brand)
    Heic,
}

/// `ftyp` brands written by cameras and phones for HEIF containers
const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1", b"heif"];

impl ImageFormat {
    /// Identify a format from the first bytes of a file
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::Png);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == *brand) {
            return Some(Self::Heic);
        }
        None
    }

    /// Guess from a content type, falling back to the filename extension
    pub fn from_declared(filename: Option<&str>, content_type: Option<&str>) -> Option<Self> {
        let from_mime = |mime: &str| match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            "image/heic" | "image/heif" | "image/heic-sequence" | "image/heif-sequence" => Some(Self::Heic),
            _ => None,
        };

        if let Some(format) = content_type.and_then(from_mime) {
            return Some(format);
        }

        let filename = filename?;
        let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
        // mime_guess does not know every HEIF extension
        if matches!(extension.as_str(), "heic" | "heif" | "hif") {
            return Some(Self::Heic);
        }
        mime_guess::from_path(filename)
            .iter()
            .find_map(|mime| from_mime(mime.essence_str()))
    }

    /// Magic bytes first. A client's claim is only trusted for HEIC.
    pub fn detect(bytes: &[u8], filename: Option<&str>, content_type: Option<&str>) -> Option<Self> {
        Self::from_magic(bytes).or_else(|| Self::from_declared(filename, content_type).filter(|f| *f == Self::Heic))
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Heic => "image/heic",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
            Self::Heic => "heic",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::WebP => "WebP",
            Self::Heic => "HEIC",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes() {
        assert_eq!(ImageFormat::from_magic(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_magic(b"\x89PNG\r\n\x1a\n\0\0"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_magic(b"GIF89a..."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_magic(b"RIFF\x10\0\0\0WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_magic(b"\0\0\0\x18ftypheic\0\0\0\0"), Some(ImageFormat::Heic));
        assert_eq!(ImageFormat::from_magic(b"\0\0\0\x18ftypmif1\0\0\0\0"), Some(ImageFormat::Heic));
        assert_eq!(ImageFormat::from_magic(b"\0\0\0\x18ftypisom\0\0\0\0"), None);
        assert_eq!(ImageFormat::from_magic(b"%PDF-1.7"), None);
        assert_eq!(ImageFormat::from_magic(b""), None);
    }

    #[test]
    fn test_bytes_beat_declared_type() {
        // An iPhone photo uploaded as "photo.jpg"
        let heic = b"\0\0\0\x18ftypheic\0\0\0\0";
        assert_eq!(
            ImageFormat::detect(heic, Some("photo.jpg"), Some("image/jpeg")),
            Some(ImageFormat::Heic)
        );
    }

    #[test]
    fn test_declared_fallback() {
        assert_eq!(ImageFormat::from_declared(None, Some("IMAGE/PNG")), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_declared(Some("IMG_0001.HEIC"), None), Some(ImageFormat::Heic));
        assert_eq!(ImageFormat::from_declared(Some("leaf.jpeg"), Some("application/octet-stream")), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_declared(Some("notes.txt"), None), None);
        assert_eq!(ImageFormat::from_declared(Some("no-extension"), None), None);
    }

    #[test]
    fn test_only_heic_claims_are_trusted_without_magic() {
        let html = b"<html><script>alert(1)</script>";
        assert_eq!(ImageFormat::detect(html, Some("evil.webp"), Some("image/webp")), None);
        assert_eq!(ImageFormat::detect(html, Some("evil.jpg"), Some("image/jpeg")), None);
        assert_eq!(ImageFormat::detect(html, Some("evil.gif"), None), None);

        // Unlisted brand, left for the converter to accept or reject
        let odd_brand = b"\0\0\0\x18ftypxxxx\0\0\0\0";
        assert_eq!(ImageFormat::detect(odd_brand, Some("IMG_0002.HEIC"), None), Some(ImageFormat::Heic));
    }
}
