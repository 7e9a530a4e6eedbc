// ABOUTME: Image container format classification by magic-number sniffing
// ABOUTME: Recognizes the PNG, JPEG and WebP outputs the provider returns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ImageError;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Encoded image format. Unknown data is treated as PNG, the provider's default output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(ImageError::InvalidRequest(format!(
                "Unsupported image format '{}'. Must be one of: png, jpeg, webp",
                other
            ))),
        }
    }
}

/// Classify `bytes` by their leading signature. First match wins; no match means PNG.
pub fn detect_format(bytes: &[u8]) -> ImageFormat {
    if bytes.starts_with(&PNG_SIGNATURE) {
        ImageFormat::Png
    } else if bytes.starts_with(&JPEG_SOI) {
        ImageFormat::Jpeg
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        ImageFormat::Webp
    } else {
        ImageFormat::Png
    }
}
