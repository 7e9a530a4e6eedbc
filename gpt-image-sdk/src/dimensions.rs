// ABOUTME: Pixel dimension extraction from raw PNG, JPEG and WebP headers
// ABOUTME: Reads only the header fields needed; any malformed input yields the fallback size

use crate::constants::images::DEFAULT_DIMENSIONS;
use crate::format::ImageFormat;

const PNG_MIN_LEN: usize = 24;
const WEBP_MIN_LEN: usize = 30;

/// Width and height of an encoded image, or [`DEFAULT_DIMENSIONS`] when the
/// header is too short or does not have the expected layout.
///
/// This never panics: every read goes through checked slice access, and a
/// failed read anywhere collapses to the fallback.
pub fn extract_dimensions(bytes: &[u8], format: ImageFormat) -> (u32, u32) {
    let parsed = match format {
        ImageFormat::Png => png_dimensions(bytes),
        ImageFormat::Jpeg => jpeg_dimensions(bytes),
        ImageFormat::Webp => webp_dimensions(bytes),
    };

    parsed.unwrap_or(DEFAULT_DIMENSIONS)
}

/// IHDR directly follows the signature: length(4) + "IHDR"(4), then width and height.
fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < PNG_MIN_LEN {
        return None;
    }

    let width = read_u32_be(bytes, 16)?;
    let height = read_u32_be(bytes, 20)?;
    Some((width, height))
}

/// Walks marker segments after SOI until a baseline, extended, progressive or
/// lossless frame header (SOF0-SOF3). Other SOF variants are not recognized.
fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;

    while pos + 1 < bytes.len() {
        if bytes[pos] != 0xFF {
            pos += 1;
            continue;
        }

        match bytes[pos + 1] {
            0xC0..=0xC3 if bytes.len() >= pos + 9 => {
                let height = read_u16_be(bytes, pos + 5)?;
                let width = read_u16_be(bytes, pos + 7)?;
                return Some((u32::from(width), u32::from(height)));
            }
            // Fill byte before a marker
            0xFF => pos += 1,
            // TEM, RSTn, SOI, EOI have no length field
            0x01 | 0xD0..=0xD9 => pos += 2,
            _ => {
                let length = usize::from(read_u16_be(bytes, pos + 2)?);
                if length < 2 {
                    return None;
                }
                pos = pos.checked_add(2 + length)?;
            }
        }
    }

    None
}

/// Simple lossy layout only: the VP8 frame header puts width and height at
/// fixed offsets. VP8L and VP8X files read garbage or fall back.
fn webp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < WEBP_MIN_LEN {
        return None;
    }

    let width = read_u16_le(bytes, 26)?;
    let height = read_u16_le(bytes, 28)?;
    Some((u32::from(width), u32::from(height)))
}

fn read_u16_be(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    <[u8; 2]>::try_from(raw).ok().map(u16::from_be_bytes)
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    <[u8; 2]>::try_from(raw).ok().map(u16::from_le_bytes)
}

fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    <[u8; 4]>::try_from(raw).ok().map(u32::from_be_bytes)
}
