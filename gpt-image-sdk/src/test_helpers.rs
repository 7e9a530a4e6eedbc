// ABOUTME: Test helper utilities for building synthetic images and provider responses
// ABOUTME: Provides header-only PNG/JPEG/WebP fixtures and an in-memory image fetcher

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mockito::{Server, ServerGuard};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::Result;
use crate::download::ImageFetcher;
use crate::error::ImageError;

pub async fn mock_provider_server() -> ServerGuard {
    Server::new_async().await
}

/// Signature, IHDR, empty IDAT and IEND. CRC fields are zeroed.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes.extend_from_slice(&[0; 4]);

    for tag in [b"IDAT", b"IEND"] {
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(&[0; 4]);
    }

    bytes
}

/// SOI, a JFIF APP0 segment, SOF0 for three components, EOI.
pub fn jpeg_bytes(width: u16, height: u16) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];

    bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    bytes.extend_from_slice(b"JFIF\0");
    bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);

    bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);

    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

/// RIFF/WEBP container with a lossy VP8 key frame header.
pub fn webp_bytes(width: u16, height: u16) -> Vec<u8> {
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&26u32.to_le_bytes());
    bytes.extend_from_slice(b"WEBPVP8 ");
    bytes.extend_from_slice(&14u32.to_le_bytes());
    bytes.extend_from_slice(&[0x30, 0x01, 0x00, 0x9D, 0x01, 0x2A]);
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&[0; 4]);
    bytes
}

pub fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn mock_b64_response(images: &[Vec<u8>]) -> serde_json::Value {
    let data: Vec<_> = images.iter().map(|bytes| json!({ "b64_json": b64(bytes) })).collect();
    json!({
        "created": 1_713_833_628,
        "data": data,
        "usage": {
            "total_tokens": 100,
            "input_tokens": 50,
            "output_tokens": 50,
            "input_tokens_details": { "text_tokens": 10, "image_tokens": 40 }
        }
    })
}

pub fn mock_url_response(urls: &[&str]) -> serde_json::Value {
    let data: Vec<_> = urls
        .iter()
        .map(|url| json!({ "url": url, "revised_prompt": "a revised prompt" }))
        .collect();
    json!({ "created": 1_713_833_628, "data": data })
}

pub fn mock_error_response(message: &str, code: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "type": "invalid_request_error",
            "param": null,
            "code": code
        }
    })
}

/// In-memory [`ImageFetcher`] keyed by URL. Unknown URLs fail with a 404 download error.
#[derive(Default)]
pub struct StaticFetcher {
    images: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), bytes);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| ImageError::Download {
                url: url.to_string(),
                status: Some(404),
                message: "HTTP 404 Not Found".to_string(),
            })
    }
}
