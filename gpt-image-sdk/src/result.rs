// ABOUTME: Immutable image result assembled from decoded bytes and sniffed metadata
// ABOUTME: Rejects empty payloads so every ImageResult carries real image content

use serde::Deserialize;

use crate::Result;
use crate::dimensions::extract_dimensions;
use crate::error::ImageError;
use crate::format::{ImageFormat, detect_format};

/// Token usage reported by the provider for the whole request.
///
/// Field names match the normalized keys produced by the response decoder.
/// A count with an unexpected type reads as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Usage {
    #[serde(
        default,
        rename = "inputtokens",
        alias = "input_tokens",
        deserialize_with = "crate::response::lenient"
    )]
    pub input_tokens: Option<u64>,
    #[serde(
        default,
        rename = "outputtokens",
        alias = "output_tokens",
        deserialize_with = "crate::response::lenient"
    )]
    pub output_tokens: Option<u64>,
    #[serde(
        default,
        rename = "totaltokens",
        alias = "total_tokens",
        deserialize_with = "crate::response::lenient"
    )]
    pub total_tokens: Option<u64>,
}

/// A single generated or edited image.
///
/// Width and height come from the image header, not from the provider, and
/// hold the fallback size when the header could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    format: ImageFormat,
    provider_request_id: String,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    revised_prompt: Option<String>,
}

impl ImageResult {
    /// Sniff the format, read the dimensions and package `bytes`.
    pub fn assemble(bytes: Vec<u8>, request_id: impl Into<String>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ImageError::EmptyImage);
        }

        let format = detect_format(&bytes);
        let (width, height) = extract_dimensions(&bytes, format);

        Ok(Self {
            bytes,
            width,
            height,
            format,
            provider_request_id: request_id.into(),
            input_tokens: None,
            output_tokens: None,
            revised_prompt: None,
        })
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.input_tokens = usage.input_tokens;
        self.output_tokens = usage.output_tokens;
        self
    }

    pub fn with_revised_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.revised_prompt = Some(prompt.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image holds no bytes; never true for an assembled result.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Opaque provider request id for support tickets. Empty when the provider sent none.
    pub fn provider_request_id(&self) -> &str {
        &self.provider_request_id
    }

    pub fn input_tokens(&self) -> Option<u64> {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> Option<u64> {
        self.output_tokens
    }

    /// Prompt as rewritten by the provider, when it reports one.
    pub fn revised_prompt(&self) -> Option<&str> {
        self.revised_prompt.as_deref()
    }
}
