// ABOUTME: Image SDK library providing a typed client for the OpenAI image API
// ABOUTME: Includes response decoding, format sniffing, and header-only dimension extraction

pub mod builder;
pub mod client;
pub mod constants;
pub mod dimensions;
pub mod download;
pub mod error;
pub mod format;
pub mod request;
pub mod response;
pub mod result;
pub mod retry;

#[cfg(test)]
mod test_helpers;

pub use builder::{ImageClientConfig, TypedImageClientBuilder};
pub use client::ImageClient;
pub use dimensions::extract_dimensions;
pub use download::{HttpImageFetcher, ImageFetcher};
pub use error::ImageError;
pub use format::{ImageFormat, detect_format};
pub use request::{
    Background, EditRequest, GenerateRequest, ImageQuality, ImageSize, ResponseFormat,
    VariationRequest,
};
pub use response::{RawResponse, decode_many, decode_single};
pub use result::{ImageResult, Usage};
pub use retry::RetryConfig;

pub type Result<T> = std::result::Result<T, ImageError>;
