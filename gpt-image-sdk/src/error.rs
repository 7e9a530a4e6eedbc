// ABOUTME: Custom error types for the image SDK with user-friendly messages
// ABOUTME: One variant per failure mode so callers can branch on kind, not message

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Provider error (HTTP {status}): {message}")]
    Provider {
        status: u16,
        message: String,
        code: Option<String>,
        kind: Option<String>,
        request_id: Option<String>,
    },

    #[error("Provider returned no image data")]
    NoData { request_id: Option<String> },

    #[error("No image URL or base64 data in response entry {index}")]
    MissingImageData {
        index: usize,
        request_id: Option<String>,
    },

    #[error("Failed to decode base64 image data in entry {index}: {message}")]
    Decode {
        index: usize,
        message: String,
        request_id: Option<String>,
    },

    #[error("Failed to download image from {url}: {message}")]
    Download {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("None of the {attempted} images in the response could be resolved")]
    NoSuccessfulImages { attempted: usize },

    #[error("Image data is empty")]
    EmptyImage,

    #[error("Invalid API response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: Request took too long to complete")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ImageError {
    /// HTTP status associated with the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ImageError::Provider { status, .. } => Some(*status),
            ImageError::Download { status, .. } => *status,
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ImageError::Provider { request_id, .. }
            | ImageError::NoData { request_id }
            | ImageError::MissingImageData { request_id, .. }
            | ImageError::Decode { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429) && matches!(self, ImageError::Provider { .. })
    }

    pub fn help_text(&self) -> Option<&'static str> {
        match self {
            ImageError::Provider { status: 401, .. } => {
                Some("Check your OPENAI_API_KEY at https://platform.openai.com/api-keys")
            }
            ImageError::Provider { status: 403, .. } => {
                Some("Your organization may need verification before using this image model")
            }
            ImageError::Provider { status: 429, .. } => {
                Some("Wait a moment before making another request")
            }
            ImageError::Provider { status: 400, .. } => {
                Some("Check the prompt and the size/quality options for the selected model")
            }
            ImageError::Network(_) => Some("Check your internet connection and try again"),
            ImageError::Timeout => {
                Some("Image generation can be slow; try again or raise the timeout")
            }
            ImageError::Configuration(_) => {
                Some("Check the API URL, proxy and timeout settings in your config file")
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ImageError::Network(_) | ImageError::Timeout => true,
            ImageError::Provider { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ImageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ImageError::Timeout
        } else {
            ImageError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ImageError {
    fn from(err: serde_json::Error) -> Self {
        ImageError::InvalidResponse(err.to_string())
    }
}
