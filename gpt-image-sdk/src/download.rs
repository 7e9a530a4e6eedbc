// ABOUTME: Fetch-by-URL capability used when the provider returns image links
// ABOUTME: HTTP implementation enforces scheme checks, size limits, and non-empty bodies

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use url::Url;

use crate::Result;
use crate::constants::{headers, images, timeouts};
use crate::error::ImageError;

/// Retrieves the raw bytes behind an image URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`ImageFetcher`] backed by a reqwest client.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(timeouts::DOWNLOAD_TIMEOUT)
            .user_agent(headers::USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .map_err(|e| {
                ImageError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    /// Reuse an existing client (and its proxy and TLS settings).
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_bytes: images::MAX_DOWNLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn download_error(url: &str, status: Option<u16>, message: impl Into<String>) -> ImageError {
        ImageError::Download {
            url: url.to_string(),
            status,
            message: message.into(),
        }
    }

    fn validate_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|e| Self::download_error(url, None, format!("Invalid URL: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(Self::download_error(
                url,
                None,
                format!("Unsupported URL scheme '{}'", scheme),
            )),
        }
    }

    async fn read_body_with_limit(
        &self,
        response: reqwest::Response,
        url: &str,
    ) -> Result<Vec<u8>> {
        if let Some(content_length) = response.content_length() {
            if content_length > self.max_bytes {
                return Err(Self::download_error(
                    url,
                    None,
                    format!(
                        "Image too large: {} bytes (max: {} bytes)",
                        content_length, self.max_bytes
                    ),
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                Self::download_error(url, None, format!("Failed to read response body: {}", e))
            })?;

            bytes.extend_from_slice(&chunk);

            // Content-Length can be absent or wrong
            if bytes.len() as u64 > self.max_bytes {
                return Err(Self::download_error(
                    url,
                    None,
                    format!(
                        "Image exceeded size limit during download: {} bytes (max: {})",
                        bytes.len(),
                        self.max_bytes
                    ),
                ));
            }
        }

        Ok(bytes)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let validated = Self::validate_url(url)?;
        tracing::debug!(url = %validated, "Downloading image");

        let response = self
            .client
            .get(validated)
            .send()
            .await
            .map_err(|e| Self::download_error(url, None, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::download_error(
                url,
                Some(status.as_u16()),
                format!("HTTP request failed with status {}", status),
            ));
        }

        let bytes = self.read_body_with_limit(response, url).await?;
        if bytes.is_empty() {
            return Err(Self::download_error(url, Some(status.as_u16()), "Empty response body"));
        }

        tracing::debug!(url, size = bytes.len(), "Downloaded image");
        Ok(bytes)
    }
}
