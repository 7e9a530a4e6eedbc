// ABOUTME: HTTP client for the image generation, edit, and variation endpoints
// ABOUTME: Sends requests with retry and hands responses to the decoder

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::Result;
use crate::builder::ImageClientConfig;
use crate::constants::{headers, images, timeouts, urls};
use crate::download::{HttpImageFetcher, ImageFetcher};
use crate::error::ImageError;
use crate::request::{EditRequest, GenerateRequest, VariationRequest};
use crate::response::{RawResponse, decode_many, decode_single, status_error};
use crate::result::ImageResult;
use crate::retry::{RetryConfig, retry_with_backoff};

/// Client for the provider's image endpoints.
///
/// Every call is a sequence of awaited HTTP operations. Dropping the returned
/// future cancels the in-flight request.
pub struct ImageClient {
    http: reqwest::Client,
    fetcher: Arc<dyn ImageFetcher>,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl ImageClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = SecretString::new(api_key.into().into_boxed_str());
        Self::builder().api_key(api_key).build()
    }

    pub(crate) fn from_config(config: ImageClientConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .unwrap_or_else(|| urls::OPENAI_API_BASE.to_string());
        let parsed = Url::parse(&base_url)
            .map_err(|e| ImageError::Configuration(format!("Invalid base URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImageError::Configuration(format!(
                "Base URL must use http or https: {}",
                base_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|_| ImageError::Configuration("API key contains invalid characters".into()))?;
        auth.set_sensitive(true);
        default_headers.insert(AUTHORIZATION, auth);

        if let Some(organization) = &config.organization {
            let value = HeaderValue::from_str(organization).map_err(|_| {
                ImageError::Configuration("Organization contains invalid characters".into())
            })?;
            default_headers.insert(headers::ORGANIZATION, value);
        }

        let mut api_builder = reqwest::Client::builder()
            .default_headers(default_headers)
            .user_agent(headers::USER_AGENT)
            .timeout(config.timeout);

        // Image URLs live on third-party hosts and must not see the API key
        let mut download_builder = reqwest::Client::builder()
            .user_agent(headers::USER_AGENT)
            .timeout(timeouts::DOWNLOAD_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(3));

        if let Some(proxy) = config.proxy {
            download_builder = download_builder.proxy(proxy.clone());
            api_builder = api_builder.proxy(proxy);
        }

        let http = api_builder.build().map_err(|e| {
            ImageError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;
        let download_client = download_builder.build().map_err(|e| {
            ImageError::Configuration(format!("Failed to create download client: {}", e))
        })?;

        let fetcher = HttpImageFetcher::with_client(download_client)
            .with_max_bytes(config.max_download_bytes);

        Ok(Self {
            http,
            fetcher: Arc::new(fetcher),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config
                .model
                .unwrap_or_else(|| images::DEFAULT_MODEL.to_string()),
            retry: RetryConfig::with_max_retries(config.max_retries),
        })
    }

    /// Replace the fetcher used for URL-referenced images.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate one image. Extra entries in the response are ignored.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<ImageResult> {
        request.validate()?;
        let body = request.to_body(&self.model)?;
        tracing::debug!(model = %body["model"], "Generating image");

        let response = self.post_json(urls::GENERATIONS_PATH, &body).await?;
        decode_single(&response, self.fetcher.as_ref()).await
    }

    /// Generate `request.n` images in one call, keeping every entry that decodes.
    pub async fn generate_many(&self, request: &GenerateRequest) -> Result<Vec<ImageResult>> {
        request.validate()?;
        let body = request.to_body(&self.model)?;
        tracing::debug!(model = %body["model"], n = ?request.n, "Generating images");

        let response = self.post_json(urls::GENERATIONS_PATH, &body).await?;
        decode_many(&response, self.fetcher.as_ref()).await
    }

    /// Run `count` single-image generations one after another, in order.
    /// The first failure aborts the batch.
    pub async fn generate_batch(
        &self,
        request: &GenerateRequest,
        count: usize,
    ) -> Result<Vec<ImageResult>> {
        if count == 0 {
            return Err(ImageError::InvalidRequest(
                "Batch count must be at least 1".to_string(),
            ));
        }

        let mut results = Vec::with_capacity(count);
        for index in 0..count {
            tracing::debug!(index, count, "Generating batch image");
            results.push(self.generate(request).await?);
        }
        Ok(results)
    }

    pub async fn edit(&self, request: &EditRequest) -> Result<ImageResult> {
        request.validate()?;
        tracing::debug!(has_mask = request.mask.is_some(), "Editing image");

        let response = self
            .post_multipart(urls::EDITS_PATH, || request.to_form(&self.model))
            .await?;
        decode_single(&response, self.fetcher.as_ref()).await
    }

    /// Edit returning every entry that decodes, for requests with `n` above one.
    pub async fn edit_many(&self, request: &EditRequest) -> Result<Vec<ImageResult>> {
        request.validate()?;
        tracing::debug!(has_mask = request.mask.is_some(), n = ?request.n, "Editing images");

        let response = self
            .post_multipart(urls::EDITS_PATH, || request.to_form(&self.model))
            .await?;
        decode_many(&response, self.fetcher.as_ref()).await
    }

    /// Variations of an input image. Entries that fail to resolve are skipped.
    pub async fn create_variations(&self, request: &VariationRequest) -> Result<Vec<ImageResult>> {
        request.validate()?;
        tracing::debug!(n = ?request.n, "Creating image variations");

        let response = self
            .post_multipart(urls::VARIATIONS_PATH, || {
                request.to_form(images::VARIATION_MODEL)
            })
            .await?;
        decode_many(&response, self.fetcher.as_ref()).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<RawResponse> {
        let url = &self.endpoint(path);
        let http = &self.http;

        retry_with_backoff(&self.retry, || async move {
            let response = http.post(url).json(body).send().await?;
            Self::into_raw(response).await
        })
        .await
    }

    async fn post_multipart<F>(&self, path: &str, build_form: F) -> Result<RawResponse>
    where
        F: Fn() -> Result<Form>,
    {
        let url = &self.endpoint(path);
        let http = &self.http;
        let build_form = &build_form;

        retry_with_backoff(&self.retry, || async move {
            // Forms are consumed by send, so each attempt builds a fresh one
            let form = build_form()?;
            let response = http.post(url).multipart(form).send().await?;
            Self::into_raw(response).await
        })
        .await
    }

    /// Read the response; retryable provider statuses become errors so the retry loop sees them.
    async fn into_raw(response: reqwest::Response) -> Result<RawResponse> {
        let raw = RawResponse::from_reqwest(response).await?;
        tracing::debug!(
            status = raw.status.as_u16(),
            request_id = raw.request_id.as_deref().unwrap_or_default(),
            "Provider responded"
        );

        match status_error(&raw) {
            Some(error) if error.is_retryable() => Err(error),
            _ => Ok(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use crate::request::{ImageSize, ResponseFormat};
    use crate::test_helpers::{
        b64, jpeg_bytes, mock_b64_response, mock_error_response, mock_provider_server,
        mock_url_response, png_bytes,
    };
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> ImageClient {
        ImageClient::builder()
            .api_key(SecretString::new("sk-test".to_string().into_boxed_str()))
            .base_url(Some(server.url()))
            .max_retries(0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_image_client_creation() {
        let client = ImageClient::new("sk-test");
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_generate_decodes_inline_image() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/generations")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "prompt": "a lighthouse",
                "model": "gpt-image-1",
                "size": "1536x1024"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("x-request-id", "req_123")
            .with_body(mock_b64_response(&[png_bytes(1536, 1024)]).to_string())
            .create_async()
            .await;

        let request = GenerateRequest::builder()
            .prompt("a lighthouse")
            .size(ImageSize::Landscape1536x1024)
            .build();
        let result = client_for(&server).generate(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.format(), ImageFormat::Png);
        assert_eq!((result.width(), result.height()), (1536, 1024));
        assert_eq!(result.provider_request_id(), "req_123");
        assert_eq!(result.input_tokens(), Some(50));
    }

    #[tokio::test]
    async fn test_generate_downloads_url_without_api_key() {
        let mut server = mock_provider_server().await;
        let image_url = format!("{}/files/out.jpg", server.url());

        let api_mock = server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(mock_url_response(&[&image_url]).to_string())
            .create_async()
            .await;
        let file_mock = server
            .mock("GET", "/files/out.jpg")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body(jpeg_bytes(1024, 1792))
            .create_async()
            .await;

        let request = GenerateRequest::builder()
            .prompt("a tall tower")
            .model("dall-e-3")
            .response_format(ResponseFormat::Url)
            .build();
        let result = client_for(&server).generate(&request).await.unwrap();

        api_mock.assert_async().await;
        file_mock.assert_async().await;
        assert_eq!(result.format(), ImageFormat::Jpeg);
        assert_eq!((result.width(), result.height()), (1024, 1792));
        assert_eq!(result.revised_prompt(), Some("a revised prompt"));
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_provider_error() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/generations")
            .with_status(429)
            .with_header("x-request-id", "req_rl")
            .create_async()
            .await;

        let request = GenerateRequest::builder().prompt("x").build();
        let err = client_for(&server).generate(&request).await.unwrap_err();

        mock.assert_async().await;
        assert!(err.is_rate_limited());
        assert_eq!(err.request_id(), Some("req_rl"));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/generations")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = client_for(&server).with_retry_config(RetryConfig {
            max_retries: 2,
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
            backoff_multiplier: 2.0,
        });
        let request = GenerateRequest::builder().prompt("x").build();
        let err = client.generate(&request).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/generations")
            .with_status(400)
            .with_body(mock_error_response("Invalid prompt", "invalid_value").to_string())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server).with_retry_config(RetryConfig::with_max_retries(3));
        let request = GenerateRequest::builder().prompt("x").build();
        let err = client.generate(&request).await.unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("Invalid prompt"));
    }

    #[tokio::test]
    async fn test_generate_batch_runs_sequential_requests() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(mock_b64_response(&[png_bytes(8, 8)]).to_string())
            .expect(3)
            .create_async()
            .await;

        let request = GenerateRequest::builder().prompt("x").build();
        let client = client_for(&server);
        let results = client.generate_batch(&request, 3).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 3);
        assert!(client.generate_batch(&request, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_generate_many_keeps_partial_results() {
        let mut server = mock_provider_server().await;
        let body = json!({
            "data": [
                { "b64_json": b64(&png_bytes(4, 4)) },
                { "b64_json": "not-base64!" },
                { "b64_json": b64(&jpeg_bytes(2, 2)) }
            ]
        });
        let mock = server
            .mock("POST", "/images/generations")
            .match_body(Matcher::PartialJson(json!({ "n": 3 })))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let request = GenerateRequest::builder().prompt("x").n(3).build();
        let results = client_for(&server).generate_many(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].format(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_edit_sends_multipart() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/edits")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data; boundary=.*".to_string()),
            )
            .match_body(Matcher::Regex("add a party hat".to_string()))
            .with_status(200)
            .with_body(mock_b64_response(&[png_bytes(1024, 1024)]).to_string())
            .create_async()
            .await;

        let request = EditRequest::builder()
            .image(png_bytes(1024, 1024))
            .prompt("add a party hat")
            .build();
        let result = client_for(&server).edit(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!((result.width(), result.height()), (1024, 1024));
    }

    #[tokio::test]
    async fn test_edit_many_returns_every_image() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/edits")
            .match_body(Matcher::Regex("name=\"n\"\\s+2".to_string()))
            .with_status(200)
            .with_body(
                mock_b64_response(&[png_bytes(1024, 1024), jpeg_bytes(1024, 1536)]).to_string(),
            )
            .create_async()
            .await;

        let request = EditRequest::builder()
            .image(png_bytes(1024, 1024))
            .prompt("make it night")
            .n(2)
            .build();
        let results = client_for(&server).edit_many(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].format(), ImageFormat::Jpeg);
        assert_eq!((results[1].width(), results[1].height()), (1024, 1536));
    }

    #[tokio::test]
    async fn test_variations_use_dall_e_2_and_skip_failures() {
        let mut server = mock_provider_server().await;
        let body = json!({ "data": [{ "b64_json": b64(&png_bytes(256, 256)) }, { "url": null }] });
        let mock = server
            .mock("POST", "/images/variations")
            .match_body(Matcher::Regex("dall-e-2".to_string()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let request = VariationRequest::builder()
            .image(png_bytes(256, 256))
            .n(2)
            .size(ImageSize::Square256)
            .build();
        let results = client_for(&server)
            .create_variations(&request)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].width(), 256);
    }

    #[tokio::test]
    async fn test_invalid_request_sends_nothing() {
        let mut server = mock_provider_server().await;
        let mock = server
            .mock("POST", "/images/generations")
            .expect(0)
            .create_async()
            .await;

        let request = GenerateRequest::builder().prompt("").build();
        let err = client_for(&server).generate(&request).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ImageError::InvalidRequest(_)));
    }
}
