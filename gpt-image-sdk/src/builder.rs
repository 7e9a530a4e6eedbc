// ABOUTME: Builder pattern implementation for ImageClient configuration
// ABOUTME: Provides type-safe configuration with compile-time validation

use crate::ImageClient;
use crate::constants::{images, retry, timeouts};
use crate::error::ImageError;
use secrecy::SecretString;
use std::time::Duration;
use typed_builder::TypedBuilder;
use url::Url;

#[derive(Debug, TypedBuilder)]
#[builder(build_method(into = Result<ImageClient, ImageError>))]
pub struct ImageClientConfig {
    pub api_key: SecretString,

    #[builder(default = None)]
    pub base_url: Option<String>,

    #[builder(default = None)]
    pub model: Option<String>,

    #[builder(default = None)]
    pub organization: Option<String>,

    #[builder(default = timeouts::HTTP_REQUEST_TIMEOUT)]
    pub timeout: Duration,

    #[builder(default = retry::MAX_RETRIES)]
    pub max_retries: u32,

    #[builder(default = None)]
    pub proxy: Option<reqwest::Proxy>,

    #[builder(default = images::MAX_DOWNLOAD_BYTES)]
    pub max_download_bytes: u64,
}

impl From<ImageClientConfig> for Result<ImageClient, ImageError> {
    fn from(config: ImageClientConfig) -> Self {
        ImageClient::from_config(config)
    }
}

impl ImageClient {
    pub fn builder() -> ImageClientConfigBuilder<((), (), (), (), (), (), (), ())> {
        ImageClientConfig::builder()
    }

    pub fn typed_builder() -> TypedImageClientBuilder<Initial> {
        TypedImageClientBuilder::new()
    }
}

// Helper to create proxy from URL
impl ImageClient {
    pub fn create_proxy(url: &str) -> Result<reqwest::Proxy, ImageError> {
        let parsed_url = Url::parse(url)
            .map_err(|e| ImageError::Configuration(format!("Invalid proxy URL: {}", e)))?;

        reqwest::Proxy::all(parsed_url.as_str())
            .map_err(|e| ImageError::Configuration(format!("Invalid proxy configuration: {}", e)))
    }
}

// Type states for compile-time validation
pub struct Initial;
pub struct WithApiKey(SecretString);

pub struct TypedImageClientBuilder<State = Initial> {
    state: State,
    base_url: Option<String>,
    model: Option<String>,
    organization: Option<String>,
    timeout: Duration,
    max_retries: u32,
    proxy: Option<reqwest::Proxy>,
}

impl Default for TypedImageClientBuilder<Initial> {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedImageClientBuilder<Initial> {
    pub fn new() -> Self {
        Self {
            state: Initial,
            base_url: None,
            model: None,
            organization: None,
            timeout: timeouts::HTTP_REQUEST_TIMEOUT,
            max_retries: retry::MAX_RETRIES,
            proxy: None,
        }
    }

    pub fn api_key(self, key: SecretString) -> TypedImageClientBuilder<WithApiKey> {
        TypedImageClientBuilder {
            state: WithApiKey(key),
            base_url: self.base_url,
            model: self.model,
            organization: self.organization,
            timeout: self.timeout,
            max_retries: self.max_retries,
            proxy: self.proxy,
        }
    }
}

impl<State> TypedImageClientBuilder<State> {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy(mut self, url: &str) -> Result<Self, ImageError> {
        self.proxy = Some(ImageClient::create_proxy(url)?);
        Ok(self)
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl TypedImageClientBuilder<WithApiKey> {
    pub fn build(self) -> Result<ImageClient, ImageError> {
        let config = ImageClientConfig {
            api_key: self.state.0,
            base_url: self.base_url,
            model: self.model,
            organization: self.organization,
            timeout: self.timeout,
            max_retries: self.max_retries,
            proxy: self.proxy,
            max_download_bytes: images::MAX_DOWNLOAD_BYTES,
        };

        ImageClient::from_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    fn key() -> SecretString {
        SecretString::new("sk-test-key".to_string().into_boxed_str())
    }

    #[test]
    fn test_builder_with_minimal_config() {
        let client_result = ImageClient::builder().api_key(key()).build();
        assert!(client_result.is_ok());
    }

    #[test]
    fn test_builder_with_all_options() {
        let client_result = ImageClient::builder()
            .api_key(key())
            .base_url(Some("https://proxy.example.com/v1".to_string()))
            .model(Some("dall-e-3".to_string()))
            .organization(Some("org-123".to_string()))
            .timeout(Duration::from_secs(60))
            .max_retries(5)
            .max_download_bytes(1024)
            .build();

        let client = client_result.unwrap();
        assert_eq!(client.model(), "dall-e-3");
        assert_eq!(client.base_url(), "https://proxy.example.com/v1");
    }

    #[test]
    fn test_type_state_builder_requires_api_key() {
        // build() only exists once api_key() has been called:
        // ImageClient::typed_builder().build(); // ERROR
        let client_result = ImageClient::typed_builder()
            .model("gpt-image-1")
            .api_key(key())
            .timeout(Duration::from_secs(10))
            .build();

        assert!(client_result.is_ok());
    }

    #[test]
    fn test_config_uses_secrecy_for_api_key() {
        let config = ImageClientConfig {
            api_key: key(),
            base_url: None,
            model: None,
            organization: None,
            timeout: Duration::from_secs(1),
            max_retries: 0,
            proxy: None,
            max_download_bytes: 1,
        };

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("sk-test-key"));
    }

    #[test]
    fn test_builder_validates_proxy_url() {
        let result = ImageClient::create_proxy("not-a-url");

        match result {
            Err(ImageError::Configuration(msg)) => {
                assert!(msg.contains("Invalid proxy URL"));
            }
            _ => panic!("Expected configuration error"),
        }
    }

    #[test]
    fn test_builder_with_valid_proxy() {
        let proxy = ImageClient::create_proxy("http://proxy:8080").unwrap();

        let client_result = ImageClient::builder()
            .api_key(key())
            .proxy(Some(proxy))
            .build();

        assert!(client_result.is_ok());
    }

    #[test]
    fn test_builder_rejects_invalid_base_url() {
        let result = ImageClient::builder()
            .api_key(key())
            .base_url(Some("not a url".to_string()))
            .build();

        assert!(matches!(result, Err(ImageError::Configuration(_))));
    }

    #[test]
    fn test_default_configuration_values() {
        let client = ImageClient::builder().api_key(key()).build().unwrap();

        assert_eq!(client.model(), images::DEFAULT_MODEL);
        assert_eq!(client.base_url(), crate::constants::urls::OPENAI_API_BASE);
    }
}
