// ABOUTME: Configuration file loading, validation, and hierarchical merging for the image CLI
// ABOUTME: Supports TOML config files with XDG Base Directory specification compliance

use anyhow::{Context, Result, anyhow};
use gpt_image_sdk::constants::{retry, timeouts};
use gpt_image_sdk::{ImageClient, ImageFormat, ImageQuality, ImageSize};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub size: Option<ImageSize>,
    #[serde(default)]
    pub quality: Option<ImageQuality>,
    #[serde(default)]
    pub output_format: Option<ImageFormat>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "validate_timeout")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Config {
    /// Load configuration from standard XDG-compliant locations
    pub fn load() -> Result<Self> {
        Self::load_from_paths(&Self::get_config_paths())
    }

    /// Load configuration from specific file paths in order of precedence (lowest first)
    pub fn load_from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut config = Config::default();

        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                continue;
            }
            // Later paths override earlier ones
            config = config.merge(Self::load_from_file(path)?);
        }

        Ok(config)
    }

    /// Load configuration from a single file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML config file: {}",
                path.as_ref().display()
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get standard config file paths, least specific first
    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. User config directory fallback
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".config").join("gpt-image").join("config.toml"));
        }

        // 2. XDG config home
        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(config_home).join("gpt-image").join("config.toml"));
        }

        // 3. Project-specific config (highest precedence)
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join("gpt-image.toml"));
        }

        paths.dedup();
        paths
    }

    /// Merge this config with another, giving precedence to the other config
    pub fn merge(self, other: Config) -> Config {
        Config {
            api_url: other.api_url.or(self.api_url),
            model: other.model.or(self.model),
            organization: other.organization.or(self.organization),
            size: other.size.or(self.size),
            quality: other.quality.or(self.quality),
            output_format: other.output_format.or(self.output_format),
            output_dir: other.output_dir.or(self.output_dir),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            max_retries: other.max_retries.or(self.max_retries),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err(anyhow!(
                    "Invalid api_url '{}'. Must start with http:// or https://",
                    api_url
                ));
            }
        }

        if let Some(ref model) = self.model {
            if model.trim().is_empty() {
                return Err(anyhow!("model must not be empty"));
            }
        }

        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build an SDK client from this configuration
    pub fn build_client(&self, api_key: SecretString) -> Result<ImageClient> {
        ImageClient::builder()
            .api_key(api_key)
            .base_url(self.api_url.clone())
            .model(self.model.clone())
            .organization(self.organization.clone())
            .timeout(
                self.timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(timeouts::HTTP_REQUEST_TIMEOUT),
            )
            .max_retries(self.max_retries.unwrap_or(retry::MAX_RETRIES))
            .build()
            .context("Failed to create image client")
    }
}

// Custom deserializer for timeout validation
fn validate_timeout<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<u64> = Option::deserialize(deserializer)?;

    match value {
        Some(0) => Err(D::Error::custom("timeout_secs must be greater than 0")),
        Some(secs) if secs > MAX_TIMEOUT_SECS => Err(D::Error::custom(format!(
            "timeout_secs must be at most {}, got {}",
            MAX_TIMEOUT_SECS, secs
        ))),
        other => Ok(other),
    }
}
