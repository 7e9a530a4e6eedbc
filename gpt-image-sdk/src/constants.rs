// ABOUTME: Centralized constants for the image SDK
// ABOUTME: Contains retry configuration, timeouts, endpoints, and decoding defaults

/// Retry configuration constants
pub mod retry {
    use std::time::Duration;

    /// Maximum number of retry attempts
    pub const MAX_RETRIES: u32 = 3;

    /// Initial delay before first retry
    pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

    /// Maximum delay between retries
    pub const MAX_DELAY: Duration = Duration::from_secs(20);

    /// Backoff multiplier for exponential backoff
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
}

/// HTTP and request timeouts
pub mod timeouts {
    use std::time::Duration;

    /// Default timeout for HTTP requests. High-quality generations routinely take a minute.
    pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    /// Timeout for fetching a URL-referenced image
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
}

/// Provider API endpoints
pub mod urls {
    /// Base URL for the OpenAI REST API
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

    pub const GENERATIONS_PATH: &str = "/images/generations";
    pub const EDITS_PATH: &str = "/images/edits";
    pub const VARIATIONS_PATH: &str = "/images/variations";
}

/// Header names read from or sent to the provider
pub mod headers {
    pub const REQUEST_ID: &str = "x-request-id";
    pub const ORGANIZATION: &str = "openai-organization";
    pub const USER_AGENT: &str = concat!("gpt-image-sdk/", env!("CARGO_PKG_VERSION"));
}

/// Defaults used while decoding provider responses
pub mod images {
    /// Model used when a request does not name one
    pub const DEFAULT_MODEL: &str = "gpt-image-1";

    /// Only dall-e-2 serves the variations endpoint
    pub const VARIATION_MODEL: &str = "dall-e-2";

    /// Dimensions reported when they cannot be read from the image header
    pub const DEFAULT_DIMENSIONS: (u32, u32) = (1024, 1024);

    /// Largest URL-referenced image the fetcher will buffer
    pub const MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;

    /// Provider limit on images per request
    pub const MAX_IMAGES_PER_REQUEST: u8 = 10;
}
