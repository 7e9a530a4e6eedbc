// ABOUTME: Decoding of provider image responses into ImageResult values
// ABOUTME: Handles error envelopes, inline base64, URL references, and partial batch failures

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::Result;
use crate::constants::headers;
use crate::download::ImageFetcher;
use crate::error::ImageError;
use crate::result::{ImageResult, Usage};

/// A finished HTTP exchange, reduced to what the decoder needs.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            request_id: None,
            body: body.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Read status, request id header and full body text from a reqwest response.
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let request_id = response
            .headers()
            .get(headers::REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(Self {
            status,
            request_id,
            body,
        })
    }

    fn request_id_or_empty(&self) -> &str {
        self.request_id.as_deref().unwrap_or_default()
    }
}

/// Top-level provider JSON. Keys are matched after [`normalize_keys`].
///
/// Only the shape of `data` matters for decoding; `created` and `usage`
/// are dropped when they carry an unexpected type.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderEnvelope {
    #[serde(default, deserialize_with = "error_field")]
    pub error: Option<ErrorField>,
    #[serde(default, deserialize_with = "lenient")]
    pub created: Option<i64>,
    /// Raw entries, converted one at a time with [`ImageEntry::from_value`].
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    pub usage: Option<Usage>,
}

/// Providers send either a structured error object or a bare message string.
#[derive(Debug)]
pub enum ErrorField {
    Structured(ProviderErrorBody),
    Message(String),
    /// Any other non-null value, e.g. `true` or a number.
    Unrecognized,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default, deserialize_with = "non_empty")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub code: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "non_empty")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageEntry {
    #[serde(default, deserialize_with = "non_empty")]
    pub url: Option<String>,
    #[serde(default, rename = "b64json", deserialize_with = "non_empty")]
    pub b64_json: Option<String>,
    #[serde(default, rename = "revisedprompt", deserialize_with = "non_empty")]
    pub revised_prompt: Option<String>,
}

impl ImageEntry {
    /// Entry from one normalized `data` element. Anything that is not an
    /// object yields an entry with no image reference.
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Deserialize through `Value`, keeping `None` when the type does not match.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

// Any present, non-null error value marks the response as failed
fn error_field<'de, D>(deserializer: D) -> std::result::Result<Option<ErrorField>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(value.map(|value| match value {
        Value::Object(map) => {
            ErrorField::Structured(serde_json::from_value(Value::Object(map)).unwrap_or_default())
        }
        Value::String(message) => ErrorField::Message(message),
        _ => ErrorField::Unrecognized,
    }))
}

// Absent, null, "" and non-scalar values all mean "not provided"
fn non_empty<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Lowercase every object key and drop underscores, so `b64_json`, `b64Json`
/// and `B64JSON` all become `b64json`.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key: String = key
                        .chars()
                        .filter(|c| *c != '_')
                        .flat_map(char::to_lowercase)
                        .collect();
                    (key, normalize_keys(value))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

pub fn parse_envelope(body: &str) -> Result<ProviderEnvelope> {
    let value: Value = serde_json::from_str(body)?;
    Ok(serde_json::from_value(normalize_keys(value))?)
}

fn provider_error(
    status: StatusCode,
    error: Option<ErrorField>,
    raw_body: &str,
    request_id: Option<&str>,
) -> ImageError {
    let (message, code, kind) = match error {
        Some(ErrorField::Structured(body)) => (body.message, body.code, body.kind),
        Some(ErrorField::Message(message)) if !message.trim().is_empty() => {
            (Some(message), None, None)
        }
        _ => (None, None, None),
    };

    let message = message
        .or_else(|| {
            let trimmed = raw_body.trim();
            (!status.is_success() && !trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            if status.is_success() {
                "Provider returned an error without a message".to_string()
            } else {
                format!("HTTP {}", status)
            }
        });

    ImageError::Provider {
        status: status.as_u16(),
        message,
        code,
        kind,
        request_id: request_id.map(str::to_string),
    }
}

/// Provider error for a non-success status, preferring the structured
/// message when the error body happens to be JSON.
pub fn status_error(response: &RawResponse) -> Option<ImageError> {
    if response.status.is_success() {
        return None;
    }

    let structured = parse_envelope(&response.body)
        .ok()
        .and_then(|envelope| envelope.error);
    Some(provider_error(
        response.status,
        structured,
        &response.body,
        response.request_id.as_deref(),
    ))
}

/// Turn a response into its success envelope plus a non-empty entry list.
fn checked_envelope(response: &RawResponse) -> Result<(Vec<ImageEntry>, Option<Usage>)> {
    let request_id = response.request_id.as_deref();

    if let Some(error) = status_error(response) {
        return Err(error);
    }

    let envelope = parse_envelope(&response.body)?;

    if let Some(error) = envelope.error {
        return Err(provider_error(
            response.status,
            Some(error),
            &response.body,
            request_id,
        ));
    }

    match envelope.data {
        Some(entries) if !entries.is_empty() => Ok((
            entries.into_iter().map(ImageEntry::from_value).collect(),
            envelope.usage,
        )),
        _ => Err(ImageError::NoData {
            request_id: request_id.map(str::to_string),
        }),
    }
}

/// Resolve one entry to its encoded bytes: URL first, then inline base64.
async fn resolve_entry(
    entry: &ImageEntry,
    index: usize,
    request_id: &str,
    fetcher: &dyn ImageFetcher,
) -> Result<Vec<u8>> {
    let request_id = (!request_id.is_empty()).then(|| request_id.to_string());

    if let Some(url) = entry.url.as_deref() {
        let bytes = fetcher.fetch(url).await.map_err(|err| match err {
            ImageError::Download { .. } => err,
            other => ImageError::Download {
                url: url.to_string(),
                status: other.status(),
                message: other.to_string(),
            },
        })?;

        if bytes.is_empty() {
            return Err(ImageError::Download {
                url: url.to_string(),
                status: None,
                message: "Downloaded image is empty".to_string(),
            });
        }
        Ok(bytes)
    } else if let Some(encoded) = entry.b64_json.as_deref() {
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| ImageError::Decode {
                index,
                message: e.to_string(),
                request_id,
            })
    } else {
        Err(ImageError::MissingImageData { index, request_id })
    }
}

async fn decode_entry(
    entry: &ImageEntry,
    index: usize,
    usage: Option<Usage>,
    request_id: &str,
    fetcher: &dyn ImageFetcher,
) -> Result<ImageResult> {
    let bytes = resolve_entry(entry, index, request_id, fetcher).await?;
    let mut result = ImageResult::assemble(bytes, request_id)?;

    if let Some(usage) = usage {
        result = result.with_usage(usage);
    }
    if let Some(prompt) = entry.revised_prompt.as_deref() {
        result = result.with_revised_prompt(prompt);
    }

    Ok(result)
}

/// Decode a single-image response. Every failure is fatal.
pub async fn decode_single(
    response: &RawResponse,
    fetcher: &dyn ImageFetcher,
) -> Result<ImageResult> {
    let (entries, usage) = checked_envelope(response)?;

    if entries.len() > 1 {
        tracing::debug!(
            count = entries.len(),
            "Single-image decode ignoring extra response entries"
        );
    }

    let result = decode_entry(
        &entries[0],
        0,
        usage,
        response.request_id_or_empty(),
        fetcher,
    )
    .await?;

    tracing::debug!(
        format = %result.format(),
        width = result.width(),
        height = result.height(),
        size = result.len(),
        "Decoded image"
    );
    Ok(result)
}

/// Decode every entry of a multi-image response, skipping entries that fail.
///
/// Only fails as a whole when the envelope itself is an error, carries no
/// entries, or none of the entries could be resolved.
pub async fn decode_many(
    response: &RawResponse,
    fetcher: &dyn ImageFetcher,
) -> Result<Vec<ImageResult>> {
    let (entries, usage) = checked_envelope(response)?;
    let request_id = response.request_id_or_empty();

    let mut results = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match decode_entry(entry, index, usage, request_id, fetcher).await {
            Ok(result) => results.push(result),
            Err(error) => {
                tracing::warn!(index, %error, request_id, "Skipping image entry");
            }
        }
    }

    if results.is_empty() {
        return Err(ImageError::NoSuccessfulImages {
            attempted: entries.len(),
        });
    }

    tracing::debug!(
        decoded = results.len(),
        attempted = entries.len(),
        "Decoded image batch"
    );
    Ok(results)
}
