// ABOUTME: Request types for image generation, edits, and variations
// ABOUTME: Builds the JSON and multipart bodies the provider endpoints expect

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::Result;
use crate::constants::images::MAX_IMAGES_PER_REQUEST;
use crate::error::ImageError;
use crate::format::{ImageFormat, detect_format};

// String-valued option enums share the same wire names for serde, Display and FromStr.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ImageError;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ImageError::InvalidRequest(format!(
                        "Invalid {} '{}'. Must be one of: {}",
                        stringify!($name),
                        other,
                        [$($wire),+].join(", ")
                    ))),
                }
            }
        }
    };
}

wire_enum! {
    /// Output size. Which sizes are accepted depends on the model.
    ImageSize {
        Auto => "auto",
        Square256 => "256x256",
        Square512 => "512x512",
        Square1024 => "1024x1024",
        Landscape1536x1024 => "1536x1024",
        Portrait1024x1536 => "1024x1536",
        Landscape1792x1024 => "1792x1024",
        Portrait1024x1792 => "1024x1792",
    }
}

wire_enum! {
    ImageQuality {
        Auto => "auto",
        Low => "low",
        Medium => "medium",
        High => "high",
        Standard => "standard",
        Hd => "hd",
    }
}

wire_enum! {
    Background {
        Auto => "auto",
        Transparent => "transparent",
        Opaque => "opaque",
    }
}

wire_enum! {
    /// Whether the provider should inline base64 data or return short-lived URLs.
    ResponseFormat {
        Url => "url",
        B64Json => "b64_json",
    }
}

impl ImageSize {
    /// Requested pixel size, or `None` for `auto`.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let (width, height) = self.as_str().split_once('x')?;
        Some((width.parse().ok()?, height.parse().ok()?))
    }
}

fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(ImageError::InvalidRequest("Prompt must not be empty".to_string()));
    }
    Ok(())
}

fn validate_count(n: Option<u8>) -> Result<()> {
    match n {
        Some(n) if n == 0 || n > MAX_IMAGES_PER_REQUEST => Err(ImageError::InvalidRequest(
            format!("n must be between 1 and {}, got {}", MAX_IMAGES_PER_REQUEST, n),
        )),
        _ => Ok(()),
    }
}

fn validate_image(name: &str, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(ImageError::InvalidRequest(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn image_part(name: &str, bytes: &[u8]) -> Result<Part> {
    let format = detect_format(bytes);
    Part::bytes(bytes.to_vec())
        .file_name(format!("{}.{}", name, format.extension()))
        .mime_str(format.mime_type())
        .map_err(|e| ImageError::InvalidRequest(format!("Invalid MIME type: {}", e)))
}

// Appends each optional text field that is set
fn with_text_fields(mut form: Form, fields: Vec<(&'static str, Option<String>)>) -> Form {
    for (name, value) in fields {
        if let Some(value) = value {
            form = form.text(name, value);
        }
    }
    form
}

/// Body of `POST /images/generations`.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
pub struct GenerateRequest {
    #[builder(setter(into))]
    pub prompt: String,

    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u8>,

    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,

    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<ImageQuality>,

    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<ImageFormat>,

    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_compression: Option<u8>,

    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,

    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<()> {
        validate_prompt(&self.prompt)?;
        validate_count(self.n)?;

        if let Some(compression) = self.output_compression {
            if compression > 100 {
                return Err(ImageError::InvalidRequest(format!(
                    "output_compression must be between 0 and 100, got {}",
                    compression
                )));
            }
        }
        Ok(())
    }

    /// JSON body with `default_model` filled in when no model was chosen.
    pub fn to_body(&self, default_model: &str) -> Result<Value> {
        let mut body = serde_json::to_value(self)?;
        if let Some(object) = body.as_object_mut() {
            object
                .entry("model")
                .or_insert_with(|| Value::String(default_model.to_string()));
        }
        Ok(body)
    }
}

/// Body of `POST /images/edits`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct EditRequest {
    pub image: Vec<u8>,

    #[builder(setter(into))]
    pub prompt: String,

    /// Transparent areas mark where the image should change.
    #[builder(default, setter(strip_option))]
    pub mask: Option<Vec<u8>>,

    #[builder(default, setter(strip_option, into))]
    pub model: Option<String>,

    #[builder(default, setter(strip_option))]
    pub n: Option<u8>,

    #[builder(default, setter(strip_option))]
    pub size: Option<ImageSize>,

    #[builder(default, setter(strip_option))]
    pub quality: Option<ImageQuality>,

    #[builder(default, setter(strip_option))]
    pub output_format: Option<ImageFormat>,

    #[builder(default, setter(strip_option))]
    pub background: Option<Background>,

    #[builder(default, setter(strip_option))]
    pub response_format: Option<ResponseFormat>,

    #[builder(default, setter(strip_option, into))]
    pub user: Option<String>,
}

impl EditRequest {
    pub fn validate(&self) -> Result<()> {
        validate_image("image", &self.image)?;
        if let Some(mask) = &self.mask {
            validate_image("mask", mask)?;
        }
        validate_prompt(&self.prompt)?;
        validate_count(self.n)
    }

    /// Multipart form; rebuilt per attempt since forms are consumed on send.
    pub fn to_form(&self, default_model: &str) -> Result<Form> {
        let mut form = Form::new()
            .part("image", image_part("image", &self.image)?)
            .text("prompt", self.prompt.clone());

        if let Some(mask) = &self.mask {
            form = form.part("mask", image_part("mask", mask)?);
        }

        Ok(with_text_fields(
            form,
            vec![
                (
                    "model",
                    Some(self.model.clone().unwrap_or_else(|| default_model.to_string())),
                ),
                ("n", self.n.map(|n| n.to_string())),
                ("size", self.size.map(|s| s.to_string())),
                ("quality", self.quality.map(|q| q.to_string())),
                ("output_format", self.output_format.map(|f| f.to_string())),
                ("background", self.background.map(|b| b.to_string())),
                ("response_format", self.response_format.map(|r| r.to_string())),
                ("user", self.user.clone()),
            ],
        ))
    }
}

/// Body of `POST /images/variations`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct VariationRequest {
    pub image: Vec<u8>,

    #[builder(default, setter(strip_option, into))]
    pub model: Option<String>,

    #[builder(default, setter(strip_option))]
    pub n: Option<u8>,

    #[builder(default, setter(strip_option))]
    pub size: Option<ImageSize>,

    #[builder(default, setter(strip_option))]
    pub response_format: Option<ResponseFormat>,

    #[builder(default, setter(strip_option, into))]
    pub user: Option<String>,
}

impl VariationRequest {
    pub fn validate(&self) -> Result<()> {
        validate_image("image", &self.image)?;
        validate_count(self.n)
    }

    pub fn to_form(&self, default_model: &str) -> Result<Form> {
        let form = Form::new().part("image", image_part("image", &self.image)?);

        Ok(with_text_fields(
            form,
            vec![
                (
                    "model",
                    Some(self.model.clone().unwrap_or_else(|| default_model.to_string())),
                ),
                ("n", self.n.map(|n| n.to_string())),
                ("size", self.size.map(|s| s.to_string())),
                ("response_format", self.response_format.map(|r| r.to_string())),
                ("user", self.user.clone()),
            ],
        ))
    }
}
