// ABOUTME: This module saves decoded images to disk and formats the run summary
// ABOUTME: It provides table formatting with color support and a JSON formatter

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use gpt_image_sdk::ImageResult;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::{Table, Tabled};

const MAX_NAME_ATTEMPTS: usize = 1000;

/// One image written to disk by a CLI command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedImage {
    pub path: PathBuf,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

impl SavedImage {
    fn from_result(path: PathBuf, result: &ImageResult) -> Self {
        Self {
            path,
            format: result.format().to_string(),
            width: result.width(),
            height: result.height(),
            bytes: result.len(),
            request_id: result.provider_request_id().to_string(),
            revised_prompt: result.revised_prompt().map(str::to_string),
        }
    }
}

/// File name for the `index`th image of a command run started at `timestamp`.
pub fn image_file_name(
    command: &str,
    timestamp: DateTime<Utc>,
    index: usize,
    result: &ImageResult,
) -> String {
    format!(
        "{}-{}-{}.{}",
        command,
        timestamp.format("%Y%m%d-%H%M%S"),
        index + 1,
        result.format().extension()
    )
}

/// Write every result into `dir`, creating it if needed. Existing files are
/// never overwritten; a clashing name gets a numeric suffix instead.
pub fn save_images(results: &[ImageResult], dir: &Path, command: &str) -> Result<Vec<SavedImage>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let timestamp = Utc::now();
    let mut saved = Vec::with_capacity(results.len());

    for (index, result) in results.iter().enumerate() {
        let name = image_file_name(command, timestamp, index, result);
        let (path, mut file) = create_unique(dir, &name)?;
        file.write_all(result.bytes())
            .with_context(|| format!("Failed to write image: {}", path.display()))?;
        log::debug!("Saved {} bytes to {}", result.len(), path.display());
        saved.push(SavedImage::from_result(path, result));
    }

    Ok(saved)
}

// Tries `name`, then `stem-2.ext`, `stem-3.ext`, ... until a new file can be created
fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    let (stem, extension) = name.rsplit_once('.').unwrap_or((name, ""));

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = match (attempt, extension.is_empty()) {
            (1, _) => name.to_string(),
            (_, true) => format!("{}-{}", stem, attempt),
            (_, false) => format!("{}-{}.{}", stem, attempt, extension),
        };
        let path = dir.join(candidate);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to create image file: {}", path.display()));
            }
        }
    }

    Err(anyhow!(
        "Could not find a free file name for {} in {}",
        name,
        dir.display()
    ))
}

pub trait OutputFormat {
    fn format_images(&self, images: &[SavedImage]) -> Result<String>;
}

pub struct TableFormatter {
    use_color: bool,
}

impl TableFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn format_path(&self, path: &Path) -> String {
        let text = path.display().to_string();
        if self.use_color {
            text.cyan().to_string()
        } else {
            text
        }
    }

    fn format_request_id(&self, request_id: &str) -> String {
        let text = if request_id.is_empty() { "-" } else { request_id };

        if self.use_color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn format_size(bytes: usize) -> String {
        if bytes >= 1024 * 1024 {
            format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
        } else if bytes >= 1024 {
            format!("{:.1} KiB", bytes as f64 / 1024.0)
        } else {
            format!("{} B", bytes)
        }
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormat for JsonFormatter {
    fn format_images(&self, images: &[SavedImage]) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(images)?)
        } else {
            Ok(serde_json::to_string(images)?)
        }
    }
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "Dimensions")]
    dimensions: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Request ID")]
    request_id: String,
}

impl OutputFormat for TableFormatter {
    fn format_images(&self, images: &[SavedImage]) -> Result<String> {
        let rows: Vec<TableRow> = images
            .iter()
            .map(|image| TableRow {
                file: self.format_path(&image.path),
                format: image.format.clone(),
                dimensions: format!("{}x{}", image.width, image.height),
                size: Self::format_size(image.bytes),
                request_id: self.format_request_id(&image.request_id),
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::psql());
        Ok(table.to_string())
    }
}
