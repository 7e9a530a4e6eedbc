// ABOUTME: Main entry point for the gpt-image CLI application
// ABOUTME: Generates, edits, and varies images through the OpenAI image API and saves them locally

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gpt_image_cli::config::Config;
use gpt_image_cli::output::{JsonFormatter, OutputFormat, TableFormatter, save_images};
use gpt_image_sdk::{
    Background, EditRequest, GenerateRequest, ImageError, ImageFormat, ImageQuality,
    ImageResult, ImageSize, VariationRequest,
};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use secrecy::SecretString;
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "gpt-image")]
#[command(about = "Generate and edit images with the OpenAI image API", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Read configuration from this file instead of the standard locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Directory to write images into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output the summary as JSON
    #[arg(long)]
    json: bool,

    /// Pretty print JSON output
    #[arg(long, requires = "json")]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate images from a text prompt
    Generate {
        /// Text description of the image
        prompt: String,

        /// Number of images returned by a single request
        #[arg(short = 'n', conflicts_with = "batch")]
        n: Option<u8>,

        /// Run this many single-image requests one after another
        #[arg(long)]
        batch: Option<usize>,

        /// Model to use (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Image size, e.g. 1024x1024, 1536x1024 or auto
        #[arg(long)]
        size: Option<ImageSize>,

        /// Rendering quality
        #[arg(long)]
        quality: Option<ImageQuality>,

        /// Output format: png, jpeg or webp
        #[arg(long)]
        format: Option<ImageFormat>,

        /// Background: auto, transparent or opaque
        #[arg(long)]
        background: Option<Background>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Edit an existing image using a text prompt
    Edit {
        /// Image to edit
        image: PathBuf,

        /// Description of the change
        prompt: String,

        /// Mask whose transparent areas mark the region to edit
        #[arg(long)]
        mask: Option<PathBuf>,

        /// Number of edited images
        #[arg(short = 'n')]
        n: Option<u8>,

        /// Model to use (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Image size, e.g. 1024x1024 or auto
        #[arg(long)]
        size: Option<ImageSize>,

        /// Rendering quality
        #[arg(long)]
        quality: Option<ImageQuality>,

        /// Output format: png, jpeg or webp
        #[arg(long)]
        format: Option<ImageFormat>,

        /// Background: auto, transparent or opaque
        #[arg(long)]
        background: Option<Background>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Create variations of an existing image
    Variations {
        /// Source image
        image: PathBuf,

        /// Number of variations
        #[arg(short = 'n')]
        n: Option<u8>,

        /// Image size: 256x256, 512x512 or 1024x1024
        #[arg(long)]
        size: Option<ImageSize>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Generate { .. } => "generate",
            Commands::Edit { .. } => "edit",
            Commands::Variations { .. } => "variations",
        }
    }

    fn output(&self) -> &OutputArgs {
        match self {
            Commands::Generate { output, .. }
            | Commands::Edit { output, .. }
            | Commands::Variations { output, .. } => output,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Determine if color should be used
    let use_color = !cli.no_color
        && env::var("NO_COLOR").is_err()
        && env::var("TERM").unwrap_or_default() != "dumb";

    if let Err(err) = run(cli, use_color).await {
        report_error(&err, use_color);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, use_color: bool) -> Result<()> {
    let api_key = match env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => SecretString::new(key.into_boxed_str()),
        _ => {
            eprintln!("Error: No OPENAI_API_KEY environment variable found");
            eprintln!();
            eprintln!("Please set your OpenAI API key:");
            eprintln!("export OPENAI_API_KEY=sk-xxxxx");
            eprintln!();
            eprintln!("Get your API key from: https://platform.openai.com/api-keys");
            std::process::exit(1);
        }
    };

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };
    log::debug!("Loaded configuration: {:?}", config);

    let client = config.build_client(api_key)?;
    let command_name = cli.command.name();
    let output = cli.command.output().clone();

    let results = match cli.command {
        Commands::Generate {
            prompt,
            n,
            batch,
            model,
            size,
            quality,
            format,
            background,
            ..
        } => {
            let mut request = GenerateRequest::builder().prompt(prompt).build();
            request.model = model;
            request.n = n;
            request.size = size.or(config.size);
            request.quality = quality.or(config.quality);
            request.output_format = format.or(config.output_format);
            request.background = background;

            let spinner = spinner("Generating");
            let results = match batch {
                Some(count) => client.generate_batch(&request, count).await,
                None if n.unwrap_or(1) > 1 => client.generate_many(&request).await,
                None => client.generate(&request).await.map(|result| vec![result]),
            };
            finish(spinner);
            results?
        }
        Commands::Edit {
            image,
            prompt,
            mask,
            n,
            model,
            size,
            quality,
            format,
            background,
            ..
        } => {
            let mut request = EditRequest::builder()
                .image(read_image(&image)?)
                .prompt(prompt)
                .build();
            request.mask = mask.as_deref().map(read_image).transpose()?;
            request.model = model;
            request.n = n;
            request.size = size.or(config.size);
            request.quality = quality.or(config.quality);
            request.output_format = format.or(config.output_format);
            request.background = background;

            let spinner = spinner("Editing");
            let results = if n.unwrap_or(1) > 1 {
                client.edit_many(&request).await
            } else {
                client.edit(&request).await.map(|result| vec![result])
            };
            finish(spinner);
            results?
        }
        Commands::Variations { image, n, size, .. } => {
            let mut request = VariationRequest::builder()
                .image(read_image(&image)?)
                .build();
            request.n = n;
            request.size = size;

            let spinner = spinner("Creating variations");
            let results = client.create_variations(&request).await;
            finish(spinner);
            results?
        }
    };

    print_summary(&results, &config, &output, command_name, use_color)
}

fn print_summary(
    results: &[ImageResult],
    config: &Config,
    output: &OutputArgs,
    command: &str,
    use_color: bool,
) -> Result<()> {
    let dir = output.output_dir.clone().unwrap_or_else(|| config.output_dir());
    let saved = save_images(results, &dir, command)?;

    let summary = if output.json {
        JsonFormatter::new(output.pretty).format_images(&saved)?
    } else {
        TableFormatter::new(use_color).format_images(&saved)?
    };
    println!("{}", summary);

    if !output.json {
        for prompt in saved.iter().filter_map(|image| image.revised_prompt.as_deref()) {
            println!("Revised prompt: {}", prompt);
        }
    }
    Ok(())
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))
}

fn spinner(message: &str) -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish(spinner: Option<ProgressBar>) {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

fn report_error(err: &anyhow::Error, use_color: bool) {
    let label = if use_color {
        "Error:".red().bold().to_string()
    } else {
        "Error:".to_string()
    };
    eprintln!("{} {:#}", label, err);

    if let Some(image_error) = err.downcast_ref::<ImageError>() {
        if let Some(request_id) = image_error.request_id() {
            eprintln!("Request ID: {}", request_id);
        }
        if let Some(help) = image_error.help_text() {
            eprintln!();
            eprintln!("{}", help);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_parses_typed_options() {
        let cli = Cli::try_parse_from([
            "gpt-image",
            "generate",
            "a lighthouse at dusk",
            "-n",
            "2",
            "--size",
            "1536x1024",
            "--quality",
            "high",
            "--format",
            "jpg",
        ])
        .unwrap();

        match cli.command {
            Commands::Generate {
                prompt,
                n,
                size,
                quality,
                format,
                ..
            } => {
                assert_eq!(prompt, "a lighthouse at dusk");
                assert_eq!(n, Some(2));
                assert_eq!(size, Some(ImageSize::Landscape1536x1024));
                assert_eq!(quality, Some(ImageQuality::High));
                assert_eq!(format, Some(ImageFormat::Jpeg));
            }
            _ => panic!("Expected generate command"),
        }
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        let result = Cli::try_parse_from(["gpt-image", "generate", "x", "--size", "100x100"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_conflicts_with_n() {
        let result =
            Cli::try_parse_from(["gpt-image", "generate", "x", "-n", "2", "--batch", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pretty_requires_json() {
        let result = Cli::try_parse_from(["gpt-image", "variations", "in.png", "--pretty"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gpt-image",
            "edit",
            "in.png",
            "add a hat",
            "--mask",
            "mask.png",
            "--no-color",
            "--config",
            "custom.toml",
        ])
        .unwrap();

        assert!(cli.no_color);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(cli.command.name(), "edit");
    }
}
