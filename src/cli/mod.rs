//! Command-line interface for photo normalization
//!
//! Thin frontend over [`PhotoNormalizer`]: file in, file (or JSON) out.
//! Crop and compliance results print as JSON payloads shaped like the
//! hosting service's responses.

use crate::config::{
    AspectRatio, BackgroundFill, CompositeSpec, CropPolicy, NormalizerConfig, OutputFormat,
};
use crate::detection::FeatureDetector;
use crate::pipeline::PhotoNormalizer;
use crate::services::io::encode_image;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Normalize photos into compliant identification images
#[derive(Debug, Parser)]
#[command(name = "photonorm", version, about)]
pub struct Cli {
    /// Path to the SeetaFace detection model
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Verbose logging (repeat for trace level)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the face-anchored crop rectangle for a photo
    Crop {
        /// Input image path
        input: PathBuf,

        /// Target aspect ratio, as W:H or a decimal
        #[arg(long, default_value = "1:1")]
        aspect_ratio: String,
    },

    /// Replace the background (and optionally the clothing) of a photo
    Background {
        /// Input image path
        input: PathBuf,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Fill colour as #RRGGBB or r,g,b
        #[arg(long, default_value = "#FFFFFF", conflicts_with = "background")]
        colour: String,

        /// Custom background image, resized to the input dimensions
        #[arg(long)]
        background: Option<PathBuf>,

        /// Garment reference image layered over the torso
        #[arg(long)]
        clothing: Option<PathBuf>,

        /// JPEG quality for the output
        #[arg(long, default_value_t = 90)]
        quality: u8,
    },

    /// Replace the subject's clothing, keeping the original background
    Clothing {
        /// Input image path
        input: PathBuf,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Garment reference image
        #[arg(long)]
        garment: PathBuf,

        /// JPEG quality for the output
        #[arg(long, default_value_t = 90)]
        quality: u8,
    },

    /// Check a photo against the ID-photo compliance rules
    Check {
        /// Input image path
        input: PathBuf,
    },
}

/// CLI entry point
pub fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let detector = build_detector(cli.model.as_deref())?;

    match cli.command {
        Command::Crop {
            input,
            aspect_ratio,
        } => {
            let ratio: AspectRatio = aspect_ratio
                .parse()
                .with_context(|| format!("invalid aspect ratio {aspect_ratio:?}"))?;
            let config = NormalizerConfig::builder()
                .crop_policy(CropPolicy::for_ratio(ratio))
                .build()?;
            let normalizer = PhotoNormalizer::new(detector, config)?;

            let bytes = std::fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let outcome = normalizer.compute_crop_from_bytes(&bytes)?;

            let payload = serde_json::json!({
                "cropData": outcome.rect,
                "message": outcome.message.unwrap_or_else(|| {
                    "Face detected and crop calculated".to_string()
                }),
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }

        Command::Background {
            input,
            output,
            colour,
            background,
            clothing,
            quality,
        } => {
            let normalizer = PhotoNormalizer::new(detector, NormalizerConfig::default())?;

            let image = load(&input)?;
            let fill = match background {
                Some(path) => BackgroundFill::Image(load(&path)?),
                None => BackgroundFill::Color(BackgroundFill::parse_color(&colour)?),
            };
            let mut spec = CompositeSpec {
                fill,
                garment: None,
            };
            if let Some(path) = clothing {
                spec = spec.garment(load(&path)?);
            }

            let result = normalizer.replace_background(&image, &spec)?;
            write_encoded(&result, &output, quality)?;
            println!("wrote {}", output.display());
        }

        Command::Clothing {
            input,
            output,
            garment,
            quality,
        } => {
            let normalizer = PhotoNormalizer::new(detector, NormalizerConfig::default())?;
            let image = load(&input)?;
            let garment = load(&garment)?;

            let result = normalizer.replace_clothing(&image, &garment)?;
            write_encoded(&result, &output, quality)?;
            println!("wrote {}", output.display());
        }

        Command::Check { input } => {
            let normalizer = PhotoNormalizer::new(detector, NormalizerConfig::default())?;
            let bytes = std::fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let report = normalizer.check_compliance_from_bytes(&bytes)?;

            let payload = serde_json::json!({
                "compliant": report.compliant(),
                "errors": report.errors,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "photonorm=info",
        1 => "photonorm=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(feature = "rustface")]
fn build_detector(model: Option<&Path>) -> anyhow::Result<Arc<dyn FeatureDetector>> {
    let Some(path) = model else {
        bail!("--model is required: pass the path to a SeetaFace detection model");
    };
    let detector = crate::detection::RustfaceDetector::from_model_file(path)?;
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "rustface"))]
fn build_detector(_model: Option<&Path>) -> anyhow::Result<Arc<dyn FeatureDetector>> {
    bail!("this build has no detection backend; rebuild with the `rustface` feature")
}

fn load(path: &Path) -> anyhow::Result<image::DynamicImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(crate::services::io::decode_image(&bytes)?)
}

fn write_encoded(image: &image::RgbImage, path: &Path, quality: u8) -> anyhow::Result<()> {
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => OutputFormat::Png,
        _ => OutputFormat::Jpeg,
    };
    let bytes = encode_image(image, format, quality)?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_crop_command() {
        let cli = Cli::try_parse_from([
            "photonorm",
            "--model",
            "model.bin",
            "crop",
            "photo.jpg",
            "--aspect-ratio",
            "35:45",
        ])
        .unwrap();
        match cli.command {
            Command::Crop { aspect_ratio, .. } => assert_eq!(aspect_ratio, "35:45"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_colour_with_custom_background() {
        let result = Cli::try_parse_from([
            "photonorm",
            "background",
            "photo.jpg",
            "-o",
            "out.jpg",
            "--colour",
            "#FF0000",
            "--background",
            "bg.jpg",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_check_command() {
        let cli = Cli::try_parse_from(["photonorm", "check", "photo.jpg"]).unwrap();
        assert!(matches!(cli.command, Command::Check { .. }));
    }
}
