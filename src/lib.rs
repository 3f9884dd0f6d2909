#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # photonorm
//!
//! Photo normalization for identification and passport images: locates a
//! subject's face, computes an aspect-exact crop with standardized head
//! placement, replaces the background or clothing via foreground
//! segmentation and compositing, and verifies the result against ID-photo
//! compliance rules.
//!
//! ## Features
//!
//! - **Face-anchored cropping**: weighted eye/nose anchoring, the ID-photo
//!   eye-line convention, two-phase boundary clamping, and a graceful
//!   center-crop fallback when nothing is detected
//! - **Foreground segmentation**: iterative trimap refinement with
//!   morphological cleanup at hair and fabric edges
//! - **Compositing**: solid or custom backgrounds, plus garment layering
//!   with stretch and gap-alignment heuristics
//! - **Compliance checking**: background whiteness, face centering, and
//!   size-ratio rules with human-readable violations
//! - **Pluggable detection**: the face/eye/nose capability sits behind the
//!   [`FeatureDetector`] trait; a SeetaFace backend ships behind the
//!   `rustface` feature
//! - **CLI integration**: optional command-line interface (enable with the
//!   `cli` feature)
//!
//! ## Quick Start
//!
//! ```no_run
//! use photonorm::{
//!     AspectRatio, CropPolicy, NormalizerConfig, PhotoNormalizer, RustfaceDetector,
//! };
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Load the detection model once at startup; the normalizer shares it
//!     // read-only across requests.
//!     let detector = Arc::new(RustfaceDetector::from_model_file("seeta_fd_frontal_v1.0.bin")?);
//!
//!     let config = NormalizerConfig::builder()
//!         .crop_policy(CropPolicy::for_ratio(AspectRatio::ID_PHOTO))
//!         .build()?;
//!     let normalizer = PhotoNormalizer::new(detector, config)?;
//!
//!     let bytes = std::fs::read("photo.jpg")?;
//!     let outcome = normalizer.compute_crop_from_bytes(&bytes)?;
//!     println!("crop rectangle: {:?}", outcome.rect);
//!
//!     let report = normalizer.check_compliance_from_bytes(&bytes)?;
//!     println!("compliant: {}", report.compliant());
//!     Ok(())
//! }
//! ```
//!
//! ## Library vs CLI Usage
//!
//! All core functionality is available as a library; the `cli` feature adds
//! the `photonorm` binary. To use only the library without CLI
//! dependencies:
//!
//! ```toml
//! [dependencies]
//! photonorm = { version = "0.2", default-features = false, features = ["rustface"] }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod compliance;
pub mod compositor;
pub mod config;
pub mod crop;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod segmentation;
pub mod services;
pub mod types;

// Public API exports
pub use compliance::ComplianceChecker;
pub use compositor::Compositor;
pub use config::{
    AnchorStrategy, AspectRatio, BackgroundFill, ComplianceConfig, CompositeSpec, CropPolicy,
    Expansion, GarmentPolicy, NormalizerConfig, NormalizerConfigBuilder, OutputFormat,
    SegmentationConfig,
};
pub use crop::{center_quarter, compute_crop};
pub use detection::{DetectionParams, FeatureDetector, FeatureExtractor};
pub use error::{PhotoNormError, Result};
pub use pipeline::{CropOutcome, PhotoNormalizer};
pub use segmentation::ForegroundSegmenter;
pub use services::{decode_image, encode_image};
pub use types::{
    BoundingBox, ComplianceReport, CropRect, FeatureSet, Mask, MaskStatistics, Point,
};

#[cfg(feature = "rustface")]
pub use detection::RustfaceDetector;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_compiles() {
        // Basic compilation test to ensure the API surface is well-formed
        let _config = NormalizerConfig::default();
        let _ratio = AspectRatio::ID_PHOTO;
    }
}
