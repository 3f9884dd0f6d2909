//! Unified photo normalization processor
//!
//! [`PhotoNormalizer`] consolidates the business logic for every operation:
//! crop geometry, background and clothing replacement, and compliance
//! checking. Both CLI and web frontends drive this one type so behavior
//! stays consistent.
//!
//! The detection backend is injected once at construction — together with
//! whatever model assets it needs — and shared read-only across requests;
//! every operation is a pure synchronous function over one in-memory image.

use crate::compliance::ComplianceChecker;
use crate::compositor::Compositor;
use crate::config::{CompositeSpec, NormalizerConfig};
use crate::crop::{center_quarter, compute_crop};
use crate::detection::{FeatureDetector, FeatureExtractor};
use crate::error::{PhotoNormError, Result};
use crate::segmentation::ForegroundSegmenter;
use crate::services::io::decode_image;
use crate::types::{ComplianceReport, CropRect, FeatureSet};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of a crop computation
#[derive(Debug, Clone)]
pub struct CropOutcome {
    /// The crop rectangle to apply
    pub rect: CropRect,

    /// The landmarks the rectangle was derived from; `None` when the
    /// center-quarter fallback was used
    pub features: Option<FeatureSet>,

    /// Explanatory message for degraded results
    pub message: Option<String>,
}

impl CropOutcome {
    /// Whether the no-detection fallback produced this rectangle
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.features.is_none()
    }
}

/// High-level photo normalization operations over an injected detection
/// backend.
///
/// # Examples
///
/// ```no_run
/// use photonorm::{NormalizerConfig, PhotoNormalizer, RustfaceDetector};
/// use std::sync::Arc;
///
/// fn main() -> anyhow::Result<()> {
///     let detector = Arc::new(RustfaceDetector::from_model_file("seeta_fd_frontal_v1.0.bin")?);
///     let normalizer = PhotoNormalizer::new(detector, NormalizerConfig::default())?;
///
///     let bytes = std::fs::read("photo.jpg")?;
///     let outcome = normalizer.compute_crop_from_bytes(&bytes)?;
///     println!("crop: {:?}", outcome.rect);
///     Ok(())
/// }
/// ```
pub struct PhotoNormalizer {
    extractor: FeatureExtractor,
    segmenter: ForegroundSegmenter,
    compositor: Compositor,
    checker: ComplianceChecker,
    config: NormalizerConfig,
}

impl PhotoNormalizer {
    /// Create a normalizer over the given detection backend.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoNormError::InvalidConfig`] when the configuration
    /// fails validation.
    pub fn new(detector: Arc<dyn FeatureDetector>, config: NormalizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: FeatureExtractor::new(detector),
            segmenter: ForegroundSegmenter::new(config.segmentation),
            compositor: Compositor::new(config.garment),
            checker: ComplianceChecker::new(config.compliance),
            config,
        })
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Compute the crop rectangle for the photo's subject.
    ///
    /// Degrades gracefully: when no face is detected the exact center
    /// quarter of the image is returned together with a message, so crop
    /// requests always produce a usable rectangle.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn compute_crop(&self, image: &DynamicImage) -> Result<CropOutcome> {
        let rgb = image.to_rgb8();
        match self.extractor.extract(&rgb) {
            Ok(features) => {
                let rect = compute_crop(rgb.width(), rgb.height(), &features, &self.config.crop)?;
                info!(?rect, "face detected and crop calculated");
                Ok(CropOutcome {
                    rect,
                    features: Some(features),
                    message: None,
                })
            }
            Err(PhotoNormError::NoSubjectDetected) => {
                info!("no faces detected, using center of image");
                Ok(CropOutcome {
                    rect: center_quarter(rgb.width(), rgb.height()),
                    features: None,
                    message: Some("No face detected, using default center crop".to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the background behind the subject per the composite spec,
    /// layering the garment over the torso when one is supplied and enough
    /// torso is visible.
    ///
    /// # Errors
    ///
    /// Unlike cropping there is no safe default subject region, so
    /// [`PhotoNormError::NoSubjectDetected`] is surfaced as a hard error.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn replace_background(
        &self,
        image: &DynamicImage,
        spec: &CompositeSpec,
    ) -> Result<RgbImage> {
        let rgb = image.to_rgb8();
        let features = self.extractor.extract(&rgb)?;
        self.compositor
            .replace_background(&rgb, &features, spec, &self.segmenter)
    }

    /// Replace the subject's clothing in place with the garment reference,
    /// leaving the original background untouched.
    #[instrument(skip_all)]
    pub fn replace_clothing(
        &self,
        image: &DynamicImage,
        garment: &DynamicImage,
    ) -> Result<RgbImage> {
        let rgb = image.to_rgb8();
        let features = self.extractor.extract(&rgb)?;
        self.compositor
            .replace_clothing(&rgb, &features, garment, &self.segmenter)
    }

    /// Run the compliance checks. A missing face is reported as a centering
    /// violation rather than an error.
    #[instrument(skip_all)]
    pub fn check_compliance(&self, image: &DynamicImage) -> ComplianceReport {
        let rgb = image.to_rgb8();
        let features = self.extractor.extract(&rgb).ok();
        self.checker.check(&rgb, features.as_ref())
    }

    /// [`Self::compute_crop`] over encoded image bytes
    pub fn compute_crop_from_bytes(&self, bytes: &[u8]) -> Result<CropOutcome> {
        self.compute_crop(&decode_image(bytes)?)
    }

    /// [`Self::replace_background`] over encoded image bytes
    pub fn replace_background_from_bytes(
        &self,
        bytes: &[u8],
        spec: &CompositeSpec,
    ) -> Result<RgbImage> {
        self.replace_background(&decode_image(bytes)?, spec)
    }

    /// [`Self::replace_clothing`] over encoded image bytes
    pub fn replace_clothing_from_bytes(
        &self,
        bytes: &[u8],
        garment_bytes: &[u8],
    ) -> Result<RgbImage> {
        self.replace_clothing(&decode_image(bytes)?, &decode_image(garment_bytes)?)
    }

    /// [`Self::check_compliance`] over encoded image bytes
    pub fn check_compliance_from_bytes(&self, bytes: &[u8]) -> Result<ComplianceReport> {
        Ok(self.check_compliance(&decode_image(bytes)?))
    }
}
