//! Compliance checks for finished ID photos
//!
//! Three independent, order-insensitive checks approximate official
//! ID-photo standards: background whiteness, horizontal face centering, and
//! the overall height/width ratio. Each failure appends one human-readable
//! message; an empty report means the image is compliant.

use crate::config::ComplianceConfig;
use crate::types::{BoundingBox, ComplianceReport, FeatureSet};
use image::RgbImage;
use tracing::debug;

/// Runs the compliance rule set against a finished image
#[derive(Debug, Clone)]
pub struct ComplianceChecker {
    config: ComplianceConfig,
}

impl ComplianceChecker {
    /// Create a checker with the given thresholds
    #[must_use]
    pub fn new(config: ComplianceConfig) -> Self {
        Self { config }
    }

    /// Run every check. `features` carries the detected face when one was
    /// found; without one the centering check fails and the whiteness check
    /// samples the whole frame.
    #[must_use]
    pub fn check(&self, image: &RgbImage, features: Option<&FeatureSet>) -> ComplianceReport {
        let mut errors = Vec::new();
        let face_box = features.map(|f| f.face_box);

        if !self.background_is_white(image, face_box.as_ref()) {
            errors.push("Background colour is not white.".to_string());
        }
        if !self.face_is_centered(image.width(), face_box.as_ref()) {
            errors.push("Face is not centered in the image.".to_string());
        }
        if !self.size_is_compliant(image.width(), image.height()) {
            errors.push("Image size is not a typical ID/passport photo size.".to_string());
        }

        debug!(violations = errors.len(), "compliance checks finished");
        ComplianceReport { errors }
    }

    /// Subsampled whiteness measurement outside the face region.
    fn background_is_white(&self, image: &RgbImage, exclude: Option<&BoundingBox>) -> bool {
        let step = self.config.sample_step;
        let floor = self.config.white_floor;

        let mut total = 0usize;
        let mut non_white = 0usize;

        let mut y = 0;
        while y < image.height() {
            let mut x = 0;
            while x < image.width() {
                let in_face = exclude.is_some_and(|face| face.contains_pixel(x, y));
                if !in_face {
                    total += 1;
                    let p = image.get_pixel(x, y).0;
                    if p.iter().any(|&channel| channel < floor) {
                        non_white += 1;
                    }
                }
                x += step;
            }
            y += step;
        }

        if total == 0 {
            return true;
        }
        (non_white as f32 / total as f32) <= self.config.max_non_white_ratio
    }

    /// Horizontal face-center check; fails without a detected face.
    fn face_is_centered(&self, image_width: u32, face: Option<&BoundingBox>) -> bool {
        let Some(face) = face else {
            return false;
        };
        let image_center = f64::from(image_width) / 2.0;
        let face_center = face.center().x;
        let tolerance = f64::from(image_width) * f64::from(self.config.centering_tolerance);
        (image_center - face_center).abs() <= tolerance
    }

    /// Overall height/width ratio check.
    fn size_is_compliant(&self, width: u32, height: u32) -> bool {
        if width == 0 {
            return false;
        }
        let ratio = f64::from(height) / f64::from(width);
        ratio >= f64::from(self.config.min_height_ratio)
            && ratio <= f64::from(self.config.max_height_ratio)
    }
}
