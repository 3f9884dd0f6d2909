//! Facial feature detection
//!
//! Detection itself is a commodity capability consumed through the
//! [`FeatureDetector`] trait; this module owns everything built on top of the
//! raw boxes: the parameter retry ladder, largest-face selection, and the
//! adaptation of eye/nose boxes into a canonical [`FeatureSet`].

#[cfg(feature = "rustface")]
pub mod rustface_backend;

use crate::error::{PhotoNormError, Result};
use crate::types::{BoundingBox, FeatureSet, Point};
use image::{imageops, GrayImage, RgbImage};
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;

/// Cascade-style detection parameters for one attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Pyramid scale factor between detection scales
    pub scale_factor: f32,
    /// Minimum neighboring detections required to accept a box
    pub min_neighbors: u32,
    /// Minimum face box side length in pixels
    pub min_size: u32,
}

impl DetectionParams {
    /// Strict first attempt
    #[must_use]
    pub fn strict() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 30,
        }
    }

    /// Relaxed second attempt
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            scale_factor: 1.2,
            min_neighbors: 3,
            min_size: 20,
        }
    }

    /// Most lenient final attempt before giving up
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            scale_factor: 1.2,
            min_neighbors: 2,
            min_size: 15,
        }
    }

    /// The full retry ladder, strictest first
    #[must_use]
    pub fn ladder() -> [Self; 3] {
        [Self::strict(), Self::relaxed(), Self::lenient()]
    }
}

/// Pluggable face/eye/nose detection backend.
///
/// Implementations receive a row-major grayscale raster. Eye and nose
/// detection are optional capabilities: backends without them keep the
/// default empty implementations and the adapter falls back to its
/// documented estimates.
pub trait FeatureDetector: Send + Sync {
    /// Detect face bounding boxes in the full image
    fn detect_faces(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<BoundingBox>;

    /// Detect eye boxes within the given face region
    fn detect_eyes(&self, _gray: &GrayImage, _region: &BoundingBox) -> Vec<BoundingBox> {
        Vec::new()
    }

    /// Detect nose boxes within the given face region
    fn detect_nose(&self, _gray: &GrayImage, _region: &BoundingBox) -> Vec<BoundingBox> {
        Vec::new()
    }
}

/// Pick the largest box by area; ties keep the first encountered.
#[must_use]
pub(crate) fn largest_box(boxes: &[BoundingBox]) -> Option<BoundingBox> {
    let mut best: Option<BoundingBox> = None;
    for candidate in boxes {
        match best {
            Some(current) if candidate.area() <= current.area() => {}
            _ => best = Some(*candidate),
        }
    }
    best
}

/// Normalizes raw detector output into a [`FeatureSet`].
///
/// Runs the detection retry ladder, selects the largest face, and derives
/// the eye and nose midpoints (with estimates where the backend provides
/// neither).
#[derive(Clone)]
pub struct FeatureExtractor {
    detector: Arc<dyn FeatureDetector>,
}

impl FeatureExtractor {
    /// Create an extractor over the given detection backend
    #[must_use]
    pub fn new(detector: Arc<dyn FeatureDetector>) -> Self {
        Self { detector }
    }

    /// Extract the canonical feature set for the largest face in `image`.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoNormError::NoSubjectDetected`] when the full retry
    /// ladder finds no face.
    pub fn extract(&self, image: &RgbImage) -> Result<FeatureSet> {
        let gray = imageops::grayscale(image);

        let mut faces = Vec::new();
        for (attempt, params) in DetectionParams::ladder().iter().enumerate() {
            faces = self.detector.detect_faces(&gray, params);
            if !faces.is_empty() {
                debug!(attempt, count = faces.len(), "face detection succeeded");
                break;
            }
            debug!(
                attempt,
                min_neighbors = params.min_neighbors,
                min_size = params.min_size,
                "no faces, retrying with relaxed parameters"
            );
        }

        let face_box = largest_box(&faces).ok_or(PhotoNormError::NoSubjectDetected)?;

        let eyes_midpoint = self.eyes_midpoint(&gray, &face_box);
        let nose_midpoint = self.nose_midpoint(&gray, &face_box);

        Ok(FeatureSet {
            face_box,
            eyes_midpoint,
            nose_midpoint,
        })
    }

    /// Mean of all detected eye-box centers; requires at least two boxes.
    fn eyes_midpoint(&self, gray: &GrayImage, face_box: &BoundingBox) -> Option<Point> {
        let eyes = self.detector.detect_eyes(gray, face_box);
        if eyes.len() < 2 {
            return None;
        }
        let (sum_x, sum_y) = eyes.iter().fold((0.0, 0.0), |(sx, sy), b| {
            let c = b.center();
            (sx + c.x, sy + c.y)
        });
        let n = eyes.len() as f64;
        Some(Point {
            x: sum_x / n,
            y: sum_y / n,
        })
    }

    /// Center of the largest detected nose box, or the 55%-height estimate.
    fn nose_midpoint(&self, gray: &GrayImage, face_box: &BoundingBox) -> Point {
        let noses = self.detector.detect_nose(gray, face_box);
        match largest_box(&noses) {
            Some(nose) => nose.center(),
            None => FeatureSet::from_face_box(*face_box).nose_midpoint,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// Deterministic backend returning pre-configured boxes.
    pub struct StaticDetector {
        pub faces: Vec<BoundingBox>,
        pub eyes: Vec<BoundingBox>,
        pub noses: Vec<BoundingBox>,
        /// Fail this many leading ladder attempts before returning faces
        pub fail_attempts: std::sync::atomic::AtomicUsize,
    }

    impl StaticDetector {
        pub fn faces(faces: Vec<BoundingBox>) -> Self {
            Self {
                faces,
                eyes: Vec::new(),
                noses: Vec::new(),
                fail_attempts: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        pub fn empty() -> Self {
            Self::faces(Vec::new())
        }
    }

    impl FeatureDetector for StaticDetector {
        fn detect_faces(&self, _gray: &GrayImage, _params: &DetectionParams) -> Vec<BoundingBox> {
            use std::sync::atomic::Ordering;
            if self.fail_attempts.load(Ordering::SeqCst) > 0 {
                self.fail_attempts.fetch_sub(1, Ordering::SeqCst);
                return Vec::new();
            }
            self.faces.clone()
        }

        fn detect_eyes(&self, _gray: &GrayImage, _region: &BoundingBox) -> Vec<BoundingBox> {
            self.eyes.clone()
        }

        fn detect_nose(&self, _gray: &GrayImage, _region: &BoundingBox) -> Vec<BoundingBox> {
            self.noses.clone()
        }
    }
}
