//! Built-in SeetaFace-based detection backend (feature `rustface`).
//!
//! Provides face boxes only; eye and nose detection stay on the trait's
//! default empty implementations, so the adapter's documented fallbacks
//! apply. Model bytes are supplied by the host at startup — the library
//! never resolves asset paths itself.

use crate::detection::{DetectionParams, FeatureDetector};
use crate::error::{PhotoNormError, Result};
use crate::types::BoundingBox;
use image::GrayImage;
use std::path::Path;

/// Face detector backed by the `rustface` crate (SeetaFace engine).
pub struct RustfaceDetector {
    model: rustface::Model,
}

impl std::fmt::Debug for RustfaceDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustfaceDetector").finish_non_exhaustive()
    }
}

impl RustfaceDetector {
    /// Create a detector from raw SeetaFace model bytes.
    pub fn from_model_bytes(bytes: &[u8]) -> Result<Self> {
        let model = rustface::read_model(std::io::Cursor::new(bytes))
            .map_err(|e| PhotoNormError::model(format!("failed to load SeetaFace model: {e}")))?;
        Ok(Self { model })
    }

    /// Create a detector from a SeetaFace model file.
    pub fn from_model_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            PhotoNormError::model(format!(
                "failed to read model file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_model_bytes(&bytes)
    }
}

impl FeatureDetector for RustfaceDetector {
    fn detect_faces(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<BoundingBox> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());

        // Map the cascade-style knobs onto the SeetaFace engine: the minimum
        // box side carries over directly, the pyramid shrink factor is the
        // inverse of the cascade scale step, and min-neighbors becomes the
        // score threshold (stricter → higher).
        detector.set_min_face_size(params.min_size);
        detector.set_score_thresh(f64::from(params.min_neighbors));
        detector.set_pyramid_scale_factor(1.0 / params.scale_factor);
        detector.set_slide_window_step(4, 4);

        let (width, height) = gray.dimensions();
        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                BoundingBox::from_signed(
                    i64::from(bbox.x()),
                    i64::from(bbox.y()),
                    i64::from(bbox.width()),
                    i64::from(bbox.height()),
                    width,
                    height,
                )
            })
            .collect()
    }
}
