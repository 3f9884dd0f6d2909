//! Face-anchored crop geometry
//!
//! Turns a detected [`FeatureSet`] and a [`CropPolicy`] into a bounded,
//! aspect-exact [`CropRect`]. Crop dimensions snap to whole multiples of the
//! reduced aspect rational, so the returned rectangle matches the requested
//! ratio exactly whenever the image can fit one ratio unit.

use crate::config::{AnchorStrategy, CropPolicy};
use crate::error::{PhotoNormError, Result};
use crate::types::{CropRect, FeatureSet, Point};
use tracing::debug;

/// Horizontal anchor weight carried by the nose midpoint (eyes carry the
/// remainder). The nose tracks the facial midline better than the eye mean.
const NOSE_HORIZONTAL_WEIGHT: f64 = 0.6;

/// Vertical anchor weight carried by the eyes midpoint (nose carries the
/// remainder).
const EYES_VERTICAL_WEIGHT: f64 = 0.6;

/// Compute the crop rectangle for the detected subject.
///
/// The rectangle is fully contained in the image and its aspect ratio
/// matches `policy.aspect_ratio` within `1e-3`.
///
/// # Errors
///
/// Returns [`PhotoNormError::InvalidConfig`] for a zero-sized image or an
/// invalid policy.
pub fn compute_crop(
    image_width: u32,
    image_height: u32,
    features: &FeatureSet,
    policy: &CropPolicy,
) -> Result<CropRect> {
    if image_width == 0 || image_height == 0 {
        return Err(PhotoNormError::invalid_config(
            "image dimensions must be non-zero",
        ));
    }
    policy.validate()?;

    let anchor = anchor_point(features, policy.anchor_strategy);
    let (v_ref, line) = vertical_reference(features, policy);

    let num = policy.aspect_ratio.width_units();
    let den = policy.aspect_ratio.height_units();

    // Crop height scales off the face height; snap to the ratio grid.
    let target_height = f64::from(features.face_box.height) * f64::from(policy.margin_factor);
    let units = ((target_height / f64::from(den)).round() as u32).max(1);

    let rect = place_and_clamp(units, num, den, anchor, v_ref, line, image_width, image_height);
    if rect.contains_box(&features.face_box) {
        return Ok(rect);
    }

    // The face spills out of the crop: grow by the containment padding and
    // run placement and clamping once more.
    let padded = ((f64::from(units) * (1.0 + f64::from(policy.containment_padding))).ceil()
        as u32)
        .max(units + 1);
    debug!(units, padded, "crop did not contain face box, re-expanding");
    let rect = place_and_clamp(padded, num, den, anchor, v_ref, line, image_width, image_height);
    Ok(rect)
}

/// The default crop used by every entry point when no face is detected:
/// the center quarter of the image.
#[must_use]
pub fn center_quarter(image_width: u32, image_height: u32) -> CropRect {
    CropRect {
        x: image_width / 4,
        y: image_height / 4,
        width: image_width / 2,
        height: image_height / 2,
    }
}

/// Derive the anchor point from the landmarks per the policy strategy.
fn anchor_point(features: &FeatureSet, strategy: AnchorStrategy) -> Point {
    match strategy {
        AnchorStrategy::FaceCentroid => features.face_box.center(),
        AnchorStrategy::EyeNoseWeighted => {
            let nose = features.nose_midpoint;
            match features.eyes_midpoint {
                Some(eyes) => Point {
                    x: (1.0 - NOSE_HORIZONTAL_WEIGHT) * eyes.x + NOSE_HORIZONTAL_WEIGHT * nose.x,
                    y: EYES_VERTICAL_WEIGHT * eyes.y + (1.0 - EYES_VERTICAL_WEIGHT) * nose.y,
                },
                None => Point {
                    x: nose.x,
                    y: (nose.y + features.face_box.center().y) / 2.0,
                },
            }
        }
    }
}

/// The vertical landmark and the fraction of crop height it should sit at.
fn vertical_reference(features: &FeatureSet, policy: &CropPolicy) -> (f64, f64) {
    match policy.anchor_strategy {
        AnchorStrategy::FaceCentroid => (features.face_box.center().y, 0.5),
        AnchorStrategy::EyeNoseWeighted => match features.eyes_midpoint {
            Some(eyes) => (eyes.y, f64::from(policy.eye_line)),
            None => (features.nose_midpoint.y, f64::from(policy.nose_line)),
        },
    }
}

/// Size the crop at `units` ratio multiples and fit it into the image.
///
/// Phase one translates an out-of-bounds rectangle back inside without
/// resizing; phase two shrinks to the largest ratio multiple that fits and
/// re-centers on the anchor.
#[allow(clippy::too_many_arguments)]
fn place_and_clamp(
    units: u32,
    num: u32,
    den: u32,
    anchor: Point,
    v_ref: f64,
    line: f64,
    image_width: u32,
    image_height: u32,
) -> CropRect {
    let mut width = units.saturating_mul(num);
    let mut height = units.saturating_mul(den);

    let mut shrunk = false;
    if width > image_width || height > image_height {
        let fit_units = (image_width / num).min(image_height / den).max(1);
        width = fit_units * num;
        height = fit_units * den;
        shrunk = true;
    }

    // Only reachable when the image is smaller than a single ratio unit;
    // bounds win over exactness there.
    width = width.min(image_width);
    height = height.min(image_height);

    let x = anchor.x - f64::from(width) / 2.0;
    let y = if shrunk {
        anchor.y - f64::from(height) / 2.0
    } else {
        v_ref - line * f64::from(height)
    };

    let max_x = f64::from(image_width - width);
    let max_y = f64::from(image_height - height);

    CropRect {
        x: x.round().clamp(0.0, max_x) as u32,
        y: y.round().clamp(0.0, max_y) as u32,
        width,
        height,
    }
}
