//! Layer compositing for background and clothing replacement
//!
//! Builds the destination canvas (solid fill or resized custom background),
//! stencils segmented layers onto it, and applies the garment alignment
//! heuristics: horizontal stretch with center-crop to widen the apparent
//! shoulders, and a per-column gap scan that shifts the garment down so it
//! emerges from under the chin.

use crate::config::{BackgroundFill, CompositeSpec, Expansion, GarmentPolicy};
use crate::error::{PhotoNormError, Result};
use crate::segmentation::ForegroundSegmenter;
use crate::types::{BoundingBox, FeatureSet, Mask};
use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use tracing::debug;

/// Pixel inset applied to the origin of an expanded subject region
const EXPAND_ORIGIN_INSET: i64 = 5;

/// Pixel inset applied to the size of an expanded subject region
const EXPAND_SIZE_INSET: i64 = 10;

/// Merges segmented layers onto a destination canvas
#[derive(Debug, Clone)]
pub struct Compositor {
    policy: GarmentPolicy,
}

impl Compositor {
    /// Create a compositor with the given garment policy
    #[must_use]
    pub fn new(policy: GarmentPolicy) -> Self {
        Self { policy }
    }

    /// Whether enough torso is visible below the face for clothing work
    #[must_use]
    pub fn torso_visible(&self, features: &FeatureSet, image_height: u32) -> bool {
        (features.face_box.height as f32)
            < self.policy.max_face_height_ratio * image_height as f32
    }

    /// Replace the background behind the subject, optionally layering a
    /// garment over the torso.
    ///
    /// The face layer is always written first; the garment layer (when the
    /// spec carries one and a torso is visible) is written on top of it.
    pub fn replace_background(
        &self,
        image: &RgbImage,
        features: &FeatureSet,
        spec: &CompositeSpec,
        segmenter: &ForegroundSegmenter,
    ) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let mut canvas = self.build_canvas(&spec.fill, width, height)?;

        let torso_visible = self.torso_visible(features, height);
        let expansion = if torso_visible {
            self.policy.subject_expansion_torso
        } else {
            self.policy.subject_expansion_tight
        };
        let subject_region = expand_face_region(&features.face_box, width, height, expansion);
        debug!(?subject_region, torso_visible, "segmenting subject");

        let subject_mask = segmenter.segment(image, &subject_region)?;
        copy_masked(image, &subject_mask, &mut canvas)?;

        if torso_visible {
            if let Some(garment) = &spec.garment {
                self.layer_garment(garment, &subject_mask, &mut canvas, segmenter)?;
            }
        }

        Ok(canvas)
    }

    /// Replace the subject's clothing in place, leaving the original
    /// background untouched.
    ///
    /// Segments the torso region, then writes the resized garment's pixels
    /// through that same mask. When the face dominates the frame there is no
    /// torso worth replacing and the image is returned unchanged.
    pub fn replace_clothing(
        &self,
        image: &RgbImage,
        features: &FeatureSet,
        garment: &DynamicImage,
        segmenter: &ForegroundSegmenter,
    ) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let mut result = image.clone();

        if !self.torso_visible(features, height) {
            debug!("face dominates the frame, skipping clothing replacement");
            return Ok(result);
        }

        let clothes_region = torso_region(
            &features.face_box,
            width,
            height,
            self.policy.torso_widening,
            self.policy.chin_overlap,
        );
        let clothes_mask = segmenter.segment(image, &clothes_region)?;
        let garment_resized = resize_to(garment, width, height)?;
        copy_masked(&garment_resized, &clothes_mask, &mut result)?;

        Ok(result)
    }

    /// Destination canvas from the fill specification.
    fn build_canvas(&self, fill: &BackgroundFill, width: u32, height: u32) -> Result<RgbImage> {
        match fill {
            BackgroundFill::Color(rgb) => {
                Ok(RgbImage::from_pixel(width, height, image::Rgb(*rgb)))
            }
            BackgroundFill::Image(background) => resize_to(background, width, height),
        }
    }

    /// Segment, widen, align, and stencil the garment reference onto the
    /// canvas.
    fn layer_garment(
        &self,
        garment: &DynamicImage,
        subject_mask: &Mask,
        canvas: &mut RgbImage,
        segmenter: &ForegroundSegmenter,
    ) -> Result<()> {
        let (width, height) = canvas.dimensions();
        let garment_rgb = resize_to(garment, width, height)?;

        // The garment itself lives in the lower half of the reference image.
        let garment_region = BoundingBox::new(0, height / 2, width, height - height / 2);
        let garment_mask = segmenter.segment(&garment_rgb, &garment_region)?;

        let (garment_rgb, garment_mask) =
            stretch_and_center_crop(&garment_rgb, &garment_mask, self.policy.stretch_factor)?;

        let gap = largest_vertical_gap(subject_mask, &garment_mask);
        let shift = (gap as f32 * self.policy.gap_shift).round() as u32;
        debug!(gap, shift, "aligning garment layer");

        let garment_rgb = shift_down_image(&garment_rgb, shift);
        let garment_mask = garment_mask.shifted_down(shift);
        copy_masked(&garment_rgb, &garment_mask, canvas)
    }
}

/// Expand the face box to cover the whole subject.
///
/// Grows the box by the expansion factors around the face center, nudges the
/// origin in by a few pixels and trims the size, then clamps to the image.
pub(crate) fn expand_face_region(
    face: &BoundingBox,
    image_width: u32,
    image_height: u32,
    expansion: Expansion,
) -> BoundingBox {
    let face_x = i64::from(face.x);
    let face_y = i64::from(face.y);
    let face_w = i64::from(face.width);
    let face_h = i64::from(face.height);

    let new_w = (face.width as f32 * expansion.horizontal) as i64;
    let new_x = (face_x - (new_w - face_w) / 2).max(0) + EXPAND_ORIGIN_INSET;
    let new_w = new_w.min(i64::from(image_width) - new_x) - EXPAND_SIZE_INSET;

    let new_h = (face.height as f32 * expansion.vertical) as i64;
    let new_y = (face_y + face_h / 2 - new_h / 2).max(0) + EXPAND_ORIGIN_INSET;
    let new_h = new_h.min(i64::from(image_height) - new_y) - EXPAND_SIZE_INSET;

    BoundingBox {
        x: new_x.max(0) as u32,
        y: new_y.max(0) as u32,
        width: new_w.max(0) as u32,
        height: new_h.max(0) as u32,
    }
}

/// The torso region: widened past the face and reaching from just under the
/// chin to the bottom of the image.
pub(crate) fn torso_region(
    face: &BoundingBox,
    image_width: u32,
    image_height: u32,
    widening: f32,
    chin_overlap: u32,
) -> BoundingBox {
    let face_x = i64::from(face.x);
    let face_w = i64::from(face.width);

    let new_w = (face.width as f32 * widening) as i64;
    let new_x = (face_x - (new_w - face_w) / 2).max(0);
    let new_w = new_w.min(i64::from(image_width) - new_x).max(0);

    let new_y = i64::from(face.bottom()).saturating_sub(i64::from(chin_overlap));
    let new_h = (i64::from(image_height) - new_y).max(0);

    BoundingBox {
        x: new_x as u32,
        y: new_y.max(0) as u32,
        width: new_w as u32,
        height: new_h as u32,
    }
}

/// Resize to exact dimensions with the high-quality cubic filter, verifying
/// the result.
pub(crate) fn resize_to(image: &DynamicImage, width: u32, height: u32) -> Result<RgbImage> {
    let resized = image
        .resize_exact(width, height, FilterType::CatmullRom)
        .to_rgb8();
    if resized.dimensions() != (width, height) {
        return Err(PhotoNormError::dimension_mismatch(
            (width, height),
            resized.dimensions(),
        ));
    }
    Ok(resized)
}

/// Copy `src` pixels onto `dst` wherever the mask is foreground.
pub(crate) fn copy_masked(src: &RgbImage, mask: &Mask, dst: &mut RgbImage) -> Result<()> {
    if src.dimensions() != dst.dimensions() || mask.dimensions() != dst.dimensions() {
        return Err(PhotoNormError::dimension_mismatch(
            dst.dimensions(),
            src.dimensions(),
        ));
    }
    for (x, y, pixel) in src.enumerate_pixels() {
        if mask.is_foreground(x, y) {
            dst.put_pixel(x, y, *pixel);
        }
    }
    Ok(())
}

/// Largest per-column vertical gap between the bottom of the subject mask
/// and the top of the garment mask.
///
/// For each column, the gap is the bottom-most foreground row of the
/// subject mask minus the top-most foreground row of the garment mask.
/// Columns with no pixels in either mask are skipped; the result is never
/// negative.
#[must_use]
pub fn largest_vertical_gap(subject_mask: &Mask, garment_mask: &Mask) -> u32 {
    let mut largest: i64 = 0;
    let columns = subject_mask.width().min(garment_mask.width());

    for x in 0..columns {
        let Some(subject_bottom) = subject_mask.lowest_foreground_row(x) else {
            continue;
        };
        let Some(garment_top) = garment_mask.highest_foreground_row(x) else {
            continue;
        };
        let gap = i64::from(subject_bottom) - i64::from(garment_top);
        if gap > largest {
            largest = gap;
        }
    }

    largest as u32
}

/// Stretch the garment and its mask horizontally, then center-crop back to
/// the original width. Widens the apparent shoulders without changing the
/// canvas size.
pub(crate) fn stretch_and_center_crop(
    image: &RgbImage,
    mask: &Mask,
    factor: f32,
) -> Result<(RgbImage, Mask)> {
    let (width, height) = image.dimensions();
    let stretched_width = ((width as f32) * factor).round() as u32;
    if stretched_width < width {
        return Err(PhotoNormError::invalid_config(format!(
            "garment stretch factor must not shrink the image, got {factor}"
        )));
    }

    let stretched = imageops::resize(image, stretched_width, height, FilterType::Triangle);
    // Nearest-neighbor keeps the mask strictly binary through the stretch
    let mask_image = mask.to_image()?;
    let stretched_mask = imageops::resize(&mask_image, stretched_width, height, FilterType::Nearest);

    let offset = (stretched_width - width) / 2;
    let cropped = imageops::crop_imm(&stretched, offset, 0, width, height).to_image();
    let cropped_mask = imageops::crop_imm(&stretched_mask, offset, 0, width, height).to_image();

    Ok((cropped, Mask::from_image(&cropped_mask)))
}

/// Translate an image down by `dy` rows, backfilling the vacated rows with
/// black.
#[must_use]
pub(crate) fn shift_down_image(image: &RgbImage, dy: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut shifted = RgbImage::new(width, height);
    for y in 0..height.saturating_sub(dy) {
        for x in 0..width {
            shifted.put_pixel(x, y + dy, *image.get_pixel(x, y));
        }
    }
    shifted
}
