//! Core value types for photo normalization
//!
//! Everything here is created per request, immutable once constructed, and
//! discarded when the operation completes. A [`Mask`] is recomputed rather
//! than edited in place.

use crate::error::{PhotoNormError, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// A pixel coordinate within an image.
///
/// Stored as floating point because anchor points are derived from weighted
/// averages of landmark positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate in pixels
    pub x: f64,
    /// Vertical coordinate in pixels
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in integer pixel units.
///
/// Invariant when produced by this crate: `x, y >= 0` and the box lies fully
/// inside the image it was detected in. Detection backends clamp raw detector
/// output before constructing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner (pixels)
    pub x: u32,
    /// Y coordinate of the top-left corner (pixels)
    pub y: u32,
    /// Width of the box (pixels)
    pub width: u32,
    /// Height of the box (pixels)
    pub height: u32,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from possibly-negative raw detector coordinates, clamped
    /// to the image bounds. Returns `None` when nothing of the box survives
    /// clamping.
    #[must_use]
    pub fn from_signed(
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width).min(i64::from(image_width));
        let y1 = (y + height).min(i64::from(image_height));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// Area in square pixels
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Center of the box
    #[must_use]
    pub fn center(&self) -> Point {
        Point {
            x: f64::from(self.x) + f64::from(self.width) / 2.0,
            y: f64::from(self.y) + f64::from(self.height) / 2.0,
        }
    }

    /// X coordinate one past the right edge
    #[must_use]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Y coordinate one past the bottom edge
    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether `other` lies entirely inside this box
    #[must_use]
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Whether the pixel `(x, y)` lies inside the box (edges inclusive)
    #[must_use]
    pub fn contains_pixel(&self, x: u32, y: u32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Intersect with an image of the given dimensions. The result may have
    /// zero width or height if the box lies outside the image.
    #[must_use]
    pub fn clamped_to(&self, image_width: u32, image_height: u32) -> BoundingBox {
        let x = self.x.min(image_width);
        let y = self.y.min(image_height);
        BoundingBox {
            x,
            y,
            width: self.width.min(image_width - x),
            height: self.height.min(image_height - y),
        }
    }
}

/// Canonical facial landmarks for one subject, produced by the detection
/// adapter.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Bounding box of the selected (largest) face
    pub face_box: BoundingBox,

    /// Mean of all detected eye-box centers. Present only when at least two
    /// eye boxes were found inside the face region.
    pub eyes_midpoint: Option<Point>,

    /// Nose midpoint. When the detector reports no nose this is estimated at
    /// 55% of the face height, horizontally centered — a defined fallback,
    /// not an error.
    pub nose_midpoint: Point,
}

impl FeatureSet {
    /// Fraction of face height at which the nose midpoint is estimated when
    /// no nose box was detected.
    pub const NOSE_ESTIMATE_FRACTION: f64 = 0.55;

    /// Build a feature set with no eye or nose detections: the nose midpoint
    /// is estimated from the face box.
    #[must_use]
    pub fn from_face_box(face_box: BoundingBox) -> Self {
        let nose_midpoint = Point {
            x: f64::from(face_box.x) + f64::from(face_box.width) / 2.0,
            y: f64::from(face_box.y) + f64::from(face_box.height) * Self::NOSE_ESTIMATE_FRACTION,
        };
        Self {
            face_box,
            eyes_midpoint: None,
            nose_midpoint,
        }
    }
}

/// A crop rectangle computed by the geometry engine.
///
/// Guaranteed to lie fully inside its source image, with `width / height`
/// matching the requested aspect ratio within `1e-3` (exactly, for ratios
/// that fit the image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    /// X coordinate of the top-left corner (pixels)
    pub x: u32,
    /// Y coordinate of the top-left corner (pixels)
    pub y: u32,
    /// Crop width (pixels)
    pub width: u32,
    /// Crop height (pixels)
    pub height: u32,
}

impl CropRect {
    /// Width / height as a floating-point ratio
    #[must_use]
    pub fn aspect(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Whether the given box lies entirely inside the crop
    #[must_use]
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.x + self.width
            && other.bottom() <= self.y + self.height
    }
}

/// Binary foreground mask over an image.
///
/// Same dimensions as its source image; pixel values are 0 (background) or
/// 255 (foreground).
#[derive(Debug, Clone)]
pub struct Mask {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Mask {
    /// Pixel value used for foreground
    pub const FOREGROUND: u8 = 255;

    /// Create a mask from raw data. Fails if the buffer length does not
    /// match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return Err(PhotoNormError::segmentation(format!(
                "mask buffer of {} bytes does not match {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Create an all-background mask
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    /// Create a mask from a grayscale image; any non-zero pixel counts as
    /// foreground.
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image
            .as_raw()
            .iter()
            .map(|&v| if v > 0 { Self::FOREGROUND } else { 0 })
            .collect();
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert the mask to a grayscale image
    pub fn to_image(&self) -> Result<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| PhotoNormError::segmentation("failed to create image from mask data"))
    }

    /// Mask dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Mask width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel at `(x, y)` is foreground. Out-of-bounds
    /// coordinates are background.
    #[must_use]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[(y as usize) * (self.width as usize) + (x as usize)] == Self::FOREGROUND
    }

    /// Top-most foreground row in column `x`, if the column has any
    /// foreground pixels.
    #[must_use]
    pub fn highest_foreground_row(&self, x: u32) -> Option<u32> {
        (0..self.height).find(|&y| self.is_foreground(x, y))
    }

    /// Bottom-most foreground row in column `x`, if the column has any
    /// foreground pixels.
    #[must_use]
    pub fn lowest_foreground_row(&self, x: u32) -> Option<u32> {
        (0..self.height).rev().find(|&y| self.is_foreground(x, y))
    }

    /// A copy of the mask translated down by `dy` rows. Rows shifted past
    /// the bottom edge are discarded; the vacated top rows are background.
    #[must_use]
    pub fn shifted_down(&self, dy: u32) -> Mask {
        let mut shifted = Mask::empty(self.width, self.height);
        for y in 0..self.height.saturating_sub(dy) {
            let src_start = (y as usize) * (self.width as usize);
            let dst_start = ((y + dy) as usize) * (self.width as usize);
            shifted.data[dst_start..dst_start + self.width as usize]
                .copy_from_slice(&self.data[src_start..src_start + self.width as usize]);
        }
        shifted
    }

    /// Mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self
            .data
            .iter()
            .filter(|&&v| v == Self::FOREGROUND)
            .count();

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio: foreground_pixels as f32 / total_pixels.max(1) as f32,
        }
    }
}

/// Statistics about a foreground mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    /// Number of pixels in the mask
    pub total_pixels: usize,
    /// Number of foreground pixels
    pub foreground_pixels: usize,
    /// Number of background pixels
    pub background_pixels: usize,
    /// Foreground pixels as a fraction of the total
    pub foreground_ratio: f32,
}

/// Result of running the compliance checks against a finished image.
///
/// An empty violation list means the image is compliant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Human-readable violation messages, in check order
    pub errors: Vec<String>,
}

impl ComplianceReport {
    /// Whether every check passed
    #[must_use]
    pub fn compliant(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_geometry() {
        let b = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(b.area(), 1200);
        assert_eq!(b.right(), 40);
        assert_eq!(b.bottom(), 60);
        let c = b.center();
        assert!((c.x - 25.0).abs() < f64::EPSILON);
        assert!((c.y - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_box_containment() {
        let outer = BoundingBox::new(0, 0, 100, 100);
        let inner = BoundingBox::new(10, 10, 50, 50);
        assert!(outer.contains_box(&inner));
        assert!(!inner.contains_box(&outer));
    }

    #[test]
    fn from_signed_clamps_negative_origin() {
        let b = BoundingBox::from_signed(-10, -5, 40, 30, 100, 100).unwrap();
        assert_eq!(b, BoundingBox::new(0, 0, 30, 25));
    }

    #[test]
    fn from_signed_rejects_fully_outside() {
        assert!(BoundingBox::from_signed(200, 200, 40, 30, 100, 100).is_none());
        assert!(BoundingBox::from_signed(-50, 0, 40, 30, 100, 100).is_none());
    }

    #[test]
    fn clamped_to_shrinks_overhang() {
        let b = BoundingBox::new(80, 90, 40, 30);
        let clamped = b.clamped_to(100, 100);
        assert_eq!(clamped, BoundingBox::new(80, 90, 20, 10));
    }

    #[test]
    fn feature_set_estimates_nose() {
        let fs = FeatureSet::from_face_box(BoundingBox::new(100, 100, 200, 200));
        assert!(fs.eyes_midpoint.is_none());
        assert!((fs.nose_midpoint.x - 200.0).abs() < f64::EPSILON);
        assert!((fs.nose_midpoint.y - 210.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mask_round_trip_through_image() {
        let mut img = GrayImage::new(4, 3);
        img.put_pixel(1, 2, image::Luma([255]));
        img.put_pixel(3, 0, image::Luma([7])); // non-zero counts as foreground
        let mask = Mask::from_image(&img);
        assert!(mask.is_foreground(1, 2));
        assert!(mask.is_foreground(3, 0));
        assert!(!mask.is_foreground(0, 0));

        let back = mask.to_image().unwrap();
        assert_eq!(back.get_pixel(1, 2).0[0], 255);
        assert_eq!(back.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn mask_rejects_bad_buffer() {
        assert!(Mask::new(vec![0; 5], 4, 3).is_err());
    }

    #[test]
    fn mask_column_scans() {
        let mut mask = Mask::empty(3, 10);
        let data_idx = |x: u32, y: u32| (y as usize) * 3 + x as usize;
        mask.data[data_idx(1, 2)] = Mask::FOREGROUND;
        mask.data[data_idx(1, 7)] = Mask::FOREGROUND;

        assert_eq!(mask.highest_foreground_row(1), Some(2));
        assert_eq!(mask.lowest_foreground_row(1), Some(7));
        assert_eq!(mask.highest_foreground_row(0), None);
        assert_eq!(mask.lowest_foreground_row(2), None);
    }

    #[test]
    fn mask_shift_down() {
        let mut mask = Mask::empty(2, 4);
        mask.data[0] = Mask::FOREGROUND; // (0, 0)
        let shifted = mask.shifted_down(2);
        assert!(!shifted.is_foreground(0, 0));
        assert!(shifted.is_foreground(0, 2));

        // Shifting past the bottom discards everything
        let gone = mask.shifted_down(10);
        assert_eq!(gone.statistics().foreground_pixels, 0);
    }

    #[test]
    fn mask_statistics() {
        let mut mask = Mask::empty(2, 2);
        mask.data[0] = Mask::FOREGROUND;
        mask.data[3] = Mask::FOREGROUND;
        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert_eq!(stats.background_pixels, 2);
        assert!((stats.foreground_ratio - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn compliance_report_empty_is_compliant() {
        let report = ComplianceReport::default();
        assert!(report.compliant());

        let report = ComplianceReport {
            errors: vec!["Background colour is not white.".to_string()],
        };
        assert!(!report.compliant());
    }
}
