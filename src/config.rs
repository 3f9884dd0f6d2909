//! Configuration types for photo normalization operations
//!
//! Every empirically tuned constant from the normalization pipeline lives
//! here as a named policy field with its production default, so hosts can
//! adjust framing or compositing behavior without touching the algorithms.

use crate::error::{PhotoNormError, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when comparing aspect ratios by value
const ASPECT_EPSILON: f64 = 1e-3;

/// Largest denominator considered when approximating a decimal ratio
const MAX_RATIO_DENOMINATOR: u32 = 1000;

/// A crop aspect ratio as a reduced width:height rational.
///
/// Ratios are explicit rationals rather than encoded integers, parsed from
/// either `"W:H"` (`"35:45"`, `"4:3"`) or a decimal string (`"0.75"`), and
/// compared by numeric value within `1e-3`.
///
/// ```
/// use photonorm::AspectRatio;
///
/// let id = "35:45".parse::<AspectRatio>().unwrap();
/// assert_eq!(id, AspectRatio::ID_PHOTO);
/// assert!(id.approx_matches(7.0 / 9.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    num: u32,
    den: u32,
}

impl AspectRatio {
    /// 1:1, the default for generic avatar crops
    pub const SQUARE: AspectRatio = AspectRatio { num: 1, den: 1 };

    /// 35:45, the standard ID/passport photo ratio (reduced to 7:9)
    pub const ID_PHOTO: AspectRatio = AspectRatio { num: 7, den: 9 };

    /// Create a ratio from width and height units; reduces to lowest terms.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PhotoNormError::invalid_config(
                "aspect ratio terms must be non-zero",
            ));
        }
        let g = gcd(width, height);
        Ok(Self {
            num: width / g,
            den: height / g,
        })
    }

    /// Best rational approximation of a decimal width/height value, with
    /// denominators up to 1000.
    pub fn from_value(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(PhotoNormError::invalid_config(format!(
                "aspect ratio value must be positive and finite, got {value}"
            )));
        }
        let mut best = (1u32, 1u32);
        let mut best_err = f64::INFINITY;
        for den in 1..=MAX_RATIO_DENOMINATOR {
            let num = (value * f64::from(den)).round();
            if num < 1.0 || num > f64::from(u32::MAX) {
                continue;
            }
            let err = (num / f64::from(den) - value).abs();
            if err < best_err {
                best = (num as u32, den);
                best_err = err;
                if err < 1e-9 {
                    break;
                }
            }
        }
        Self::new(best.0, best.1)
    }

    /// Width units of the reduced ratio
    #[must_use]
    pub fn width_units(&self) -> u32 {
        self.num
    }

    /// Height units of the reduced ratio
    #[must_use]
    pub fn height_units(&self) -> u32 {
        self.den
    }

    /// The ratio as a floating-point width/height value
    #[must_use]
    pub fn value(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Whether `ratio` matches this ratio within the 1e-3 tolerance
    #[must_use]
    pub fn approx_matches(&self, ratio: f64) -> bool {
        (self.value() - ratio).abs() <= ASPECT_EPSILON
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

impl FromStr for AspectRatio {
    type Err = PhotoNormError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((w, h)) = s.split_once(':') {
            let width = w.trim().parse::<u32>().map_err(|_| {
                PhotoNormError::invalid_config(format!("invalid aspect ratio width: {w:?}"))
            })?;
            let height = h.trim().parse::<u32>().map_err(|_| {
                PhotoNormError::invalid_config(format!("invalid aspect ratio height: {h:?}"))
            })?;
            Self::new(width, height)
        } else {
            let value = s.parse::<f64>().map_err(|_| {
                PhotoNormError::invalid_config(format!("invalid aspect ratio: {s:?}"))
            })?;
            Self::from_value(value)
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// How the crop anchor point is derived from the detected landmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnchorStrategy {
    /// Weighted eye/nose anchor: the nose dominates horizontal centering,
    /// the eyes dominate vertical position
    #[default]
    EyeNoseWeighted,
    /// Plain face-box centroid
    FaceCentroid,
}

/// Policy driving the crop geometry engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropPolicy {
    /// Target width:height ratio of the crop
    pub aspect_ratio: AspectRatio,

    /// How the anchor point is derived
    pub anchor_strategy: AnchorStrategy,

    /// Crop height as a multiple of the detected face height. Larger values
    /// leave more room for hair and shoulders.
    pub margin_factor: f32,

    /// Fraction of crop height from the top at which the eyes sit (the ID
    /// photo "eye line" convention)
    pub eye_line: f32,

    /// Fallback fraction for the nose midpoint when no eyes were detected
    pub nose_line: f32,

    /// Fractional size increase applied when the computed crop fails to
    /// contain the detected face box
    pub containment_padding: f32,
}

impl Default for CropPolicy {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::SQUARE,
            anchor_strategy: AnchorStrategy::default(),
            margin_factor: 2.5,
            eye_line: 0.45,
            nose_line: 0.55,
            containment_padding: 0.2,
        }
    }
}

impl CropPolicy {
    /// Policy for the given ratio with a margin factor suited to it:
    /// portrait ratios get a wider margin to keep hair and shoulders in
    /// frame.
    #[must_use]
    pub fn for_ratio(aspect_ratio: AspectRatio) -> Self {
        let margin_factor = if aspect_ratio.value() < 0.8 { 2.8 } else { 2.5 };
        Self {
            aspect_ratio,
            margin_factor,
            ..Self::default()
        }
    }

    /// Validate policy parameters
    pub fn validate(&self) -> Result<()> {
        if self.margin_factor <= 0.0 {
            return Err(PhotoNormError::config_value_error(
                "margin factor",
                self.margin_factor,
                "> 0",
            ));
        }
        for (name, value) in [("eye line", self.eye_line), ("nose line", self.nose_line)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PhotoNormError::config_value_error(name, value, "0.0-1.0"));
            }
        }
        if self.containment_padding < 0.0 {
            return Err(PhotoNormError::config_value_error(
                "containment padding",
                self.containment_padding,
                ">= 0",
            ));
        }
        Ok(())
    }
}

/// Configuration for the iterative trimap segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Refinement iteration cap. The loop exits early once the labeling
    /// stops changing.
    pub iterations: usize,

    /// Cluster count per color model
    pub clusters: usize,

    /// Number of morphological closing passes applied to the raw mask
    pub closing_passes: u32,

    /// Disc radius of the first closing pass; each pass grows the radius by
    /// one pixel
    pub closing_base_radius: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            clusters: 5,
            closing_passes: 3,
            closing_base_radius: 1,
        }
    }
}

impl SegmentationConfig {
    /// Validate segmentation parameters
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(PhotoNormError::config_value_error(
                "segmentation iterations",
                self.iterations,
                ">= 1",
            ));
        }
        if self.clusters < 2 {
            return Err(PhotoNormError::config_value_error(
                "segmentation clusters",
                self.clusters,
                ">= 2",
            ));
        }
        if self.closing_passes == 0 || self.closing_base_radius == 0 {
            return Err(PhotoNormError::invalid_config(
                "mask closing requires at least one pass with a non-zero radius",
            ));
        }
        Ok(())
    }
}

/// A region expansion factor pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Expansion {
    /// Multiplier applied to the region height
    pub vertical: f32,
    /// Multiplier applied to the region width
    pub horizontal: f32,
}

/// Policy for the clothing-replacement compositing heuristics.
///
/// The stretch, shift, and threshold values are empirically tuned; they are
/// preserved here as configuration rather than re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarmentPolicy {
    /// Garment layering only engages when the face occupies less than this
    /// fraction of the image height (otherwise no torso is visible)
    pub max_face_height_ratio: f32,

    /// Horizontal stretch applied to the garment before center-cropping it
    /// back to the canvas width, widening the apparent shoulders
    pub stretch_factor: f32,

    /// Fraction of the largest face/garment gap by which the garment layer
    /// is shifted down
    pub gap_shift: f32,

    /// Torso region width as a multiple of the face width
    pub torso_widening: f32,

    /// Pixels the torso region reaches up past the chin
    pub chin_overlap: u32,

    /// Subject region expansion when a torso is visible
    pub subject_expansion_torso: Expansion,

    /// Subject region expansion when the face dominates the frame
    pub subject_expansion_tight: Expansion,
}

impl Default for GarmentPolicy {
    fn default() -> Self {
        Self {
            max_face_height_ratio: 0.6,
            stretch_factor: 1.5,
            gap_shift: 0.6,
            torso_widening: 2.7,
            chin_overlap: 10,
            subject_expansion_torso: Expansion {
                vertical: 2.4,
                horizontal: 1.3,
            },
            subject_expansion_tight: Expansion {
                vertical: 1.7,
                horizontal: 1.2,
            },
        }
    }
}

impl GarmentPolicy {
    /// Validate garment policy parameters
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.max_face_height_ratio) {
            return Err(PhotoNormError::config_value_error(
                "max face height ratio",
                self.max_face_height_ratio,
                "0.0-1.0",
            ));
        }
        if self.stretch_factor < 1.0 {
            return Err(PhotoNormError::config_value_error(
                "garment stretch factor",
                self.stretch_factor,
                ">= 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.gap_shift) {
            return Err(PhotoNormError::config_value_error(
                "gap shift",
                self.gap_shift,
                "0.0-1.0",
            ));
        }
        if self.torso_widening <= 0.0 {
            return Err(PhotoNormError::config_value_error(
                "torso widening",
                self.torso_widening,
                "> 0",
            ));
        }
        Ok(())
    }
}

/// Thresholds for the compliance checks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Sample every Nth pixel when measuring background whiteness
    pub sample_step: u32,

    /// A pixel counts as white only when every channel is at least this value
    pub white_floor: u8,

    /// Maximum tolerated fraction of non-white background samples
    pub max_non_white_ratio: f32,

    /// Horizontal face-center tolerance as a fraction of image width
    pub centering_tolerance: f32,

    /// Minimum accepted image height/width ratio
    pub min_height_ratio: f32,

    /// Maximum accepted image height/width ratio
    pub max_height_ratio: f32,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            sample_step: 2,
            white_floor: 230,
            max_non_white_ratio: 0.5,
            centering_tolerance: 0.1,
            min_height_ratio: 1.0,
            max_height_ratio: 1.45,
        }
    }
}

impl ComplianceConfig {
    /// Validate compliance thresholds
    pub fn validate(&self) -> Result<()> {
        if self.sample_step == 0 {
            return Err(PhotoNormError::config_value_error(
                "sample step",
                self.sample_step,
                ">= 1",
            ));
        }
        if self.min_height_ratio > self.max_height_ratio {
            return Err(PhotoNormError::invalid_config(format!(
                "height ratio range is inverted: {} > {}",
                self.min_height_ratio, self.max_height_ratio
            )));
        }
        Ok(())
    }
}

/// What the background of a composited photo is replaced with
#[derive(Debug, Clone)]
pub enum BackgroundFill {
    /// A solid RGB color
    Color([u8; 3]),
    /// A custom background image, resized to the source dimensions
    Image(DynamicImage),
}

impl Default for BackgroundFill {
    fn default() -> Self {
        Self::Color([255, 255, 255])
    }
}

impl BackgroundFill {
    /// Parse a fill color from `"#RRGGBB"` hex or a `"r,g,b"` triplet.
    pub fn parse_color(input: &str) -> Result<[u8; 3]> {
        let input = input.trim();
        if let Some(hex) = input.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(PhotoNormError::invalid_config(format!(
                    "hex colour must be #RRGGBB, got {input:?}"
                )));
            }
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16).map_err(|_| {
                    PhotoNormError::invalid_config(format!("invalid hex colour: {input:?}"))
                })
            };
            Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
        } else {
            let parts: Vec<&str> = input.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(PhotoNormError::invalid_config(format!(
                    "colour must be #RRGGBB or r,g,b, got {input:?}"
                )));
            }
            let channel = |s: &str| {
                s.parse::<u8>().map_err(|_| {
                    PhotoNormError::invalid_config(format!("invalid colour channel: {s:?}"))
                })
            };
            Ok([channel(parts[0])?, channel(parts[1])?, channel(parts[2])?])
        }
    }
}

/// Full specification of a compositing request
#[derive(Debug, Clone, Default)]
pub struct CompositeSpec {
    /// Background the subject is composited onto
    pub fill: BackgroundFill,

    /// Optional garment reference image for clothing replacement
    pub garment: Option<DynamicImage>,
}

impl CompositeSpec {
    /// Composite onto a solid color
    #[must_use]
    pub fn solid(color: [u8; 3]) -> Self {
        Self {
            fill: BackgroundFill::Color(color),
            garment: None,
        }
    }

    /// Composite onto a custom background image
    #[must_use]
    pub fn with_background(background: DynamicImage) -> Self {
        Self {
            fill: BackgroundFill::Image(background),
            garment: None,
        }
    }

    /// Add a garment reference image
    #[must_use]
    pub fn garment(mut self, garment: DynamicImage) -> Self {
        self.garment = Some(garment);
        self
    }
}

/// Output encoding for finished images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// JPEG encoding at a configurable quality
    #[default]
    Jpeg,
    /// Lossless PNG encoding
    Png,
}

impl OutputFormat {
    /// File extension for the format, without the dot
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Complete configuration for a [`crate::PhotoNormalizer`]
///
/// # Examples
///
/// ```
/// use photonorm::{AspectRatio, CropPolicy, NormalizerConfig};
///
/// let config = NormalizerConfig::builder()
///     .crop_policy(CropPolicy::for_ratio(AspectRatio::ID_PHOTO))
///     .build()
///     .unwrap();
/// assert_eq!(config.crop.aspect_ratio, AspectRatio::ID_PHOTO);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Crop geometry policy
    pub crop: CropPolicy,
    /// Segmentation parameters
    pub segmentation: SegmentationConfig,
    /// Clothing-replacement heuristics
    pub garment: GarmentPolicy,
    /// Compliance thresholds
    pub compliance: ComplianceConfig,
}

impl NormalizerConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> NormalizerConfigBuilder {
        NormalizerConfigBuilder::default()
    }

    /// Validate every policy section
    pub fn validate(&self) -> Result<()> {
        self.crop.validate()?;
        self.segmentation.validate()?;
        self.garment.validate()?;
        self.compliance.validate()
    }
}

/// Builder for [`NormalizerConfig`]
#[derive(Debug, Default)]
pub struct NormalizerConfigBuilder {
    config: NormalizerConfig,
}

impl NormalizerConfigBuilder {
    /// Set the crop policy
    #[must_use]
    pub fn crop_policy(mut self, crop: CropPolicy) -> Self {
        self.config.crop = crop;
        self
    }

    /// Set the segmentation parameters
    #[must_use]
    pub fn segmentation(mut self, segmentation: SegmentationConfig) -> Self {
        self.config.segmentation = segmentation;
        self
    }

    /// Set the garment policy
    #[must_use]
    pub fn garment_policy(mut self, garment: GarmentPolicy) -> Self {
        self.config.garment = garment;
        self
    }

    /// Set the compliance thresholds
    #[must_use]
    pub fn compliance(mut self, compliance: ComplianceConfig) -> Self {
        self.config.compliance = compliance;
        self
    }

    /// Validate and produce the configuration
    pub fn build(self) -> Result<NormalizerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
