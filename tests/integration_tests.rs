//! End-to-end tests over the full normalization pipeline.
//!
//! Detection runs through a deterministic stub backend so the geometry,
//! segmentation, compositing, and compliance behavior can be exercised on
//! synthetic images without a bundled model.

use image::{DynamicImage, GrayImage, RgbImage};
use photonorm::compositor::largest_vertical_gap;
use photonorm::{
    AspectRatio, BoundingBox, CompositeSpec, CropPolicy, CropRect, DetectionParams,
    FeatureDetector, ForegroundSegmenter, Mask, NormalizerConfig, OutputFormat, PhotoNormalizer,
    PhotoNormError, SegmentationConfig,
};
use std::sync::Arc;

/// Deterministic detection backend returning pre-configured face boxes.
struct FixedDetector {
    faces: Vec<BoundingBox>,
}

impl FixedDetector {
    fn with_face(face: BoundingBox) -> Arc<Self> {
        Arc::new(Self { faces: vec![face] })
    }

    fn blind() -> Arc<Self> {
        Arc::new(Self { faces: Vec::new() })
    }
}

impl FeatureDetector for FixedDetector {
    fn detect_faces(&self, _gray: &GrayImage, _params: &DetectionParams) -> Vec<BoundingBox> {
        self.faces.clone()
    }
}

fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb(color)))
}

/// Dark frame with a bright subject block covering the face and torso.
fn subject_photo(width: u32, height: u32, subject: BoundingBox) -> DynamicImage {
    let mut img = RgbImage::from_pixel(width, height, image::Rgb([25, 28, 30]));
    for y in subject.y..subject.bottom().min(height) {
        for x in subject.x..subject.right().min(width) {
            img.put_pixel(x, y, image::Rgb([210, 190, 175]));
        }
    }
    DynamicImage::ImageRgb8(img)
}

fn normalizer_for(detector: Arc<dyn FeatureDetector>, ratio: AspectRatio) -> PhotoNormalizer {
    let config = NormalizerConfig::builder()
        .crop_policy(CropPolicy::for_ratio(ratio))
        .segmentation(SegmentationConfig {
            iterations: 10,
            ..SegmentationConfig::default()
        })
        .build()
        .unwrap();
    PhotoNormalizer::new(detector, config).unwrap()
}

#[test]
fn crop_is_contained_and_aspect_exact_for_all_policies() {
    let ratios = [
        AspectRatio::SQUARE,
        AspectRatio::ID_PHOTO,
        AspectRatio::new(4, 3).unwrap(),
        AspectRatio::new(3, 4).unwrap(),
        AspectRatio::new(16, 9).unwrap(),
        AspectRatio::new(9, 16).unwrap(),
    ];
    let images = [(640u32, 480u32), (480, 640), (1000, 1000), (350, 450)];
    let face = BoundingBox::new(150, 120, 90, 100);

    for ratio in ratios {
        for (width, height) in images {
            let normalizer = normalizer_for(FixedDetector::with_face(face), ratio);
            let outcome = normalizer
                .compute_crop(&solid_image(width, height, [180, 180, 180]))
                .unwrap();
            let rect = outcome.rect;

            assert!(
                rect.x + rect.width <= width && rect.y + rect.height <= height,
                "{ratio} in {width}x{height}: {rect:?} escapes the image"
            );
            assert!(
                ratio.approx_matches(rect.aspect()),
                "{ratio} in {width}x{height}: got aspect {}",
                rect.aspect()
            );
        }
    }
}

#[test]
fn missing_face_yields_exact_center_quarter() {
    let normalizer = normalizer_for(FixedDetector::blind(), AspectRatio::SQUARE);
    let outcome = normalizer
        .compute_crop(&solid_image(640, 480, [200, 200, 200]))
        .unwrap();

    assert!(outcome.used_fallback());
    assert_eq!(
        outcome.rect,
        CropRect {
            x: 160,
            y: 120,
            width: 320,
            height: 240
        }
    );
}

#[test]
fn degenerate_region_fails_segmentation() {
    let segmenter = ForegroundSegmenter::new(SegmentationConfig::default());
    let image = RgbImage::from_pixel(64, 64, image::Rgb([128, 128, 128]));

    let err = segmenter
        .segment(&image, &BoundingBox::new(10, 10, 0, 0))
        .unwrap_err();
    assert!(matches!(err, PhotoNormError::SegmentationFailed(_)));
}

#[test]
fn gap_detection_recovers_known_gap() {
    let mut subject = GrayImage::new(30, 300);
    let mut garment = GrayImage::new(30, 300);

    // Column 12: subject reaches down to y=140, garment starts at y=95.
    // Their difference, 45, is the largest gap in the pair.
    for y in 60..=140 {
        subject.put_pixel(12, y, image::Luma([255]));
    }
    for y in 95..300 {
        garment.put_pixel(12, y, image::Luma([255]));
    }
    // A second column with a smaller gap
    for y in 60..=100 {
        subject.put_pixel(20, y, image::Luma([255]));
    }
    for y in 90..300 {
        garment.put_pixel(20, y, image::Luma([255]));
    }

    let gap = largest_vertical_gap(&Mask::from_image(&subject), &Mask::from_image(&garment));
    assert_eq!(gap, 45);
}

#[test]
fn all_white_centered_photo_is_compliant() {
    // 350x450 all-white frame with a centered, proportionate face box
    let face = BoundingBox::new(117, 112, 116, 150);
    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::ID_PHOTO);

    let report = normalizer.check_compliance(&solid_image(350, 450, [255, 255, 255]));
    assert!(report.compliant(), "unexpected errors: {:?}", report.errors);
    assert!(report.errors.is_empty());
}

#[test]
fn double_height_image_violates_size_ratio() {
    let face = BoundingBox::new(80, 100, 90, 110);
    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::ID_PHOTO);

    // height/width = 2.0, everything else is fine
    let report = normalizer.check_compliance(&solid_image(250, 500, [255, 255, 255]));
    assert!(!report.compliant());
    assert!(
        report.errors.iter().any(|e| e.contains("size")),
        "expected a size violation: {:?}",
        report.errors
    );
}

#[test]
fn composited_output_round_trips_with_exact_dimensions() {
    let face = BoundingBox::new(24, 12, 24, 24);
    let photo = subject_photo(72, 96, BoundingBox::new(18, 8, 36, 80));
    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::SQUARE);

    let composited = normalizer
        .replace_background(&photo, &CompositeSpec::solid([255, 255, 255]))
        .unwrap();
    assert_eq!(composited.dimensions(), (72, 96));

    // Encode lossy, decode, and the dimensions must survive exactly
    let bytes = photonorm::encode_image(&composited, OutputFormat::Jpeg, 85).unwrap();
    let decoded = photonorm::decode_image(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (72, 96));
}

#[test]
fn background_replacement_fills_the_backdrop() {
    let face = BoundingBox::new(24, 12, 24, 24);
    let photo = subject_photo(72, 96, BoundingBox::new(18, 8, 36, 80));
    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::SQUARE);

    let result = normalizer
        .replace_background(&photo, &CompositeSpec::solid([0, 90, 200]))
        .unwrap();

    // The far corners lay outside every subject region and take the fill
    assert_eq!(*result.get_pixel(1, 1), image::Rgb([0, 90, 200]));
    assert_eq!(*result.get_pixel(70, 1), image::Rgb([0, 90, 200]));
}

#[test]
fn background_replacement_without_face_is_an_error() {
    let normalizer = normalizer_for(FixedDetector::blind(), AspectRatio::SQUARE);
    let err = normalizer
        .replace_background(
            &solid_image(64, 64, [128, 128, 128]),
            &CompositeSpec::default(),
        )
        .unwrap_err();
    assert!(matches!(err, PhotoNormError::NoSubjectDetected));
}

#[test]
fn custom_background_is_resized_to_source_dimensions() {
    let face = BoundingBox::new(24, 12, 24, 24);
    let photo = subject_photo(72, 96, BoundingBox::new(18, 8, 36, 80));
    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::SQUARE);

    // Deliberately mismatched backdrop dimensions
    let backdrop = solid_image(400, 300, [10, 200, 10]);
    let result = normalizer
        .replace_background(&photo, &CompositeSpec::with_background(backdrop))
        .unwrap();

    assert_eq!(result.dimensions(), (72, 96));
    assert_eq!(*result.get_pixel(1, 1), image::Rgb([10, 200, 10]));
}

#[test]
fn garment_layering_runs_when_torso_is_visible() {
    // Face well under 60% of image height, garment in the lower half of a
    // bright-on-dark reference image
    let face = BoundingBox::new(24, 8, 24, 24);
    let photo = subject_photo(72, 120, BoundingBox::new(18, 4, 36, 100));

    let mut garment = RgbImage::from_pixel(60, 100, image::Rgb([240, 240, 240]));
    for y in 55..100 {
        for x in 5..55 {
            garment.put_pixel(x, y, image::Rgb([20, 20, 90]));
        }
    }
    let spec = CompositeSpec::solid([255, 255, 255]).garment(DynamicImage::ImageRgb8(garment));

    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::SQUARE);
    let result = normalizer.replace_background(&photo, &spec).unwrap();

    assert_eq!(result.dimensions(), (72, 120));
    // Some garment pixels must have landed in the lower half of the canvas
    let garment_pixels = result
        .enumerate_pixels()
        .filter(|(_, y, p)| *y > 60 && p.0[2] > 60 && p.0[0] < 60)
        .count();
    assert!(garment_pixels > 0, "garment layer missing from composite");
}

#[test]
fn clothing_replacement_keeps_background() {
    let face = BoundingBox::new(24, 8, 24, 24);
    let photo = subject_photo(72, 120, BoundingBox::new(18, 4, 36, 100));
    let garment = solid_image(40, 60, [60, 10, 10]);

    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::SQUARE);
    let result = normalizer.replace_clothing(&photo, &garment).unwrap();

    assert_eq!(result.dimensions(), (72, 120));
    // Backdrop corners stay untouched
    assert_eq!(*result.get_pixel(1, 1), image::Rgb([25, 28, 30]));
}

#[test]
fn encoded_output_survives_a_file_round_trip() {
    let face = BoundingBox::new(24, 12, 24, 24);
    let photo = subject_photo(72, 96, BoundingBox::new(18, 8, 36, 80));
    let normalizer = normalizer_for(FixedDetector::with_face(face), AspectRatio::SQUARE);

    let composited = normalizer
        .replace_background(&photo, &CompositeSpec::solid([255, 255, 255]))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.jpg");
    let bytes = photonorm::encode_image(&composited, OutputFormat::Jpeg, 90).unwrap();
    std::fs::write(&path, &bytes).unwrap();

    let reread = std::fs::read(&path).unwrap();
    let decoded = photonorm::decode_image(&reread).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (72, 96));
}

#[test]
fn decode_failure_surfaces_immediately() {
    let normalizer = normalizer_for(FixedDetector::blind(), AspectRatio::SQUARE);
    let err = normalizer.compute_crop_from_bytes(b"definitely not an image").unwrap_err();
    assert!(matches!(err, PhotoNormError::Decode(_)));
}
