//! Foreground segmentation via iterative trimap refinement
//!
//! Separates a subject from its background inside a caller-supplied region
//! of interest. The trimap seeds everything outside the region as definite
//! background and everything inside as probable foreground; refinement
//! iterations re-fit a color model per population and re-assign the probable
//! pixels to the nearer model, with a local majority vote keeping the
//! labeling spatially coherent. The binary mask is the union of definite and
//! probable foreground, smoothed by a mandatory growing-kernel morphological
//! closing — raw assignment output is noisy at hair and fabric edges.

use crate::config::SegmentationConfig;
use crate::error::{PhotoNormError, Result};
use crate::types::{BoundingBox, Mask};
use image::{GrayImage, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use ndarray::Array2;
use tracing::{debug, debug_span};

/// Cap on the number of pixels sampled into each color model
const MAX_MODEL_SAMPLES: usize = 16_384;

/// Lloyd iterations per color-model fit
const KMEANS_ITERATIONS: usize = 8;

/// Trimap labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Background,
    ProbableBackground,
    ProbableForeground,
}

impl Label {
    fn is_foreground(self) -> bool {
        matches!(self, Label::ProbableForeground)
    }

    fn is_probable(self) -> bool {
        matches!(self, Label::ProbableBackground | Label::ProbableForeground)
    }
}

/// Iterative trimap segmenter
#[derive(Debug, Clone)]
pub struct ForegroundSegmenter {
    config: SegmentationConfig,
}

impl ForegroundSegmenter {
    /// Create a segmenter with the given configuration
    #[must_use]
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// Segment the subject inside `region`, returning a binary mask with the
    /// source image's dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoNormError::SegmentationFailed`] when the region has
    /// zero area (before or after clamping to the image).
    pub fn segment(&self, image: &RgbImage, region: &BoundingBox) -> Result<Mask> {
        let (width, height) = image.dimensions();
        let region = region.clamped_to(width, height);
        if region.width == 0 || region.height == 0 {
            return Err(PhotoNormError::segmentation(format!(
                "region of interest has zero area: {region:?}"
            )));
        }

        let span = debug_span!(
            "segment",
            width,
            height,
            region_w = region.width,
            region_h = region.height
        );
        let _enter = span.enter();

        let mut labels = self.initial_trimap(width, height, &region);
        self.refine(image, &mut labels, &region);

        let raw = labels_to_mask_image(&labels, width, height);
        let closed = self.close_mask(raw);
        Ok(Mask::from_image(&closed))
    }

    /// Seed the trimap: background outside the region, probable foreground
    /// inside.
    fn initial_trimap(&self, width: u32, height: u32, region: &BoundingBox) -> Array2<Label> {
        let mut labels = Array2::from_elem((height as usize, width as usize), Label::Background);
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                labels[[y as usize, x as usize]] = Label::ProbableForeground;
            }
        }
        labels
    }

    /// Run the refinement iterations until the cap or convergence.
    fn refine(&self, image: &RgbImage, labels: &mut Array2<Label>, region: &BoundingBox) {
        for iteration in 0..self.config.iterations {
            let foreground = ColorModel::fit(image, labels, true, self.config.clusters);
            let background = ColorModel::fit(image, labels, false, self.config.clusters);
            if foreground.is_empty() || background.is_empty() {
                debug!(iteration, "a population is empty, labeling is stable");
                break;
            }

            let mut changed = 0usize;
            for y in region.y..region.bottom() {
                for x in region.x..region.right() {
                    let idx = [y as usize, x as usize];
                    let current = labels[idx];
                    if !current.is_probable() {
                        continue;
                    }
                    let pixel = pixel_color(image, x, y);
                    // Strict inequality: pixels scoring equally under both
                    // models read as background, so region padding around
                    // the subject peels away.
                    let next = if foreground.score(pixel) < background.score(pixel) {
                        Label::ProbableForeground
                    } else {
                        Label::ProbableBackground
                    };
                    if next != current {
                        labels[idx] = next;
                        changed += 1;
                    }
                }
            }

            changed += smooth_labels(labels, region);

            if changed == 0 {
                debug!(iteration, "converged");
                break;
            }
        }
    }

    /// Growing-kernel closing passes over the raw mask.
    fn close_mask(&self, mut mask: GrayImage) -> GrayImage {
        for pass in 0..self.config.closing_passes {
            let radius = u8::try_from(u32::from(self.config.closing_base_radius) + pass)
                .unwrap_or(u8::MAX);
            mask = close(&mask, Norm::L2, radius);
        }
        mask
    }
}

/// A fitted color model: weighted k-means cluster centroids over one
/// population. Cluster weights make rare colors expensive to explain, so a
/// handful of subject-colored pixels on the wrong side of the region seed
/// does not hijack the assignment.
struct ColorModel {
    centroids: Vec<[f32; 3]>,
    weights: Vec<f32>,
}

/// Scale applied to the normalized squared color distance relative to the
/// cluster-weight term
const COLOR_WEIGHT: f32 = 4.0;

impl ColorModel {
    /// Fit centroids over the pixels whose label belongs to the requested
    /// population. Sampling is strided and deterministic.
    fn fit(image: &RgbImage, labels: &Array2<Label>, foreground: bool, clusters: usize) -> Self {
        let matches = |label: Label| label.is_foreground() == foreground;

        let total = labels.iter().filter(|&&l| matches(l)).count();
        if total == 0 {
            return Self {
                centroids: Vec::new(),
                weights: Vec::new(),
            };
        }
        let stride = (total / MAX_MODEL_SAMPLES).max(1);

        let mut samples = Vec::with_capacity(total.min(MAX_MODEL_SAMPLES) + 1);
        let mut seen = 0usize;
        for (y, row) in labels.outer_iter().enumerate() {
            for (x, &label) in row.iter().enumerate() {
                if !matches(label) {
                    continue;
                }
                if seen % stride == 0 {
                    samples.push(pixel_color(image, x as u32, y as u32));
                }
                seen += 1;
            }
        }

        let centroids = kmeans(&samples, clusters.min(samples.len()));

        // Cluster weights: the fraction of samples nearest each centroid
        let mut counts = vec![0usize; centroids.len()];
        for sample in &samples {
            if let Some(nearest) = nearest_centroid(&centroids, *sample) {
                counts[nearest] += 1;
            }
        }
        let weights = counts
            .iter()
            .map(|&c| c as f32 / samples.len() as f32)
            .collect();

        Self { centroids, weights }
    }

    fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Negative-log-likelihood style score: normalized squared distance to a
    /// centroid plus the cost of that centroid's rarity, minimized over
    /// clusters. Lower is a better fit.
    fn score(&self, pixel: [f32; 3]) -> f32 {
        self.centroids
            .iter()
            .zip(&self.weights)
            .filter(|(_, &w)| w > 0.0)
            .map(|(c, &w)| {
                let dist = squared_distance(*c, pixel) / (255.0 * 255.0);
                dist * COLOR_WEIGHT - w.ln()
            })
            .fold(f32::INFINITY, f32::min)
    }
}

/// Index of the closest centroid by plain squared distance
fn nearest_centroid(centroids: &[[f32; 3]], sample: [f32; 3]) -> Option<usize> {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            squared_distance(**a, sample)
                .partial_cmp(&squared_distance(**b, sample))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// Deterministic k-means: centroids seeded from luminance-sorted samples at
/// even spacing, then a fixed number of Lloyd iterations.
fn kmeans(samples: &[[f32; 3]], k: usize) -> Vec<[f32; 3]> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| {
        luminance(samples[a])
            .partial_cmp(&luminance(samples[b]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Seed centroids at even spacing over the sorted range
    let mut centroids: Vec<[f32; 3]> = (0..k)
        .map(|i| {
            let pos = if k == 1 {
                0
            } else {
                i * (samples.len() - 1) / (k - 1)
            };
            samples[order[pos]]
        })
        .collect();

    for _ in 0..KMEANS_ITERATIONS {
        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];

        for sample in samples {
            let nearest = nearest_centroid(&centroids, *sample).unwrap_or(0);
            for c in 0..3 {
                sums[nearest][c] += f64::from(sample[c]);
            }
            counts[nearest] += 1;
        }

        for (i, centroid) in centroids.iter_mut().enumerate() {
            if counts[i] > 0 {
                for c in 0..3 {
                    centroid[c] = (sums[i][c] / counts[i] as f64) as f32;
                }
            }
            // Empty clusters keep their previous centroid
        }
    }

    centroids
}

/// 3×3 majority vote over the probable band; returns the number of labels
/// flipped.
fn smooth_labels(labels: &mut Array2<Label>, region: &BoundingBox) -> usize {
    let snapshot = labels.clone();
    let (rows, cols) = snapshot.dim();
    let mut changed = 0usize;

    for y in region.y..region.bottom() {
        for x in region.x..region.right() {
            let idx = [y as usize, x as usize];
            let current = snapshot[idx];
            if !current.is_probable() {
                continue;
            }

            let mut foreground_neighbors = 0u32;
            let mut total = 0u32;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dy == 0 && dx == 0 {
                        continue;
                    }
                    let ny = i64::from(y) + dy;
                    let nx = i64::from(x) + dx;
                    if ny < 0 || nx < 0 || ny >= rows as i64 || nx >= cols as i64 {
                        continue;
                    }
                    total += 1;
                    if snapshot[[ny as usize, nx as usize]].is_foreground() {
                        foreground_neighbors += 1;
                    }
                }
            }

            // Flip only on a clear majority
            let next = if foreground_neighbors * 3 >= total * 2 {
                Label::ProbableForeground
            } else if foreground_neighbors * 3 <= total {
                Label::ProbableBackground
            } else {
                current
            };
            if next != current {
                labels[idx] = next;
                changed += 1;
            }
        }
    }

    changed
}

fn labels_to_mask_image(labels: &Array2<Label>, width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for (y, row) in labels.outer_iter().enumerate() {
        for (x, &label) in row.iter().enumerate() {
            if label.is_foreground() {
                mask.put_pixel(x as u32, y as u32, image::Luma([Mask::FOREGROUND]));
            }
        }
    }
    mask
}

fn pixel_color(image: &RgbImage, x: u32, y: u32) -> [f32; 3] {
    let p = image.get_pixel(x, y).0;
    [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])]
}

fn squared_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn luminance(p: [f32; 3]) -> f32 {
    0.299 * p[0] + 0.587 * p[1] + 0.114 * p[2]
}
