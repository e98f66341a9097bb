//! Colour-threshold cup detector built on `imageproc`.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

use crate::tracker::{DetectionSource, DetectorConfig, MAX_CARDINALITY, Region, TrackerError};

/// Segments cups by HSV range, cleans the mask and keeps the largest blobs.
///
/// Stateless between calls: the same frame always yields the same regions.
#[derive(Debug, Clone)]
pub struct ColorDetector {
    config: DetectorConfig,
    max_regions: usize,
}

impl ColorDetector {
    /// Create a detector that returns at most `max_regions` regions per frame.
    pub fn new(config: DetectorConfig, max_regions: usize) -> Result<Self, TrackerError> {
        config.validate()?;
        if max_regions == 0 || max_regions > MAX_CARDINALITY {
            return Err(TrackerError::invalid(
                "max_regions",
                format!("must be in 1..={MAX_CARDINALITY}, got {max_regions}"),
            ));
        }
        Ok(Self {
            config,
            max_regions,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Binary mask of pixels inside the configured HSV range, cleaned by
    /// closing then opening.
    pub fn mask(&self, frame: &RgbImage) -> GrayImage {
        let (lower, upper) = (self.config.hsv_lower, self.config.hsv_upper);
        let mut mask = GrayImage::new(frame.width(), frame.height());
        for (x, y, pixel) in frame.enumerate_pixels() {
            let hsv = rgb_to_hsv(pixel.0);
            let inside = (0..3).all(|c| lower[c] <= hsv[c] && hsv[c] <= upper[c]);
            if inside {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let k = self.config.morph_radius;
        if k > 0 {
            mask = close(&mask, Norm::LInf, k);
            mask = open(&mask, Norm::LInf, k);
        }
        mask
    }

    fn candidate(&self, contour: &Contour<i32>) -> Option<(Region, f32)> {
        if contour.border_type != BorderType::Outer || contour.parent.is_some() {
            return None;
        }

        let area = polygon_area(contour);
        if area <= self.config.min_area {
            return None;
        }

        let min_x = contour.points.iter().map(|p| p.x).min()?;
        let max_x = contour.points.iter().map(|p| p.x).max()?;
        let min_y = contour.points.iter().map(|p| p.y).min()?;
        let max_y = contour.points.iter().map(|p| p.y).max()?;
        let width = (max_x - min_x + 1) as u32;
        let height = (max_y - min_y + 1) as u32;
        if width <= self.config.min_width || height <= self.config.min_height {
            return None;
        }

        Some((
            Region::new(min_x as f32, min_y as f32, width as f32, height as f32),
            area,
        ))
    }
}

impl DetectionSource for ColorDetector {
    fn detect(&mut self, frame: &RgbImage) -> Vec<Region> {
        let mask = self.mask(frame);
        let mut candidates: Vec<(Region, f32)> = find_contours::<i32>(&mask)
            .iter()
            .filter_map(|c| self.candidate(c))
            .collect();

        if candidates.len() > self.max_regions {
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
            candidates.truncate(self.max_regions);
        }

        let mut regions: Vec<Region> = candidates.into_iter().map(|(r, _)| r).collect();
        regions.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        regions
    }
}

/// Area enclosed by a contour's boundary polygon (shoelace formula).
fn polygon_area(contour: &Contour<i32>) -> f32 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f32 / 2.0
}

/// RGB to HSV with H in 0..=180 and S, V in 0..=255.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}
