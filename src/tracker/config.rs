//! Session configuration and its validation.

use serde::{Deserialize, Serialize};

use crate::tracker::error::TrackerError;

/// Largest number of identities a session accepts.
pub const MAX_CARDINALITY: usize = 64;

/// Configuration for a [`TrackingSession`](crate::tracker::TrackingSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of tracked objects.
    pub cardinality: usize,
    /// Re-detect every this many frames; propagate motion in between.
    pub redetect_interval: u32,
    /// Trajectory points kept per identity.
    pub history_capacity: usize,
    /// Center distance beyond which a detection is never matched to an identity.
    pub max_match_distance: f32,
    /// Consecutive misses after which an identity is reported as low confidence.
    pub miss_streak_warning: u32,
    pub detector: DetectorConfig,
    pub motion: MotionConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cardinality: 3,
            redetect_interval: 10,
            history_capacity: 30,
            max_match_distance: 150.0,
            miss_streak_warning: 5,
            detector: DetectorConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

/// Colour segmentation and contour filtering thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Inclusive lower HSV bound (H in 0..=180).
    pub hsv_lower: [u8; 3],
    /// Inclusive upper HSV bound (H in 0..=180).
    pub hsv_upper: [u8; 3],
    /// Radius of the square closing/opening kernel; 0 disables morphology.
    pub morph_radius: u8,
    pub min_area: f32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hsv_lower: [0, 0, 50],
            hsv_upper: [180, 255, 255],
            morph_radius: 2,
            min_area: 1000.0,
            min_width: 30,
            min_height: 30,
        }
    }
}

/// Block-matching parameters for motion propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Largest per-axis displacement searched between two frames.
    pub search_radius: u32,
    /// Grid step of the coarse search pass.
    pub coarse_step: u32,
    /// Context added around the region when cutting the template.
    pub template_margin: u32,
    /// Template pixels are sampled every `sample_stride` pixels.
    pub sample_stride: u32,
    /// Mean absolute luma difference above which a match is rejected.
    pub max_residual: f32,
    /// Minimum luma standard deviation of a usable template.
    pub min_contrast: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            search_radius: 48,
            coarse_step: 4,
            template_margin: 8,
            sample_stride: 2,
            max_residual: 25.0,
            min_contrast: 4.0,
        }
    }
}

impl SessionConfig {
    /// Check every threshold before any frame is processed.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.cardinality == 0 || self.cardinality > MAX_CARDINALITY {
            return Err(TrackerError::invalid(
                "cardinality",
                format!("must be in 1..={MAX_CARDINALITY}, got {}", self.cardinality),
            ));
        }
        if self.redetect_interval == 0 {
            return Err(TrackerError::invalid("redetect_interval", "must be at least 1"));
        }
        if self.history_capacity == 0 {
            return Err(TrackerError::invalid("history_capacity", "must be at least 1"));
        }
        if !self.max_match_distance.is_finite() || self.max_match_distance <= 0.0 {
            return Err(TrackerError::invalid(
                "max_match_distance",
                format!("must be finite and positive, got {}", self.max_match_distance),
            ));
        }
        if self.miss_streak_warning == 0 {
            return Err(TrackerError::invalid("miss_streak_warning", "must be at least 1"));
        }
        self.detector.validate()?;
        self.motion.validate()
    }
}

impl DetectorConfig {
    pub(crate) fn validate(&self) -> Result<(), TrackerError> {
        if self.hsv_lower[0] > 180 || self.hsv_upper[0] > 180 {
            return Err(TrackerError::invalid("hsv", "hue bounds must be at most 180"));
        }
        if self
            .hsv_lower
            .iter()
            .zip(self.hsv_upper.iter())
            .any(|(lo, hi)| lo > hi)
        {
            return Err(TrackerError::invalid(
                "hsv",
                format!(
                    "lower bound {:?} exceeds upper bound {:?}",
                    self.hsv_lower, self.hsv_upper
                ),
            ));
        }
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(TrackerError::invalid(
                "min_area",
                format!("must be finite and non-negative, got {}", self.min_area),
            ));
        }
        Ok(())
    }
}

impl MotionConfig {
    pub(crate) fn validate(&self) -> Result<(), TrackerError> {
        if self.search_radius == 0 {
            return Err(TrackerError::invalid("search_radius", "must be at least 1"));
        }
        if self.coarse_step == 0 || self.coarse_step > self.search_radius {
            return Err(TrackerError::invalid(
                "coarse_step",
                format!("must be in 1..={}, got {}", self.search_radius, self.coarse_step),
            ));
        }
        if self.sample_stride == 0 {
            return Err(TrackerError::invalid("sample_stride", "must be at least 1"));
        }
        if !self.max_residual.is_finite() || self.max_residual < 0.0 {
            return Err(TrackerError::invalid(
                "max_residual",
                format!("must be finite and non-negative, got {}", self.max_residual),
            ));
        }
        if !self.min_contrast.is_finite() || self.min_contrast < 0.0 {
            return Err(TrackerError::invalid(
                "min_contrast",
                format!("must be finite and non-negative, got {}", self.min_contrast),
            ));
        }
        Ok(())
    }
}
