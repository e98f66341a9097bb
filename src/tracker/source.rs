//! Seams between the tracking core and the pixel-level collaborators.

use image::{GrayImage, RgbImage};

use crate::tracker::region::Region;

/// Appearance-based detector with no notion of identity.
///
/// Implement this trait to plug a different segmentation into a
/// [`TrackingSession`](crate::tracker::TrackingSession).
pub trait DetectionSource {
    /// Return at most `cardinality` candidate regions, ordered left to right.
    ///
    /// Returning fewer regions (or none) is a normal outcome under occlusion
    /// or poor contrast.
    fn detect(&mut self, frame: &RgbImage) -> Vec<Region>;
}

/// Outcome of estimating one region's motion between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    /// Successfully tracked to a new position.
    Tracked,
    /// The estimate is unreliable (flat template or poor match).
    Lost,
    /// No admissible displacement keeps the search window inside the frame.
    OutOfBounds,
}

/// Displacement of a region's center between the previous and current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointFlow {
    pub dx: f32,
    pub dy: f32,
    /// Matching error of the winning displacement (lower is better).
    pub residual: f32,
    pub status: FlowStatus,
}

impl PointFlow {
    pub fn tracked(dx: f32, dy: f32, residual: f32) -> Self {
        Self {
            dx,
            dy,
            residual,
            status: FlowStatus::Tracked,
        }
    }

    pub fn failed(status: FlowStatus) -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            residual: f32::INFINITY,
            status,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.status == FlowStatus::Tracked
    }
}

/// Local frame-to-frame motion estimator working on luma planes.
pub trait MotionEstimator {
    fn estimate(&self, previous: &GrayImage, current: &GrayImage, region: &Region) -> PointFlow;
}
