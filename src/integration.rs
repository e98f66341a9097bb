//! Pixel-level collaborators for the tracking core.
//!
//! [`ColorDetector`] implements [`DetectionSource`](crate::tracker::DetectionSource)
//! by colour segmentation and [`BlockMatcher`] implements
//! [`MotionEstimator`](crate::tracker::MotionEstimator) by windowed block
//! matching. [`CupTracker`] wires both into a session.

mod block_matcher;
mod color_detector;
mod pipeline;

pub use block_matcher::BlockMatcher;
pub use color_detector::{ColorDetector, rgb_to_hsv};
pub use pipeline::CupTracker;
