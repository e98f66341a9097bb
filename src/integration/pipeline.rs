//! Ready-made session wiring the colour detector and the block matcher.

use crate::integration::{BlockMatcher, ColorDetector};
use crate::tracker::{SessionConfig, TrackerError, TrackingSession};

/// A tracking session for the shell game using the built-in pixel collaborators.
pub type CupTracker = TrackingSession<ColorDetector, BlockMatcher>;

impl TrackingSession<ColorDetector, BlockMatcher> {
    /// Create a cup tracker from a full configuration.
    pub fn from_config(config: SessionConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let detector = ColorDetector::new(config.detector.clone(), config.cardinality)?;
        let estimator = BlockMatcher::new(config.motion.clone())?;
        TrackingSession::new(config, detector, estimator)
    }

    /// Create a cup tracker for three cups with default thresholds.
    pub fn with_default_config() -> Result<Self, TrackerError> {
        Self::from_config(SessionConfig::default())
    }
}
