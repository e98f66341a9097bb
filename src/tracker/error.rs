//! Error and warning types for the tracking core.

use thiserror::Error;

use crate::tracker::identity::Identity;

/// Fatal or rejected operations.
///
/// Everything that can go wrong while processing a frame is recoverable and is
/// reported as a [`TrackingWarning`] instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// A configuration value is outside its valid range.
    #[error("invalid configuration: `{field}` {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },
    /// A mark command named an identity that does not exist.
    #[error("identity {identity} is out of range for {cardinality} tracked objects")]
    MarkOutOfRange { identity: usize, cardinality: usize },
}

impl TrackerError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}

/// Non-fatal conditions surfaced alongside a frame result.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingWarning {
    /// Correspondence produced no region at all for this frame.
    NoDetection { frame: u64 },
    /// Two identities were equally close to one detected region.
    AmbiguousCorrespondence {
        frame: u64,
        /// Index of the contested region in the detection set.
        region: usize,
        winner: Identity,
        loser: Identity,
    },
    /// An identity has gone without a region for too many frames in a row.
    LowConfidence {
        identity: Identity,
        missed_frames: u32,
    },
}
