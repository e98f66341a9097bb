//! Identity-preserving tracker for the three-cup shell game.
//!
//! Cups are found by colour segmentation, carried between frames by local
//! block matching and periodically re-anchored by re-detection plus a gated
//! minimum-distance assignment. The ball is never tracked visually: it is a
//! mark attached to one cup identity, so "where is the ball" reduces to
//! "where is that identity now".
//!
//! ```no_run
//! use cuptrack_rs::CupTracker;
//!
//! # fn frames() -> Vec<image::RgbImage> { Vec::new() }
//! let mut tracker = CupTracker::with_default_config()?;
//! for (i, frame) in frames().iter().enumerate() {
//!     if i == 0 {
//!         tracker.process_frame(frame);
//!         tracker.mark(0)?;
//!         continue;
//!     }
//!     let report = tracker.process_frame(frame);
//!     if let Some(holder) = report.holder {
//!         println!("ball -> {holder}");
//!     }
//! }
//! # Ok::<(), cuptrack_rs::TrackerError>(())
//! ```

pub mod integration;
pub mod tracker;

pub use integration::{BlockMatcher, ColorDetector, CupTracker};
pub use tracker::{
    Assignment, BallOracle, DetectionSource, FrameReport, Identity, IdentityTable, IdentityTrack,
    MotionEstimator, Region, SessionConfig, SessionState, Strategy, TrackerError, TrackingSession,
    TrackingWarning,
};
