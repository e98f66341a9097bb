mod config;
mod corresponder;
mod error;
mod identity;
mod matching;
mod oracle;
mod region;
mod session;
mod source;
mod track_state;

pub use config::{DetectorConfig, MAX_CARDINALITY, MotionConfig, SessionConfig};
pub use corresponder::{Correspondence, Corresponder, RedetectPolicy};
pub use error::{TrackerError, TrackingWarning};
pub use identity::{Identity, IdentityTable, IdentityTrack};
pub use matching::{AssignmentResult, Contest};
pub use oracle::BallOracle;
pub use region::Region;
pub use session::{Assignment, FrameReport, TrackingSession};
pub use source::{DetectionSource, FlowStatus, MotionEstimator, PointFlow};
pub use track_state::{SessionState, Strategy};
