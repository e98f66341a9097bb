//! Per-frame orchestration of detection, correspondence and identity state.

use image::{GrayImage, RgbImage, imageops};
use tracing::{debug, info, warn};

use crate::tracker::config::SessionConfig;
use crate::tracker::corresponder::{Correspondence, Corresponder, RedetectPolicy};
use crate::tracker::error::{TrackerError, TrackingWarning};
use crate::tracker::identity::{Identity, IdentityTable};
use crate::tracker::oracle::BallOracle;
use crate::tracker::region::Region;
use crate::tracker::source::{DetectionSource, MotionEstimator};
use crate::tracker::track_state::{SessionState, Strategy};

/// Identity-to-region mapping produced for one frame.
///
/// Unmapped identities keep their last known region inside the session but
/// have no box on this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    regions: Vec<Option<Region>>,
}

impl Assignment {
    pub fn new(regions: Vec<Option<Region>>) -> Self {
        Self { regions }
    }

    pub fn get(&self, identity: Identity) -> Option<Region> {
        self.regions.get(identity.index()).copied().flatten()
    }

    /// Number of identity slots, mapped or not.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// True when no identity is mapped on this frame.
    pub fn is_empty(&self) -> bool {
        self.mapped_count() == 0
    }

    pub fn mapped_count(&self) -> usize {
        self.regions.iter().filter(|r| r.is_some()).count()
    }

    pub fn iter_mapped(&self) -> impl Iterator<Item = (Identity, Region)> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|r| (Identity::new(i), r)))
    }

    pub fn as_slice(&self) -> &[Option<Region>] {
        &self.regions
    }
}

/// Everything the rendering layer needs for one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// 1-based index of the processed frame.
    pub frame_index: u64,
    pub strategy: Strategy,
    pub state: SessionState,
    pub assignment: Assignment,
    /// Identity currently believed to hold the ball.
    pub holder: Option<Identity>,
    /// Trajectory per identity, oldest point first.
    pub histories: Vec<Vec<(f32, f32)>>,
    pub warnings: Vec<TrackingWarning>,
}

/// Fixed-cardinality tracking session.
///
/// Frames must be fed in order: propagation on frame N depends on the
/// assignment of frame N - 1.
pub struct TrackingSession<D: DetectionSource, E: MotionEstimator> {
    detector: D,
    estimator: E,
    config: SessionConfig,
    policy: RedetectPolicy,
    corresponder: Corresponder,
    tracks: IdentityTable,
    /// Luma plane of the last frame that produced at least one region.
    previous_frame: Option<GrayImage>,
    frame_index: u64,
    last_detections: Vec<Region>,
    state: SessionState,
    redetect_count: u64,
}

impl<D: DetectionSource, E: MotionEstimator> TrackingSession<D, E> {
    /// Create a session; fails before any frame is seen if `config` is invalid.
    pub fn new(config: SessionConfig, detector: D, estimator: E) -> Result<Self, TrackerError> {
        config.validate()?;
        info!(
            cardinality = config.cardinality,
            redetect_interval = config.redetect_interval,
            history_capacity = config.history_capacity,
            "tracking session created"
        );
        Ok(Self {
            detector,
            estimator,
            policy: RedetectPolicy::new(config.redetect_interval),
            corresponder: Corresponder::new(config.max_match_distance),
            tracks: IdentityTable::new(config.cardinality, config.history_capacity),
            previous_frame: None,
            frame_index: 0,
            last_detections: Vec::new(),
            state: SessionState::Uninitialized,
            redetect_count: 0,
            config,
        })
    }

    /// Process a single frame and return the identity assignment and ball holder.
    pub fn process_frame(&mut self, frame: &RgbImage) -> FrameReport {
        self.frame_index += 1;
        let frame_index = self.frame_index;
        let strategy = self.policy.strategy_for(frame_index);
        let luma = imageops::grayscale(frame);
        let previous = self.tracks.last_known_regions();

        let correspondence = match strategy {
            Strategy::Redetect => {
                self.redetect_count += 1;
                let (width, height) = frame.dimensions();
                let raw = self.detector.detect(frame);
                let found = raw.len();
                let mut detections: Vec<Region> = raw
                    .into_iter()
                    .filter(Region::is_valid)
                    .map(|r| r.clamp_to(width, height))
                    .collect();
                if detections.len() < found {
                    debug!(
                        frame = frame_index,
                        dropped = found - detections.len(),
                        "discarding empty detections"
                    );
                }
                detections.truncate(self.config.cardinality);
                let out = self.corresponder.rematch(&previous, &detections);
                self.last_detections = detections;
                out
            }
            Strategy::Propagate => match &self.previous_frame {
                Some(previous_frame) => {
                    self.corresponder
                        .propagate(&self.estimator, previous_frame, &luma, &previous)
                }
                None => Correspondence {
                    regions: vec![None; previous.len()],
                    ..Default::default()
                },
            },
        };

        let mut warnings = Vec::new();
        for contest in &correspondence.contests {
            let winner = Identity::new(contest.winner);
            let loser = Identity::new(contest.loser);
            warn!(
                frame = frame_index,
                region = contest.detection,
                "ambiguous correspondence: {winner} keeps the region, {loser} left unmatched"
            );
            warnings.push(TrackingWarning::AmbiguousCorrespondence {
                frame: frame_index,
                region: contest.detection,
                winner,
                loser,
            });
        }

        for (index, region) in correspondence.regions.iter().enumerate() {
            self.tracks.update(Identity::new(index), *region, frame_index);
        }

        let streak_limit = self.config.miss_streak_warning;
        for track in self.tracks.iter() {
            let missed_frames = track.missed_frames();
            // Never-bound identities have nothing to lose track of.
            if missed_frames < streak_limit || track.last_seen_frame().is_none() {
                continue;
            }
            if missed_frames == streak_limit {
                warn!(
                    frame = frame_index,
                    missed_frames,
                    "{} has not been located recently",
                    track.identity()
                );
            }
            warnings.push(TrackingWarning::LowConfidence {
                identity: track.identity(),
                missed_frames,
            });
        }

        let mapped = correspondence.mapped_count();
        if mapped == 0 {
            warn!(frame = frame_index, ?strategy, "no regions this frame");
            warnings.push(TrackingWarning::NoDetection { frame: frame_index });
            self.state = SessionState::Degraded;
        } else {
            if self.state == SessionState::Degraded {
                info!(frame = frame_index, mapped, "tracking recovered");
            }
            self.state = SessionState::Tracking;
            self.previous_frame = Some(luma);
        }

        let holder = BallOracle::holder(&self.tracks);
        debug!(
            frame = frame_index,
            ?strategy,
            mapped,
            holder = ?holder.map(Identity::index),
            "frame processed"
        );

        FrameReport {
            frame_index,
            strategy,
            state: self.state,
            assignment: Assignment::new(correspondence.regions),
            holder,
            histories: self.tracks.history_snapshot(),
            warnings,
        }
    }

    /// Record that the ball is under `identity`. Out-of-range indices change nothing.
    pub fn mark(&mut self, identity: usize) -> Result<(), TrackerError> {
        self.tracks.mark(identity).inspect_err(|err| {
            warn!("mark ignored: {err}");
        })
    }

    pub fn unmark(&mut self) {
        self.tracks.unmark();
        info!("ball mark cleared");
    }

    /// Clear the mark and all trajectories; identities and regions are kept.
    pub fn reset(&mut self) {
        self.tracks.reset();
        self.state = SessionState::Tracking;
        info!(frame = self.frame_index, "tracking reset");
    }

    pub fn holder(&self) -> Option<Identity> {
        BallOracle::holder(&self.tracks)
    }

    pub fn holder_region(&self) -> Option<(Identity, Region)> {
        BallOracle::holder_region(&self.tracks)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Number of frames handled by re-detection so far.
    pub fn redetect_count(&self) -> u64 {
        self.redetect_count
    }

    pub fn tracks(&self) -> &IdentityTable {
        &self.tracks
    }

    /// Regions returned by the most recent re-detection, left to right.
    pub fn last_detections(&self) -> &[Region] {
        &self.last_detections
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a reference to the underlying motion estimator.
    pub fn estimator(&self) -> &E {
        &self.estimator
    }
}
