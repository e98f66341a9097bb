//! Frame-to-frame binding of identities to regions.

use image::GrayImage;
use tracing::debug;

use crate::tracker::matching::{self, AssignmentResult, Contest};
use crate::tracker::region::Region;
use crate::tracker::source::MotionEstimator;
use crate::tracker::track_state::Strategy;

/// Chooses re-detection on frames 1, 1 + M, 1 + 2M, ... and propagation otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedetectPolicy {
    interval: u32,
}

impl RedetectPolicy {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    /// `frame_index` is 1-based.
    pub fn strategy_for(&self, frame_index: u64) -> Strategy {
        if frame_index.saturating_sub(1) % u64::from(self.interval) == 0 {
            Strategy::Redetect
        } else {
            Strategy::Propagate
        }
    }
}

/// Result of one correspondence step, indexed by identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondence {
    /// New region per identity; `None` keeps the identity's last known region.
    pub regions: Vec<Option<Region>>,
    /// Tie-breaks applied during re-detection, with rows mapped to identity indices.
    pub contests: Vec<Contest>,
    /// Detected regions no identity took.
    pub unmatched_detections: Vec<usize>,
}

impl Correspondence {
    pub fn mapped_count(&self) -> usize {
        self.regions.iter().filter(|r| r.is_some()).count()
    }
}

#[derive(Debug, Clone)]
pub struct Corresponder {
    max_distance: f32,
}

impl Corresponder {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }

    /// Bind freshly detected regions to identities by gated minimum-distance assignment.
    ///
    /// `previous` holds each identity's last known region. Identities that were
    /// never bound pick up leftover detections left to right.
    pub fn rematch(&self, previous: &[Option<Region>], detections: &[Region]) -> Correspondence {
        let bound: Vec<(usize, Region)> = previous
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|r| (i, r)))
            .collect();
        let rows: Vec<Region> = bound.iter().map(|(_, r)| *r).collect();

        let cost = matching::center_distance(&rows, detections);
        let (
            AssignmentResult {
                matches,
                unmatched_detections,
                ..
            },
            contests,
        ) = matching::solve(&cost, self.max_distance);

        let mut regions = vec![None; previous.len()];
        for (row, col) in matches {
            regions[bound[row].0] = Some(detections[col]);
        }

        let mut leftovers = unmatched_detections;
        leftovers.sort_by(|&a, &b| detections[a].x.total_cmp(&detections[b].x));
        let mut leftovers = leftovers.into_iter();
        let mut unmatched_detections = Vec::new();
        for (identity, slot) in regions.iter_mut().enumerate() {
            if previous[identity].is_some() {
                continue;
            }
            if let Some(col) = leftovers.next() {
                debug!(identity, detection = col, "binding new identity");
                *slot = Some(detections[col]);
            }
        }
        unmatched_detections.extend(leftovers);

        let contests = contests
            .into_iter()
            .map(|c| Contest {
                detection: c.detection,
                winner: bound[c.winner].0,
                loser: bound[c.loser].0,
            })
            .collect();

        Correspondence {
            regions,
            contests,
            unmatched_detections,
        }
    }

    /// Move every known region by its estimated local motion.
    ///
    /// A low-confidence estimate leaves the identity unmapped so that it keeps
    /// its previous region.
    pub fn propagate<E: MotionEstimator + ?Sized>(
        &self,
        estimator: &E,
        previous_frame: &GrayImage,
        current_frame: &GrayImage,
        previous: &[Option<Region>],
    ) -> Correspondence {
        let (width, height) = current_frame.dimensions();
        let regions = previous
            .iter()
            .enumerate()
            .map(|(identity, region)| {
                let region = region.as_ref()?;
                let flow = estimator.estimate(previous_frame, current_frame, region);
                if flow.is_tracked() {
                    Some(region.translate(flow.dx, flow.dy).clamp_to(width, height))
                } else {
                    debug!(identity, status = ?flow.status, "keeping stale region");
                    None
                }
            })
            .collect();

        Correspondence {
            regions,
            contests: Vec::new(),
            unmatched_detections: Vec::new(),
        }
    }
}
