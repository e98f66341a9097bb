//! Per-cup identity state: last known region, trajectory and the ball mark.

use std::collections::VecDeque;
use std::fmt;

use tracing::info;

use crate::tracker::error::TrackerError;
use crate::tracker::region::Region;

/// Stable label of one physical cup, in `0..cardinality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(usize);

impl Identity {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cup #{}", self.0 + 1)
    }
}

/// Tracking record for a single identity.
#[derive(Debug, Clone)]
pub struct IdentityTrack {
    identity: Identity,
    /// Region currently bound to this identity; stale while correspondence fails.
    current_region: Option<Region>,
    /// Recent region centers, oldest first.
    history: VecDeque<(f32, f32)>,
    capacity: usize,
    marked: bool,
    /// Consecutive frames without a mapped region.
    missed_frames: u32,
    last_seen_frame: Option<u64>,
}

impl IdentityTrack {
    fn new(identity: Identity, capacity: usize) -> Self {
        Self {
            identity,
            current_region: None,
            history: VecDeque::with_capacity(capacity),
            capacity,
            marked: false,
            missed_frames: 0,
            last_seen_frame: None,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn current_region(&self) -> Option<Region> {
        self.current_region
    }

    pub fn history(&self) -> &VecDeque<(f32, f32)> {
        &self.history
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    pub fn last_seen_frame(&self) -> Option<u64> {
        self.last_seen_frame
    }

    fn update(&mut self, region: Option<Region>, frame: u64) {
        match region {
            Some(region) => {
                self.current_region = Some(region);
                if self.history.len() == self.capacity {
                    self.history.pop_front();
                }
                self.history.push_back(region.center());
                self.missed_frames = 0;
                self.last_seen_frame = Some(frame);
            }
            None => {
                self.missed_frames = self.missed_frames.saturating_add(1);
            }
        }
    }
}

/// Owned, fixed-size collection of identity tracks.
///
/// All mutation goes through [`update`](Self::update), [`mark`](Self::mark),
/// [`unmark`](Self::unmark) and [`reset`](Self::reset); at most one track is
/// ever marked.
#[derive(Debug, Clone)]
pub struct IdentityTable {
    tracks: Vec<IdentityTrack>,
}

impl IdentityTable {
    pub fn new(cardinality: usize, history_capacity: usize) -> Self {
        Self {
            tracks: (0..cardinality)
                .map(|i| IdentityTrack::new(Identity::new(i), history_capacity))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, identity: Identity) -> Option<&IdentityTrack> {
        self.tracks.get(identity.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityTrack> {
        self.tracks.iter()
    }

    /// Last known region per identity, in identity order.
    pub fn last_known_regions(&self) -> Vec<Option<Region>> {
        self.tracks.iter().map(|t| t.current_region).collect()
    }

    /// Apply one frame's result to one identity.
    ///
    /// `None` leaves the current region and history untouched and extends the
    /// miss streak.
    pub fn update(&mut self, identity: Identity, region: Option<Region>, frame: u64) {
        if let Some(track) = self.tracks.get_mut(identity.index()) {
            track.update(region, frame);
        }
    }

    /// Mark `identity` as holding the ball and clear the mark everywhere else.
    pub fn mark(&mut self, identity: usize) -> Result<(), TrackerError> {
        if identity >= self.tracks.len() {
            return Err(TrackerError::MarkOutOfRange {
                identity,
                cardinality: self.tracks.len(),
            });
        }
        for track in &mut self.tracks {
            track.marked = track.identity.index() == identity;
        }
        info!("ball marked under {}", Identity::new(identity));
        Ok(())
    }

    /// Clear the mark without touching trajectories.
    pub fn unmark(&mut self) {
        for track in &mut self.tracks {
            track.marked = false;
        }
    }

    /// Clear the mark and every trajectory. Regions are kept.
    pub fn reset(&mut self) {
        for track in &mut self.tracks {
            track.marked = false;
            track.history.clear();
            track.missed_frames = 0;
        }
    }

    pub fn marked(&self) -> Option<Identity> {
        self.tracks.iter().find(|t| t.marked).map(|t| t.identity)
    }

    pub fn history_snapshot(&self) -> Vec<Vec<(f32, f32)>> {
        self.tracks
            .iter()
            .map(|t| t.history.iter().copied().collect())
            .collect()
    }
}
