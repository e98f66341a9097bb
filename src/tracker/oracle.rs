//! Answers "which cup holds the ball" from the identity marks alone.

use crate::tracker::identity::{Identity, IdentityTable};
use crate::tracker::region::Region;

/// Stateless query over an [`IdentityTable`].
///
/// The ball is never tracked visually: it stays with the marked identity, so
/// the answer is only as good as the identity-to-region binding.
pub struct BallOracle;

impl BallOracle {
    pub fn holder(tracks: &IdentityTable) -> Option<Identity> {
        tracks.marked()
    }

    /// The holder together with its last known region, if it has one.
    pub fn holder_region(tracks: &IdentityTable) -> Option<(Identity, Region)> {
        let identity = tracks.marked()?;
        let region = tracks.get(identity)?.current_region()?;
        Some((identity, region))
    }
}
