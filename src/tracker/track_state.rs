/// Lifecycle of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No frame processed yet
    #[default]
    Uninitialized,
    /// At least one identity is bound to a region this frame
    Tracking,
    /// Correspondence produced no region this frame; stored state is retained
    Degraded,
}

/// Which correspondence strategy handled a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Full detection followed by assignment against the previous identities.
    Redetect,
    /// Previous regions moved by frame-to-frame motion estimation.
    Propagate,
}
