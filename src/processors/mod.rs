//! Data processing modules.

pub mod alignment;
pub mod discovery;
pub mod tracking;

// Re-export key types for convenience
pub use alignment::{
    align_directory, align_frame, locate_marker, AlignOutcome, AlignedFrame, Aligner,
    AlignmentReport, Offset, SkipReason,
};
pub use discovery::{discover_frames, matching_files, DiscoveryError, ForcePattern, FrameSource};
pub use tracking::{
    find_closest_trajectory, link_frames, resolve_baseline, track_directory, LinkStats,
    TrackingError, TrackingReport, Trajectory, TrajectoryLinker, TrajectorySet,
};
