//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{load_frame, load_points, load_track_records, Frame, LoaderError, Point, TrackRecord};
pub use writers::{ensure_dir, remove_stale_file, write_points_tsv, write_trajectory_tsv, WriteError};
