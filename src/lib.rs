//! Drift correction and trajectory linking for force-indexed particle data.
//!
//! This crate provides tools for:
//! - Loading and writing tab-separated particle coordinate files
//! - Discovering frame files by the force label in their names
//! - Aligning each frame to a fixed reference marker (planar drift correction)
//! - Linking detections across frames into trajectories by greedy
//!   nearest-neighbour matching, and exporting the persistent ones
//! - Plotting exported trajectories
//!
//! # Example
//!
//! ```no_run
//! use force_track::{processors::alignment::align_directory, processors::tracking::track_directory};
//! use force_track::PipelineConfig;
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! align_directory(Path::new("Rd3ns2"), Path::new("Rd3ns2_aligned"), &config).unwrap();
//! track_directory(Path::new("Rd3ns2_aligned"), Path::new("Rd3ns2_trajs"), &config).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use crate::config::{
    AlignmentConfig, ConfigError, NamingConfig, PipelineConfig, TrackingConfig,
};
pub use crate::core::loaders::{Frame, Point, TrackRecord};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
