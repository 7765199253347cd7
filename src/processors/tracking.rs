//! Greedy nearest-neighbour trajectory linking across force-ordered frames.
//!
//! Frames are consumed in strictly increasing force order. Each point is
//! handled on its own:
//!
//! 1. **Match**: find the open trajectory whose most recent point is nearest
//!    in the xy-plane, strictly closer than the threshold
//! 2. **Extend or start**: append the point to that trajectory, or open a new
//!    trajectory holding only this point
//!
//! A trajectory updated by one point stays eligible, at its new position, for
//! the next points of the same frame. This is a greedy, order-dependent pass,
//! not an optimal assignment, and it does not resolve crossing particles: two
//! detections close to the same track are settled by whichever comes first
//! in the file.
//!
//! Once every frame is ingested the linker is closed into a [`TrajectorySet`]
//! and only trajectories observed in every baseline frame are exported.
//!
//! # Example
//!
//! ```
//! use force_track::core::loaders::{Frame, Point};
//! use force_track::processors::tracking::TrajectoryLinker;
//! use std::collections::BTreeSet;
//!
//! let mut linker = TrajectoryLinker::new(0.05);
//! linker.ingest_frame(&Frame::new(1, vec![Point::new(0.0, 0.0, 0.0)])).unwrap();
//! linker.ingest_frame(&Frame::new(2, vec![Point::new(0.01, 0.0, 0.0)])).unwrap();
//!
//! let set = linker.finish();
//! let baseline: BTreeSet<u32> = [1, 2].into_iter().collect();
//! assert_eq!(set.export(&baseline).len(), 1);
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::{check_distance, ConfigError, PipelineConfig, TrackingConfig};
use crate::core::loaders::{load_frame, Frame, Point, TrackRecord};
use crate::core::writers::{ensure_dir, remove_stale_file, write_trajectory_tsv};
use crate::processors::discovery::{discover_frames, matching_files, ForcePattern};

/// Errors raised while linking.
#[derive(Debug, Error, PartialEq)]
pub enum TrackingError {
    #[error("frames out of order: force {force} delivered after {previous}")]
    OutOfOrder { previous: u32, force: u32 },

    #[error(transparent)]
    InvalidThreshold(#[from] ConfigError),
}

/// A chain of linked detections believed to be one particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    id: usize,
    records: Vec<TrackRecord>,
    forces: BTreeSet<u32>,
}

impl Trajectory {
    fn start(id: usize, point: Point, force: u32) -> Self {
        Self {
            id,
            records: vec![TrackRecord::new(point, force)],
            forces: BTreeSet::from([force]),
        }
    }

    fn push(&mut self, point: Point, force: u32) {
        self.records.push(TrackRecord::new(point, force));
        self.forces.insert(force);
    }

    /// 1-based position in order of first appearance.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    /// Force labels in which this trajectory received a point.
    pub fn forces(&self) -> &BTreeSet<u32> {
        &self.forces
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position used for matching: the most recently appended point.
    #[inline]
    pub fn last_point(&self) -> Option<Point> {
        self.records.last().map(TrackRecord::point)
    }

    /// True if every label of `baseline` appears in this trajectory.
    pub fn covers(&self, baseline: &BTreeSet<u32>) -> bool {
        baseline.is_subset(&self.forces)
    }
}

/// Index of the trajectory nearest to `point`, if strictly within `threshold`.
///
/// Trajectories are scanned in insertion order and compared by the 2D
/// distance from their last point. Only a strictly smaller distance replaces
/// the running minimum, which starts at `threshold`: a trajectory at exactly
/// `threshold` is rejected, and on ties the first one scanned wins.
pub fn find_closest_trajectory(
    trajectories: &[Trajectory],
    point: &Point,
    threshold: f64,
) -> Option<usize> {
    let mut min_distance = threshold;
    let mut closest = None;

    for (idx, trajectory) in trajectories.iter().enumerate() {
        let Some(last) = trajectory.last_point() else {
            continue;
        };
        let distance = last.planar_distance(point);
        if distance < min_distance {
            min_distance = distance;
            closest = Some(idx);
        }
    }

    closest
}

/// Counts from linking one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub extended: usize,
    pub started: usize,
}

/// Open trajectory collection accepting points in force order.
#[derive(Debug, Clone)]
pub struct TrajectoryLinker {
    threshold: f64,
    trajectories: Vec<Trajectory>,
    last_force: Option<u32>,
}

impl TrajectoryLinker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            trajectories: Vec::new(),
            last_force: None,
        }
    }

    /// Build a linker, rejecting a threshold that is not a positive distance.
    pub fn from_config(config: &TrackingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.threshold))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Link a single point observed at `force`.
    ///
    /// Returns the id of the trajectory that received the point. Forces must
    /// never decrease between calls; points of one frame share a force.
    pub fn append_point(&mut self, point: Point, force: u32) -> Result<usize, TrackingError> {
        if let Some(previous) = self.last_force {
            if force < previous {
                return Err(TrackingError::OutOfOrder { previous, force });
            }
        }
        self.last_force = Some(force);

        Ok(self.link(point, force).0)
    }

    /// Link every point of a frame, in file order.
    ///
    /// The frame's force must be strictly greater than that of any point
    /// linked before.
    pub fn ingest_frame(&mut self, frame: &Frame) -> Result<LinkStats, TrackingError> {
        if let Some(previous) = self.last_force {
            if frame.force <= previous {
                return Err(TrackingError::OutOfOrder {
                    previous,
                    force: frame.force,
                });
            }
        }
        self.last_force = Some(frame.force);

        let mut stats = LinkStats::default();
        for point in &frame.points {
            if self.link(*point, frame.force).1 {
                stats.started += 1;
            } else {
                stats.extended += 1;
            }
        }

        log::debug!(
            "{}pN: {} points extended, {} trajectories started ({} open)",
            frame.force,
            stats.extended,
            stats.started,
            self.trajectories.len()
        );

        Ok(stats)
    }

    /// Returns the receiving trajectory id and whether it was newly started.
    fn link(&mut self, point: Point, force: u32) -> (usize, bool) {
        match find_closest_trajectory(&self.trajectories, &point, self.threshold) {
            Some(idx) => {
                let trajectory = &mut self.trajectories[idx];
                trajectory.push(point, force);
                (trajectory.id(), false)
            }
            None => {
                let id = self.trajectories.len() + 1;
                self.trajectories.push(Trajectory::start(id, point, force));
                (id, true)
            }
        }
    }

    /// Close the collection. No further points can be appended.
    pub fn finish(self) -> TrajectorySet {
        TrajectorySet {
            trajectories: self.trajectories,
        }
    }
}

/// Closed, immutable result of a linking run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectorySet {
    trajectories: Vec<Trajectory>,
}

impl TrajectorySet {
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectories.iter()
    }

    /// Trajectories covering every baseline force, in discovery order.
    pub fn export(&self, baseline: &BTreeSet<u32>) -> Vec<&Trajectory> {
        self.trajectories
            .iter()
            .filter(|t| t.covers(baseline))
            .collect()
    }
}

/// Link a sequence of frames already sorted by force.
///
/// `threshold` must be a positive finite distance.
pub fn link_frames<'a, I>(frames: I, threshold: f64) -> Result<TrajectorySet, TrackingError>
where
    I: IntoIterator<Item = &'a Frame>,
{
    let mut linker = TrajectoryLinker::new(check_distance("threshold", threshold)?);
    for frame in frames {
        linker.ingest_frame(frame)?;
    }
    Ok(linker.finish())
}

/// Baseline force set for a run.
///
/// An explicit `baseline_forces` list wins. Otherwise the first
/// `baseline_frames` labels of the sorted input sequence are used.
pub fn resolve_baseline(config: &TrackingConfig, sorted_forces: &[u32]) -> BTreeSet<u32> {
    match &config.baseline_forces {
        Some(explicit) => explicit.iter().copied().collect(),
        None => sorted_forces
            .iter()
            .take(config.baseline_frames)
            .copied()
            .collect(),
    }
}

/// Summary of a directory tracking run.
#[derive(Debug, Clone, Default)]
pub struct TrackingReport {
    pub frames: usize,
    pub trajectories: usize,
    pub baseline: Vec<u32>,
    /// Trajectory id and output path of every exported trajectory.
    pub exported: Vec<(usize, PathBuf)>,
}

/// Link every aligned frame in `input_dir` and export covering trajectories.
///
/// Frames are discovered with the configured prefix and aligned suffix.
/// Exported trajectories are written to `output_dir` as `{prefix}{id}.csv`,
/// where `id` counts every trajectory started, exported or not. Trajectory
/// files left in `output_dir` by an earlier run and not exported by this one
/// are removed.
pub fn track_directory(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<TrackingReport> {
    let naming = &config.naming;
    let mut linker = TrajectoryLinker::from_config(&config.tracking)?;
    let pattern = ForcePattern::new(&naming.prefix, &naming.aligned_suffix)?;
    let sources = discover_frames(input_dir, &pattern)?;

    let forces: Vec<u32> = sources.iter().map(|s| s.force).collect();
    let baseline = resolve_baseline(&config.tracking, &forces);
    if let Some(missing) = baseline.iter().find(|f| !forces.contains(*f)) {
        log::warn!(
            "Baseline force {}pN has no frame in {}; no trajectory can be exported",
            missing,
            input_dir.display()
        );
    }

    for source in &sources {
        log::info!("Read coordinates from {}", source.path.display());
        let frame = load_frame(&source.path, source.force)
            .with_context(|| format!("Failed to read frame file: {}", source.path.display()))?;
        linker.ingest_frame(&frame)?;
    }

    let set = linker.finish();
    let exported = set.export(&baseline);
    log::info!(
        "{} trajectories linked, {} cover baseline {:?}",
        set.len(),
        exported.len(),
        baseline
    );

    ensure_dir(output_dir)?;

    let mut report = TrackingReport {
        frames: sources.len(),
        trajectories: set.len(),
        baseline: baseline.into_iter().collect(),
        exported: Vec::with_capacity(exported.len()),
    };

    for trajectory in exported {
        let dest = output_dir.join(naming.trajectory_file_name(trajectory.id()));
        write_trajectory_tsv(&dest, trajectory.records())?;
        report.exported.push((trajectory.id(), dest));
    }

    // Trajectory files are `{prefix}{id}.csv`; ids parse like force labels.
    let trajectory_pattern = ForcePattern::new(&naming.prefix, ".csv")?;
    for stale in matching_files(output_dir, &trajectory_pattern)? {
        if report.exported.iter().any(|(_, path)| *path == stale.path) {
            continue;
        }
        if remove_stale_file(&stale.path)? {
            log::warn!("Removed outdated trajectory file {}", stale.path.display());
        }
    }

    log::info!("Saved trajectories in folder {}", output_dir.display());

    Ok(report)
}
