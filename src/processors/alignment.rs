//! Drift correction against a fixed reference marker.
//!
//! Each frame is shifted in the xy-plane so that its own copy of the
//! reference liposome lands exactly on the configured marker position:
//!
//! 1. **Locate**: scan the frame for the point nearest (in 2D) to the marker,
//!    accepting it only if it lies strictly inside the search radius
//! 2. **Shift**: subtract that point's (Δx, Δy) offset from every point
//!
//! z is never modified. Frames without a marker candidate are skipped.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{AlignmentConfig, ConfigError, PipelineConfig};
use crate::core::loaders::{load_frame, Frame, Point};
use crate::core::writers::{ensure_dir, remove_stale_file, write_points_tsv};
use crate::processors::discovery::{discover_frames, matching_files, ForcePattern};

/// Planar translation measured for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Offset {
    /// Offset of `found` relative to `marker`.
    pub fn between(marker: &Point, found: &Point) -> Self {
        Self {
            dx: found.x - marker.x,
            dy: found.y - marker.y,
        }
    }

    /// Apply the inverse translation to a point.
    #[inline]
    pub fn correct(&self, p: &Point) -> Point {
        Point::new(p.x - self.dx, p.y - self.dy, p.z)
    }
}

/// Find the point of a frame nearest to the reference marker.
///
/// Distances are measured in the xy-plane. The running minimum starts at
/// `max_radius` and only a strictly smaller distance replaces it, so a point
/// at exactly `max_radius` is rejected and ties keep the earliest point.
pub fn locate_marker<'a>(marker: &Point, points: &'a [Point], max_radius: f64) -> Option<&'a Point> {
    let mut min_distance = max_radius;
    let mut closest = None;

    for p in points {
        let distance = marker.planar_distance(p);
        if distance < min_distance {
            min_distance = distance;
            closest = Some(p);
        }
    }

    closest
}

/// Shift every point so that `found` maps onto `marker` in x and y.
pub fn align_frame(marker: &Point, found: &Point, points: &[Point]) -> Vec<Point> {
    let offset = Offset::between(marker, found);
    points.iter().map(|p| offset.correct(p)).collect()
}

/// Why a frame produced no aligned output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// The frame held no points at all.
    EmptyFrame,
    /// Every point was at or beyond the search radius.
    MarkerNotFound { nearest_distance: f64 },
}

/// A frame after drift correction.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    pub frame: Frame,
    pub offset: Offset,
}

/// Result of aligning one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignOutcome {
    Aligned(AlignedFrame),
    Skipped { force: u32, reason: SkipReason },
}

/// Aligns frames against a single reference marker.
#[derive(Debug, Clone)]
pub struct Aligner {
    marker: Point,
    search_radius: f64,
}

impl Aligner {
    pub fn new(marker: Point, search_radius: f64) -> Self {
        Self {
            marker,
            search_radius,
        }
    }

    /// Build an aligner, rejecting a search radius that is not a positive distance.
    pub fn from_config(config: &AlignmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.marker_point(), config.search_radius))
    }

    pub fn marker(&self) -> &Point {
        &self.marker
    }

    /// Align one frame, or report why it has to be skipped.
    pub fn align(&self, frame: &Frame) -> AlignOutcome {
        if frame.is_empty() {
            return AlignOutcome::Skipped {
                force: frame.force,
                reason: SkipReason::EmptyFrame,
            };
        }

        match locate_marker(&self.marker, &frame.points, self.search_radius) {
            Some(found) => {
                let offset = Offset::between(&self.marker, found);
                let points = frame.points.iter().map(|p| offset.correct(p)).collect();
                AlignOutcome::Aligned(AlignedFrame {
                    frame: Frame::new(frame.force, points),
                    offset,
                })
            }
            None => {
                let nearest_distance = frame
                    .points
                    .iter()
                    .map(|p| self.marker.planar_distance(p))
                    .fold(f64::INFINITY, f64::min);
                AlignOutcome::Skipped {
                    force: frame.force,
                    reason: SkipReason::MarkerNotFound { nearest_distance },
                }
            }
        }
    }
}

/// Summary of a directory alignment run.
#[derive(Debug, Clone, Default)]
pub struct AlignmentReport {
    /// Force label and output path of every frame written.
    pub aligned: Vec<(u32, PathBuf)>,
    /// Force labels of frames without a marker candidate.
    pub skipped: Vec<u32>,
}

/// Align every raw frame file in `input_dir` and write results to `output_dir`.
///
/// Raw frames are discovered with the configured prefix and raw suffix and
/// processed in ascending force order. Surviving frames are written as
/// `{prefix}{force}{aligned_suffix}`. Aligned files in `output_dir` that this
/// run did not write, such as those of frames now skipped, are removed so that
/// later stages never see them. A malformed frame file aborts the run.
pub fn align_directory(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<AlignmentReport> {
    let naming = &config.naming;
    let aligner = Aligner::from_config(&config.alignment)?;
    let pattern = ForcePattern::new(&naming.prefix, &naming.raw_suffix)?;
    let sources = discover_frames(input_dir, &pattern)?;

    ensure_dir(output_dir)?;

    let mut report = AlignmentReport::default();

    for source in &sources {
        log::info!("Processing {}...", source.path.display());

        let frame = load_frame(&source.path, source.force)
            .with_context(|| format!("Failed to read frame file: {}", source.path.display()))?;

        match aligner.align(&frame) {
            AlignOutcome::Aligned(aligned) => {
                let dest = output_dir.join(naming.aligned_file_name(source.force));
                write_points_tsv(&dest, &aligned.frame.points)?;
                log::info!(
                    "Saved aligned data for {}pN (shift {:e}, {:e}) -> {}",
                    source.force,
                    aligned.offset.dx,
                    aligned.offset.dy,
                    dest.display()
                );
                report.aligned.push((source.force, dest));
            }
            AlignOutcome::Skipped { force, reason } => {
                match reason {
                    SkipReason::EmptyFrame => {
                        log::warn!("Reference marker not found in {}pN file: frame is empty", force)
                    }
                    SkipReason::MarkerNotFound { nearest_distance } => log::warn!(
                        "Reference marker not found in {}pN file: nearest point at {:e}",
                        force,
                        nearest_distance
                    ),
                }
                report.skipped.push(force);
            }
        }
    }

    let aligned_pattern = ForcePattern::new(&naming.prefix, &naming.aligned_suffix)?;
    for stale in matching_files(output_dir, &aligned_pattern)? {
        if report.aligned.iter().any(|(_, path)| *path == stale.path) {
            continue;
        }
        if remove_stale_file(&stale.path)? {
            log::warn!("Removed outdated aligned file {}", stale.path.display());
        }
    }

    Ok(report)
}
