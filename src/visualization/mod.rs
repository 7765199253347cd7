//! Visualization of exported trajectories.
//!
//! Renders each trajectory's (x, y) path as a coloured polyline with point
//! markers using the plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::TrackRecord;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No trajectories to plot")]
    NoTrajectories,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1600;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1200;

/// Color palette cycled across trajectories.
const TRACK_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
    (138, 43, 226),  // Blue Violet
    (255, 215, 0),   // Gold
];

/// Plot the xy-paths of trajectories and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `trajectories` - One record sequence per trajectory, in append order
pub fn plot_trajectories(output_path: &Path, trajectories: &[Vec<TrackRecord>]) -> Result<()> {
    let paths: Vec<Vec<(f64, f64)>> = trajectories
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| t.iter().map(|r| (r.x, r.y)).collect())
        .collect();

    if paths.is_empty() {
        return Err(VisualizationError::NoTrajectories);
    }

    let (x_range, y_range) = compute_bounds(&paths);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for (idx, path) in paths.iter().enumerate() {
        let (r, g, b) = TRACK_COLORS[idx % TRACK_COLORS.len()];
        let color = RGBColor(r, g, b);

        chart
            .draw_series(LineSeries::new(path.iter().copied(), color.stroke_width(2)))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

        chart
            .draw_series(path.iter().map(|&(x, y)| Circle::new((x, y), 3, color.filled())))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    log::info!(
        "Plotted {} trajectories -> {}",
        paths.len(),
        output_path.display()
    );

    Ok(())
}

/// Padded x and y ranges covering every path.
///
/// Coordinates are in meters and often around 1e-6, so padding is relative
/// to the data span rather than a fixed unit.
fn compute_bounds(paths: &[Vec<(f64, f64)>]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in paths.iter().flatten() {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    (pad_range(x_min, x_max), pad_range(y_min, y_max))
}

fn pad_range(min: f64, max: f64) -> std::ops::Range<f64> {
    let span = max - min;
    let padding = if span > 0.0 {
        span * 0.05
    } else {
        (min.abs() * 0.05).max(1e-12)
    };
    (min - padding)..(max + padding)
}
