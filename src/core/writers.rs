//! Data writers for aligned frames and exported trajectories.
//!
//! Both outputs are headerless tab-separated files:
//! - Aligned frames: `x\ty\tz`
//! - Trajectories: `x\ty\tz\tforce`
//!
//! Coordinates use the shortest representation that parses back to the same
//! `f64`, so files written here re-load bit-exactly.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::loaders::{Point, TrackRecord};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove an outdated output file.
    #[error("failed to remove file '{path}': {source}")]
    RemoveFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates a directory and its parents if they don't exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| WriteError::CreateDirectory {
            path: dir.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Remove a previously written output file.
///
/// Returns whether a file was removed. A missing file is not an error.
pub fn remove_stale_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WriteError::RemoveFile {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

fn create_tsv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(BufWriter::new(file)))
}

/// Write points as a headerless `x\ty\tz` file.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `points` - Points in the order they should appear
pub fn write_points_tsv(path: &Path, points: &[Point]) -> Result<()> {
    let mut writer = create_tsv_writer(path)?;
    let path_str = path.display().to_string();

    for p in points {
        writer
            .write_record(&[p.x.to_string(), p.y.to_string(), p.z.to_string()])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write a trajectory as a headerless `x\ty\tz\tforce` file.
///
/// Rows keep the order of `records`, which for linked trajectories is
/// increasing force.
pub fn write_trajectory_tsv(path: &Path, records: &[TrackRecord]) -> Result<()> {
    let mut writer = create_tsv_writer(path)?;
    let path_str = path.display().to_string();

    for r in records {
        writer
            .write_record(&[
                r.x.to_string(),
                r.y.to_string(),
                r.z.to_string(),
                r.force.to_string(),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
