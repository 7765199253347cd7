//! Frame file discovery by force label.
//!
//! Frame files are named `{prefix}{force}{suffix}`. Discovery lists a
//! directory, keeps the names matching that pattern and returns them in
//! ascending force order, which is the order the linker requires.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

/// Errors that can occur during frame discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to list directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid filename pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Force label {force} appears in both {first} and {second}")]
    DuplicateForce {
        force: u32,
        first: PathBuf,
        second: PathBuf,
    },
}

/// A discovered frame file and its force label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSource {
    pub force: u32,
    pub path: PathBuf,
}

/// Anchored `{prefix}(\d+){suffix}` filename matcher.
#[derive(Debug, Clone)]
pub struct ForcePattern {
    regex: Regex,
}

impl ForcePattern {
    pub fn new(prefix: &str, suffix: &str) -> Result<Self, DiscoveryError> {
        let pattern = format!("^{}(\\d+){}$", regex::escape(prefix), regex::escape(suffix));
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Extract the force label from a file name, if it matches.
    pub fn parse_force(&self, file_name: &str) -> Option<u32> {
        self.regex
            .captures(file_name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Regular files of `directory` whose names match `pattern`, in listing order.
pub fn matching_files(
    directory: &Path,
    pattern: &ForcePattern,
) -> Result<Vec<FrameSource>, DiscoveryError> {
    if !directory.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(directory.to_path_buf()));
    }

    let entries = fs::read_dir(directory).map_err(|e| DiscoveryError::ReadDir {
        path: directory.to_path_buf(),
        source: e,
    })?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let force = path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|name| pattern.parse_force(name))?;
            Some(FrameSource { force, path })
        })
        .collect())
}

/// List the frame files of `directory` sorted by ascending force.
///
/// Entries that are not regular files or whose names don't match `pattern`
/// are ignored. Two files carrying the same force label are an error, since
/// the linker cannot order them.
pub fn discover_frames(
    directory: &Path,
    pattern: &ForcePattern,
) -> Result<Vec<FrameSource>, DiscoveryError> {
    let mut sources = matching_files(directory, pattern)?;

    sources.sort_by(|a, b| a.force.cmp(&b.force).then_with(|| a.path.cmp(&b.path)));

    if let Some(pair) = sources.windows(2).find(|w| w[0].force == w[1].force) {
        return Err(DiscoveryError::DuplicateForce {
            force: pair[0].force,
            first: pair[0].path.clone(),
            second: pair[1].path.clone(),
        });
    }

    log::debug!(
        "{}: discovered {} frame files",
        directory.display(),
        sources.len()
    );

    Ok(sources)
}
