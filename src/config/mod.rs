//! Configuration types for the alignment and tracking pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::loaders::Point;

/// Errors raised by configuration validation.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a positive finite distance, got {value}")]
    InvalidDistance { field: &'static str, value: f64 },
}

/// Check that a matching distance is finite and strictly positive.
pub fn check_distance(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidDistance { field, value })
    }
}

/// Configuration for drift correction against the reference liposome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Reference marker position (x, y, z) in meters. Only x and y are used.
    #[serde(default = "default_marker")]
    pub marker: [f64; 3],

    /// Maximum 2D distance between the reference and a frame's marker candidate
    #[serde(default = "default_search_radius")]
    pub search_radius: f64,
}

fn default_marker() -> [f64; 3] {
    [-5.82546e-6, 7.82117e-6, 6.5728e-8]
}

fn default_search_radius() -> f64 {
    0.2e-6
}

impl AlignmentConfig {
    /// The reference marker as a point.
    pub fn marker_point(&self) -> Point {
        Point::from(self.marker)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_distance("alignment.search_radius", self.search_radius)?;
        Ok(())
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            search_radius: default_search_radius(),
        }
    }
}

/// Configuration for trajectory linking and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Maximum 2D displacement between consecutive points of a trajectory
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Explicit force labels a trajectory must cover to be exported
    #[serde(default)]
    pub baseline_forces: Option<Vec<u32>>,

    /// Number of leading frames forming the baseline when no explicit list is given
    #[serde(default = "default_baseline_frames")]
    pub baseline_frames: usize,
}

fn default_threshold() -> f64 {
    100e-9
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_distance("tracking.threshold", self.threshold)?;
        Ok(())
    }
}

fn default_baseline_frames() -> usize {
    3
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            baseline_forces: None,
            baseline_frames: default_baseline_frames(),
        }
    }
}

/// File naming conventions for frame discovery and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Common filename prefix, also used for trajectory files
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Suffix following the force label in raw frame files
    #[serde(default = "default_raw_suffix")]
    pub raw_suffix: String,

    /// Suffix following the force label in aligned frame files
    #[serde(default = "default_aligned_suffix")]
    pub aligned_suffix: String,
}

fn default_prefix() -> String {
    "Rd3ns2_".to_string()
}

fn default_raw_suffix() -> String {
    "pN".to_string()
}

fn default_aligned_suffix() -> String {
    "pN_aligned".to_string()
}

impl NamingConfig {
    /// Filename of the aligned output for a force label.
    pub fn aligned_file_name(&self, force: u32) -> String {
        format!("{}{}{}", self.prefix, force, self.aligned_suffix)
    }

    /// Filename of an exported trajectory.
    pub fn trajectory_file_name(&self, id: usize) -> String {
        format!("{}{}.csv", self.prefix, id)
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            raw_suffix: default_raw_suffix(),
            aligned_suffix: default_aligned_suffix(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub alignment: AlignmentConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub naming: NamingConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    ///
    /// The search radius and threshold must be positive finite distances.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alignment.validate()?;
        self.tracking.validate()
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.alignment.search_radius, 0.2e-6);
        assert_eq!(config.tracking.threshold, 100e-9);
        assert_eq!(config.tracking.baseline_frames, 3);
        assert!(config.tracking.baseline_forces.is_none());
        assert_eq!(config.naming.prefix, "Rd3ns2_");
    }

    #[test]
    fn test_naming_file_names() {
        let naming = NamingConfig::default();
        assert_eq!(naming.aligned_file_name(12), "Rd3ns2_12pN_aligned");
        assert_eq!(naming.trajectory_file_name(4), "Rd3ns2_4.csv");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "tracking:\n  threshold: 5.0e-8\n  baseline_forces: [1, 2]\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracking.threshold, 5.0e-8);
        assert_eq!(config.tracking.baseline_forces, Some(vec![1, 2]));
        assert_eq!(config.alignment.search_radius, 0.2e-6);
        assert_eq!(config.naming.raw_suffix, "pN");
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = PipelineConfig::default();
        config.alignment.marker = [1.0e-6, 2.0e-6, 0.0];
        config.naming.prefix = "run7_".to_string();
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.alignment.marker, [1.0e-6, 2.0e-6, 0.0]);
        assert_eq!(loaded.naming.prefix, "run7_");
    }

    #[test]
    fn test_check_distance() {
        assert_eq!(check_distance("radius", 0.5), Ok(0.5));
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                check_distance("radius", bad),
                Err(ConfigError::InvalidDistance { field: "radius", .. })
            ));
        }
    }

    #[test]
    fn test_validate_rejects_bad_distances() {
        assert!(PipelineConfig::default().validate().is_ok());

        let mut config = PipelineConfig::default();
        config.tracking.threshold = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDistance { field: "tracking.threshold", .. })
        ));

        let mut config = PipelineConfig::default();
        config.alignment.search_radius = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDistance { field: "alignment.search_radius", .. })
        ));
    }

    #[test]
    fn test_from_yaml_rejects_negative_radius() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "alignment:\n  search_radius: -2.0e-7\n").unwrap();

        assert!(PipelineConfig::from_yaml(&path).is_err());
    }
}
