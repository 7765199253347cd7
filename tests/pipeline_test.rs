//! End-to-end tests: raw frame files -> aligned frames -> trajectory files.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use force_track::core::loaders::{load_points, load_track_records};
use force_track::processors::alignment::align_directory;
use force_track::processors::tracking::track_directory;
use force_track::PipelineConfig;
use tempfile::TempDir;

const MARKER: [f64; 3] = [-5.82546e-6, 7.82117e-6, 6.5728e-8];

fn write_frame(dir: &Path, name: &str, rows: &[[f64; 3]]) {
    let mut file = File::create(dir.join(name)).unwrap();
    writeln!(file, "# x\ty\tz").unwrap();
    for [x, y, z] in rows {
        writeln!(file, "{:e}\t{:e}\t{:e}", x, y, z).unwrap();
    }
}

/// A frame holding the marker and two particles, all drifted by (dx, dy).
fn drifted(dx: f64, dy: f64, particle_step: f64) -> Vec<[f64; 3]> {
    vec![
        [1.0e-6 + particle_step + dx, 2.0e-6 + dy, 1.0e-7],
        [MARKER[0] + dx, MARKER[1] + dy, MARKER[2]],
        [4.0e-6 + dx, -3.0e-6 + particle_step + dy, 2.0e-7],
    ]
}

fn setup() -> (TempDir, PipelineConfig) {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir(temp_dir.path().join("raw")).unwrap();
    (temp_dir, PipelineConfig::default())
}

#[test]
fn test_pipeline_corrects_drift_and_links() {
    let (temp_dir, config) = setup();
    let raw = temp_dir.path().join("raw");
    let aligned = temp_dir.path().join("aligned");
    let trajs = temp_dir.path().join("trajs");

    // Drift of ~150 nm between frames would break linking at 100 nm without alignment.
    write_frame(&raw, "Rd3ns2_0pN", &drifted(0.0, 0.0, 0.0));
    write_frame(&raw, "Rd3ns2_5pN", &drifted(1.5e-7, -1.0e-7, 1.0e-8));
    write_frame(&raw, "Rd3ns2_10pN", &drifted(-1.2e-7, 1.5e-7, 2.0e-8));
    write_frame(&raw, "Rd3ns2_20pN", &drifted(1.0e-7, 1.0e-7, 3.0e-8));

    let align_report = align_directory(&raw, &aligned, &config).unwrap();
    assert_eq!(align_report.aligned.len(), 4);
    assert!(align_report.skipped.is_empty());

    let points = load_points(aligned.join("Rd3ns2_10pN_aligned")).unwrap();
    assert!((points[1].x - MARKER[0]).abs() < 1e-15);
    assert!((points[1].y - MARKER[1]).abs() < 1e-15);
    assert_eq!(points[0].z, 1.0e-7);

    let track_report = track_directory(&aligned, &trajs, &config).unwrap();
    assert_eq!(track_report.frames, 4);
    assert_eq!(track_report.baseline, vec![0, 5, 10]);
    assert_eq!(track_report.trajectories, 3);
    assert_eq!(track_report.exported.len(), 3);

    for (id, path) in &track_report.exported {
        assert_eq!(path, &trajs.join(format!("Rd3ns2_{}.csv", id)));
        let records = load_track_records(path).unwrap();
        let forces: Vec<u32> = records.iter().map(|r| r.force).collect();
        assert_eq!(forces, vec![0, 5, 10, 20]);
    }
}

#[test]
fn test_pipeline_skips_frame_without_marker() {
    let (temp_dir, mut config) = setup();
    let raw = temp_dir.path().join("raw");
    let aligned = temp_dir.path().join("aligned");
    let trajs = temp_dir.path().join("trajs");

    write_frame(&raw, "Rd3ns2_1pN", &drifted(0.0, 0.0, 0.0));
    // One particle only, microns away from the marker.
    write_frame(&raw, "Rd3ns2_2pN", &drifted(1.0e-6, 0.0, 0.0)[..1]);
    write_frame(&raw, "Rd3ns2_3pN", &drifted(0.0, 0.0, 1.0e-8));
    write_frame(&raw, "Rd3ns2_4pN", &[]);

    let align_report = align_directory(&raw, &aligned, &config).unwrap();
    assert_eq!(align_report.skipped, vec![2, 4]);
    assert!(!aligned.join("Rd3ns2_2pN_aligned").exists());
    assert!(!aligned.join("Rd3ns2_4pN_aligned").exists());

    // Baseline explicitly names the skipped frame: nothing can cover it.
    config.tracking.baseline_forces = Some(vec![1, 2]);
    let report = track_directory(&aligned, &trajs, &config).unwrap();
    assert_eq!(report.frames, 2);
    assert!(report.exported.is_empty());

    config.tracking.baseline_forces = Some(vec![1, 3]);
    let report = track_directory(&aligned, &trajs, &config).unwrap();
    assert_eq!(report.exported.len(), 3);
}

#[test]
fn test_pipeline_rerun_does_not_link_newly_skipped_frame() {
    let (temp_dir, mut config) = setup();
    let raw = temp_dir.path().join("raw");
    let aligned = temp_dir.path().join("aligned");
    let trajs = temp_dir.path().join("trajs");

    write_frame(&raw, "Rd3ns2_1pN", &drifted(0.0, 0.0, 0.0));
    // Marker drifted 300 nm: found with a 1 um radius, not with the default.
    write_frame(&raw, "Rd3ns2_2pN", &drifted(3.0e-7, 0.0, 1.0e-8));
    write_frame(&raw, "Rd3ns2_3pN", &drifted(0.0, 0.0, 2.0e-8));

    config.alignment.search_radius = 1.0e-6;
    let first = align_directory(&raw, &aligned, &config).unwrap();
    assert!(first.skipped.is_empty());
    assert!(aligned.join("Rd3ns2_2pN_aligned").exists());

    config.alignment.search_radius = 0.2e-6;
    let second = align_directory(&raw, &aligned, &config).unwrap();
    assert_eq!(second.skipped, vec![2]);
    assert!(!aligned.join("Rd3ns2_2pN_aligned").exists());

    let report = track_directory(&aligned, &trajs, &config).unwrap();
    assert_eq!(report.frames, 2);
    assert_eq!(report.baseline, vec![1, 3]);
    for (_, path) in &report.exported {
        let forces: Vec<u32> = load_track_records(path)
            .unwrap()
            .iter()
            .map(|r| r.force)
            .collect();
        assert!(!forces.contains(&2));
    }
}

#[test]
fn test_pipeline_rejects_non_positive_threshold() {
    let (temp_dir, mut config) = setup();
    let raw = temp_dir.path().join("raw");
    let aligned = temp_dir.path().join("aligned");

    write_frame(&raw, "Rd3ns2_1pN", &drifted(0.0, 0.0, 0.0));
    align_directory(&raw, &aligned, &config).unwrap();

    config.tracking.threshold = f64::NAN;
    assert!(track_directory(&aligned, &temp_dir.path().join("trajs"), &config).is_err());
}

#[test]
fn test_pipeline_malformed_input_is_fatal() {
    let (temp_dir, config) = setup();
    let raw = temp_dir.path().join("raw");

    write_frame(&raw, "Rd3ns2_1pN", &drifted(0.0, 0.0, 0.0));
    let mut file = File::create(raw.join("Rd3ns2_2pN")).unwrap();
    writeln!(file, "1.0\t2.0\tnot-a-number").unwrap();

    let result = align_directory(&raw, &temp_dir.path().join("aligned"), &config);
    assert!(result.is_err());
}
