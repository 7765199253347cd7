//! Data types and loaders for tab-separated coordinate files.
//!
//! Two record layouts are read:
//! - Frame files: `x\ty\tz` per line
//! - Trajectory files: `x\ty\tz\tforce` per line
//!
//! Neither layout has a header row. Lines starting with `#` are comments and
//! lines holding only whitespace are skipped.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}:{line}: expected {expected} columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{path}:{line}: invalid number '{value}'")]
    ParseError {
        path: PathBuf,
        line: u64,
        value: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A single 3D detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the xy-plane. z is ignored.
    #[inline]
    pub fn planar_distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f64; 3]> for Point {
    fn from(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// All detections of one measurement file, tagged with its force label.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub force: u32,
    pub points: Vec<Point>,
}

impl Frame {
    pub fn new(force: u32, points: Vec<Point>) -> Self {
        Self { force, points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One row of a trajectory: a linked point and the force of its frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub force: u32,
}

impl TrackRecord {
    pub fn new(point: Point, force: u32) -> Self {
        Self {
            x: point.x,
            y: point.y,
            z: point.z,
            force,
        }
    }

    #[inline]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y, self.z)
    }
}

/// Open a tab-separated file with the shared reader settings.
fn open_tsv(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// A line of only whitespace trims to empty fields.
fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty)
}

fn check_columns(path: &Path, record: &StringRecord, expected: usize) -> Result<()> {
    if record.len() != expected {
        return Err(LoaderError::ColumnCount {
            path: path.to_path_buf(),
            line: record_line(record),
            expected,
            found: record.len(),
        });
    }
    Ok(())
}

fn parse_field<T: std::str::FromStr>(path: &Path, record: &StringRecord, idx: usize) -> Result<T> {
    let value = record.get(idx).unwrap_or_default();
    value.parse().map_err(|_| LoaderError::ParseError {
        path: path.to_path_buf(),
        line: record_line(record),
        value: value.to_string(),
    })
}

/// Load all points of a frame file.
///
/// An empty file (or one holding only comments) yields an empty vector.
/// A row with the wrong number of columns or a non-numeric field fails the
/// whole file.
pub fn load_points<P: AsRef<Path>>(path: P) -> Result<Vec<Point>> {
    let path = path.as_ref();
    let mut reader = open_tsv(path)?;
    let mut points = Vec::new();

    for result in reader.records() {
        let record = result?;
        if is_blank(&record) {
            continue;
        }
        check_columns(path, &record, 3)?;

        points.push(Point::new(
            parse_field(path, &record, 0)?,
            parse_field(path, &record, 1)?,
            parse_field(path, &record, 2)?,
        ));
    }

    Ok(points)
}

/// Load a frame file and tag it with its force label.
pub fn load_frame<P: AsRef<Path>>(path: P, force: u32) -> Result<Frame> {
    Ok(Frame::new(force, load_points(path)?))
}

/// Load an exported trajectory file.
pub fn load_track_records<P: AsRef<Path>>(path: P) -> Result<Vec<TrackRecord>> {
    let path = path.as_ref();
    let mut reader = open_tsv(path)?;
    let mut records = Vec::new();

    for result in reader.records() {
        let record = result?;
        if is_blank(&record) {
            continue;
        }
        check_columns(path, &record, 4)?;

        records.push(TrackRecord {
            x: parse_field(path, &record, 0)?,
            y: parse_field(path, &record, 1)?,
            z: parse_field(path, &record, 2)?,
            force: parse_field(path, &record, 3)?,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_planar_distance_ignores_z() {
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(3.0, 4.0, 100.0);
        assert_eq!(a.planar_distance(&b), 5.0);
    }

    #[test]
    fn test_load_points() -> Result<()> {
        let file = write_temp(&[
            "# detections",
            "-5.82546e-06\t7.82117e-06\t6.5728e-08",
            "1.0\t2.0\t3.0",
        ]);

        let points = load_points(file.path())?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], Point::new(-5.82546e-6, 7.82117e-6, 6.5728e-8));
        assert_eq!(points[1], Point::new(1.0, 2.0, 3.0));
        Ok(())
    }

    #[test]
    fn test_load_points_empty_file() -> Result<()> {
        let file = write_temp(&[]);
        let points = load_points(file.path())?;
        assert!(points.is_empty());
        Ok(())
    }

    #[test]
    fn test_load_points_wrong_column_count() {
        let file = write_temp(&["1.0\t2.0\t3.0", "1.0\t2.0"]);

        match load_points(file.path()) {
            Err(LoaderError::ColumnCount {
                line,
                expected,
                found,
                ..
            }) => {
                assert_eq!(line, 2);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("Expected ColumnCount error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_points_skips_whitespace_lines() -> Result<()> {
        let file = write_temp(&["1\t2\t3", "   ", "\t", "4\t5\t6"]);

        let points = load_points(file.path())?;
        assert_eq!(points, vec![Point::new(1.0, 2.0, 3.0), Point::new(4.0, 5.0, 6.0)]);
        Ok(())
    }

    #[test]
    fn test_load_track_records_skips_whitespace_lines() -> Result<()> {
        let file = write_temp(&["0\t0\t1\t1", "  ", "0.01\t0\t1\t2"]);

        let records = load_track_records(file.path())?;
        assert_eq!(records.len(), 2);
        Ok(())
    }

    #[test]
    fn test_load_points_non_numeric() {
        let file = write_temp(&["1.0\tabc\t3.0"]);

        match load_points(file.path()) {
            Err(LoaderError::ParseError { value, .. }) => assert_eq!(value, "abc"),
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_load_frame_tags_force() -> Result<()> {
        let file = write_temp(&["0.5\t0.5\t0.0"]);
        let frame = load_frame(file.path(), 7)?;
        assert_eq!(frame.force, 7);
        assert_eq!(frame.len(), 1);
        Ok(())
    }

    #[test]
    fn test_load_track_records() -> Result<()> {
        let file = write_temp(&["0.0\t0.0\t1.0\t1", "0.01\t0.0\t1.0\t2"]);

        let records = load_track_records(file.path())?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].force, 2);
        assert_eq!(records[1].point(), Point::new(0.01, 0.0, 1.0));
        Ok(())
    }
}
