//! Command-line interface for the alignment and tracking pipeline.

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "force-track")]
#[command(about = "Drift correction and trajectory linking for force-indexed particle files", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the alignment section of the config.
#[derive(Args, Debug, Default)]
struct AlignArgs {
    /// Reference marker position in meters
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_hyphen_values = true)]
    marker: Option<Vec<f64>>,
    /// Maximum 2D distance of the marker candidate
    #[arg(long)]
    radius: Option<f64>,
}

/// Overrides for the tracking section of the config.
#[derive(Args, Debug, Default)]
struct TrackArgs {
    /// Maximum 2D step between linked points
    #[arg(long)]
    threshold: Option<f64>,
    /// Force labels a trajectory must cover (comma separated)
    #[arg(long, value_delimiter = ',')]
    baseline: Option<Vec<u32>>,
    /// Number of leading frames forming the baseline
    #[arg(long)]
    baseline_frames: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Align raw frame files to the reference marker
    Align {
        /// Directory containing raw frame files
        input_dir: PathBuf,
        /// Output directory for aligned frame files
        output_dir: PathBuf,
        #[command(flatten)]
        align: AlignArgs,
    },

    /// Link aligned frames into trajectories
    Track {
        /// Directory containing aligned frame files
        input_dir: PathBuf,
        /// Output directory for trajectory files
        output_dir: PathBuf,
        #[command(flatten)]
        track: TrackArgs,
    },

    /// Align raw frames, then link the aligned output
    Run {
        /// Directory containing raw frame files
        input_dir: PathBuf,
        /// Output directory for aligned frame files
        aligned_dir: PathBuf,
        /// Output directory for trajectory files
        trajectory_dir: PathBuf,
        #[command(flatten)]
        align: AlignArgs,
        #[command(flatten)]
        track: TrackArgs,
    },

    /// Plot exported trajectories as a PNG
    Plot {
        /// Directory containing trajectory files
        trajectory_dir: PathBuf,
        /// Output PNG file path (defaults to trajectories.png inside the directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the effective configuration to a YAML file
    DumpConfig {
        /// Destination YAML file
        path: PathBuf,
    },
}

impl AlignArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(m) = &self.marker {
            if let [x, y, z] = m.as_slice() {
                config.alignment.marker = [*x, *y, *z];
            }
        }
        if let Some(radius) = self.radius {
            config.alignment.search_radius = radius;
        }
    }
}

impl TrackArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(threshold) = self.threshold {
            config.tracking.threshold = threshold;
        }
        if let Some(baseline) = &self.baseline {
            config.tracking.baseline_forces = Some(baseline.clone());
        }
        if let Some(n) = self.baseline_frames {
            config.tracking.baseline_frames = n;
        }
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            format!("{}...", value.chars().take(35).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn fail(spinner: &ProgressBar, what: &str, e: anyhow::Error) -> ! {
    spinner.finish_and_clear();
    error!("{} failed: {:#}", what, e);
    std::process::exit(1);
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Align {
            input_dir,
            output_dir,
            align,
        } => {
            align.apply(&mut config);
            cmd_align(&input_dir, &output_dir, &config);
        }
        Commands::Track {
            input_dir,
            output_dir,
            track,
        } => {
            track.apply(&mut config);
            cmd_track(&input_dir, &output_dir, &config);
        }
        Commands::Run {
            input_dir,
            aligned_dir,
            trajectory_dir,
            align,
            track,
        } => {
            align.apply(&mut config);
            track.apply(&mut config);
            cmd_align(&input_dir, &aligned_dir, &config);
            cmd_track(&aligned_dir, &trajectory_dir, &config);
        }
        Commands::Plot {
            trajectory_dir,
            output,
        } => {
            cmd_plot(&trajectory_dir, output, &config);
        }
        Commands::DumpConfig { path } => {
            if let Err(e) = config.to_yaml(&path) {
                error!("Failed to write config to {}: {}", path.display(), e);
                std::process::exit(1);
            }
            println!("Wrote config to {}", path.display());
        }
    }
}

fn cmd_align(input_dir: &Path, output_dir: &Path, config: &PipelineConfig) {
    use crate::processors::alignment;

    let start = Instant::now();
    let marker = config.alignment.marker;

    println!("Aligning frames to reference marker...");
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", output_dir.display());
    println!("Marker: ({:e}, {:e}, {:e})", marker[0], marker[1], marker[2]);
    println!("Search radius: {:e}", config.alignment.search_radius);

    let spinner = create_spinner("Aligning frames...");

    match alignment::align_directory(input_dir, output_dir, config) {
        Ok(report) => {
            spinner.finish_and_clear();

            print_summary(
                "Alignment Complete",
                &[
                    ("Input directory", input_dir.display().to_string()),
                    ("Output directory", output_dir.display().to_string()),
                    ("Frames aligned", report.aligned.len().to_string()),
                    ("Frames skipped", report.skipped.len().to_string()),
                    ("Skipped forces", format!("{:?}", report.skipped)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Alignment", e),
    }
}

fn cmd_track(input_dir: &Path, output_dir: &Path, config: &PipelineConfig) {
    use crate::processors::tracking;

    let start = Instant::now();

    println!("Linking trajectories...");
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", output_dir.display());
    println!("Threshold: {:e}", config.tracking.threshold);

    let spinner = create_spinner("Linking aligned frames...");

    match tracking::track_directory(input_dir, output_dir, config) {
        Ok(report) => {
            spinner.finish_and_clear();

            print_summary(
                "Tracking Complete",
                &[
                    ("Input directory", input_dir.display().to_string()),
                    ("Output directory", output_dir.display().to_string()),
                    ("Frames linked", report.frames.to_string()),
                    ("Trajectories", report.trajectories.to_string()),
                    ("Baseline forces", format!("{:?}", report.baseline)),
                    ("Exported", report.exported.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Tracking", e),
    }
}

fn cmd_plot(trajectory_dir: &Path, output: Option<PathBuf>, config: &PipelineConfig) {
    use crate::core::loaders::load_track_records;
    use crate::processors::discovery::{discover_frames, ForcePattern};
    use crate::visualization;

    let start = Instant::now();
    let output_path = output.unwrap_or_else(|| trajectory_dir.join("trajectories.png"));

    println!("Plotting trajectories...");
    println!("Input directory: {}", trajectory_dir.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Loading trajectory files...");

    // Trajectory files are `{prefix}{id}.csv`; ids parse like force labels.
    let loaded = ForcePattern::new(&config.naming.prefix, ".csv")
        .and_then(|pattern| discover_frames(trajectory_dir, &pattern))
        .map_err(anyhow::Error::from)
        .and_then(|sources| {
            sources
                .iter()
                .map(|s| load_track_records(&s.path).map_err(anyhow::Error::from))
                .collect::<anyhow::Result<Vec<_>>>()
        });

    let trajectories = match loaded {
        Ok(t) => t,
        Err(e) => fail(&spinner, "Loading trajectories", e),
    };

    spinner.set_message("Generating plot...");

    match visualization::plot_trajectories(&output_path, &trajectories) {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Plot Complete",
                &[
                    ("Input directory", trajectory_dir.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Trajectories", trajectories.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Plotting", e.into()),
    }
}
