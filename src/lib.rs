//! Anchorkit: anchor-box derivation for object detectors.
//!
//! Anchorkit reads ground-truth bounding boxes from Pascal VOC annotation
//! directories and clusters their (width, height) shapes into a small set of
//! representative anchors, using an overlap-based k-means variant. It also
//! carries the dataset plumbing that goes with the job: train/test splitting,
//! anchor-file persistence, and a visualization canvas.
//!
//! # Modules
//!
//! - [`anchors`]: the overlap metric, clustering engine, and pipeline
//! - [`voc`]: Pascal VOC XML annotation reader
//! - [`split`]: train/test dataset splitting
//! - [`error`]: error types for anchorkit operations

pub mod anchors;
pub mod error;
pub mod split;
pub mod voc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::AnchorkitError;

use crate::anchors::persist::OverwritePolicy;
use crate::anchors::{AnchorOptions, EmptyClusterPolicy};

/// The anchorkit CLI application.
#[derive(Parser)]
#[command(name = "anchorkit")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Derive anchor shapes from a directory of VOC annotations.
    Anchors(AnchorsArgs),
    /// Split a dataset into train/test subsets.
    Split(SplitArgs),
}

/// Arguments for the anchors subcommand.
#[derive(clap::Args)]
struct AnchorsArgs {
    /// Directory containing VOC XML annotation files.
    input: PathBuf,

    /// Number of anchors to derive.
    #[arg(short = 'k', long, default_value_t = 5)]
    num_anchors: usize,

    /// Convergence threshold on the summed distance-matrix delta.
    #[arg(long, default_value_t = 0.05)]
    eps: f64,

    /// Maximum number of clustering iterations.
    #[arg(long, default_value_t = 100)]
    iterations: usize,

    /// Seed for the initial centroid draw (omit for OS entropy).
    #[arg(long)]
    seed: Option<u64>,

    /// Write the derived anchors to this file.
    #[arg(long)]
    out: Option<PathBuf>,

    /// What to do if the output file exists ('fail', 'overwrite', or 'suffix').
    #[arg(long, default_value = "overwrite")]
    overwrite_policy: String,

    /// Re-seed centroids whose cluster goes empty instead of keeping them.
    #[arg(long)]
    reseed_empty: bool,

    /// Source image size as WIDTH HEIGHT (enables normalization).
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    image_size: Option<Vec<f64>>,

    /// Feature-map size as WIDTH HEIGHT (enables normalization).
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    map_size: Option<Vec<f64>>,

    /// Render the anchors to this PNG file.
    #[arg(long)]
    draw: Option<PathBuf>,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the split subcommand.
#[derive(clap::Args)]
struct SplitArgs {
    /// Directory containing VOC XML annotation files.
    annotations: PathBuf,

    /// Directory containing the corresponding images.
    images: PathBuf,

    /// Output directory for the train/test layout.
    out: PathBuf,

    /// Fraction of the dataset assigned to the train subset.
    #[arg(long, default_value_t = 0.8)]
    ratio: f64,

    /// Seed for the shuffle (omit for OS entropy).
    #[arg(long)]
    seed: Option<u64>,
}

/// Run the anchorkit CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnchorkitError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Anchors(args)) => run_anchors(args),
        Some(Commands::Split(args)) => run_split(args),
        None => {
            println!("anchorkit {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Anchor-box derivation for object detectors.");
            println!();
            println!("Run 'anchorkit --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the anchors subcommand.
fn run_anchors(args: AnchorsArgs) -> Result<(), AnchorkitError> {
    let normalize = match (&args.image_size, &args.map_size) {
        (Some(image), Some(map)) => Some(((image[0], image[1]), (map[0], map[1]))),
        (None, None) => None,
        _ => {
            return Err(AnchorkitError::UnsupportedOption(
                "--image-size and --map-size must be given together".to_string(),
            ));
        }
    };

    let policy = match args.overwrite_policy.as_str() {
        "fail" => OverwritePolicy::FailIfExists,
        "overwrite" => OverwritePolicy::Overwrite,
        "suffix" => OverwritePolicy::AppendSuffix,
        other => {
            return Err(AnchorkitError::UnsupportedOption(format!(
                "--overwrite-policy '{}' (supported: fail, overwrite, suffix)",
                other
            )));
        }
    };

    let opts = AnchorOptions {
        num_anchors: args.num_anchors,
        eps: args.eps,
        max_iterations: args.iterations,
        seed: args.seed,
        empty_cluster: if args.reseed_empty {
            EmptyClusterPolicy::Reseed
        } else {
            EmptyClusterPolicy::Keep
        },
        normalize,
    };

    let report = anchors::derive_anchors(&args.input, &opts)?;

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print!("{}", report),
        other => {
            return Err(AnchorkitError::UnsupportedOption(format!(
                "--output '{}' (supported: text, json)",
                other
            )));
        }
    }

    if let Some(out) = &args.out {
        let written = anchors::persist::write_anchors(out, &report.centroids, policy)?;
        println!("Saved anchors to {}", written.display());
    }

    if let Some(draw_path) = &args.draw {
        let canvas = anchors::draw::draw_anchors(&report.centroids);
        canvas.save(draw_path)?;
        println!("Saved visualization to {}", draw_path.display());
    }

    Ok(())
}

/// Execute the split subcommand.
fn run_split(args: SplitArgs) -> Result<(), AnchorkitError> {
    let report = split::split_dataset(
        &args.annotations,
        &args.images,
        &args.out,
        &split::SplitOptions {
            train_ratio: args.ratio,
            seed: args.seed,
        },
    )?;

    println!(
        "Split {} pair(s) into train({}) / test({})",
        report.train + report.test,
        report.train,
        report.test
    );
    if report.skipped_missing_image > 0 {
        println!(
            "Skipped {} annotation(s) without a matching image",
            report.skipped_missing_image
        );
    }

    Ok(())
}
