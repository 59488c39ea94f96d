use std::path::PathBuf;

use clap::{Parser, Subcommand};

use specpick::data::transform::strip_water_dir;
use specpick::pipeline::{run, PipelineConfig};
use specpick::select::{DEFAULT_GROUP, DEFAULT_THRESHOLD, DEFAULT_WINDOW};

#[derive(Parser)]
#[command(name = "specpick", version)]
#[command(about = "Batch quality control for ASD field-spectroradiometer records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reject outlier replicates and write one mean spectrum per group
    Pick {
        /// Directory of raw instrument records
        input: PathBuf,

        /// Result directory (default: <INPUT>_result beside the input)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Spread threshold for the window tests
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Sliding-window width, in 1 nm bands
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,

        /// Replicates per group
        #[arg(long, default_value_t = DEFAULT_GROUP)]
        group: usize,
    },
    /// Blank the water-absorption bands of every record in a directory
    StripWater {
        /// Directory of raw instrument records
        input: PathBuf,

        /// Output directory (default: water_removed beside the input)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Pick {
            input,
            out,
            threshold,
            window,
            group,
        } => {
            let config = PipelineConfig {
                input_dir: input,
                result_dir: out,
                threshold,
                window_size: window,
                group_size: group,
            };
            let summary = run(&config)?;
            println!(
                "{} groups: {} good, {} bad, {} skipped",
                summary.groups, summary.good, summary.bad, summary.skipped
            );
        }
        Commands::StripWater { input, out } => {
            let out = out.unwrap_or_else(|| {
                input
                    .parent()
                    .map(|p| p.join("water_removed"))
                    .unwrap_or_else(|| PathBuf::from("water_removed"))
            });
            let written = strip_water_dir(&input, &out)?;
            println!("{written} records written to {}", out.display());
        }
    }
    Ok(())
}
