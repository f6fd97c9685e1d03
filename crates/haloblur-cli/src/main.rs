//! Haloblur command-line interface.
//!
//! Blur matrix files directly or from TOML job files:
//! ```sh
//! haloblur run 2 1024 in.bin out.bin --workers 8
//! haloblur job job.toml
//! haloblur validate job.toml
//! haloblur generate in.bin 1024 --seed 7
//! haloblur print out.bin 1024
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use haloblur_core::Weighting;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "haloblur")]
#[command(about = "Haloblur: distributed depth-weighted matrix blur")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Blur a matrix file.
    Run {
        /// Neighbourhood depth (clamped to matrix_size - 1).
        depth: usize,
        /// Side length N of the square matrix.
        matrix_size: usize,
        /// Input matrix file.
        input: PathBuf,
        /// Output matrix file.
        output: PathBuf,
        /// Number of workers. Default: available threads, capped at N.
        #[arg(short = 'n', long)]
        workers: Option<usize>,
        /// Compute backend: cpu or distributed.
        #[arg(short, long, default_value_t = config::default_backend())]
        backend: String,
        /// Neighbour weighting: ring-sum or normalised.
        #[arg(short, long, default_value_t = Weighting::RingSum)]
        weighting: Weighting,
        /// Write a JSON run summary to this path.
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Run a blur job from a TOML configuration file.
    Job {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Validate a configuration file without running the blur.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Write a random matrix file.
    Generate {
        /// Output matrix file.
        output: PathBuf,
        /// Side length N of the square matrix.
        matrix_size: usize,
        /// Seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
        /// Largest generated value.
        #[arg(long, default_value_t = 100)]
        max: i32,
    },
    /// Print a matrix file as text.
    Print {
        /// Matrix file.
        input: PathBuf,
        /// Side length N of the square matrix.
        matrix_size: usize,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            depth,
            matrix_size,
            input,
            output,
            workers,
            backend,
            weighting,
            summary,
        } => {
            println!("Haloblur");
            println!("========");
            let job = runner::BlurJob {
                depth,
                matrix_size,
                workers,
                backend,
                weighting,
                input,
                output,
            };
            let result = runner::run_blur(&job)?;
            if let Some(path) = summary {
                runner::write_summary_json(&result, &path)?;
            }
            println!("Blur complete in {:.1} ms.", result.elapsed_ms);
            Ok(())
        }
        Commands::Job { config } => {
            println!("Haloblur");
            println!("========");
            let job_config = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let job = runner::BlurJob::from(&job_config);
            let result = runner::run_blur(&job)?;
            if let Some(path) = &job_config.io.summary {
                runner::write_summary_json(&result, path)?;
            }
            println!("Blur complete in {:.1} ms.", result.elapsed_ms);
            Ok(())
        }
        Commands::Validate { config } => {
            let job_config = config::load_config(&config)?;
            let job = runner::BlurJob::from(&job_config);
            runner::prepare(&job)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Generate {
            output,
            matrix_size,
            seed,
            max,
        } => runner::generate_matrix(&output, matrix_size, seed, max),
        Commands::Print { input, matrix_size } => {
            print!("{}", runner::print_matrix(&input, matrix_size)?);
            Ok(())
        }
    }
}
