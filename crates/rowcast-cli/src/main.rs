//! Rowcast command-line interface.
//!
//! Run benchmarks from TOML configuration files:
//! ```sh
//! rowcast run job.toml
//! rowcast validate job.toml
//! rowcast verify --size 100 --workers 4
//! rowcast analyze results/results.json
//! ```

mod config;
mod report;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use config::Precision;
use rowcast_core::analysis::analyze;

#[derive(Parser)]
#[command(name = "rowcast")]
#[command(about = "Rowcast: row-partitioned distributed matrix multiplication benchmarks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running the benchmark.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Multiply one seeded pair serially and distributed, and compare.
    Verify {
        /// Matrix dimension N.
        #[arg(long, default_value_t = 100)]
        size: usize,
        /// Number of workers P.
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Absolute tolerance (default depends on precision).
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long, value_enum, default_value_t = Precision::F64)]
        precision: Precision,
        /// Allow more workers than rows.
        #[arg(long)]
        allow_idle_workers: bool,
    },
    /// Analyse a results file written by `run`.
    Analyze {
        /// Path to results.json.
        results: PathBuf,
        /// Also write the report to this file.
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Rowcast Benchmark");
            println!("=================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let bundle = runner::run_benchmark(&job)?;
            let summary = analyze(&bundle);
            let report = report::render_report(&bundle, &summary);

            // Determine output directory
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            log::info!("writing outputs to {}", out_dir.display());

            if job.output.save_json {
                runner::write_results_json(&bundle, &out_dir.join("results.json"))?;
            }
            if job.output.save_csv {
                runner::write_summary_csv(&bundle, &summary, &out_dir.join("summary.csv"))?;
            }
            if job.output.save_report {
                runner::write_report(&report, &out_dir.join("report.txt"))?;
            }

            println!();
            print!("{report}");
            if !bundle.is_clean() {
                println!();
                println!("WARNING: some configurations failed or did not verify.");
            }
            println!("Benchmark complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let _job = config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Verify {
            size,
            workers,
            seed,
            tolerance,
            precision,
            allow_idle_workers,
        } => {
            let report = runner::run_verification(
                size,
                workers,
                seed,
                tolerance,
                precision,
                allow_idle_workers,
            )?;
            println!("N={} P={} seed={}", report.size, report.workers, seed);
            println!(
                "Traffic: {} messages, {} elements",
                report.messages, report.elements
            );
            println!(
                "Max abs error: {:.3e} (tolerance {:.1e})",
                report.max_abs_error, report.tolerance
            );
            if !report.passed() {
                let (row, col) = report.worst.unwrap_or((0, 0));
                anyhow::bail!("Verification failed: worst element at ({row}, {col})");
            }
            println!("Verification passed.");
            Ok(())
        }
        Commands::Analyze { results, report } => {
            let bundle = runner::load_results(&results)?;
            let text = report::render_report(&bundle, &analyze(&bundle));
            print!("{text}");
            if let Some(path) = report {
                runner::write_report(&text, &path)?;
            }
            Ok(())
        }
    }
}
