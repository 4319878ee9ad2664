//! Prune Command-Line Interface
//!
//! Command-line tool for removing dead code from WebAssembly modules.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use prune_core::Report;

#[derive(Parser)]
#[command(name = "prune")]
#[command(version)]
#[command(about = "Prune - dead code elimination for WebAssembly modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove unreachable functions from a WebAssembly module
    Optimize {
        /// Input WebAssembly file (.wasm)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file path; when omitted the result is discarded after
        /// reporting
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Show detailed statistics
        #[arg(long)]
        stats: bool,
    },
}

fn print_report(report: &Report, elapsed_ms: u128) {
    println!("\n📊 Dead Code Elimination");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Defined functions: {} → {} ({} removed)",
        report.total_defined_functions,
        report.kept_defined_functions,
        report.removed_defined_functions
    );
    println!(
        "Binary size:       {} → {} bytes ({:.1}% reduction)",
        report.original_size_bytes,
        report.optimized_size_bytes,
        reduction_percentage(report.original_size_bytes, report.optimized_size_bytes)
    );
    println!("Time:              {elapsed_ms} ms");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

fn reduction_percentage(before: usize, after: usize) -> f64 {
    if before == 0 {
        0.0
    } else {
        ((before - after) as f64 / before as f64) * 100.0
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize {
            input,
            output,
            stats,
        } => {
            let bytes = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            log::info!("loaded {} ({} bytes)", input.display(), bytes.len());

            let started = Instant::now();
            let (optimized, report) = prune_core::eliminate_dead_code(&bytes)
                .with_context(|| format!("failed to optimize {}", input.display()))?;
            let elapsed_ms = started.elapsed().as_millis();

            if report.removed_defined_functions == 0 {
                println!(
                    "✅ No dead code: all {} defined functions are reachable",
                    report.total_defined_functions
                );
            } else {
                println!(
                    "✅ Removed {} of {} defined functions",
                    report.removed_defined_functions, report.total_defined_functions
                );
            }
            if stats {
                print_report(&report, elapsed_ms);
            }

            if let Some(path) = output {
                fs::write(&path, &optimized)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Wrote {} bytes to {}", optimized.len(), path.display());
            }
        }
    }

    Ok(())
}
