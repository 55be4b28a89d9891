use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use json_multiset_compare::{compare, Verdict};

/// Compares two JSON array documents as multisets of elements.
///
/// Both documents are streamed, so arrays far larger than memory are fine.
/// Top-level element order and object key order are ignored; order inside
/// nested arrays is significant.
#[derive(Parser)]
#[command(name = "jsoncmp", version)]
struct Cli {
    /// First JSON document (a top-level array)
    left: PathBuf,
    /// Second JSON document (a top-level array)
    right: PathBuf,
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout carries only the verdict line.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let left = File::open(&cli.left)
        .with_context(|| format!("failed to open {}", cli.left.display()))?;
    let right = File::open(&cli.right)
        .with_context(|| format!("failed to open {}", cli.right.display()))?;

    Ok(match compare(left, right)? {
        Verdict::Identical => {
            println!("Files identical.");
            ExitCode::SUCCESS
        }
        Verdict::Different { mismatch_count } => {
            println!("Files not identical: {mismatch_count} differing fingerprints.");
            ExitCode::FAILURE
        }
    })
}
