use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use veg_remap_core::{restore_field_names, run_remap, FailurePolicy, FieldStore, RemapConfig};

/// Remap restart fields onto a new vegetation distribution
#[derive(Parser, Debug)]
#[command(name = "remap-vegetation")]
#[command(author, version, about = "Adjust land-surface restart fields for new land cover", long_about = None)]
struct Args {
    /// Input field store (JSON) holding the fields and the old fractions
    #[arg(short, long)]
    input: PathBuf,

    /// Output field store (JSON)
    #[arg(short, long)]
    output: PathBuf,

    /// New vegetation distribution (JSON store holding the new fractions)
    #[arg(short = 'm', long)]
    vegetation_map: PathBuf,

    /// Remap configuration (JSON)
    ///
    /// YAML configurations must be converted to JSON first, quoting integer
    /// vegetation_map keys ("10": [6, 7, 9]).
    #[arg(short, long)]
    config: PathBuf,

    /// Fill every tile slot, not only those active in the new distribution
    #[arg(long)]
    fill_all: bool,

    /// Remap the fields that can be and report the rest, instead of stopping
    #[arg(long)]
    keep_going: bool,

    /// Write output names in restart form ('/' instead of " PER ")
    #[arg(long)]
    restore_names: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = RemapConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if args.fill_all {
        config.enable_fill_all();
    }

    let input = FieldStore::load(&args.input)
        .with_context(|| format!("Failed to load input store {}", args.input.display()))?;
    let new_vegetation = FieldStore::load(&args.vegetation_map).with_context(|| {
        format!(
            "Failed to load new vegetation {}",
            args.vegetation_map.display()
        )
    })?;
    info!(
        "Loaded {} input arrays and {} new vegetation arrays",
        input.len(),
        new_vegetation.len()
    );

    let policy = if args.keep_going {
        FailurePolicy::KeepGoing
    } else {
        FailurePolicy::FailFast
    };
    let run = run_remap(&config, &input, &new_vegetation, policy).context("Remap failed")?;

    let output = if args.restore_names {
        restore_field_names(run.output)
    } else {
        run.output
    };
    output
        .save(&args.output)
        .with_context(|| format!("Failed to write output store {}", args.output.display()))?;
    info!(
        "Wrote {} arrays to {} ({} slots zero-filled)",
        output.len(),
        args.output.display(),
        run.report.zero_filled
    );

    if !run.failures.is_empty() {
        for failure in &run.failures {
            error!("{}", failure);
        }
        bail!(
            "{} configured fields could not be remapped",
            run.failures.len()
        );
    }

    Ok(())
}
