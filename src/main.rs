//! Wikiharvest main entry point
//!
//! This is the command-line interface for the Wikiharvest offline article
//! harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wikiharvest::config::{load_config_with_hash, Config};
use wikiharvest::harvest::run_harvest;

/// Wikiharvest: an offline wiki article harvester
///
/// Wikiharvest fetches article text, transcluded templates, referenced
/// images, and edit histories for a set of seed pages, writing everything
/// an offline renderer needs into one target directory.
#[derive(Parser, Debug)]
#[command(name = "wikiharvest")]
#[command(version)]
#[command(about = "Harvests wiki articles for offline use", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be fetched without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let state = run_harvest(config, config_hash)
        .await
        .context("harvest failed")?;

    tracing::info!(
        jobs = state.jobs_completed,
        failed = state.jobs_failed,
        pages = state.pages_written,
        images = state.images.len(),
        "harvest finished"
    );
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wikiharvest=info,warn"),
            1 => EnvFilter::new("wikiharvest=debug,info"),
            2 => EnvFilter::new("wikiharvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the fetch plan
fn handle_dry_run(config: &Config) {
    println!("=== Wikiharvest Dry Run ===\n");

    println!("Endpoint:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Result limit: {}", config.api.result_limit);
    println!("  Request limit: {}", config.api.request_limit);

    println!("\nHarvester:");
    println!("  Max connections: {}", config.harvester.max_connections);

    println!("\nOutput:");
    println!("  Target directory: {}", config.output.target_dir);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        match seed.revision {
            Some(revision) => println!("  - {} (revision {})", seed.title, revision),
            None => println!("  - {}", seed.title),
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} seed pages", config.seeds.len());
}
