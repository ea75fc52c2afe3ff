//! Obit-Crawl main entry point
//!
//! This is the command-line interface for the Obit-Crawl pageview harvester.

use anyhow::Context;
use clap::Parser;
use obit_crawl::config::{apply_year_overrides, load_config_with_hash, Config};
use obit_crawl::crawler::{crawl, INTERRUPTED_EXIT_CODE};
use obit_crawl::logging::{init_logging, log_file_name};
use obit_crawl::output::{compute_statistics, export_csv, print_statistics};
use obit_crawl::storage::{open_store, CheckpointStore};
use obit_crawl::CrawlOutcome;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Obit-Crawl: a resumable pageview harvester
///
/// Obit-Crawl walks the yearly death categories of a wiki, records the
/// aggregate page views of every listed person over a fixed date range, and
/// checkpoints its progress so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "obit-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A resumable pageview harvester", long_about = None)]
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

    /// Override the first year to crawl
    #[arg(long, value_name = "YEAR")]
    start_year: Option<i32>,

    /// Override the last year to crawl (inclusive)
    #[arg(long, value_name = "YEAR")]
    stop_year: Option<i32>,

    /// Ignore any existing checkpoint for this run
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_csv"])]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_csv"])]
    stats: bool,

    /// Write recorded entries as CSV to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Load and validate configuration
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    apply_year_overrides(&mut config, cli.start_year, cli.stop_year)
        .context("Invalid year range")?;
    let run_id = config.run_params()?.run_id();

    // Guard flushes the log file on drop
    let _log_guard = init_logging(
        cli.verbose,
        cli.quiet,
        Path::new(&config.output.log_dir),
        &run_id,
    )
    .context("Failed to initialize logging")?;

    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export_csv {
        handle_export_csv(&config, path)?;
    } else {
        return handle_crawl(config, cli.fresh).await;
    }

    Ok(ExitCode::SUCCESS)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let params = config.run_params()?;
    let run_id = params.run_id();
    let store = open_store(Path::new(&config.output.checkpoint_dir));

    println!("=== Obit-Crawl Dry Run ===\n");

    println!("Run:");
    println!("  Years: {}..={}", params.start_year, params.stop_year);
    println!(
        "  Page views: {} to {}",
        params.metric_range.start_compact(),
        params.metric_range.end_compact()
    );
    println!("  Run id: {}", run_id);

    println!("\nCrawler Configuration:");
    println!("  Root category: {}", config.crawler.root_category);
    println!(
        "  Year category: {}",
        config.crawler.year_category(params.start_year)
    );
    println!(
        "  Excluded prefixes: {:?}",
        config.crawler.excluded_prefixes
    );
    println!(
        "  Checkpoint interval: {} entries",
        config.crawler.checkpoint_interval
    );
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Retries: {} (then {:?})",
        config.crawler.max_retries, config.crawler.on_retries_exhausted
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nSources:");
    println!("  Wiki API: {}", config.source.wiki_api_url);
    println!("  Metrics API: {}", config.source.metrics_api_url);

    println!("\nOutput:");
    println!("  Checkpoint: {}", store.path_for(&run_id).display());
    println!(
        "  Log file: {}",
        Path::new(&config.output.log_dir)
            .join(log_file_name(&run_id))
            .display()
    );

    match store.load(&run_id)? {
        Some(state) => println!(
            "\n✓ Checkpoint found with {} entries, the crawl would resume",
            state.entry_count()
        ),
        None => println!("\n✓ No checkpoint yet, the crawl would start empty"),
    }
    println!("✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let run_id = config.run_params()?.run_id();
    let store = open_store(Path::new(&config.output.checkpoint_dir));

    println!("Checkpoint: {}\n", store.path_for(&run_id).display());

    let state = store
        .load(&run_id)?
        .with_context(|| format!("No checkpoint for run {}", run_id))?;
    print_statistics(&compute_statistics(&state));

    Ok(())
}

/// Handles the --export-csv mode: writes recorded entries as CSV
fn handle_export_csv(config: &Config, path: &Path) -> anyhow::Result<()> {
    let run_id = config.run_params()?.run_id();
    let store = open_store(Path::new(&config.output.checkpoint_dir));

    let state = store
        .load(&run_id)?
        .with_context(|| format!("No checkpoint for run {}", run_id))?;
    let rows = export_csv(&state, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✓ Exported {} rows to: {}", rows, path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<ExitCode> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting crawl (will resume from checkpoint if present)");
    }

    let report = crawl(config, fresh).await?;

    tracing::info!(
        "Recorded {}, zero-valued {}, skipped existing {}, excluded {}, unresolvable {}, failed {}",
        report.recorded,
        report.zeroed,
        report.skipped_existing,
        report.excluded,
        report.unresolvable,
        report.failed
    );
    if report.checkpoint_failures > 0 {
        tracing::warn!(
            "{} checkpoint writes failed ({} succeeded)",
            report.checkpoint_failures,
            report.checkpoints_written
        );
    }

    Ok(match report.outcome {
        CrawlOutcome::Completed => ExitCode::SUCCESS,
        CrawlOutcome::Interrupted => ExitCode::from(INTERRUPTED_EXIT_CODE as u8),
    })
}
