//! Miles main entry point
//!
//! This is the command-line interface for the Miles crawler.

use anyhow::Context;
use clap::Parser;
use miles::config::{load_config, validate, RunConfig};
use miles::crawler::crawl;
use miles::output::print_summary;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Crawl the given URL for the specified FILETYPES and download the files to
/// the DESTINATION folder using CPUS workers in parallel.
///
/// Multiple FILETYPES can be given as `-f jpg,png` or `-f jpg -f png`.
#[derive(Parser, Debug)]
#[command(name = "miles")]
#[command(version)]
#[command(about = "Web crawler to download files in parallel", long_about = None)]
struct Cli {
    /// Page to start crawling from
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Save the files to this folder [default: .]
    #[arg(short, long, value_name = "DESTINATION")]
    destination: Option<PathBuf>,

    /// Number of parallel workers [default: 1]
    #[arg(short = 'n', long = "cpus", value_name = "CPUS")]
    cpus: Option<usize>,

    /// File types to download, e.g. jpg, mp3, pdf, png [default: all]
    #[arg(short = 'f', long = "file-types", value_name = "FILETYPES", value_delimiter = ',')]
    file_types: Vec<String>,

    /// Do not follow page links deeper than this from the seed page
    #[arg(long, value_name = "DEPTH")]
    max_depth: Option<u32>,

    /// Path to a TOML configuration file (flags override its values)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    // One runtime thread per worker so the pool runs truly in parallel
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(handle_crawl(config))
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("miles=warn"),
            1 => EnvFilter::new("miles=info,warn"),
            2 => EnvFilter::new("miles=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Merges the optional config file with command-line flags and validates the result
fn build_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => RunConfig::default(),
    };

    if let Some(url) = &cli.url {
        config.seed_url = url.clone();
    }
    if let Some(destination) = &cli.destination {
        config.destination = destination.clone();
    }
    if let Some(cpus) = cli.cpus {
        config.workers = cpus;
    }
    if cli.max_depth.is_some() {
        config.max_depth = cli.max_depth;
    }
    if !cli.file_types.is_empty() {
        config.accepted_types.clear();
        config.accept_types(&cli.file_types);
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the main crawl operation
async fn handle_crawl(config: RunConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping crawl");
                cancel.cancel();
            }
        });
    }

    if config.accepted_types.is_empty() {
        tracing::info!("Downloading all recognized file types");
    } else {
        tracing::info!(
            "Downloading file types: {}",
            config
                .accepted_types
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let result = crawl(config, cancel).await.context("Crawl could not start")?;
    print_summary(&result);

    Ok(())
}
