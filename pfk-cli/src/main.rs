// SPDX-License-Identifier: AGPL-3.0-or-later
//! Photo Frame Kiosk CLI
//!
//! Browse, sync and cache media from a WebDAV server.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "pfk")]
#[command(author, version, about = "Photo Frame Kiosk - WebDAV media sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server is reachable and accepts the credentials
    Test,

    /// List a remote folder
    Ls {
        /// Remote path, relative to the server URL
        #[arg(default_value = "/")]
        path: String,

        /// Human-readable sizes
        #[arg(short = 'H', long)]
        human: bool,

        /// Print the raw listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Crawl the configured folders for images and videos
    Sync {
        /// Only print the totals
        #[arg(short, long)]
        summary: bool,
    },

    /// Fetch one item through the cache
    Fetch {
        /// Remote path or full URL
        target: String,

        /// Treat as a video (download to the cache, or stream directly)
        #[arg(long)]
        video: bool,

        /// Write image bytes to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Inspect and manage the media cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show disk usage against the budget
    Size,

    /// List cached entries, most recently used first
    List {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Remove every cached entry
    Clear,

    /// Remove the entries for the given URLs
    Rm {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Set the disk budget (e.g. "2 GiB", "500MB") and save it
    Budget { size: String },
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Test => commands::test(&config).await,
        Commands::Ls { path, human, json } => commands::ls(&config, &path, human, json).await,
        Commands::Sync { summary } => commands::sync(&config, summary).await,
        Commands::Fetch { target, video, out } => {
            commands::fetch(&config, &target, video, out.as_deref()).await
        }
        Commands::Cache { action } => match action {
            CacheAction::Size => commands::cache_size(&config).await,
            CacheAction::List { limit } => commands::cache_list(&config, limit).await,
            CacheAction::Clear => commands::cache_clear(&config).await,
            CacheAction::Rm { urls } => commands::cache_rm(&config, &urls).await,
            CacheAction::Budget { size } => {
                commands::cache_budget(config, &config_path, &size).await
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
