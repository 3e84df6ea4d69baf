//! mirrorsync - mirror GitHub metadata onto Gitea pull mirrors.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mirrorsync_engine::RunOverrides;

mod commands;
mod logging;
mod settings;

use settings::Settings;

/// Mirror issues, pull requests, wikis and releases from GitHub to Gitea
#[derive(Parser, Debug)]
#[command(name = "mirrorsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings file (default: ./mirrorsync.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror one GitHub repository into a Gitea repository
    Sync {
        /// GitHub repository, as owner/name or URL
        source: String,
        /// Gitea owner
        dest_owner: String,
        /// Gitea repository name
        dest_repo: String,
        /// Override the stored metadata switch for this run
        #[arg(long, action = clap::ArgAction::Set, value_name = "BOOL")]
        metadata: Option<bool>,
        /// Override the stored releases switch for this run
        #[arg(long, action = clap::ArgAction::Set, value_name = "BOOL")]
        releases: Option<bool>,
    },

    /// Mirror every Gitea pull mirror of a GitHub repository
    SyncAll {
        /// Repositories mirrored in parallel
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Write the default per-repository configuration
    InitConfig {
        /// Enable every component
        #[arg(long)]
        all: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: invalid settings: {e}");
            std::process::exit(2);
        }
    };
    logging::init_logging(
        logging::level_for(cli.verbose, &settings.log_level),
        settings.json_logs(),
    );

    let result = match cli.command {
        Commands::Sync {
            source,
            dest_owner,
            dest_repo,
            metadata,
            releases,
        } => {
            let overrides = RunOverrides {
                mirror_metadata: metadata,
                mirror_releases: releases,
            };
            commands::sync(&settings, &source, &dest_owner, &dest_repo, overrides).await
        }
        Commands::SyncAll { concurrency } => commands::sync_all(&settings, concurrency).await,
        Commands::InitConfig { all } => commands::init_config(&settings, all).map(|()| true),
        Commands::Version => {
            println!("mirrorsync {}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
