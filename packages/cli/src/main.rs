#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the client map.
//!
//! `client_map run` builds the map, `client_map cache-stats` summarizes the
//! geocode cache, and `client_map config` prints the effective
//! configuration. With no subcommand an interactive menu is shown.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use client_map_database::paths;
use client_map_pipeline::PipelineConfig;

use crate::commands::RunOverrides;

#[derive(Parser)]
#[command(name = "client_map", about = "Client activity map generator")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply if it is missing.
    #[arg(long, global = true, default_value = paths::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate visits, geocode new cities, and write the HTML map
    Run {
        /// Where to write the HTML map
        #[arg(long)]
        output: Option<PathBuf>,
        /// Geocode cache file
        #[arg(long)]
        cache: Option<PathBuf>,
        /// `PostgreSQL` connection URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Region code to map (e.g., "NJ")
        #[arg(long)]
        region: Option<String>,
        /// Query the geocoder again for cities cached as unresolved
        #[arg(long)]
        retry_unresolved: bool,
        /// Flush the cache after every N new lookups
        #[arg(long)]
        flush_every: Option<usize>,
    },
    /// Print entry counts for the geocode cache
    CacheStats {
        /// Geocode cache file (defaults to the configured path)
        #[arg(long)]
        cache: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = client_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(&cli.config)?;

    let Some(command) = cli.command else {
        return interactive::run(&multi, config).await;
    };

    match command {
        Commands::Run {
            output,
            cache,
            database_url,
            region,
            retry_unresolved,
            flush_every,
        } => {
            RunOverrides {
                output,
                cache,
                database_url,
                region,
                retry_unresolved,
                flush_every,
            }
            .apply(&mut config)?;
            commands::run_map(&multi, &config).await?;
        }
        Commands::CacheStats { cache } => {
            let path = cache.unwrap_or_else(|| config.cache.path.clone());
            commands::cache_stats(&path)?;
        }
        Commands::Config => commands::print_config(&config)?,
    }

    Ok(())
}
