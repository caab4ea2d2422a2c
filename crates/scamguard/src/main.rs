// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scamguard - real-time scam detection and alert delivery.
//!
//! This is the binary entry point for the Scamguard service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use scamguard_config::validation::validate_push_credentials;
use scamguard_config::{ConfigError, ScamguardConfig};

/// Scamguard - real-time scam detection and alert delivery.
#[derive(Parser, Debug)]
#[command(name = "scamguard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the ingestion endpoint and alert pipeline.
    Serve,
    /// Validate configuration and report every problem found.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<ScamguardConfig, Vec<ConfigError>> {
    match path {
        Some(path) => scamguard_config::load_and_validate_path(path),
        None => scamguard_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            scamguard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => check_config(&config),
    }
}

/// Prints a summary of a valid configuration.
///
/// Missing push credentials are reported as warnings: the file is valid,
/// but `serve` will refuse to start with it.
fn check_config(config: &ScamguardConfig) {
    println!("configuration is valid");
    println!("  service:        {}", config.service.name);
    println!(
        "  gateway:        {}:{} ({} mode)",
        config.gateway.host,
        config.gateway.port,
        config.gateway.response_mode.as_str()
    );
    println!(
        "  classifier:     {} ({})",
        config.classifier.endpoint_url,
        config.classifier.backend.as_str()
    );
    println!(
        "  policy:         threshold {} ({})",
        config.policy.threshold, config.policy.failure_mode
    );
    println!("  database:       {}", config.storage.database_path);

    if config.gateway.bearer_token.is_none() {
        println!("warning: gateway.bearer_token is not set, all API requests will be rejected");
    }
    if let Err(missing) = validate_push_credentials(config) {
        for error in missing {
            println!("warning: {error} (required by `serve`)");
        }
    }
}
