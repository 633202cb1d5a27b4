// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! kirim - a multi-tenant WhatsApp messaging gateway.
//!
//! This is the binary entry point for the kirim service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};
use tracing::error;

mod serve;
mod shutdown;

/// kirim - a multi-tenant WhatsApp messaging gateway.
#[derive(Parser, Debug)]
#[command(name = "kirim", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the kirim gateway server and scheduler.
    Serve,
    /// Print the resolved configuration.
    Config,
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match kirim_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            kirim_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            init_tracing(&config.service.log_level);
            if let Err(e) = serve::run_serve(config).await {
                error!(error = %e, "serve failed");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("error: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("kirim: use --help for available commands");
        }
    }
}
