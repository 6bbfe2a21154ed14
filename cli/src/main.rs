// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Control Plane CLI
//!
//! The `aegisctl` binary serves the module lifecycle control plane and
//! drives a running instance over its HTTP admin API.
//!
//! ## Commands
//!
//! - `aegisctl serve` - run the control plane (admin API + health supervision)
//! - `aegisctl module register|list|get|activate|deactivate|swap` - lifecycle operations
//! - `aegisctl flag create|get|evaluate` - feature flag management
//! - `aegisctl migration create|list|status|execute|abort|rollback` - staged migrations
//! - `aegisctl stats` - engine snapshot

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod client;
mod commands;
mod serve;

use client::ApiClient;
use commands::{FlagCommand, MigrationCommand, ModuleCommand};

/// AEGIS control plane - module lifecycle and migration orchestration
#[derive(Parser)]
#[command(name = "aegisctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (serve mode)
    #[arg(short, long, global = true, env = "AEGIS_CONTROL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Admin API port
    #[arg(long, global = true, env = "AEGIS_CONTROL_PORT", default_value = "8200")]
    port: u16,

    /// Admin API host
    #[arg(long, global = true, env = "AEGIS_CONTROL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AEGIS_CONTROL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control plane service
    Serve,

    /// Manage modules
    Module {
        #[command(subcommand)]
        command: ModuleCommand,
    },

    /// Manage feature flags
    Flag {
        #[command(subcommand)]
        command: FlagCommand,
    },

    /// Manage migration plans
    Migration {
        #[command(subcommand)]
        command: MigrationCommand,
    },

    /// Show engine statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Serve => serve::run(cli.config.as_deref(), &cli.host, cli.port).await,
        Commands::Module { command } => {
            command.run(&ApiClient::new(&cli.host, cli.port)).await
        }
        Commands::Flag { command } => command.run(&ApiClient::new(&cli.host, cli.port)).await,
        Commands::Migration { command } => {
            command.run(&ApiClient::new(&cli.host, cli.port)).await
        }
        Commands::Stats => commands::stats(&ApiClient::new(&cli.host, cli.port)).await,
    }
}
