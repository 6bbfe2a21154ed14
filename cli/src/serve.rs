// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `aegisctl serve` - build the engine from configuration and run the
//! admin API until interrupted.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use aegis_control_core::domain::config::EngineConfig;
use aegis_control_core::engine::ControlPlane;
use aegis_control_core::infrastructure::probes::HttpHealthProbe;
use aegis_control_core::presentation::api;

pub async fn run(config_path: Option<&Path>, host: &str, port: u16) -> Result<()> {
    let mut config = match config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    // command line wins over file for the listen address
    config.api.host = host.to_string();
    config.api.port = port;

    let metrics_addr: std::net::SocketAddr = format!("{}:{}", host, port + 1)
        .parse()
        .context("invalid metrics listen address")?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus recorder")?;

    let engine = Arc::new(
        ControlPlane::build(config.clone(), Arc::new(HttpHealthProbe::new())).await?,
    );
    engine.init().await;

    let listener = tokio::net::TcpListener::bind(config.api.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.api.listen_addr()))?;

    println!(
        "{} control plane listening on {} (metrics on {})",
        "aegis".green().bold(),
        config.api.listen_addr(),
        metrics_addr
    );
    info!(addr = %config.api.listen_addr(), "admin API started");

    let app = api::app(engine.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("admin API server failed")?;

    engine.shutdown().await;
    Ok(())
}
