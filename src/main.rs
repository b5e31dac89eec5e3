//! Parking PoC - parking lot engine behind a JSON HTTP API
//!
//! Module structure:
//! - `domain/` - Core types (SpotId, Tariff, Ticket, LotError)
//! - `services/` - Business logic (fee calculation, lot manager, clock)
//! - `io/` - External interfaces (HTTP routes, Prometheus exposition)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::{Parser, ValueEnum};
use parking_poc::infra::{Config, Metrics};
use parking_poc::io::{start_http_server, HttpContext};
use parking_poc::services::{LotManager, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Parking PoC - parking lot check-in, check-out and billing service
#[derive(Parser, Debug)]
#[command(name = "parking-poc", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Default: INFO, use RUST_LOG=debug for per-request logs
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);
    match args.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    info!(version = %env!("CARGO_PKG_VERSION"), git_hash = %env!("GIT_HASH"), "parking-poc starting");

    let config = Config::load_from_path(&args.config);
    info!(
        config_file = %config.config_file(),
        total_spots = %config.total_spots(),
        free_minutes = %config.free_minutes(),
        tariffs = ?config.tariffs().names(),
        http_port = %config.http_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let lot = Arc::new(LotManager::from_config(&config, Arc::new(SystemClock), metrics.clone())?);

    // Periodic metrics summary (lock-free counters plus one occupancy read)
    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let reporter_lot = lot.clone();
        let mut reporter_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let (occupied, total) = reporter_lot.occupancy();
                        reporter_lot.metrics().report(occupied, total).log();
                    }
                    _ = reporter_shutdown.changed() => break,
                }
            }
        });
    }

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let addr: SocketAddr = format!("{}:{}", config.http_bind_address(), config.http_port()).parse()?;
    let ctx = Arc::new(HttpContext::new(lot.clone(), config.date_time_format()));
    start_http_server(addr, ctx, shutdown_rx).await?;

    let (occupied, total) = lot.occupancy();
    lot.metrics().report(occupied, total).log();
    info!("parking-poc shutdown complete");
    Ok(())
}
