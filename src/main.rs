use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tradepost_etl::analyzer::{Analyzer, AnalyzerSettings};
use tradepost_etl::api::{router, ApiState, HealthState, LatencyStats};
use tradepost_etl::client::ArshaClient;
use tradepost_etl::config::{Config, RunMode};
use tradepost_etl::error::Result;
use tradepost_etl::pipeline::EtlPipeline;
use tradepost_etl::registry::Registry;
use tradepost_etl::scraper::Scraper;
use tradepost_etl::store::PartitionStore;

#[tokio::main]
async fn main() {
    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    match run(cfg).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!("Fatal error: {e}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the run ended cleanly. Schedule mode only returns on error.
async fn run(cfg: Config) -> Result<bool> {
    let registry = Arc::new(Registry::load(&cfg.registry_path).await?);
    let store = Arc::new(PartitionStore::new(&cfg.data_dir));
    info!("Store rooted at {}", store.root().display());

    let latency = Arc::new(LatencyStats::new());
    let health = Arc::new(HealthState::new());
    let client = ArshaClient::new(&cfg, Arc::clone(&latency))?;
    info!(
        "Upstream {} (timeout {}s, min interval {}ms)",
        cfg.market_url(),
        cfg.request_timeout_secs,
        cfg.min_request_interval_ms
    );

    let pipeline = EtlPipeline::new(
        Scraper::new(client, Arc::clone(&store), Arc::clone(&registry)),
        Analyzer::new(Arc::clone(&store), registry, AnalyzerSettings::from_config(&cfg)),
        Arc::clone(&health),
    );

    if cfg.run_mode == RunMode::Once {
        let outcome = pipeline.run_once().await;
        return Ok(outcome.succeeded());
    }

    tokio::spawn(async move { pipeline.run_hourly().await });

    let app = router(ApiState {
        store,
        health,
        latency,
        max_hours_back: cfg.report_max_hours_back,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(true)
}
