//! Video generation worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_providers::{GeminiClient, KlingClient};
use vgen_store::{JobStore, MemoryJobStore, RedisJobStore, RedisStoreConfig};
use vgen_worker::{metrics, JobService, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vgen=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("Starting vgen-worker");

    if let Err(e) = run().await {
        error!("Worker error: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::init_metrics(port).context("Failed to start metrics exporter")?;
        info!(port, "Prometheus metrics listening");
    }

    let store = open_store(&config).await?;
    let enhancer = Arc::new(GeminiClient::from_env().context("Failed to create Gemini client")?);
    let synthesizer = Arc::new(KlingClient::from_env().context("Failed to create Kling client")?);

    let service = JobService::new(enhancer, synthesizer, store, &config);

    let resumed = service
        .resume_in_flight()
        .await
        .context("Failed to resume in-flight jobs")?;
    info!(resumed, "Worker ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    let stopped = service.shutdown().await;
    info!(stopped, "Status pollers stopped");
    Ok(())
}

async fn open_store(config: &WorkerConfig) -> anyhow::Result<Arc<dyn JobStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisJobStore::new(RedisStoreConfig {
                redis_url: url.clone(),
                ..RedisStoreConfig::from_env()
            })
            .context("Invalid Redis URL")?;
            store.ping().await.context("Failed to connect to Redis")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("REDIS_URL not set, using in-memory job store; jobs are lost on restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}
