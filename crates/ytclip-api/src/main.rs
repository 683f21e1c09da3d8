//! Axum API server binary.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ytclip_api::{create_router, metrics, ApiConfig, AppState, JobSweeper};
use ytclip_media::check_tools;
use ytclip_worker::WorkerConfig;

/// How long in-flight downloads get to finish on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting ytclip-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    info!("Worker config: {:?}", worker_config);

    tokio::fs::create_dir_all(&worker_config.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory {}",
                worker_config.output_dir.display()
            )
        })?;

    // Missing tools don't stop startup; jobs fail individually and /ready reports it.
    match check_tools(&worker_config.tool_env()) {
        Ok((ytdlp, ffmpeg)) => info!(
            ytdlp = %ytdlp.display(),
            ffmpeg = %ffmpeg.display(),
            "External tools found"
        ),
        Err(e) => warn!("External tool check failed: {}", e),
    }

    let state = AppState::new(config.clone(), &worker_config);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = JobSweeper::new(state.registry.clone(), config.job_ttl)
        .with_rate_limiter(state.rate_limiter.clone());
    let sweeper_task = tokio::spawn(async move {
        sweeper.run(shutdown_rx).await;
    });

    let executor = std::sync::Arc::clone(&state.executor);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper_task.await;

    if !executor.wait_idle(SHUTDOWN_GRACE).await {
        warn!(
            "{} downloads still running after {:?}, exiting anyway",
            executor.in_flight(),
            SHUTDOWN_GRACE
        );
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("ytclip=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
