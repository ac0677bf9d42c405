//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but request-level
//! errors go through `kernel::error::AppError`.

mod cli;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use cli::{Args, LogFormat};
use limiter::limiter_router;
use platform::redis_store::RedisStore;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args
        .limiter_config()
        .validate()
        .context("Invalid limiter configuration")?;

    // Refuse to start without a reachable store
    let settings = args.redis_settings();
    let store = tokio::time::timeout(STORE_CONNECT_TIMEOUT, RedisStore::connect(&settings))
        .await
        .with_context(|| format!("Timed out connecting to Redis at {}", settings.addr))?
        .with_context(|| format!("Failed to connect to Redis at {}", settings.addr))?;

    tracing::info!(
        redis_addr = %settings.addr,
        redis_db = settings.db,
        fixed_window_max = config.fixed_window.max_requests,
        fixed_window_mode = ?config.fixed_window.mode,
        token_bucket_capacity = config.token_bucket.max_tokens,
        token_bucket_rate = config.token_bucket.refill_rate,
        "Connected to store"
    );

    // Build router
    let app = Router::new()
        .merge(limiter_router(store, config))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = args.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let fmt_layer = match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,limiter=info,platform=info,tower_http=info".into()),
        )
        .init();
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
