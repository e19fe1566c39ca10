mod error;
mod evaluation;
mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use evaluation::BoundedJudge;
use judgeflow_common::config::{EngineConfig, PollPolicy, ServerConfig};
use judgeflow_core::{Judge, Judge0Client, LanguageTable};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub redis: ConnectionManager,
    pub judge: BoundedJudge<Judge0Client>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let server = ServerConfig::from_env().context("Invalid server configuration")?;
    init_tracing(server.json_logs);

    info!("Judgeflow API booting...");

    let engine_config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let policy = PollPolicy::from_env().context("Invalid poll configuration")?;
    let languages = match &server.languages_path {
        Some(path) => LanguageTable::load_from_file(path)
            .with_context(|| format!("Failed to load language table {}", path.display()))?,
        None => LanguageTable::builtin(),
    };

    info!(
        engine = %engine_config.base_url,
        base64 = engine_config.base64_encoded,
        languages = languages.entries().len(),
        poll_interval_ms = policy.interval.as_millis() as u64,
        poll_max_attempts = policy.max_attempts,
        "Engine configured"
    );

    let client = Judge0Client::new(engine_config).context("Failed to build engine HTTP client")?;
    let judge = Judge::new(client, policy).with_languages(languages);

    let redis_client = redis::Client::open(server.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;

    info!("Connected to Redis: {}", server.redis_url);

    let state = Arc::new(AppState {
        redis: redis_conn,
        judge: BoundedJudge::new(
            judge,
            server.max_concurrent_evaluations,
            server.evaluation_timeout,
        ),
    });

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    let listener = TcpListener::bind(&server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server.bind_addr))?;

    info!(
        addr = %server.bind_addr,
        max_concurrent_evaluations = server.max_concurrent_evaluations,
        "HTTP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
