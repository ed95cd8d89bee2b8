use anyhow::Context;
use context_engine::api::{build_router, ApiState};
use context_engine::logging::init_tracing;
use context_engine::{Config, ContextEngine};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("CONTEXT_ENGINE_CONFIG").ok();
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let max_body_bytes = config.server.max_body_bytes;
    let idle_eviction_secs = config.server.idle_eviction_secs;
    info!(
        "Starting context engine (strategy {}, persistence {:?}, model {})",
        config.summarization.strategy.as_str(),
        config.persistence.backend,
        if config.llm.enabled { "enabled" } else { "disabled" }
    );

    let engine = ContextEngine::from_config(config).context("failed to build engine")?;
    if idle_eviction_secs > 0 {
        engine.spawn_idle_sweeper(Duration::from_secs(idle_eviction_secs));
    }
    let app = build_router(ApiState { engine: engine.clone() }, max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    engine.flush().await;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
