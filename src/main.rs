use std::net::SocketAddr;

use anyhow::Context;
use auditscope::{app, build_state, AppConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        region = %config.inference.region,
        model_id = %config.inference.model_id,
        endpoint = config.inference.endpoint.as_deref().unwrap_or("regional default"),
        bearer_token = config.inference.bearer_token.is_some(),
        max_request_bytes = ?config.max_request_bytes,
        inference_warn_ms = config.inference_warn_ms,
        "auditscope starting"
    );
    let state = build_state(&config).context("building Bedrock client")?;

    let port = match std::env::var("PORT") {
        Ok(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
        Err(_) => DEFAULT_PORT,
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening for audit batches");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining in-flight analyses");
}
