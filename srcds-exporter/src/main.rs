/**
 * SRCDS EXPORTER - Point d'entrée principal
 *
 * RÔLE : charge .env, configuration YAML et flags, initialise le logging,
 * puis sert /metrics via Axum.
 */

use anyhow::{Context, Result};
use clap::Parser;
use srcds_exporter::config::{resolve_config, Args};
use srcds_exporter::http::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("srcds_exporter=info")),
        )
        .init();

    let args = Args::parse();
    let cfg = resolve_config(&args).await?;

    match &cfg.single_server {
        Some(target) => info!("single server mode, querying {}", target.endpoint()),
        None => info!("multi target mode, targets come from ?target=&password="),
    }

    let addr = cfg.listen_addr();
    let app = build_router(AppState::new(cfg));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}
