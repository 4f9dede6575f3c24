use anyhow::{Context, Result};
use facecard_core::OnnxExtractor;
use facecard_store::{Catalog, Store};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod engine;
mod error;
mod registration;
#[cfg(test)]
mod testing;

const DEFAULT_LOG_FILTER: &str = "facecard=info,facecardd=info,facecard_core=info,facecard_store=info,tower_http=info";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = config::Config::from_env();
    tracing::info!(
        db = %config.db_path.display(),
        models = %config.model_dir.display(),
        tolerance = config.tolerance,
        policy = ?config.match_policy,
        "facecardd starting"
    );

    let store = Store::new(&config.db_path);
    store.init_schema().context("failed to initialise database schema")?;

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_file(path)
            .with_context(|| format!("failed to load reward catalog {}", path.display()))?,
        None => Catalog::builtin().context("embedded reward catalog is invalid")?,
    };

    let extractor = OnnxExtractor::load(&config.model_dir)
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;

    let engine = engine::spawn_engine(
        Box::new(extractor),
        config.match_policy.matcher(),
        store.clone(),
        config.tolerance,
    )
    .context("failed to start engine")?;

    let state = api::AppState {
        engine,
        store,
        images: registration::ImageStore::new(&config.image_dir),
        catalog: Arc::new(catalog),
    };
    let app = api::router(state, config.body_limit);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "facecardd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("facecardd shutting down");
        })
        .await?;

    Ok(())
}
