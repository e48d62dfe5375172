//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tubely_core::Config;
use tubely_db::VideoRepository;
use tubely_media::{PipelineConfig, UploadPipeline};

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.is_production())
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let videos = Arc::new(VideoRepository::new(pool));
    let pipeline = UploadPipeline::new(
        videos.clone(),
        storage.clone(),
        PipelineConfig::from_config(&config),
    );

    let state = Arc::new(AppState::new(config, videos, storage, pipeline));
    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}
