//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use tubely_core::Config;
use tubely_storage::{create_storage, Storage};

/// Build the configured blob store; one backend serves both asset kinds.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(
        backend = %storage.backend_type(),
        "Storage initialized successfully"
    );
    Ok(storage)
}
