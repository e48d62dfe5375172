//! Record store abstraction
//!
//! The upload pipeline only needs these three operations, so it depends on
//! the trait rather than on Postgres.

use async_trait::async_trait;
use tubely_core::models::{AssetKind, Video};
use tubely_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Fetch a video record by id. `Ok(None)` when it does not exist.
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError>;

    /// Insert a new record.
    async fn create_video(&self, video: &Video) -> Result<Video, AppError>;

    /// Set the URL column for `kind` and return the record as stored.
    ///
    /// Only that column changes, so uploads of the other kind are never
    /// reverted. Two uploads of the same kind: last write wins.
    async fn update_asset_url(
        &self,
        id: Uuid,
        kind: AssetKind,
        url: &str,
    ) -> Result<Video, AppError>;
}
