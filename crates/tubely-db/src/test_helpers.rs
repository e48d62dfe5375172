//! In-memory `VideoStore` for testing without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tubely_core::models::{AssetKind, Video};
use tubely_core::AppError;
use uuid::Uuid;

use crate::traits::VideoStore;

/// Mock video store backed by a `HashMap`.
///
/// `fail_updates` makes every `update_asset_url` return `PersistenceFailure`,
/// which lets tests exercise the pipeline's last step.
#[derive(Clone, Default)]
pub struct InMemoryVideoStore {
    videos: Arc<Mutex<HashMap<Uuid, Video>>>,
    fail_updates: Arc<AtomicBool>,
    updates: Arc<AtomicUsize>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, video: Video) {
        self.videos.lock().unwrap().insert(video.id, video);
    }

    pub fn get(&self, id: Uuid) -> Option<Video> {
        self.videos.lock().unwrap().get(&id).cloned()
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `update_asset_url` calls.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(self.get(id))
    }

    async fn create_video(&self, video: &Video) -> Result<Video, AppError> {
        self.insert(video.clone());
        Ok(video.clone())
    }

    async fn update_asset_url(
        &self,
        id: Uuid,
        kind: AssetKind,
        url: &str,
    ) -> Result<Video, AppError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceFailure(
                "injected update failure".to_string(),
            ));
        }

        let mut videos = self.videos.lock().unwrap();
        let stored = videos
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))?;

        match kind {
            AssetKind::Thumbnail => stored.thumbnail_url = Some(url.to_string()),
            AssetKind::Video => stored.video_url = Some(url.to_string()),
        }
        stored.updated_at = Utc::now();

        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }
}
