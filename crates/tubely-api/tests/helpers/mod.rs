//! Test helpers: build AppState and router for integration tests.
//!
//! The router is the real one; the record store is in memory, storage is a
//! local temp directory and the media tools are scripted.

use axum_test::TestServer;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tubely_api::setup::routes;
use tubely_api::state::AppState;
use tubely_core::models::Video;
use tubely_core::Config;
use tubely_db::test_helpers::InMemoryVideoStore;
use tubely_media::test_helpers::ScriptedTool;
use tubely_media::{PipelineConfig, UploadPipeline};
use tubely_storage::{LocalStorage, Storage};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const ASSET_BASE_URL: &str = "http://localhost:8091/assets";

/// Test application: server plus the collaborators behind it.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub videos: InMemoryVideoStore,
    pub probe: ScriptedTool,
    pub ffmpeg: ScriptedTool,
    pub staging_dir: TempDir,
    pub storage_dir: TempDir,
}

/// Limits applied to every test app; small so oversize cases stay cheap.
pub const TEST_MAX_THUMBNAIL_BYTES: u64 = 1024;
pub const TEST_MAX_VIDEO_BYTES: u64 = 4096;

/// Config over temp dirs; `extra` entries override or add variables.
pub fn test_config(staging: &TempDir, storage: &TempDir, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", "postgres://localhost/tubely_test".to_string()),
        ("JWT_SECRET", TEST_JWT_SECRET.to_string()),
        ("LOCAL_STORAGE_PATH", storage.path().display().to_string()),
        ("LOCAL_STORAGE_BASE_URL", ASSET_BASE_URL.to_string()),
        ("STAGING_DIR", staging.path().display().to_string()),
    ]);
    for (key, value) in extra {
        vars.insert(key, value.to_string());
    }

    let mut config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
    config.max_thumbnail_size_bytes = TEST_MAX_THUMBNAIL_BYTES;
    config.max_video_size_bytes = TEST_MAX_VIDEO_BYTES;
    config
}

/// App whose probe reports 1920x1080 and whose remux copies its input.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_tools(
        ScriptedTool::probe_dimensions(1920, 1080),
        ScriptedTool::remux_copy(),
    )
    .await
}

pub async fn setup_test_app_with_tools(probe: ScriptedTool, ffmpeg: ScriptedTool) -> TestApp {
    build_test_app(probe, ffmpeg, &[]).await
}

/// App configured as a production deployment.
pub async fn setup_production_app() -> TestApp {
    build_test_app(
        ScriptedTool::probe_dimensions(1920, 1080),
        ScriptedTool::remux_copy(),
        &[
            ("ENVIRONMENT", "production"),
            ("CORS_ORIGINS", "https://tubely.example.com"),
        ],
    )
    .await
}

async fn build_test_app(
    probe: ScriptedTool,
    ffmpeg: ScriptedTool,
    extra: &[(&str, &str)],
) -> TestApp {
    let staging_dir = TempDir::new().unwrap();
    let storage_dir = TempDir::new().unwrap();
    let config = test_config(&staging_dir, &storage_dir, extra);

    let videos = InMemoryVideoStore::new();
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(storage_dir.path(), ASSET_BASE_URL.to_string())
            .await
            .unwrap(),
    );

    let pipeline = UploadPipeline::with_tools(
        Arc::new(videos.clone()),
        storage.clone(),
        PipelineConfig::from_config(&config),
        Arc::new(probe.clone()),
        Arc::new(ffmpeg.clone()),
    );

    let state = Arc::new(AppState::new(
        config,
        Arc::new(videos.clone()),
        storage,
        pipeline,
    ));
    let router = routes::setup_routes(state.clone()).unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        state,
        videos,
        probe,
        ffmpeg,
        staging_dir,
        storage_dir,
    }
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Bearer token for `user_id`, valid for an hour.
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .jwt
            .issue(user_id, Duration::from_secs(3600))
            .unwrap()
    }

    /// Seed a draft video owned by `owner`.
    pub fn seed_video(&self, owner: Uuid) -> Video {
        let video = Video::new_draft(owner, "Boots on the ground".to_string(), None);
        self.videos.insert(video.clone());
        video
    }

    pub fn record(&self, id: Uuid) -> Video {
        self.videos.get(id).unwrap()
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging_dir.path()).unwrap().count() == 0
    }

    /// Every file under the storage root, recursively.
    pub fn stored_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &std::path::Path, out: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut out = Vec::new();
        walk(self.storage_dir.path(), &mut out);
        out
    }
}

/// Storage key from a URL minted by the local backend.
pub fn key_from_url(url: &str) -> String {
    url.strip_prefix(&format!("{}/", ASSET_BASE_URL))
        .unwrap()
        .to_string()
}
