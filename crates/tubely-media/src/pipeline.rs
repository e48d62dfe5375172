//! Upload pipeline: validate → stage → (classify → remux) → key → store → persist.
//!
//! One [`UploadPipeline::run`] call owns every temporary file it creates. All
//! of them live in a single [`StagingDir`](crate::stager::StagingDir) that is
//! removed when the call returns, fails, or is cancelled.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncRead;
use uuid::Uuid;

use tubely_core::models::{AspectBucket, AssetKind, Video};
use tubely_core::{AppError, Config, ErrorMetadata, LogLevel};
use tubely_db::VideoStore;
use tubely_storage::{keys, Storage};

use crate::geometry::GeometryClassifier;
use crate::stager::StagingArea;
use crate::tool::{MediaTool, ProcessTool};
use crate::transcode::Transcoder;
use crate::validator::MediaValidator;

/// Injected settings for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub staging_dir: PathBuf,
    pub max_thumbnail_bytes: u64,
    pub max_video_bytes: u64,
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    pub ffprobe_timeout: Duration,
    pub ffmpeg_timeout: Duration,
    pub max_concurrent_transcodes: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            staging_dir: config.staging_dir.clone(),
            max_thumbnail_bytes: config.max_thumbnail_size_bytes,
            max_video_bytes: config.max_video_size_bytes,
            ffprobe_path: config.ffprobe_path.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_timeout: config.ffprobe_timeout(),
            ffmpeg_timeout: config.ffmpeg_timeout(),
            max_concurrent_transcodes: config.max_concurrent_transcodes,
        }
    }

    pub fn max_bytes(&self, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Thumbnail => self.max_thumbnail_bytes,
            AssetKind::Video => self.max_video_bytes,
        }
    }
}

/// Progress of one invocation, reported in logs on success and failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    Staged,
    Classified,
    Transcoded,
    Keyed,
    Stored,
    Persisted,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Staged => "staged",
            PipelineStage::Classified => "classified",
            PipelineStage::Transcoded => "transcoded",
            PipelineStage::Keyed => "keyed",
            PipelineStage::Stored => "stored",
            PipelineStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// One upload: which asset, onto which record, by whom, and the bytes.
pub struct UploadRequest<R> {
    pub kind: AssetKind,
    pub video_id: Uuid,
    pub caller: Uuid,
    /// Content type declared by the client for the file part
    pub content_type: Option<String>,
    pub body: R,
}

/// Sequences the upload steps against the record store and blob store
#[derive(Clone)]
pub struct UploadPipeline {
    videos: Arc<dyn VideoStore>,
    storage: Arc<dyn Storage>,
    staging: StagingArea,
    validator: MediaValidator,
    classifier: GeometryClassifier,
    transcoder: Transcoder,
    config: PipelineConfig,
}

impl UploadPipeline {
    /// Build a pipeline that shells out to the configured ffprobe/ffmpeg.
    pub fn new(
        videos: Arc<dyn VideoStore>,
        storage: Arc<dyn Storage>,
        config: PipelineConfig,
    ) -> Self {
        let probe = Arc::new(ProcessTool::new(
            config.ffprobe_path.clone(),
            config.ffprobe_timeout,
        ));
        let ffmpeg = Arc::new(ProcessTool::new(
            config.ffmpeg_path.clone(),
            config.ffmpeg_timeout,
        ));
        Self::with_tools(videos, storage, config, probe, ffmpeg)
    }

    pub fn with_tools(
        videos: Arc<dyn VideoStore>,
        storage: Arc<dyn Storage>,
        config: PipelineConfig,
        probe: Arc<dyn MediaTool>,
        ffmpeg: Arc<dyn MediaTool>,
    ) -> Self {
        Self {
            videos,
            storage,
            staging: StagingArea::new(config.staging_dir.clone()),
            validator: MediaValidator::new(),
            classifier: GeometryClassifier::new(probe),
            transcoder: Transcoder::new(ffmpeg, config.max_concurrent_transcodes),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one upload to completion and return the updated record.
    ///
    /// The record is only written after the bytes are stored, so on any error
    /// it is left untouched.
    pub async fn run<R>(&self, request: UploadRequest<R>) -> Result<Video, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let kind = request.kind;
        let video_id = request.video_id;
        let caller = request.caller;
        let start = Instant::now();
        let mut stage = PipelineStage::Received;

        tracing::debug!(%video_id, user_id = %caller, asset = %kind, %stage, "Upload received");

        let result = self.execute(request, &mut stage).await;

        match &result {
            Ok(video) => {
                let url = match kind {
                    AssetKind::Thumbnail => video.thumbnail_url.as_deref(),
                    AssetKind::Video => video.video_url.as_deref(),
                };
                tracing::info!(
                    %video_id,
                    user_id = %caller,
                    asset = %kind,
                    url = ?url,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload persisted"
                )
            }
            Err(e) => {
                let failed_after = stage;
                match e.log_level() {
                    LogLevel::Debug => tracing::debug!(
                        %video_id, user_id = %caller, asset = %kind, stage = %failed_after,
                        error = %e, "Upload rejected"
                    ),
                    LogLevel::Warn => tracing::warn!(
                        %video_id, user_id = %caller, asset = %kind, stage = %failed_after,
                        error = %e, "Upload failed"
                    ),
                    LogLevel::Error => tracing::error!(
                        %video_id, user_id = %caller, asset = %kind, stage = %failed_after,
                        error = %e, "Upload failed"
                    ),
                }
            }
        }

        result
    }

    fn advance(stage: &mut PipelineStage, next: PipelineStage, video_id: Uuid) {
        *stage = next;
        tracing::debug!(%video_id, stage = %next, "Upload stage reached");
    }

    async fn execute<R>(
        &self,
        request: UploadRequest<R>,
        stage: &mut PipelineStage,
    ) -> Result<Video, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let UploadRequest {
            kind,
            video_id,
            caller,
            content_type,
            body,
        } = request;

        let video = self
            .videos
            .get_video(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Couldn't find video".to_string()))?;

        if !video.is_owned_by(caller) {
            return Err(AppError::Forbidden("Not authorized to update this video".to_string()));
        }

        // Declared type is checked before any byte is written locally.
        let content_type = self.validator.validate(kind, content_type.as_deref())?;
        Self::advance(stage, PipelineStage::Validated, video_id);

        let workspace = self.staging.begin().await?;
        let input_name = format!("input.{}", keys::extension_for(&content_type));
        let staged = workspace
            .stage(&input_name, body, self.config.max_bytes(kind))
            .await?;
        Self::advance(stage, PipelineStage::Staged, video_id);

        let (prefix, upload, upload_len): (Option<AspectBucket>, File, u64) = match kind {
            AssetKind::Thumbnail => {
                let size = staged.size();
                (None, staged.into_reader().await?, size)
            }
            AssetKind::Video => {
                let bucket = self.classifier.classify(staged.path()).await?;
                Self::advance(stage, PipelineStage::Classified, video_id);

                let derived = self
                    .transcoder
                    .faststart(staged.path(), &workspace.file_path("faststart.mp4"))
                    .await?;
                Self::advance(stage, PipelineStage::Transcoded, video_id);

                let file = File::open(&derived)
                    .await
                    .map_err(|e| AppError::TranscodeFailure(e.to_string()))?;
                let size = file
                    .metadata()
                    .await
                    .map_err(|e| AppError::TranscodeFailure(e.to_string()))?
                    .len();
                (Some(bucket), file, size)
            }
        };

        let key = keys::asset_key(prefix.as_ref().map(AspectBucket::prefix), &content_type);
        Self::advance(stage, PipelineStage::Keyed, video_id);

        self.storage
            .put_stream(&key, &content_type, Some(upload_len), Box::pin(upload))
            .await?;
        Self::advance(stage, PipelineStage::Stored, video_id);

        let url = self.storage.url_for(&key);

        // Only the target column is written, so an upload of the other kind
        // that finished meanwhile is kept. Same-kind races: last write wins.
        let updated = match self.videos.update_asset_url(video_id, kind, &url).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&key).await {
                    tracing::warn!(
                        %video_id,
                        key = %key,
                        error = %cleanup,
                        "Failed to remove stored object after persistence failure"
                    );
                }
                return Err(e);
            }
        };
        Self::advance(stage, PipelineStage::Persisted, video_id);

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingStorage, ScriptedTool, StalledTool};
    use tempfile::{tempdir, TempDir};
    use tubely_db::test_helpers::InMemoryVideoStore;
    use tubely_storage::LocalStorage;

    struct Harness {
        staging_root: TempDir,
        storage_root: TempDir,
        videos: InMemoryVideoStore,
        storage: Arc<LocalStorage>,
        owner: Uuid,
        video: Video,
    }

    impl Harness {
        async fn new() -> Self {
            let staging_root = tempdir().unwrap();
            let storage_root = tempdir().unwrap();
            let storage = Arc::new(
                LocalStorage::new(storage_root.path(), "http://localhost:8091/assets".into())
                    .await
                    .unwrap(),
            );
            let videos = InMemoryVideoStore::new();
            let owner = Uuid::new_v4();
            let video = Video::new_draft(owner, "boots".to_string(), None);
            videos.insert(video.clone());

            Self {
                staging_root,
                storage_root,
                videos,
                storage,
                owner,
                video,
            }
        }

        fn config(&self, max_thumbnail: u64, max_video: u64) -> PipelineConfig {
            PipelineConfig {
                staging_dir: self.staging_root.path().to_path_buf(),
                max_thumbnail_bytes: max_thumbnail,
                max_video_bytes: max_video,
                ffprobe_path: "ffprobe".to_string(),
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_timeout: Duration::from_secs(5),
                ffmpeg_timeout: Duration::from_secs(5),
                max_concurrent_transcodes: 1,
            }
        }

        fn pipeline(&self, probe: ScriptedTool, ffmpeg: ScriptedTool) -> UploadPipeline {
            self.pipeline_with_storage(probe, ffmpeg, self.storage.clone())
        }

        fn pipeline_with_storage(
            &self,
            probe: ScriptedTool,
            ffmpeg: ScriptedTool,
            storage: Arc<dyn Storage>,
        ) -> UploadPipeline {
            UploadPipeline::with_tools(
                Arc::new(self.videos.clone()),
                storage,
                self.config(1024, 4096),
                Arc::new(probe),
                Arc::new(ffmpeg),
            )
        }

        fn request<'a>(
            &self,
            kind: AssetKind,
            content_type: &str,
            body: &'a [u8],
        ) -> UploadRequest<&'a [u8]> {
            UploadRequest {
                kind,
                video_id: self.video.id,
                caller: self.owner,
                content_type: Some(content_type.to_string()),
                body,
            }
        }

        fn staging_is_empty(&self) -> bool {
            std::fs::read_dir(self.staging_root.path()).unwrap().count() == 0
        }

        fn stored_files(&self) -> Vec<PathBuf> {
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
            walk(self.storage_root.path(), &mut out);
            out
        }

        fn record(&self) -> Video {
            self.videos.get(self.video.id).unwrap()
        }
    }

    #[tokio::test]
    async fn test_thumbnail_upload_stores_identical_bytes() {
        let h = Harness::new().await;
        let probe = ScriptedTool::probe_dimensions(1920, 1080);
        let ffmpeg = ScriptedTool::remux_copy();
        let pipeline = h.pipeline(probe.clone(), ffmpeg.clone());

        let updated = pipeline
            .run(h.request(AssetKind::Thumbnail, "image/png", b"\x89PNG-thumb"))
            .await
            .unwrap();

        let url = updated.thumbnail_url.clone().unwrap();
        let key = url
            .strip_prefix("http://localhost:8091/assets/")
            .unwrap()
            .to_string();
        assert!(!key.contains('/'));
        assert!(key.ends_with(".png"));
        assert_eq!(h.storage.download(&key).await.unwrap(), b"\x89PNG-thumb");
        assert_eq!(h.record().thumbnail_url, Some(url));
        assert!(h.record().video_url.is_none());

        // Thumbnails skip classification and remux
        assert_eq!(probe.calls(), 0);
        assert_eq!(ffmpeg.calls(), 0);
        assert!(h.staging_is_empty());
    }

    #[tokio::test]
    async fn test_video_upload_is_prefixed_by_bucket() {
        for ((width, height), prefix) in [
            ((1920, 1080), "landscape"),
            ((1080, 1920), "portrait"),
            ((1000, 1000), "other"),
        ] {
            let h = Harness::new().await;
            let ffmpeg = ScriptedTool::remux_copy();
            let pipeline = h.pipeline(ScriptedTool::probe_dimensions(width, height), ffmpeg.clone());

            let updated = pipeline
                .run(h.request(AssetKind::Video, "video/mp4", b"ftyp-mdat-moov"))
                .await
                .unwrap();

            let url = updated.video_url.unwrap();
            let key = url.strip_prefix("http://localhost:8091/assets/").unwrap();
            assert!(key.starts_with(&format!("{}/", prefix)), "{key}");
            assert!(key.ends_with(".mp4"));
            assert_eq!(h.storage.download(key).await.unwrap(), b"ftyp-mdat-moov");
            assert_eq!(ffmpeg.calls(), 1);
            assert!(h.staging_is_empty());
        }
    }

    #[tokio::test]
    async fn test_uploads_derived_file_not_input() {
        let h = Harness::new().await;
        let ffmpeg = ScriptedTool::new("ffmpeg", |args| {
            let output = args.last().unwrap();
            std::fs::write(output, b"moov-first").unwrap();
            Ok(Default::default())
        });
        let pipeline = h.pipeline(ScriptedTool::probe_dimensions(1920, 1080), ffmpeg);

        let updated = pipeline
            .run(h.request(AssetKind::Video, "video/mp4", b"moov-last"))
            .await
            .unwrap();

        let url = updated.video_url.unwrap();
        let key = url.strip_prefix("http://localhost:8091/assets/").unwrap();
        assert_eq!(h.storage.download(key).await.unwrap(), b"moov-first");
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let h = Harness::new().await;
        let pipeline = h.pipeline(ScriptedTool::probe_dimensions(1, 1), ScriptedTool::remux_copy());

        let mut request = h.request(AssetKind::Thumbnail, "image/png", b"x");
        request.video_id = Uuid::new_v4();

        let err = pipeline.run(request).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_owner_is_forbidden_for_both_kinds() {
        let h = Harness::new().await;
        let pipeline = h.pipeline(
            ScriptedTool::probe_dimensions(1920, 1080),
            ScriptedTool::remux_copy(),
        );

        for (kind, content_type) in [
            (AssetKind::Thumbnail, "image/png"),
            (AssetKind::Video, "video/mp4"),
        ] {
            let mut request = h.request(kind, content_type, b"bytes");
            request.caller = Uuid::new_v4();

            let err = pipeline.run(request).await.unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }

        assert_eq!(h.record(), h.video);
        assert_eq!(h.videos.update_count(), 0);
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_types_rejected_without_mutation() {
        let h = Harness::new().await;
        let probe = ScriptedTool::probe_dimensions(1920, 1080);
        let pipeline = h.pipeline(probe.clone(), ScriptedTool::remux_copy());

        let err = pipeline
            .run(h.request(AssetKind::Thumbnail, "image/gif", b"GIF89a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));

        let err = pipeline
            .run(h.request(AssetKind::Video, "video/webm", b"webm"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));

        assert_eq!(probe.calls(), 0);
        assert!(h.stored_files().is_empty());
        assert!(h.staging_is_empty());
        assert_eq!(h.record(), h.video);
    }

    #[tokio::test]
    async fn test_oversized_video_rejected_without_object() {
        let h = Harness::new().await;
        let probe = ScriptedTool::probe_dimensions(1920, 1080);
        let pipeline = UploadPipeline::with_tools(
            Arc::new(h.videos.clone()),
            h.storage.clone(),
            h.config(1024, 64),
            Arc::new(probe.clone()),
            Arc::new(ScriptedTool::remux_copy()),
        );

        let body = vec![0u8; 65];
        let request = UploadRequest {
            kind: AssetKind::Video,
            video_id: h.video.id,
            caller: h.owner,
            content_type: Some("video/mp4".to_string()),
            body: &body[..],
        };

        let err = pipeline.run(request).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert_eq!(probe.calls(), 0);
        assert!(h.stored_files().is_empty());
        assert!(h.staging_is_empty());
    }

    #[tokio::test]
    async fn test_probe_failures_clean_up() {
        let probes = [
            ScriptedTool::failing("ffprobe", "Invalid data found when processing input"),
            ScriptedTool::probe_json(r#"{"streams":[]}"#),
            ScriptedTool::probe_json("garbage"),
        ];

        for probe in probes {
            let h = Harness::new().await;
            let ffmpeg = ScriptedTool::remux_copy();
            let pipeline = h.pipeline(probe, ffmpeg.clone());

            let err = pipeline
                .run(h.request(AssetKind::Video, "video/mp4", b"not-a-video"))
                .await
                .unwrap_err();

            assert!(matches!(err, AppError::ProbeFailure(_)), "{err:?}");
            assert_eq!(ffmpeg.calls(), 0);
            assert!(h.staging_is_empty());
            assert!(h.stored_files().is_empty());
            assert_eq!(h.record(), h.video);
        }
    }

    #[tokio::test]
    async fn test_transcode_failure_cleans_up() {
        let h = Harness::new().await;
        let pipeline = h.pipeline(
            ScriptedTool::probe_dimensions(1920, 1080),
            ScriptedTool::partial_then_fail(),
        );

        let err = pipeline
            .run(h.request(AssetKind::Video, "video/mp4", b"mdat"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TranscodeFailure(_)));
        assert!(h.staging_is_empty());
        assert!(h.stored_files().is_empty());
        assert_eq!(h.record(), h.video);
    }

    #[tokio::test]
    async fn test_storage_failure_cleans_up() {
        let h = Harness::new().await;
        let failing = Arc::new(FailingStorage::new());
        let pipeline = h.pipeline_with_storage(
            ScriptedTool::probe_dimensions(1920, 1080),
            ScriptedTool::remux_copy(),
            failing.clone(),
        );

        let err = pipeline
            .run(h.request(AssetKind::Video, "video/mp4", b"mdat"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::StorageFailure(_)));
        assert_eq!(failing.put_attempts(), 1);
        assert!(h.staging_is_empty());
        assert_eq!(h.record(), h.video);
    }

    #[tokio::test]
    async fn test_persistence_failure_removes_stored_object() {
        let h = Harness::new().await;
        h.videos.set_fail_updates(true);
        let pipeline = h.pipeline(
            ScriptedTool::probe_dimensions(1920, 1080),
            ScriptedTool::remux_copy(),
        );

        let err = pipeline
            .run(h.request(AssetKind::Thumbnail, "image/jpeg", b"jpeg"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PersistenceFailure(_)));
        assert!(h.stored_files().is_empty());
        assert!(h.staging_is_empty());
        assert_eq!(h.record(), h.video);
    }

    #[tokio::test]
    async fn test_missing_content_type_rejected() {
        let h = Harness::new().await;
        let pipeline = h.pipeline(ScriptedTool::probe_dimensions(1, 1), ScriptedTool::remux_copy());

        let mut request = h.request(AssetKind::Thumbnail, "image/png", b"x");
        request.content_type = None;

        let err = pipeline.run(request).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
    }

    #[tokio::test]
    async fn test_cancelled_upload_removes_staging() {
        let h = Harness::new().await;
        let ffmpeg = StalledTool::new();
        let pipeline = UploadPipeline::with_tools(
            Arc::new(h.videos.clone()),
            h.storage.clone(),
            h.config(1024, 4096),
            Arc::new(ScriptedTool::probe_dimensions(1920, 1080)),
            Arc::new(ffmpeg.clone()),
        );

        let run = pipeline.run(h.request(AssetKind::Video, "video/mp4", b"mdat-moov"));
        let outcome = tokio::time::timeout(Duration::from_millis(200), run).await;

        assert!(outcome.is_err(), "remux should still be running");
        assert_eq!(ffmpeg.started(), 1);
        assert!(h.staging_is_empty());
        assert!(h.stored_files().is_empty());
        assert_eq!(h.record(), h.video);
    }

    #[tokio::test]
    async fn test_video_upload_keeps_thumbnail_set_during_remux() {
        let h = Harness::new().await;
        let videos = h.videos.clone();
        let video_id = h.video.id;
        let ffmpeg = ScriptedTool::new("ffmpeg", move |args| {
            // A thumbnail upload lands while the remux runs
            let mut current = videos.get(video_id).unwrap();
            current.thumbnail_url = Some("http://localhost:8091/assets/fresh.png".to_string());
            videos.insert(current);

            std::fs::write(args.last().unwrap(), b"moov-first").unwrap();
            Ok(Default::default())
        });
        let pipeline = h.pipeline(ScriptedTool::probe_dimensions(1920, 1080), ffmpeg);

        let updated = pipeline
            .run(h.request(AssetKind::Video, "video/mp4", b"moov-last"))
            .await
            .unwrap();

        assert!(updated.video_url.is_some());
        assert_eq!(
            h.record().thumbnail_url.as_deref(),
            Some("http://localhost:8091/assets/fresh.png")
        );
    }
}
