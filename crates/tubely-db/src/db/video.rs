use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres};
use tubely_core::models::{AssetKind, Video};
use tubely_core::AppError;
use uuid::Uuid;

use crate::traits::VideoStore;

/// Postgres-backed video record repository
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    pub async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        let row: Option<Video> =
            sqlx::query_as::<Postgres, Video>("SELECT * FROM videos WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self, video), fields(db.table = "videos", db.operation = "insert", video_id = %video.id))]
    pub async fn create_video(&self, video: &Video) -> Result<Video, AppError> {
        let row: Video = sqlx::query_as::<Postgres, Video>(
            r#"
            INSERT INTO videos (id, created_at, updated_at, title, description, thumbnail_url, video_url, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(video.id)
        .bind(video.created_at)
        .bind(video.updated_at)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self, url), fields(db.table = "videos", db.operation = "update", video_id = %id, asset = %kind))]
    pub async fn update_asset_url(
        &self,
        id: Uuid,
        kind: AssetKind,
        url: &str,
    ) -> Result<Video, AppError> {
        let query = match kind {
            AssetKind::Thumbnail => {
                "UPDATE videos SET thumbnail_url = $2, updated_at = $3 WHERE id = $1 RETURNING *"
            }
            AssetKind::Video => {
                "UPDATE videos SET video_url = $2, updated_at = $3 WHERE id = $1 RETURNING *"
            }
        };

        let row: Option<Video> = sqlx::query_as::<Postgres, Video>(query)
            .bind(id)
            .bind(url)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))
    }
}

#[async_trait]
impl VideoStore for VideoRepository {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        VideoRepository::get_video(self, id).await
    }

    async fn create_video(&self, video: &Video) -> Result<Video, AppError> {
        VideoRepository::create_video(self, video).await
    }

    async fn update_asset_url(
        &self,
        id: Uuid,
        kind: AssetKind,
        url: &str,
    ) -> Result<Video, AppError> {
        VideoRepository::update_asset_url(self, id, kind, url).await
    }
}
