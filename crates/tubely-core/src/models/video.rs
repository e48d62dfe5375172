use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A video record as persisted by the record store.
///
/// `id` and `owner_id` never change after creation. The two asset references
/// are filled in by the upload pipeline once the bytes are durably stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub owner_id: Uuid,
}

impl Video {
    /// Build a fresh draft record owned by `owner_id`.
    pub fn new_draft(owner_id: Uuid, title: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title,
            description,
            thumbnail_url: None,
            video_url: None,
            owner_id,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Request body for creating a draft video record.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}
