pub mod health;
pub mod thumbnail_upload;
pub mod upload;
pub mod video_upload;
pub mod videos;

pub use health::health_check;
pub use thumbnail_upload::upload_thumbnail;
pub use video_upload::upload_video;
pub use videos::{create_video, get_video};

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use tubely_core::AppError;
use uuid::Uuid;

use crate::error::HttpAppError;

/// Parse a `{video_id}` path segment.
pub(crate) fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::InvalidIdentifier(format!("Invalid video ID: {}", raw)))
}

/// The `{video_id}` path segment, rejected as `InvalidIdentifier` when malformed.
///
/// Placed before `AuthUser` so a bad id is reported ahead of identity.
#[derive(Debug, Clone, Copy)]
pub struct VideoIdPath(pub Uuid);

impl<S> FromRequestParts<S> for VideoIdPath
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::InvalidIdentifier(e.body_text()))?;
        Ok(VideoIdPath(parse_video_id(&raw)?))
    }
}
