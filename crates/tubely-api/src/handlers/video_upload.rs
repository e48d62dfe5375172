use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::upload::run_upload;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;
use tubely_core::models::{AssetKind, Video};

use super::VideoIdPath;

#[utoipa::path(
    post,
    path = "/api/video_upload/{video_id}",
    tag = "videos",
    params(
        ("video_id" = uuid::Uuid, Path, description = "Video ID")
    ),
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Form field `video`: video/mp4"),
    responses(
        (status = 200, description = "Video remuxed, stored and recorded", body = Video),
        (status = 400, description = "Malformed video ID or form", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Caller does not own the video", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Unsupported content type", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(video_id = %video_id, operation = "upload_video"))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    VideoIdPath(video_id): VideoIdPath,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<Json<Video>, HttpAppError> {
    let video = run_upload(&state, AssetKind::Video, video_id, user_id, multipart).await?;
    Ok(Json(video))
}
