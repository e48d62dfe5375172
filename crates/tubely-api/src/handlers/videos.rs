use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tubely_core::models::{CreateVideoRequest, Video};
use tubely_core::AppError;

use super::VideoIdPath;

#[utoipa::path(
    post,
    path = "/api/videos",
    tag = "videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Draft video created", body = Video),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(operation = "create_video"))]
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ValidatedJson(request): ValidatedJson<CreateVideoRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("Title must not be empty".to_string()).into());
    }

    let draft = Video::new_draft(user_id, title.to_string(), request.description);
    let video = state.videos.create_video(&draft).await?;

    tracing::info!(video_id = %video.id, user_id = %user_id, "Video draft created");

    Ok((StatusCode::CREATED, Json(video)))
}

#[utoipa::path(
    get,
    path = "/api/videos/{video_id}",
    tag = "videos",
    params(
        ("video_id" = uuid::Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video found", body = Video),
        (status = 400, description = "Malformed video ID", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Caller does not own the video", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(video_id = %video_id, operation = "get_video"))]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    VideoIdPath(video_id): VideoIdPath,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Video>, HttpAppError> {
    let video = state
        .videos
        .get_video(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Couldn't find video".to_string()))?;

    if !video.is_owned_by(user_id) {
        return Err(AppError::Forbidden("Not authorized to view this video".to_string()).into());
    }

    Ok(Json(video))
}
