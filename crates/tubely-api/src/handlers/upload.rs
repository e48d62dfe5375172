//! Multipart plumbing shared by the two upload endpoints.

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::io;
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tubely_core::models::{AssetKind, Video};
use tubely_core::AppError;
use tubely_media::UploadRequest;
use uuid::Uuid;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Find the file part for `kind` and stream it through the upload pipeline.
///
/// Parts with other names are skipped. The file part is never buffered in
/// memory; its bytes go straight to the stager.
pub async fn run_upload(
    state: &AppState,
    kind: AssetKind,
    video_id: Uuid,
    caller: Uuid,
    mut multipart: Multipart,
) -> Result<Video, HttpAppError> {
    let field_name = kind.form_field();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        tracing::debug!(
            %video_id,
            field = field_name,
            file_name = ?field.file_name(),
            content_type = ?content_type,
            "Upload field received"
        );

        let body = StreamReader::new(Box::pin(field.map_err(field_read_error)));

        let video = state
            .pipeline
            .run(UploadRequest {
                kind,
                video_id,
                caller,
                content_type,
                body,
            })
            .await?;

        return Ok(video);
    }

    Err(AppError::InvalidInput(format!("Missing form field '{}'", field_name)).into())
}

/// Body-limit errors keep their meaning through the reader so the stager
/// reports them as an oversized upload.
fn field_read_error(err: MultipartError) -> io::Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        io::Error::new(io::ErrorKind::FileTooLarge, err)
    } else {
        io::Error::other(err)
    }
}
