//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpAppError>`. Anything that converts into
//! `AppError` converts into `HttpAppError` too, so every failure renders with
//! the same status, body and logging. Production redaction is applied by
//! [`crate::middleware::error_details`] from the injected config.

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tubely_core::{AppError, ErrorMetadata, LogLevel};
use tubely_media::MediaError;
use tubely_storage::StorageError;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    /// Drop the fields that describe the cause.
    pub fn without_details(mut self) -> Self {
        self.details = None;
        self.error_type = None;
        self
    }
}

/// Rendered body attached to error responses so outer layers can rewrite it.
#[derive(Debug, Clone)]
pub(crate) struct RenderedError(pub ErrorResponse);

/// Local wrapper so `IntoResponse` can be implemented for `AppError`
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<MediaError> for HttpAppError {
    fn from(err: MediaError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        let app = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::InvalidInput(format!("Invalid multipart body: {}", err.body_text()))
        };
        HttpAppError(app)
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that rejects with our `ErrorResponse` shape.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

pub(crate) fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Request failed");
        }
    }
}

pub(crate) fn error_response(app_error: &AppError, is_production: bool) -> ErrorResponse {
    let body = ErrorResponse {
        error: app_error.client_message(),
        details: Some(app_error.detailed_message()),
        error_type: Some(app_error.error_type().to_string()),
        code: app_error.error_code().to_string(),
        recoverable: app_error.is_recoverable(),
        suggested_action: app_error.suggested_action().map(String::from),
    };
    if is_production || app_error.is_sensitive() {
        body.without_details()
    } else {
        body
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = error_response(app_error, false);
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(RenderedError(body));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_storage_error_not_found() {
        let HttpAppError(app_err) = StorageError::NotFound("missing.png".to_string()).into();
        assert!(matches!(app_err, AppError::NotFound(_)));
    }

    #[test]
    fn test_from_storage_error_upload_failed() {
        let HttpAppError(app_err) = StorageError::UploadFailed("boom".to_string()).into();
        assert!(matches!(app_err, AppError::StorageFailure(_)));
    }

    #[test]
    fn test_from_media_error_no_streams() {
        let HttpAppError(app_err) = MediaError::NoStreams.into();
        match app_err {
            AppError::ProbeFailure(msg) => assert_eq!(msg, "no video streams"),
            other => panic!("Expected ProbeFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_sensitive_errors_hide_details() {
        let err = AppError::TranscodeFailure("ffmpeg: moov atom not found".to_string());
        let body = error_response(&err, false);
        assert!(body.details.is_none());
        assert!(body.error_type.is_none());
        assert!(!body.error.contains("moov"));
    }

    #[test]
    fn test_details_shown_outside_production_only() {
        let err = AppError::UnsupportedMediaType("Invalid content type".to_string());

        let dev = error_response(&err, false);
        assert!(dev.details.is_some());
        assert_eq!(dev.error_type.as_deref(), Some("UnsupportedMediaType"));

        let prod = error_response(&err, true);
        assert!(prod.details.is_none());
        assert_eq!(prod.code, dev.code);
    }

    #[test]
    fn test_response_carries_rendered_body() {
        let response =
            HttpAppError(AppError::NotFound("Couldn't find video".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let RenderedError(body) = response.extensions().get::<RenderedError>().unwrap();
        assert_eq!(body.code, "NOT_FOUND");
        assert!(body.details.is_some());
        assert!(body.clone().without_details().details.is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response(&AppError::NotFound("Couldn't find video".to_string()), false);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("error").and_then(|v| v.as_str()).is_some());
        assert!(json.get("code").and_then(|v| v.as_str()).is_some());
        assert!(json.get("recoverable").and_then(|v| v.as_bool()).is_some());
        assert!(json.get("suggested_action").is_none() || json["suggested_action"].is_string());
    }
}
