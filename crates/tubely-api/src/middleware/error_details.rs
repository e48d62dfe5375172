//! Final shaping of error bodies.
//!
//! Handlers render errors without knowing the deployment. This layer strips
//! `details` and `error_type` when the config says production, and turns the
//! plain-text 413 from the body limit layer into an `ErrorResponse`.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tubely_core::{AppError, Config};

use crate::error::{error_response, log_error, RenderedError};

#[derive(Debug, Clone, Copy)]
pub struct ErrorDetailsConfig {
    pub is_production: bool,
}

impl ErrorDetailsConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            is_production: config.is_production(),
        }
    }
}

pub async fn error_details_middleware(
    State(config): State<Arc<ErrorDetailsConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let status = response.status();

    let body = match response.extensions_mut().remove::<RenderedError>() {
        Some(RenderedError(body)) if config.is_production => body.without_details(),
        Some(_) => return response,
        // Rejected by RequestBodyLimitLayer before any handler ran
        None if status == StatusCode::PAYLOAD_TOO_LARGE => {
            let err = AppError::PayloadTooLarge(
                "Request body exceeds the upload size limit".to_string(),
            );
            log_error(&err);
            error_response(&err, config.is_production)
        }
        None => return response,
    };

    (status, Json(body)).into_response()
}
