use std::io;

use tubely_core::AppError;

use crate::tool::ToolError;

/// Errors raised while staging, validating, probing or remuxing an upload
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Upload exceeds the {max} byte limit")]
    PayloadTooLarge { max: u64 },

    #[error("Staging failed: {0}")]
    Staging(#[source] io::Error),

    #[error("Missing content type")]
    MissingContentType,

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    UnsupportedMediaType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Probe tool failed")]
    ProbeTool(#[source] ToolError),

    #[error("No video streams found")]
    NoStreams,

    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("Transcode tool failed")]
    TranscodeTool(#[source] ToolError),
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PayloadTooLarge { max } => AppError::PayloadTooLarge(format!(
                "File exceeds the maximum allowed size of {} bytes",
                max
            )),
            MediaError::Staging(e) => AppError::StagingFailure(e.to_string()),
            MediaError::MissingContentType => {
                AppError::UnsupportedMediaType("Missing Content-Type for file".to_string())
            }
            MediaError::UnsupportedMediaType { allowed, .. } => {
                AppError::UnsupportedMediaType(format!(
                    "Invalid content type. Allowed types: {}",
                    allowed.join(", ")
                ))
            }
            MediaError::ProbeFailed(msg) => AppError::ProbeFailure(msg),
            MediaError::ProbeTool(e) => AppError::ProbeFailure(e.to_string()),
            MediaError::NoStreams => AppError::ProbeFailure("no video streams".to_string()),
            MediaError::TranscodeFailed(msg) => AppError::TranscodeFailure(msg),
            MediaError::TranscodeTool(e) => AppError::TranscodeFailure(e.to_string()),
        }
    }
}
