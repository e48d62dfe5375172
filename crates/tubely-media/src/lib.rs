//! Tubely Media Library
//!
//! The upload pipeline and its pieces: staging of inbound bytes, declared
//! content type validation, ffprobe geometry classification and the ffmpeg
//! fast-start remux.

pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod stager;
pub mod tool;
pub mod transcode;
pub mod validator;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::MediaError;
pub use geometry::{classify_dimensions, GeometryClassifier};
pub use pipeline::{PipelineConfig, PipelineStage, UploadPipeline, UploadRequest};
pub use stager::{StagedAsset, StagingArea, StagingDir};
pub use tool::{MediaTool, ProcessTool, ToolError, ToolOutput};
pub use transcode::Transcoder;
pub use validator::{normalize_content_type, MediaValidator};
