//! Aspect-ratio classification of staged videos.
//!
//! The bucket only decides the storage key prefix. The rule is deliberately
//! coarse: integer floor division, not a floating point ratio comparison.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use tubely_core::models::AspectBucket;

use crate::error::MediaError;
use crate::tool::MediaTool;

/// Bucket a frame size.
///
/// 16:9 when `height / 9 == width / 16`, 9:16 when `height / 16 == width / 9`,
/// `Other` otherwise.
pub fn classify_dimensions(width: u32, height: u32) -> AspectBucket {
    if height / 9 == width / 16 {
        AspectBucket::Landscape
    } else if height / 16 == width / 9 {
        AspectBucket::Portrait
    } else {
        AspectBucket::Other
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse `ffprobe -print_format json -show_streams` output into the first stream's size.
pub fn parse_probe_output(stdout: &[u8]) -> Result<(u32, u32), MediaError> {
    let parsed: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::ProbeFailed(format!("Unparsable ffprobe output: {}", e)))?;

    let stream = parsed.streams.first().ok_or(MediaError::NoStreams)?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(MediaError::ProbeFailed(
            "First video stream has no dimensions".to_string(),
        )),
    }
}

/// Probes a staged file and buckets it by orientation
#[derive(Clone)]
pub struct GeometryClassifier {
    probe: Arc<dyn MediaTool>,
}

impl GeometryClassifier {
    pub fn new(probe: Arc<dyn MediaTool>) -> Self {
        Self { probe }
    }

    /// Width and height of the first video stream.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), MediaError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_streams".into(),
            "-select_streams".into(),
            "v:0".into(),
            path.as_os_str().to_os_string(),
        ];

        let output = self
            .probe
            .run(&args)
            .await
            .map_err(MediaError::ProbeTool)?;

        parse_probe_output(&output.stdout)
    }

    pub async fn classify(&self, path: &Path) -> Result<AspectBucket, MediaError> {
        let (width, height) = self.probe_dimensions(path).await?;
        let bucket = classify_dimensions(width, height);

        tracing::debug!(
            width,
            height,
            bucket = %bucket,
            "Video geometry classified"
        );

        Ok(bucket)
    }
}
