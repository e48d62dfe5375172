use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::error::MediaError;
use crate::stager::remove_quietly;
use crate::tool::MediaTool;

/// Fast-start remuxer
///
/// Moves the MP4 index ahead of the media data with stream copy, so no
/// re-encoding happens. The input file is never modified. Concurrent remuxes
/// are bounded by a semaphore.
#[derive(Clone)]
pub struct Transcoder {
    ffmpeg: Arc<dyn MediaTool>,
    permits: Arc<Semaphore>,
}

impl Transcoder {
    pub fn new(ffmpeg: Arc<dyn MediaTool>, max_concurrent: usize) -> Self {
        Self {
            ffmpeg,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    fn faststart_args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-nostdin".into(),
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-i".into(),
            input.as_os_str().to_os_string(),
            "-c".into(),
            "copy".into(),
            "-movflags".into(),
            "faststart".into(),
            "-f".into(),
            "mp4".into(),
            output.as_os_str().to_os_string(),
        ]
    }

    /// Remux `input` into a new file at `output` and return its path.
    ///
    /// On failure any partially written output is removed before returning.
    #[tracing::instrument(skip(self, input, output), fields(input = %input.display()))]
    pub async fn faststart(&self, input: &Path, output: &Path) -> Result<PathBuf, MediaError> {
        if input == output {
            return Err(MediaError::TranscodeFailed(
                "Output path must differ from input path".to_string(),
            ));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| MediaError::TranscodeFailed(e.to_string()))?;

        let start = Instant::now();
        let args = Self::faststart_args(input, output);

        if let Err(e) = self.ffmpeg.run(&args).await {
            remove_quietly(output).await;
            return Err(MediaError::TranscodeTool(e));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                tracing::debug!(
                    size_bytes = meta.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Fast-start remux finished"
                );
                Ok(output.to_path_buf())
            }
            _ => {
                remove_quietly(output).await;
                Err(MediaError::TranscodeFailed(format!(
                    "{} produced no output",
                    self.ffmpeg.name()
                )))
            }
        }
    }
}
