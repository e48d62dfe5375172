//! Test doubles for the external tools and the blob store.
//!
//! These let the pipeline's sequencing be tested without ffprobe/ffmpeg or a
//! real object store.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tubely_storage::{Storage, StorageBackend, StorageError, StorageReader, StorageResult};

use crate::tool::{MediaTool, ToolError, ToolOutput};

type Script = dyn Fn(&[OsString]) -> Result<ToolOutput, ToolError> + Send + Sync;

/// A `MediaTool` whose behaviour is a closure over the arguments.
#[derive(Clone)]
pub struct ScriptedTool {
    name: String,
    script: Arc<Script>,
    calls: Arc<AtomicUsize>,
    last_args: Arc<Mutex<Option<Vec<OsString>>>>,
}

impl ScriptedTool {
    pub fn new<F>(name: &str, script: F) -> Self
    where
        F: Fn(&[OsString]) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            script: Arc::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
            last_args: Arc::new(Mutex::new(None)),
        }
    }

    /// ffprobe double printing the given JSON.
    pub fn probe_json(json: &str) -> Self {
        let stdout = json.as_bytes().to_vec();
        Self::new("ffprobe", move |_| {
            Ok(ToolOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            })
        })
    }

    /// ffprobe double reporting one video stream of the given size.
    pub fn probe_dimensions(width: u32, height: u32) -> Self {
        Self::probe_json(&format!(
            r#"{{"streams":[{{"index":0,"codec_type":"video","width":{},"height":{}}}]}}"#,
            width, height
        ))
    }

    /// ffmpeg double that copies the `-i` input to the last argument.
    pub fn remux_copy() -> Self {
        Self::new("ffmpeg", |args| {
            let input = input_arg(args).ok_or_else(|| non_zero("missing -i"))?;
            let output = args.last().ok_or_else(|| non_zero("missing output"))?;
            std::fs::copy(input, output).map_err(|e| non_zero(&e.to_string()))?;
            Ok(ToolOutput::default())
        })
    }

    /// ffmpeg double that writes a partial output file, then exits non-zero.
    pub fn partial_then_fail() -> Self {
        Self::new("ffmpeg", |args| {
            if let Some(output) = args.last() {
                let _ = std::fs::write(output, b"partial");
            }
            Err(non_zero("moov atom not found"))
        })
    }

    /// A tool that always exits non-zero with `stderr`.
    pub fn failing(name: &str, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        Self::new(name, move |_| Err(non_zero(&stderr)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Option<Vec<OsString>> {
        self.last_args.lock().unwrap().clone()
    }
}

fn input_arg(args: &[OsString]) -> Option<PathBuf> {
    args.windows(2)
        .find(|w| w[0] == "-i")
        .map(|w| PathBuf::from(&w[1]))
}

fn non_zero(stderr: &str) -> ToolError {
    ToolError::NonZeroExit {
        program: "scripted".to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl MediaTool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, args: &[OsString]) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = Some(args.to_vec());
        (self.script)(args)
    }
}

/// A tool that never finishes, so callers can cancel it mid-run.
#[derive(Clone, Default)]
pub struct StalledTool {
    started: Arc<AtomicUsize>,
}

impl StalledTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTool for StalledTool {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn run(&self, _args: &[OsString]) -> Result<ToolOutput, ToolError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Blob store whose puts always fail after draining the reader.
#[derive(Clone, Default)]
pub struct FailingStorage {
    puts: Arc<AtomicUsize>,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_attempts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn put_stream(
        &self,
        _storage_key: &str,
        _content_type: &str,
        _content_length: Option<u64>,
        mut reader: StorageReader,
    ) -> StorageResult<u64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).await?;
        Err(StorageError::UploadFailed("injected put failure".to_string()))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, _storage_key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, _storage_key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    fn url_for(&self, storage_key: &str) -> String {
        format!("memory://failing/{}", storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
