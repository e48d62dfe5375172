//! Temporary staging of inbound upload bytes.
//!
//! Every pipeline invocation gets its own [`StagingDir`]; everything staged or
//! derived during the invocation lives inside it and is removed when it drops.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::MediaError;

/// Root under which per-invocation staging directories are created
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, empty directory for one invocation.
    pub async fn begin(&self) -> Result<StagingDir, MediaError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(MediaError::Staging)?;

        let dir = tempfile::Builder::new()
            .prefix("tubely-upload-")
            .tempdir_in(&self.root)
            .map_err(MediaError::Staging)?;

        Ok(StagingDir { dir })
    }
}

/// A per-invocation directory, deleted with everything in it on drop
#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a new file inside this directory.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Copy `reader` into `name`, failing once more than `max_bytes` arrive.
    ///
    /// The stream is never truncated: an oversized stream yields
    /// `PayloadTooLarge` and the partial file is removed. A reader that fails
    /// with `ErrorKind::FileTooLarge` is treated the same way.
    pub async fn stage<R>(
        &self,
        name: &str,
        reader: R,
        max_bytes: u64,
    ) -> Result<StagedAsset, MediaError>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.file_path(name);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(MediaError::Staging)?;

        // One byte past the cap is enough to know the stream is too large.
        let mut limited = reader.take(max_bytes.saturating_add(1));
        let copied = match tokio::io::copy(&mut limited, &mut file).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                remove_quietly(&path).await;
                if e.kind() == std::io::ErrorKind::FileTooLarge {
                    return Err(MediaError::PayloadTooLarge { max: max_bytes });
                }
                return Err(MediaError::Staging(e));
            }
        };

        if copied > max_bytes {
            drop(file);
            remove_quietly(&path).await;
            return Err(MediaError::PayloadTooLarge { max: max_bytes });
        }

        file.flush().await.map_err(MediaError::Staging)?;

        tracing::debug!(path = %path.display(), size_bytes = copied, "Upload staged");

        Ok(StagedAsset {
            path,
            size: copied,
            file,
        })
    }
}

/// Staged bytes of one upload, addressable by path and by handle
#[derive(Debug)]
pub struct StagedAsset {
    path: PathBuf,
    size: u64,
    file: File,
}

impl StagedAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Consume the asset, returning its handle positioned at offset 0.
    pub async fn into_reader(mut self) -> Result<File, MediaError> {
        self.file.rewind().await.map_err(MediaError::Staging)?;
        Ok(self.file)
    }
}

pub(crate) async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }
}
