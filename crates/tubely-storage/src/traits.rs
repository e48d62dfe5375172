//! Storage abstraction trait
//!
//! This module defines the Storage trait that all blob backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;
use tubely_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            other => AppError::StorageFailure(other.to_string()),
        }
    }
}

/// Reader handed to [`Storage::put_stream`].
pub type StorageReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Blob store capability
///
/// Both asset kinds go through the same backend. Keys are produced by the
/// [`keys`](crate::keys) module and must not contain `..` or a leading `/`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write the reader's bytes under `storage_key`, returning the number of bytes stored.
    ///
    /// A failed put leaves no object behind under `storage_key`.
    async fn put_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: StorageReader,
    ) -> StorageResult<u64>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a file by its storage key. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Externally resolvable URL for a key. Pure function of configuration and key.
    fn url_for(&self, storage_key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
