//! Tubely Storage Library
//!
//! Blob storage for uploaded assets. It includes the `Storage` trait, local
//! filesystem and S3 implementations, and the opaque key generator.
//!
//! # Storage key format
//!
//! - **Videos**: `{aspect_prefix}/{opaque_id}.{ext}`, e.g. `landscape/3q2-…_x.mp4`
//! - **Thumbnails**: `{opaque_id}.{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::asset_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageReader, StorageResult};
pub use tubely_core::StorageBackend;
