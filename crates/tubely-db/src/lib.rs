//! Tubely Database Layer
//!
//! Postgres repositories for video records and the `VideoStore` trait the
//! upload pipeline is written against.

pub mod db;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use db::VideoRepository;
pub use traits::VideoStore;

/// Embedded migrations from the workspace `migrations/` directory.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
