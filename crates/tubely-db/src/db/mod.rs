//! Database repositories for data access layer
//!
//! Each repository is responsible for a single table.

pub mod video;

pub use video::VideoRepository;
