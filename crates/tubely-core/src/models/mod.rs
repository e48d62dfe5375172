//! Data models for the application

mod asset;
mod video;

pub use asset::*;
pub use video::*;
