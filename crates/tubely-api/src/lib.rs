//! Tubely API Library
//!
//! HTTP handlers, caller identity, routes and application setup.

mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
