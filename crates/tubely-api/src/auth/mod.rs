//! Caller identity: bearer token extraction and HS256 JWT validation.

pub mod extractor;
pub mod jwt;

pub use extractor::AuthUser;
pub use jwt::{extract_bearer_token, JwtClaims, JwtValidator};
