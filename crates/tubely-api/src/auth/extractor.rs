use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::extract_bearer_token;
use crate::error::HttpAppError;
use crate::state::AppState;

/// Authenticated caller id.
///
/// Runs from request parts, so the body is never read for an
/// unauthenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let user_id = state.jwt.validate(token)?;
        Ok(AuthUser(user_id))
    }
}
