use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tubely_core::AppError;
use uuid::Uuid;

const BEARER_PREFIX: &str = "Bearer ";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String, // user_id
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-sensitively and the token must be non-empty.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Malformed authorization header".to_string()))?;

    let token = header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
        AppError::Unauthenticated("Invalid authorization header format".to_string())
    })?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthenticated("Empty bearer token".to_string()));
    }
    Ok(token)
}

/// Validates and mints HS256 access tokens
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtValidator {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Validate a token and return the caller's user id.
    pub fn validate(&self, token: &str) -> Result<Uuid, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            AppError::Unauthenticated("Couldn't validate JWT".to_string())
        })?;

        Uuid::parse_str(&token_data.claims.sub)
            .map_err(|_| AppError::Unauthenticated("Token subject is not a user id".to_string()))
    }

    /// Mint a token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String, AppError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Internal(format!("Invalid token lifetime: {}", e)))?;
        self.issue_with_expiry(user_id, Utc::now() + ttl)
    }

    pub fn issue_with_expiry(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = JwtClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign JWT: {}", e)))
    }
}
