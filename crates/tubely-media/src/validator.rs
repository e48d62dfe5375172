use tubely_core::models::AssetKind;

use crate::error::MediaError;

/// Strip parameters and lowercase a declared content type.
///
/// `"image/PNG; charset=binary"` becomes `"image/png"`.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
        .to_lowercase()
}

/// Declared content type validator
///
/// Exact match against the per-kind allow-list after normalization. The bytes
/// themselves are never sniffed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaValidator;

impl MediaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a declared content type, returning its normalized form.
    pub fn validate(
        &self,
        kind: AssetKind,
        declared: Option<&str>,
    ) -> Result<String, MediaError> {
        let declared = declared
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(MediaError::MissingContentType)?;

        let normalized = normalize_content_type(declared);
        let allowed = kind.allowed_content_types();

        if !allowed.contains(&normalized.as_str()) {
            return Err(MediaError::UnsupportedMediaType {
                content_type: declared.to_string(),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            });
        }

        Ok(normalized)
    }
}
