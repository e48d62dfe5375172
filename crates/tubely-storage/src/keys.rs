//! Opaque key generation shared by all storage backends.
//!
//! Key format: `{prefix}/{id}.{ext}` when a prefix is given, `{id}.{ext}`
//! otherwise. `id` is 32 random bytes encoded as URL-safe base64 without
//! padding, so it never contains `/`, `+` or `=`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

const OPAQUE_ID_BYTES: usize = 32;

/// Draw 32 bytes from the thread-local CSPRNG and encode them URL-safely.
pub fn generate_opaque_id() -> String {
    let mut bytes = [0u8; OPAQUE_ID_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// File extension for a content type: its subtype, e.g. `image/png` → `png`.
///
/// Parameters (`; charset=...`) are ignored. Falls back to `bin` when the
/// subtype is missing or contains characters unsafe for a path segment.
pub fn extension_for(content_type: &str) -> String {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((_, subtype))
            if !subtype.is_empty()
                && subtype
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+') =>
        {
            subtype.to_ascii_lowercase()
        }
        _ => "bin".to_string(),
    }
}

/// Compose a fresh storage key for an asset with the given content type.
///
/// No collision check is performed; 256 bits of entropy make duplicates negligible.
pub fn asset_key(prefix: Option<&str>, content_type: &str) -> String {
    let id = generate_opaque_id();
    let ext = extension_for(content_type);
    match prefix {
        Some(prefix) => format!("{}/{}.{}", prefix.trim_matches('/'), id, ext),
        None => format!("{}.{}", id, ext),
    }
}
