//! Opaque pagination cursors.
//!
//! A cursor is the primary key of the last item a listing consumed, as
//! URL-safe base64 of its JSON form. Callers hold it and hand it back
//! unchanged.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tutorcall_core::session::{RepositoryError, Result};

use super::store::ItemKey;

pub fn encode_cursor(key: &ItemKey) -> Result<String> {
    let json = serde_json::to_vec(key).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes a cursor, or `None` if it was not produced by [`encode_cursor`].
pub fn decode_cursor(cursor: &str) -> Option<ItemKey> {
    let json = URL_SAFE_NO_PAD.decode(cursor.trim()).ok()?;
    serde_json::from_slice(&json).ok()
}
