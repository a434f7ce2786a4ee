//! Key generation functions.
//!
//! Pure functions for generating partition and sort keys following the single-table design.

use chrono::{DateTime, Utc};

// ============================================================================
// Key prefixes
// ============================================================================

pub const DEVICE_PREFIX: &str = "DEVICE#";
pub const SESSION_PREFIX: &str = "SESSION#";
pub const SETTINGS_SK: &str = "SETTINGS";
pub const META: &str = "META";
pub const MESSAGE_MARKER: &str = "MSG#";
pub const PRACTICE_MARKER: &str = "PRACTICE#";

// ============================================================================
// Ordering
// ============================================================================

/// Formats a timestamp for use inside a sort key.
///
/// Fixed width with millisecond precision, so byte order equals time order.
pub fn sort_key_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Position of an appended item within its session.
///
/// Pattern: `<timestamp>#<8 hex chars>`. The suffix keeps two items written
/// in the same millisecond apart.
pub fn ordinal(at: DateTime<Utc>, suffix: u32) -> String {
    format!("{}#{suffix:08x}", sort_key_timestamp(at))
}

// ============================================================================
// Device keys
// ============================================================================

/// Partition shared by everything a device owns.
///
/// Pattern: `DEVICE#<device_id>`
pub fn device_pk(device_id: &str) -> String {
    format!("{DEVICE_PREFIX}{device_id}")
}

// ============================================================================
// Session keys
// ============================================================================

/// Pattern: `SESSION#<started_at>#<session_id>#META`
pub fn session_sk(started_at: DateTime<Utc>, session_id: &str) -> String {
    format!(
        "{SESSION_PREFIX}{}#{session_id}#{META}",
        sort_key_timestamp(started_at)
    )
}

/// Index partition holding a session and everything recorded under it.
///
/// Pattern: `SESSION#<session_id>`
pub fn session_gsi1_pk(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

// ============================================================================
// Message keys
// ============================================================================

/// Pattern: `SESSION#<session_id>#MSG#<ordinal>`
pub fn message_sk(session_id: &str, ordinal: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}#{MESSAGE_MARKER}{ordinal}")
}

/// Pattern: `MSG#<ordinal>`
pub fn message_gsi1_sk(ordinal: &str) -> String {
    format!("{MESSAGE_MARKER}{ordinal}")
}

// ============================================================================
// Practice result keys
// ============================================================================

/// Pattern: `SESSION#<session_id>#PRACTICE#<ordinal>`
pub fn practice_sk(session_id: &str, ordinal: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}#{PRACTICE_MARKER}{ordinal}")
}

/// Pattern: `PRACTICE#<ordinal>`
pub fn practice_gsi1_sk(ordinal: &str) -> String {
    format!("{PRACTICE_MARKER}{ordinal}")
}
