//! Pure functions over session data: validation, ownership, ordering and
//! paging policy.

use std::cmp::Reverse;

use chrono::{DateTime, Duration, Utc};

use super::types::{ConversationSession, Message, PracticeResult};
use super::{RepositoryError, Result};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Upper bound on store round trips for a single session listing.
///
/// Session metadata shares its partition with messages and practice results,
/// and the store applies the metadata filter after reading a page. A page can
/// therefore come back short, or empty, while more sessions remain. Listing
/// keeps fetching until the page is full or the store runs out, but never
/// more than this many times. When the ceiling is hit the caller receives a
/// short page with a cursor, so no session is skipped; it just takes more
/// calls to reach it.
pub const MAX_PAGE_FETCHES: usize = 10;

/// Default item retention before the store expires it.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Fails with `Validation` when a required identifier is blank.
pub fn validate_required(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RepositoryError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Fails with `AccessDenied` unless `caller` owns the entity.
pub fn check_owner(
    entity_type: &'static str,
    id: &str,
    owner_device_id: &str,
    caller_device_id: &str,
) -> Result<()> {
    if owner_device_id != caller_device_id {
        return Err(RepositoryError::AccessDenied {
            entity_type,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Clamps a requested page size into `1..=MAX_PAGE_LIMIT`.
pub fn clamp_page_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT)
}

/// Epoch seconds at which an item created at `now` expires.
pub fn expiry_timestamp(now: DateTime<Utc>, retention_days: i64) -> i64 {
    (now + Duration::days(retention_days)).timestamp()
}

/// Orders messages as the conversation happened.
///
/// Turn number is authoritative; timestamp and id only break ties so the
/// order is total and stable across calls.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        a.turn_number
            .cmp(&b.turn_number)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.message_id.cmp(&b.message_id))
    });
}

/// Orders practice results by completion time, oldest first.
pub fn sort_practice_results(results: &mut [PracticeResult]) {
    results.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then_with(|| a.practice_id.cmp(&b.practice_id))
    });
}

/// Sorts sessions newest first and keeps at most `limit` of them.
///
/// `sort_key` yields the key the store orders sessions by; sessions come
/// back in descending key order so a cursor built from the last kept
/// session resumes exactly after it.
///
/// Returns the kept sessions and whether any were dropped.
pub fn take_newest_sessions<F>(
    mut sessions: Vec<ConversationSession>,
    limit: usize,
    sort_key: F,
) -> (Vec<ConversationSession>, bool)
where
    F: Fn(&ConversationSession) -> String,
{
    sessions.sort_by_cached_key(|s| Reverse(sort_key(s)));
    let dropped = sessions.len() > limit;
    sessions.truncate(limit);
    (sessions, dropped)
}
