use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde::{deserialize_optional_string, deserialize_trimmed_string};

/// Per-device preferences, stored as an opaque JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettings {
    pub device_id: String,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Epoch seconds after which the store may discard the item.
    pub expires_at: i64,
}

/// Result of an upsert: the stored settings and their new timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSettings {
    pub settings: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a conversation session.
///
/// `Active` moves to `Completed` exactly once; `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    /// Returns true if no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("Unknown session status: {other}")),
        }
    }
}

/// Tutor configuration chosen when a call starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub accent: String,
    #[serde(default)]
    pub level: String,
}

/// A conversation (phone call) between a device and the tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub device_id: String,
    pub session_id: String,
    pub tutor_name: String,
    pub topic: String,
    pub accent: String,
    pub level: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Call length in seconds.
    pub duration: u64,
    pub turn_count: u32,
    pub word_count: u32,
    pub status: SessionStatus,
    pub expires_at: i64,
}

/// Counters reported by the client when a call ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub word_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("Unknown message role: {other}")),
        }
    }
}

/// One conversation turn. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub translation: Option<String>,
    pub turn_number: u32,
    pub timestamp: DateTime<Utc>,
    pub expires_at: i64,
}

/// Payload for appending a message to a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub role: MessageRole,
    #[serde(deserialize_with = "deserialize_trimmed_string")]
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub translation: Option<String>,
    #[serde(default)]
    pub turn_number: u32,
}

/// Outcome of an expression-practice round attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeResult {
    pub practice_id: String,
    pub session_id: String,
    pub total_expressions: u32,
    pub completed_expressions: u32,
    /// Per-expression results in the order they were practiced.
    pub results: Vec<serde_json::Value>,
    pub completed_at: DateTime<Utc>,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPracticeResult {
    #[serde(default)]
    pub total_expressions: u32,
    #[serde(default)]
    pub completed_expressions: u32,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// One page of a device's session history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPage {
    pub sessions: Vec<ConversationSession>,
    /// Opaque continuation token; `None` when the history is exhausted.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// A session with everything recorded under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: ConversationSession,
    /// Ordered by turn number.
    pub messages: Vec<Message>,
    pub practice_results: Vec<PracticeResult>,
}

/// Per-item result of a session deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionOutcome {
    pub sort_key: String,
    pub deleted: bool,
}

/// Deletions are not atomic: some items may remain after a partial failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub outcomes: Vec<DeletionOutcome>,
}

impl DeletionReport {
    pub fn deleted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.deleted).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.deleted_count()
    }

    /// Returns true if every item was deleted.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_round_trips_through_str() {
        assert_eq!("active".parse::<SessionStatus>(), Ok(SessionStatus::Active));
        assert_eq!(
            "COMPLETED".parse::<SessionStatus>(),
            Ok(SessionStatus::Completed)
        );
        assert!("paused".parse::<SessionStatus>().is_err());
        assert_eq!(SessionStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_only_completed_is_terminal() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
    }

    #[test]
    fn test_new_message_deserializes_camel_case() {
        let json = r#"{"role":"user","content":"  Hi there ","translation":"","turnNumber":3}"#;
        let message: NewMessage = serde_json::from_str(json).unwrap();

        assert_eq!(message.role, MessageRole::User);
        assert_eq!(message.content, "Hi there");
        assert_eq!(message.translation, None);
        assert_eq!(message.turn_number, 3);
    }

    #[test]
    fn test_deletion_report_counts() {
        let report = DeletionReport {
            outcomes: vec![
                DeletionOutcome {
                    sort_key: "a".to_string(),
                    deleted: true,
                },
                DeletionOutcome {
                    sort_key: "b".to_string(),
                    deleted: false,
                },
                DeletionOutcome {
                    sort_key: "c".to_string(),
                    deleted: true,
                },
            ],
        };

        assert_eq!(report.deleted_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.is_complete());
        assert!(DeletionReport::default().is_complete());
    }

    #[test]
    fn test_session_serializes_null_ended_at() {
        let session = ConversationSession {
            device_id: "device-1".to_string(),
            session_id: "s1".to_string(),
            tutor_name: "Emma".to_string(),
            topic: "travel".to_string(),
            accent: "us".to_string(),
            level: "beginner".to_string(),
            started_at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            ended_at: None,
            duration: 0,
            turn_count: 0,
            word_count: 0,
            status: SessionStatus::Active,
            expires_at: 0,
        };

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["endedAt"], serde_json::Value::Null);
        assert_eq!(value["status"], "active");
        assert_eq!(value["tutorName"], "Emma");
    }
}
