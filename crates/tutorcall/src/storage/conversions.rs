//! Attribute conversion functions.
//!
//! Pure functions for converting between stored items and domain types.
//! These are testable in isolation without a store.

use std::collections::HashMap;
use std::str::FromStr;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use tutorcall_core::session::{
    ConversationSession, DeviceSettings, Message, MessageRole, PracticeResult, RepositoryError,
    SessionStats, SessionStatus,
};

use super::keys;
use super::store::{Item, GSI1PK, GSI1SK, PK, SK};

// ============================================================================
// Entity type constants
// ============================================================================

pub const ENTITY_TYPE_ATTRIBUTE: &str = "entityType";
pub const ENTITY_TYPE_SETTINGS: &str = "SETTINGS";
pub const ENTITY_TYPE_SESSION: &str = "SESSION";
pub const ENTITY_TYPE_MESSAGE: &str = "MESSAGE";
pub const ENTITY_TYPE_PRACTICE: &str = "PRACTICE";

pub const DEVICE_ID_ATTRIBUTE: &str = "deviceId";
pub const EXPIRES_AT_ATTRIBUTE: &str = "expiresAt";

type Result<T> = std::result::Result<T, RepositoryError>;

// ============================================================================
// Settings conversions
// ============================================================================

pub fn settings_to_item(settings: &DeviceSettings) -> Result<Item> {
    let mut item = HashMap::new();

    item.insert(
        PK.to_string(),
        AttributeValue::S(keys::device_pk(&settings.device_id)),
    );
    item.insert(
        SK.to_string(),
        AttributeValue::S(keys::SETTINGS_SK.to_string()),
    );
    insert_common(
        &mut item,
        ENTITY_TYPE_SETTINGS,
        &settings.device_id,
        settings.expires_at,
    );

    let json = serde_json::to_string(&settings.settings)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    item.insert("settings".to_string(), AttributeValue::S(json));
    item.insert("createdAt".to_string(), datetime_value(settings.created_at));
    item.insert("updatedAt".to_string(), datetime_value(settings.updated_at));

    Ok(item)
}

pub fn item_to_settings(item: &Item) -> Result<DeviceSettings> {
    let json = get_string(item, "settings")?;
    let settings = serde_json::from_str(&json)
        .map_err(|e| RepositoryError::Serialization(format!("Invalid settings JSON: {}", e)))?;

    Ok(DeviceSettings {
        device_id: get_string(item, DEVICE_ID_ATTRIBUTE)?,
        settings,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, "updatedAt")?,
        expires_at: get_number(item, EXPIRES_AT_ATTRIBUTE)?,
    })
}

// ============================================================================
// Session conversions
// ============================================================================

pub fn session_to_item(session: &ConversationSession) -> Item {
    let mut item = HashMap::new();

    // Keys
    item.insert(
        PK.to_string(),
        AttributeValue::S(keys::device_pk(&session.device_id)),
    );
    item.insert(
        SK.to_string(),
        AttributeValue::S(keys::session_sk(session.started_at, &session.session_id)),
    );
    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::session_gsi1_pk(&session.session_id)),
    );
    item.insert(GSI1SK.to_string(), AttributeValue::S(keys::META.to_string()));
    insert_common(
        &mut item,
        ENTITY_TYPE_SESSION,
        &session.device_id,
        session.expires_at,
    );

    // Data
    item.insert(
        "sessionId".to_string(),
        AttributeValue::S(session.session_id.clone()),
    );
    item.insert(
        "tutorName".to_string(),
        AttributeValue::S(session.tutor_name.clone()),
    );
    item.insert("topic".to_string(), AttributeValue::S(session.topic.clone()));
    item.insert(
        "accent".to_string(),
        AttributeValue::S(session.accent.clone()),
    );
    item.insert("level".to_string(), AttributeValue::S(session.level.clone()));
    item.insert("startedAt".to_string(), datetime_value(session.started_at));
    item.insert(
        "endedAt".to_string(),
        session
            .ended_at
            .map(datetime_value)
            .unwrap_or(AttributeValue::Null(true)),
    );
    item.insert("duration".to_string(), number_value(session.duration));
    item.insert("turnCount".to_string(), number_value(session.turn_count));
    item.insert("wordCount".to_string(), number_value(session.word_count));
    item.insert(
        "status".to_string(),
        AttributeValue::S(session.status.as_str().to_string()),
    );

    item
}

pub fn item_to_session(item: &Item) -> Result<ConversationSession> {
    Ok(ConversationSession {
        device_id: get_string(item, DEVICE_ID_ATTRIBUTE)?,
        session_id: get_string(item, "sessionId")?,
        tutor_name: get_optional_string(item, "tutorName").unwrap_or_default(),
        topic: get_optional_string(item, "topic").unwrap_or_default(),
        accent: get_optional_string(item, "accent").unwrap_or_default(),
        level: get_optional_string(item, "level").unwrap_or_default(),
        started_at: get_datetime(item, "startedAt")?,
        ended_at: get_optional_datetime(item, "endedAt")?,
        duration: get_number(item, "duration")?,
        turn_count: get_number(item, "turnCount")?,
        word_count: get_number(item, "wordCount")?,
        status: parse_status(&get_string(item, "status")?)?,
        expires_at: get_number(item, EXPIRES_AT_ATTRIBUTE)?,
    })
}

/// Attributes written when a session ends.
///
/// `status` is always `completed`, so repeating the update cannot reopen
/// the session.
pub fn session_end_updates(ended_at: DateTime<Utc>, stats: SessionStats) -> Item {
    HashMap::from([
        ("endedAt".to_string(), datetime_value(ended_at)),
        ("duration".to_string(), number_value(stats.duration)),
        ("turnCount".to_string(), number_value(stats.turn_count)),
        ("wordCount".to_string(), number_value(stats.word_count)),
        (
            "status".to_string(),
            AttributeValue::S(SessionStatus::Completed.as_str().to_string()),
        ),
    ])
}

// ============================================================================
// Message conversions
// ============================================================================

pub fn message_to_item(device_id: &str, message: &Message) -> Item {
    let mut item = HashMap::new();

    // Keys
    item.insert(PK.to_string(), AttributeValue::S(keys::device_pk(device_id)));
    item.insert(
        SK.to_string(),
        AttributeValue::S(keys::message_sk(
            &message.session_id,
            &message.message_id,
        )),
    );
    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::session_gsi1_pk(&message.session_id)),
    );
    item.insert(
        GSI1SK.to_string(),
        AttributeValue::S(keys::message_gsi1_sk(&message.message_id)),
    );
    insert_common(
        &mut item,
        ENTITY_TYPE_MESSAGE,
        device_id,
        message.expires_at,
    );

    // Data
    item.insert(
        "messageId".to_string(),
        AttributeValue::S(message.message_id.clone()),
    );
    item.insert(
        "sessionId".to_string(),
        AttributeValue::S(message.session_id.clone()),
    );
    item.insert(
        "role".to_string(),
        AttributeValue::S(message.role.as_str().to_string()),
    );
    item.insert(
        "content".to_string(),
        AttributeValue::S(message.content.clone()),
    );
    item.insert(
        "translation".to_string(),
        message
            .translation
            .clone()
            .map(AttributeValue::S)
            .unwrap_or(AttributeValue::Null(true)),
    );
    item.insert("turnNumber".to_string(), number_value(message.turn_number));
    item.insert("timestamp".to_string(), datetime_value(message.timestamp));

    item
}

pub fn item_to_message(item: &Item) -> Result<Message> {
    let role = get_string(item, "role")?;

    Ok(Message {
        message_id: get_string(item, "messageId")?,
        session_id: get_string(item, "sessionId")?,
        role: MessageRole::from_str(&role).map_err(RepositoryError::InvalidData)?,
        content: get_optional_string(item, "content").unwrap_or_default(),
        translation: get_optional_string(item, "translation"),
        turn_number: get_number(item, "turnNumber")?,
        timestamp: get_datetime(item, "timestamp")?,
        expires_at: get_number(item, EXPIRES_AT_ATTRIBUTE)?,
    })
}

// ============================================================================
// Practice result conversions
// ============================================================================

pub fn practice_to_item(device_id: &str, practice: &PracticeResult) -> Result<Item> {
    let mut item = HashMap::new();

    // Keys
    item.insert(PK.to_string(), AttributeValue::S(keys::device_pk(device_id)));
    item.insert(
        SK.to_string(),
        AttributeValue::S(keys::practice_sk(
            &practice.session_id,
            &practice.practice_id,
        )),
    );
    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::session_gsi1_pk(&practice.session_id)),
    );
    item.insert(
        GSI1SK.to_string(),
        AttributeValue::S(keys::practice_gsi1_sk(&practice.practice_id)),
    );
    insert_common(
        &mut item,
        ENTITY_TYPE_PRACTICE,
        device_id,
        practice.expires_at,
    );

    // Data
    item.insert(
        "practiceId".to_string(),
        AttributeValue::S(practice.practice_id.clone()),
    );
    item.insert(
        "sessionId".to_string(),
        AttributeValue::S(practice.session_id.clone()),
    );
    item.insert(
        "totalExpressions".to_string(),
        number_value(practice.total_expressions),
    );
    item.insert(
        "completedExpressions".to_string(),
        number_value(practice.completed_expressions),
    );
    let results = serde_json::to_string(&practice.results)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    item.insert("results".to_string(), AttributeValue::S(results));
    item.insert(
        "completedAt".to_string(),
        datetime_value(practice.completed_at),
    );

    Ok(item)
}

pub fn item_to_practice(item: &Item) -> Result<PracticeResult> {
    let results = match get_optional_string(item, "results") {
        Some(json) => serde_json::from_str(&json).map_err(|e| {
            RepositoryError::Serialization(format!("Invalid practice results JSON: {}", e))
        })?,
        None => Vec::new(),
    };

    Ok(PracticeResult {
        practice_id: get_string(item, "practiceId")?,
        session_id: get_string(item, "sessionId")?,
        total_expressions: get_number(item, "totalExpressions")?,
        completed_expressions: get_number(item, "completedExpressions")?,
        results,
        completed_at: get_datetime(item, "completedAt")?,
        expires_at: get_number(item, EXPIRES_AT_ATTRIBUTE)?,
    })
}

// ============================================================================
// Shared attributes
// ============================================================================

/// Returns the item's `entityType`, if it has one.
pub fn entity_type(item: &Item) -> Option<&str> {
    item.get(ENTITY_TYPE_ATTRIBUTE)
        .and_then(|v| v.as_s().ok())
        .map(String::as_str)
}

/// Returns the device that owns the item.
pub fn owner_device_id(item: &Item) -> Result<String> {
    get_string(item, DEVICE_ID_ATTRIBUTE)
}

fn insert_common(item: &mut Item, entity_type: &str, device_id: &str, expires_at: i64) {
    item.insert(
        ENTITY_TYPE_ATTRIBUTE.to_string(),
        AttributeValue::S(entity_type.to_string()),
    );
    item.insert(
        DEVICE_ID_ATTRIBUTE.to_string(),
        AttributeValue::S(device_id.to_string()),
    );
    item.insert(EXPIRES_AT_ATTRIBUTE.to_string(), number_value(expires_at));
}

fn parse_status(s: &str) -> Result<SessionStatus> {
    SessionStatus::from_str(s).map_err(RepositoryError::InvalidData)
}

// ============================================================================
// Attribute helpers
// ============================================================================

fn datetime_value(at: DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn number_value(n: impl ToString) -> AttributeValue {
    AttributeValue::N(n.to_string())
}

fn get_string(item: &Item, key: &str) -> Result<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

/// Missing numbers read as zero; items written by older clients omit them.
fn get_number<T>(item: &Item, key: &str) -> Result<T>
where
    T: FromStr + Default,
{
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(T::default()),
        Some(AttributeValue::N(n)) => n
            .parse()
            .map_err(|_| RepositoryError::InvalidData(format!("Invalid number {}: {}", key, n))),
        Some(_) => Err(RepositoryError::InvalidData(format!(
            "Missing or invalid field: {}",
            key
        ))),
    }
}

fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>> {
    let s = get_string(item, key)?;
    parse_datetime(key, &s)
}

fn get_optional_datetime(item: &Item, key: &str) -> Result<Option<DateTime<Utc>>> {
    match get_optional_string(item, key) {
        Some(s) => parse_datetime(key, &s).map(Some),
        None => Ok(None),
    }
}

fn parse_datetime(key: &str, s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid datetime {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample_session() -> ConversationSession {
        ConversationSession {
            device_id: "device-1".to_string(),
            session_id: "s1".to_string(),
            tutor_name: "Emma".to_string(),
            topic: "travel".to_string(),
            accent: "british".to_string(),
            level: "intermediate".to_string(),
            started_at: at("2024-05-01T10:00:00.250Z"),
            ended_at: None,
            duration: 0,
            turn_count: 0,
            word_count: 0,
            status: SessionStatus::Active,
            expires_at: 1_722_506_400,
        }
    }

    fn sample_message() -> Message {
        Message {
            message_id: "2024-05-01T10:00:05.000Z#0000abcd".to_string(),
            session_id: "s1".to_string(),
            role: MessageRole::Assistant,
            content: "How was your trip?".to_string(),
            translation: Some("여행은 어땠어요?".to_string()),
            turn_number: 2,
            timestamp: at("2024-05-01T10:00:05Z"),
            expires_at: 1_722_506_405,
        }
    }

    fn get_s<'a>(item: &'a Item, key: &str) -> &'a str {
        item.get(key).unwrap().as_s().unwrap()
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = DeviceSettings {
            device_id: "device-1".to_string(),
            settings: json!({"tutor": "Emma", "speed": 1.25, "autoTranslate": true}),
            created_at: at("2024-05-01T10:00:00Z"),
            updated_at: at("2024-05-02T10:00:00Z"),
            expires_at: 1_722_506_400,
        };

        let item = settings_to_item(&settings).unwrap();

        assert_eq!(get_s(&item, PK), "DEVICE#device-1");
        assert_eq!(get_s(&item, SK), "SETTINGS");
        assert_eq!(get_s(&item, ENTITY_TYPE_ATTRIBUTE), ENTITY_TYPE_SETTINGS);
        assert!(!item.contains_key(GSI1PK));
        assert_eq!(item_to_settings(&item).unwrap(), settings);
    }

    #[test]
    fn test_session_to_item_keys_and_attributes() {
        let item = session_to_item(&sample_session());

        assert_eq!(get_s(&item, PK), "DEVICE#device-1");
        assert_eq!(get_s(&item, SK), "SESSION#2024-05-01T10:00:00.250Z#s1#META");
        assert_eq!(get_s(&item, GSI1PK), "SESSION#s1");
        assert_eq!(get_s(&item, GSI1SK), "META");
        assert_eq!(get_s(&item, DEVICE_ID_ATTRIBUTE), "device-1");
        assert_eq!(get_s(&item, "status"), "active");
        assert_eq!(item.get("endedAt"), Some(&AttributeValue::Null(true)));
        assert_eq!(
            item.get(EXPIRES_AT_ATTRIBUTE),
            Some(&AttributeValue::N("1722506400".to_string()))
        );
    }

    #[test]
    fn test_session_round_trip() {
        let session = sample_session();
        let item = session_to_item(&session);
        assert_eq!(item_to_session(&item).unwrap(), session);

        let ended = ConversationSession {
            ended_at: Some(at("2024-05-01T10:12:00Z")),
            duration: 720,
            turn_count: 14,
            word_count: 301,
            status: SessionStatus::Completed,
            ..session
        };
        let item = session_to_item(&ended);
        assert_eq!(item_to_session(&item).unwrap(), ended);
    }

    #[test]
    fn test_session_end_updates_apply_over_stored_item() {
        let mut item = session_to_item(&sample_session());
        let stats = SessionStats {
            duration: 95,
            turn_count: 6,
            word_count: 40,
        };

        item.extend(session_end_updates(at("2024-05-01T10:01:35Z"), stats));
        let session = item_to_session(&item).unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.ended_at, Some(at("2024-05-01T10:01:35Z")));
        assert_eq!(session.duration, 95);
        assert_eq!(session.turn_count, 6);
        assert_eq!(session.word_count, 40);
    }

    #[test]
    fn test_message_round_trip() {
        let message = sample_message();
        let item = message_to_item("device-1", &message);

        assert_eq!(
            get_s(&item, SK),
            "SESSION#s1#MSG#2024-05-01T10:00:05.000Z#0000abcd"
        );
        assert_eq!(get_s(&item, GSI1SK), "MSG#2024-05-01T10:00:05.000Z#0000abcd");
        assert_eq!(get_s(&item, DEVICE_ID_ATTRIBUTE), "device-1");
        assert_eq!(item_to_message(&item).unwrap(), message);
    }

    #[test]
    fn test_message_without_translation_stores_null() {
        let message = Message {
            translation: None,
            ..sample_message()
        };
        let item = message_to_item("device-1", &message);

        assert_eq!(item.get("translation"), Some(&AttributeValue::Null(true)));
        assert_eq!(item_to_message(&item).unwrap().translation, None);
    }

    #[test]
    fn test_practice_round_trip_preserves_result_order() {
        let practice = PracticeResult {
            practice_id: "2024-05-01T10:20:00.000Z#00000001".to_string(),
            session_id: "s1".to_string(),
            total_expressions: 3,
            completed_expressions: 2,
            results: vec![
                json!({"expression": "break the ice", "passed": true}),
                json!({"expression": "hit the road", "passed": false}),
                json!({"expression": "call it a day", "passed": true}),
            ],
            completed_at: at("2024-05-01T10:20:00Z"),
            expires_at: 1_722_507_600,
        };

        let item = practice_to_item("device-1", &practice).unwrap();

        assert_eq!(get_s(&item, ENTITY_TYPE_ATTRIBUTE), ENTITY_TYPE_PRACTICE);
        assert_eq!(
            get_s(&item, GSI1SK),
            "PRACTICE#2024-05-01T10:20:00.000Z#00000001"
        );
        assert_eq!(item_to_practice(&item).unwrap(), practice);
    }

    #[test]
    fn test_item_to_session_rejects_unknown_status() {
        let mut item = session_to_item(&sample_session());
        item.insert("status".to_string(), AttributeValue::S("paused".to_string()));

        assert!(matches!(
            item_to_session(&item),
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[test]
    fn test_missing_counters_read_as_zero() {
        let mut item = session_to_item(&sample_session());
        item.remove("turnCount");
        item.insert("wordCount".to_string(), AttributeValue::Null(true));

        let session = item_to_session(&item).unwrap();
        assert_eq!(session.turn_count, 0);
        assert_eq!(session.word_count, 0);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut item = session_to_item(&sample_session());
        item.insert("duration".to_string(), AttributeValue::N("-5".to_string()));

        assert!(matches!(
            item_to_session(&item),
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[test]
    fn test_entity_type_and_owner() {
        let item = message_to_item("device-9", &sample_message());
        assert_eq!(entity_type(&item), Some(ENTITY_TYPE_MESSAGE));
        assert_eq!(owner_device_id(&item).unwrap(), "device-9");
        assert_eq!(entity_type(&Item::new()), None);
        assert!(owner_device_id(&Item::new()).is_err());
    }
}
