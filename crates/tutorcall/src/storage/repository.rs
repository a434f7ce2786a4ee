//! Session repository over a [`KeyValueStore`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tutorcall_core::session::{
    check_owner, expiry_timestamp, sort_messages, sort_practice_results, take_newest_sessions,
    validate_required, ConversationSession, DeletionOutcome, DeletionReport, DeviceSettings,
    Message, NewMessage, NewPracticeResult, PracticeResult, RepositoryError, Result,
    SavedSettings, SessionDetail, SessionPage, SessionRepository, SessionSettings, SessionStats,
    SessionStatus, StartedSession, DEFAULT_RETENTION_DAYS, MAX_PAGE_FETCHES, MAX_PAGE_LIMIT,
};

use super::conversions::{
    entity_type, item_to_message, item_to_practice, item_to_session, item_to_settings,
    message_to_item, owner_device_id, practice_to_item, session_end_updates, session_to_item,
    settings_to_item, ENTITY_TYPE_ATTRIBUTE, ENTITY_TYPE_MESSAGE, ENTITY_TYPE_PRACTICE,
    ENTITY_TYPE_SESSION,
};
use super::cursor::{decode_cursor, encode_cursor};
use super::keys;
use super::store::{Item, ItemKey, KeyValueStore, PutCondition, Query};

const SESSION: &str = "ConversationSession";
const SETTINGS: &str = "DeviceSettings";
const MESSAGE: &str = "Message";
const PRACTICE: &str = "PracticeResult";

/// Current time at the precision sort keys carry.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Keeps the items written by `owner`.
///
/// Another device can write under a session id before the owner's metadata
/// is visible; those items never surface in the owner's reads or deletes.
fn owned_items(items: Vec<Item>, owner: &str, session_id: &str) -> Vec<Item> {
    let total = items.len();
    let owned: Vec<Item> = items
        .into_iter()
        .filter(|item| owner_device_id(item).is_ok_and(|device_id| device_id == owner))
        .collect();

    if owned.len() < total {
        tracing::warn!(
            session_id = %session_id,
            skipped = total - owned.len(),
            "Skipping items written by another device"
        );
    }
    owned
}

/// Implements [`SessionRepository`] on any [`KeyValueStore`].
///
/// Holds no state besides the store; every read goes to the store.
pub struct StoreSessionRepository<S> {
    store: S,
    retention_days: i64,
}

impl<S: KeyValueStore> StoreSessionRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Sets how long new items live before the store expires them.
    pub fn with_retention_days(mut self, retention_days: i64) -> Self {
        self.retention_days = retention_days;
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn expires_at(&self, now: DateTime<Utc>) -> i64 {
        expiry_timestamp(now, self.retention_days)
    }

    /// Looks a session's metadata item up through the index.
    async fn find_session_meta(&self, session_id: &str) -> Result<Option<Item>> {
        let query = Query::gsi1(keys::session_gsi1_pk(session_id)).sort_key_equals(keys::META);
        let page = self.store.query(&query).await?;
        Ok(page.items.into_iter().next())
    }

    /// Every item recorded under a session, across all index pages.
    async fn session_items(&self, session_id: &str) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let query = Query::gsi1(keys::session_gsi1_pk(session_id)).start_key(start_key);
            let page = self.store.query(&query).await?;
            items.extend(page.items);

            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => return Ok(items),
            }
        }
    }

    /// Rejects writes under a session another device owns.
    ///
    /// A session that is not visible through the index yet is let through.
    async fn ensure_session_writable(&self, device_id: &str, session_id: &str) -> Result<()> {
        match self.find_session_meta(session_id).await? {
            Some(meta) => check_owner(SESSION, session_id, &owner_device_id(&meta)?, device_id),
            None => {
                tracing::debug!(session_id = %session_id, "Session not visible yet, accepting write");
                Ok(())
            }
        }
    }

    /// Resolves a caller cursor into a start key for the device's partition.
    fn resume_key(&self, device_pk: &str, cursor: Option<&str>) -> Option<Item> {
        let cursor = cursor.filter(|c| !c.is_empty())?;
        match decode_cursor(cursor) {
            Some(key) if key.pk == device_pk && key.sk.starts_with(keys::SESSION_PREFIX) => {
                Some(key.to_attributes())
            }
            _ => {
                tracing::warn!(cursor = %cursor, "Ignoring unusable cursor, listing from the start");
                None
            }
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> SessionRepository for StoreSessionRepository<S> {
    async fn upsert_settings(
        &self,
        device_id: &str,
        settings: serde_json::Value,
    ) -> Result<SavedSettings> {
        validate_required("deviceId", device_id)?;

        let now = now();
        let record = DeviceSettings {
            device_id: device_id.to_string(),
            settings,
            created_at: now,
            updated_at: now,
            expires_at: self.expires_at(now),
        };

        self.store
            .put_item(
                settings_to_item(&record)?,
                PutCondition::Always,
                SETTINGS,
                device_id,
            )
            .await?;
        tracing::debug!(device_id = %device_id, "Saved settings");

        Ok(SavedSettings {
            settings: record.settings,
            updated_at: record.updated_at,
        })
    }

    async fn get_settings(&self, device_id: &str) -> Result<Option<DeviceSettings>> {
        validate_required("deviceId", device_id)?;

        let key = ItemKey::new(keys::device_pk(device_id), keys::SETTINGS_SK);
        match self.store.get_item(&key).await? {
            Some(item) => Ok(Some(item_to_settings(&item)?)),
            None => Ok(None),
        }
    }

    async fn start_session(
        &self,
        device_id: &str,
        session_id: &str,
        settings: &SessionSettings,
        tutor_name: &str,
    ) -> Result<StartedSession> {
        validate_required("deviceId", device_id)?;
        validate_required("sessionId", session_id)?;

        if self.find_session_meta(session_id).await?.is_some() {
            return Err(RepositoryError::AlreadyExists {
                entity_type: SESSION,
                id: session_id.to_string(),
            });
        }

        let now = now();
        let session = ConversationSession {
            device_id: device_id.to_string(),
            session_id: session_id.to_string(),
            tutor_name: tutor_name.to_string(),
            topic: settings.topic.clone(),
            accent: settings.accent.clone(),
            level: settings.level.clone(),
            started_at: now,
            ended_at: None,
            duration: 0,
            turn_count: 0,
            word_count: 0,
            status: SessionStatus::Active,
            expires_at: self.expires_at(now),
        };

        self.store
            .put_item(
                session_to_item(&session),
                PutCondition::IfAbsent,
                SESSION,
                session_id,
            )
            .await?;
        tracing::info!(device_id = %device_id, session_id = %session_id, "Session started");

        Ok(StartedSession {
            session_id: session.session_id,
            started_at: session.started_at,
        })
    }

    async fn end_session(
        &self,
        device_id: &str,
        session_id: &str,
        stats: SessionStats,
    ) -> Result<DateTime<Utc>> {
        validate_required("deviceId", device_id)?;
        validate_required("sessionId", session_id)?;

        let meta = self
            .find_session_meta(session_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: SESSION,
                id: session_id.to_string(),
            })?;
        check_owner(SESSION, session_id, &owner_device_id(&meta)?, device_id)?;

        let key = ItemKey::from_item(&meta).ok_or_else(|| {
            RepositoryError::InvalidData(format!("Session {session_id} has no primary key"))
        })?;
        let ended_at = now();

        self.store
            .update_item(
                &key,
                session_end_updates(ended_at, stats),
                SESSION,
                session_id,
            )
            .await?;
        tracing::info!(
            device_id = %device_id,
            session_id = %session_id,
            duration = stats.duration,
            turn_count = stats.turn_count,
            "Session ended"
        );

        Ok(ended_at)
    }

    async fn append_message(
        &self,
        device_id: &str,
        session_id: &str,
        message: &NewMessage,
    ) -> Result<String> {
        validate_required("deviceId", device_id)?;
        validate_required("sessionId", session_id)?;
        self.ensure_session_writable(device_id, session_id).await?;

        let now = now();
        let message = Message {
            message_id: keys::ordinal(now, rand::random()),
            session_id: session_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            translation: message.translation.clone(),
            turn_number: message.turn_number,
            timestamp: now,
            expires_at: self.expires_at(now),
        };

        self.store
            .put_item(
                message_to_item(device_id, &message),
                PutCondition::IfAbsent,
                MESSAGE,
                &message.message_id,
            )
            .await?;
        tracing::debug!(
            session_id = %session_id,
            message_id = %message.message_id,
            turn_number = message.turn_number,
            "Message saved"
        );

        Ok(message.message_id)
    }

    async fn list_sessions(
        &self,
        device_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<SessionPage> {
        validate_required("deviceId", device_id)?;

        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let device_pk = keys::device_pk(device_id);
        let mut start_key = self.resume_key(&device_pk, cursor);

        let mut sessions = Vec::new();
        let mut last_evaluated_key = None;
        for fetch in 1..=MAX_PAGE_FETCHES {
            let query = Query::table(&device_pk)
                .sort_key_begins_with(keys::SESSION_PREFIX)
                .filter_eq(ENTITY_TYPE_ATTRIBUTE, ENTITY_TYPE_SESSION)
                .descending()
                .limit(limit)
                .start_key(start_key.take());
            let page = self.store.query(&query).await?;

            for item in &page.items {
                sessions.push(item_to_session(item)?);
            }
            last_evaluated_key = page.last_evaluated_key;

            if sessions.len() >= limit || last_evaluated_key.is_none() {
                break;
            }
            if fetch == MAX_PAGE_FETCHES {
                tracing::debug!(
                    device_id = %device_id,
                    collected = sessions.len(),
                    "Fetch ceiling reached, returning a short page"
                );
            }
            start_key = last_evaluated_key.clone();
        }

        let (sessions, dropped) = take_newest_sessions(sessions, limit, |s| {
            keys::session_sk(s.started_at, &s.session_id)
        });
        let next_key = if dropped {
            sessions
                .last()
                .map(|s| ItemKey::new(&device_pk, keys::session_sk(s.started_at, &s.session_id)))
        } else {
            last_evaluated_key.as_ref().and_then(ItemKey::from_item)
        };
        let next_cursor = next_key.as_ref().map(encode_cursor).transpose()?;

        Ok(SessionPage {
            has_more: next_cursor.is_some(),
            sessions,
            next_cursor,
        })
    }

    async fn get_session_detail(
        &self,
        device_id: &str,
        session_id: &str,
    ) -> Result<SessionDetail> {
        validate_required("deviceId", device_id)?;
        validate_required("sessionId", session_id)?;

        let items = self.session_items(session_id).await?;
        let meta = items
            .iter()
            .find(|item| entity_type(item) == Some(ENTITY_TYPE_SESSION))
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: SESSION,
                id: session_id.to_string(),
            })?;
        let session = item_to_session(meta)?;
        check_owner(SESSION, session_id, &session.device_id, device_id)?;

        let mut messages: Vec<Message> = Vec::new();
        let mut practice_results: Vec<PracticeResult> = Vec::new();
        for item in owned_items(items, &session.device_id, session_id) {
            match entity_type(&item) {
                Some(ENTITY_TYPE_SESSION) => {}
                Some(ENTITY_TYPE_MESSAGE) => messages.push(item_to_message(&item)?),
                Some(ENTITY_TYPE_PRACTICE) => practice_results.push(item_to_practice(&item)?),
                other => {
                    tracing::warn!(session_id = %session_id, entity_type = ?other, "Skipping unknown item");
                }
            }
        }

        sort_messages(&mut messages);
        sort_practice_results(&mut practice_results);

        Ok(SessionDetail {
            session,
            messages,
            practice_results,
        })
    }

    async fn delete_session(&self, device_id: &str, session_id: &str) -> Result<DeletionReport> {
        validate_required("deviceId", device_id)?;
        validate_required("sessionId", session_id)?;

        let items = self.session_items(session_id).await?;
        let owner_item = items
            .iter()
            .find(|item| entity_type(item) == Some(ENTITY_TYPE_SESSION))
            .or_else(|| items.first())
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: SESSION,
                id: session_id.to_string(),
            })?;
        let owner = owner_device_id(owner_item)?;
        check_owner(SESSION, session_id, &owner, device_id)?;

        let keys = owned_items(items, &owner, session_id)
            .iter()
            .map(|item| {
                ItemKey::from_item(item).ok_or_else(|| {
                    RepositoryError::InvalidData(format!(
                        "Item under session {session_id} has no primary key"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let unprocessed: HashSet<ItemKey> =
            self.store.batch_delete(&keys).await?.into_iter().collect();
        let report = DeletionReport {
            outcomes: keys
                .into_iter()
                .map(|key| DeletionOutcome {
                    deleted: !unprocessed.contains(&key),
                    sort_key: key.sk,
                })
                .collect(),
        };

        if report.deleted_count() == 0 {
            return Err(RepositoryError::Upstream(format!(
                "No item of session {session_id} could be deleted"
            )));
        }
        if report.is_complete() {
            tracing::info!(
                device_id = %device_id,
                session_id = %session_id,
                deleted = report.deleted_count(),
                "Session deleted"
            );
        } else {
            tracing::warn!(
                device_id = %device_id,
                session_id = %session_id,
                deleted = report.deleted_count(),
                failed = report.failed_count(),
                "Session partially deleted"
            );
        }

        Ok(report)
    }

    async fn save_practice_result(
        &self,
        device_id: &str,
        session_id: &str,
        practice: &NewPracticeResult,
    ) -> Result<String> {
        validate_required("deviceId", device_id)?;
        validate_required("sessionId", session_id)?;
        self.ensure_session_writable(device_id, session_id).await?;

        let now = now();
        let practice = PracticeResult {
            practice_id: keys::ordinal(now, rand::random()),
            session_id: session_id.to_string(),
            total_expressions: practice.total_expressions,
            completed_expressions: practice.completed_expressions,
            results: practice.results.clone(),
            completed_at: now,
            expires_at: self.expires_at(now),
        };

        self.store
            .put_item(
                practice_to_item(device_id, &practice)?,
                PutCondition::IfAbsent,
                PRACTICE,
                &practice.practice_id,
            )
            .await?;
        tracing::debug!(
            session_id = %session_id,
            practice_id = %practice.practice_id,
            "Practice result saved"
        );

        Ok(practice.practice_id)
    }
}
