use async_trait::async_trait;

use super::types::{
    DeletionReport, DeviceSettings, NewMessage, NewPracticeResult, SavedSettings, SessionDetail,
    SessionPage, SessionSettings, SessionStats, StartedSession,
};
use super::Result;

/// Persistence contract for device settings, conversation sessions, messages
/// and practice results.
///
/// Every operation fails with `RepositoryError::Validation` when a required
/// identifier is empty. Mutations of session-scoped data are rejected with
/// `RepositoryError::AccessDenied` when the session belongs to another device.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Replaces the device's settings wholesale.
    async fn upsert_settings(
        &self,
        device_id: &str,
        settings: serde_json::Value,
    ) -> Result<SavedSettings>;

    /// Gets the device's settings, if any were saved.
    async fn get_settings(&self, device_id: &str) -> Result<Option<DeviceSettings>>;

    /// Records a new active session with zeroed counters.
    async fn start_session(
        &self,
        device_id: &str,
        session_id: &str,
        settings: &SessionSettings,
        tutor_name: &str,
    ) -> Result<StartedSession>;

    /// Marks a session completed and stores its final counters.
    ///
    /// Calling this again overwrites the counters; the status stays completed.
    async fn end_session(
        &self,
        device_id: &str,
        session_id: &str,
        stats: SessionStats,
    ) -> Result<chrono::DateTime<chrono::Utc>>;

    /// Appends a message to a session and returns its id.
    async fn append_message(
        &self,
        device_id: &str,
        session_id: &str,
        message: &NewMessage,
    ) -> Result<String>;

    /// Lists the device's sessions, newest first.
    async fn list_sessions(
        &self,
        device_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<SessionPage>;

    /// Gets a session with its messages in turn order.
    async fn get_session_detail(&self, device_id: &str, session_id: &str)
        -> Result<SessionDetail>;

    /// Deletes a session and everything recorded under it.
    async fn delete_session(&self, device_id: &str, session_id: &str) -> Result<DeletionReport>;

    /// Appends a practice result to a session and returns its id.
    async fn save_practice_result(
        &self,
        device_id: &str,
        session_id: &str,
        practice: &NewPracticeResult,
    ) -> Result<String>;
}
