mod error;
mod http_mapping;
mod operations;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use http_mapping::repository_error_to_status_code;
pub use operations::{
    check_owner, clamp_page_limit, expiry_timestamp, sort_messages, sort_practice_results,
    take_newest_sessions, validate_required, DEFAULT_PAGE_LIMIT, DEFAULT_RETENTION_DAYS,
    MAX_PAGE_FETCHES, MAX_PAGE_LIMIT,
};
pub use traits::SessionRepository;
pub use types::{
    ConversationSession, DeletionOutcome, DeletionReport, DeviceSettings, Message, MessageRole,
    NewMessage, NewPracticeResult, PracticeResult, SavedSettings, SessionDetail, SessionPage,
    SessionSettings, SessionStats, SessionStatus, StartedSession,
};
