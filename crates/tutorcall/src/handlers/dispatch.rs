//! Action dispatcher (POST /).
//!
//! The body is a flat JSON object whose `action` field selects the
//! operation; the remaining fields are that action's arguments.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use tutorcall_core::analysis::TranscriptLine;
use tutorcall_core::serde::{deserialize_optional_string, deserialize_trimmed_string};
use tutorcall_core::session::{
    clamp_page_limit, MessageRole, NewMessage, NewPracticeResult, SessionSettings, SessionStats,
};
use tutorcall_core::signing::{presign_url, transcribe_streaming_request, PRESIGN_EXPIRY_SECONDS};

use super::analyze::analyze_conversation;
use super::error::BadRequest;
use crate::{handlers::AppError, state::AppState};

/// Every request the backend accepts.
#[derive(Debug, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    SaveSettings {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        settings: Value,
    },
    GetSettings {
        #[serde(default)]
        device_id: String,
    },
    StartSession {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        settings: SessionSettings,
        #[serde(default)]
        tutor_name: String,
    },
    EndSession {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        duration: u64,
        #[serde(default)]
        turn_count: u32,
        #[serde(default)]
        word_count: u32,
    },
    SaveMessage {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        session_id: String,
        role: MessageRole,
        #[serde(deserialize_with = "deserialize_trimmed_string")]
        content: String,
        #[serde(default, deserialize_with = "deserialize_optional_string")]
        translation: Option<String>,
        #[serde(default)]
        turn_number: u32,
    },
    GetSessions {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        cursor: Option<String>,
    },
    GetSessionDetail {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        session_id: String,
    },
    DeleteSession {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        session_id: String,
    },
    SavePracticeResult {
        #[serde(default)]
        device_id: String,
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        total_expressions: u32,
        #[serde(default)]
        completed_expressions: u32,
        #[serde(default)]
        results: Vec<Value>,
    },
    GetTranscribeUrl {
        #[serde(default = "default_language")]
        language: String,
        #[serde(default = "default_sample_rate")]
        sample_rate: u32,
    },
    Analyze {
        #[serde(default)]
        messages: Vec<TranscriptLine>,
    },
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SaveSettings { .. } => "saveSettings",
            Action::GetSettings { .. } => "getSettings",
            Action::StartSession { .. } => "startSession",
            Action::EndSession { .. } => "endSession",
            Action::SaveMessage { .. } => "saveMessage",
            Action::GetSessions { .. } => "getSessions",
            Action::GetSessionDetail { .. } => "getSessionDetail",
            Action::DeleteSession { .. } => "deleteSession",
            Action::SavePracticeResult { .. } => "savePracticeResult",
            Action::GetTranscribeUrl { .. } => "getTranscribeUrl",
            Action::Analyze { .. } => "analyze",
        }
    }
}

/// Wraps `payload` in the `{ "success": true, ... }` envelope.
fn success(payload: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    if let Value::Object(fields) = payload {
        body.extend(fields);
    }
    Json(Value::Object(body))
}

/// POST / - Runs the action named in the body.
#[axum::debug_handler]
pub async fn dispatch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let action: Action = serde_json::from_slice(&body)
        .map_err(|e| BadRequest(format!("Invalid request: {e}")))?;

    tracing::debug!(action = action.name(), "Dispatching action");
    run(&state, action).await
}

async fn run(state: &AppState, action: Action) -> Result<Json<Value>, AppError> {
    let sessions = &state.sessions;

    match action {
        Action::SaveSettings {
            device_id,
            settings,
        } => {
            let saved = sessions.upsert_settings(&device_id, settings).await?;
            Ok(success(json!({
                "settings": saved.settings,
                "updatedAt": saved.updated_at,
            })))
        }
        Action::GetSettings { device_id } => {
            let settings = sessions.get_settings(&device_id).await?;
            Ok(success(json!({
                "settings": settings.map(|s| s.settings),
            })))
        }
        Action::StartSession {
            device_id,
            session_id,
            settings,
            tutor_name,
        } => {
            let started = sessions
                .start_session(&device_id, &session_id, &settings, &tutor_name)
                .await?;
            Ok(success(serde_json::to_value(started)?))
        }
        Action::EndSession {
            device_id,
            session_id,
            duration,
            turn_count,
            word_count,
        } => {
            let stats = SessionStats {
                duration,
                turn_count,
                word_count,
            };
            let ended_at = sessions.end_session(&device_id, &session_id, stats).await?;
            Ok(success(json!({
                "sessionId": session_id,
                "endedAt": ended_at,
            })))
        }
        Action::SaveMessage {
            device_id,
            session_id,
            role,
            content,
            translation,
            turn_number,
        } => {
            let message = NewMessage {
                role,
                content,
                translation,
                turn_number,
            };
            let message_id = sessions
                .append_message(&device_id, &session_id, &message)
                .await?;
            Ok(success(json!({ "messageId": message_id })))
        }
        Action::GetSessions {
            device_id,
            limit,
            cursor,
        } => {
            let page = sessions
                .list_sessions(&device_id, clamp_page_limit(limit), cursor.as_deref())
                .await?;
            Ok(success(serde_json::to_value(page)?))
        }
        Action::GetSessionDetail {
            device_id,
            session_id,
        } => {
            let detail = sessions.get_session_detail(&device_id, &session_id).await?;
            Ok(success(serde_json::to_value(detail)?))
        }
        Action::DeleteSession {
            device_id,
            session_id,
        } => {
            let report = sessions.delete_session(&device_id, &session_id).await?;
            Ok(success(json!({
                "deletedCount": report.deleted_count(),
                "results": report.outcomes,
            })))
        }
        Action::SavePracticeResult {
            device_id,
            session_id,
            total_expressions,
            completed_expressions,
            results,
        } => {
            let practice = NewPracticeResult {
                total_expressions,
                completed_expressions,
                results,
            };
            let practice_id = sessions
                .save_practice_result(&device_id, &session_id, &practice)
                .await?;
            Ok(success(json!({ "practiceId": practice_id })))
        }
        Action::GetTranscribeUrl {
            language,
            sample_rate,
        } => {
            let credentials = state.signing_credentials().await?;
            let request = transcribe_streaming_request(
                credentials,
                &state.aws_region,
                &language,
                sample_rate,
                Utc::now(),
            );
            let url = presign_url(&request)?;
            Ok(success(json!({
                "url": url,
                "expiresIn": PRESIGN_EXPIRY_SECONDS,
            })))
        }
        Action::Analyze { messages } => {
            let body = analyze_conversation(state.chat.as_deref(), &messages).await?;
            // The fallback is reported without the success flag, still as HTTP 200.
            if body.get("fallback").is_some() {
                Ok(Json(body))
            } else {
                Ok(success(body))
            }
        }
    }
}
