//! Conversation analysis.
//!
//! Failures of the model never surface as errors: the caller gets the
//! word-count fallback with HTTP 200 and `fallback: true`.

use serde_json::{json, Value};
use tutorcall_core::analysis::{
    analysis_prompt, conversation_transcript, fallback_analysis, parse_analysis_reply,
    TranscriptLine, ANALYSIS_SYSTEM_PROMPT,
};
use tutorcall_core::services::{ChatCompletionService, ChatTurn};

use super::error::BadRequest;

/// Analyzes `messages`, degrading to the fallback when the model is
/// missing or its reply is unusable.
pub async fn analyze_conversation(
    chat: Option<&dyn ChatCompletionService>,
    messages: &[TranscriptLine],
) -> Result<Value, BadRequest> {
    if messages.is_empty() {
        return Err(BadRequest("No messages to analyze".to_string()));
    }

    let reason = match chat {
        Some(chat) => match model_analysis(chat, messages).await {
            Ok(analysis) => return Ok(json!({ "analysis": analysis })),
            Err(reason) => reason,
        },
        None => "No analysis model configured".to_string(),
    };

    tracing::warn!(reason = %reason, "Falling back to heuristic analysis");
    Ok(json!({
        "analysis": fallback_analysis(messages),
        "fallback": true,
        "error": reason,
    }))
}

async fn model_analysis(
    chat: &dyn ChatCompletionService,
    messages: &[TranscriptLine],
) -> Result<Value, String> {
    let prompt = analysis_prompt(&conversation_transcript(messages));
    let reply = chat
        .complete(ANALYSIS_SYSTEM_PROMPT, &[ChatTurn::user(prompt)])
        .await
        .map_err(|e| e.to_string())?;
    let analysis = parse_analysis_reply(&reply)?;
    serde_json::to_value(analysis).map_err(|e| e.to_string())
}
