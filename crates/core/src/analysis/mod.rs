//! Conversation quality analysis.
//!
//! The model-backed path asks a chat model for a JSON report; when that
//! fails the caller degrades to [`fallback_analysis`], which only counts
//! words and fillers.

mod fallback;
mod types;

pub use fallback::{fallback_analysis, find_fillers, user_text, FALLBACK_SCORES, FILLER_WORDS};
pub use types::{
    CafpScores, ConversationAnalysis, FillerStats, GrammarCorrection, TranscriptLine,
    VocabularyStats,
};

/// System prompt for the analysis request.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You evaluate English conversation practice. \
Reply with a single JSON object and nothing else.";

/// Renders the user and assistant lines as `role: content` rows.
pub fn conversation_transcript(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .filter(|line| line.is_conversational())
        .map(|line| format!("{}: {}\n", line.role, line.content))
        .collect()
}

/// Builds the analysis request for a transcript.
pub fn analysis_prompt(transcript: &str) -> String {
    format!(
        r#"Analyze the student's messages (role: user) in this conversation with an AI tutor.

Conversation:
{transcript}
Return a JSON object with these fields:
- "cafp_scores": {{"complexity", "accuracy", "fluency", "pronunciation"}}, integers 0-100
- "fillers": {{"count", "words", "percentage"}}
- "grammar_corrections": [{{"original", "corrected", "explanation"}}], explanations in Korean
- "vocabulary": {{"total_words", "unique_words", "advanced_words", "suggested_words"}}
- "overall_feedback": two or three encouraging sentences in Korean
- "improvement_tips": three specific tips in Korean"#
    )
}

/// Returns the outermost `{...}` span of a model reply, if any.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Parses a model reply into an analysis.
pub fn parse_analysis_reply(reply: &str) -> Result<ConversationAnalysis, String> {
    let json = extract_json_object(reply).ok_or_else(|| "No JSON found in reply".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}
