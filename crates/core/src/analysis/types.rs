use serde::{Deserialize, Serialize};

/// A line of the conversation as the client sends it for analysis.
///
/// Older clients send `speaker`/`en` instead of `role`/`content`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranscriptLine {
    #[serde(alias = "speaker", default = "default_role")]
    pub role: String,
    #[serde(alias = "en", default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl TranscriptLine {
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    pub fn is_conversational(&self) -> bool {
        self.role == "user" || self.role == "assistant"
    }
}

/// Complexity, accuracy, fluency and pronunciation scores, each 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CafpScores {
    #[serde(default)]
    pub complexity: u8,
    #[serde(default)]
    pub accuracy: u8,
    #[serde(default)]
    pub fluency: u8,
    #[serde(default)]
    pub pronunciation: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillerStats {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub words: Vec<String>,
    /// Share of spoken words that were fillers, one decimal place.
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarCorrection {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub corrected: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyStats {
    #[serde(default)]
    pub total_words: usize,
    #[serde(default)]
    pub unique_words: usize,
    #[serde(default)]
    pub advanced_words: Vec<String>,
    #[serde(default)]
    pub suggested_words: Vec<String>,
}

/// Feedback on the student's side of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    #[serde(default)]
    pub cafp_scores: CafpScores,
    #[serde(default)]
    pub fillers: FillerStats,
    #[serde(default)]
    pub grammar_corrections: Vec<GrammarCorrection>,
    #[serde(default)]
    pub vocabulary: VocabularyStats,
    #[serde(default)]
    pub overall_feedback: String,
    #[serde(default)]
    pub improvement_tips: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_line_accepts_legacy_field_names() {
        let line: TranscriptLine =
            serde_json::from_str(r#"{"speaker":"assistant","en":"Hello!"}"#).unwrap();
        assert_eq!(line.role, "assistant");
        assert_eq!(line.content, "Hello!");
    }

    #[test]
    fn test_transcript_line_defaults_to_user() {
        let line: TranscriptLine = serde_json::from_str(r#"{"content":"Hi"}"#).unwrap();
        assert!(line.is_user());
    }

    #[test]
    fn test_analysis_tolerates_partial_model_output() {
        let analysis: ConversationAnalysis =
            serde_json::from_str(r#"{"cafp_scores":{"fluency":88},"overall_feedback":"좋아요"}"#)
                .unwrap();
        assert_eq!(analysis.cafp_scores.fluency, 88);
        assert_eq!(analysis.cafp_scores.accuracy, 0);
        assert!(analysis.grammar_corrections.is_empty());
    }
}
