//! Heuristic analysis used when the language model is unavailable.

use std::collections::HashSet;

use super::types::{CafpScores, ConversationAnalysis, FillerStats, TranscriptLine, VocabularyStats};

/// Filler expressions counted in the student's speech, in report order.
pub const FILLER_WORDS: [&str; 12] = [
    "um",
    "uh",
    "like",
    "you know",
    "basically",
    "actually",
    "literally",
    "i mean",
    "so",
    "well",
    "kind of",
    "sort of",
];

/// Placeholder scores reported when no model judged the conversation.
pub const FALLBACK_SCORES: CafpScores = CafpScores {
    complexity: 70,
    accuracy: 75,
    fluency: 72,
    pronunciation: 78,
};

const FALLBACK_FEEDBACK: &str = "대화를 잘 하셨습니다! 계속 연습하시면 더 좋아질 거예요.";

const FALLBACK_TIPS: [&str; 3] = [
    "더 다양한 어휘를 사용해보세요",
    "문장을 조금 더 길게 만들어보세요",
    "필러 단어 사용을 줄여보세요",
];

/// Lowercased student speech, one space between messages.
pub fn user_text(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .filter(|line| line.is_user())
        .map(|line| line.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Every filler occurrence in `text`, grouped by filler in list order.
///
/// Matching is literal on whole words: `so` counts in "so, well" but not
/// in "also".
pub fn find_fillers(text: &str) -> Vec<String> {
    FILLER_WORDS
        .iter()
        .flat_map(|filler| {
            let count = count_whole_word(text, filler);
            std::iter::repeat_n(filler.to_string(), count)
        })
        .collect()
}

/// Builds the degraded analysis from word counts alone.
pub fn fallback_analysis(lines: &[TranscriptLine]) -> ConversationAnalysis {
    let text = user_text(lines);
    let fillers = find_fillers(&text);

    let words: Vec<&str> = text.split_whitespace().collect();
    let total_words = words.len();
    let unique_words = words.iter().collect::<HashSet<_>>().len();
    let percentage = round_one_decimal(fillers.len() as f64 / total_words.max(1) as f64 * 100.0);

    ConversationAnalysis {
        cafp_scores: FALLBACK_SCORES,
        fillers: FillerStats {
            count: fillers.len(),
            words: fillers,
            percentage,
        },
        grammar_corrections: Vec::new(),
        vocabulary: VocabularyStats {
            total_words,
            unique_words,
            advanced_words: Vec::new(),
            suggested_words: Vec::new(),
        },
        overall_feedback: FALLBACK_FEEDBACK.to_string(),
        improvement_tips: FALLBACK_TIPS.iter().map(|tip| tip.to_string()).collect(),
    }
}

fn count_whole_word(text: &str, needle: &str) -> usize {
    text.match_indices(needle)
        .filter(|(start, _)| {
            let end = start + needle.len();
            let before = text[..*start].chars().next_back();
            let after = text[end..].chars().next();
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        })
        .count()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(role: &str, content: &str) -> TranscriptLine {
        TranscriptLine {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_user_text_ignores_assistant_lines() {
        let lines = vec![
            line("assistant", "Um, hello there"),
            line("user", "Hi Emma"),
            line("user", "I AM Fine"),
        ];
        assert_eq!(user_text(&lines), "hi emma i am fine");
    }

    #[test]
    fn test_find_fillers_matches_whole_words_only() {
        assert_eq!(find_fillers("i also went"), Vec::<String>::new());
        assert_eq!(find_fillers("umbrella likes"), Vec::<String>::new());
        assert_eq!(find_fillers("so, well"), vec!["so", "well"]);
    }

    #[test]
    fn test_find_fillers_counts_repeats_in_list_order() {
        let fillers = find_fillers("like, you know, i mean like um");
        assert_eq!(fillers, vec!["um", "like", "like", "you know", "i mean"]);
    }

    #[test]
    fn test_fallback_analysis_counts() {
        let lines = vec![
            line("assistant", "What did you eat?"),
            line("user", "Um, I like, you know, like pizza."),
            line("user", "So well..."),
        ];

        let analysis = fallback_analysis(&lines);

        assert_eq!(analysis.cafp_scores, FALLBACK_SCORES);
        assert_eq!(analysis.fillers.count, 6);
        assert_eq!(analysis.vocabulary.total_words, 9);
        assert_eq!(analysis.vocabulary.unique_words, 9);
        assert_eq!(analysis.fillers.percentage, 66.7);
        assert_eq!(analysis.improvement_tips.len(), 3);
        assert!(analysis.grammar_corrections.is_empty());
    }

    #[test]
    fn test_fallback_analysis_without_user_speech() {
        let analysis = fallback_analysis(&[line("assistant", "Hello?")]);
        assert_eq!(analysis.fillers.count, 0);
        assert_eq!(analysis.fillers.percentage, 0.0);
        assert_eq!(analysis.vocabulary.total_words, 0);
    }
}
