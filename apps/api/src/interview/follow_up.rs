//! Follow-up decisioning.
//!
//! An ordered predicate chain over the scores and the response text; the first
//! matching rule picks the follow-up.

use serde::{Deserialize, Serialize};

use crate::interview::scoring::{word_count, ResponseScores};

const RELEVANCE_FOLLOW_UP_BELOW: f64 = 0.6;
const MIN_RESPONSE_WORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpType {
    Clarification,
    Deeper,
    Scenario,
    Challenge,
    Related,
}

impl FollowUpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpType::Clarification => "clarification",
            FollowUpType::Deeper => "deeper",
            FollowUpType::Scenario => "scenario",
            FollowUpType::Challenge => "challenge",
            FollowUpType::Related => "related",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub text: String,
    #[serde(rename = "type")]
    pub follow_up_type: FollowUpType,
}

pub fn needs_follow_up(relevance: f64, response: &str) -> bool {
    relevance < RELEVANCE_FOLLOW_UP_BELOW || word_count(response) < MIN_RESPONSE_WORDS
}

/// Picks the follow-up for a response. Rules, first match wins:
/// 1. relevance < 0.5 → ask for specifics on the question's last word
/// 2. technical accuracy < 0.5 → ask for a concrete example
/// 3. no "example" in the response → ask for a walkthrough
/// 4. "challenge" in the response → ask how it was overcome
/// 5. otherwise → ask what they'd do differently
pub fn select_follow_up(question: &str, response: &str, scores: &ResponseScores) -> FollowUp {
    let lower = response.to_lowercase();

    let (text, follow_up_type) = if scores.relevance < 0.5 {
        (
            format!(
                "Could you provide more specific details about {}?",
                last_word(question)
            ),
            FollowUpType::Clarification,
        )
    } else if scores.technical_accuracy < 0.5 {
        (
            "Can you give a concrete example from your experience?".to_string(),
            FollowUpType::Deeper,
        )
    } else if !lower.contains("example") {
        (
            "Could you walk me through a specific example where you applied this?".to_string(),
            FollowUpType::Scenario,
        )
    } else if lower.contains("challenge") {
        (
            "What specific strategies did you use to overcome those challenges?".to_string(),
            FollowUpType::Challenge,
        )
    } else {
        (
            "What would you do differently if you encountered a similar situation again?"
                .to_string(),
            FollowUpType::Related,
        )
    };

    FollowUp {
        text,
        follow_up_type,
    }
}

/// Last whitespace token with trailing punctuation removed; "that" if none.
fn last_word(question: &str) -> &str {
    question
        .split_whitespace()
        .last()
        .map(|w| w.trim_end_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|w| !w.is_empty())
        .unwrap_or("that")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(relevance: f64, technical_accuracy: f64) -> ResponseScores {
        ResponseScores {
            sentiment: 0.0,
            relevance,
            technical_accuracy,
        }
    }

    const TEN_WORDS: &str = "one two three four five six seven eight nine ten";

    #[test]
    fn test_needs_follow_up_boundaries() {
        assert!(!needs_follow_up(0.6, TEN_WORDS));
        assert!(needs_follow_up(0.59, TEN_WORDS));
        assert!(needs_follow_up(0.9, "one two three four five six seven eight nine"));
    }

    #[test]
    fn test_low_relevance_asks_about_last_word() {
        let f = select_follow_up("What is your experience with Python?", "Not much", &scores(0.4, 0.9));
        assert_eq!(f.text, "Could you provide more specific details about Python?");
        assert_eq!(f.follow_up_type, FollowUpType::Clarification);
    }

    #[test]
    fn test_empty_question_uses_placeholder() {
        let f = select_follow_up("", "Not much", &scores(0.0, 0.0));
        assert_eq!(f.text, "Could you provide more specific details about that?");
    }

    #[test]
    fn test_rule_order() {
        let deeper = select_follow_up("q", "an example", &scores(0.5, 0.4));
        assert_eq!(deeper.follow_up_type, FollowUpType::Deeper);

        let scenario = select_follow_up("q", "no walkthrough here", &scores(0.8, 0.8));
        assert_eq!(scenario.follow_up_type, FollowUpType::Scenario);

        let challenge =
            select_follow_up("q", "For example, the main Challenge was", &scores(0.8, 0.8));
        assert_eq!(challenge.follow_up_type, FollowUpType::Challenge);

        let related = select_follow_up("q", "For example, it went fine", &scores(0.8, 0.8));
        assert_eq!(related.follow_up_type, FollowUpType::Related);
        assert!(related.text.starts_with("What would you do differently"));
    }
}
