//! Relevance & sentiment scoring for candidate responses.
//!
//! Every scorer here is pure except sentiment, which consults the optional
//! sentiment model first and falls back to a keyword lexicon.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai::{call_with_timeout, SentimentModel};
use crate::interview::follow_up;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were",
];

const POSITIVE_WORDS: &[&str] = &[
    "good",
    "great",
    "excellent",
    "successful",
    "effective",
    "efficient",
    "love",
    "enjoy",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "difficult",
    "challenging",
    "problem",
    "issue",
    "struggle",
    "hate",
    "dislike",
];

pub const TECHNICAL_TERMS: &[&str] = &[
    "api",
    "database",
    "sql",
    "python",
    "javascript",
    "react",
    "django",
    "frontend",
    "backend",
    "server",
    "client",
    "framework",
    "library",
    "algorithm",
    "data structure",
    "testing",
    "debugging",
    "optimization",
    "scalability",
    "performance",
    "security",
    "authentication",
    "deployment",
];

/// Relevance when the question has no content words.
const NEUTRAL_RELEVANCE: f64 = 0.5;
/// The sentiment model only sees this many characters.
const SENTIMENT_MAX_CHARS: usize = 512;

// ────────────────────────────────────────────────────────────────────────────
// Output models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseScores {
    pub sentiment: f64,          // -1.0 – 1.0
    pub relevance: f64,          // 0.0 – 1.0
    pub technical_accuracy: f64, // 0.0 – 1.0
}

impl ResponseScores {
    pub fn mean(&self) -> f64 {
        (self.sentiment + self.relevance + self.technical_accuracy) / 3.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_examples: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_terms: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    pub scores: ResponseScores,
    pub needs_follow_up: bool,
    pub details: AnalysisDetails,
}

impl ResponseAnalysis {
    /// Blank responses score zero and always need a follow-up.
    pub fn empty() -> Self {
        Self {
            scores: ResponseScores::default(),
            needs_follow_up: true,
            details: AnalysisDetails {
                error: Some("No response provided".to_string()),
                ..Default::default()
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analyzer
// ────────────────────────────────────────────────────────────────────────────

pub struct ResponseAnalyzer<'a> {
    sentiment: Option<&'a dyn SentimentModel>,
    timeout: Duration,
}

impl<'a> ResponseAnalyzer<'a> {
    pub fn new(sentiment: Option<&'a dyn SentimentModel>, timeout: Duration) -> Self {
        Self { sentiment, timeout }
    }

    /// Lexicon-only analyzer.
    #[cfg(test)]
    pub fn lexicon() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub async fn analyze(&self, question: &str, response: &str) -> ResponseAnalysis {
        if response.trim().is_empty() {
            return ResponseAnalysis::empty();
        }

        let scores = ResponseScores {
            sentiment: self.sentiment(response).await,
            relevance: relevance(question, response),
            technical_accuracy: technical_accuracy(response),
        };
        let lower = response.to_lowercase();

        ResponseAnalysis {
            scores,
            needs_follow_up: follow_up::needs_follow_up(scores.relevance, response),
            details: AnalysisDetails {
                response_length: Some(word_count(response)),
                contains_examples: Some(lower.contains("example") || lower.contains("project")),
                technical_terms: Some(count_technical_terms(response)),
                assessment: Some(assessment(&scores).to_string()),
                error: None,
            },
        }
    }

    async fn sentiment(&self, response: &str) -> f64 {
        if let Some(model) = self.sentiment {
            let snippet: String = response.chars().take(SENTIMENT_MAX_CHARS).collect();
            if let Some(label) =
                call_with_timeout("Sentiment model", self.timeout, model.sentiment(&snippet)).await
            {
                return label.signed();
            }
        }
        lexicon_sentiment(response)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pure scorers
// ────────────────────────────────────────────────────────────────────────────

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lowercased word set: edges stripped of ASCII punctuation, stop words removed.
fn content_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| c.is_ascii_punctuation())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Share of the question's content words that reappear in the response.
pub fn relevance(question: &str, response: &str) -> f64 {
    let question_words = content_words(question);
    if question_words.is_empty() {
        return NEUTRAL_RELEVANCE;
    }
    let response_words = content_words(response);
    let overlap = question_words.intersection(&response_words).count();
    (overlap as f64 / question_words.len() as f64).min(1.0)
}

/// Hits per tenth of the word count, so short answers aren't over-penalized.
fn density(hits: f64, words: usize) -> f64 {
    hits / (words as f64 * 0.1).max(1.0)
}

pub fn lexicon_sentiment(text: &str) -> f64 {
    let words = word_count(text);
    if words == 0 {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    density(positive - negative, words).clamp(-1.0, 1.0)
}

pub fn count_technical_terms(text: &str) -> usize {
    let lower = text.to_lowercase();
    TECHNICAL_TERMS
        .iter()
        .filter(|t| lower.contains(*t))
        .count()
}

pub fn technical_accuracy(text: &str) -> f64 {
    let words = word_count(text);
    if words == 0 {
        return 0.0;
    }
    density(count_technical_terms(text) as f64, words).clamp(0.0, 1.0)
}

pub fn assessment(scores: &ResponseScores) -> &'static str {
    let mean = scores.mean();
    if mean >= 0.7 {
        "Strong response with good technical insight and relevance."
    } else if mean >= 0.5 {
        "Adequate response, but could benefit from more detail or examples."
    } else {
        "Response needs improvement in relevance and technical depth."
    }
}
