//! Topic extraction from chat conversations.
//!
//! Keyword scan over a fixed vocabulary, optionally enriched by a zero-shot
//! classifier. Output order is first-seen: vocabulary order, then classifier order.

use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;

use crate::ai::{call_with_timeout, TopicClassifier};
use crate::chat::conversation::Conversation;

/// How many trailing messages feed extraction.
const RECENT_MESSAGE_WINDOW: usize = 10;
/// Messages at or under this many characters are skipped as trivial.
const MIN_MESSAGE_CHARS: usize = 10;
const MAX_TOPICS: usize = 10;
/// Classifier input is truncated to this many characters.
const CLASSIFIER_MAX_CHARS: usize = 512;
const CLASSIFIER_THRESHOLD: f64 = 0.3;

/// Language, framework and process names recognized in chat text.
pub const TOPIC_VOCABULARY: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "react",
    "django",
    "rust",
    "api",
    "database",
    "sql",
    "frontend",
    "backend",
    "fullstack",
    "mobile",
    "web development",
    "machine learning",
    "ai",
    "data",
    "analytics",
    "cloud",
    "aws",
    "project management",
    "agile",
    "scrum",
    "testing",
    "deployment",
];

/// Label set offered to the zero-shot classifier.
pub const CLASSIFIER_LABELS: &[&str] = &[
    "software development",
    "web development",
    "mobile development",
    "data science",
    "machine learning",
    "project management",
    "frontend",
    "backend",
    "database",
    "api development",
    "testing",
    "deployment",
    "cloud computing",
    "security",
];

pub struct TopicExtractor<'a> {
    classifier: Option<&'a dyn TopicClassifier>,
    timeout: Duration,
}

impl<'a> TopicExtractor<'a> {
    pub fn new(classifier: Option<&'a dyn TopicClassifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    /// Keyword-only extractor.
    #[cfg(test)]
    pub fn keywords_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub async fn extract(&self, conversation: &Conversation) -> Vec<String> {
        let text = recent_text(conversation);
        if text.is_empty() {
            return Vec::new();
        }

        let mut topics = keyword_topics(&text);

        if let Some(classifier) = self.classifier {
            let snippet: String = text.chars().take(CLASSIFIER_MAX_CHARS).collect();
            if let Some(result) = call_with_timeout(
                "Topic classification",
                self.timeout,
                classifier.classify(&snippet, CLASSIFIER_LABELS),
            )
            .await
            {
                topics.extend(
                    result
                        .labels_above(CLASSIFIER_THRESHOLD)
                        .into_iter()
                        .map(title_case),
                );
            }
        }

        let topics = dedup_first_seen(topics, MAX_TOPICS);
        debug!("Extracted {} topics: {:?}", topics.len(), topics);
        topics
    }
}

/// Joins the non-trivial contents of the last few messages.
fn recent_text(conversation: &Conversation) -> String {
    let start = conversation
        .messages
        .len()
        .saturating_sub(RECENT_MESSAGE_WINDOW);
    conversation.messages[start..]
        .iter()
        .map(|m| m.content.trim())
        .filter(|c| c.chars().count() > MIN_MESSAGE_CHARS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Vocabulary terms occurring anywhere in `text` (case-insensitive), Title Cased.
pub fn keyword_topics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOPIC_VOCABULARY
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| title_case(kw))
        .collect()
}

/// "web development" → "Web Development", "api" → "Api".
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn dedup_first_seen(topics: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    topics
        .into_iter()
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::StubClassifier;
    use crate::ai::Classification;
    use crate::chat::conversation::ChatMessage;

    fn conv(contents: &[&str]) -> Conversation {
        Conversation::from_messages(
            contents
                .iter()
                .map(|c| ChatMessage::new("client", *c))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_python_django_api_detected() {
        let c = conv(&["I used Python and Django for the API"]);
        let topics = TopicExtractor::keywords_only().extract(&c).await;
        for expected in ["Python", "Django", "Api"] {
            assert!(topics.contains(&expected.to_string()), "missing {expected}: {topics:?}");
        }
    }

    #[tokio::test]
    async fn test_empty_conversation_yields_no_topics() {
        let topics = TopicExtractor::keywords_only()
            .extract(&Conversation::default())
            .await;
        assert!(topics.is_empty());
    }

    #[tokio::test]
    async fn test_short_messages_are_ignored() {
        let c = conv(&["python", "ok react!", "sql sql"]);
        let topics = TopicExtractor::keywords_only().extract(&c).await;
        assert!(topics.is_empty(), "got {topics:?}");
    }

    #[tokio::test]
    async fn test_only_last_ten_messages_count() {
        let mut contents = vec!["We migrated everything to Django last year"];
        contents.extend(std::iter::repeat("Nothing technical in this one").take(10));
        let topics = TopicExtractor::keywords_only().extract(&conv(&contents)).await;
        assert!(!topics.contains(&"Django".to_string()));
    }

    #[tokio::test]
    async fn test_order_is_vocabulary_order_and_capped() {
        let c = conv(&[
            "deployment testing scrum agile aws cloud analytics data ai mobile sql python react",
        ]);
        let topics = TopicExtractor::keywords_only().extract(&c).await;
        assert_eq!(topics.len(), MAX_TOPICS);
        assert_eq!(topics[0], "Python");
        assert_eq!(topics[1], "React");
    }

    #[tokio::test]
    async fn test_classifier_labels_appended_and_deduped() {
        let classifier = StubClassifier(Classification {
            labels: vec!["backend".into(), "security".into(), "data science".into()],
            scores: vec![0.7, 0.4, 0.1],
        });
        let extractor = TopicExtractor::new(Some(&classifier), Duration::from_secs(1));
        let c = conv(&["Our backend is written in Rust and deployed weekly"]);
        let topics = extractor.extract(&c).await;
        assert_eq!(topics, vec!["Rust", "Backend", "Security"]);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("web development"), "Web Development");
        assert_eq!(title_case("api"), "Api");
        assert_eq!(title_case("AWS"), "Aws");
    }
}
