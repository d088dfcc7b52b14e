//! Model collaborator seams.
//!
//! The interview pipeline never talks to a model provider directly. It sees three
//! narrow capabilities, each optional and each fallible:
//! - [`TextGenerator`]: prompt in, text out
//! - [`TopicClassifier`]: zero-shot labels for a text
//! - [`SentimentModel`]: POSITIVE/NEGATIVE label with a magnitude
//!
//! Handles are loaded once and shared through [`manager::ModelManager`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::LlmError;

pub mod handlers;
pub mod manager;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Name recorded on generated artifacts (e.g. `generated_by_model`).
    fn model_name(&self) -> &str;
}

/// Zero-shot classification result. `labels[i]` scored `scores[i]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl Classification {
    /// Labels scoring strictly above `threshold`, in classifier order.
    pub fn labels_above(&self, threshold: f64) -> Vec<&str> {
        self.labels
            .iter()
            .zip(self.scores.iter())
            .filter(|(_, &score)| score > threshold)
            .map(|(label, _)| label.as_str())
            .collect()
    }
}

#[async_trait]
pub trait TopicClassifier: Send + Sync {
    async fn classify(&self, text: &str, labels: &[&str]) -> Result<Classification, LlmError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentLabel {
    /// "POSITIVE" or "NEGATIVE".
    pub label: String,
    /// Magnitude in [0, 1].
    pub score: f64,
}

impl SentimentLabel {
    /// Signed score in [-1, 1]: NEGATIVE negates the magnitude.
    pub fn signed(&self) -> f64 {
        let magnitude = self.score.clamp(0.0, 1.0);
        if self.label.eq_ignore_ascii_case("NEGATIVE") {
            -magnitude
        } else {
            magnitude
        }
    }
}

#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn sentiment(&self, text: &str) -> Result<SentimentLabel, LlmError>;
}

/// Runs a collaborator call under a deadline. Errors and timeouts are logged and
/// collapse to `None`; callers treat both as "this path produced nothing".
pub async fn call_with_timeout<T, F>(what: &str, timeout: Duration, call: F) -> Option<T>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("{what} failed: {e}");
            None
        }
        Err(_) => {
            warn!("{what} timed out after {}ms", timeout.as_millis());
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub collaborators shared by unit tests across modules.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed completion and counts calls.
    pub struct StubGenerator {
        pub reply: Result<String, String>,
        pub calls: AtomicUsize,
    }

    impl StubGenerator {
        pub fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: Err("backend down".to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _: &str, _: u32, _: f32) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(|message| LlmError::Api {
                status: 503,
                message,
            })
        }

        fn model_name(&self) -> &str {
            "stub-model"
        }
    }

    /// Never completes; exercises the timeout path.
    pub struct HangingGenerator;

    #[async_trait]
    impl TextGenerator for HangingGenerator {
        async fn generate(&self, _: &str, _: u32, _: f32) -> Result<String, LlmError> {
            std::future::pending::<()>().await;
            unreachable!()
        }

        fn model_name(&self) -> &str {
            "hanging-model"
        }
    }

    pub struct StubClassifier(pub Classification);

    #[async_trait]
    impl TopicClassifier for StubClassifier {
        async fn classify(&self, _: &str, _: &[&str]) -> Result<Classification, LlmError> {
            Ok(self.0.clone())
        }
    }

    pub struct StubSentiment(pub Result<SentimentLabel, ()>);

    #[async_trait]
    impl SentimentModel for StubSentiment {
        async fn sentiment(&self, _: &str) -> Result<SentimentLabel, LlmError> {
            self.0.clone().map_err(|_| LlmError::EmptyContent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_above_threshold_keeps_order() {
        let c = Classification {
            labels: vec!["backend".into(), "testing".into(), "security".into()],
            scores: vec![0.9, 0.1, 0.31],
        };
        assert_eq!(c.labels_above(0.3), vec!["backend", "security"]);
    }

    #[test]
    fn test_negative_sentiment_is_negated() {
        let s = SentimentLabel {
            label: "NEGATIVE".into(),
            score: 0.8,
        };
        assert!((s.signed() + 0.8).abs() < 1e-9);
        let p = SentimentLabel {
            label: "POSITIVE".into(),
            score: 0.6,
        };
        assert!((p.signed() - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_call_with_timeout_collapses_errors() {
        let out: Option<u8> = call_with_timeout("stub", Duration::from_millis(50), async {
            Err(LlmError::EmptyContent)
        })
        .await;
        assert!(out.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_timeout_collapses_timeouts() {
        let gen = testing::HangingGenerator;
        let out = call_with_timeout(
            "hanging",
            Duration::from_secs(1),
            gen.generate("prompt", 10, 0.5),
        )
        .await;
        assert!(out.is_none());
    }
}
