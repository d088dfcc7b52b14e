//! Chat normalization. The one place where scraper payload shapes are handled.
//!
//! The scraper (and the smart-reply caller) may send either a bare array of
//! messages or an object wrapping one. Both collapse into a [`Conversation`]
//! here; nothing downstream looks at payload shape again.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// One chat message in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp: None,
        }
    }
}

/// Canonical conversation. Messages are chronological, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub url: Option<String>,
    pub chat_title: Option<String>,
    pub project_title: Option<String>,
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Error)]
pub enum InputShapeError {
    #[error("expected a list of messages or an object with a `messages` list, got {0}")]
    UnrecognizedShape(&'static str),

    #[error("malformed chat payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Wire shapes accepted at the boundary
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default, alias = "author", alias = "role")]
    sender: Option<String>,
    #[serde(default, alias = "text")]
    content: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "chatTitle")]
    chat_title: Option<String>,
    #[serde(default, alias = "projectTitle")]
    project_title: Option<String>,
    #[serde(default)]
    participants: Vec<String>,
    messages: Vec<RawMessage>,
}

impl From<RawMessage> for ChatMessage {
    fn from(raw: RawMessage) -> Self {
        let timestamp = match raw.timestamp {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        ChatMessage {
            sender: raw
                .sender
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            content: raw.content.unwrap_or_default(),
            timestamp,
        }
    }
}

impl Conversation {
    /// Normalizes a raw payload. Accepts `[{...}, ...]` or `{"messages": [...], ...}`.
    pub fn normalize(payload: &Value) -> Result<Self, InputShapeError> {
        match payload {
            Value::Array(_) => {
                let raw: Vec<RawMessage> = serde_json::from_value(payload.clone())?;
                Ok(Conversation {
                    messages: raw.into_iter().map(ChatMessage::from).collect(),
                    ..Default::default()
                })
            }
            Value::Object(map) if map.contains_key("messages") => {
                let raw: RawChat = serde_json::from_value(payload.clone())?;
                Ok(Conversation {
                    url: raw.url.filter(|u| !u.trim().is_empty()),
                    chat_title: raw.chat_title.filter(|t| !t.trim().is_empty()),
                    project_title: raw.project_title.filter(|t| !t.trim().is_empty()),
                    participants: raw.participants,
                    messages: raw.messages.into_iter().map(ChatMessage::from).collect(),
                })
            }
            Value::Object(_) => Err(InputShapeError::UnrecognizedShape("object without messages")),
            Value::Null => Err(InputShapeError::UnrecognizedShape("null")),
            Value::Bool(_) => Err(InputShapeError::UnrecognizedShape("boolean")),
            Value::Number(_) => Err(InputShapeError::UnrecognizedShape("number")),
            Value::String(_) => Err(InputShapeError::UnrecognizedShape("string")),
        }
    }

    /// Like [`Conversation::normalize`], but an unrecognized shape yields an
    /// empty conversation instead of an error.
    pub fn from_value_lossy(payload: &Value) -> Self {
        Self::normalize(payload).unwrap_or_else(|e| {
            warn!("Ignoring chat payload: {e}");
            Conversation::default()
        })
    }

    #[cfg(test)]
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Conversation {
            messages,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// First participant is treated as the client.
    pub fn client_name(&self) -> Option<&str> {
        self.participants
            .first()
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_list_normalizes() {
        let payload = json!([
            {"sender": "client", "content": "Hello there"},
            {"author": "me", "content": "Hi!", "timestamp": 1700000000}
        ]);
        let conv = Conversation::normalize(&payload).unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[1].sender, "me");
        assert_eq!(conv.messages[1].timestamp.as_deref(), Some("1700000000"));
        assert!(conv.project_title.is_none());
    }

    #[test]
    fn test_wrapped_object_normalizes_with_metadata() {
        let payload = json!({
            "url": "https://example.com/chat/1",
            "chatTitle": "Backend rebuild",
            "projectTitle": "Django API",
            "participants": ["Alice", "Me"],
            "messages": [{"author": "Alice", "text": "Can you start Monday?"}]
        });
        let conv = Conversation::normalize(&payload).unwrap();
        assert_eq!(conv.url.as_deref(), Some("https://example.com/chat/1"));
        assert_eq!(conv.project_title.as_deref(), Some("Django API"));
        assert_eq!(conv.client_name(), Some("Alice"));
        assert_eq!(conv.messages[0].content, "Can you start Monday?");
    }

    #[test]
    fn test_role_alias_and_missing_sender() {
        let payload = json!([{"role": "user", "content": "a"}, {"content": "b"}]);
        let conv = Conversation::normalize(&payload).unwrap();
        assert_eq!(conv.messages[0].sender, "user");
        assert_eq!(conv.messages[1].sender, "Unknown");
    }

    #[test]
    fn test_unrecognized_shapes_are_errors() {
        assert!(Conversation::normalize(&json!("just text")).is_err());
        assert!(Conversation::normalize(&json!({"foo": 1})).is_err());
        assert!(Conversation::normalize(&json!(null)).is_err());
        assert!(Conversation::normalize(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_lossy_returns_empty_on_bad_shape() {
        let conv = Conversation::from_value_lossy(&json!(42));
        assert!(conv.is_empty());
    }

    #[test]
    fn test_blank_url_is_dropped() {
        let conv = Conversation::normalize(&json!({"url": "  ", "messages": []})).unwrap();
        assert!(conv.url.is_none());
        assert!(conv.is_empty());
    }
}
