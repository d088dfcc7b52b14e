use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::chat::conversation::{ChatMessage, Conversation};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatContextRow {
    pub id: Uuid,
    pub url: Option<String>,
    pub chat_title: Option<String>,
    pub project_title: Option<String>,
    pub client_name: Option<String>,
    pub participants: Vec<String>,
    pub messages: Json<Vec<ChatMessage>>,
    pub total_messages: i32,
    pub extracted_topics: Vec<String>,
    pub is_active: bool,
    pub extracted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatContextRow {
    /// Rebuilds the canonical conversation this context was ingested from.
    pub fn conversation(&self) -> Conversation {
        Conversation {
            url: self.url.clone(),
            chat_title: self.chat_title.clone(),
            project_title: self.project_title.clone(),
            participants: self.participants.clone(),
            messages: self.messages.0.clone(),
        }
    }
}

/// Insert/update payload for a chat context, keyed by `url` when present.
#[derive(Debug, Clone)]
pub struct NewChatContext {
    pub url: Option<String>,
    pub chat_title: Option<String>,
    pub project_title: Option<String>,
    pub client_name: Option<String>,
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessage>,
    pub extracted_topics: Vec<String>,
}

impl NewChatContext {
    pub fn from_conversation(conversation: Conversation, extracted_topics: Vec<String>) -> Self {
        let client_name = conversation.client_name().map(str::to_string);
        Self {
            url: conversation.url,
            chat_title: conversation.chat_title,
            project_title: conversation.project_title,
            client_name,
            participants: conversation.participants,
            messages: conversation.messages,
            extracted_topics,
        }
    }
}

/// Result of an ingest upsert.
#[derive(Debug, Clone)]
pub enum ContextUpsert {
    Created(ChatContextRow),
    Updated(ChatContextRow),
    /// The URL belongs to a deactivated context; nothing was written.
    Frozen(ChatContextRow),
}

#[cfg(test)]
impl ContextUpsert {
    pub fn row(&self) -> &ChatContextRow {
        match self {
            ContextUpsert::Created(row) | ContextUpsert::Updated(row) | ContextUpsert::Frozen(row) => row,
        }
    }
}
