use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::conversation::Conversation;
use crate::errors::AppError;
use crate::triage::{
    classify_intent, conversation_insights, personalized_reply, ConversationInsights, Intent,
};

#[derive(Deserialize)]
pub struct TriageRequest {
    pub chat_data: Value,
    /// Sender name used for our own messages.
    #[serde(default = "default_me")]
    pub me: String,
    #[serde(default)]
    pub client_name: Option<String>,
}

fn default_me() -> String {
    "me".to_string()
}

#[derive(Serialize)]
pub struct TriageResponse {
    pub intent: Intent,
    pub suggested_replies: Vec<&'static str>,
    pub personalized_reply: String,
    pub insights: Option<ConversationInsights>,
}

/// POST /api/v1/messages/triage
pub async fn handle_triage(Json(req): Json<TriageRequest>) -> Result<Json<TriageResponse>, AppError> {
    let conversation = Conversation::normalize(&req.chat_data)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let intent = conversation
        .last_message()
        .map(|m| classify_intent(&m.content))
        .unwrap_or(Intent::General);

    let client_name = req
        .client_name
        .as_deref()
        .or_else(|| conversation.client_name());

    Ok(Json(TriageResponse {
        intent,
        suggested_replies: intent.templates().to_vec(),
        personalized_reply: personalized_reply(&conversation, client_name),
        insights: conversation_insights(&conversation, &req.me),
    }))
}
