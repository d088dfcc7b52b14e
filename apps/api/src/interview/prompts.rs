// Prompt templates for the interview pipeline.
// Placeholders are filled in a single pass with `fill` before the generator call.

pub use crate::llm_client::prompts::fill;

/// Smart-reply follow-up. Replace `{last_message}`, `{topics}`, `{phase}`.
pub const FOLLOWUP_REPLY_PROMPT: &str = r#"Based on this conversation context, suggest a natural follow-up response:

Last message: "{last_message}"
Topics discussed: {topics}
Conversation phase: {phase}

Generate a professional, relevant response (2-3 sentences):"#;

/// Technical question. Replace `{topic}`.
pub const TECHNICAL_QUESTION_PROMPT: &str = "Write one technical interview question about {topic}. \
    It should ask about hands-on experience, e.g. \"What is your experience with {topic}?\". \
    Return only the question.";

/// Behavioral question. Replace `{topic}`.
pub const BEHAVIORAL_QUESTION_PROMPT: &str = "Write one behavioral interview question about {topic} \
    that starts with \"Tell me about a time when you\". Return only the question.";

/// Project question. Replace `{topic}`.
pub const PROJECT_QUESTION_PROMPT: &str = "Write one project interview question about {topic} \
    that starts with \"How would you approach\". Return only the question.";

/// Any other question type. Replace `{topic}` and `{question_type}`.
pub const GENERAL_QUESTION_PROMPT: &str = "Write one {question_type} interview question about {topic} \
    that starts with \"Can you explain\". Return only the question.";
