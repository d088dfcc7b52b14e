//! Inbound message triage: intent, canned replies and conversation insights.

pub mod handlers;

use serde::Serialize;

use crate::chat::conversation::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProjectInquiry,
    PriceQuestion,
    TimelineQuestion,
    FollowUp,
    ProjectCompletion,
    General,
}

impl Intent {
    pub fn templates(&self) -> &'static [&'static str; 5] {
        match self {
            Intent::ProjectInquiry => &PROJECT_INQUIRY_REPLIES,
            Intent::PriceQuestion => &PRICE_REPLIES,
            Intent::TimelineQuestion => &TIMELINE_REPLIES,
            Intent::FollowUp => &FOLLOW_UP_REPLIES,
            Intent::ProjectCompletion => &COMPLETION_REPLIES,
            Intent::General => &GENERAL_REPLIES,
        }
    }
}

/// Checked in order; the first list with a substring hit wins.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::ProjectInquiry,
        &["project", "work", "job", "task", "hire", "need help", "looking for"],
    ),
    (
        Intent::PriceQuestion,
        &["price", "cost", "budget", "rate", "fee", "how much", "payment", "charge"],
    ),
    (
        Intent::TimelineQuestion,
        &["timeline", "deadline", "when", "time", "schedule", "delivery", "complete"],
    ),
    (
        Intent::FollowUp,
        &["follow up", "checking in", "any update", "still interested", "status"],
    ),
    (
        Intent::ProjectCompletion,
        &["done", "finished", "complete", "delivered", "ready", "final"],
    ),
];

const URGENT_WORDS: &[&str] = &["urgent", "asap", "immediately", "rush", "deadline"];
const CLIENT_POSITIVE_WORDS: &[&str] = &["great", "excellent", "perfect", "love", "amazing", "wonderful"];
const CLIENT_NEGATIVE_WORDS: &[&str] = &["disappointed", "problem", "issue", "wrong", "bad", "terrible"];

const PROJECT_INQUIRY_REPLIES: [&str; 5] = [
    "Thank you for your interest! I'd be happy to discuss your project. When would be a good time for a brief call?",
    "I've reviewed your project requirements and I'm confident I can help. Let me share some relevant examples from my portfolio.",
    "Your project sounds interesting! I have experience with similar work. Would you like to see some case studies?",
    "I'm excited about the opportunity to work on your project. Could we schedule a quick call to discuss the details?",
    "Thank you for reaching out! I have the perfect skillset for this project. Let me know when we can connect.",
];

const PRICE_REPLIES: [&str; 5] = [
    "I'd be happy to provide a detailed quote. Could you share more specifics about the scope?",
    "My rates are competitive and depend on the project complexity. Let's discuss your specific needs.",
    "I can work within your budget. Let me break down the pricing based on your requirements.",
    "I offer flexible pricing based on project scope. Would you like to discuss your budget range?",
    "I'd like to understand your requirements better to provide accurate pricing. Can we schedule a call?",
];

const TIMELINE_REPLIES: [&str; 5] = [
    "I can typically deliver this type of project within a few days. Would that timeline work for you?",
    "I'm available to start immediately and can commit to your deadline.",
    "Let me review the scope and provide you with a realistic timeline that ensures quality delivery.",
    "I have availability to start right away. What's your preferred timeline for completion?",
    "I can accommodate urgent timelines. Let's discuss what you need and when.",
];

const FOLLOW_UP_REPLIES: [&str; 5] = [
    "I wanted to follow up on our previous conversation. Are you still looking for help with this project?",
    "Hi! Just checking in to see if you have any questions about my proposal.",
    "I hope you're doing well. I'm still very interested in working on your project. Any updates?",
    "Following up on our discussion. I'm available whenever you're ready to move forward.",
    "Hi there! Just wanted to touch base about the project we discussed. Let me know your thoughts!",
];

const COMPLETION_REPLIES: [&str; 5] = [
    "Great! I've completed the work as discussed. Please review and let me know if you need any adjustments.",
    "The project is finished and ready for your review. I'm happy to make any necessary revisions.",
    "I've delivered the completed work. Please take a look and let me know if everything meets your expectations.",
    "Project completed! I've attached the final deliverables. Looking forward to your feedback.",
    "All done! The work is complete and ready for your review. Thank you for the opportunity!",
];

const GENERAL_REPLIES: [&str; 5] = [
    "Thank you for reaching out! I'm looking forward to working with you.",
    "I appreciate your message. Let me get back to you with a detailed response.",
    "Great question! Let me provide you with all the details you need.",
    "Thank you for your interest in my services. I'm excited to discuss this opportunity.",
    "I'm happy to help! Let me know if you need any additional information.",
];

const EMPTY_CONVERSATION_REPLY: &str =
    "Thank you for your message! I'm looking forward to discussing your project.";

pub fn classify_intent(content: &str) -> Intent {
    let lower = content.to_lowercase();
    INTENT_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::General)
}

/// First template for the latest message's intent, addressed to the client
/// when known. Project inquiries get a sentence about the project type.
pub fn personalized_reply(conversation: &Conversation, client_name: Option<&str>) -> String {
    let Some(latest) = conversation.last_message() else {
        return EMPTY_CONVERSATION_REPLY.to_string();
    };

    let intent = classify_intent(&latest.content);
    let mut reply = String::new();

    if let Some(name) = client_name
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "Unknown")
    {
        reply.push_str(&format!("Hi {name}! "));
    }
    reply.push_str(intent.templates()[0]);

    if intent == Intent::ProjectInquiry {
        let lower = latest.content.to_lowercase();
        if lower.contains("website") {
            reply.push_str(" I specialize in web development and have built similar websites.");
        } else if lower.contains("mobile") || lower.contains("app") {
            reply.push_str(" I have extensive experience in mobile app development.");
        } else if lower.contains("data") || lower.contains("analysis") {
            reply.push_str(" I specialize in data analysis and visualization projects.");
        }
    }

    reply
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Urgency {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientSentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationInsights {
    pub message_count: usize,
    /// Own messages per client message, as a percentage with one decimal.
    pub response_rate: f64,
    pub urgency_level: Urgency,
    pub client_sentiment: ClientSentiment,
    pub recommended_action: &'static str,
}

/// Reads the latest message for urgency and tone. `me` names the sender
/// whose messages count as our own. `None` for an empty conversation.
pub fn conversation_insights(conversation: &Conversation, me: &str) -> Option<ConversationInsights> {
    let latest = conversation.last_message()?;

    let own = conversation
        .messages
        .iter()
        .filter(|m| m.sender.eq_ignore_ascii_case(me))
        .count();
    let client = conversation.messages.len() - own;
    let response_rate = if client == 0 {
        0.0
    } else {
        (own as f64 / client as f64 * 1000.0).round() / 10.0
    };

    let lower = latest.content.to_lowercase();
    let mut urgency_level = Urgency::Normal;
    let mut recommended_action = "Continue conversation";

    if URGENT_WORDS.iter().any(|w| lower.contains(w)) {
        urgency_level = Urgency::High;
        recommended_action = "Respond quickly - client needs urgent help";
    }

    let positive = CLIENT_POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = CLIENT_NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let client_sentiment = match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => ClientSentiment::Positive,
        std::cmp::Ordering::Less => {
            recommended_action = "Address concerns - client seems unhappy";
            ClientSentiment::Negative
        }
        std::cmp::Ordering::Equal => ClientSentiment::Neutral,
    };

    Some(ConversationInsights {
        message_count: conversation.messages.len(),
        response_rate,
        urgency_level,
        client_sentiment,
        recommended_action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::conversation::ChatMessage;

    fn conv(messages: &[(&str, &str)]) -> Conversation {
        Conversation::from_messages(
            messages
                .iter()
                .map(|(sender, content)| ChatMessage::new(*sender, *content))
                .collect(),
        )
    }

    #[test]
    fn test_intent_priority() {
        // "project" outranks "budget"
        assert_eq!(classify_intent("What budget for this project?"), Intent::ProjectInquiry);
        assert_eq!(classify_intent("How much do you charge?"), Intent::PriceQuestion);
        assert_eq!(classify_intent("What's the deadline?"), Intent::TimelineQuestion);
        assert_eq!(classify_intent("Any update on this?"), Intent::FollowUp);
        assert_eq!(classify_intent("It's finished"), Intent::ProjectCompletion);
        assert_eq!(classify_intent("Hello!"), Intent::General);
    }

    #[test]
    fn test_every_intent_has_five_templates() {
        for intent in [
            Intent::ProjectInquiry,
            Intent::PriceQuestion,
            Intent::TimelineQuestion,
            Intent::FollowUp,
            Intent::ProjectCompletion,
            Intent::General,
        ] {
            assert_eq!(intent.templates().len(), 5);
        }
    }

    #[test]
    fn test_personalized_reply_uses_latest_message() {
        let c = conv(&[("Dana", "How much?"), ("Dana", "I need help building a website")]);
        let reply = personalized_reply(&c, Some("Dana"));
        assert!(reply.starts_with("Hi Dana! Thank you for your interest!"));
        assert!(reply.ends_with("built similar websites."));
    }

    #[test]
    fn test_personalized_reply_without_client() {
        let c = conv(&[("Dana", "How much do you charge?")]);
        assert_eq!(personalized_reply(&c, Some("Unknown")), PRICE_REPLIES[0]);
        assert_eq!(personalized_reply(&Conversation::default(), None), EMPTY_CONVERSATION_REPLY);
    }

    #[test]
    fn test_insights_negative_overrides_urgent_action() {
        let c = conv(&[
            ("me", "Hi"),
            ("Dana", "hello"),
            ("Dana", "Urgent: there is a problem with the build"),
        ]);
        let insights = conversation_insights(&c, "me").unwrap();
        assert_eq!(insights.message_count, 3);
        assert_eq!(insights.response_rate, 50.0);
        assert_eq!(insights.urgency_level, Urgency::High);
        assert_eq!(insights.client_sentiment, ClientSentiment::Negative);
        assert_eq!(insights.recommended_action, "Address concerns - client seems unhappy");
    }

    #[test]
    fn test_insights_positive_and_empty() {
        let c = conv(&[("Dana", "This looks great, love it")]);
        let insights = conversation_insights(&c, "me").unwrap();
        assert_eq!(insights.client_sentiment, ClientSentiment::Positive);
        assert_eq!(insights.urgency_level, Urgency::Normal);
        assert_eq!(insights.response_rate, 0.0);
        assert!(conversation_insights(&Conversation::default(), "me").is_none());
    }
}
