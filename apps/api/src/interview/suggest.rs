//! Answer suggestion: drafts an answer to an interview question from what the
//! candidate already said in the chat.

use serde::Serialize;

use crate::chat::conversation::{ChatMessage, Conversation};

const MAX_RELEVANT: usize = 10;
const ANSWER_CONTEXT: usize = 5;
const MAX_KEY_POINTS: usize = 3;
const MAX_EVIDENCE: usize = 3;
/// Messages longer than this are relevant even without a keyword hit.
const SUBSTANTIAL_CHARS: usize = 50;
/// Assumed ceiling of keyword hits per message when normalizing.
const MAX_HITS_PER_MESSAGE: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub message: String,
    pub author: String,
    pub relevance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerSuggestion {
    pub suggested_answer: String,
    pub confidence: f64,
    pub key_points: Vec<String>,
    pub evidence_from_chat: Vec<Evidence>,
    pub source_messages: usize,
}

struct RelevantMessage<'a> {
    message: &'a ChatMessage,
    hits: usize,
}

pub fn suggest_answer(question: &str, conversation: &Conversation) -> AnswerSuggestion {
    if conversation.is_empty() {
        return AnswerSuggestion {
            suggested_answer: "No chat context available to generate answer.".to_string(),
            confidence: 0.0,
            key_points: Vec::new(),
            evidence_from_chat: Vec::new(),
            source_messages: 0,
        };
    }

    let relevant = relevant_messages(question, &conversation.messages);
    AnswerSuggestion {
        suggested_answer: draft_answer(question, &relevant),
        confidence: confidence(&relevant),
        key_points: key_points(&relevant),
        evidence_from_chat: evidence(&relevant),
        source_messages: relevant.len(),
    }
}

/// Keywords worth looking for in the chat, by what the question asks about.
/// Buckets may overlap; a repeated keyword counts twice.
fn question_keywords(question: &str) -> Vec<&'static str> {
    let q = question.to_lowercase();
    let mut keywords = Vec::new();
    if q.contains("experience") {
        keywords.extend(["work", "project", "experience", "used", "worked"]);
    }
    if q.contains("challenge") {
        keywords.extend(["problem", "difficult", "challenge", "issue"]);
    }
    if q.contains("skill") || q.contains("technology") {
        keywords.extend(["python", "javascript", "programming", "code", "develop"]);
    }
    if q.contains("team") {
        keywords.extend(["team", "collaborate", "work together", "communication"]);
    }
    if q.contains("project") {
        keywords.extend(["project", "build", "create", "develop", "implement"]);
    }
    keywords
}

fn relevant_messages<'a>(question: &str, messages: &'a [ChatMessage]) -> Vec<RelevantMessage<'a>> {
    let keywords = question_keywords(question);
    let mut relevant: Vec<_> = messages
        .iter()
        .filter_map(|message| {
            let content = message.content.to_lowercase();
            let hits = keywords.iter().filter(|k| content.contains(*k)).count();
            (hits > 0 || content.chars().count() > SUBSTANTIAL_CHARS)
                .then_some(RelevantMessage { message, hits })
        })
        .collect();
    relevant.sort_by(|a, b| b.hits.cmp(&a.hits));
    relevant.truncate(MAX_RELEVANT);
    relevant
}

fn draft_answer(question: &str, relevant: &[RelevantMessage]) -> String {
    if relevant.is_empty() {
        return "Based on our conversation, I don't have specific details to address this question directly."
            .to_string();
    }

    let context = relevant
        .iter()
        .take(ANSWER_CONTEXT)
        .map(|r| r.message.content.trim())
        .filter(|c| c.chars().count() > 10)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();
    if context.is_empty() {
        return "Based on our conversation, I would need to provide more specific details about my experience."
            .to_string();
    }

    let q = question.to_lowercase();
    let opening = if q.contains("experience") {
        "Based on our previous conversation,"
    } else if q.contains("challenge") {
        "From what we discussed,"
    } else {
        "As mentioned in our chat,"
    };

    let mut parts = vec![opening];
    if context.contains("python") || context.contains("programming") {
        parts.push("I have experience with Python programming and development.");
    }
    if context.contains("project") {
        parts.push("I've worked on various projects that demonstrate my capabilities.");
    }
    if context.contains("team") || context.contains("collaborate") {
        parts.push("I'm comfortable working in team environments and collaborating with others.");
    }
    if parts.len() == 1 {
        parts.push("I'm ready to contribute my skills and experience to achieve the project goals.");
    }
    parts.join(" ")
}

fn truncate_chars(s: &str, max: usize, keep: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(keep).collect::<String>())
    } else {
        s.to_string()
    }
}

fn key_points(relevant: &[RelevantMessage]) -> Vec<String> {
    relevant
        .iter()
        .take(MAX_KEY_POINTS)
        .map(|r| r.message.content.trim())
        .filter(|c| c.chars().count() > 20)
        .map(|c| truncate_chars(c, 100, 97))
        .collect()
}

fn evidence(relevant: &[RelevantMessage]) -> Vec<Evidence> {
    relevant
        .iter()
        .take(MAX_EVIDENCE)
        .filter(|r| r.message.content.chars().count() > 15)
        .map(|r| Evidence {
            message: truncate_chars(&r.message.content, 150, 150),
            author: r.message.sender.clone(),
            relevance: "Contains relevant context for the question".to_string(),
        })
        .collect()
}

/// `0.6 · keyword coverage + 0.4 · share of substantial messages`, kept in [0.1, 0.9].
fn confidence(relevant: &[RelevantMessage]) -> f64 {
    if relevant.is_empty() {
        return 0.1;
    }
    let n = relevant.len() as f64;
    let hits: usize = relevant.iter().map(|r| r.hits).sum();
    let substantial = relevant
        .iter()
        .filter(|r| r.message.content.chars().count() > 30)
        .count();

    let relevance = (hits as f64 / (n * MAX_HITS_PER_MESSAGE as f64)).min(1.0);
    let content = (substantial as f64 / n).min(1.0);
    (0.6 * relevance + 0.4 * content).clamp(0.1, 0.9)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(messages: &[(&str, &str)]) -> Conversation {
        Conversation::from_messages(
            messages
                .iter()
                .map(|(s, c)| ChatMessage::new(*s, *c))
                .collect(),
        )
    }

    #[test]
    fn test_no_messages_gives_canned_answer() {
        let s = suggest_answer("What is your experience?", &Conversation::default());
        assert_eq!(s.confidence, 0.0);
        assert!(s.suggested_answer.starts_with("No chat context"));
        assert!(s.key_points.is_empty());
    }

    #[test]
    fn test_answer_built_from_relevant_messages() {
        let c = conv(&[
            ("me", "hi"),
            ("me", "I worked on a Python project with a small team last year"),
            ("client", "Sounds great, thanks"),
        ]);
        let s = suggest_answer("What is your experience with Python?", &c);
        assert_eq!(s.source_messages, 1);
        assert!(s.suggested_answer.starts_with("Based on our previous conversation,"));
        assert!(s.suggested_answer.contains("Python programming"));
        assert!(s.suggested_answer.contains("various projects"));
        assert!(s.suggested_answer.contains("team environments"));
        assert_eq!(s.evidence_from_chat[0].author, "me");
        assert!((0.1..=0.9).contains(&s.confidence));
    }

    #[test]
    fn test_no_relevant_messages() {
        let c = conv(&[("client", "ok"), ("me", "sure")]);
        let s = suggest_answer("Describe your team", &c);
        assert_eq!(s.source_messages, 0);
        assert_eq!(s.confidence, 0.1);
        assert!(s.suggested_answer.contains("don't have specific details"));
    }

    #[test]
    fn test_key_points_truncated() {
        let long = "project ".repeat(30);
        let c = conv(&[("me", long.as_str())]);
        let s = suggest_answer("Tell me about a project", &c);
        assert_eq!(s.key_points[0].chars().count(), 100);
        assert!(s.key_points[0].ends_with("..."));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let c = conv(&[(
            "me",
            "experience work worked used project experience work worked used project",
        )]);
        let s = suggest_answer("Your experience on this project?", &c);
        assert_eq!(s.confidence, 0.9);
    }
}
