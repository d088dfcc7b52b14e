//! Multi-strategy smart-reply generation.
//!
//! Each strategy looks at a [`ReplyContext`] and may produce one candidate.
//! Strategies are isolated: an error or timeout in one is logged and skipped.
//! If fewer than three produce something, fallback replies pad the list.
//! Candidates are ranked by confidence (stable) and the top five returned.

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::TextGenerator;
use crate::chat::conversation::Conversation;
use crate::interview::prompts::{fill, FOLLOWUP_REPLY_PROMPT};
use crate::interview::selector::{choose, TemplateSelector};
use crate::llm_client::LlmError;

pub const MAX_REPLIES: usize = 5;
/// Fallbacks are added only when fewer strategies than this succeeded.
const MIN_STRATEGY_REPLIES: usize = 3;
const MAX_FALLBACKS: usize = 3;

const FOLLOWUP_MAX_TOKENS: u32 = 50;
const FOLLOWUP_TEMPERATURE: f32 = 0.8;
const EXPERIENCE_MARKERS: &[&str] = &["experience", "worked", "project", "skill"];

// ────────────────────────────────────────────────────────────────────────────
// Models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyType {
    Followup,
    Clarification,
    Expertise,
    Experience,
    ProjectFocused,
    TopicSpecific,
    Generic,
}

/// One ranked reply candidate. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartReply {
    pub response: String,
    #[serde(rename = "type")]
    pub reply_type: ReplyType,
    pub confidence: f64,
    pub context: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Opening,
    Exploration,
    DeepDiscussion,
}

impl ConversationPhase {
    pub fn for_message_count(total: usize) -> Self {
        match total {
            0..=3 => ConversationPhase::Opening,
            4..=10 => ConversationPhase::Exploration,
            _ => ConversationPhase::DeepDiscussion,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationPhase::Opening => "opening",
            ConversationPhase::Exploration => "exploration",
            ConversationPhase::DeepDiscussion => "deep_discussion",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowAnalysis {
    pub phase: ConversationPhase,
    pub last_author: String,
    pub last_content: String,
    pub total_messages: usize,
    pub is_question: bool,
    pub mentions_experience: bool,
}

impl FlowAnalysis {
    pub fn of(conversation: &Conversation) -> Self {
        let (last_author, last_content) = conversation
            .last_message()
            .map(|m| (m.sender.clone(), m.content.clone()))
            .unwrap_or_else(|| ("Unknown".to_string(), String::new()));
        let lower = last_content.to_lowercase();
        Self {
            phase: ConversationPhase::for_message_count(conversation.messages.len()),
            total_messages: conversation.messages.len(),
            is_question: last_content.contains('?'),
            mentions_experience: EXPERIENCE_MARKERS.iter().any(|w| lower.contains(w)),
            last_author,
            last_content,
        }
    }
}

/// Everything a strategy may look at.
pub struct ReplyContext<'a> {
    pub conversation: &'a Conversation,
    pub topics: &'a [String],
    pub flow: FlowAnalysis,
}

impl<'a> ReplyContext<'a> {
    pub fn new(conversation: &'a Conversation, topics: &'a [String]) -> Self {
        Self {
            conversation,
            topics,
            flow: FlowAnalysis::of(conversation),
        }
    }

    fn top_topic(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    fn leading_topics(&self, n: usize) -> Vec<String> {
        self.topics.iter().take(n).cloned().collect()
    }
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("generator call failed: {0}")]
    Generator(#[from] LlmError),

    #[error("generator call timed out after {0:?}")]
    Timeout(Duration),
}

type StrategyResult = Result<Option<SmartReply>, StrategyError>;
type TemplateStrategy = fn(&ReplyContext, &mut dyn TemplateSelector) -> StrategyResult;

const TEMPLATE_STRATEGIES: &[(&str, TemplateStrategy)] = &[
    ("clarification", clarification_reply),
    ("expertise", expertise_reply),
    ("experience", experience_reply),
    ("project_focused", project_focused_reply),
];

// ────────────────────────────────────────────────────────────────────────────
// Generator
// ────────────────────────────────────────────────────────────────────────────

pub struct SmartReplyGenerator<'a> {
    generator: Option<&'a dyn TextGenerator>,
    timeout: Duration,
}

impl<'a> SmartReplyGenerator<'a> {
    pub fn new(generator: Option<&'a dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Template-only generator.
    #[cfg(test)]
    pub fn templates_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Ranked replies for `conversation`, at most [`MAX_REPLIES`].
    /// An empty conversation yields an empty list.
    pub async fn generate(
        &self,
        conversation: &Conversation,
        topics: &[String],
        selector: &mut dyn TemplateSelector,
    ) -> Vec<SmartReply> {
        if conversation.is_empty() {
            warn!("No messages found in chat data");
            return Vec::new();
        }

        let ctx = ReplyContext::new(conversation, topics);
        info!(
            "Generating smart replies: {} messages, phase {}, {} topics",
            ctx.flow.total_messages,
            ctx.flow.phase.as_str(),
            topics.len()
        );

        let mut candidates = Vec::new();
        collect("followup", self.followup_reply(&ctx).await, &mut candidates);
        for (name, strategy) in TEMPLATE_STRATEGIES {
            collect(name, strategy(&ctx, &mut *selector), &mut candidates);
        }

        if candidates.len() < MIN_STRATEGY_REPLIES {
            debug!("Only {} strategy replies, adding fallbacks", candidates.len());
            candidates.extend(fallback_replies(&ctx));
        }

        rank(&mut candidates);
        info!("Returning {} smart replies", candidates.len());
        candidates
    }

    async fn followup_reply(&self, ctx: &ReplyContext<'_>) -> StrategyResult {
        let Some(generator) = self.generator else {
            return Ok(None);
        };
        if ctx.flow.last_content.trim().is_empty() {
            return Ok(None);
        }

        let topics = ctx.leading_topics(3).join(", ");
        let prompt = fill(
            FOLLOWUP_REPLY_PROMPT,
            &[
                ("last_message", ctx.flow.last_content.as_str()),
                ("topics", topics.as_str()),
                ("phase", ctx.flow.phase.as_str()),
            ],
        );

        let generated = tokio::time::timeout(
            self.timeout,
            generator.generate(&prompt, FOLLOWUP_MAX_TOKENS, FOLLOWUP_TEMPERATURE),
        )
        .await
        .map_err(|_| StrategyError::Timeout(self.timeout))??;

        Ok(clean_followup(&generated).map(|response| SmartReply {
            response,
            reply_type: ReplyType::Followup,
            confidence: 0.75,
            context: format!(
                "Natural follow-up to: {}...",
                ctx.flow.last_content.chars().take(100).collect::<String>()
            ),
            topics: ctx.leading_topics(3),
        }))
    }
}

fn collect(name: &str, result: StrategyResult, out: &mut Vec<SmartReply>) {
    match result {
        Ok(Some(reply)) => {
            debug!("Strategy {name} produced a reply");
            out.push(reply);
        }
        Ok(None) => debug!("Strategy {name} produced nothing"),
        Err(e) => warn!("Strategy {name} failed: {e}"),
    }
}

/// Stable sort by confidence, highest first, then keep the top few.
fn rank(candidates: &mut Vec<SmartReply>) {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    candidates.truncate(MAX_REPLIES);
}

/// Keeps the first distinct non-trivial line of generated text and makes sure
/// it ends like a sentence.
pub fn clean_followup(generated: &str) -> Option<String> {
    let generated = generated.trim();
    if generated.chars().count() <= 10 {
        return None;
    }

    let mut lines: Vec<&str> = Vec::new();
    for line in generated.lines().map(str::trim) {
        if line.chars().count() > 5 && !lines.contains(&line) {
            lines.push(line);
        }
    }
    let first = lines.first()?;

    if first.ends_with(['.', '?', '!']) {
        return Some(first.to_string());
    }
    Some(match first.split_once('?') {
        Some((head, _)) => format!("{head}?"),
        None => format!("{first}."),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Template strategies
// ────────────────────────────────────────────────────────────────────────────

fn template_reply(
    ctx: &ReplyContext,
    selector: &mut dyn TemplateSelector,
    templates: &[String],
    reply_type: ReplyType,
    confidence: f64,
    context: String,
) -> StrategyResult {
    Ok(choose(selector, templates).map(|response| SmartReply {
        response: response.clone(),
        reply_type,
        confidence,
        context,
        topics: ctx.leading_topics(2),
    }))
}

fn clarification_reply(ctx: &ReplyContext, selector: &mut dyn TemplateSelector) -> StrategyResult {
    let Some(topic) = ctx.top_topic() else {
        return Ok(None);
    };
    let templates = [
        format!("Could you tell me more about your experience with {topic}?"),
        format!("What specific aspects of {topic} have you worked with?"),
        format!("How long have you been working with {topic}?"),
        format!("What challenges have you faced when working with {topic}?"),
        format!("Can you share an example of a {topic} project you've completed?"),
    ];
    template_reply(
        ctx,
        selector,
        &templates,
        ReplyType::Clarification,
        0.70,
        format!("Seeking clarification about {topic}"),
    )
}

fn expertise_reply(ctx: &ReplyContext, selector: &mut dyn TemplateSelector) -> StrategyResult {
    let Some(topic) = ctx.top_topic() else {
        return Ok(None);
    };
    let templates = [
        format!("I have extensive experience with {topic}, particularly in building scalable solutions."),
        format!("My background in {topic} includes both development and optimization work."),
        format!("I've successfully implemented {topic} solutions for various client projects."),
        format!("In my experience with {topic}, I've found that proper architecture is crucial."),
        format!("I'm particularly strong in {topic} development and best practices."),
    ];
    template_reply(
        ctx,
        selector,
        &templates,
        ReplyType::Expertise,
        0.65,
        format!("Demonstrating expertise in {topic}"),
    )
}

fn experience_reply(ctx: &ReplyContext, selector: &mut dyn TemplateSelector) -> StrategyResult {
    let Some(topic) = ctx.top_topic() else {
        return Ok(None);
    };
    let templates = [
        format!("In my recent projects, I've worked extensively with {topic} to solve complex challenges."),
        format!("I have hands-on experience implementing {topic} solutions in production environments."),
        format!("My work with {topic} has involved both frontend and backend development."),
        format!("I've been working with {topic} for several years across different types of projects."),
        format!("One of my strongest areas is {topic} development and system integration."),
    ];
    template_reply(
        ctx,
        selector,
        &templates,
        ReplyType::Experience,
        0.68,
        format!("Sharing experience with {topic}"),
    )
}

fn project_focused_reply(ctx: &ReplyContext, selector: &mut dyn TemplateSelector) -> StrategyResult {
    let Some(topic) = ctx.top_topic() else {
        return Ok(None);
    };
    let templates = match ctx.conversation.project_title.as_deref() {
        Some(project) => [
            format!("For this {project} project, my {topic} expertise would be particularly valuable."),
            format!("I understand the requirements for {project} and have relevant {topic} experience."),
            format!("My background in {topic} aligns well with the {project} project goals."),
            format!("I can contribute to {project} by leveraging my {topic} skills and experience."),
        ],
        None => [
            format!("For this project, my {topic} expertise would be particularly valuable."),
            format!("I understand the project requirements and have relevant {topic} experience."),
            format!("My background in {topic} aligns well with the project goals."),
            format!("I can contribute by leveraging my {topic} skills and experience."),
        ],
    };
    template_reply(
        ctx,
        selector,
        &templates,
        ReplyType::ProjectFocused,
        0.72,
        format!("Project-focused response about {topic}"),
    )
}

/// Topic-specific padding first (when there is a topic), then generic lines.
fn fallback_replies(ctx: &ReplyContext) -> Vec<SmartReply> {
    let topics = if ctx.topics.is_empty() {
        vec!["general".to_string()]
    } else {
        ctx.leading_topics(2)
    };
    let reply = |response: String, reply_type, confidence, context: String| SmartReply {
        response,
        reply_type,
        confidence,
        context,
        topics: topics.clone(),
    };

    let mut out = Vec::new();
    if let Some(topic) = ctx.top_topic() {
        out.push(reply(
            format!("I have relevant experience with {topic} that would be valuable for this project."),
            ReplyType::TopicSpecific,
            0.65,
            format!("Topic-specific experience with {topic}"),
        ));
        out.push(reply(
            format!("My expertise in {topic} includes both practical implementation and best practices."),
            ReplyType::TopicSpecific,
            0.62,
            format!("Expertise demonstration in {topic}"),
        ));
    }
    out.push(reply(
        "I'd be happy to discuss this further and provide more details about my background."
            .to_string(),
        ReplyType::Generic,
        0.60,
        "Generic professional response".to_string(),
    ));
    out.push(reply(
        "Thank you for considering my application. I believe my skills align well with your project requirements."
            .to_string(),
        ReplyType::Generic,
        0.58,
        "Professional closing response".to_string(),
    ));
    out.push(reply(
        "I'm excited about the opportunity to contribute to this project and would welcome the chance to discuss it further."
            .to_string(),
        ReplyType::Generic,
        0.55,
        "Enthusiasm and next steps".to_string(),
    ));
    out.truncate(MAX_FALLBACKS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{HangingGenerator, StubGenerator};
    use crate::chat::conversation::ChatMessage;
    use crate::interview::selector::{FixedSelector, SeededSelector};

    fn conv(n: usize) -> Conversation {
        Conversation::from_messages(
            (0..n)
                .map(|i| ChatMessage::new("client", format!("Message {i} about our Python backend")))
                .collect(),
        )
    }

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn assert_ranked(replies: &[SmartReply]) {
        assert!(!replies.is_empty() && replies.len() <= MAX_REPLIES);
        assert!(replies.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[tokio::test]
    async fn test_empty_conversation_yields_nothing() {
        let replies = SmartReplyGenerator::templates_only()
            .generate(&Conversation::default(), &[], &mut FixedSelector(0))
            .await;
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn test_template_strategies_without_generator() {
        let replies = SmartReplyGenerator::templates_only()
            .generate(&conv(2), &topics(&["Python", "Django"]), &mut FixedSelector(0))
            .await;
        assert_ranked(&replies);
        let types: Vec<_> = replies.iter().map(|r| r.reply_type).collect();
        assert_eq!(
            types,
            vec![
                ReplyType::ProjectFocused,
                ReplyType::Clarification,
                ReplyType::Experience,
                ReplyType::Expertise,
            ]
        );
        assert_eq!(
            replies[1].response,
            "Could you tell me more about your experience with Python?"
        );
        assert_eq!(replies[0].topics, vec!["Python", "Django"]);
    }

    #[tokio::test]
    async fn test_followup_ranks_first_and_list_is_capped() {
        let gen = StubGenerator::ok("Sounds good, which framework are you using? Happy to help\nSounds good, which framework are you using? Happy to help");
        let generator = SmartReplyGenerator::new(Some(&gen), Duration::from_secs(1));
        let replies = generator
            .generate(&conv(12), &topics(&["Python"]), &mut SeededSelector::new(Some(1)))
            .await;
        assert_ranked(&replies);
        assert_eq!(replies.len(), MAX_REPLIES);
        assert_eq!(replies[0].reply_type, ReplyType::Followup);
        assert_eq!(replies[0].response, "Sounds good, which framework are you using?");
        assert!(replies[0].context.starts_with("Natural follow-up to: Message 11"));
    }

    #[tokio::test]
    async fn test_no_topics_pads_with_generic_fallbacks() {
        let replies = SmartReplyGenerator::templates_only()
            .generate(&conv(1), &[], &mut FixedSelector(0))
            .await;
        let confidences: Vec<_> = replies.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![0.60, 0.58, 0.55]);
        assert!(replies.iter().all(|r| r.reply_type == ReplyType::Generic));
        assert_eq!(replies[0].topics, vec!["general"]);
    }

    #[tokio::test]
    async fn test_failing_generator_is_isolated() {
        let gen = StubGenerator::failing();
        let generator = SmartReplyGenerator::new(Some(&gen), Duration::from_secs(1));
        let replies = generator
            .generate(&conv(5), &topics(&["Rust"]), &mut FixedSelector(0))
            .await;
        assert_eq!(replies.len(), 4);
        assert!(replies.iter().all(|r| r.reply_type != ReplyType::Followup));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_generator_times_out() {
        let gen = HangingGenerator;
        let generator = SmartReplyGenerator::new(Some(&gen), Duration::from_secs(2));
        let replies = generator
            .generate(&conv(5), &topics(&["Rust"]), &mut FixedSelector(0))
            .await;
        assert_eq!(replies.len(), 4);
    }

    #[tokio::test]
    async fn test_project_title_variant() {
        let mut c = conv(3);
        c.project_title = Some("Acme Portal".to_string());
        let replies = SmartReplyGenerator::templates_only()
            .generate(&c, &topics(&["React"]), &mut FixedSelector(0))
            .await;
        let project = replies
            .iter()
            .find(|r| r.reply_type == ReplyType::ProjectFocused)
            .unwrap();
        assert_eq!(
            project.response,
            "For this Acme Portal project, my React expertise would be particularly valuable."
        );
    }

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(ConversationPhase::for_message_count(3), ConversationPhase::Opening);
        assert_eq!(ConversationPhase::for_message_count(4), ConversationPhase::Exploration);
        assert_eq!(ConversationPhase::for_message_count(10), ConversationPhase::Exploration);
        assert_eq!(ConversationPhase::for_message_count(11), ConversationPhase::DeepDiscussion);
    }

    #[test]
    fn test_flow_analysis_flags() {
        let c = Conversation::from_messages(vec![
            ChatMessage::new("me", "hello"),
            ChatMessage::new("Dana", "Have you worked with Stripe?"),
        ]);
        let flow = FlowAnalysis::of(&c);
        assert_eq!(flow.last_author, "Dana");
        assert!(flow.is_question);
        assert!(flow.mentions_experience);
    }

    #[test]
    fn test_clean_followup_rules() {
        assert_eq!(clean_followup("too short"), None);
        assert_eq!(clean_followup("   \n  ok  \n tiny "), None);
        assert_eq!(
            clean_followup("Thanks for the details\nmore"),
            Some("Thanks for the details.".to_string())
        );
        assert_eq!(
            clean_followup("Is Friday fine? We can sync then"),
            Some("Is Friday fine?".to_string())
        );
        assert_eq!(
            clean_followup("Great, let's proceed!"),
            Some("Great, let's proceed!".to_string())
        );
    }
}
