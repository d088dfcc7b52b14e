//! Interview question generation: one question per topic via the generator,
//! template fallback per question type, general questions once topics run out.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::manager::TEMPLATE_BACKEND;
use crate::ai::{call_with_timeout, TextGenerator};
use crate::interview::prompts;
use crate::interview::selector::{choose, TemplateSelector};

const QUESTION_MAX_TOKENS: u32 = 50;
const QUESTION_TEMPERATURE: f32 = 0.8;
const DEFAULT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    General,
    Technical,
    Behavioral,
    Project,
    Experience,
    Skill,
    Scenario,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::General => "general",
            QuestionType::Technical => "technical",
            QuestionType::Behavioral => "behavioral",
            QuestionType::Project => "project",
            QuestionType::Experience => "experience",
            QuestionType::Skill => "skill",
            QuestionType::Scenario => "scenario",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(QuestionType::General),
            "technical" => Ok(QuestionType::Technical),
            "behavioral" => Ok(QuestionType::Behavioral),
            "project" => Ok(QuestionType::Project),
            "experience" => Ok(QuestionType::Experience),
            "skill" => Ok(QuestionType::Skill),
            "scenario" => Ok(QuestionType::Scenario),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// A question ready to be stored on a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedQuestion {
    pub text: String,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub related_topics: Vec<String>,
    pub generated_by_model: String,
    pub generation_confidence: f64,
}

pub struct QuestionGenerator<'a> {
    generator: Option<&'a dyn TextGenerator>,
    timeout: Duration,
}

impl<'a> QuestionGenerator<'a> {
    pub fn new(generator: Option<&'a dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    #[cfg(test)]
    pub fn templates_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// `count` questions of `question_type`. Question `i` targets `topics[i]`
    /// when there is one, otherwise it is a general question.
    pub async fn generate(
        &self,
        topics: &[String],
        question_type: QuestionType,
        count: usize,
        selector: &mut dyn TemplateSelector,
    ) -> Vec<GeneratedQuestion> {
        let mut questions = Vec::with_capacity(count);
        for i in 0..count {
            let (text, model, related_topics) = match topics.get(i) {
                Some(topic) => {
                    let (text, model) = self.topic_question(topic, question_type, selector).await;
                    (text, model, vec![topic.clone()])
                }
                None => (
                    general_question(question_type, selector),
                    TEMPLATE_BACKEND.to_string(),
                    Vec::new(),
                ),
            };
            questions.push(GeneratedQuestion {
                text,
                question_type,
                difficulty: Difficulty::Medium,
                related_topics,
                generated_by_model: model,
                generation_confidence: DEFAULT_CONFIDENCE,
            });
        }
        debug!("Generated {} {} questions", questions.len(), question_type);
        questions
    }

    /// Generated question text and the model that produced it.
    async fn topic_question(
        &self,
        topic: &str,
        question_type: QuestionType,
        selector: &mut dyn TemplateSelector,
    ) -> (String, String) {
        if let Some(generator) = self.generator {
            let prompt = question_prompt(topic, question_type);
            let generated = call_with_timeout(
                "Question generation",
                self.timeout,
                generator.generate(&prompt, QUESTION_MAX_TOKENS, QUESTION_TEMPERATURE),
            )
            .await;
            if let Some(question) = generated.as_deref().and_then(clean_question) {
                return (question, generator.model_name().to_string());
            }
        }
        (
            template_question(topic, question_type, selector),
            TEMPLATE_BACKEND.to_string(),
        )
    }
}

fn question_prompt(topic: &str, question_type: QuestionType) -> String {
    let template = match question_type {
        QuestionType::Technical => prompts::TECHNICAL_QUESTION_PROMPT,
        QuestionType::Behavioral => prompts::BEHAVIORAL_QUESTION_PROMPT,
        QuestionType::Project => prompts::PROJECT_QUESTION_PROMPT,
        _ => prompts::GENERAL_QUESTION_PROMPT,
    };
    prompts::fill(
        template,
        &[("topic", topic), ("question_type", question_type.as_str())],
    )
}

/// First sentence, capitalized, ending in `?`. `None` when nothing is left.
pub fn clean_question(raw: &str) -> Option<String> {
    let first = raw.split('.').next().unwrap_or_default().trim();
    let mut chars = first.chars();
    let head = chars.next()?;
    let mut question: String = head.to_uppercase().chain(chars).collect();
    if !question.ends_with('?') {
        question.push('?');
    }
    Some(question)
}

fn template_question(
    topic: &str,
    question_type: QuestionType,
    selector: &mut dyn TemplateSelector,
) -> String {
    let templates = match question_type {
        QuestionType::Behavioral => [
            format!("Tell me about a time when you had to learn {topic} quickly."),
            format!("Describe a project where you used {topic} successfully."),
            format!("How do you stay updated with {topic} best practices?"),
            format!("What challenges have you faced when working with {topic}?"),
        ],
        QuestionType::Project => [
            format!("How would you approach a project involving {topic}?"),
            format!("What considerations would you make when implementing {topic}?"),
            format!("How would you explain {topic} to a non-technical team member?"),
            format!("What would be your strategy for testing {topic} functionality?"),
        ],
        _ => [
            format!("What is your experience with {topic}?"),
            format!("How would you implement {topic} in a project?"),
            format!("What are the key challenges when working with {topic}?"),
            format!("Can you explain the benefits of using {topic}?"),
        ],
    };
    choose(selector, &templates)
        .cloned()
        .unwrap_or_else(|| format!("What is your experience with {topic}?"))
}

fn general_question(question_type: QuestionType, selector: &mut dyn TemplateSelector) -> String {
    let questions: &[&str] = match question_type {
        QuestionType::Behavioral => &[
            "Tell me about a challenging project you've worked on.",
            "How do you handle tight deadlines?",
            "Describe a time when you had to work with a difficult team member.",
            "How do you prioritize tasks when working on multiple projects?",
        ],
        QuestionType::Project => &[
            "How do you approach planning a new project?",
            "What is your experience with project management methodologies?",
            "How do you handle changing requirements during a project?",
            "What tools do you use for project collaboration?",
        ],
        _ => &[
            "What programming languages are you most comfortable with?",
            "How do you approach debugging complex issues?",
            "What is your experience with version control systems?",
            "How do you ensure code quality in your projects?",
        ],
    };
    choose(selector, questions)
        .map(|q| q.to_string())
        .unwrap_or_else(|| "Tell me about your professional experience.".to_string())
}
