// Interview simulation: question generation, response scoring, follow-ups,
// smart replies and session progress.
// Model calls go through the `ai` traits; every path has a template fallback.

pub mod follow_up;
pub mod handlers;
pub mod prompts;
pub mod questions;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod smart_reply;
pub mod suggest;
