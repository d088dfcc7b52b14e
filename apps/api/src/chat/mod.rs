// Chat ingestion: payload normalization, topic extraction and context storage.

pub mod conversation;
pub mod handlers;
pub mod topics;
