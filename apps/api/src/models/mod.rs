pub mod chat;
pub mod interview;
pub mod posting;
