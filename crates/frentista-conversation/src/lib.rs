//! Conversation engine — onboarding dialogue and free-form replies,
//! one state machine per contact.

pub mod engine;
pub mod names;
pub mod reply;

pub use engine::ConversationEngine;
pub use reply::TemplateReplier;
