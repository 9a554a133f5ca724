//! Message module - Chat message types
//!
//! Shared message types used across the system.

mod content;
mod quick_action;

pub use content::{Message, MessagePayload, MessageType, Role};
pub use quick_action::QuickAction;
