//! chat_core - Core types for the chat session client
//!
//! This crate provides the foundational types used across all chat-related crates:
//! - `message` - Message, Role, MessageType and quick-reply options
//! - `session` - Session documents and the identity of the user who created them
//! - `history` - Local chat history entries and remote history records
//! - `config` - Client configuration loaded from files and environment

pub mod config;
pub mod history;
pub mod message;
pub mod paths;
pub mod session;

// Re-export commonly used types
pub use config::ClientConfig;
pub use history::{ChatHistory, ChatHistoryEntry, HistoryRecord};
pub use message::{Message, MessagePayload, MessageType, QuickAction, Role};
pub use session::{Session, SessionMetadata, UserIdentity};
