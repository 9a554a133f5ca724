//! # Session Manager
//!
//! Owns the state of one chat view: the transcript, the typing/streaming
//! flags, the error banner and scroll tracking. It creates remote sessions,
//! dispatches messages, listens for the assistant's replies on the live
//! feed and persists the `sessionId` / `chatHistory` keys.

pub mod error;
mod listener;
pub mod manager;
pub mod scroll;
pub mod storage;
mod store;
pub mod structs;

// Re-exports
pub use error::{Result, SessionError};
pub use manager::{ChatSessionManager, ManagerOptions};
pub use scroll::{is_fully_scrolled, show_new_message_indicator, ScrollMetrics};
pub use storage::{FileStateStorage, MemoryStateStorage, PersistedState};
pub use structs::{
    ChatState, Key, MoreAction, RejectReason, SendOutcome, SessionHandle, EMPTY_INPUT_ERROR,
};

pub use chat_state::SessionPhase;
