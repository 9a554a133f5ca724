//! chat_state - Lifecycle state machine for chat sessions
//!
//! This crate provides the state machine that tracks a conversation from
//! the first send, through each streamed assistant reply, to teardown.

pub mod machine;

// Re-export commonly used types
pub use machine::{ChatEvent, SessionPhase, StateMachine, StateTransition, TransitionError};
