//! Session store data structures

use chat_core::{ChatHistory, HistoryRecord, Message, SessionMetadata};
use serde::{Deserialize, Serialize};

use crate::scroll;

/// Message shown when the user tries to send an empty input.
pub const EMPTY_INPUT_ERROR: &str = "Please enter a message";

/// Everything the chat view renders from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatState {
    /// Current contents of the input box
    pub input: String,

    /// Error banner text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Id of the mounted remote session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Transcript in display order, including optimistic local messages
    pub messages: Vec<Message>,

    #[serde(default)]
    pub metadata: SessionMetadata,

    /// Assistant typing bubble
    pub typing: bool,

    /// Awaiting or receiving the reply to the current exchange
    pub streaming: bool,

    /// A reply finished and the user has not scrolled down to it yet
    pub streaming_done: bool,

    pub fully_scrolled: bool,
    pub session_loaded: bool,
    pub started: bool,

    /// Overflow menu open
    pub more: bool,
    pub info_chat_opened: bool,
    pub settings_chat_opened: bool,

    /// Remote history request in flight
    pub loading: bool,
    pub history_loaded: bool,

    /// Past conversations listed from the backend
    #[serde(default)]
    pub remote_history: Vec<HistoryRecord>,

    /// Locally kept sent messages; survives resets
    #[serde(default)]
    pub chat_history: ChatHistory,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            input: String::new(),
            error: None,
            session_id: None,
            messages: Vec::new(),
            metadata: SessionMetadata::default(),
            typing: false,
            streaming: false,
            streaming_done: false,
            fully_scrolled: true,
            session_loaded: false,
            started: false,
            more: false,
            info_chat_opened: false,
            settings_chat_opened: false,
            loading: false,
            history_loaded: false,
            remote_history: Vec::new(),
            chat_history: ChatHistory::default(),
        }
    }
}

impl ChatState {
    /// Initial state, keeping only cross-session data.
    pub fn reset(&self) -> Self {
        Self {
            chat_history: self.chat_history.clone(),
            ..Self::default()
        }
    }

    /// Messages to render; system messages are hidden.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_visible())
    }

    /// Whether the send button is enabled.
    pub fn can_send(&self) -> bool {
        !(self.typing || self.error.is_some() || self.input.is_empty() || self.streaming)
    }

    pub fn show_new_message_indicator(&self) -> bool {
        scroll::show_new_message_indicator(self.fully_scrolled, self.streaming_done)
    }

    /// The empty-conversation placeholder shows instead of the transcript.
    pub fn shows_placeholder(&self) -> bool {
        self.messages.is_empty() && !self.info_chat_opened
    }
}

/// Names the mounted session. Operations carrying a handle from an earlier
/// mount are rejected or discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    session_id: String,
    epoch: u64,
}

impl SessionHandle {
    pub(crate) fn new(session_id: impl Into<String>, epoch: u64) -> Self {
        Self {
            session_id: session_id.into(),
            epoch,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Why a send did not go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    /// An exchange is already outstanding
    Busy,
    /// The view was torn down
    Ended,
    /// The key does not submit
    NotSubmitKey,
}

/// Result of a send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// A new session was created with the message
    Created(SessionHandle),
    /// The message was sent to the mounted session
    Sent(SessionHandle),
    Rejected(RejectReason),
}

impl SendOutcome {
    pub fn handle(&self) -> Option<&SessionHandle> {
        match self {
            Self::Created(handle) | Self::Sent(handle) => Some(handle),
            Self::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Overflow menu actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreAction {
    Toggle,
    Shutdown,
}

/// Keys the chat input reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_default_state() {
        let state = ChatState::default();
        assert!(state.fully_scrolled);
        assert!(!state.typing);
        assert!(state.error.is_none());
        assert!(state.shows_placeholder());
        assert!(!state.can_send());
    }

    #[test]
    fn test_reset_keeps_chat_history_only() {
        let mut state = ChatState::default();
        state.input = "draft".to_string();
        state.typing = true;
        state.session_id = Some("s1".to_string());
        state.messages.push(Message::human("Hello"));
        state.chat_history.record("Hello", Utc::now());

        let reset = state.reset();
        assert_eq!(reset.chat_history.len(), 1);
        assert!(reset.messages.is_empty());
        assert!(reset.session_id.is_none());
        assert!(reset.input.is_empty());
        assert!(!reset.typing);
    }

    #[test]
    fn test_can_send() {
        let mut state = ChatState::default();
        state.input = "Hello".to_string();
        assert!(state.can_send());

        state.streaming = true;
        assert!(!state.can_send());

        state.streaming = false;
        state.error = Some("oops".to_string());
        assert!(!state.can_send());
    }

    #[test]
    fn test_visible_messages_hide_system() {
        let mut state = ChatState::default();
        state.messages = vec![
            Message::system("You are a tutor"),
            Message::human("Hi"),
            Message::assistant("Hello!"),
        ];
        assert_eq!(state.visible_messages().count(), 2);
    }
}
