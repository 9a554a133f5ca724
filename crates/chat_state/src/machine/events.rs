//! Chat events - Defines events that trigger phase transitions

use serde::{Deserialize, Serialize};

/// Defines the events that can trigger phase transitions in the FSM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    // ========== User Events ==========
    /// User sent a message (free text or quick reply).
    UserMessageSent,

    /// User asked for a fresh conversation.
    ConversationReset,

    /// The view showing the session was torn down.
    ViewTornDown,

    // ========== Backend Events ==========
    /// The remote session was created.
    SessionCreated { session_id: String },

    /// The backend handed back a session that already existed.
    SessionResumed { session_id: String },

    /// Creating the remote session failed.
    SessionCreationFailed { error: String },

    /// Sending a message to an existing session failed.
    DispatchFailed { error: String },

    /// An assistant message was observed on the live feed.
    AssistantMessageReceived,
}

impl ChatEvent {
    /// Check if this event is user-initiated.
    pub fn is_user_event(&self) -> bool {
        matches!(
            self,
            Self::UserMessageSent | Self::ConversationReset | Self::ViewTornDown
        )
    }

    /// Check if this is an error event.
    pub fn is_error_event(&self) -> bool {
        matches!(
            self,
            Self::SessionCreationFailed { .. } | Self::DispatchFailed { .. }
        )
    }

    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserMessageSent => "user_message_sent",
            Self::ConversationReset => "conversation_reset",
            Self::ViewTornDown => "view_torn_down",
            Self::SessionCreated { .. } => "session_created",
            Self::SessionResumed { .. } => "session_resumed",
            Self::SessionCreationFailed { .. } => "session_creation_failed",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::AssistantMessageReceived => "assistant_message_received",
        }
    }
}
