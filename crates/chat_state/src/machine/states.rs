//! Session phases - Defines all possible phases of a chat session

use serde::{Deserialize, Serialize};

/// The phases a conversation moves through.
///
/// ```text
/// New -> Creating -> Streaming -> Idle -> (Streaming | Idle)* -> Ended
/// ```
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session yet; the input box is armed.
    #[default]
    New,

    /// The session creation request is in flight.
    Creating,

    /// Waiting for, or receiving, the assistant reply.
    Streaming,

    /// No outstanding exchange; waiting for the next user input.
    Idle,

    /// The view was torn down and the subscription released.
    Ended,
}

impl SessionPhase {
    /// Check if this is a terminal phase (only a reset leaves it).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Check if this phase allows the user to send a message.
    pub fn accepts_user_input(&self) -> bool {
        matches!(self, Self::New | Self::Idle)
    }

    /// Check if an exchange is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Creating | Self::Streaming)
    }

    /// Check if a remote session exists in this phase.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Streaming | Self::Idle)
    }

    /// Get a human-readable description of the current phase.
    pub fn description(&self) -> &'static str {
        match self {
            Self::New => "Ready for your first message",
            Self::Creating => "Starting conversation",
            Self::Streaming => "Waiting for AI response",
            Self::Idle => "Ready for input",
            Self::Ended => "Conversation closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_is_new() {
        assert_eq!(SessionPhase::default(), SessionPhase::New);
    }

    #[test]
    fn test_input_accepted_only_when_not_busy() {
        assert!(SessionPhase::New.accepts_user_input());
        assert!(SessionPhase::Idle.accepts_user_input());
        assert!(!SessionPhase::Creating.accepts_user_input());
        assert!(!SessionPhase::Streaming.accepts_user_input());
        assert!(!SessionPhase::Ended.accepts_user_input());
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&SessionPhase::Streaming).unwrap();
        assert_eq!(json, "\"streaming\"");
    }
}
