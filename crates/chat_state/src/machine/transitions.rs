//! Phase transitions - FSM transition logic
//!
//! Implements the state machine that handles event-driven phase transitions.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::events::ChatEvent;
use super::states::SessionPhase;

/// Error type for invalid phase transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} with event {event}")]
    InvalidTransition { from: SessionPhase, event: String },

    #[error("State machine is in terminal phase: {0:?}")]
    TerminalState(SessionPhase),
}

/// Represents a phase transition result.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The phase before the transition.
    pub from: SessionPhase,
    /// The phase after the transition.
    pub to: SessionPhase,
    /// The event that triggered the transition.
    pub event: ChatEvent,
    /// Whether the phase actually changed.
    pub changed: bool,
    pub at: DateTime<Utc>,
}

/// State machine for managing session phase transitions.
#[derive(Debug, Clone)]
pub struct StateMachine {
    /// Current phase.
    current: SessionPhase,
    /// Transition history (limited).
    history: Vec<StateTransition>,
    /// Max history entries to keep.
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in the New phase.
    pub fn new() -> Self {
        Self::with_phase(SessionPhase::New)
    }

    /// Create a state machine with a specific initial phase.
    pub fn with_phase(phase: SessionPhase) -> Self {
        Self {
            current: phase,
            history: Vec::new(),
            max_history: 50,
        }
    }

    /// Get the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.current
    }

    /// Get the transition history.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Handle an event and transition to a new phase.
    pub fn handle_event(&mut self, event: ChatEvent) -> StateTransition {
        let from = self.current;
        let to = Self::compute_next_phase(from, &event);
        let changed = from != to;

        self.current = to;

        if changed {
            tracing::debug!(from = ?from, to = ?to, event = event.name(), "Session phase changed");
        }

        let transition = StateTransition {
            from,
            to,
            event,
            changed,
            at: Utc::now(),
        };

        self.history.push(transition.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        transition
    }

    /// Handle an event, rejecting it if it would not move the machine.
    pub fn try_handle_event(&mut self, event: ChatEvent) -> Result<StateTransition, TransitionError> {
        if self.current.is_terminal() && event != ChatEvent::ConversationReset {
            return Err(TransitionError::TerminalState(self.current));
        }
        if !self.can_transition(&event) {
            return Err(TransitionError::InvalidTransition {
                from: self.current,
                event: event.name().to_string(),
            });
        }
        Ok(self.handle_event(event))
    }

    /// Compute the next phase given current phase and event.
    fn compute_next_phase(phase: SessionPhase, event: &ChatEvent) -> SessionPhase {
        use ChatEvent::*;
        use SessionPhase::*;

        match (phase, event) {
            // ========== Reset and Teardown ==========
            (_, ConversationReset) => New,
            (Ended, _) => Ended,
            (_, ViewTornDown) => Ended,

            // ========== User Input ==========
            (New, UserMessageSent) => Creating,
            (Idle, UserMessageSent) => Streaming,

            // ========== Session Creation ==========
            (Creating, SessionCreated { .. }) => Streaming,
            (Creating, SessionResumed { .. }) => Idle,
            (Creating, SessionCreationFailed { .. }) => New,

            // ========== Streaming ==========
            (Streaming, AssistantMessageReceived) => Idle,
            (Streaming, DispatchFailed { .. }) => Idle,

            // ========== Default: No transition ==========
            _ => phase,
        }
    }

    /// Check if a transition is valid without executing it.
    pub fn can_transition(&self, event: &ChatEvent) -> bool {
        Self::compute_next_phase(self.current, event) != self.current
    }

    /// Reset to the New phase.
    pub fn reset(&mut self) {
        self.current = SessionPhase::New;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> ChatEvent {
        ChatEvent::SessionCreated {
            session_id: "s1".to_string(),
        }
    }

    #[test]
    fn test_full_conversation_flow() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::New);

        assert!(sm.handle_event(ChatEvent::UserMessageSent).changed);
        assert_eq!(sm.phase(), SessionPhase::Creating);

        assert!(sm.handle_event(created()).changed);
        assert_eq!(sm.phase(), SessionPhase::Streaming);

        sm.handle_event(ChatEvent::AssistantMessageReceived);
        assert_eq!(sm.phase(), SessionPhase::Idle);

        sm.handle_event(ChatEvent::UserMessageSent);
        assert_eq!(sm.phase(), SessionPhase::Streaming);

        sm.handle_event(ChatEvent::ViewTornDown);
        assert_eq!(sm.phase(), SessionPhase::Ended);
    }

    #[test]
    fn test_creation_failure_returns_to_new() {
        let mut sm = StateMachine::with_phase(SessionPhase::Creating);
        sm.handle_event(ChatEvent::SessionCreationFailed {
            error: "offline".to_string(),
        });
        assert_eq!(sm.phase(), SessionPhase::New);
    }

    #[test]
    fn test_resumed_session_is_idle() {
        let mut sm = StateMachine::with_phase(SessionPhase::Creating);
        sm.handle_event(ChatEvent::SessionResumed {
            session_id: "s1".to_string(),
        });
        assert_eq!(sm.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_send_while_streaming_is_not_a_transition() {
        let mut sm = StateMachine::with_phase(SessionPhase::Streaming);
        assert!(!sm.can_transition(&ChatEvent::UserMessageSent));

        let err = sm.try_handle_event(ChatEvent::UserMessageSent).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: SessionPhase::Streaming,
                event: "user_message_sent".to_string(),
            }
        );
        assert_eq!(sm.phase(), SessionPhase::Streaming);
    }

    #[test]
    fn test_ended_is_terminal_until_reset() {
        let mut sm = StateMachine::with_phase(SessionPhase::Ended);
        assert_eq!(
            sm.try_handle_event(ChatEvent::UserMessageSent).unwrap_err(),
            TransitionError::TerminalState(SessionPhase::Ended)
        );
        sm.handle_event(ChatEvent::AssistantMessageReceived);
        assert_eq!(sm.phase(), SessionPhase::Ended);

        sm.try_handle_event(ChatEvent::ConversationReset).unwrap();
        assert_eq!(sm.phase(), SessionPhase::New);
    }

    #[test]
    fn test_assistant_message_while_idle_keeps_idle() {
        let mut sm = StateMachine::with_phase(SessionPhase::Idle);
        let t = sm.handle_event(ChatEvent::AssistantMessageReceived);
        assert!(!t.changed);
        assert_eq!(sm.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut sm = StateMachine::with_phase(SessionPhase::Idle);
        for _ in 0..60 {
            sm.handle_event(ChatEvent::UserMessageSent);
            sm.handle_event(ChatEvent::AssistantMessageReceived);
        }
        assert_eq!(sm.history().len(), 50);
        assert_eq!(sm.history().last().map(|t| t.to), Some(SessionPhase::Idle));
    }
}
