//! Session store: the chat state, its lifecycle phase and mount bookkeeping

use chat_core::{ChatHistory, Message, MessageType, Session, UserIdentity};
use chat_state::{ChatEvent, SessionPhase, StateMachine};
use chrono::Utc;

use crate::structs::{ChatState, SessionHandle};

/// Mutable store behind a [`crate::ChatSessionManager`].
///
/// `epoch` increases every time a session is mounted or unmounted. A
/// [`SessionHandle`] is only honoured while its epoch is current.
#[derive(Debug, Default)]
pub(crate) struct SessionStore {
    pub(crate) state: ChatState,
    pub(crate) machine: StateMachine,
    pub(crate) user: Option<UserIdentity>,
    /// Index (in the remote message sequence) of the last assistant message applied
    pub(crate) last_applied: Option<usize>,
    epoch: u64,
    error_generation: u64,
}

impl SessionStore {
    pub(crate) fn new(user: Option<UserIdentity>) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn current_handle(&self) -> Option<SessionHandle> {
        if self.phase().is_terminal() {
            return None;
        }
        self.state
            .session_id
            .as_ref()
            .map(|id| SessionHandle::new(id.clone(), self.epoch))
    }

    pub(crate) fn is_mounted(&self, handle: &SessionHandle) -> bool {
        !self.phase().is_terminal()
            && handle.epoch() == self.epoch
            && self.state.session_id.as_deref() == Some(handle.session_id())
    }

    /// An exchange is outstanding.
    pub(crate) fn is_busy(&self) -> bool {
        self.state.typing || self.state.streaming || self.phase().is_busy()
    }

    /// Set the error banner; returns the generation used to clear it later.
    pub(crate) fn set_error(&mut self, error: impl Into<String>) -> u64 {
        self.error_generation += 1;
        self.state.error = Some(error.into());
        self.error_generation
    }

    /// Clear the error only if nothing newer replaced it.
    pub(crate) fn clear_error_if(&mut self, generation: u64) -> bool {
        if self.error_generation != generation || self.state.error.is_none() {
            return false;
        }
        self.state.error = None;
        true
    }

    pub(crate) fn clear_error(&mut self) {
        self.error_generation += 1;
        self.state.error = None;
    }

    /// Optimistically append a human message and raise the typing flags.
    ///
    /// Returns the updated local history when the message was recorded in it.
    pub(crate) fn begin_exchange(&mut self, message: Message, streaming: bool) -> Option<ChatHistory> {
        self.clear_error();
        self.state.input.clear();
        self.state.typing = true;
        self.state.streaming = streaming;
        self.state.streaming_done = false;
        self.state.started = true;

        let recorded = message.kind == MessageType::Text
            && self
                .state
                .chat_history
                .record(message.text(), Utc::now())
                .is_some();

        self.state.messages.push(message);
        self.machine.handle_event(ChatEvent::UserMessageSent);

        recorded.then(|| self.state.chat_history.clone())
    }

    /// Mount a session returned by the backend and hand out its handle.
    pub(crate) fn adopt_session(&mut self, session: Session, created: bool) -> SessionHandle {
        self.epoch += 1;

        self.last_applied = session.messages.iter().rposition(Message::is_assistant);
        self.state.session_id = Some(session.id.clone());
        self.state.metadata = session.metadata;
        self.state.session_loaded = true;
        // A trailing assistant message only answers us if the remote
        // transcript already holds everything we sent.
        let mut answered = false;
        if session.messages.len() >= self.state.messages.len() {
            answered = session.messages.last().is_some_and(Message::is_assistant);
            self.state.messages = session.messages;
        }

        let event = if created {
            self.state.streaming = true;
            ChatEvent::SessionCreated {
                session_id: session.id.clone(),
            }
        } else {
            ChatEvent::SessionResumed {
                session_id: session.id.clone(),
            }
        };
        self.machine.handle_event(event);
        if answered {
            self.finish_exchange();
        }

        SessionHandle::new(session.id, self.epoch)
    }

    /// Surface a failed exchange; the optimistic human message stays.
    pub(crate) fn fail_exchange(&mut self, event: ChatEvent, error: impl Into<String>) -> u64 {
        self.state.typing = false;
        self.state.streaming = false;
        self.machine.handle_event(event);
        self.set_error(error)
    }

    /// Apply the assistant message at `index` of the remote sequence.
    pub(crate) fn receive_assistant(&mut self, index: usize, message: Message) -> bool {
        if self.last_applied.is_some_and(|applied| applied >= index) {
            return false;
        }
        self.state.messages.push(message);
        self.last_applied = Some(index);
        self.finish_exchange();
        true
    }

    fn finish_exchange(&mut self) {
        self.state.typing = false;
        self.state.streaming = false;
        self.state.streaming_done = true;
        self.machine.handle_event(ChatEvent::AssistantMessageReceived);
    }

    /// Back to a fresh conversation; cross-session data and the user stay.
    pub(crate) fn reset(&mut self) {
        self.epoch += 1;
        self.last_applied = None;
        self.state = self.state.reset();
        self.machine.handle_event(ChatEvent::ConversationReset);
    }

    /// Tear the view down. Returns `false` if it was already torn down.
    pub(crate) fn end(&mut self) -> bool {
        if self.phase().is_terminal() {
            return false;
        }
        self.epoch += 1;
        self.last_applied = None;
        self.state = self.state.reset();
        self.machine.handle_event(ChatEvent::ViewTornDown);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(messages: Vec<Message>) -> Session {
        let mut session = Session::new("s1");
        for message in messages {
            session.add_message(message);
        }
        session
    }

    #[test]
    fn test_begin_exchange_sets_flags_and_records_text() {
        let mut store = SessionStore::new(None);
        store.state.input = "Hello".to_string();

        let history = store.begin_exchange(Message::human("Hello"), false);

        assert_eq!(history.map(|h| h.len()), Some(1));
        assert!(store.state.input.is_empty());
        assert!(store.state.typing);
        assert!(!store.state.streaming);
        assert_eq!(store.phase(), SessionPhase::Creating);
    }

    #[test]
    fn test_quick_replies_are_not_recorded() {
        let mut store = SessionStore::new(None);
        assert!(store
            .begin_exchange(Message::quick_reply("Recommend Books"), true)
            .is_none());
        assert!(store.state.chat_history.is_empty());
    }

    #[test]
    fn test_adopt_keeps_longer_local_transcript() {
        let mut store = SessionStore::new(None);
        store.begin_exchange(Message::human("Hello"), false);
        store.begin_exchange(Message::human("Again"), false);

        let handle = store.adopt_session(session_with(vec![Message::human("Hello")]), true);

        assert_eq!(store.state.messages.len(), 2);
        assert!(store.is_mounted(&handle));
        assert!(store.state.streaming);
        assert!(store.state.session_loaded);
    }

    #[test]
    fn test_adopt_not_created_is_idle_without_streaming() {
        let mut store = SessionStore::new(None);
        store.begin_exchange(Message::human("Hello"), false);
        store.adopt_session(session_with(vec![Message::human("Hello")]), false);

        assert!(!store.state.streaming);
        assert_eq!(store.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_adopt_with_reply_already_present_finishes_exchange() {
        let mut store = SessionStore::new(None);
        store.begin_exchange(Message::human("Hello"), false);

        store.adopt_session(
            session_with(vec![Message::human("Hello"), Message::assistant("Hi!")]),
            true,
        );

        assert_eq!(store.state.messages.len(), 2);
        assert!(!store.state.typing);
        assert!(!store.state.streaming);
        assert!(store.state.streaming_done);
        assert!(!store.is_busy());
        assert_eq!(store.phase(), SessionPhase::Idle);
        assert!(!store.receive_assistant(1, Message::assistant("Hi!")));
    }

    #[test]
    fn test_adopt_stale_reply_does_not_finish_exchange() {
        let mut store = SessionStore::new(None);
        store.begin_exchange(Message::human("Hello"), false);
        store.begin_exchange(Message::human("Again"), false);
        store.begin_exchange(Message::human("Still there?"), false);

        store.adopt_session(
            session_with(vec![Message::human("Hello"), Message::assistant("Hi!")]),
            false,
        );

        assert!(store.state.typing);
        assert!(!store.state.streaming_done);
        assert_eq!(store.state.messages.len(), 3);
    }

    #[test]
    fn test_receive_assistant_dedupes_by_index() {
        let mut store = SessionStore::new(None);
        store.begin_exchange(Message::human("Hello"), false);
        store.adopt_session(session_with(vec![Message::human("Hello")]), true);

        assert!(store.receive_assistant(1, Message::assistant("Hi!")));
        assert!(!store.receive_assistant(1, Message::assistant("Hi!")));

        assert_eq!(store.state.messages.len(), 2);
        assert!(store.state.streaming_done);
        assert!(!store.state.typing);
        assert_eq!(store.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_reset_invalidates_handles() {
        let mut store = SessionStore::new(Some(UserIdentity::new("u1")));
        store.begin_exchange(Message::human("Hello"), false);
        let handle = store.adopt_session(session_with(vec![Message::human("Hello")]), true);

        store.reset();

        assert!(!store.is_mounted(&handle));
        assert!(store.current_handle().is_none());
        assert_eq!(store.state.chat_history.len(), 1);
        assert_eq!(store.user.as_ref().map(|u| u.id.as_str()), Some("u1"));
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut store = SessionStore::new(None);
        assert!(store.end());
        assert!(!store.end());
        assert_eq!(store.phase(), SessionPhase::Ended);
    }

    #[test]
    fn test_newer_error_is_not_cleared_early() {
        let mut store = SessionStore::new(None);
        let first = store.set_error("Please enter a message");
        let second = store.set_error("offline");

        assert!(!store.clear_error_if(first));
        assert_eq!(store.state.error.as_deref(), Some("offline"));
        assert!(store.clear_error_if(second));
        assert!(store.state.error.is_none());
    }
}
