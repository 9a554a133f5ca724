//! Chat session manager service

use std::sync::Arc;
use std::time::Duration;

use chat_backend::{
    ChangeEvent, ChatBackend, CreateSessionRequest, DocumentFeed, SendMessageRequest, SessionFilter,
    SubscriptionHandle,
};
use chat_core::{
    config::DEFAULT_ERROR_DISPLAY_MS, ChatHistory, ClientConfig, HistoryRecord, Message,
    QuickAction, UserIdentity,
};
use chat_state::{ChatEvent, SessionPhase};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

use crate::error::{Result, SessionError};
use crate::listener;
use crate::scroll::ScrollMetrics;
use crate::storage::PersistedState;
use crate::store::SessionStore;
use crate::structs::{
    ChatState, Key, MoreAction, RejectReason, SendOutcome, SessionHandle, EMPTY_INPUT_ERROR,
};

/// Options for a [`ChatSessionManager`]
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// User sent along with session creation requests
    pub user: Option<UserIdentity>,
    /// How long a transient error stays visible
    pub error_display: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            user: None,
            error_display: Duration::from_millis(DEFAULT_ERROR_DISPLAY_MS),
        }
    }
}

impl ManagerOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            user: config.user(),
            error_display: config.error_display_duration(),
        }
    }

    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }
}

struct ActiveListener {
    handle: SessionHandle,
    subscription: SubscriptionHandle,
    task: JoinHandle<()>,
}

pub(crate) struct Inner {
    backend: Arc<dyn ChatBackend>,
    feed: Arc<dyn DocumentFeed>,
    storage: Arc<dyn PersistedState>,
    pub(crate) store: RwLock<SessionStore>,
    listener: Mutex<Option<ActiveListener>>,
    /// Signalled whenever a background task changed the store
    pub(crate) updated: Notify,
    error_display: Duration,
}

/// Chat Session Manager - owns the store of one chat view
///
/// Cloning is cheap; clones share the same store and subscription.
#[derive(Clone)]
pub struct ChatSessionManager {
    inner: Arc<Inner>,
}

impl ChatSessionManager {
    /// Create a new ChatSessionManager
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        feed: Arc<dyn DocumentFeed>,
        storage: Arc<dyn PersistedState>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                feed,
                storage,
                store: RwLock::new(SessionStore::new(options.user)),
                listener: Mutex::new(None),
                updated: Notify::new(),
                error_display: options.error_display,
            }),
        }
    }

    /// Load the persisted chat history into the store.
    ///
    /// A persisted session id is reported but not resumed.
    pub async fn load(&self) -> Result<()> {
        let history = self.inner.storage.load_chat_history().await?;
        let previous = self.inner.storage.load_session_id().await?;

        tracing::info!(
            entries = history.len(),
            previous_session = previous.as_deref().unwrap_or("none"),
            "Chat state loaded"
        );

        self.inner.store.write().await.state.chat_history = history;
        Ok(())
    }

    /// Get a copy of the current state
    pub async fn snapshot(&self) -> ChatState {
        self.inner.store.read().await.state.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.store.read().await.phase()
    }

    /// Handle of the mounted session, if any
    pub async fn current_handle(&self) -> Option<SessionHandle> {
        self.inner.store.read().await.current_handle()
    }

    pub async fn chat_user(&self) -> Option<UserIdentity> {
        self.inner.store.read().await.user.clone()
    }

    pub async fn set_chat_user(&self, user: Option<UserIdentity>) {
        self.inner.store.write().await.user = user;
    }

    pub async fn set_input(&self, input: impl Into<String>) {
        self.inner.store.write().await.state.input = input.into();
    }

    /// Send the current input.
    ///
    /// Without a mounted session this starts a conversation; otherwise the
    /// message goes to the mounted session. An empty input shows a transient
    /// error instead.
    pub async fn submit(&self) -> Result<SendOutcome> {
        enum Route {
            Create(UserIdentity),
            Dispatch(SessionHandle),
        }

        let (route, message, history, epoch) = {
            let mut store = self.inner.store.write().await;
            if store.state.input.trim().is_empty() {
                let generation = store.set_error(EMPTY_INPUT_ERROR);
                drop(store);
                self.schedule_error_clear(generation);
                return Ok(SendOutcome::Rejected(RejectReason::EmptyInput));
            }

            if let Some(reason) = Self::guard(&store) {
                return Ok(SendOutcome::Rejected(reason));
            }

            let route = match store.current_handle() {
                Some(handle) => Route::Dispatch(handle),
                None => Route::Create(store.user.clone().ok_or(SessionError::MissingUser)?),
            };
            let message = Message::human(store.state.input.clone());
            let streaming = matches!(route, Route::Dispatch(_));
            let history = store.begin_exchange(message.clone(), streaming);
            (route, message, history, store.epoch())
        };
        self.persist_history(history).await;

        match route {
            Route::Create(user) => self
                .create_session(user, message, epoch)
                .await
                .map(SendOutcome::Created),
            Route::Dispatch(handle) => {
                self.send_to(&handle, message).await?;
                Ok(SendOutcome::Sent(handle))
            }
        }
    }

    /// React to a key press in the input box.
    ///
    /// Enter submits unless the assistant is typing, a reply is streaming, or
    /// the input is empty; those cases are ignored without an error.
    pub async fn handle_key(&self, key: Key) -> Result<SendOutcome> {
        if key != Key::Enter {
            return Ok(SendOutcome::Rejected(RejectReason::NotSubmitKey));
        }
        {
            let store = self.inner.store.read().await;
            if store.state.typing || store.state.streaming {
                return Ok(SendOutcome::Rejected(RejectReason::Busy));
            }
            if store.state.input.trim().is_empty() {
                return Ok(SendOutcome::Rejected(RejectReason::EmptyInput));
            }
        }
        self.submit().await
    }

    /// Create a remote session seeded with `message` and mount it.
    ///
    /// Any mounted session and its subscription are released first.
    pub async fn start_conversation(
        &self,
        user: UserIdentity,
        message: Message,
    ) -> Result<SessionHandle> {
        let (history, epoch) = {
            let mut store = self.inner.store.write().await;
            if let Some(reason) = Self::guard(&store) {
                return Err(SessionError::Rejected(reason));
            }
            let history = store.begin_exchange(message.clone(), false);
            (history, store.epoch())
        };
        self.persist_history(history).await;
        self.create_session(user, message, epoch).await
    }

    /// Send a message to the session named by `handle`.
    pub async fn dispatch(&self, handle: &SessionHandle, message: Message) -> Result<()> {
        let history = {
            let mut store = self.inner.store.write().await;
            if !store.is_mounted(handle) {
                return Err(SessionError::StaleSession(handle.session_id().to_string()));
            }
            if let Some(reason) = Self::guard(&store) {
                return Err(SessionError::Rejected(reason));
            }
            store.begin_exchange(message.clone(), true)
        };
        self.persist_history(history).await;
        self.send_to(handle, message).await
    }

    /// Send a predefined reply to the mounted session.
    pub async fn quick_reply(&self, action: QuickAction) -> Result<SendOutcome> {
        let (handle, message) = {
            let mut store = self.inner.store.write().await;
            if let Some(reason) = Self::guard(&store) {
                return Ok(SendOutcome::Rejected(reason));
            }
            let handle = store.current_handle().ok_or(SessionError::NoActiveSession)?;
            let message = Message::quick_reply(action.as_str());
            store.begin_exchange(message.clone(), true);
            (handle, message)
        };

        tracing::debug!(session_id = handle.session_id(), action = %action, "Quick reply");
        self.send_to(&handle, message).await?;
        Ok(SendOutcome::Sent(handle))
    }

    /// Apply a change delivered for `handle`. Returns `true` if a message was appended.
    pub async fn apply_change(&self, handle: &SessionHandle, change: &ChangeEvent) -> bool {
        let applied = {
            let mut store = self.inner.store.write().await;
            listener::apply_change(&mut store, handle, change)
        };
        if applied {
            self.inner.updated.notify_waiters();
        }
        applied
    }

    /// Tear the view down: release the subscription, forget the persisted
    /// session id and reset the store. Calling it again does nothing.
    pub async fn end(&self) -> Result<()> {
        let ended = self.inner.store.write().await.end();
        if !ended {
            return Ok(());
        }

        self.release_listener().await;
        if let Err(e) = self.inner.storage.clear_session_id().await {
            tracing::warn!(error = %e, "Failed to clear persisted session id");
        }
        self.inner.updated.notify_waiters();

        tracing::info!("Chat view torn down");
        Ok(())
    }

    /// Drop the current conversation and start over.
    pub async fn new_conversation(&self) -> Result<()> {
        self.inner.store.write().await.reset();
        self.release_listener().await;
        self.inner.storage.clear_session_id().await?;
        self.inner.updated.notify_waiters();

        tracing::info!("New conversation");
        Ok(())
    }

    /// Record a scroll event. Returns `true` if `fully_scrolled` changed.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> bool {
        let scrolled = metrics.is_fully_scrolled();
        let mut store = self.inner.store.write().await;
        if store.state.fully_scrolled == scrolled {
            return false;
        }
        store.state.fully_scrolled = scrolled;
        true
    }

    /// The user jumped to the newest message.
    pub async fn scroll_to_bottom(&self) {
        self.inner.store.write().await.state.streaming_done = false;
    }

    pub async fn set_more(&self, action: MoreAction) {
        let mut store = self.inner.store.write().await;
        store.state.more = match action {
            MoreAction::Toggle => !store.state.more,
            MoreAction::Shutdown => false,
        };
    }

    pub async fn open_info_chat(&self) {
        let mut store = self.inner.store.write().await;
        store.state.info_chat_opened = true;
        store.state.more = false;
    }

    pub async fn close_info_chat(&self) {
        self.inner.store.write().await.state.info_chat_opened = false;
    }

    pub async fn close_settings_chat(&self) {
        self.inner.store.write().await.state.settings_chat_opened = false;
    }

    pub async fn set_chat_started(&self, started: bool) {
        self.inner.store.write().await.state.started = started;
    }

    /// Show an error that clears itself after the configured display time.
    pub async fn show_transient_error(&self, error: impl Into<String>) {
        let generation = self.inner.store.write().await.set_error(error);
        self.schedule_error_clear(generation);
    }

    pub async fn clear_error(&self) {
        self.inner.store.write().await.clear_error();
    }

    /// List a user's past conversations from the backend.
    pub async fn fetch_chat_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>> {
        self.inner.store.write().await.state.loading = true;

        let result = self.inner.backend.fetch_chat_history(user_id).await;

        let mut store = self.inner.store.write().await;
        store.state.loading = false;
        match result {
            Ok(records) => {
                tracing::debug!(user_id, count = records.len(), "Chat history fetched");
                store.state.remote_history = records.clone();
                store.state.history_loaded = true;
                Ok(records)
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to fetch chat history");
                store.set_error(e.to_string());
                Err(e.into())
            }
        }
    }

    pub async fn chat_history(&self) -> ChatHistory {
        self.inner.store.read().await.state.chat_history.clone()
    }

    /// Delete the local history of sent messages.
    pub async fn clear_chat_history(&self) -> Result<()> {
        self.inner.storage.clear_chat_history().await?;
        self.inner.store.write().await.state.chat_history.clear();
        Ok(())
    }

    /// Whether a live subscription is held for the mounted session.
    pub async fn subscription_active(&self) -> bool {
        let store = self.inner.store.read().await;
        let listener = self.inner.listener.lock().await;
        listener.as_ref().is_some_and(|active| {
            !active.subscription.is_released() && store.is_mounted(&active.handle)
        })
    }

    /// Wait until no exchange is outstanding. Returns `false` on timeout.
    pub async fn wait_for_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.inner.updated.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if !self.inner.store.read().await.is_busy() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    fn guard(store: &SessionStore) -> Option<RejectReason> {
        if store.phase().is_terminal() {
            Some(RejectReason::Ended)
        } else if store.is_busy() {
            Some(RejectReason::Busy)
        } else {
            None
        }
    }

    async fn create_session(
        &self,
        user: UserIdentity,
        message: Message,
        epoch: u64,
    ) -> Result<SessionHandle> {
        self.release_listener().await;

        tracing::info!(user_id = %user.id, "Creating chat session");
        let result = self
            .inner
            .backend
            .create_session(CreateSessionRequest::chat(user, message))
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create chat session");
                {
                    let mut store = self.inner.store.write().await;
                    if store.epoch() == epoch {
                        store.fail_exchange(
                            ChatEvent::SessionCreationFailed {
                                error: e.to_string(),
                            },
                            e.to_string(),
                        );
                    }
                }
                self.inner.updated.notify_waiters();
                return Err(e.into());
            }
        };

        let created = response.is_created();
        let session_id = response.data.id.clone();
        let handle = {
            let mut store = self.inner.store.write().await;
            if store.epoch() != epoch {
                tracing::debug!(session_id = %session_id, "Conversation reset while creating session");
                return Err(SessionError::StaleSession(session_id));
            }
            store.adopt_session(response.data, created)
        };

        tracing::info!(session_id = %session_id, status = %response.status, "Chat session mounted");
        if let Err(e) = self.inner.storage.save_session_id(&session_id).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to persist session id");
        }

        self.subscribe(&handle).await;
        Ok(handle)
    }

    async fn send_to(&self, handle: &SessionHandle, message: Message) -> Result<()> {
        let request = SendMessageRequest {
            message,
            id: handle.session_id().to_string(),
        };

        if let Err(e) = self.inner.backend.send_message(request).await {
            tracing::warn!(session_id = handle.session_id(), error = %e, "Failed to send message");
            {
                let mut store = self.inner.store.write().await;
                if store.is_mounted(handle) {
                    store.fail_exchange(
                        ChatEvent::DispatchFailed {
                            error: e.to_string(),
                        },
                        e.to_string(),
                    );
                }
            }
            self.inner.updated.notify_waiters();
            return Err(e.into());
        }
        Ok(())
    }

    /// Open the single live subscription for `handle`.
    /// Start the live update listener for `handle`.
    ///
    /// A failure is surfaced into `error`; the session stays mounted.
    async fn subscribe(&self, handle: &SessionHandle) {
        let filter = SessionFilter::by_id(handle.session_id());
        let subscription = match self.inner.feed.subscribe(filter).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(session_id = handle.session_id(), error = %e, "Failed to subscribe");
                {
                    let mut store = self.inner.store.write().await;
                    if store.is_mounted(handle) {
                        store.fail_exchange(
                            ChatEvent::DispatchFailed {
                                error: e.to_string(),
                            },
                            e.to_string(),
                        );
                    }
                }
                self.inner.updated.notify_waiters();
                return;
            }
        };

        let subscription_handle = subscription.handle();
        let task = tokio::spawn(listener::run(
            Arc::downgrade(&self.inner),
            handle.clone(),
            subscription,
        ));

        let previous = self.inner.listener.lock().await.replace(ActiveListener {
            handle: handle.clone(),
            subscription: subscription_handle,
            task,
        });
        if let Some(previous) = previous {
            Self::release(previous);
        }

        // The view may have been torn down while subscribing.
        if !self.inner.store.read().await.is_mounted(handle) {
            self.release_listener().await;
        }
    }

    async fn release_listener(&self) {
        let active = self.inner.listener.lock().await.take();
        if let Some(active) = active {
            Self::release(active);
        }
    }

    fn release(active: ActiveListener) {
        if active.subscription.unsubscribe() {
            tracing::debug!(
                session_id = active.handle.session_id(),
                subscription_id = %active.subscription.id(),
                "Listener released"
            );
        }
        active.task.abort();
    }

    async fn persist_history(&self, history: Option<ChatHistory>) {
        let Some(history) = history else {
            return;
        };
        if let Err(e) = self.inner.storage.save_chat_history(&history).await {
            tracing::warn!(error = %e, "Failed to persist chat history");
        }
    }

    fn schedule_error_clear(&self, generation: u64) {
        let inner = Arc::downgrade(&self.inner);
        let delay = self.inner.error_display;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                let cleared = inner.store.write().await.clear_error_if(generation);
                if cleared {
                    inner.updated.notify_waiters();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStateStorage;
    use chat_backend::MemoryChatBackend;

    fn manager() -> (ChatSessionManager, MemoryChatBackend) {
        let backend = MemoryChatBackend::new();
        let manager = ChatSessionManager::new(
            Arc::new(backend.clone()),
            Arc::new(backend.store().clone()),
            Arc::new(MemoryStateStorage::new()),
            ManagerOptions::default().with_user(UserIdentity::new("u1")),
        );
        (manager, backend)
    }

    #[tokio::test]
    async fn test_submit_without_user_fails() {
        let backend = MemoryChatBackend::new();
        let manager = ChatSessionManager::new(
            Arc::new(backend.clone()),
            Arc::new(backend.store().clone()),
            Arc::new(MemoryStateStorage::new()),
            ManagerOptions::default(),
        );
        manager.set_input("Hello").await;

        assert!(matches!(
            manager.submit().await,
            Err(SessionError::MissingUser)
        ));
        assert!(manager.snapshot().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_handle_key_ignores_other_keys() {
        let (manager, _backend) = manager();
        manager.set_input("Hello").await;

        let outcome = manager.handle_key(Key::Other).await.unwrap();
        assert_eq!(outcome, SendOutcome::Rejected(RejectReason::NotSubmitKey));
        assert_eq!(manager.snapshot().await.input, "Hello");
    }

    #[tokio::test]
    async fn test_enter_on_empty_input_is_silent() {
        let (manager, _backend) = manager();

        let outcome = manager.handle_key(Key::Enter).await.unwrap();
        assert_eq!(outcome, SendOutcome::Rejected(RejectReason::EmptyInput));
        assert!(manager.snapshot().await.error.is_none());
    }

    #[tokio::test]
    async fn test_enter_on_whitespace_input_is_silent() {
        let (manager, backend) = manager();
        manager.set_input("   ").await;

        let outcome = manager.handle_key(Key::Enter).await.unwrap();
        assert_eq!(outcome, SendOutcome::Rejected(RejectReason::EmptyInput));

        let state = manager.snapshot().await;
        assert!(state.error.is_none());
        assert!(state.messages.is_empty());
        assert!(backend.created_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_quick_reply_needs_a_session() {
        let (manager, _backend) = manager();
        assert!(matches!(
            manager.quick_reply(QuickAction::RecommendBooks).await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_panels() {
        let (manager, _backend) = manager();

        manager.set_more(MoreAction::Toggle).await;
        assert!(manager.snapshot().await.more);

        manager.open_info_chat().await;
        let state = manager.snapshot().await;
        assert!(state.info_chat_opened);
        assert!(!state.more);

        manager.set_more(MoreAction::Toggle).await;
        manager.set_more(MoreAction::Shutdown).await;
        manager.close_info_chat().await;
        let state = manager.snapshot().await;
        assert!(!state.more);
        assert!(!state.info_chat_opened);
    }

    #[tokio::test]
    async fn test_end_twice_is_noop() {
        let (manager, _backend) = manager();
        manager.end().await.unwrap();
        manager.end().await.unwrap();
        assert_eq!(manager.phase().await, SessionPhase::Ended);

        manager.set_input("Hello").await;
        assert_eq!(
            manager.submit().await.unwrap(),
            SendOutcome::Rejected(RejectReason::Ended)
        );
    }
}
