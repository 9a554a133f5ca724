//! In-process document store and chat backend.
//!
//! The store fans document changes out to subscribers the same way a
//! real-time database would: each subscriber gets its own bounded channel,
//! and disconnected or released subscribers are dropped on the next change.
//! A subscriber whose buffer is full is dropped too; its stream ends with a
//! `subscriber lagged` error once the buffered changes are drained.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{HistoryRecord, Message, Session};
use futures::{stream, StreamExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{ChatBackend, CreateSessionRequest, CreateSessionResponse, SendMessageRequest};
use crate::error::{BackendError, Result};
use crate::feed::{ChangeEvent, DocumentFeed, SessionFilter, Subscription};

const SUBSCRIBER_BUFFER: usize = 32;

struct Subscriber {
    filter: SessionFilter,
    tx: mpsc::Sender<Result<ChangeEvent>>,
    token: CancellationToken,
    lagged: Arc<AtomicBool>,
}

impl Subscriber {
    fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.tx.is_closed()
    }
}

/// Session documents with live change delivery.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<HashMap<String, Session>>>,
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.documents.read().await.get(session_id).cloned()
    }

    /// Insert or replace a document, notifying `added` or `modified`.
    pub async fn upsert(&self, doc: Session) {
        let previous = self
            .documents
            .write()
            .await
            .insert(doc.id.clone(), doc.clone());
        let event = match previous {
            Some(_) => ChangeEvent::modified(doc),
            None => ChangeEvent::added(doc),
        };
        self.broadcast(event).await;
    }

    /// Append a message to a document, notifying `modified`.
    pub async fn append_message(&self, session_id: &str, message: Message) -> Result<Session> {
        let doc = {
            let mut documents = self.documents.write().await;
            let doc = documents
                .get_mut(session_id)
                .ok_or_else(|| BackendError::SessionNotFound(session_id.to_string()))?;
            doc.add_message(message);
            doc.clone()
        };
        self.broadcast(ChangeEvent::modified(doc.clone())).await;
        Ok(doc)
    }

    /// Delete a document, notifying `removed`.
    pub async fn remove(&self, session_id: &str) -> Option<Session> {
        let removed = self.documents.write().await.remove(session_id);
        if let Some(doc) = &removed {
            self.broadcast(ChangeEvent::removed(doc.clone())).await;
        }
        removed
    }

    /// Deliver an event to matching subscribers without touching the documents.
    pub async fn broadcast(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.write().await;

        subscribers.retain(|subscriber| {
            if !subscriber.is_active() {
                return false;
            }
            if !subscriber.filter.matches(&event.doc) {
                return true;
            }
            match subscriber.tx.try_send(Ok(event.clone())) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        session_id = %subscriber.filter.session_id,
                        "Subscriber lagged behind, dropping it"
                    );
                    subscriber.lagged.store(true, Ordering::SeqCst);
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        tracing::debug!(
            session_id = %event.doc.id,
            kind = ?event.kind,
            active_subscribers = subscribers.len(),
            "Change broadcasted to subscribers"
        );
    }

    /// Number of live subscriptions watching a session.
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        self.subscribers
            .read()
            .await
            .iter()
            .filter(|s| s.is_active() && s.filter.session_id == session_id)
            .count()
    }
}

#[async_trait]
impl DocumentFeed for MemoryDocumentStore {
    async fn subscribe(&self, filter: SessionFilter) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let token = CancellationToken::new();
        let lagged = Arc::new(AtomicBool::new(false));

        // Like a snapshot listener, start with the matching document as `added`.
        if let Some(doc) = self.get(&filter.session_id).await {
            let _ = tx.try_send(Ok(ChangeEvent::added(doc)));
        }

        self.subscribers.write().await.push(Subscriber {
            filter: filter.clone(),
            tx,
            token: token.clone(),
            lagged: lagged.clone(),
        });

        tracing::debug!(session_id = %filter.session_id, "New subscriber added");

        let lag_error = stream::once(async move { lagged.load(Ordering::SeqCst) })
            .filter_map(|lagged| async move {
                lagged.then(|| {
                    Err::<ChangeEvent, _>(BackendError::Stream("subscriber lagged".to_string()))
                })
            });

        Ok(Subscription::new(
            filter,
            Box::pin(ReceiverStream::new(rx).chain(lag_error)),
            token,
        ))
    }
}

/// Backend that keeps sessions in a [`MemoryDocumentStore`].
///
/// Records every request and can be told to fail the next call, which makes
/// it the backend of choice for exercising the session manager.
#[derive(Clone, Default)]
pub struct MemoryChatBackend {
    store: MemoryDocumentStore,
    created: Arc<Mutex<Vec<CreateSessionRequest>>>,
    sent: Arc<Mutex<Vec<SendMessageRequest>>>,
    fail_create: Arc<Mutex<Option<String>>>,
    fail_send: Arc<Mutex<Option<String>>>,
    history: Arc<RwLock<Vec<HistoryRecord>>>,
}

impl MemoryChatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &MemoryDocumentStore {
        &self.store
    }

    pub async fn created_requests(&self) -> Vec<CreateSessionRequest> {
        self.created.lock().await.clone()
    }

    pub async fn sent_requests(&self) -> Vec<SendMessageRequest> {
        self.sent.lock().await.clone()
    }

    pub async fn fail_next_create(&self, error: impl Into<String>) {
        *self.fail_create.lock().await = Some(error.into());
    }

    pub async fn fail_next_send(&self, error: impl Into<String>) {
        *self.fail_send.lock().await = Some(error.into());
    }

    pub async fn set_history(&self, records: Vec<HistoryRecord>) {
        *self.history.write().await = records;
    }

    /// Simulate the assistant answering in a session.
    pub async fn reply(&self, session_id: &str, text: impl Into<String>) -> Result<Session> {
        self.store
            .append_message(session_id, Message::assistant(text))
            .await
    }
}

#[async_trait]
impl ChatBackend for MemoryChatBackend {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<CreateSessionResponse> {
        self.created.lock().await.push(request.clone());
        if let Some(error) = self.fail_create.lock().await.take() {
            return Err(BackendError::Api(error));
        }

        let mut session = Session::new(Uuid::new_v4().to_string()).created_by(request.user);
        session.add_message(request.message);
        self.store.upsert(session.clone()).await;

        Ok(CreateSessionResponse::created(session))
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<()> {
        self.sent.lock().await.push(request.clone());
        if let Some(error) = self.fail_send.lock().await.take() {
            return Err(BackendError::Api(error));
        }

        self.store
            .append_message(&request.id, request.message)
            .await?;
        Ok(())
    }

    async fn fetch_chat_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect())
    }
}
