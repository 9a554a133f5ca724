//! Live change feeds on session documents.
//!
//! A [`Subscription`] is a cancellable stream of typed [`ChangeEvent`]s.
//! Cancelling goes through a [`SubscriptionHandle`]; only the first
//! `unsubscribe` call releases the feed, later calls are no-ops.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::Session;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;

/// Collection holding live session documents.
pub const SESSIONS_COLLECTION: &str = "chatSessions";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single document change, as delivered by the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub doc: Session,
}

impl ChangeEvent {
    pub fn added(doc: Session) -> Self {
        Self {
            kind: ChangeKind::Added,
            doc,
        }
    }

    pub fn modified(doc: Session) -> Self {
        Self {
            kind: ChangeKind::Modified,
            doc,
        }
    }

    pub fn removed(doc: Session) -> Self {
        Self {
            kind: ChangeKind::Removed,
            doc,
        }
    }
}

/// Query selecting the documents a subscription watches (`id == session_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionFilter {
    pub session_id: String,
}

impl SessionFilter {
    pub fn by_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn matches(&self, doc: &Session) -> bool {
        doc.id == self.session_id
    }
}

pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent>> + Send>>;

/// Releases a subscription. Cheap to clone; every clone releases the same feed.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: Uuid,
    token: CancellationToken,
    released: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Release the feed. Returns `true` only for the call that released it.
    pub fn unsubscribe(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        tracing::debug!(subscription_id = %self.id, "Subscription released");
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Cancellable stream of change events for one filter.
pub struct Subscription {
    filter: SessionFilter,
    stream: ChangeStream,
    handle: SubscriptionHandle,
}

impl Subscription {
    /// Wrap a change stream. The feed should stop producing once `token` is cancelled.
    pub fn new(filter: SessionFilter, stream: ChangeStream, token: CancellationToken) -> Self {
        Self {
            filter,
            stream,
            handle: SubscriptionHandle {
                id: Uuid::new_v4(),
                token,
                released: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    pub fn filter(&self) -> &SessionFilter {
        &self.filter
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Next change, or `None` once the feed ended or was released.
    pub async fn next(&mut self) -> Option<Result<ChangeEvent>> {
        if self.handle.is_released() {
            return None;
        }
        let token = self.handle.token.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            item = self.stream.next() => item,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("filter", &self.filter)
            .field("handle", &self.handle)
            .finish()
    }
}

/// A real-time document source that can be subscribed to.
#[async_trait]
pub trait DocumentFeed: Send + Sync {
    async fn subscribe(&self, filter: SessionFilter) -> Result<Subscription>;
}
