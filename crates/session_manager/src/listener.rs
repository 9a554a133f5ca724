//! Live update listener: applies remote session changes to the store

use std::sync::Weak;

use chat_backend::{ChangeEvent, ChangeKind, Subscription};
use chat_state::ChatEvent;

use crate::manager::Inner;
use crate::store::SessionStore;
use crate::structs::SessionHandle;

/// Apply one change to the store. Returns `true` if a message was appended.
///
/// Only `modified` changes for the mounted session count, and only when the
/// last message of the remote sequence is an assistant message not applied yet.
pub(crate) fn apply_change(
    store: &mut SessionStore,
    handle: &SessionHandle,
    change: &ChangeEvent,
) -> bool {
    if !store.is_mounted(handle) {
        tracing::debug!(
            session_id = handle.session_id(),
            epoch = handle.epoch(),
            "Discarding change for unmounted session"
        );
        return false;
    }
    if change.kind != ChangeKind::Modified || change.doc.id != handle.session_id() {
        return false;
    }

    let messages = &change.doc.messages;
    let Some(index) = messages.len().checked_sub(1) else {
        return false;
    };
    let last = &messages[index];
    if !last.is_assistant() {
        return false;
    }

    let applied = store.receive_assistant(index, last.clone());
    if !applied {
        tracing::debug!(session_id = handle.session_id(), index, "Duplicate change ignored");
    }
    applied
}

/// Drive a subscription until it ends, is released, or the manager is dropped.
pub(crate) async fn run(inner: Weak<Inner>, handle: SessionHandle, mut subscription: Subscription) {
    tracing::debug!(session_id = handle.session_id(), "Listener started");

    while let Some(item) = subscription.next().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };

        match item {
            Ok(change) => {
                let applied = {
                    let mut store = inner.store.write().await;
                    apply_change(&mut store, &handle, &change)
                };
                if applied {
                    tracing::info!(session_id = handle.session_id(), "Assistant message received");
                    inner.updated.notify_waiters();
                }
            }
            Err(e) => {
                tracing::warn!(session_id = handle.session_id(), error = %e, "Session feed failed");
                {
                    let mut store = inner.store.write().await;
                    if store.is_mounted(&handle) {
                        store.fail_exchange(
                            ChatEvent::DispatchFailed {
                                error: e.to_string(),
                            },
                            e.to_string(),
                        );
                    }
                }
                inner.updated.notify_waiters();
                break;
            }
        }
    }

    tracing::debug!(session_id = handle.session_id(), "Listener stopped");
}
