//! chat_backend - Backend collaborators for the chat session client
//!
//! - `backend` - the session creation / message send / history endpoints
//! - `feed` - live change subscriptions on session documents
//! - `http` - reqwest implementation of both, with an SSE change feed
//! - `memory` - in-process document store and backend

pub mod backend;
pub mod error;
pub mod feed;
pub mod http;
pub mod memory;
mod sse;

pub use backend::{ChatBackend, CreateSessionRequest, CreateSessionResponse, SendMessageRequest};
pub use error::{BackendError, Result};
pub use feed::{
    ChangeEvent, ChangeKind, ChangeStream, DocumentFeed, SessionFilter, Subscription,
    SubscriptionHandle, SESSIONS_COLLECTION,
};
pub use http::HttpChatBackend;
pub use memory::{MemoryChatBackend, MemoryDocumentStore};
