use async_trait::async_trait;
use chat_core::{HistoryRecord, Message, Session, UserIdentity};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Status the creation endpoint reports for a brand new session.
pub const STATUS_CREATED: &str = "created";

/// Conversation type sent with every creation request.
pub const CHAT_SESSION_TYPE: &str = "chat";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionRequest {
    pub user: UserIdentity,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Message,
}

impl CreateSessionRequest {
    pub fn chat(user: UserIdentity, message: Message) -> Self {
        Self {
            user,
            kind: CHAT_SESSION_TYPE.to_string(),
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionResponse {
    pub status: String,
    pub data: Session,
}

impl CreateSessionResponse {
    pub fn created(data: Session) -> Self {
        Self {
            status: STATUS_CREATED.to_string(),
            data,
        }
    }

    pub fn is_created(&self) -> bool {
        self.status == STATUS_CREATED
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendMessageRequest {
    pub message: Message,
    /// Target session id
    pub id: String,
}

/// Endpoints the chat client talks to.
///
/// Implementations must not retry on their own; the caller decides.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Create a session seeded with the first message.
    async fn create_session(&self, request: CreateSessionRequest) -> Result<CreateSessionResponse>;

    /// Append a message to an existing session.
    async fn send_message(&self, request: SendMessageRequest) -> Result<()>;

    /// List past conversations of a user.
    async fn fetch_chat_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>> {
        let _ = user_id;
        Ok(vec![])
    }
}
