//! Session manager error types

use chat_backend::BackendError;
use chat_state::TransitionError;

use crate::structs::RejectReason;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No active session")]
    NoActiveSession,

    #[error("Session {0} is no longer mounted")]
    StaleSession(String),

    #[error("Message not sent: {0:?}")]
    Rejected(RejectReason),

    #[error("No user identity configured")]
    MissingUser,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
