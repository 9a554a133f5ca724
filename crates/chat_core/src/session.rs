//! Session documents as stored by the chat backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Identity of the user talking to the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: None,
            email: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A conversation thread. Messages are in display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            metadata: SessionMetadata::default(),
        }
    }

    pub fn created_by(mut self, user: UserIdentity) -> Self {
        self.metadata.created_by = Some(user);
        self.metadata.created_at = Some(Utc::now());
        self
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_parses_without_metadata() {
        let session: Session = serde_json::from_value(json!({
            "id": "abc",
            "messages": [
                { "role": "human", "type": "text", "payload": { "text": "Hello" } }
            ]
        }))
        .unwrap();
        assert_eq!(session.id, "abc");
        assert_eq!(session.messages.len(), 1);
        assert!(session.metadata.created_by.is_none());
    }

    #[test]
    fn test_user_identity_uses_camel_case() {
        let user = UserIdentity::new("u1").with_full_name("Ada Lovelace");
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value, json!({ "id": "u1", "fullName": "Ada Lovelace" }));
    }
}
