//! Message - Chat message types
//!
//! Defines who authored a message, how it was entered, and what it says.

use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The person using the chat.
    Human,
    /// The AI assistant.
    Assistant,
    /// Instructions injected by the backend; never displayed.
    System,
}

/// How the message was produced on the client.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Free text typed into the input box
    #[default]
    Text,
    /// A predefined reply option
    QuickReply,
}

/// Message body
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct MessagePayload {
    #[serde(default)]
    pub text: String,
}

/// A single chat message. Immutable once appended to a session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    #[serde(default)]
    pub payload: MessagePayload,
}

impl Message {
    fn new(role: Role, kind: MessageType, text: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            payload: MessagePayload { text: text.into() },
        }
    }

    /// Create a free-text message typed by the user
    pub fn human(text: impl Into<String>) -> Self {
        Self::new(Role::Human, MessageType::Text, text)
    }

    /// Create a quick-reply message; the option id is sent as the text
    pub fn quick_reply(option: impl Into<String>) -> Self {
        Self::new(Role::Human, MessageType::QuickReply, option)
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageType::Text, text)
    }

    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageType::Text, text)
    }

    pub fn text(&self) -> &str {
        &self.payload.text
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// System messages are kept in the transcript but hidden from display.
    pub fn is_visible(&self) -> bool {
        self.role != Role::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quick_reply_wire_format() {
        let message = Message::quick_reply("recommend_books");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "human",
                "type": "quick_reply",
                "payload": { "text": "recommend_books" }
            })
        );
    }

    #[test]
    fn test_parse_assistant_message_without_type() {
        let message: Message = serde_json::from_value(json!({
            "role": "assistant",
            "payload": { "text": "Hi there" }
        }))
        .unwrap();
        assert!(message.is_assistant());
        assert_eq!(message.kind, MessageType::Text);
        assert_eq!(message.text(), "Hi there");
    }

    #[test]
    fn test_system_messages_are_hidden() {
        assert!(!Message::system("prompt").is_visible());
        assert!(Message::human("hello").is_visible());
        assert!(Message::assistant("hello").is_visible());
    }
}
