//! The completion trait and its GigaChat implementation.

/// Reqwest-based GigaChat API client
pub mod gigachat;

pub use gigachat::GigaChatClient;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the external completion call.
///
/// The session layer treats every variant as one opaque failure; the split
/// only feeds the logs.
#[derive(Debug, Error)]
pub enum LlmError {
    /// OAuth exchange rejected or no usable token returned.
    #[error("Auth error: {0}")]
    Auth(String),
    /// Non-success HTTP status from the chat API.
    #[error("API error: {0}")]
    Api(String),
    /// Transport-level failure (connect, TLS, timeout).
    #[error("Network error: {0}")]
    Network(String),
    /// Response body did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(String),
}

/// Role tag of one transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction message seeded at session start.
    System,
    /// Message originating from the human.
    User,
    /// Model reply.
    Assistant,
}

/// One role-tagged text unit of the in-memory transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The external completion call, consumed as an opaque request/response
/// operation. `thread_id` correlates the conversation on the provider side.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send the transcript plus the new user message and return the reply
    /// text.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] when the call fails for any reason; callers
    /// do not distinguish the kinds.
    async fn complete(
        &self,
        thread_id: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::user("hi");
        let value = serde_json::to_value(&msg).expect("serializable");
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hi");

        let system = serde_json::to_value(ChatMessage::system("x")).expect("serializable");
        assert_eq!(system["role"], "system");
        let assistant = serde_json::to_value(ChatMessage::assistant("y")).expect("serializable");
        assert_eq!(assistant["role"], "assistant");
    }
}
