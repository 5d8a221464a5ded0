//! Conversation history exchanged between the chat surface, the query expander and the answer
//! generator.
//!
//! Messages serialize as `{"role": "user", "content": "..."}`.

use serde::{Deserialize, Serialize};

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Input from the human user.
    User,
    /// Answers produced by the assistant.
    #[serde(alias = "ai")]
    Assistant,
    /// Instructions for the assistant.
    System,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the turn.
    pub role: Role,
    /// Text content of the turn.
    pub content: String,
}

impl Message {
    /// Creates a message with an explicit role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Returns `true` for user turns.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
