//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: String,
    /// Turns in chronological order
    pub turns: Vec<Turn>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new, empty session
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a turn to the end of the session
    pub fn push(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
        self.updated_at = Utc::now();
    }

    /// Remove all turns. The session itself stays valid.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.updated_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// One message exchanged in a conversation.
///
/// Serializes as `{"role": ..., "content": ...}`, which is also the input
/// item shape the completion endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Message role (user, assistant, or a caller-supplied value)
    pub role: String,
    /// Message content
    pub content: String,
}

impl Turn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}
