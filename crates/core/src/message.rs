//! Canonical chat message types.
//!
//! These are the provider-neutral values the prompt assembler produces and
//! every provider adapter translates into its own wire shape. The system
//! instruction travels separately on [`crate::provider::ProviderRequest`],
//! so only conversational roles appear here.

use serde::{Deserialize, Serialize};

use crate::persona::{ConversationTurn, Sender};

/// The role of a message in the canonical sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The persona (any earlier AI reply)
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for Message {
    fn from(turn: &ConversationTurn) -> Self {
        match turn.sender {
            Sender::User => Message::user(&turn.content),
            Sender::Ai => Message::assistant(&turn.content),
        }
    }
}
