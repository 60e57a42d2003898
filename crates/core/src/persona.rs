//! Persona, conversation and context domain types.
//!
//! Everything in here is request-scoped except [`Persona`], which is read
//! fresh from the persona store on every request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named character profile that shapes the voice of every reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Store-assigned identifier
    pub id: String,

    /// Display name (e.g., "Janus"); lookups match on this
    pub name: String,

    /// Short role description
    pub role: String,

    /// Descriptive attributes, free text
    #[serde(default)]
    pub key_attributes: String,

    /// Longer background summary
    #[serde(default)]
    pub dossier_summary: String,
}

impl Persona {
    /// Create a persona with a fresh identifier.
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            role: role.into(),
            key_attributes: String::new(),
            dossier_summary: String::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.key_attributes = attributes.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.dossier_summary = summary.into();
        self
    }
}

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "ai" => Some(Sender::Ai),
            _ => None,
        }
    }
}

/// One stored exchange between a user and a persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_id: String,
    pub persona_id: String,
    pub sender: Sender,
    pub content: String,

    /// Optional image reference attached to a user turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(
        user_id: impl Into<String>,
        persona_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(user_id, persona_id, Sender::User, content)
    }

    pub fn ai(
        user_id: impl Into<String>,
        persona_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(user_id, persona_id, Sender::Ai, content)
    }

    fn new(
        user_id: impl Into<String>,
        persona_id: impl Into<String>,
        sender: Sender,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            persona_id: persona_id.into(),
            sender,
            content: content.into(),
            image_url: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }
}

/// Where a context fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentOrigin {
    Web,
    KnowledgeBase,
}

/// A piece of gathered text destined for the system instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFragment {
    pub origin: FragmentOrigin,

    /// File name or URL, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub content: String,
}

impl ContextFragment {
    pub fn web(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: FragmentOrigin::Web,
            source: Some(url.into()),
            content: content.into(),
        }
    }

    pub fn knowledge(source: Option<String>, content: impl Into<String>) -> Self {
        Self {
            origin: FragmentOrigin::KnowledgeBase,
            source,
            content: content.into(),
        }
    }
}

/// One provider's draft answer, kept only until synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub provider: String,
    pub text: String,
}

impl CandidateResponse {
    pub fn new(provider: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            text: text.into(),
        }
    }
}
