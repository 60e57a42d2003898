//! # Hydra Core
//!
//! Domain types, traits, and error definitions for the Hydra Engine
//! multi-provider synthesis pipeline. This crate has **no framework
//! dependencies**. It defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM providers, the persona store, the
//! conversation log, the vector store, the identity service) is a trait
//! here. Implementations live in their respective crates, so the pipeline
//! can be exercised end-to-end against in-memory stubs.

pub mod error;
pub mod identity;
pub mod message;
pub mod persona;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{AuthError, Error, ProviderError, Result, StoreError};
pub use identity::{IdentityVerifier, UserId};
pub use message::{Message, Role};
pub use persona::{
    CandidateResponse, ContextFragment, ConversationTurn, FragmentOrigin, Persona, Sender,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use store::{ConversationLog, KnowledgeChunk, KnowledgeMatch, KnowledgeStore, PersonaStore};
