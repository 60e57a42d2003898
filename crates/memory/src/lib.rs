//! Storage implementations for the Hydra Engine.
//!
//! Every store here implements the persistence traits from `hydra-core`
//! (personas, conversation log, knowledge) plus the audit sink from
//! `hydra-security`, so one value can back a whole pipeline.

pub mod chunker;
pub mod in_memory;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chunker::{TextChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use in_memory::InMemoryStore;
pub use vector::{cosine_similarity, top_matches};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
