//! The Hydra multi-provider synthesis pipeline.
//!
//! A chat request flows through five stages:
//!
//! 1. **Context gathering**: history, knowledge-base matches and scraped
//!    URLs, each degrading on failure instead of aborting
//! 2. **Prompt assembly**: persona profile plus context into one system
//!    instruction and an ordered message sequence
//! 3. **Fan-out**: the prompt goes to every configured provider at once
//! 4. **Synthesis**: surviving drafts are merged by the first synthesizer
//!    in the priority chain that answers
//! 5. **Persistence**: the user turn before dispatch, the AI turn on success
//!
//! Failures along the way are recorded through the audit logger.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod prompt;
pub mod synthesis;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{HttpFetcher, KnowledgeRetriever, PageFetcher, ScrapeError, WebScraper};
pub use dispatch::Dispatcher;
pub use error::{IngestError, PipelineError};
pub use ingest::{IngestReport, KnowledgeIngestor};
pub use pipeline::{ChatReply, ChatRequest, HydraPipeline, Stores};
pub use prompt::{AssembledPrompt, assemble};
pub use synthesis::Synthesizer;
