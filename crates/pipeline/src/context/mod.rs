//! Context gatherers.
//!
//! Each gatherer turns one collaborator into zero or more context values and
//! never fails the request: internal failures degrade to empty or
//! placeholder output plus an audit entry.

pub mod history;
pub mod knowledge;
pub mod scrape;

pub use history::fetch_history;
pub use knowledge::{KNOWLEDGE_UNAVAILABLE, KnowledgeRetriever};
pub use scrape::{HttpFetcher, PageFetcher, ScrapeError, WebScraper, extract_urls, html_to_text};
