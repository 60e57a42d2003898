//! URL scraping: find links in the message, fetch them concurrently, and
//! reduce each page to readable text.

use async_trait::async_trait;
use futures::future::join_all;
use hydra_core::persona::ContextFragment;
use hydra_security::audit::{AuditEvent, AuditLogger};
use regex_lite::Regex;
use scraper::Html;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

static URL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`]+"#).ok());

/// Elements whose text is never page content.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "nav", "header", "footer", "aside", "svg",
    "iframe", "form",
];

/// Why a page could not be read.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Fetches the raw body of a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// Bytes read from one page before the rest is dropped.
const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hydra/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_bytes: MAX_PAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status(status.as_u16()));
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if body.len() >= self.max_bytes {
                debug!(url = %url, max_bytes = self.max_bytes, "Page body truncated");
                body.truncate(self.max_bytes);
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Distinct `http(s)://` URLs in `text`, in order of appearance, at most `max`.
///
/// Trailing sentence punctuation is not part of the URL.
pub fn extract_urls(text: &str, max: usize) -> Vec<String> {
    let Some(pattern) = URL_PATTERN.as_ref() else {
        return Vec::new();
    };

    let mut urls: Vec<String> = Vec::new();
    for found in pattern.find_iter(text) {
        let url = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}']);
        if urls.len() >= max {
            break;
        }
        if url.len() <= "https://".len() || urls.iter().any(|u| u == url) {
            continue;
        }
        urls.push(url.to_string());
    }
    urls
}

/// Visible text of an HTML document: non-content elements dropped,
/// whitespace collapsed, truncated to `max_chars` characters.
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);

    let mut words: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    let collapsed = words.join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => collapsed[..cut].to_string(),
        None => collapsed,
    }
}

/// Placeholder content for a URL that could not be read.
pub fn unreachable_placeholder(url: &str) -> String {
    format!("[Could not retrieve content from {url}]")
}

/// Scrapes every URL in a message concurrently.
pub struct WebScraper {
    fetcher: Arc<dyn PageFetcher>,
    max_urls: usize,
    max_chars: usize,
    timeout: Duration,
}

impl WebScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            max_urls: 5,
            max_chars: 8000,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = max_urls;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One web fragment per URL found in `message`, in order of appearance.
    ///
    /// A URL that fails or times out yields a placeholder fragment and a
    /// `WEB_SCRAPE_FAILURE` entry; the others are unaffected.
    pub async fn scrape(&self, message: &str, audit: &AuditLogger) -> Vec<ContextFragment> {
        let urls = extract_urls(message, self.max_urls);
        if urls.is_empty() {
            return Vec::new();
        }
        debug!(count = urls.len(), "Scraping URLs from message");

        let outcomes = join_all(urls.iter().map(|url| self.fetch_one(url))).await;

        let mut fragments = Vec::with_capacity(urls.len());
        for (url, outcome) in urls.into_iter().zip(outcomes) {
            match outcome {
                Ok(text) => fragments.push(ContextFragment::web(url, text)),
                Err(e) => {
                    warn!(url = %url, error = %e, "Web scrape failed");
                    audit
                        .record(
                            AuditEvent::WebScrapeFailure,
                            json!({ "url": url, "error": e.to_string() }),
                        )
                        .await;
                    let placeholder = unreachable_placeholder(&url);
                    fragments.push(ContextFragment::web(url, placeholder));
                }
            }
        }
        fragments
    }

    async fn fetch_one(&self, url: &str) -> Result<String, ScrapeError> {
        let html = tokio::time::timeout(self.timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| ScrapeError::Timeout(self.timeout.as_secs()))??;
        Ok(html_to_text(&html, self.max_chars))
    }
}
