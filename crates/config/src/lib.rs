//! Configuration loading, validation, and management for Hydra.
//!
//! Loads configuration from `~/.hydra/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.hydra/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persona used when a request names none
    #[serde(default = "default_persona")]
    pub default_persona: String,

    /// Temperature for the fan-out completions
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per provider response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Provider-specific configurations, keyed by provider name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Fan-out dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Synthesizer chain settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Context gathering settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Persistence backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Bearer-token verification
    #[serde(default)]
    pub auth: AuthConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_persona() -> String {
    "Janus".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// The wire family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `/chat/completions` with Bearer auth (OpenAI, Grok, DeepSeek, ...)
    OpenaiCompat,
    /// Anthropic Messages API
    Anthropic,
    /// Google Gemini `generateContent`
    Gemini,
}

/// A provider the engine knows how to reach without extra configuration.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownProvider {
    pub name: &'static str,
    pub kind: ProviderKind,
    /// Environment variables checked for the API key, in order
    pub env_keys: &'static [&'static str],
    pub base_url: &'static str,
    pub model: &'static str,
}

pub const WELL_KNOWN_PROVIDERS: &[WellKnownProvider] = &[
    WellKnownProvider {
        name: "openai",
        kind: ProviderKind::OpenaiCompat,
        env_keys: &["OPENAI_API_KEY"],
        base_url: "https://api.openai.com/v1",
        model: "gpt-4-turbo",
    },
    WellKnownProvider {
        name: "anthropic",
        kind: ProviderKind::Anthropic,
        env_keys: &["CLAUDE_API_KEY", "ANTHROPIC_API_KEY"],
        base_url: "https://api.anthropic.com",
        model: "claude-3-5-sonnet-latest",
    },
    WellKnownProvider {
        name: "gemini",
        kind: ProviderKind::Gemini,
        env_keys: &["GEMINI_API_KEY"],
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        model: "gemini-1.5-flash",
    },
    WellKnownProvider {
        name: "grok",
        kind: ProviderKind::OpenaiCompat,
        env_keys: &["GROK_API_KEY"],
        base_url: "https://api.x.ai/v1",
        model: "grok-2-latest",
    },
    WellKnownProvider {
        name: "deepseek",
        kind: ProviderKind::OpenaiCompat,
        env_keys: &["DEEPSEEK_API_KEY"],
        base_url: "https://api.deepseek.com/v1",
        model: "deepseek-chat",
    },
];

/// Look up a well-known provider by name.
pub fn well_known(name: &str) -> Option<&'static WellKnownProvider> {
    WELL_KNOWN_PROVIDERS.iter().find(|p| p.name == name)
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Wire family; inferred from the provider name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProviderKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    /// The configured kind, or the well-known kind for `name`, or OpenAI-compatible.
    pub fn resolved_kind(&self, name: &str) -> ProviderKind {
        self.kind
            .or_else(|| well_known(name).map(|w| w.kind))
            .unwrap_or(ProviderKind::OpenaiCompat)
    }

    /// Whether this provider can be used: enabled with a non-empty key.
    pub fn is_available(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-provider completion timeout
    #[serde(default = "default_dispatch_timeout")]
    pub timeout_secs: u64,
}

fn default_dispatch_timeout() -> u64 {
    60
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_dispatch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Synthesizer providers, tried in order
    #[serde(default = "default_synthesis_priority")]
    pub priority: Vec<String>,

    /// Per-attempt timeout
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_synthesis_temperature")]
    pub temperature: f32,
}

fn default_synthesis_priority() -> Vec<String> {
    vec![
        "openai".into(),
        "anthropic".into(),
        "gemini".into(),
        "grok".into(),
    ]
}
fn default_synthesis_timeout() -> u64 {
    90
}
fn default_synthesis_temperature() -> f32 {
    0.6
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            priority: default_synthesis_priority(),
            timeout_secs: default_synthesis_timeout(),
            temperature: default_synthesis_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// How many past turns go into the prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Top-M knowledge matches
    #[serde(default = "default_knowledge_limit")]
    pub knowledge_limit: usize,

    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// URLs scraped per message at most
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// Character cap per scraped page
    #[serde(default = "default_scrape_max_chars")]
    pub scrape_max_chars: usize,

    /// Provider used to embed messages and knowledge chunks
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_timeout")]
    pub embedding_timeout_secs: u64,
}

fn default_history_limit() -> usize {
    10
}
fn default_knowledge_limit() -> usize {
    5
}
fn default_min_similarity() -> f32 {
    0.2
}
fn default_max_urls() -> usize {
    5
}
fn default_scrape_timeout() -> u64 {
    10
}
fn default_scrape_max_chars() -> usize {
    8000
}
fn default_embedding_provider() -> String {
    "openai".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_timeout() -> u64 {
    15
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            knowledge_limit: default_knowledge_limit(),
            min_similarity: default_min_similarity(),
            max_urls: default_max_urls(),
            scrape_timeout_secs: default_scrape_timeout(),
            scrape_max_chars: default_scrape_max_chars(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            embedding_timeout_secs: default_embedding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    format!(
        "sqlite://{}",
        AppConfig::config_dir().join("hydra.db").display()
    )
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Tokens are looked up in `[auth.tokens]`
    #[default]
    Static,
    /// Tokens are checked against a remote `/auth/v1/user` endpoint
    Remote,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    /// Identity service base URL (remote mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Public API key sent alongside the bearer token (remote mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,

    /// token → user id (static mode)
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("tokens", &format_args!("[{} REDACTED]", self.tokens.len()))
            .field("url", &self.url)
            .field("anon_key", &redact(&self.anon_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Allowed CORS origins. Empty = any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
            allowed_origins: vec![],
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.hydra/config.toml),
    /// or from `HYDRA_CONFIG` when set.
    ///
    /// Environment variables then override API keys, the database URL
    /// and the auth endpoint (see [`AppConfig::apply_env`]).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("HYDRA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and re-validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// A key found in the environment fills in a provider's `api_key` when
    /// the file leaves it empty, creating the provider entry if needed.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for wk in WELL_KNOWN_PROVIDERS {
            let Some(key) = wk.env_keys.iter().find_map(|k| non_empty(*k)) else {
                continue;
            };
            let entry = self.providers.entry(wk.name.to_string()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = Some(key);
            }
        }

        if let Some(url) = non_empty("HYDRA_DATABASE_URL") {
            self.store.database_url = url;
        }
        if let Some(url) = non_empty("HYDRA_AUTH_URL") {
            self.auth.url = Some(url);
        }
        if let Some(key) = non_empty("HYDRA_AUTH_ANON_KEY") {
            self.auth.anon_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".hydra")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, t) in [
            ("temperature", self.temperature),
            ("synthesis.temperature", self.synthesis.temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{label} must be between 0.0 and 2.0"
                )));
            }
        }

        if !(10..=20).contains(&self.context.history_limit) {
            return Err(ConfigError::ValidationError(
                "context.history_limit must be between 10 and 20".into(),
            ));
        }

        for (label, cap) in [
            ("context.knowledge_limit", self.context.knowledge_limit),
            ("context.max_urls", self.context.max_urls),
            ("context.scrape_max_chars", self.context.scrape_max_chars),
        ] {
            if cap == 0 {
                return Err(ConfigError::ValidationError(format!("{label} must be > 0")));
            }
        }

        for (label, secs) in [
            ("dispatch.timeout_secs", self.dispatch.timeout_secs),
            ("synthesis.timeout_secs", self.synthesis.timeout_secs),
            ("context.scrape_timeout_secs", self.context.scrape_timeout_secs),
            ("context.embedding_timeout_secs", self.context.embedding_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!("{label} must be > 0")));
            }
        }

        if self.synthesis.priority.is_empty() {
            return Err(ConfigError::ValidationError(
                "synthesis.priority must name at least one provider".into(),
            ));
        }

        Ok(())
    }

    /// Names of providers that are enabled and have a key, sorted.
    pub fn available_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|(_, p)| p.is_available())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_persona: default_persona(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            providers: BTreeMap::new(),
            dispatch: DispatchConfig::default(),
            synthesis: SynthesisConfig::default(),
            context: ContextConfig::default(),
            store: StoreConfig::default(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
