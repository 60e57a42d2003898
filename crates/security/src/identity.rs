//! Bearer-token identity verification.
//!
//! Two verifiers:
//! - [`StaticTokenVerifier`] maps configured tokens to user ids
//! - [`RemoteIdentityVerifier`] asks a hosted auth service
//!   (`GET {url}/auth/v1/user`) who owns the token

use async_trait::async_trait;
use hydra_config::{AuthConfig, AuthMode};
use hydra_core::error::AuthError;
use hydra_core::identity::{IdentityVerifier, UserId};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredential)?.trim();
    let (scheme, token) = header.split_once(' ').ok_or(AuthError::MissingCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredential);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Tokens from configuration.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    fn name(&self) -> &str {
        "static"
    }

    async fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        self.tokens
            .get(token)
            .map(UserId::new)
            .ok_or_else(|| AuthError::Rejected("unknown token".into()))
    }
}

/// Remote identity service (GoTrue-style `/auth/v1/user`).
pub struct RemoteIdentityVerifier {
    base_url: String,
    anon_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Option<String>,
}

impl RemoteIdentityVerifier {
    pub fn new(base_url: impl Into<String>, anon_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key,
            client,
        }
    }
}

#[async_trait]
impl IdentityVerifier for RemoteIdentityVerifier {
    fn name(&self) -> &str {
        "remote"
    }

    async fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"));
        if let Some(key) = &self.anon_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AuthError::Rejected(format!("identity service returned {status}")));
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("identity service returned {status}")));
        }

        let user: RemoteUser = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(format!("unreadable user payload: {e}")))?;

        let id = user
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::Rejected("identity service returned no user id".into()))?;

        debug!(user_id = %id, "Verified bearer token");
        Ok(UserId::new(id))
    }
}

/// Build the verifier selected by `[auth]`.
pub fn verifier_from_config(config: &AuthConfig) -> Result<Arc<dyn IdentityVerifier>, AuthError> {
    match config.mode {
        AuthMode::Static => Ok(Arc::new(StaticTokenVerifier::new(config.tokens.clone()))),
        AuthMode::Remote => {
            let url = config.url.clone().ok_or_else(|| {
                AuthError::Unavailable("auth.mode = \"remote\" requires auth.url".into())
            })?;
            Ok(Arc::new(RemoteIdentityVerifier::new(url, config.anon_key.clone())))
        }
    }
}
