//! Identity: who is calling.
//!
//! The gateway resolves a bearer credential into a [`UserId`] through an
//! [`IdentityVerifier`]. Verifiers live in `hydra-security`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::AuthError;

/// An authenticated user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verifies a bearer token and returns the user it belongs to.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(&self, token: &str) -> std::result::Result<UserId, AuthError>;
}
