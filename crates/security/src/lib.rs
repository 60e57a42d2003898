//! Security module for Hydra: audit logging and caller identity.
//!
//! Provides:
//! - **Audit logging**: best-effort structured event logging with pluggable sinks
//! - **Identity**: bearer-token parsing and verification (static or remote)

pub mod audit;
pub mod identity;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditSink, TracingSink};
pub use identity::{
    RemoteIdentityVerifier, StaticTokenVerifier, parse_bearer, verifier_from_config,
};
