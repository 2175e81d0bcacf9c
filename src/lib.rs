//! MCP Auth Gateway Library
//!
//! Stateless, multi-tenant JWT introspection and authorization gateway for
//! MCP tool servers.
//!
//! # How a request is authorized
//!
//! - Tenant/client claims are **peeked** from the unverified token payload,
//!   only to pick which introspection authority to call.
//! - The token is verified by the resolved remote authority; no signing
//!   secrets are shared and no signature is checked locally.
//! - The result is validated against the per-tenant client directory:
//!   pinned issuer, expected audience, and the unconditional fail-closed
//!   registration gate.
//! - The resolved identity lives in a request-scoped context that is torn
//!   down on every exit path.
//!
//! Nothing is cached between requests: every request re-introspects and
//! re-validates, so revocation at the authority is visible immediately.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod introspection;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
