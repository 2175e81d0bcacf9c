//! Remote token introspection — the verification call to the authority.
//!
//! The gateway never verifies JWT signatures locally; it sends the raw token
//! to the introspection endpoint of the authority that issued it and trusts
//! that authority's answer for validity. Which endpoint to call is resolved
//! per client via the directory, falling back to a statically configured
//! default for tokens that carry no tenant/client claims.
//!
//! # Fail-closed boundary
//!
//! [`TokenIntrospector::introspect`] never returns an error. Every failure
//! mode — network error, timeout, non-2xx status, unparseable body,
//! `active:false` — degrades to an invalid [`IntrospectionResult`], and the
//! gateway rejects the request. No result is ever cached across requests:
//! each request re-asks the authority, so revocation is visible immediately.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::claims::RoutingClaims;
use crate::Result;

/// Outcome of one introspection call. Transient: built fresh per request,
/// never persisted, never shared between requests.
#[derive(Debug, Clone, Default)]
pub struct IntrospectionResult {
    /// Whether the authority reported the token active
    pub valid: bool,
    /// `sub` claim from the authority response
    pub subject: Option<String>,
    /// `email` claim from the authority response
    pub email: Option<String>,
    /// Tenant id, carried over from the routing claims
    pub tenant_id: Option<String>,
    /// Client id, carried over from the routing claims
    pub client_id: Option<String>,
    /// `iss` claim from the authority response
    pub issuer: Option<String>,
    /// `aud` claim from the authority response
    pub audience: Option<String>,
    /// `exp` claim (Unix epoch seconds)
    pub expires_at: Option<i64>,
    /// `iat` claim (Unix epoch seconds)
    pub issued_at: Option<i64>,
    /// Reason the token is invalid, for logs and audit only
    pub error: Option<String>,
}

impl IntrospectionResult {
    /// Build an invalid result carrying a reason.
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Wire shape of the authority's introspection response.
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the remote introspection authority.
pub struct TokenIntrospector {
    http: reqwest::Client,
}

impl TokenIntrospector {
    /// Create an introspector whose outbound calls are bounded by `timeout`.
    /// A timed-out call is indistinguishable from an unreachable authority:
    /// both produce an invalid result.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Verify `token` against the authority at `endpoint`.
    ///
    /// Tenant and client identifiers come from the unverified routing
    /// `claims`, not from the authority response — the authority confirms
    /// validity and identity claims, the directory decides trust.
    pub async fn introspect(
        &self,
        token: &str,
        endpoint: &str,
        claims: &RoutingClaims,
    ) -> IntrospectionResult {
        let response = match self
            .http
            .post(endpoint)
            .json(&json!({ "token": token }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Introspection call failed");
                return IntrospectionResult::invalid("introspection service unavailable");
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %endpoint, status = %status, "Introspection endpoint returned non-success status");
            return IntrospectionResult::invalid("introspection endpoint error");
        }

        let body: IntrospectionResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Introspection response was not valid JSON");
                return IntrospectionResult::invalid("introspection service unavailable");
            }
        };

        if !body.active {
            let reason = body.error.unwrap_or_else(|| "token inactive".to_string());
            debug!(endpoint = %endpoint, reason = %reason, "Authority rejected token");
            return IntrospectionResult::invalid(format!("token validation failed: {reason}"));
        }

        debug!(
            endpoint = %endpoint,
            subject = body.sub.as_deref().unwrap_or(""),
            issuer = body.iss.as_deref().unwrap_or(""),
            "Authority confirmed token"
        );

        IntrospectionResult {
            valid: true,
            subject: body.sub,
            email: body.email,
            tenant_id: claims.tenant_id.clone(),
            client_id: claims.client_id.clone(),
            issuer: body.iss,
            audience: body.aud,
            expires_at: body.exp,
            issued_at: body.iat,
            error: None,
        }
    }
}
