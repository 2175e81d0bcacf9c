//! Unverified claim peek — routing only, never authorization.
//!
//! Before the gateway knows which introspection authority to trust it has to
//! read the token's `tenant_id`/`client_id` claims, and it can only do that
//! *without* verifying the signature. [`peek`] decodes the payload segment of
//! a three-part JWT on a strictly best-effort basis: any structural failure
//! yields absent claims rather than an error.
//!
//! The [`RoutingClaims`] type is deliberately private to this module's
//! callers and shares nothing with the authorization path — peeked claims
//! select an endpoint, they never grant access.

use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Tenant/client hints peeked from an unverified token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingClaims {
    /// Tenant identifier, when present
    pub tenant_id: Option<String>,
    /// Client identifier, when present
    pub client_id: Option<String>,
}

impl RoutingClaims {
    /// Both claims present — the token can be routed per-client.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        self.tenant_id.is_some() && self.client_id.is_some()
    }
}

/// Raw payload fields we care about. Tenant id appears as `tenant_id` in
/// current tokens and `tenantId` in pre-migration ones; the canonical
/// snake_case form wins when both are present.
#[derive(Debug, Deserialize)]
struct PeekedPayload {
    #[serde(default)]
    tenant_id: Option<String>,
    #[serde(default, rename = "tenantId")]
    tenant_id_legacy: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
}

/// Peek tenant/client claims from a JWT without verifying its signature.
///
/// Returns empty claims for anything that is not a well-formed three-segment
/// token with a base64url JSON payload.
#[must_use]
pub fn peek(token: &str) -> RoutingClaims {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        debug!("Token does not have three segments, no routing claims");
        return RoutingClaims::default();
    };

    let Ok(decoded) = decode_base64url(payload) else {
        debug!("Token payload is not valid base64url, no routing claims");
        return RoutingClaims::default();
    };

    let Ok(parsed) = serde_json::from_slice::<PeekedPayload>(&decoded) else {
        debug!("Token payload is not a JSON object, no routing claims");
        return RoutingClaims::default();
    };

    RoutingClaims {
        tenant_id: parsed.tenant_id.or(parsed.tenant_id_legacy),
        client_id: parsed.client_id,
    }
}

/// Decode base64url with padding normalization. Tokens in the wild carry the
/// payload both padded and unpadded.
fn decode_base64url(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = segment.trim_end_matches('=');
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token_with_payload(payload: &serde_json::Value) -> String {
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(payload).unwrap());
        format!("eyJhbGciOiJSUzI1NiJ9.{encoded}.sig")
    }

    #[test]
    fn peeks_snake_case_claims() {
        let token = token_with_payload(&serde_json::json!({
            "tenant_id": "t1",
            "client_id": "c1",
            "sub": "user-9"
        }));

        let claims = peek(&token);
        assert_eq!(claims.tenant_id.as_deref(), Some("t1"));
        assert_eq!(claims.client_id.as_deref(), Some("c1"));
        assert!(claims.is_routable());
    }

    #[test]
    fn accepts_legacy_camel_case_tenant_claim() {
        let token = token_with_payload(&serde_json::json!({
            "tenantId": "legacy-tenant",
            "client_id": "c1"
        }));

        let claims = peek(&token);
        assert_eq!(claims.tenant_id.as_deref(), Some("legacy-tenant"));
    }

    #[test]
    fn canonical_form_wins_over_legacy() {
        let token = token_with_payload(&serde_json::json!({
            "tenant_id": "canonical",
            "tenantId": "legacy"
        }));

        let claims = peek(&token);
        assert_eq!(claims.tenant_id.as_deref(), Some("canonical"));
    }

    #[test]
    fn missing_claims_yield_absent_values() {
        let token = token_with_payload(&serde_json::json!({ "sub": "user-9" }));

        let claims = peek(&token);
        assert_eq!(claims, RoutingClaims::default());
        assert!(!claims.is_routable());
    }

    #[test]
    fn wrong_segment_count_yields_absent_claims() {
        assert_eq!(peek("only-one-segment"), RoutingClaims::default());
        assert_eq!(peek("two.segments"), RoutingClaims::default());
        assert_eq!(peek("a.b.c.d"), RoutingClaims::default());
        assert_eq!(peek(""), RoutingClaims::default());
    }

    #[test]
    fn malformed_base64_payload_yields_absent_claims() {
        assert_eq!(peek("header.!!not-base64!!.sig"), RoutingClaims::default());
    }

    #[test]
    fn non_json_payload_yields_absent_claims() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"plain text");
        assert_eq!(
            peek(&format!("header.{payload}.sig")),
            RoutingClaims::default()
        );
    }

    #[test]
    fn padded_payload_is_accepted() {
        let encoded = base64::engine::general_purpose::URL_SAFE
            .encode(serde_json::to_vec(&serde_json::json!({ "tenant_id": "t1" })).unwrap());
        let claims = peek(&format!("header.{encoded}.sig"));
        assert_eq!(claims.tenant_id.as_deref(), Some("t1"));
    }
}
