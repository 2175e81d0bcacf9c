//! Access validation — issuer pinning, audience check, registration gate.
//!
//! This is the actual authorization decision point. Introspection only proves
//! the token is *valid*; validation decides whether the caller is *permitted
//! to use this server*. The rules, in order:
//!
//! 1. When a registration was found, the introspection issuer must equal its
//!    `trusted_issuer` exactly.
//! 2. The audience must equal the registration's `expected_audience`; when no
//!    audience is configured, the configurable list of self-addresses applies
//!    instead (deployments migrate off that fallback by config alone).
//! 3. The unconditional fail-closed gate: both tenant and client ids must be
//!    non-empty and an active registration must exist. No client is
//!    authorized by default, regardless of an issuer/audience match.
//! 4. Tokens with no tenant/client claims at all skip 1–3 when the
//!    `allow_legacy_tokens` policy switch is on. This compatibility
//!    relaxation accepts pre-multi-tenant tokens on introspection validity
//!    alone and is meant to be switched off once those tokens are gone.

use std::fmt;

use super::client::IntrospectionResult;
use crate::directory::ClientRegistration;

/// Validation policy knobs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Audience values accepted when the registration carries none
    pub self_audiences: Vec<String>,
    /// Accept claimless tokens on introspection validity alone
    pub allow_legacy_tokens: bool,
}

/// Outcome of access validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The caller may proceed
    Authorized {
        /// `true` when the token carried no tenant/client claims and was
        /// accepted under the legacy compatibility relaxation
        legacy: bool,
    },
    /// The caller is rejected; the reason is for logs and audit, never for
    /// the external response body
    Denied(DenyReason),
}

impl AccessDecision {
    /// Whether the decision authorizes the request.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }
}

/// Why access was denied. Operator-facing detail; callers only ever see a
/// generic 401 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The introspection result itself was not valid
    TokenInvalid,
    /// Issuer did not match the registration's trusted issuer
    UntrustedIssuer {
        /// Issuer the registration pins
        expected: String,
        /// Issuer the authority reported
        actual: String,
    },
    /// Audience did not match the expected or self audiences
    AudienceMismatch {
        /// Audience the authority reported, if any
        actual: Option<String>,
    },
    /// No active registration exists for the (tenant, client) pair
    ClientNotRegistered,
    /// Claimless token rejected because legacy compatibility is disabled
    LegacyTokensDisabled,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenInvalid => write!(f, "token not confirmed by authority"),
            Self::UntrustedIssuer { expected, actual } => write!(
                f,
                "untrusted issuer for this client (expected {expected}, got {actual})"
            ),
            Self::AudienceMismatch { actual } => write!(
                f,
                "token audience mismatch (got {})",
                actual.as_deref().unwrap_or("<none>")
            ),
            Self::ClientNotRegistered => write!(f, "client not authorized for this tenant"),
            Self::LegacyTokensDisabled => {
                write!(f, "token missing tenant/client claims and legacy mode disabled")
            }
        }
    }
}

/// Validate an introspection result against the directory's answer.
///
/// `registration` is the directory lookup for the result's tenant/client
/// pair; `None` means no active row exists.
#[must_use]
pub fn validate(
    result: &IntrospectionResult,
    registration: Option<&ClientRegistration>,
    policy: &ValidationPolicy,
) -> AccessDecision {
    if !result.valid {
        return AccessDecision::Denied(DenyReason::TokenInvalid);
    }

    let tenant_id = result.tenant_id.as_deref().filter(|t| !t.is_empty());
    let client_id = result.client_id.as_deref().filter(|c| !c.is_empty());

    // Claimless legacy tokens bypass the registration checks entirely when
    // policy permits. One present claim without the other is never legacy.
    if tenant_id.is_none() && client_id.is_none() {
        if policy.allow_legacy_tokens {
            return AccessDecision::Authorized { legacy: true };
        }
        return AccessDecision::Denied(DenyReason::LegacyTokensDisabled);
    }

    let (Some(_tenant_id), Some(_client_id)) = (tenant_id, client_id) else {
        return AccessDecision::Denied(DenyReason::ClientNotRegistered);
    };

    // Fail-closed gate: an active registration must exist. Issuer and
    // audience success never substitute for it.
    let Some(registration) = registration else {
        return AccessDecision::Denied(DenyReason::ClientNotRegistered);
    };

    let actual_issuer = result.issuer.as_deref().unwrap_or("");
    if actual_issuer != registration.trusted_issuer {
        return AccessDecision::Denied(DenyReason::UntrustedIssuer {
            expected: registration.trusted_issuer.clone(),
            actual: actual_issuer.to_string(),
        });
    }

    if !audience_matches(result.audience.as_deref(), registration, policy) {
        return AccessDecision::Denied(DenyReason::AudienceMismatch {
            actual: result.audience.clone(),
        });
    }

    AccessDecision::Authorized { legacy: false }
}

/// Exact audience comparison against the configured expectation, or against
/// the self-audience list when the registration carries none.
fn audience_matches(
    audience: Option<&str>,
    registration: &ClientRegistration,
    policy: &ValidationPolicy,
) -> bool {
    let Some(audience) = audience else {
        return false;
    };

    match &registration.expected_audience {
        Some(expected) => audience == expected,
        None => policy.self_audiences.iter().any(|a| a == audience),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, ScopeConfig};
    use crate::directory::{ClientDirectory, StaticDirectory};

    const ISSUER: &str = "https://idp.example.com";
    const AUDIENCE: &str = "http://localhost:8081/mcp";

    fn policy() -> ValidationPolicy {
        ValidationPolicy {
            self_audiences: vec![
                AUDIENCE.to_string(),
                "http://mcp-auth-gateway:8081/mcp".to_string(),
            ],
            allow_legacy_tokens: true,
        }
    }

    fn registration(expected_audience: Option<&str>) -> ClientRegistration {
        let cfg = ClientConfig {
            tenant_id: "t1".to_string(),
            client_id: "c1".to_string(),
            client_name: String::new(),
            trusted_issuer: ISSUER.to_string(),
            introspection_endpoint: None,
            expected_audience: expected_audience.map(String::from),
            is_active: true,
            scopes: vec![ScopeConfig {
                scope: "read:*".to_string(),
                is_active: true,
            }],
        };
        let directory = StaticDirectory::from_config(std::slice::from_ref(&cfg));
        tokio_test::block_on(directory.lookup("t1", "c1")).unwrap()
    }

    fn valid_result() -> IntrospectionResult {
        IntrospectionResult {
            valid: true,
            subject: Some("user-9".to_string()),
            email: Some("user@t1.example.com".to_string()),
            tenant_id: Some("t1".to_string()),
            client_id: Some("c1".to_string()),
            issuer: Some(ISSUER.to_string()),
            audience: Some(AUDIENCE.to_string()),
            expires_at: Some(1_767_225_600),
            issued_at: Some(1_767_222_000),
            error: None,
        }
    }

    #[test]
    fn matching_issuer_and_audience_authorizes() {
        let decision = validate(&valid_result(), Some(&registration(None)), &policy());
        assert_eq!(decision, AccessDecision::Authorized { legacy: false });
    }

    #[test]
    fn foreign_issuer_is_denied_even_when_active() {
        let mut result = valid_result();
        result.issuer = Some("https://rogue.example.com".to_string());

        let decision = validate(&result, Some(&registration(None)), &policy());
        match decision {
            AccessDecision::Denied(DenyReason::UntrustedIssuer { expected, actual }) => {
                assert_eq!(expected, ISSUER);
                assert_eq!(actual, "https://rogue.example.com");
            }
            other => panic!("expected untrusted issuer denial, got {other:?}"),
        }
    }

    #[test]
    fn untrusted_issuer_reason_names_the_client_relationship() {
        let mut result = valid_result();
        result.issuer = Some("other".to_string());

        let AccessDecision::Denied(reason) =
            validate(&result, Some(&registration(None)), &policy())
        else {
            panic!("expected denial");
        };
        assert!(reason.to_string().contains("untrusted issuer for this client"));
    }

    #[test]
    fn missing_registration_denies_regardless_of_validity() {
        let decision = validate(&valid_result(), None, &policy());
        assert_eq!(
            decision,
            AccessDecision::Denied(DenyReason::ClientNotRegistered)
        );
    }

    #[test]
    fn explicit_audience_is_pinned_exactly() {
        let registration = registration(Some("https://api.example.com/mcp"));

        let mut result = valid_result();
        result.audience = Some("https://api.example.com/mcp".to_string());
        assert!(validate(&result, Some(&registration), &policy()).is_authorized());

        // The self-audience fallback must not apply once an explicit
        // audience is configured.
        result.audience = Some(AUDIENCE.to_string());
        assert_eq!(
            validate(&result, Some(&registration), &policy()),
            AccessDecision::Denied(DenyReason::AudienceMismatch {
                actual: Some(AUDIENCE.to_string())
            })
        );
    }

    #[test]
    fn self_audience_fallback_accepts_either_form() {
        let registration = registration(None);

        let mut result = valid_result();
        result.audience = Some("http://mcp-auth-gateway:8081/mcp".to_string());
        assert!(validate(&result, Some(&registration), &policy()).is_authorized());

        result.audience = Some("http://elsewhere:9999/mcp".to_string());
        assert!(!validate(&result, Some(&registration), &policy()).is_authorized());

        result.audience = None;
        assert!(!validate(&result, Some(&registration), &policy()).is_authorized());
    }

    #[test]
    fn claimless_token_is_authorized_under_legacy_mode() {
        let mut result = valid_result();
        result.tenant_id = None;
        result.client_id = None;

        let decision = validate(&result, None, &policy());
        assert_eq!(decision, AccessDecision::Authorized { legacy: true });
    }

    #[test]
    fn claimless_token_is_denied_when_legacy_mode_off() {
        let mut result = valid_result();
        result.tenant_id = None;
        result.client_id = None;

        let mut policy = policy();
        policy.allow_legacy_tokens = false;

        assert_eq!(
            validate(&result, None, &policy),
            AccessDecision::Denied(DenyReason::LegacyTokensDisabled)
        );
    }

    #[test]
    fn half_present_claims_are_not_legacy() {
        let mut result = valid_result();
        result.client_id = None;

        assert_eq!(
            validate(&result, None, &policy()),
            AccessDecision::Denied(DenyReason::ClientNotRegistered)
        );

        let mut result = valid_result();
        result.tenant_id = Some(String::new());
        assert_eq!(
            validate(&result, Some(&registration(None)), &policy()),
            AccessDecision::Denied(DenyReason::ClientNotRegistered)
        );
    }

    #[test]
    fn invalid_introspection_result_is_denied() {
        let result = IntrospectionResult::invalid("token inactive");
        assert_eq!(
            validate(&result, Some(&registration(None)), &policy()),
            AccessDecision::Denied(DenyReason::TokenInvalid)
        );
    }
}
