//! Introspection filter middleware.
//!
//! Every request under the protected prefix passes through here:
//!
//! 1. Extract the bearer token (missing/malformed → 401, nothing else runs).
//! 2. Peek tenant/client routing claims — best-effort, never authoritative.
//! 3. Resolve the introspection authority: the registration's own endpoint
//!    when the directory knows the client, the static default otherwise.
//! 4. Introspect the token with the resolved authority (fail-closed).
//! 5. Validate issuer, audience and registration against the directory.
//! 6. Run the downstream handler inside the request identity scope; the
//!    scope ends with the handler on every exit path.
//!
//! Denial detail goes to operator logs and the audit trail at warn level;
//! callers only ever see a generic message. Requests outside the protected
//! prefix pass through untouched.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use super::context::{self, RequestIdentity};
use super::router::AppState;
use crate::audit::{AuditRecord, OperationType};
use crate::introspection::{AccessDecision, DenyReason, claims, validate};

/// Introspection filter. Applied with `middleware::from_fn_with_state`.
pub async fn introspection_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !path.starts_with(&state.protected_prefix) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let client_ip = client_ip_address(request.headers(), &request);

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        debug!(path = %path, "Request missing bearer token");
        audit_rejection(
            &state,
            OperationType::Authentication,
            "missing bearer token",
            &client_ip,
            started,
        )
        .await;
        return unauthorized_response("Missing or invalid Authorization header");
    };

    // Routing claims are unverified; they only pick the authority to ask.
    let routing = claims::peek(token);

    let registration = match (&routing.tenant_id, &routing.client_id) {
        (Some(tenant), Some(client)) => state.directory.lookup(tenant, client).await,
        _ => None,
    };

    let endpoint = registration
        .as_ref()
        .and_then(|r| r.introspection_endpoint.clone())
        .unwrap_or_else(|| state.default_endpoint.clone());
    debug!(
        path = %path,
        endpoint = %endpoint,
        routable = routing.is_routable(),
        "Resolved introspection endpoint"
    );

    let result = state.introspector.introspect(token, &endpoint, &routing).await;
    if !result.valid {
        warn!(
            path = %path,
            client_ip = %client_ip,
            reason = result.error.as_deref().unwrap_or("unknown"),
            "Token rejected by introspection"
        );
        audit_rejection(
            &state,
            OperationType::Authentication,
            result.error.as_deref().unwrap_or("introspection failed"),
            &client_ip,
            started,
        )
        .await;
        return unauthorized_response("Invalid or expired token");
    }

    match validate(&result, registration.as_ref(), &state.policy) {
        AccessDecision::Authorized { legacy } => {
            if legacy {
                debug!(path = %path, "Claimless token accepted under legacy compatibility");
            }

            let identity = RequestIdentity {
                tenant_id: result
                    .tenant_id
                    .clone()
                    .unwrap_or_else(|| context::DEFAULT_TENANT.to_string()),
                user_id: result.subject.clone(),
                client_id: result.client_id.clone(),
                raw_token: token.to_string(),
                client_ip,
            };

            debug!(
                tenant = %identity.tenant_id,
                user = identity.user_id.as_deref().unwrap_or(""),
                path = %path,
                "Request authenticated"
            );

            // The identity scope covers exactly the downstream handler; it is
            // gone once the response future resolves.
            context::with_identity(identity, next.run(request)).await
        }
        AccessDecision::Denied(reason) => {
            warn!(
                path = %path,
                client_ip = %client_ip,
                tenant = result.tenant_id.as_deref().unwrap_or(""),
                client = result.client_id.as_deref().unwrap_or(""),
                reason = %reason,
                "Access denied"
            );
            audit_rejection(
                &state,
                OperationType::Authorization,
                &reason.to_string(),
                &client_ip,
                started,
            )
            .await;
            unauthorized_response(external_message(&reason))
        }
    }
}

/// External message for a denial. Detail stays in logs and audit.
fn external_message(reason: &DenyReason) -> &'static str {
    match reason {
        DenyReason::ClientNotRegistered | DenyReason::LegacyTokensDisabled => {
            "Client not authorized for this server"
        }
        DenyReason::TokenInvalid
        | DenyReason::UntrustedIssuer { .. }
        | DenyReason::AudienceMismatch { .. } => "Invalid or expired token",
    }
}

/// Record a rejected attempt. Fire-and-forget by contract. Rejections happen
/// before any identity scope exists, so the IP is passed in explicitly.
async fn audit_rejection(
    state: &AppState,
    operation: OperationType,
    message: &str,
    client_ip: &str,
    started: Instant,
) {
    let mut record =
        AuditRecord::for_current_request(operation, None, false, Some(message), started);
    record.ip_address = client_ip.to_string();
    state.audit.log_operation(record).await;
}

/// Client IP for audit: first `X-Forwarded-For` hop, then `X-Real-IP`, then
/// the socket peer address.
fn client_ip_address(headers: &HeaderMap, request: &Request<Body>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(
            || context::UNKNOWN_IP.to_string(),
            |ConnectInfo(addr)| addr.ip().to_string(),
        )
}

/// 401 response with the contract body shape.
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", "Bearer")],
        Json(json!({
            "error": "unauthorized",
            "message": message,
        })),
    )
        .into_response()
}
