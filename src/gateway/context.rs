//! Request-scoped identity context.
//!
//! The resolved identity of the current request lives in a tokio task-local
//! scope wrapped around the downstream handler. This gives three guarantees
//! the gateway depends on:
//!
//! - **Isolation**: concurrent requests run as independent tasks and never
//!   observe each other's identity values.
//! - **Teardown**: the scope ends when the wrapped future completes, on
//!   every exit path — normal return, handler error, or cancellation. No
//!   identity survives into a later request on a reused worker.
//! - **Safe defaults**: readers outside a scope get the `"default"` tenant
//!   and absent user rather than stale data.
//!
//! Handlers read the context through the free functions below instead of
//! threading an identity parameter through every call signature.

use std::future::Future;

use serde::Serialize;

tokio::task_local! {
    static IDENTITY: RequestIdentity;
}

/// Tenant identifier reported when no request scope is active.
pub const DEFAULT_TENANT: &str = "default";

/// Client IP reported when none could be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Identity resolved for one request. Owned by that request's task scope;
/// never stored anywhere that outlives the request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestIdentity {
    /// Tenant the token belongs to
    pub tenant_id: String,
    /// Subject of the token
    pub user_id: Option<String>,
    /// Registered client that presented the token
    pub client_id: Option<String>,
    /// The raw bearer token, for downstream token delegation
    #[serde(skip_serializing)]
    pub raw_token: String,
    /// Client IP, for audit records
    pub client_ip: String,
}

/// Run `fut` with `identity` as the current request identity.
///
/// The identity is visible only to code running inside `fut` and is dropped
/// with the scope when `fut` finishes, however it finishes.
pub async fn with_identity<F>(identity: RequestIdentity, fut: F) -> F::Output
where
    F: Future,
{
    IDENTITY.scope(identity, fut).await
}

/// Tenant id of the current request, or [`DEFAULT_TENANT`] outside a scope.
#[must_use]
pub fn current_tenant_id() -> String {
    IDENTITY
        .try_with(|id| id.tenant_id.clone())
        .unwrap_or_else(|_| DEFAULT_TENANT.to_string())
}

/// User id (token subject) of the current request, if authenticated.
#[must_use]
pub fn current_user_id() -> Option<String> {
    IDENTITY.try_with(|id| id.user_id.clone()).ok().flatten()
}

/// Client id of the current request, if the token carried one.
#[must_use]
pub fn current_client_id() -> Option<String> {
    IDENTITY.try_with(|id| id.client_id.clone()).ok().flatten()
}

/// Raw bearer token of the current request, for token delegation.
#[must_use]
pub fn current_user_token() -> Option<String> {
    IDENTITY.try_with(|id| id.raw_token.clone()).ok()
}

/// Whether an identity scope is active for the current task.
#[must_use]
pub fn is_authenticated() -> bool {
    IDENTITY.try_with(|_| ()).is_ok()
}

/// Client IP of the current request, or [`UNKNOWN_IP`] outside a scope.
#[must_use]
pub fn client_ip_address() -> String {
    IDENTITY
        .try_with(|id| id.client_ip.clone())
        .unwrap_or_else(|_| UNKNOWN_IP.to_string())
}
