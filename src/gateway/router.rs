//! HTTP router — shared state, built-in endpoints, filter wiring.
//!
//! The gateway owns `/health` (public) and, under the protected prefix,
//! `GET /whoami` and `GET /scopes`. Tool-execution handlers belong to the
//! host application and are nested under `{prefix}/tools` with
//! [`create_router_with_tools`]; they run behind the introspection filter and
//! read the request identity through [`super::context`].

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    http::{HeaderValue, Method},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::introspection_middleware;
use super::context;
use crate::audit::{AuditRecord, AuditSink, OperationType};
use crate::directory::ClientDirectory;
use crate::introspection::{TokenIntrospector, ValidationPolicy};

/// Shared application state for the router and the filter.
pub struct AppState {
    /// Path prefix guarded by the introspection filter
    pub protected_prefix: String,
    /// Introspection endpoint for tokens the directory cannot route
    pub default_endpoint: String,
    /// Client registration lookups
    pub directory: Arc<dyn ClientDirectory>,
    /// Outbound introspection client
    pub introspector: TokenIntrospector,
    /// Issuer/audience/legacy validation policy
    pub policy: ValidationPolicy,
    /// Audit record destination
    pub audit: Arc<dyn AuditSink>,
    /// Allowed CORS origin patterns
    pub cors_origins: Vec<String>,
}

/// Build the router with only the built-in endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with_tools(state, Router::new())
}

/// Build the router, nesting the host application's tool handlers under
/// `{prefix}/tools`. Tool handlers run inside the identity scope and are
/// expected to enforce their own scopes via
/// [`ClientDirectory::has_scope`] and write one audit record per attempt.
pub fn create_router_with_tools(state: Arc<AppState>, tools: Router) -> Router {
    let prefix = state.protected_prefix.clone();

    let protected = Router::new()
        .route("/whoami", get(whoami_handler))
        .route("/scopes", get(scopes_handler))
        .nest_service("/tools", tools);

    Router::new()
        .route("/health", get(health_handler))
        .nest(&prefix, protected)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            introspection_middleware,
        ))
        .layer(cors_layer(&state.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for bearer-token clients: explicit origin patterns, credentials on.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns: Vec<String> = origins.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let Ok(origin) = origin.to_str() else {
                return false;
            };
            patterns.iter().any(|p| origin_matches(p, origin))
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true)
}

/// Match an origin against a pattern; a trailing `*` is a prefix wildcard
/// (e.g. `http://localhost:*`).
fn origin_matches(pattern: &str, origin: &str) -> bool {
    pattern.strip_suffix('*').map_or_else(
        || pattern == origin,
        |prefix| origin.starts_with(prefix),
    )
}

/// Liveness probe; public by virtue of sitting outside the protected prefix.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Identity echo for authenticated callers.
async fn whoami_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    let started = Instant::now();

    let response = Json(json!({
        "tenant_id": context::current_tenant_id(),
        "user_id": context::current_user_id(),
        "client_id": context::current_client_id(),
        "authenticated": context::is_authenticated(),
        "client_ip": context::client_ip_address(),
    }));

    state
        .audit
        .log_operation(AuditRecord::for_current_request(
            OperationType::ResourceAccess,
            None,
            true,
            None,
            started,
        ))
        .await;

    response
}

/// Active scope grants for the calling client. Legacy identities carry no
/// client registration and therefore hold no scopes.
async fn scopes_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    let started = Instant::now();
    let tenant_id = context::current_tenant_id();

    let scopes = match context::current_client_id() {
        Some(client_id) => state.directory.scopes(&tenant_id, &client_id).await,
        None => Vec::new(),
    };

    state
        .audit
        .log_operation(AuditRecord::for_current_request(
            OperationType::ScopeList,
            None,
            true,
            None,
            started,
        ))
        .await;

    Json(json!({
        "tenant_id": tenant_id,
        "scopes": scopes,
    }))
}
