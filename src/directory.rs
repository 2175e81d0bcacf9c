//! Client directory — per-tenant, per-client trust metadata.
//!
//! One [`ClientRegistration`] row exists per `(tenant_id, client_id)` pair and
//! carries the trust configuration the gateway needs before it knows which
//! introspection authority to call: the trusted issuer, the client-specific
//! introspection endpoint, and the expected audience.
//!
//! The directory is **read-only** from the gateway's perspective. Rows are
//! created and updated by an external admin process; the gateway only ever
//! looks them up. Only active rows participate in authorization, and a scope
//! grant is effective only when both the grant and its owning registration
//! are active.

use dashmap::DashMap;

use crate::config::ClientConfig;

/// Trust metadata for one registered client within one tenant.
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    /// Tenant this registration belongs to
    pub tenant_id: String,
    /// Registered client identifier
    pub client_id: String,
    /// Human-readable client name
    pub client_name: String,
    /// Issuer the introspection result must match exactly
    pub trusted_issuer: String,
    /// Client-specific introspection endpoint, if configured
    pub introspection_endpoint: Option<String>,
    /// Expected audience; `None` falls back to the configured self-audiences
    pub expected_audience: Option<String>,
    /// Active scope grants
    scopes: Vec<String>,
}

impl ClientRegistration {
    /// Check whether this registration carries an active grant for `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Active scope identifiers granted to this client.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Lookup of client registrations, keyed by `(tenant_id, client_id)`.
///
/// Implementations must be `Send + Sync` because the directory is shared
/// across concurrent requests. There is no write path in this trait: the
/// gateway never mutates registrations.
#[async_trait::async_trait]
pub trait ClientDirectory: Send + Sync + 'static {
    /// Look up the active registration for a `(tenant, client)` pair.
    ///
    /// Returns `None` when no registration exists or the row is inactive.
    async fn lookup(&self, tenant_id: &str, client_id: &str) -> Option<ClientRegistration>;

    /// Active scope strings for a `(tenant, client)` pair.
    async fn scopes(&self, tenant_id: &str, client_id: &str) -> Vec<String> {
        self.lookup(tenant_id, client_id)
            .await
            .map(|r| r.scopes.clone())
            .unwrap_or_default()
    }

    /// Check whether the client holds an active grant for `scope`.
    async fn has_scope(&self, tenant_id: &str, client_id: &str, scope: &str) -> bool {
        self.lookup(tenant_id, client_id)
            .await
            .is_some_and(|r| r.has_scope(scope))
    }
}

/// In-memory directory resolved from configuration at startup.
///
/// Inactive registrations and inactive scope grants are dropped during
/// resolution, so lookups never have to re-check activity flags.
pub struct StaticDirectory {
    registrations: DashMap<(String, String), ClientRegistration>,
}

impl StaticDirectory {
    /// Build a directory from the configured client list.
    #[must_use]
    pub fn from_config(clients: &[ClientConfig]) -> Self {
        let registrations = DashMap::new();
        for client in clients.iter().filter(|c| c.is_active) {
            let scopes: Vec<String> = client
                .scopes
                .iter()
                .filter(|s| s.is_active)
                .map(|s| s.scope.clone())
                .collect();

            registrations.insert(
                (client.tenant_id.clone(), client.client_id.clone()),
                ClientRegistration {
                    tenant_id: client.tenant_id.clone(),
                    client_id: client.client_id.clone(),
                    client_name: client.client_name.clone(),
                    trusted_issuer: client.trusted_issuer.clone(),
                    introspection_endpoint: client
                        .introspection_endpoint
                        .as_deref()
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(String::from),
                    expected_audience: client
                        .expected_audience
                        .as_deref()
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(String::from),
                    scopes,
                },
            );
        }

        Self { registrations }
    }

    /// Number of active registrations loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether the directory holds no registrations at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[async_trait::async_trait]
impl ClientDirectory for StaticDirectory {
    async fn lookup(&self, tenant_id: &str, client_id: &str) -> Option<ClientRegistration> {
        self.registrations
            .get(&(tenant_id.to_string(), client_id.to_string()))
            .map(|r| r.clone())
    }
}
