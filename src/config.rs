//! Configuration management

use std::{env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths are loaded in order, later files override earlier. Variables are
    /// set into the process environment for `${VAR}` resolution.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Token introspection configuration
    pub introspection: IntrospectionConfig,
    /// Per-tenant client registrations (the authorization table)
    pub clients: Vec<ClientConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path prefix guarded by the introspection filter. Requests outside
    /// this prefix bypass authentication entirely.
    pub protected_prefix: String,
    /// Allowed CORS origin patterns
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            protected_prefix: "/mcp".to_string(),
            cors_origins: vec!["http://localhost:*".to_string()],
        }
    }
}

/// Token introspection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectionConfig {
    /// Introspection endpoint used when a token carries no tenant/client
    /// claims, or when the matching registration has no endpoint of its own.
    pub default_endpoint: String,
    /// Timeout for the outbound introspection call, in seconds
    pub timeout_secs: u64,
    /// Audience values accepted when a registration has no explicit
    /// `expected_audience` configured. Typically the localhost and
    /// service-discovery forms of this server's own base URL.
    pub self_audiences: Vec<String>,
    /// Accept tokens that carry no tenant/client claims on introspection
    /// validity alone, skipping issuer/audience/registration checks.
    /// Compatibility relaxation for pre-multi-tenant tokens.
    pub allow_legacy_tokens: bool,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            default_endpoint: "http://localhost:8080/api/jwt/validate".to_string(),
            timeout_secs: 10,
            self_audiences: vec![
                "http://localhost:8081/mcp".to_string(),
                "http://mcp-auth-gateway:8081/mcp".to_string(),
            ],
            allow_legacy_tokens: true,
        }
    }
}

impl IntrospectionConfig {
    /// Timeout as a [`Duration`]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One client registration row: a caller permitted to act within a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Tenant this registration belongs to
    pub tenant_id: String,
    /// Registered client identifier
    pub client_id: String,
    /// Human-readable client name
    #[serde(default)]
    pub client_name: String,
    /// Issuer the introspection result must match exactly
    pub trusted_issuer: String,
    /// Client-specific introspection endpoint (falls back to
    /// `introspection.default_endpoint` when absent)
    #[serde(default)]
    pub introspection_endpoint: Option<String>,
    /// Expected audience; when absent, `introspection.self_audiences` apply
    #[serde(default)]
    pub expected_audience: Option<String>,
    /// Inactive registrations never participate in authorization
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Scope grants for this client
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

/// A named capability grant on a client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Scope identifier, e.g. `read:*` or `write:invoices`
    pub scope: String,
    /// Inactive grants are not effective
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or contains an invalid introspection endpoint URL.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (MCP_AUTH_GATEWAY_ prefix)
        figment = figment.merge(Env::prefixed("MCP_AUTH_GATEWAY_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {path_str}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {path_str}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {path_str}");
            }
        }
    }

    /// Expand `${VAR}` and `${VAR:-default}` patterns in endpoint values
    fn expand_env_vars(&mut self) {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("static regex");

        self.introspection.default_endpoint =
            Self::expand_string(&re, &self.introspection.default_endpoint);

        for client in &mut self.clients {
            if let Some(endpoint) = &client.introspection_endpoint {
                client.introspection_endpoint = Some(Self::expand_string(&re, endpoint));
            }
            client.trusted_issuer = Self::expand_string(&re, &client.trusted_issuer);
        }
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }

    /// Reject unusable endpoint URLs at startup rather than per request
    fn validate(&self) -> Result<()> {
        Url::parse(&self.introspection.default_endpoint)
            .map_err(|e| Error::InvalidEndpoint(format!(
                "{}: {e}",
                self.introspection.default_endpoint
            )))?;

        for client in &self.clients {
            if let Some(endpoint) = &client.introspection_endpoint {
                Url::parse(endpoint).map_err(|e| {
                    Error::InvalidEndpoint(format!(
                        "client {}/{}: {}: {e}",
                        client.tenant_id, client.client_id, endpoint
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Active client registrations only
    pub fn active_clients(&self) -> impl Iterator<Item = &ClientConfig> {
        self.clients.iter().filter(|c| c.is_active)
    }
}
