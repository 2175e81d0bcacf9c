//! Audit trail for gateway-mediated operations.
//!
//! One [`AuditRecord`] is written per operation attempt, success or failure.
//! The write contract is fire-and-forget: a sink that cannot persist a record
//! logs the failure locally and swallows it — an audit problem must never
//! mask or replace the outcome of the guarded operation.
//!
//! The default [`TracingAuditSink`] emits each record via `tracing::info!`
//! with the serialized record in the `audit` field, queryable by any log
//! aggregator. Deployments that persist audit rows elsewhere implement
//! [`AuditSink`] against their own store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::gateway::context;

/// Kind of gateway-mediated operation being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// A tool invocation
    ToolCall,
    /// Tool discovery/listing
    ToolList,
    /// Scope listing
    ScopeList,
    /// Read of a protected resource, e.g. the identity echo
    ResourceAccess,
    /// Authentication attempt at the gateway filter
    Authentication,
    /// Authorization decision at the gateway filter
    Authorization,
    /// Unclassified error path
    Error,
}

/// One append-only audit row.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Record identifier
    pub id: uuid::Uuid,
    /// Tenant the operation ran under
    pub tenant_id: String,
    /// Client that requested the operation, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Operation kind
    pub operation_type: OperationType,
    /// Tool name for tool operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Whether the operation succeeded
    pub success: bool,
    /// Failure detail; absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall time spent on the operation
    pub execution_time_ms: u64,
    /// User that triggered the operation, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Client IP the request arrived from
    pub ip_address: String,
    /// Record creation time
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build a record for the current request, reading tenant, client, user
    /// and IP from the active identity context.
    #[must_use]
    pub fn for_current_request(
        operation_type: OperationType,
        tool_name: Option<&str>,
        success: bool,
        message: Option<&str>,
        started: Instant,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            tenant_id: context::current_tenant_id(),
            client_id: context::current_client_id(),
            operation_type,
            tool_name: tool_name.map(String::from),
            success,
            error_message: if success {
                None
            } else {
                message.map(String::from)
            },
            execution_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            created_by: context::current_user_id(),
            ip_address: context::client_ip_address(),
            created_at: Utc::now(),
        }
    }
}

/// Destination for audit records.
///
/// Implementations must swallow their own failures: `log_operation` has no
/// error channel on purpose.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Write one record. Must never panic or propagate failure.
    async fn log_operation(&self, record: AuditRecord);
}

/// Sink that emits records as structured tracing events.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait::async_trait]
impl AuditSink for TracingAuditSink {
    async fn log_operation(&self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(ref json) => tracing::info!(audit = %json, "gateway audit"),
            Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit record"),
        }
    }
}
