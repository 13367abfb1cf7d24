//! Audit sink backed by the structured log stream

use super::sink::{AuditError, AuditSink};
use crate::domain::AuditPayload;
use async_trait::async_trait;

/// Tracing target audit events are written to
pub const AUDIT_TARGET: &str = "audit";

/// Writes each payload as one JSON event on the `audit` tracing target, so a
/// log shipper can route it to durable storage.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, payload: &AuditPayload) -> Result<(), AuditError> {
        let encoded =
            serde_json::to_string(payload).map_err(|e| AuditError::Encoding(e.to_string()))?;

        tracing::info!(
            target: AUDIT_TARGET,
            action = %payload.action(),
            tenant_id = %payload.tenant_id(),
            encounter_id = %payload.encounter_id(),
            correlation_id = %payload.correlation_id(),
            payload = %encoded,
            "audit event"
        );
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "tracing"
    }
}
