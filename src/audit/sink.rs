//! Audit sink trait and error types

use crate::domain::AuditPayload;
use async_trait::async_trait;
use thiserror::Error;

/// Audit sink error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("Audit payload could not be encoded: {0}")]
    Encoding(String),
}

/// Append-only destination for audit payloads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one payload. Emissions from a single caller must be kept in
    /// the order they were made.
    async fn emit(&self, payload: &AuditPayload) -> Result<(), AuditError>;

    /// Get the sink name
    fn sink_name(&self) -> &'static str;
}
