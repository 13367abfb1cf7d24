//! Audit emission for encounter mutations
//!
//! Sinks are pluggable behind [`AuditSink`]:
//! - in-memory buffer (reference and tests)
//! - structured log stream on the `audit` tracing target

pub mod memory;
pub mod sink;
pub mod tracing_sink;

pub use memory::InMemoryAuditSink;
pub use sink::{AuditError, AuditSink};
pub use tracing_sink::TracingAuditSink;
