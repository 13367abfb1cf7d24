//! In-memory audit sink

use super::sink::{AuditError, AuditSink};
use crate::domain::{AuditPayload, EncounterId};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Buffers payloads in emission order. Reference and test implementation.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditPayload>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every payload emitted so far, oldest first
    pub async fn entries(&self) -> Vec<AuditPayload> {
        self.entries.read().await.clone()
    }

    /// Payloads for one encounter, oldest first
    pub async fn entries_for(&self, encounter_id: EncounterId) -> Vec<AuditPayload> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|p| p.encounter_id() == encounter_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop all buffered payloads. Test isolation only: this is not part of
    /// [`AuditSink`], so the encounter service cannot reach it.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn emit(&self, payload: &AuditPayload) -> Result<(), AuditError> {
        self.entries.write().await.push(payload.clone());
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "memory"
    }
}
