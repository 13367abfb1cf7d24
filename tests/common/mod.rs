//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use encounter_core::audit::{AuditError, AuditSink, InMemoryAuditSink};
use encounter_core::domain::{
    AuditAction, AuditPayload, AuthorityClaims, Capability, EncounterId, PatientId, TenantId,
};
use encounter_core::repository::InMemoryEncounterRepository;
use encounter_core::EncounterService;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub type MemoryService = EncounterService<InMemoryEncounterRepository, InMemoryAuditSink>;

/// Service wired to in-memory store and sink, with handles to both
pub struct TestHarness {
    pub service: Arc<MemoryService>,
    pub repo: Arc<InMemoryEncounterRepository>,
    pub audit: Arc<InMemoryAuditSink>,
}

impl TestHarness {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryEncounterRepository::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let service = Arc::new(EncounterService::new(repo.clone(), audit.clone()));
        Self {
            service,
            repo,
            audit,
        }
    }

    pub async fn actions_for(&self, encounter_id: EncounterId) -> Vec<AuditAction> {
        self.audit
            .entries_for(encounter_id)
            .await
            .iter()
            .map(AuditPayload::action)
            .collect()
    }
}

pub fn tenant(id: &str) -> TenantId {
    TenantId::parse(id).expect("valid tenant id")
}

pub fn patient(id: &str) -> PatientId {
    PatientId::parse(id).expect("valid patient id")
}

/// Claims granting every encounter capability in `tenant_id`
pub fn clinician(tenant_id: &str) -> AuthorityClaims {
    AuthorityClaims::new("dr-test", tenant_id, &[Capability::EncounterAll])
}

/// Sink that rejects every payload and counts attempts
#[derive(Default)]
pub struct FailingAuditSink {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn emit(&self, _payload: &AuditPayload) -> Result<(), AuditError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AuditError::Unavailable(
            "write /var/log/audit.log: no space left on device".to_string(),
        ))
    }

    fn sink_name(&self) -> &'static str {
        "failing"
    }
}
