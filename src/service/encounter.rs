//! Encounter lifecycle business logic

use super::key_lock::KeyLocks;
use crate::audit::AuditSink;
use crate::domain::{
    AuditAction, AuditPayload, AuthorityClaims, AuthorityContext, Capability, EncounterId,
    EncounterKey, EncounterRecord, PatientId, TenantId, Transition,
};
use crate::error::{Result, ServiceError};
use crate::repository::EncounterRepository;
use crate::telemetry::metrics;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct EncounterService<R: EncounterRepository + ?Sized, A: AuditSink + ?Sized> {
    repo: Arc<R>,
    audit: Arc<A>,
    locks: KeyLocks<EncounterKey>,
}

impl<R: EncounterRepository + ?Sized, A: AuditSink + ?Sized> EncounterService<R, A> {
    pub fn new(repo: Arc<R>, audit: Arc<A>) -> Self {
        Self {
            repo,
            audit,
            locks: KeyLocks::new(),
        }
    }

    /// Open a new encounter for `patient_id` under `tenant_id`.
    ///
    /// The returned record is persisted even when the result is a system error
    /// caused by audit emission; the store write is the commit point.
    pub async fn create(
        &self,
        tenant_id: &TenantId,
        patient_id: &PatientId,
        authority: &AuthorityClaims,
    ) -> Result<EncounterRecord> {
        observe(self.create_inner(tenant_id, patient_id, authority).await)
    }

    /// Move a CREATED encounter to ACTIVE.
    pub async fn activate(
        &self,
        tenant_id: &TenantId,
        encounter_id: EncounterId,
        authority: &AuthorityClaims,
    ) -> Result<EncounterRecord> {
        observe(
            self.transition(tenant_id, encounter_id, authority, Transition::Activate)
                .await,
        )
    }

    /// Move an ACTIVE encounter to COMPLETED.
    pub async fn complete(
        &self,
        tenant_id: &TenantId,
        encounter_id: EncounterId,
        authority: &AuthorityClaims,
    ) -> Result<EncounterRecord> {
        observe(
            self.transition(tenant_id, encounter_id, authority, Transition::Complete)
                .await,
        )
    }

    /// Read the current state of an encounter.
    pub async fn get(
        &self,
        tenant_id: &TenantId,
        encounter_id: EncounterId,
        authority: &AuthorityClaims,
    ) -> Result<EncounterRecord> {
        observe(self.get_inner(tenant_id, encounter_id, authority).await)
    }

    async fn create_inner(
        &self,
        tenant_id: &TenantId,
        patient_id: &PatientId,
        authority: &AuthorityClaims,
    ) -> Result<EncounterRecord> {
        let ctx = AuthorityContext::from_claims(authority)?;
        if !ctx.is_scoped_to(tenant_id) {
            warn!(
                tenant_id = %tenant_id,
                correlation_id = %ctx.correlation_id(),
                "Create rejected: authority scoped to another tenant"
            );
            return Err(ServiceError::Forbidden(
                "Authority is not scoped to the tenant".to_string(),
            ));
        }
        require_capability(&ctx, Capability::EncounterCreate)?;

        let record = EncounterRecord::new(
            tenant_id.clone(),
            EncounterId::new_v4(),
            patient_id.clone(),
            Utc::now(),
        );
        let _guard = self.locks.lock(&record.key()).await;

        self.repo.create(&record).await?;
        self.emit(&ctx, &record, AuditAction::EncounterCreated).await?;

        Ok(record)
    }

    async fn transition(
        &self,
        tenant_id: &TenantId,
        encounter_id: EncounterId,
        authority: &AuthorityClaims,
        transition: Transition,
    ) -> Result<EncounterRecord> {
        let ctx = AuthorityContext::from_claims(authority)?;
        let key = scoped_key(&ctx, tenant_id, encounter_id)?;

        // Held across read, write and audit so per-key audit order matches
        // commit order.
        let _guard = self.locks.lock(&key).await;

        let current = self.load(&ctx, &key).await?;
        let capability = match transition {
            Transition::Activate => Capability::EncounterActivate,
            Transition::Complete => Capability::EncounterComplete,
        };
        require_capability(&ctx, capability)?;

        let next = current.advance(transition, Utc::now())?;
        self.repo.update(&next, current.status()).await?;
        self.emit(&ctx, &next, AuditAction::from(transition)).await?;

        Ok(next)
    }

    async fn get_inner(
        &self,
        tenant_id: &TenantId,
        encounter_id: EncounterId,
        authority: &AuthorityClaims,
    ) -> Result<EncounterRecord> {
        let ctx = AuthorityContext::from_claims(authority)?;
        let key = scoped_key(&ctx, tenant_id, encounter_id)?;
        let record = self.load(&ctx, &key).await?;
        require_capability(&ctx, Capability::EncounterRead)?;
        Ok(record)
    }

    async fn load(&self, ctx: &AuthorityContext, key: &EncounterKey) -> Result<EncounterRecord> {
        match self.repo.get_by_id(key).await? {
            Some(record) if ctx.is_scoped_to(record.tenant_id()) => Ok(record),
            Some(_) => {
                warn!(
                    correlation_id = %ctx.correlation_id(),
                    "Store returned a record outside the requested tenant"
                );
                Err(not_found())
            }
            None => Err(not_found()),
        }
    }

    async fn emit(
        &self,
        ctx: &AuthorityContext,
        record: &EncounterRecord,
        action: AuditAction,
    ) -> Result<()> {
        let payload = AuditPayload::new(
            record.tenant_id().clone(),
            record.encounter_id(),
            ctx.actor_id().clone(),
            action,
            ctx.correlation_id().clone(),
        );

        if let Err(err) = self.audit.emit(&payload).await {
            tracing::error!(
                action = %action,
                tenant_id = %record.tenant_id(),
                encounter_id = %record.encounter_id(),
                correlation_id = %ctx.correlation_id(),
                sink = self.audit.sink_name(),
                "Committed encounter write has no audit entry"
            );
            return Err(err.into());
        }

        metrics::record_transition(action);
        info!(
            action = %action,
            tenant_id = %record.tenant_id(),
            encounter_id = %record.encounter_id(),
            status = %record.status(),
            correlation_id = %ctx.correlation_id(),
            "Encounter mutation committed"
        );
        Ok(())
    }
}

/// Identity key for an operation, or NOT_FOUND when the caller's authority
/// belongs to another tenant. Existence is never confirmed across tenants.
fn scoped_key(
    ctx: &AuthorityContext,
    tenant_id: &TenantId,
    encounter_id: EncounterId,
) -> Result<EncounterKey> {
    if !ctx.is_scoped_to(tenant_id) {
        warn!(
            tenant_id = %tenant_id,
            correlation_id = %ctx.correlation_id(),
            "Cross-tenant encounter access rejected"
        );
        return Err(not_found());
    }
    Ok(EncounterKey::new(tenant_id.clone(), encounter_id))
}

fn require_capability(ctx: &AuthorityContext, capability: Capability) -> Result<()> {
    if ctx.has_capability(capability) {
        return Ok(());
    }
    warn!(
        capability = %capability,
        correlation_id = %ctx.correlation_id(),
        "Missing capability"
    );
    Err(ServiceError::Forbidden(format!(
        "Missing capability {}",
        capability
    )))
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("Encounter not found".to_string())
}

fn observe<T>(result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        metrics::record_error(err.kind());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::sink::MockAuditSink;
    use crate::audit::AuditError;
    use crate::domain::EncounterStatus;
    use crate::error::ErrorKind;
    use crate::repository::encounter::MockEncounterRepository;
    use crate::repository::StoreError;
    use mockall::predicate::*;

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).unwrap()
    }

    fn patient() -> PatientId {
        PatientId::parse("p1").unwrap()
    }

    fn claims(tenant_id: &str, capabilities: &[Capability]) -> AuthorityClaims {
        AuthorityClaims::new("dr-a", tenant_id, capabilities).with_correlation_id("req-1")
    }

    fn full_claims() -> AuthorityClaims {
        claims("t1", &[Capability::EncounterAll])
    }

    fn stored(status: EncounterStatus) -> EncounterRecord {
        let created = EncounterRecord::new(tenant("t1"), EncounterId::new_v4(), patient(), Utc::now());
        match status {
            EncounterStatus::Created => created,
            EncounterStatus::Active => created.advance(Transition::Activate, Utc::now()).unwrap(),
            EncounterStatus::Completed => created
                .advance(Transition::Activate, Utc::now())
                .unwrap()
                .advance(Transition::Complete, Utc::now())
                .unwrap(),
        }
    }

    fn create_test_service(
        repo: MockEncounterRepository,
        sink: MockAuditSink,
    ) -> EncounterService<MockEncounterRepository, MockAuditSink> {
        EncounterService::new(Arc::new(repo), Arc::new(sink))
    }

    fn sink_expecting(action: AuditAction) -> MockAuditSink {
        let mut sink = MockAuditSink::new();
        sink.expect_sink_name().returning(|| "mock");
        sink.expect_emit()
            .withf(move |p| {
                p.action() == action
                    && p.actor_id().as_str() == "dr-a"
                    && p.correlation_id().as_str() == "req-1"
            })
            .times(1)
            .returning(|_| Ok(()));
        sink
    }

    #[tokio::test]
    async fn test_create_success() {
        let mut repo = MockEncounterRepository::new();
        repo.expect_create()
            .withf(|r| r.status() == EncounterStatus::Created && r.tenant_id().as_str() == "t1")
            .times(1)
            .returning(|_| Ok(()));

        let service = create_test_service(repo, sink_expecting(AuditAction::EncounterCreated));
        let record = service
            .create(&tenant("t1"), &patient(), &full_claims())
            .await
            .unwrap();

        assert_eq!(record.status(), EncounterStatus::Created);
        assert_eq!(record.patient_id().as_str(), "p1");
        assert!(!record.encounter_id().is_nil());
    }

    #[tokio::test]
    async fn test_create_absent_authority_touches_nothing() {
        // No expectations: any repository or sink call panics the mock.
        let service = create_test_service(MockEncounterRepository::new(), MockAuditSink::new());

        let err = service
            .create(&tenant("t1"), &patient(), &AuthorityClaims::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_create_malformed_authority_touches_nothing() {
        let service = create_test_service(MockEncounterRepository::new(), MockAuditSink::new());
        let mut malformed = full_claims();
        malformed.capabilities.push("encounter:purge".to_string());

        let err = service
            .create(&tenant("t1"), &patient(), &malformed)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_create_other_tenant_forbidden() {
        let service = create_test_service(MockEncounterRepository::new(), MockAuditSink::new());

        let err = service
            .create(&tenant("t1"), &patient(), &claims("t2", &[Capability::EncounterAll]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_create_missing_capability_forbidden() {
        let service = create_test_service(MockEncounterRepository::new(), MockAuditSink::new());

        let err = service
            .create(&tenant("t1"), &patient(), &claims("t1", &[Capability::EncounterActivate]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_create_duplicate_key_conflict_without_audit() {
        let mut repo = MockEncounterRepository::new();
        repo.expect_create()
            .times(1)
            .returning(|_| Err(StoreError::DuplicateKey));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .create(&tenant("t1"), &patient(), &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_create_audit_failure_is_system_error() {
        let mut repo = MockEncounterRepository::new();
        repo.expect_create().times(1).returning(|_| Ok(()));

        let mut sink = MockAuditSink::new();
        sink.expect_sink_name().returning(|| "mock");
        sink.expect_emit()
            .times(1)
            .returning(|_| Err(AuditError::Unavailable("connection reset by peer".to_string())));

        let service = create_test_service(repo, sink);
        let err = service
            .create(&tenant("t1"), &patient(), &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SystemError);
        assert!(!err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_create_store_backend_error_sanitized() {
        let mut repo = MockEncounterRepository::new();
        repo.expect_create()
            .returning(|_| Err(StoreError::Backend("INSERT INTO encounters failed".to_string())));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .create(&tenant("t1"), &patient(), &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SystemError);
        assert!(!err.to_string().contains("INSERT"));
    }

    #[tokio::test]
    async fn test_activate_success() {
        let current = stored(EncounterStatus::Created);
        let key = current.key();
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .with(eq(key))
            .times(1)
            .returning(move |_| Ok(Some(current.clone())));
        repo.expect_update()
            .withf(|r, expected| {
                r.status() == EncounterStatus::Active && *expected == EncounterStatus::Created
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = create_test_service(repo, sink_expecting(AuditAction::EncounterActivated));
        let record = service.activate(&tenant("t1"), id, &full_claims()).await.unwrap();

        assert_eq!(record.status(), EncounterStatus::Active);
        assert!(record.updated_at() >= record.created_at());
    }

    #[tokio::test]
    async fn test_activate_not_found() {
        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id().times(1).returning(|_| Ok(None));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .activate(&tenant("t1"), EncounterId::new_v4(), &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_activate_cross_tenant_is_not_found_without_lookup() {
        let service = create_test_service(MockEncounterRepository::new(), MockAuditSink::new());

        let err = service
            .activate(
                &tenant("t1"),
                EncounterId::new_v4(),
                &claims("t2", &[Capability::EncounterAll]),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_activate_missing_capability_forbidden() {
        let current = stored(EncounterStatus::Created);
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(current.clone())));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .activate(&tenant("t1"), id, &claims("t1", &[Capability::EncounterComplete]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_activate_twice_invalid_state_without_write() {
        let current = stored(EncounterStatus::Active);
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(current.clone())));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .activate(&tenant("t1"), id, &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_complete_before_activate_invalid_state() {
        let current = stored(EncounterStatus::Created);
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(current.clone())));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .complete(&tenant("t1"), id, &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_complete_from_completed_invalid_state() {
        let current = stored(EncounterStatus::Completed);
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(current.clone())));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .complete(&tenant("t1"), id, &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_complete_success() {
        let current = stored(EncounterStatus::Active);
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        repo.expect_update()
            .withf(|r, expected| {
                r.status() == EncounterStatus::Completed && *expected == EncounterStatus::Active
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = create_test_service(repo, sink_expecting(AuditAction::EncounterCompleted));
        let record = service.complete(&tenant("t1"), id, &full_claims()).await.unwrap();

        assert_eq!(record.status(), EncounterStatus::Completed);
    }

    #[tokio::test]
    async fn test_stale_write_is_conflict_without_audit() {
        let current = stored(EncounterStatus::Created);
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        repo.expect_update().times(1).returning(|_, _| {
            Err(StoreError::StaleWrite {
                expected: EncounterStatus::Created,
                actual: EncounterStatus::Active,
            })
        });

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .activate(&tenant("t1"), id, &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_store_returning_foreign_tenant_record_is_not_found() {
        let foreign = EncounterRecord::new(tenant("t2"), EncounterId::new_v4(), patient(), Utc::now());
        let id = foreign.encounter_id();

        let mut repo = MockEncounterRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(foreign.clone())));

        let service = create_test_service(repo, MockAuditSink::new());
        let err = service
            .activate(&tenant("t1"), id, &full_claims())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_get_requires_read_capability() {
        let current = stored(EncounterStatus::Created);
        let id = current.encounter_id();

        let mut repo = MockEncounterRepository::new();
        let found = current.clone();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(found.clone())));

        let service = create_test_service(repo, MockAuditSink::new());

        let record = service
            .get(&tenant("t1"), id, &claims("t1", &[Capability::EncounterRead]))
            .await
            .unwrap();
        assert_eq!(record, current);

        let err = service
            .get(&tenant("t1"), id, &claims("t1", &[Capability::EncounterCreate]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
