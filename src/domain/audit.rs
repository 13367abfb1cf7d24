//! Audit payload model

use super::common::{ActorId, CorrelationId, EncounterId, TenantId};
use super::encounter::Transition;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Mutation recorded by an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    EncounterCreated,
    EncounterActivated,
    EncounterCompleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::EncounterCreated => "ENCOUNTER_CREATED",
            AuditAction::EncounterActivated => "ENCOUNTER_ACTIVATED",
            AuditAction::EncounterCompleted => "ENCOUNTER_COMPLETED",
        }
    }
}

impl From<Transition> for AuditAction {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Activate => AuditAction::EncounterActivated,
            Transition::Complete => AuditAction::EncounterCompleted,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable fact describing one committed encounter mutation.
///
/// Fields are private: a payload is built once by the encounter service and
/// only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPayload {
    tenant_id: TenantId,
    encounter_id: EncounterId,
    actor_id: ActorId,
    action: AuditAction,
    #[serde(serialize_with = "serialize_iso8601")]
    timestamp: DateTime<Utc>,
    correlation_id: CorrelationId,
}

fn serialize_iso8601<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl AuditPayload {
    pub(crate) fn new(
        tenant_id: TenantId,
        encounter_id: EncounterId,
        actor_id: ActorId,
        action: AuditAction,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            tenant_id,
            encounter_id,
            actor_id,
            action,
            timestamp: Utc::now(),
            correlation_id,
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn encounter_id(&self) -> EncounterId {
        self.encounter_id
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}
