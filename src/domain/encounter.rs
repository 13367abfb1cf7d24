//! Encounter domain model and lifecycle state machine

use super::common::{EncounterId, EncounterKey, PatientId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encounter lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncounterStatus {
    #[default]
    Created,
    Active,
    Completed,
}

impl EncounterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterStatus::Created => "CREATED",
            EncounterStatus::Active => "ACTIVE",
            EncounterStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EncounterStatus::Completed)
    }
}

impl std::str::FromStr for EncounterStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATED" => Ok(EncounterStatus::Created),
            "ACTIVE" => Ok(EncounterStatus::Active),
            "COMPLETED" => Ok(EncounterStatus::Completed),
            _ => Err(format!("Unknown encounter status: {}", s)),
        }
    }
}

impl std::fmt::Display for EncounterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-changing operation on an existing encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Activate,
    Complete,
}

impl Transition {
    /// Status the encounter must be in for the transition to fire.
    pub fn required_status(&self) -> EncounterStatus {
        match self {
            Transition::Activate => EncounterStatus::Created,
            Transition::Complete => EncounterStatus::Active,
        }
    }

    pub fn target_status(&self) -> EncounterStatus {
        match self {
            Transition::Activate => EncounterStatus::Active,
            Transition::Complete => EncounterStatus::Completed,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Activate => f.write_str("activate"),
            Transition::Complete => f.write_str("complete"),
        }
    }
}

/// A transition rejected by the state machine
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move encounter from {from} to {to}")]
pub struct InvalidTransition {
    pub from: EncounterStatus,
    pub to: EncounterStatus,
}

/// Resolve the status reached by applying `transition` to `current`.
///
/// `CREATED -> ACTIVE -> COMPLETED` are the only legal moves. Everything else,
/// including any pairing added later without an explicit arm, is rejected.
pub fn next_status(
    current: EncounterStatus,
    transition: Transition,
) -> std::result::Result<EncounterStatus, InvalidTransition> {
    match (current, transition) {
        (EncounterStatus::Created, Transition::Activate) => Ok(EncounterStatus::Active),
        (EncounterStatus::Active, Transition::Complete) => Ok(EncounterStatus::Completed),
        (from, transition) => Err(InvalidTransition {
            from,
            to: transition.target_status(),
        }),
    }
}

/// Encounter entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRecord {
    tenant_id: TenantId,
    encounter_id: EncounterId,
    patient_id: PatientId,
    status: EncounterStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EncounterRecord {
    /// A fresh encounter in the CREATED state.
    pub fn new(
        tenant_id: TenantId,
        encounter_id: EncounterId,
        patient_id: PatientId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            encounter_id,
            patient_id,
            status: EncounterStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn encounter_id(&self) -> EncounterId {
        self.encounter_id
    }

    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    pub fn status(&self) -> EncounterStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn key(&self) -> EncounterKey {
        EncounterKey::new(self.tenant_id.clone(), self.encounter_id)
    }

    /// Apply a lifecycle transition, returning the advanced copy.
    ///
    /// `updated_at` never moves backwards, even if the supplied clock does.
    pub fn advance(
        &self,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> std::result::Result<EncounterRecord, InvalidTransition> {
        let status = next_status(self.status, transition)?;
        Ok(EncounterRecord {
            status,
            updated_at: now.max(self.updated_at),
            ..self.clone()
        })
    }
}
