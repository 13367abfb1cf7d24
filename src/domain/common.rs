//! Common identifier types for domain models

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Rejected identifier input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error("{0} is not a valid UUID")]
    InvalidUuid(&'static str),
}

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse a caller-supplied identifier, rejecting blank input.
            pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(IdentifierError::Blank($label));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

string_identifier!(
    /// Tenant isolation key
    TenantId,
    "tenant id"
);
string_identifier!(
    /// Patient reference; never logged
    PatientId,
    "patient id"
);
string_identifier!(
    /// Acting identity asserted by the caller
    ActorId,
    "actor id"
);
string_identifier!(
    /// Request correlation identifier shared across audit entries
    CorrelationId,
    "correlation id"
);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Service-generated encounter identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncounterId(pub Uuid);

impl EncounterId {
    pub fn new_v4() -> Self {
        EncounterId(Uuid::new_v4())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn parse_str(s: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(s)
            .map(EncounterId)
            .map_err(|_| IdentifierError::InvalidUuid("encounter id"))
    }
}

impl From<Uuid> for EncounterId {
    fn from(uuid: Uuid) -> Self {
        EncounterId(uuid)
    }
}

impl From<EncounterId> for Uuid {
    fn from(id: EncounterId) -> Self {
        id.0
    }
}

impl std::fmt::Display for EncounterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for EncounterId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

/// Identity key of an encounter: unique across all tenants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncounterKey {
    pub tenant_id: TenantId,
    pub encounter_id: EncounterId,
}

impl EncounterKey {
    pub fn new(tenant_id: TenantId, encounter_id: EncounterId) -> Self {
        Self {
            tenant_id,
            encounter_id,
        }
    }
}

impl std::fmt::Display for EncounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.encounter_id)
    }
}
