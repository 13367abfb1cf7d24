//! Caller authority: raw claims and the validated context built from them

use super::common::{ActorId, CorrelationId, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use validator::Validate;

/// Capability granted to a caller for encounter operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "encounter:create")]
    EncounterCreate,
    #[serde(rename = "encounter:activate")]
    EncounterActivate,
    #[serde(rename = "encounter:complete")]
    EncounterComplete,
    #[serde(rename = "encounter:read")]
    EncounterRead,
    /// Grants every encounter capability
    #[serde(rename = "encounter:*")]
    EncounterAll,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::EncounterCreate => "encounter:create",
            Capability::EncounterActivate => "encounter:activate",
            Capability::EncounterComplete => "encounter:complete",
            Capability::EncounterRead => "encounter:read",
            Capability::EncounterAll => "encounter:*",
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = AuthorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "encounter:create" => Ok(Capability::EncounterCreate),
            "encounter:activate" => Ok(Capability::EncounterActivate),
            "encounter:complete" => Ok(Capability::EncounterComplete),
            "encounter:read" => Ok(Capability::EncounterRead),
            "encounter:*" => Ok(Capability::EncounterAll),
            _ => Err(AuthorityError::UnknownCapability),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an authority assertion is refused.
///
/// These stay inside the crate's logs; callers only ever see FORBIDDEN.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("authority claims failed validation: {0}")]
    Invalid(String),

    #[error("authority claims carry an unknown capability")]
    UnknownCapability,
}

impl From<validator::ValidationErrors> for AuthorityError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AuthorityError::Invalid(errors.to_string())
    }
}

fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        Err(validator::ValidationError::new("blank"))
    } else {
        Ok(())
    }
}

/// Authority asserted by the caller, as received from the transport.
///
/// Every field may be missing or malformed; [`AuthorityContext::from_claims`]
/// turns it into a usable context or refuses it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityClaims {
    #[validate(required, custom(function = "validate_not_blank"))]
    pub actor_id: Option<String>,
    #[validate(required, custom(function = "validate_not_blank"))]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub correlation_id: Option<String>,
}

impl AuthorityClaims {
    pub fn new(
        actor_id: impl Into<String>,
        tenant_id: impl Into<String>,
        capabilities: &[Capability],
    ) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
            tenant_id: Some(tenant_id.into()),
            capabilities: capabilities.iter().map(|c| c.as_str().to_string()).collect(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Validated authority for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityContext {
    actor_id: ActorId,
    tenant_id: TenantId,
    capabilities: HashSet<Capability>,
    correlation_id: CorrelationId,
}

impl AuthorityContext {
    /// Parse caller claims, failing closed on anything missing or unknown.
    ///
    /// A missing correlation id is generated; a present but blank one is
    /// rejected like any other malformed field.
    pub fn from_claims(claims: &AuthorityClaims) -> Result<Self, AuthorityError> {
        claims.validate()?;

        let actor_id = claims
            .actor_id
            .as_deref()
            .map(ActorId::parse)
            .transpose()
            .map_err(|e| AuthorityError::Invalid(e.to_string()))?
            .ok_or_else(|| AuthorityError::Invalid("actor id is required".to_string()))?;
        let tenant_id = claims
            .tenant_id
            .as_deref()
            .map(TenantId::parse)
            .transpose()
            .map_err(|e| AuthorityError::Invalid(e.to_string()))?
            .ok_or_else(|| AuthorityError::Invalid("tenant id is required".to_string()))?;

        let capabilities = claims
            .capabilities
            .iter()
            .map(|c| c.parse::<Capability>())
            .collect::<Result<HashSet<_>, _>>()?;

        let correlation_id = match claims.correlation_id.as_deref() {
            Some(raw) => {
                CorrelationId::parse(raw).map_err(|e| AuthorityError::Invalid(e.to_string()))?
            }
            None => CorrelationId::generate(),
        };

        Ok(Self {
            actor_id,
            tenant_id,
            capabilities,
            correlation_id,
        })
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Whether the context is scoped to `tenant_id`
    pub fn is_scoped_to(&self, tenant_id: &TenantId) -> bool {
        &self.tenant_id == tenant_id
    }

    /// Check if the caller holds a capability, directly or via `encounter:*`
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
            || self.capabilities.contains(&Capability::EncounterAll)
    }
}
