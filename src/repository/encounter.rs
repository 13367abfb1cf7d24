//! Encounter record store

use crate::domain::{EncounterKey, EncounterRecord, EncounterStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Record store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record with this identity key already exists")]
    DuplicateKey,

    #[error("record does not exist")]
    Missing,

    #[error("stored status {actual} does not match expected {expected}")]
    StaleWrite {
        expected: EncounterStatus,
        actual: EncounterStatus,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Keyed storage for encounter records.
///
/// The store performs no business validation; the encounter service owns every
/// lifecycle rule.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncounterRepository: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::DuplicateKey`] if the
    /// identity key is taken.
    async fn create(&self, record: &EncounterRecord) -> Result<(), StoreError>;

    /// Fetch a record; absence is `Ok(None)`.
    async fn get_by_id(&self, key: &EncounterKey) -> Result<Option<EncounterRecord>, StoreError>;

    /// Overwrite an existing record if its stored status still equals
    /// `expected`.
    async fn update(
        &self,
        record: &EncounterRecord,
        expected: EncounterStatus,
    ) -> Result<(), StoreError>;
}

/// In-memory reference store.
///
/// The map lock is only held to find or insert a slot; each record has its own
/// mutex, so writes to different keys never wait on each other.
#[derive(Default)]
pub struct InMemoryEncounterRepository {
    records: RwLock<HashMap<EncounterKey, Arc<Mutex<EncounterRecord>>>>,
}

impl InMemoryEncounterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn slot(&self, key: &EncounterKey) -> Option<Arc<Mutex<EncounterRecord>>> {
        self.records.read().await.get(key).cloned()
    }
}

#[async_trait]
impl EncounterRepository for InMemoryEncounterRepository {
    async fn create(&self, record: &EncounterRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let key = record.key();
        if records.contains_key(&key) {
            return Err(StoreError::DuplicateKey);
        }
        records.insert(key, Arc::new(Mutex::new(record.clone())));
        Ok(())
    }

    async fn get_by_id(&self, key: &EncounterKey) -> Result<Option<EncounterRecord>, StoreError> {
        match self.slot(key).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        record: &EncounterRecord,
        expected: EncounterStatus,
    ) -> Result<(), StoreError> {
        let slot = self
            .slot(&record.key())
            .await
            .ok_or(StoreError::Missing)?;
        let mut stored = slot.lock().await;
        if stored.status() != expected {
            return Err(StoreError::StaleWrite {
                expected,
                actual: stored.status(),
            });
        }
        *stored = record.clone();
        Ok(())
    }
}
