//! Data access layer (Repository pattern)

pub mod encounter;

pub use encounter::{EncounterRepository, InMemoryEncounterRepository, StoreError};
