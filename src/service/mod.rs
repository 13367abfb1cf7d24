//! Business logic layer

pub mod encounter;
pub mod key_lock;

pub use encounter::EncounterService;
pub use key_lock::KeyLocks;
