//! Encounter Core - clinical encounter lifecycle service
//!
//! This crate provides the authorized service boundary for encounters: the
//! lifecycle state machine, mandatory audit emission for every committed
//! mutation, and the mapping of failures to transport-safe responses.

pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorKind, ErrorResponse, Result, ServiceError};
pub use service::EncounterService;
