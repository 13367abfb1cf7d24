//! Domain models for Encounter Core

pub mod audit;
pub mod authority;
pub mod common;
pub mod encounter;

pub use audit::*;
pub use authority::*;
pub use common::*;
pub use encounter::*;
