//! Shared building blocks for Parkade services: validated identifier types
//! and unified logging initialization.

pub mod logging;
pub mod types;

pub use types::{GateId, GateIdError, LicensePlate, PlateError};
