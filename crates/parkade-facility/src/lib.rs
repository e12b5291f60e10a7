//! Parkade facility engine: parking session lifecycle, fee settlement and
//! monthly membership management for a gated parking facility.

pub mod config;
pub mod domain;
pub mod error;
pub mod facility;
pub mod gateway;
pub mod lock;
pub mod scanner;
pub mod storage;

pub use config::FacilityConfig;
pub use error::{FacilityError, Result};
pub use facility::{Collaborators, Facility};
