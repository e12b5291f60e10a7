//! Common types used across Parkade components

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for license plate validation
#[derive(Debug, Error)]
pub enum PlateError {
    #[error("license plate cannot be empty")]
    Empty,
    #[error("license plate too long (max 16 characters)")]
    TooLong,
    #[error("license plate contains invalid characters. Only alphanumeric characters, dots, and hyphens are allowed")]
    InvalidCharacters,
}

/// A validated, normalized license plate.
///
/// Plates are stored uppercase so lookups are case-insensitive. They must:
/// - Be between 1 and 16 characters long
/// - Only contain alphanumeric characters (a-z, A-Z, 0-9), dots (.), and hyphens (-)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicensePlate(String);

impl LicensePlate {
    /// Create a new validated plate, normalizing to uppercase.
    pub fn new(plate: impl Into<String>) -> Result<Self, PlateError> {
        let plate = plate.into().trim().to_uppercase();
        Self::validate(&plate)?;
        Ok(Self(plate))
    }

    fn validate(plate: &str) -> Result<(), PlateError> {
        if plate.is_empty() {
            return Err(PlateError::Empty);
        }
        if plate.len() > 16 {
            return Err(PlateError::TooLong);
        }
        if !plate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(PlateError::InvalidCharacters);
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LicensePlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LicensePlate {
    type Err = PlateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LicensePlate {
    type Error = PlateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LicensePlate> for String {
    fn from(value: LicensePlate) -> Self {
        value.0
    }
}

/// Error type for gate identifier validation
#[derive(Debug, Error)]
pub enum GateIdError {
    #[error("gate id cannot be empty")]
    Empty,
    #[error("gate id too long (max 32 characters)")]
    TooLong,
    #[error("gate id contains invalid characters. Only alphanumeric characters, hyphens, and underscores are allowed")]
    InvalidCharacters,
}

/// A validated gate identifier (e.g. `G1`, `NORTH-IN`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GateId(String);

impl GateId {
    pub fn new(id: impl Into<String>) -> Result<Self, GateIdError> {
        let id = id.into().trim().to_uppercase();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<(), GateIdError> {
        if id.is_empty() {
            return Err(GateIdError::Empty);
        }
        if id.len() > 32 {
            return Err(GateIdError::TooLong);
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(GateIdError::InvalidCharacters);
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GateId {
    type Err = GateIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GateId {
    type Error = GateIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GateId> for String {
    fn from(value: GateId) -> Self {
        value.0
    }
}
