use parkade_common::LicensePlate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vehicle categories accepted by the facility.
///
/// The fee factor is a pure per-category lookup; there is no behavioral
/// hierarchy behind these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCategory {
    Car,
    ElectricCar,
    Motorbike,
    ElectricMotorbike,
    Bicycle,
}

impl VehicleCategory {
    /// Resolve a category from a type code. Unknown codes resolve to `Car`:
    /// the entry gate never turns a vehicle away over a typo in the code.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "CAR" => VehicleCategory::Car,
            "ELECTRIC_CAR" => VehicleCategory::ElectricCar,
            "MOTORBIKE" => VehicleCategory::Motorbike,
            "ELECTRIC_MOTORBIKE" => VehicleCategory::ElectricMotorbike,
            "BICYCLE" => VehicleCategory::Bicycle,
            _ => VehicleCategory::Car,
        }
    }

    /// Canonical type code for this category.
    pub fn code(&self) -> &'static str {
        match self {
            VehicleCategory::Car => "CAR",
            VehicleCategory::ElectricCar => "ELECTRIC_CAR",
            VehicleCategory::Motorbike => "MOTORBIKE",
            VehicleCategory::ElectricMotorbike => "ELECTRIC_MOTORBIKE",
            VehicleCategory::Bicycle => "BICYCLE",
        }
    }

    pub fn is_electric(&self) -> bool {
        matches!(
            self,
            VehicleCategory::ElectricCar | VehicleCategory::ElectricMotorbike
        )
    }

    /// Hourly-fee multiplier relative to the policy's base rate. Electric
    /// variants are discounted against their combustion counterpart.
    pub fn fee_factor(&self) -> Decimal {
        match self {
            VehicleCategory::Car => Decimal::new(10, 1),               // 1.0
            VehicleCategory::ElectricCar => Decimal::new(8, 1),        // 0.8
            VehicleCategory::Motorbike => Decimal::new(5, 1),          // 0.5
            VehicleCategory::ElectricMotorbike => Decimal::new(4, 1),  // 0.4
            VehicleCategory::Bicycle => Decimal::new(1, 1),            // 0.1
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A vehicle as seen at the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub plate: LicensePlate,
    pub category: VehicleCategory,
}

impl Vehicle {
    pub fn new(plate: LicensePlate, category: VehicleCategory) -> Self {
        Self { plate, category }
    }
}
