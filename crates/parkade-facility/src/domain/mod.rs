//! Domain model: sessions, payments, pricing, zones, vehicles and the
//! monthly-membership lifecycle.

pub mod membership;
pub mod payments;
pub mod pricing;
pub mod sessions;
pub mod types;
pub mod vehicles;
pub mod zones;
