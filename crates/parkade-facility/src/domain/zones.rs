use crate::domain::types::{PolicyId, ZoneId};
use crate::domain::vehicles::VehicleCategory;
use crate::error::Result;
use crate::storage::repositories::{SessionRepository, ZoneDirectory};
use parkade_common::GateId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A capacity-bounded physical parking area for one vehicle category.
///
/// Occupancy is derived, never stored: it is the live count of sessions in
/// the zone whose status still occupies a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    /// Broad category code; matching is substring-style (`CAR` accepts any
    /// type code containing `CAR`).
    pub vehicle_category: String,
    pub electric_only: bool,
    pub capacity: u32,
    /// Empty means unrestricted.
    pub gate_ids: Vec<GateId>,
    pub price_policy_id: Option<PolicyId>,
}

impl Zone {
    /// Substring-style category match on normalized type codes.
    pub fn accepts_category(&self, type_code: &str) -> bool {
        type_code
            .to_ascii_uppercase()
            .contains(&self.vehicle_category.to_ascii_uppercase())
    }

    pub fn admits_gate(&self, gate: &GateId) -> bool {
        self.gate_ids.is_empty() || self.gate_ids.contains(gate)
    }
}

/// Finds a zone with free capacity for a vehicle arriving at a gate.
pub struct ZoneAllocator {
    zones: Arc<dyn ZoneDirectory>,
    sessions: Arc<dyn SessionRepository>,
}

impl ZoneAllocator {
    pub fn new(zones: Arc<dyn ZoneDirectory>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { zones, sessions }
    }

    /// Matching precedence:
    /// 1. electric vehicles first try electric-only zones for their category
    ///    reachable from the gate;
    /// 2. then non-electric-only zones under the same category/gate rules;
    /// 3. finally any zone of the category, ignoring gate wiring, so that
    ///    check-in is blocked only when every zone of the right category is
    ///    physically full.
    ///
    /// Every pass counts occupancy live against the session store.
    pub async fn find_zone(
        &self,
        category: VehicleCategory,
        gate: &GateId,
    ) -> Result<Option<Zone>> {
        let zones = self.zones.list_zones().await?;
        let code = category.code();

        if category.is_electric() {
            let electric = zones
                .iter()
                .filter(|z| z.electric_only && z.accepts_category(code) && z.admits_gate(gate));
            if let Some(zone) = self.first_with_capacity(electric).await? {
                return Ok(Some(zone));
            }
        }

        let general = zones
            .iter()
            .filter(|z| !z.electric_only && z.accepts_category(code) && z.admits_gate(gate));
        if let Some(zone) = self.first_with_capacity(general).await? {
            return Ok(Some(zone));
        }

        // Gate-agnostic fallback.
        let any = zones.iter().filter(|z| z.accepts_category(code));
        self.first_with_capacity(any).await
    }

    async fn first_with_capacity<'a>(
        &self,
        candidates: impl Iterator<Item = &'a Zone>,
    ) -> Result<Option<Zone>> {
        for zone in candidates {
            let occupied = self.sessions.count_occupied_in_zone(&zone.id).await?;
            if occupied < zone.capacity {
                debug!(zone = %zone.id, occupied, capacity = zone.capacity, "zone selected");
                return Ok(Some(zone.clone()));
            }
        }
        Ok(None)
    }
}
