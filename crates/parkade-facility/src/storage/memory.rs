//! In-memory store for tests and development.

use crate::domain::membership::{Customer, MonthlyTicket};
use crate::domain::pricing::PricePolicy;
use crate::domain::sessions::ParkingSession;
use crate::domain::types::{CustomerId, PolicyId, SessionId, TicketId, TicketType, ZoneId};
use crate::domain::vehicles::VehicleCategory;
use crate::domain::zones::Zone;
use crate::error::Result;
use crate::storage::repositories::{
    CustomerRepository, MonthlyTicketRepository, PricePolicyRepository, SessionRepository,
    ZoneDirectory,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use parkade_common::LicensePlate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<SessionId, ParkingSession>>>,
    zones: Arc<RwLock<HashMap<ZoneId, Zone>>>,
    policies: Arc<RwLock<HashMap<PolicyId, PricePolicy>>>,
    monthly: Arc<RwLock<HashMap<TicketId, MonthlyTicket>>>,
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_zone(&self, zone: Zone) {
        self.zones.write().await.insert(zone.id.clone(), zone);
    }

    pub async fn add_policy(&self, policy: PricePolicy) {
        self.policies
            .write()
            .await
            .insert(policy.id.clone(), policy);
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create(&self, session: &ParkingSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn update(&self, session: &ParkingSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<ParkingSession>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn find_active_or_pending_by_plate(
        &self,
        plate: &LicensePlate,
    ) -> Result<Option<ParkingSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.vehicle.plate == *plate && s.status.occupies_slot())
            .cloned())
    }

    async fn find_by_ticket_id(&self, ticket_id: &TicketId) -> Result<Option<ParkingSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.ticket.id == *ticket_id)
            .cloned())
    }

    async fn count_occupied_in_zone(&self, zone_id: &ZoneId) -> Result<u32> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.zone_id == *zone_id && s.status.occupies_slot())
            .count() as u32)
    }

    async fn count_daily_tickets_issued_on(&self, date: NaiveDate) -> Result<u32> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| {
                s.ticket.ticket_type == TicketType::Daily
                    && s.ticket.issue_time.date_naive() == date
            })
            .count() as u32)
    }
}

#[async_trait]
impl ZoneDirectory for MemoryStore {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let mut zones: Vec<Zone> = self.zones.read().await.values().cloned().collect();
        zones.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(zones)
    }

    async fn get(&self, id: &ZoneId) -> Result<Option<Zone>> {
        Ok(self.zones.read().await.get(id).cloned())
    }
}

#[async_trait]
impl PricePolicyRepository for MemoryStore {
    async fn get_by_id(&self, id: &PolicyId) -> Result<Option<PricePolicy>> {
        Ok(self.policies.read().await.get(id).cloned())
    }

    async fn get_by_vehicle_type(&self, category: VehicleCategory) -> Result<Option<PricePolicy>> {
        Ok(self
            .policies
            .read()
            .await
            .values()
            .find(|p| p.vehicle_type == category)
            .cloned())
    }
}

#[async_trait]
impl MonthlyTicketRepository for MemoryStore {
    async fn create(&self, ticket: &MonthlyTicket) -> Result<()> {
        self.monthly
            .write()
            .await
            .insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn update(&self, ticket: &MonthlyTicket) -> Result<()> {
        self.monthly
            .write()
            .await
            .insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn get(&self, id: &TicketId) -> Result<Option<MonthlyTicket>> {
        Ok(self.monthly.read().await.get(id).cloned())
    }

    async fn find_active_by_plate(&self, plate: &LicensePlate) -> Result<Option<MonthlyTicket>> {
        Ok(self
            .monthly
            .read()
            .await
            .values()
            .find(|t| t.vehicle_plate == *plate && t.status.blocks_new_registration())
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<MonthlyTicket>> {
        Ok(self
            .monthly
            .read()
            .await
            .values()
            .filter(|t| !t.status.is_terminal())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn create(&self, customer: &Customer) -> Result<()> {
        self.customers
            .write()
            .await
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get(&self, id: &CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.read().await.get(id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        Ok(self
            .customers
            .read()
            .await
            .values()
            .find(|c| c.phone == phone)
            .cloned())
    }
}
