//! Repository interfaces for the facility's aggregates.
//!
//! Persistence is deliberately abstract: implementations provide no
//! transactions, and callers must tolerate last-write-wins races between
//! concurrent writers. Each aggregate exposes its identity through an
//! explicit accessor on the entity type, never by reflection.

use crate::domain::membership::{Customer, MonthlyTicket};
use crate::domain::pricing::PricePolicy;
use crate::domain::sessions::ParkingSession;
use crate::domain::types::{CustomerId, PolicyId, SessionId, TicketId, ZoneId};
use crate::domain::vehicles::VehicleCategory;
use crate::domain::zones::Zone;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use parkade_common::LicensePlate;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &ParkingSession) -> Result<()>;
    async fn update(&self, session: &ParkingSession) -> Result<()>;
    async fn get(&self, id: &SessionId) -> Result<Option<ParkingSession>>;
    /// The one unresolved (Active or PendingPayment) session for a plate,
    /// if any.
    async fn find_active_or_pending_by_plate(
        &self,
        plate: &LicensePlate,
    ) -> Result<Option<ParkingSession>>;
    async fn find_by_ticket_id(&self, ticket_id: &TicketId) -> Result<Option<ParkingSession>>;
    /// Live occupancy: sessions in the zone whose status still occupies a
    /// slot.
    async fn count_occupied_in_zone(&self, zone_id: &ZoneId) -> Result<u32>;
    /// Running count of daily tickets issued on a calendar date, used for
    /// ticket-id sequencing.
    async fn count_daily_tickets_issued_on(&self, date: NaiveDate) -> Result<u32>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ZoneDirectory: Send + Sync {
    async fn list_zones(&self) -> Result<Vec<Zone>>;
    async fn get(&self, id: &ZoneId) -> Result<Option<Zone>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricePolicyRepository: Send + Sync {
    async fn get_by_id(&self, id: &PolicyId) -> Result<Option<PricePolicy>>;
    async fn get_by_vehicle_type(&self, category: VehicleCategory) -> Result<Option<PricePolicy>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MonthlyTicketRepository: Send + Sync {
    async fn create(&self, ticket: &MonthlyTicket) -> Result<()>;
    async fn update(&self, ticket: &MonthlyTicket) -> Result<()>;
    async fn get(&self, id: &TicketId) -> Result<Option<MonthlyTicket>>;
    /// The ticket blocking a new registration for this plate (pending,
    /// active, or awaiting cancellation approval), if any.
    async fn find_active_by_plate(&self, plate: &LicensePlate) -> Result<Option<MonthlyTicket>>;
    /// Every non-terminal ticket; the expiry scanner walks this list.
    async fn list_active(&self) -> Result<Vec<MonthlyTicket>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn create(&self, customer: &Customer) -> Result<()>;
    async fn get(&self, id: &CustomerId) -> Result<Option<Customer>>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>>;
}
