//! Flat-file JSON persistence.
//!
//! One file per collection under the configured data directory. Each write
//! rewrites the whole collection through a temp file and an atomic rename,
//! so a crash mid-write never leaves a torn file. Concurrent writers are
//! last-write-wins; callers that need stronger ordering serialize through
//! [`crate::lock::KeyedLocks`] before touching the store.

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
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Records that can live in a [`JsonCollection`].
pub trait Identified {
    fn storage_key(&self) -> String;
}

impl Identified for ParkingSession {
    fn storage_key(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for Zone {
    fn storage_key(&self) -> String {
        self.id.as_str().to_string()
    }
}

impl Identified for PricePolicy {
    fn storage_key(&self) -> String {
        self.id.as_str().to_string()
    }
}

impl Identified for MonthlyTicket {
    fn storage_key(&self) -> String {
        self.id.as_str().to_string()
    }
}

impl Identified for Customer {
    fn storage_key(&self) -> String {
        self.id.to_string()
    }
}

/// A keyed collection backed by a single JSON file. The full collection is
/// held in memory; the file is only re-read at open.
pub struct JsonCollection<T> {
    path: PathBuf,
    records: RwLock<HashMap<String, T>>,
}

impl<T> JsonCollection<T>
where
    T: Identified + Serialize + DeserializeOwned + Clone,
{
    pub fn open(path: PathBuf) -> Result<Self> {
        let records = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let items: Vec<T> = serde_json::from_str(&raw)?;
            items
                .into_iter()
                .map(|item| (item.storage_key(), item))
                .collect()
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), "opened json collection");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub async fn upsert(&self, item: &T) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(item.storage_key(), item.clone());
        self.persist(&records).await
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        self.records.read().await.get(key).cloned()
    }

    pub async fn find<F>(&self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.records
            .read()
            .await
            .values()
            .find(|item| predicate(item))
            .cloned()
    }

    pub async fn filter<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.records
            .read()
            .await
            .values()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    pub async fn count<F>(&self, predicate: F) -> u32
    where
        F: Fn(&T) -> bool,
    {
        self.records
            .read()
            .await
            .values()
            .filter(|item| predicate(item))
            .count() as u32
    }

    /// Write-all through a temp file then rename over the live file. The
    /// collection write lock is held for the duration, so two upserts on the
    /// same collection never interleave their file writes.
    async fn persist(&self, records: &HashMap<String, T>) -> Result<()> {
        let items: Vec<&T> = records.values().collect();
        let raw = serde_json::to_string_pretty(&items)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Flat-file store implementing every repository trait.
pub struct JsonFileStore {
    sessions: JsonCollection<ParkingSession>,
    zones: JsonCollection<Zone>,
    policies: JsonCollection<PricePolicy>,
    monthly: JsonCollection<MonthlyTicket>,
    customers: JsonCollection<Customer>,
}

impl JsonFileStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            sessions: JsonCollection::open(data_dir.join("sessions.json"))?,
            zones: JsonCollection::open(data_dir.join("zones.json"))?,
            policies: JsonCollection::open(data_dir.join("policies.json"))?,
            monthly: JsonCollection::open(data_dir.join("monthly_tickets.json"))?,
            customers: JsonCollection::open(data_dir.join("customers.json"))?,
        })
    }

    /// Seed zones and policies, typically from an operator-provided layout.
    pub async fn seed(&self, zones: Vec<Zone>, policies: Vec<PricePolicy>) -> Result<()> {
        for zone in &zones {
            self.zones.upsert(zone).await?;
        }
        for policy in &policies {
            self.policies.upsert(policy).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for JsonFileStore {
    async fn create(&self, session: &ParkingSession) -> Result<()> {
        self.sessions.upsert(session).await
    }

    async fn update(&self, session: &ParkingSession) -> Result<()> {
        self.sessions.upsert(session).await
    }

    async fn get(&self, id: &SessionId) -> Result<Option<ParkingSession>> {
        Ok(self.sessions.get(&id.to_string()).await)
    }

    async fn find_active_or_pending_by_plate(
        &self,
        plate: &LicensePlate,
    ) -> Result<Option<ParkingSession>> {
        Ok(self
            .sessions
            .find(|s| s.vehicle.plate == *plate && s.status.occupies_slot())
            .await)
    }

    async fn find_by_ticket_id(&self, ticket_id: &TicketId) -> Result<Option<ParkingSession>> {
        Ok(self.sessions.find(|s| s.ticket.id == *ticket_id).await)
    }

    async fn count_occupied_in_zone(&self, zone_id: &ZoneId) -> Result<u32> {
        Ok(self
            .sessions
            .count(|s| s.zone_id == *zone_id && s.status.occupies_slot())
            .await)
    }

    async fn count_daily_tickets_issued_on(&self, date: NaiveDate) -> Result<u32> {
        Ok(self
            .sessions
            .count(|s| {
                s.ticket.ticket_type == TicketType::Daily
                    && s.ticket.issue_time.date_naive() == date
            })
            .await)
    }
}

#[async_trait]
impl ZoneDirectory for JsonFileStore {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let mut zones = self.zones.filter(|_| true).await;
        zones.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(zones)
    }

    async fn get(&self, id: &ZoneId) -> Result<Option<Zone>> {
        Ok(self.zones.get(id.as_str()).await)
    }
}

#[async_trait]
impl PricePolicyRepository for JsonFileStore {
    async fn get_by_id(&self, id: &PolicyId) -> Result<Option<PricePolicy>> {
        Ok(self.policies.get(id.as_str()).await)
    }

    async fn get_by_vehicle_type(&self, category: VehicleCategory) -> Result<Option<PricePolicy>> {
        Ok(self.policies.find(|p| p.vehicle_type == category).await)
    }
}

#[async_trait]
impl MonthlyTicketRepository for JsonFileStore {
    async fn create(&self, ticket: &MonthlyTicket) -> Result<()> {
        self.monthly.upsert(ticket).await
    }

    async fn update(&self, ticket: &MonthlyTicket) -> Result<()> {
        self.monthly.upsert(ticket).await
    }

    async fn get(&self, id: &TicketId) -> Result<Option<MonthlyTicket>> {
        Ok(self.monthly.get(id.as_str()).await)
    }

    async fn find_active_by_plate(&self, plate: &LicensePlate) -> Result<Option<MonthlyTicket>> {
        Ok(self
            .monthly
            .find(|t| t.vehicle_plate == *plate && t.status.blocks_new_registration())
            .await)
    }

    async fn list_active(&self) -> Result<Vec<MonthlyTicket>> {
        Ok(self.monthly.filter(|t| !t.status.is_terminal()).await)
    }
}

#[async_trait]
impl CustomerRepository for JsonFileStore {
    async fn create(&self, customer: &Customer) -> Result<()> {
        self.customers.upsert(customer).await
    }

    async fn get(&self, id: &CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.get(&id.to_string()).await)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        Ok(self.customers.find(|c| c.phone == phone).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::default_policy;
    use parkade_common::GateId;
    use rust_decimal_macros::dec;

    fn test_zone(id: &str) -> Zone {
        Zone {
            id: ZoneId::new(id),
            vehicle_category: "CAR".to_string(),
            electric_only: false,
            capacity: 10,
            gate_ids: vec![GateId::new("G1").unwrap()],
            price_policy_id: None,
        }
    }

    #[tokio::test]
    async fn zones_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store
                .seed(vec![test_zone("Z-CAR-1")], vec![default_policy()])
                .await
                .unwrap();
        }

        let store = JsonFileStore::open(dir.path()).unwrap();
        let zones = store.list_zones().await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].id.as_str(), "Z-CAR-1");

        let policy = store
            .get_by_id(&default_policy().id)
            .await
            .unwrap()
            .expect("seeded policy");
        assert_eq!(policy.rate_per_hour.as_decimal(), dec!(10000));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let mut zone = test_zone("Z-CAR-1");
        store.seed(vec![zone.clone()], vec![]).await.unwrap();

        zone.capacity = 25;
        store.zones.upsert(&zone).await.unwrap();

        let reread = ZoneDirectory::get(&store, &zone.id).await.unwrap().unwrap();
        assert_eq!(reread.capacity, 25);
        assert_eq!(store.list_zones().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.list_zones().await.unwrap().is_empty());
    }
}
