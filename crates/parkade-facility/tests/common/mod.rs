//! Shared harness for integration tests: an in-memory facility with
//! instrumented collaborators.
#![allow(dead_code)]

use async_trait::async_trait;
use parkade_common::GateId;
use parkade_facility::config::FacilityConfig;
use parkade_facility::domain::pricing::default_policy;
use parkade_facility::domain::types::ZoneId;
use parkade_facility::domain::zones::Zone;
use parkade_facility::facility::{Collaborators, Facility};
use parkade_facility::gateway::{
    GateDevice, GatewayClient, GatewayResponse, LoggingIncidentSink, SimulatedGateway,
};
use parkade_facility::storage::memory::MemoryStore;
use parkade_facility::storage::Repositories;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Gate device that counts open requests.
#[derive(Default)]
pub struct CountingGate {
    opens: AtomicU32,
}

impl CountingGate {
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GateDevice for CountingGate {
    async fn open(&self, _gate: &GateId) -> anyhow::Result<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Gateway that errors on every request.
pub struct FailingGateway;

#[async_trait]
impl GatewayClient for FailingGateway {
    async fn request_payment(
        &self,
        _amount: parkade_facility::domain::types::Amount,
        _order_info: &str,
    ) -> anyhow::Result<GatewayResponse> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

/// Gateway that answers but declines every request.
pub struct DecliningGateway;

#[async_trait]
impl GatewayClient for DecliningGateway {
    async fn request_payment(
        &self,
        _amount: parkade_facility::domain::types::Amount,
        _order_info: &str,
    ) -> anyhow::Result<GatewayResponse> {
        Ok(GatewayResponse {
            accepted: false,
            transaction_code: String::new(),
            qr_content: None,
            payment_url: None,
            error: Some("merchant account suspended".to_string()),
        })
    }
}

pub fn fast_config() -> FacilityConfig {
    let mut config = FacilityConfig::default();
    config.payment.retry_backoff_ms = 1;
    config.payment.attempt_timeout_secs = 1;
    config.membership.attempt_timeout_secs = 1;
    config
}

pub fn car_zone(capacity: u32) -> Zone {
    Zone {
        id: ZoneId::new("Z-CAR-1"),
        vehicle_category: "CAR".to_string(),
        electric_only: false,
        capacity,
        gate_ids: Vec::new(),
        price_policy_id: Some(default_policy().id),
    }
}

pub struct Harness {
    pub facility: Facility,
    pub store: Arc<MemoryStore>,
    pub gate: Arc<CountingGate>,
}

/// Facility over a fresh in-memory store with the simulated gateway, a
/// counting gate, and one car zone of the given capacity.
pub async fn facility_with_capacity(capacity: u32) -> Harness {
    facility_with(capacity, Arc::new(SimulatedGateway)).await
}

pub async fn facility_with(capacity: u32, gateway: Arc<dyn GatewayClient>) -> Harness {
    let (repos, store) = Repositories::from_memory();
    store.add_zone(car_zone(capacity)).await;
    store.add_policy(default_policy()).await;

    let gate = Arc::new(CountingGate::default());
    let collaborators = Collaborators {
        gateway,
        gate: gate.clone(),
        incidents: Arc::new(LoggingIncidentSink),
    };
    let facility = Facility::new(&fast_config(), repos, collaborators);
    Harness {
        facility,
        store,
        gate,
    }
}

pub fn gate(name: &str) -> GateId {
    GateId::new(name).unwrap()
}

pub fn plate(raw: &str) -> parkade_common::LicensePlate {
    parkade_common::LicensePlate::new(raw).unwrap()
}
