//! Top-level wiring: builds every service from one config and one set of
//! repositories, sharing the keyed locks so all writers to an aggregate
//! serialize through the same mutex.

use crate::config::FacilityConfig;
use crate::domain::membership::MembershipService;
use crate::domain::payments::PaymentOrchestrator;
use crate::domain::sessions::SessionService;
use crate::error::Result;
use crate::gateway::{
    GateDevice, GatewayClient, IncidentSink, LoggingGateDevice, LoggingIncidentSink,
    SimulatedGateway,
};
use crate::lock::KeyedLocks;
use crate::scanner::ExpiryScanner;
use crate::storage::Repositories;
use std::sync::Arc;

/// External devices and services the engine talks to. Swapped out wholesale
/// in tests.
pub struct Collaborators {
    pub gateway: Arc<dyn GatewayClient>,
    pub gate: Arc<dyn GateDevice>,
    pub incidents: Arc<dyn IncidentSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            gateway: Arc::new(SimulatedGateway::default()),
            gate: Arc::new(LoggingGateDevice),
            incidents: Arc::new(LoggingIncidentSink),
        }
    }
}

pub struct Facility {
    pub sessions: SessionService,
    pub payments: PaymentOrchestrator,
    pub membership: MembershipService,
    pub scanner: ExpiryScanner,
    pub repos: Repositories,
}

impl Facility {
    pub fn new(
        config: &FacilityConfig,
        repos: Repositories,
        collaborators: Collaborators,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());

        let sessions = SessionService::new(
            repos.sessions.clone(),
            repos.zones.clone(),
            repos.policies.clone(),
            repos.monthly.clone(),
            collaborators.gate.clone(),
            collaborators.incidents.clone(),
            locks.clone(),
        );

        let payments = PaymentOrchestrator::new(
            repos.sessions.clone(),
            collaborators.gateway.clone(),
            collaborators.gate.clone(),
            config.payment.clone(),
            locks.clone(),
        );

        let membership = MembershipService::new(
            repos.customers.clone(),
            repos.monthly.clone(),
            repos.policies.clone(),
            collaborators.gateway.clone(),
            config.membership.clone(),
            locks,
        );

        let scanner = ExpiryScanner::new(repos.monthly.clone(), config.scanner.clone());

        Self {
            sessions,
            payments,
            membership,
            scanner,
            repos,
        }
    }

    /// Open the flat-file store under `config.data_dir` and wire the default
    /// collaborators.
    pub fn open(config: &FacilityConfig) -> Result<Self> {
        let (repos, _) = Repositories::from_json(&config.data_dir)?;
        Ok(Self::new(config, repos, Collaborators::default()))
    }
}
