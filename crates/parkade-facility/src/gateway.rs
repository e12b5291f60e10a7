//! External collaborators: the settlement gateway, the physical gate
//! devices, and the incident sink. Only the interfaces matter here; real
//! device and network integrations live outside this crate.

use crate::domain::types::Amount;
use async_trait::async_trait;
use parkade_common::GateId;
use rand::Rng;
use tracing::{info, warn};

/// Outcome of a gateway payment request.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub accepted: bool,
    pub transaction_code: String,
    pub qr_content: Option<String>,
    pub payment_url: Option<String>,
    pub error: Option<String>,
}

/// External settlement gateway. Acceptance is asynchronous: a request that
/// is accepted returns a transaction code and QR content for the customer,
/// and the final success/failure arrives later through a separate
/// confirmation call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn request_payment(
        &self,
        amount: Amount,
        order_info: &str,
    ) -> anyhow::Result<GatewayResponse>;
}

/// Physical gate control. Fire-and-forget: failures are logged by callers,
/// never propagated into the business operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GateDevice: Send + Sync {
    async fn open(&self, gate: &GateId) -> anyhow::Result<()>;
}

/// Best-effort audit trail for attendant-raised incidents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn report(
        &self,
        title: &str,
        description: &str,
        reported_by: &str,
        reference_id: &str,
    ) -> anyhow::Result<()>;
}

/// Gateway stand-in for development and the operator CLI: accepts every
/// request and mints a local transaction code.
#[derive(Debug, Default)]
pub struct SimulatedGateway;

#[async_trait]
impl GatewayClient for SimulatedGateway {
    async fn request_payment(
        &self,
        amount: Amount,
        order_info: &str,
    ) -> anyhow::Result<GatewayResponse> {
        let code = format!("SIM-{:08X}", rand::thread_rng().gen::<u32>());
        info!(%amount, order_info, transaction_code = %code, "simulated gateway accepted request");
        Ok(GatewayResponse {
            accepted: true,
            transaction_code: code.clone(),
            qr_content: Some(format!("parkade://pay/{code}/{amount}")),
            payment_url: None,
            error: None,
        })
    }
}

/// Gate device that only logs. Used when no hardware is wired up.
#[derive(Debug, Default)]
pub struct LoggingGateDevice;

#[async_trait]
impl GateDevice for LoggingGateDevice {
    async fn open(&self, gate: &GateId) -> anyhow::Result<()> {
        info!(%gate, "gate open requested");
        Ok(())
    }
}

/// Incident sink that records reports in the log stream.
#[derive(Debug, Default)]
pub struct LoggingIncidentSink;

#[async_trait]
impl IncidentSink for LoggingIncidentSink {
    async fn report(
        &self,
        title: &str,
        description: &str,
        reported_by: &str,
        reference_id: &str,
    ) -> anyhow::Result<()> {
        warn!(title, description, reported_by, reference_id, "incident reported");
        Ok(())
    }
}
