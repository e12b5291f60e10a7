use crate::config::PaymentSettings;
use crate::domain::sessions::ParkingSession;
use crate::domain::types::{
    Amount, PaymentId, PaymentMethod, PaymentStatus, SessionId, SessionStatus,
};
use crate::error::{FacilityError, Result};
use crate::gateway::{GateDevice, GatewayClient};
use crate::lock::KeyedLocks;
use crate::storage::repositories::SessionRepository;
use parkade_common::GateId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// A settlement attempt attached to exactly one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_code: Option<String>,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub provider_log: Option<String>,
    pub qr_content: Option<String>,
}

/// Result of a settlement request, returned to the attendant UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub success: bool,
    pub status: PaymentStatus,
    pub transaction_code: Option<String>,
    pub attempts: u32,
    pub qr_content: Option<String>,
    pub error: Option<String>,
}

/// Drives fee settlement against the external gateway.
///
/// Settlement is asynchronous: an accepted request leaves the session open
/// with a `PendingExternal` payment showing a QR to the customer; the
/// gateway's out-of-band callback lands in [`PaymentOrchestrator::confirm`],
/// which must be idempotent because callbacks and attendant retries overlap.
pub struct PaymentOrchestrator {
    sessions: Arc<dyn SessionRepository>,
    gateway: Arc<dyn GatewayClient>,
    gate: Arc<dyn GateDevice>,
    settings: PaymentSettings,
    locks: Arc<KeyedLocks>,
}

impl PaymentOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        gateway: Arc<dyn GatewayClient>,
        gate: Arc<dyn GateDevice>,
        settings: PaymentSettings,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            sessions,
            gateway,
            gate,
            settings,
            locks,
        }
    }

    /// Request settlement of a session's computed fee.
    ///
    /// Cash methods are rejected outright. A zero fee short-circuits: the
    /// payment completes locally, the session closes, and the gate opens
    /// without any gateway contact. Otherwise the gateway is tried up to
    /// `max_retry` times under a per-attempt timeout; a timeout or error
    /// records the attempt and moves on to the next one.
    pub async fn settle(
        &self,
        session_id: SessionId,
        method: PaymentMethod,
    ) -> Result<SettlementOutcome> {
        if !method.is_allowed() {
            return Err(FacilityError::MethodNotAllowed {
                method: method.to_string(),
            });
        }

        let _session_guard = self.locks.acquire(&session_id.to_string()).await;

        let mut session = self.get_session(session_id).await?;
        match session.status {
            SessionStatus::Completed => {
                return Err(FacilityError::AlreadySettled {
                    session_id: session_id.to_string(),
                })
            }
            SessionStatus::Active => {
                return Err(FacilityError::NotPayable {
                    session_id: session_id.to_string(),
                    status: session.status.to_string(),
                })
            }
            SessionStatus::PendingPayment => {}
        }

        let amount = session.fee_amount;
        if !amount.is_positive() {
            session.payment = Some(Payment {
                id: PaymentId::new(),
                amount,
                method,
                status: PaymentStatus::Completed,
                transaction_code: None,
                attempts: 0,
                error_message: None,
                provider_log: Some("no gateway settlement required".to_string()),
                qr_content: None,
            });
            session.status = SessionStatus::Completed;
            self.sessions.update(&session).await?;
            info!(session_id = %session.id, "zero fee, session closed without gateway contact");
            self.open_exit_gate(&session, None).await;
            return Ok(SettlementOutcome {
                success: true,
                status: PaymentStatus::Completed,
                transaction_code: None,
                attempts: 0,
                qr_content: None,
                error: None,
            });
        }

        let order_info = format!(
            "parking session {} plate {}",
            session.id, session.vehicle.plate
        );
        let mut last_error = String::from("gateway unavailable");

        for attempt in 1..=self.settings.max_retry {
            let request = self.gateway.request_payment(amount, &order_info);
            match timeout(self.settings.attempt_timeout(), request).await {
                Ok(Ok(response)) if response.accepted => {
                    session.payment = Some(Payment {
                        id: PaymentId::new(),
                        amount,
                        method,
                        status: PaymentStatus::PendingExternal,
                        transaction_code: Some(response.transaction_code.clone()),
                        attempts: attempt,
                        error_message: None,
                        provider_log: None,
                        qr_content: response.qr_content.clone().or(response.payment_url.clone()),
                    });
                    self.sessions.update(&session).await?;
                    info!(
                        session_id = %session.id,
                        transaction_code = %response.transaction_code,
                        attempt,
                        "gateway accepted settlement request"
                    );
                    return Ok(SettlementOutcome {
                        success: true,
                        status: PaymentStatus::PendingExternal,
                        transaction_code: Some(response.transaction_code),
                        attempts: attempt,
                        qr_content: response.qr_content.or(response.payment_url),
                        error: None,
                    });
                }
                Ok(Ok(response)) => {
                    last_error = response
                        .error
                        .unwrap_or_else(|| "gateway rejected the request".to_string());
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                }
                Err(_) => {
                    last_error = format!(
                        "gateway request timed out after {:?}",
                        self.settings.attempt_timeout()
                    );
                }
            }
            warn!(session_id = %session.id, attempt, error = %last_error, "settlement attempt failed");
            if attempt < self.settings.max_retry {
                sleep(self.settings.retry_backoff()).await;
            }
        }

        // Exhausted: the session stays payable so the attendant can retry.
        session.payment = Some(Payment {
            id: PaymentId::new(),
            amount,
            method,
            status: PaymentStatus::Failed,
            transaction_code: None,
            attempts: self.settings.max_retry,
            error_message: Some(last_error.clone()),
            provider_log: None,
            qr_content: None,
        });
        self.sessions.update(&session).await?;
        error!(
            session_id = %session.id,
            attempts = self.settings.max_retry,
            error = %last_error,
            "settlement exhausted all attempts"
        );
        Ok(SettlementOutcome {
            success: false,
            status: PaymentStatus::Failed,
            transaction_code: None,
            attempts: self.settings.max_retry,
            qr_content: None,
            error: Some(last_error),
        })
    }

    /// Idempotent reconciliation of the gateway's asynchronous callback.
    ///
    /// Confirming an already-completed session is a no-op, not an error: the
    /// gateway retries callbacks and attendants re-poll.
    pub async fn confirm(
        &self,
        session_id: SessionId,
        transaction_code: &str,
        success: bool,
        provider_log: Option<String>,
        exit_gate_id: Option<GateId>,
    ) -> Result<ParkingSession> {
        let _session_guard = self.locks.acquire(&session_id.to_string()).await;

        let mut session = self.get_session(session_id).await?;
        if session.status == SessionStatus::Completed {
            info!(session_id = %session.id, "confirmation for completed session ignored");
            return Ok(session);
        }

        let mut payment =
            session
                .payment
                .clone()
                .ok_or_else(|| FacilityError::NoPendingPayment {
                    session_id: session_id.to_string(),
                })?;
        if let Some(code) = &payment.transaction_code {
            if code != transaction_code {
                return Err(FacilityError::TransactionMismatch);
            }
        }

        if success {
            payment.status = PaymentStatus::Completed;
            payment.provider_log = provider_log;
            session.payment = Some(payment);
            session.status = SessionStatus::Completed;
            self.sessions.update(&session).await?;
            info!(session_id = %session.id, transaction_code, "payment confirmed, session completed");
            self.open_exit_gate(&session, exit_gate_id).await;
        } else {
            payment.status = PaymentStatus::Failed;
            payment.error_message = Some("gateway reported failure".to_string());
            payment.provider_log = provider_log;
            session.payment = Some(payment);
            self.sessions.update(&session).await?;
            warn!(session_id = %session.id, transaction_code, "gateway reported failure, session stays payable");
        }
        Ok(session)
    }

    /// Abort the current payment attempt. The session deliberately stays in
    /// `PendingPayment`: cancellation kills one attempt, not the checkout.
    pub async fn cancel(&self, session_id: SessionId, reason: &str) -> Result<ParkingSession> {
        let _session_guard = self.locks.acquire(&session_id.to_string()).await;

        let mut session = self.get_session(session_id).await?;
        let mut payment =
            session
                .payment
                .clone()
                .ok_or_else(|| FacilityError::NoPendingPayment {
                    session_id: session_id.to_string(),
                })?;
        if payment.status == PaymentStatus::Completed {
            return Err(FacilityError::AlreadySettled {
                session_id: session_id.to_string(),
            });
        }

        payment.status = PaymentStatus::Cancelled;
        payment.error_message = Some(reason.to_string());
        session.payment = Some(payment);
        self.sessions.update(&session).await?;
        info!(session_id = %session.id, reason, "payment attempt cancelled");
        Ok(session)
    }

    async fn get_session(&self, session_id: SessionId) -> Result<ParkingSession> {
        self.sessions
            .get(&session_id)
            .await?
            .ok_or_else(|| FacilityError::SessionNotFound {
                reference: format!("session {session_id}"),
            })
    }

    /// Exit gate precedence: explicit argument, the session's recorded exit
    /// gate, then the ticket's entry gate.
    async fn open_exit_gate(&self, session: &ParkingSession, explicit: Option<GateId>) {
        let gate = explicit
            .or_else(|| session.exit_gate_id.clone())
            .unwrap_or_else(|| session.ticket.gate_id.clone());
        if let Err(e) = self.gate.open(&gate).await {
            error!(%gate, session_id = %session.id, error = %e, "gate open failed");
        }
    }
}
