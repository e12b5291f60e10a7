use crate::domain::payments::Payment;
use crate::domain::pricing::{self, PricePolicy};
use crate::domain::types::{Amount, SessionId, SessionStatus, TicketId, TicketType, ZoneId};
use crate::domain::vehicles::{Vehicle, VehicleCategory};
use crate::domain::zones::ZoneAllocator;
use crate::error::{FacilityError, Result};
use crate::gateway::{GateDevice, IncidentSink};
use crate::lock::KeyedLocks;
use crate::storage::repositories::{
    MonthlyTicketRepository, PricePolicyRepository, SessionRepository, ZoneDirectory,
};
use chrono::{DateTime, Utc};
use parkade_common::{GateId, LicensePlate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A session's access credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub ticket_type: TicketType,
    pub issue_time: DateTime<Utc>,
    pub gate_id: GateId,
    pub card_id: Option<String>,
}

/// The aggregate root of a parking stay.
///
/// Created at check-in, mutated by check-out and payment confirmation,
/// never deleted: completed sessions are retained for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSession {
    pub id: SessionId,
    pub vehicle: Vehicle,
    pub ticket: Ticket,
    pub zone_id: ZoneId,
    pub status: SessionStatus,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_gate_id: Option<GateId>,
    /// Authoritative only once the session has left `Active`.
    pub fee_amount: Amount,
    pub base_fee: Option<Amount>,
    pub lost_ticket_fee: Option<Amount>,
    /// Required for monthly-ticket sessions; pinned to the monthly ticket id.
    pub card_id: Option<String>,
    pub payment: Option<Payment>,
}

impl ParkingSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_monthly(&self) -> bool {
        self.ticket.ticket_type == TicketType::Monthly
    }
}

#[derive(Debug, Clone)]
pub struct CheckInRequest {
    pub plate: LicensePlate,
    pub vehicle_type_code: String,
    pub gate_id: GateId,
    pub card_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckOutRequest {
    pub plate: LicensePlate,
    pub ticket_id: Option<TicketId>,
    pub card_id: Option<String>,
    pub gate_id: GateId,
}

#[derive(Debug, Clone)]
pub struct LostTicketRequest {
    pub plate: LicensePlate,
    /// Defaults to the session's previously recorded type when empty.
    pub vehicle_type_code: Option<String>,
    pub gate_id: GateId,
    pub reported_by: String,
}

/// Owns the session lifecycle: check-in, check-out, and lost-ticket
/// recovery. Payment confirmation is driven separately by the payment
/// orchestrator.
pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    zones: Arc<dyn ZoneDirectory>,
    policies: Arc<dyn PricePolicyRepository>,
    monthly: Arc<dyn MonthlyTicketRepository>,
    gate: Arc<dyn GateDevice>,
    incidents: Arc<dyn IncidentSink>,
    allocator: ZoneAllocator,
    locks: Arc<KeyedLocks>,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        zones: Arc<dyn ZoneDirectory>,
        policies: Arc<dyn PricePolicyRepository>,
        monthly: Arc<dyn MonthlyTicketRepository>,
        gate: Arc<dyn GateDevice>,
        incidents: Arc<dyn IncidentSink>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        let allocator = ZoneAllocator::new(zones.clone(), sessions.clone());
        Self {
            sessions,
            zones,
            policies,
            monthly,
            gate,
            incidents,
            allocator,
            locks,
        }
    }

    /// Check a vehicle in: allocate a zone, mint a ticket, open the entry
    /// gate.
    ///
    /// Rejects when the plate already has an unresolved session, when a
    /// supplied card contradicts the plate's valid monthly ticket, or when
    /// no zone of the vehicle's category has free capacity.
    pub async fn check_in(&self, request: CheckInRequest) -> Result<ParkingSession> {
        let _plate_guard = self.locks.acquire(request.plate.as_str()).await;

        if self
            .sessions
            .find_active_or_pending_by_plate(&request.plate)
            .await?
            .is_some()
        {
            return Err(FacilityError::DuplicateCheckIn {
                plate: request.plate.to_string(),
            });
        }

        let category = VehicleCategory::from_code(&request.vehicle_type_code);
        let now = Utc::now();

        // A valid monthly ticket pins the session's card to the ticket id.
        let monthly = match self.monthly.find_active_by_plate(&request.plate).await? {
            Some(ticket) if ticket.is_valid_on(now.date_naive()) => Some(ticket),
            _ => None,
        };
        let card_id = match &monthly {
            Some(ticket) => {
                if let Some(card) = &request.card_id {
                    if card != ticket.id.as_str() {
                        return Err(FacilityError::CardMismatch);
                    }
                }
                Some(ticket.id.as_str().to_string())
            }
            None => request.card_id.clone(),
        };

        let zone = self
            .allocator
            .find_zone(category, &request.gate_id)
            .await?
            .ok_or_else(|| FacilityError::CapacityExhausted {
                category: category.code().to_string(),
            })?;

        let (ticket_id, ticket_type) = match &monthly {
            Some(ticket) => (ticket.id.clone(), TicketType::Monthly),
            None => (self.mint_daily_ticket_id(&request.gate_id, now).await?, TicketType::Daily),
        };

        let session = ParkingSession {
            id: SessionId::new(),
            vehicle: Vehicle::new(request.plate.clone(), category),
            ticket: Ticket {
                id: ticket_id,
                ticket_type,
                issue_time: now,
                gate_id: request.gate_id.clone(),
                card_id: card_id.clone(),
            },
            zone_id: zone.id.clone(),
            status: SessionStatus::Active,
            entry_time: now,
            exit_time: None,
            exit_gate_id: None,
            fee_amount: Amount::zero(),
            base_fee: None,
            lost_ticket_fee: None,
            card_id,
            payment: None,
        };

        self.sessions.create(&session).await?;
        info!(
            session_id = %session.id,
            plate = %session.vehicle.plate,
            zone = %session.zone_id,
            ticket = %session.ticket.id,
            ticket_type = %session.ticket.ticket_type,
            "vehicle checked in"
        );

        self.open_gate(&request.gate_id).await;
        Ok(session)
    }

    /// Check a vehicle out: validate credentials, set the exit time, and
    /// compute the fee (zero for a valid monthly ticket, which completes
    /// the session and opens the gate synchronously).
    pub async fn check_out(&self, request: CheckOutRequest) -> Result<ParkingSession> {
        let _plate_guard = self.locks.acquire(request.plate.as_str()).await;

        let mut session = match &request.ticket_id {
            Some(ticket_id) => self
                .sessions
                .find_by_ticket_id(ticket_id)
                .await?
                .ok_or_else(|| FacilityError::SessionNotFound {
                    reference: format!("ticket {ticket_id}"),
                })?,
            None => self
                .sessions
                .find_active_or_pending_by_plate(&request.plate)
                .await?
                .ok_or_else(|| FacilityError::SessionNotFound {
                    reference: format!("plate {}", request.plate),
                })?,
        };

        if session.status == SessionStatus::Completed {
            return Err(FacilityError::DoubleCheckout {
                session_id: session.id.to_string(),
            });
        }
        if session.vehicle.plate != request.plate {
            return Err(FacilityError::PlateMismatch {
                supplied: request.plate.to_string(),
                expected: session.vehicle.plate.to_string(),
            });
        }
        match session.ticket.ticket_type {
            TicketType::Daily => {
                // An absent or wrong ticket id forces lost-ticket recovery.
                if request.ticket_id.as_ref() != Some(&session.ticket.id) {
                    return Err(FacilityError::TicketMismatch);
                }
            }
            TicketType::Monthly => {
                if request.card_id.is_none() || request.card_id != session.card_id {
                    return Err(FacilityError::CardMismatch);
                }
            }
        }

        // A re-submitted checkout after a gateway failure returns the
        // already-computed fee without recomputation.
        if session.status == SessionStatus::PendingPayment {
            return Ok(session);
        }

        let now = Utc::now();
        session.exit_time = Some(now);
        session.exit_gate_id = Some(request.gate_id.clone());

        if self.has_valid_monthly(&session).await? {
            session.fee_amount = Amount::zero();
            session.status = SessionStatus::Completed;
            self.sessions.update(&session).await?;
            info!(session_id = %session.id, plate = %session.vehicle.plate, "monthly checkout, no fee due");
            self.open_gate(&request.gate_id).await;
            return Ok(session);
        }

        let policy = self.resolve_policy(&session).await?;
        session.fee_amount = pricing::calculate_fee(
            session.entry_time,
            now,
            session.vehicle.category.fee_factor(),
            &policy,
        );
        session.status = SessionStatus::PendingPayment;
        self.sessions.update(&session).await?;
        info!(
            session_id = %session.id,
            plate = %session.vehicle.plate,
            fee = %session.fee_amount,
            policy = %policy.id,
            "checkout computed, awaiting payment"
        );
        Ok(session)
    }

    /// Lost-ticket recovery: plate-based lookup plus a flat penalty, with
    /// an incident raised for audit. Monthly tickets are exempt from both
    /// fee components.
    pub async fn lost_ticket(&self, request: LostTicketRequest) -> Result<ParkingSession> {
        let _plate_guard = self.locks.acquire(request.plate.as_str()).await;

        let mut session = self
            .sessions
            .find_active_or_pending_by_plate(&request.plate)
            .await?
            .ok_or_else(|| FacilityError::SessionNotFound {
                reference: format!("plate {}", request.plate),
            })?;

        // Re-resolve the vehicle type from the attendant's code.
        let category = match request
            .vehicle_type_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
        {
            Some(code) => VehicleCategory::from_code(code),
            None => session.vehicle.category,
        };
        session.vehicle.category = category;

        let now = Utc::now();
        session.exit_time = Some(now);
        session.exit_gate_id = Some(request.gate_id.clone());

        if self.has_valid_monthly(&session).await? {
            session.base_fee = Some(Amount::zero());
            session.lost_ticket_fee = Some(Amount::zero());
            session.fee_amount = Amount::zero();
        } else {
            let policy = self.resolve_policy(&session).await?;
            let (base, penalty) =
                pricing::lost_ticket_total(session.entry_time, now, category.fee_factor(), &policy);
            session.base_fee = Some(base);
            session.lost_ticket_fee = Some(penalty);
            session.fee_amount = base.add(penalty);
        }
        session.status = SessionStatus::PendingPayment;
        self.sessions.update(&session).await?;

        info!(
            session_id = %session.id,
            plate = %session.vehicle.plate,
            fee = %session.fee_amount,
            "lost-ticket checkout computed"
        );

        // Audit trail is best-effort: a sink failure never blocks the exit.
        if let Err(e) = self
            .incidents
            .report(
                "Lost ticket",
                &format!(
                    "Lost-ticket checkout for plate {} at gate {}",
                    session.vehicle.plate, request.gate_id
                ),
                &request.reported_by,
                &session.id.to_string(),
            )
            .await
        {
            error!(session_id = %session.id, error = %e, "incident report failed");
        }

        Ok(session)
    }

    /// Whether the session rides on a currently valid monthly ticket.
    async fn has_valid_monthly(&self, session: &ParkingSession) -> Result<bool> {
        if !session.is_monthly() {
            return Ok(false);
        }
        let today = Utc::now().date_naive();
        Ok(self
            .monthly
            .get(&session.ticket.id)
            .await?
            .map(|t| t.is_valid_on(today))
            .unwrap_or(false))
    }

    /// Policy resolution: the zone's configured policy, then a policy
    /// matched by vehicle type, then the hard-coded default.
    async fn resolve_policy(&self, session: &ParkingSession) -> Result<PricePolicy> {
        if let Some(zone) = self.zones.get(&session.zone_id).await? {
            if let Some(policy_id) = &zone.price_policy_id {
                if let Some(policy) = self.policies.get_by_id(policy_id).await? {
                    return Ok(policy);
                }
                warn!(zone = %zone.id, policy = %policy_id, "configured zone policy missing, falling back");
            }
        }
        if let Some(policy) = self
            .policies
            .get_by_vehicle_type(session.vehicle.category)
            .await?
        {
            return Ok(policy);
        }
        Ok(pricing::default_policy())
    }

    /// Daily ticket id: `{gate}-{yyMMdd}-{seq:04}-{4hex}`. The sequence is
    /// the day's running count of issued daily tickets; only the random
    /// suffix resists forgery.
    async fn mint_daily_ticket_id(&self, gate: &GateId, now: DateTime<Utc>) -> Result<TicketId> {
        let seq = self
            .sessions
            .count_daily_tickets_issued_on(now.date_naive())
            .await?
            + 1;
        let suffix: u16 = rand::thread_rng().gen();
        Ok(TicketId::new(format!(
            "{}-{}-{:04}-{:04x}",
            gate,
            now.format("%y%m%d"),
            seq,
            suffix
        )))
    }

    async fn open_gate(&self, gate: &GateId) {
        if let Err(e) = self.gate.open(gate).await {
            error!(%gate, error = %e, "gate open failed");
        }
    }
}
