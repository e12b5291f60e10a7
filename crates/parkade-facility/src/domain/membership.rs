use crate::config::MembershipSettings;
use crate::domain::pricing::{self, PricePolicy};
use crate::domain::types::{Amount, CustomerId, MonthlyTicketStatus, PolicyId, TicketId};
use crate::domain::vehicles::VehicleCategory;
use crate::error::{FacilityError, Result};
use crate::gateway::GatewayClient;
use crate::lock::KeyedLocks;
use crate::storage::repositories::{
    CustomerRepository, MonthlyTicketRepository, PricePolicyRepository,
};
use chrono::{Months, NaiveDate, Utc};
use parkade_common::LicensePlate;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

/// A registered membership customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
}

/// Independent membership aggregate tied to a plate and a card id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTicket {
    pub id: TicketId,
    pub customer_id: CustomerId,
    pub vehicle_plate: LicensePlate,
    pub vehicle_type: VehicleCategory,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
    /// Expiry that takes effect once a pending extension payment confirms.
    /// The ticket stays valid through `expiry_date` in the meantime.
    #[serde(default)]
    pub pending_expiry: Option<NaiveDate>,
    pub monthly_fee: Amount,
    pub status: MonthlyTicketStatus,
    pub transaction_code: Option<String>,
    pub qr_content: Option<String>,
    pub provider_log: Option<String>,
}

impl MonthlyTicket {
    pub fn id(&self) -> &TicketId {
        &self.id
    }

    /// Valid means paid-up and not past expiry; only a valid ticket makes a
    /// session free.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.status == MonthlyTicketStatus::Active && self.expiry_date >= date
    }

    fn mint_id() -> TicketId {
        TicketId::new(format!("M-{:08X}", rand::thread_rng().gen::<u32>()))
    }
}

/// Volume discount for a prepaid month count: 5%/10%/15% at 3/6/12 months.
pub fn volume_discount(months: u32) -> Decimal {
    if months >= 12 {
        Decimal::new(15, 2)
    } else if months >= 6 {
        Decimal::new(10, 2)
    } else if months >= 3 {
        Decimal::new(5, 2)
    } else {
        Decimal::ZERO
    }
}

/// Membership fee: policy monthly rate times month count, less the volume
/// discount.
pub fn membership_fee(policy: &PricePolicy, months: u32) -> Amount {
    let gross = policy.monthly_rate.multiply(Decimal::from(months));
    gross.multiply(Decimal::ONE - volume_discount(months))
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub phone: String,
    pub name: String,
    pub plate: LicensePlate,
    pub vehicle_type_code: String,
    pub policy_id: Option<PolicyId>,
    pub months: u32,
}

/// Registration, extension, and cancellation of monthly tickets, each gated
/// by a settlement step. Unlike session settlement there is no retry loop:
/// a rejected gateway request leaves the ticket in `PaymentFailed` for the
/// customer to retry.
pub struct MembershipService {
    customers: Arc<dyn CustomerRepository>,
    monthly: Arc<dyn MonthlyTicketRepository>,
    policies: Arc<dyn PricePolicyRepository>,
    gateway: Arc<dyn GatewayClient>,
    settings: MembershipSettings,
    locks: Arc<KeyedLocks>,
}

impl MembershipService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        monthly: Arc<dyn MonthlyTicketRepository>,
        policies: Arc<dyn PricePolicyRepository>,
        gateway: Arc<dyn GatewayClient>,
        settings: MembershipSettings,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            customers,
            monthly,
            policies,
            gateway,
            settings,
            locks,
        }
    }

    /// Register a new monthly ticket for a plate and request settlement.
    pub async fn register(&self, request: RegistrationRequest) -> Result<MonthlyTicket> {
        validate_months(request.months)?;
        let _plate_guard = self.locks.acquire(request.plate.as_str()).await;

        if self
            .monthly
            .find_active_by_plate(&request.plate)
            .await?
            .is_some()
        {
            return Err(FacilityError::DuplicateMembership {
                plate: request.plate.to_string(),
            });
        }

        let customer = match self.customers.find_by_phone(&request.phone).await? {
            Some(existing) => existing,
            None => {
                let customer = Customer {
                    id: CustomerId::new(),
                    name: request.name.clone(),
                    phone: request.phone.clone(),
                };
                self.customers.create(&customer).await?;
                customer
            }
        };

        let category = VehicleCategory::from_code(&request.vehicle_type_code);
        let policy = self.resolve_policy(request.policy_id.as_ref(), category).await?;
        let fee = membership_fee(&policy, request.months);

        let today = Utc::now().date_naive();
        let mut ticket = MonthlyTicket {
            id: MonthlyTicket::mint_id(),
            customer_id: customer.id,
            vehicle_plate: request.plate.clone(),
            vehicle_type: category,
            start_date: today,
            expiry_date: add_months(today, request.months),
            pending_expiry: None,
            monthly_fee: fee,
            status: MonthlyTicketStatus::PendingPayment,
            transaction_code: None,
            qr_content: None,
            provider_log: None,
        };
        self.monthly.create(&ticket).await?;
        info!(ticket = %ticket.id, plate = %ticket.vehicle_plate, fee = %fee, "monthly ticket registered");

        if !self.request_settlement(&mut ticket, fee).await? {
            ticket.status = MonthlyTicketStatus::PaymentFailed;
        }
        self.monthly.update(&ticket).await?;
        Ok(ticket)
    }

    /// Extend an active ticket. Only allowed inside the renewal window
    /// (at most `renewal_window_days` before the current expiry).
    ///
    /// The ticket stays `Active` and keeps its current expiry while the
    /// extension payment is outstanding: a declined or abandoned extension
    /// never strips the holder's already-paid period. The new expiry is
    /// staged in `pending_expiry` and applied by [`Self::confirm_payment`].
    pub async fn extend(&self, ticket_id: &TicketId, months: u32) -> Result<MonthlyTicket> {
        validate_months(months)?;

        let mut ticket = self.get_ticket(ticket_id).await?;
        let _plate_guard = self.locks.acquire(ticket.vehicle_plate.as_str()).await;

        if ticket.status != MonthlyTicketStatus::Active {
            return Err(FacilityError::InvalidMembershipTransition {
                ticket_id: ticket_id.to_string(),
                from: ticket.status.to_string(),
                to: MonthlyTicketStatus::PendingPayment.to_string(),
            });
        }

        let today = Utc::now().date_naive();
        let days_until_expiry = (ticket.expiry_date - today).num_days();
        if days_until_expiry < 0 || days_until_expiry > self.settings.renewal_window_days {
            return Err(FacilityError::OutsideRenewalWindow {
                ticket_id: ticket_id.to_string(),
            });
        }

        let policy = self
            .resolve_policy(None, ticket.vehicle_type)
            .await?;
        let fee = membership_fee(&policy, months);

        ticket.pending_expiry = Some(add_months(ticket.expiry_date, months));
        ticket.monthly_fee = fee;
        self.monthly.update(&ticket).await?;
        info!(
            ticket = %ticket.id,
            pending_expiry = %ticket.pending_expiry.unwrap_or(ticket.expiry_date),
            fee = %fee,
            "extension staged, awaiting settlement"
        );

        if !self.request_settlement(&mut ticket, fee).await? {
            ticket.pending_expiry = None;
        }
        self.monthly.update(&ticket).await?;
        Ok(ticket)
    }

    /// Reconcile the gateway callback for a registration or extension.
    /// Idempotent: confirming an already-settled ticket again is a no-op.
    ///
    /// A failed registration payment parks the ticket in `PaymentFailed`;
    /// a failed extension only drops the staged expiry, leaving the ticket
    /// `Active` through its already-paid period.
    pub async fn confirm_payment(
        &self,
        ticket_id: &TicketId,
        transaction_code: &str,
        success: bool,
        provider_log: Option<String>,
    ) -> Result<MonthlyTicket> {
        let mut ticket = self.get_ticket(ticket_id).await?;
        let _plate_guard = self.locks.acquire(ticket.vehicle_plate.as_str()).await;

        if ticket.status == MonthlyTicketStatus::Active
            && ticket.pending_expiry.is_none()
            && success
        {
            return Ok(ticket);
        }
        if let Some(code) = &ticket.transaction_code {
            if code != transaction_code {
                return Err(FacilityError::TransactionMismatch);
            }
        }

        let extending = ticket.pending_expiry.is_some();
        if success {
            if let Some(new_expiry) = ticket.pending_expiry.take() {
                ticket.expiry_date = new_expiry;
            }
            ticket.status = MonthlyTicketStatus::Active;
        } else if extending {
            ticket.pending_expiry = None;
        } else {
            ticket.status = MonthlyTicketStatus::PaymentFailed;
        }
        if provider_log.is_some() {
            ticket.provider_log = provider_log;
        }
        self.monthly.update(&ticket).await?;
        info!(
            ticket = %ticket.id,
            status = %ticket.status,
            expiry = %ticket.expiry_date,
            "membership payment reconciled"
        );
        Ok(ticket)
    }

    /// An attendant's cancellation is parked for admin approval; an admin
    /// cancels immediately.
    pub async fn request_cancellation(
        &self,
        ticket_id: &TicketId,
        by_admin: bool,
    ) -> Result<MonthlyTicket> {
        let mut ticket = self.get_ticket(ticket_id).await?;
        let _plate_guard = self.locks.acquire(ticket.vehicle_plate.as_str()).await;

        if ticket.status.is_terminal() {
            return Err(FacilityError::InvalidMembershipTransition {
                ticket_id: ticket_id.to_string(),
                from: ticket.status.to_string(),
                to: MonthlyTicketStatus::Cancelled.to_string(),
            });
        }

        ticket.status = if by_admin {
            MonthlyTicketStatus::Cancelled
        } else {
            MonthlyTicketStatus::PendingCancellation
        };
        self.monthly.update(&ticket).await?;
        info!(ticket = %ticket.id, status = %ticket.status, "cancellation recorded");
        Ok(ticket)
    }

    /// Admin approval of a pending cancellation request.
    pub async fn approve_cancellation(&self, ticket_id: &TicketId) -> Result<MonthlyTicket> {
        let mut ticket = self.get_ticket(ticket_id).await?;
        let _plate_guard = self.locks.acquire(ticket.vehicle_plate.as_str()).await;

        if ticket.status != MonthlyTicketStatus::PendingCancellation {
            return Err(FacilityError::InvalidMembershipTransition {
                ticket_id: ticket_id.to_string(),
                from: ticket.status.to_string(),
                to: MonthlyTicketStatus::Cancelled.to_string(),
            });
        }
        ticket.status = MonthlyTicketStatus::Cancelled;
        self.monthly.update(&ticket).await?;
        info!(ticket = %ticket.id, "cancellation approved");
        Ok(ticket)
    }

    /// Single-attempt settlement. On acceptance the gateway's code and QR
    /// are recorded and `true` is returned; rejections, errors and timeouts
    /// capture the reason in `provider_log` and return `false`, leaving the
    /// status decision to the caller.
    async fn request_settlement(&self, ticket: &mut MonthlyTicket, fee: Amount) -> Result<bool> {
        let order_info = format!("monthly ticket {} plate {}", ticket.id, ticket.vehicle_plate);
        let request = self.gateway.request_payment(fee, &order_info);
        match timeout(self.settings.attempt_timeout(), request).await {
            Ok(Ok(response)) if response.accepted => {
                ticket.transaction_code = Some(response.transaction_code);
                ticket.qr_content = response.qr_content.or(response.payment_url);
                Ok(true)
            }
            Ok(Ok(response)) => {
                ticket.provider_log = Some(
                    response
                        .error
                        .unwrap_or_else(|| "gateway rejected the request".to_string()),
                );
                warn!(ticket = %ticket.id, "membership settlement rejected");
                Ok(false)
            }
            Ok(Err(e)) => {
                ticket.provider_log = Some(e.to_string());
                warn!(ticket = %ticket.id, error = %e, "membership settlement errored");
                Ok(false)
            }
            Err(_) => {
                ticket.provider_log = Some(format!(
                    "gateway request timed out after {:?}",
                    self.settings.attempt_timeout()
                ));
                warn!(ticket = %ticket.id, "membership settlement timed out");
                Ok(false)
            }
        }
    }

    async fn resolve_policy(
        &self,
        policy_id: Option<&PolicyId>,
        category: VehicleCategory,
    ) -> Result<PricePolicy> {
        if let Some(id) = policy_id {
            return self
                .policies
                .get_by_id(id)
                .await?
                .ok_or_else(|| FacilityError::PolicyNotFound {
                    policy_id: id.to_string(),
                });
        }
        if let Some(policy) = self.policies.get_by_vehicle_type(category).await? {
            return Ok(policy);
        }
        Ok(pricing::default_policy())
    }

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<MonthlyTicket> {
        self.monthly
            .get(ticket_id)
            .await?
            .ok_or_else(|| FacilityError::MonthlyTicketNotFound {
                ticket_id: ticket_id.to_string(),
            })
    }
}

fn validate_months(months: u32) -> Result<()> {
    if !(1..=12).contains(&months) {
        return Err(FacilityError::InvalidMonthCount { months });
    }
    Ok(())
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}
