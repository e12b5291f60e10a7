use thiserror::Error;

#[derive(Debug, Error)]
pub enum FacilityError {
    // Conflict class: rejected synchronously, nothing persisted, safe to
    // retry after correcting the input.
    #[error("plate {plate} already has an unresolved session")]
    DuplicateCheckIn { plate: String },

    #[error("session {session_id} is already completed")]
    DoubleCheckout { session_id: String },

    #[error("plate {supplied} does not match the session's vehicle {expected}")]
    PlateMismatch { supplied: String, expected: String },

    #[error("ticket id does not match the session's ticket")]
    TicketMismatch,

    #[error("card id does not match the one recorded for this ticket")]
    CardMismatch,

    #[error("transaction code does not match the pending payment")]
    TransactionMismatch,

    #[error("plate {plate} already holds an active or pending monthly ticket")]
    DuplicateMembership { plate: String },

    #[error("payment for session {session_id} is already settled")]
    AlreadySettled { session_id: String },

    #[error("session {session_id} is not awaiting payment (status {status})")]
    NotPayable { session_id: String, status: String },

    // NotFound class
    #[error("no session found for {reference}")]
    SessionNotFound { reference: String },

    #[error("monthly ticket {ticket_id} not found")]
    MonthlyTicketNotFound { ticket_id: String },

    #[error("price policy {policy_id} not found")]
    PolicyNotFound { policy_id: String },

    #[error("no settlement in progress for session {session_id}")]
    NoPendingPayment { session_id: String },

    // Capacity
    #[error("no zone with free capacity for category {category}")]
    CapacityExhausted { category: String },

    // Gateway / settlement
    #[error("payment method {method} is not accepted at this facility")]
    MethodNotAllowed { method: String },

    // Membership validation
    #[error("month count {months} is outside the allowed range 1..=12")]
    InvalidMonthCount { months: u32 },

    #[error("ticket {ticket_id} is outside its renewal window")]
    OutsideRenewalWindow { ticket_id: String },

    #[error("monthly ticket {ticket_id} cannot move from {from} to {to}")]
    InvalidMembershipTransition {
        ticket_id: String,
        from: String,
        to: String,
    },

    // Infrastructure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("general error: {0}")]
    General(#[from] anyhow::Error),
}

impl FacilityError {
    /// Conflict-class errors are never retried automatically; the caller
    /// corrects the input and re-submits.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            FacilityError::DuplicateCheckIn { .. }
                | FacilityError::DoubleCheckout { .. }
                | FacilityError::PlateMismatch { .. }
                | FacilityError::TicketMismatch
                | FacilityError::CardMismatch
                | FacilityError::TransactionMismatch
                | FacilityError::DuplicateMembership { .. }
                | FacilityError::AlreadySettled { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FacilityError::SessionNotFound { .. }
                | FacilityError::MonthlyTicketNotFound { .. }
                | FacilityError::PolicyNotFound { .. }
                | FacilityError::NoPendingPayment { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FacilityError>;
