//! Background expiry scan for monthly tickets.
//!
//! A read-mostly job on a fixed interval; its status flips are commutative
//! with user-initiated cancellations under the store's last-write-wins
//! semantics.

use crate::config::ScannerSettings;
use crate::domain::types::MonthlyTicketStatus;
use crate::error::Result;
use crate::storage::repositories::MonthlyTicketRepository;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

pub struct ExpiryScanner {
    monthly: Arc<dyn MonthlyTicketRepository>,
    settings: ScannerSettings,
}

impl ExpiryScanner {
    pub fn new(monthly: Arc<dyn MonthlyTicketRepository>, settings: ScannerSettings) -> Self {
        Self { monthly, settings }
    }

    /// Run forever, sweeping on the configured interval. A failed sweep is
    /// logged and retried at the next tick.
    pub async fn run(&self) -> Result<()> {
        loop {
            if let Err(e) = self.sweep().await {
                error!(error = %e, "expiry sweep failed");
            }
            sleep(self.settings.interval()).await;
        }
    }

    /// Flip every non-terminal ticket past its expiry date to `Expired`.
    /// Returns the number of tickets expired.
    pub async fn sweep(&self) -> Result<usize> {
        let today = Utc::now().date_naive();
        let mut expired = 0;
        for mut ticket in self.monthly.list_active().await? {
            if ticket.expiry_date < today {
                ticket.status = MonthlyTicketStatus::Expired;
                self.monthly.update(&ticket).await?;
                info!(ticket = %ticket.id, expiry = %ticket.expiry_date, "monthly ticket expired");
                expired += 1;
            }
        }
        Ok(expired)
    }
}
