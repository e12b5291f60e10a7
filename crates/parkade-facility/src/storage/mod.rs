//! Persistence layer: repository traits plus the in-memory and flat-file
//! implementations.

pub mod jsonfile;
pub mod memory;
pub mod repositories;

use crate::error::Result;
use crate::storage::jsonfile::JsonFileStore;
use crate::storage::memory::MemoryStore;
use crate::storage::repositories::{
    CustomerRepository, MonthlyTicketRepository, PricePolicyRepository, SessionRepository,
    ZoneDirectory,
};
use std::path::Path;
use std::sync::Arc;

/// Shared handles to every repository, backed by a single store.
#[derive(Clone)]
pub struct Repositories {
    pub sessions: Arc<dyn SessionRepository>,
    pub zones: Arc<dyn ZoneDirectory>,
    pub policies: Arc<dyn PricePolicyRepository>,
    pub monthly: Arc<dyn MonthlyTicketRepository>,
    pub customers: Arc<dyn CustomerRepository>,
}

impl Repositories {
    pub fn from_memory() -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Self::from_store(store.clone()), store)
    }

    pub fn from_json(data_dir: &Path) -> Result<(Self, Arc<JsonFileStore>)> {
        let store = Arc::new(JsonFileStore::open(data_dir)?);
        Ok((Self::from_store(store.clone()), store))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: SessionRepository
            + ZoneDirectory
            + PricePolicyRepository
            + MonthlyTicketRepository
            + CustomerRepository
            + 'static,
    {
        Self {
            sessions: store.clone(),
            zones: store.clone(),
            policies: store.clone(),
            monthly: store.clone(),
            customers: store,
        }
    }
}
