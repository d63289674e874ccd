//! Business logic services

pub mod catalog;
pub mod clock;
pub mod issues;

use std::sync::Arc;

use crate::{config::InventoryConfig, repository::Repository};

pub use clock::{Clock, FixedClock, SystemClock};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub issues: issues::IssuesService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, inventory: InventoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), clock.clone()),
            issues: issues::IssuesService::new(repository, clock, inventory),
        }
    }
}
