// libs/appointment-cell/src/services/catalog.rs
use async_trait::async_trait;

use crate::models::Service;

/// Source of the bookable services offered by the clinic.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn list_services(&self) -> Vec<Service>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceCatalog {
    services: Vec<Service>,
}

impl InMemoryServiceCatalog {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryServiceCatalog {
    async fn list_services(&self) -> Vec<Service> {
        self.services.clone()
    }
}
