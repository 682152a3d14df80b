use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{DirectoryError, Provider};

/// Source of the provider list. Implementations may be backed by anything;
/// callers only ever see snapshots.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn list_providers(&self) -> Vec<Provider>;

    async fn get_provider(&self, provider_id: &str) -> Result<Provider, DirectoryError> {
        self.list_providers()
            .await
            .into_iter()
            .find(|p| p.id == provider_id)
            .ok_or_else(|| DirectoryError::ProviderNotFound(provider_id.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProviderDirectory {
    providers: RwLock<Vec<Provider>>,
}

impl InMemoryProviderDirectory {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self {
            providers: RwLock::new(providers),
        }
    }

    /// Flips a provider's availability flag, e.g. when a doctor goes on leave.
    pub async fn set_available(&self, provider_id: &str, available: bool) -> Result<Provider, DirectoryError> {
        let mut providers = self.providers.write().await;
        let provider = providers
            .iter_mut()
            .find(|p| p.id == provider_id)
            .ok_or_else(|| DirectoryError::ProviderNotFound(provider_id.to_string()))?;

        debug!("Provider {} availability set to {}", provider_id, available);
        provider.available = available;
        Ok(provider.clone())
    }
}

#[async_trait]
impl ProviderDirectory for InMemoryProviderDirectory {
    async fn list_providers(&self) -> Vec<Provider> {
        self.providers.read().await.clone()
    }
}
