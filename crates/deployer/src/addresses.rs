//! Process-wide cache of the contract address set.
use ballot_core::{ConfigError, ContractAddressSet};
use ballot_relay_client::ContractRegistry;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Fetches contract addresses once and serves them until refreshed.
pub struct CachedAddressResolver {
    registry: Arc<dyn ContractRegistry>,
    cached: Mutex<Option<ContractAddressSet>>,
}

impl fmt::Debug for CachedAddressResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAddressResolver").finish_non_exhaustive()
    }
}

impl CachedAddressResolver {
    /// Resolver with nothing cached yet.
    pub fn new(registry: Arc<dyn ContractRegistry>) -> Self {
        Self {
            registry,
            cached: Mutex::new(None),
        }
    }

    /// Cached set, fetched from the registry on first use.
    pub async fn resolve(&self) -> Result<ContractAddressSet, ConfigError> {
        let mut cached = self.cached.lock().await;
        if let Some(addresses) = *cached {
            return Ok(addresses);
        }
        let addresses = self.registry.fetch().await?;
        info!(
            message = "Resolved contract addresses",
            chain_id = addresses.chain_id,
            entry_point = %addresses.entry_point
        );
        *cached = Some(addresses);
        Ok(addresses)
    }

    /// Fetch again. The previous set is kept when the fetch fails.
    pub async fn refresh(&self) -> Result<ContractAddressSet, ConfigError> {
        let mut cached = self.cached.lock().await;
        let addresses = self.registry.fetch().await?;
        *cached = Some(addresses);
        Ok(addresses)
    }

    /// Cached set without fetching.
    pub async fn cached(&self) -> Option<ContractAddressSet> {
        *self.cached.lock().await
    }
}
