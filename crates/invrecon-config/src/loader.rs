//! Tenant configuration loading.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use invrecon_core::{MatchingConfiguration, ReconResult, Storage};

use crate::validation::validate_config;

/// Resolves the active matching configuration for a tenant.
pub struct ConfigLoader {
    storage: Arc<dyn Storage>,
}

impl ConfigLoader {
    /// Create a loader over the given storage.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load the active configuration for a tenant, or defaults when the
    /// tenant has never been configured. The returned configuration is
    /// always validated; a stored-but-invalid configuration surfaces as a
    /// config error so the engine refuses to run on it.
    pub fn active_for(&self, tenant_id: Uuid) -> ReconResult<MatchingConfiguration> {
        let config = match self.storage.active_configuration(tenant_id)? {
            Some(stored) => {
                debug!(%tenant_id, version = %stored.config_version, "loaded active matching configuration");
                stored
            }
            None => {
                debug!(%tenant_id, "no active configuration, using defaults");
                MatchingConfiguration::defaults(tenant_id)
            }
        };

        validate_config(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrecon_core::MemoryStorage;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_when_unconfigured() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let loader = ConfigLoader::new(Arc::clone(&storage));
        let tenant = Uuid::new_v4();

        let config = loader.active_for(tenant).unwrap();
        assert_eq!(config.auto_approve_threshold, dec!(0.85));
        assert_eq!(config.manual_review_threshold, dec!(0.70));
    }

    #[test]
    fn test_stored_configuration_wins() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let tenant = Uuid::new_v4();

        let mut stored = MatchingConfiguration::defaults(tenant);
        stored.auto_approve_threshold = dec!(0.90);
        stored.config_version = "7".to_string();
        storage
            .transaction(tenant, &mut |txn| txn.insert_configuration(stored.clone()))
            .unwrap();

        let loader = ConfigLoader::new(Arc::clone(&storage));
        let config = loader.active_for(tenant).unwrap();
        assert_eq!(config.auto_approve_threshold, dec!(0.90));
        assert_eq!(config.config_version, "7");
    }

    #[test]
    fn test_invalid_stored_configuration_is_refused() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let tenant = Uuid::new_v4();

        let mut stored = MatchingConfiguration::defaults(tenant);
        stored.amount_weight = dec!(0.90); // weights no longer sum to 1.0
        storage
            .transaction(tenant, &mut |txn| txn.insert_configuration(stored.clone()))
            .unwrap();

        let loader = ConfigLoader::new(storage);
        assert!(loader.active_for(tenant).is_err());
    }
}
