//! Aggregated administration service.

use std::sync::Arc;

use crate::cache::CacheConfig;
use crate::keystore::KeystoreAdmin;
use crate::repo::StoreRepository;
use crate::truststore::TruststoreAdmin;

/// Both store admins wired to one repository.
///
/// The surrounding resource layer holds one of these per deployment and
/// dispatches boundary calls to the matching admin.
pub struct AdminService {
    keystore: KeystoreAdmin,
    truststore: TruststoreAdmin,
}

impl AdminService {
    /// Wire both admins to the given repository.
    #[must_use]
    pub fn new(repo: Arc<dyn StoreRepository>, cache_config: CacheConfig) -> Self {
        Self {
            keystore: KeystoreAdmin::new(Arc::clone(&repo), cache_config),
            truststore: TruststoreAdmin::new(repo),
        }
    }

    /// Keystore administration.
    #[must_use]
    pub fn keystore(&self) -> &KeystoreAdmin {
        &self.keystore
    }

    /// Truststore administration.
    #[must_use]
    pub fn truststore(&self) -> &TruststoreAdmin {
        &self.truststore
    }
}
