//! Singleton store persistence.
//!
//! One keystore row and one truststore row per deployment. Raw bytes plus
//! password and format tag are the durable truth; the keystore also carries
//! its alias/password catalog, which is read, mutated and written together
//! with the bytes as a single unit.

use async_trait::async_trait;
use keyfold_core::StoreFormat;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// Catalog record for one private-key entry of the application keystore.
///
/// The key's own unlock password may differ from the keystore password,
/// which is the only durable metadata not recoverable from the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Alias of the entry inside the keystore bytes.
    pub alias: String,
    /// Password unlocking this entry's private key.
    pub key_password: String,
}

/// The one persistent application keystore row.
#[derive(Debug, Clone)]
pub struct KeystoreRecord {
    /// Raw encoded store.
    pub bytes: Vec<u8>,
    /// Container format of `bytes`.
    pub format: StoreFormat,
    /// Password unlocking the store.
    pub password: String,
    /// Ordered catalog; every alias here exists as a private-key entry
    /// inside the decoded bytes.
    pub key_entries: Vec<KeyEntry>,
}

/// The one persistent application truststore row.
#[derive(Debug, Clone)]
pub struct TruststoreRecord {
    /// Raw encoded store.
    pub bytes: Vec<u8>,
    /// Container format of `bytes`.
    pub format: StoreFormat,
    /// Password unlocking the store.
    pub password: String,
}

/// Persistence boundary for the two singleton stores.
///
/// Implementations only load and save whole rows; the read-modify-write
/// sequence around them is serialized by the calling operator, which holds
/// a per-store mutual-exclusion scope for the full sequence.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Load the keystore row, `None` when never written.
    async fn load_keystore(&self) -> Result<Option<KeystoreRecord>>;

    /// Replace the keystore row (bytes and catalog as one unit).
    async fn save_keystore(&self, record: KeystoreRecord) -> Result<()>;

    /// Load the truststore row, `None` when never written.
    async fn load_truststore(&self) -> Result<Option<TruststoreRecord>>;

    /// Replace the truststore row.
    async fn save_truststore(&self, record: TruststoreRecord) -> Result<()>;
}

/// In-memory repository, the default for tests and embedded use.
#[derive(Default)]
pub struct InMemoryRepository {
    keystore: RwLock<Option<KeystoreRecord>>,
    truststore: RwLock<Option<TruststoreRecord>>,
}

impl InMemoryRepository {
    /// Empty repository: both rows absent until first written.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreRepository for InMemoryRepository {
    async fn load_keystore(&self) -> Result<Option<KeystoreRecord>> {
        Ok(self.keystore.read().await.clone())
    }

    async fn save_keystore(&self, record: KeystoreRecord) -> Result<()> {
        *self.keystore.write().await = Some(record);
        Ok(())
    }

    async fn load_truststore(&self) -> Result<Option<TruststoreRecord>> {
        Ok(self.truststore.read().await.clone())
    }

    async fn save_truststore(&self, record: TruststoreRecord) -> Result<()> {
        *self.truststore.write().await = Some(record);
        Ok(())
    }
}
