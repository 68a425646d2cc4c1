//! Upload cache: decoded-but-not-yet-committed containers.
//!
//! Phase 1 of the merge workflow parks a decoded container here under an
//! opaque token; phase 2 presents the token to resolve it again. Entries
//! are independent per token. Losing one is never a correctness hazard —
//! it only forces a re-upload — so eviction is lazy: expired entries are
//! purged on access, and a capacity cap evicts the stalest entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keyfold_core::KeyContainer;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Bounds for the upload cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Idle seconds after which an entry expires.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of parked uploads.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
        }
    }
}

const fn default_ttl_secs() -> u64 {
    600
}

const fn default_capacity() -> usize {
    32
}

/// A decoded upload parked between phase 1 and phase 2.
#[derive(Debug)]
pub struct CachedUpload {
    /// Decoded view of the upload.
    pub container: KeyContainer,
    /// Raw uploaded bytes — the source of truth the container was
    /// derived from.
    pub raw: Vec<u8>,
    /// Password that unlocked the upload.
    pub password: String,
}

struct Slot {
    upload: Arc<CachedUpload>,
    last_access: Instant,
}

/// Token-keyed arena of parked uploads.
pub struct UploadCache {
    config: CacheConfig,
    slots: Mutex<HashMap<String, Slot>>,
}

impl UploadCache {
    /// Create a cache with the given bounds.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Park an upload and return its fresh, unguessable token.
    pub async fn put(&self, upload: CachedUpload) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let mut slots = self.slots.lock().await;
        Self::purge_expired(&mut slots, self.config.ttl_secs);

        if slots.len() >= self.config.capacity {
            if let Some(stalest) = slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_access)
                .map(|(token, _)| token.clone())
            {
                debug!(token = %stalest, "upload cache full, evicting stalest entry");
                slots.remove(&stalest);
            }
        }

        slots.insert(
            token.clone(),
            Slot {
                upload: Arc::new(upload),
                last_access: Instant::now(),
            },
        );
        token
    }

    /// Resolve a token back to its parked upload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StateNotFound`] for unknown and expired
    /// tokens alike — never a silent empty result.
    pub async fn get(&self, token: &str) -> Result<Arc<CachedUpload>> {
        let mut slots = self.slots.lock().await;
        Self::purge_expired(&mut slots, self.config.ttl_secs);

        let slot = slots.get_mut(token).ok_or(StoreError::StateNotFound)?;
        slot.last_access = Instant::now();
        Ok(Arc::clone(&slot.upload))
    }

    fn purge_expired(slots: &mut HashMap<String, Slot>, ttl_secs: u64) {
        let ttl = Duration::from_secs(ttl_secs);
        slots.retain(|_, slot| slot.last_access.elapsed() < ttl);
    }
}
