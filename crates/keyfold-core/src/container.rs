//! Decoded key-material containers.
//!
//! A [`KeyContainer`] is the in-memory view of a keystore or truststore:
//! an ordered list of alias-keyed entries, each holding a certificate, its
//! chain and optionally a private key. It is always derived from raw bytes
//! via the codec and never the durable source of truth.

use crate::certinfo::sha256_fingerprint;
use crate::error::{CoreError, Result};
use crate::format::StoreFormat;

/// Private-key material of a container entry.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    /// PKCS#8 DER bytes of the key.
    key_der: Vec<u8>,
    /// Password that unlocks this key.
    password: String,
}

impl KeyMaterial {
    /// Wrap key bytes with the password that protects them.
    pub fn new(key_der: impl Into<Vec<u8>>, password: impl Into<String>) -> Self {
        Self {
            key_der: key_der.into(),
            password: password.into(),
        }
    }

    /// PKCS#8 DER bytes of the key.
    #[must_use]
    pub fn key_der(&self) -> &[u8] {
        &self.key_der
    }

    /// Password protecting this key.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

/// One `(alias, certificate, optional private key)` triple of a container.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    alias: String,
    /// Leaf certificate, DER.
    cert_der: Vec<u8>,
    /// Full chain, leaf first.
    chain_der: Vec<Vec<u8>>,
    key: Option<KeyMaterial>,
}

impl ContainerEntry {
    /// Build a certificate-only entry (truststore material).
    pub fn certificate(alias: impl Into<String>, cert_der: impl Into<Vec<u8>>) -> Self {
        let cert_der = cert_der.into();
        Self {
            alias: alias.into(),
            chain_der: vec![cert_der.clone()],
            cert_der,
            key: None,
        }
    }

    /// Build a private-key entry from a chain (leaf first) and key material.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyChain`] when no certificate is supplied.
    pub fn private_key(
        alias: impl Into<String>,
        chain_der: Vec<Vec<u8>>,
        key: KeyMaterial,
    ) -> Result<Self> {
        let alias = alias.into();
        let cert_der = chain_der
            .first()
            .cloned()
            .ok_or_else(|| CoreError::EmptyChain(alias.clone()))?;
        Ok(Self {
            alias,
            cert_der,
            chain_der,
            key: Some(key),
        })
    }

    /// Alias of this entry.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Leaf certificate, DER.
    #[must_use]
    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    /// Certificate chain, leaf first.
    #[must_use]
    pub fn chain_der(&self) -> &[Vec<u8>] {
        &self.chain_der
    }

    /// Whether this entry carries a private key.
    #[must_use]
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Raw key material, if present.
    #[must_use]
    pub fn key(&self) -> Option<&KeyMaterial> {
        self.key.as_ref()
    }

    /// SHA-256 fingerprint of the leaf certificate (lowercase hex).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        sha256_fingerprint(&self.cert_der)
    }

    /// Recover the private key with the given password.
    ///
    /// Containers that tie per-key passwords to the store password (PKCS#12)
    /// reject any other value here; the failure carries the underlying cause
    /// so the full chain can be reported.
    ///
    /// # Errors
    ///
    /// [`CoreError::KeyRecovery`] when the entry has no key or the password
    /// does not unlock it.
    pub fn recover_key(&self, password: &str) -> Result<&[u8]> {
        let recovery_failure = |source: CoreError| CoreError::KeyRecovery {
            alias: self.alias.clone(),
            source: Box::new(source),
        };

        let key = self
            .key
            .as_ref()
            .ok_or_else(|| recovery_failure(CoreError::NoPrivateKey(self.alias.clone())))?;
        if key.password() != password {
            return Err(recovery_failure(CoreError::KeyPasswordMismatch));
        }
        Ok(key.key_der())
    }
}

/// Ordered, alias-keyed view of a decoded keystore or truststore.
#[derive(Debug, Clone)]
pub struct KeyContainer {
    format: StoreFormat,
    password: String,
    entries: Vec<ContainerEntry>,
}

impl KeyContainer {
    /// Create an empty container.
    pub fn new(format: StoreFormat, password: impl Into<String>) -> Self {
        Self {
            format,
            password: password.into(),
            entries: Vec::new(),
        }
    }

    /// Format this container was decoded from (or will encode to).
    #[must_use]
    pub const fn format(&self) -> StoreFormat {
        self.format
    }

    /// Password that unlocked this container.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Entries in container order.
    #[must_use]
    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    /// Aliases in container order.
    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.alias.clone()).collect()
    }

    /// Whether an entry with this alias exists.
    #[must_use]
    pub fn has_alias(&self, alias: &str) -> bool {
        self.entries.iter().any(|e| e.alias == alias)
    }

    /// Look up an entry by alias.
    #[must_use]
    pub fn entry(&self, alias: &str) -> Option<&ContainerEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    /// Find the entry whose leaf certificate has the given fingerprint.
    #[must_use]
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<&ContainerEntry> {
        self.entries
            .iter()
            .find(|e| e.fingerprint() == fingerprint)
    }

    /// Append an entry, keeping container order.
    pub fn push(&mut self, entry: ContainerEntry) {
        self.entries.push(entry);
    }

    /// Remove the entry with this alias, returning it if present.
    pub fn remove(&mut self, alias: &str) -> Option<ContainerEntry> {
        let idx = self.entries.iter().position(|e| e.alias == alias)?;
        Some(self.entries.remove(idx))
    }
}
