//! PKCS#12 container decoding and encoding.
//!
//! Backed by the pure-Rust `p12-keystore` crate. PKCS#12 ties every
//! private key's unlock password to the container password, so decoded
//! key material records the container password as its key password.

use p12_keystore::{Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use tracing::debug;

use crate::container::{ContainerEntry, KeyContainer, KeyMaterial};
use crate::error::{CoreError, Result};
use crate::format::StoreFormat;

/// Decode a PKCS#12 container.
///
/// Entries are ordered by alias: the format exposes an alias-keyed set,
/// so alias order is the only deterministic one available.
pub fn decode(bytes: &[u8], password: &str) -> Result<KeyContainer> {
    let store = KeyStore::from_pkcs12(bytes, password).map_err(CoreError::Pkcs12Decode)?;

    let mut entries = Vec::new();
    for (alias, entry) in store.entries() {
        match entry {
            KeyStoreEntry::Certificate(cert) => {
                entries.push(ContainerEntry::certificate(
                    alias.clone(),
                    cert.as_der().to_vec(),
                ));
            }
            KeyStoreEntry::PrivateKeyChain(chain) => {
                let chain_der: Vec<Vec<u8>> =
                    chain.chain().iter().map(|c| c.as_der().to_vec()).collect();
                let key = KeyMaterial::new(chain.key().to_vec(), password);
                entries.push(ContainerEntry::private_key(alias.clone(), chain_der, key)?);
            }
            _ => {
                debug!(alias = %alias, "skipping unsupported PKCS#12 entry type");
            }
        }
    }
    entries.sort_by(|a, b| a.alias().cmp(b.alias()));

    let mut container = KeyContainer::new(StoreFormat::Pkcs12, password);
    for entry in entries {
        container.push(entry);
    }
    Ok(container)
}

/// Encode a container as PKCS#12 under the given password.
pub fn encode(container: &KeyContainer, password: &str) -> Result<Vec<u8>> {
    let mut store = KeyStore::new();
    for entry in container.entries() {
        let stored = if let Some(key) = entry.key() {
            let mut chain = Vec::with_capacity(entry.chain_der().len());
            for der in entry.chain_der() {
                chain.push(Certificate::from_der(der).map_err(CoreError::Pkcs12Encode)?);
            }
            KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(
                key.key_der(),
                local_key_id(entry.cert_der()),
                chain,
            ))
        } else {
            KeyStoreEntry::Certificate(
                Certificate::from_der(entry.cert_der()).map_err(CoreError::Pkcs12Encode)?,
            )
        };
        store.add_entry(entry.alias(), stored);
    }

    store.writer(password).write().map_err(CoreError::Pkcs12Encode)
}

/// Local key id tying a key to its leaf certificate (SHA-256 of the DER).
fn local_key_id(cert_der: &[u8]) -> Vec<u8> {
    ring::digest::digest(&ring::digest::SHA256, cert_der)
        .as_ref()
        .to_vec()
}
