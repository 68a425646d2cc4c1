//! # keyfold-store
//!
//! Administration of the two application-wide key-material stores of the
//! keyfold OAuth/OIDC test client: one keystore (TLS client authentication,
//! JWT signing) and one truststore (peer certificates).
//!
//! ## Workflow
//!
//! ```text
//! Phase 1: upload
//!   raw bytes -> codec decode -> UploadCache (opaque token) -> alias list
//!
//! Phase 2: selection / merge
//!   token + alias choice -> collision checks against the singleton store
//!   -> read-decode-mutate-encode-write under a per-store lock
//!
//! Truststore: one-shot bulk merge, classifying every alias into
//!   added / duplicate-alias / duplicate-certificate buckets
//! ```
//!
//! Validation failures are accumulated into [`FieldErrors`] and reported
//! together; only an unresolvable upload token and a wrong alias
//! cardinality abort early. Every read-modify-write sequence over a
//! singleton store runs under that store's mutex, so concurrent merges
//! serialize instead of losing updates.

mod alias;
mod cache;
mod error;
mod keystore;
mod repo;
mod service;
mod truststore;

pub use cache::{CacheConfig, CachedUpload, UploadCache};
pub use error::{fields, FieldError, FieldErrors, Result, StoreError};
pub use keystore::{KeystoreAdmin, KeystoreEntryView, KeystoreUpload, SelectAliasRequest};
pub use repo::{InMemoryRepository, KeyEntry, KeystoreRecord, StoreRepository, TruststoreRecord};
pub use service::AdminService;
pub use truststore::{TruststoreAdmin, TruststoreMergeReport};

#[cfg(test)]
pub(crate) mod testutil {
    //! Fixture material for merge-flow tests: throwaway keys and
    //! certificates minted at test time, assembled into real PKCS#12
    //! bytes through the production codec.

    use keyfold_core::{codec, ContainerEntry, KeyContainer, KeyMaterial, StoreFormat};
    use rcgen::{CertificateParams, DnType, KeyPair};

    /// A self-signed certificate plus its PKCS#8 key, DER-encoded.
    pub fn key_and_cert(cn: &str) -> (Vec<u8>, Vec<u8>) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        let cert = params.self_signed(&key).unwrap();
        (key.serialize_der(), cert.der().as_ref().to_vec())
    }

    /// A self-signed certificate only, DER-encoded.
    pub fn cert(cn: &str) -> Vec<u8> {
        key_and_cert(cn).1
    }

    /// PKCS#12 bytes holding one private-key entry per `(alias, cn)` pair.
    pub fn keystore_bytes(entries: &[(&str, &str)], password: &str) -> Vec<u8> {
        let mut container = KeyContainer::new(StoreFormat::Pkcs12, password);
        for (alias, cn) in entries {
            let (key_der, cert_der) = key_and_cert(cn);
            container.push(
                ContainerEntry::private_key(
                    *alias,
                    vec![cert_der],
                    KeyMaterial::new(key_der, password),
                )
                .unwrap(),
            );
        }
        codec::encode(&container, password).unwrap()
    }

    /// PKCS#12 bytes holding one certificate-only entry per `(alias, der)`.
    pub fn truststore_bytes(entries: &[(&str, Vec<u8>)], password: &str) -> Vec<u8> {
        let mut container = KeyContainer::new(StoreFormat::Pkcs12, password);
        for (alias, der) in entries {
            container.push(ContainerEntry::certificate(*alias, der.clone()));
        }
        codec::encode(&container, password).unwrap()
    }
}
