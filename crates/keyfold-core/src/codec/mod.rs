//! Container codec: raw bytes to [`KeyContainer`] and back.
//!
//! The format tag is resolved once at the boundary (see
//! [`StoreFormat::resolve`]); everything here operates purely on the
//! resolved tag.

mod pem;
mod pkcs12;

pub use pem::encode_certificate;

use crate::container::KeyContainer;
use crate::error::{CoreError, Result};
use crate::format::StoreFormat;

/// Decode a key-material container from raw bytes.
///
/// # Errors
///
/// Decode failures carry the full causal chain of the underlying codec,
/// so callers can surface every nested cause (MAC check vs. per-key
/// unwrap are distinct symptoms of the same root problem).
pub fn decode(bytes: &[u8], format: StoreFormat, password: &str) -> Result<KeyContainer> {
    match format {
        StoreFormat::Pkcs12 => pkcs12::decode(bytes, password),
        StoreFormat::Pem => pem::decode(bytes, password),
    }
}

/// Encode a container back to raw bytes in its own format.
///
/// `password` protects the produced container; for PEM it is ignored
/// (PEM bundles carry unencrypted blocks).
///
/// # Errors
///
/// Returns a codec error when an entry cannot be represented in the
/// container's format.
pub fn encode(container: &KeyContainer, password: &str) -> Result<Vec<u8>> {
    match container.format() {
        StoreFormat::Pkcs12 => pkcs12::encode(container, password),
        StoreFormat::Pem => pem::encode(container),
    }
}

/// Decode a single certificate upload, accepting PEM or raw DER.
///
/// Returns the DER bytes of the certificate.
///
/// # Errors
///
/// Returns [`CoreError::CertParse`] when the input holds no parseable
/// certificate.
pub fn decode_single_certificate(bytes: &[u8]) -> Result<Vec<u8>> {
    if let Ok(blocks) = ::pem::parse_many(bytes) {
        if let Some(block) = blocks.iter().find(|b| b.tag() == "CERTIFICATE") {
            let der = block.contents().to_vec();
            x509_parser::parse_x509_certificate(&der)
                .map_err(|e| CoreError::CertParse(e.to_string()))?;
            return Ok(der);
        }
        if !blocks.is_empty() {
            return Err(CoreError::CertParse(
                "PEM input contains no CERTIFICATE block".to_string(),
            ));
        }
    }

    x509_parser::parse_x509_certificate(bytes)
        .map_err(|e| CoreError::CertParse(e.to_string()))?;
    Ok(bytes.to_vec())
}
