//! Certificate projection: DER bytes to a display descriptor.

use chrono::{DateTime, TimeZone, Utc};
use ring::digest::SHA256;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Display descriptor of a certificate.
///
/// Computed fresh on every request; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Issuer distinguished name (human-readable)
    pub issuer_dn: String,
    /// Subject distinguished name (human-readable)
    pub subject_dn: String,
    /// SHA-256 fingerprint of the DER bytes (lowercase hex)
    pub sha256_fingerprint: String,
    /// Not valid before
    pub not_before: DateTime<Utc>,
    /// Not valid after
    pub not_after: DateTime<Utc>,
}

/// Compute the SHA-256 fingerprint of raw DER bytes (lowercase hex).
#[must_use]
pub fn sha256_fingerprint(der: &[u8]) -> String {
    let digest = ring::digest::digest(&SHA256, der);
    hex::encode(digest.as_ref())
}

/// Project a DER-encoded X.509 certificate into a [`CertificateInfo`].
///
/// # Errors
///
/// Returns [`CoreError::CertParse`] when the bytes are not a valid
/// certificate.
pub fn certificate_info(der: &[u8]) -> Result<CertificateInfo> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| CoreError::CertParse(e.to_string()))?;

    Ok(CertificateInfo {
        issuer_dn: cert.issuer().to_string(),
        subject_dn: cert.subject().to_string(),
        sha256_fingerprint: sha256_fingerprint(der),
        not_before: asn1_to_utc(cert.validity().not_before),
        not_after: asn1_to_utc(cert.validity().not_after),
    })
}

/// Convert an ASN.1 `GeneralizedTime` / `UTCTime` to `DateTime<Utc>`.
fn asn1_to_utc(t: x509_parser::time::ASN1Time) -> DateTime<Utc> {
    let epoch = t.timestamp();
    Utc.timestamp_opt(epoch, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
