//! Error types for key-material decoding, encoding and key recovery.

use thiserror::Error;

/// Result type alias for keyfold-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while decoding, encoding or inspecting key material.
#[derive(Error, Debug)]
pub enum CoreError {
    /// PKCS#12 container could not be decoded (bad bytes or wrong password).
    #[error("failed to decode PKCS#12 container")]
    Pkcs12Decode(#[source] p12_keystore::error::Error),

    /// PKCS#12 container could not be re-encoded.
    #[error("failed to encode PKCS#12 container")]
    Pkcs12Encode(#[source] p12_keystore::error::Error),

    /// PEM material could not be parsed.
    #[error("failed to decode PEM material")]
    PemDecode(#[from] pem::PemError),

    /// Input declared as PEM contains no blocks at all.
    #[error("no PEM blocks found in input")]
    PemEmpty,

    /// X.509 certificate bytes could not be parsed.
    #[error("failed to parse X.509 certificate: {0}")]
    CertParse(String),

    /// A private-key entry carries no certificate chain.
    #[error("entry '{0}' has an empty certificate chain")]
    EmptyChain(String),

    /// The private key of an entry could not be recovered.
    #[error("could not access the private key for alias '{alias}'")]
    KeyRecovery {
        /// Alias of the affected entry.
        alias: String,
        /// Underlying cause.
        #[source]
        source: Box<CoreError>,
    },

    /// Key password rejected by the container's consistency rule.
    #[error("key password does not unlock the private key (PKCS#12 ties every key to the container password)")]
    KeyPasswordMismatch,

    /// Entry exists but holds no private key.
    #[error("entry '{0}' does not contain a private key")]
    NoPrivateKey(String),

    /// No entry with the given alias exists in the container.
    #[error("no entry named '{0}' in the container")]
    UnknownAlias(String),
}

/// Flatten an error and its full `source()` chain into an ordered message list.
///
/// The top-level message comes first, the root cause last. Useful when the
/// interesting failure (a MAC check, a per-key unwrap) is nested two or three
/// levels below the error a codec surfaces.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        messages.push(cause.to_string());
        current = cause.source();
    }
    messages
}

/// Render the full causal chain as a single `": "`-joined string.
pub fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    error_chain(err).join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_collects_every_cause() {
        let root = CoreError::KeyPasswordMismatch;
        let nested = CoreError::KeyRecovery {
            alias: "client".to_string(),
            source: Box::new(root),
        };

        let chain = error_chain(&nested);
        assert_eq!(chain.len(), 2);
        assert!(chain[0].contains("alias 'client'"));
        assert!(chain[1].contains("container password"));
    }

    #[test]
    fn test_error_chain_text_joins_in_order() {
        let nested = CoreError::KeyRecovery {
            alias: "a".to_string(),
            source: Box::new(CoreError::NoPrivateKey("a".to_string())),
        };

        let text = error_chain_text(&nested);
        assert!(text.starts_with("could not access the private key"));
        assert!(text.ends_with("does not contain a private key"));
    }

    #[test]
    fn test_single_error_chain_has_one_message() {
        let err = CoreError::UnknownAlias("missing".to_string());
        assert_eq!(error_chain(&err).len(), 1);
    }
}
