//! Store format tags and boundary resolution.

use serde::{Deserialize, Serialize};

/// Container format of a keystore or truststore.
///
/// Resolved once at the upload boundary; the codec operates purely on the
/// resolved tag afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// PKCS#12/PFX container (keys and certificates, password-protected).
    /// The generic default when nothing else matches.
    #[default]
    Pkcs12,
    /// PEM bundle (concatenated certificate and private-key blocks).
    Pem,
}

impl StoreFormat {
    /// Resolve a format from a filename extension, if recognizable.
    pub fn from_extension(filename: &str) -> Option<Self> {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)?;
        match ext.as_str() {
            "p12" | "pfx" => Some(Self::Pkcs12),
            "pem" | "crt" | "cer" => Some(Self::Pem),
            _ => None,
        }
    }

    /// Resolve the effective format: explicit hint wins, then the filename
    /// extension, then the generic default.
    #[must_use]
    pub fn resolve(hint: Option<Self>, filename: &str) -> Self {
        hint.or_else(|| Self::from_extension(filename))
            .unwrap_or_default()
    }

    /// Short lowercase name of the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pkcs12 => "pkcs12",
            Self::Pem => "pem",
        }
    }
}

impl std::fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
