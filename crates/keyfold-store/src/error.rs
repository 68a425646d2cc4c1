//! Error types and the field-error accumulator.
//!
//! Validation failures are collected per request and returned together;
//! they never short-circuit at the first finding except where a
//! precondition makes further checks meaningless (unresolved upload
//! token, wrong alias cardinality).

use keyfold_core::{error_chain, CoreError};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for keyfold-store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Field names used in validation reports.
pub mod fields {
    /// The alias selection list of a phase-2 request.
    pub const ALIASES: &str = "aliases";
    /// The optional alias override of a phase-2 request.
    pub const ALIAS_OVERRIDE: &str = "alias_override";
    /// The optional private-key password of a phase-2 request.
    pub const PRIVATE_KEY_PASSWORD: &str = "private_key_password";
    /// The alias of a single-certificate upload.
    pub const ALIAS: &str = "alias";
    /// The certificate bytes of a single-certificate upload.
    pub const CERTIFICATE: &str = "certificate";
    /// The uploaded container file.
    pub const FILE: &str = "file";
}

/// One validation message, optionally bound to a request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Request field the message belongs to; `None` for global messages.
    pub field: Option<String>,
    /// Human-readable message.
    pub message: String,
}

/// Accumulator for validation messages of one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    /// Empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no message has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Recorded messages, in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Messages recorded for one field.
    #[must_use]
    pub fn for_field(&self, field: &str) -> Vec<&FieldError> {
        self.errors
            .iter()
            .filter(|e| e.field.as_deref() == Some(field))
            .collect()
    }

    /// Record a field-bound message.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: Some(field.to_string()),
            message: message.into(),
        });
    }

    /// Record a global (non-field) message.
    pub fn push_global(&mut self, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: None,
            message: message.into(),
        });
    }

    /// Record every message of an error's causal chain on one field.
    ///
    /// The interesting cause is often nested two or three levels deep;
    /// each level becomes its own message so none is lost.
    pub fn push_chain(&mut self, field: &str, err: &(dyn std::error::Error + 'static)) {
        for message in error_chain(err) {
            self.push(field, message);
        }
    }

    /// `Ok(())` when empty, otherwise `Err(StoreError::Invalid)`.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Invalid(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for e in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            match &e.field {
                Some(field) => write!(f, "{field}: {}", e.message)?,
                None => f.write_str(&e.message)?,
            }
        }
        Ok(())
    }
}

/// Errors of the store-administration layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The upload token does not resolve to a cached upload.
    /// User-visible, non-field.
    #[error("the upload token could not be resolved to a previously uploaded keystore")]
    StateNotFound,

    /// One or more validation findings; reported together.
    #[error("validation failed: {0}")]
    Invalid(FieldErrors),

    /// A named entry does not exist in the target store.
    #[error("no entry named '{0}' was found")]
    NotFound(String),

    /// The persisted singleton store itself failed to decode or encode.
    #[error(transparent)]
    Codec(#[from] CoreError),

    /// Fatal persistence failure; propagated as-is.
    #[error("repository error: {0}")]
    Repository(String),
}

impl StoreError {
    /// Single-field convenience constructor.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.push(field, message);
        Self::Invalid(errors)
    }

    /// The accumulated validation findings, if this is a validation error.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}
