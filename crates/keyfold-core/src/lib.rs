//! Core types and codecs for the keyfold key-material subsystem.
//!
//! This crate provides the format-level building blocks used by the
//! store-administration layer:
//!
//! - **Formats**: the closed [`StoreFormat`] union and its boundary resolution
//! - **Containers**: the decoded [`KeyContainer`] view of a keystore or
//!   truststore (raw bytes remain the source of truth)
//! - **Codec**: PKCS#12 and PEM decode/encode over the container model
//! - **Projection**: pure [`CertificateInfo`] extraction from DER bytes
//! - **Errors**: [`CoreError`] with causal-chain flattening for multi-level
//!   failure reporting
//!
//! # Example
//!
//! ```rust,ignore
//! use keyfold_core::{codec, StoreFormat};
//!
//! let container = codec::decode(&bytes, StoreFormat::Pkcs12, "changeit")?;
//! for entry in container.entries() {
//!     println!("{} -> {}", entry.alias(), entry.fingerprint());
//! }
//! ```

pub mod certinfo;
pub mod codec;
mod container;
mod error;
mod format;

pub use certinfo::{certificate_info, sha256_fingerprint, CertificateInfo};
pub use container::{ContainerEntry, KeyContainer, KeyMaterial};
pub use error::{error_chain, error_chain_text, CoreError, Result};
pub use format::StoreFormat;
