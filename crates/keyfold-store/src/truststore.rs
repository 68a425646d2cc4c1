//! Application truststore administration.
//!
//! Unlike the keystore there is no two-phase workflow: an uploaded trust
//! store (or a single certificate) is folded into the singleton store in
//! one pass, classifying every alias into added / duplicate-alias /
//! duplicate-certificate buckets. The merge is content-preserving and
//! idempotent.

use std::sync::Arc;

use keyfold_core::{
    certificate_info, codec, sha256_fingerprint, CertificateInfo, ContainerEntry, KeyContainer,
    StoreFormat,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::alias::{self, ALIAS_SYNTAX_MESSAGE};
use crate::error::{fields, FieldErrors, Result, StoreError};
use crate::repo::{StoreRepository, TruststoreRecord};

/// Outcome of a bulk merge, bucket per classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TruststoreMergeReport {
    /// Aliases inserted into the target store.
    pub added: Vec<String>,
    /// Aliases skipped because the name is already taken in the target
    /// (certificate contents are irrelevant to this bucket).
    pub duplicate_aliases: Vec<String>,
    /// Aliases skipped because an identical certificate already exists
    /// under a different target alias.
    pub duplicate_certificate_aliases: Vec<String>,
}

/// Administration operations over the singleton application truststore.
pub struct TruststoreAdmin {
    repo: Arc<dyn StoreRepository>,
    write_lock: Mutex<()>,
}

impl TruststoreAdmin {
    /// Create the admin over a repository.
    #[must_use]
    pub fn new(repo: Arc<dyn StoreRepository>) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    /// Merge a whole uploaded trust store into the singleton store.
    ///
    /// Every alias of the upload is charset-validated before the target
    /// is touched; a single offender aborts the entire merge with one
    /// summary message plus one message per offending alias — no partial
    /// merge ever happens. Valid uploads are classified alias by alias
    /// in container order.
    pub async fn upload_store(
        &self,
        bytes: &[u8],
        filename: &str,
        password: &str,
    ) -> Result<TruststoreMergeReport> {
        let format = StoreFormat::resolve(None, filename);
        let upload = match codec::decode(bytes, format, password) {
            Ok(container) => container,
            Err(e) => {
                let mut errors = FieldErrors::new();
                errors.push_chain(fields::FILE, &e);
                return Err(StoreError::Invalid(errors));
            }
        };

        let offenders: Vec<String> = upload
            .aliases()
            .into_iter()
            .filter(|a| !alias::is_path_safe(a))
            .collect();
        if !offenders.is_empty() {
            let mut errors = FieldErrors::new();
            errors.push(
                fields::FILE,
                format!(
                    "uploaded trust store contains {} unusable alias(es)",
                    offenders.len()
                ),
            );
            for offender in offenders {
                errors.push(fields::FILE, format!("alias '{offender}': {ALIAS_SYNTAX_MESSAGE}"));
            }
            return Err(StoreError::Invalid(errors));
        }

        let _guard = self.write_lock.lock().await;
        let mut record = self.load_or_default().await?;
        let mut target = codec::decode(&record.bytes, record.format, &record.password)?;

        let mut report = TruststoreMergeReport::default();
        for entry in upload.entries() {
            let entry_alias = entry.alias();
            if target.has_alias(entry_alias) {
                debug!(alias = %entry_alias, "alias already present in truststore, skipping");
                report.duplicate_aliases.push(entry_alias.to_string());
                continue;
            }
            if let Some(existing) = target.find_by_fingerprint(&entry.fingerprint()) {
                debug!(
                    alias = %entry_alias,
                    existing = %existing.alias(),
                    "certificate already present under a different alias, skipping"
                );
                report
                    .duplicate_certificate_aliases
                    .push(entry_alias.to_string());
                continue;
            }
            target.push(ContainerEntry::certificate(
                entry_alias,
                entry.cert_der().to_vec(),
            ));
            report.added.push(entry_alias.to_string());
        }

        if !report.added.is_empty() {
            record.bytes = codec::encode(&target, &record.password)?;
            self.repo.save_truststore(record).await?;
        }

        info!(
            added = report.added.len(),
            duplicate_aliases = report.duplicate_aliases.len(),
            duplicate_certificates = report.duplicate_certificate_aliases.len(),
            "merged uploaded trust store"
        );
        Ok(report)
    }

    /// Insert a single certificate (PEM or DER) under an explicit alias.
    ///
    /// Re-adding the identical alias/certificate pair succeeds without
    /// modifying the store.
    pub async fn add_certificate(&self, bytes: &[u8], alias: &str) -> Result<String> {
        let trimmed = alias.trim();
        let mut errors = FieldErrors::new();
        if trimmed.is_empty() {
            errors.push(fields::ALIAS, "alias must not be blank");
        } else if !alias::is_path_safe(trimmed) {
            errors.push(fields::ALIAS, ALIAS_SYNTAX_MESSAGE);
        }

        let cert_der = match codec::decode_single_certificate(bytes) {
            Ok(der) => der,
            Err(e) => {
                errors.push_chain(fields::CERTIFICATE, &e);
                return Err(StoreError::Invalid(errors));
            }
        };
        errors.into_result()?;

        let _guard = self.write_lock.lock().await;
        let mut record = self.load_or_default().await?;
        let mut target = codec::decode(&record.bytes, record.format, &record.password)?;

        let fingerprint = sha256_fingerprint(&cert_der);
        if let Some(existing) = target.entry(trimmed) {
            if existing.fingerprint() == fingerprint {
                debug!(alias = %trimmed, "identical certificate already stored, nothing to do");
                return Ok(trimmed.to_string());
            }
            return Err(StoreError::invalid(
                fields::ALIAS,
                format!("alias '{trimmed}' is already taken"),
            ));
        }
        if let Some(existing) = target.find_by_fingerprint(&fingerprint) {
            return Err(StoreError::invalid(
                fields::CERTIFICATE,
                format!(
                    "certificate is already present under alias '{}'",
                    existing.alias()
                ),
            ));
        }

        target.push(ContainerEntry::certificate(trimmed, cert_der));
        record.bytes = codec::encode(&target, &record.password)?;
        self.repo.save_truststore(record).await?;

        info!(alias = %trimmed, "added certificate to application truststore");
        Ok(trimmed.to_string())
    }

    /// All truststore aliases, in store order.
    pub async fn list_aliases(&self) -> Result<Vec<String>> {
        let record = self.load_or_default().await?;
        let container = codec::decode(&record.bytes, record.format, &record.password)?;
        Ok(container.aliases())
    }

    /// Projection of one stored certificate.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no certificate with this alias exists.
    pub async fn get_certificate(&self, alias: &str) -> Result<CertificateInfo> {
        let entry = self.find_entry(alias).await?;
        Ok(certificate_info(entry.cert_der())?)
    }

    /// Export one stored certificate as a PEM `CERTIFICATE` block.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no certificate with this alias exists.
    pub async fn export_certificate(&self, alias: &str) -> Result<String> {
        let entry = self.find_entry(alias).await?;
        Ok(codec::encode_certificate(entry.cert_der()))
    }

    /// Remove one certificate, leaving every other entry untouched.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no certificate with this alias exists;
    /// the store is left fully unchanged.
    pub async fn delete_certificate(&self, alias: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .repo
            .load_truststore()
            .await?
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))?;
        let mut container = codec::decode(&record.bytes, record.format, &record.password)?;

        if container.remove(alias).is_none() {
            return Err(StoreError::NotFound(alias.to_string()));
        }
        record.bytes = codec::encode(&container, &record.password)?;
        self.repo.save_truststore(record).await?;

        info!(alias = %alias, "deleted certificate from application truststore");
        Ok(())
    }

    async fn find_entry(&self, alias: &str) -> Result<ContainerEntry> {
        let record = self.load_or_default().await?;
        let container = codec::decode(&record.bytes, record.format, &record.password)?;
        container
            .entry(alias)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))
    }

    /// Current record, or a fresh empty one when never written. The empty
    /// record is not persisted here; mutating operations save their final
    /// state themselves.
    async fn load_or_default(&self) -> Result<TruststoreRecord> {
        if let Some(record) = self.repo.load_truststore().await? {
            return Ok(record);
        }
        let password = Uuid::new_v4().simple().to_string();
        let empty = KeyContainer::new(StoreFormat::Pkcs12, password.as_str());
        let bytes = codec::encode(&empty, &password)?;
        Ok(TruststoreRecord {
            bytes,
            format: StoreFormat::Pkcs12,
            password,
        })
    }
}
