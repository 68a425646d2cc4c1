//! Application keystore administration.
//!
//! Two-phase workflow: `upload` decodes a container and parks it in the
//! upload cache; `select_alias` later folds exactly one chosen entry into
//! the singleton keystore, resolving the private-key password, detecting
//! alias and certificate collisions, and rewriting bytes plus catalog as
//! one unit under the store lock.

use std::sync::Arc;

use keyfold_core::{
    certificate_info, codec, error_chain_text, CertificateInfo, ContainerEntry, CoreError,
    KeyContainer, KeyMaterial, StoreFormat,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::alias::{self, ALIAS_SYNTAX_MESSAGE};
use crate::cache::{CacheConfig, CachedUpload, UploadCache};
use crate::error::{fields, FieldErrors, Result, StoreError};
use crate::repo::{KeyEntry, KeystoreRecord, StoreRepository};

/// Phase-1 result: the token to present during alias selection, plus the
/// aliases found in the upload.
#[derive(Debug, Clone, Serialize)]
pub struct KeystoreUpload {
    /// Opaque handle of the parked upload.
    pub token: String,
    /// Aliases contained in the decoded upload.
    pub aliases: Vec<String>,
}

/// Phase-2 request: which entry of a parked upload to merge, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectAliasRequest {
    /// Token returned by the upload.
    pub token: String,
    /// Alias selection; must hold exactly one element.
    pub aliases: Vec<String>,
    /// Optional replacement name for the merged entry.
    pub alias_override: Option<String>,
    /// Optional private-key password; falls back to the upload password.
    pub private_key_password: Option<String>,
}

/// One keystore entry as presented to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct KeystoreEntryView {
    /// Alias of the entry.
    pub alias: String,
    /// Projection of the entry's leaf certificate.
    pub certificate: CertificateInfo,
}

/// Administration operations over the singleton application keystore.
pub struct KeystoreAdmin {
    repo: Arc<dyn StoreRepository>,
    cache: UploadCache,
    write_lock: Mutex<()>,
}

impl KeystoreAdmin {
    /// Create the admin over a repository, with upload-cache bounds.
    #[must_use]
    pub fn new(repo: Arc<dyn StoreRepository>, cache_config: CacheConfig) -> Self {
        Self {
            repo,
            cache: UploadCache::new(cache_config),
            write_lock: Mutex::new(()),
        }
    }

    /// Phase 1: decode an uploaded container and park it for selection.
    ///
    /// Decode-only; the singleton store is not touched. Decode failures
    /// report every message of the causal chain on the file field.
    pub async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        password: &str,
    ) -> Result<KeystoreUpload> {
        let format = StoreFormat::resolve(None, filename);
        let container = match codec::decode(bytes, format, password) {
            Ok(container) => container,
            Err(e) => {
                let mut errors = FieldErrors::new();
                errors.push_chain(fields::FILE, &e);
                return Err(StoreError::Invalid(errors));
            }
        };

        let aliases = container.aliases();
        debug!(format = %format, count = aliases.len(), "decoded uploaded keystore");

        let token = self
            .cache
            .put(CachedUpload {
                container,
                raw: bytes.to_vec(),
                password: password.to_string(),
            })
            .await;
        Ok(KeystoreUpload { token, aliases })
    }

    /// Phase 2: merge exactly one entry of a parked upload into the
    /// singleton keystore.
    ///
    /// Findings from the individual checks are accumulated and reported
    /// together; only an unresolvable token and a wrong selection
    /// cardinality abort immediately, since nothing later is meaningful
    /// without a valid single alias and container.
    pub async fn select_alias(&self, req: SelectAliasRequest) -> Result<KeystoreEntryView> {
        let upload = self.cache.get(&req.token).await?;

        if req.aliases.len() != 1 {
            return Err(StoreError::invalid(
                fields::ALIASES,
                "exactly one alias must be selected",
            ));
        }
        let selected = req.aliases[0].as_str();

        let mut errors = FieldErrors::new();

        let entry = upload.container.entry(selected);
        if entry.is_none() {
            errors.push(fields::ALIASES, format!("unknown alias '{selected}'"));
        }

        // Password fallback chain: explicit non-blank value, else the
        // password the upload was decoded with.
        let effective_password = match req.private_key_password.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => upload.password.as_str(),
        };

        let recovered = match entry {
            Some(e) => e.recover_key(effective_password).map(<[u8]>::to_vec),
            None => Err(CoreError::KeyRecovery {
                alias: selected.to_string(),
                source: Box::new(CoreError::UnknownAlias(selected.to_string())),
            }),
        };
        if let Err(e) = &recovered {
            // Reported from both contexts: the alias gets the short
            // message, the password field the full causal chain.
            errors.push(fields::ALIASES, e.to_string());
            errors.push(fields::PRIVATE_KEY_PASSWORD, error_chain_text(e));
        }

        let override_supplied = alias::normalize_override(req.alias_override.as_deref());
        let effective_alias = override_supplied.unwrap_or(selected);
        if !alias::is_path_safe(effective_alias) {
            errors.push(fields::ALIASES, ALIAS_SYNTAX_MESSAGE);
            if override_supplied.is_some() {
                errors.push(fields::ALIAS_OVERRIDE, ALIAS_SYNTAX_MESSAGE);
            }
        }

        let _guard = self.write_lock.lock().await;
        let mut record = self.load_or_default().await?;
        let mut target = codec::decode(&record.bytes, record.format, &record.password)?;

        if record.key_entries.iter().any(|k| k.alias == effective_alias) {
            let message = format!("alias '{effective_alias}' is already in use");
            if override_supplied.is_some() {
                errors.push(fields::ALIAS_OVERRIDE, message);
            } else {
                errors.push(fields::ALIASES, message);
            }
        }

        // Storing the same key twice under two aliases is never useful,
        // so the identity check runs even with a fresh override name.
        if let Some(source) = entry {
            if let Some(existing) = target.find_by_fingerprint(&source.fingerprint()) {
                errors.push(
                    fields::ALIASES,
                    format!(
                        "selected key is already present under alias '{}'",
                        existing.alias()
                    ),
                );
            }
        }

        errors.into_result()?;

        let source = match entry {
            Some(e) => e,
            None => {
                return Err(StoreError::invalid(
                    fields::ALIASES,
                    format!("unknown alias '{selected}'"),
                ))
            }
        };
        let key_der = recovered?;

        let info = certificate_info(source.cert_der())?;
        // Re-encode under the keystore's own password, not the upload's.
        target.push(ContainerEntry::private_key(
            effective_alias,
            source.chain_der().to_vec(),
            KeyMaterial::new(key_der, record.password.clone()),
        )?);
        record.bytes = codec::encode(&target, &record.password)?;
        record.key_entries.push(KeyEntry {
            alias: effective_alias.to_string(),
            key_password: record.password.clone(),
        });
        self.repo.save_keystore(record).await?;

        info!(alias = %effective_alias, "merged key entry into application keystore");
        Ok(KeystoreEntryView {
            alias: effective_alias.to_string(),
            certificate: info,
        })
    }

    /// All keystore entries, in catalog order.
    pub async fn list_entries(&self) -> Result<Vec<KeystoreEntryView>> {
        let record = self.load_or_default().await?;
        let container = codec::decode(&record.bytes, record.format, &record.password)?;

        let mut views = Vec::with_capacity(record.key_entries.len());
        for key_entry in &record.key_entries {
            views.push(Self::view(&container, &key_entry.alias)?);
        }
        Ok(views)
    }

    /// A single keystore entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no entry with this alias exists.
    pub async fn get_entry(&self, alias: &str) -> Result<KeystoreEntryView> {
        let record = self.load_or_default().await?;
        if !record.key_entries.iter().any(|k| k.alias == alias) {
            return Err(StoreError::NotFound(alias.to_string()));
        }
        let container = codec::decode(&record.bytes, record.format, &record.password)?;
        Self::view(&container, alias)
    }

    /// Remove one entry, leaving every other entry untouched.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no entry with this alias exists; the
    /// store is left fully unchanged.
    pub async fn delete_entry(&self, alias: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .repo
            .load_keystore()
            .await?
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))?;
        if !record.key_entries.iter().any(|k| k.alias == alias) {
            return Err(StoreError::NotFound(alias.to_string()));
        }

        let mut container = codec::decode(&record.bytes, record.format, &record.password)?;
        container.remove(alias);
        record.bytes = codec::encode(&container, &record.password)?;
        record.key_entries.retain(|k| k.alias != alias);
        self.repo.save_keystore(record).await?;

        info!(alias = %alias, "deleted key entry from application keystore");
        Ok(())
    }

    /// Current record, or a fresh empty one when never written.
    ///
    /// The empty record is not persisted here; mutating operations save
    /// their final state themselves, read-only ones stay read-only.
    async fn load_or_default(&self) -> Result<KeystoreRecord> {
        if let Some(record) = self.repo.load_keystore().await? {
            return Ok(record);
        }
        let password = Uuid::new_v4().simple().to_string();
        let empty = KeyContainer::new(StoreFormat::Pkcs12, password.as_str());
        let bytes = codec::encode(&empty, &password)?;
        Ok(KeystoreRecord {
            bytes,
            format: StoreFormat::Pkcs12,
            password,
            key_entries: Vec::new(),
        })
    }

    fn view(container: &KeyContainer, alias: &str) -> Result<KeystoreEntryView> {
        let entry = container
            .entry(alias)
            .ok_or_else(|| CoreError::UnknownAlias(alias.to_string()))?;
        Ok(KeystoreEntryView {
            alias: alias.to_string(),
            certificate: certificate_info(entry.cert_der())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::fields;
    use crate::repo::InMemoryRepository;
    use crate::testutil;

    fn setup() -> (Arc<InMemoryRepository>, KeystoreAdmin) {
        let repo = Arc::new(InMemoryRepository::new());
        let admin = KeystoreAdmin::new(repo.clone(), CacheConfig::default());
        (repo, admin)
    }

    fn select(token: &str, aliases: &[&str]) -> SelectAliasRequest {
        SelectAliasRequest {
            token: token.to_string(),
            aliases: aliases.iter().map(ToString::to_string).collect(),
            alias_override: None,
            private_key_password: None,
        }
    }

    async fn stored_bytes(repo: &InMemoryRepository) -> Option<Vec<u8>> {
        repo.load_keystore().await.unwrap().map(|r| r.bytes)
    }

    #[tokio::test]
    async fn test_upload_returns_exactly_the_contained_aliases() {
        let (_, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("a", "a-cn"), ("b", "b-cn"), ("c", "c-cn")], "pw");

        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        assert_eq!(upload.aliases, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_upload_with_wrong_password_reports_causal_chain() {
        let (repo, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "correct");

        let err = admin.upload(&bytes, "upload.p12", "wrong").await.unwrap_err();
        let errors = err.field_errors().unwrap();
        assert!(!errors.for_field(fields::FILE).is_empty());
        assert!(stored_bytes(&repo).await.is_none());
    }

    #[tokio::test]
    async fn test_select_merges_exactly_one_entry() {
        let (repo, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let source_cert = {
            let container =
                keyfold_core::codec::decode(&bytes, StoreFormat::Pkcs12, "pw").unwrap();
            container.entry("client").unwrap().cert_der().to_vec()
        };

        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        let merged = admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap();
        assert_eq!(merged.alias, "client");

        let record = repo.load_keystore().await.unwrap().unwrap();
        assert_eq!(record.key_entries.len(), 1);
        let stored =
            keyfold_core::codec::decode(&record.bytes, record.format, &record.password).unwrap();
        assert_eq!(stored.aliases(), vec!["client"]);
        // The merged certificate is byte-identical to the source.
        assert_eq!(stored.entry("client").unwrap().cert_der(), source_cert);
        assert!(stored.entry("client").unwrap().has_key());
    }

    #[tokio::test]
    async fn test_unknown_token_aborts_with_state_error() {
        let (_, admin) = setup();
        let err = admin
            .select_alias(select("deadbeef", &["client"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StateNotFound));
    }

    #[tokio::test]
    async fn test_wrong_cardinality_is_rejected_and_store_untouched() {
        let (repo, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("a", "a-cn"), ("b", "b-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();

        for selection in [&[][..], &["a", "b"][..]] {
            let err = admin
                .select_alias(select(&upload.token, selection))
                .await
                .unwrap_err();
            let errors = err.field_errors().unwrap();
            assert_eq!(errors.for_field(fields::ALIASES).len(), 1);
        }
        assert!(stored_bytes(&repo).await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_key_password_reports_both_fields() {
        let (repo, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();

        let mut req = select(&upload.token, &["client"]);
        req.private_key_password = Some("not-the-password".to_string());
        let err = admin.select_alias(req).await.unwrap_err();

        let errors = err.field_errors().unwrap();
        assert_eq!(errors.for_field(fields::ALIASES).len(), 1);
        let password_errors = errors.for_field(fields::PRIVATE_KEY_PASSWORD);
        assert_eq!(password_errors.len(), 1);
        // The password field carries the full causal chain.
        assert!(password_errors[0].message.contains("container password"));
        assert!(stored_bytes(&repo).await.is_none());
    }

    #[tokio::test]
    async fn test_blank_password_falls_back_to_upload_password() {
        let (_, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();

        let mut req = select(&upload.token, &["client"]);
        req.private_key_password = Some("   ".to_string());
        assert!(admin.select_alias(req).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_alias_reports_selection_and_key_access_together() {
        let (_, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();

        let err = admin
            .select_alias(select(&upload.token, &["ghost"]))
            .await
            .unwrap_err();
        let errors = err.field_errors().unwrap();

        let alias_messages = errors.for_field(fields::ALIASES);
        assert_eq!(alias_messages.len(), 2);
        assert!(alias_messages[0].message.contains("unknown alias 'ghost'"));
        assert!(alias_messages[1].message.contains("could not access the private key"));
        assert_eq!(errors.for_field(fields::PRIVATE_KEY_PASSWORD).len(), 1);
    }

    #[tokio::test]
    async fn test_path_unsafe_override_reported_on_both_fields() {
        let (_, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();

        let mut req = select(&upload.token, &["client"]);
        req.alias_override = Some("not a/path segment".to_string());
        let err = admin.select_alias(req).await.unwrap_err();

        let errors = err.field_errors().unwrap();
        let on_aliases = errors.for_field(fields::ALIASES);
        let on_override = errors.for_field(fields::ALIAS_OVERRIDE);
        assert_eq!(on_aliases.len(), 1);
        assert_eq!(on_override.len(), 1);
        assert_eq!(on_aliases[0].message, on_override[0].message);
    }

    #[tokio::test]
    async fn test_duplicate_alias_rejected_then_override_succeeds() {
        let (repo, admin) = setup();
        let first = testutil::keystore_bytes(&[("client", "first-cn")], "pw");
        let second = testutil::keystore_bytes(&[("client", "second-cn")], "pw");

        let upload = admin.upload(&first, "first.p12", "pw").await.unwrap();
        admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap();

        // Same alias, different key material: rejected on the selection.
        let upload = admin.upload(&second, "second.p12", "pw").await.unwrap();
        let err = admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap_err();
        let errors = err.field_errors().unwrap();
        assert_eq!(errors.for_field(fields::ALIASES).len(), 1);
        assert!(errors.for_field(fields::ALIASES)[0]
            .message
            .contains("already in use"));

        // A fresh override name merges under the override, not the original.
        let mut req = select(&upload.token, &["client"]);
        req.alias_override = Some("client-2".to_string());
        let merged = admin.select_alias(req).await.unwrap();
        assert_eq!(merged.alias, "client-2");

        let record = repo.load_keystore().await.unwrap().unwrap();
        let aliases: Vec<_> = record.key_entries.iter().map(|k| k.alias.clone()).collect();
        assert_eq!(aliases, vec!["client", "client-2"]);
    }

    #[tokio::test]
    async fn test_colliding_override_reported_on_override_field() {
        let (_, admin) = setup();
        let first = testutil::keystore_bytes(&[("client", "first-cn")], "pw");
        let second = testutil::keystore_bytes(&[("other", "second-cn")], "pw");

        let upload = admin.upload(&first, "first.p12", "pw").await.unwrap();
        admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap();

        let upload = admin.upload(&second, "second.p12", "pw").await.unwrap();
        let mut req = select(&upload.token, &["other"]);
        req.alias_override = Some("client".to_string());
        let err = admin.select_alias(req).await.unwrap_err();

        let errors = err.field_errors().unwrap();
        assert_eq!(errors.for_field(fields::ALIAS_OVERRIDE).len(), 1);
        assert!(errors.for_field(fields::ALIASES).is_empty());
    }

    #[tokio::test]
    async fn test_same_key_rejected_even_under_fresh_override() {
        let (_, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");

        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap();

        // Identical container again, fresh unused override: still rejected.
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        let mut req = select(&upload.token, &["client"]);
        req.alias_override = Some("renamed".to_string());
        let err = admin.select_alias(req).await.unwrap_err();

        let errors = err.field_errors().unwrap();
        let messages = errors.for_field(fields::ALIASES);
        assert!(messages
            .iter()
            .any(|e| e.message.contains("already present under alias 'client'")));
    }

    #[tokio::test]
    async fn test_list_starts_empty_and_follows_merges() {
        let (_, admin) = setup();
        assert!(admin.list_entries().await.unwrap().is_empty());

        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap();

        let entries = admin.list_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].alias, "client");
        assert!(entries[0].certificate.subject_dn.contains("client-cn"));
    }

    #[tokio::test]
    async fn test_get_entry() {
        let (_, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap();

        let view = admin.get_entry("client").await.unwrap();
        assert_eq!(view.alias, "client");
        assert!(matches!(
            admin.get_entry("ghost").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_only_the_named_entry() {
        let (repo, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("a", "a-cn"), ("b", "b-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        admin.select_alias(select(&upload.token, &["a"])).await.unwrap();
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        admin.select_alias(select(&upload.token, &["b"])).await.unwrap();

        admin.delete_entry("a").await.unwrap();

        let record = repo.load_keystore().await.unwrap().unwrap();
        let stored =
            keyfold_core::codec::decode(&record.bytes, record.format, &record.password).unwrap();
        assert_eq!(stored.aliases(), vec!["b"]);
        assert_eq!(record.key_entries.len(), 1);
        assert_eq!(record.key_entries[0].alias, "b");
    }

    #[tokio::test]
    async fn test_delete_unknown_alias_leaves_store_unchanged() {
        let (repo, admin) = setup();
        let bytes = testutil::keystore_bytes(&[("client", "client-cn")], "pw");
        let upload = admin.upload(&bytes, "upload.p12", "pw").await.unwrap();
        admin
            .select_alias(select(&upload.token, &["client"]))
            .await
            .unwrap();
        let before = stored_bytes(&repo).await;

        let err = admin.delete_entry("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(stored_bytes(&repo).await, before);
    }
}
