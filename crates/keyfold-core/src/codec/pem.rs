//! PEM bundle decoding and encoding.
//!
//! A bundle is a sequence of blocks: `CERTIFICATE` blocks become
//! certificate-only entries, a `PRIVATE KEY` block pairs with the
//! certificates that follow it (leaf first) into a private-key entry.
//! PEM carries no aliases, so entry names are synthesized from the leaf
//! certificate's subject CN, sanitized and de-duplicated.

use std::collections::HashSet;

use tracing::debug;

use crate::container::{ContainerEntry, KeyContainer, KeyMaterial};
use crate::error::{CoreError, Result};
use crate::format::StoreFormat;

/// Decode a PEM bundle into a container.
///
/// `password` becomes the container password; blocks other than
/// `CERTIFICATE` and PKCS#8 `PRIVATE KEY` are skipped. Encrypted private
/// keys are not unwrapped here.
pub fn decode(bytes: &[u8], password: &str) -> Result<KeyContainer> {
    let blocks = pem::parse_many(bytes).map_err(CoreError::PemDecode)?;
    if blocks.is_empty() && !bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(CoreError::PemEmpty);
    }

    let mut container = KeyContainer::new(StoreFormat::Pem, password);
    let mut taken = HashSet::new();
    let mut counter = 0usize;
    // An open private-key entry accumulating its chain.
    let mut pending: Option<(Vec<u8>, Vec<Vec<u8>>)> = None;

    for block in &blocks {
        match block.tag() {
            "PRIVATE KEY" => {
                if let Some(open) = pending.take() {
                    finish_key_entry(&mut container, open, password, &mut taken, &mut counter)?;
                }
                pending = Some((block.contents().to_vec(), Vec::new()));
            }
            "CERTIFICATE" => {
                if let Some((_, chain)) = pending.as_mut() {
                    chain.push(block.contents().to_vec());
                } else {
                    let der = block.contents().to_vec();
                    let alias = synthesize_alias(&der, &mut taken, &mut counter);
                    container.push(ContainerEntry::certificate(alias, der));
                }
            }
            other => {
                debug!(tag = other, "skipping unrecognized PEM block");
            }
        }
    }
    if let Some(open) = pending.take() {
        finish_key_entry(&mut container, open, password, &mut taken, &mut counter)?;
    }

    Ok(container)
}

/// Encode a container as a PEM bundle. Blocks are unencrypted.
pub fn encode(container: &KeyContainer) -> Result<Vec<u8>> {
    let mut blocks = Vec::new();
    for entry in container.entries() {
        if let Some(key) = entry.key() {
            blocks.push(pem::Pem::new("PRIVATE KEY", key.key_der().to_vec()));
            for der in entry.chain_der() {
                blocks.push(pem::Pem::new("CERTIFICATE", der.clone()));
            }
        } else {
            blocks.push(pem::Pem::new("CERTIFICATE", entry.cert_der().to_vec()));
        }
    }
    Ok(pem::encode_many(&blocks).into_bytes())
}

/// Encode a single certificate as a PEM `CERTIFICATE` block.
#[must_use]
pub fn encode_certificate(der: &[u8]) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der.to_vec()))
}

fn finish_key_entry(
    container: &mut KeyContainer,
    (key_der, chain): (Vec<u8>, Vec<Vec<u8>>),
    password: &str,
    taken: &mut HashSet<String>,
    counter: &mut usize,
) -> Result<()> {
    let leaf = chain
        .first()
        .ok_or_else(|| CoreError::EmptyChain(format!("entry-{}", *counter + 1)))?;
    let alias = synthesize_alias(leaf, taken, counter);
    let key = KeyMaterial::new(key_der, password);
    container.push(ContainerEntry::private_key(alias, chain, key)?);
    Ok(())
}

/// Synthesize a path-safe alias from the certificate subject CN, falling
/// back to `entry-N`, de-duplicated with a numeric suffix.
fn synthesize_alias(cert_der: &[u8], taken: &mut HashSet<String>, counter: &mut usize) -> String {
    *counter += 1;
    let base = subject_cn(cert_der)
        .map(|cn| sanitize(&cn))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("entry-{counter}"));

    let mut alias = base.clone();
    let mut n = 1;
    while !taken.insert(alias.clone()) {
        n += 1;
        alias = format!("{base}-{n}");
    }
    alias
}

fn subject_cn(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);
    cn
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
