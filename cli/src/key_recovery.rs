//! Interactive recovery of a bundle's object-decryption key: prompts for
//! `age` secret keys (pasted directly, or a YubiKey plugin identity, named
//! by a `YubiKey serial <N> slot <M>` selector) one at a time until enough
//! shares have been unsealed to reconstruct the key.

use std::collections::BTreeMap;
use std::io::BufRead;

use swh_bundle::age::list_yubikey_identities;
use swh_bundle::{BundleReader, DecryptionKeyProvider, Manifest};

/// Prompts on stdin for `age` identities until
/// `recover_object_decryption_key_from_encrypted_shares` succeeds or the
/// input is exhausted.
pub struct InteractiveKeyProvider;

/// Parses a `YubiKey serial <N> slot <M>` selector into its `(serial, slot)`
/// parts, or `None` if `line` isn't one.
fn parse_yubikey_selector(line: &str) -> Option<(&str, &str)> {
    let mut words = line.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("yubikey") {
        return None;
    }
    if !words.next()?.eq_ignore_ascii_case("serial") {
        return None;
    }
    let serial = words.next()?;
    if !words.next()?.eq_ignore_ascii_case("slot") {
        return None;
    }
    let slot = words.next()?;
    Some((serial, slot))
}

/// Resolves a typed line to the identity string `age` actually expects:
/// a raw secret key/identity is passed through, while a `YubiKey serial <N>
/// slot <M>` selector is looked up against the plugin's visible identities.
fn resolve_identity(line: &str) -> Result<String, swh_bundle::Error> {
    let Some((serial, slot)) = parse_yubikey_selector(line) else {
        return Ok(line.to_string());
    };
    let identities = list_yubikey_identities()?;
    identities
        .into_iter()
        .find(|identity| identity.label.contains(serial) && identity.label.contains(slot))
        .map(|identity| identity.identity)
        .ok_or_else(|| {
            swh_bundle::Error::Validation(format!("no YubiKey identity matches {line:?}"))
        })
}

impl DecryptionKeyProvider for InteractiveKeyProvider {
    fn object_decryption_key(&self, manifest: &Manifest) -> Result<String, swh_bundle::Error> {
        let shares: BTreeMap<String, String> = manifest
            .decryption_key_shares
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let stdin = std::io::stdin();
        let mut available_keys = Vec::new();
        eprintln!("Enter age secret keys one per line, or a \"YubiKey serial <N> slot <M>\" selector (blank line to attempt recovery):");
        for line in stdin.lock().lines() {
            let line = line.map_err(swh_bundle::Error::Io)?;
            let line = line.trim().to_string();
            if line.is_empty() {
                break;
            }
            available_keys.push(resolve_identity(&line)?);
            match swh_secret_sharing::recover_object_decryption_key_from_encrypted_shares(
                &shares,
                available_keys.iter().cloned(),
                &[],
            ) {
                Ok(secret) => {
                    return String::from_utf8(secret)
                        .map_err(|e| swh_bundle::Error::Validation(e.to_string()));
                }
                Err(swh_secret_sharing::SecretRecoveryError::NotEnoughShares) => {
                    eprintln!("Not enough shares yet, keep going…");
                }
                Err(e) => return Err(swh_bundle::Error::Validation(e.to_string())),
            }
        }
        Err(swh_bundle::Error::Validation(
            "not enough shares supplied to recover the object decryption key".to_string(),
        ))
    }
}

/// Opens `path`, unlocking it interactively.
pub fn open_and_unlock(path: &std::path::Path) -> Result<BundleReader<std::fs::File>, swh_bundle::Error> {
    let mut bundle = BundleReader::open(path)?;
    bundle.unlock(&InteractiveKeyProvider)?;
    Ok(bundle)
}
