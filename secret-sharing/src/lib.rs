//! Two-level SLIP-0039 threshold split of a recovery bundle's 32-byte
//! object-decryption key, with each resulting mnemonic sealed to one
//! holder's `age` public key.

pub mod error;

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use zeroize::Zeroize;

pub use error::{Error, SecretRecoveryError};

/// One recipient's share configuration within a group: their share
/// identifier and the `age` public key their mnemonic gets sealed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecipient {
    pub share_id: String,
    pub recipient_key: String,
}

/// One group in the two-level scheme: how many of its members' mnemonics
/// are required, and who those members are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub minimum_required_shares: u8,
    pub recipients: Vec<ShareRecipient>,
}

/// The full secret-sharing policy for a recovery bundle: how many groups
/// must each contribute their threshold of shares before the
/// object-decryption key can be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSharingConfig {
    pub minimum_required_groups: u8,
    pub groups: IndexMap<String, Group>,
}

impl SecretSharingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.minimum_required_groups == 0 {
            return Err(Error::InvalidConfiguration(
                "minimum_required_groups must be at least 1".to_string(),
            ));
        }
        if self.groups.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one group is required".to_string(),
            ));
        }
        if self.minimum_required_groups as usize > self.groups.len() {
            return Err(Error::InvalidConfiguration(
                "minimum_required_groups exceeds the number of configured groups".to_string(),
            ));
        }
        let mut seen_share_ids = HashSet::new();
        let mut seen_keys = HashSet::new();
        for group in self.groups.values() {
            if group.minimum_required_shares == 0 {
                return Err(Error::InvalidConfiguration(
                    "minimum_required_shares must be at least 1".to_string(),
                ));
            }
            if group.minimum_required_shares as usize > group.recipients.len() {
                return Err(Error::InvalidConfiguration(
                    "minimum_required_shares exceeds the number of recipients in the group"
                        .to_string(),
                ));
            }
            for recipient in &group.recipients {
                if !seen_share_ids.insert(recipient.share_id.clone()) {
                    return Err(Error::DuplicateShareIdentifier(recipient.share_id.clone()));
                }
                if !seen_keys.insert(recipient.recipient_key.clone()) {
                    return Err(Error::DuplicateRecipientKey(
                        recipient.recipient_key.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn group_thresholds(&self) -> Vec<(u8, u8)> {
        self.groups
            .values()
            .map(|g| (g.minimum_required_shares, g.recipients.len() as u8))
            .collect()
    }
}

/// Splits `secret` per `config` and seals each resulting mnemonic to its
/// recipient's `age` public key, returning `share_id -> armored
/// ciphertext`. The identifier embedded in `removal_identifier` is mixed
/// into the SLIP-0039 extendable backup passphrase so that shares from two
/// different removals can never accidentally be combined.
pub fn generate_encrypted_shares(
    removal_identifier: &str,
    secret: &[u8],
    config: &SecretSharingConfig,
) -> Result<BTreeMap<String, String>, Error> {
    config.validate()?;

    let group_thresholds = config.group_thresholds();
    let mnemonic_groups = slip39::generate_mnemonics(
        config.minimum_required_groups,
        &group_thresholds,
        secret,
        removal_identifier,
        1,
    )
    .map_err(|e| Error::Slip39(e.to_string()))?;

    let mut shares = BTreeMap::new();
    for (group, mnemonics) in config.groups.values().zip(mnemonic_groups.iter()) {
        for (recipient, mnemonic) in group.recipients.iter().zip(mnemonics.iter()) {
            let ciphertext =
                swh_bundle_age_bridge::encrypt_armored(&recipient.recipient_key, mnemonic.as_bytes())
                    .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
            shares.insert(recipient.share_id.clone(), ciphertext);
        }
    }
    Ok(shares)
}

/// Tries every key in `available_keys` against every encrypted share,
/// collecting the mnemonics that successfully decrypt, then attempts to
/// reconstruct the secret from those plus any already-known mnemonics.
pub fn recover_object_decryption_key_from_encrypted_shares(
    shares: &BTreeMap<String, String>,
    available_keys: impl IntoIterator<Item = String>,
    known_mnemonics: &[String],
) -> Result<Vec<u8>, SecretRecoveryError> {
    let mut mnemonics: Vec<String> = known_mnemonics.to_vec();
    for key in available_keys {
        for ciphertext in shares.values() {
            if let Ok(plaintext) = swh_bundle_age_bridge::decrypt(&key, ciphertext.as_bytes()) {
                if let Ok(mnemonic) = String::from_utf8(plaintext) {
                    mnemonics.push(mnemonic);
                }
            }
        }
    }
    if mnemonics.is_empty() {
        return Err(SecretRecoveryError::NotEnoughShares);
    }
    let result = slip39::combine_mnemonics(&mnemonics, "")
        .map_err(|e| SecretRecoveryError::Slip39(e.to_string()));
    mnemonics.zeroize();
    result
}

/// A thin seam over the `age` subprocess, kept separate from `swh-bundle`
/// so this crate doesn't depend on it: `swh-bundle` depends on
/// `swh-secret-sharing` (for rollover), not the other way around.
mod swh_bundle_age_bridge {
    use std::io::Write;
    use std::process::{Command, Stdio};

    pub fn encrypt_armored(recipient: &str, plaintext: &[u8]) -> std::io::Result<String> {
        run(&["-a", "-r", recipient], plaintext)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn decrypt(identity: &str, ciphertext: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut identity_file = tempfile::NamedTempFile::new()?;
        identity_file.write_all(identity.as_bytes())?;
        identity_file.flush()?;
        let path = identity_file.path().to_string_lossy().into_owned();
        run(&["-d", "-i", &path], ciphertext)
    }

    fn run(args: &[&str], stdin_data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut child = Command::new("age")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        child.stdin.take().expect("piped stdin").write_all(stdin_data)?;
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group(share_ids: &[&str], threshold: u8) -> Group {
        Group {
            minimum_required_shares: threshold,
            recipients: share_ids
                .iter()
                .map(|id| ShareRecipient {
                    share_id: id.to_string(),
                    recipient_key: format!("age1{id}"),
                })
                .collect(),
        }
    }

    #[test]
    fn validate_rejects_duplicate_share_ids() {
        let mut groups = IndexMap::new();
        groups.insert(
            "family".to_string(),
            Group {
                minimum_required_shares: 1,
                recipients: vec![
                    ShareRecipient {
                        share_id: "alice".to_string(),
                        recipient_key: "age1aaa".to_string(),
                    },
                    ShareRecipient {
                        share_id: "alice".to_string(),
                        recipient_key: "age1bbb".to_string(),
                    },
                ],
            },
        );
        let config = SecretSharingConfig {
            minimum_required_groups: 1,
            groups,
        };
        assert!(matches!(
            config.validate(),
            Err(Error::DuplicateShareIdentifier(_))
        ));
    }

    #[test]
    fn validate_rejects_duplicate_recipient_keys() {
        let mut groups = IndexMap::new();
        groups.insert(
            "family".to_string(),
            Group {
                minimum_required_shares: 1,
                recipients: vec![
                    ShareRecipient {
                        share_id: "alice".to_string(),
                        recipient_key: "age1shared".to_string(),
                    },
                    ShareRecipient {
                        share_id: "bob".to_string(),
                        recipient_key: "age1shared".to_string(),
                    },
                ],
            },
        );
        let config = SecretSharingConfig {
            minimum_required_groups: 1,
            groups,
        };
        assert!(matches!(
            config.validate(),
            Err(Error::DuplicateRecipientKey(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_groups_required() {
        let mut groups = IndexMap::new();
        groups.insert("family".to_string(), sample_group(&["alice", "bob"], 1));
        let config = SecretSharingConfig {
            minimum_required_groups: 0,
            groups,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        let mut groups = IndexMap::new();
        groups.insert(
            "family".to_string(),
            sample_group(&["alice", "bob", "carol"], 2),
        );
        groups.insert("friends".to_string(), sample_group(&["dan", "erin"], 1));
        let config = SecretSharingConfig {
            minimum_required_groups: 2,
            groups,
        };
        assert!(config.validate().is_ok());
    }
}
