//! Loads the TOML configuration named by `SWH_CONFIG_FILENAME`, mirroring
//! the sub-dictionaries `swh.core.cli` resolves a removal's collaborators
//! from: one entry per storage, graph service, and removal backend, plus
//! the recovery bundle's secret-sharing policy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use swh_secret_sharing::{Group, SecretSharingConfig, ShareRecipient};

pub const CONFIG_FILENAME_VAR: &str = "SWH_CONFIG_FILENAME";
const DEFAULT_CONFIG_PATH: &str = "/etc/softwareheritage/config.toml";

/// One collaborator backend: which implementation to build (`cls`) and
/// whatever arguments that implementation needs, passed through verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub cls: String,
    #[serde(flatten)]
    pub args: toml::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGroup {
    pub minimum_required_shares: u8,
    pub recipient_keys: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSecretSharingConfig {
    pub minimum_required_groups: u8,
    pub groups: IndexMap<String, RawGroup>,
}

impl RawSecretSharingConfig {
    pub fn into_config(self) -> SecretSharingConfig {
        let groups = self
            .groups
            .into_iter()
            .map(|(name, group)| {
                let recipients = group
                    .recipient_keys
                    .into_iter()
                    .map(|(share_id, recipient_key)| ShareRecipient {
                        share_id,
                        recipient_key,
                    })
                    .collect();
                (
                    name,
                    Group {
                        minimum_required_shares: group.minimum_required_shares,
                        recipients,
                    },
                )
            })
            .collect();
        SecretSharingConfig {
            minimum_required_groups: self.minimum_required_groups,
            groups,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryBundlesConfig {
    pub secret_sharing: RawSecretSharingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub storage: Option<BackendConfig>,
    pub graph: Option<BackendConfig>,
    pub restoration_storage: Option<BackendConfig>,
    #[serde(default)]
    pub removal_searches: BTreeMap<String, BackendConfig>,
    #[serde(default)]
    pub removal_storages: BTreeMap<String, BackendConfig>,
    #[serde(default)]
    pub removal_objstorages: BTreeMap<String, BackendConfig>,
    #[serde(default)]
    pub removal_journals: BTreeMap<String, BackendConfig>,
    pub recovery_bundles: Option<RecoveryBundlesConfig>,
}

/// Resolves the configuration path from `SWH_CONFIG_FILENAME`, falling
/// back to the system-wide default, then loads and parses it.
pub fn load() -> anyhow::Result<Config> {
    let path = config_path();
    let text = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("reading configuration file {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("parsing configuration file {}: {e}", path.display()))?;
    Ok(config)
}

pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_FILENAME_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH).to_path_buf())
}
