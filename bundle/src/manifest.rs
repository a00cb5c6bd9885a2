use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use swh_model::ExtendedSwhid;

use crate::error::Error;

const SUPPORTED_VERSIONS: [u32; 2] = [1, 2];

mod swhid_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use swh_model::ExtendedSwhid;

    pub fn serialize<S: Serializer>(swhids: &[ExtendedSwhid], s: S) -> Result<S::Ok, S::Error> {
        let strings: Vec<String> = swhids.iter().map(ExtendedSwhid::to_string).collect();
        strings.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ExtendedSwhid>, D::Error> {
        Vec::<String>::deserialize(d)?
            .into_iter()
            .map(|s| s.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

/// The plaintext manifest stored as `manifest.yml` in a recovery bundle.
///
/// Every other entry in the bundle is encrypted; this one is not, so that
/// `recovery-bundle info` never needs a decryption key.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub version: u32,
    pub removal_identifier: String,
    pub created: DateTime<Utc>,
    #[serde(with = "swhid_list")]
    pub swhids: Vec<ExtendedSwhid>,
    pub decryption_key_shares: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expire: Option<DateTime<Utc>>,
}

impl Manifest {
    pub fn new(
        removal_identifier: impl Into<String>,
        created: DateTime<Utc>,
        swhids: Vec<ExtendedSwhid>,
        decryption_key_shares: IndexMap<String, String>,
    ) -> Result<Self, Error> {
        let manifest = Manifest {
            version: 2,
            removal_identifier: removal_identifier.into(),
            created,
            swhids,
            decryption_key_shares,
            reason: None,
            expire: None,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(yaml: &str) -> Result<Self, Error> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn dump(&self) -> Result<String, Error> {
        self.validate()?;
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), Error> {
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(Error::Validation(format!(
                "unsupported manifest version {}",
                self.version
            )));
        }
        if self.swhids.is_empty() {
            return Err(Error::Validation(
                "manifest lists no swhids: a recovery bundle must back up at least one object"
                    .to_string(),
            ));
        }
        if self.decryption_key_shares.is_empty() {
            return Err(Error::Validation(
                "manifest has no decryption key shares: recovering the object decryption key \
                 would be impossible"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample_shares() -> IndexMap<String, String> {
        let mut shares = IndexMap::new();
        shares.insert("share1".to_string(), "-----BEGIN AGE ENCRYPTED FILE-----\nAAAA\n-----END AGE ENCRYPTED FILE-----\n".to_string());
        shares
    }

    fn sample_swhids() -> Vec<ExtendedSwhid> {
        vec!["swh:1:ori:33e45d56f88993aae6a0198013efa80716fd8920"
            .parse()
            .unwrap()]
    }

    #[test]
    fn load_accepts_minimal_manifest() {
        let yaml = "\
version: 2
removal_identifier: test-removal
created: 2024-06-01T00:00:00Z
swhids:
  - swh:1:ori:33e45d56f88993aae6a0198013efa80716fd8920
decryption_key_shares:
  share1: |-
    -----BEGIN AGE ENCRYPTED FILE-----
    AAAA
    -----END AGE ENCRYPTED FILE-----
";
        let manifest = Manifest::load(yaml).unwrap();
        assert_eq!(manifest.version, 2);
        assert_eq!(manifest.reason, None);
        assert_eq!(manifest.expire, None);
    }

    #[test]
    fn load_rejects_bad_version() {
        let yaml = "\
version: 42
removal_identifier: test-removal
created: 2024-06-01T00:00:00Z
swhids:
  - swh:1:ori:33e45d56f88993aae6a0198013efa80716fd8920
decryption_key_shares:
  share1: x
";
        assert!(Manifest::load(yaml).is_err());
    }

    #[test]
    fn load_rejects_empty_swhids() {
        let yaml = "\
version: 2
removal_identifier: test-removal
created: 2024-06-01T00:00:00Z
swhids: []
decryption_key_shares:
  share1: x
";
        assert!(Manifest::load(yaml).is_err());
    }

    #[test]
    fn load_rejects_empty_shares() {
        let yaml = "\
version: 2
removal_identifier: test-removal
created: 2024-06-01T00:00:00Z
swhids:
  - swh:1:ori:33e45d56f88993aae6a0198013efa80716fd8920
decryption_key_shares: {}
";
        assert!(Manifest::load(yaml).is_err());
    }

    #[test]
    fn load_rejects_unknown_field() {
        let yaml = "\
version: 2
removal_identifier: test-removal
created: 2024-06-01T00:00:00Z
swhids:
  - swh:1:ori:33e45d56f88993aae6a0198013efa80716fd8920
decryption_key_shares:
  share1: x
invalid: field
";
        assert!(Manifest::load(yaml).is_err());
    }

    #[test]
    fn dump_omits_absent_optionals() {
        let manifest = Manifest::new(
            "test-removal",
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            sample_swhids(),
            sample_shares(),
        )
        .unwrap();
        let dumped = manifest.dump().unwrap();
        assert!(!dumped.contains("reason"));
        assert!(!dumped.contains("expire"));
    }

    #[test]
    fn dump_load_roundtrip() {
        let mut manifest = Manifest::new(
            "test-removal",
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            sample_swhids(),
            sample_shares(),
        )
        .unwrap();
        manifest.reason = Some("GDPR takedown request".to_string());
        manifest.expire = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let dumped = manifest.dump().unwrap();
        let reloaded = Manifest::load(&dumped).unwrap();
        assert_eq!(manifest, reloaded);
    }
}
