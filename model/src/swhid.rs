use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The six object types a core SWHID may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum ObjectType {
    Content,
    Directory,
    Revision,
    Release,
    Snapshot,
}

/// The object types an extended SWHID may carry: the six core types plus
/// `Origin`, `RawExtrinsicMetadata` and `ExtId`.
///
/// `select_ordered` (see `swh-graph`) relies on the `Ord` impl derived here:
/// variants are declared in exactly the traversal order of §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum ExtendedObjectType {
    Origin,
    Snapshot,
    Release,
    Revision,
    Directory,
    Content,
    ExtId,
    RawExtrinsicMetadata,
}

impl ExtendedObjectType {
    fn marker(self) -> &'static str {
        match self {
            ExtendedObjectType::Content => "cnt",
            ExtendedObjectType::Directory => "dir",
            ExtendedObjectType::Revision => "rev",
            ExtendedObjectType::Release => "rel",
            ExtendedObjectType::Snapshot => "snp",
            ExtendedObjectType::Origin => "ori",
            ExtendedObjectType::RawExtrinsicMetadata => "emd",
            ExtendedObjectType::ExtId => "ext",
        }
    }

    fn from_marker(marker: &str) -> Result<Self, Error> {
        Ok(match marker {
            "cnt" => ExtendedObjectType::Content,
            "dir" => ExtendedObjectType::Directory,
            "rev" => ExtendedObjectType::Revision,
            "rel" => ExtendedObjectType::Release,
            "snp" => ExtendedObjectType::Snapshot,
            "ori" => ExtendedObjectType::Origin,
            "emd" => ExtendedObjectType::RawExtrinsicMetadata,
            "ext" => ExtendedObjectType::ExtId,
            other => return Err(Error::UnknownObjectType(other.to_string())),
        })
    }
}

impl From<ObjectType> for ExtendedObjectType {
    fn from(t: ObjectType) -> Self {
        match t {
            ObjectType::Content => ExtendedObjectType::Content,
            ObjectType::Directory => ExtendedObjectType::Directory,
            ObjectType::Revision => ExtendedObjectType::Revision,
            ObjectType::Release => ExtendedObjectType::Release,
            ObjectType::Snapshot => ExtendedObjectType::Snapshot,
        }
    }
}

/// A 20-byte cryptographic object id (a SHA1 digest for every object type).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct ObjectId(pub [u8; 20]);

impl ObjectId {
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|_| Error::MalformedSwhid(s.to_string()))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| Error::MalformedSwhid(s.to_string()))?;
        Ok(ObjectId(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `SHA1(url)`, the way an origin's object id is derived.
    pub fn of_origin_url(url: &str) -> Self {
        use sha1::{Digest, Sha1};
        let digest = Sha1::digest(url.as_bytes());
        let mut array = [0u8; 20];
        array.copy_from_slice(&digest);
        ObjectId(array)
    }

    /// `SHA1` of an arbitrary canonical byte serialization, used by every
    /// non-origin object type to recompute its own id.
    pub fn of_canonical_bytes(bytes: &[u8]) -> Self {
        use sha1::{Digest, Sha1};
        let digest = Sha1::digest(bytes);
        let mut array = [0u8; 20];
        array.copy_from_slice(&digest);
        ObjectId(array)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

/// An extended SWHID: `swh:1:<type>:<40-hex>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct ExtendedSwhid {
    pub object_type: ExtendedObjectType,
    pub object_id: ObjectId,
}

impl ExtendedSwhid {
    pub fn new(object_type: ExtendedObjectType, object_id: ObjectId) -> Self {
        ExtendedSwhid {
            object_type,
            object_id,
        }
    }

    /// Build the origin SWHID for a URL, hashing it the way `SwhidOrUrl`
    /// does at the CLI boundary.
    pub fn of_origin_url(url: &str) -> Self {
        ExtendedSwhid {
            object_type: ExtendedObjectType::Origin,
            object_id: ObjectId::of_origin_url(url),
        }
    }

    pub fn to_core(self) -> Result<Swhid, Error> {
        let object_type = match self.object_type {
            ExtendedObjectType::Content => ObjectType::Content,
            ExtendedObjectType::Directory => ObjectType::Directory,
            ExtendedObjectType::Revision => ObjectType::Revision,
            ExtendedObjectType::Release => ObjectType::Release,
            ExtendedObjectType::Snapshot => ObjectType::Snapshot,
            ExtendedObjectType::Origin
            | ExtendedObjectType::ExtId
            | ExtendedObjectType::RawExtrinsicMetadata => {
                return Err(Error::NotACoreSwhid(self.to_string()))
            }
        };
        Ok(Swhid {
            object_type,
            object_id: self.object_id,
        })
    }
}

impl From<Swhid> for ExtendedSwhid {
    fn from(core: Swhid) -> Self {
        ExtendedSwhid {
            object_type: core.object_type.into(),
            object_id: core.object_id,
        }
    }
}

impl fmt::Display for ExtendedSwhid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swh:1:{}:{}", self.object_type.marker(), self.object_id.to_hex())
    }
}

impl fmt::Debug for ExtendedSwhid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for ExtendedSwhid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let rest = s
            .strip_prefix("swh:1:")
            .ok_or_else(|| Error::MalformedSwhid(s.to_string()))?;
        let (marker, hex_id) = rest
            .split_once(':')
            .ok_or_else(|| Error::MalformedSwhid(s.to_string()))?;
        let object_type = ExtendedObjectType::from_marker(marker)?;
        let object_id = ObjectId::from_hex(hex_id)?;
        Ok(ExtendedSwhid {
            object_type,
            object_id,
        })
    }
}

/// A core SWHID: a SWHID whose type is one of the six directly archived
/// object kinds (no `origin`, `extid` or `raw_extrinsic_metadata`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Swhid {
    pub object_type: ObjectType,
    pub object_id: ObjectId,
}

impl Swhid {
    pub fn new(object_type: ObjectType, object_id: ObjectId) -> Self {
        Swhid {
            object_type,
            object_id,
        }
    }

    pub fn to_extended(self) -> ExtendedSwhid {
        self.into()
    }
}

impl fmt::Display for Swhid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_extended())
    }
}

impl fmt::Debug for Swhid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Swhid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        ExtendedSwhid::from_str(s)?.to_core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_text_form() {
        let text = "swh:1:cnt:0000000000000000000000000000000000000016";
        let swhid: ExtendedSwhid = text.parse().unwrap();
        assert_eq!(swhid.object_type, ExtendedObjectType::Content);
        assert_eq!(swhid.to_string(), text);
    }

    #[test]
    fn origin_swhid_hashes_url() {
        let swhid = ExtendedSwhid::of_origin_url("https://github.com/user1/repo1");
        assert_eq!(swhid.object_type, ExtendedObjectType::Origin);
        // stable against regressions in the hashing routine
        let again = ExtendedSwhid::of_origin_url("https://github.com/user1/repo1");
        assert_eq!(swhid, again);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!("not-a-swhid".parse::<ExtendedSwhid>().is_err());
    }

    #[test]
    fn rejects_unknown_marker() {
        assert!("swh:1:xyz:0000000000000000000000000000000000000016"
            .parse::<ExtendedSwhid>()
            .is_err());
    }

    #[test]
    fn core_swhid_cannot_be_an_origin() {
        let origin = ExtendedSwhid::of_origin_url("https://example.org/repo");
        assert!(origin.to_core().is_err());
    }

    #[test]
    fn extended_object_type_order_matches_select_ordered() {
        let mut types = vec![
            ExtendedObjectType::RawExtrinsicMetadata,
            ExtendedObjectType::Content,
            ExtendedObjectType::Origin,
            ExtendedObjectType::Snapshot,
        ];
        types.sort();
        assert_eq!(
            types,
            vec![
                ExtendedObjectType::Origin,
                ExtendedObjectType::Snapshot,
                ExtendedObjectType::Content,
                ExtendedObjectType::RawExtrinsicMetadata,
            ]
        );
    }
}
