use crate::swhid::{ExtendedSwhid, ObjectId, ObjectType};

/// Visibility status of a content object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum ContentStatus {
    Visible,
    Absent,
    Hidden,
}

/// A content blob's identity: a set of hashes plus its length.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Content {
    pub sha1_git: ObjectId,
    pub sha1: [u8; 20],
    pub sha256: [u8; 32],
    pub blake2s256: [u8; 32],
    pub length: u64,
    pub status: ContentStatus,
    /// Present only when the bundle writer chose to embed the raw bytes.
    pub data: Option<Vec<u8>>,
}

impl Content {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Content, self.sha1_git)
    }
}

/// Reason a content object could not be archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum SkippedReason {
    TooLarge,
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct SkippedContent {
    pub sha1_git: ObjectId,
    pub length: Option<u64>,
    pub reason: SkippedReason,
}

impl SkippedContent {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Content, self.sha1_git)
    }
}

/// The kind of object a directory entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum EntryTargetType {
    File,
    Dir,
    Rev,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct DirectoryEntry {
    pub name: Vec<u8>,
    pub permissions: u32,
    pub target_type: EntryTargetType,
    pub target: ExtendedSwhid,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Directory {
    pub id: ObjectId,
    pub entries: Vec<DirectoryEntry>,
    /// Present only for directories whose canonical git serialization
    /// cannot be reconstructed from `entries` alone.
    pub raw_manifest: Option<Vec<u8>>,
}

impl Directory {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Directory, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Revision {
    pub id: ObjectId,
    pub author: Vec<u8>,
    pub committer: Vec<u8>,
    pub author_date: String,
    pub committer_date: String,
    pub message: Vec<u8>,
    pub directory: ObjectId,
    pub parents: Vec<ObjectId>,
}

impl Revision {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Revision, self.id)
    }

    pub fn directory_swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Directory, self.directory)
    }

    pub fn parent_swhids(&self) -> Vec<ExtendedSwhid> {
        self.parents
            .iter()
            .map(|id| ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Revision, *id))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum ReleaseTargetType {
    Content,
    Directory,
    Revision,
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Release {
    pub id: ObjectId,
    pub name: Vec<u8>,
    pub target: ObjectId,
    pub target_type: ReleaseTargetType,
    pub tagger: Option<Vec<u8>>,
    pub date: Option<String>,
    pub message: Option<Vec<u8>>,
}

impl Release {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Release, self.id)
    }

    pub fn target_swhid(&self) -> ExtendedSwhid {
        let object_type = match self.target_type {
            ReleaseTargetType::Content => ObjectType::Content,
            ReleaseTargetType::Directory => ObjectType::Directory,
            ReleaseTargetType::Revision => ObjectType::Revision,
            ReleaseTargetType::Release => ObjectType::Release,
        };
        ExtendedSwhid::from(crate::swhid::Swhid::new(object_type, self.target))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum SnapshotTargetType {
    Content,
    Directory,
    Revision,
    Release,
    Snapshot,
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct SnapshotBranch {
    /// `None` for a dangling branch.
    pub target: Option<ObjectId>,
    pub target_type: Option<SnapshotTargetType>,
    /// When `target_type` is `Alias`, `target` is interpreted as a branch
    /// name rather than an object id.
    pub alias_of: Option<Vec<u8>>,
}

impl SnapshotBranch {
    pub fn swhid(&self) -> Option<ExtendedSwhid> {
        let target_type = self.target_type?;
        let object_type = match target_type {
            SnapshotTargetType::Content => ObjectType::Content,
            SnapshotTargetType::Directory => ObjectType::Directory,
            SnapshotTargetType::Revision => ObjectType::Revision,
            SnapshotTargetType::Release => ObjectType::Release,
            SnapshotTargetType::Snapshot => return None,
            SnapshotTargetType::Alias => return None,
        };
        self.target
            .map(|id| ExtendedSwhid::from(crate::swhid::Swhid::new(object_type, id)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Snapshot {
    pub id: ObjectId,
    pub branches: Vec<(Vec<u8>, SnapshotBranch)>,
}

impl Snapshot {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Snapshot, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Origin {
    pub url: String,
}

impl Origin {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::of_origin_url(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct OriginVisit {
    pub origin: String,
    pub visit: u64,
    pub date: String,
    pub r#type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct OriginVisitStatus {
    pub origin: String,
    pub visit: u64,
    pub date: String,
    pub status: String,
    pub snapshot: Option<ObjectId>,
}

/// Optional context a piece of raw extrinsic metadata was discovered in.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct MetadataContext {
    pub origin: Option<String>,
    pub visit: Option<u64>,
    pub snapshot: Option<ExtendedSwhid>,
    pub release: Option<ExtendedSwhid>,
    pub revision: Option<ExtendedSwhid>,
    pub directory: Option<ExtendedSwhid>,
    pub path: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct RawExtrinsicMetadata {
    pub id: ObjectId,
    pub target: ExtendedSwhid,
    pub authority: String,
    pub fetcher: String,
    pub discovery_date: String,
    pub format: String,
    pub metadata: Vec<u8>,
    pub context: MetadataContext,
}

impl RawExtrinsicMetadata {
    pub fn swhid(&self) -> ExtendedSwhid {
        ExtendedSwhid::new(
            crate::swhid::ExtendedObjectType::RawExtrinsicMetadata,
            self.id,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct ExtId {
    pub extid_type: String,
    pub extid: Vec<u8>,
    pub target: ExtendedSwhid,
    pub extid_version: u32,
}

impl ExtId {
    /// ExtIDs are self-identifying: their object id is derived from their
    /// own fields rather than assigned, hashed the same way every other
    /// canonical object is.
    pub fn swhid(&self) -> ExtendedSwhid {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.extid_type.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&self.extid);
        buf.push(0);
        buf.extend_from_slice(self.target.to_string().as_bytes());
        buf.extend_from_slice(&self.extid_version.to_le_bytes());
        ExtendedSwhid::new(
            crate::swhid::ExtendedObjectType::ExtId,
            ObjectId::of_canonical_bytes(&buf),
        )
    }
}

/// Any object archived in the software heritage graph, for the purposes of
/// identity and deletion bookkeeping ("any object with a `swhid()` and a
/// `unique_key()`" in the original, modeled here as a tagged variant rather
/// than dynamic dispatch).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum ArchivedObject {
    Content(Content),
    SkippedContent(SkippedContent),
    Directory(Directory),
    Revision(Revision),
    Release(Release),
    Snapshot(Snapshot),
    Origin(Origin),
    OriginVisit(OriginVisit),
    OriginVisitStatus(OriginVisitStatus),
    RawExtrinsicMetadata(RawExtrinsicMetadata),
    ExtId(ExtId),
}

impl ArchivedObject {
    /// The object's SWHID, when it has one. `OriginVisit` and
    /// `OriginVisitStatus` are not content-addressed and return `None`;
    /// callers fall back to `unique_key()`.
    pub fn swhid(&self) -> Option<ExtendedSwhid> {
        Some(match self {
            ArchivedObject::Content(o) => o.swhid(),
            ArchivedObject::SkippedContent(o) => o.swhid(),
            ArchivedObject::Directory(o) => o.swhid(),
            ArchivedObject::Revision(o) => o.swhid(),
            ArchivedObject::Release(o) => o.swhid(),
            ArchivedObject::Snapshot(o) => o.swhid(),
            ArchivedObject::Origin(o) => o.swhid(),
            ArchivedObject::RawExtrinsicMetadata(o) => o.swhid(),
            ArchivedObject::ExtId(o) => o.swhid(),
            ArchivedObject::OriginVisit(_) | ArchivedObject::OriginVisitStatus(_) => return None,
        })
    }

    /// A key uniquely identifying the object within its own kind, used by
    /// the journal writer for objects without a SWHID.
    pub fn unique_key(&self) -> Vec<u8> {
        match self {
            ArchivedObject::OriginVisit(v) => {
                format!("{}:{}", v.origin, v.visit).into_bytes()
            }
            ArchivedObject::OriginVisitStatus(s) => {
                format!("{}:{}:{}", s.origin, s.visit, s.date).into_bytes()
            }
            other => other
                .swhid()
                .map(|s| s.object_id.0.to_vec())
                .unwrap_or_default(),
        }
    }

    /// Every SWHID this object directly references, used by the inventory
    /// builder to expand the subgraph one hop at a time. Objects with no
    /// outbound references (contents, origins, visit records) return an
    /// empty vector.
    pub fn outbound_swhids(&self) -> Vec<ExtendedSwhid> {
        match self {
            ArchivedObject::Directory(d) => d.entries.iter().map(|e| e.target).collect(),
            ArchivedObject::Revision(r) => {
                let mut targets = vec![r.directory_swhid()];
                targets.extend(r.parent_swhids());
                targets
            }
            ArchivedObject::Release(r) => vec![r.target_swhid()],
            ArchivedObject::Snapshot(s) => s
                .branches
                .iter()
                .filter_map(|(_, branch)| branch.swhid())
                .collect(),
            ArchivedObject::RawExtrinsicMetadata(m) => vec![m.target],
            ArchivedObject::ExtId(e) => vec![e.target],
            ArchivedObject::Content(_)
            | ArchivedObject::SkippedContent(_)
            | ArchivedObject::Origin(_)
            | ArchivedObject::OriginVisit(_)
            | ArchivedObject::OriginVisitStatus(_) => Vec::new(),
        }
    }

    pub fn object_type(&self) -> &'static str {
        match self {
            ArchivedObject::Content(_) => "content",
            ArchivedObject::SkippedContent(_) => "skipped_content",
            ArchivedObject::Directory(_) => "directory",
            ArchivedObject::Revision(_) => "revision",
            ArchivedObject::Release(_) => "release",
            ArchivedObject::Snapshot(_) => "snapshot",
            ArchivedObject::Origin(_) => "origin",
            ArchivedObject::OriginVisit(_) => "origin_visit",
            ArchivedObject::OriginVisitStatus(_) => "origin_visit_status",
            ArchivedObject::RawExtrinsicMetadata(_) => "raw_extrinsic_metadata",
            ArchivedObject::ExtId(_) => "extid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object_id(byte: u8) -> ObjectId {
        ObjectId([byte; 20])
    }

    #[test]
    fn release_target_swhid_follows_target_type() {
        let release = Release {
            id: sample_object_id(1),
            name: b"v1.0".to_vec(),
            target: sample_object_id(2),
            target_type: ReleaseTargetType::Revision,
            tagger: None,
            date: None,
            message: None,
        };
        assert_eq!(
            release.target_swhid(),
            ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Revision, sample_object_id(2))
        );
    }

    #[test]
    fn dangling_snapshot_branch_has_no_swhid() {
        let branch = SnapshotBranch {
            target: None,
            target_type: None,
            alias_of: None,
        };
        assert!(branch.swhid().is_none());
    }

    #[test]
    fn origin_visit_unique_key_is_not_a_swhid() {
        let visit = ArchivedObject::OriginVisit(OriginVisit {
            origin: "https://example.org/repo".to_string(),
            visit: 1,
            date: "2015-01-01T00:00:00Z".to_string(),
            r#type: "git".to_string(),
        });
        assert!(visit.swhid().is_none());
        assert_eq!(visit.unique_key(), b"https://example.org/repo:1".to_vec());
    }

    #[test]
    fn extid_is_self_identifying() {
        let target = ExtendedSwhid::new(crate::swhid::ExtendedObjectType::Revision, sample_object_id(9));
        let extid = ExtId {
            extid_type: "git".to_string(),
            extid: vec![1, 2, 3],
            target,
            extid_version: 0,
        };
        let other = ExtId {
            extid_type: "hg".to_string(),
            ..extid.clone()
        };
        assert_ne!(extid.swhid(), other.swhid());
    }
}
