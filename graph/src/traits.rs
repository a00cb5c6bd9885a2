use std::collections::BTreeMap;

use swh_model::{ArchivedObject, ExtendedSwhid};

/// Opaque error type for collaborator traits: implementations live outside
/// this workspace (storage backends, graph services, …) and are free to
/// wrap whatever error type they already have.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The high-throughput graph service consulted by the inventory builder and
/// the removability analysis. It may lag the authoritative archive storage.
pub trait GraphService {
    /// All SWHIDs reachable forward from `seed`, according to the graph.
    fn visit_nodes_from(&self, seed: ExtendedSwhid) -> Result<Vec<ExtendedSwhid>, CollaboratorError>;

    /// The edges of the forward traversal from `seed`, as `(source, target)`
    /// pairs, so the inventory builder doesn't have to re-derive them from
    /// object contents for the (common) case where the graph already knows
    /// them.
    fn visit_edges_from(
        &self,
        seed: ExtendedSwhid,
    ) -> Result<Vec<(ExtendedSwhid, ExtendedSwhid)>, CollaboratorError>;

    /// Up to `limit` SWHIDs that reference `swhid`, according to the graph.
    fn neighbors(
        &self,
        swhid: ExtendedSwhid,
        limit: usize,
    ) -> Result<Vec<ExtendedSwhid>, CollaboratorError>;
}

/// Read and restore access to the archive storage.
pub trait ArchiveStorage {
    /// Fetches an object's full record, if present.
    fn fetch_object(&self, swhid: ExtendedSwhid) -> Result<Option<ArchivedObject>, CollaboratorError>;

    /// Up to `limit` most recent SWHIDs found to reference `swhid`.
    fn object_find_recent_references(
        &self,
        swhid: ExtendedSwhid,
        limit: usize,
    ) -> Result<Vec<ExtendedSwhid>, CollaboratorError>;

    /// Re-inserts a previously removed object, used by bundle restoration.
    fn restore_object(&self, object: &ArchivedObject) -> Result<(), CollaboratorError>;

    /// Every recorded visit of `origin_url`. Visits have no SWHID of their
    /// own, so they're addressed by origin rather than fetched individually.
    fn origin_visits(&self, origin_url: &str) -> Result<Vec<ArchivedObject>, CollaboratorError>;

    /// Every recorded visit-status of `origin_url`.
    fn origin_visit_statuses(&self, origin_url: &str) -> Result<Vec<ArchivedObject>, CollaboratorError>;
}

/// Per-kind counters returned by a bulk delete or restore call, keyed the
/// way the archive storage names its own counters (`"content:add"`, …).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObjectCounters(pub BTreeMap<String, u64>);

impl ObjectCounters {
    pub fn add(&mut self, key: impl Into<String>, n: u64) {
        *self.0.entry(key.into()).or_insert(0) += n;
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn merge(&mut self, other: &ObjectCounters) {
        for (k, v) in &other.0 {
            self.add(k.clone(), *v);
        }
    }
}

/// Deletion-only view of the archive storage, mirroring the Python split
/// between `StorageInterface` (read/write) and `ObjectDeletionInterface`.
pub trait ObjectDeletionInterface {
    fn object_delete(&self, swhids: &[ExtendedSwhid]) -> Result<ObjectCounters, CollaboratorError>;
}

/// Error raised by `ObjectStore::delete` — `NotFound` is non-fatal for the
/// orchestrator (logged, not propagated).
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found in object store")]
    NotFound,
    #[error(transparent)]
    Other(CollaboratorError),
}

/// The blob object store, addressed by composite id (hash algorithm(s) plus
/// digest, opaque to this crate).
pub trait ObjectStore {
    fn delete(&self, composite_id: &[u8]) -> Result<(), ObjectStoreError>;
}

/// Kafka-compatible journal writer: tombstones per object kind, flushed in
/// a batch.
pub trait JournalWriter {
    fn delete(&self, object_type: &str, keys: &[Vec<u8>]) -> Result<(), CollaboratorError>;
    fn flush(&self) -> Result<(), CollaboratorError>;
}

/// The search index.
pub trait Search {
    /// Returns whether an origin was actually present and removed.
    fn origin_delete(&self, url: &str) -> Result<bool, CollaboratorError>;
    fn flush(&self) -> Result<(), CollaboratorError>;
    fn check(&self) -> Result<(), CollaboratorError>;
}
