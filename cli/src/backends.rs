//! Collaborator backends the CLI can build from a `BackendConfig`.
//!
//! Concrete network clients for the real archive storage, graph service,
//! journal, search index and object store are out of scope here (the core
//! "does not itself delete blobs from storage backends — it drives
//! external deletion interfaces"): those live in separate, deployment
//! specific crates that plug into the `swh-graph` traits. What ships here
//! is the `"memory"` archive storage/graph pair, useful for
//! `recovery-bundle restore` and for driving the whole CLI end to end in
//! tests, and `"noop"` stand-ins for the deletion-side backends that only
//! log what they would have done.

use std::cell::RefCell;
use std::collections::HashMap;

use swh_graph::traits::{
    ArchiveStorage, CollaboratorError, JournalWriter, ObjectCounters, ObjectDeletionInterface,
    ObjectStore, ObjectStoreError, Search,
};
use swh_graph::GraphService;
use swh_model::{ArchivedObject, ExtendedSwhid};

use crate::config::BackendConfig;

/// An archive storage and graph service backed by an in-process table,
/// populated only by `restore_object`. Good enough to inspect a restored
/// bundle; not a substitute for a real archive.
///
/// Origin visits and visit-statuses have no SWHID of their own, so they're
/// kept in separate per-origin tables rather than the main object map.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RefCell<HashMap<ExtendedSwhid, ArchivedObject>>,
    visits: RefCell<HashMap<String, Vec<ArchivedObject>>>,
    visit_statuses: RefCell<HashMap<String, Vec<ArchivedObject>>>,
}

impl ArchiveStorage for MemoryStorage {
    fn fetch_object(&self, swhid: ExtendedSwhid) -> Result<Option<ArchivedObject>, CollaboratorError> {
        Ok(self.objects.borrow().get(&swhid).cloned())
    }

    fn object_find_recent_references(
        &self,
        swhid: ExtendedSwhid,
        _limit: usize,
    ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
        let objects = self.objects.borrow();
        Ok(objects
            .values()
            .filter(|o| o.outbound_swhids().contains(&swhid))
            .filter_map(|o| o.swhid())
            .collect())
    }

    fn restore_object(&self, object: &ArchivedObject) -> Result<(), CollaboratorError> {
        match object {
            ArchivedObject::OriginVisit(v) => {
                self.visits
                    .borrow_mut()
                    .entry(v.origin.clone())
                    .or_default()
                    .push(object.clone());
            }
            ArchivedObject::OriginVisitStatus(s) => {
                self.visit_statuses
                    .borrow_mut()
                    .entry(s.origin.clone())
                    .or_default()
                    .push(object.clone());
            }
            _ => {
                if let Some(swhid) = object.swhid() {
                    self.objects.borrow_mut().insert(swhid, object.clone());
                }
            }
        }
        Ok(())
    }

    fn origin_visits(&self, origin_url: &str) -> Result<Vec<ArchivedObject>, CollaboratorError> {
        Ok(self.visits.borrow().get(origin_url).cloned().unwrap_or_default())
    }

    fn origin_visit_statuses(&self, origin_url: &str) -> Result<Vec<ArchivedObject>, CollaboratorError> {
        Ok(self
            .visit_statuses
            .borrow()
            .get(origin_url)
            .cloned()
            .unwrap_or_default())
    }
}

impl GraphService for MemoryStorage {
    fn visit_nodes_from(&self, seed: ExtendedSwhid) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
        let mut seen = vec![seed];
        let mut frontier = vec![seed];
        let objects = self.objects.borrow();
        while let Some(swhid) = frontier.pop() {
            if let Some(object) = objects.get(&swhid) {
                for target in object.outbound_swhids() {
                    if !seen.contains(&target) {
                        seen.push(target);
                        frontier.push(target);
                    }
                }
            }
        }
        Ok(seen)
    }

    fn visit_edges_from(
        &self,
        seed: ExtendedSwhid,
    ) -> Result<Vec<(ExtendedSwhid, ExtendedSwhid)>, CollaboratorError> {
        let mut edges = Vec::new();
        for swhid in self.visit_nodes_from(seed)? {
            if let Some(object) = self.objects.borrow().get(&swhid) {
                for target in object.outbound_swhids() {
                    edges.push((swhid, target));
                }
            }
        }
        Ok(edges)
    }

    fn neighbors(
        &self,
        swhid: ExtendedSwhid,
        limit: usize,
    ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
        let mut out = self.object_find_recent_references(swhid, limit)?;
        out.truncate(limit);
        Ok(out)
    }
}

pub fn build_archive_storage(config: &BackendConfig) -> anyhow::Result<Box<dyn ArchiveStorage>> {
    match config.cls.as_str() {
        "memory" => Ok(Box::new(MemoryStorage::default())),
        other => anyhow::bail!("unsupported storage backend class {other:?}"),
    }
}

pub fn build_graph_service(config: &BackendConfig) -> anyhow::Result<Box<dyn GraphService>> {
    match config.cls.as_str() {
        "memory" => Ok(Box::new(MemoryStorage::default())),
        other => anyhow::bail!("unsupported graph backend class {other:?}"),
    }
}

/// A deletion-side backend that only logs: every real removal target
/// (storage, journal, search, object store) is a separate deployment
/// concern this workspace does not implement.
pub struct NoopBackend {
    name: String,
}

impl NoopBackend {
    pub fn new(name: impl Into<String>) -> Self {
        NoopBackend { name: name.into() }
    }
}

impl ObjectDeletionInterface for NoopBackend {
    fn object_delete(&self, swhids: &[ExtendedSwhid]) -> Result<ObjectCounters, CollaboratorError> {
        tracing::info!(backend = %self.name, count = swhids.len(), "noop object_delete");
        let mut counters = ObjectCounters::default();
        counters.add("noop:delete", swhids.len() as u64);
        Ok(counters)
    }
}

impl ObjectStore for NoopBackend {
    fn delete(&self, _composite_id: &[u8]) -> Result<(), ObjectStoreError> {
        tracing::info!(backend = %self.name, "noop objstorage delete");
        Ok(())
    }
}

impl JournalWriter for NoopBackend {
    fn delete(&self, object_type: &str, keys: &[Vec<u8>]) -> Result<(), CollaboratorError> {
        tracing::info!(backend = %self.name, object_type, count = keys.len(), "noop journal delete");
        Ok(())
    }

    fn flush(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

impl Search for NoopBackend {
    fn origin_delete(&self, url: &str) -> Result<bool, CollaboratorError> {
        tracing::info!(backend = %self.name, url, "noop search origin_delete");
        Ok(true)
    }

    fn flush(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn check(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

pub fn build_noop(name: &str, config: &BackendConfig) -> anyhow::Result<NoopBackend> {
    match config.cls.as_str() {
        "noop" => Ok(NoopBackend::new(name)),
        other => anyhow::bail!("unsupported backend class {other:?} for {name:?}"),
    }
}
