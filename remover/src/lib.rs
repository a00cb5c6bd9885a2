//! Orchestrates a removal end to end: inventory, removability analysis,
//! recovery bundle creation, and finally deletion from every configured
//! backend, in the order search → storage → journal → object store.

pub mod error;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

pub use error::RemoverError;
use swh_bundle::reader::DecryptionKeyProvider;
use swh_bundle::{age, BundleReader, BundleWriter, Manifest};
use swh_graph::traits::{ArchiveStorage, GraphService, JournalWriter, ObjectCounters, ObjectDeletionInterface, ObjectStore, Search};
use swh_graph::ProgressReporter;
use swh_model::object::{Content, ContentStatus};
use swh_model::{ArchivedObject, ExtendedObjectType, ExtendedSwhid};
use swh_secret_sharing::SecretSharingConfig;

const STORAGE_OBJECT_DELETE_CHUNK_SIZE: usize = 200;
const RECOVERY_BUNDLE_BACKUP_SWHIDS_CHUNK_SIZE: usize = 200;
/// Distinct from `swh-removability`'s much tighter `REFERRER_QUERY_LIMIT`:
/// this is a final, post-deletion sanity check that must not itself miss a
/// reference due to truncation, so it asks for (effectively) everything.
const HAVE_NEW_REFERENCES_QUERY_LIMIT: usize = 9_999_999;

fn chunks<T: Clone>(items: &[T], size: usize) -> impl Iterator<Item = Vec<T>> + '_ {
    items.chunks(size).map(|chunk| chunk.to_vec())
}

/// The composite key an object store addresses a content blob by: its
/// hashes, concatenated in a fixed order. Opaque to `ObjectStore`, which
/// only compares and forwards it.
fn composite_object_id(content: &Content) -> Vec<u8> {
    let mut id = Vec::with_capacity(20 + 20 + 32 + 32);
    id.extend_from_slice(&content.sha1_git.0);
    id.extend_from_slice(&content.sha1);
    id.extend_from_slice(&content.sha256);
    id.extend_from_slice(&content.blake2s256);
    id
}

struct FixedKeyProvider(String);

impl DecryptionKeyProvider for FixedKeyProvider {
    fn object_decryption_key(&self, _manifest: &Manifest) -> Result<String, swh_bundle::Error> {
        Ok(self.0.clone())
    }
}

/// Drives one removal from start to finish. Holds mutable bookkeeping
/// (which SWHIDs/origins/journal keys to remove) built up by
/// [`register_object`](Self::register_object), populated either by
/// [`get_removable`](Self::get_removable) + `create_recovery_bundle`, or by
/// resuming from an existing bundle via
/// [`register_objects_from_bundle`](Self::register_objects_from_bundle).
pub struct Remover<'a> {
    storage: &'a dyn ArchiveStorage,
    graph_service: &'a dyn GraphService,
    restoration_storage: Option<&'a dyn ArchiveStorage>,
    removal_searches: IndexMap<String, &'a dyn Search>,
    removal_storages: IndexMap<String, &'a dyn ObjectDeletionInterface>,
    removal_objstorages: IndexMap<String, &'a dyn ObjectStore>,
    removal_journals: IndexMap<String, &'a dyn JournalWriter>,
    progress: &'a dyn ProgressReporter,

    recovery_bundle_path: Option<PathBuf>,
    object_secret_key: Option<String>,
    swhids_to_remove: Vec<ExtendedSwhid>,
    objids_to_remove: Vec<Vec<u8>>,
    origin_urls_to_remove: Vec<String>,
    journal_objects_to_remove: IndexMap<String, Vec<Vec<u8>>>,
}

impl<'a> Remover<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: &'a dyn ArchiveStorage,
        graph_service: &'a dyn GraphService,
        restoration_storage: Option<&'a dyn ArchiveStorage>,
        removal_searches: IndexMap<String, &'a dyn Search>,
        removal_storages: IndexMap<String, &'a dyn ObjectDeletionInterface>,
        removal_objstorages: IndexMap<String, &'a dyn ObjectStore>,
        removal_journals: IndexMap<String, &'a dyn JournalWriter>,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Remover {
            storage,
            graph_service,
            restoration_storage,
            removal_searches,
            removal_storages,
            removal_objstorages,
            removal_journals,
            progress,
            recovery_bundle_path: None,
            object_secret_key: None,
            swhids_to_remove: Vec::new(),
            objids_to_remove: Vec::new(),
            origin_urls_to_remove: Vec::new(),
            journal_objects_to_remove: IndexMap::new(),
        }
    }

    /// Computes the set of SWHIDs that can safely be removed starting from
    /// `swhids`: builds the inventory, runs the removability fixed point,
    /// then prunes every vertex found unremovable.
    pub fn get_removable(&self, swhids: &[ExtendedSwhid]) -> Result<Vec<ExtendedSwhid>, RemoverError> {
        let inventory =
            swh_inventory::build_inventory(swhids, self.graph_service, self.storage, self.progress)?;
        let mut removable =
            swh_removability::mark_removable(inventory, self.graph_service, self.storage, self.progress)?;
        removable.delete_unremovable();
        Ok(removable.removable_swhids().collect())
    }

    /// Builds the full reachable inventory from `swhids`, without running
    /// the removability analysis: every object downstream of the seeds,
    /// whether or not anything outside the set still references it.
    pub fn get_inventory(&self, swhids: &[ExtendedSwhid]) -> Result<Vec<ExtendedSwhid>, RemoverError> {
        let inventory =
            swh_inventory::build_inventory(swhids, self.graph_service, self.storage, self.progress)?;
        Ok(inventory.select_ordered())
    }

    /// Records `object` for removal from every backend it's relevant to:
    /// storage (by SWHID), the object store (content blobs only), the
    /// journal (by unique key, always), and search (origins only).
    pub fn register_object(&mut self, object: &ArchivedObject) {
        if let Some(swhid) = object.swhid() {
            self.swhids_to_remove.push(swhid);
            if let ArchivedObject::Content(content) = object {
                self.objids_to_remove.push(composite_object_id(content));
            }
        }
        self.journal_objects_to_remove
            .entry(object.object_type().to_string())
            .or_default()
            .push(object.unique_key());
        if let ArchivedObject::Origin(origin) = object {
            self.origin_urls_to_remove.push(origin.url.clone());
        }
    }

    /// Resumes a removal from a previously created recovery bundle: loads
    /// every object back out of it and registers each one, the same as if
    /// it had just been backed up.
    pub fn register_objects_from_bundle(
        &mut self,
        recovery_bundle_path: impl AsRef<Path>,
        object_secret_key: impl Into<String>,
    ) -> Result<(), RemoverError> {
        if self.recovery_bundle_path.is_some() || self.object_secret_key.is_some() {
            return Err(RemoverError::BundleAlreadyAttached);
        }
        let recovery_bundle_path = recovery_bundle_path.as_ref().to_path_buf();
        let object_secret_key = object_secret_key.into();
        let provider = FixedKeyProvider(object_secret_key.clone());

        let mut bundle = BundleReader::open(&recovery_bundle_path)?;
        bundle.unlock(&provider)?;

        let mut bar = self.progress.bar(
            Some(bundle.swhids().len() as u64),
            "Loading objects…",
        );
        for object in bundle
            .contents()?
            .into_iter()
            .chain(bundle.skipped_contents()?)
            .chain(bundle.directories()?)
            .chain(bundle.revisions()?)
            .chain(bundle.releases()?)
            .chain(bundle.snapshots()?)
        {
            self.register_object(&object);
            bar.update(1);
        }
        for origin in bundle.origins()? {
            self.register_object(&origin);
            if let ArchivedObject::Origin(o) = &origin {
                for visit in bundle.origin_visits(&o.url)? {
                    self.register_object(&visit);
                }
                for status in bundle.origin_visit_statuses(&o.url)? {
                    self.register_object(&status);
                }
            }
            bar.update(1);
        }

        self.recovery_bundle_path = Some(recovery_bundle_path);
        self.object_secret_key = Some(object_secret_key);
        Ok(())
    }

    /// Generates a fresh object-decryption keypair, backs up `removable_swhids`
    /// into a new recovery bundle sealed under `secret_sharing`, and returns
    /// the object secret key (kept only in memory; never written to disk by
    /// this crate).
    pub fn create_recovery_bundle(
        &mut self,
        secret_sharing: &SecretSharingConfig,
        removable_swhids: &[ExtendedSwhid],
        recovery_bundle_path: impl AsRef<Path>,
        removal_identifier: impl Into<String>,
        reason: Option<String>,
        expire: Option<DateTime<Utc>>,
    ) -> Result<String, RemoverError> {
        let removal_identifier = removal_identifier.into();
        let (object_public_key, object_secret_key) = age::generate_keypair()?;
        let decryption_key_shares = swh_secret_sharing::generate_encrypted_shares(
            &removal_identifier,
            object_secret_key.as_bytes(),
            secret_sharing,
        )?;

        let mut writer = BundleWriter::create(
            recovery_bundle_path.as_ref(),
            object_public_key.clone(),
            removal_identifier.clone(),
            Utc::now(),
            decryption_key_shares.into_iter().collect(),
        )?;
        if let Some(reason) = reason {
            writer.set_reason(reason);
        }
        if let Some(expire) = expire {
            writer
                .set_expire(expire)
                .map_err(|e| RemoverError::InvalidExpire(e.to_string()))?;
        }

        let mut bar = self
            .progress
            .bar(Some(removable_swhids.len() as u64), "Backing up objects…");
        for chunk in chunks(removable_swhids, RECOVERY_BUNDLE_BACKUP_SWHIDS_CHUNK_SIZE) {
            let mut fetched = Vec::with_capacity(chunk.len());
            for swhid in &chunk {
                if let Some(object) = self.storage.fetch_object(*swhid)? {
                    fetched.push(object);
                }
            }
            let count = writer.backup_objects(fetched.iter())?;
            for object in &fetched {
                self.register_object(object);
                if let ArchivedObject::Origin(origin) = object {
                    let visits = self.storage.origin_visits(&origin.url)?;
                    let statuses = self.storage.origin_visit_statuses(&origin.url)?;
                    writer.backup_objects(visits.iter())?;
                    writer.backup_objects(statuses.iter())?;
                    for visit in &visits {
                        self.register_object(visit);
                    }
                    for status in &statuses {
                        self.register_object(status);
                    }
                }
            }
            bar.update(count as u64);
        }
        writer.finish()?;

        self.recovery_bundle_path = Some(recovery_bundle_path.as_ref().to_path_buf());
        self.object_secret_key = Some(object_secret_key.clone());
        Ok(object_secret_key)
    }

    /// Replays every object from the attached recovery bundle back into
    /// `self.restoration_storage`.
    pub fn restore_recovery_bundle(&self) -> Result<ObjectCounters, RemoverError> {
        let recovery_bundle_path = self
            .recovery_bundle_path
            .as_deref()
            .expect("restore_recovery_bundle requires an attached bundle");
        let object_secret_key = self
            .object_secret_key
            .clone()
            .expect("restore_recovery_bundle requires an attached bundle");
        let restoration_storage = self
            .restoration_storage
            .expect("restore_recovery_bundle requires a restoration storage");

        let provider = FixedKeyProvider(object_secret_key);
        let mut bundle = BundleReader::open(recovery_bundle_path)?;
        bundle.unlock(&provider)?;

        Ok(bundle.restore(restoration_storage)?)
    }

    /// Deletes every registered object from search, then storage, then the
    /// journal, then the object store, and finally checks that nothing new
    /// now references the removed objects.
    pub fn remove(&self) -> Result<(), RemoverError> {
        for (name, search) in &self.removal_searches {
            self.remove_from_search(name, *search)?;
        }
        for (name, storage) in &self.removal_storages {
            self.remove_from_storage(name, *storage)?;
        }
        for (name, journal) in &self.removal_journals {
            self.remove_from_journal(name, *journal)?;
        }
        for (name, objstorage) in &self.removal_objstorages {
            self.remove_from_objstorage(name, *objstorage);
        }
        if self.have_new_references(&self.swhids_to_remove)? {
            return Err(RemoverError::NewReferences);
        }
        Ok(())
    }

    pub fn remove_from_storage(
        &self,
        name: &str,
        removal_storage: &dyn ObjectDeletionInterface,
    ) -> Result<(), RemoverError> {
        let mut results = ObjectCounters::default();
        let mut bar = self.progress.bar(
            Some(self.swhids_to_remove.len() as u64),
            &format!("Removing objects from storage \"{name}\"…"),
        );
        for chunk in chunks(&self.swhids_to_remove, STORAGE_OBJECT_DELETE_CHUNK_SIZE) {
            let chunk_len = chunk.len();
            let counters = removal_storage.object_delete(&chunk)?;
            results.merge(&counters);
            bar.update(chunk_len as u64);
        }
        tracing::info!(backend = name, total = results.total(), "objects removed from storage");
        Ok(())
    }

    pub fn remove_from_journal(
        &self,
        name: &str,
        journal_writer: &dyn JournalWriter,
    ) -> Result<(), RemoverError> {
        let mut bar = self.progress.bar(
            Some(self.journal_objects_to_remove.len() as u64),
            &format!("Removing objects from journal \"{name}\"…"),
        );
        for (object_type, keys) in &self.journal_objects_to_remove {
            journal_writer.delete(object_type, keys)?;
            bar.update(1);
        }
        journal_writer.flush()?;
        tracing::info!(backend = name, "objects removed from journal");
        Ok(())
    }

    pub fn remove_from_search(&self, name: &str, search: &dyn Search) -> Result<(), RemoverError> {
        let mut count = 0u64;
        let mut bar = self.progress.bar(
            Some(self.origin_urls_to_remove.len() as u64),
            &format!("Removing origins from search \"{name}\"…"),
        );
        for origin_url in &self.origin_urls_to_remove {
            if search.origin_delete(origin_url)? {
                count += 1;
            }
            bar.update(1);
        }
        search.flush()?;
        tracing::info!(backend = name, count, "origins removed from search");
        Ok(())
    }

    pub fn remove_from_objstorage(&self, name: &str, objstorage: &dyn ObjectStore) {
        let mut count = 0u64;
        let mut bar = self.progress.bar(
            Some(self.objids_to_remove.len() as u64),
            &format!("Removing objects from objstorage \"{name}\"…"),
        );
        for objid in &self.objids_to_remove {
            match objstorage.delete(objid) {
                Ok(()) => count += 1,
                Err(swh_graph::traits::ObjectStoreError::NotFound) => {
                    tracing::warn!(backend = name, "object not found in objstorage for deletion");
                }
                Err(e) => {
                    tracing::warn!(backend = name, error = %e, "failed to delete object from objstorage");
                }
            }
            bar.update(1);
        }
        tracing::info!(backend = name, count, "objects removed from objstorage");
    }

    /// Post-deletion sanity check: have any of the removed SWHIDs picked up
    /// a new referrer from outside the removed set since the removability
    /// analysis ran?
    fn have_new_references(&self, removed_swhids: &[ExtendedSwhid]) -> Result<bool, RemoverError> {
        let swhids: std::collections::HashSet<_> = removed_swhids.iter().copied().collect();
        let mut bar = self
            .progress
            .bar(Some(swhids.len() as u64), "Looking for newly added references…");
        for swhid in &swhids {
            if swhid.object_type == ExtendedObjectType::Origin {
                bar.update(1);
                continue;
            }
            let recent_references = self
                .storage
                .object_find_recent_references(*swhid, HAVE_NEW_REFERENCES_QUERY_LIMIT)?;
            if recent_references.iter().any(|r| !swhids.contains(r)) {
                return Ok(true);
            }
            bar.update(1);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use swh_graph::{CollaboratorError, NoProgress};
    use swh_model::ObjectId;

    struct FakeGraph;

    impl GraphService for FakeGraph {
        fn visit_nodes_from(&self, _seed: ExtendedSwhid) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
            Ok(Vec::new())
        }
        fn visit_edges_from(
            &self,
            _seed: ExtendedSwhid,
        ) -> Result<Vec<(ExtendedSwhid, ExtendedSwhid)>, CollaboratorError> {
            Ok(Vec::new())
        }
        fn neighbors(
            &self,
            _swhid: ExtendedSwhid,
            _limit: usize,
        ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    struct FakeStorage {
        objects: RefCell<HashMap<ExtendedSwhid, ArchivedObject>>,
        references: RefCell<HashMap<ExtendedSwhid, Vec<ExtendedSwhid>>>,
    }

    impl ArchiveStorage for FakeStorage {
        fn fetch_object(&self, swhid: ExtendedSwhid) -> Result<Option<ArchivedObject>, CollaboratorError> {
            Ok(self.objects.borrow().get(&swhid).cloned())
        }
        fn object_find_recent_references(
            &self,
            swhid: ExtendedSwhid,
            _limit: usize,
        ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
            Ok(self.references.borrow().get(&swhid).cloned().unwrap_or_default())
        }
        fn restore_object(&self, _object: &ArchivedObject) -> Result<(), CollaboratorError> {
            Ok(())
        }

        fn origin_visits(&self, _origin_url: &str) -> Result<Vec<ArchivedObject>, CollaboratorError> {
            Ok(Vec::new())
        }

        fn origin_visit_statuses(&self, _origin_url: &str) -> Result<Vec<ArchivedObject>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    fn content_swhid(byte: u8) -> ExtendedSwhid {
        ExtendedSwhid::new(ExtendedObjectType::Content, ObjectId([byte; 20]))
    }

    #[test]
    fn register_object_tracks_content_for_every_backend() {
        let storage = FakeStorage {
            objects: RefCell::new(HashMap::new()),
            references: RefCell::new(HashMap::new()),
        };
        let graph_service = FakeGraph;
        let mut remover = Remover::new(
            &storage,
            &graph_service,
            None,
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            &NoProgress,
        );
        let content = ArchivedObject::Content(Content {
            sha1_git: ObjectId([9u8; 20]),
            sha1: [1u8; 20],
            sha256: [2u8; 32],
            blake2s256: [3u8; 32],
            length: 1,
            status: ContentStatus::Visible,
            data: None,
        });
        remover.register_object(&content);
        assert_eq!(remover.swhids_to_remove.len(), 1);
        assert_eq!(remover.objids_to_remove.len(), 1);
        assert_eq!(remover.journal_objects_to_remove.get("content").map(Vec::len), Some(1));
    }

    #[test]
    fn have_new_references_detects_outside_referrer() {
        let outside = content_swhid(1);
        let removed = content_swhid(2);
        let mut references = HashMap::new();
        references.insert(removed, vec![outside]);
        let storage = FakeStorage {
            objects: RefCell::new(HashMap::new()),
            references: RefCell::new(references),
        };
        let graph_service = FakeGraph;
        let remover = Remover::new(
            &storage,
            &graph_service,
            None,
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            &NoProgress,
        );
        assert!(remover.have_new_references(&[removed]).unwrap());
    }

    #[test]
    fn have_new_references_is_false_when_fully_contained() {
        let a = content_swhid(1);
        let b = content_swhid(2);
        let mut references = HashMap::new();
        references.insert(a, vec![b]);
        let storage = FakeStorage {
            objects: RefCell::new(HashMap::new()),
            references: RefCell::new(references),
        };
        let graph_service = FakeGraph;
        let remover = Remover::new(
            &storage,
            &graph_service,
            None,
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            &NoProgress,
        );
        assert!(!remover.have_new_references(&[a, b]).unwrap());
    }
}
