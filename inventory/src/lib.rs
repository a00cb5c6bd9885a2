//! Expands a set of seed SWHIDs into the full reachable subgraph, merging
//! the (possibly lagging) graph service with authoritative archive storage.

pub mod error;

use std::collections::{HashSet, VecDeque};

pub use error::Error;
use swh_graph::{
    ArchiveStorage, GraphService, InventorySubgraph, InventoryAttrs, ProgressReporter, Subgraph,
};
use swh_model::swhid::ExtendedObjectType;
use swh_model::ExtendedSwhid;

/// Builds the inventory subgraph for `seeds` (§4.2):
///
/// 1. Ask the graph service for every node and edge reachable forward from
///    each seed.
/// 2. For vertices whose outbound edges the graph service doesn't carry
///    (`ExtId`, `RawExtrinsicMetadata`, or anything the graph simply
///    doesn't know about yet), fetch the object from storage and add its
///    outbound edges directly, marking the vertex `complete`.
/// 3. Repeat step 2 for any new vertex discovered only through storage,
///    since the graph may lag what's actually in the archive.
pub fn build_inventory(
    seeds: &[ExtendedSwhid],
    graph_service: &dyn GraphService,
    storage: &dyn ArchiveStorage,
    progress: &dyn ProgressReporter,
) -> Result<InventorySubgraph, Error> {
    let mut graph: InventorySubgraph = Subgraph::new();
    for seed in seeds {
        graph.add_swhid(*seed);
    }

    let mut known_to_graph_service: HashSet<ExtendedSwhid> = HashSet::new();
    let mut pending_edges: Vec<(ExtendedSwhid, ExtendedSwhid)> = Vec::new();

    let mut bar = progress.bar(Some(seeds.len() as u64), "Querying the graph service…");
    for seed in seeds {
        let nodes = graph_service
            .visit_nodes_from(*seed)
            .map_err(Error::GraphService)?;
        for node in &nodes {
            graph.add_swhid(*node);
            known_to_graph_service.insert(*node);
        }
        let edges = graph_service
            .visit_edges_from(*seed)
            .map_err(Error::GraphService)?;
        pending_edges.extend(edges);
        bar.update(1);
    }

    let mut to_fetch: VecDeque<ExtendedSwhid> = graph.swhids().copied().collect();
    let mut fetched: HashSet<ExtendedSwhid> = HashSet::new();

    let mut storage_bar = progress.bar(None, "Filling in objects missing from the graph…");
    while let Some(swhid) = to_fetch.pop_front() {
        if fetched.contains(&swhid) {
            continue;
        }
        let needs_storage_fetch = matches!(
            swhid.object_type,
            ExtendedObjectType::ExtId | ExtendedObjectType::RawExtrinsicMetadata
        ) || !known_to_graph_service.contains(&swhid);
        if !needs_storage_fetch {
            continue;
        }
        fetched.insert(swhid);
        let Some(object) = storage.fetch_object(swhid).map_err(Error::Storage)? else {
            continue;
        };
        let outbound = object.outbound_swhids();
        graph.add_object(object);
        graph.set_attrs(
            &swhid,
            InventoryAttrs {
                complete: true,
                filled: true,
            },
        );
        for target in outbound {
            let is_new = !graph.contains(&target);
            graph.add_swhid(target);
            pending_edges.push((swhid, target));
            if is_new {
                to_fetch.push_back(target);
            }
        }
        storage_bar.update(1);
    }

    for (src, tgt) in pending_edges {
        graph.add_edge(src, tgt, true)?;
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use swh_graph::{CollaboratorError, NoProgress};
    use swh_model::object::{Directory, DirectoryEntry, EntryTargetType};
    use swh_model::{ArchivedObject, ObjectId};

    struct FakeGraph {
        nodes: HashMap<ExtendedSwhid, Vec<ExtendedSwhid>>,
    }

    impl GraphService for FakeGraph {
        fn visit_nodes_from(
            &self,
            seed: ExtendedSwhid,
        ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
            Ok(self.nodes.get(&seed).cloned().unwrap_or_default())
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
    }

    impl ArchiveStorage for FakeStorage {
        fn fetch_object(
            &self,
            swhid: ExtendedSwhid,
        ) -> Result<Option<ArchivedObject>, CollaboratorError> {
            Ok(self.objects.borrow().get(&swhid).cloned())
        }

        fn object_find_recent_references(
            &self,
            _swhid: ExtendedSwhid,
            _limit: usize,
        ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
            Ok(Vec::new())
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

    fn directory_swhid(byte: u8) -> ExtendedSwhid {
        ExtendedSwhid::new(ExtendedObjectType::Directory, ObjectId([byte; 20]))
    }

    #[test]
    fn fetches_from_storage_when_graph_is_empty() {
        let dir = directory_swhid(1);
        let content = content_swhid(2);
        let mut objects = HashMap::new();
        objects.insert(
            dir,
            ArchivedObject::Directory(Directory {
                id: ObjectId([1; 20]),
                entries: vec![DirectoryEntry {
                    name: b"file".to_vec(),
                    permissions: 0o100644,
                    target_type: EntryTargetType::File,
                    target: content,
                }],
                raw_manifest: None,
            }),
        );
        let graph_service = FakeGraph {
            nodes: HashMap::new(),
        };
        let storage = FakeStorage {
            objects: RefCell::new(objects),
        };
        let inventory =
            build_inventory(&[dir], &graph_service, &storage, &NoProgress).unwrap();
        assert!(inventory.contains(&dir));
        assert!(inventory.contains(&content));
        assert_eq!(
            inventory.out_edges(&dir).collect::<Vec<_>>(),
            vec![&content]
        );
    }

    #[test]
    fn nodes_known_only_to_the_graph_are_not_fetched_from_storage() {
        let seed = directory_swhid(3);
        let reachable = content_swhid(4);
        let mut nodes = HashMap::new();
        nodes.insert(seed, vec![reachable]);
        let graph_service = FakeGraph { nodes };
        let storage = FakeStorage {
            objects: RefCell::new(HashMap::new()),
        };
        let inventory =
            build_inventory(&[seed], &graph_service, &storage, &NoProgress).unwrap();
        assert!(inventory.contains(&seed));
        assert!(inventory.contains(&reachable));
    }
}
