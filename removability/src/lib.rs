//! Fixed-point removability analysis (§4.3): determines which objects in an
//! inventory subgraph have no referrer outside the subgraph, and are
//! therefore safe to delete.

pub mod error;

use std::collections::{HashMap, HashSet};

pub use error::Error;
use swh_graph::{ArchiveStorage, GraphService, InventorySubgraph, ProgressReporter, RemovableSubgraph};
use swh_model::swhid::ExtendedObjectType;
use swh_model::ExtendedSwhid;

/// How many recent referrers to ask the graph service and storage for per
/// vertex. Origins are never queried — they have no referrers in the graph
/// sense and are removable iff they're in the candidate set.
const REFERRER_QUERY_LIMIT: usize = 1000;

/// Runs the fixed-point analysis and returns a subgraph annotated with each
/// vertex's removability — callers prune it with `delete_unremovable()`.
pub fn mark_removable(
    inventory: InventorySubgraph,
    graph_service: &dyn GraphService,
    storage: &dyn ArchiveStorage,
    progress: &dyn ProgressReporter,
) -> Result<RemovableSubgraph, Error> {
    let mut removable = inventory.into_removable_subgraph();

    // Leaves first: the natural top-down traversal order reversed, so
    // contents and metadata are resolved before the revisions/snapshots/
    // origins that (transitively) hold them.
    let mut order = removable.select_ordered();
    order.reverse();

    let mut referrers: HashMap<ExtendedSwhid, Vec<ExtendedSwhid>> = HashMap::with_capacity(order.len());
    let mut bar = progress.bar(Some(order.len() as u64), "Looking for referrers…");
    for swhid in &order {
        if swhid.object_type == ExtendedObjectType::Origin {
            referrers.insert(*swhid, Vec::new());
            bar.update(1);
            continue;
        }
        let mut found: HashSet<ExtendedSwhid> = HashSet::new();
        let neighbors = graph_service
            .neighbors(*swhid, REFERRER_QUERY_LIMIT)
            .or_else(|_| graph_service.neighbors(*swhid, REFERRER_QUERY_LIMIT))
            .map_err(Error::GraphService)?;
        found.extend(neighbors);
        found.extend(
            storage
                .object_find_recent_references(*swhid, REFERRER_QUERY_LIMIT)
                .map_err(Error::Storage)?,
        );
        referrers.insert(*swhid, found.into_iter().collect());
        bar.update(1);
    }

    // Fixed point: a vertex stays a removal candidate only as long as every
    // one of its referrers is itself still a candidate. Demoting a vertex
    // can cascade to anything that depended on it, so we keep sweeping
    // until nothing changes.
    let mut candidates: HashSet<ExtendedSwhid> = order.iter().copied().collect();
    loop {
        let mut changed = false;
        for swhid in &order {
            if !candidates.contains(swhid) {
                continue;
            }
            let refs = &referrers[swhid];
            if !refs.iter().all(|r| candidates.contains(r)) {
                candidates.remove(swhid);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for swhid in &order {
        if candidates.contains(swhid) {
            removable.mark_removable(swhid);
        } else {
            removable.mark_unremovable(swhid);
        }
    }

    Ok(removable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use swh_graph::{CollaboratorError, NoProgress, Subgraph};
    use swh_model::{ArchivedObject, ObjectId};

    struct FakeGraph {
        referrers: Map<ExtendedSwhid, Vec<ExtendedSwhid>>,
    }

    impl GraphService for FakeGraph {
        fn visit_nodes_from(
            &self,
            _seed: ExtendedSwhid,
        ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
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
            swhid: ExtendedSwhid,
            _limit: usize,
        ) -> Result<Vec<ExtendedSwhid>, CollaboratorError> {
            Ok(self.referrers.get(&swhid).cloned().unwrap_or_default())
        }
    }

    struct FakeStorage;

    impl ArchiveStorage for FakeStorage {
        fn fetch_object(
            &self,
            _swhid: ExtendedSwhid,
        ) -> Result<Option<ArchivedObject>, CollaboratorError> {
            Ok(None)
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

    fn swhid(object_type: ExtendedObjectType, byte: u8) -> ExtendedSwhid {
        ExtendedSwhid::new(object_type, ObjectId([byte; 20]))
    }

    #[test]
    fn dangling_chain_is_fully_removable() {
        let origin = swhid(ExtendedObjectType::Origin, 1);
        let snapshot = swhid(ExtendedObjectType::Snapshot, 2);
        let content = swhid(ExtendedObjectType::Content, 3);
        let mut inv = Subgraph::new();
        inv.add_swhid(origin);
        inv.add_swhid(snapshot);
        inv.add_swhid(content);
        inv.add_edge(origin, snapshot, false).unwrap();
        inv.add_edge(snapshot, content, false).unwrap();

        let graph_service = FakeGraph {
            referrers: Map::new(),
        };
        let removable = mark_removable(inv, &graph_service, &FakeStorage, &NoProgress).unwrap();
        let mut ids: Vec<_> = removable.removable_swhids().collect();
        ids.sort_by_key(|s| s.object_type);
        assert_eq!(ids, vec![origin, snapshot, content]);
    }

    #[test]
    fn externally_referenced_content_and_its_sole_parent_stay_unremovable() {
        let origin = swhid(ExtendedObjectType::Origin, 1);
        let directory = swhid(ExtendedObjectType::Directory, 2);
        let content = swhid(ExtendedObjectType::Content, 3);
        let external_referrer = swhid(ExtendedObjectType::Directory, 9);

        let mut inv = Subgraph::new();
        inv.add_swhid(origin);
        inv.add_swhid(directory);
        inv.add_swhid(content);
        inv.add_edge(origin, directory, false).unwrap();
        inv.add_edge(directory, content, false).unwrap();

        let mut referrers = Map::new();
        referrers.insert(content, vec![directory, external_referrer]);
        let graph_service = FakeGraph { referrers };

        let removable = mark_removable(inv, &graph_service, &FakeStorage, &NoProgress).unwrap();
        assert_eq!(removable.removable_state(&content), swh_graph::Tristate::Unremovable);
    }
}
