//! Typed in-memory graph of archived objects, tracking enough per-vertex
//! state to drive the inventory and removability analyses.

pub mod attrs;
pub mod dot;
pub mod error;
pub mod progress;
pub mod subgraph;
pub mod traits;

pub use attrs::{InventoryAttrs, RemovableAttrs, Tristate, VertexAttributes};
pub use error::Error;
pub use progress::{NoProgress, ProgressBar, ProgressReporter};
pub use subgraph::{InventorySubgraph, RemovableSubgraph, Subgraph};
pub use traits::{
    ArchiveStorage, CollaboratorError, GraphService, JournalWriter, ObjectCounters,
    ObjectDeletionInterface, ObjectStore, ObjectStoreError, Search,
};

#[cfg(test)]
mod tests {
    use super::*;
    use swh_model::{ExtendedObjectType, ExtendedSwhid, ObjectId};

    fn swhid(object_type: ExtendedObjectType, last_byte: u8) -> ExtendedSwhid {
        let mut bytes = [0u8; 20];
        bytes[19] = last_byte;
        ExtendedSwhid::new(object_type, ObjectId(bytes))
    }

    #[test]
    fn add_vertex_insert() {
        let mut g: InventorySubgraph = Subgraph::new();
        let s = swhid(ExtendedObjectType::Content, 1);
        g.add_swhid(s);
        assert!(g.contains(&s));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn add_vertex_on_existing_vertex_is_idempotent() {
        let mut g: InventorySubgraph = Subgraph::new();
        let s = swhid(ExtendedObjectType::Content, 1);
        g.add_swhid(s);
        g.add_swhid(s);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn add_vertex_updates_attributes_by_merge() {
        let mut g: InventorySubgraph = Subgraph::new();
        let s = swhid(ExtendedObjectType::Content, 1);
        g.add_swhid_with_attrs(
            s,
            InventoryAttrs {
                complete: false,
                filled: true,
            },
        );
        g.add_swhid_with_attrs(
            s,
            InventoryAttrs {
                complete: true,
                filled: false,
            },
        );
        let attrs = g.attrs(&s).unwrap();
        assert!(attrs.complete);
        assert!(attrs.filled);
    }

    #[test]
    fn complete_is_not_cleared_by_unspecified_subsequent_add() {
        let mut g: InventorySubgraph = Subgraph::new();
        let s = swhid(ExtendedObjectType::Content, 1);
        g.add_swhid_with_attrs(
            s,
            InventoryAttrs {
                complete: true,
                filled: true,
            },
        );
        // a plain re-add carries `Default` attrs (both false), which must
        // not clear what's already known true.
        g.add_swhid(s);
        let attrs = g.attrs(&s).unwrap();
        assert!(attrs.complete);
        assert!(attrs.filled);
    }

    #[test]
    fn add_edge_fails_on_duplicate() {
        let mut g: InventorySubgraph = Subgraph::new();
        let a = swhid(ExtendedObjectType::Revision, 1);
        let b = swhid(ExtendedObjectType::Directory, 2);
        g.add_swhid(a);
        g.add_swhid(b);
        g.add_edge(a, b, false).unwrap();
        assert!(g.add_edge(a, b, false).is_err());
    }

    #[test]
    fn add_edge_skip_duplicates() {
        let mut g: InventorySubgraph = Subgraph::new();
        let a = swhid(ExtendedObjectType::Revision, 1);
        let b = swhid(ExtendedObjectType::Directory, 2);
        g.add_swhid(a);
        g.add_swhid(b);
        g.add_edge(a, b, false).unwrap();
        assert!(g.add_edge(a, b, true).is_ok());
    }

    #[test]
    fn add_edge_rejects_self_loop() {
        let mut g: InventorySubgraph = Subgraph::new();
        let a = swhid(ExtendedObjectType::Revision, 1);
        g.add_swhid(a);
        assert!(matches!(g.add_edge(a, a, false), Err(Error::SelfLoop(_))));
    }

    #[test]
    fn add_edge_rejects_missing_vertex() {
        let mut g: InventorySubgraph = Subgraph::new();
        let a = swhid(ExtendedObjectType::Revision, 1);
        let b = swhid(ExtendedObjectType::Directory, 2);
        g.add_swhid(a);
        assert!(matches!(
            g.add_edge(a, b, false),
            Err(Error::MissingVertex(_))
        ));
    }

    #[test]
    fn select_ordered_returns_sorted_by_object_type() {
        let mut g: InventorySubgraph = Subgraph::new();
        let content = swhid(ExtendedObjectType::Content, 1);
        let origin = swhid(ExtendedObjectType::Origin, 2);
        let snapshot = swhid(ExtendedObjectType::Snapshot, 3);
        g.add_swhid(content);
        g.add_swhid(origin);
        g.add_swhid(snapshot);
        let ordered = g.select_ordered();
        assert_eq!(ordered, vec![origin, snapshot, content]);
    }

    #[test]
    fn select_ordered_ties_break_on_insertion_order() {
        let mut g: InventorySubgraph = Subgraph::new();
        let first = swhid(ExtendedObjectType::Content, 1);
        let second = swhid(ExtendedObjectType::Content, 2);
        g.add_swhid(first);
        g.add_swhid(second);
        assert_eq!(g.select_ordered(), vec![first, second]);
    }

    #[test]
    fn write_dot_smoke_test() {
        let mut g: InventorySubgraph = Subgraph::new();
        let a = swhid(ExtendedObjectType::Revision, 1);
        let b = swhid(ExtendedObjectType::Directory, 2);
        g.add_swhid(a);
        g.add_swhid(b);
        g.add_edge(a, b, false).unwrap();
        let mut out = Vec::new();
        g.write_dot(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("digraph Subgraph {"));
        assert!(text.contains(&format!("\"{a}\" -> \"{b}\";")));
    }

    #[test]
    fn removable_subgraph_delete_unremovable_prunes_edges_too() {
        let mut g: RemovableSubgraph = Subgraph::new();
        let keep = swhid(ExtendedObjectType::Revision, 1);
        let drop = swhid(ExtendedObjectType::Directory, 2);
        g.add_swhid(keep);
        g.add_swhid(drop);
        g.add_edge(keep, drop, false).unwrap();
        g.mark_removable(keep);
        g.mark_unremovable(drop);
        g.delete_unremovable();
        assert!(g.contains(&keep));
        assert!(!g.contains(&drop));
        assert!(g.out_edges(&keep).next().is_none());
    }

    #[test]
    fn inventory_to_removable_carries_edges() {
        let mut inv: InventorySubgraph = Subgraph::new();
        let a = swhid(ExtendedObjectType::Revision, 1);
        let b = swhid(ExtendedObjectType::Directory, 2);
        inv.add_swhid(a);
        inv.add_swhid(b);
        inv.add_edge(a, b, false).unwrap();
        let removable = inv.into_removable_subgraph();
        assert!(removable.contains(&a));
        assert_eq!(removable.out_edges(&a).collect::<Vec<_>>(), vec![&b]);
    }
}
