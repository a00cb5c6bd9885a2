use indexmap::{IndexMap, IndexSet};
use swh_model::{ArchivedObject, ExtendedSwhid};

use crate::attrs::{InventoryAttrs, RemovableAttrs, Tristate, VertexAttributes};
use crate::error::Error;

struct Vertex<A> {
    object: Option<ArchivedObject>,
    attrs: A,
    out_edges: IndexSet<ExtendedSwhid>,
    in_edges: IndexSet<ExtendedSwhid>,
}

impl<A: VertexAttributes> Vertex<A> {
    fn new(attrs: A) -> Self {
        Vertex {
            object: None,
            attrs,
            out_edges: IndexSet::new(),
            in_edges: IndexSet::new(),
        }
    }
}

/// A directed graph of archived objects keyed by SWHID, generic over the
/// per-vertex attribute set (see `InventorySubgraph`/`RemovableSubgraph`).
///
/// Implemented as adjacency lists behind two hash indices (out-neighbors,
/// in-neighbors) rather than pulling in a graph library — SWHIDs already
/// hash well and the traversals needed (§4.2, §4.3) are simple forward/
/// backward walks.
pub struct Subgraph<A: VertexAttributes> {
    vertices: IndexMap<ExtendedSwhid, Vertex<A>>,
}

impl<A: VertexAttributes> Default for Subgraph<A> {
    fn default() -> Self {
        Subgraph {
            vertices: IndexMap::new(),
        }
    }
}

impl<A: VertexAttributes> Subgraph<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, swhid: &ExtendedSwhid) -> bool {
        self.vertices.contains_key(swhid)
    }

    pub fn attrs(&self, swhid: &ExtendedSwhid) -> Option<&A> {
        self.vertices.get(swhid).map(|v| &v.attrs)
    }

    pub fn object(&self, swhid: &ExtendedSwhid) -> Option<&ArchivedObject> {
        self.vertices.get(swhid).and_then(|v| v.object.as_ref())
    }

    /// Inserts (or merges attributes into) a vertex for `swhid`. Idempotent.
    pub fn add_swhid(&mut self, swhid: ExtendedSwhid) -> ExtendedSwhid {
        self.add_swhid_with_attrs(swhid, A::default())
    }

    pub fn add_swhid_with_attrs(&mut self, swhid: ExtendedSwhid, attrs: A) -> ExtendedSwhid {
        match self.vertices.get_mut(&swhid) {
            Some(v) => v.attrs.merge(&attrs),
            None => {
                self.vertices.insert(swhid, Vertex::new(attrs));
            }
        }
        swhid
    }

    /// Inserts a full object, extracting its SWHID and keeping a reference
    /// to it for later retrieval (`object()`).
    pub fn add_object(&mut self, object: ArchivedObject) -> Option<ExtendedSwhid> {
        let swhid = object.swhid()?;
        self.add_swhid(swhid);
        if let Some(v) = self.vertices.get_mut(&swhid) {
            v.object = Some(object);
        }
        Some(swhid)
    }

    pub fn set_attrs(&mut self, swhid: &ExtendedSwhid, attrs: A) {
        if let Some(v) = self.vertices.get_mut(swhid) {
            v.attrs.merge(&attrs);
        }
    }

    /// Adds a directed edge `src -> tgt`. Both endpoints must already
    /// exist. Rejects self-loops (the archive DAG is acyclic by
    /// cryptographic construction) and, unless `skip_duplicates`, rejects
    /// an edge that is already present.
    pub fn add_edge(
        &mut self,
        src: ExtendedSwhid,
        tgt: ExtendedSwhid,
        skip_duplicates: bool,
    ) -> Result<(), Error> {
        if src == tgt {
            return Err(Error::SelfLoop(src));
        }
        if !self.vertices.contains_key(&src) {
            return Err(Error::MissingVertex(src));
        }
        if !self.vertices.contains_key(&tgt) {
            return Err(Error::MissingVertex(tgt));
        }
        let already_present = self.vertices[&src].out_edges.contains(&tgt);
        if already_present && !skip_duplicates {
            return Err(Error::DuplicateEdge(src, tgt));
        }
        self.vertices.get_mut(&src).unwrap().out_edges.insert(tgt);
        self.vertices.get_mut(&tgt).unwrap().in_edges.insert(src);
        Ok(())
    }

    pub fn add_edges(
        &mut self,
        edges: impl IntoIterator<Item = (ExtendedSwhid, ExtendedSwhid)>,
        skip_duplicates: bool,
    ) -> Result<(), Error> {
        for (src, tgt) in edges {
            self.add_edge(src, tgt, skip_duplicates)?;
        }
        Ok(())
    }

    pub fn out_edges(&self, swhid: &ExtendedSwhid) -> impl Iterator<Item = &ExtendedSwhid> {
        self.vertices
            .get(swhid)
            .into_iter()
            .flat_map(|v| v.out_edges.iter())
    }

    pub fn in_edges(&self, swhid: &ExtendedSwhid) -> impl Iterator<Item = &ExtendedSwhid> {
        self.vertices
            .get(swhid)
            .into_iter()
            .flat_map(|v| v.in_edges.iter())
    }

    pub fn swhids(&self) -> impl Iterator<Item = &ExtendedSwhid> {
        self.vertices.keys()
    }

    /// Iterates vertices ordered by object type — Origin, Snapshot,
    /// Release, Revision, Directory, Content, ExtId, RawExtrinsicMetadata —
    /// with insertion order as the tie-break within a type. Used by the
    /// bundle writer so bundles are reproducibly ordered.
    pub fn select_ordered(&self) -> Vec<ExtendedSwhid> {
        let mut ordered: Vec<ExtendedSwhid> = self.vertices.keys().copied().collect();
        ordered.sort_by_key(|swhid| swhid.object_type);
        ordered
    }

    /// Removes a vertex and all edges touching it.
    pub fn remove_vertex(&mut self, swhid: &ExtendedSwhid) {
        if let Some(v) = self.vertices.shift_remove(swhid) {
            for out in &v.out_edges {
                if let Some(target) = self.vertices.get_mut(out) {
                    target.in_edges.shift_remove(swhid);
                }
            }
            for inc in &v.in_edges {
                if let Some(source) = self.vertices.get_mut(inc) {
                    source.out_edges.shift_remove(swhid);
                }
            }
        }
    }

    /// Textual GraphViz export for debugging (§4.1).
    pub fn write_dot(&self, out: impl std::io::Write) -> std::io::Result<()> {
        let mut dot = crate::dot::DotWriter::new(out);
        dot.write_header()?;
        for swhid in self.vertices.keys() {
            dot.write_vertex(swhid, None)?;
        }
        for (src, v) in &self.vertices {
            for tgt in &v.out_edges {
                dot.write_edge(src, tgt)?;
            }
        }
        dot.write_footer()
    }
}

/// The subgraph built by the inventory phase (§4.2): every object
/// transitively reachable from the seeds.
pub type InventorySubgraph = Subgraph<InventoryAttrs>;

/// The subgraph annotated and pruned by the removability phase (§4.3).
pub type RemovableSubgraph = Subgraph<RemovableAttrs>;

impl InventorySubgraph {
    /// Converts a fully expanded inventory subgraph into the (still
    /// unannotated) skeleton the removability analysis operates on,
    /// carrying `complete`/`filled` and every edge forward.
    pub fn into_removable_subgraph(self) -> RemovableSubgraph {
        let mut removable = RemovableSubgraph::new();
        let mut edges = Vec::new();
        for (swhid, vertex) in &self.vertices {
            edges.extend(vertex.out_edges.iter().map(|tgt| (*swhid, *tgt)));
        }
        for (swhid, vertex) in self.vertices {
            removable.add_swhid_with_attrs(swhid, vertex.attrs.into());
            if let Some(object) = vertex.object {
                removable.add_object(object);
            }
        }
        removable
            .add_edges(edges, true)
            .expect("edges carried over from a valid inventory subgraph are well-formed");
        removable
    }
}

impl RemovableSubgraph {
    pub fn mark_removable(&mut self, swhid: &ExtendedSwhid) {
        if let Some(v) = self.vertices.get_mut(swhid) {
            v.attrs.removable = Tristate::Removable;
        }
    }

    pub fn mark_unremovable(&mut self, swhid: &ExtendedSwhid) {
        if let Some(v) = self.vertices.get_mut(swhid) {
            v.attrs.removable = Tristate::Unremovable;
        }
    }

    pub fn removable_state(&self, swhid: &ExtendedSwhid) -> Tristate {
        self.vertices
            .get(swhid)
            .map(|v| v.attrs.removable)
            .unwrap_or(Tristate::Unknown)
    }

    /// Every vertex currently marked removable.
    pub fn removable_swhids(&self) -> impl Iterator<Item = ExtendedSwhid> + '_ {
        self.vertices
            .iter()
            .filter(|(_, v)| v.attrs.removable == Tristate::Removable)
            .map(|(swhid, _)| *swhid)
    }

    /// Prunes every vertex not marked removable, leaving exactly the
    /// objects safe to delete.
    pub fn delete_unremovable(&mut self) {
        let to_remove: Vec<ExtendedSwhid> = self
            .vertices
            .iter()
            .filter(|(_, v)| v.attrs.removable != Tristate::Removable)
            .map(|(swhid, _)| *swhid)
            .collect();
        for swhid in to_remove {
            self.remove_vertex(&swhid);
        }
    }

    /// Like `write_dot`, but labels each vertex with its removability state.
    pub fn write_dot_with_removability(&self, out: impl std::io::Write) -> std::io::Result<()> {
        let mut dot = crate::dot::DotWriter::new(out);
        dot.write_header()?;
        for (swhid, v) in &self.vertices {
            let label = match v.attrs.removable {
                Tristate::Removable => "removable",
                Tristate::Unremovable => "unremovable",
                Tristate::Unknown => "unknown",
            };
            dot.write_vertex(swhid, Some(label))?;
        }
        for (src, v) in &self.vertices {
            for tgt in &v.out_edges {
                dot.write_edge(src, tgt)?;
            }
        }
        dot.write_footer()
    }
}
