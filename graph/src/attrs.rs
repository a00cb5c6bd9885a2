/// Per-vertex attributes merged monotonically every time a vertex is
/// re-inserted: "later values win unless the existing value is `true` for
/// a monotone attribute" (§4.1).
pub trait VertexAttributes: Clone + Default {
    fn merge(&mut self, other: &Self);
}

/// Attributes tracked while the inventory builder is expanding the
/// subgraph outward from the seeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryAttrs {
    /// All of this vertex's outbound edges are known.
    pub complete: bool,
    /// The object itself was fully fetched from storage.
    pub filled: bool,
}

impl VertexAttributes for InventoryAttrs {
    fn merge(&mut self, other: &Self) {
        self.complete |= other.complete;
        self.filled |= other.filled;
    }
}

/// Three-valued removability state for the fixed-point analysis of §4.3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tristate {
    #[default]
    Unknown,
    Removable,
    Unremovable,
}

/// Attributes tracked while removability is being determined; carries the
/// inventory attributes forward since the removable subgraph is derived
/// from the inventory one rather than rebuilt from scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovableAttrs {
    pub complete: bool,
    pub filled: bool,
    pub removable: Tristate,
}

impl VertexAttributes for RemovableAttrs {
    fn merge(&mut self, other: &Self) {
        self.complete |= other.complete;
        self.filled |= other.filled;
        if other.removable != Tristate::Unknown {
            self.removable = other.removable;
        }
    }
}

impl From<InventoryAttrs> for RemovableAttrs {
    fn from(a: InventoryAttrs) -> Self {
        RemovableAttrs {
            complete: a.complete,
            filled: a.filled,
            removable: Tristate::Unknown,
        }
    }
}
