//! Vertex store (C3): one `VertInf` per routable point in the plane, held in
//! a single doubly-linked sequence partitioned into a connector-endpoint run
//! followed by a shape-corner run (spec.md §3/§4.3).

use smallvec::SmallVec;

use crate::geometry::Pt;
use crate::ids::{ConnectorId, EdgeId, ShapeId, VertexId};

/// Which endpoint of its connector a vertex represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointWhich {
    Source,
    Target,
}

/// Bitmask of permitted visibility directions, used when an endpoint sits
/// inside a shape (spec.md §3, Glossary "ConnEnd"). Bit values follow the
/// original `ConnDirFlag` enum (`connector.h`): Up=1, Down=2, Left=4,
/// Right=8, All=15, None=0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ConnDirFlags(pub u8);

impl ConnDirFlags {
    pub const NONE: ConnDirFlags = ConnDirFlags(0);
    pub const UP: ConnDirFlags = ConnDirFlags(1);
    pub const DOWN: ConnDirFlags = ConnDirFlags(2);
    pub const LEFT: ConnDirFlags = ConnDirFlags(4);
    pub const RIGHT: ConnDirFlags = ConnDirFlags(8);
    pub const ALL: ConnDirFlags = ConnDirFlags(15);

    pub fn contains(self, other: ConnDirFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: ConnDirFlags) -> ConnDirFlags {
        ConnDirFlags(self.0 | other.0)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ConnDirFlags {
    type Output = ConnDirFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// What kind of routable point a vertex represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// A connector endpoint; `vertex_number` is fixed (1=source, 2=target).
    Endpoint { connector: ConnectorId, which: EndpointWhich },
    /// A corner of a shape's polygon boundary.
    ShapeCorner { shape: ShapeId, corner_index: usize },
    /// A vertex synthesised during orthogonal sweep construction, at a
    /// T-junction or crossing; participates only in the orthogonal graph.
    DummyOrthogonal,
}

impl VertexKind {
    pub fn is_shape_corner(&self) -> bool {
        matches!(self, VertexKind::ShapeCorner { .. })
    }
}

/// Small inline capacity for incident-edge lists: most vertices touch a
/// handful of edges, so an inline `SmallVec` avoids a heap allocation per
/// vertex in the common case.
pub type EdgeRefs = SmallVec<[EdgeId; 8]>;

/// One per routable point in the plane (spec.md §3 `VertInf`).
#[derive(Debug, Clone)]
pub struct VertInf {
    pub kind: VertexKind,
    pub position: Pt,

    pub vis_edges: EdgeRefs,
    pub orthog_edges: EdgeRefs,
    pub invis_edges: EdgeRefs,

    /// Path-search scratch: predecessor edge on the current best path.
    pub path_pred: Option<EdgeId>,
    /// Path-search scratch: best known distance from the search origin.
    pub path_dist: f64,
    /// Path-search scratch: has this vertex been finalised (Dijkstra) / is
    /// it in the A* "done" set.
    pub path_visited: bool,

    /// Shape-boundary neighbours, for shape-corner vertices only.
    pub sh_prev: Option<VertexId>,
    pub sh_next: Option<VertexId>,

    /// Permitted visibility directions when this (endpoint) vertex sits
    /// inside a shape.
    pub dir_flags: ConnDirFlags,

    // Sequence links (partitioned doubly-linked list).
    prev: Option<VertexId>,
    next: Option<VertexId>,
}

impl VertInf {
    fn new(kind: VertexKind, position: Pt) -> Self {
        VertInf {
            kind,
            position,
            vis_edges: EdgeRefs::new(),
            orthog_edges: EdgeRefs::new(),
            invis_edges: EdgeRefs::new(),
            path_pred: None,
            path_dist: f64::INFINITY,
            path_visited: false,
            sh_prev: None,
            sh_next: None,
            dir_flags: ConnDirFlags::ALL,
            prev: None,
            next: None,
        }
    }

    pub fn is_shape_corner(&self) -> bool {
        self.kind.is_shape_corner()
    }

    pub fn reset_path_scratch(&mut self) {
        self.path_pred = None;
        self.path_dist = f64::INFINITY;
        self.path_visited = false;
    }
}

/// The partitioned vertex sequence: a single doubly-linked list split into
/// two contiguous runs, connector-endpoint vertices first then shape-corner
/// vertices, allowing O(1) iteration of each partition (spec.md §4.3).
#[derive(Debug, Default)]
pub struct VertexStore {
    arena: slotmap::SlotMap<VertexId, VertInf>,
    first_connector: Option<VertexId>,
    last_connector: Option<VertexId>,
    first_shape: Option<VertexId>,
    last_shape: Option<VertexId>,
}

impl VertexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: VertexId) -> Option<&VertInf> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut VertInf> {
        self.arena.get_mut(id)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.arena.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// `connections_begin()`: first connector-partition vertex, or the
    /// first shape-partition vertex if there are no connector vertices.
    pub fn connections_begin(&self) -> Option<VertexId> {
        self.first_connector.or(self.first_shape)
    }

    pub fn shapes_begin(&self) -> Option<VertexId> {
        self.first_shape
    }

    pub fn end(&self) -> Option<VertexId> {
        None
    }

    pub fn next_of(&self, id: VertexId) -> Option<VertexId> {
        self.arena.get(id).and_then(|v| v.next)
    }

    /// Inserts a new vertex at the front of its partition.
    pub fn add_vertex(&mut self, kind: VertexKind, position: Pt) -> VertexId {
        let is_shape = kind.is_shape_corner();
        let id = self.arena.insert(VertInf::new(kind, position));
        if is_shape {
            let old_head = self.first_shape;
            if let Some(h) = old_head {
                self.arena[h].prev = Some(id);
            } else {
                self.last_shape = Some(id);
            }
            self.arena[id].next = old_head;
            self.arena[id].prev = None;
            self.first_shape = Some(id);
        } else {
            let old_head = self.first_connector;
            if let Some(h) = old_head {
                self.arena[h].prev = Some(id);
            } else {
                self.last_connector = Some(id);
            }
            self.arena[id].next = old_head;
            self.arena[id].prev = None;
            self.first_connector = Some(id);
        }
        self.check_invariants();
        id
    }

    /// Removes a vertex, rewiring its neighbours; returns the vertex that
    /// was its successor (so destructive iteration can step forward).
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<VertexId> {
        let v = self.arena.get(id)?;
        let (prev, next, is_shape) = (v.prev, v.next, v.is_shape_corner());

        match prev {
            Some(p) => self.arena[p].next = next,
            None => {
                if is_shape {
                    self.first_shape = next;
                } else {
                    self.first_connector = next;
                }
            }
        }
        match next {
            Some(n) => self.arena[n].prev = prev,
            None => {
                if is_shape {
                    self.last_shape = prev;
                } else {
                    self.last_connector = prev;
                }
            }
        }
        // If we removed the last connector vertex and it pointed at the
        // first shape vertex as its successor, that linkage is implicit
        // (connector run simply becomes empty); nothing further to patch.
        self.arena.remove(id);
        self.check_invariants();
        next
    }

    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        if let Some(fc) = self.first_connector {
            debug_assert!(self.arena[fc].prev.is_none(), "first connector has a predecessor");
        }
        if let Some(ls) = self.last_shape {
            debug_assert!(self.arena[ls].next.is_none(), "last shape has a successor");
        }
        if let (Some(lc), Some(fs)) = (self.last_connector, self.first_shape) {
            debug_assert_eq!(self.arena[lc].next, Some(fs), "last connector must lead into first shape");
        }
        for (id, v) in self.arena.iter() {
            let _ = id;
            if v.is_shape_corner() {
                debug_assert!(v.is_shape_corner());
            }
        }
    }

    #[cfg(not(debug_assertions))]
    fn check_invariants(&self) {}

    /// Iterates the connector partition only.
    pub fn connector_ids(&self) -> Vec<VertexId> {
        let mut out = Vec::new();
        let mut cur = self.first_connector;
        while let Some(id) = cur {
            out.push(id);
            cur = self.arena[id].next;
        }
        out
    }

    /// Iterates the shape partition only.
    pub fn shape_corner_ids(&self) -> Vec<VertexId> {
        let mut out = Vec::new();
        let mut cur = self.first_shape;
        while let Some(id) = cur {
            out.push(id);
            cur = self.arena[id].next;
        }
        out
    }

    /// Iterates every vertex (both partitions, connector run first).
    pub fn all_ids(&self) -> Vec<VertexId> {
        let mut out = self.connector_ids();
        out.extend(self.shape_corner_ids());
        out
    }

    /// Linear lookup by position (cold path only, per spec.md §4.3).
    pub fn find_by_position(&self, p: &Pt) -> Option<VertexId> {
        self.arena.iter().find(|(_, v)| v.position == *p).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn endpoint(store: &mut VertexStore, conn: ConnectorId, which: EndpointWhich, x: f64, y: f64) -> VertexId {
        store.add_vertex(VertexKind::Endpoint { connector: conn, which }, Pt::new(x, y))
    }

    fn corner(store: &mut VertexStore, shape: ShapeId, idx: usize, x: f64, y: f64) -> VertexId {
        store.add_vertex(VertexKind::ShapeCorner { shape, corner_index: idx }, Pt::new(x, y))
    }

    #[test]
    fn partitions_stay_separated() {
        let mut store = VertexStore::new();
        let conn = slotmap::KeyData::from_ffi(1).into();
        let shape = slotmap::KeyData::from_ffi(1).into();
        let _e1 = endpoint(&mut store, conn, EndpointWhich::Source, 0.0, 0.0);
        let c1 = corner(&mut store, shape, 0, 1.0, 1.0);
        let _e2 = endpoint(&mut store, conn, EndpointWhich::Target, 2.0, 2.0);

        let conns = store.connector_ids();
        let corners = store.shape_corner_ids();
        assert_eq!(conns.len(), 2);
        assert_eq!(corners.len(), 1);
        assert_eq!(corners[0], c1);
        for id in conns {
            assert!(!store.get(id).unwrap().is_shape_corner());
        }
    }

    #[test]
    fn remove_vertex_rewires_neighbours_and_returns_successor() {
        let mut store = VertexStore::new();
        let shape = slotmap::KeyData::from_ffi(1).into();
        let a = corner(&mut store, shape, 0, 0.0, 0.0);
        let b = corner(&mut store, shape, 1, 1.0, 0.0);
        let c = corner(&mut store, shape, 2, 2.0, 0.0);
        // Insertion order places most recent at head: c, b, a.
        assert_eq!(store.shape_corner_ids(), vec![c, b, a]);
        let successor = store.remove_vertex(b);
        assert_eq!(successor, Some(a));
        assert_eq!(store.shape_corner_ids(), vec![c, a]);
    }

    #[test]
    fn connections_begin_falls_back_to_shapes() {
        let mut store = VertexStore::new();
        assert_eq!(store.connections_begin(), None);
        let shape = slotmap::KeyData::from_ffi(1).into();
        let c = corner(&mut store, shape, 0, 0.0, 0.0);
        assert_eq!(store.connections_begin(), Some(c));
    }
}
