//! Edge bookkeeping (C4): `EdgeInf`, the three edge lists (visibility,
//! invisibility, orthogonal-visibility), and `check_visibility`.

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::geometry::{in_valid_region, segment_shape_intersect, Blocker, Pt};
use crate::ids::{ConnectorId, EdgeId, VertexId};
use crate::vertex::{VertInf, VertexStore};

/// Which graph an edge currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Visible,
    Invisible,
    Orthogonal,
}

/// Subscribers to invalidate when an edge's visibility changes: the
/// connectors whose current route traversed this edge. Modeled as an
/// explicit subscription set rather than the source's "pointer to a bool"
/// pattern (DESIGN NOTES §9), avoiding dangling-pointer hazards when
/// connectors are destroyed.
pub type Subscribers = SmallVec<[ConnectorId; 4]>;

/// An undirected edge between two vertices (spec.md §3 `EdgeInf`).
#[derive(Debug, Clone)]
pub struct EdgeInf {
    pub v1: VertexId,
    pub v2: VertexId,
    pub kind: EdgeKind,
    pub distance: f64,
    pub blocker: Blocker,
    pub subscribers: Subscribers,
}

impl EdgeInf {
    pub fn other(&self, v: VertexId) -> VertexId {
        if v == self.v1 {
            self.v2
        } else {
            debug_assert_eq!(v, self.v2);
            self.v1
        }
    }

    pub fn is_visible(&self) -> bool {
        self.kind == EdgeKind::Visible
    }

    pub fn is_orthogonal(&self) -> bool {
        self.kind == EdgeKind::Orthogonal
    }

    pub fn subscribe(&mut self, c: ConnectorId) {
        if !self.subscribers.contains(&c) {
            self.subscribers.push(c);
        }
    }
}

/// Owns the edge arena plus the three global registries (visibility,
/// invisibility, orthogonal-visibility) and drives the per-vertex incident
/// list bookkeeping that must stay in lock-step with them.
#[derive(Debug, Default)]
pub struct EdgeStore {
    arena: slotmap::SlotMap<EdgeId, EdgeInf>,
    vis_graph: IndexSet<EdgeId>,
    invis_graph: IndexSet<EdgeId>,
    orthog_graph: IndexSet<EdgeId>,
}

impl EdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EdgeId) -> Option<&EdgeInf> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: EdgeId) -> Option<&mut EdgeInf> {
        self.arena.get_mut(id)
    }

    pub fn vis_graph(&self) -> &IndexSet<EdgeId> {
        &self.vis_graph
    }
    pub fn invis_graph(&self) -> &IndexSet<EdgeId> {
        &self.invis_graph
    }
    pub fn orthog_graph(&self) -> &IndexSet<EdgeId> {
        &self.orthog_graph
    }

    fn registry_for(&mut self, kind: EdgeKind) -> &mut IndexSet<EdgeId> {
        match kind {
            EdgeKind::Visible => &mut self.vis_graph,
            EdgeKind::Invisible => &mut self.invis_graph,
            EdgeKind::Orthogonal => &mut self.orthog_graph,
        }
    }

    fn incident_list_for<'a>(vinf: &'a mut VertInf, kind: EdgeKind) -> &'a mut crate::vertex::EdgeRefs {
        match kind {
            EdgeKind::Visible => &mut vinf.vis_edges,
            EdgeKind::Invisible => &mut vinf.invis_edges,
            EdgeKind::Orthogonal => &mut vinf.orthog_edges,
        }
    }

    /// Finds an existing edge (of any kind) between `v1` and `v2`, if any.
    /// An edge exists at most once between a given vertex pair across both
    /// visibility and invisibility lists (spec.md §3).
    pub fn find_edge(&self, verts: &VertexStore, v1: VertexId, v2: VertexId) -> Option<EdgeId> {
        let vinf = verts.get(v1)?;
        for &e in vinf.vis_edges.iter().chain(vinf.invis_edges.iter()) {
            if let Some(einf) = self.arena.get(e) {
                if einf.other(v1) == v2 {
                    return Some(e);
                }
            }
        }
        None
    }

    /// Inserts `edge` into the appropriate global list and each endpoint's
    /// incident list.
    pub fn make_active(&mut self, verts: &mut VertexStore, id: EdgeId) {
        let (v1, v2, kind) = {
            let e = &self.arena[id];
            (e.v1, e.v2, e.kind)
        };
        self.registry_for(kind).insert(id);
        if let Some(vinf) = verts.get_mut(v1) {
            let list = Self::incident_list_for(vinf, kind);
            if !list.contains(&id) {
                list.push(id);
            }
        }
        if let Some(vinf) = verts.get_mut(v2) {
            let list = Self::incident_list_for(vinf, kind);
            if !list.contains(&id) {
                list.push(id);
            }
        }
    }

    /// Removes `edge` from its current list and both incident lists,
    /// clearing its subscriber list.
    pub fn make_inactive(&mut self, verts: &mut VertexStore, id: EdgeId) {
        let (v1, v2, kind) = match self.arena.get(id) {
            Some(e) => (e.v1, e.v2, e.kind),
            None => return,
        };
        self.registry_for(kind).shift_remove(&id);
        if let Some(vinf) = verts.get_mut(v1) {
            Self::incident_list_for(vinf, kind).retain(|e| *e != id);
        }
        if let Some(vinf) = verts.get_mut(v2) {
            Self::incident_list_for(vinf, kind).retain(|e| *e != id);
        }
        if let Some(e) = self.arena.get_mut(id) {
            e.subscribers.clear();
        }
    }

    /// Fully deletes an edge: deactivates it then frees its arena slot.
    pub fn delete_edge(&mut self, verts: &mut VertexStore, id: EdgeId) {
        self.make_inactive(verts, id);
        self.arena.remove(id);
    }

    /// Creates (inactive) edge record if none exists yet between `v1`/`v2`,
    /// returning its id either way.
    pub fn get_or_create(&mut self, verts: &VertexStore, v1: VertexId, v2: VertexId) -> EdgeId {
        if let Some(id) = self.find_edge(verts, v1, v2) {
            return id;
        }
        self.arena.insert(EdgeInf {
            v1,
            v2,
            kind: EdgeKind::Invisible,
            distance: 0.0,
            blocker: Blocker::None,
            subscribers: Subscribers::new(),
        })
    }

    /// `set_distance`: record the edge as visible with the given distance;
    /// if it was inactive-invisible, deactivate-reactivate as visible.
    pub fn set_distance(&mut self, verts: &mut VertexStore, id: EdgeId, distance: f64) {
        let was_invisible = matches!(self.arena.get(id), Some(e) if e.kind == EdgeKind::Invisible);
        if was_invisible {
            self.make_inactive(verts, id);
        }
        if let Some(e) = self.arena.get_mut(id) {
            e.kind = EdgeKind::Visible;
            e.distance = distance;
            e.blocker = Blocker::None;
        }
        self.make_active(verts, id);
    }

    /// Records the edge as a member of the orthogonal-visibility graph with
    /// the given distance (spec.md §4.8); used by `orthogonal.rs` instead of
    /// `set_distance`, which targets the poly-line visibility graph.
    pub fn set_orthogonal(&mut self, verts: &mut VertexStore, id: EdgeId, distance: f64) {
        self.make_inactive(verts, id);
        if let Some(e) = self.arena.get_mut(id) {
            e.kind = EdgeKind::Orthogonal;
            e.distance = distance;
            e.blocker = Blocker::None;
        }
        self.make_active(verts, id);
    }

    /// `add_blocker`: mark the edge invisible with zero distance and the
    /// given blocker tag (shape id, or [`Blocker::CycleBlocker`]).
    pub fn add_blocker(&mut self, verts: &mut VertexStore, id: EdgeId, blocker: Blocker) {
        let was_active_visible = matches!(self.arena.get(id), Some(e) if e.kind == EdgeKind::Visible);
        if was_active_visible {
            self.make_inactive(verts, id);
        }
        if let Some(e) = self.arena.get_mut(id) {
            e.kind = EdgeKind::Invisible;
            e.distance = 0.0;
            e.blocker = blocker;
        }
        self.make_active(verts, id);
    }

    /// Removes every edge (of all three kinds) incident to `v`, alerting
    /// subscribers on visibility edges so their owning connectors reroute.
    /// Returns the set of connectors that must be marked for reroute.
    pub fn remove_all_incident(&mut self, verts: &mut VertexStore, v: VertexId) -> Vec<ConnectorId> {
        let mut alerted = Vec::new();
        let edges: Vec<EdgeId> = verts
            .get(v)
            .map(|vinf| {
                vinf.vis_edges
                    .iter()
                    .chain(vinf.orthog_edges.iter())
                    .chain(vinf.invis_edges.iter())
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        for id in edges {
            if let Some(e) = self.arena.get(id) {
                if e.is_visible() {
                    alerted.extend(e.subscribers.iter().copied());
                }
            }
            self.delete_edge(verts, id);
        }
        alerted
    }

    /// `check_visibility` (spec.md §4.4): determine whether the straight
    /// segment between `i` and `j` is unobstructed.
    ///
    /// `shape_corner_edges` yields every shape-boundary edge `(k, k.sh_next)`
    /// together with the shape that owns it, so the sweep can fast-forward
    /// through the corner runs of shapes containing either endpoint.
    /// `shape_contains` tells whether a shape's polygon strictly contains a
    /// point (used for the short-circuit and skip-whole-shape rules).
    pub fn check_visibility(
        &self,
        verts: &VertexStore,
        ignore_regions: bool,
        i: VertexId,
        j: VertexId,
        shape_corner_edges: impl Iterator<Item = (crate::ids::ShapeId, VertexId, VertexId)>,
        shape_of_corner: impl Fn(VertexId) -> Option<crate::ids::ShapeId>,
        shape_contains: impl Fn(crate::ids::ShapeId, &Pt) -> bool,
    ) -> bool {
        let vi = match verts.get(i) {
            Some(v) => v,
            None => return false,
        };
        let vj = match verts.get(j) {
            Some(v) => v,
            None => return false,
        };

        // Rule 2: an endpoint that is a shape corner of a shape containing
        // the other endpoint short-circuits to invisible.
        if let Some(shape) = shape_of_corner(i) {
            if shape_contains(shape, &vj.position) {
                return false;
            }
        }
        if let Some(shape) = shape_of_corner(j) {
            if shape_contains(shape, &vi.position) {
                return false;
            }
        }

        // Rule 1: valid-region test at each endpoint that is a shape corner.
        if vi.is_shape_corner() {
            if let (Some(prev), Some(next)) = (vi.sh_prev, vi.sh_next) {
                let a0 = verts.get(prev).unwrap().position;
                let a2 = verts.get(next).unwrap().position;
                if !in_valid_region(ignore_regions, &a0, &vi.position, &a2, &vj.position) {
                    return false;
                }
            }
        }
        if vj.is_shape_corner() {
            if let (Some(prev), Some(next)) = (vj.sh_prev, vj.sh_next) {
                let a0 = verts.get(prev).unwrap().position;
                let a2 = verts.get(next).unwrap().position;
                if !in_valid_region(ignore_regions, &a0, &vj.position, &a2, &vi.position) {
                    return false;
                }
            }
        }

        // Rule 3: sweep every shape-corner edge; the first shape whose
        // boundary the segment crosses blocks it. Shapes containing either
        // endpoint are skipped wholesale.
        let mut touches_seen = 0u32;
        for (shape, k, k_next) in shape_corner_edges {
            if shape_contains(shape, &vi.position) || shape_contains(shape, &vj.position) {
                continue;
            }
            let pk = verts.get(k).unwrap().position;
            let pk_next = verts.get(k_next).unwrap().position;
            if segment_shape_intersect(&vi.position, &vj.position, &pk, &pk_next, &mut touches_seen) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ids::ShapeId;
    use crate::vertex::{EndpointWhich, VertexKind};

    fn mk_connector_vertex(store: &mut VertexStore, x: f64, y: f64) -> VertexId {
        let conn = slotmap::KeyData::from_ffi(7).into();
        store.add_vertex(VertexKind::Endpoint { connector: conn, which: EndpointWhich::Source }, crate::geometry::Pt::new(x, y))
    }

    #[test]
    fn set_distance_then_add_blocker_round_trip() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let a = mk_connector_vertex(&mut verts, 0.0, 0.0);
        let b = mk_connector_vertex(&mut verts, 10.0, 0.0);
        let id = edges.get_or_create(&verts, a, b);
        edges.set_distance(&mut verts, id, 10.0);
        assert!(edges.vis_graph().contains(&id));
        assert_eq!(edges.get(id).unwrap().distance, 10.0);

        let shape: ShapeId = slotmap::KeyData::from_ffi(3).into();
        edges.add_blocker(&mut verts, id, Blocker::Shape(shape));
        assert!(!edges.vis_graph().contains(&id));
        assert!(edges.invis_graph().contains(&id));
        assert_eq!(edges.get(id).unwrap().blocker, Blocker::Shape(shape));
    }

    #[test]
    fn set_orthogonal_registers_in_orthog_graph_only() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let a = mk_connector_vertex(&mut verts, 0.0, 0.0);
        let b = mk_connector_vertex(&mut verts, 0.0, 10.0);
        let id = edges.get_or_create(&verts, a, b);
        edges.set_orthogonal(&mut verts, id, 10.0);
        assert!(edges.orthog_graph().contains(&id));
        assert!(!edges.vis_graph().contains(&id));
        assert!(verts.get(a).unwrap().orthog_edges.contains(&id));
    }

    #[test]
    fn remove_all_incident_alerts_subscribers_of_visible_edges() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let a = mk_connector_vertex(&mut verts, 0.0, 0.0);
        let b = mk_connector_vertex(&mut verts, 10.0, 0.0);
        let id = edges.get_or_create(&verts, a, b);
        edges.set_distance(&mut verts, id, 10.0);
        let conn: ConnectorId = slotmap::KeyData::from_ffi(42).into();
        edges.get_mut(id).unwrap().subscribe(conn);

        let alerted = edges.remove_all_incident(&mut verts, a);
        assert_eq!(alerted, vec![conn]);
        assert!(edges.get(id).is_none());
        assert!(verts.get(b).unwrap().vis_edges.is_empty());
    }

    #[test]
    fn find_edge_is_kind_agnostic() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let a = mk_connector_vertex(&mut verts, 0.0, 0.0);
        let b = mk_connector_vertex(&mut verts, 10.0, 0.0);
        let id = edges.get_or_create(&verts, a, b);
        edges.add_blocker(&mut verts, id, Blocker::CycleBlocker);
        assert_eq!(edges.find_edge(&verts, a, b), Some(id));
        assert_eq!(edges.find_edge(&verts, b, a), Some(id));
    }
}
