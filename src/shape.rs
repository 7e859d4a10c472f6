//! Shape and cluster references (C5).

use crate::edge::EdgeStore;
use crate::geometry::{in_poly_general, BBox};
use crate::ids::{ConnectorId, ShapeId, VertexId};
use crate::polygon::Polygon;
use crate::vertex::{VertexKind, VertexStore};

/// The router's shape arena (spec.md §3/§9 "arena + indices").
pub type ShapeMap = slotmap::SlotMap<ShapeId, ShapeRef>;

/// A shape: a polygon with an identity, lifecycle flag, and graph-attachment
/// bookkeeping (spec.md §3/§4.5).
#[derive(Debug, Clone)]
pub struct ShapeRef {
    pub id: ShapeId,
    pub polygon: Polygon,
    pub active: bool,
    /// Corner vertex ids, in polygon order; `None` while inactive.
    pub corners: Vec<VertexId>,
}

impl ShapeRef {
    pub fn new(id: ShapeId, polygon: Polygon) -> Self {
        ShapeRef { id, polygon, active: false, corners: Vec::new() }
    }

    pub fn bbox(&self) -> Option<BBox> {
        self.polygon.bounding_rect()
    }

    pub fn contains(&self, p: &crate::geometry::Pt) -> bool {
        in_poly_general(&self.polygon.points, p)
    }

    /// Registers this shape's corner vertices in the vertex sequence, wired
    /// with `sh_prev`/`sh_next` around the boundary.
    pub fn make_active(&mut self, verts: &mut VertexStore) {
        if self.active {
            return;
        }
        let n = self.polygon.points.len();
        debug_assert!(n >= 3, "a shape polygon must have at least 3 corners");
        self.corners.clear();
        for (i, p) in self.polygon.points.iter().enumerate() {
            let id = verts.add_vertex(VertexKind::ShapeCorner { shape: self.id, corner_index: i }, *p);
            self.corners.push(id);
        }
        for i in 0..n {
            let prev = self.corners[(i + n - 1) % n];
            let next = self.corners[(i + 1) % n];
            let vinf = verts.get_mut(self.corners[i]).unwrap();
            vinf.sh_prev = Some(prev);
            vinf.sh_next = Some(next);
        }
        self.active = true;
    }

    /// Removes this shape's corner vertices from the vertex sequence
    /// (their incident edges must already have been removed via
    /// [`Self::remove_from_graph`]).
    pub fn make_inactive(&mut self, verts: &mut VertexStore) {
        if !self.active {
            return;
        }
        for &c in &self.corners {
            verts.remove_vertex(c);
        }
        self.corners.clear();
        self.active = false;
    }

    /// Destroys every incident visibility/orthogonal/invisibility edge at
    /// each corner, returning the connectors that must be marked to
    /// reroute (subscribers of the destroyed *visible* edges).
    pub fn remove_from_graph(&self, verts: &mut VertexStore, edges: &mut EdgeStore) -> Vec<ConnectorId> {
        let mut alerted = Vec::new();
        for &c in &self.corners {
            alerted.extend(edges.remove_all_incident(verts, c));
        }
        alerted
    }

    /// Requires the new polygon to have the same vertex count as the
    /// current one; resets each corner vertex's position in place,
    /// preserving vertex identity (spec.md §4.5).
    pub fn set_new_polygon(&mut self, verts: &mut VertexStore, polygon: Polygon) {
        assert_eq!(
            polygon.points.len(),
            self.polygon.points.len(),
            "set_new_polygon requires the same vertex count as the original shape"
        );
        for (corner, p) in self.corners.iter().zip(polygon.points.iter()) {
            verts.get_mut(*corner).unwrap().position = *p;
        }
        self.polygon = polygon;
    }
}

/// The router's cluster arena, alongside [`ShapeMap`].
pub type ClusterMap = slotmap::SlotMap<crate::ids::ClusterId, ClusterRef>;

/// A named polygon used only as a region for enclosing-cluster membership
/// and crossing penalties; contributes no vertices or edges to the graph
/// (spec.md §3).
#[derive(Debug, Clone)]
pub struct ClusterRef {
    pub id: crate::ids::ClusterId,
    pub name: String,
    pub polygon: Polygon,
}

impl ClusterRef {
    pub fn new(id: crate::ids::ClusterId, name: impl Into<String>, polygon: Polygon) -> Self {
        ClusterRef { id, name: name.into(), polygon }
    }

    pub fn contains(&self, p: &crate::geometry::Pt) -> bool {
        in_poly_general(&self.polygon.points, p)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Pt;

    fn square(id: ShapeId) -> ShapeRef {
        ShapeRef::new(
            id,
            Polygon::new(vec![Pt::new(40.0, -20.0), Pt::new(60.0, -20.0), Pt::new(60.0, 20.0), Pt::new(40.0, 20.0)]),
        )
    }

    #[test]
    fn make_active_wires_shape_neighbours() {
        let mut verts = VertexStore::new();
        let id: ShapeId = slotmap::KeyData::from_ffi(1).into();
        let mut shape = square(id);
        shape.make_active(&mut verts);
        assert_eq!(shape.corners.len(), 4);
        for i in 0..4 {
            let vinf = verts.get(shape.corners[i]).unwrap();
            assert_eq!(vinf.sh_next, Some(shape.corners[(i + 1) % 4]));
            assert_eq!(vinf.sh_prev, Some(shape.corners[(i + 3) % 4]));
        }
    }

    #[test]
    fn set_new_polygon_preserves_vertex_identity() {
        let mut verts = VertexStore::new();
        let id: ShapeId = slotmap::KeyData::from_ffi(1).into();
        let mut shape = square(id);
        shape.make_active(&mut verts);
        let original_corner_ids = shape.corners.clone();
        shape.set_new_polygon(
            &mut verts,
            Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0), Pt::new(0.0, 10.0)]),
        );
        assert_eq!(shape.corners, original_corner_ids);
        assert_eq!(verts.get(shape.corners[0]).unwrap().position, Pt::new(0.0, 0.0));
    }

    #[test]
    #[should_panic]
    fn set_new_polygon_rejects_vertex_count_mismatch() {
        let mut verts = VertexStore::new();
        let id: ShapeId = slotmap::KeyData::from_ffi(1).into();
        let mut shape = square(id);
        shape.make_active(&mut verts);
        shape.set_new_polygon(&mut verts, Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(1.0, 1.0)]));
    }

    #[test]
    fn contains_uses_general_point_in_polygon() {
        let id: ShapeId = slotmap::KeyData::from_ffi(1).into();
        let shape = square(id);
        assert!(shape.contains(&Pt::new(50.0, 0.0)));
        assert!(!shape.contains(&Pt::new(0.0, 0.0)));
    }
}
