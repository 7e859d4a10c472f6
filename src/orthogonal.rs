//! Orthogonal visibility construction (C8, spec.md §4.8) — the most
//! involved module in the router: a two-pass sweep that produces the graph
//! `search.rs`'s Dijkstra/A* walks for orthogonal routes.
//!
//! A vertical sweep (ordered by y) discovers, at every shape top/bottom and
//! every candidate's own y, the maximal horizontal span reachable before
//! some other shape blocks it; a horizontal sweep (ordered by x) does the
//! symmetric thing for vertical spans. Each span is a [`Segment`]: every
//! known vertex lying on it (a shape corner, a connector endpoint, or a
//! dummy created where two spans cross) is a breakpoint, and an orthogonal
//! edge joins each consecutive pair of breakpoints — not just the querying
//! vertex to the single nearest thing it meets, which is what left the
//! earlier version of this module disconnected for anything but the most
//! trivial scenes (spec.md §8 S3: a connector routed straight across a
//! single obstacle needs the two endpoints' dead-end rays and the
//! obstacle's own corners joined into one component, not three separate
//! ones).
//!
//! Shape corners never drive a sweep themselves — per spec.md §4.8 they are
//! "inert; they provide blocking edges only" — they appear as segment
//! anchors (a shape's own top/bottom/left/right edge) and as breakpoints on
//! other candidates' spans, never as ray-casting origins. Only connector
//! endpoints are passed in as `candidates`.
//!
//! Dummy vertices are deduplicated through a single position-keyed map kept
//! for the whole build: a ray landing where an earlier ray (or sweep
//! crossing) already placed a dummy reuses that vertex instead of creating
//! a near-coincident twin.
//!
//! Grounded on `examples/WFBFA-SNOMOR/Paths/src/graph.rs` for the
//! edge/incident-list wiring reused from `EdgeStore`, and on
//! `examples/other_examples/fd57a46e_nical-lyon__src-vodk-geom-monotone.rs.rs`
//! for the sweep-event-ordering idiom this module's two-axis split follows.

use std::collections::BTreeMap;

use crate::edge::EdgeStore;
use crate::geometry::{Pt, COORD_TOLERANCE};
use crate::shape::{ShapeMap, ShapeRef};
use crate::vertex::{ConnDirFlags, VertexKind, VertexStore};
use crate::ids::VertexId;

/// Which kind of maximal span a sweep is producing: `Vertical` sweeps
/// through y and produces horizontal spans (fixed y, varying x);
/// `Horizontal` sweeps through x and produces vertical spans (fixed x,
/// varying y). Named after the sweep's own direction of travel, matching
/// spec.md §4.8's "vertical sweep produces horizontal candidate segments".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    fn fixed_coord(self, p: &Pt) -> f64 {
        match self {
            Axis::Vertical => p.y,
            Axis::Horizontal => p.x,
        }
    }

    fn moving_coord(self, p: &Pt) -> f64 {
        match self {
            Axis::Vertical => p.x,
            Axis::Horizontal => p.y,
        }
    }

    fn make_point(self, fixed: f64, moving: f64) -> Pt {
        match self {
            Axis::Vertical => Pt::new(moving, fixed),
            Axis::Horizontal => Pt::new(fixed, moving),
        }
    }

    /// `(forward flag, backward flag)` for this axis's `ConnDirFlags`.
    fn direction_flags(self) -> (ConnDirFlags, ConnDirFlags) {
        match self {
            Axis::Vertical => (ConnDirFlags::RIGHT, ConnDirFlags::LEFT),
            Axis::Horizontal => (ConnDirFlags::UP, ConnDirFlags::DOWN),
        }
    }
}

/// A maximal candidate span discovered by one sweep pass.
#[derive(Debug, Clone, Copy)]
struct Segment {
    axis: Axis,
    fixed: f64,
    lo: f64,
    hi: f64,
}

impl Segment {
    fn point_at(&self, moving: f64) -> Pt {
        self.axis.make_point(self.fixed, moving)
    }

    fn contains_moving(&self, moving: f64) -> bool {
        moving >= self.lo - COORD_TOLERANCE && moving <= self.hi + COORD_TOLERANCE
    }
}

/// The scene's bounding extent plus a margin, used as the "nothing blocks
/// this ray" limit: far enough beyond every real shape and candidate that a
/// span reaching it is provably open-ended.
struct SceneBounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl SceneBounds {
    fn compute(verts: &VertexStore, shapes: &ShapeMap, candidates: &[VertexId]) -> Self {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut see = |p: Pt| {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        };
        for &v in candidates {
            if let Some(vi) = verts.get(v) {
                see(vi.position);
            }
        }
        for shape in shapes.values().filter(|s| s.active) {
            for &c in &shape.corners {
                if let Some(vi) = verts.get(c) {
                    see(vi.position);
                }
            }
        }
        if !min_x.is_finite() {
            return SceneBounds { min_x: -1.0, max_x: 1.0, min_y: -1.0, max_y: 1.0 };
        }
        let margin = (max_x - min_x).max(max_y - min_y).max(1.0) + 10.0;
        SceneBounds { min_x: min_x - margin, max_x: max_x + margin, min_y: min_y - margin, max_y: max_y + margin }
    }

    fn open_limit(&self, axis: Axis, forward: bool) -> f64 {
        match (axis, forward) {
            (Axis::Vertical, true) => self.max_x,
            (Axis::Vertical, false) => self.min_x,
            (Axis::Horizontal, true) => self.max_y,
            (Axis::Horizontal, false) => self.min_y,
        }
    }
}

/// Intersects the axis-aligned ray from `origin` (fixed on the
/// perpendicular coordinate, moving along `axis` in the `forward`
/// direction) with segment `a`-`b`; returns the hit point and its distance
/// from `origin` along the ray, if any.
fn ray_segment_hit(origin: Pt, axis: Axis, forward: bool, a: &Pt, b: &Pt) -> Option<(Pt, f64)> {
    let (fixed_a, fixed_b, moving_a, moving_b, fixed_origin) = match axis {
        Axis::Vertical => (a.y, b.y, a.x, b.x, origin.y),
        Axis::Horizontal => (a.x, b.x, a.y, b.y, origin.x),
    };
    if (fixed_a - fixed_b).abs() <= COORD_TOLERANCE {
        // Segment runs parallel to the ray; a parallel edge cannot be the
        // thing that first stops an orthogonal ray, only a perpendicular
        // (or crossing) one can, so it is skipped here.
        return None;
    }
    let t = (fixed_origin - fixed_a) / (fixed_b - fixed_a);
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let along = moving_a + t * (moving_b - moving_a);
    let origin_along = match axis {
        Axis::Vertical => origin.x,
        Axis::Horizontal => origin.y,
    };
    let delta = along - origin_along;
    let ahead = if forward { delta > COORD_TOLERANCE } else { delta < -COORD_TOLERANCE };
    if !ahead {
        return None;
    }
    let hit = match axis {
        Axis::Vertical => Pt::new(along, fixed_origin),
        Axis::Horizontal => Pt::new(fixed_origin, along),
    };
    Some((hit, delta.abs()))
}

/// Finds the nearest point at which an axis-aligned ray from `origin`
/// (travelling `forward` along `axis`) meets any active shape's boundary.
fn nearest_shape_hit(shapes: &ShapeMap, verts: &VertexStore, origin: Pt, axis: Axis, forward: bool) -> Option<Pt> {
    let mut best: Option<(Pt, f64)> = None;
    for shape in shapes.values().filter(|s| s.active) {
        let n = shape.corners.len();
        for k in 0..n {
            let a = verts.get(shape.corners[k]).unwrap().position;
            let b = verts.get(shape.corners[(k + 1) % n]).unwrap().position;
            if let Some((hit, dist)) = ray_segment_hit(origin, axis, forward, &a, &b) {
                if best.map_or(true, |(_, bd)| dist < bd) {
                    best = Some((hit, dist));
                }
            }
        }
    }
    best.map(|(p, _)| p)
}

/// Extends a ray from `origin` to its blocking limit, registering (or
/// reusing) a dummy vertex there when the limit is a shape boundary rather
/// than the open scene bound; returns the limit's moving coordinate.
fn extend_and_register(
    shapes: &ShapeMap,
    verts: &mut VertexStore,
    vertex_at: &mut BTreeMap<Pt, VertexId>,
    bounds: &SceneBounds,
    origin: Pt,
    axis: Axis,
    forward: bool,
) -> f64 {
    match nearest_shape_hit(shapes, verts, origin, axis, forward) {
        Some(hit) => {
            if !vertex_at.contains_key(&hit) {
                let dummy = verts.add_vertex(VertexKind::DummyOrthogonal, hit);
                vertex_at.insert(hit, dummy);
            }
            axis.moving_coord(&hit)
        }
        None => bounds.open_limit(axis, forward),
    }
}

/// The shape corners achieving the extreme (min if `!want_max`, max if
/// `want_max`) coordinate along `axis`'s fixed direction — for a vertical
/// sweep this is a shape's bottom-most/top-most corners, for a horizontal
/// sweep its left-most/right-most ones.
fn extreme_corners(shape: &ShapeRef, verts: &VertexStore, axis: Axis, want_max: bool) -> Vec<VertexId> {
    let mut best: Option<f64> = None;
    let mut out = Vec::new();
    for &c in &shape.corners {
        let p = match verts.get(c) {
            Some(vi) => vi.position,
            None => continue,
        };
        let coord = axis.fixed_coord(&p);
        match best {
            None => {
                best = Some(coord);
                out = vec![c];
            }
            Some(b) => {
                let better = if want_max { coord > b + COORD_TOLERANCE } else { coord < b - COORD_TOLERANCE };
                let tie = (coord - b).abs() <= COORD_TOLERANCE;
                if better {
                    best = Some(coord);
                    out = vec![c];
                } else if tie {
                    out.push(c);
                }
            }
        }
    }
    out
}

/// Builds every maximal candidate span for one sweep pass: the shape-driven
/// spans (an obstacle's own extreme edge plus its unobstructed external
/// extensions on either side) and the connector-driven spans (each
/// endpoint's permitted directions, per its `dir_flags`).
fn build_segments(
    verts: &mut VertexStore,
    shapes: &ShapeMap,
    vertex_at: &mut BTreeMap<Pt, VertexId>,
    bounds: &SceneBounds,
    axis: Axis,
    candidates: &[VertexId],
) -> Vec<Segment> {
    let mut segments = Vec::new();

    for shape in shapes.values().filter(|s| s.active) {
        for want_max in [false, true] {
            let corners = extreme_corners(shape, verts, axis, want_max);
            if corners.is_empty() {
                continue;
            }
            let fixed = axis.fixed_coord(&verts.get(corners[0]).unwrap().position);

            let mut lo_m = f64::INFINITY;
            let mut hi_m = f64::NEG_INFINITY;
            let mut lo_pt = verts.get(corners[0]).unwrap().position;
            let mut hi_pt = lo_pt;
            for &c in &corners {
                let p = verts.get(c).unwrap().position;
                let m = axis.moving_coord(&p);
                if m < lo_m {
                    lo_m = m;
                    lo_pt = p;
                }
                if m > hi_m {
                    hi_m = m;
                    hi_pt = p;
                }
            }

            if hi_m - lo_m > COORD_TOLERANCE {
                segments.push(Segment { axis, fixed, lo: lo_m, hi: hi_m });
            }
            let left_limit = extend_and_register(shapes, verts, vertex_at, bounds, lo_pt, axis, false);
            if lo_m - left_limit > COORD_TOLERANCE {
                segments.push(Segment { axis, fixed, lo: left_limit, hi: lo_m });
            }
            let right_limit = extend_and_register(shapes, verts, vertex_at, bounds, hi_pt, axis, true);
            if right_limit - hi_m > COORD_TOLERANCE {
                segments.push(Segment { axis, fixed, lo: hi_m, hi: right_limit });
            }
        }
    }

    // Connector-endpoint-driven spans: shape corners never reach here (they
    // are not in `candidates`) — they only ever participate as the
    // shape-driven spans above or as breakpoints discovered on someone
    // else's span (spec.md §4.8: shape corners are inert).
    let (fwd_flag, bwd_flag) = axis.direction_flags();
    for &v in candidates {
        let (pos, dirs) = match verts.get(v) {
            Some(vi) => (vi.position, vi.dir_flags),
            None => continue,
        };
        let fixed = axis.fixed_coord(&pos);
        let m = axis.moving_coord(&pos);
        if dirs.contains(fwd_flag) {
            let limit = extend_and_register(shapes, verts, vertex_at, bounds, pos, axis, true);
            if limit - m > COORD_TOLERANCE {
                segments.push(Segment { axis, fixed, lo: m, hi: limit });
            }
        }
        if dirs.contains(bwd_flag) {
            let limit = extend_and_register(shapes, verts, vertex_at, bounds, pos, axis, false);
            if m - limit > COORD_TOLERANCE {
                segments.push(Segment { axis, fixed, lo: limit, hi: m });
            }
        }
    }

    segments
}

/// Two connector endpoints both sitting strictly inside some active shape
/// never get a direct edge between them (spec.md §4.8): each instead only
/// ever reaches as far as its own enclosing shape's boundary, which is
/// exactly the breakpoint expected to sit on the other side of either one.
fn both_interior_endpoints(verts: &VertexStore, shapes: &ShapeMap, a: VertexId, b: VertexId) -> bool {
    let is_interior_endpoint = |v: VertexId| -> bool {
        let vi = match verts.get(v) {
            Some(vi) => vi,
            None => return false,
        };
        if !matches!(vi.kind, VertexKind::Endpoint { .. }) {
            return false;
        }
        shapes.values().any(|s| s.active && s.contains(&vi.position))
    };
    is_interior_endpoint(a) && is_interior_endpoint(b)
}

/// Converts one segment's breakpoints (every known vertex lying on its
/// span) into orthogonal edges between each consecutive pair.
fn emit_segment_edges(verts: &mut VertexStore, edges: &mut EdgeStore, shapes: &ShapeMap, vertex_at: &BTreeMap<Pt, VertexId>, seg: &Segment) {
    let mut breakpoints: Vec<(f64, VertexId)> = vertex_at
        .iter()
        .filter(|(p, _)| (seg.axis.fixed_coord(p) - seg.fixed).abs() <= COORD_TOLERANCE && seg.contains_moving(seg.axis.moving_coord(p)))
        .map(|(p, &id)| (seg.axis.moving_coord(p), id))
        .collect();
    breakpoints.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    breakpoints.dedup_by(|a, b| (a.0 - b.0).abs() <= COORD_TOLERANCE);

    for w in breakpoints.windows(2) {
        let (m1, v1) = w[0];
        let (m2, v2) = w[1];
        if m2 - m1 <= COORD_TOLERANCE {
            continue;
        }
        if both_interior_endpoints(verts, shapes, v1, v2) {
            continue;
        }
        let id = edges.get_or_create(verts, v1, v2);
        let distance = seg.point_at(m1).distance(&seg.point_at(m2));
        edges.set_orthogonal(verts, id, distance);
    }
}

/// Builds (or rebuilds) the orthogonal-visibility graph: a vertical sweep
/// over shape tops/bottoms and connector-endpoint y's produces maximal
/// horizontal spans, a horizontal sweep produces maximal vertical spans,
/// every pair of spans that cross registers a shared dummy vertex at the
/// crossing, and every span's sorted breakpoints are chained into
/// orthogonal edges (spec.md §4.8). `candidates` must be connector-endpoint
/// vertices only — shape corners take part through `shapes` directly and
/// never cast rays of their own.
pub fn build_orthogonal_visibility(verts: &mut VertexStore, edges: &mut EdgeStore, shapes: &ShapeMap, candidates: &[VertexId]) {
    let bounds = SceneBounds::compute(verts, shapes, candidates);

    let mut vertex_at: BTreeMap<Pt, VertexId> = BTreeMap::new();
    for &v in candidates {
        if let Some(vi) = verts.get(v) {
            vertex_at.insert(vi.position, v);
        }
    }
    for shape in shapes.values() {
        for &c in &shape.corners {
            if let Some(vi) = verts.get(c) {
                vertex_at.insert(vi.position, c);
            }
        }
    }

    let h_segments = build_segments(verts, shapes, &mut vertex_at, &bounds, Axis::Vertical, candidates);
    let v_segments = build_segments(verts, shapes, &mut vertex_at, &bounds, Axis::Horizontal, candidates);

    // Cross-intersection (the horizontal sweep pass of spec.md §4.8):
    // wherever a still-live vertical span crosses a horizontal one, the
    // crossing point becomes a shared breakpoint of both — creating one
    // dummy vertex there if nothing already occupies that exact point.
    for vseg in &v_segments {
        for hseg in &h_segments {
            if vseg.contains_moving(hseg.fixed) && hseg.contains_moving(vseg.fixed) {
                let pt = Pt::new(vseg.fixed, hseg.fixed);
                if !vertex_at.contains_key(&pt) {
                    let dummy = verts.add_vertex(VertexKind::DummyOrthogonal, pt);
                    vertex_at.insert(pt, dummy);
                }
            }
        }
    }

    for seg in &h_segments {
        emit_segment_edges(verts, edges, shapes, &vertex_at, seg);
    }
    for seg in &v_segments {
        emit_segment_edges(verts, edges, shapes, &vertex_at, seg);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::polygon::Polygon;
    use crate::vertex::EndpointWhich;

    fn endpoint(store: &mut VertexStore, conn: crate::ids::ConnectorId, x: f64, y: f64) -> VertexId {
        store.add_vertex(VertexKind::Endpoint { connector: conn, which: EndpointWhich::Source }, Pt::new(x, y))
    }

    fn square(shapes: &mut ShapeMap, verts: &mut VertexStore, points: Vec<Pt>) -> crate::ids::ShapeId {
        let id = shapes.insert_with_key(|id| ShapeRef::new(id, Polygon::new(points)));
        shapes.get_mut(id).unwrap().make_active(verts);
        id
    }

    #[test]
    fn open_field_connects_each_point_to_its_nearest_axis_neighbour() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let shapes = ShapeMap::default();
        let conn: crate::ids::ConnectorId = slotmap::KeyData::from_ffi(1).into();
        let a = endpoint(&mut verts, conn, 0.0, 0.0);
        let b = endpoint(&mut verts, conn, 10.0, 0.0);
        let c = endpoint(&mut verts, conn, 0.0, 10.0);
        let candidates = vec![a, b, c];
        build_orthogonal_visibility(&mut verts, &mut edges, &shapes, &candidates);

        let ab = edges.find_edge(&verts, a, b).unwrap();
        assert!(edges.get(ab).unwrap().is_orthogonal());
        let ac = edges.find_edge(&verts, a, c).unwrap();
        assert!(edges.get(ac).unwrap().is_orthogonal());
    }

    #[test]
    fn ray_stops_at_shape_edge_and_creates_a_single_dummy() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let mut shapes = ShapeMap::default();
        square(&mut shapes, &mut verts, vec![Pt::new(5.0, -5.0), Pt::new(15.0, -5.0), Pt::new(15.0, 5.0), Pt::new(5.0, 5.0)]);

        let conn: crate::ids::ConnectorId = slotmap::KeyData::from_ffi(2).into();
        let a = endpoint(&mut verts, conn, 0.0, 0.0);
        let before = verts.len();
        build_orthogonal_visibility(&mut verts, &mut edges, &shapes, &[a]);

        // A dummy vertex should have been created where the rightward ray
        // from `a` meets the shape's left edge at x=5.
        assert!(verts.len() > before);
        let dummy = verts
            .all_ids()
            .into_iter()
            .find(|&v| verts.get(v).unwrap().kind == VertexKind::DummyOrthogonal)
            .expect("a dummy vertex should have been created");
        assert_eq!(verts.get(dummy).unwrap().position, Pt::new(5.0, 0.0));
        let edge = edges.find_edge(&verts, a, dummy).unwrap();
        assert!(edges.get(edge).unwrap().is_orthogonal());
    }

    #[test]
    fn rays_landing_on_the_same_shape_edge_point_share_one_dummy() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let mut shapes = ShapeMap::default();
        square(&mut shapes, &mut verts, vec![Pt::new(5.0, -5.0), Pt::new(15.0, -5.0), Pt::new(15.0, 5.0), Pt::new(5.0, 5.0)]);

        let conn: crate::ids::ConnectorId = slotmap::KeyData::from_ffi(3).into();
        let a = endpoint(&mut verts, conn, 0.0, 0.0);
        let d = endpoint(&mut verts, conn, -10.0, 0.0);
        build_orthogonal_visibility(&mut verts, &mut edges, &shapes, &[a, d]);

        let dummies: Vec<VertexId> =
            verts.all_ids().into_iter().filter(|&v| verts.get(v).unwrap().kind == VertexKind::DummyOrthogonal).collect();
        assert_eq!(dummies.len(), 1, "both rightward rays hit (5,0) and must share one dummy vertex");
        assert_eq!(verts.get(dummies[0]).unwrap().position, Pt::new(5.0, 0.0));
    }

    #[test]
    fn single_square_obstacle_still_leaves_a_connected_orthogonal_route() {
        // spec.md §8 S3: a connector routed straight across one obstacle.
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let mut shapes = ShapeMap::default();
        square(&mut shapes, &mut verts, vec![Pt::new(40.0, -20.0), Pt::new(60.0, -20.0), Pt::new(60.0, 20.0), Pt::new(40.0, 20.0)]);

        let conn: crate::ids::ConnectorId = slotmap::KeyData::from_ffi(4).into();
        let src = endpoint(&mut verts, conn, 0.0, 0.0);
        let tar = endpoint(&mut verts, conn, 100.0, 0.0);
        build_orthogonal_visibility(&mut verts, &mut edges, &shapes, &[src, tar]);

        let penalties = crate::config::PenaltyConfig::default();
        let ctx = crate::search::CostContext::bare(&penalties);
        let result = crate::search::dijkstra(&verts, &edges, src, tar, false, true, &ctx);
        assert!(result.is_some(), "src and tar must end up in the same orthogonal-graph component");
        let path = result.unwrap().vertices;
        assert_eq!(path.first().copied(), Some(src));
        assert_eq!(path.last().copied(), Some(tar));
        for w in path.windows(2) {
            let a = verts.get(w[0]).unwrap().position;
            let b = verts.get(w[1]).unwrap().position;
            assert!(
                (a.x - b.x).abs() <= COORD_TOLERANCE || (a.y - b.y).abs() <= COORD_TOLERANCE,
                "every orthogonal hop must share an x or a y coordinate"
            );
        }
    }

    #[test]
    fn shape_corners_never_initiate_their_own_rays() {
        // With no connector candidates at all, the only spans built are the
        // shape's own four edges — no dummy should appear anywhere, since
        // nothing is out there for a corner-driven ray to find, and corners
        // themselves never cast one.
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let mut shapes = ShapeMap::default();
        square(&mut shapes, &mut verts, vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0), Pt::new(0.0, 10.0)]);

        build_orthogonal_visibility(&mut verts, &mut edges, &shapes, &[]);

        let dummies = verts.all_ids().into_iter().filter(|&v| verts.get(v).unwrap().kind == VertexKind::DummyOrthogonal).count();
        assert_eq!(dummies, 0);
    }
}
