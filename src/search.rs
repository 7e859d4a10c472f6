//! Path search (C9): Dijkstra and A* over the router's vertex/edge arenas,
//! sharing one cost function (spec.md §4.9).
//!
//! Grounded on `examples/WFBFA-SNOMOR/Real_case/Paths/src/graph.rs`'s
//! `Graph::pathfind` (heap-optimized Dijkstra via `priority-queue`,
//! predecessor-edge reconstruction by walking a `dp` map backwards),
//! generalized from a generic `Graph<NId,N,E>` to vertex/edge arenas that
//! carry router-specific bookkeeping, plus an A* variant grounded on
//! `examples/other_examples/1db2213c_NREL-routee-compass__.../a_star.rs.rs`.

use std::collections::HashMap;

use noisy_float::prelude::{n64, N64};
use priority_queue::PriorityQueue;

use crate::config::PenaltyConfig;
use crate::edge::EdgeStore;
use crate::geometry::{segment_intersect, Pt};
use crate::ids::{EdgeId, VertexId};
use crate::vertex::VertexStore;

const BEND_EPSILON: f64 = 1e-9;

/// Everything the cost function needs beyond the edge's own distance:
/// penalty weights, the clusters in play, and (only during the
/// crossing-penalty rerouting stage) the other connectors' already-settled
/// routes plus which vertex pairs form a fixed (already-orthogonal) shared
/// sub-segment that cannot be nudged apart.
pub struct CostContext<'a> {
    pub penalties: &'a PenaltyConfig,
    pub cluster_polygons: &'a [&'a [Pt]],
    pub other_routes: &'a [&'a [Pt]],
    pub in_crossing_penalty_stage: bool,
    pub fixed_shared_segments: Option<&'a std::collections::HashSet<(VertexId, VertexId)>>,
}

impl<'a> CostContext<'a> {
    pub fn bare(penalties: &'a PenaltyConfig) -> Self {
        CostContext {
            penalties,
            cluster_polygons: &[],
            other_routes: &[],
            in_crossing_penalty_stage: false,
            fixed_shared_segments: None,
        }
    }
}

fn bend_angle(prev: &Pt, cur: &Pt, next: &Pt) -> f64 {
    let d1x = cur.x - prev.x;
    let d1y = cur.y - prev.y;
    let d2x = next.x - cur.x;
    let d2y = next.y - cur.y;
    let len1 = (d1x * d1x + d1y * d1y).sqrt();
    let len2 = (d2x * d2x + d2y * d2y).sqrt();
    if len1 <= f64::EPSILON || len2 <= f64::EPSILON {
        return 0.0;
    }
    let dot = (d1x * d2x + d1y * d2y) / (len1 * len2);
    dot.clamp(-1.0, 1.0).acos()
}

fn polygon_boundary_crossed(a: &Pt, b: &Pt, poly: &[Pt]) -> bool {
    (0..poly.len()).any(|i| {
        let c = &poly[i];
        let d = &poly[(i + 1) % poly.len()];
        segment_intersect(a, b, c, d)
    })
}

fn segment_crossing_count(a: &Pt, b: &Pt, route: &[Pt]) -> usize {
    route.windows(2).filter(|w| segment_intersect(a, b, &w[0], &w[1])).count()
}

/// Cost of traversing the edge from `cur` to `next`, given `cur`'s
/// predecessor on the path so far (`None` if `cur` is the path origin, in
/// which case no bend term applies — spec.md §4.9).
fn edge_cost(
    pred_of_cur: Option<&Pt>,
    cur: &Pt,
    next: &Pt,
    edge_distance: f64,
    cur_id: VertexId,
    next_id: VertexId,
    ctx: &CostContext,
) -> f64 {
    let mut cost = edge_distance;

    if let Some(prev) = pred_of_cur {
        let bend = bend_angle(prev, cur, next);
        if bend > BEND_EPSILON {
            cost += ctx.penalties.segment;
        }
        cost += ctx.penalties.angle * (10.0 * bend / std::f64::consts::PI + 1.0).ln();
    }

    if ctx.penalties.cluster_crossing != 0.0 {
        let crossed = ctx.cluster_polygons.iter().filter(|poly| polygon_boundary_crossed(cur, next, poly)).count();
        if crossed > 0 {
            cost += ctx.penalties.cluster_crossing * crossed as f64;
        }
    }

    if ctx.in_crossing_penalty_stage && ctx.penalties.crossing != 0.0 {
        let crossings: usize = ctx.other_routes.iter().map(|route| segment_crossing_count(cur, next, route)).sum();
        if crossings > 0 {
            cost += ctx.penalties.crossing * crossings as f64;
        }
    }

    if ctx.penalties.fixed_shared_path != 0.0 {
        let key = if cur_id < next_id { (cur_id, next_id) } else { (next_id, cur_id) };
        if ctx.fixed_shared_segments.map_or(false, |s| s.contains(&key)) {
            cost += ctx.penalties.fixed_shared_path;
        }
    }

    cost
}

/// The result of a successful search: the vertex path and the edges
/// traversed (same length as `vertices.len() - 1`), plus the total cost.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
    pub cost: f64,
}

struct PathState {
    dist: HashMap<VertexId, f64>,
    pred: HashMap<VertexId, (VertexId, EdgeId)>,
}

impl PathState {
    fn new() -> Self {
        PathState { dist: HashMap::new(), pred: HashMap::new() }
    }

    fn reconstruct(&self, target: VertexId) -> (Vec<VertexId>, Vec<EdgeId>) {
        let mut vertices = vec![target];
        let mut edges = Vec::new();
        let mut cur = target;
        while let Some((prev, edge)) = self.pred.get(&cur) {
            vertices.push(*prev);
            edges.push(*edge);
            cur = *prev;
        }
        vertices.reverse();
        edges.reverse();
        (vertices, edges)
    }
}

/// Incident edges of `v` eligible for this search: the visibility list
/// always, plus the invisibility list too when `use_invis` is set (so a
/// zero-weight "rubber band" re-use of a previously-discovered edge is
/// possible), per spec.md §4.9.
fn neighbours(verts: &VertexStore, v: VertexId, use_invis: bool, orthogonal: bool) -> Vec<EdgeId> {
    let vinf = match verts.get(v) {
        Some(v) => v,
        None => return Vec::new(),
    };
    if orthogonal {
        return vinf.orthog_edges.iter().copied().collect();
    }
    let mut out: Vec<EdgeId> = vinf.vis_edges.iter().copied().collect();
    if use_invis {
        out.extend(vinf.invis_edges.iter().copied());
    }
    out
}

/// Dijkstra's algorithm (spec.md §4.9): all distances start at `+infinity`;
/// relax across the visibility list (and, if `use_invis`, the invisibility
/// list, to permit zero-weight rubber-band reuse).
pub fn dijkstra(
    verts: &VertexStore,
    edges: &EdgeStore,
    source: VertexId,
    target: VertexId,
    use_invis: bool,
    orthogonal: bool,
    ctx: &CostContext,
) -> Option<SearchResult> {
    let mut state = PathState::new();
    state.dist.insert(source, 0.0);
    let mut open: PriorityQueue<VertexId, N64> = PriorityQueue::new();
    open.push(source, n64(0.0));

    while let Some((u, _)) = open.pop() {
        if u == target {
            let (vertices, edge_path) = state.reconstruct(target);
            return Some(SearchResult { vertices, edges: edge_path, cost: state.dist[&target] });
        }
        let du = state.dist[&u];
        let pred_pt = state.pred.get(&u).map(|(p, _)| verts.get(*p).unwrap().position);
        let u_pt = verts.get(u).unwrap().position;
        for e_id in neighbours(verts, u, use_invis, orthogonal) {
            let einf = match edges.get(e_id) {
                Some(e) => e,
                None => continue,
            };
            let w = einf.other(u);
            let w_pt = verts.get(w).unwrap().position;
            let step = edge_cost(pred_pt.as_ref(), &u_pt, &w_pt, einf.distance, u, w, ctx);
            let nd = du + step;
            if state.dist.get(&w).map_or(true, |&d| nd < d) {
                state.dist.insert(w, nd);
                state.pred.insert(w, (u, e_id));
                open.push(w, n64(-nd));
            }
        }
    }
    None
}

/// A* search (spec.md §4.9): admissible Euclidean-distance heuristic, so
/// the first pop of the target is optimal.
pub fn a_star(
    verts: &VertexStore,
    edges: &EdgeStore,
    source: VertexId,
    target: VertexId,
    use_invis: bool,
    orthogonal: bool,
    ctx: &CostContext,
) -> Option<SearchResult> {
    let target_pt = verts.get(target)?.position;
    let h = |v: VertexId| verts.get(v).map_or(0.0, |vi| vi.position.distance(&target_pt));

    let mut state = PathState::new();
    state.dist.insert(source, 0.0);
    let mut done: std::collections::HashSet<VertexId> = std::collections::HashSet::new();
    let mut open: PriorityQueue<VertexId, N64> = PriorityQueue::new();
    open.push(source, n64(-h(source)));

    while let Some((u, _)) = open.pop() {
        if u == target {
            let (vertices, edge_path) = state.reconstruct(target);
            return Some(SearchResult { vertices, edges: edge_path, cost: state.dist[&target] });
        }
        if !done.insert(u) {
            continue;
        }
        let du = state.dist[&u];
        let pred_pt = state.pred.get(&u).map(|(p, _)| verts.get(*p).unwrap().position);
        let u_pt = verts.get(u).unwrap().position;
        for e_id in neighbours(verts, u, use_invis, orthogonal) {
            let einf = match edges.get(e_id) {
                Some(e) => e,
                None => continue,
            };
            let w = einf.other(u);
            if done.contains(&w) {
                continue;
            }
            let w_pt = verts.get(w).unwrap().position;
            let step = edge_cost(pred_pt.as_ref(), &u_pt, &w_pt, einf.distance, u, w, ctx);
            let nd = du + step;
            if state.dist.get(&w).map_or(true, |&d| nd < d) {
                state.dist.insert(w, nd);
                state.pred.insert(w, (u, e_id));
                open.push(w, n64(-(nd + h(w))));
            }
        }
    }
    None
}

/// Marks every edge on `result`'s path with `connector` as a subscriber, so
/// a subsequent visibility change on any of them invalidates this
/// connector's route (spec.md §4.6/§4.9).
pub fn subscribe_path(edges: &mut EdgeStore, result: &SearchResult, connector: crate::ids::ConnectorId) {
    for &e in &result.edges {
        if let Some(einf) = edges.get_mut(e) {
            einf.subscribe(connector);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vertex::{EndpointWhich, VertexKind};

    fn conn_id(v: u64) -> crate::ids::ConnectorId {
        slotmap::KeyData::from_ffi(v).into()
    }

    fn mk_endpoint(store: &mut VertexStore, x: f64, y: f64) -> VertexId {
        store.add_vertex(VertexKind::Endpoint { connector: conn_id(1), which: EndpointWhich::Source }, Pt::new(x, y))
    }

    #[test]
    fn dijkstra_finds_direct_edge() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let a = mk_endpoint(&mut verts, 0.0, 0.0);
        let b = mk_endpoint(&mut verts, 100.0, 0.0);
        let id = edges.get_or_create(&verts, a, b);
        edges.set_distance(&mut verts, id, 100.0);

        let penalties = PenaltyConfig::default();
        let ctx = CostContext::bare(&penalties);
        let result = dijkstra(&verts, &edges, a, b, false, false, &ctx).unwrap();
        assert_eq!(result.vertices, vec![a, b]);
        assert!((result.cost - 100.0).abs() < 1e-9);
    }

    #[test]
    fn dijkstra_prefers_shorter_of_two_routes() {
        let mut verts = VertexStore::new();
        let mut edges = EdgeStore::new();
        let a = mk_endpoint(&mut verts, 0.0, 0.0);
        let b = mk_endpoint(&mut verts, 100.0, 0.0);
        let via_short = mk_endpoint(&mut verts, 50.0, 1.0);
        let via_long = mk_endpoint(&mut verts, 50.0, 100.0);

        let e1 = edges.get_or_create(&verts, a, via_short);
        edges.set_distance(&mut verts, e1, a_pt(&verts, a).distance(&a_pt(&verts, via_short)));
        let e2 = edges.get_or_create(&verts, via_short, b);
        edges.set_distance(&mut verts, e2, a_pt(&verts, via_short).distance(&a_pt(&verts, b)));
        let e3 = edges.get_or_create(&verts, a, via_long);
        edges.set_distance(&mut verts, e3, a_pt(&verts, a).distance(&a_pt(&verts, via_long)));
        let e4 = edges.get_or_create(&verts, via_long, b);
        edges.set_distance(&mut verts, e4, a_pt(&verts, via_long).distance(&a_pt(&verts, b)));

        let penalties = PenaltyConfig::default();
        let ctx = CostContext::bare(&penalties);
        let result = dijkstra(&verts, &edges, a, b, false, false, &ctx).unwrap();
        assert_eq!(result.vertices, vec![a, via_short, b]);

        let a_star_result = a_star(&verts, &edges, a, b, false, false, &ctx).unwrap();
        assert_eq!(a_star_result.vertices, vec![a, via_short, b]);
        assert!((a_star_result.cost - result.cost).abs() < 1e-6);
    }

    fn a_pt(verts: &VertexStore, id: VertexId) -> Pt {
        verts.get(id).unwrap().position
    }

    #[test]
    fn no_path_returns_none() {
        let mut verts = VertexStore::new();
        let edges = EdgeStore::new();
        let a = mk_endpoint(&mut verts, 0.0, 0.0);
        let b = mk_endpoint(&mut verts, 1.0, 0.0);
        let penalties = PenaltyConfig::default();
        let ctx = CostContext::bare(&penalties);
        assert!(dijkstra(&verts, &edges, a, b, false, false, &ctx).is_none());
    }
}
