//! Router / transaction engine (C11, spec.md §4.11) — owns every other
//! subsystem, accumulates host-visible mutations into an action queue, and
//! sequences the five-phase `process_transaction` (Detach → Blocked-edges →
//! Reattach → Endpoints → Reroute).
//!
//! Grounded on spec.md §4.11 directly; the owning-arena-of-everything shape
//! mirrors `examples/WFBFA-SNOMOR/Paths/src/plow.rs`'s `PlowSolver`, which
//! owns a `GraphAdapter` that in turn owns the `Graph` — one top-level owner,
//! everything else borrows. A handful of phase sub-steps are implemented as
//! documented simplifications of the literal source algorithm, called out
//! where they occur: a full rebuild in place of a "recompute only the
//! missing edges" pass, a perpendicular-foot projection in place of the
//! rotate-then-project selective-reroute heuristic, and a bounded
//! shared-run nudge in place of full orthogonal centring.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;

use crate::config::{PenaltyConfig, RouterOptions, RoutingType, Timers};
use crate::connector::{ConnEnd, ConnRef, ConnType, ConnectorMap, EndSelector};
use crate::crossing::{self, CrossingFlags};
use crate::error::{Result, RouterError};
use crate::geometry::{in_poly_general, segment_shape_intersect, Blocker, Pt};
use crate::ids::{ClusterId, ConnectorId, EdgeId, ShapeId, VertexId};
use crate::orthogonal;
use crate::polygon::Polygon;
use crate::search::{self, CostContext};
use crate::shape::{ClusterMap, ClusterRef, ShapeMap, ShapeRef};
use crate::vertex::{EndpointWhich, VertexKind, VertexStore};
use crate::visibility;

/// One entry of the host-visible action queue (spec.md §4.11). Ordering for
/// a committed transaction: `ShapeAdd`, then `ShapeMove`, then
/// `ShapeRemove`, then `ConnChange`.
#[derive(Debug, Clone)]
enum Action {
    ShapeAdd { shape: ShapeId },
    ShapeMove { shape: ShapeId, polygon: Polygon, first_move: bool },
    ShapeRemove { shape: ShapeId },
    ConnChange { connector: ConnectorId, updates: Vec<(EndSelector, ConnEnd)> },
}

fn action_rank(action: &Action) -> u8 {
    match action {
        Action::ShapeAdd { .. } => 0,
        Action::ShapeMove { .. } => 1,
        Action::ShapeRemove { .. } => 2,
        Action::ConnChange { .. } => 3,
    }
}

/// Owns every router subsystem: the vertex/edge arenas, shapes, clusters,
/// connectors, configuration, and the pending action queue (spec.md §3
/// "Router state").
pub struct Router {
    pub verts: VertexStore,
    pub edges: crate::edge::EdgeStore,
    pub shapes: ShapeMap,
    pub clusters: ClusterMap,
    pub connectors: ConnectorMap,
    pub options: RouterOptions,
    pub penalties: PenaltyConfig,
    pub timers: Timers,

    containing_shapes: IndexMap<VertexId, indexmap::IndexSet<ShapeId>>,
    containing_clusters: IndexMap<VertexId, indexmap::IndexSet<ClusterId>>,

    actions: Vec<Action>,
    consolidate_actions: bool,
    next_id: u64,
    /// Dummy vertices created by the last orthogonal rebuild, torn down
    /// before the next one (spec.md §4.8's "built from scratch on demand").
    orthogonal_dummies: Vec<VertexId>,
    /// Segments the crossing analyser should treat as fixed (already
    /// orthogonally settled) when scoring `fixed_shared_path_penalty`.
    fixed_shared_segments: HashSet<(VertexId, VertexId)>,
}

impl Router {
    /// Constructs a router; at least one of `PolyLineRouting` /
    /// `OrthogonalRouting` must be set (spec.md §6/§7).
    pub fn new(options: RouterOptions) -> Result<Self> {
        if !(options.routing_type.contains(RoutingType::POLY_LINE) || options.routing_type.contains(RoutingType::ORTHOGONAL)) {
            return Err(RouterError::NoRoutingModeSelected);
        }
        Ok(Router {
            verts: VertexStore::new(),
            edges: crate::edge::EdgeStore::new(),
            shapes: ShapeMap::default(),
            clusters: ClusterMap::default(),
            connectors: ConnectorMap::default(),
            options,
            penalties: PenaltyConfig::default(),
            timers: Timers::new(),
            containing_shapes: IndexMap::new(),
            containing_clusters: IndexMap::new(),
            actions: Vec::new(),
            consolidate_actions: true,
            next_id: 1,
            orthogonal_dummies: Vec::new(),
            fixed_shared_segments: HashSet::new(),
        })
    }

    /// `assign_id(suggested)` (spec.md §4.11): returns `suggested` if given
    /// (bumping the counter past it so later auto-assigned ids don't
    /// collide), else the next integer above the largest assigned id.
    pub fn assign_id(&mut self, suggested: Option<u64>) -> u64 {
        match suggested {
            Some(id) => {
                debug_assert!(id > 0, "suggested ids must be non-zero");
                self.next_id = self.next_id.max(id + 1);
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        }
    }

    pub fn set_transaction_mode(&mut self, consolidate: bool) {
        self.consolidate_actions = consolidate;
    }

    pub fn set_penalty(&mut self, name: &str, value: f64) {
        self.penalties.set(name, value);
    }

    pub fn set_orthogonal_nudge_distance(&mut self, d: f64) {
        self.options.set_orthogonal_nudge_distance(d);
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&ConnRef> {
        self.connectors.get(id)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&ShapeRef> {
        self.shapes.get(id)
    }

    // ---- host-visible mutations (enqueue into the action list) ----

    pub fn add_shape(&mut self, polygon: Polygon) -> ShapeId {
        let id = self.shapes.insert_with_key(|id| ShapeRef::new(id, polygon));
        self.enqueue(Action::ShapeAdd { shape: id });
        id
    }

    pub fn move_shape(&mut self, shape: ShapeId, polygon: Polygon) {
        debug_assert!(self.shapes.contains_key(shape), "move_shape: unknown shape id");
        self.enqueue(Action::ShapeMove { shape, polygon, first_move: true });
    }

    pub fn remove_shape(&mut self, shape: ShapeId) {
        self.enqueue(Action::ShapeRemove { shape });
    }

    pub fn add_cluster(&mut self, name: impl Into<String>, polygon: Polygon) -> ClusterId {
        self.clusters.insert_with_key(|id| ClusterRef::new(id, name, polygon))
    }

    pub fn remove_cluster(&mut self, cluster: ClusterId) {
        self.clusters.remove(cluster);
        for set in self.containing_clusters.values_mut() {
            set.shift_remove(&cluster);
        }
    }

    pub fn add_connector(&mut self, conn_type: ConnType, source: ConnEnd, target: ConnEnd) -> ConnectorId {
        let id = self.connectors.insert_with_key(|id| ConnRef::new(id, conn_type, source, target));
        self.enqueue(Action::ConnChange {
            connector: id,
            updates: vec![(EndSelector::Source, source), (EndSelector::Target, target)],
        });
        id
    }

    pub fn remove_connector(&mut self, connector: ConnectorId) {
        if let Some(c) = self.connectors.get(connector) {
            for v in [c.source_vertex, c.target_vertex].into_iter().flatten() {
                self.edges.remove_all_incident(&mut self.verts, v);
                self.verts.remove_vertex(v);
                self.containing_shapes.shift_remove(&v);
                self.containing_clusters.shift_remove(&v);
            }
        }
        self.connectors.remove(connector);
        self.actions.retain(|a| !matches!(a, Action::ConnChange { connector: c, .. } if *c == connector));
    }

    pub fn set_endpoint(&mut self, connector: ConnectorId, which: EndSelector, end: ConnEnd) {
        self.enqueue(Action::ConnChange { connector, updates: vec![(which, end)] });
    }

    pub fn set_routing_type(&mut self, connector: ConnectorId, t: ConnType) {
        if let Some(c) = self.connectors.get_mut(connector) {
            c.set_routing_type(t);
        }
    }

    pub fn set_hate_crossings(&mut self, connector: ConnectorId, b: bool) {
        if let Some(c) = self.connectors.get_mut(connector) {
            c.set_hate_crossings(b);
        }
    }

    pub fn set_callback(&mut self, connector: ConnectorId, cb: impl FnMut(ConnectorId) + 'static) {
        if let Some(c) = self.connectors.get_mut(connector) {
            c.set_callback(cb);
        }
    }

    /// Merges `action` into the queue per the at-most-one-per-`(type,
    /// object)` rule (spec.md §4.11), then flushes immediately if
    /// transactions aren't being consolidated.
    fn enqueue(&mut self, action: Action) {
        match &action {
            Action::ShapeAdd { shape } => {
                if !self.actions.iter().any(|a| matches!(a, Action::ShapeAdd { shape: s } if s == shape)) {
                    self.actions.push(action);
                }
            }
            Action::ShapeRemove { shape } => {
                // A queued move for a shape about to be removed is moot.
                self.actions.retain(|a| !matches!(a, Action::ShapeMove { shape: s, .. } if s == shape));
                if !self.actions.iter().any(|a| matches!(a, Action::ShapeRemove { shape: s } if s == shape)) {
                    self.actions.push(action);
                }
            }
            Action::ShapeMove { shape, .. } => {
                if let Some(existing) = self.actions.iter_mut().find(|a| matches!(a, Action::ShapeMove { shape: s, .. } if s == shape)) {
                    // Move-then-move keeps the earliest `first_move` flag and
                    // adopts the most recent polygon.
                    if let (Action::ShapeMove { polygon: new_poly, .. }, Action::ShapeMove { polygon: existing_poly, .. }) =
                        (&action, existing)
                    {
                        *existing_poly = new_poly.clone();
                    }
                } else {
                    self.actions.push(action);
                }
            }
            Action::ConnChange { connector, updates } => {
                if let Some(existing) = self.actions.iter_mut().find(|a| matches!(a, Action::ConnChange { connector: c, .. } if c == connector))
                {
                    if let Action::ConnChange { updates: existing_updates, .. } = existing {
                        for (which, end) in updates {
                            match existing_updates.iter_mut().find(|(w, _)| w == which) {
                                Some(slot) => slot.1 = *end,
                                None => existing_updates.push((*which, *end)),
                            }
                        }
                    }
                } else {
                    self.actions.push(action);
                }
            }
        }
        if !self.consolidate_actions {
            self.process_transaction();
        }
    }

    /// Runs the five phases in order (spec.md §4.11): Detach →
    /// Blocked-edges → Reattach → Endpoints → Reroute.
    pub fn process_transaction(&mut self) {
        if self.actions.is_empty() {
            // Nothing queued: every route is already settled, so this is a
            // no-op rather than a zero-effect run through all five phases —
            // guarantees the idempotence property (spec.md §8.6) for free.
            return;
        }
        self.actions.sort_by_key(action_rank);
        let n = self.actions.len();

        self.timers.start("detach");
        let moved_or_removed = self.actions.iter().any(|a| matches!(a, Action::ShapeMove { .. } | Action::ShapeRemove { .. }));
        let mut marked = self.detach_phase();

        self.timers.start("blocked_edges");
        self.blocked_edge_phase(moved_or_removed);

        self.timers.start("reattach");
        self.reattach_phase(&mut marked);

        self.timers.start("endpoints");
        self.endpoint_phase();
        for id in marked {
            if let Some(c) = self.connectors.get_mut(id) {
                c.make_path_invalid();
            }
        }

        self.timers.start("reroute");
        self.reroute_phase();
        self.timers.stop();

        self.actions.clear();
        debug!("process_transaction: committed {} queued actions", n);
    }

    fn detach_phase(&mut self) -> HashSet<ConnectorId> {
        let mut marked = HashSet::new();
        let moves_and_removes: Vec<(ShapeId, bool, bool)> = self
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::ShapeMove { shape, first_move, .. } => Some((*shape, *first_move, false)),
                Action::ShapeRemove { shape } => Some((*shape, true, true)),
                _ => None,
            })
            .collect();

        for (shape_id, first_move, is_remove) in moves_and_removes {
            let before_polygon = self.shapes.get(shape_id).map(|s| s.polygon.clone());

            if let Some(shape) = self.shapes.get(shape_id) {
                let alerted = shape.remove_from_graph(&mut self.verts, &mut self.edges);
                marked.extend(alerted);
            }

            if self.options.selective_reroute && first_move {
                if let Some(before) = &before_polygon {
                    self.mark_selectively_rerouted(before, &mut marked);
                }
            }

            for set in self.containing_shapes.values_mut() {
                set.shift_remove(&shape_id);
            }

            if is_remove {
                if let Some(shape) = self.shapes.get_mut(shape_id) {
                    shape.make_inactive(&mut self.verts);
                }
                self.shapes.remove(shape_id);
            }
            // For a move (not a remove), the shape's corner vertices are
            // deliberately left registered (only their incident edges were
            // torn down above) so `reattach_phase`'s `set_new_polygon` can
            // reposition them in place, preserving vertex identity as
            // spec.md §4.5 requires.
        }
        marked
    }

    /// Selective-reroute heuristic (spec.md §4.11, Glossary "Selective
    /// reroute"): for each not-yet-marked connector with a settled route,
    /// projects every boundary edge of the shape that just moved/vanished
    /// between the connector's endpoints and marks it if bending there would
    /// have been shorter than its current route.
    ///
    /// The source projects using a rotation so the shape edge becomes
    /// axis-aligned; this uses a plain perpendicular-foot projection onto
    /// the edge's infinite line (clamped to the edge segment) instead, which
    /// is the same geometric test without needing an explicit rotation.
    fn mark_selectively_rerouted(&self, shape_before: &Polygon, marked: &mut HashSet<ConnectorId>) {
        for (id, conn) in self.connectors.iter() {
            if marked.contains(&id) || conn.needs_reroute || conn.route_raw.len() < 2 {
                continue;
            }
            let s = *conn.route_raw.first().unwrap();
            let t = *conn.route_raw.last().unwrap();
            for (a, b) in shape_before.closed_edges() {
                if let Some(bend_len) = projected_bend_length(&s, &t, a, b) {
                    if bend_len < conn.route_length - crate::geometry::COORD_TOLERANCE {
                        marked.insert(id);
                        break;
                    }
                }
            }
        }
    }

    /// Re-checks (a coarse superset of) the edges a moved/removed shape
    /// could have blocked. The source recomputes only the specific blocked
    /// or missing edges; this reruns the chosen poly-line visibility
    /// strategy over the full current candidate set, which `get_or_create`
    /// makes safe (already-resolved edges are simply refreshed in place) at
    /// the cost of doing more work than the targeted recompute.
    fn blocked_edge_phase(&mut self, moved_or_removed: bool) {
        if !moved_or_removed || !self.options.routing_type.contains(RoutingType::POLY_LINE) {
            return;
        }
        let mut candidates = self.verts.connector_ids();
        candidates.extend(self.verts.shape_corner_ids());
        if self.options.use_lees_algorithm {
            visibility::build_visibility_lee(&mut self.verts, &mut self.edges, &self.shapes, self.options.ignore_regions, &candidates);
        } else {
            visibility::build_visibility_quadratic(&mut self.verts, &mut self.edges, &self.shapes, self.options.ignore_regions, &candidates);
        }
    }

    fn reattach_phase(&mut self, marked: &mut HashSet<ConnectorId>) {
        let adds_and_moves: Vec<(ShapeId, Option<Polygon>)> = self
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::ShapeAdd { shape } => Some((*shape, None)),
                Action::ShapeMove { shape, polygon, .. } => Some((*shape, Some(polygon.clone()))),
                _ => None,
            })
            .collect();

        for (shape_id, new_polygon) in adds_and_moves {
            if let Some(polygon) = new_polygon {
                if let Some(shape) = self.shapes.get_mut(shape_id) {
                    shape.set_new_polygon(&mut self.verts, polygon);
                }
            } else if let Some(shape) = self.shapes.get_mut(shape_id) {
                shape.make_active(&mut self.verts);
            }

            self.update_containment_for_shape(shape_id);
            self.new_blocking_shape(shape_id, marked);
            self.recompute_shape_corner_visibility(shape_id);
        }
    }

    /// `new_blocking_shape` (spec.md §4.11): scans every current visibility
    /// edge and blocks (tags invisible with this shape as blocker) the ones
    /// the shape's boundary now crosses, alerting their subscribers.
    fn new_blocking_shape(&mut self, shape_id: ShapeId, marked: &mut HashSet<ConnectorId>) {
        if !self.options.routing_type.contains(RoutingType::POLY_LINE) {
            return;
        }
        let polygon = match self.shapes.get(shape_id) {
            Some(s) => s.polygon.clone(),
            None => return,
        };
        let vis_edges: Vec<EdgeId> = self.edges.vis_graph().iter().copied().collect();
        for edge_id in vis_edges {
            let (v1, v2) = match self.edges.get(edge_id) {
                Some(e) => (e.v1, e.v2),
                None => continue,
            };
            let (p1, p2) = match (self.verts.get(v1), self.verts.get(v2)) {
                (Some(a), Some(b)) => (a.position, b.position),
                _ => continue,
            };
            let mut touches = 0u32;
            let crossed = polygon.closed_edges().any(|(a, b)| segment_shape_intersect(&p1, &p2, a, b, &mut touches));
            if crossed {
                if let Some(e) = self.edges.get(edge_id) {
                    marked.extend(e.subscribers.iter().copied());
                }
                self.edges.add_blocker(&mut self.verts, edge_id, Blocker::Shape(shape_id));
            }
        }
    }

    fn recompute_shape_corner_visibility(&mut self, shape_id: ShapeId) {
        if !self.options.routing_type.contains(RoutingType::POLY_LINE) {
            return;
        }
        let corners = match self.shapes.get(shape_id) {
            Some(s) => s.corners.clone(),
            None => return,
        };
        let mut candidates = self.verts.connector_ids();
        candidates.extend(self.verts.shape_corner_ids());
        for &corner in &corners {
            visibility::vertex_visibility(&mut self.verts, &mut self.edges, &self.shapes, self.options.ignore_regions, corner, &candidates);
        }
    }

    fn endpoint_phase(&mut self) {
        let changes: Vec<(ConnectorId, Vec<(EndSelector, ConnEnd)>)> = self
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::ConnChange { connector, updates } => Some((*connector, updates.clone())),
                _ => None,
            })
            .collect();

        for (connector_id, updates) in changes {
            for (which, end) in updates {
                self.apply_endpoint(connector_id, which, end);
            }
        }
    }

    /// Applies one `(which, ConnEnd)` update: repositions the endpoint
    /// vertex, creating it the first time (idempotently — Open Question
    /// resolution, SPEC_FULL.md §6.2) rather than relying on call-order
    /// discipline, then recomputes its visibility.
    fn apply_endpoint(&mut self, connector_id: ConnectorId, which: EndSelector, end: ConnEnd) {
        let existing_vertex = match self.connectors.get(connector_id) {
            Some(c) => match which {
                EndSelector::Source => c.source_vertex,
                EndSelector::Target => c.target_vertex,
            },
            None => return,
        };

        let vertex_id = match existing_vertex {
            Some(id) if self.verts.contains(id) => {
                if let Some(v) = self.verts.get_mut(id) {
                    v.position = end.point;
                    v.dir_flags = end.directions;
                }
                id
            }
            _ => {
                let which_kind = match which {
                    EndSelector::Source => EndpointWhich::Source,
                    EndSelector::Target => EndpointWhich::Target,
                };
                let id = self.verts.add_vertex(VertexKind::Endpoint { connector: connector_id, which: which_kind }, end.point);
                if let Some(v) = self.verts.get_mut(id) {
                    v.dir_flags = end.directions;
                }
                id
            }
        };

        if let Some(c) = self.connectors.get_mut(connector_id) {
            match which {
                EndSelector::Source => {
                    c.source_end = end;
                    c.source_vertex = Some(vertex_id);
                }
                EndSelector::Target => {
                    c.target_end = end;
                    c.target_vertex = Some(vertex_id);
                }
            }
            c.make_path_invalid();
        }

        self.update_containment_for_vertex(vertex_id);

        if self.options.routing_type.contains(RoutingType::POLY_LINE) {
            let mut candidates = self.verts.connector_ids();
            candidates.extend(self.verts.shape_corner_ids());
            visibility::vertex_visibility(&mut self.verts, &mut self.edges, &self.shapes, self.options.ignore_regions, vertex_id, &candidates);
        }
    }

    fn reroute_phase(&mut self) {
        if self.options.routing_type.contains(RoutingType::ORTHOGONAL) {
            self.rebuild_orthogonal_graph();
        }

        let connector_ids: Vec<ConnectorId> = self.connectors.keys().collect();
        let mut changed: HashSet<ConnectorId> = HashSet::new();
        for id in &connector_ids {
            if let Some(c) = self.connectors.get_mut(*id) {
                c.needs_repaint = false;
            }
            if self.generate_path(*id, false) {
                changed.insert(*id);
            }
        }

        if !changed.is_empty() && (self.penalties.crossing > 0.0 || self.penalties.fixed_shared_path > 0.0) {
            let rerouted = self.improve_crossings();
            changed.extend(rerouted);
        }

        if self.options.routing_type.contains(RoutingType::ORTHOGONAL) {
            self.nudge_orthogonal_routes();
        }

        for id in changed {
            if let Some(c) = self.connectors.get_mut(id) {
                c.needs_repaint = true;
                c.fire_callback();
            }
        }
    }

    fn rebuild_orthogonal_graph(&mut self) {
        // Torn down and rebuilt from scratch every reroute phase (spec.md
        // §4.8: "built from scratch on demand... whenever shapes have
        // moved"); rather than tracking a separate per-shape dirty bit, this
        // treats every reroute phase as a rebuild, which `process_transaction`
        // already only runs once per committed transaction.
        let stale: Vec<VertexId> = std::mem::take(&mut self.orthogonal_dummies);
        for v in stale {
            self.edges.remove_all_incident(&mut self.verts, v);
            self.verts.remove_vertex(v);
        }
        for id in self.edges.orthog_graph().iter().copied().collect::<Vec<_>>() {
            self.edges.delete_edge(&mut self.verts, id);
        }

        // Shape corners are inert for this pass (spec.md §4.8): they feed the
        // sweep as boundary data via `self.shapes` directly and never cast
        // their own rays, so only connector endpoints are passed as candidates.
        let candidates = self.verts.connector_ids();
        let before: HashSet<VertexId> = self.verts.all_ids().into_iter().collect();
        orthogonal::build_orthogonal_visibility(&mut self.verts, &mut self.edges, &self.shapes, &candidates);
        self.orthogonal_dummies = self.verts.all_ids().into_iter().filter(|v| !before.contains(v)).collect();
    }

    /// `generate_path` (spec.md §4.6): the connector's internal route
    /// generation, run once per connector per reroute phase (and again,
    /// forced, for connectors selected by `improve_crossings`). Returns
    /// whether the route actually changed.
    fn generate_path(&mut self, connector_id: ConnectorId, crossing_stage: bool) -> bool {
        let (needs_reroute, conn_type, source_vertex, target_vertex) = match self.connectors.get(connector_id) {
            Some(c) => (c.needs_reroute, c.conn_type, c.source_vertex, c.target_vertex),
            None => return false,
        };
        if !needs_reroute && !crossing_stage {
            return false;
        }
        let (Some(src), Some(tar)) = (source_vertex, target_vertex) else { return false };
        let (src_pt, tar_pt) = match (self.verts.get(src), self.verts.get(tar)) {
            (Some(a), Some(b)) => (a.position, b.position),
            _ => return false,
        };
        let orthogonal = conn_type == ConnType::Orthogonal;

        if !crossing_stage && self.direct_vis(src, tar) {
            if let Some(c) = self.connectors.get_mut(connector_id) {
                c.set_route_raw(vec![src_pt, tar_pt]);
                c.needs_reroute = false;
                c.false_path = false;
            }
            let edge_id = self.edges.get_or_create(&self.verts, src, tar);
            if let Some(e) = self.edges.get_mut(edge_id) {
                e.subscribe(connector_id);
            }
            return true;
        }

        let cluster_polys: Vec<Polygon> = self.clusters.values().map(|c| c.polygon.clone()).collect();
        let cluster_refs: Vec<&[Pt]> = cluster_polys.iter().map(|p| p.points.as_slice()).collect();
        let other_routes: Vec<Vec<Pt>> =
            self.connectors.iter().filter(|(id, c)| *id != connector_id && !c.route_raw.is_empty()).map(|(_, c)| c.route_raw.clone()).collect();
        let other_refs: Vec<&[Pt]> = other_routes.iter().map(|r| r.as_slice()).collect();

        let ctx = CostContext {
            penalties: &self.penalties,
            cluster_polygons: &cluster_refs,
            other_routes: &other_refs,
            in_crossing_penalty_stage: crossing_stage,
            fixed_shared_segments: Some(&self.fixed_shared_segments),
        };

        let result = if self.options.use_a_star {
            search::a_star(&self.verts, &self.edges, src, tar, self.options.invisibility_graph, orthogonal, &ctx)
        } else {
            search::dijkstra(&self.verts, &self.edges, src, tar, self.options.invisibility_graph, orthogonal, &ctx)
        };

        let route_points: Vec<Pt> = match &result {
            Some(r) => r.vertices.iter().filter_map(|v| self.verts.get(*v).map(|vi| vi.position)).collect(),
            None => Vec::new(),
        };
        if let Some(r) = &result {
            search::subscribe_path(&mut self.edges, r, connector_id);
        }

        let route_found = route_points.len() >= 2;
        if !route_found {
            let edge_id = self.edges.get_or_create(&self.verts, src, tar);
            self.edges.add_blocker(&mut self.verts, edge_id, Blocker::CycleBlocker);
        }

        if let Some(c) = self.connectors.get_mut(connector_id) {
            if route_found {
                c.set_route_raw(route_points);
                c.false_path = false;
            } else {
                c.set_route_raw(vec![src_pt, tar_pt]);
                c.false_path = true;
            }
            c.needs_reroute = false;
        }
        true
    }

    /// `direct_vis` (spec.md §4.6): whether the straight segment between
    /// two vertices is unobstructed by any shape, walking shape boundaries
    /// and skipping shapes that contain either endpoint.
    fn direct_vis(&self, a: VertexId, b: VertexId) -> bool {
        let (pa, pb) = match (self.verts.get(a), self.verts.get(b)) {
            (Some(va), Some(vb)) => (va.position, vb.position),
            _ => return false,
        };
        let mut touches = 0u32;
        for shape in self.shapes.values().filter(|s| s.active) {
            if shape.contains(&pa) || shape.contains(&pb) {
                continue;
            }
            for (ea, eb) in shape.polygon.closed_edges() {
                if segment_shape_intersect(&pa, &pb, ea, eb, &mut touches) {
                    return false;
                }
            }
        }
        true
    }

    /// `improve_crossings` (spec.md §4.10): surveys every settled route
    /// pair, marks connectors involved in a real crossing or a non-fixed
    /// shared path, and reruns `generate_path` for them with the crossing
    /// penalty enabled.
    fn improve_crossings(&mut self) -> Vec<ConnectorId> {
        let routes: Vec<(ConnectorId, Vec<Pt>, Vec<bool>)> = self
            .connectors
            .iter()
            .map(|(id, c)| {
                let fixed = vec![c.conn_type == ConnType::Orthogonal; c.route_raw.len().saturating_sub(1)];
                (id, c.route_raw.clone(), fixed)
            })
            .collect();
        let route_refs: Vec<(ConnectorId, &[Pt], &[bool])> = routes.iter().map(|(id, r, f)| (*id, r.as_slice(), f.as_slice())).collect();
        let pairs = crossing::survey(&route_refs);
        let to_reroute = crossing::connectors_needing_reroute(&pairs);

        for &id in &to_reroute {
            if let Some(c) = self.connectors.get_mut(id) {
                c.make_path_invalid();
            }
        }
        for &id in &to_reroute {
            self.generate_path(id, true);
        }
        to_reroute
    }

    /// Orthogonal centring + nudging post-pass (spec.md §4.6/§4.11): offsets
    /// points two orthogonal routes share perpendicular to the local
    /// segment direction, so parallel connectors render as distinct
    /// offset lines instead of exactly overlapping. A bounded approximation
    /// of the full centring pass, which additionally considers segment
    /// *overlap* (not just shared endpoints) and more than two routes at
    /// once.
    fn nudge_orthogonal_routes(&mut self) {
        let d = self.options.orthogonal_nudge_distance;
        if d <= 0.0 {
            return;
        }
        let orthogonal_ids: Vec<ConnectorId> = self.connectors.iter().filter(|(_, c)| c.conn_type == ConnType::Orthogonal).map(|(id, _)| id).collect();

        for i in 0..orthogonal_ids.len() {
            for j in (i + 1)..orthogonal_ids.len() {
                let (a, b) = (orthogonal_ids[i], orthogonal_ids[j]);
                let (route_a, route_b) = match (self.connectors.get(a), self.connectors.get(b)) {
                    (Some(ca), Some(cb)) => (ca.route_display.clone(), cb.route_display.clone()),
                    _ => continue,
                };
                let fixed_a = vec![true; route_a.len().saturating_sub(1)];
                let fixed_b = vec![true; route_b.len().saturating_sub(1)];
                let report = crossing::analyse(&route_a, &fixed_a, &route_b, &fixed_b);
                if !report.flags.contains(CrossingFlags::SHARES_PATH) {
                    continue;
                }
                if let Some(cb) = self.connectors.get_mut(b) {
                    let mut route = cb.route_display.clone();
                    nudge_shared_run(&route_a, &mut route, d);
                    cb.route_display = route;
                }
            }
        }
    }

    fn update_containment_for_shape(&mut self, shape_id: ShapeId) {
        let polygon = match self.shapes.get(shape_id) {
            Some(s) => s.polygon.clone(),
            None => return,
        };
        let endpoint_ids = self.verts.connector_ids();
        for v in endpoint_ids {
            let p = match self.verts.get(v) {
                Some(vi) => vi.position,
                None => continue,
            };
            let inside = in_poly_general(&polygon.points, &p);
            let set = self.containing_shapes.entry(v).or_default();
            if inside {
                set.insert(shape_id);
            } else {
                set.shift_remove(&shape_id);
            }
        }
    }

    fn update_containment_for_vertex(&mut self, vertex_id: VertexId) {
        let p = match self.verts.get(vertex_id) {
            Some(v) => v.position,
            None => return,
        };
        let mut shape_set = indexmap::IndexSet::new();
        for shape in self.shapes.values().filter(|s| s.active) {
            if shape.contains(&p) {
                shape_set.insert(shape.id);
            }
        }
        self.containing_shapes.insert(vertex_id, shape_set);

        let mut cluster_set = indexmap::IndexSet::new();
        for cluster in self.clusters.values() {
            if cluster.contains(&p) {
                cluster_set.insert(cluster.id);
            }
        }
        self.containing_clusters.insert(vertex_id, cluster_set);
    }

    /// Testable property §8.5: `shape.id ∈ containing_shapes[v]` iff `v`
    /// lies strictly inside `shape.polygon`. Exposed read-only for tests and
    /// hosts that want to query containment directly.
    pub fn shapes_containing(&self, vertex: VertexId) -> Vec<ShapeId> {
        self.containing_shapes.get(&vertex).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }
}

fn projected_bend_length(s: &Pt, t: &Pt, a: &Pt, b: &Pt) -> Option<f64> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 <= f64::EPSILON {
        return None;
    }
    let mid = Pt::new((s.x + t.x) / 2.0, (s.y + t.y) / 2.0);
    let tparam = ((mid.x - a.x) * dx + (mid.y - a.y) * dy) / len2;
    let tclamped = tparam.clamp(0.0, 1.0);
    let bend = Pt::new(a.x + tclamped * dx, a.y + tclamped * dy);
    Some(s.distance(&bend) + bend.distance(t))
}

/// Offsets every point of `route` that coincides with a point of
/// `reference` perpendicular to the local segment direction, so two
/// orthogonal routes sharing a sub-path render as parallel lines instead of
/// exactly overlapping.
fn nudge_shared_run(reference: &[Pt], route: &mut [Pt], distance: f64) {
    for i in 0..route.len() {
        if !reference.iter().any(|p| *p == route[i]) {
            continue;
        }
        let dir = if i + 1 < route.len() {
            (route[i + 1].x - route[i].x, route[i + 1].y - route[i].y)
        } else if i > 0 {
            (route[i].x - route[i - 1].x, route[i].y - route[i - 1].y)
        } else {
            continue;
        };
        let (dx, dy) = if dir.0.abs() > dir.1.abs() { (0.0, 1.0) } else { (1.0, 0.0) };
        route[i] = Pt::new(route[i].x + dx * distance, route[i].y + dy * distance);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vertex::ConnDirFlags;

    fn router() -> Router {
        Router::new(RouterOptions { routing_type: RoutingType::POLY_LINE, use_lees_algorithm: false, ..RouterOptions::default() }).unwrap()
    }

    #[test]
    fn construction_requires_a_routing_mode() {
        let err = Router::new(RouterOptions { routing_type: RoutingType(0), ..RouterOptions::default() }).unwrap_err();
        assert_eq!(err, RouterError::NoRoutingModeSelected);
    }

    #[test]
    fn s1_direct_visibility() {
        let mut r = router();
        let conn = r.add_connector(ConnType::PolyLine, ConnEnd::new(Pt::new(0.0, 0.0)), ConnEnd::new(Pt::new(100.0, 0.0)));
        r.process_transaction();
        let c = r.connector(conn).unwrap();
        assert_eq!(c.route(), &[Pt::new(0.0, 0.0), Pt::new(100.0, 0.0)]);
        assert!((c.route_length - 100.0).abs() < 1e-6);
    }

    #[test]
    fn s2_single_obstacle_routes_around() {
        let mut r = router();
        r.add_shape(Polygon::new(vec![Pt::new(40.0, -20.0), Pt::new(60.0, -20.0), Pt::new(60.0, 20.0), Pt::new(40.0, 20.0)]));
        let conn = r.add_connector(ConnType::PolyLine, ConnEnd::new(Pt::new(0.0, 0.0)), ConnEnd::new(Pt::new(100.0, 0.0)));
        r.process_transaction();
        let c = r.connector(conn).unwrap();
        assert_eq!(c.route().len(), 4);
        assert!((c.route_length - 109.44).abs() < 0.5);
    }

    #[test]
    fn s4_new_shape_invalidates_and_fires_callback_once() {
        let mut r = router();
        let conn = r.add_connector(ConnType::PolyLine, ConnEnd::new(Pt::new(0.0, 0.0)), ConnEnd::new(Pt::new(100.0, 0.0)));
        r.process_transaction();
        assert_eq!(r.connector(conn).unwrap().route().len(), 2);

        let fired = std::rc::Rc::new(std::cell::Cell::new(0u32));
        let fired2 = fired.clone();
        r.set_callback(conn, move |_| fired2.set(fired2.get() + 1));

        r.add_shape(Polygon::new(vec![Pt::new(40.0, -20.0), Pt::new(60.0, -20.0), Pt::new(60.0, 20.0), Pt::new(40.0, 20.0)]));
        r.process_transaction();

        assert_eq!(fired.get(), 1);
        assert!(r.connector(conn).unwrap().route().len() > 2);
    }

    #[test]
    fn s5_unreachable_target_degrades_to_straight_segment_and_does_not_reattempt() {
        let mut r = router();
        r.add_shape(Polygon::new(vec![Pt::new(40.0, -10.0), Pt::new(60.0, -10.0), Pt::new(60.0, 10.0), Pt::new(40.0, 10.0)]));
        let conn =
            r.add_connector(ConnType::PolyLine, ConnEnd::new(Pt::new(0.0, 0.0)), ConnEnd::with_directions(Pt::new(50.0, 0.0), ConnDirFlags::NONE));
        r.process_transaction();

        let c = r.connector(conn).unwrap();
        assert_eq!(c.route(), &[Pt::new(0.0, 0.0), Pt::new(50.0, 0.0)]);
        assert!(c.false_path);

        r.process_transaction();
        assert!(!r.connector(conn).unwrap().needs_reroute);
    }

    #[test]
    fn assign_id_bumps_counter_past_suggested() {
        let mut r = router();
        assert_eq!(r.assign_id(Some(5)), 5);
        assert_eq!(r.assign_id(None), 6);
    }

    #[test]
    fn containment_map_matches_point_in_polygon() {
        let mut r = router();
        r.add_shape(Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0), Pt::new(0.0, 10.0)]));
        let conn = r.add_connector(ConnType::PolyLine, ConnEnd::new(Pt::new(5.0, 5.0)), ConnEnd::new(Pt::new(20.0, 20.0)));
        r.process_transaction();
        let src = r.connector(conn).unwrap().source_vertex.unwrap();
        assert_eq!(r.shapes_containing(src).len(), 1);
    }
}
