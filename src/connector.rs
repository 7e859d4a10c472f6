//! Connector reference (C6): endpoints, routing type, raw/display routes,
//! reroute bookkeeping, and the host-visible repaint callback.

use crate::geometry::Pt;
use crate::ids::{ConnectorId, VertexId};
use crate::polygon::{CurvedPolyline, Polygon};
use crate::vertex::ConnDirFlags;

/// Poly-line vs. orthogonal routing (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnType {
    PolyLine,
    Orthogonal,
}

/// An endpoint description: position plus a visibility-direction mask used
/// when the endpoint is inside a shape (spec.md §3, Glossary).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnEnd {
    pub point: Pt,
    pub directions: ConnDirFlags,
}

impl ConnEnd {
    pub fn new(point: Pt) -> Self {
        ConnEnd { point, directions: ConnDirFlags::ALL }
    }

    pub fn with_directions(point: Pt, directions: ConnDirFlags) -> Self {
        ConnEnd { point, directions }
    }
}

/// Which end of a connector an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndSelector {
    Source,
    Target,
}

/// The router's connector arena (spec.md §3/§9 "arena + indices").
pub type ConnectorMap = slotmap::SlotMap<ConnectorId, ConnRef>;

type Callback = Box<dyn FnMut(ConnectorId)>;

/// A connector between two points (spec.md §3/§4.6).
pub struct ConnRef {
    pub id: ConnectorId,
    pub conn_type: ConnType,
    pub active: bool,

    pub source_end: ConnEnd,
    pub target_end: ConnEnd,
    pub source_vertex: Option<VertexId>,
    pub target_vertex: Option<VertexId>,

    /// Ordered list of graph vertices visited by the last path search.
    pub route_raw: Vec<Pt>,
    /// Simplified / curve-expanded / nudged version of `route_raw`.
    pub route_display: Vec<Pt>,
    pub curved_display: Option<CurvedPolyline>,
    pub route_length: f64,

    pub needs_reroute: bool,
    pub needs_repaint: bool,
    /// Set when the last search found no path; the route degraded to the
    /// straight `[src, tar]` fallback and the direct edge is tagged as a
    /// cycle blocker (spec.md §4.6/§7).
    pub false_path: bool,
    pub hate_crossings: bool,

    callback: Option<Callback>,
}

impl std::fmt::Debug for ConnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnRef")
            .field("id", &self.id)
            .field("conn_type", &self.conn_type)
            .field("active", &self.active)
            .field("route_raw", &self.route_raw)
            .field("needs_reroute", &self.needs_reroute)
            .field("needs_repaint", &self.needs_repaint)
            .field("false_path", &self.false_path)
            .finish()
    }
}

impl ConnRef {
    pub fn new(id: ConnectorId, conn_type: ConnType, source_end: ConnEnd, target_end: ConnEnd) -> Self {
        ConnRef {
            id,
            conn_type,
            active: true,
            source_end,
            target_end,
            source_vertex: None,
            target_vertex: None,
            route_raw: Vec::new(),
            route_display: Vec::new(),
            curved_display: None,
            route_length: 0.0,
            needs_reroute: true,
            needs_repaint: false,
            false_path: false,
            hate_crossings: false,
            callback: None,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.source_vertex.is_some() && self.target_vertex.is_some()
    }

    pub fn set_routing_type(&mut self, t: ConnType) {
        if self.conn_type != t {
            self.conn_type = t;
            self.make_path_invalid();
        }
    }

    pub fn set_hate_crossings(&mut self, b: bool) {
        self.hate_crossings = b;
    }

    pub fn set_callback(&mut self, cb: impl FnMut(ConnectorId) + 'static) {
        self.callback = Some(Box::new(cb));
    }

    pub fn fire_callback(&mut self) {
        if let Some(cb) = self.callback.as_mut() {
            cb(self.id);
        }
    }

    pub fn make_path_invalid(&mut self) {
        self.needs_reroute = true;
    }

    pub fn route(&self) -> &[Pt] {
        &self.route_raw
    }

    pub fn display_route(&self) -> &[Pt] {
        &self.route_display
    }

    pub fn needs_repaint(&self) -> bool {
        self.needs_repaint
    }

    /// Records a freshly-searched raw path and derives a display route:
    /// simplification always, curved-corner expansion for poly-line
    /// connectors (orthogonal nudging/centring is applied later by
    /// `orthogonal.rs`, over the whole batch of orthogonal connectors at
    /// once, so it is not done here).
    pub fn set_route_raw(&mut self, points: Vec<Pt>) {
        self.route_length = points.windows(2).map(|w| w[0].distance(&w[1])).sum();
        self.route_raw = points;
        let mut display = Polygon::new(self.route_raw.clone());
        display.simplify();
        if self.conn_type == ConnType::PolyLine {
            let curve_amount = 5.0_f64.min(display.total_length() / 4.0);
            self.curved_display = Some(display.curved_polyline(curve_amount, false));
        } else {
            self.curved_display = None;
        }
        self.route_display = display.points;
        self.needs_repaint = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(v: u64) -> ConnectorId {
        slotmap::KeyData::from_ffi(v).into()
    }

    #[test]
    fn set_route_raw_computes_length_and_display() {
        let mut c = ConnRef::new(id(1), ConnType::PolyLine, ConnEnd::new(Pt::new(0.0, 0.0)), ConnEnd::new(Pt::new(10.0, 0.0)));
        c.set_route_raw(vec![Pt::new(0.0, 0.0), Pt::new(5.0, 0.0), Pt::new(10.0, 0.0)]);
        assert!((c.route_length - 10.0).abs() < 1e-9);
        // Collinear middle point collapses away in the simplified display route.
        assert_eq!(c.route_display, vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0)]);
        assert!(c.needs_repaint());
    }

    #[test]
    fn callback_fires_with_connector_id() {
        let mut c = ConnRef::new(id(2), ConnType::PolyLine, ConnEnd::new(Pt::new(0.0, 0.0)), ConnEnd::new(Pt::new(1.0, 0.0)));
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let seen2 = seen.clone();
        c.set_callback(move |cid| *seen2.borrow_mut() = Some(cid));
        c.fire_callback();
        assert_eq!(*seen.borrow(), Some(id(2)));
    }
}
