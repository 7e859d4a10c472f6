//! Router configuration: penalty weights and option flags (spec.md §6),
//! plus a small wall-clock instrumentation counter (spec.md §3 "timers").
//!
//! Loaded the way the teacher loads `meta::Parameters` — a plain
//! `#[derive(Serialize, Deserialize)]` value struct, read with
//! `serde_yaml::from_reader` in the demo CLI.

use std::time::{Duration, Instant};

/// Bitmask selecting which routing mode(s) a router supports (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoutingType(pub u8);

impl RoutingType {
    pub const POLY_LINE: RoutingType = RoutingType(1);
    pub const ORTHOGONAL: RoutingType = RoutingType(2);

    pub fn contains(self, other: RoutingType) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for RoutingType {
    type Output = RoutingType;
    fn bitor(self, rhs: Self) -> Self::Output {
        RoutingType(self.0 | rhs.0)
    }
}

/// Named penalty weights for the path-search cost function (spec.md §4.9,
/// §6). Negative values reset the field to its documented default, matching
/// the `set_penalty` semantics described in §6.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PenaltyConfig {
    pub segment: f64,
    pub angle: f64,
    pub crossing: f64,
    pub cluster_crossing: f64,
    pub fixed_shared_path: f64,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        PenaltyConfig { segment: 0.0, angle: 0.0, crossing: 0.0, cluster_crossing: 0.0, fixed_shared_path: 0.0 }
    }
}

impl PenaltyConfig {
    /// Applies a named penalty update; a negative value resets that field
    /// to the documented default (0.0 — the router ships with no implicit
    /// penalties, a host must opt in).
    pub fn set(&mut self, name: &str, value: f64) {
        let resolved = if value < 0.0 { 0.0 } else { value };
        match name {
            "segment" => self.segment = resolved,
            "angle" => self.angle = resolved,
            "crossing" => self.crossing = resolved,
            "cluster_crossing" => self.cluster_crossing = resolved,
            "fixed_shared_path" => self.fixed_shared_path = resolved,
            other => log::warn!("unknown penalty name {:?}; ignored", other),
        }
    }
}

/// The option table of spec.md §6, exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RouterOptions {
    pub routing_type: RoutingType,
    pub ignore_regions: bool,
    pub use_lees_algorithm: bool,
    pub invisibility_graph: bool,
    pub selective_reroute: bool,
    pub partial_feedback: bool,
    pub partial_time: bool,
    pub rubber_band_routing: bool,
    pub simple_routing: bool,
    pub clustered_routing: bool,
    pub use_a_star: bool,
    pub orthogonal_nudge_distance: f64,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            routing_type: RoutingType::POLY_LINE,
            ignore_regions: false,
            use_lees_algorithm: true,
            invisibility_graph: false,
            selective_reroute: true,
            partial_feedback: false,
            partial_time: false,
            rubber_band_routing: false,
            simple_routing: false,
            clustered_routing: false,
            use_a_star: false,
            orthogonal_nudge_distance: 4.0,
        }
    }
}

impl RouterOptions {
    pub fn set_orthogonal_nudge_distance(&mut self, d: f64) {
        debug_assert!(d >= 0.0, "orthogonal_nudge_distance must be non-negative");
        self.orthogonal_nudge_distance = d.max(0.0);
    }
}

/// Per-phase wall-clock counters, logged at `trace` by `process_transaction`
/// (grounded on `examples/original_source/.../timer.cpp`'s per-phase
/// accumulator design, adapted to wall-clock `Instant`s rather than CPU
/// `clock()` ticks).
#[derive(Debug, Default)]
pub struct Timers {
    totals: std::collections::HashMap<&'static str, Duration>,
    running: Option<(&'static str, Instant)>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, phase: &'static str) {
        if let Some((prev, start)) = self.running.take() {
            *self.totals.entry(prev).or_default() += start.elapsed();
        }
        self.running = Some((phase, Instant::now()));
    }

    pub fn stop(&mut self) {
        if let Some((phase, start)) = self.running.take() {
            *self.totals.entry(phase).or_default() += start.elapsed();
            log::trace!("phase {} took {:?}", phase, self.totals[phase]);
        }
    }

    pub fn total(&self, phase: &str) -> Duration {
        self.totals.get(phase).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn penalty_set_negative_resets_to_default() {
        let mut p = PenaltyConfig { segment: 5.0, angle: 5.0, crossing: 5.0, cluster_crossing: 5.0, fixed_shared_path: 5.0 };
        p.set("crossing", -1.0);
        assert_eq!(p.crossing, 0.0);
        p.set("angle", 3.0);
        assert_eq!(p.angle, 3.0);
    }

    #[test]
    fn routing_type_bitor_combines_modes() {
        let both = RoutingType::POLY_LINE | RoutingType::ORTHOGONAL;
        assert!(both.contains(RoutingType::POLY_LINE));
        assert!(both.contains(RoutingType::ORTHOGONAL));
    }

    #[test]
    fn timers_accumulate_per_phase() {
        let mut t = Timers::new();
        t.start("detach");
        t.start("reattach");
        t.stop();
        assert!(t.total("detach") >= Duration::from_nanos(0));
    }
}
