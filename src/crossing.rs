//! Crossing and overlap analysis between connector routes (C10), and the
//! `improve_crossings` rerouting pass (spec.md §4.10).
//!
//! Grounded on `examples/WFBFA-SNOMOR/Real_case/Paths/src/graph.rs`'s
//! segment-sweep style of comparing one path against another pairwise, with
//! the crossing/overlap predicates themselves built on `geometry::segment_intersect`.

use crate::geometry::Pt;
use crate::ids::ConnectorId;

/// Flags describing how two connectors' routes relate (spec.md §4.10),
/// a hand-rolled bitmask in the same style as `vertex::ConnDirFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossingFlags(pub u8);

impl CrossingFlags {
    /// The routes touch at a single point without crossing through.
    pub const TOUCHES: CrossingFlags = CrossingFlags(1);
    /// The routes run along a shared sub-path for more than one point.
    pub const SHARES_PATH: CrossingFlags = CrossingFlags(2);
    /// The shared sub-path includes one route's terminal segment.
    pub const SHARES_PATH_AT_END: CrossingFlags = CrossingFlags(4);
    /// The shared sub-path is one that at least one connector has fixed
    /// (nudged into place already) and so must not be re-routed apart.
    pub const SHARES_FIXED_SEGMENT: CrossingFlags = CrossingFlags(8);

    pub fn contains(self, other: CrossingFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for CrossingFlags {
    type Output = CrossingFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        CrossingFlags(self.0 | rhs.0)
    }
}

/// The result of comparing two routes (spec.md §4.10): a count of proper
/// crossings plus the descriptive flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossingReport {
    pub real_crossings: u32,
    pub flags: CrossingFlags,
}

fn points_equal(a: &Pt, b: &Pt) -> bool {
    a.x == b.x && a.y == b.y
}

/// Length, in consecutive matching points, of the shared run starting at
/// `route_a[a0]`/`route_b[b0]` (inclusive), walking forward in both routes.
fn shared_run_len(route_a: &[Pt], a0: usize, route_b: &[Pt], b0: usize) -> usize {
    let mut len = 0;
    while a0 + len < route_a.len() && b0 + len < route_b.len() && points_equal(&route_a[a0 + len], &route_b[b0 + len]) {
        len += 1;
    }
    len
}

/// Compares two settled routes (spec.md §4.10): counts proper segment
/// crossings and detects touching/shared-path relationships. `fixed_a`/
/// `fixed_b` mark which of each route's segments are fixed (already
/// orthogonally nudged) so a shared run overlapping one counts as
/// `SHARES_FIXED_SEGMENT`.
pub fn analyse(route_a: &[Pt], fixed_a: &[bool], route_b: &[Pt], fixed_b: &[bool]) -> CrossingReport {
    let mut report = CrossingReport::default();
    if route_a.len() < 2 || route_b.len() < 2 {
        return report;
    }

    for wa in route_a.windows(2) {
        for wb in route_b.windows(2) {
            if crate::geometry::segment_intersect(&wa[0], &wa[1], &wb[0], &wb[1]) {
                report.real_crossings += 1;
            }
        }
    }

    for i in 0..route_a.len() {
        for j in 0..route_b.len() {
            if !points_equal(&route_a[i], &route_b[j]) {
                continue;
            }
            let run = shared_run_len(route_a, i, route_b, j);
            if run >= 2 {
                report.flags = report.flags | CrossingFlags::SHARES_PATH;
                if i == 0 || j == 0 || i + run == route_a.len() || j + run == route_b.len() {
                    report.flags = report.flags | CrossingFlags::SHARES_PATH_AT_END;
                }
                let segment_fixed = |fixed: &[bool], start: usize, run: usize| {
                    (start..start + run.saturating_sub(1)).any(|k| fixed.get(k).copied().unwrap_or(false))
                };
                if segment_fixed(fixed_a, i, run) || segment_fixed(fixed_b, j, run) {
                    report.flags = report.flags | CrossingFlags::SHARES_FIXED_SEGMENT;
                }
            } else {
                report.flags = report.flags | CrossingFlags::TOUCHES;
            }
        }
    }

    report
}

/// One entry of an all-pairs crossing survey (spec.md §4.10): the two
/// connectors compared and their report.
#[derive(Debug, Clone, Copy)]
pub struct PairReport {
    pub a: ConnectorId,
    pub b: ConnectorId,
    pub report: CrossingReport,
}

/// Runs [`analyse`] over every distinct pair of `routes` (by connector id),
/// skipping self-pairs and each unordered pair only once.
pub fn survey(routes: &[(ConnectorId, &[Pt], &[bool])]) -> Vec<PairReport> {
    let mut out = Vec::new();
    for i in 0..routes.len() {
        for j in (i + 1)..routes.len() {
            let (a_id, a_route, a_fixed) = routes[i];
            let (b_id, b_route, b_fixed) = routes[j];
            let report = analyse(a_route, a_fixed, b_route, b_fixed);
            if report.real_crossings > 0 || !report.flags.is_empty() {
                out.push(PairReport { a: a_id, b: b_id, report });
            }
        }
    }
    out
}

/// `improve_crossings` (spec.md §4.10): given the current survey, returns the
/// connectors that should be queued for a crossing-penalty reroute pass — any
/// connector involved in a real crossing, or in a non-fixed shared path (a
/// shared fixed segment is left alone; un-nudging it would just recreate it).
pub fn connectors_needing_reroute(pairs: &[PairReport]) -> Vec<ConnectorId> {
    let mut out = Vec::new();
    for pair in pairs {
        let candidate = pair.report.real_crossings > 0
            || (pair.report.flags.contains(CrossingFlags::SHARES_PATH) && !pair.report.flags.contains(CrossingFlags::SHARES_FIXED_SEGMENT));
        if candidate {
            if !out.contains(&pair.a) {
                out.push(pair.a);
            }
            if !out.contains(&pair.b) {
                out.push(pair.b);
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(v: u64) -> ConnectorId {
        slotmap::KeyData::from_ffi(v).into()
    }

    #[test]
    fn crossing_routes_are_counted() {
        let a = [Pt::new(0.0, 0.0), Pt::new(10.0, 10.0)];
        let b = [Pt::new(0.0, 10.0), Pt::new(10.0, 0.0)];
        let report = analyse(&a, &[], &b, &[]);
        assert_eq!(report.real_crossings, 1);
        assert!(report.flags.is_empty());
    }

    #[test]
    fn shared_path_is_flagged() {
        let a = [Pt::new(0.0, 0.0), Pt::new(5.0, 0.0), Pt::new(10.0, 0.0)];
        let b = [Pt::new(5.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0)];
        let report = analyse(&a, &[false, false], &b, &[false, false]);
        assert!(report.flags.contains(CrossingFlags::SHARES_PATH));
        assert!(report.flags.contains(CrossingFlags::SHARES_PATH_AT_END));
        assert!(!report.flags.contains(CrossingFlags::SHARES_FIXED_SEGMENT));
    }

    #[test]
    fn fixed_shared_segment_is_flagged() {
        let a = [Pt::new(0.0, 0.0), Pt::new(5.0, 0.0), Pt::new(10.0, 0.0)];
        let b = [Pt::new(5.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0)];
        let report = analyse(&a, &[false, true], &b, &[false, false]);
        assert!(report.flags.contains(CrossingFlags::SHARES_FIXED_SEGMENT));
    }

    #[test]
    fn touching_routes_flagged_without_real_crossing() {
        let a = [Pt::new(0.0, 0.0), Pt::new(10.0, 0.0)];
        let b = [Pt::new(10.0, 0.0), Pt::new(10.0, 10.0)];
        let report = analyse(&a, &[], &b, &[]);
        assert_eq!(report.real_crossings, 0);
        assert!(report.flags.contains(CrossingFlags::TOUCHES));
    }

    #[test]
    fn survey_and_reroute_selection() {
        let a_route = [Pt::new(0.0, 0.0), Pt::new(10.0, 10.0)];
        let b_route = [Pt::new(0.0, 10.0), Pt::new(10.0, 0.0)];
        let c_route = [Pt::new(50.0, 50.0), Pt::new(60.0, 60.0)];
        let routes = vec![
            (id(1), a_route.as_slice(), [].as_slice()),
            (id(2), b_route.as_slice(), [].as_slice()),
            (id(3), c_route.as_slice(), [].as_slice()),
        ];
        let pairs = survey(&routes);
        assert_eq!(pairs.len(), 1);
        let reroute = connectors_needing_reroute(&pairs);
        assert!(reroute.contains(&id(1)));
        assert!(reroute.contains(&id(2)));
        assert!(!reroute.contains(&id(3)));
    }
}
