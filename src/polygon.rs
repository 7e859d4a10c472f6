//! Polygon model (C2): ordered vertex sequences, translation, simplification,
//! curved-corner expansion, bounding boxes.

use itertools::Itertools;

use crate::geometry::{vec_dir, BBox, Dir, Pt};

/// Path-operation tag annotating a point in a [`CurvedPolyline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PathOp {
    /// Move-to: starts a new (sub)path at this point.
    M,
    /// Line-to: a straight segment to this point.
    L,
    /// Cubic Bézier control/end point; control points always arrive as a
    /// run of three consecutive `C`-tagged points (two control points, one
    /// end point).
    C,
    /// Close path (implicit edge back to the most recent `M`).
    Z,
}

/// An ordered sequence of points. A *shape* polygon is implicitly closed
/// (last vertex joins first); a *polyline route* is open (spec.md §3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Polygon {
    pub points: Vec<Pt>,
}

impl Polygon {
    pub fn new(points: Vec<Pt>) -> Self {
        Polygon { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for p in &mut self.points {
            *p = p.translated(dx, dy);
        }
    }

    /// Edge `(i, i+1)` of a polygon treated as implicitly closed.
    pub fn closed_edge(&self, i: usize) -> (&Pt, &Pt) {
        let n = self.points.len();
        (&self.points[i], &self.points[(i + 1) % n])
    }

    pub fn closed_edges(&self) -> impl Iterator<Item = (&Pt, &Pt)> {
        (0..self.points.len()).map(move |i| self.closed_edge(i))
    }

    /// Collapse collinear consecutive segments. Operates on the polygon as
    /// an *open* chain (callers that want closed-polygon simplification
    /// should rotate the collinear middle point to an end first, as the
    /// original source does — not required for the router's correctness,
    /// only for display tidiness).
    pub fn simplify(&mut self) {
        if self.points.len() < 3 {
            return;
        }
        let mut out: Vec<Pt> = Vec::with_capacity(self.points.len());
        out.push(self.points[0]);
        for (a, b, c) in self.points.iter().tuple_windows() {
            if vec_dir(a, b, c) == Dir::Collinear {
                // Drop b; keep walking with (a, c) as the new pair by not
                // pushing b. `a` in the next iteration is still the
                // original prior point because we only ever push onto
                // `out`, never mutate the source iterator.
                continue;
            }
            out.push(*b);
        }
        out.push(*self.points.last().unwrap());
        out.dedup_by(|a, b| *a == *b);
        self.points = out;
    }

    pub fn bounding_rect(&self) -> Option<BBox> {
        BBox::of(&self.points)
    }

    pub fn total_length(&self) -> f64 {
        self.points.iter().tuple_windows().map(|(a, b)| a.distance(b)).sum()
    }

    /// Convert a simplified polyline into a `M, L, C,C,C, L, ..., (Z)`
    /// sequence where each corner is replaced by a cubic Bézier.
    ///
    /// Each corner's Bézier endpoints sit `shorten_length` back along each
    /// adjoining segment, with the two interior control points at the
    /// midpoints between those endpoints and the original corner. When
    /// `shorten_length` exceeds a segment's length, that corner degrades
    /// gracefully to the corner itself (no curve emitted there).
    pub fn curved_polyline(&self, curve_amount: f64, closed: bool) -> CurvedPolyline {
        let pts = &self.points;
        let n = pts.len();
        let mut ops: Vec<(PathOp, Pt)> = Vec::new();
        if n == 0 {
            return CurvedPolyline { ops };
        }
        if n < 3 {
            ops.push((PathOp::M, pts[0]));
            for p in &pts[1..] {
                ops.push((PathOp::L, *p));
            }
            if closed && n > 1 {
                ops.push((PathOp::Z, pts[0]));
            }
            return CurvedPolyline { ops };
        }

        let shorten_length = curve_amount.max(0.0);
        let corner_count = if closed { n } else { n - 2 };
        let neighbour = |i: usize, delta: isize| -> usize {
            let len = n as isize;
            (((i as isize + delta) % len) + len) as usize % n
        };

        let shortened_towards = |from: &Pt, towards: &Pt| -> Pt {
            let seg_len = from.distance(towards);
            if seg_len <= f64::EPSILON {
                return *from;
            }
            let t = (shorten_length / seg_len).min(1.0);
            Pt::new(from.x + (towards.x - from.x) * t, from.y + (towards.y - from.y) * t)
        };

        let start_idx = if closed { 0 } else { 1 };
        ops.push((PathOp::M, if closed { shortened_towards(&pts[0], &pts[neighbour(0, -1)]) } else { pts[0] }));

        for k in 0..corner_count {
            let i = start_idx + k;
            let corner = pts[i % n];
            let prev = pts[neighbour(i, -1)];
            let next = pts[neighbour(i, 1)];
            let entry = shortened_towards(&corner, &prev);
            let exit = shortened_towards(&corner, &next);
            if !closed && k == 0 {
                // First real corner after the initial M: line to the entry point.
                ops.push((PathOp::L, entry));
            } else {
                ops.push((PathOp::L, entry));
            }
            let ctrl1 = midpoint(&entry, &corner);
            let ctrl2 = midpoint(&corner, &exit);
            ops.push((PathOp::C, ctrl1));
            ops.push((PathOp::C, ctrl2));
            ops.push((PathOp::C, exit));
        }

        if closed {
            ops.push((PathOp::Z, ops[0].1));
        } else {
            ops.push((PathOp::L, pts[n - 1]));
        }

        CurvedPolyline { ops }
    }
}

fn midpoint(a: &Pt, b: &Pt) -> Pt {
    Pt::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// A polyline annotated with path-operation tags, for curved-corner
/// rendering (spec.md §3/§4.2).
#[derive(Debug, Clone)]
pub struct CurvedPolyline {
    pub ops: Vec<(PathOp, Pt)>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn translate_shifts_every_point() {
        let mut p = Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(1.0, 1.0)]);
        p.translate(5.0, -2.0);
        assert_eq!(p.points[0], Pt::new(5.0, -2.0));
        assert_eq!(p.points[1], Pt::new(6.0, -1.0));
    }

    #[test]
    fn simplify_collapses_collinear_points() {
        let mut p = Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(5.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0)]);
        p.simplify();
        assert_eq!(p.points, vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0)]);
    }

    #[test]
    fn bounding_rect_matches_points() {
        let p = Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(10.0, 5.0), Pt::new(-2.0, 3.0)]);
        let bb = p.bounding_rect().unwrap();
        assert_eq!(bb.min_x, -2.0);
        assert_eq!(bb.max_x, 10.0);
    }

    #[test]
    fn total_length_sums_segments() {
        let p = Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(3.0, 4.0), Pt::new(3.0, 0.0)]);
        assert!((p.total_length() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn curved_polyline_degrades_to_corner_when_shorten_exceeds_segment() {
        let p = Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(1.0, 0.0), Pt::new(1.0, 1.0)]);
        let curved = p.curved_polyline(1000.0, false);
        // With shorten_length clamped to segment length, entry/exit collapse
        // onto the corner itself; no NaNs, no panics, and it still begins
        // with an M and ends with an L.
        assert!(matches!(curved.ops.first().unwrap().0, PathOp::M));
        assert!(matches!(curved.ops.last().unwrap().0, PathOp::L));
    }

    #[test]
    fn curved_polyline_produces_bezier_triples_per_corner() {
        let p = Polygon::new(vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0), Pt::new(20.0, 10.0)]);
        let curved = p.curved_polyline(2.0, false);
        let c_count = curved.ops.iter().filter(|(op, _)| *op == PathOp::C).count();
        assert_eq!(c_count, 3 * 2); // 2 interior corners, 3 Cs each
    }
}
