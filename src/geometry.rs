//! Geometry primitives (C1): points, signed-area orientation, segment
//! intersection, valid-region tests, point-in-polygon.
//!
//! All tolerance-bearing tests live here so every other module shares one
//! definition of "collinear enough" and "crossing enough".

use crate::ids::{ShapeId, VertexId};

/// Twice-signed-area values within this of zero are treated as collinear.
pub const AREA_TOLERANCE: f64 = 1e-3;
/// Coordinate-level tolerance used for equality-ish comparisons.
pub const COORD_TOLERANCE: f64 = 1e-4;
/// Absolute coordinate range the router guarantees correct behaviour within;
/// inputs are clipped to this range (spec.md §7).
pub const COORD_CLIP: f64 = 1e8;

/// A point in the routing plane.
///
/// `owner` and `vertex_number` are diagnostic-only tag fields used to relate
/// display-route points back to graph vertices; they do not participate in
/// equality or ordering beyond the coordinates themselves mattering for
/// hashing/equality (point equality is exact bit-equal coordinates, per
/// spec.md §3).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Pt {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<VertexId>,
    #[serde(default)]
    pub vertex_number: u32,
}

impl Pt {
    pub fn new(x: f64, y: f64) -> Self {
        Pt { x: clip_coord(x), y: clip_coord(y), owner: None, vertex_number: 0 }
    }

    pub fn tagged(x: f64, y: f64, owner: VertexId, vertex_number: u32) -> Self {
        Pt { x: clip_coord(x), y: clip_coord(y), owner: Some(owner), vertex_number }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Pt::new(self.x + dx, self.y + dy)
    }

    pub fn distance2(&self, other: &Pt) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Pt) -> f64 {
        self.distance2(other).sqrt()
    }
}

impl PartialEq for Pt {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}
impl Eq for Pt {}

impl PartialOrd for Pt {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Pt {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.x
            .partial_cmp(&other.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.y.partial_cmp(&other.y).unwrap_or(std::cmp::Ordering::Equal))
    }
}

fn clip_coord(v: f64) -> f64 {
    v.clamp(-COORD_CLIP, COORD_CLIP)
}

/// Orientation of the turn `a -> b -> c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Clockwise,
    CounterClockwise,
    Collinear,
}

/// Signed (twice-)area test with the documented tolerance (spec.md §4.1).
pub fn vec_dir(a: &Pt, b: &Pt, c: &Pt) -> Dir {
    let twice_area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if twice_area.abs() <= AREA_TOLERANCE {
        Dir::Collinear
    } else if twice_area > 0.0 {
        Dir::CounterClockwise
    } else {
        Dir::Clockwise
    }
}

fn on_segment(a: &Pt, b: &Pt, p: &Pt) -> bool {
    p.x >= a.x.min(b.x) - COORD_TOLERANCE
        && p.x <= a.x.max(b.x) + COORD_TOLERANCE
        && p.y >= a.y.min(b.y) - COORD_TOLERANCE
        && p.y <= a.y.max(b.y) + COORD_TOLERANCE
}

/// True iff the *open* segments `ab` and `cd` properly cross. Endpoint
/// contact (shared endpoint, or one segment's endpoint touching the
/// interior of the other) returns false.
pub fn segment_intersect(a: &Pt, b: &Pt, c: &Pt, d: &Pt) -> bool {
    let d1 = vec_dir(c, d, a);
    let d2 = vec_dir(c, d, b);
    let d3 = vec_dir(a, b, c);
    let d4 = vec_dir(a, b, d);

    if d1 != d2 && d3 != d4 && d1 != Dir::Collinear && d2 != Dir::Collinear && d3 != Dir::Collinear && d4 != Dir::Collinear {
        return true;
    }
    // Collinear overlap without a shared endpoint counts as a crossing too,
    // but pure endpoint contact must not.
    if d1 == Dir::Collinear && on_segment(c, d, a) && *a != *c && *a != *d {
        return true;
    }
    if d2 == Dir::Collinear && on_segment(c, d, b) && *b != *c && *b != *d {
        return true;
    }
    if d3 == Dir::Collinear && on_segment(a, b, c) && *c != *a && *c != *b {
        return true;
    }
    if d4 == Dir::Collinear && on_segment(a, b, d) && *d != *a && *d != *b {
        return true;
    }
    false
}

/// Like [`segment_intersect`] but tolerant of a single endpoint-touch
/// against the shape boundary (so that shapes can share a corner/edge
/// without blocking visibility through that single touch point); a second
/// endpoint-touch is treated as blocking, so shapes butted end-to-end don't
/// allow visibility straight through the join (spec.md §4.1).
pub fn segment_shape_intersect(a: &Pt, b: &Pt, shape_a: &Pt, shape_b: &Pt, touches_seen: &mut u32) -> bool {
    let touches = [*shape_a == *a, *shape_a == *b, *shape_b == *a, *shape_b == *b]
        .iter()
        .filter(|t| **t)
        .count();
    if touches > 0 {
        *touches_seen += touches as u32;
        return *touches_seen > 1;
    }
    segment_intersect(a, b, shape_a, shape_b)
}

/// Tests whether `b` lies in the locally valid half-plane at shape corner
/// `a1`, given its neighbours `a0` (previous corner) and `a2` (next corner).
///
/// At a convex corner the valid region is the single wedge *outside* the
/// shape; at a concave corner it is the union of the two half-planes beyond
/// each adjoining edge (so visibility can "wrap" around the reflex corner).
/// When `ignore_regions` is set, concave corners are treated as always
/// valid (visibility allowed to cut across the shape at that corner).
pub fn in_valid_region(ignore_regions: bool, a0: &Pt, a1: &Pt, a2: &Pt, b: &Pt) -> bool {
    let corner = vec_dir(a0, a1, a2);
    if corner == Dir::Collinear {
        // Degenerate / straight boundary: any non-backwards direction is valid.
        return true;
    }
    let side1 = vec_dir(a0, a1, b);
    let side2 = vec_dir(a1, a2, b);
    let convex = corner == Dir::CounterClockwise;
    if convex {
        // b must be outside both adjoining half-planes (strictly convex wedge).
        (side1 != Dir::Clockwise) && (side2 != Dir::Clockwise)
    } else if ignore_regions {
        true
    } else {
        // Concave: b valid if outside of either adjoining edge.
        (side1 != Dir::Clockwise) || (side2 != Dir::Clockwise)
    }
}

/// Point-in-polygon for convex polygons only, via a signed-area loop: `p` is
/// inside iff it is on the same (non-boundary) side of every edge.
pub fn in_poly(poly: &[Pt], p: &Pt) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut saw_ccw = false;
    let mut saw_cw = false;
    for i in 0..poly.len() {
        let a = &poly[i];
        let b = &poly[(i + 1) % poly.len()];
        match vec_dir(a, b, p) {
            Dir::CounterClockwise => saw_ccw = true,
            Dir::Clockwise => saw_cw = true,
            Dir::Collinear => {}
        }
        if saw_ccw && saw_cw {
            return false;
        }
    }
    true
}

/// General point-in-polygon via crossings of both a right-going and a
/// left-going horizontal ray from `p`; `p` counts as inside iff the two
/// crossing parities agree (spec.md §4.1). Works for non-convex, possibly
/// self-touching polygons.
pub fn in_poly_general(poly: &[Pt], p: &Pt) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut right_crossings = 0u32;
    let mut left_crossings = 0u32;
    let n = poly.len();
    for i in 0..n {
        let a = &poly[i];
        let b = &poly[(i + 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let t = (p.y - a.y) / (b.y - a.y);
            let x_at_y = a.x + t * (b.x - a.x);
            if x_at_y > p.x {
                right_crossings += 1;
            }
            if x_at_y < p.x {
                left_crossings += 1;
            }
        }
    }
    (right_crossings % 2 == 1) == (left_crossings % 2 == 1)
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn of(points: &[Pt]) -> Option<Self> {
        let mut it = points.iter();
        let first = it.next()?;
        let mut bb = BBox { min_x: first.x, min_y: first.y, max_x: first.x, max_y: first.y };
        for p in it {
            bb.min_x = bb.min_x.min(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_x = bb.max_x.max(p.x);
            bb.max_y = bb.max_y.max(p.y);
        }
        Some(bb)
    }

    pub fn contains(&self, p: &Pt) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn overlaps(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x && self.max_x >= other.min_x && self.min_y <= other.max_y && self.max_y >= other.min_y
    }
}

/// A reference to the shape that blocks an edge, or one of the sentinel
/// blocker kinds (spec.md §3 EdgeInf).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    None,
    Shape(ShapeId),
    /// A "cycle blocker": a directly-connected endpoint pair discovered to
    /// need blocking to prevent degenerate zero-length rediscovery of a
    /// failed search (spec.md §4.6, §7, Glossary).
    CycleBlocker,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vec_dir_basic() {
        let a = Pt::new(0.0, 0.0);
        let b = Pt::new(10.0, 0.0);
        let c = Pt::new(10.0, 10.0);
        assert_eq!(vec_dir(&a, &b, &c), Dir::CounterClockwise);
        assert_eq!(vec_dir(&a, &c, &b), Dir::Clockwise);
        let d = Pt::new(20.0, 0.0);
        assert_eq!(vec_dir(&a, &b, &d), Dir::Collinear);
    }

    #[test]
    fn segment_intersect_proper_cross() {
        let a = Pt::new(0.0, 0.0);
        let b = Pt::new(10.0, 10.0);
        let c = Pt::new(0.0, 10.0);
        let d = Pt::new(10.0, 0.0);
        assert!(segment_intersect(&a, &b, &c, &d));
    }

    #[test]
    fn segment_intersect_endpoint_touch_is_not_crossing() {
        let a = Pt::new(0.0, 0.0);
        let b = Pt::new(10.0, 10.0);
        let c = Pt::new(10.0, 10.0);
        let d = Pt::new(20.0, 0.0);
        assert!(!segment_intersect(&a, &b, &c, &d));
    }

    #[test]
    fn in_poly_square() {
        let sq = vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0), Pt::new(0.0, 10.0)];
        assert!(in_poly(&sq, &Pt::new(5.0, 5.0)));
        assert!(!in_poly(&sq, &Pt::new(15.0, 5.0)));
    }

    #[test]
    fn in_poly_general_matches_convex_case() {
        let sq = vec![Pt::new(0.0, 0.0), Pt::new(10.0, 0.0), Pt::new(10.0, 10.0), Pt::new(0.0, 10.0)];
        assert!(in_poly_general(&sq, &Pt::new(5.0, 5.0)));
        assert!(!in_poly_general(&sq, &Pt::new(15.0, 5.0)));
    }

    #[test]
    fn in_poly_general_concave() {
        // A "C" shaped concave polygon (notch cut from the right side).
        let poly = vec![
            Pt::new(0.0, 0.0),
            Pt::new(10.0, 0.0),
            Pt::new(10.0, 4.0),
            Pt::new(4.0, 4.0),
            Pt::new(4.0, 6.0),
            Pt::new(10.0, 6.0),
            Pt::new(10.0, 10.0),
            Pt::new(0.0, 10.0),
        ];
        assert!(in_poly_general(&poly, &Pt::new(1.0, 5.0)));
        assert!(!in_poly_general(&poly, &Pt::new(7.0, 5.0)));
    }

    #[test]
    fn bbox_of_points() {
        let pts = vec![Pt::new(1.0, 2.0), Pt::new(-3.0, 5.0), Pt::new(4.0, -1.0)];
        let bb = BBox::of(&pts).unwrap();
        assert_eq!(bb.min_x, -3.0);
        assert_eq!(bb.max_x, 4.0);
        assert_eq!(bb.min_y, -1.0);
        assert_eq!(bb.max_y, 5.0);
    }

    #[test]
    fn coordinates_are_clipped() {
        let p = Pt::new(1e10, -1e10);
        assert_eq!(p.x, COORD_CLIP);
        assert_eq!(p.y, -COORD_CLIP);
    }
}
