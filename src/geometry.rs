//! Geometry kernel: validity and spatial-consistency predicates over rings
//!
//! Every predicate works on the plane with x = lng and y = lat. Classification
//! relies on the exact orientation predicates inside `geo`, so there is no
//! tolerance: a vertex lying exactly on another edge touches it, anything that
//! misses by one ulp does not.
//!
//! Coordinates must lie on the globe (|lat| <= 90, |lng| <= 180). Rings outside
//! that range are treated as unusable, which keeps area and centroid finite.

use geo::algorithm::kernels::{Kernel, Orientation, RobustKernel};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Centroid, ChamberlainDuquetteArea, Contains, Coord, Line, LineString, Relate};

use crate::regions::{Point, Ring};

/// Axis-aligned lat/lng bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// True if the boxes share at least one point (closed intervals)
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lng <= other.max_lng
            && other.min_lng <= self.max_lng
    }

    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

/// Get the bounding box, or None for an empty ring
pub fn bounds(ring: &Ring) -> Option<Bounds> {
    let points = ring.points();
    if points.is_empty() {
        return None;
    }

    let mut min_lat = f64::MAX;
    let mut min_lng = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.lat);
        min_lng = min_lng.min(p.lng);
        max_lat = max_lat.max(p.lat);
        max_lng = max_lng.max(p.lng);
    }

    Some(Bounds {
        min_lat,
        min_lng,
        max_lat,
        max_lng,
    })
}

#[inline]
fn coord(p: &Point) -> Coord<f64> {
    Coord { x: p.lng, y: p.lat }
}

fn to_geo(ring: &Ring) -> geo::Polygon<f64> {
    let exterior: LineString<f64> = ring.points().iter().map(coord).collect();
    geo::Polygon::new(exterior, vec![])
}

fn on_globe(p: &Point) -> bool {
    p.is_finite() && p.lat.abs() <= 90.0 && p.lng.abs() <= 180.0
}

/// At least three vertices, all finite and on the globe
fn is_usable(ring: &Ring) -> bool {
    ring.len() >= 3 && ring.points().iter().all(on_globe)
}

/// True when every vertex lies on one line, i.e. the ring encloses nothing
fn is_collinear(points: &[Point]) -> bool {
    let Some(first) = points.first().map(coord) else {
        return true;
    };
    let Some(second) = points.iter().map(coord).find(|c| *c != first) else {
        return true;
    };
    points
        .iter()
        .map(coord)
        .all(|c| RobustKernel::orient2d(first, second, c) == Orientation::Collinear)
}

fn distinct_vertices(points: &[Point]) -> usize {
    let mut seen: Vec<&Point> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.contains(&p) {
            seen.push(p);
        }
    }
    seen.len()
}

/// Check whether a ring is unusable as a polygon boundary.
///
/// Two edges that are not neighbours must not meet at all. Neighbouring edges
/// may only meet at their shared vertex; a collinear fold-back is a violation.
/// Degenerate rings also count as self-intersecting: fewer than three
/// distinct vertices, a zero-length edge, all vertices on one line, or a
/// coordinate that is not finite or lies off the globe.
pub fn is_self_intersecting(ring: &Ring) -> bool {
    if !is_usable(ring) {
        return true;
    }

    let points = ring.points();
    let n = points.len();
    if distinct_vertices(points) < 3 {
        return true;
    }

    let edges: Vec<Line<f64>> = ring
        .edges()
        .map(|(a, b)| Line::new(coord(a), coord(b)))
        .collect();

    if edges.iter().any(|e| e.start == e.end) {
        return true;
    }

    if is_collinear(points) {
        return true;
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return true,
            }
        }
    }

    false
}

/// Check whether two polygons conflict.
///
/// Conflict means the interiors share area: the boundaries cross, or one ring
/// encloses the other. Shared edges and touching vertices are not conflicts.
/// Identical rings conflict.
pub fn overlaps(a: &Ring, b: &Ring) -> bool {
    if !is_usable(a) || !is_usable(b) {
        return false;
    }

    match (bounds(a), bounds(b)) {
        (Some(ba), Some(bb)) if ba.intersects(&bb) => {}
        _ => return false,
    }

    let matrix = to_geo(a).relate(&to_geo(b));
    matrix.is_intersects() && !matrix.is_touches()
}

/// Surface area in square metres on a spherical earth.
///
/// Returns 0 for rings that cannot enclose anything.
pub fn area(ring: &Ring) -> f64 {
    if !is_usable(ring) {
        return 0.0;
    }
    to_geo(ring).chamberlain_duquette_unsigned_area()
}

/// Centroid of the enclosed area (not the vertex average).
///
/// Zero-area rings fall back to the centroid of their outline. Returns None
/// for an empty ring or one with a coordinate off the globe.
pub fn centroid(ring: &Ring) -> Option<Point> {
    if !ring.points().iter().all(on_globe) {
        return None;
    }
    to_geo(ring).centroid().map(|c| Point::new(c.y(), c.x()))
}

/// Point-in-polygon hit test; points on the boundary are outside
pub fn contains_point(ring: &Ring, point: Point) -> bool {
    if !is_usable(ring) || !point.is_finite() {
        return false;
    }
    to_geo(ring).contains(&geo::Point::new(point.lng, point.lat))
}
