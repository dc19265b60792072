use super::{Point, PolygonId};
use crate::geometry::{self, Bounds};
use serde::{Deserialize, Serialize};

/// An implicitly closed loop of vertices.
///
/// The closing vertex is never stored: a trailing point equal to the first one
/// is dropped on construction. Any number of points is accepted here; the
/// geometry kernel decides whether the ring is usable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
pub struct Ring {
    points: Vec<Point>,
}

impl Ring {
    pub fn new(mut points: Vec<Point>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Edges as (start, end) pairs, including the closing edge
    pub fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> {
        let n = self.points.len();
        (0..n).map(move |i| (&self.points[i], &self.points[(i + 1) % n]))
    }

    pub fn bounds(&self) -> Option<Bounds> {
        geometry::bounds(self)
    }

    pub fn is_self_intersecting(&self) -> bool {
        geometry::is_self_intersecting(self)
    }

    pub fn contains(&self, point: Point) -> bool {
        geometry::contains_point(self, point)
    }
}

impl From<Vec<Point>> for Ring {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl From<Ring> for Vec<Point> {
    fn from(ring: Ring) -> Self {
        ring.points
    }
}

impl FromIterator<Point> for Ring {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A polygon with a single outer boundary and no holes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub id: PolygonId,
    pub ring: Ring,
}

impl Polygon {
    /// Create a polygon with a freshly minted identity
    pub fn new(ring: Ring) -> Self {
        Self::with_id(PolygonId::new(), ring)
    }

    pub fn with_id(id: PolygonId, ring: Ring) -> Self {
        Self { id, ring }
    }

    /// Surface area in square metres
    pub fn area(&self) -> f64 {
        geometry::area(&self.ring)
    }

    /// Area centroid; None only for an empty ring
    pub fn centroid(&self) -> Option<Point> {
        geometry::centroid(&self.ring)
    }

    pub fn overlaps(&self, other: &Polygon) -> bool {
        geometry::overlaps(&self.ring, &other.ring)
    }

    pub fn contains(&self, point: Point) -> bool {
        self.ring.contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lng: f64) -> Point {
        Point::new(lat, lng)
    }

    #[test]
    fn test_closing_vertex_is_dropped() {
        let ring = Ring::new(vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(0.0, 0.0)]);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.points().last(), Some(&p(1.0, 1.0)));
    }

    #[test]
    fn test_single_point_ring_is_kept() {
        let ring = Ring::new(vec![p(3.0, 4.0)]);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_edges_wrap_around() {
        let ring = Ring::new(vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0)]);
        let edges: Vec<_> = ring.edges().collect();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2], (&p(1.0, 1.0), &p(0.0, 0.0)));
    }

    #[test]
    fn test_ring_serializes_as_point_list() {
        let ring = Ring::new(vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0)]);
        let json = serde_json::to_string(&ring).unwrap();
        assert!(json.starts_with('['));

        let closed = r#"[{"lat":0.0,"lng":0.0},{"lat":0.0,"lng":1.0},{"lat":1.0,"lng":1.0},{"lat":0.0,"lng":0.0}]"#;
        let back: Ring = serde_json::from_str(closed).unwrap();
        assert_eq!(back, ring);
    }

    #[test]
    fn test_new_polygons_get_distinct_ids() {
        let ring = Ring::new(vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0)]);
        let a = Polygon::new(ring.clone());
        let b = Polygon::new(ring);
        assert_ne!(a.id, b.id);
        assert_eq!(a.ring, b.ring);
    }
}
