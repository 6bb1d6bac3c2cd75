//! The coastline: a closed ring of vertices with a signed distance field.
//!
//! Distance is positive strictly inside the land polygon, zero on the
//! boundary, negative at sea. The sign comes from an even-odd ray cast and
//! the magnitude from the nearest boundary segment, so the two always
//! agree on the boundary itself.

use std::ops::Index;

use glam::Vec2;

use crate::geometry::point_to_segment;

/// A closed shoreline polygon.
///
/// Construction accepts either an open vertex ring or one whose last vertex
/// repeats the first; the ring is closed implicitly either way, and
/// indexing works on the deduplicated vertices.
pub struct Shore {
    vertices: Vec<Vec2>,
}

impl Shore {
    pub fn new(mut contour: Vec<Vec2>) -> Self {
        if contour.len() > 1 && contour.first() == contour.last() {
            contour.pop();
        }
        Self { vertices: contour }
    }

    /// Number of distinct vertices on the ring.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Segments of the ring, wrapping from the last vertex to the first.
    fn segments(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Even-odd ray cast along +x.
    fn contains(&self, p: Vec2) -> bool {
        let mut inside = false;
        for (a, b) in self.segments() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Signed Euclidean distance to the shoreline: positive inland,
    /// negative at sea.
    pub fn distance_to_shore(&self, p: Vec2) -> f32 {
        let mut nearest = f32::INFINITY;
        for (a, b) in self.segments() {
            nearest = nearest.min(point_to_segment(p, a, b).dist);
        }
        if self.contains(p) {
            nearest
        } else {
            -nearest
        }
    }
}

impl Index<usize> for Shore {
    type Output = Vec2;

    fn index(&self, i: usize) -> &Vec2 {
        &self.vertices[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexagon() -> Shore {
        Shore::new(vec![
            Vec2::new(-1000.0, 1320.0),
            Vec2::new(-2000.0, 0.0),
            Vec2::new(-1000.0, -1720.0),
            Vec2::new(1000.0, -1720.0),
            Vec2::new(2000.0, 0.0),
            Vec2::new(1000.0, 1320.0),
        ])
    }

    #[test]
    fn signed_distance_inland() {
        let shore = hexagon();
        assert!((shore.distance_to_shore(Vec2::new(-600.0, -1600.0)) - 120.0).abs() < 1.0);
        assert!((shore.distance_to_shore(Vec2::new(0.0, 0.0)) - 1320.0).abs() < 1.0);
    }

    #[test]
    fn signed_distance_at_sea_is_negative() {
        let shore = hexagon();
        assert!((shore.distance_to_shore(Vec2::new(0.0, 1400.0)) + 80.0).abs() < 1.0);
        assert!(shore.distance_to_shore(Vec2::new(-3000.0, 0.0)) < 0.0);
    }

    #[test]
    fn closing_vertex_is_dropped() {
        let open = hexagon();
        let closed = Shore::new(vec![
            Vec2::new(-1000.0, 1320.0),
            Vec2::new(-2000.0, 0.0),
            Vec2::new(-1000.0, -1720.0),
            Vec2::new(1000.0, -1720.0),
            Vec2::new(2000.0, 0.0),
            Vec2::new(1000.0, 1320.0),
            Vec2::new(-1000.0, 1320.0),
        ]);
        assert_eq!(open.len(), closed.len());
        assert_eq!(closed[4], Vec2::new(2000.0, 0.0));
    }
}
