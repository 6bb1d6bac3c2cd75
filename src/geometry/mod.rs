//! Planar geometry primitives shared by growth and elevation.
//!
//! Everything works on metric `glam::Vec2` points. The only subtlety is
//! point-to-segment projection, which reports whether the nearest point of
//! the segment was an endpoint - callers treat endpoint hits as "near a
//! node" and interior hits as "near an edge" or interpolate across them.

use glam::Vec2;

/// Tolerance below which segments and distances count as degenerate,
/// in project units (meters).
pub const EPSILON: f32 = 1e-3;

/// Euclidean distance between two points.
#[inline]
pub fn distance(p: Vec2, q: Vec2) -> f32 {
    p.distance(q)
}

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Distance from the query point to the nearest point of the segment.
    pub dist: f32,
    /// True when the nearest point is one of the segment's endpoints
    /// (projection fell outside the segment, or the segment is degenerate).
    pub endpoint: bool,
}

/// Distance from `t` to the segment `a..b`, with the endpoint flag.
///
/// A segment shorter than [`EPSILON`] per axis collapses to `a`.
pub fn point_to_segment(t: Vec2, a: Vec2, b: Vec2) -> SegmentHit {
    let d = b - a;
    if d.x.abs() < EPSILON && d.y.abs() < EPSILON {
        return SegmentHit {
            dist: t.distance(a),
            endpoint: true,
        };
    }

    let s = (t - a).dot(d) / d.length_squared();
    if s <= 0.0 {
        SegmentHit {
            dist: t.distance(a),
            endpoint: true,
        }
    } else if s >= 1.0 {
        SegmentHit {
            dist: t.distance(b),
            endpoint: true,
        }
    } else {
        SegmentHit {
            dist: t.distance(a + s * d),
            endpoint: false,
        }
    }
}
