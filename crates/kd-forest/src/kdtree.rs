//! Append-only 2-D KD-tree with square range queries.
//!
//! Splits alternate x then y by depth. Coordinates strictly below a node's
//! split value go left, the rest go right. Incremental insertion can
//! unbalance the tree; [`KdTree::reconstruct`] rebuilds it balanced by
//! median partitioning to restore query performance.

use glam::Vec2;

/// Sentinel-free child links: nodes live in a flat arena, indexed by u32.
struct Node<P> {
    point: Vec2,
    payload: P,
    left: Option<u32>,
    right: Option<u32>,
}

/// A 2-D KD-tree mapping points to opaque payloads.
pub struct KdTree<P> {
    nodes: Vec<Node<P>>,
    root: Option<u32>,
}

impl<P> Default for KdTree<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn coord(p: Vec2, axis: usize) -> f32 {
    if axis == 0 {
        p.x
    } else {
        p.y
    }
}

impl<P> KdTree<P> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// Number of points in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a point with its payload.
    ///
    /// Duplicate points are allowed and all of them are reported by
    /// queries; nothing is ever removed.
    pub fn insert(&mut self, point: Vec2, payload: P) {
        let idx = self.nodes.len() as u32;
        self.nodes.push(Node {
            point,
            payload,
            left: None,
            right: None,
        });

        let Some(mut at) = self.root else {
            self.root = Some(idx);
            return;
        };

        let mut axis = 0;
        loop {
            let node = &mut self.nodes[at as usize];
            let link = if coord(point, axis) < coord(node.point, axis) {
                &mut node.left
            } else {
                &mut node.right
            };
            match *link {
                Some(next) => {
                    at = next;
                    axis ^= 1;
                }
                None => {
                    *link = Some(idx);
                    return;
                }
            }
        }
    }
}

impl<P: Clone> KdTree<P> {
    /// All payloads whose point lies within the axis-aligned square centered
    /// at `center` with the given half side length. Bounds are inclusive.
    pub fn search_range(&self, center: Vec2, half_side: f32) -> Vec<P> {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out;
        };

        let lo = center - Vec2::splat(half_side);
        let hi = center + Vec2::splat(half_side);

        // (node, axis) pairs; explicit stack keeps degenerate trees safe.
        let mut stack = vec![(root, 0usize)];
        while let Some((at, axis)) = stack.pop() {
            let node = &self.nodes[at as usize];
            let p = node.point;
            if p.x >= lo.x && p.x <= hi.x && p.y >= lo.y && p.y <= hi.y {
                out.push(node.payload.clone());
            }

            let split = coord(p, axis);
            // Lenient at the split value: a rebuilt tree may place ties on
            // either side.
            if let Some(left) = node.left {
                if coord(lo, axis) <= split {
                    stack.push((left, axis ^ 1));
                }
            }
            if let Some(right) = node.right {
                if coord(hi, axis) >= split {
                    stack.push((right, axis ^ 1));
                }
            }
        }
        out
    }

    /// Rebuild as a balanced tree by median-of-axis partitioning.
    ///
    /// Same point set, same query answers; only the internal shape changes.
    pub fn reconstruct(&mut self) {
        if self.nodes.len() < 3 {
            return;
        }
        let mut entries: Vec<(Vec2, P)> = self
            .nodes
            .drain(..)
            .map(|n| (n.point, n.payload))
            .collect();
        self.root = None;
        let mut rebuilt = Self {
            nodes: Vec::with_capacity(entries.len()),
            root: None,
        };
        rebuilt.root = rebuilt.build_balanced(&mut entries, 0);
        *self = rebuilt;
    }

    fn build_balanced(&mut self, entries: &mut [(Vec2, P)], axis: usize) -> Option<u32> {
        if entries.is_empty() {
            return None;
        }
        let mid = entries.len() / 2;
        entries.select_nth_unstable_by(mid, |a, b| {
            coord(a.0, axis).total_cmp(&coord(b.0, axis))
        });

        let (point, payload) = entries[mid].clone();
        let idx = self.nodes.len() as u32;
        self.nodes.push(Node {
            point,
            payload,
            left: None,
            right: None,
        });

        let (lower, rest) = entries.split_at_mut(mid);
        let left = self.build_balanced(lower, axis ^ 1);
        let right = self.build_balanced(&mut rest[1..], axis ^ 1);
        let node = &mut self.nodes[idx as usize];
        node.left = left;
        node.right = right;
        Some(idx)
    }

    /// Payloads in breadth-first order. Only used to verify tree structure
    /// in tests.
    pub fn breadth_first_search(&self) -> Vec<P> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root else {
            return out;
        };
        let mut queue = std::collections::VecDeque::from([root]);
        while let Some(at) = queue.pop_front() {
            let node = &self.nodes[at as usize];
            out.push(node.payload.clone());
            if let Some(left) = node.left {
                queue.push_back(left);
            }
            if let Some(right) = node.right {
                queue.push_back(right);
            }
        }
        out
    }
}
