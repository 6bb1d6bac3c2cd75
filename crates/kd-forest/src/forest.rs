//! A grid of KD-trees with per-tile reader/writer locks.
//!
//! The bounding box is partitioned into tiles of side at most the requested
//! edge length. Point insertion write-locks one tile; range queries
//! read-lock the tiles the query square touches, one at a time. An
//! [`AreaLock`] write-locks every tile touching a square so a worker can
//! read the area and insert into it as one atomic step.
//!
//! Every code path acquires tiles in ascending row-major index order, which
//! rules out lock-order cycles between overlapping operations.

use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use glam::Vec2;

use crate::KdTree;

/// A regular grid of lockable KD-tree tiles covering a rectangle.
pub struct Forest<P> {
    lower: Vec2,
    upper: Vec2,
    nx: usize,
    ny: usize,
    tile_w: f32,
    tile_h: f32,
    /// Row-major: tile (ix, iy) lives at `iy * nx + ix`.
    tiles: Vec<RwLock<KdTree<P>>>,
}

impl<P> Forest<P> {
    /// Partition `lower..upper` into tiles of side `<= tile_edge`.
    ///
    /// Degenerate extents still get one tile per axis, so every point has a
    /// home tile (out-of-range points are clamped to the border tiles).
    pub fn new(lower: Vec2, upper: Vec2, tile_edge: f32) -> Self {
        let extent = (upper - lower).max(Vec2::ZERO);
        let nx = ((extent.x / tile_edge).ceil() as usize).max(1);
        let ny = ((extent.y / tile_edge).ceil() as usize).max(1);
        let mut tiles = Vec::with_capacity(nx * ny);
        tiles.resize_with(nx * ny, || RwLock::new(KdTree::new()));
        Self {
            lower,
            upper,
            nx,
            ny,
            tile_w: extent.x / nx as f32,
            tile_h: extent.y / ny as f32,
            tiles,
        }
    }

    /// The rectangle this forest covers.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        (self.lower, self.upper)
    }

    fn tile_index(&self, point: Vec2) -> usize {
        let ix = if self.tile_w > 0.0 {
            (((point.x - self.lower.x) / self.tile_w) as isize).clamp(0, self.nx as isize - 1)
        } else {
            0
        };
        let iy = if self.tile_h > 0.0 {
            (((point.y - self.lower.y) / self.tile_h) as isize).clamp(0, self.ny as isize - 1)
        } else {
            0
        };
        iy as usize * self.nx + ix as usize
    }

    /// Ascending row-major indices of tiles intersecting the query square.
    fn tile_span(&self, center: Vec2, half_side: f32) -> Vec<usize> {
        let lo = self.tile_index(center - Vec2::splat(half_side));
        let hi = self.tile_index(center + Vec2::splat(half_side));
        let (ix0, iy0) = (lo % self.nx, lo / self.nx);
        let (ix1, iy1) = (hi % self.nx, hi / self.nx);
        let mut span = Vec::with_capacity((ix1 - ix0 + 1) * (iy1 - iy0 + 1));
        for iy in iy0..=iy1 {
            for ix in ix0..=ix1 {
                span.push(iy * self.nx + ix);
            }
        }
        span
    }

    /// Insert a point into its tile, blocking while that tile is area-locked.
    pub fn insert(&self, point: Vec2, payload: P) {
        let tile = self.tile_index(point);
        self.tiles[tile]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point, payload);
    }
}

impl<P: Clone> Forest<P> {
    /// Union of tile range searches over the query square. Tiles are
    /// visited in ascending order and released between visits.
    pub fn search_range(&self, center: Vec2, half_side: f32) -> Vec<P> {
        let mut out = Vec::new();
        for tile in self.tile_span(center, half_side) {
            let tree = self.tiles[tile]
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            out.extend(tree.search_range(center, half_side));
        }
        out
    }

    /// Exclusively lock every tile the square touches.
    ///
    /// Writer locks are taken in ascending tile order; the handle releases
    /// them all on drop. While held, conflicting inserts, searches and area
    /// locks block; disjoint ones proceed.
    pub fn area_lock(&self, center: Vec2, half_side: f32) -> AreaLock<'_, P> {
        let span = self.tile_span(center, half_side);
        let guards = span
            .iter()
            .map(|&tile| {
                self.tiles[tile]
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
            })
            .collect();
        AreaLock {
            forest: self,
            span,
            guards,
        }
    }
}

/// Exclusive hold over a contiguous block of tiles. See [`Forest::area_lock`].
pub struct AreaLock<'a, P> {
    forest: &'a Forest<P>,
    span: Vec<usize>,
    guards: Vec<RwLockWriteGuard<'a, KdTree<P>>>,
}

impl<P: Clone> AreaLock<'_, P> {
    /// Insert through the held locks. The point must fall in a locked tile.
    pub fn insert(&mut self, point: Vec2, payload: P) {
        let tile = self.forest.tile_index(point);
        let at = self
            .span
            .binary_search(&tile)
            .expect("insertion point outside the locked area");
        self.guards[at].insert(point, payload);
    }

    /// Range search within the held locks. The query square must lie inside
    /// the locked area; tiles outside it are not consulted.
    pub fn search_range(&self, center: Vec2, half_side: f32) -> Vec<P> {
        let mut out = Vec::new();
        for tile in self.forest.tile_span(center, half_side) {
            if let Ok(at) = self.span.binary_search(&tile) {
                out.extend(self.guards[at].search_range(center, half_side));
            }
        }
        out
    }
}
