//! The honeycomb: ridge endpoints (Qs), ridges, and per-cell ridge lists.
//!
//! Built elsewhere and consumed read-only here. For each river node, the
//! ridges listed are the boundary segments of its cell that are neither
//! crossed by a river nor on the shore; a ridge with a single endpoint is a
//! degenerate point-ridge and still counts toward nearest-ridge queries.

use glam::Vec2;
use rustc_hash::FxHashMap;

use crate::hydrology::NodeId;

/// A ridge endpoint.
#[derive(Debug, Clone)]
pub struct Q {
    pub position: Vec2,
    pub elevation: f32,
    /// Ids of the hydrology cells this endpoint borders.
    pub cells: Vec<NodeId>,
}

/// A ridge between two Qs, or a point-ridge when `q1` is absent.
#[derive(Debug, Clone, Copy)]
pub struct Ridge {
    pub q0: u64,
    pub q1: Option<u64>,
}

/// Read-only ridge graph, loaded in three passes: Qs, then ridges, then
/// cell memberships.
#[derive(Default)]
pub struct Honeycomb {
    qs: FxHashMap<u64, Q>,
    ridges: FxHashMap<u64, Ridge>,
    cell_ridges: FxHashMap<NodeId, Vec<u64>>,
}

impl Honeycomb {
    pub fn new() -> Self {
        Self::default()
    }

    /// First pass: register a ridge endpoint under its save id.
    pub fn insert_q(&mut self, id: u64, position: Vec2, elevation: f32, cells: Vec<NodeId>) {
        self.qs.insert(
            id,
            Q {
                position,
                elevation,
                cells,
            },
        );
    }

    /// Second pass: register a ridge between previously registered Qs.
    pub fn insert_ridge(&mut self, id: u64, q0: u64, q1: Option<u64>) {
        self.ridges.insert(id, Ridge { q0, q1 });
    }

    /// Third pass: append a ridge to a cell's boundary list.
    pub fn insert_cell_ridge(&mut self, cell: NodeId, ridge: u64) {
        self.cell_ridges.entry(cell).or_default().push(ridge);
    }

    pub fn q(&self, id: u64) -> Option<&Q> {
        self.qs.get(&id)
    }

    pub fn ridge(&self, id: u64) -> Option<&Ridge> {
        self.ridges.get(&id)
    }

    /// Ridges bounding a cell, in load order. Unknown cells have none.
    pub fn cell_ridges(&self, cell: NodeId) -> &[u64] {
        self.cell_ridges.get(&cell).map_or(&[], Vec::as_slice)
    }

    pub fn num_qs(&self) -> usize {
        self.qs.len()
    }

    pub fn num_ridges(&self) -> usize {
        self.ridges.len()
    }
}
