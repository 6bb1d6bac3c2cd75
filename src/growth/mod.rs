//! River-network growth: configuration, expansion rules, parallel driver.
//!
//! Growth starts from mouth nodes seeded on the shore and repeatedly
//! expands a candidate node chosen by priority, proposing children one
//! edge length away and rejecting positions that crowd the shore, other
//! nodes, or existing edges. Workers run the select-expand loop in
//! parallel; the candidate set is behind a mutex and each expansion holds
//! an area lock over the tiles it reads and writes.

mod grower;
mod rules;

pub use grower::grow;
pub use rules::{alpha, coast_normal, is_acceptable_position, pick_new_node_loc, select_node};

use std::sync::{Mutex, PoisonError};

use glam::Vec2;

use crate::hydrology::{Hydrology, NodeId};
use crate::raster::Raster;
use crate::shore::Shore;
use crate::store::{StoreDoc, StoreError};

/// Rule parameters, straight off the grower command line.
#[derive(Debug, Clone)]
pub struct GrowthConfig {
    /// Weight of the two-child expansion mode.
    pub pa: f32,
    /// Weight of the single-continuation mode; the remainder terminates.
    pub pc: f32,
    /// Shore clearance, as a multiple of the edge length.
    pub sigma: f32,
    /// Node/edge clearance, as a multiple of the edge length.
    pub eta: f32,
    /// Elevation bias threshold for candidate selection.
    pub zeta: f32,
    /// Elevation gain per meter per unit of raster slope.
    pub slope_rate: f32,
    /// Rejection-sampling attempts per proposed child.
    pub max_tries: u32,
    /// Standard deviation of the heading perturbation, radians.
    pub river_angle_dev: f32,
}

/// Shared state of one growth run.
///
/// Workers hold this by reference; everything mutable is behind its own
/// lock (the candidate vector here, tile and node locks inside
/// [`Hydrology`]).
pub struct GrowthParams {
    pub config: GrowthConfig,
    /// Target segment length, meters.
    pub edge_length: f32,
    /// Meters per raster cell.
    pub resolution: f32,
    pub shore: Shore,
    pub river_slope: Raster,
    pub hydrology: Hydrology,
    /// Nodes still eligible for expansion.
    pub candidates: Mutex<Vec<NodeId>>,
}

impl GrowthParams {
    /// Assemble a growth run from the store: area parameters, slope
    /// raster, shoreline, and seed mouths (which become the initial
    /// candidates, in id order, at elevation zero).
    pub fn from_store(doc: &StoreDoc, config: GrowthConfig) -> Result<Self, StoreError> {
        let p = &doc.parameters;
        if !(p.edge_length > 0.0) {
            return Err(StoreError::Parameter("edgeLength"));
        }
        if !(p.resolution > 0.0) {
            return Err(StoreError::Parameter("resolution"));
        }
        if !(p.max_x > p.min_x) || !(p.max_y > p.min_y) {
            return Err(StoreError::Parameter("area bounds"));
        }
        if doc.shoreline.len() < 3 {
            return Err(StoreError::Parameter("shoreline"));
        }

        let width = doc.river_slope.iter().map(|r| r.x + 1).max().unwrap_or(1) as usize;
        let height = doc.river_slope.iter().map(|r| r.y + 1).max().unwrap_or(1) as usize;
        let mut river_slope = Raster::new(width, height, p.resolution);
        for row in &doc.river_slope {
            river_slope.set(row.x as usize, row.y as usize, row.slope);
        }

        let shore = Shore::new(
            doc.shoreline
                .iter()
                .map(|&[x, y]| Vec2::new(x, y))
                .collect(),
        );

        let hydrology = Hydrology::new(
            Vec2::new(p.min_x, p.min_y),
            Vec2::new(p.max_x, p.max_y),
            p.edge_length,
        );

        let mut seeds: Vec<_> = doc.river_nodes.iter().collect();
        seeds.sort_by_key(|row| row.id);
        let mut candidates = Vec::with_capacity(seeds.len());
        for row in seeds {
            let contour_index = row.contour_index.unwrap_or(0) as usize;
            let id = hydrology.add_mouth_node(
                Vec2::new(row.x, row.y),
                0.0,
                row.priority,
                contour_index,
            );
            candidates.push(id);
        }

        Ok(Self {
            config,
            edge_length: p.edge_length,
            resolution: p.resolution,
            shore,
            river_slope,
            hydrology,
            candidates: Mutex::new(candidates),
        })
    }

    /// Replace the store's river-node table with the grown network, one
    /// row per node, parent-or-self.
    pub fn write_nodes(&self, doc: &mut StoreDoc) {
        let nodes = self.hydrology.read();
        doc.river_nodes = nodes
            .iter()
            .map(|node| crate::store::RiverNodeRow {
                id: node.id as u64,
                parent: Some(node.parent.unwrap_or(node.id) as u64),
                priority: node.priority,
                contour_index: node.contour_index.map(|c| c as u64),
                x: node.loc.x,
                y: node.loc.y,
                elevation: node.elevation,
                local_watershed: 0.0,
                inherited_watershed: 0.0,
                flow: 0.0,
            })
            .collect();
    }

    pub(crate) fn pop_candidate(&self) -> Option<NodeId> {
        let mut candidates = self
            .candidates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let nodes = self.hydrology.read();
        rules::select_node(&mut candidates, &nodes, self.config.zeta)
    }

    pub(crate) fn push_candidate(&self, id: NodeId) {
        self.candidates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }
}
