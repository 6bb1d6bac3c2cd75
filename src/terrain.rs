//! Terrain samples and the elevation engine.
//!
//! Every sample belongs to one river cell. Its elevation is a blend of two
//! anchors: the nearest ridge bordering the cell (the shore counts as a
//! ridge of elevation zero) and the nearest point of the cell's river, with
//! the river's elevation interpolated at the projected point. Each anchor
//! is weighted by the distance to the other, so a sample on a ridge takes
//! the ridge elevation exactly and a sample on the river takes the river's.
//!
//! The per-sample loop reads only shared immutable state and writes only
//! its own record, so it runs in parallel.

use glam::Vec2;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::geometry::{distance, point_to_segment, EPSILON};
use crate::honeycomb::{Honeycomb, Q};
use crate::hydrology::{Hydrology, NodeId, RiverNode};
use crate::shore::Shore;
use crate::store::{StoreDoc, StoreError};

/// One scattered terrain point inside a river cell.
#[derive(Debug, Clone)]
pub struct TerrainSample {
    pub id: u64,
    pub loc: Vec2,
    pub cell: NodeId,
    /// Output of the elevation engine; absent until computed.
    pub elevation: Option<f32>,
}

/// The full set of samples, in id order.
#[derive(Default)]
pub struct Terrain {
    samples: Vec<TerrainSample>,
}

impl Terrain {
    pub fn new(samples: Vec<TerrainSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TerrainSample] {
        &self.samples
    }
}

/// Elevation of the ridge segment `q0..q1` at the point nearest to `t`,
/// given `d`, the distance from `t` to that segment.
///
/// The projection length from `q0` follows from the right triangle formed
/// by `t`, `q0` and the foot point. A degenerate segment yields a
/// non-finite blend factor and falls back to `q0`'s elevation.
fn lerp_ridge(q0: &Q, q1: &Q, t: Vec2, d: f32) -> f32 {
    let span = distance(q0.position, q1.position);
    let hypot = distance(q0.position, t);
    let along = (hypot * hypot - d * d).max(0.0).sqrt();
    let result = q0.elevation + (along / span) * (q1.elevation - q0.elevation);
    if result.is_finite() {
        result
    } else {
        q0.elevation
    }
}

/// Distance from `t` to a 3-D polyline's xy projection, together with the
/// z value interpolated at the nearest point.
fn polyline_closest(t: Vec2, line: &[[f32; 3]]) -> (f32, f32) {
    debug_assert!(!line.is_empty());
    if line.len() == 1 {
        let p = Vec2::new(line[0][0], line[0][1]);
        return (distance(t, p), line[0][2]);
    }

    let mut best = (f32::INFINITY, 0.0f32);
    for pair in line.windows(2) {
        let a = Vec2::new(pair[0][0], pair[0][1]);
        let b = Vec2::new(pair[1][0], pair[1][1]);
        let d = b - a;
        let len_sq = d.length_squared();
        let s = if len_sq > 0.0 {
            ((t - a).dot(d) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let dist = t.distance(a + s * d);
        if dist < best.0 {
            best = (dist, pair[0][2] + s * (pair[1][2] - pair[0][2]));
        }
    }
    best
}

/// Nearest ridge of the sample's cell: distance and ridge elevation at the
/// nearest point. `None` when the cell has no ridges.
fn closest_ridge(t: Vec2, cell: NodeId, honeycomb: &Honeycomb) -> Option<(f32, f32)> {
    let mut best: Option<(f32, f32)> = None;
    for &ridge_id in honeycomb.cell_ridges(cell) {
        let Some(ridge) = honeycomb.ridge(ridge_id) else {
            continue;
        };
        let Some(q0) = honeycomb.q(ridge.q0) else {
            continue;
        };

        let candidate = match ridge.q1.and_then(|id| honeycomb.q(id)) {
            None => {
                // Point-ridge: the endpoint is the whole ridge.
                (distance(q0.position, t), q0.elevation)
            }
            Some(q1) => {
                let hit = point_to_segment(t, q0.position, q1.position);
                if hit.endpoint {
                    let d0 = distance(q0.position, t);
                    let d1 = distance(q1.position, t);
                    if d0 < d1 {
                        (d0, q0.elevation)
                    } else {
                        (d1, q1.elevation)
                    }
                } else {
                    (hit.dist, lerp_ridge(q0, q1, t, hit.dist))
                }
            }
        };

        if best.map_or(true, |(d, _)| candidate.0 < d) {
            best = Some(candidate);
        }
    }
    best
}

/// Elevation for a single sample. See the module docs for the scheme.
pub fn compute_sample_elevation(
    loc: Vec2,
    cell: NodeId,
    nodes: &[RiverNode],
    honeycomb: &Honeycomb,
    shore: &Shore,
) -> f32 {
    // A. Nearest cell ridge.
    let ridge = closest_ridge(loc, cell, honeycomb);

    // B. The shore is a zero-elevation ridge; negative (offshore) distances
    // still participate under the signed convention.
    let shore_dist = shore.distance_to_shore(loc);
    let (ridge_dist, ridge_elevation) = match ridge {
        Some((d, e)) if d <= shore_dist => (d, e),
        _ => (shore_dist, 0.0),
    };

    // C. Nearest river point, with z interpolated at the projection.
    let node = &nodes[cell];
    let (mut river_dist, projected_z) = if node.rivers.is_empty() {
        (distance(loc, node.loc), node.elevation)
    } else {
        node.rivers
            .iter()
            .filter(|line| !line.is_empty())
            .map(|line| polyline_closest(loc, line))
            .min_by_key(|&(d, _)| OrderedFloat(d))
            .unwrap_or((distance(loc, node.loc), node.elevation))
    };

    // D. Both anchors at the sample point: keep the ridge anchor.
    if river_dist.abs() < EPSILON && ridge_dist.abs() < EPSILON {
        river_dist = 1.0;
    }

    // E. Blend, each anchor weighted by the distance to the other.
    let total = ridge_dist + river_dist;
    projected_z * (ridge_dist / total) + ridge_elevation * (river_dist / total)
}

/// Compute every sample's elevation in parallel. `on_progress` runs once
/// per completed sample.
pub fn compute_elevations<F>(
    terrain: &mut Terrain,
    hydrology: &Hydrology,
    honeycomb: &Honeycomb,
    shore: &Shore,
    on_progress: F,
) where
    F: Fn() + Sync,
{
    let guard = hydrology.read();
    let nodes: &[RiverNode] = &guard;

    terrain.samples.par_iter_mut().for_each(|sample| {
        sample.elevation = Some(compute_sample_elevation(
            sample.loc,
            sample.cell,
            nodes,
            honeycomb,
            shore,
        ));
        on_progress();
    });
}

/// Inputs of the elevation stage, restored from the store: the shore, the
/// finished river network with its polylines, the honeycomb, and the
/// samples to elevate.
pub struct ElevationStage {
    pub shore: Shore,
    pub hydrology: Hydrology,
    pub honeycomb: Honeycomb,
    pub terrain: Terrain,
}

impl ElevationStage {
    pub fn from_store(doc: &StoreDoc) -> Result<Self, StoreError> {
        let p = &doc.parameters;
        if !(p.edge_length > 0.0) {
            return Err(StoreError::Parameter("edgeLength"));
        }
        if !(p.max_x > p.min_x) || !(p.max_y > p.min_y) {
            return Err(StoreError::Parameter("area bounds"));
        }
        if doc.shoreline.len() < 3 {
            return Err(StoreError::Parameter("shoreline"));
        }

        let shore = Shore::new(
            doc.shoreline
                .iter()
                .map(|&[x, y]| Vec2::new(x, y))
                .collect(),
        );

        // Rivers grouped per node, in river-id order.
        let mut rivers_by_node: FxHashMap<u64, Vec<(u64, &Vec<[f32; 3]>)>> = FxHashMap::default();
        for river in &doc.rivers {
            rivers_by_node
                .entry(river.node)
                .or_default()
                .push((river.id, &river.points));
        }
        for rivers in rivers_by_node.values_mut() {
            rivers.sort_by_key(|&(id, _)| id);
        }

        // Nodes restored in id order; ids must be dense and parents must
        // precede their children.
        let hydrology = Hydrology::new(
            Vec2::new(p.min_x, p.min_y),
            Vec2::new(p.max_x, p.max_y),
            p.edge_length,
        );
        let mut rows: Vec<_> = doc.river_nodes.iter().collect();
        rows.sort_by_key(|row| row.id);
        for (i, row) in rows.iter().enumerate() {
            if row.id != i as u64 {
                return Err(StoreError::DanglingReference(format!(
                    "river node ids are not dense around id {}",
                    row.id
                )));
            }
            let rivers = rivers_by_node
                .remove(&row.id)
                .map(|list| list.into_iter().map(|(_, points)| points.clone()).collect())
                .unwrap_or_default();
            let loc = Vec2::new(row.x, row.y);
            if row.is_mouth() {
                hydrology.load_mouth_node(
                    loc,
                    row.elevation,
                    row.priority,
                    row.contour_index.unwrap_or(0) as usize,
                    rivers,
                    row.local_watershed,
                    row.inherited_watershed,
                    row.flow,
                );
            } else {
                let parent = row.parent.unwrap_or(row.id) as usize;
                if parent >= i {
                    return Err(StoreError::DanglingReference(format!(
                        "river node {} references parent {} out of order",
                        row.id, parent
                    )));
                }
                hydrology.load_regular_node(
                    loc,
                    row.elevation,
                    row.priority,
                    parent,
                    rivers,
                    row.local_watershed,
                    row.inherited_watershed,
                    row.flow,
                );
            }
        }
        if let Some(&node) = rivers_by_node.keys().next() {
            return Err(StoreError::DanglingReference(format!(
                "river polyline references unknown node {node}"
            )));
        }

        // Honeycomb, in three passes.
        let mut honeycomb = Honeycomb::new();
        for q in &doc.qs {
            honeycomb.insert_q(
                q.id,
                Vec2::new(q.x, q.y),
                q.elevation,
                q.cells.iter().map(|&c| c as NodeId).collect(),
            );
        }
        for ridge in &doc.ridges {
            if honeycomb.q(ridge.q0).is_none()
                || ridge.q1.is_some_and(|q1| honeycomb.q(q1).is_none())
            {
                return Err(StoreError::DanglingReference(format!(
                    "ridge {} references an unknown Q",
                    ridge.id
                )));
            }
            honeycomb.insert_ridge(ridge.id, ridge.q0, ridge.q1);
        }
        for membership in &doc.cell_ridges {
            for &ridge in &membership.ridges {
                if honeycomb.ridge(ridge).is_none() {
                    return Err(StoreError::DanglingReference(format!(
                        "cell {} references unknown ridge {ridge}",
                        membership.cell
                    )));
                }
                honeycomb.insert_cell_ridge(membership.cell as NodeId, ridge);
            }
        }

        // Terrain samples, in id order, each owned by a known cell.
        let num_nodes = hydrology.num_nodes();
        let mut sample_rows: Vec<_> = doc.ts.iter().collect();
        sample_rows.sort_by_key(|row| row.id);
        let mut samples = Vec::with_capacity(sample_rows.len());
        for row in sample_rows {
            let cell = row.cell as NodeId;
            if cell >= num_nodes {
                return Err(StoreError::DanglingReference(format!(
                    "terrain sample {} references unknown cell {cell}",
                    row.id
                )));
            }
            samples.push(TerrainSample {
                id: row.id,
                loc: Vec2::new(row.x, row.y),
                cell,
                elevation: row.elevation,
            });
        }

        Ok(Self {
            shore,
            hydrology,
            honeycomb,
            terrain: Terrain::new(samples),
        })
    }

    /// Elevate every sample. `on_progress` runs once per sample.
    pub fn run<F>(&mut self, on_progress: F)
    where
        F: Fn() + Sync,
    {
        log::info!("elevating {} terrain samples", self.terrain.len());
        compute_elevations(
            &mut self.terrain,
            &self.hydrology,
            &self.honeycomb,
            &self.shore,
            on_progress,
        );
    }

    /// Update the store's terrain table with the computed elevations, by id.
    pub fn write_back(&self, doc: &mut StoreDoc) {
        let elevations: FxHashMap<u64, f32> = self
            .terrain
            .samples()
            .iter()
            .filter_map(|s| s.elevation.map(|e| (s.id, e)))
            .collect();
        for row in &mut doc.ts {
            if let Some(&elevation) = elevations.get(&row.id) {
                row.elevation = Some(elevation);
            }
        }
    }
}
