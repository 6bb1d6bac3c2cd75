//! Expansion rules: candidate selection, heading choice, geometric
//! acceptance, and the alpha step that turns one candidate into children.

use glam::Vec2;
use ordered_float::OrderedFloat;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use kd_forest::AreaLock;

use crate::geometry::{distance, point_to_segment};
use crate::hydrology::{Edge, NodeId, RiverNode};
use crate::shore::Shore;

use super::GrowthParams;

/// Pick and remove the next node to expand.
///
/// The highest priority wins; within that bucket the preferred node is the
/// one with the greatest elevation not exceeding `zeta`, falling back to
/// the least-elevated node when every elevation exceeds the threshold.
/// Ties resolve to the lowest id, so selection is deterministic.
pub fn select_node(candidates: &mut Vec<NodeId>, nodes: &[RiverNode], zeta: f32) -> Option<NodeId> {
    let top = candidates.iter().map(|&id| nodes[id].priority).max()?;

    let bucket = candidates
        .iter()
        .filter(|&&id| nodes[id].priority == top);
    let chosen = bucket
        .clone()
        .filter(|&&id| nodes[id].elevation <= zeta)
        .max_by_key(|&&id| (OrderedFloat(nodes[id].elevation), std::cmp::Reverse(id)))
        .or_else(|| bucket.min_by_key(|&&id| (OrderedFloat(nodes[id].elevation), id)))
        .copied()?;

    let at = candidates.iter().position(|&id| id == chosen)?;
    candidates.remove(at);
    Some(chosen)
}

/// Heading pointing inland from a mouth, in radians.
///
/// Takes the chord between the shore vertices on either side of the
/// mouth's contour index and its perpendicular, flipped if a short probe
/// along it lands at sea.
pub fn coast_normal(mouth: &RiverNode, shore: &Shore) -> f32 {
    let n = shore.len();
    let k = mouth.contour_index.unwrap_or(0);
    let chord = shore[(k + 1) % n] - shore[(k + n - 1) % n];
    let mut normal = chord.perp().normalize_or_zero();

    let probe = mouth.loc + normal * (0.01 * chord.length()).max(1.0);
    if shore.distance_to_shore(probe) <= 0.0 {
        normal = -normal;
    }
    normal.y.atan2(normal.x)
}

/// The clearance radius around nodes and edges: a candidate may not land
/// within one edge length of the existing network, or within
/// `eta * edgeLength` when eta exceeds one.
fn spacing(params: &GrowthParams) -> f32 {
    params.config.eta.max(1.0) * params.edge_length
}

fn acceptable(
    p: Vec2,
    nearby_nodes: &[(NodeId, Vec2)],
    nearby_edges: &[Edge],
    ignore: NodeId,
    params: &GrowthParams,
) -> bool {
    // Strictly inside the growth area.
    let (lower, upper) = params.hydrology.bounds();
    if !(p.x > lower.x && p.x < upper.x && p.y > lower.y && p.y < upper.y) {
        return false;
    }

    // Strictly inland, with sigma clearance from the sea.
    if params.shore.distance_to_shore(p) <= params.config.sigma * params.edge_length {
        return false;
    }

    let clearance = spacing(params);
    for &(id, loc) in nearby_nodes {
        if id != ignore && distance(p, loc) <= clearance {
            return false;
        }
    }
    for edge in nearby_edges {
        if edge.node == ignore || edge.parent == ignore {
            continue;
        }
        if point_to_segment(p, edge.node_loc, edge.parent_loc).dist <= clearance {
            return false;
        }
    }
    true
}

/// Whether `p` can host a new node, checking the shore, every node and
/// edge within `search_radius`, and the growth bounds. Edges incident to
/// `ignore` (the prospective parent) are exempt.
pub fn is_acceptable_position(
    p: Vec2,
    search_radius: f32,
    ignore: NodeId,
    params: &GrowthParams,
) -> bool {
    let nodes = params.hydrology.nodes_near(p, search_radius);
    let edges = params.hydrology.query_area(p, search_radius);
    acceptable(p, &nodes, &edges, ignore, params)
}

/// As [`is_acceptable_position`], reading through a held area lock so the
/// verdict stays valid until the lock is released.
pub fn is_acceptable_position_in(
    lock: &AreaLock<'_, NodeId>,
    p: Vec2,
    search_radius: f32,
    ignore: NodeId,
    params: &GrowthParams,
) -> bool {
    let nodes = params.hydrology.nodes_near_in(lock, p, search_radius);
    let edges = params.hydrology.query_area_in(lock, p, search_radius);
    acceptable(p, &nodes, &edges, ignore, params)
}

/// Propose a position for a child of `node`.
///
/// The heading continues the incoming flow direction (or the coast normal
/// at a mouth), perturbed by a Gaussian draw; the candidate sits one edge
/// length out. Each try is checked under an area lock of half-side twice
/// the edge length; on success that lock is returned still held, so the
/// caller can insert before any competing worker touches the area.
pub fn pick_new_node_loc<'a, R: Rng>(
    node: &RiverNode,
    params: &'a GrowthParams,
    rng: &mut R,
) -> Option<(Vec2, AreaLock<'a, NodeId>)> {
    let heading = match node.parent {
        None => coast_normal(node, &params.shore),
        Some(parent) => {
            let dir = node.loc - params.hydrology.get_node(parent).loc;
            dir.y.atan2(dir.x)
        }
    };

    let perturbation = Normal::new(0.0, params.config.river_angle_dev).ok()?;
    for _ in 0..params.config.max_tries {
        let angle = heading + perturbation.sample(rng);
        let candidate = node.loc + params.edge_length * Vec2::new(angle.cos(), angle.sin());

        let lock = params
            .hydrology
            .lock_area(candidate, 2.0 * params.edge_length);
        if is_acceptable_position_in(&lock, candidate, 2.0 * params.edge_length, node.id, params) {
            return Some((candidate, lock));
        }
    }
    None
}

/// One expansion step on an already-selected candidate.
///
/// Rolls the branching mode (two children / one / none), then places each
/// child via [`pick_new_node_loc`], assigns its elevation from the slope
/// raster, inserts it under the held area lock, and queues it as a new
/// candidate. A child whose placement exhausts its tries is dropped
/// silently.
pub fn alpha<R: Rng>(selected: NodeId, params: &GrowthParams, rng: &mut R) {
    let node = params.hydrology.get_node(selected);

    let roll: f32 = rng.gen();
    let children: u32 = if roll < params.config.pa {
        2
    } else if roll < params.config.pa + params.config.pc {
        1
    } else {
        0
    };

    for child in 0..children {
        // The first child continues the river at the parent's priority;
        // the second starts a lesser tributary.
        let priority = if child == 0 || node.priority <= 1 {
            node.priority
        } else {
            node.priority - 1
        };

        if let Some((loc, mut lock)) = pick_new_node_loc(&node, params, rng) {
            let elevation = node.elevation
                + params.edge_length * params.river_slope.sample(loc) * params.config.slope_rate;
            let id =
                params
                    .hydrology
                    .add_regular_node_in(&mut lock, loc, elevation, priority, selected);
            drop(lock);
            params.push_candidate(id);
        }
    }
}
