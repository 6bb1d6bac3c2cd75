//! The river network: a forest of trees rooted at coastal mouths.
//!
//! Nodes live in an id-indexed arena; ids are dense, assigned strictly in
//! insertion order, and never reused. All edges point child to parent, so
//! every node reaches a unique mouth. The arena is the sole owner - links
//! are ids, never references.
//!
//! Spatially, both endpoints of every child-parent edge are inserted into
//! the tile forest keyed to the child id. That makes an edge discoverable
//! from either end, and makes [`Hydrology::query_area`] report an edge once
//! per endpoint inside the query square - callers count on the doubled
//! entries for fully-enclosed edges.

use std::io::{self, Write};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use glam::Vec2;

use kd_forest::{AreaLock, Forest};

/// Stable handle to a node: its index in insertion order.
pub type NodeId = usize;

/// One stretch of river.
///
/// The watershed, flow and river-polyline fields are only populated when a
/// finished network is loaded back for the elevation stage; during growth
/// they stay empty.
#[derive(Debug, Clone)]
pub struct RiverNode {
    pub id: NodeId,
    /// Absent iff this is a mouth.
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub loc: Vec2,
    /// Meters above sea level.
    pub elevation: f32,
    /// Selection rank during growth; higher expands first.
    pub priority: u32,
    /// Index of the nearest shoreline vertex; mouths only.
    pub contour_index: Option<usize>,
    /// River polylines through this node, `[x, y, z]` with z = elevation.
    pub rivers: Vec<Vec<[f32; 3]>>,
    pub local_watershed: f32,
    pub inherited_watershed: f32,
    pub flow: f32,
}

impl RiverNode {
    pub fn is_mouth(&self) -> bool {
        self.parent.is_none()
    }
}

/// A child-parent edge snapshot captured by a spatial query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub node: NodeId,
    pub parent: NodeId,
    pub node_loc: Vec2,
    pub parent_loc: Vec2,
}

/// The forest of river trees plus its spatial index.
pub struct Hydrology {
    nodes: RwLock<Vec<RiverNode>>,
    index: Forest<NodeId>,
}

impl Hydrology {
    /// An empty network over the given growth area. The spatial index is
    /// tiled at `edge_length`, the characteristic spacing of the network.
    pub fn new(lower_left: Vec2, upper_right: Vec2, edge_length: f32) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            index: Forest::new(lower_left, upper_right, edge_length),
        }
    }

    /// The growth area rectangle.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        self.index.bounds()
    }

    pub fn num_nodes(&self) -> usize {
        self.read().len()
    }

    /// Shared view of the node arena, in id order.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<RiverNode>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of one node. O(1); cheap while rivers are unloaded.
    pub fn get_node(&self, id: NodeId) -> RiverNode {
        self.read()[id].clone()
    }

    /// Append a root node on the shore. Returns its id.
    pub fn add_mouth_node(
        &self,
        loc: Vec2,
        elevation: f32,
        priority: u32,
        contour_index: usize,
    ) -> NodeId {
        let id = self.push(RiverNode {
            id: 0,
            parent: None,
            children: Vec::new(),
            loc,
            elevation,
            priority,
            contour_index: Some(contour_index),
            rivers: Vec::new(),
            local_watershed: 0.0,
            inherited_watershed: 0.0,
            flow: 0.0,
        });
        self.index.insert(loc, id);
        id
    }

    /// Append a child of `parent`, indexing both ends of the new edge
    /// under the child's id. Elevation ordering against the parent is the
    /// caller's concern.
    pub fn add_regular_node(
        &self,
        loc: Vec2,
        elevation: f32,
        priority: u32,
        parent: NodeId,
    ) -> NodeId {
        let (id, parent_loc) = self.push_child(loc, elevation, priority, parent);
        self.index.insert(loc, id);
        self.index.insert(parent_loc, id);
        id
    }

    /// As [`Self::add_regular_node`], but inserting through an area lock
    /// already held over both endpoints.
    pub fn add_regular_node_in(
        &self,
        lock: &mut AreaLock<'_, NodeId>,
        loc: Vec2,
        elevation: f32,
        priority: u32,
        parent: NodeId,
    ) -> NodeId {
        let (id, parent_loc) = self.push_child(loc, elevation, priority, parent);
        lock.insert(loc, id);
        lock.insert(parent_loc, id);
        id
    }

    /// Restore a mouth from a finished network, rivers and watersheds
    /// included. Ids still follow call order.
    #[allow(clippy::too_many_arguments)]
    pub fn load_mouth_node(
        &self,
        loc: Vec2,
        elevation: f32,
        priority: u32,
        contour_index: usize,
        rivers: Vec<Vec<[f32; 3]>>,
        local_watershed: f32,
        inherited_watershed: f32,
        flow: f32,
    ) -> NodeId {
        let id = self.push(RiverNode {
            id: 0,
            parent: None,
            children: Vec::new(),
            loc,
            elevation,
            priority,
            contour_index: Some(contour_index),
            rivers,
            local_watershed,
            inherited_watershed,
            flow,
        });
        self.index.insert(loc, id);
        id
    }

    /// Restore a regular node from a finished network.
    #[allow(clippy::too_many_arguments)]
    pub fn load_regular_node(
        &self,
        loc: Vec2,
        elevation: f32,
        priority: u32,
        parent: NodeId,
        rivers: Vec<Vec<[f32; 3]>>,
        local_watershed: f32,
        inherited_watershed: f32,
        flow: f32,
    ) -> NodeId {
        let (id, parent_loc) = {
            let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
            let id = nodes.len();
            let parent_loc = nodes[parent].loc;
            nodes[parent].children.push(id);
            nodes.push(RiverNode {
                id,
                parent: Some(parent),
                children: Vec::new(),
                loc,
                elevation,
                priority,
                contour_index: None,
                rivers,
                local_watershed,
                inherited_watershed,
                flow,
            });
            (id, parent_loc)
        };
        self.index.insert(loc, id);
        self.index.insert(parent_loc, id);
        id
    }

    /// Exclusively lock the tiles under the square; see [`Forest::area_lock`].
    pub fn lock_area(&self, center: Vec2, radius: f32) -> AreaLock<'_, NodeId> {
        self.index.area_lock(center, radius)
    }

    /// Every edge with an endpoint inside the square centered at `center`
    /// with half side `radius`. An edge with both endpoints inside appears
    /// twice; that double count is part of the contract.
    pub fn query_area(&self, center: Vec2, radius: f32) -> Vec<Edge> {
        self.edges_for(self.index.search_range(center, radius))
    }

    /// As [`Self::query_area`], reading through a held area lock.
    pub fn query_area_in(&self, lock: &AreaLock<'_, NodeId>, center: Vec2, radius: f32) -> Vec<Edge> {
        self.edges_for(lock.search_range(center, radius))
    }

    /// Distinct nodes with an index entry inside the square, with their
    /// current locations. Mouths show up here even before they have edges.
    pub fn nodes_near(&self, center: Vec2, radius: f32) -> Vec<(NodeId, Vec2)> {
        self.locate(self.index.search_range(center, radius))
    }

    /// As [`Self::nodes_near`], reading through a held area lock.
    pub fn nodes_near_in(
        &self,
        lock: &AreaLock<'_, NodeId>,
        center: Vec2,
        radius: f32,
    ) -> Vec<(NodeId, Vec2)> {
        self.locate(lock.search_range(center, radius))
    }

    fn locate(&self, mut ids: Vec<NodeId>) -> Vec<(NodeId, Vec2)> {
        ids.sort_unstable();
        ids.dedup();
        let nodes = self.read();
        ids.into_iter().map(|id| (id, nodes[id].loc)).collect()
    }

    fn edges_for(&self, ids: Vec<NodeId>) -> Vec<Edge> {
        let nodes = self.read();
        ids.into_iter()
            .filter_map(|id| {
                let node = &nodes[id];
                node.parent.map(|parent| Edge {
                    node: id,
                    parent,
                    node_loc: node.loc,
                    parent_loc: nodes[parent].loc,
                })
            })
            .collect()
    }

    fn push(&self, mut node: RiverNode) -> NodeId {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let id = nodes.len();
        node.id = id;
        nodes.push(node);
        id
    }

    fn push_child(&self, loc: Vec2, elevation: f32, priority: u32, parent: NodeId) -> (NodeId, Vec2) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let id = nodes.len();
        let parent_loc = nodes[parent].loc;
        nodes[parent].children.push(id);
        nodes.push(RiverNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            loc,
            elevation,
            priority,
            contour_index: None,
            rivers: Vec::new(),
            local_watershed: 0.0,
            inherited_watershed: 0.0,
            flow: 0.0,
        });
        (id, parent_loc)
    }

    /// Dump every node, big-endian, in id order:
    /// `u64 id | u64 parent-or-self | u64 reserved | u8 n | u64*n children |
    /// f32 x | f32 y | f32 elevation`. Used to verify ordering and parent
    /// linkage in tests.
    pub fn write_binary<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for node in self.read().iter() {
            w.write_all(&(node.id as u64).to_be_bytes())?;
            w.write_all(&(node.parent.unwrap_or(node.id) as u64).to_be_bytes())?;
            w.write_all(&0u64.to_be_bytes())?;
            w.write_all(&[node.children.len() as u8])?;
            for &child in &node.children {
                w.write_all(&(child as u64).to_be_bytes())?;
            }
            w.write_all(&node.loc.x.to_be_bytes())?;
            w.write_all(&node.loc.y.to_be_bytes())?;
            w.write_all(&node.elevation.to_be_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_network() -> Hydrology {
        let hydrology = Hydrology::new(Vec2::ZERO, Vec2::new(15.0, 20.0), 1.0);
        let m0 = hydrology.add_mouth_node(Vec2::new(6.0, 11.0), 0.0, 0, 0);
        let m1 = hydrology.add_mouth_node(Vec2::new(6.0, 7.0), 0.0, 0, 0);
        let m2 = hydrology.add_mouth_node(Vec2::new(4.0, 4.0), 0.0, 0, 0);
        let m3 = hydrology.add_mouth_node(Vec2::new(9.0, 2.0), 0.0, 0, 0);
        hydrology.add_regular_node(Vec2::new(4.0, 7.0), 0.0, 0, m0);
        hydrology.add_regular_node(Vec2::new(10.0, 9.0), 0.0, 0, m1);
        hydrology.add_regular_node(Vec2::new(7.0, 4.0), 0.0, 0, m2);
        hydrology.add_regular_node(Vec2::new(9.0, 6.0), 0.0, 0, m3);
        hydrology
    }

    #[test]
    fn ids_follow_insertion_order() {
        let hydrology = small_network();
        let nodes = hydrology.read();
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.id, i);
        }
        assert_eq!(nodes.len(), 8);
    }

    #[test]
    fn parents_track_children() {
        let hydrology = small_network();
        let nodes = hydrology.read();
        for node in nodes.iter() {
            if let Some(parent) = node.parent {
                assert!(nodes[parent].children.contains(&node.id));
            }
        }
        assert_eq!(nodes[0].children, vec![4]);
        assert_eq!(nodes[3].children, vec![7]);
    }

    #[test]
    fn query_area_finds_edges_by_either_endpoint() {
        let hydrology = small_network();
        let edges = hydrology.query_area(Vec2::new(5.0, 5.0), 3.0);
        assert_eq!(edges.len(), 4);
    }

    #[test]
    fn query_area_double_counts_enclosed_edges() {
        let hydrology = Hydrology::new(Vec2::ZERO, Vec2::new(15.0, 20.0), 1.0);
        let m0 = hydrology.add_mouth_node(Vec2::new(3.0, 7.0), 0.0, 0, 0);
        hydrology.add_regular_node(Vec2::new(2.0, 10.0), 0.0, 0, m0);
        let m2 = hydrology.add_mouth_node(Vec2::new(7.0, 7.0), 0.0, 0, 0);
        hydrology.add_regular_node(Vec2::new(8.0, 10.0), 0.0, 0, m2);
        let m4 = hydrology.add_mouth_node(Vec2::new(3.0, 3.0), 0.0, 0, 0);
        hydrology.add_regular_node(Vec2::new(0.0, 0.0), 0.0, 0, m4);
        let m6 = hydrology.add_mouth_node(Vec2::new(7.0, 3.0), 0.0, 0, 0);
        hydrology.add_regular_node(Vec2::new(10.0, 0.0), 0.0, 0, m6);

        // One endpoint in range: each edge once.
        let edges = hydrology.query_area(Vec2::new(5.0, 5.0), 3.0);
        assert_eq!(edges.len(), 4);

        // Both endpoints in range: each edge twice.
        let edges = hydrology.query_area(Vec2::new(5.0, 5.0), 6.0);
        assert_eq!(edges.len(), 8);
    }

    #[test]
    fn node_count_tracks_additions() {
        let resolution = 13.5f32;
        let hydrology = Hydrology::new(
            Vec2::new(1500.0 * resolution, 1300.0 * resolution),
            Vec2::new(1550.0 * resolution, 1400.0 * resolution),
            40.0,
        );
        let mouth = hydrology.add_mouth_node(
            Vec2::new(1530.0 * resolution, 1340.0 * resolution),
            0.0,
            0,
            0,
        );
        hydrology.add_regular_node(
            Vec2::new(1520.0 * resolution, 1360.0 * resolution),
            0.0,
            0,
            mouth,
        );
        let child1 = hydrology.add_regular_node(
            Vec2::new(1540.0 * resolution, 1360.0 * resolution),
            0.0,
            0,
            mouth,
        );
        hydrology.add_regular_node(
            Vec2::new(1540.0 * resolution, 1390.0 * resolution),
            0.0,
            0,
            child1,
        );
        assert_eq!(hydrology.num_nodes(), 4);
    }

    /// Split a binary dump back into per-node records.
    fn parse_records(buffer: &[u8]) -> Vec<(u64, u64, Vec<u64>)> {
        let mut records = Vec::new();
        let mut at = 0;
        while at < buffer.len() {
            let id = u64::from_be_bytes(buffer[at..at + 8].try_into().unwrap());
            let parent = u64::from_be_bytes(buffer[at + 8..at + 16].try_into().unwrap());
            let n = buffer[at + 24] as usize;
            let mut children = Vec::with_capacity(n);
            for c in 0..n {
                let off = at + 25 + c * 8;
                children.push(u64::from_be_bytes(buffer[off..off + 8].try_into().unwrap()));
            }
            records.push((id, parent, children));
            at += 25 + n * 8 + 12;
        }
        records
    }

    #[test]
    fn binary_dump_ids_and_parents() {
        let hydrology = Hydrology::new(Vec2::new(-1.0, -1.0), Vec2::new(4.0, 6.0), 1.0);
        hydrology.add_mouth_node(Vec2::ZERO, 0.0, 0, 0);
        hydrology.add_mouth_node(Vec2::new(3.14, 5.2), 12.1, 5, 10);
        hydrology.add_regular_node(Vec2::ZERO, 0.0, 0, 0);

        let mut buffer = Vec::new();
        hydrology.write_binary(&mut buffer).unwrap();
        let records = parse_records(&buffer);
        assert_eq!(records.len(), 3);

        // Mouths carry themselves as parent.
        assert_eq!(records[1].0, 1);
        assert_eq!(records[1].1, 1);
        // Regular nodes carry their real parent.
        assert_eq!(records[2].0, 2);
        assert_eq!(records[2].1, 0);
    }

    #[test]
    fn binary_dump_children() {
        let hydrology = Hydrology::new(Vec2::new(-1.0, -1.0), Vec2::new(4.0, 6.0), 1.0);
        hydrology.add_mouth_node(Vec2::new(3.14, 5.2), 12.1, 5, 10);
        hydrology.add_regular_node(Vec2::ZERO, 0.0, 0, 0);
        hydrology.add_regular_node(Vec2::ZERO, 0.0, 0, 0);

        let mut buffer = Vec::new();
        hydrology.write_binary(&mut buffer).unwrap();
        let records = parse_records(&buffer);
        assert_eq!(records[0].2, vec![1, 2]);
    }

    #[test]
    fn loaded_nodes_keep_rivers_and_ids() {
        let hydrology = Hydrology::new(Vec2::ZERO, Vec2::new(100.0, 100.0), 10.0);
        let river = vec![[10.0, 10.0, 0.0], [20.0, 20.0, 5.0]];
        let mouth = hydrology.load_mouth_node(
            Vec2::new(10.0, 10.0),
            0.0,
            1,
            3,
            vec![river.clone()],
            100.0,
            250.0,
            4.2,
        );
        let child = hydrology.load_regular_node(
            Vec2::new(20.0, 20.0),
            5.0,
            1,
            mouth,
            Vec::new(),
            80.0,
            150.0,
            2.1,
        );
        assert_eq!((mouth, child), (0, 1));

        let node = hydrology.get_node(mouth);
        assert_eq!(node.rivers, vec![river]);
        assert_eq!(node.contour_index, Some(3));
        assert!(node.is_mouth());
        assert_eq!(hydrology.get_node(child).parent, Some(mouth));
    }
}
