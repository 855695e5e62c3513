//! Planar street graph built from named road polylines.
//!
//! Nodes live in an arena indexed by `NodeId`. Construction adds every road
//! vertex and every crossing between roads, merging points closer than
//! [`MERGE_RADIUS`], then walks each road segment to link the nodes on it in
//! order with edges named after the road. Scaffolding edges are removed at the
//! end and ids are compacted to `0..n`.

pub mod entry;
pub mod intersections;

pub use entry::EntryPoint;
pub use intersections::{find_crossings, Crossing, Segment};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CityError, Result};
use crate::geometry::{Vector, EPSILON};

pub type NodeId = usize;

/// Points closer than this are the same node.
pub const MERGE_RADIUS: f64 = 1.0;

/// Spatial hash cell width.
const HASH_CELL: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Construction scaffolding, never present in a finished graph
    Temporary,
    Street(String),
}

/// A road polyline with the street name its edges will carry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedRoad {
    pub name: String,
    pub points: Vec<Vector>,
}

impl NamedRoad {
    pub fn new(name: impl Into<String>, points: Vec<Vector>) -> Self {
        Self { name: name.into(), points }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreetNode {
    pub id: NodeId,
    pub position: Vector,
    pub neighbors: BTreeMap<NodeId, EdgeKind>,
}

impl StreetNode {
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphParams {
    /// Sampling step when walking segments
    pub dstep: f64,
    /// Repeatedly remove nodes with at most one neighbour
    pub delete_dangling: bool,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            dstep: 1.0,
            delete_dangling: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreetGraph {
    nodes: Vec<StreetNode>,
    intersections: Vec<Vector>,
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

struct BuildNode {
    position: Vector,
    neighbors: BTreeMap<NodeId, EdgeKind>,
    segments: BTreeSet<usize>,
    alive: bool,
}

struct Builder {
    nodes: Vec<BuildNode>,
    hash: HashMap<(i64, i64), Vec<NodeId>>,
}

impl Builder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            hash: HashMap::new(),
        }
    }

    fn cell(p: Vector) -> (i64, i64) {
        ((p.x / HASH_CELL).floor() as i64, (p.y / HASH_CELL).floor() as i64)
    }

    /// Ids of nodes within `radius` of `p`, nearest first.
    fn nodes_within(&self, p: Vector, radius: f64) -> Vec<NodeId> {
        let (x0, y0) = Self::cell(p - Vector::new(radius, radius));
        let (x1, y1) = Self::cell(p + Vector::new(radius, radius));
        let r_sq = radius * radius;
        let mut found: Vec<(f64, NodeId)> = Vec::new();
        for x in x0..=x1 {
            for y in y0..=y1 {
                if let Some(ids) = self.hash.get(&(x, y)) {
                    for &id in ids {
                        let d = self.nodes[id].position.distance_to_sq(p);
                        if d <= r_sq {
                            found.push((d, id));
                        }
                    }
                }
            }
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Node at `p`, reusing one within the merge radius.
    fn fuzzy_add(&mut self, p: Vector, segments: &[usize]) -> NodeId {
        let id = match self.nodes_within(p, MERGE_RADIUS).first() {
            Some(&id) => id,
            None => {
                let id = self.nodes.len();
                self.nodes.push(BuildNode {
                    position: p,
                    neighbors: BTreeMap::new(),
                    segments: BTreeSet::new(),
                    alive: true,
                });
                self.hash.entry(Self::cell(p)).or_default().push(id);
                id
            }
        };
        self.nodes[id].segments.extend(segments.iter().copied());
        id
    }

    fn connect(&mut self, a: NodeId, b: NodeId, kind: EdgeKind) {
        if a == b {
            return;
        }
        self.nodes[a].neighbors.insert(b, kind.clone());
        self.nodes[b].neighbors.insert(a, kind);
    }

    /// Temporary edge unless a street already joins the nodes.
    fn connect_temporary(&mut self, a: NodeId, b: NodeId) {
        if a != b && !self.nodes[a].neighbors.contains_key(&b) {
            self.connect(a, b, EdgeKind::Temporary);
        }
    }

    /// Street edge. An existing street name wins over a new one.
    fn connect_street(&mut self, a: NodeId, b: NodeId, name: &str) {
        if a == b {
            return;
        }
        if let Some(EdgeKind::Street(_)) = self.nodes[a].neighbors.get(&b) {
            return;
        }
        self.connect(a, b, EdgeKind::Street(name.to_string()));
    }

    fn strip_temporary(&mut self) {
        for node in &mut self.nodes {
            node.neighbors.retain(|_, kind| *kind != EdgeKind::Temporary);
        }
    }

    fn prune_dangling(&mut self) {
        let mut queue: Vec<NodeId> = (0..self.nodes.len())
            .filter(|&id| self.nodes[id].alive && self.nodes[id].neighbors.len() <= 1)
            .collect();
        while let Some(id) = queue.pop() {
            if !self.nodes[id].alive || self.nodes[id].neighbors.len() > 1 {
                continue;
            }
            self.nodes[id].alive = false;
            let neighbors: Vec<NodeId> = self.nodes[id].neighbors.keys().copied().collect();
            self.nodes[id].neighbors.clear();
            for n in neighbors {
                self.nodes[n].neighbors.remove(&id);
                if self.nodes[n].alive && self.nodes[n].neighbors.len() <= 1 {
                    queue.push(n);
                }
            }
        }
    }

    /// Live nodes with at least one edge, renumbered densely.
    fn finish(self, intersections: Vec<Vector>) -> StreetGraph {
        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut next = 0;
        for (old, node) in self.nodes.iter().enumerate() {
            if node.alive && !node.neighbors.is_empty() {
                remap[old] = Some(next);
                next += 1;
            }
        }

        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .filter_map(|(old, node)| {
                let id = remap[old]?;
                let neighbors = node
                    .neighbors
                    .into_iter()
                    .filter_map(|(n, kind)| remap[n].map(|m| (m, kind)))
                    .collect();
                Some(StreetNode { id, position: node.position, neighbors })
            })
            .collect();

        StreetGraph { nodes, intersections }
    }
}

impl StreetGraph {
    /// Merges named roads into one planar graph.
    pub fn build(roads: &[NamedRoad], params: &GraphParams) -> Result<StreetGraph> {
        let mut builder = Builder::new();
        let mut segments: Vec<Segment> = Vec::new();
        let mut segment_names: Vec<&str> = Vec::new();
        let mut segment_ends: Vec<(NodeId, NodeId)> = Vec::new();

        // Vertices and temporary edges along each road
        for (road_index, road) in roads.iter().enumerate() {
            if road.points.len() < 2 {
                continue;
            }
            let first_segment = segments.len();
            let last = road.points.len() - 1;
            let mut prev: Option<NodeId> = None;
            for (i, p) in road.points.iter().enumerate() {
                let mut touching = Vec::with_capacity(2);
                if i > 0 {
                    touching.push(first_segment + i - 1);
                }
                if i < last {
                    touching.push(first_segment + i);
                }
                let id = builder.fuzzy_add(*p, &touching);
                if let Some(prev_id) = prev {
                    builder.connect_temporary(prev_id, id);
                    segment_ends.push((prev_id, id));
                }
                prev = Some(id);
            }
            for w in road.points.windows(2) {
                segments.push(Segment { road: road_index, a: w[0], b: w[1] });
                segment_names.push(&road.name);
            }
        }

        // Crossings between different roads
        let crossings = find_crossings(&segments);
        let mut crossing_nodes: BTreeSet<NodeId> = BTreeSet::new();
        for crossing in &crossings {
            let id = builder.fuzzy_add(crossing.point, &[crossing.first, crossing.second]);
            for s in [crossing.first, crossing.second] {
                let (a, b) = segment_ends[s];
                builder.connect_temporary(id, a);
                builder.connect_temporary(id, b);
            }
            crossing_nodes.insert(id);
        }
        let intersections: Vec<Vector> = crossing_nodes
            .iter()
            .map(|&id| builder.nodes[id].position)
            .collect();

        // Walk each segment and link the nodes on it in order
        for (index, segment) in segments.iter().enumerate() {
            let length = segment.a.distance_to(segment.b);
            if length < EPSILON {
                log::debug!(
                    "Skipping zero-length segment of {} at ({:.2}, {:.2})",
                    segment_names[index],
                    segment.a.x,
                    segment.a.y
                );
                continue;
            }
            let step = params.dstep.min(length / 2.0).max(EPSILON);
            let radius = step / 2.0 + MERGE_RADIUS;
            let dir = (segment.b - segment.a) / length;

            let samples = (length / step).ceil() as usize;
            let mut seen: BTreeSet<NodeId> = BTreeSet::new();
            let mut on_segment: Vec<(f64, NodeId)> = Vec::new();
            for k in 0..=samples {
                let p = segment.a + dir * (step * k as f64).min(length);
                for id in builder.nodes_within(p, radius) {
                    if builder.nodes[id].segments.contains(&index) && seen.insert(id) {
                        let t = (builder.nodes[id].position - segment.a).dot(dir);
                        on_segment.push((t, id));
                    }
                }
            }

            if on_segment.len() < 2 {
                log::debug!(
                    "Segment of {} has {} nodes, skipping",
                    segment_names[index],
                    on_segment.len()
                );
                continue;
            }
            on_segment.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for w in on_segment.windows(2) {
                builder.connect_street(w[0].1, w[1].1, segment_names[index]);
            }
        }

        builder.strip_temporary();
        if params.delete_dangling {
            builder.prune_dangling();
        }

        let graph = builder.finish(intersections);
        graph.validate()?;
        log::debug!(
            "Street graph: {} nodes, {} edges, {} crossings",
            graph.nodes.len(),
            graph.edge_count(),
            graph.intersections.len()
        );
        Ok(graph)
    }

    /// Checks edge symmetry, the absence of self-loops and of temporary edges.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            for (&other, kind) in &node.neighbors {
                if other == node.id {
                    return Err(CityError::Invariant(format!("node {} is its own neighbour", node.id)));
                }
                if *kind == EdgeKind::Temporary {
                    return Err(CityError::Invariant(format!(
                        "temporary edge {} - {} survived construction",
                        node.id, other
                    )));
                }
                match self.nodes.get(other).and_then(|n| n.neighbors.get(&node.id)) {
                    Some(back) if back == kind => {}
                    _ => {
                        return Err(CityError::Invariant(format!(
                            "edge {} - {} is not symmetric",
                            node.id, other
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn nodes(&self) -> &[StreetNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&StreetNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Positions of the distinct nodes where roads cross.
    pub fn intersections(&self) -> &[Vector] {
        &self.intersections
    }

    /// Street name of the edge between `from` and `to`.
    pub fn edge_name(&self, from: NodeId, to: NodeId) -> Result<&str> {
        match self.nodes.get(from).and_then(|n| n.neighbors.get(&to)) {
            Some(EdgeKind::Street(name)) => Ok(name),
            Some(EdgeKind::Temporary) => Err(CityError::Invariant(format!(
                "edge {} - {} has no street name",
                from, to
            ))),
            None => Err(CityError::NotNeighbors { from, to }),
        }
    }

    /// Every undirected edge once, as `(low id, high id, name)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, &str)> + '_ {
        self.nodes.iter().flat_map(|node| {
            node.neighbors
                .iter()
                .filter(move |&(&other, _)| other > node.id)
                .map(move |(&other, kind)| {
                    let name = match kind {
                        EdgeKind::Street(name) => name.as_str(),
                        EdgeKind::Temporary => "",
                    };
                    (node.id, other, name)
                })
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Nodes with fewer than two neighbours.
    pub fn dangling_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.degree() <= 1).count()
    }

    /// Every stored coordinate: node positions, then crossings.
    pub(crate) fn positions_mut(&mut self) -> impl Iterator<Item = &mut Vector> + '_ {
        self.nodes
            .iter_mut()
            .map(|n| &mut n.position)
            .chain(self.intersections.iter_mut())
    }

    /// Adjacency with neighbour ids sorted ascending.
    pub fn adjacency(&self) -> Vec<Vec<NodeId>> {
        self.nodes
            .iter()
            .map(|n| n.neighbors.keys().copied().collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, from: (f64, f64), to: (f64, f64), n: usize) -> NamedRoad {
        let a = Vector::new(from.0, from.1);
        let b = Vector::new(to.0, to.1);
        let points = (0..=n).map(|i| a.lerp(b, i as f64 / n as f64)).collect();
        NamedRoad::new(name, points)
    }

    fn hash_grid() -> Vec<NamedRoad> {
        vec![
            line("A Street", (0.0, 10.0), (40.0, 10.0), 8),
            line("B Street", (0.0, 30.0), (40.0, 30.0), 8),
            line("C Street", (10.0, 0.0), (10.0, 40.0), 8),
            line("D Street", (30.0, 0.0), (30.0, 40.0), 8),
        ]
    }

    #[test]
    fn test_crossing_roads_share_a_node() {
        let roads = vec![
            line("Main Avenue", (0.0, 5.0), (10.0, 5.0), 2),
            line("Side Street", (5.0, 0.0), (5.0, 10.0), 2),
        ];
        let graph = StreetGraph::build(&roads, &GraphParams::default()).unwrap();
        assert_eq!(graph.len(), 5);
        let center = graph
            .nodes()
            .iter()
            .find(|n| n.position.distance_to(Vector::new(5.0, 5.0)) < 1e-9)
            .unwrap();
        assert_eq!(center.degree(), 4);
        assert_eq!(graph.intersections().len(), 1);
    }

    #[test]
    fn test_fuzzy_merge_of_close_points() {
        let roads = vec![
            NamedRoad::new("A", vec![Vector::new(0.0, 0.0), Vector::new(10.0, 0.0)]),
            NamedRoad::new("B", vec![Vector::new(10.5, 0.2), Vector::new(20.0, 0.0)]),
        ];
        let graph = StreetGraph::build(&roads, &GraphParams::default()).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_graph_invariants() {
        let graph = StreetGraph::build(&hash_grid(), &GraphParams::default()).unwrap();
        graph.validate().unwrap();
        for node in graph.nodes() {
            assert!(!node.neighbors.contains_key(&node.id));
            for (other, kind) in &node.neighbors {
                assert!(matches!(kind, EdgeKind::Street(_)));
                assert_eq!(graph.node(*other).unwrap().neighbors.get(&node.id), Some(kind));
            }
        }
        assert_eq!(graph.intersections().len(), 4);
    }

    #[test]
    fn test_edge_names() {
        let graph = StreetGraph::build(&hash_grid(), &GraphParams::default()).unwrap();
        let names: BTreeSet<&str> = graph.edges().map(|(_, _, name)| name).collect();
        assert_eq!(names.len(), 4);
        assert!(names.contains("A Street"));

        let (a, b, name) = graph.edges().next().unwrap();
        assert_eq!(graph.edge_name(a, b).unwrap(), name);
        assert_eq!(graph.edge_name(b, a).unwrap(), name);

        let far = graph
            .nodes()
            .iter()
            .find(|n| !n.neighbors.contains_key(&a) && n.id != a)
            .unwrap();
        assert!(matches!(
            graph.edge_name(a, far.id),
            Err(CityError::NotNeighbors { .. })
        ));
    }

    #[test]
    fn test_delete_dangling_leaves_cycle() {
        let params = GraphParams { delete_dangling: true, ..GraphParams::default() };
        let graph = StreetGraph::build(&hash_grid(), &params).unwrap();
        assert_eq!(graph.dangling_count(), 0);
        assert!(!graph.is_empty());
        for node in graph.nodes() {
            let p = node.position;
            assert!(p.x >= 10.0 - 1e-9 && p.x <= 30.0 + 1e-9);
            assert!(p.y >= 10.0 - 1e-9 && p.y <= 30.0 + 1e-9);
        }
        let ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, (0..graph.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_dangling_pruned_to_empty_for_tree() {
        let params = GraphParams { delete_dangling: true, ..GraphParams::default() };
        let roads = vec![line("Lonely Road", (0.0, 0.0), (50.0, 0.0), 10)];
        let graph = StreetGraph::build(&roads, &params).unwrap();
        assert!(graph.is_empty());
    }
}
