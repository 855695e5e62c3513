//! Block extraction and lot subdivision.
//!
//! Faces of the street graph are found by always taking the rightmost turn.
//! Each directed edge borders exactly one face, so edges of accepted faces are
//! removed from a working copy of the adjacency as the search goes. The graph
//! itself is left untouched.

use std::collections::BTreeSet;
use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CityError, Result};
use crate::field::VectorField;
use crate::geometry::Vector;
use crate::graph::{NodeId, StreetGraph};
use crate::polygon::{average_point, inset, is_simple, is_sliver, signed_area, subdivide};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonParams {
    /// Longest walk (in nodes) before a face search is abandoned
    pub max_length: usize,
    /// Pieces are split while at least twice this area
    pub min_area: f64,
    /// Inset applied to every face before dividing
    pub shrink_spacing: f64,
    /// Probability a face is kept whole
    pub chance_no_divide: f64,
}

impl Default for PolygonParams {
    fn default() -> Self {
        Self::lots()
    }
}

impl PolygonParams {
    pub fn lots() -> Self {
        Self {
            max_length: 20,
            min_area: 50.0,
            shrink_spacing: 4.0,
            chance_no_divide: 0.05,
        }
    }

    pub fn parks() -> Self {
        Self {
            max_length: 20,
            min_area: 80.0,
            shrink_spacing: 4.0,
            chance_no_divide: 1.0,
        }
    }
}

/// A closed face of the street graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub nodes: Vec<NodeId>,
    pub polygon: Vec<Vector>,
}

pub struct PolygonFinder<'a> {
    graph: &'a StreetGraph,
    params: PolygonParams,
    faces: Vec<Face>,
    shrunk: Option<Vec<Vec<Vector>>>,
    divided: Vec<Vec<Vector>>,
}

impl<'a> PolygonFinder<'a> {
    pub fn new(graph: &'a StreetGraph, params: PolygonParams) -> Self {
        Self {
            graph,
            params,
            faces: Vec::new(),
            shrunk: None,
            divided: Vec::new(),
        }
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn polygons(&self) -> Vec<Vec<Vector>> {
        self.faces.iter().map(|f| f.polygon.clone()).collect()
    }

    pub fn shrunk_polygons(&self) -> &[Vec<Vector>] {
        self.shrunk.as_deref().unwrap_or(&[])
    }

    pub fn divided_polygons(&self) -> &[Vec<Vector>] {
        &self.divided
    }

    // =========================================================================
    // EXTRACTION
    // =========================================================================

    /// Finds every bounded face whose average point is on land and outside
    /// the field's parks.
    pub fn find_polygons(&mut self, field: &VectorField) -> Result<()> {
        let adjacency = self.graph.adjacency();
        let mut remaining: Vec<BTreeSet<NodeId>> = adjacency
            .iter()
            .map(|adj| adj.iter().copied().collect())
            .collect();

        let mut faces = Vec::new();
        for start in 0..adjacency.len() {
            if adjacency[start].len() < 2 {
                continue;
            }
            for &next in &adjacency[start] {
                if !remaining[start].contains(&next) {
                    continue;
                }
                let cycle = match self.walk(&remaining, start, next) {
                    Some(cycle) => cycle,
                    None => continue,
                };
                let polygon: Vec<Vector> = cycle
                    .iter()
                    .map(|&id| self.graph.nodes()[id].position)
                    .collect();
                if polygon.len() < 3 || signed_area(&polygon) >= 0.0 || !is_simple(&polygon) {
                    continue;
                }

                for i in 0..cycle.len() {
                    let from = cycle[i];
                    let to = cycle[(i + 1) % cycle.len()];
                    if !remaining[from].remove(&to) {
                        return Err(CityError::Invariant(format!(
                            "face edge {} -> {} missing from working adjacency",
                            from, to
                        )));
                    }
                }
                faces.push(Face { nodes: cycle, polygon });
            }
        }

        let found = faces.len();
        faces.retain(|face| {
            let p = average_point(&face.polygon);
            field.on_land(p) && !field.in_parks(p)
        });
        log::debug!("Found {} faces, {} on land outside parks", found, faces.len());

        self.faces = faces;
        self.shrunk = None;
        self.divided.clear();
        Ok(())
    }

    /// Rightmost-turn walk from the directed edge `from -> to`. Returns the
    /// cycle closed at the first revisited node, or `None` at a dead end or
    /// once the walk reaches `max_length` nodes.
    fn walk(&self, adjacency: &[BTreeSet<NodeId>], from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let mut visited = vec![from, to];
        loop {
            if visited.len() >= self.params.max_length {
                return None;
            }
            let n = visited.len();
            let next = self.rightmost_node(adjacency, visited[n - 2], visited[n - 1])?;
            if let Some(pos) = visited.iter().position(|&v| v == next) {
                return Some(visited.split_off(pos));
            }
            visited.push(next);
        }
    }

    /// Neighbour of `to` making the sharpest right turn when arriving from
    /// `from`: the smallest counter-clockwise angle from the backwards vector.
    fn rightmost_node(&self, adjacency: &[BTreeSet<NodeId>], from: NodeId, to: NodeId) -> Option<NodeId> {
        let nodes = self.graph.nodes();
        let origin = nodes[to].position;
        let back_angle = (nodes[from].position - origin).angle();

        let mut best: Option<(f64, NodeId)> = None;
        for &candidate in adjacency.get(to)? {
            if candidate == from {
                continue;
            }
            let mut angle = (nodes[candidate].position - origin).angle() - back_angle;
            if angle < 0.0 {
                angle += TAU;
            }
            if best.map_or(true, |(smallest, _)| angle < smallest) {
                best = Some((angle, candidate));
            }
        }
        best.map(|(_, id)| id)
    }

    // =========================================================================
    // SHRINK AND DIVIDE
    // =========================================================================

    /// Insets every face by `shrink_spacing`, dropping those that collapse.
    pub fn shrink(&mut self) {
        let spacing = self.params.shrink_spacing;
        let shrunk: Vec<Vec<Vector>> = self
            .faces
            .par_iter()
            .filter_map(|face| inset(&face.polygon, spacing))
            .collect();
        log::debug!("Shrunk {} faces to {} polygons", self.faces.len(), shrunk.len());
        self.shrunk = Some(shrunk);
    }

    /// Splits the shrunk faces (or the raw faces if `shrink` was not run)
    /// into lots, then drops slivers.
    ///
    /// Each polygon gets its own RNG seeded from `rng`, so the result does not
    /// depend on how rayon schedules the work.
    pub fn divide<R: Rng>(&mut self, rng: &mut R) {
        let source: Vec<Vec<Vector>> = match &self.shrunk {
            Some(shrunk) => shrunk.clone(),
            None => self.polygons(),
        };
        let base_seed: u64 = rng.gen();
        let min_area = self.params.min_area;
        let chance_no_divide = self.params.chance_no_divide;

        let pieces: Vec<Vec<Vec<Vector>>> = source
            .par_iter()
            .enumerate()
            .map(|(i, polygon)| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(i as u64));
                if rng.gen::<f64>() < chance_no_divide {
                    vec![polygon.clone()]
                } else {
                    subdivide(polygon, min_area, &mut rng)
                }
            })
            .collect();

        self.divided = pieces
            .into_iter()
            .flatten()
            .filter(|p| !is_sliver(p, min_area))
            .collect();
        log::debug!("Divided {} polygons into {} lots", source.len(), self.divided.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::NoiseParams;
    use crate::graph::{GraphParams, NamedRoad};
    use crate::polygon::area;

    /// Three horizontal and three vertical roads: a 2x2 block grid.
    fn grid_graph(spacing: f64) -> StreetGraph {
        let mut roads = Vec::new();
        for i in 0..3 {
            let c = i as f64 * spacing;
            roads.push(NamedRoad::new(
                format!("Row {}", i),
                vec![Vector::new(-5.0, c), Vector::new(2.0 * spacing + 5.0, c)],
            ));
            roads.push(NamedRoad::new(
                format!("Column {}", i),
                vec![Vector::new(c, -5.0), Vector::new(c, 2.0 * spacing + 5.0)],
            ));
        }
        let params = GraphParams { delete_dangling: true, ..GraphParams::default() };
        StreetGraph::build(&roads, &params).unwrap()
    }

    fn open_field() -> VectorField {
        VectorField::new(NoiseParams::default(), 1, false)
    }

    #[test]
    fn test_finds_inner_faces_only() {
        let graph = grid_graph(40.0);
        let mut finder = PolygonFinder::new(&graph, PolygonParams::lots());
        finder.find_polygons(&open_field()).unwrap();
        assert_eq!(finder.faces().len(), 4);
        for face in finder.faces() {
            assert!(face.polygon.len() >= 4);
            assert!(is_simple(&face.polygon));
            assert!((area(&face.polygon) - 1600.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_graph_untouched_and_repeatable() {
        let graph = grid_graph(40.0);
        let before = graph.clone();
        let mut finder = PolygonFinder::new(&graph, PolygonParams::lots());
        finder.find_polygons(&open_field()).unwrap();
        let first = finder.faces().to_vec();
        finder.find_polygons(&open_field()).unwrap();
        assert_eq!(finder.faces(), first.as_slice());
        assert_eq!(graph, before);
    }

    #[test]
    fn test_max_length_discards_long_walks() {
        let graph = grid_graph(40.0);
        let params = PolygonParams { max_length: 3, ..PolygonParams::lots() };
        let mut finder = PolygonFinder::new(&graph, params);
        finder.find_polygons(&open_field()).unwrap();
        assert!(finder.faces().is_empty());
    }

    #[test]
    fn test_faces_in_parks_are_filtered() {
        let graph = grid_graph(40.0);
        let mut field = open_field();
        field.parks.push(vec![
            Vector::new(0.0, 0.0),
            Vector::new(40.0, 0.0),
            Vector::new(40.0, 40.0),
            Vector::new(0.0, 40.0),
        ]);
        let mut finder = PolygonFinder::new(&graph, PolygonParams::lots());
        finder.find_polygons(&field).unwrap();
        assert_eq!(finder.faces().len(), 3);
    }

    #[test]
    fn test_shrink_and_divide() {
        let graph = grid_graph(40.0);
        let mut finder = PolygonFinder::new(&graph, PolygonParams::lots());
        finder.find_polygons(&open_field()).unwrap();
        finder.shrink();
        assert_eq!(finder.shrunk_polygons().len(), 4);
        for p in finder.shrunk_polygons() {
            assert!((area(p) - 32.0 * 32.0).abs() < 1e-6);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        finder.divide(&mut rng);
        let lots = finder.divided_polygons();
        assert!(lots.len() > 4);
        for lot in lots {
            assert!(lot.len() >= 3);
            assert!(is_simple(lot));
            assert!(area(lot) < 2.0 * 50.0 + 1e-6 || area(lot) > 1000.0);
        }
    }

    #[test]
    fn test_divide_is_deterministic() {
        let graph = grid_graph(40.0);
        let run = || {
            let mut finder = PolygonFinder::new(&graph, PolygonParams::lots());
            finder.find_polygons(&open_field()).unwrap();
            finder.shrink();
            let mut rng = ChaCha8Rng::seed_from_u64(77);
            finder.divide(&mut rng);
            finder.divided_polygons().to_vec()
        };
        assert_eq!(run(), run());
    }
}
