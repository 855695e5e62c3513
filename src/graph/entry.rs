//! Lot entrances: where a lot meets the street it is addressed on.

use serde::{Deserialize, Serialize};

use super::{NodeId, StreetGraph};
use crate::error::{CityError, Result};
use crate::geometry::{distance_to_segment, project_onto_segment, Vector};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Midpoint of the lot wall facing the street
    pub door: Vector,
    /// Door projected onto the street edge
    pub street_point: Vector,
    pub street_name: String,
    pub edge: (NodeId, NodeId),
}

impl StreetGraph {
    /// Entrance of `lot` on its nearest street edge.
    ///
    /// `Ok(None)` for an empty graph or a lot with fewer than two vertices.
    /// Linear in the number of edges.
    pub fn entry_point(&self, lot: &[Vector]) -> Result<Option<EntryPoint>> {
        if lot.len() < 2 {
            return Ok(None);
        }

        let mut nearest: Option<(f64, NodeId, NodeId)> = None;
        for (a, b, _) in self.edges() {
            let pa = self.nodes[a].position;
            let pb = self.nodes[b].position;
            for v in lot {
                let d = distance_to_segment(*v, pa, pb);
                if nearest.map_or(true, |(best, _, _)| d < best) {
                    nearest = Some((d, a, b));
                }
            }
        }
        let (_, a, b) = match nearest {
            Some(n) => n,
            None => return Ok(None),
        };
        let pa = self.nodes[a].position;
        let pb = self.nodes[b].position;

        let mut door = lot[0];
        let mut door_dist = f64::INFINITY;
        for i in 0..lot.len() {
            let mid = lot[i].lerp(lot[(i + 1) % lot.len()], 0.5);
            let d = distance_to_segment(mid, pa, pb);
            if d < door_dist {
                door_dist = d;
                door = mid;
            }
        }

        let (street_point, _) =
            project_onto_segment(door, pa, pb).ok_or(CityError::ZeroLengthSegment { at: pa })?;
        let street_name = self.edge_name(a, b)?.to_string();

        Ok(Some(EntryPoint {
            door,
            street_point,
            street_name,
            edge: (a, b),
        }))
    }
}
