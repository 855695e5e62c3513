//! Spatial hash of streamline samples used for separation queries.

use crate::geometry::{Bounds, Vector};

/// Uniform grid with cells `dsep` wide.
///
/// Any point closer than `dsep` to a query lies in the 3x3 block of cells
/// around it, so separation tests only look at those nine cells.
#[derive(Clone, Debug)]
pub struct GridStorage {
    world: Bounds,
    dsep: f64,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Vector>>,
}

impl GridStorage {
    pub fn new(world: Bounds, dsep: f64) -> Self {
        let dsep = dsep.max(1e-6);
        let cols = (world.size.x / dsep).ceil().max(1.0) as usize;
        let rows = (world.size.y / dsep).ceil().max(1.0) as usize;
        Self {
            world,
            dsep,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    /// Merges every sample of another grid, re-bucketed to this grid's cells.
    pub fn add_all(&mut self, other: &GridStorage) {
        for cell in &other.cells {
            for p in cell {
                self.add_sample(*p);
            }
        }
    }

    pub fn add_polyline(&mut self, points: &[Vector]) {
        for p in points {
            self.add_sample(*p);
        }
    }

    pub fn add_sample(&mut self, p: Vector) {
        let (x, y) = self.cell_coords(p);
        self.cells[y * self.cols + x].push(p);
    }

    /// True when no stored sample is within `sqrt(d_sq)` of `p`.
    /// Only exact for distances up to `dsep`.
    pub fn is_valid_sample(&self, p: Vector, d_sq: f64) -> bool {
        let (cx, cy) = self.cell_coords(p);
        for y in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for x in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                if self.cells[y * self.cols + x]
                    .iter()
                    .any(|s| s.distance_to_sq(p) < d_sq)
                {
                    return false;
                }
            }
        }
        true
    }

    /// Samples in the cells within roughly `distance` of `p`. Callers filter
    /// by exact distance when they need to.
    pub fn get_nearby_points(&self, p: Vector, distance: f64) -> Vec<Vector> {
        let radius = ((distance / self.dsep) - 0.5).ceil().max(0.0) as usize;
        let (cx, cy) = self.cell_coords(p);
        let mut out = Vec::new();
        for y in cy.saturating_sub(radius)..=(cy + radius).min(self.rows - 1) {
            for x in cx.saturating_sub(radius)..=(cx + radius).min(self.cols - 1) {
                out.extend_from_slice(&self.cells[y * self.cols + x]);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.cells.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| c.is_empty())
    }

    /// Cell of `p`, clamped to the grid for points outside the world.
    fn cell_coords(&self, p: Vector) -> (usize, usize) {
        let local = p - self.world.origin;
        let x = (local.x / self.dsep).floor();
        let y = (local.y / self.dsep).floor();
        let x = if x.is_finite() { x.clamp(0.0, (self.cols - 1) as f64) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(0.0, (self.rows - 1) as f64) } else { 0.0 };
        (x as usize, y as usize)
    }
}
