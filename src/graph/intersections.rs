//! Sweep-line search for crossings between road segments.

use crate::geometry::{segment_intersection, Vector};

/// One segment of a road polyline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// Index of the road the segment belongs to
    pub road: usize,
    pub a: Vector,
    pub b: Vector,
}

impl Segment {
    fn min_x(&self) -> f64 {
        self.a.x.min(self.b.x)
    }

    fn max_x(&self) -> f64 {
        self.a.x.max(self.b.x)
    }
}

/// A crossing between segments `first` and `second` (indices into the input).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crossing {
    pub first: usize,
    pub second: usize,
    pub point: Vector,
}

/// All crossings between segments of different roads.
///
/// Segments are swept in order of their left end; only segments whose x
/// ranges overlap are tested against each other. Output is ordered by the
/// sweep, so it is deterministic for a given input.
pub fn find_crossings(segments: &[Segment]) -> Vec<Crossing> {
    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by(|&i, &j| {
        segments[i]
            .min_x()
            .total_cmp(&segments[j].min_x())
            .then(i.cmp(&j))
    });

    let mut active: Vec<usize> = Vec::new();
    let mut crossings = Vec::new();

    for &i in &order {
        let s = &segments[i];
        let sweep_x = s.min_x();
        active.retain(|&j| segments[j].max_x() >= sweep_x);

        for &j in &active {
            let other = &segments[j];
            if other.road == s.road {
                continue;
            }
            if let Some((point, _, _)) = segment_intersection(other.a, other.b, s.a, s.b) {
                crossings.push(Crossing { first: j, second: i, point });
            }
        }
        active.push(i);
    }

    crossings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(road: usize, ax: f64, ay: f64, bx: f64, by: f64) -> Segment {
        Segment { road, a: Vector::new(ax, ay), b: Vector::new(bx, by) }
    }

    #[test]
    fn test_finds_cross() {
        let segments = vec![seg(0, 0.0, 0.0, 10.0, 10.0), seg(1, 0.0, 10.0, 10.0, 0.0)];
        let crossings = find_crossings(&segments);
        assert_eq!(crossings.len(), 1);
        assert!(crossings[0].point.distance_to(Vector::new(5.0, 5.0)) < 1e-9);
    }

    #[test]
    fn test_same_road_is_ignored() {
        let segments = vec![seg(0, 0.0, 0.0, 10.0, 10.0), seg(0, 0.0, 10.0, 10.0, 0.0)];
        assert!(find_crossings(&segments).is_empty());
    }

    #[test]
    fn test_grid_of_lines() {
        let mut segments = Vec::new();
        for i in 0..4 {
            let c = 2.0 + i as f64 * 2.0;
            segments.push(seg(i, c, 0.0, c, 10.0));
            segments.push(seg(10 + i, 0.0, c, 10.0, c));
        }
        assert_eq!(find_crossings(&segments).len(), 16);
    }

    #[test]
    fn test_disjoint_ranges() {
        let segments = vec![seg(0, 0.0, 0.0, 1.0, 1.0), seg(1, 5.0, 0.0, 6.0, 1.0)];
        assert!(find_crossings(&segments).is_empty());
    }
}
