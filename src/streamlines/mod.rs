//! Streamline tracing: turns the tensor field into road polylines.
//!
//! Seeds are placed at random, then both ends of the streamline are traced at
//! once until they leave the map, run into another road of the same family,
//! or close into a loop. After seeding is exhausted, dangling ends are joined
//! onto nearby roads.

pub mod grid_storage;
pub mod water;

pub use grid_storage::GridStorage;
pub use water::{WaterGenerator, WaterParams};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::field::{FieldIntegrator, Integrator, VectorField};
use crate::geometry::{Bounds, Vector};
use crate::polygon::{contains_point, simplify};

/// Streamlines with fewer points than this are discarded.
const MIN_STREAMLINE_POINTS: usize = 6;

/// Distances are in world units, `join_angle` in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamlineParams {
    /// Minimum distance between a seed and existing streamlines
    pub dsep: f64,
    /// Tracing stops closer than this to an existing streamline (clamped to dsep)
    pub dtest: f64,
    /// Integration step
    pub dstep: f64,
    /// How far ahead dangling ends look for something to join
    pub dlookahead: f64,
    /// Fronts closer than this after separating close into a loop
    pub dcirclejoin: f64,
    /// Maximum deviation of a join from the streamline direction
    pub join_angle: f64,
    /// Maximum integration steps per front
    pub path_iterations: usize,
    /// Random seed attempts before the tier ends
    pub seed_tries: usize,
    pub simplify_tolerance: f64,
    /// Probability that a streamline also collides with the other family
    pub collide_early: f64,
}

impl Default for StreamlineParams {
    fn default() -> Self {
        Self::minor()
    }
}

impl StreamlineParams {
    fn base() -> Self {
        Self {
            dsep: 20.0,
            dtest: 15.0,
            dstep: 1.0,
            dlookahead: 40.0,
            dcirclejoin: 5.0,
            join_angle: 0.1,
            path_iterations: 1000,
            seed_tries: 300,
            simplify_tolerance: 0.5,
            collide_early: 0.0,
        }
    }

    pub fn main() -> Self {
        Self {
            dsep: 150.0,
            dtest: 75.0,
            dlookahead: 200.0,
            ..Self::base()
        }
    }

    pub fn major() -> Self {
        Self {
            dsep: 60.0,
            dtest: 25.0,
            dlookahead: 120.0,
            ..Self::base()
        }
    }

    pub fn minor() -> Self {
        Self::base()
    }

    /// Coastline and river tracing.
    pub fn water() -> Self {
        Self {
            dsep: 150.0,
            dtest: 75.0,
            dlookahead: 200.0,
            path_iterations: 10000,
            simplify_tolerance: 10.0,
            ..Self::base()
        }
    }

    /// Copy with `dtest` clamped to `dsep`.
    pub fn normalized(mut self) -> Self {
        if self.dtest > self.dsep {
            self.dtest = self.dsep;
        }
        self
    }
}

/// A traced road. `major` records which eigenvector family it follows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Streamline {
    pub points: Vec<Vector>,
    pub major: bool,
}

impl Streamline {
    pub fn is_closed(&self) -> bool {
        self.points.len() > 1 && self.points.first() == self.points.last()
    }
}

/// Progress of a [`StreamlineGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorState {
    /// Seeding and tracing, next streamline in the given family
    Seeding { major: bool },
    /// Seeding exhausted, dangling ends still to be joined
    Joining,
    Complete,
}

/// One end of a streamline being traced.
struct Front {
    seed: Vector,
    original_dir: Vector,
    prev_point: Vector,
    prev_dir: Vector,
    points: Vec<Vector>,
    valid: bool,
}

impl Front {
    fn new(seed: Vector, dir: Vector, points: Vec<Vector>) -> Self {
        Self {
            seed,
            original_dir: dir,
            prev_point: seed + dir,
            prev_dir: dir,
            points,
            valid: false,
        }
    }
}

pub struct StreamlineGenerator<I: FieldIntegrator = Integrator> {
    integrator: I,
    pub(crate) world: Bounds,
    pub(crate) params: StreamlineParams,
    pub(crate) major_grid: GridStorage,
    pub(crate) minor_grid: GridStorage,
    pub(crate) streamlines: Vec<Streamline>,
    pub(crate) simplified: Vec<Vec<Vector>>,
    exclusions: Vec<Vec<Vector>>,
    state: GeneratorState,
    failed_traces: usize,
    pub(crate) rng: ChaCha8Rng,
}

impl<I: FieldIntegrator> StreamlineGenerator<I> {
    pub fn new(integrator: I, world: Bounds, params: StreamlineParams, seed: u64) -> Self {
        let params = params.normalized();
        Self {
            integrator,
            world,
            params,
            major_grid: GridStorage::new(world, params.dsep),
            minor_grid: GridStorage::new(world, params.dsep),
            streamlines: Vec::new(),
            simplified: Vec::new(),
            exclusions: Vec::new(),
            state: GeneratorState::Seeding { major: true },
            failed_traces: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &StreamlineParams {
        &self.params
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn streamlines(&self) -> &[Streamline] {
        &self.streamlines
    }

    /// Simplified copies, index-aligned with `streamlines()`.
    pub fn simplified_streamlines(&self) -> &[Vec<Vector>] {
        &self.simplified
    }

    /// Polygons no streamline may enter.
    pub fn set_exclusions(&mut self, exclusions: Vec<Vec<Vector>>) {
        self.exclusions = exclusions;
    }

    /// Treats the samples of another generator as already traced, so seeds
    /// and collisions take them into account.
    pub fn add_existing_streamlines<J: FieldIntegrator>(&mut self, other: &StreamlineGenerator<J>) {
        self.major_grid.add_all(&other.major_grid);
        self.minor_grid.add_all(&other.minor_grid);
    }

    pub(crate) fn grid(&self, major: bool) -> &GridStorage {
        if major {
            &self.major_grid
        } else {
            &self.minor_grid
        }
    }

    pub(crate) fn grid_mut(&mut self, major: bool) -> &mut GridStorage {
        if major {
            &mut self.major_grid
        } else {
            &mut self.minor_grid
        }
    }

    // =========================================================================
    // DRIVER
    // =========================================================================

    /// Runs every remaining step.
    pub fn create_all_streamlines(&mut self, field: &VectorField) {
        while self.update(field) {}
    }

    /// One unit of work: a single seed-and-trace attempt, or the joining pass.
    /// Returns false once the generator is complete.
    pub fn update(&mut self, field: &VectorField) -> bool {
        match self.state {
            GeneratorState::Seeding { major } => {
                self.state = if self.create_streamline(field, major) {
                    GeneratorState::Seeding { major: !major }
                } else {
                    log::debug!(
                        "Seeding exhausted after {} streamlines",
                        self.streamlines.len()
                    );
                    GeneratorState::Joining
                };
                true
            }
            GeneratorState::Joining => {
                self.join_dangling_streamlines(field);
                self.state = GeneratorState::Complete;
                true
            }
            GeneratorState::Complete => false,
        }
    }

    /// Seeds and traces one streamline. False when no seed could be found or
    /// too many traces in a row were discarded.
    fn create_streamline(&mut self, field: &VectorField, major: bool) -> bool {
        let seed = match self.get_seed(field, major) {
            Some(seed) => seed,
            None => return false,
        };
        let points = self.integrate_streamline(field, seed, major);
        if points.len() >= MIN_STREAMLINE_POINTS {
            self.failed_traces = 0;
            self.commit(points, major);
        } else {
            self.failed_traces += 1;
            if self.failed_traces > self.params.seed_tries {
                return false;
            }
        }
        true
    }

    pub(crate) fn commit(&mut self, points: Vec<Vector>, major: bool) {
        self.grid_mut(major).add_polyline(&points);
        self.simplified.push(simplify(&points, self.params.simplify_tolerance));
        self.streamlines.push(Streamline { points, major });
    }

    pub(crate) fn get_seed(&mut self, field: &VectorField, major: bool) -> Option<Vector> {
        let dsep_sq = self.params.dsep * self.params.dsep;
        for _ in 0..self.params.seed_tries {
            let p = self.world.origin
                + Vector::new(
                    self.rng.gen::<f64>() * self.world.size.x,
                    self.rng.gen::<f64>() * self.world.size.y,
                );
            if self.is_valid_sample(field, p, dsep_sq, major, false) {
                return Some(p);
            }
        }
        None
    }

    fn in_exclusions(&self, p: Vector) -> bool {
        self.exclusions.iter().any(|poly| contains_point(poly, p))
    }

    fn is_valid_sample(
        &self,
        field: &VectorField,
        p: Vector,
        d_sq: f64,
        major: bool,
        both_grids: bool,
    ) -> bool {
        if !field.on_land(p) || self.in_exclusions(p) {
            return false;
        }
        if !self.grid(major).is_valid_sample(p, d_sq) {
            return false;
        }
        !both_grids || self.grid(!major).is_valid_sample(p, d_sq)
    }

    // =========================================================================
    // TRACING
    // =========================================================================

    /// Traces forwards and backwards from `seed` and returns the joined
    /// polyline, backward end first.
    pub(crate) fn integrate_streamline(
        &mut self,
        field: &VectorField,
        seed: Vector,
        major: bool,
    ) -> Vec<Vector> {
        let collide_both = self.rng.gen::<f64>() < self.params.collide_early;
        let dtest_sq = self.params.dtest * self.params.dtest;
        let join_sq = self.params.dcirclejoin * self.params.dcirclejoin;

        let d0 = match self.integrator.integrate(field, seed, None, major) {
            Some(d) => d * self.params.dstep,
            None => return vec![seed],
        };

        let mut forward = Front::new(seed, d0, vec![seed]);
        let mut backward = Front::new(seed, -d0, Vec::new());
        forward.valid = self.world.contains(forward.prev_point)
            && self.is_valid_sample(field, forward.prev_point, dtest_sq, major, collide_both);
        backward.valid = self.world.contains(backward.prev_point)
            && self.is_valid_sample(field, backward.prev_point, dtest_sq, major, collide_both);

        let mut escaped = false;
        let mut count = 0;
        while count < self.params.path_iterations && (forward.valid || backward.valid) {
            self.step_front(field, &mut forward, major, collide_both);
            self.step_front(field, &mut backward, major, collide_both);

            let gap = forward.prev_point.distance_to_sq(backward.prev_point);
            if !escaped && gap > join_sq {
                escaped = true;
            }
            if escaped && gap <= join_sq {
                forward.points.push(forward.prev_point);
                forward.points.push(backward.prev_point);
                backward.points.push(backward.prev_point);
                break;
            }
            count += 1;
        }

        let mut points = backward.points;
        points.reverse();
        points.extend(forward.points);
        points
    }

    fn step_front(&self, field: &VectorField, front: &mut Front, major: bool, collide_both: bool) {
        if !front.valid {
            return;
        }
        front.points.push(front.prev_point);

        let dir = match self
            .integrator
            .integrate(field, front.prev_point, Some(front.prev_dir), major)
        {
            Some(d) => d,
            None => {
                front.valid = false;
                return;
            }
        };
        let mut step = dir * self.params.dstep;
        if step.dot(front.prev_dir) < 0.0 {
            step = -step;
        }
        let next = front.prev_point + step;

        let dtest_sq = self.params.dtest * self.params.dtest;
        if self.world.contains(next)
            && self.is_valid_sample(field, next, dtest_sq, major, collide_both)
            && !streamline_turned(front.seed, front.original_dir, next, step)
        {
            front.prev_point = next;
            front.prev_dir = step;
        } else {
            // One step past the stopping point, so the end touches what it hit
            if field.on_land(next) && !self.in_exclusions(next) {
                front.points.push(next);
            }
            front.valid = false;
        }
    }

    // =========================================================================
    // JOINING
    // =========================================================================

    fn join_dangling_streamlines(&mut self, field: &VectorField) {
        for i in 0..self.streamlines.len() {
            if self.streamlines[i].is_closed() || self.streamlines[i].points.len() < 5 {
                continue;
            }
            let major = self.streamlines[i].major;

            let (start, start_prev) = {
                let pts = &self.streamlines[i].points;
                (pts[0], pts[4])
            };
            if let Some(target) = self.best_next_point(start, start_prev) {
                let extra = self.points_between(field, start, target);
                for p in &extra {
                    self.grid_mut(major).add_sample(*p);
                }
                let pts = &mut self.streamlines[i].points;
                let tail = std::mem::take(pts);
                pts.extend(extra.into_iter().rev());
                pts.extend(tail);
            }

            let (end, end_prev) = {
                let pts = &self.streamlines[i].points;
                (pts[pts.len() - 1], pts[pts.len() - 5])
            };
            if let Some(target) = self.best_next_point(end, end_prev) {
                let extra = self.points_between(field, end, target);
                for p in &extra {
                    self.grid_mut(major).add_sample(*p);
                }
                self.streamlines[i].points.extend(extra);
            }
        }

        let tolerance = self.params.simplify_tolerance;
        self.simplified = self
            .streamlines
            .iter()
            .map(|s| simplify(&s.points, tolerance))
            .collect();
    }

    /// Where a dangling end at `point`, arriving from `previous`, should join.
    fn best_next_point(&self, point: Vector, previous: Vector) -> Option<Vector> {
        let lookahead = self.params.dlookahead;
        let mut nearby = self.major_grid.get_nearby_points(point, lookahead);
        nearby.extend(self.minor_grid.get_nearby_points(point, lookahead));

        let direction = point - previous;
        let immediate_sq = 2.0 * self.params.dstep * self.params.dstep;
        let mut closest: Option<Vector> = None;
        let mut closest_dist = f64::INFINITY;

        for sample in nearby {
            if sample == point || sample == previous {
                continue;
            }
            let diff = sample - point;
            if diff.dot(direction) < 0.0 {
                continue;
            }
            let dist_sq = diff.length_sq();
            if dist_sq > lookahead * lookahead {
                continue;
            }
            if dist_sq < immediate_sq {
                closest = Some(sample);
                break;
            }
            let angle = Vector::angle_between(direction, diff);
            if angle < self.params.join_angle && dist_sq < closest_dist {
                closest_dist = dist_sq;
                closest = Some(sample);
            }
        }

        closest.map(|s| s + direction.set_length(self.params.simplify_tolerance * 4.0))
    }

    /// Evenly spaced points from `from` (exclusive) to `to`, stopping at the
    /// first one off land or inside an exclusion.
    fn points_between(&self, field: &VectorField, from: Vector, to: Vector) -> Vec<Vector> {
        let n = (from.distance_to(to) / self.params.dstep).floor() as usize;
        let mut out = Vec::with_capacity(n);
        for i in 1..=n {
            let p = from.lerp(to, i as f64 / n as f64);
            if !field.on_land(p) || self.in_exclusions(p) {
                break;
            }
            out.push(p);
        }
        out
    }
}

/// True once a front has turned back on itself past its seed.
fn streamline_turned(seed: Vector, original_dir: Vector, point: Vector, direction: Vector) -> bool {
    if original_dir.dot(direction) >= 0.0 {
        return false;
    }
    let perpendicular = Vector::new(original_dir.y, -original_dir.x);
    let is_left = (point - seed).dot(perpendicular) < 0.0;
    let direction_up = direction.dot(perpendicular) > 0.0;
    is_left == direction_up
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{IntegratorKind, NoiseParams};

    fn world() -> Bounds {
        Bounds::new(Vector::ZERO, Vector::new(200.0, 200.0))
    }

    fn params() -> StreamlineParams {
        StreamlineParams {
            dsep: 20.0,
            dtest: 10.0,
            dstep: 1.0,
            dlookahead: 40.0,
            dcirclejoin: 5.0,
            join_angle: 0.1,
            path_iterations: 500,
            seed_tries: 100,
            simplify_tolerance: 0.5,
            collide_early: 0.0,
        }
    }

    fn field() -> VectorField {
        let mut field = VectorField::new(NoiseParams::default(), 5, false);
        field.add_grid(Vector::new(100.0, 100.0), 1000.0, 0.0, 0.3);
        field
    }

    fn generator(seed: u64) -> StreamlineGenerator {
        StreamlineGenerator::new(Integrator::new(IntegratorKind::Rk4, 1.0), world(), params(), seed)
    }

    #[test]
    fn test_dtest_clamped_to_dsep() {
        let p = StreamlineParams { dtest: 50.0, dsep: 20.0, ..params() }.normalized();
        assert_eq!(p.dtest, 20.0);
    }

    #[test]
    fn test_generates_both_families() {
        let field = field();
        let mut gen = generator(1);
        gen.create_all_streamlines(&field);
        assert_eq!(gen.state(), GeneratorState::Complete);
        assert!(gen.streamlines().iter().any(|s| s.major));
        assert!(gen.streamlines().iter().any(|s| !s.major));
        assert_eq!(gen.streamlines().len(), gen.simplified_streamlines().len());
        assert!(gen.streamlines().iter().all(|s| s.points.len() >= 5));
    }

    #[test]
    fn test_same_family_separation() {
        let field = field();
        let mut gen = generator(2);
        while gen.state() != GeneratorState::Joining {
            gen.update(&field);
        }
        let lines = gen.streamlines();
        let dtest = gen.params().dtest;
        for (i, a) in lines.iter().enumerate() {
            for b in lines.iter().skip(i + 1).filter(|b| b.major == a.major) {
                let inner_a = &a.points[1..a.points.len() - 1];
                let inner_b = &b.points[1..b.points.len() - 1];
                for p in inner_a {
                    for q in inner_b {
                        assert!(p.distance_to(*q) >= dtest - 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn test_streamlines_stay_on_land() {
        let mut field = field();
        field.sea = vec![
            Vector::new(0.0, 0.0),
            Vector::new(60.0, 0.0),
            Vector::new(60.0, 200.0),
            Vector::new(0.0, 200.0),
        ];
        let mut gen = generator(3);
        gen.create_all_streamlines(&field);
        assert!(!gen.streamlines().is_empty());
        for s in gen.streamlines() {
            assert!(s.points.iter().all(|p| field.on_land(*p)));
        }
    }

    #[test]
    fn test_exclusions_are_respected() {
        let field = field();
        let park = vec![
            Vector::new(50.0, 50.0),
            Vector::new(150.0, 50.0),
            Vector::new(150.0, 150.0),
            Vector::new(50.0, 150.0),
        ];
        let mut gen = generator(4);
        gen.set_exclusions(vec![park.clone()]);
        gen.create_all_streamlines(&field);
        for s in gen.streamlines() {
            assert!(s.points.iter().all(|p| !contains_point(&park, *p)));
        }
    }

    #[test]
    fn test_update_matches_create_all() {
        let field = field();
        let mut a = generator(9);
        a.create_all_streamlines(&field);
        let mut b = generator(9);
        let mut steps = 0;
        while b.update(&field) {
            steps += 1;
        }
        assert!(steps > 1);
        assert_eq!(a.streamlines(), b.streamlines());
    }

    #[test]
    fn test_existing_streamlines_block_seeds() {
        let field = field();
        let mut first = generator(6);
        first.create_all_streamlines(&field);

        let mut second = generator(7);
        second.add_existing_streamlines(&first);
        let dsep_sq = second.params().dsep * second.params().dsep;
        for s in first.streamlines() {
            for p in &s.points {
                assert!(!second.grid(s.major).is_valid_sample(*p, dsep_sq));
            }
        }
    }

    #[test]
    fn test_circular_streamline_closes() {
        let mut field = VectorField::new(NoiseParams::default(), 5, false);
        field.add_radial(Vector::new(100.0, 100.0), 1000.0, 0.0);
        let mut gen = generator(11);

        let closed = [true, false].iter().any(|&major| {
            let points = gen.integrate_streamline(&field, Vector::new(150.0, 100.0), major);
            let line = Streamline { points, major };
            line.is_closed()
        });
        assert!(closed);
    }

    fn straight_road(from: Vector, to: Vector) -> Vec<Vector> {
        let n = from.distance_to(to).round() as usize;
        (0..=n).map(|i| from.lerp(to, i as f64 / n as f64)).collect()
    }

    /// A vertical road at x = 100 and a horizontal one stopping 10 units short of it.
    fn dangling_roads() -> StreamlineGenerator {
        let mut gen = generator(12);
        gen.commit(straight_road(Vector::new(100.0, 0.0), Vector::new(100.0, 200.0)), false);
        gen.commit(straight_road(Vector::new(20.0, 100.0), Vector::new(90.0, 100.0)), true);
        gen.state = GeneratorState::Joining;
        gen
    }

    #[test]
    fn test_dangling_end_joins_nearby_road() {
        let field = field();
        let mut gen = dangling_roads();
        assert!(gen.update(&field));
        assert_eq!(gen.state(), GeneratorState::Complete);

        let joined = &gen.streamlines()[1];
        assert_eq!(joined.points[0], Vector::new(20.0, 100.0));
        let end = *joined.points.last().unwrap();
        assert!(end.x > 100.0);
        assert!((end.y - 100.0).abs() < 1e-9);
        assert!(joined.points.iter().all(|p| field.on_land(*p)));

        let vertical = &gen.streamlines()[0];
        assert_eq!(vertical.points.len(), 201);
        assert_eq!(gen.simplified_streamlines()[1].last(), Some(&end));
    }

    #[test]
    fn test_dangling_join_stops_at_water() {
        let mut field = field();
        field.sea = vec![
            Vector::new(93.5, 0.0),
            Vector::new(96.5, 0.0),
            Vector::new(96.5, 200.0),
            Vector::new(93.5, 200.0),
        ];
        let mut gen = dangling_roads();
        gen.create_all_streamlines(&field);

        let joined = &gen.streamlines()[1];
        let end = *joined.points.last().unwrap();
        assert!(end.x > 90.0 && end.x < 93.5);
        assert!(joined.points.iter().all(|p| field.on_land(*p)));
    }

    #[test]
    fn test_streamline_turned() {
        let seed = Vector::ZERO;
        let dir = Vector::new(1.0, 0.0);
        assert!(!streamline_turned(seed, dir, Vector::new(5.0, 0.0), dir));
        assert!(streamline_turned(seed, dir, Vector::new(5.0, 1.0), Vector::new(-1.0, -0.5)));
        assert!(!streamline_turned(seed, dir, Vector::new(5.0, 1.0), Vector::new(-1.0, 0.5)));
    }
}
