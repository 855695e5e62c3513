//! 2D vector math shared by every generation stage.
//!
//! `Vector` is a plain `Copy` value: every operation returns a new value, so
//! points stored in streamlines, graph nodes and polygons never alias.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether a length is effectively zero.
pub const EPSILON: f64 = 1e-9;

/// A 2D point or direction in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing at `angle` radians.
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn length_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance_to(&self, other: Vector) -> f64 {
        (*self - other).length()
    }

    pub fn distance_to_sq(&self, other: Vector) -> f64 {
        (*self - other).length_sq()
    }

    pub fn dot(&self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product.
    pub fn cross(&self, other: Vector) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalize(&self) -> Vector {
        let len = self.length();
        if len < EPSILON {
            Vector::ZERO
        } else {
            *self / len
        }
    }

    pub fn set_length(&self, length: f64) -> Vector {
        self.normalize() * length
    }

    /// Rotated a quarter turn counter-clockwise.
    pub fn perpendicular(&self) -> Vector {
        Vector::new(-self.y, self.x)
    }

    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn rotate(&self, angle: f64) -> Vector {
        let (sin, cos) = angle.sin_cos();
        Vector::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn lerp(&self, other: Vector, t: f64) -> Vector {
        *self + (other - *self) * t
    }

    /// Unsigned angle between two directions, in `[0, PI]`.
    pub fn angle_between(a: Vector, b: Vector) -> f64 {
        let denom = a.length() * b.length();
        if denom < EPSILON {
            return 0.0;
        }
        (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Vector) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, rhs: Vector) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;
    fn mul(self, rhs: f64) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vector {
    type Output = Vector;
    fn div(self, rhs: f64) -> Vector {
        Vector::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

// =============================================================================
// SEGMENTS
// =============================================================================

/// Intersection of segments `p1-p2` and `p3-p4`.
///
/// Returns the point together with the parameters along each segment, or
/// `None` when the segments are parallel or do not touch.
pub fn segment_intersection(
    p1: Vector,
    p2: Vector,
    p3: Vector,
    p4: Vector,
) -> Option<(Vector, f64, f64)> {
    let s1 = p2 - p1;
    let s2 = p4 - p3;

    let denom = s1.cross(s2);
    if denom.abs() < EPSILON {
        return None;
    }

    let d = p3 - p1;
    let t = d.cross(s2) / denom;
    let u = d.cross(s1) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((p1 + s1 * t, t, u))
    } else {
        None
    }
}

/// Closest point to `p` on segment `a-b` and its parameter in `[0, 1]`.
///
/// `None` for a zero-length segment.
pub fn project_onto_segment(p: Vector, a: Vector, b: Vector) -> Option<(Vector, f64)> {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq < EPSILON {
        return None;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    Some((a + ab * t, t))
}

/// Distance from `p` to segment `a-b`. Degenerate segments measure to `a`.
pub fn distance_to_segment(p: Vector, a: Vector, b: Vector) -> f64 {
    match project_onto_segment(p, a, b) {
        Some((closest, _)) => p.distance_to(closest),
        None => p.distance_to(a),
    }
}

// =============================================================================
// BOUNDS
// =============================================================================

/// Axis-aligned world rectangle starting at `origin` with extent `size`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub origin: Vector,
    pub size: Vector,
}

impl Bounds {
    pub fn new(origin: Vector, size: Vector) -> Self {
        Self { origin, size }
    }

    pub fn max(&self) -> Vector {
        self.origin + self.size
    }

    pub fn center(&self) -> Vector {
        self.origin + self.size * 0.5
    }

    /// Half-open containment used while tracing.
    pub fn contains(&self, p: Vector) -> bool {
        let max = self.max();
        p.x >= self.origin.x && p.y >= self.origin.y && p.x < max.x && p.y < max.y
    }

    /// True when `p` lies on or beyond the boundary.
    pub fn is_outside(&self, p: Vector) -> bool {
        let local = p - self.origin;
        local.x <= 0.0 || local.y <= 0.0 || local.x >= self.size.x || local.y >= self.size.y
    }

    pub fn clamp(&self, p: Vector) -> Vector {
        let max = self.max();
        Vector::new(p.x.clamp(self.origin.x, max.x), p.y.clamp(self.origin.y, max.y))
    }

    /// Corners in perimeter order starting from the origin.
    pub fn corners(&self) -> [Vector; 4] {
        let max = self.max();
        [
            self.origin,
            Vector::new(max.x, self.origin.y),
            max,
            Vector::new(self.origin.x, max.y),
        ]
    }

    pub fn perimeter(&self) -> f64 {
        2.0 * (self.size.x + self.size.y)
    }

    /// Arc-length position of a boundary point, measured from the origin
    /// corner along the perimeter in `corners()` order.
    pub fn perimeter_position(&self, p: Vector) -> f64 {
        let max = self.max();
        let w = self.size.x;
        let h = self.size.y;
        let sides = [
            ((p.y - self.origin.y).abs(), (p.x - self.origin.x).clamp(0.0, w)),
            ((p.x - max.x).abs(), w + (p.y - self.origin.y).clamp(0.0, h)),
            ((p.y - max.y).abs(), w + h + (max.x - p.x).clamp(0.0, w)),
            ((p.x - self.origin.x).abs(), 2.0 * w + h + (max.y - p.y).clamp(0.0, h)),
        ];
        let mut best = sides[0];
        for side in &sides[1..] {
            if side.0 < best.0 {
                best = *side;
            }
        }
        best.1
    }

    /// Point where the segment from `inside` towards `outside` leaves the rectangle.
    pub fn exit_point(&self, inside: Vector, outside: Vector) -> Vector {
        let max = self.max();
        let d = outside - inside;
        let mut t: f64 = 1.0;
        if d.x > EPSILON {
            t = t.min((max.x - inside.x) / d.x);
        } else if d.x < -EPSILON {
            t = t.min((self.origin.x - inside.x) / d.x);
        }
        if d.y > EPSILON {
            t = t.min((max.y - inside.y) / d.y);
        } else if d.y < -EPSILON {
            t = t.min((self.origin.y - inside.y) / d.y);
        }
        self.clamp(inside + d * t.max(0.0))
    }

    /// Projection of an interior point onto the nearest side.
    pub fn nearest_boundary_point(&self, p: Vector) -> Vector {
        let max = self.max();
        let candidates = [
            (p.y - self.origin.y, Vector::new(p.x, self.origin.y)),
            (max.x - p.x, Vector::new(max.x, p.y)),
            (max.y - p.y, Vector::new(p.x, max.y)),
            (p.x - self.origin.x, Vector::new(self.origin.x, p.y)),
        ];
        let mut best = candidates[0];
        for c in &candidates[1..] {
            if c.0.abs() < best.0.abs() {
                best = *c;
            }
        }
        self.clamp(best.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_arithmetic() {
        let a = Vector::new(3.0, 4.0);
        let b = Vector::new(1.0, -2.0);

        assert_eq!(a + b, Vector::new(4.0, 2.0));
        assert_eq!(a - b, Vector::new(2.0, 6.0));
        assert_eq!(a * 2.0, Vector::new(6.0, 8.0));
        assert_eq!(a.length(), 5.0);
        assert_eq!(a.dot(b), -5.0);
        assert!((a.normalize().length() - 1.0).abs() < 1e-12);
        assert_eq!(Vector::ZERO.normalize(), Vector::ZERO);
    }

    #[test]
    fn test_perpendicular_and_rotate() {
        let v = Vector::new(1.0, 0.0);
        assert_eq!(v.perpendicular(), Vector::new(0.0, 1.0));

        let r = v.rotate(std::f64::consts::FRAC_PI_2);
        assert!((r.x).abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_segment_intersection_crossing() {
        let hit = segment_intersection(
            Vector::new(0.0, 0.0),
            Vector::new(10.0, 10.0),
            Vector::new(0.0, 10.0),
            Vector::new(10.0, 0.0),
        );
        let (p, t, u) = hit.expect("segments cross");
        assert!((p.x - 5.0).abs() < 1e-9 && (p.y - 5.0).abs() < 1e-9);
        assert!((t - 0.5).abs() < 1e-9 && (u - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_segment_intersection_disjoint_and_parallel() {
        assert!(segment_intersection(
            Vector::new(0.0, 0.0),
            Vector::new(1.0, 0.0),
            Vector::new(0.0, 1.0),
            Vector::new(1.0, 1.0),
        )
        .is_none());
        assert!(segment_intersection(
            Vector::new(0.0, 0.0),
            Vector::new(1.0, 1.0),
            Vector::new(3.0, 0.0),
            Vector::new(2.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_projection_clamps_to_segment() {
        let a = Vector::new(0.0, 0.0);
        let b = Vector::new(10.0, 0.0);

        let (p, t) = project_onto_segment(Vector::new(4.0, 3.0), a, b).unwrap();
        assert_eq!(p, Vector::new(4.0, 0.0));
        assert!((t - 0.4).abs() < 1e-12);

        let (p, _) = project_onto_segment(Vector::new(-5.0, 1.0), a, b).unwrap();
        assert_eq!(p, a);

        assert!(project_onto_segment(Vector::new(1.0, 1.0), a, a).is_none());
        assert_eq!(distance_to_segment(Vector::new(4.0, 3.0), a, b), 3.0);
    }

    #[test]
    fn test_bounds_exit_and_perimeter() {
        let bounds = Bounds::new(Vector::ZERO, Vector::new(100.0, 50.0));

        let exit = bounds.exit_point(Vector::new(50.0, 25.0), Vector::new(150.0, 25.0));
        assert!((exit.x - 100.0).abs() < 1e-9 && (exit.y - 25.0).abs() < 1e-9);
        assert!((bounds.perimeter_position(exit) - 125.0).abs() < 1e-9);

        assert!(bounds.is_outside(Vector::new(0.0, 10.0)));
        assert!(!bounds.is_outside(Vector::new(1.0, 10.0)));
        assert!(bounds.contains(Vector::new(0.0, 0.0)));
        assert!(!bounds.contains(Vector::new(100.0, 10.0)));
        assert_eq!(bounds.perimeter(), 300.0);
    }
}
