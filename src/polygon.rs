//! Polygon and polyline utilities
//!
//! Rings are stored as `Vec<Vector>` and are implicitly closed (the first
//! vertex is not repeated at the end). Polylines are open point sequences.

use rand::Rng;

use crate::geometry::{distance_to_segment, segment_intersection, Bounds, Vector, EPSILON};

/// Longest allowed miter relative to the offset distance before a corner is
/// considered a spike.
const MITER_LIMIT: f64 = 6.0;

/// Subdivision recursion cap.
const MAX_SPLIT_DEPTH: usize = 32;

// =============================================================================
// MEASUREMENT
// =============================================================================

/// Shoelace area. Positive for counter-clockwise rings in a y-up frame.
pub fn signed_area(ring: &[Vector]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += a.cross(b);
    }
    sum * 0.5
}

pub fn area(ring: &[Vector]) -> f64 {
    signed_area(ring).abs()
}

pub fn perimeter(ring: &[Vector]) -> f64 {
    if ring.len() < 2 {
        return 0.0;
    }
    (0..ring.len())
        .map(|i| ring[i].distance_to(ring[(i + 1) % ring.len()]))
        .sum()
}

/// Mean of the vertices.
pub fn average_point(points: &[Vector]) -> Vector {
    if points.is_empty() {
        return Vector::ZERO;
    }
    let sum = points.iter().fold(Vector::ZERO, |acc, p| acc + *p);
    sum / points.len() as f64
}

/// Area centroid, falling back to the vertex average for degenerate rings.
pub fn centroid(ring: &[Vector]) -> Vector {
    let a = signed_area(ring);
    if a.abs() < EPSILON {
        return average_point(ring);
    }
    let mut c = Vector::ZERO;
    for i in 0..ring.len() {
        let p = ring[i];
        let q = ring[(i + 1) % ring.len()];
        let f = p.cross(q);
        c += (p + q) * f;
    }
    c / (6.0 * a)
}

/// Even-odd point-in-polygon test.
pub fn contains_point(ring: &[Vector], p: Vector) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True when no two non-adjacent edges of the ring intersect.
pub fn is_simple(ring: &[Vector]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let a1 = ring[i];
        let a2 = ring[(i + 1) % n];
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let b1 = ring[j];
            let b2 = ring[(j + 1) % n];
            if segment_intersection(a1, a2, b1, b2).is_some() {
                return false;
            }
        }
    }
    true
}

/// Drops repeated consecutive vertices, a closing duplicate and collinear
/// middle vertices.
pub fn clean_ring(ring: &[Vector]) -> Vec<Vector> {
    let mut out: Vec<Vector> = Vec::with_capacity(ring.len());
    for p in ring {
        if out.last().map_or(true, |last| last.distance_to_sq(*p) > 1e-12) {
            out.push(*p);
        }
    }
    while out.len() > 1 && out[0].distance_to_sq(out[out.len() - 1]) <= 1e-12 {
        out.pop();
    }

    let mut changed = true;
    while changed && out.len() >= 3 {
        changed = false;
        let n = out.len();
        for i in 0..n {
            let prev = out[(i + n - 1) % n];
            let next = out[(i + 1) % n];
            let d1 = out[i] - prev;
            let d2 = next - out[i];
            if d1.cross(d2).abs() <= 1e-9 * d1.length() * d2.length() && d1.dot(d2) > 0.0 {
                out.remove(i);
                changed = true;
                break;
            }
        }
    }
    out
}

// =============================================================================
// SIMPLIFICATION
// =============================================================================

/// Radial distance pass followed by Douglas-Peucker.
pub fn simplify(points: &[Vector], tolerance: f64) -> Vec<Vector> {
    if points.len() < 3 || tolerance <= 0.0 {
        return points.to_vec();
    }
    let radial = simplify_radial(points, tolerance * tolerance);
    simplify_douglas_peucker(&radial, tolerance)
}

fn simplify_radial(points: &[Vector], sq_tolerance: f64) -> Vec<Vector> {
    let mut prev = points[0];
    let mut out = vec![prev];
    for p in &points[1..] {
        if p.distance_to_sq(prev) > sq_tolerance {
            out.push(*p);
            prev = *p;
        }
    }
    let last = points[points.len() - 1];
    if prev != last {
        out.push(last);
    }
    out
}

fn simplify_douglas_peucker(points: &[Vector], tolerance: f64) -> Vec<Vector> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut result = Vec::new();
    simplify_recursive(points, tolerance, &mut result);
    result.push(points[points.len() - 1]);
    result
}

fn simplify_recursive(points: &[Vector], tolerance: f64, result: &mut Vec<Vector>) {
    if points.len() < 2 {
        return;
    }

    let first = points[0];
    let last = points[points.len() - 1];
    let mut max_dist = 0.0;
    let mut max_idx = 0;
    for (i, p) in points.iter().enumerate().take(points.len() - 1).skip(1) {
        let dist = distance_to_segment(*p, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        simplify_recursive(&points[..=max_idx], tolerance, result);
        simplify_recursive(&points[max_idx..], tolerance, result);
    } else {
        result.push(first);
    }
}

/// Halves every segment until none is longer than `max_segment`.
pub fn complexify(points: &[Vector], max_segment: f64) -> Vec<Vector> {
    if points.len() < 2 || max_segment <= 0.0 {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(points.len());
    for w in points.windows(2) {
        out.push(w[0]);
        split_segment(w[0], w[1], max_segment, &mut out);
    }
    out.push(points[points.len() - 1]);
    out
}

fn split_segment(a: Vector, b: Vector, max_segment: f64, out: &mut Vec<Vector>) {
    if a.distance_to(b) <= max_segment {
        return;
    }
    let mid = a.lerp(b, 0.5);
    split_segment(a, mid, max_segment, out);
    out.push(mid);
    split_segment(mid, b, max_segment, out);
}

// =============================================================================
// OFFSETTING
// =============================================================================

/// Offsets an open polyline sideways with mitered joins. Positive distances
/// move to the left of the direction of travel.
pub fn offset_polyline(points: &[Vector], distance: f64) -> Vec<Vector> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }

    let normals: Vec<Vector> = points
        .windows(2)
        .map(|w| (w[1] - w[0]).normalize().perpendicular())
        .collect();

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let offset = if i == 0 {
            normals[0] * distance
        } else if i == n - 1 {
            normals[n - 2] * distance
        } else {
            let a = normals[i - 1];
            let b = normals[i];
            let bisector = (a + b).normalize();
            let cos = bisector.dot(b);
            if bisector == Vector::ZERO || cos.abs() < 1.0 / MITER_LIMIT {
                b * distance
            } else {
                bisector * (distance / cos)
            }
        };
        out.push(points[i] + offset);
    }
    out
}

/// Closed outline of a polyline widened by `distance` on each side.
pub fn buffer_polyline(points: &[Vector], distance: f64) -> Vec<Vector> {
    let mut ring = offset_polyline(points, distance);
    let mut right = offset_polyline(points, -distance);
    right.reverse();
    ring.extend(right);
    ring
}

/// Moves every edge of a ring inwards by `distance`.
///
/// Returns `None` when the result would be degenerate: flipped orientation,
/// self-intersection, a vertex escaping the original ring, or no loss of area.
pub fn inset(ring: &[Vector], distance: f64) -> Option<Vec<Vector>> {
    let ring = clean_ring(ring);
    if ring.len() < 3 {
        return None;
    }
    let original = signed_area(&ring);
    if original.abs() < EPSILON {
        return None;
    }
    if distance <= 0.0 {
        return Some(ring);
    }
    let sign = original.signum();
    let n = ring.len();

    let normals: Vec<Vector> = (0..n)
        .map(|i| (ring[(i + 1) % n] - ring[i]).normalize().perpendicular() * sign)
        .collect();

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = (i + n - 1) % n;
        let p1 = ring[prev] + normals[prev] * distance;
        let d1 = ring[i] - ring[prev];
        let p2 = ring[i] + normals[i] * distance;
        let d2 = ring[(i + 1) % n] - ring[i];

        let denom = d1.cross(d2);
        let vertex = if denom.abs() < EPSILON * d1.length() * d2.length() {
            p2
        } else {
            p1 + d1 * ((p2 - p1).cross(d2) / denom)
        };
        if vertex.distance_to(ring[i]) > distance * MITER_LIMIT {
            return None;
        }
        out.push(vertex);
    }

    for i in 0..n {
        let before = ring[(i + 1) % n] - ring[i];
        let after = out[(i + 1) % n] - out[i];
        if before.dot(after) <= 0.0 {
            return None;
        }
    }

    let shrunk = signed_area(&out);
    if shrunk.signum() != sign || shrunk.abs() >= original.abs() || shrunk.abs() < EPSILON {
        return None;
    }
    if !is_simple(&out) || !out.iter().all(|p| contains_point(&ring, *p)) {
        return None;
    }
    Some(out)
}

// =============================================================================
// SPLITTING
// =============================================================================

/// Cuts a ring along the chord that starts at parameter `t` on edge `edge` and
/// runs along that edge's inward normal to the first boundary it meets.
///
/// The two halves together cover exactly the original area.
pub fn split_polygon(ring: &[Vector], edge: usize, t: f64) -> Option<(Vec<Vector>, Vec<Vector>)> {
    let n = ring.len();
    if n < 3 || edge >= n {
        return None;
    }
    let sign = signed_area(ring).signum();
    let a = ring[edge];
    let b = ring[(edge + 1) % n];
    let start = a.lerp(b, t);
    let inward = (b - a).normalize().perpendicular() * sign;
    if inward == Vector::ZERO {
        return None;
    }

    let mut best: Option<(f64, usize, Vector)> = None;
    for j in 0..n {
        if j == edge {
            continue;
        }
        let c = ring[j];
        let d = ring[(j + 1) % n];
        let cd = d - c;
        let denom = inward.cross(cd);
        if denom.abs() < EPSILON {
            continue;
        }
        let u = (c - start).cross(cd) / denom;
        let v = (c - start).cross(inward) / denom;
        if u > EPSILON && (0.0..=1.0).contains(&v) && best.map_or(true, |(bu, _, _)| u < bu) {
            best = Some((u, j, c + cd * v));
        }
    }
    let (_, hit_edge, hit) = best?;

    let mut first = vec![start];
    let mut k = (edge + 1) % n;
    loop {
        first.push(ring[k]);
        if k == hit_edge {
            break;
        }
        k = (k + 1) % n;
    }
    first.push(hit);

    let mut second = vec![hit];
    let mut k = (hit_edge + 1) % n;
    loop {
        second.push(ring[k]);
        if k == edge {
            break;
        }
        k = (k + 1) % n;
    }
    second.push(start);

    let first = clean_ring(&first);
    let second = clean_ring(&second);
    if first.len() < 3 || second.len() < 3 {
        return None;
    }
    Some((first, second))
}

/// Recursively splits a ring across its longest side until every piece is
/// smaller than `2 * min_area`.
pub fn subdivide<R: Rng>(ring: &[Vector], min_area: f64, rng: &mut R) -> Vec<Vec<Vector>> {
    let mut out = Vec::new();
    subdivide_into(clean_ring(ring), min_area, rng, 0, &mut out);
    out
}

fn subdivide_into<R: Rng>(
    ring: Vec<Vector>,
    min_area: f64,
    rng: &mut R,
    depth: usize,
    out: &mut Vec<Vec<Vector>>,
) {
    if ring.len() < 3 {
        return;
    }
    if area(&ring) < 2.0 * min_area || depth >= MAX_SPLIT_DEPTH {
        out.push(ring);
        return;
    }

    let n = ring.len();
    let mut longest = 0;
    let mut longest_len = 0.0;
    for i in 0..n {
        let len = ring[i].distance_to_sq(ring[(i + 1) % n]);
        if len > longest_len {
            longest_len = len;
            longest = i;
        }
    }

    let t = rng.gen_range(0.4..0.6);
    match split_polygon(&ring, longest, t) {
        Some((a, b)) => {
            subdivide_into(a, min_area, rng, depth + 1, out);
            subdivide_into(b, min_area, rng, depth + 1, out);
        }
        None => out.push(ring),
    }
}

/// True for pieces too small or too thin to be a usable lot.
pub fn is_sliver(ring: &[Vector], min_area: f64) -> bool {
    let a = area(ring);
    let p = perimeter(ring);
    a < 0.5 * min_area || p < EPSILON || a / (p * p) < 0.04
}

/// Splits the world rectangle along a polyline that crosses it and returns
/// the smaller side.
///
/// The polyline is clipped to its first and last interior vertices and joined
/// to the boundary where it leaves. `None` when no vertex lies inside.
pub fn slice_rectangle(bounds: &Bounds, line: &[Vector]) -> Option<Vec<Vector>> {
    let first = line.iter().position(|p| bounds.contains(*p))?;
    let last = line.iter().rposition(|p| bounds.contains(*p))?;

    let entry = if first == 0 {
        bounds.nearest_boundary_point(line[0])
    } else {
        bounds.exit_point(line[first], line[first - 1])
    };
    let exit = if last == line.len() - 1 {
        bounds.nearest_boundary_point(line[last])
    } else {
        bounds.exit_point(line[last], line[last + 1])
    };

    let mut path = vec![entry];
    path.extend(line[first..=last].iter().map(|p| bounds.clamp(*p)));
    path.push(exit);

    let total = bounds.perimeter();
    let t_exit = bounds.perimeter_position(exit);
    let forward = |t: f64| (t - t_exit).rem_euclid(total);
    let to_entry = forward(bounds.perimeter_position(entry));

    let corners: Vec<(f64, Vector)> = bounds
        .corners()
        .iter()
        .map(|c| (forward(bounds.perimeter_position(*c)), *c))
        .collect();

    let mut ahead: Vec<(f64, Vector)> = corners
        .iter()
        .copied()
        .filter(|(d, _)| *d > EPSILON && *d < to_entry)
        .collect();
    ahead.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut behind: Vec<(f64, Vector)> = corners
        .iter()
        .copied()
        .filter(|(d, _)| *d > to_entry || *d <= EPSILON)
        .collect();
    behind.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut side_a = path.clone();
    side_a.extend(ahead.iter().map(|(_, c)| *c));
    let mut side_b = path;
    side_b.extend(behind.iter().map(|(_, c)| *c));

    let side_a = clean_ring(&side_a);
    let side_b = clean_ring(&side_b);
    if area(&side_a) <= area(&side_b) {
        Some(side_a)
    } else {
        Some(side_b)
    }
}
