//! Plain 2D helpers shared by detection, snapping and the tool handlers.
//!
//! Everything here works in graph space and knows nothing about features.

use bevy::math::{Rect, Vec2};

/// Rotate `v` counter-clockwise by `angle` radians.
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    if angle == 0.0 {
        return v;
    }
    Vec2::from_angle(angle).rotate(v)
}

/// Closest point to `point` on the segment `a`-`b`.
pub fn closest_point_on_segment(point: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let seg = b - a;
    let len_sq = seg.length_squared();
    if len_sq < 1e-8 {
        // Segment is essentially a point
        return a;
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    a + seg * t
}

pub fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    point.distance(closest_point_on_segment(point, a, b))
}

/// Closest point on a polyline together with its distance.
pub fn closest_point_on_polyline(point: Vec2, points: &[Vec2]) -> Option<(Vec2, f32)> {
    match points {
        [] => None,
        [only] => Some((*only, point.distance(*only))),
        _ => points
            .windows(2)
            .map(|w| {
                let c = closest_point_on_segment(point, w[0], w[1]);
                (c, point.distance(c))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1)),
    }
}

/// Ray-casting inside test. `ring` may or may not repeat its first point.
pub fn point_in_polygon(point: Vec2, ring: &[Vec2]) -> bool {
    let vertices = open_ring(ring);
    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (pi, pj) = (vertices[i], vertices[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Axis-aligned bounds of a point set.
pub fn bounds_of(points: &[Vec2]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    let mut rect = Rect::from_corners(*first, *first);
    for p in rest {
        rect = rect.union_point(*p);
    }
    Some(rect)
}

/// Bounds of a rectangle of `size` centred on `center` and rotated by `angle`.
pub fn rotated_rect_bounds(center: Vec2, size: Vec2, angle: f32) -> Rect {
    let half = size / 2.0;
    let corners = [
        Vec2::new(-half.x, -half.y),
        Vec2::new(half.x, -half.y),
        Vec2::new(half.x, half.y),
        Vec2::new(-half.x, half.y),
    ]
    .map(|c| center + rotate(c, angle));
    bounds_of(&corners).unwrap_or(Rect::from_center_size(center, Vec2::ZERO))
}

/// Vertices of a ring without the closing duplicate.
pub fn open_ring(ring: &[Vec2]) -> &[Vec2] {
    match ring {
        [first, .., last] if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

/// Returns a copy of `points` whose last point repeats the first.
pub fn close_ring(points: &[Vec2]) -> Vec<Vec2> {
    let mut ring = open_ring(points).to_vec();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

/// Samples a closed Catmull-Rom spline through the ring vertices.
///
/// The result is itself a closed ring (first sample repeated at the end).
pub fn catmull_rom_closed(ring: &[Vec2], samples_per_segment: usize) -> Vec<Vec2> {
    let v = open_ring(ring);
    let n = v.len();
    if n < 3 || samples_per_segment == 0 {
        return close_ring(v);
    }
    let mut out = Vec::with_capacity(n * samples_per_segment + 1);
    for i in 0..n {
        let p0 = v[(i + n - 1) % n];
        let p1 = v[i];
        let p2 = v[(i + 1) % n];
        let p3 = v[(i + 2) % n];
        for s in 0..samples_per_segment {
            let t = s as f32 / samples_per_segment as f32;
            out.push(catmull_rom_point(p0, p1, p2, p3, t));
        }
    }
    out.push(out[0]);
    out
}

fn catmull_rom_point(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

/// Douglas-Peucker simplification of an open path.
pub fn simplify_path(points: &[Vec2], tolerance: f32) -> Vec<Vec2> {
    if points.len() < 3 || tolerance <= 0.0 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (a, b) = (points[start], points[end]);
        let (index, dist) = (start + 1..end)
            .map(|i| (i, distance_to_segment(points[i], a, b)))
            .fold((start, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });
        if dist > tolerance {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_quarter_turn() {
        let r = rotate(Vec2::X, std::f32::consts::FRAC_PI_2);
        assert!((r - Vec2::Y).length() < 1e-5);
    }

    #[test]
    fn test_closest_point_clamps_to_segment() {
        let c = closest_point_on_segment(Vec2::new(-5.0, 3.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_eq!(c, Vec2::ZERO);
        let c = closest_point_on_segment(Vec2::new(4.0, 3.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_eq!(c, Vec2::new(4.0, 0.0));
    }

    #[test]
    fn test_point_in_polygon_square() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(0.0, 0.0),
        ];
        assert!(point_in_polygon(Vec2::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Vec2::new(15.0, 5.0), &square));
    }

    #[test]
    fn test_close_ring_is_idempotent() {
        let pts = [Vec2::ZERO, Vec2::X, Vec2::Y];
        let ring = close_ring(&pts);
        assert_eq!(ring.len(), 4);
        assert_eq!(close_ring(&ring), ring);
    }

    #[test]
    fn test_catmull_rom_passes_through_vertices() {
        let ring = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let curve = catmull_rom_closed(&ring, 4);
        assert_eq!(curve.len(), 17);
        assert!((curve[0] - ring[0]).length() < 1e-4);
        assert!((curve[4] - ring[1]).length() < 1e-4);
        assert_eq!(curve.first(), curve.last());
    }

    #[test]
    fn test_simplify_drops_collinear_points() {
        let pts: Vec<Vec2> = (0..=10).map(|i| Vec2::new(i as f32, 0.0)).collect();
        let simplified = simplify_path(&pts, 0.5);
        assert_eq!(simplified, vec![Vec2::ZERO, Vec2::new(10.0, 0.0)]);
    }

    #[test]
    fn test_simplify_keeps_corner() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(5.0, 0.1),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
        ];
        let simplified = simplify_path(&pts, 1.0);
        assert_eq!(
            simplified,
            vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)]
        );
    }

    #[test]
    fn test_rotated_rect_bounds_grow_with_rotation() {
        let b = rotated_rect_bounds(Vec2::ZERO, Vec2::new(10.0, 10.0), std::f32::consts::FRAC_PI_4);
        assert!(b.width() > 14.0);
    }
}
