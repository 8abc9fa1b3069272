//! Geometry kernel used by hit-testing, grid snapping and connector routing.
//!
//! Everything in here is a pure function over canvas-space coordinates.

use crate::bounds::Bounds;
use glam::Vec2;
use smallvec::SmallVec;

/// Tolerance used when checking that a computed intersection lies on a segment
pub const SEGMENT_EPSILON: f32 = 1e-4;

/// Rounds each axis to the nearest grid line
///
/// `floor((v + grid / 2) / grid) * grid`, so exact halves round up. A non-positive
/// grid size leaves the point untouched.
pub fn snap_to_grid(point: Vec2, grid_size: f32) -> Vec2 {
    if grid_size <= 0.0 {
        return point;
    }
    ((point + Vec2::splat(grid_size / 2.0)) / grid_size).floor() * grid_size
}

/// Rounds a size down to whole grid cells, never below one cell
pub fn snap_size_to_grid(size: Vec2, grid_size: f32) -> Vec2 {
    if grid_size <= 0.0 {
        return size;
    }
    ((size / grid_size).floor() * grid_size).max(Vec2::splat(grid_size))
}

fn is_horizontal(s: Vec2, e: Vec2) -> bool {
    s.y == e.y && s.x != e.x
}

fn is_vertical(s: Vec2, e: Vec2) -> bool {
    s.x == e.x && s.y != e.y
}

fn within(v: f32, a: f32, b: f32) -> bool {
    v >= a.min(b) && v <= a.max(b)
}

/// Intersection of a horizontal and a vertical segment
///
/// Returns `None` unless exactly one segment is horizontal and the other is
/// vertical, and the fixed coordinate of each falls within the span of the
/// other. Zero-length segments never intersect.
pub fn intersect_hv_lines(s1: Vec2, e1: Vec2, s2: Vec2, e2: Vec2) -> Option<Vec2> {
    let (hs, he, vs, ve) = if is_horizontal(s1, e1) && is_vertical(s2, e2) {
        (s1, e1, s2, e2)
    } else if is_vertical(s1, e1) && is_horizontal(s2, e2) {
        (s2, e2, s1, e1)
    } else {
        return None;
    };

    if within(vs.x, hs.x, he.x) && within(hs.y, vs.y, ve.y) {
        Some(Vec2::new(vs.x, hs.y))
    } else {
        None
    }
}

/// Intersection of two arbitrary segments using the determinant method
///
/// Parallel (or degenerate) segments yield `None`. The computed point must lie
/// inside the bounding boxes of both segments, which also filters out numeric
/// overshoot near the segment ends.
pub fn intersect_lines(s1: Vec2, e1: Vec2, s2: Vec2, e2: Vec2) -> Option<Vec2> {
    let d1 = e1 - s1;
    let d2 = e2 - s2;
    let det = d1.perp_dot(d2);
    if det.abs() < f32::EPSILON {
        return None;
    }

    let t = (s2 - s1).perp_dot(d2) / det;
    let point = s1 + d1 * t;

    let b1 = Bounds::from_corners(s1, e1).expand(SEGMENT_EPSILON);
    let b2 = Bounds::from_corners(s2, e2).expand(SEGMENT_EPSILON);
    if b1.contains_point(point) && b2.contains_point(point) {
        Some(point)
    } else {
        None
    }
}

/// Points where the segment `p1`-`p2` crosses the border of `rect`
///
/// The first point is the one nearest to `p1`. A segment touching a corner
/// reports that corner once.
pub fn intersect_rect_to_line(rect: &Bounds, p1: Vec2, p2: Vec2) -> Option<(Vec2, Option<Vec2>)> {
    let [tl, tr, br, bl] = rect.corners();
    let mut hits: SmallVec<[Vec2; 4]> = SmallVec::new();

    for (a, b) in [(tl, tr), (tr, br), (br, bl), (bl, tl)] {
        if let Some(p) = intersect_lines(a, b, p1, p2) {
            if !hits.iter().any(|h| h.distance(p) < SEGMENT_EPSILON) {
                hits.push(p);
            }
        }
    }

    hits.sort_by(|a, b| a.distance_squared(p1).total_cmp(&b.distance_squared(p1)));
    let mut iter = hits.into_iter();
    let first = iter.next()?;
    Some((first, iter.next()))
}

/// Distance from `p` to the segment `p1`-`p2`
///
/// Returns `f32::INFINITY` when the perpendicular projection of `p` falls
/// outside the segment or the segment has zero length.
pub fn point_line_distance(p1: Vec2, p2: Vec2, p: Vec2) -> f32 {
    let d = p2 - p1;
    let len_sq = d.length_squared();
    if len_sq == 0.0 {
        return f32::INFINITY;
    }

    let u = (p - p1).dot(d) / len_sq;
    if !(0.0..=1.0).contains(&u) {
        return f32::INFINITY;
    }

    p.distance(p1 + d * u)
}

pub fn points_distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Direction of the line from `p1` to `p2` in degrees, in `[0, 360)`
///
/// Counter-clockwise on screen: 0 points east, 90 north (towards smaller y).
pub fn angle_of_line(p1: Vec2, p2: Vec2) -> f32 {
    if p1 == p2 {
        return 0.0;
    }
    let radians = (-(p2.y - p1.y)).atan2(p2.x - p1.x);
    radians.to_degrees().rem_euclid(360.0)
}

/// Smallest power of two that holds `value`, used for texture extents.
/// `None` when no `u32` power of two is large enough.
pub fn next_power_of_two(value: f32) -> Option<u32> {
    if value.is_nan() {
        return None;
    }
    let value = value.ceil().max(1.0);
    if value > (1u32 << 31) as f32 {
        return None;
    }
    (value as u32).checked_next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    #[rstest]
    #[case(Vec2::new(14.0, 16.0), 10.0, Vec2::new(10.0, 20.0))]
    #[case(Vec2::new(5.0, 4.9), 10.0, Vec2::new(10.0, 0.0))]
    #[case(Vec2::new(-6.0, -4.0), 10.0, Vec2::new(-10.0, 0.0))]
    #[case(Vec2::new(7.0, 3.0), 0.0, Vec2::new(7.0, 3.0))]
    fn test_snap_to_grid(#[case] point: Vec2, #[case] grid: f32, #[case] expected: Vec2) {
        assert_eq!(snap_to_grid(point, grid), expected);
    }

    #[test]
    fn test_snap_to_grid_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let grid = [5.0, 8.0, 10.0, 16.0][rng.random_range(0..4)];
            let p = Vec2::new(
                rng.random_range(-1000.0..1000.0),
                rng.random_range(-1000.0..1000.0),
            );
            let once = snap_to_grid(p, grid);
            assert_eq!(snap_to_grid(once, grid), once, "point {p:?} grid {grid}");
        }
    }

    #[test]
    fn test_snap_size_to_grid() {
        assert_eq!(
            snap_size_to_grid(Vec2::new(37.0, 3.0), 10.0),
            Vec2::new(30.0, 10.0)
        );
    }

    fn integer_points(s: Vec2, e: Vec2) -> Vec<(i32, i32)> {
        let steps = (e - s).abs().max_element() as i32;
        if steps == 0 {
            return vec![(s.x as i32, s.y as i32)];
        }
        let step = (e - s) / steps as f32;
        (0..=steps)
            .map(|i| {
                let p = s + step * i as f32;
                (p.x.round() as i32, p.y.round() as i32)
            })
            .collect()
    }

    fn random_segment(rng: &mut StdRng) -> (Vec2, Vec2) {
        let s = Vec2::new(rng.random_range(0..8) as f32, rng.random_range(0..8) as f32);
        let e = match rng.random_range(0..4) {
            0 => Vec2::new(rng.random_range(0..8) as f32, s.y),
            1 => Vec2::new(s.x, rng.random_range(0..8) as f32),
            2 => s,
            _ => Vec2::new(rng.random_range(0..8) as f32, rng.random_range(0..8) as f32),
        };
        (s, e)
    }

    #[test]
    fn test_intersect_hv_lines_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..5000 {
            let (s1, e1) = random_segment(&mut rng);
            let (s2, e2) = random_segment(&mut rng);

            let hv = (is_horizontal(s1, e1) && is_vertical(s2, e2))
                || (is_vertical(s1, e1) && is_horizontal(s2, e2));
            let a = integer_points(s1, e1);
            let shared = integer_points(s2, e2).into_iter().find(|p| a.contains(p));
            let expected = if hv {
                shared.map(|(x, y)| Vec2::new(x as f32, y as f32))
            } else {
                None
            };

            assert_eq!(
                intersect_hv_lines(s1, e1, s2, e2),
                expected,
                "segments {s1:?}-{e1:?} and {s2:?}-{e2:?}"
            );
        }
    }

    #[rstest]
    #[case(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0), Vec2::new(0.0, 10.0), Vec2::new(10.0, 0.0), Some(Vec2::new(5.0, 5.0)))]
    #[case(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0), None)]
    #[case(Vec2::new(0.0, 0.0), Vec2::new(4.0, 4.0), Vec2::new(0.0, 10.0), Vec2::new(10.0, 0.0), None)]
    #[case(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0), Vec2::new(50.0, 0.0), Vec2::new(50.0, 100.0), Some(Vec2::new(50.0, 50.0)))]
    fn test_intersect_lines(
        #[case] s1: Vec2,
        #[case] e1: Vec2,
        #[case] s2: Vec2,
        #[case] e2: Vec2,
        #[case] expected: Option<Vec2>,
    ) {
        assert_eq!(intersect_lines(s1, e1, s2, e2), expected);
    }

    #[test]
    fn test_intersect_rect_to_line() {
        let rect = Bounds::from_xywh(10.0, 10.0, 20.0, 20.0);

        let (first, second) =
            intersect_rect_to_line(&rect, Vec2::new(0.0, 20.0), Vec2::new(40.0, 20.0)).unwrap();
        assert_eq!(first, Vec2::new(10.0, 20.0));
        assert_eq!(second, Some(Vec2::new(30.0, 20.0)));

        let (inside_out, none) =
            intersect_rect_to_line(&rect, Vec2::new(20.0, 20.0), Vec2::new(20.0, 50.0)).unwrap();
        assert_eq!(inside_out, Vec2::new(20.0, 30.0));
        assert_eq!(none, None);

        assert!(intersect_rect_to_line(&rect, Vec2::new(0.0, 0.0), Vec2::new(5.0, 50.0)).is_none());
    }

    #[test]
    fn test_point_line_distance() {
        let p1 = Vec2::new(0.0, 0.0);
        let p2 = Vec2::new(10.0, 0.0);

        assert_eq!(point_line_distance(p1, p2, Vec2::new(5.0, 3.0)), 3.0);
        assert_eq!(point_line_distance(p1, p2, Vec2::new(10.0, -2.0)), 2.0);
        assert_eq!(point_line_distance(p1, p2, Vec2::new(-1.0, 0.0)), f32::INFINITY);
        assert_eq!(point_line_distance(p1, p2, Vec2::new(11.0, 4.0)), f32::INFINITY);
        assert_eq!(point_line_distance(p1, p1, Vec2::new(0.0, 0.0)), f32::INFINITY);
    }

    #[test]
    fn test_point_line_distance_sampled() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let p1 = Vec2::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0));
            let p2 = Vec2::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0));
            let p = Vec2::new(rng.random_range(-80.0..80.0), rng.random_range(-80.0..80.0));

            let d = p2 - p1;
            let u = (p - p1).dot(d) / d.length_squared();
            let distance = point_line_distance(p1, p2, p);
            if (0.0..=1.0).contains(&u) {
                assert!((distance - p.distance(p1 + d * u)).abs() < 1e-3);
            } else {
                assert_eq!(distance, f32::INFINITY);
            }
        }
    }

    #[rstest]
    #[case(Vec2::new(10.0, 0.0), 0.0)]
    #[case(Vec2::new(0.0, -10.0), 90.0)]
    #[case(Vec2::new(-10.0, 0.0), 180.0)]
    #[case(Vec2::new(0.0, 10.0), 270.0)]
    fn test_angle_of_line(#[case] to: Vec2, #[case] expected: f32) {
        assert!((angle_of_line(Vec2::ZERO, to) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(0.0), Some(1));
        assert_eq!(next_power_of_two(100.0), Some(128));
        assert_eq!(next_power_of_two(128.0), Some(128));
        assert_eq!(next_power_of_two(128.5), Some(256));
        assert_eq!(next_power_of_two(2_147_483_648.0), Some(1 << 31));
    }

    #[test]
    fn test_next_power_of_two_out_of_range() {
        assert_eq!(next_power_of_two(2_147_483_904.0), None);
        assert_eq!(next_power_of_two(f32::INFINITY), None);
        assert_eq!(next_power_of_two(f32::NAN), None);
    }
}
