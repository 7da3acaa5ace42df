// UTILS
// polygons here are contours in the xz plane, stored as Vec2 with y standing in for z

use bevy::prelude::*;

/// Computes the signed area of a polygon, negative for clockwise winding
/// # Returns the polygon's area as an `f32`. Returns 0.0 for polygons with fewer than 3 vertices.
pub fn polygon_area(polygon: &[Vec2]) -> f32 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let n = polygon.len();
    let mut area = 0.0;

    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].x * polygon[j].y - polygon[j].x * polygon[i].y;
    }

    area / 2.0
}

/// Average of the polygon's points, not the area centroid
/// # Returns `Vec2::ZERO` for an empty polygon
pub fn vertex_average(polygon: &[Vec2]) -> Vec2 {
    if polygon.is_empty() {
        return Vec2::ZERO;
    }
    polygon.iter().copied().sum::<Vec2>() / polygon.len() as f32
}

/// Determines whether a point is inside a polygon using the ray-casting algorithm.
/// # Returns `true` if the point is inside the polygon, otherwise `false`.
pub fn point_in_polygon(point: &Vec2, polygon: &[Vec2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);

        if ((pi.y > point.y) != (pj.y > point.y)) &&
           (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Shortest distance from `point` to the segment `a`-`b`
pub fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let length_squared = ab.length_squared();
    if length_squared <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / length_squared).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// Inside test that also rejects points closer than `padding` to any edge
/// # Returns `true` only for points comfortably inside the polygon
pub fn point_in_polygon_padded(point: Vec2, polygon: &[Vec2], padding: f32) -> bool {
    if !point_in_polygon(&point, polygon) {
        return false;
    }
    let n = polygon.len();
    (0..n).all(|i| distance_to_segment(point, polygon[i], polygon[(i + 1) % n]) >= padding)
}

/// x coordinates where the horizontal line at `z` crosses the polygon's edges.
/// Edges parallel to the scanline are skipped.
pub fn scanline_intersections(polygon: &[Vec2], z: f32) -> Vec<f32> {
    let n = polygon.len();
    let mut hits = Vec::new();
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        if a.y == b.y {
            continue;
        }
        // half-open so a shared vertex is counted once
        let (low, high) = if a.y < b.y { (a, b) } else { (b, a) };
        if z >= low.y && z < high.y {
            let t = (z - low.y) / (high.y - low.y);
            hits.push(low.x + (high.x - low.x) * t);
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f32, max: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(min, min),
            Vec2::new(min, max),
            Vec2::new(max, max),
            Vec2::new(max, min),
        ]
    }

    #[test]
    fn clockwise_area_is_negative() {
        assert_eq!(polygon_area(&square(0.0, 5.0)), -25.0);
        let mut ccw = square(0.0, 5.0);
        ccw.reverse();
        assert_eq!(polygon_area(&ccw), 25.0);
    }

    #[test]
    fn segment_distance_uses_both_endpoints() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert_eq!(distance_to_segment(Vec2::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(distance_to_segment(Vec2::new(13.0, 4.0), a, b), 5.0);
        assert_eq!(distance_to_segment(Vec2::new(-3.0, 0.0), a, a), 3.0);
    }

    #[test]
    fn padding_rejects_points_near_edges() {
        let poly = square(0.0, 40.0);
        assert!(point_in_polygon_padded(Vec2::new(20.0, 20.0), &poly, 10.0));
        assert!(!point_in_polygon_padded(Vec2::new(5.0, 20.0), &poly, 10.0));
        assert!(!point_in_polygon_padded(Vec2::new(50.0, 20.0), &poly, 10.0));
    }

    #[test]
    fn scanlines_skip_horizontal_edges() {
        let poly = square(0.0, 10.0);
        let mut hits = scanline_intersections(&poly, 4.0);
        hits.sort_by(f32::total_cmp);
        assert_eq!(hits, vec![0.0, 10.0]);
        assert_eq!(scanline_intersections(&poly, 10.0).len(), 0);
    }
}
