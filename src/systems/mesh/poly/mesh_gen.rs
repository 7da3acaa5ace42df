use bevy::prelude::*;

use crate::config::{CAP_EDGE_PADDING, CAP_SAMPLE_INTERVAL};
use crate::systems::mesh::MeshData;
use super::utils::{point_in_polygon_padded, scanline_intersections, vertex_average};

// NOTE: caps are triangulated against a spine of central points rather than with a general
//  triangulator. A scanline with fewer than two crossings falls back to the centroid, which can
//  miss a usable point on strongly concave footprints. Accepted approximation.

/// z values of the interior scanlines, one every [`CAP_SAMPLE_INTERVAL`], clamped below the
/// top edge and kept strictly above the bottom edge
fn sample_rows(min_z: f32, max_z: f32) -> Vec<f32> {
    let span = max_z - min_z;
    let steps = (span / CAP_SAMPLE_INTERVAL).ceil() as i32;
    let mut rows: Vec<f32> = Vec::new();
    for i in 1..=steps {
        let z = (min_z + i as f32 * CAP_SAMPLE_INTERVAL).min(max_z - CAP_SAMPLE_INTERVAL);
        if z <= min_z || rows.last() == Some(&z) {
            continue;
        }
        rows.push(z);
    }
    rows
}

/// Widest inside span of a scanline. Crossings pair up left to right, so each pair
/// bounds one stretch of the interior.
fn widest_span(mut hits: Vec<f32>) -> Option<(f32, f32)> {
    hits.sort_by(f32::total_cmp);
    hits.chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
}

/// Interior spine points used as fan centres for the caps
pub fn central_points(polygon: &[Vec2]) -> Vec<Vec2> {
    let centroid = vertex_average(polygon);
    let min_z = polygon.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_z = polygon.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

    let mut centrals = Vec::new();
    for z in sample_rows(min_z, max_z) {
        let candidate = match widest_span(scanline_intersections(polygon, z)) {
            Some((left, right)) => Vec2::new((left + right) / 2.0, z),
            None => Vec2::new(centroid.x, z),
        };
        if point_in_polygon_padded(candidate, polygon, CAP_EDGE_PADDING) {
            centrals.push(candidate);
        }
    }

    if centrals.is_empty() {
        centrals.push(centroid);
    }
    centrals
}

/// Flat cap over the contour at `height`. `reverse` flips the winding for the underside.
pub fn cap_mesh(polygon: &[Vec2], height: f32, reverse: bool) -> MeshData {
    let mut mesh = MeshData::default();
    if polygon.len() < 3 {
        return mesh;
    }

    let normal = if reverse { Vec3::NEG_Y } else { Vec3::Y };
    let centrals = central_points(polygon);

    // central points first, then the contour
    for c in &centrals {
        mesh.push_vertex(Vec3::new(c.x, height, c.y), normal);
    }
    let base = centrals.len() as u32;
    for p in polygon {
        mesh.push_vertex(Vec3::new(p.x, height, p.y), normal);
    }

    // every contour point hangs off the central point nearest in z
    let nearest: Vec<u32> = polygon
        .iter()
        .map(|p| {
            let mut best = 0;
            for (i, c) in centrals.iter().enumerate() {
                if (c.y - p.y).abs() < (centrals[best].y - p.y).abs() {
                    best = i;
                }
            }
            best as u32
        })
        .collect();

    let n = polygon.len();
    for i in 0..n {
        let next = (i + 1) % n;
        let (ci, cn) = (nearest[i], nearest[next]);
        let (vi, vn) = (base + i as u32, base + next as u32);

        if ci == cn {
            if reverse {
                mesh.push_triangle(ci, vn, vi);
            } else {
                mesh.push_triangle(ci, vi, vn);
            }
        } else if reverse {
            mesh.push_triangle(ci, cn, vi);
            mesh.push_triangle(cn, vn, vi);
        } else {
            mesh.push_triangle(ci, vi, cn);
            mesh.push_triangle(cn, vi, vn);
        }
    }

    // strip along the spine
    for i in 0..centrals.len().saturating_sub(2) as u32 {
        if reverse {
            mesh.push_triangle(i, i + 2, i + 1);
        } else {
            mesh.push_triangle(i, i + 1, i + 2);
        }
    }

    mesh
}

/// One flat-shaded quad per contour edge, from the ground up to `height`
pub fn side_mesh(polygon: &[Vec2], height: f32) -> MeshData {
    let mut mesh = MeshData::default();
    let n = polygon.len();
    if n < 3 {
        return mesh;
    }

    for i in 0..n {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        let v0 = Vec3::new(a.x, 0.0, a.y);
        let v1 = Vec3::new(a.x, height, a.y);
        let v2 = Vec3::new(b.x, 0.0, b.y);
        let v3 = Vec3::new(b.x, height, b.y);

        // faces away from the interior of a clockwise contour
        let normal = (v2 - v0).cross(v1 - v0).normalize_or_zero();
        let i0 = mesh.push_vertex(v0, normal);
        let i1 = mesh.push_vertex(v1, normal);
        let i2 = mesh.push_vertex(v2, normal);
        let i3 = mesh.push_vertex(v3, normal);

        mesh.push_triangle(i0, i2, i1);
        mesh.push_triangle(i1, i2, i3);
    }

    mesh
}

/// Closed prism over a contour: top cap, bottom cap and side skirt in one mesh
pub fn contour_to_block(contour: &[IVec2], height: f32) -> MeshData {
    let polygon: Vec<Vec2> = contour.iter().map(|p| p.as_vec2()).collect();
    let top = cap_mesh(&polygon, height, false);
    let bottom = cap_mesh(&polygon, 0.0, true);
    let sides = side_mesh(&polygon, height);

    let mut mesh = MeshData::combine([
        (&top, Mat4::IDENTITY),
        (&bottom, Mat4::IDENTITY),
        (&sides, Mat4::IDENTITY),
    ]);
    mesh.assign_triangle_uvs();
    mesh
}
