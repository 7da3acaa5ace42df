use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

pub mod block;
pub mod poly;

/// CPU-side triangle mesh, built by the casting pipeline and the batch combiners
/// before it is uploaded as a Bevy [`Mesh`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Pushes one vertex and returns its index.
    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(Vec2::ZERO);
        (self.positions.len() - 1) as u32
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Appends `other` with `transform` baked into its vertices.
    pub fn append(&mut self, other: &MeshData, transform: Mat4) {
        let base = self.positions.len() as u32;
        let normal_matrix = transform.inverse().transpose();

        self.positions
            .extend(other.positions.iter().map(|p| transform.transform_point3(*p)));
        self.normals.extend(
            other
                .normals
                .iter()
                .map(|n| normal_matrix.transform_vector3(*n).normalize_or_zero()),
        );
        self.uvs.extend_from_slice(&other.uvs);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Concatenates meshes, each with its own transform baked in.
    pub fn combine<'a>(parts: impl IntoIterator<Item = (&'a MeshData, Mat4)>) -> MeshData {
        let mut combined = MeshData::default();
        for (mesh, transform) in parts {
            combined.append(mesh, transform);
        }
        combined
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Moves the vertices so their average sits at the origin.
    ///
    /// # Returns
    /// The removed offset, to be applied to the owning transform
    pub fn recenter(&mut self) -> Vec3 {
        if self.positions.is_empty() {
            return Vec3::ZERO;
        }
        let centroid = self.positions.iter().copied().sum::<Vec3>() / self.positions.len() as f32;
        for p in &mut self.positions {
            *p -= centroid;
        }
        centroid
    }

    // one fixed corner triple per triangle, enough for a dissolve effect
    pub fn assign_triangle_uvs(&mut self) {
        const CORNERS: [Vec2; 3] = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        self.uvs = vec![Vec2::ZERO; self.positions.len()];
        for triangle in self.indices.chunks_exact(3) {
            for (corner, &index) in triangle.iter().enumerate() {
                self.uvs[index as usize] = CORNERS[corner];
            }
        }
    }

    /// Unit cube centred on the origin with flat faces.
    pub fn unit_cube() -> MeshData {
        let mut mesh = MeshData::default();
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::NEG_Z),
            (Vec3::NEG_X, Vec3::Y, Vec3::Z),
            (Vec3::Y, Vec3::NEG_Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::Z, Vec3::X),
            (Vec3::Z, Vec3::Y, Vec3::X),
            (Vec3::NEG_Z, Vec3::Y, Vec3::NEG_X),
        ];
        // right x up == normal keeps every face counter-clockwise from outside
        for (normal, up, right) in faces {
            let centre = normal * 0.5;
            let (u, v) = (right * 0.5, up * 0.5);
            let a = mesh.push_vertex(centre - u - v, normal);
            let b = mesh.push_vertex(centre + u - v, normal);
            let c = mesh.push_vertex(centre + u + v, normal);
            let d = mesh.push_vertex(centre - u + v, normal);
            mesh.push_triangle(a, b, c);
            mesh.push_triangle(a, c, d);
        }
        mesh.assign_triangle_uvs();
        mesh
    }

    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
        );
        let positions: Vec<[f32; 3]> = self.positions.iter().map(|p| p.to_array()).collect();
        let normals: Vec<[f32; 3]> = self.normals.iter().map(|n| n.to_array()).collect();
        let uvs: Vec<[f32; 2]> = self.uvs.iter().map(|uv| uv.to_array()).collect();

        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
        mesh.insert_indices(Indices::U32(self.indices.clone()));
        mesh
    }
}
