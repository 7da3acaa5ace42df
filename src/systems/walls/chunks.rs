use std::collections::{BTreeMap, HashMap};

use bevy::prelude::*;

use crate::config::{WALL_FADE_STEPS, WALL_HEIGHT};
use crate::systems::artifacts::{bake_artifacts, Artifact, ArtifactId, ArtifactKind, ArtifactPool, Tint};
use crate::systems::mesh::MeshData;

/// Square spatial buckets on the grid plane.
#[derive(Debug, Clone)]
pub struct ChunkGrid<T> {
    size: f32,
    chunks: HashMap<IVec2, Vec<T>>,
}

impl<T> ChunkGrid<T> {
    pub fn new(size: f32) -> Self {
        Self { size, chunks: HashMap::new() }
    }

    /// Chunk index of a point on the x/z plane.
    pub fn chunk_of(&self, position: Vec2) -> IVec2 {
        (position / self.size).floor().as_ivec2()
    }

    /// World position of a chunk's lower corner.
    pub fn origin(&self, chunk: IVec2) -> Vec2 {
        chunk.as_vec2() * self.size
    }

    pub fn add(&mut self, position: Vec2, item: T) -> IVec2 {
        let chunk = self.chunk_of(position);
        self.chunks.entry(chunk).or_default().push(item);
        chunk
    }

    /// Removes and returns every chunk whose members all pass `settled`, in index order.
    pub fn take_ready(&mut self, mut settled: impl FnMut(&T) -> bool) -> Vec<(IVec2, Vec<T>)> {
        let mut ready: Vec<IVec2> = self
            .chunks
            .iter()
            .filter(|(_, items)| items.iter().all(&mut settled))
            .map(|(chunk, _)| *chunk)
            .collect();
        ready.sort_by_key(|c| (c.y, c.x));
        ready
            .into_iter()
            .filter_map(|chunk| self.chunks.remove(&chunk).map(|items| (chunk, items)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn settled_wall() -> Tint {
    Tint::Wall((WALL_FADE_STEPS - 1) as u16)
}

/// Collapses wall cells into vertical runs: one stretched segment per unbroken z-run at the same x.
pub fn wall_runs(cells: &[IVec2]) -> Vec<Artifact> {
    let mut columns: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    for cell in cells {
        columns.entry(cell.x).or_default().push(cell.y);
    }

    let mut runs = Vec::new();
    for (x, mut zs) in columns {
        zs.sort_unstable();
        zs.dedup();
        let mut start = 0;
        for i in 1..=zs.len() {
            if i < zs.len() && zs[i] == zs[i - 1] + 1 {
                continue;
            }
            let n = (i - start) as f32;
            let z0 = zs[start] as f32;
            runs.push(Artifact {
                kind: ArtifactKind::Run,
                position: Vec3::new(x as f32, WALL_HEIGHT / 2.0, z0 + n / 2.0 - 0.5),
                scale: Vec3::new(1.0, WALL_HEIGHT, n),
                tint: settled_wall(),
                active: true,
                ..default()
            });
            start = i;
        }
    }
    runs
}

/// Bakes one chunk of wall cells into a single batch artifact at the chunk origin
/// and releases the originals.
///
/// # Returns
/// The batch, or `None` if none of the ids were still live
pub fn combine_wall_chunk(pool: &mut ArtifactPool, origin: Vec2, ids: &[ArtifactId]) -> Option<ArtifactId> {
    let cells: Vec<IVec2> = ids
        .iter()
        .filter_map(|&id| pool.get(id))
        .map(|artifact| IVec2::new(artifact.position.x as i32, artifact.position.z as i32))
        .collect();
    if cells.is_empty() {
        return None;
    }

    let origin = Vec3::new(origin.x, WALL_HEIGHT / 2.0, origin.y);
    let cube = MeshData::unit_cube();
    let parts: Vec<(MeshData, Mat4)> = wall_runs(&cells)
        .iter()
        .filter_map(|run| run.baked(origin, &cube))
        .collect();
    let mesh = MeshData::combine(parts.iter().map(|(mesh, transform)| (mesh, *transform)));

    for &id in ids {
        pool.release(id);
    }
    Some(spawn_wall_batch(pool, origin, mesh))
}

/// Bakes every live wall artifact into one mesh.
pub fn combine_all_walls(pool: &mut ArtifactPool) -> Option<ArtifactId> {
    let ids = pool.live_ids();
    if ids.len() < 2 {
        return None;
    }
    let mesh = bake_artifacts(pool, &ids, Vec3::ZERO);
    for &id in &ids {
        pool.release(id);
    }
    Some(spawn_wall_batch(pool, Vec3::ZERO, mesh))
}

fn spawn_wall_batch(pool: &mut ArtifactPool, origin: Vec3, mesh: MeshData) -> ArtifactId {
    let batch = pool.spawn(ArtifactKind::Batch, origin, Vec3::ONE, settled_wall());
    if let Some(artifact) = pool.get_mut(batch) {
        artifact.mesh = Some(mesh);
    }
    batch
}
