use std::collections::HashMap;
use std::marker::PhantomData;

use bevy::prelude::*;

use crate::config::{INITIAL_SEED, NEUTRAL_GREY, PALETTE_COUNT, PALETTE_STEPS, POOL_HARD_CAPACITY, POOL_SOFT_CAPACITY, WALL_FADE_STEPS};
use crate::systems::mesh::MeshData;
use crate::systems::pool::{Pool, PoolId, Poolable};
use crate::systems::propagation::colors::{wall_color, Palettes};

use rand::SeedableRng;
use rand::rngs::StdRng;

pub type ArtifactId = PoolId;
pub type ArtifactPool = Pool<Artifact>;

/// What a pooled artifact stands for, used to pick its mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactKind {
    /// one grid cell
    #[default]
    Cell,
    /// a stretched cube covering a run of cells
    Run,
    /// owns a baked mesh of many artifacts
    Batch,
}

/// Displayed colour, resolved against the [`MaterialBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tint {
    #[default]
    Neutral,
    Gradient { palette: u16, step: u16 },
    Final { palette: u16 },
    Wall(u16),
}

/// A renderable growth or wall object.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub position: Vec3,
    pub scale: Vec3,
    pub tint: Tint,
    pub active: bool,
    pub fading: bool,
    pub mesh: Option<MeshData>,
}

impl Default for Artifact {
    fn default() -> Self {
        Self {
            kind: ArtifactKind::Cell,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            tint: Tint::Neutral,
            active: false,
            fading: false,
            mesh: None,
        }
    }
}

impl Poolable for Artifact {
    fn reset(&mut self) {
        *self = Artifact::default();
    }
}

impl Artifact {
    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_scale(self.scale)
    }

    /// Shape of the artifact, relative to `origin`, for baking into a batch mesh.
    pub fn baked(&self, origin: Vec3, cube: &MeshData) -> Option<(MeshData, Mat4)> {
        let local = Transform::from_translation(self.position - origin).with_scale(self.scale);
        match (&self.kind, &self.mesh) {
            (ArtifactKind::Batch, Some(mesh)) => Some((mesh.clone(), local.compute_matrix())),
            (ArtifactKind::Batch, None) => None,
            _ => Some((cube.clone(), local.compute_matrix())),
        }
    }
}

impl ArtifactPool {
    pub fn new() -> Self {
        Pool::with_capacity(POOL_SOFT_CAPACITY, POOL_HARD_CAPACITY)
    }

    /// Takes a pooled artifact and activates it with the given shape.
    pub fn spawn(&mut self, kind: ArtifactKind, position: Vec3, scale: Vec3, tint: Tint) -> ArtifactId {
        let id = self.acquire();
        if let Some(artifact) = self.get_mut(id) {
            artifact.kind = kind;
            artifact.position = position;
            artifact.scale = scale;
            artifact.tint = tint;
            artifact.active = true;
        }
        id
    }
}

/// Bakes a set of artifacts into one mesh with vertices relative to `origin`.
pub fn bake_artifacts(pool: &ArtifactPool, ids: &[ArtifactId], origin: Vec3) -> MeshData {
    let cube = MeshData::unit_cube();
    let parts: Vec<(MeshData, Mat4)> = ids
        .iter()
        .filter_map(|&id| pool.get(id))
        .filter_map(|artifact| artifact.baked(origin, &cube))
        .collect();
    MeshData::combine(parts.iter().map(|(mesh, transform)| (mesh, *transform)))
}

// Bevy side

/// Marker for the pool that holds growth artifacts.
pub struct Growth;
/// Marker for the pool that holds wall artifacts.
pub struct Walls;

/// A pool plus the entities that mirror its slots.
#[derive(Resource)]
pub struct PooledArtifacts<M: Send + Sync + 'static> {
    pub pool: ArtifactPool,
    entities: Vec<Option<Entity>>,
    batch_meshes: HashMap<usize, Handle<Mesh>>,
    disposed: bool,
    _marker: PhantomData<M>,
}

impl<M: Send + Sync + 'static> Default for PooledArtifacts<M> {
    fn default() -> Self {
        Self {
            pool: ArtifactPool::new(),
            entities: Vec::new(),
            batch_meshes: HashMap::new(),
            disposed: false,
            _marker: PhantomData,
        }
    }
}

impl<M: Send + Sync + 'static> PooledArtifacts<M> {
    /// Hands over entities whose slots hold no live artifact, for batched despawning.
    ///
    /// # Returns
    /// `None` while changes still wait for the render sync, or once already disposed
    pub fn dispose_idle(&mut self) -> Option<Vec<Entity>> {
        if self.disposed || self.pool.has_dirty() {
            return None;
        }
        self.disposed = true;
        let mut idle = Vec::new();
        for (slot, entity) in self.entities.iter_mut().enumerate() {
            let live = self.pool.slot(slot).is_some_and(|a| a.active);
            if !live {
                if let Some(entity) = entity.take() {
                    idle.push(entity);
                }
            }
        }
        Some(idle)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Tags a render entity with the pool slot it mirrors.
#[derive(Component)]
pub struct PooledSlot(pub usize);

/// Shared materials for every tint, plus the unit cube mesh.
#[derive(Resource)]
pub struct MaterialBank {
    pub cube: Handle<Mesh>,
    neutral: Handle<StandardMaterial>,
    gradients: Vec<Vec<Handle<StandardMaterial>>>,
    walls: Vec<Handle<StandardMaterial>>,
}

impl MaterialBank {
    pub fn material(&self, tint: Tint) -> Handle<StandardMaterial> {
        let found = match tint {
            Tint::Neutral => None,
            Tint::Gradient { palette, step } => self
                .gradients
                .get(palette as usize)
                .and_then(|g| g.get(step as usize)),
            Tint::Final { palette } => self
                .gradients
                .get(palette as usize)
                .and_then(|g| g.last()),
            Tint::Wall(step) => self.walls.get(step as usize),
        };
        found.unwrap_or(&self.neutral).clone()
    }
}

/// Seed for everything random in the demo
#[derive(Resource)]
pub struct Seed(pub u64);

#[derive(Resource)]
pub struct SimRng(pub StdRng);

pub struct ArtifactPlugin;

impl Plugin for ArtifactPlugin {
    fn build(&self, app: &mut App) {
        app
            .insert_resource(Seed(INITIAL_SEED))
            .init_resource::<PooledArtifacts<Growth>>()
            .init_resource::<PooledArtifacts<Walls>>()
            .add_systems(PreStartup, setup_materials)
            .add_systems(PostUpdate, (sync_artifacts::<Growth>, sync_artifacts::<Walls>));
    }
}

fn setup_materials(
    mut commands: Commands,
    seed: Res<Seed>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let mut rng = StdRng::seed_from_u64(seed.0);
    let palettes = Palettes::generate(&mut rng);

    let mut flat = |color: Color| materials.add(StandardMaterial {
        base_color: color,
        perceptual_roughness: 0.9,
        ..default()
    });

    let neutral = flat(Color::srgb_u8(NEUTRAL_GREY, NEUTRAL_GREY, NEUTRAL_GREY));
    let gradients = (0..PALETTE_COUNT as u16)
        .map(|palette| {
            (0..PALETTE_STEPS as u16)
                .map(|step| flat(palettes.color(palette, step)))
                .collect()
        })
        .collect();
    let walls = (0..WALL_FADE_STEPS as u16).map(|step| flat(wall_color(step))).collect();

    commands.insert_resource(MaterialBank {
        cube: meshes.add(Cuboid::new(1.0, 1.0, 1.0)),
        neutral,
        gradients,
        walls,
    });
    commands.insert_resource(palettes);
    commands.insert_resource(SimRng(rng));
}

/// Mirrors changed pool slots onto their render entities.
pub fn sync_artifacts<M: Send + Sync + 'static>(
    mut commands: Commands,
    mut pooled: ResMut<PooledArtifacts<M>>,
    bank: Res<MaterialBank>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let pooled = &mut *pooled;
    if pooled.disposed {
        pooled.pool.drain_dirty();
        return;
    }

    for slot in pooled.pool.drain_dirty() {
        let Some(artifact) = pooled.pool.slot(slot) else {
            continue;
        };
        if pooled.entities.len() <= slot {
            pooled.entities.resize(slot + 1, None);
        }

        // drop a baked mesh the slot no longer uses
        if artifact.mesh.is_none() {
            if let Some(handle) = pooled.batch_meshes.remove(&slot) {
                meshes.remove(&handle);
            }
        }

        let mesh = match (&artifact.kind, &artifact.mesh) {
            (ArtifactKind::Batch, Some(data)) => {
                let handle = meshes.add(data.to_mesh());
                if let Some(old) = pooled.batch_meshes.insert(slot, handle.clone()) {
                    meshes.remove(&old);
                }
                handle
            }
            _ => bank.cube.clone(),
        };
        let visibility = if artifact.active { Visibility::Visible } else { Visibility::Hidden };
        let bundle = (
            Mesh3d(mesh),
            MeshMaterial3d(bank.material(artifact.tint)),
            artifact.transform(),
            visibility,
        );

        match pooled.entities[slot] {
            Some(entity) => {
                commands.entity(entity).insert(bundle);
            }
            None => {
                let entity = commands.spawn((PooledSlot(slot), bundle)).id();
                pooled.entities[slot] = Some(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reuse_restores_canonical_state() {
        let mut pool = ArtifactPool::with_capacity(2, 4);
        let id = pool.spawn(
            ArtifactKind::Run,
            Vec3::new(4.0, 10.0, 2.0),
            Vec3::new(7.0, 20.0, 1.0),
            Tint::Final { palette: 9 },
        );
        if let Some(artifact) = pool.get_mut(id) {
            artifact.fading = true;
            artifact.mesh = Some(MeshData::unit_cube());
        }
        pool.release(id);

        let again = pool.acquire();
        assert_eq!(pool.get(again), Some(&Artifact::default()));
        let artifact = pool.get(again).unwrap();
        assert!(!artifact.active);
        assert_eq!(artifact.scale, Vec3::ONE);
        assert_eq!(artifact.tint, Tint::Neutral);
    }

    #[test]
    fn baking_skips_released_artifacts() {
        let mut pool = ArtifactPool::with_capacity(4, 8);
        let a = pool.spawn(ArtifactKind::Cell, Vec3::new(1.0, 0.0, 0.0), Vec3::ONE, Tint::Neutral);
        let b = pool.spawn(ArtifactKind::Cell, Vec3::new(3.0, 0.0, 0.0), Vec3::ONE, Tint::Neutral);
        pool.release(b);

        let mesh = bake_artifacts(&pool, &[a, b], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.vertex_count(), 24);
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!((min, max), (Vec3::splat(-0.5), Vec3::splat(0.5)));
    }
}
