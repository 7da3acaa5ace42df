use std::time::Duration;

use bevy::prelude::*;
use bevy::time::common_conditions::on_timer;

use crate::config::*;
use crate::systems::artifacts::{ArtifactId, ArtifactKind, ArtifactPool, PooledArtifacts, SimRng, Tint, Walls};
use crate::systems::grid::Grid;
use crate::systems::propagation::colors::{FadeController, FadeGradient, FadeTiming};
use crate::systems::tasks::{DespawnQueue, WorkQueue};
use crate::systems::DemoPhase;

pub mod chunks;
pub mod drawer;

use chunks::{combine_all_walls, combine_wall_chunk, ChunkGrid};
use drawer::WallDrawer;

/// Borrowed state needed to turn a grid cell into a wall.
pub struct WallBuilder<'a> {
    pub grid: &'a mut Grid,
    pub pool: &'a mut ArtifactPool,
    pub chunks: &'a mut ChunkGrid<ArtifactId>,
    pub fades: &'a mut FadeController,
}

impl WallBuilder<'_> {
    /// Walls off an empty cell and spawns its fading segment.
    ///
    /// # Returns
    /// `false` if the cell was already taken or lies outside the grid
    pub fn build(&mut self, cell: IVec2) -> bool {
        if !self.grid.set_wall(cell) {
            return false;
        }
        let position = Vec3::new(cell.x as f32, WALL_HEIGHT / 2.0, cell.y as f32);
        let id = self.pool.spawn(
            ArtifactKind::Cell,
            position,
            Vec3::new(1.0, WALL_HEIGHT, 1.0),
            Tint::Wall(0),
        );
        self.chunks.add(Vec2::new(position.x, position.z), id);
        self.fades.track(id, FadeGradient::Wall, self.pool);
        true
    }
}

/// Cells along the four edges of a `width` by `depth` grid, each listed once.
pub fn border_cells(width: i32, depth: i32) -> Vec<IVec2> {
    let (max_x, max_z) = (width - 1, depth - 1);
    let mut cells = Vec::new();
    for x in 0..=max_x {
        cells.push(IVec2::new(x, 0));
        cells.push(IVec2::new(x, max_z));
    }
    for z in 1..max_z {
        cells.push(IVec2::new(0, z));
        cells.push(IVec2::new(max_x, z));
    }
    cells
}

#[derive(Resource)]
pub struct OuterWalls(pub WorkQueue<IVec2>);

impl Default for OuterWalls {
    fn default() -> Self {
        Self(WorkQueue::new(OUTER_WALLS_PER_TICK))
    }
}

#[derive(Resource, Default)]
pub struct WallDrawers(pub Vec<WallDrawer>);

impl WallDrawers {
    pub fn all_done(&self) -> bool {
        self.0.iter().all(WallDrawer::is_done)
    }
}

#[derive(Resource)]
pub struct WallChunks(pub ChunkGrid<ArtifactId>);

impl Default for WallChunks {
    fn default() -> Self {
        Self(ChunkGrid::new(CHUNK_SIZE))
    }
}

#[derive(Resource, Default)]
pub struct WallFades(pub FadeController);

/// Final bake of every wall batch, some time after drawing ends.
#[derive(Resource, Default)]
pub struct WallFinish {
    timer: Option<Timer>,
    combined: bool,
}

pub struct WallPlugin;

impl Plugin for WallPlugin {
    fn build(&self, app: &mut App) {
        app
            .init_resource::<OuterWalls>()
            .init_resource::<WallDrawers>()
            .init_resource::<WallChunks>()
            .init_resource::<WallFades>()
            .init_resource::<WallFinish>()
            .add_systems(Startup, setup_walls)
            .add_systems(
                FixedUpdate,
                (build_outer_walls, run_drawers, finish_drawing)
                    .chain()
                    .run_if(in_state(DemoPhase::DrawingWalls)),
            )
            .add_systems(OnExit(DemoPhase::DrawingWalls), start_finish_timer)
            .add_systems(
                Update,
                (
                    fade_walls,
                    combine_ready_chunks.run_if(on_timer(Duration::from_secs_f32(CHUNK_CHECK_INTERVAL))),
                    finish_walls,
                )
                    .chain(),
            );
    }
}

fn setup_walls(
    grid: Res<Grid>,
    mut outer: ResMut<OuterWalls>,
    mut drawers: ResMut<WallDrawers>,
    mut rng: ResMut<SimRng>,
) {
    outer.0.extend(border_cells(grid.width(), grid.depth()));
    drawers.0 = (0..WALL_DRAWER_COUNT)
        .map(|i| WallDrawer::new(i as f32 * WALL_DRAWER_SPACING, &mut rng.0))
        .collect();
    info!("Drawing walls: {} border cells, {} drawers", outer.0.len(), drawers.0.len());
}

fn build_outer_walls(
    mut outer: ResMut<OuterWalls>,
    mut grid: ResMut<Grid>,
    mut pooled: ResMut<PooledArtifacts<Walls>>,
    mut chunks: ResMut<WallChunks>,
    mut fades: ResMut<WallFades>,
) {
    if outer.0.is_empty() {
        return;
    }
    let mut builder = WallBuilder {
        grid: &mut grid,
        pool: &mut pooled.pool,
        chunks: &mut chunks.0,
        fades: &mut fades.0,
    };
    for cell in outer.0.next_batch() {
        builder.build(cell);
    }
}

fn run_drawers(
    time: Res<Time>,
    tier: Res<SpeedTier>,
    mut drawers: ResMut<WallDrawers>,
    mut rng: ResMut<SimRng>,
    mut grid: ResMut<Grid>,
    mut pooled: ResMut<PooledArtifacts<Walls>>,
    mut chunks: ResMut<WallChunks>,
    mut fades: ResMut<WallFades>,
) {
    // the grid carries one extra row and column for the far border
    let size = IVec2::new(grid.width() - 1, grid.depth() - 1);
    let speed = tier.settings().drawer_speed;
    let dt = time.delta_secs();

    let mut crossed = Vec::new();
    for drawer in drawers.0.iter_mut() {
        drawer.advance(dt, speed, size, &mut rng.0, &mut crossed);
    }

    let mut builder = WallBuilder {
        grid: &mut grid,
        pool: &mut pooled.pool,
        chunks: &mut chunks.0,
        fades: &mut fades.0,
    };
    for cell in crossed {
        builder.build(cell);
    }
}

fn finish_drawing(
    outer: Res<OuterWalls>,
    drawers: Res<WallDrawers>,
    mut next: ResMut<NextState<DemoPhase>>,
) {
    if outer.0.is_empty() && drawers.all_done() {
        info!("Walls drawn");
        next.set(DemoPhase::Labeling);
    }
}

fn start_finish_timer(mut finish: ResMut<WallFinish>) {
    finish.timer = Some(Timer::from_seconds(WALL_COMBINE_DELAY, TimerMode::Once));
}

fn fade_walls(
    time: Res<Time>,
    mut pooled: ResMut<PooledArtifacts<Walls>>,
    mut fades: ResMut<WallFades>,
) {
    if fades.0.is_empty() {
        return;
    }
    fades.0.advance(time.delta_secs(), FadeTiming::walls(), &mut pooled.pool);
}

fn combine_ready_chunks(
    mut pooled: ResMut<PooledArtifacts<Walls>>,
    mut chunks: ResMut<WallChunks>,
) {
    let pool = &mut pooled.pool;
    // stale ids count as settled
    let ready = chunks.0.take_ready(|&id| pool.get(id).is_none_or(|artifact| !artifact.fading));
    for (chunk, ids) in ready {
        let origin = chunks.0.origin(chunk);
        if combine_wall_chunk(pool, origin, &ids).is_some() {
            debug!("Combined wall chunk {chunk} from {} segments", ids.len());
        }
    }
}

fn finish_walls(
    time: Res<Time>,
    mut finish: ResMut<WallFinish>,
    chunks: Res<WallChunks>,
    mut pooled: ResMut<PooledArtifacts<Walls>>,
    mut despawn: ResMut<DespawnQueue>,
) {
    let Some(timer) = finish.timer.as_mut() else {
        return;
    };
    timer.tick(time.delta());
    if !timer.finished() || !chunks.0.is_empty() {
        return;
    }

    if !finish.combined {
        finish.combined = true;
        if combine_all_walls(&mut pooled.pool).is_some() {
            info!("Combined all walls into one mesh");
        }
        return;
    }

    // waits until the render sync has seen the last combine
    if let Some(idle) = pooled.dispose_idle() {
        debug!("Retiring {} wall entities", idle.len());
        despawn.0.extend(idle);
        finish.timer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn border_lists_every_edge_cell_once() {
        let cells = border_cells(6, 4);
        let unique: HashSet<IVec2> = cells.iter().copied().collect();
        assert_eq!(cells.len(), unique.len());
        assert_eq!(cells.len(), 2 * 6 + 2 * 2);
        assert!(unique.contains(&IVec2::new(5, 3)));
        assert!(!unique.contains(&IVec2::new(2, 2)));
    }

    #[test]
    fn builder_walls_each_cell_once() {
        let mut grid = Grid::new(10, 10);
        let mut pool = ArtifactPool::with_capacity(8, 64);
        let mut chunks = ChunkGrid::new(5.0);
        let mut fades = FadeController::default();
        let mut builder = WallBuilder {
            grid: &mut grid,
            pool: &mut pool,
            chunks: &mut chunks,
            fades: &mut fades,
        };

        assert!(builder.build(IVec2::new(2, 7)));
        assert!(!builder.build(IVec2::new(2, 7)));
        assert!(!builder.build(IVec2::new(20, 7)));

        assert_eq!(grid.get(IVec2::new(2, 7)), crate::systems::grid::WALL);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(fades.len(), 1);
        let artifact = pool.get(pool.live_ids()[0]).unwrap();
        assert_eq!(artifact.position, Vec3::new(2.0, 8.0, 7.0));
        assert!(artifact.fading);
    }

    #[test]
    fn chunks_wait_for_their_fades() {
        let mut grid = Grid::new(10, 10);
        let mut pool = ArtifactPool::with_capacity(8, 64);
        let mut chunks = ChunkGrid::new(5.0);
        let mut fades = FadeController::default();
        let mut builder = WallBuilder {
            grid: &mut grid,
            pool: &mut pool,
            chunks: &mut chunks,
            fades: &mut fades,
        };
        for z in 0..3 {
            builder.build(IVec2::new(1, z));
        }

        let settled = |pool: &ArtifactPool, id: &ArtifactId| pool.get(*id).is_none_or(|a| !a.fading);
        assert!(chunks.take_ready(|id| settled(&pool, id)).is_empty());

        let timing = FadeTiming::walls();
        fades.advance(timing.duration, timing, &mut pool);
        let ready = chunks.take_ready(|id| settled(&pool, id));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].1.len(), 3);
    }
}
