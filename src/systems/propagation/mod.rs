use std::time::Duration;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::tasks::{block_on, AsyncComputeTaskPool, Task};
use bevy::time::common_conditions::on_timer;

use crate::config::*;
use crate::error::SimResult;
use crate::systems::artifacts::{Growth, MaterialBank, PooledArtifacts, SimRng, Tint};
use crate::systems::export::{handle_export, BlockRecord, ExportEvent, FinishedBlocks};
use crate::systems::grid::{Grid, RegionId};
use crate::systems::tasks::DespawnQueue;
use crate::systems::DemoPhase;

pub mod colors;
pub mod engine;
pub mod flood_fill;
pub mod rows;

use colors::{FadeController, FadeTiming, Palettes};
use engine::{PropagationEngine, SimulationContext};
use flood_fill::{label_regions, LaunchPlan};
use rows::RowAggregator;

#[derive(Resource, Default)]
pub struct GrowthFades(pub FadeController);

#[derive(Resource, Default)]
struct LabelTask(Option<Task<SimResult<(LaunchPlan, Grid)>>>);

/// Render entity of a cast region.
#[derive(Component)]
pub struct BlockMesh {
    pub region: RegionId,
}

/// Resources a propagation step borrows, bundled so every system builds its context the same way.
#[derive(SystemParam)]
pub struct Simulation<'w> {
    grid: ResMut<'w, Grid>,
    growth: ResMut<'w, PooledArtifacts<Growth>>,
    rows: ResMut<'w, RowAggregator>,
    fades: ResMut<'w, GrowthFades>,
    tier: Res<'w, SpeedTier>,
    time: Res<'w, Time<Virtual>>,
}

impl Simulation<'_> {
    pub fn context(&mut self) -> SimulationContext<'_> {
        SimulationContext {
            grid: &mut self.grid,
            artifacts: &mut self.growth.pool,
            rows: &mut self.rows,
            fades: &mut self.fades.0,
            tier: self.tier.settings(),
            now: self.time.elapsed_secs(),
        }
    }
}

pub struct PropagationPlugin;

impl Plugin for PropagationPlugin {
    fn build(&self, app: &mut App) {
        let every = Duration::from_secs_f32;
        app
            .init_resource::<PropagationEngine>()
            .init_resource::<RowAggregator>()
            .init_resource::<GrowthFades>()
            .init_resource::<FinishedBlocks>()
            .init_resource::<LabelTask>()
            .add_event::<ExportEvent>()
            .add_systems(OnEnter(DemoPhase::Labeling), start_labeling)
            .add_systems(Update, poll_labeling.run_if(in_state(DemoPhase::Labeling)))
            .add_systems(FixedUpdate, run_propagation.run_if(in_state(DemoPhase::Propagating)))
            .add_systems(
                Update,
                (
                    fade_growth,
                    merge_rows.run_if(on_timer(every(ROW_CHECK_INTERVAL))),
                    batch_rows.run_if(on_timer(every(ROW_BATCH_INTERVAL))),
                    cast_regions.run_if(on_timer(every(REGION_CHECK_INTERVAL))),
                    check_completion.run_if(on_timer(every(COMPLETION_CHECK_INTERVAL))),
                )
                    .chain()
                    .run_if(in_state(DemoPhase::Propagating)),
            )
            .add_systems(Update, retire_growth.run_if(in_state(DemoPhase::Finished)))
            .add_systems(Update, handle_export);
    }
}

fn start_labeling(grid: Res<Grid>, mut task: ResMut<LabelTask>) {
    // the task works on its own copy so the live grid stays free for the simulation
    let snapshot = grid.clone();
    task.0 = Some(AsyncComputeTaskPool::get().spawn(async move { label_regions(snapshot) }));
}

fn poll_labeling(
    mut task: ResMut<LabelTask>,
    mut engine: ResMut<PropagationEngine>,
    mut sim: Simulation,
    mut rng: ResMut<SimRng>,
    mut next: ResMut<NextState<DemoPhase>>,
) {
    if !task.0.as_ref().is_some_and(Task::is_finished) {
        return;
    }
    let Some(finished) = task.0.take() else {
        return;
    };

    match block_on(finished) {
        Ok((plan, _labeled)) => {
            engine.begin(plan.starts, &mut sim.context(), &mut rng.0);
            next.set(DemoPhase::Propagating);
        }
        Err(err) => {
            warn!("Labeling failed: {err}");
            next.set(DemoPhase::Finished);
        }
    }
}

fn run_propagation(
    mut engine: ResMut<PropagationEngine>,
    mut sim: Simulation,
    mut rng: ResMut<SimRng>,
) {
    engine.run_tick(&mut sim.context(), &mut rng.0);
}

fn fade_growth(time: Res<Time>, mut sim: Simulation) {
    let ctx = sim.context();
    if ctx.fades.is_empty() {
        return;
    }
    let timing = FadeTiming {
        duration: ctx.tier.fade_duration,
        steps: ctx.tier.fade_steps,
    };
    ctx.fades.advance(time.delta_secs(), timing, ctx.artifacts);
}

fn merge_rows(mut sim: Simulation) {
    let ctx = sim.context();
    let merged = ctx.rows.merge_due_rows(ctx.now, ctx.artifacts);
    if merged > 0 {
        debug!("Merged {merged} rows");
    }
}

fn batch_rows(mut sim: Simulation) {
    let ctx = sim.context();
    ctx.rows.batch_combined_rows(ctx.artifacts);
}

fn cast_regions(
    mut commands: Commands,
    mut engine: ResMut<PropagationEngine>,
    mut sim: Simulation,
    mut records: ResMut<FinishedBlocks>,
    mut meshes: ResMut<Assets<Mesh>>,
    bank: Res<MaterialBank>,
    palettes: Res<Palettes>,
) {
    for block in engine.check_regions(&mut sim.context(), REGION_CHECK_INTERVAL) {
        let palette = Palettes::palette_for(block.region);
        commands.spawn((
            BlockMesh { region: block.region },
            Mesh3d(meshes.add(block.mesh.to_mesh())),
            MeshMaterial3d(bank.material(Tint::Final { palette })),
            Transform::from_translation(block.offset),
        ));
        records.records.push(BlockRecord::new(&block, palettes.final_color(palette)));
    }
}

fn check_completion(
    engine: Res<PropagationEngine>,
    mut next: ResMut<NextState<DemoPhase>>,
) {
    if engine.is_complete() {
        info!(
            "Propagation finished: {} blocks cast, {} dropped",
            engine.finished_blocks(),
            engine.dropped_blocks()
        );
        next.set(DemoPhase::Finished);
    }
}

fn retire_growth(
    mut growth: ResMut<PooledArtifacts<Growth>>,
    mut despawn: ResMut<DespawnQueue>,
) {
    if growth.is_disposed() {
        return;
    }
    if let Some(idle) = growth.dispose_idle() {
        debug!("Retiring {} growth entities", idle.len());
        despawn.0.extend(idle);
    }
}
