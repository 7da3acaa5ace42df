use std::collections::{HashMap, VecDeque};

use bevy::prelude::*;
use rand::Rng;

use crate::config::{COOLDOWN_MARGIN, INITIAL_LAUNCHES, MIN_BLOCK_VERTICES, REGION_HEIGHT_MAX, REGION_HEIGHT_MIN, TierSettings};
use crate::systems::artifacts::{ArtifactKind, ArtifactPool, Tint};
use crate::systems::grid::{CellBounds, Grid, RegionId, EMPTY, WALL};
use crate::systems::mesh::block::{cast_block, FinishedBlock};
use crate::systems::propagation::colors::{FadeController, FadeGradient, Palettes};
use crate::systems::propagation::rows::{RowAggregator, Side};

/// Everything a propagation step reads or writes, borrowed for the duration of one call.
pub struct SimulationContext<'a> {
    pub grid: &'a mut Grid,
    pub artifacts: &'a mut ArtifactPool,
    pub rows: &'a mut RowAggregator,
    pub fades: &'a mut FadeController,
    pub tier: TierSettings,
    /// seconds since the demo started
    pub now: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub height_min: i32,
    pub height_max: i32,
    pub initial_launches: usize,
    pub cooldown_margin: f32,
    pub min_block_vertices: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            height_min: REGION_HEIGHT_MIN,
            height_max: REGION_HEIGHT_MAX,
            initial_launches: INITIAL_LAUNCHES,
            cooldown_margin: COOLDOWN_MARGIN,
            min_block_vertices: MIN_BLOCK_VERTICES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Growth {
    Left,
    Right,
    Forward,
}

#[derive(Debug)]
struct RegionState {
    frontier: VecDeque<IVec2>,
    height: i32,
    bounds: Option<CellBounds>,
    cooldown: Option<f32>,
}

/// Counters for one fixed tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub processed: usize,
    pub spawned: usize,
    pub launched: usize,
}

/// Grows every launched region one cell at a time and casts each region once it
/// stops growing.
#[derive(Resource, Debug, Default)]
pub struct PropagationEngine {
    settings: EngineSettings,
    starts: Vec<IVec2>,
    next_start: usize,
    next_id: Option<RegionId>,
    regions: HashMap<RegionId, RegionState>,
    order: Vec<RegionId>,
    started: bool,
    exhausted: bool,
    finished_blocks: usize,
    dropped_blocks: usize,
}

impl PropagationEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings, ..default() }
    }

    /// Takes the launch list from the flood fill and starts the first few regions.
    pub fn begin<R: Rng + ?Sized>(&mut self, starts: Vec<IVec2>, ctx: &mut SimulationContext, rng: &mut R) {
        info!("Growing {} regions", starts.len());
        self.starts = starts;
        self.next_start = 0;
        self.next_id = Some(RegionId::FIRST);
        self.started = true;
        self.exhausted = false;
        for _ in 0..self.settings.initial_launches {
            if !self.launch_next(ctx, rng) {
                break;
            }
        }
    }

    /// Runs up to the tier's step budget of cell expansions.
    ///
    /// Each pass gives every active region one generation of its frontier, so no region
    /// starves another. A pass without a single successful expansion launches the next
    /// waiting region.
    pub fn run_tick<R: Rng + ?Sized>(&mut self, ctx: &mut SimulationContext, rng: &mut R) -> TickReport {
        let mut report = TickReport::default();
        if !self.started {
            return report;
        }

        let budget = ctx.tier.propagation_steps;
        let mut attempts: Vec<(IVec2, Growth)> = Vec::new();

        while report.processed < budget {
            if !self.has_live_frontier() {
                if !self.launch_next(ctx, rng) {
                    break;
                }
                report.launched += 1;
                continue;
            }

            let mut expanded = false;
            for i in 0..self.order.len() {
                let remaining = budget - report.processed;
                if remaining == 0 {
                    break;
                }
                let region = self.order[i];
                let Some(state) = self.regions.get_mut(&region) else {
                    continue;
                };

                let take = state.frontier.len().min(remaining);
                attempts.clear();
                for cell in state.frontier.drain(..take) {
                    attempts.push((cell + IVec2::NEG_X, Growth::Left));
                    attempts.push((cell + IVec2::X, Growth::Right));
                    attempts.push((cell + IVec2::Y, Growth::Forward));
                }
                report.processed += take;

                for &(target, direction) in &attempts {
                    if self.try_grow(region, target, direction, ctx) {
                        expanded = true;
                        report.spawned += 1;
                    }
                }
            }

            if !expanded && report.processed < budget {
                if !self.launch_next(ctx, rng) {
                    break;
                }
                report.launched += 1;
            }
        }

        report
    }

    fn try_grow(&mut self, region: RegionId, target: IVec2, direction: Growth, ctx: &mut SimulationContext) -> bool {
        match ctx.grid.get(target) {
            EMPTY => self.spawn_cell(region, target, ctx),
            WALL => {
                let side = match direction {
                    Growth::Left => Side::Left,
                    Growth::Right => Side::Right,
                    Growth::Forward => return false,
                };
                ctx.rows.mark_side(region, target.y, side, ctx.now);
                false
            }
            _ => false,
        }
    }

    fn spawn_cell(&mut self, region: RegionId, cell: IVec2, ctx: &mut SimulationContext) -> bool {
        let Some(state) = self.regions.get_mut(&region) else {
            return false;
        };
        if !ctx.grid.try_set(cell, region) {
            return false;
        }

        state.frontier.push_back(cell);
        match state.bounds.as_mut() {
            Some(bounds) => bounds.include(cell),
            None => state.bounds = Some(CellBounds::from_cell(cell)),
        }

        let height = state.height as f32;
        let id = ctx.artifacts.spawn(
            ArtifactKind::Cell,
            Vec3::new(cell.x as f32, (height / 2.0).floor(), cell.y as f32),
            Vec3::new(1.0, height, 1.0),
            Tint::Neutral,
        );
        ctx.rows.register(region, cell.y, id);
        ctx.fades.track(
            id,
            FadeGradient::Region { palette: Palettes::palette_for(region) },
            ctx.artifacts,
        );
        true
    }

    /// Starts the next region from the launch list.
    ///
    /// # Returns
    /// `false` once the list is used up
    fn launch_next<R: Rng + ?Sized>(&mut self, ctx: &mut SimulationContext, rng: &mut R) -> bool {
        let Some(&start) = self.starts.get(self.next_start) else {
            self.exhausted = true;
            return false;
        };
        let Some(region) = self.next_id else {
            warn!("Region ids exhausted with {} launches left", self.starts.len() - self.next_start);
            self.exhausted = true;
            return false;
        };
        self.next_start += 1;
        self.next_id = region.next();

        let height = rng.random_range(self.settings.height_min..self.settings.height_max);
        self.regions.insert(
            region,
            RegionState { frontier: VecDeque::new(), height, bounds: None, cooldown: None },
        );
        self.order.push(region);

        if self.spawn_cell(region, start, ctx) {
            debug!("Launched region {region} at {start} with height {height}");
        } else {
            warn!("Launch cell {start} for region {region} is not empty, skipping");
        }
        true
    }

    /// Periodic scan over active regions, called every `interval` seconds.
    ///
    /// A region with an empty frontier starts a cooldown. Once the cooldown passes the
    /// fade duration plus a margin, the region is cast into a block and all of its state
    /// is purged. Casts that fail are logged and dropped.
    pub fn check_regions(&mut self, ctx: &mut SimulationContext, interval: f32) -> Vec<FinishedBlock> {
        let threshold = ctx.tier.fade_duration + self.settings.cooldown_margin;
        let mut due = Vec::new();

        for region in &self.order {
            let Some(state) = self.regions.get_mut(region) else {
                continue;
            };
            if state.frontier.is_empty() && state.cooldown.is_none() {
                debug!("Region {region} filled");
                state.cooldown = Some(0.0);
            }
            if let Some(cooldown) = state.cooldown.as_mut() {
                *cooldown += interval;
                if *cooldown > threshold {
                    due.push(*region);
                }
            }
        }

        let mut finished = Vec::new();
        for region in due {
            let Some(state) = self.regions.remove(&region) else {
                continue;
            };
            match cast_block(ctx.grid, region, state.height, state.bounds, self.settings.min_block_vertices) {
                Ok(block) => {
                    debug!("Region {region} cast with {} vertices", block.mesh.vertex_count());
                    self.finished_blocks += 1;
                    finished.push(block);
                }
                Err(err) => {
                    debug!("Dropped region: {err}");
                    self.dropped_blocks += 1;
                }
            }
            ctx.rows.purge_region(region, ctx.artifacts);
            self.order.retain(|r| *r != region);
        }
        finished
    }

    fn has_live_frontier(&self) -> bool {
        self.regions.values().any(|state| !state.frontier.is_empty())
    }

    /// True once every region was launched, grown and cast.
    pub fn is_complete(&self) -> bool {
        self.started && self.exhausted && self.regions.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_active(&self, region: RegionId) -> bool {
        self.regions.contains_key(&region)
    }

    pub fn active_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn launched(&self) -> usize {
        self.next_start
    }

    pub fn discovered(&self) -> usize {
        self.starts.len()
    }

    pub fn finished_blocks(&self) -> usize {
        self.finished_blocks
    }

    pub fn dropped_blocks(&self) -> usize {
        self.dropped_blocks
    }

    pub fn frontier_len(&self, region: RegionId) -> usize {
        self.regions.get(&region).map_or(0, |state| state.frontier.len())
    }

    pub fn height(&self, region: RegionId) -> Option<i32> {
        self.regions.get(&region).map(|state| state.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeedTier;
    use crate::systems::propagation::flood_fill::label_regions;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct World {
        grid: Grid,
        pool: ArtifactPool,
        rows: RowAggregator,
        fades: FadeController,
        now: f32,
    }

    impl World {
        fn new(grid: Grid) -> Self {
            Self {
                grid,
                pool: ArtifactPool::with_capacity(64, 100_000),
                rows: RowAggregator::default(),
                fades: FadeController::default(),
                now: 0.0,
            }
        }

        fn ctx(&mut self, steps: usize) -> SimulationContext<'_> {
            let mut tier = SpeedTier::Normal.settings();
            tier.propagation_steps = steps;
            SimulationContext {
                grid: &mut self.grid,
                artifacts: &mut self.pool,
                rows: &mut self.rows,
                fades: &mut self.fades,
                tier,
                now: self.now,
            }
        }
    }

    fn started(grid: Grid, launches: usize) -> (World, PropagationEngine, StdRng) {
        let (plan, _) = label_regions(grid.clone()).unwrap();
        let mut world = World::new(grid);
        let mut rng = StdRng::seed_from_u64(3);
        let mut engine = PropagationEngine::new(EngineSettings {
            initial_launches: launches,
            min_block_vertices: 0,
            ..default()
        });
        engine.begin(plan.starts, &mut world.ctx(10), &mut rng);
        (world, engine, rng)
    }

    #[test]
    fn growth_fills_reachable_cells_and_stops() {
        let grid = Grid::from_rows(&[
            "##########",
            "#........#",
            "#........#",
            "#........#",
            "#........#",
            "##########",
        ]);
        let (mut world, mut engine, mut rng) = started(grid, 1);

        let mut ticks = 0;
        while engine.has_live_frontier() || !engine.exhausted {
            engine.run_tick(&mut world.ctx(7), &mut rng);
            ticks += 1;
            assert!(ticks < 1_000, "growth never settled");
        }

        assert_eq!(world.grid.count(RegionId::FIRST.code()), 32);
        assert_eq!(world.grid.count(EMPTY), 0);
        assert_eq!(world.pool.active_count(), 32);
        // every row closed on both sides
        for z in 1..=4 {
            let status = world.rows.status(RegionId::FIRST, z).unwrap();
            assert!(status.left && status.right);
        }
    }

    #[test]
    fn labels_are_never_rewritten() {
        let grid = Grid::from_rows(&[
            "############",
            "#....#.....#",
            "#....#.....#",
            "######.....#",
            "#..........#",
            "############",
        ]);
        let (mut world, mut engine, mut rng) = started(grid, 2);

        let mut previous = world.grid.clone();
        for _ in 0..200 {
            engine.run_tick(&mut world.ctx(5), &mut rng);
            for (cell, code) in previous.iter() {
                if code >= RegionId::FIRST.code() {
                    assert_eq!(world.grid.get(cell), code, "{cell} relabeled");
                }
            }
            previous = world.grid.clone();
        }
    }

    #[test]
    fn stalls_launch_regions_in_discovery_order() {
        let grid = Grid::from_rows(&[
            "#######",
            "#.#.#.#",
            "#######",
        ]);
        let (mut world, mut engine, mut rng) = started(grid, 1);
        assert_eq!(engine.launched(), 1);

        engine.run_tick(&mut world.ctx(100), &mut rng);
        assert_eq!(engine.launched(), 3);
        assert!(engine.exhausted);
        assert_eq!(world.grid.get(IVec2::new(1, 1)), 2);
        assert_eq!(world.grid.get(IVec2::new(3, 1)), 3);
        assert_eq!(world.grid.get(IVec2::new(5, 1)), 4);
    }

    #[test]
    fn heights_stay_in_range() {
        let grid = Grid::from_rows(&["#####", "#.#.#", "#####"]);
        let (world, engine, _) = started(grid, 2);
        drop(world);
        for code in [2, 3] {
            let height = engine.height(RegionId::new(code).unwrap()).unwrap();
            assert!((REGION_HEIGHT_MIN..REGION_HEIGHT_MAX).contains(&height));
        }
    }

    #[test]
    fn filled_regions_are_cast_after_their_cooldown() {
        let grid = Grid::from_rows(&["#####", "#...#", "#...#", "#####"]);
        let (mut world, mut engine, mut rng) = started(grid, 1);
        engine.run_tick(&mut world.ctx(100), &mut rng);

        let fade = SpeedTier::Normal.settings().fade_duration;
        let mut blocks = Vec::new();
        let mut checks = 0;
        while engine.is_active(RegionId::FIRST) {
            blocks.extend(engine.check_regions(&mut world.ctx(100), 0.1));
            checks += 1;
        }
        // cooldown has to pass fade + margin
        assert!(checks as f32 * 0.1 >= fade + COOLDOWN_MARGIN);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].region, RegionId::FIRST);
        assert_eq!(world.pool.active_count(), 0);
        assert!(!world.rows.tracks(RegionId::FIRST));

        engine.run_tick(&mut world.ctx(100), &mut rng);
        assert!(engine.is_complete());
    }

    #[test]
    fn occupied_launch_cell_is_skipped() {
        let grid = Grid::from_rows(&["####", "#..#", "####"]);
        let (plan, _) = label_regions(grid.clone()).unwrap();
        let mut world = World::new(grid);
        // something claimed the start cell after labeling
        world.grid.set_wall(plan.starts[0]);

        let mut rng = StdRng::seed_from_u64(1);
        let mut engine = PropagationEngine::new(EngineSettings { min_block_vertices: 0, ..default() });
        engine.begin(plan.starts, &mut world.ctx(10), &mut rng);
        assert_eq!(engine.active_regions(), 1);
        assert_eq!(engine.frontier_len(RegionId::FIRST), 0);

        let mut dropped = 0;
        for _ in 0..20 {
            dropped += engine.check_regions(&mut world.ctx(10), 0.1).len();
        }
        assert_eq!(dropped, 0);
        assert_eq!(engine.dropped_blocks(), 1);
        assert!(!engine.is_active(RegionId::FIRST));
    }
}
