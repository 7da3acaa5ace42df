use std::collections::VecDeque;
use std::time::Instant;

use bevy::prelude::*;

use crate::error::{SimError, SimResult};
use crate::systems::grid::{Grid, RegionId, EMPTY};

/// Result of labeling a grid snapshot: one start cell per region, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct LaunchPlan {
    pub starts: Vec<IVec2>,
}

impl LaunchPlan {
    pub fn region_count(&self) -> usize {
        self.starts.len()
    }
}

/// Labels every empty cell of `snapshot` into disjoint 4-connected regions.
///
/// Scans z in the outer loop and x in the inner loop. Each unlabeled empty cell opens a
/// new region (ids from 2 upward) and a breadth-first fill marks everything connected to
/// it, so the scan skips those cells afterwards. The snapshot is consumed and returned
/// labeled; the live grid is never touched.
///
/// # Returns
/// The start cell of each region and the labeled snapshot
pub fn label_regions(mut snapshot: Grid) -> SimResult<(LaunchPlan, Grid)> {
    let started = Instant::now();
    let mut plan = LaunchPlan::default();
    let mut next = Some(RegionId::FIRST);
    let mut queue = VecDeque::new();

    for z in 0..snapshot.depth() {
        for x in 0..snapshot.width() {
            let start = IVec2::new(x, z);
            if !snapshot.is_empty_cell(start) {
                continue;
            }

            let region = next.ok_or(SimError::RegionIdsExhausted {
                discovered: plan.starts.len(),
            })?;
            next = region.next();
            plan.starts.push(start);

            snapshot.try_set(start, region);
            queue.push_back(start);
            while let Some(cell) = queue.pop_front() {
                for offset in [IVec2::X, IVec2::NEG_X, IVec2::Y, IVec2::NEG_Y] {
                    let neighbour = cell + offset;
                    if snapshot.get(neighbour) == EMPTY && snapshot.try_set(neighbour, region) {
                        queue.push_back(neighbour);
                    }
                }
            }
        }
    }

    info!(
        "Labeled {} regions in {:.1} ms",
        plan.region_count(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok((plan, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::grid::WALL;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_grid(rng: &mut StdRng, size: i32, wall_chance: f64) -> Grid {
        let mut grid = Grid::new(size, size);
        for z in 0..size {
            for x in 0..size {
                if rng.random_bool(wall_chance) {
                    grid.set_wall(IVec2::new(x, z));
                }
            }
        }
        grid
    }

    #[test]
    fn labels_partition_every_empty_cell() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let grid = random_grid(&mut rng, 24, 0.35);
            let (plan, labeled) = label_regions(grid.clone()).unwrap();

            for (cell, code) in grid.iter() {
                let label = labeled.get(cell);
                if code == WALL {
                    assert_eq!(label, WALL, "wall relabeled at {cell}");
                    continue;
                }
                assert!(label >= RegionId::FIRST.code(), "unlabeled cell at {cell}");
                assert!(label < RegionId::FIRST.code() + plan.region_count() as i16);

                for offset in [IVec2::X, IVec2::Y] {
                    let other = cell + offset;
                    if grid.contains(other) && grid.get(other) == EMPTY {
                        assert_eq!(labeled.get(other), label, "{cell} and {other} split");
                    }
                }
            }
        }
    }

    #[test]
    fn starts_follow_scan_order() {
        let grid = Grid::from_rows(&[
            "#####",
            "#.#.#",
            "#.#.#",
            "#####",
            "#...#",
            "#####",
        ]);
        let (plan, labeled) = label_regions(grid).unwrap();
        assert_eq!(
            plan.starts,
            vec![IVec2::new(1, 1), IVec2::new(3, 1), IVec2::new(1, 4)]
        );
        assert_eq!(labeled.get(IVec2::new(3, 2)), 3);
        assert_eq!(labeled.get(IVec2::new(2, 4)), 4);
    }

    #[test]
    fn empty_grid_has_no_regions() {
        let (plan, _) = label_regions(Grid::new(0, 0)).unwrap();
        assert_eq!(plan.region_count(), 0);

        let (plan, _) = label_regions(Grid::from_rows(&["###", "###"])).unwrap();
        assert_eq!(plan.region_count(), 0);
    }

    #[test]
    fn too_many_regions_is_reported() {
        // a checkerboard wider than the id range
        let size = 260;
        let mut grid = Grid::new(size, size);
        for z in 0..size {
            for x in 0..size {
                if (x + z) % 2 == 1 {
                    grid.set_wall(IVec2::new(x, z));
                }
            }
        }
        assert!(matches!(
            label_regions(grid),
            Err(SimError::RegionIdsExhausted { .. })
        ));
    }
}
