use std::collections::{BTreeMap, HashMap, HashSet};

use bevy::prelude::*;

use crate::config::{ROW_BATCH_THRESHOLD, ROW_SETTLE_DELAY};
use crate::systems::artifacts::{bake_artifacts, ArtifactId, ArtifactKind, ArtifactPool, Tint};
use crate::systems::grid::RegionId;
use crate::systems::propagation::colors::Palettes;

/// Seconds before a row held back by a running fade is checked again.
pub const FADE_RECHECK_DELAY: f32 = 0.1;

/// One row of one region. Rows of different regions never alias.
pub type RowKey = (RegionId, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Whether each end of a row has run into a wall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowStatus {
    pub left: bool,
    pub right: bool,
    pub cooldown_started: bool,
}

/// Keeps the live artifact count down by merging settled rows into runs and
/// many runs into one baked mesh per region.
#[derive(Resource, Debug)]
pub struct RowAggregator {
    rows: HashMap<RowKey, Vec<ArtifactId>>,
    statuses: HashMap<RowKey, RowStatus>,
    // expiry in milliseconds; keys are nudged until unique
    cooldowns: BTreeMap<u64, RowKey>,
    combined: HashMap<RegionId, Vec<ArtifactId>>,
    owned: HashMap<RegionId, HashSet<ArtifactId>>,
    settle_delay: f32,
    batch_threshold: usize,
}

impl Default for RowAggregator {
    fn default() -> Self {
        Self::new(ROW_SETTLE_DELAY, ROW_BATCH_THRESHOLD)
    }
}

impl RowAggregator {
    pub fn new(settle_delay: f32, batch_threshold: usize) -> Self {
        Self {
            rows: HashMap::new(),
            statuses: HashMap::new(),
            cooldowns: BTreeMap::new(),
            combined: HashMap::new(),
            owned: HashMap::new(),
            settle_delay,
            batch_threshold,
        }
    }

    /// Records a freshly spawned cell artifact in its row.
    pub fn register(&mut self, region: RegionId, row: i32, id: ArtifactId) {
        self.rows.entry((region, row)).or_default().push(id);
        self.owned.entry(region).or_default().insert(id);
    }

    /// Marks one end of a row as closed. The first time both ends are closed a merge is
    /// scheduled `settle_delay` seconds after `now`; later calls change nothing.
    ///
    /// # Returns
    /// `true` if this call scheduled the merge
    pub fn mark_side(&mut self, region: RegionId, row: i32, side: Side, now: f32) -> bool {
        let status = self.statuses.entry((region, row)).or_default();
        match side {
            Side::Left => status.left = true,
            Side::Right => status.right = true,
        }
        if !(status.left && status.right) || status.cooldown_started {
            return false;
        }
        status.cooldown_started = true;
        self.schedule((region, row), now + self.settle_delay);
        true
    }

    fn schedule(&mut self, key: RowKey, due: f32) {
        let mut at = (due.max(0.0) * 1000.0) as u64;
        while self.cooldowns.contains_key(&at) {
            at += 1;
        }
        self.cooldowns.insert(at, key);
    }

    pub fn status(&self, region: RegionId, row: i32) -> Option<RowStatus> {
        self.statuses.get(&(region, row)).copied()
    }

    pub fn pending_merges(&self) -> usize {
        self.cooldowns.len()
    }

    /// Merges every row whose settle delay has passed. A row with a member still
    /// fading is pushed back by [`FADE_RECHECK_DELAY`] instead.
    ///
    /// # Returns
    /// How many rows were merged
    pub fn merge_due_rows(&mut self, now: f32, pool: &mut ArtifactPool) -> usize {
        let now_ms = (now.max(0.0) * 1000.0) as u64;
        let mut merged = 0;
        let mut deferred = Vec::new();
        while let Some(entry) = self.cooldowns.first_entry() {
            if *entry.key() > now_ms {
                break;
            }
            let key = entry.remove();
            if self.row_is_fading(key, pool) {
                deferred.push(key);
                continue;
            }
            self.statuses.remove(&key);
            if self.merge_row(key, pool) {
                merged += 1;
            }
        }
        for key in deferred {
            self.schedule(key, now + FADE_RECHECK_DELAY);
        }
        merged
    }

    fn row_is_fading(&self, key: RowKey, pool: &ArtifactPool) -> bool {
        self.rows
            .get(&key)
            .is_some_and(|ids| ids.iter().any(|&id| pool.get(id).is_some_and(|a| a.fading)))
    }

    /// Replaces a row's cell artifacts with one stretched artifact per contiguous run.
    fn merge_row(&mut self, key: RowKey, pool: &mut ArtifactPool) -> bool {
        let (region, row) = key;
        let Some(ids) = self.rows.remove(&key) else {
            return false;
        };

        let mut cells: Vec<(i32, ArtifactId, Vec3)> = ids
            .iter()
            .filter_map(|&id| pool.get(id).map(|a| (a.position.x.round() as i32, id, a.scale)))
            .collect();
        if cells.is_empty() {
            return false;
        }
        cells.sort_by_key(|(x, _, _)| *x);

        let tint = Tint::Final { palette: Palettes::palette_for(region) };
        let owned = self.owned.entry(region).or_default();
        let combined = self.combined.entry(region).or_default();

        let mut start = 0;
        for i in 0..cells.len() {
            let run_ends = i + 1 == cells.len() || cells[i + 1].0 != cells[i].0 + 1;
            if !run_ends {
                continue;
            }
            let run = &cells[start..=i];
            let (min_x, max_x) = (run[0].0, run[run.len() - 1].0);
            let length = (max_x - min_x + 1) as f32;
            let height = run[0].2.y;

            let merged = pool.spawn(
                ArtifactKind::Run,
                Vec3::new(min_x as f32 + length / 2.0 - 0.5, (height / 2.0).floor(), row as f32),
                Vec3::new(length, height, 1.0),
                tint,
            );
            owned.insert(merged);
            combined.push(merged);

            for &(_, id, _) in run {
                owned.remove(&id);
                pool.release(id);
            }
            start = i + 1;
        }
        true
    }

    /// Bakes a region's merged rows into one mesh once there are more than the threshold.
    ///
    /// # Returns
    /// How many regions were baked
    pub fn batch_combined_rows(&mut self, pool: &mut ArtifactPool) -> usize {
        let ready: Vec<RegionId> = self
            .combined
            .iter()
            .filter(|(_, ids)| ids.len() > self.batch_threshold)
            .map(|(region, _)| *region)
            .collect();

        for &region in &ready {
            let Some(mut ids) = self.combined.remove(&region) else {
                continue;
            };
            ids.retain(|&id| pool.is_live(id));
            ids.sort_by(|a, b| {
                let za = pool.get(*a).map_or(0.0, |x| x.position.z);
                let zb = pool.get(*b).map_or(0.0, |x| x.position.z);
                za.total_cmp(&zb)
            });
            let Some(origin) = ids.first().and_then(|&id| pool.get(id)).map(|a| a.position) else {
                continue;
            };

            let mesh = bake_artifacts(pool, &ids, origin);
            let batch = pool.spawn(
                ArtifactKind::Batch,
                origin,
                Vec3::ONE,
                Tint::Final { palette: Palettes::palette_for(region) },
            );
            if let Some(artifact) = pool.get_mut(batch) {
                artifact.mesh = Some(mesh);
            }

            let owned = self.owned.entry(region).or_default();
            owned.insert(batch);
            for id in ids {
                owned.remove(&id);
                pool.release(id);
            }
        }
        ready.len()
    }

    /// Drops every trace of a region and returns its artifacts to the pool.
    pub fn purge_region(&mut self, region: RegionId, pool: &mut ArtifactPool) -> usize {
        let owned = self.owned.remove(&region).unwrap_or_default();
        let released = owned.into_iter().filter(|&id| pool.release(id)).count();

        self.rows.retain(|(r, _), _| *r != region);
        self.statuses.retain(|(r, _), _| *r != region);
        self.cooldowns.retain(|_, (r, _)| *r != region);
        self.combined.remove(&region);
        released
    }

    pub fn live_artifacts(&self, region: RegionId) -> usize {
        self.owned.get(&region).map_or(0, HashSet::len)
    }

    pub fn tracks(&self, region: RegionId) -> bool {
        self.owned.contains_key(&region)
            || self.combined.contains_key(&region)
            || self.rows.keys().any(|(r, _)| *r == region)
            || self.statuses.keys().any(|(r, _)| *r == region)
            || self.cooldowns.values().any(|(r, _)| *r == region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::propagation::colors::{FadeController, FadeGradient, FadeTiming};

    fn region(code: i16) -> RegionId {
        RegionId::new(code).unwrap()
    }

    fn fill_row(agg: &mut RowAggregator, pool: &mut ArtifactPool, r: RegionId, z: i32, xs: &[i32]) {
        for &x in xs {
            let id = pool.spawn(
                ArtifactKind::Cell,
                Vec3::new(x as f32, 15.0, z as f32),
                Vec3::new(1.0, 30.0, 1.0),
                Tint::Neutral,
            );
            agg.register(r, z, id);
        }
    }

    #[test]
    fn cooldown_is_scheduled_once() {
        let mut agg = RowAggregator::new(1.0, 25);
        let r = region(2);
        assert!(!agg.mark_side(r, 4, Side::Left, 0.0));
        assert!(!agg.mark_side(r, 4, Side::Left, 0.1));
        assert!(agg.mark_side(r, 4, Side::Right, 0.2));
        assert!(!agg.mark_side(r, 4, Side::Right, 0.3));
        assert!(!agg.mark_side(r, 4, Side::Left, 0.4));
        assert_eq!(agg.pending_merges(), 1);
    }

    #[test]
    fn colliding_cooldowns_stay_distinct() {
        let mut agg = RowAggregator::new(1.0, 25);
        for row in 0..5 {
            agg.mark_side(region(2), row, Side::Left, 2.0);
            agg.mark_side(region(2), row, Side::Right, 2.0);
        }
        assert_eq!(agg.pending_merges(), 5);
    }

    #[test]
    fn rows_merge_into_contiguous_runs() {
        let mut pool = ArtifactPool::with_capacity(16, 64);
        let mut agg = RowAggregator::new(1.0, 25);
        let r = region(2);
        // a wall at x = 4 splits the row
        fill_row(&mut agg, &mut pool, r, 7, &[1, 2, 3, 5, 6]);
        agg.mark_side(r, 7, Side::Left, 0.0);
        agg.mark_side(r, 7, Side::Right, 0.0);

        assert_eq!(agg.merge_due_rows(0.5, &mut pool), 0);
        assert_eq!(agg.merge_due_rows(1.0, &mut pool), 1);
        assert_eq!(pool.active_count(), 2);

        let mut runs: Vec<(Vec3, Vec3)> = pool
            .live_ids()
            .into_iter()
            .filter_map(|id| pool.get(id))
            .map(|a| (a.position, a.scale))
            .collect();
        runs.sort_by(|a, b| a.0.x.total_cmp(&b.0.x));
        assert_eq!(runs[0], (Vec3::new(2.0, 15.0, 7.0), Vec3::new(3.0, 30.0, 1.0)));
        assert_eq!(runs[1], (Vec3::new(5.5, 15.0, 7.0), Vec3::new(2.0, 30.0, 1.0)));
        assert!(agg.status(r, 7).is_none());
        assert_eq!(agg.live_artifacts(r), 2);
    }

    #[test]
    fn rows_wait_for_late_cells_to_finish_fading() {
        let mut pool = ArtifactPool::with_capacity(16, 64);
        let mut agg = RowAggregator::new(1.0, 25);
        let mut fades = FadeController::default();
        let timing = FadeTiming { duration: 1.0, steps: 10 };
        let r = region(2);

        fill_row(&mut agg, &mut pool, r, 3, &[1, 2, 3]);
        for id in pool.live_ids() {
            fades.track(id, FadeGradient::Region { palette: 2 }, &mut pool);
        }
        agg.mark_side(r, 3, Side::Left, 0.0);
        agg.mark_side(r, 3, Side::Right, 0.0);
        fades.advance(0.9, timing, &mut pool);

        // another run keeps growing after both ends closed
        let late = pool.spawn(ArtifactKind::Cell, Vec3::new(4.0, 15.0, 3.0), Vec3::new(1.0, 30.0, 1.0), Tint::Neutral);
        agg.register(r, 3, late);
        fades.track(late, FadeGradient::Region { palette: 2 }, &mut pool);
        fades.advance(0.1, timing, &mut pool);

        assert_eq!(agg.merge_due_rows(1.0, &mut pool), 0);
        assert!(pool.is_live(late));
        assert_eq!(agg.pending_merges(), 1);
        assert!(agg.status(r, 3).is_some());

        fades.advance(1.5, timing, &mut pool);
        assert_eq!(agg.merge_due_rows(1.0 + FADE_RECHECK_DELAY, &mut pool), 1);
        assert!(!pool.is_live(late));
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn many_merged_rows_bake_into_one_batch() {
        let mut pool = ArtifactPool::with_capacity(64, 256);
        let mut agg = RowAggregator::new(0.0, 3);
        let r = region(5);
        for z in 0..4 {
            fill_row(&mut agg, &mut pool, r, z, &[0, 1, 2]);
            agg.mark_side(r, z, Side::Left, 0.0);
            agg.mark_side(r, z, Side::Right, 0.0);
        }
        agg.merge_due_rows(0.0, &mut pool);
        assert_eq!(pool.active_count(), 4);

        assert_eq!(agg.batch_combined_rows(&mut pool), 1);
        let live = pool.live_ids();
        assert_eq!(live.len(), 1);
        let batch = pool.get(live[0]).unwrap();
        assert_eq!(batch.kind, ArtifactKind::Batch);
        assert_eq!(batch.mesh.as_ref().map(|m| m.vertex_count()), Some(4 * 24));
        assert_eq!(batch.position, Vec3::new(1.0, 15.0, 0.0));
    }

    #[test]
    fn purge_forgets_only_its_region() {
        let mut pool = ArtifactPool::with_capacity(16, 64);
        let mut agg = RowAggregator::new(1.0, 25);
        let (a, b) = (region(2), region(3));
        fill_row(&mut agg, &mut pool, a, 5, &[1, 2]);
        fill_row(&mut agg, &mut pool, b, 5, &[8, 9]);
        agg.mark_side(a, 5, Side::Left, 0.0);
        agg.mark_side(a, 5, Side::Right, 0.0);

        assert_eq!(agg.purge_region(a, &mut pool), 2);
        assert!(!agg.tracks(a));
        assert!(agg.tracks(b));
        assert_eq!(agg.live_artifacts(b), 2);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(agg.pending_merges(), 0);
    }
}
