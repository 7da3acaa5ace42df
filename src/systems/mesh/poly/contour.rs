use std::collections::{BTreeMap, HashSet};

use bevy::prelude::*;

use crate::config::{CONTOUR_RUN_SPACING, CONTOUR_SHORT_RUN};
use crate::systems::grid::{CellBounds, Grid, RegionId};

/// Closed boundary of a region in cell-corner coordinates, clockwise with x right and z up.
pub type Contour = Vec<IVec2>;

/// Traces the outline of every cell labeled `region`.
///
/// Each row contributes the left edge of its leftmost cell and the right edge of its
/// rightmost cell, both at z and z + 1, so steps between rows stay right angles. The
/// right side is walked back down and appended to the left side to close the loop.
/// Scanning stops at the first empty row after the shape has started.
///
/// `bounds` limits the scan to the region's known extent; `None` scans the whole grid.
pub fn trace_contour(grid: &Grid, region: RegionId, bounds: Option<CellBounds>) -> Contour {
    let (min, max) = match bounds {
        Some(b) => (b.min.max(IVec2::ZERO), b.max),
        None => (IVec2::ZERO, IVec2::new(grid.width() - 1, grid.depth() - 1)),
    };

    let code = region.code();
    let mut seen = HashSet::new();
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut started = false;

    for z in min.y..=max.y {
        let mut first = None;
        let mut last = None;
        for x in min.x..=max.x {
            if grid.get(IVec2::new(x, z)) == code {
                first.get_or_insert(x);
                last = Some(x);
            }
        }

        let (Some(l), Some(r)) = (first, last) else {
            if started {
                break;
            }
            continue;
        };
        started = true;

        for point in [IVec2::new(l, z), IVec2::new(l, z + 1)] {
            if seen.insert(point) {
                left.push(point);
            }
        }
        for point in [IVec2::new(r + 1, z), IVec2::new(r + 1, z + 1)] {
            if seen.insert(point) {
                right.push(point);
            }
        }
    }

    right.reverse();
    left.extend(right);
    optimize_contour(&left)
}

/// Thins straight vertical runs of the contour.
///
/// Points are grouped by x and split into runs of consecutive z. A short run keeps only
/// its two endpoints; a long run keeps one point every [`CONTOUR_RUN_SPACING`] plus its
/// last point. The order of the surviving points is unchanged.
pub fn optimize_contour(points: &[IVec2]) -> Contour {
    let mut columns: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    for p in points {
        columns.entry(p.x).or_default().push(p.y);
    }

    let mut keep = HashSet::new();
    for (x, mut zs) in columns {
        zs.sort_unstable();
        zs.dedup();

        let mut run_start = 0;
        for i in 0..zs.len() {
            let run_ends = i + 1 == zs.len() || zs[i + 1] != zs[i] + 1;
            if !run_ends {
                continue;
            }
            let (start, end) = (zs[run_start], zs[i]);
            if end - start + 1 <= CONTOUR_SHORT_RUN {
                keep.insert(IVec2::new(x, start));
                keep.insert(IVec2::new(x, end));
            } else {
                let mut z = start;
                while z <= end {
                    keep.insert(IVec2::new(x, z));
                    z += CONTOUR_RUN_SPACING;
                }
                keep.insert(IVec2::new(x, end));
            }
            run_start = i + 1;
        }
    }

    points.iter().copied().filter(|p| keep.contains(p)).collect()
}
