use bevy::prelude::*;

use crate::error::{SimError, SimResult};
use crate::systems::grid::{CellBounds, Grid, RegionId};
use crate::systems::mesh::MeshData;
use crate::systems::mesh::poly::contour::{trace_contour, Contour};
use crate::systems::mesh::poly::mesh_gen::contour_to_block;

/// Contour corners sit on cell edges while cells are centred on integer coordinates.
const CELL_HALF: f32 = 0.5;

/// One fully grown region cast into a single mesh.
#[derive(Debug, Clone)]
pub struct FinishedBlock {
    pub region: RegionId,
    pub height: i32,
    pub contour: Contour,
    /// Vertices are centred on the origin.
    pub mesh: MeshData,
    /// World translation that puts the mesh back over its footprint.
    pub offset: Vec3,
}

/// Casts the grid footprint of `region` into a prism `height` units tall.
///
/// Fails when nothing can be traced or when the result has fewer than `min_vertices`
/// vertices. Both are expected outcomes for tiny pockets and are not faults.
pub fn cast_block(
    grid: &Grid,
    region: RegionId,
    height: i32,
    bounds: Option<CellBounds>,
    min_vertices: usize,
) -> SimResult<FinishedBlock> {
    let contour = trace_contour(grid, region, bounds);
    if contour.is_empty() {
        return Err(SimError::EmptyContour { region });
    }
    if contour.len() < 3 {
        return Err(SimError::DegenerateContour { region, points: contour.len() });
    }

    let mut mesh = contour_to_block(&contour, height as f32);
    if mesh.vertex_count() < min_vertices {
        return Err(SimError::TooFewVertices {
            region,
            vertices: mesh.vertex_count(),
            minimum: min_vertices,
        });
    }

    let centroid = mesh.recenter();
    Ok(FinishedBlock {
        region,
        height,
        contour,
        mesh,
        offset: centroid - Vec3::new(CELL_HALF, 0.0, CELL_HALF),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pocket(min: IVec2, max: IVec2) -> Grid {
        let mut grid = Grid::new(max.x + 2, max.y + 2);
        for z in min.y..=max.y {
            for x in min.x..=max.x {
                grid.try_set(IVec2::new(x, z), RegionId::FIRST);
            }
        }
        grid
    }

    #[test]
    fn cast_block_is_centred_over_its_cells() {
        let grid = pocket(IVec2::new(2, 3), IVec2::new(5, 8));
        let block = cast_block(&grid, RegionId::FIRST, 40, None, 0).unwrap();

        let (min, max) = block.mesh.bounds().unwrap();
        let world_min = min + block.offset;
        let world_max = max + block.offset;
        // cell x spans x - 0.5 .. x + 0.5
        assert!((world_min - Vec3::new(1.5, 0.0, 2.5)).length() < 1e-4);
        assert!((world_max - Vec3::new(5.5, 40.0, 8.5)).length() < 1e-4);
    }

    #[test]
    fn small_casts_are_rejected() {
        let grid = pocket(IVec2::new(1, 1), IVec2::new(1, 1));
        let err = cast_block(&grid, RegionId::FIRST, 20, None, 100).unwrap_err();
        assert!(matches!(err, SimError::TooFewVertices { vertices: 26, minimum: 100, .. }));
    }

    #[test]
    fn unknown_region_has_no_contour() {
        let grid = Grid::new(4, 4);
        let err = cast_block(&grid, RegionId::FIRST, 20, None, 0).unwrap_err();
        assert!(matches!(err, SimError::EmptyContour { .. }));
    }
}
