use std::fmt;

use bevy::prelude::*;
use bevy::gizmos::config::{GizmoConfigGroup, GizmoConfigStore};

use crate::config::{WORLD_SIZE_X, WORLD_SIZE_Z};

/// Raw cell code stored in the grid.
pub type CellCode = i16;

pub const EMPTY: CellCode = 0;
pub const WALL: CellCode = 1;

/// Identifier of one enclosed region. Ids start at 2 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(CellCode);

impl RegionId {
    pub const FIRST: RegionId = RegionId(2);

    /// Wraps a raw code, rejecting empty and wall codes.
    pub fn new(code: CellCode) -> Option<Self> {
        (code >= Self::FIRST.0).then_some(Self(code))
    }

    pub fn code(self) -> CellCode {
        self.0
    }

    /// The id discovered after this one, if the code range allows it.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inclusive cell-space bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub min: IVec2,
    pub max: IVec2,
}

impl CellBounds {
    pub fn from_cell(cell: IVec2) -> Self {
        Self { min: cell, max: cell }
    }

    pub fn include(&mut self, cell: IVec2) {
        self.min = self.min.min(cell);
        self.max = self.max.max(cell);
    }
}

/// The single owned cell-state array. Every write goes through this interface so
/// region labels can only ever be placed on empty cells.
#[derive(Resource, Clone, Debug)]
pub struct Grid {
    width: i32,
    depth: i32,
    cells: Vec<CellCode>,
}

impl Default for Grid {
    fn default() -> Self {
        // one extra row and column so the far border has cells of its own
        Self::new(WORLD_SIZE_X + 1, WORLD_SIZE_Z + 1)
    }
}

impl Grid {
    pub fn new(width: i32, depth: i32) -> Self {
        let width = width.max(0);
        let depth = depth.max(0);
        Self {
            width,
            depth,
            cells: vec![EMPTY; (width * depth) as usize],
        }
    }

    /// Builds a grid from text rows, `#` for walls and anything else for empty.
    /// Row 0 of the text is z = 0.
    pub fn from_rows(rows: &[&str]) -> Self {
        let depth = rows.len() as i32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as i32;
        let mut grid = Self::new(width, depth);
        for (z, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    grid.set_wall(IVec2::new(x as i32, z as i32));
                }
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn contains(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.depth
    }

    fn index(&self, cell: IVec2) -> Option<usize> {
        self.contains(cell)
            .then(|| (cell.y * self.width + cell.x) as usize)
    }

    /// Cell code at (x, z). Anything outside the grid reads as wall.
    pub fn get(&self, cell: IVec2) -> CellCode {
        self.index(cell).map_or(WALL, |i| self.cells[i])
    }

    pub fn is_empty_cell(&self, cell: IVec2) -> bool {
        self.get(cell) == EMPTY
    }

    /// Labels an empty cell with a region id.
    ///
    /// # Returns
    /// `true` if the cell was empty and now belongs to `region`,
    /// `false` if it was a wall, already labeled, or out of bounds
    pub fn try_set(&mut self, cell: IVec2, region: RegionId) -> bool {
        match self.index(cell) {
            Some(i) if self.cells[i] == EMPTY => {
                self.cells[i] = region.code();
                true
            }
            _ => false,
        }
    }

    /// Turns an empty cell into a wall. Labeled cells are never overwritten.
    ///
    /// # Returns
    /// `true` if a new wall was placed
    pub fn set_wall(&mut self, cell: IVec2) -> bool {
        match self.index(cell) {
            Some(i) if self.cells[i] == EMPTY => {
                self.cells[i] = WALL;
                true
            }
            _ => false,
        }
    }

    pub fn count(&self, code: CellCode) -> usize {
        self.cells.iter().filter(|&&c| c == code).count()
    }

    /// Row-major iterator over `(cell, code)`, z outer and x inner.
    pub fn iter(&self) -> impl Iterator<Item = (IVec2, CellCode)> + '_ {
        let width = self.width.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &code)| (IVec2::new(i as i32 % width, i as i32 / width), code))
    }
}

// ground guides so the growing field reads at scale
pub struct GridPlugin;

#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct GridGizmoGroup;

impl Plugin for GridPlugin {
    fn build(&self, app: &mut App) {
        app
            .init_resource::<Grid>()
            .insert_resource(GridGuides::default())
            .init_gizmo_group::<GridGizmoGroup>()
            .add_systems(Startup, setup_gizmos)
            .add_systems(Update, draw_guides);
    }
}

#[derive(Resource)]
pub struct GridGuides {
    pub major_spacing: f32,
    pub border_color: Color,
    pub major_color: Color,
    pub enabled: bool,
}

impl Default for GridGuides {
    fn default() -> Self {
        Self {
            major_spacing: 100.0,
            border_color: Color::srgba(0.8, 0.8, 0.8, 0.4),
            major_color: Color::srgba(0.5, 0.5, 0.5, 0.15),
            enabled: true,
        }
    }
}

fn setup_gizmos(
    mut config_store: ResMut<GizmoConfigStore>
) {
    let (config, _) = config_store.config_mut::<GridGizmoGroup>();
    config.depth_bias = 0.1;
}

fn draw_guides(
    mut gizmos: Gizmos<GridGizmoGroup>,
    guides: Res<GridGuides>,
    grid: Res<Grid>,
) {
    if !guides.enabled {
        return;
    }

    // cells are centred on integer coordinates
    let min_x = -0.5;
    let min_z = -0.5;
    let max_x = grid.width() as f32 - 0.5;
    let max_z = grid.depth() as f32 - 0.5;

    let mut x = guides.major_spacing;
    while x < max_x {
        gizmos.line(Vec3::new(x, -0.02, min_z), Vec3::new(x, -0.02, max_z), guides.major_color);
        x += guides.major_spacing;
    }

    let mut z = guides.major_spacing;
    while z < max_z {
        gizmos.line(Vec3::new(min_x, -0.02, z), Vec3::new(max_x, -0.02, z), guides.major_color);
        z += guides.major_spacing;
    }

    let corners = [
        Vec3::new(min_x, -0.01, min_z),
        Vec3::new(max_x, -0.01, min_z),
        Vec3::new(max_x, -0.01, max_z),
        Vec3::new(min_x, -0.01, max_z),
    ];
    for i in 0..corners.len() {
        gizmos.line(corners[i], corners[(i + 1) % corners.len()], guides.border_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_as_wall() {
        let grid = Grid::new(4, 4);
        assert_eq!(grid.get(IVec2::new(-1, 0)), WALL);
        assert_eq!(grid.get(IVec2::new(0, 4)), WALL);
        assert_eq!(grid.get(IVec2::new(3, 3)), EMPTY);
    }

    #[test]
    fn try_set_only_labels_empty_cells() {
        let mut grid = Grid::new(3, 3);
        let a = RegionId::FIRST;
        let b = a.next().unwrap();
        let cell = IVec2::new(1, 1);

        assert!(grid.try_set(cell, a));
        assert!(!grid.try_set(cell, b));
        assert_eq!(grid.get(cell), a.code());

        assert!(grid.set_wall(IVec2::new(0, 0)));
        assert!(!grid.try_set(IVec2::new(0, 0), a));
        assert!(!grid.try_set(IVec2::new(5, 5), a));
    }

    #[test]
    fn walls_never_overwrite_labels() {
        let mut grid = Grid::new(2, 2);
        let cell = IVec2::new(1, 0);
        grid.try_set(cell, RegionId::FIRST);
        assert!(!grid.set_wall(cell));
        assert_eq!(grid.get(cell), RegionId::FIRST.code());
    }

    #[test]
    fn region_ids_reject_reserved_codes() {
        assert!(RegionId::new(EMPTY).is_none());
        assert!(RegionId::new(WALL).is_none());
        assert_eq!(RegionId::new(7).map(RegionId::code), Some(7));
        assert!(RegionId::new(CellCode::MAX).unwrap().next().is_none());
    }

    #[test]
    fn text_rows_map_to_walls() {
        let grid = Grid::from_rows(&["###", "#.#", "###"]);
        assert_eq!(grid.count(WALL), 8);
        assert!(grid.is_empty_cell(IVec2::new(1, 1)));
    }
}
