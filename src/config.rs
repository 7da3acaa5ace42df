// Configuration file, 1 unit = 1 grid cell
// This controls the demo's tunables and the speed tier tables

use bevy::prelude::*;

// World size in cells; the grid gets one extra row/column for the closing border
pub const WORLD_SIZE_X: i32 = 1000;
pub const WORLD_SIZE_Z: i32 = 1000;

pub const INITIAL_SEED: u64 = 1512086461918454205;

// Object pools
pub const POOL_SOFT_CAPACITY: usize = 10_000;  // preallocated slots
pub const POOL_HARD_CAPACITY: usize = 100_000; // warn once past this many live objects

// Propagation
pub const REGION_HEIGHT_MIN: i32 = 20;
pub const REGION_HEIGHT_MAX: i32 = 100;  // exclusive
pub const INITIAL_LAUNCHES: usize = 5;   // regions started together when growth begins
pub const COOLDOWN_MARGIN: f32 = 0.5;    // seconds past the fade before a region is cast
pub const REGION_CHECK_INTERVAL: f32 = 0.1;
pub const ROW_CHECK_INTERVAL: f32 = 0.05;
pub const ROW_BATCH_INTERVAL: f32 = 0.5;
pub const COMPLETION_CHECK_INTERVAL: f32 = 0.5;

// Aggregation
pub const ROW_SETTLE_DELAY: f32 = 1.0;     // seconds between a row closing and its merge
pub const ROW_BATCH_THRESHOLD: usize = 25; // merged rows per region before they are baked together
pub const CHUNK_SIZE: f32 = 95.0;
pub const CHUNK_CHECK_INTERVAL: f32 = 0.1;

// Contour and cap sampling
pub const CONTOUR_SHORT_RUN: i32 = 15;     // runs up to this long keep their endpoints only
pub const CONTOUR_RUN_SPACING: i32 = 20;   // spacing of kept points on longer runs
pub const CAP_SAMPLE_INTERVAL: f32 = 20.0;
pub const CAP_EDGE_PADDING: f32 = 10.0;
pub const MIN_BLOCK_VERTICES: usize = 100; // smaller casts are treated as noise

// Walls
pub const WALL_DRAWER_COUNT: usize = 40;
pub const WALL_DRAWER_SPACING: f32 = 25.0;
pub const WALL_DRAWER_TURN_SPEED: f32 = 90.0; // degrees per second toward the target heading
pub const WALL_DRAWER_MAX_ANGLE: f32 = 45.0;
pub const WALL_DRAWER_COOLDOWN_MIN: f32 = 0.5;
pub const WALL_DRAWER_COOLDOWN_MAX: f32 = 3.0;
pub const WALL_HEIGHT: f32 = 16.0;
pub const OUTER_WALLS_PER_TICK: usize = 30;
pub const WALL_FADE_STEPS: usize = 20;
pub const WALL_FADE_RATE: f32 = 20.0;       // fade steps per second
pub const WALL_COMBINE_DELAY: f32 = 3.0;    // seconds after drawing before every wall is baked together

// Cleanup
pub const DESTRUCTION_BATCH: usize = 100;

// Colours
pub const PALETTE_COUNT: usize = 100;
pub const PALETTE_STEPS: usize = 15;
pub const NEUTRAL_GREY: u8 = 222;

/// Global speed/quality tier. Each tier is a row of small lookup tables.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedTier {
    #[default]
    Normal,
    Fast,
    Dev,
}

impl SpeedTier {
    pub const ALL: [SpeedTier; 3] = [SpeedTier::Normal, SpeedTier::Fast, SpeedTier::Dev];

    pub fn label(self) -> &'static str {
        match self {
            SpeedTier::Normal => "Normal",
            SpeedTier::Fast => "Fast",
            SpeedTier::Dev => "Dev",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SpeedTier::Normal => SpeedTier::Fast,
            SpeedTier::Fast => SpeedTier::Dev,
            SpeedTier::Dev => SpeedTier::Normal,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            SpeedTier::Normal => SpeedTier::Dev,
            SpeedTier::Fast => SpeedTier::Normal,
            SpeedTier::Dev => SpeedTier::Fast,
        }
    }

    pub fn settings(self) -> TierSettings {
        match self {
            SpeedTier::Normal => TierSettings {
                propagation_steps: 300,
                fade_duration: 1.0,
                fade_steps: 15,
                drawer_speed: 79.0,
            },
            SpeedTier::Fast => TierSettings {
                propagation_steps: 480,
                fade_duration: 0.25,
                fade_steps: 5,
                drawer_speed: 200.0,
            },
            SpeedTier::Dev => TierSettings {
                propagation_steps: 1000,
                fade_duration: 0.1,
                fade_steps: 2,
                drawer_speed: 300.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierSettings {
    pub propagation_steps: usize, // cell expansions per fixed tick
    pub fade_duration: f32,       // seconds
    pub fade_steps: usize,        // distinct colours shown during a fade
    pub drawer_speed: f32,        // wall drawer units per second
}
