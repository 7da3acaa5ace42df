//! Error types for the casting pipeline.

use thiserror::Error;

use crate::systems::grid::RegionId;

/// Failures surfaced by mesh casting and block export.
///
/// None of these abort the demo: a failed region is logged and skipped, a failed
/// export is reported and the simulation carries on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// The grid holds no cells for a region that was handed over for casting.
    #[error("region {region} has no cells to trace")]
    EmptyContour { region: RegionId },

    /// The traced boundary cannot enclose any area.
    #[error("region {region} traced only {points} contour points")]
    DegenerateContour { region: RegionId, points: usize },

    /// The cast mesh is below the noise threshold.
    #[error("region {region} cast {vertices} vertices, minimum is {minimum}")]
    TooFewVertices {
        region: RegionId,
        vertices: usize,
        minimum: usize,
    },

    /// The discovered region count ran past the representable id range.
    #[error("region ids exhausted after {discovered} regions")]
    RegionIdsExhausted { discovered: usize },

    /// Writing an export file failed.
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for pipeline operations.
pub type SimResult<T> = Result<T, SimError>;
