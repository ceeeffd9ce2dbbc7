//! Error types for terrain configuration and setup.
//!
//! Only construction-time problems are errors. Out-of-range noise parameters
//! are clamped in place, and failed generation tasks are logged and dropped
//! by the dispatcher rather than surfaced here.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TerrainError {
    /// The detail-level table has no entries.
    EmptyDetailLevels,
    /// Visible-distance thresholds must strictly increase; `index` is the first offender.
    DetailLevelsNotAscending { index: usize },
    /// A visible-distance threshold is NaN, infinite or not positive.
    InvalidDistanceThreshold { index: usize, threshold: f32 },
    /// A detail level names a mesh LOD the mesh settings cannot produce.
    UnsupportedLod { lod: u8, max: u8 },
    /// The collider LOD index does not point into the detail-level table.
    ColliderLodOutOfRange { index: usize, levels: usize },
    /// Mesh resolution or scale is unusable.
    InvalidMeshSettings(String),
    /// The worker pool could not be started.
    WorkerPool(String),
    /// Configuration text could not be parsed.
    Parse(String),
}

impl fmt::Display for TerrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerrainError::EmptyDetailLevels => write!(f, "Detail level table is empty"),
            TerrainError::DetailLevelsNotAscending { index } => write!(
                f,
                "Detail level {index} does not have a larger visible distance than the level before it"
            ),
            TerrainError::InvalidDistanceThreshold { index, threshold } => write!(
                f,
                "Detail level {index} has unusable visible distance {threshold}"
            ),
            TerrainError::UnsupportedLod { lod, max } => {
                write!(f, "LOD {lod} is not supported (max {max})")
            }
            TerrainError::ColliderLodOutOfRange { index, levels } => write!(
                f,
                "Collider LOD index {index} is out of range for {levels} detail levels"
            ),
            TerrainError::InvalidMeshSettings(msg) => write!(f, "Invalid mesh settings: {msg}"),
            TerrainError::WorkerPool(msg) => write!(f, "Worker pool error: {msg}"),
            TerrainError::Parse(msg) => write!(f, "Config parse error: {msg}"),
        }
    }
}

impl std::error::Error for TerrainError {}

impl From<toml::de::Error> for TerrainError {
    fn from(e: toml::de::Error) -> Self {
        TerrainError::Parse(e.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for TerrainError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        TerrainError::WorkerPool(e.to_string())
    }
}
