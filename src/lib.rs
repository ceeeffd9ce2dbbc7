//! Streaming procedural terrain.
//!
//! Height maps are generated from layered Perlin noise on a worker pool,
//! meshed at several levels of detail and handed back to the thread that
//! ticks the [`ChunkGrid`]. Mesh construction and the engine object model are
//! supplied by the host through [`MeshBuilder`] and [`TerrainSink`].

pub mod chunk;
pub mod chunk_manager;
pub mod debug_log;
pub mod error;
pub mod height_map;
pub mod lod;
pub mod mesh_builder;
pub mod noise_field;
pub mod task_dispatcher;
pub mod terrain_settings;

pub use chunk::{ChunkCoord, ChunkEvent, ChunkState, ColliderState, LiveChunks, TerrainChunk};
pub use chunk_manager::{ChunkGrid, GridStats, VisibilityChange};
pub use error::TerrainError;
pub use height_map::{generate_height_map, HeightMap, HeightMapSettings};
pub use lod::{DetailLevels, LodInfo};
pub use mesh_builder::{MeshBuilder, TerrainSink};
pub use noise_field::{NoiseField, NoiseMap, NoiseSettings, NormalizeMode};
pub use task_dispatcher::{DispatcherStats, TaskDispatcher};
pub use terrain_settings::{MeshSettings, TerrainConfig, TerrainSettings};
