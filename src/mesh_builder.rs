//! Interfaces to the engine-side collaborators.
//!
//! Triangle construction and the renderer/physics object model live outside
//! this crate. The streaming core only calls through these traits.

use std::sync::Arc;

use crate::chunk::ChunkCoord;
use crate::height_map::HeightMap;

/// Builds a renderable mesh from a height map at a given LOD.
/// Called from worker threads, so implementations must be pure and thread-safe.
pub trait MeshBuilder: Send + Sync + 'static {
    type Mesh: Send + Sync + 'static;

    fn build(&self, height_map: &HeightMap, lod: u8) -> Self::Mesh;
}

/// Receives the side effects the streaming core decides on.
/// Only ever called from the thread that ticks the grid.
pub trait TerrainSink<M> {
    /// Show `mesh` as the chunk's visible surface.
    fn set_mesh(&mut self, coord: ChunkCoord, lod: u8, mesh: &Arc<M>);
    /// Use `mesh` as the chunk's collision surface.
    fn set_collider(&mut self, coord: ChunkCoord, mesh: &Arc<M>);
    fn set_active(&mut self, coord: ChunkCoord, active: bool);
}

/// Sink for hosts that only consume visibility subscriptions.
impl<M> TerrainSink<M> for () {
    fn set_mesh(&mut self, _coord: ChunkCoord, _lod: u8, _mesh: &Arc<M>) {}
    fn set_collider(&mut self, _coord: ChunkCoord, _mesh: &Arc<M>) {}
    fn set_active(&mut self, _coord: ChunkCoord, _active: bool) {}
}
