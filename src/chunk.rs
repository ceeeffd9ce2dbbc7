//! Per-chunk streaming state.
//!
//! A chunk waits for its height map, then picks a display LOD from the
//! viewer distance every update. It only switches to a LOD whose mesh is
//! already built; otherwise it keeps the current mesh and requests the new one
//! once. The collision surface is tracked separately and frozen the first time
//! the viewer comes close enough.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::height_map::{generate_height_map, HeightMap};
use crate::mesh_builder::MeshBuilder;
use crate::task_dispatcher::TaskDispatcher;
use crate::terrain_settings::TerrainSettings;

/// Viewer must be within this distance of a chunk's edge before its collider is set.
pub const COLLIDER_GENERATION_DISTANCE_THRESHOLD: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk whose center is nearest to a world position
    pub fn from_world(position: [f32; 2], chunk_size: f32) -> Self {
        Self::new(
            (position[0] / chunk_size).round() as i32,
            (position[1] / chunk_size).round() as i32,
        )
    }

    pub fn world_center(&self, chunk_size: f32) -> [f32; 2] {
        [self.x as f32 * chunk_size, self.y as f32 * chunk_size]
    }
}

/// Axis-aligned square around a chunk center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkBounds {
    pub center: [f32; 2],
    pub half_size: f32,
}

impl ChunkBounds {
    pub fn new(center: [f32; 2], size: f32) -> Self {
        Self {
            center,
            half_size: size / 2.0,
        }
    }

    /// Squared distance from `point` to the nearest point of the square (0 inside).
    pub fn sqr_distance(&self, point: [f32; 2]) -> f32 {
        let dx = ((point[0] - self.center[0]).abs() - self.half_size).max(0.0);
        let dy = ((point[1] - self.center[1]).abs() - self.half_size).max(0.0);
        dx * dx + dy * dy
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Created,
    /// Height map task submitted, result not delivered yet
    HeightRequested,
    HeightReady,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColliderState {
    NotRequested,
    Requested,
    /// Terminal; the collision surface is never rebuilt
    Set,
}

/// Changes a chunk reports back to its grid.
pub enum ChunkEvent<M> {
    VisibilityChanged {
        coord: ChunkCoord,
        visible: bool,
    },
    MeshChanged {
        coord: ChunkCoord,
        lod: u8,
        mesh: Arc<M>,
    },
    ColliderSet {
        coord: ChunkCoord,
        mesh: Arc<M>,
    },
}

/// Cache slot for one detail level. Once built it stays built.
pub struct LodMesh<M> {
    lod: u8,
    requested: bool,
    mesh: Option<Arc<M>>,
}

impl<M> LodMesh<M> {
    fn new(lod: u8) -> Self {
        Self {
            lod,
            requested: false,
            mesh: None,
        }
    }

    pub fn lod(&self) -> u8 {
        self.lod
    }

    pub fn has_requested_mesh(&self) -> bool {
        self.requested
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    pub fn mesh(&self) -> Option<&Arc<M>> {
        self.mesh.as_ref()
    }
}

/// Everything a chunk needs from its owner, shared by all chunks of one grid.
pub struct ChunkServices<M> {
    pub settings: Arc<TerrainSettings>,
    pub builder: Arc<dyn MeshBuilder<Mesh = M>>,
    pub dispatcher: TaskDispatcher<LiveChunks<M>>,
    pub events: Sender<ChunkEvent<M>>,
    next_chunk_id: AtomicU64,
}

impl<M> ChunkServices<M> {
    pub fn new(
        settings: Arc<TerrainSettings>,
        builder: Arc<dyn MeshBuilder<Mesh = M>>,
        dispatcher: TaskDispatcher<LiveChunks<M>>,
        events: Sender<ChunkEvent<M>>,
    ) -> Self {
        Self {
            settings,
            builder,
            dispatcher,
            events,
            next_chunk_id: AtomicU64::new(0),
        }
    }

    /// Ids are never reused, so a chunk recreated at an old coordinate gets a new one.
    fn allocate_chunk_id(&self) -> u64 {
        self.next_chunk_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Chunks keyed by coordinate plus the viewer position for the current tick.
/// This is the context completions receive when the dispatcher is drained.
pub struct LiveChunks<M> {
    chunks: HashMap<ChunkCoord, TerrainChunk<M>>,
    viewer: [f32; 2],
}

impl<M> Default for LiveChunks<M> {
    fn default() -> Self {
        Self {
            chunks: HashMap::new(),
            viewer: [0.0, 0.0],
        }
    }
}

impl<M> LiveChunks<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewer(&self) -> [f32; 2] {
        self.viewer
    }

    pub fn set_viewer(&mut self, viewer: [f32; 2]) {
        self.viewer = viewer;
    }

    pub fn get(&self, coord: &ChunkCoord) -> Option<&TerrainChunk<M>> {
        self.chunks.get(coord)
    }

    pub fn get_mut(&mut self, coord: &ChunkCoord) -> Option<&mut TerrainChunk<M>> {
        self.chunks.get_mut(coord)
    }

    pub fn contains(&self, coord: &ChunkCoord) -> bool {
        self.chunks.contains_key(coord)
    }

    pub fn insert(&mut self, chunk: TerrainChunk<M>) -> &mut TerrainChunk<M> {
        match self.chunks.entry(chunk.coord) {
            Entry::Occupied(mut entry) => {
                entry.insert(chunk);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(chunk),
        }
    }

    pub fn remove(&mut self, coord: &ChunkCoord) -> Option<TerrainChunk<M>> {
        self.chunks.remove(coord)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TerrainChunk<M>> {
        self.chunks.values()
    }
}

pub struct TerrainChunk<M> {
    id: u64,
    coord: ChunkCoord,
    sample_center: [f32; 2],
    bounds: ChunkBounds,
    state: ChunkState,
    height_map: Option<Arc<HeightMap>>,
    lod_meshes: Vec<LodMesh<M>>,
    previous_lod_index: Option<usize>,
    visible: bool,
    collider: ColliderState,
    services: Arc<ChunkServices<M>>,
}

impl<M: Send + Sync + 'static> TerrainChunk<M> {
    pub fn new(coord: ChunkCoord, services: Arc<ChunkServices<M>>) -> Self {
        let settings = &services.settings;
        let world_size = settings.chunk_world_size();
        let position = coord.world_center(world_size);
        let sample_center = [
            position[0] / settings.mesh.mesh_scale,
            position[1] / settings.mesh.mesh_scale,
        ];
        let lod_meshes = settings
            .detail_levels
            .iter()
            .map(|level| LodMesh::new(level.lod))
            .collect();

        Self {
            id: services.allocate_chunk_id(),
            coord,
            sample_center,
            bounds: ChunkBounds::new(position, world_size),
            state: ChunkState::Created,
            height_map: None,
            lod_meshes,
            previous_lod_index: None,
            visible: false,
            collider: ColliderState::NotRequested,
            services,
        }
    }

    /// Request the height map. Only the first call has an effect.
    pub fn load(&mut self) {
        if self.state != ChunkState::Created {
            return;
        }
        self.state = ChunkState::HeightRequested;

        let settings = Arc::clone(&self.services.settings);
        let sample_center = self.sample_center;
        let coord = self.coord;
        let id = self.id;

        self.services.dispatcher.submit(
            move || {
                let verts = settings.mesh.verts_per_line;
                Arc::new(generate_height_map(
                    verts,
                    verts,
                    &settings.height_map,
                    sample_center,
                ))
            },
            move |height_map, live: &mut LiveChunks<M>| {
                let viewer = live.viewer;
                match live.chunks.get_mut(&coord) {
                    Some(chunk) if chunk.id == id => {
                        chunk.on_height_map_received(height_map, viewer)
                    }
                    _ => log::trace!("Dropping height map for evicted chunk {coord:?}"),
                }
            },
        );
    }

    fn on_height_map_received(&mut self, height_map: Arc<HeightMap>, viewer: [f32; 2]) {
        if self.height_map.is_some() {
            return;
        }
        self.height_map = Some(height_map);
        self.state = ChunkState::HeightReady;
        self.update_terrain_chunk(viewer);
    }

    /// Re-evaluate visibility and the display LOD for the current viewer position.
    pub fn update_terrain_chunk(&mut self, viewer: [f32; 2]) {
        if self.state != ChunkState::HeightReady {
            return;
        }

        let settings = Arc::clone(&self.services.settings);
        let levels = &settings.detail_levels;
        let distance = self.bounds.sqr_distance(viewer).sqrt();
        let was_visible = self.visible;
        let visible = distance <= levels.max_view_distance();

        if visible {
            let lod_index = levels.lod_index_for_distance(distance);
            if self.previous_lod_index != Some(lod_index) {
                let slot = &self.lod_meshes[lod_index];
                let lod = slot.lod;
                if let Some(mesh) = slot.mesh.clone() {
                    self.previous_lod_index = Some(lod_index);
                    self.emit(ChunkEvent::MeshChanged {
                        coord: self.coord,
                        lod,
                        mesh,
                    });
                } else if !slot.requested {
                    self.request_lod_mesh(lod_index);
                }
            }
        }

        if was_visible != visible {
            self.visible = visible;
            self.emit(ChunkEvent::VisibilityChanged {
                coord: self.coord,
                visible,
            });
        }
    }

    /// Request the collider mesh when in range and freeze it once the viewer is close.
    pub fn update_collision_mesh(&mut self, viewer: [f32; 2]) {
        if self.collider == ColliderState::Set || self.state != ChunkState::HeightReady {
            return;
        }

        let settings = Arc::clone(&self.services.settings);
        let index = settings.collider_lod_index;
        let sqr_distance = self.bounds.sqr_distance(viewer);

        if sqr_distance < settings.collider_lod().sqr_visible_distance_threshold() {
            if !self.lod_meshes[index].requested {
                self.request_lod_mesh(index);
            }
            if self.collider == ColliderState::NotRequested {
                self.collider = ColliderState::Requested;
            }
        }

        let near = COLLIDER_GENERATION_DISTANCE_THRESHOLD * COLLIDER_GENERATION_DISTANCE_THRESHOLD;
        if sqr_distance < near {
            if let Some(mesh) = self.lod_meshes[index].mesh.clone() {
                self.collider = ColliderState::Set;
                self.emit(ChunkEvent::ColliderSet {
                    coord: self.coord,
                    mesh,
                });
            }
        }
    }

    fn emit(&self, event: ChunkEvent<M>) {
        if self.services.events.send(event).is_err() {
            log::trace!("Grid receiver gone, event from chunk {:?} dropped", self.coord);
        }
    }

    fn request_lod_mesh(&mut self, index: usize) {
        let Some(height_map) = self.height_map.clone() else {
            return;
        };
        let slot = &mut self.lod_meshes[index];
        slot.requested = true;

        let lod = slot.lod;
        let coord = self.coord;
        let id = self.id;
        let builder = Arc::clone(&self.services.builder);

        self.services.dispatcher.submit(
            move || Arc::new(builder.build(&height_map, lod)),
            move |mesh, live: &mut LiveChunks<M>| {
                let viewer = live.viewer;
                match live.chunks.get_mut(&coord) {
                    Some(chunk) if chunk.id == id => {
                        chunk.on_lod_mesh_received(index, mesh, viewer)
                    }
                    _ => log::trace!("Dropping LOD {lod} mesh for evicted chunk {coord:?}"),
                }
            },
        );
    }

    fn on_lod_mesh_received(&mut self, index: usize, mesh: Arc<M>, viewer: [f32; 2]) {
        let slot = &mut self.lod_meshes[index];
        if slot.mesh.is_none() {
            slot.mesh = Some(mesh);
        }

        self.update_terrain_chunk(viewer);
        if index == self.services.settings.collider_lod_index {
            self.update_collision_mesh(viewer);
        }
    }

    /// Unique per instance, unlike `coord`
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn sample_center(&self) -> [f32; 2] {
        self.sample_center
    }

    pub fn bounds(&self) -> &ChunkBounds {
        &self.bounds
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn height_map(&self) -> Option<&Arc<HeightMap>> {
        self.height_map.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn previous_lod_index(&self) -> Option<usize> {
        self.previous_lod_index
    }

    pub fn collider_state(&self) -> ColliderState {
        self.collider
    }

    pub fn lod_mesh(&self, index: usize) -> Option<&LodMesh<M>> {
        self.lod_meshes.get(index)
    }
}
