//! Chunk lifecycle management around a moving viewer

use std::collections::HashSet;
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::chunk::{
    ChunkCoord, ChunkEvent, ChunkServices, ChunkState, ColliderState, LiveChunks, TerrainChunk,
};
use crate::error::TerrainError;
use crate::mesh_builder::{MeshBuilder, TerrainSink};
use crate::task_dispatcher::TaskDispatcher;
use crate::terrain_settings::{TerrainConfig, TerrainSettings};

/// Published once per visible/hidden transition of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilityChange {
    pub coord: ChunkCoord,
    pub visible: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridStats {
    pub total: usize,
    pub visible: usize,
    /// Chunks still waiting on their height map
    pub awaiting_height: usize,
    pub colliders_set: usize,
}

pub struct ChunkGrid<M, S> {
    settings: Arc<TerrainSettings>,
    services: Arc<ChunkServices<M>>,
    dispatcher: TaskDispatcher<LiveChunks<M>>,
    live: LiveChunks<M>,
    visible: Vec<ChunkCoord>,
    event_rx: Receiver<ChunkEvent<M>>,
    visibility_listeners: Vec<Sender<VisibilityChange>>,
    sink: S,
    last_scan_viewer: Option<[f32; 2]>,
}

impl<M, S> ChunkGrid<M, S>
where
    M: Send + Sync + 'static,
    S: TerrainSink<M>,
{
    pub fn new(
        config: TerrainConfig,
        builder: Arc<dyn MeshBuilder<Mesh = M>>,
        dispatcher: TaskDispatcher<LiveChunks<M>>,
        sink: S,
    ) -> Result<Self, TerrainError> {
        let settings = Arc::new(config.validated()?);
        let (event_tx, event_rx) = unbounded();

        let services = Arc::new(ChunkServices::new(
            Arc::clone(&settings),
            builder,
            dispatcher.clone(),
            event_tx,
        ));

        log::debug!(
            "Chunk grid ready: chunk size {}, view distance {}, {} chunks each way",
            settings.chunk_world_size(),
            settings.detail_levels.max_view_distance(),
            settings.chunks_visible_in_view_distance()
        );

        Ok(Self {
            settings,
            services,
            dispatcher,
            live: LiveChunks::new(),
            visible: Vec::new(),
            event_rx,
            visibility_listeners: Vec::new(),
            sink,
            last_scan_viewer: None,
        })
    }

    /// Advance one frame. Returns how many completions were delivered.
    pub fn tick(&mut self, viewer: [f32; 2]) -> usize {
        self.live.set_viewer(viewer);
        let delivered = self.dispatcher.drain(&mut self.live);
        self.apply_events();

        for coord in &self.visible {
            if let Some(chunk) = self.live.get_mut(coord) {
                chunk.update_collision_mesh(viewer);
            }
        }

        if self.should_rescan(viewer) {
            self.last_scan_viewer = Some(viewer);
            self.update_visible_chunks(viewer);
        }
        self.apply_events();

        delivered
    }

    fn should_rescan(&self, viewer: [f32; 2]) -> bool {
        let Some(last) = self.last_scan_viewer else {
            return true;
        };
        let threshold = self.settings.viewer_move_threshold;
        if threshold <= 0.0 {
            return true;
        }
        let dx = viewer[0] - last[0];
        let dy = viewer[1] - last[1];
        dx * dx + dy * dy > threshold * threshold
    }

    fn update_visible_chunks(&mut self, viewer: [f32; 2]) {
        let mut already_updated: HashSet<ChunkCoord> = HashSet::with_capacity(self.visible.len());
        for coord in self.visible.iter().rev() {
            already_updated.insert(*coord);
            if let Some(chunk) = self.live.get_mut(coord) {
                chunk.update_terrain_chunk(viewer);
            }
        }

        let center = ChunkCoord::from_world(viewer, self.settings.chunk_world_size());
        let radius = self.settings.chunks_visible_in_view_distance();

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let coord = ChunkCoord::new(center.x + dx, center.y + dy);
                if already_updated.contains(&coord) {
                    continue;
                }
                match self.live.get_mut(&coord) {
                    Some(chunk) => chunk.update_terrain_chunk(viewer),
                    None => {
                        log::debug!("Creating chunk {coord:?}");
                        let chunk = TerrainChunk::new(coord, Arc::clone(&self.services));
                        self.live.insert(chunk).load();
                    }
                }
            }
        }
    }

    fn apply_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                ChunkEvent::VisibilityChanged { coord, visible } => {
                    self.on_visibility_changed(coord, visible);
                }
                ChunkEvent::MeshChanged { coord, lod, mesh } => {
                    self.sink.set_mesh(coord, lod, &mesh);
                }
                ChunkEvent::ColliderSet { coord, mesh } => {
                    self.sink.set_collider(coord, &mesh);
                }
            }
        }
    }

    fn on_visibility_changed(&mut self, coord: ChunkCoord, visible: bool) {
        if visible {
            if !self.live.contains(&coord) {
                return;
            }
            if !self.visible.contains(&coord) {
                self.visible.push(coord);
            }
        } else {
            self.visible.retain(|c| *c != coord);
        }

        self.sink.set_active(coord, visible);
        let change = VisibilityChange { coord, visible };
        self.visibility_listeners
            .retain(|listener| listener.send(change).is_ok());
    }

    /// Receive every future visibility transition. Dropping the receiver unsubscribes.
    pub fn subscribe_visibility(&mut self) -> Receiver<VisibilityChange> {
        let (tx, rx) = unbounded();
        self.visibility_listeners.push(tx);
        rx
    }

    /// Drop a chunk. Results still in flight for it are discarded on delivery.
    pub fn evict(&mut self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.live.remove(&coord) else {
            return false;
        };
        if chunk.is_visible() {
            self.on_visibility_changed(coord, false);
        }
        true
    }

    pub fn chunk(&self, coord: &ChunkCoord) -> Option<&TerrainChunk<M>> {
        self.live.get(coord)
    }

    pub fn visible_chunks(&self) -> &[ChunkCoord] {
        &self.visible
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats {
            total: self.live.len(),
            visible: self.visible.len(),
            ..GridStats::default()
        };
        for chunk in self.live.iter() {
            if chunk.state() == ChunkState::HeightRequested {
                stats.awaiting_height += 1;
            }
            if chunk.collider_state() == ColliderState::Set {
                stats.colliders_set += 1;
            }
        }
        stats
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &TaskDispatcher<LiveChunks<M>> {
        &self.dispatcher
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
