//! Per-tileset tile registry.
//!
//! Tracks every tile from load request to unload: submitted to the worker
//! pipeline, committed when its result arrives, released on unload. An unload
//! that arrives before the commit simply drops the pending payload when it
//! shows up.
//!
//! Dropping a streamer without [`TileStreamer::teardown`] stops its workers and
//! drops every committed tile; their pool slots go back to the manager on its
//! next acquire or the next [`TileStreamer::update`] of any tileset.

use std::fmt;

use crossbeam_channel::Receiver;
use glam::DMat4;
use rustc_hash::FxHashMap;
use strata_config::StreamingConfig;
use strata_content::{ImageData, TileContent};
use strata_coords::CoordinateEvent;
use strata_scene::SceneBackend;

use crate::bridge::{RenderResourcesBridge, TileRenderResources, TilesetOptions};
use crate::context::StreamingContext;
use crate::error::BridgeError;
use crate::pipeline::{TilePipeline, TileTask};

/// Tile identifier assigned by the tile selection collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey(pub u64);

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileStatus {
    /// Submitted to the pipeline, not yet committed.
    Loading,
    /// Committed; resources live in the backend.
    Ready,
}

enum TileEntry {
    Loading { version: u64 },
    Ready(TileRenderResources),
}

/// What one [`TileStreamer::update`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub committed: usize,
    /// Results for tiles that were unloaded or reloaded meanwhile.
    pub discarded: usize,
    pub failed: usize,
    pub transforms_pushed: usize,
}

pub struct TileStreamer {
    bridge: RenderResourcesBridge,
    pipeline: TilePipeline,
    tiles: FxHashMap<TileKey, TileEntry>,
    next_version: u64,
    coordinate_events: Receiver<CoordinateEvent>,
}

impl TileStreamer {
    pub fn new(
        ctx: &mut StreamingContext,
        options: TilesetOptions,
        worker_count: usize,
        budget: usize,
    ) -> Self {
        let bridge = RenderResourcesBridge::new(ctx, options);
        let pipeline = TilePipeline::new(worker_count, budget, bridge.prepare_options());
        Self {
            bridge,
            pipeline,
            tiles: FxHashMap::default(),
            next_version: 0,
            coordinate_events: ctx.coordinates_mut().subscribe(),
        }
    }

    pub fn from_config(
        ctx: &mut StreamingContext,
        options: TilesetOptions,
        config: &StreamingConfig,
    ) -> Self {
        Self::new(
            ctx,
            options,
            config.resolved_worker_count(),
            config.in_flight_budget,
        )
    }

    pub fn bridge(&self) -> &RenderResourcesBridge {
        &self.bridge
    }

    pub fn tileset_id(&self) -> i64 {
        self.bridge.tileset_id()
    }

    /// Queue a tile for background preparation.
    ///
    /// Returns `false` when the tile is already committed or the pipeline
    /// budget is used up. Reloading a tile that is still loading supersedes
    /// the earlier request.
    pub fn request_load(&mut self, key: TileKey, content: TileContent, transform: DMat4) -> bool {
        if let Some(TileEntry::Ready(_)) = self.tiles.get(&key) {
            return false;
        }
        let version = self.next_version;
        let task = TileTask {
            key,
            version,
            content,
            transform,
        };
        if !self.pipeline.submit(task) {
            tracing::debug!(tile = %key, "pipeline budget exhausted; load deferred");
            return false;
        }
        self.next_version += 1;
        self.tiles.insert(key, TileEntry::Loading { version });
        true
    }

    /// Forget a tile. A committed tile releases its resources; a loading one
    /// is cancelled.
    pub fn request_unload(
        &mut self,
        key: TileKey,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        match self.tiles.remove(&key) {
            Some(TileEntry::Loading { version }) => {
                tracing::trace!(tile = %key, version, "cancelled pending load");
                Ok(())
            }
            Some(TileEntry::Ready(resources)) => self.bridge.release(resources, ctx, backend),
            None => Err(BridgeError::UnknownTile(key)),
        }
    }

    /// Per-frame main-thread work: return slots of dropped handles, commit
    /// finished loads, then refresh transforms of every committed tile.
    pub fn update(
        &mut self,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        ctx.resources().release_dropped_handles(backend);

        for result in self.pipeline.drain_results() {
            let current = matches!(
                self.tiles.get(&result.key),
                Some(TileEntry::Loading { version }) if *version == result.version
            );
            if !current {
                report.discarded += 1;
                continue;
            }
            match self.bridge.commit_on_main_thread(result.pending, ctx, backend) {
                Ok(resources) => {
                    self.tiles.insert(result.key, TileEntry::Ready(resources));
                    report.committed += 1;
                }
                Err(err) => {
                    tracing::warn!(tile = %result.key, %err, "tile not renderable this frame");
                    self.tiles.remove(&result.key);
                    report.failed += 1;
                }
            }
        }

        if let Some(event) = self.coordinate_events.try_iter().last() {
            tracing::debug!(
                tileset_id = self.bridge.tileset_id(),
                revision = event.revision,
                "origin changed; refreshing tile transforms"
            );
        }
        report.transforms_pushed = self.refresh_transforms(ctx, backend);
        report
    }

    fn refresh_transforms(
        &mut self,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> usize {
        let global_to_local = ctx.coordinates().global_to_local();
        let mut pushed = 0;
        for (key, entry) in &mut self.tiles {
            let TileEntry::Ready(resources) = entry else {
                continue;
            };
            match resources.refresh_transforms(global_to_local, backend) {
                Ok(count) => pushed += count,
                Err(err) => tracing::warn!(tile = %key, %err, "transform refresh failed"),
            }
        }
        pushed
    }

    pub fn set_visible(
        &mut self,
        key: TileKey,
        visible: bool,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        let resources = match self.tiles.get_mut(&key) {
            Some(TileEntry::Ready(resources)) => resources,
            _ => return Err(BridgeError::UnknownTile(key)),
        };
        self.bridge.set_tile_visible(resources, visible, backend)
    }

    pub fn attach_imagery(
        &mut self,
        key: TileKey,
        image: &ImageData,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        let resources = match self.tiles.get_mut(&key) {
            Some(TileEntry::Ready(resources)) => resources,
            _ => return Err(BridgeError::UnknownTile(key)),
        };
        self.bridge.attach_imagery(resources, image, ctx, backend)
    }

    pub fn detach_imagery(
        &mut self,
        key: TileKey,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<bool, BridgeError> {
        let resources = match self.tiles.get_mut(&key) {
            Some(TileEntry::Ready(resources)) => resources,
            _ => return Err(BridgeError::UnknownTile(key)),
        };
        self.bridge.detach_imagery(resources, ctx, backend)
    }

    pub fn status(&self, key: TileKey) -> Option<TileStatus> {
        self.tiles.get(&key).map(|entry| match entry {
            TileEntry::Loading { .. } => TileStatus::Loading,
            TileEntry::Ready(_) => TileStatus::Ready,
        })
    }

    pub fn tile(&self, key: TileKey) -> Option<&TileRenderResources> {
        match self.tiles.get(&key) {
            Some(TileEntry::Ready(resources)) => Some(resources),
            _ => None,
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.tiles
            .values()
            .filter(|entry| matches!(entry, TileEntry::Ready(_)))
            .count()
    }

    pub fn loading_count(&self) -> usize {
        self.tiles.len() - self.loaded_count()
    }

    /// Stop the workers and release every committed tile of the tileset.
    pub fn teardown(
        mut self,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        self.pipeline.shutdown();
        let mut first_error = None;
        let mut released = 0;
        for (_, entry) in self.tiles.drain() {
            if let TileEntry::Ready(resources) = entry {
                released += 1;
                if let Err(err) = self.bridge.release(resources, ctx, backend)
                    && first_error.is_none()
                {
                    first_error = Some(err);
                }
            }
        }
        tracing::debug!(tileset_id = self.bridge.tileset_id(), released, "tileset torn down");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
