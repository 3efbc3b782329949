//! Shared state every tileset of one scene works against.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use strata_config::Config;
use strata_coords::CoordinateSystem;
use strata_resources::{ManagerSettings, ResourceError, ResourceManager};
use strata_scene::SceneBackend;

/// The resource manager, the coordinate system and id generators, passed by
/// reference to whatever needs them.
pub struct StreamingContext {
    resources: Arc<ResourceManager>,
    coordinates: CoordinateSystem,
    smooth_normals: bool,
    next_tileset_id: AtomicI64,
    next_tile_id: AtomicI64,
}

impl StreamingContext {
    pub fn new(
        resources: Arc<ResourceManager>,
        coordinates: CoordinateSystem,
        smooth_normals: bool,
    ) -> Self {
        Self {
            resources,
            coordinates,
            smooth_normals,
            next_tileset_id: AtomicI64::new(0),
            next_tile_id: AtomicI64::new(0),
        }
    }

    /// Build a manager from configuration, with a local coordinate system.
    pub fn from_config(
        config: &Config,
        backend: &mut dyn SceneBackend,
    ) -> Result<Self, ResourceError> {
        let manager = ResourceManager::new(ManagerSettings::from_config(config), backend)?;
        Ok(Self::new(
            Arc::new(manager),
            CoordinateSystem::default(),
            config.streaming.smooth_normals,
        ))
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn shared_resources(&self) -> Arc<ResourceManager> {
        Arc::clone(&self.resources)
    }

    pub fn coordinates(&self) -> &CoordinateSystem {
        &self.coordinates
    }

    pub fn coordinates_mut(&mut self) -> &mut CoordinateSystem {
        &mut self.coordinates
    }

    pub fn smooth_normals(&self) -> bool {
        self.smooth_normals
    }

    pub fn allocate_tileset_id(&self) -> i64 {
        self.next_tileset_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn allocate_tile_id(&self) -> i64 {
        self.next_tile_id.fetch_add(1, Ordering::Relaxed)
    }
}
