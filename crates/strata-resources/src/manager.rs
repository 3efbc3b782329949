//! Registry of pools and shared materials.
//!
//! Pools are created lazily, one per observed definition, and found again by
//! a linear scan comparing definitions for equality. Materials without
//! per-tile variation bypass the pools and are shared between tiles of the
//! same tileset through a reference count.
//!
//! All pool and shared-material state sits behind one mutex. Bulk backend
//! work (filling a new pool, creating a shared material) happens with the
//! lock released.
//!
//! Handles are returned with the `release_*` methods. A handle dropped
//! without release queues its claim on a channel instead; the queue is
//! drained by [`ResourceManager::release_dropped_handles`], which every
//! acquire runs first, so slots are never lost to a forgotten handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use glam::Vec3;
use rand::Rng;
use strata_config::Config;
use strata_content::{FeaturesInfo, ImageData, MaterialInfo, Primitive, PropertyDescriptor};
use strata_scene::{ResourceId, ResourceKind, SceneBackend};

use crate::definition::{GeometryDefinition, MaterialDefinition, TilesetMaterialId};
use crate::error::ResourceError;
use crate::geometry::{Geometry, GeometryPool};
use crate::material::{Material, MaterialPool};
use crate::pool::{CreateContext, DefaultTextures, KeyedPool, PooledResource};
use crate::texture::{Texture, TexturePool};

/// Pooling policy of one resource kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolPolicy {
    /// When `false`, every acquire creates a standalone resource that is
    /// destroyed on release.
    pub enabled: bool,
    /// Slots created per pool. Pools never grow past this.
    pub initial_capacity: usize,
}

/// Everything the manager reads from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerSettings {
    pub geometry: PoolPolicy,
    pub material: PoolPolicy,
    pub texture: PoolPolicy,
    pub disable_materials: bool,
    pub disable_textures: bool,
    pub random_colors: bool,
}

impl ManagerSettings {
    /// Pool policies from `config.pools`, debug flags from `config.debug`.
    pub fn from_config(config: &Config) -> Self {
        let policy = |kind: &strata_config::PoolKindConfig| PoolPolicy {
            enabled: kind.enabled,
            initial_capacity: kind.initial_capacity as usize,
        };
        Self {
            geometry: policy(&config.pools.geometry),
            material: policy(&config.pools.material),
            texture: policy(&config.pools.texture),
            disable_materials: config.debug.disable_materials,
            disable_textures: config.debug.disable_textures,
            random_colors: config.debug.random_colors,
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Where a handle's resource came from, and so where it goes back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRef {
    /// Slot index in the pool whose definition equals the resource's.
    Pooled(usize),
    /// Reference-counted shared material.
    Shared,
    /// Created for this handle alone; destroyed on release.
    Unpooled,
}

/// A claim whose handle was dropped instead of released.
#[derive(Debug)]
enum DroppedClaim {
    Geometry {
        geometry: Geometry,
        slot: SlotRef,
        triangles: u64,
    },
    Material {
        material: Material,
        slot: SlotRef,
    },
    Texture {
        texture: Texture,
        slot: SlotRef,
    },
}

/// Exclusive claim on a geometry. Give it back with
/// [`ResourceManager::release_geometry`].
///
/// Dropping the handle instead queues the claim; the slot is returned on the
/// manager's next acquire or [`ResourceManager::release_dropped_handles`].
#[derive(Debug)]
pub struct GeometryHandle {
    geometry: Geometry,
    slot: SlotRef,
    triangles: u64,
    /// `None` once the claim has been released explicitly.
    dropped: Option<Sender<DroppedClaim>>,
}

impl GeometryHandle {
    /// The backend geometry. Only valid while the handle is held.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Pool slot the geometry came from, or [`SlotRef::Unpooled`].
    pub fn slot(&self) -> SlotRef {
        self.slot
    }

    pub fn resource_id(&self) -> ResourceId {
        self.geometry.resource_id()
    }

    /// Triangles counted against [`ResourceStatistics::triangles_loaded`]
    /// until release.
    pub fn triangle_count(&self) -> u64 {
        self.triangles
    }

    fn into_parts(mut self) -> (Geometry, SlotRef, u64) {
        self.dropped = None;
        (self.geometry.clone(), self.slot, self.triangles)
    }
}

impl Drop for GeometryHandle {
    fn drop(&mut self) {
        if let Some(dropped) = self.dropped.take() {
            let _ = dropped.send(DroppedClaim::Geometry {
                geometry: self.geometry.clone(),
                slot: self.slot,
                triangles: self.triangles,
            });
        }
    }
}

/// Claim on a material, exclusive unless [`SlotRef::Shared`].
///
/// Shared handles each hold one reference; the material is destroyed when the
/// last one is released. Dropped handles are queued like [`GeometryHandle`]s.
#[derive(Debug)]
pub struct MaterialHandle {
    material: Material,
    slot: SlotRef,
    dropped: Option<Sender<DroppedClaim>>,
}

impl MaterialHandle {
    /// The backend material. Shared materials must not be written per tile.
    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn slot(&self) -> SlotRef {
        self.slot
    }

    /// Whether other tiles of the tileset hold the same material.
    pub fn is_shared(&self) -> bool {
        self.slot == SlotRef::Shared
    }

    pub fn resource_id(&self) -> ResourceId {
        self.material.resource_id()
    }

    fn into_parts(mut self) -> (Material, SlotRef) {
        self.dropped = None;
        (self.material.clone(), self.slot)
    }
}

impl Drop for MaterialHandle {
    fn drop(&mut self) {
        if let Some(dropped) = self.dropped.take() {
            let _ = dropped.send(DroppedClaim::Material {
                material: self.material.clone(),
                slot: self.slot,
            });
        }
    }
}

/// Exclusive claim on a texture from the global texture pool.
#[derive(Debug)]
pub struct TextureHandle {
    texture: Texture,
    slot: SlotRef,
    dropped: Option<Sender<DroppedClaim>>,
}

impl TextureHandle {
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn slot(&self) -> SlotRef {
        self.slot
    }

    pub fn resource_id(&self) -> ResourceId {
        self.texture.resource_id()
    }

    fn into_parts(mut self) -> (Texture, SlotRef) {
        self.dropped = None;
        (self.texture.clone(), self.slot)
    }
}

impl Drop for TextureHandle {
    fn drop(&mut self) {
        if let Some(dropped) = self.dropped.take() {
            let _ = dropped.send(DroppedClaim::Texture {
                texture: self.texture.clone(),
                slot: self.slot,
            });
        }
    }
}

/// Inputs that decide which material a primitive gets.
#[derive(Clone, Copy, Debug)]
pub struct MaterialRequest<'a> {
    pub info: &'a MaterialInfo,
    pub features: &'a FeaturesInfo,
    /// Properties a style may read per feature.
    pub properties: &'a [PropertyDescriptor],
    /// Imagery layers to reserve. Non-zero makes the material per-tile.
    pub imagery_layer_count: u64,
    /// Shared materials are only shared within one tileset.
    pub tileset_id: i64,
    pub tileset_material: Option<TilesetMaterialId>,
}

/// Snapshot of pool occupancy. `*_loaded` counts pooled, unpooled and
/// shared resources currently held by tiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceStatistics {
    pub geometry_pools: usize,
    pub material_pools: usize,
    pub geometries_capacity: usize,
    pub geometries_loaded: usize,
    pub materials_capacity: usize,
    pub materials_loaded: usize,
    pub textures_capacity: usize,
    pub textures_loaded: usize,
    pub shared_materials: usize,
    pub triangles_loaded: u64,
}

#[derive(Debug)]
struct SharedMaterial {
    material: Material,
    info: MaterialInfo,
    tileset_id: i64,
    reference_count: u64,
}

#[derive(Debug, Default)]
struct UnpooledCounts {
    geometries: usize,
    materials: usize,
    textures: usize,
}

struct ManagerState {
    settings: ManagerSettings,
    geometry_pools: Vec<GeometryPool>,
    material_pools: Vec<MaterialPool>,
    texture_pool: Option<TexturePool>,
    shared_materials: Vec<SharedMaterial>,
    unpooled: UnpooledCounts,
    triangles_loaded: u64,
}

/// Pool lists reachable by definition.
trait PoolFamily: PooledResource + Sized {
    fn pools(state: &mut ManagerState) -> &mut Vec<KeyedPool<Self>>;
}

impl PoolFamily for Geometry {
    fn pools(state: &mut ManagerState) -> &mut Vec<KeyedPool<Self>> {
        &mut state.geometry_pools
    }
}

impl PoolFamily for Material {
    fn pools(state: &mut ManagerState) -> &mut Vec<KeyedPool<Self>> {
        &mut state.material_pools
    }
}

/// Create a resource outside any pool, reset and activated the way a pool
/// slot would be. Destroyed again if either hook fails.
fn create_standalone<T: PooledResource>(
    backend: &mut dyn SceneBackend,
    definition: &T::Definition,
    ctx: &CreateContext,
) -> Result<T, ResourceError> {
    let resource = T::create(backend, definition, ctx)?;
    let activated = resource
        .set_active(backend, false)
        .and_then(|()| resource.set_active(backend, true));
    if let Err(err) = activated {
        let _ = resource.destroy(backend);
        return Err(err.into());
    }
    Ok(resource)
}

/// Acquire from a pool, logging exhaustion.
fn acquire_logged<T: PooledResource>(
    pool: &mut KeyedPool<T>,
    backend: &mut dyn SceneBackend,
) -> Result<(usize, T), ResourceError> {
    pool.acquire(backend).inspect_err(|err| {
        if let ResourceError::PoolExhausted { kind, capacity } = err {
            tracing::error!(
                kind = kind.label(),
                pool_id = pool.pool_id(),
                capacity,
                "pool exhausted; tile will not render this frame"
            );
        }
    })
}

/// Owns every pool and shared material of a scene.
///
/// Acquire and release run on the main thread with the scene backend at
/// hand. The manager is `Sync` so it can sit in an `Arc` next to worker
/// threads, but workers never call it.
pub struct ResourceManager {
    state: Mutex<ManagerState>,
    default_textures: DefaultTextures,
    dropped_sender: Sender<DroppedClaim>,
    dropped_claims: Receiver<DroppedClaim>,
    next_pool_id: AtomicU64,
    next_geometry_id: AtomicU64,
    next_material_id: AtomicU64,
    next_texture_id: AtomicU64,
}

impl ResourceManager {
    /// Create the manager and its two default textures.
    ///
    /// No pools exist yet; each is created on the first acquire of its
    /// definition. Nothing is left in the backend if this fails.
    pub fn new(
        settings: ManagerSettings,
        backend: &mut dyn SceneBackend,
    ) -> Result<Self, ResourceError> {
        let white = Self::create_default_texture(backend, "/default_texture", [255; 4])?;
        let transparent = match Self::create_default_texture(
            backend,
            "/default_transparent_texture",
            [255, 255, 255, 0],
        ) {
            Ok(texture) => texture,
            Err(err) => {
                let _ = white.destroy(backend);
                return Err(err);
            }
        };
        let (dropped_sender, dropped_claims) = crossbeam_channel::unbounded();

        Ok(Self {
            state: Mutex::new(ManagerState {
                settings,
                geometry_pools: Vec::new(),
                material_pools: Vec::new(),
                texture_pool: None,
                shared_materials: Vec::new(),
                unpooled: UnpooledCounts::default(),
                triangles_loaded: 0,
            }),
            default_textures: DefaultTextures {
                white: white.resource_id(),
                transparent: transparent.resource_id(),
            },
            dropped_sender,
            dropped_claims,
            next_pool_id: AtomicU64::new(0),
            next_geometry_id: AtomicU64::new(0),
            next_material_id: AtomicU64::new(0),
            next_texture_id: AtomicU64::new(0),
        })
    }

    fn create_default_texture(
        backend: &mut dyn SceneBackend,
        name: &str,
        rgba: [u8; 4],
    ) -> Result<Texture, ResourceError> {
        let ctx = CreateContext {
            name: name.to_string(),
            default_textures: None,
        };
        let texture = Texture::create(backend, &(), &ctx)?;
        if let Err(err) = texture.set_image(backend, &ImageData::solid(1, 1, rgba)) {
            let _ = texture.destroy(backend);
            return Err(err.into());
        }
        Ok(texture)
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self, name: String) -> CreateContext {
        CreateContext {
            name,
            default_textures: Some(self.default_textures),
        }
    }

    /// Opaque white and transparent white 1x1 textures bound by material
    /// reset.
    pub fn default_textures(&self) -> DefaultTextures {
        self.default_textures
    }

    /// Current settings, including debug flags changed at runtime.
    pub fn settings(&self) -> ManagerSettings {
        self.state().settings.clone()
    }

    // -----------------------------------------------------------------------
    // Policy
    // -----------------------------------------------------------------------

    /// Whether a primitive gets a material at all.
    pub fn should_acquire_material(
        &self,
        primitive_has_material: bool,
        has_imagery: bool,
        tileset_material: Option<TilesetMaterialId>,
    ) -> bool {
        if self.state().settings.disable_materials {
            return false;
        }
        tileset_material.is_some() || has_imagery || primitive_has_material
    }

    /// A random color when debug coloring is on.
    pub fn debug_color(&self) -> Option<Vec3> {
        if !self.state().settings.random_colors {
            return None;
        }
        let mut rng = rand::thread_rng();
        Some(Vec3::new(
            rng.gen_range(0.0..1.0),
            rng.gen_range(0.0..1.0),
            rng.gen_range(0.0..1.0),
        ))
    }

    /// Switch geometry pooling on or off.
    ///
    /// Only allowed before the first geometry pool exists; afterwards this
    /// returns [`ResourceError::PolicyLocked`]. The same holds for every
    /// pooling and capacity setter below.
    pub fn set_geometry_pooling(&self, enabled: bool) -> Result<(), ResourceError> {
        self.update_policy(ResourceKind::Geometry, |p| p.enabled = enabled)
    }

    pub fn set_material_pooling(&self, enabled: bool) -> Result<(), ResourceError> {
        self.update_policy(ResourceKind::Material, |p| p.enabled = enabled)
    }

    pub fn set_texture_pooling(&self, enabled: bool) -> Result<(), ResourceError> {
        self.update_policy(ResourceKind::Texture, |p| p.enabled = enabled)
    }

    pub fn set_geometry_pool_initial_capacity(&self, capacity: usize) -> Result<(), ResourceError> {
        self.update_policy(ResourceKind::Geometry, |p| p.initial_capacity = capacity)
    }

    pub fn set_material_pool_initial_capacity(&self, capacity: usize) -> Result<(), ResourceError> {
        self.update_policy(ResourceKind::Material, |p| p.initial_capacity = capacity)
    }

    pub fn set_texture_pool_initial_capacity(&self, capacity: usize) -> Result<(), ResourceError> {
        self.update_policy(ResourceKind::Texture, |p| p.initial_capacity = capacity)
    }

    fn update_policy(
        &self,
        kind: ResourceKind,
        update: impl FnOnce(&mut PoolPolicy),
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let locked = match kind {
            ResourceKind::Geometry => !state.geometry_pools.is_empty(),
            ResourceKind::Material => !state.material_pools.is_empty(),
            ResourceKind::Texture => state.texture_pool.is_some(),
        };
        if locked {
            tracing::error!(kind = kind.label(), "pool policy changed after pools exist");
            return Err(ResourceError::PolicyLocked(kind));
        }
        let policy = match kind {
            ResourceKind::Geometry => &mut state.settings.geometry,
            ResourceKind::Material => &mut state.settings.material,
            ResourceKind::Texture => &mut state.settings.texture,
        };
        update(policy);
        Ok(())
    }

    /// Debug switch: tiles get no materials at all.
    pub fn set_disable_materials(&self, disable: bool) {
        self.state().settings.disable_materials = disable;
    }

    /// Debug switch: definitions ignore base color textures and imagery, so
    /// more materials become shareable.
    pub fn set_disable_textures(&self, disable: bool) {
        self.state().settings.disable_textures = disable;
    }

    /// Debug switch: see [`debug_color`](Self::debug_color).
    pub fn set_random_colors(&self, enabled: bool) {
        self.state().settings.random_colors = enabled;
    }

    // -----------------------------------------------------------------------
    // Acquire
    // -----------------------------------------------------------------------

    /// Find or create the pool for `definition` and take a slot from it.
    fn acquire_from_family<T: PoolFamily>(
        &self,
        definition: T::Definition,
        capacity: usize,
        backend: &mut dyn SceneBackend,
    ) -> Result<(usize, T), ResourceError> {
        {
            let mut state = self.state();
            if let Some(pool) = T::pools(&mut state)
                .iter_mut()
                .find(|pool| *pool.definition() == definition)
            {
                return acquire_logged(pool, backend);
            }
        }

        let pool_id = self.next_pool_id.fetch_add(1, Ordering::Relaxed);
        let mut pool = KeyedPool::<T>::new(
            backend,
            pool_id,
            definition,
            capacity,
            Some(self.default_textures),
        )?;

        let mut state = self.state();
        let pools = T::pools(&mut state);
        if let Some(existing) = pools
            .iter_mut()
            .find(|existing| existing.definition() == pool.definition())
        {
            pool.destroy_all(backend);
            return acquire_logged(existing, backend);
        }
        let acquired = acquire_logged(&mut pool, backend);
        pools.push(pool);
        acquired
    }

    /// Claim a geometry matching the primitive's structure.
    ///
    /// The first request for a definition creates its pool with the configured
    /// capacity. An exhausted pool logs at `error` and returns
    /// [`ResourceError::PoolExhausted`]; it never grows. The geometry comes
    /// back active but hidden, with no data written.
    pub fn acquire_geometry(
        &self,
        primitive: &Primitive,
        smooth_normals: bool,
        backend: &mut dyn SceneBackend,
    ) -> Result<GeometryHandle, ResourceError> {
        let definition = GeometryDefinition::new(primitive, smooth_normals);
        self.acquire_geometry_for(definition, primitive.triangle_count(), backend)
    }

    /// Acquire with a definition computed ahead of time, e.g. on a decode worker.
    pub fn acquire_geometry_for(
        &self,
        definition: GeometryDefinition,
        triangles: u64,
        backend: &mut dyn SceneBackend,
    ) -> Result<GeometryHandle, ResourceError> {
        self.release_dropped_handles(backend);
        let policy = self.state().settings.geometry;

        let (geometry, slot) = if policy.enabled {
            let (index, geometry) =
                self.acquire_from_family::<Geometry>(definition, policy.initial_capacity, backend)?;
            (geometry, SlotRef::Pooled(index))
        } else {
            let id = self.next_geometry_id.fetch_add(1, Ordering::Relaxed);
            let ctx = self.context(format!("/geometry_{id}"));
            let geometry = create_standalone::<Geometry>(backend, &definition, &ctx)?;
            self.state().unpooled.geometries += 1;
            (geometry, SlotRef::Unpooled)
        };

        self.state().triangles_loaded += triangles;
        Ok(GeometryHandle {
            geometry,
            slot,
            triangles,
            dropped: Some(self.dropped_sender.clone()),
        })
    }

    /// Claim a material for one primitive.
    ///
    /// Materials whose definition needs no per-tile data are shared per
    /// `(info, tileset_id)` and reference counted, whatever the pooling
    /// policy. All others come from the pool for their definition, or are
    /// created standalone when material pooling is off. Pooled and standalone
    /// materials come back reset, with the default textures bound.
    pub fn acquire_material(
        &self,
        request: &MaterialRequest<'_>,
        backend: &mut dyn SceneBackend,
    ) -> Result<MaterialHandle, ResourceError> {
        self.release_dropped_handles(backend);
        let (policy, disable_textures) = {
            let state = self.state();
            (state.settings.material, state.settings.disable_textures)
        };
        let definition = MaterialDefinition::new(
            Some(request.info),
            request.features,
            request.properties,
            request.imagery_layer_count,
            request.tileset_material,
            disable_textures,
        );

        if definition.is_shareable() {
            return self.acquire_shared_material(request, definition, backend);
        }

        if policy.enabled {
            let (index, material) =
                self.acquire_from_family::<Material>(definition, policy.initial_capacity, backend)?;
            return Ok(self.material_handle(material, SlotRef::Pooled(index)));
        }

        let id = self.next_material_id.fetch_add(1, Ordering::Relaxed);
        let ctx = self.context(format!("/material_{id}"));
        let material = create_standalone::<Material>(backend, &definition, &ctx)?;
        self.state().unpooled.materials += 1;
        Ok(self.material_handle(material, SlotRef::Unpooled))
    }

    fn material_handle(&self, material: Material, slot: SlotRef) -> MaterialHandle {
        MaterialHandle {
            material,
            slot,
            dropped: Some(self.dropped_sender.clone()),
        }
    }

    fn texture_handle(&self, texture: Texture, slot: SlotRef) -> TextureHandle {
        TextureHandle {
            texture,
            slot,
            dropped: Some(self.dropped_sender.clone()),
        }
    }

    fn find_shared<'a>(
        state: &'a mut ManagerState,
        info: &MaterialInfo,
        tileset_id: i64,
    ) -> Option<&'a mut SharedMaterial> {
        state
            .shared_materials
            .iter_mut()
            .find(|shared| shared.info == *info && shared.tileset_id == tileset_id)
    }

    fn acquire_shared_material(
        &self,
        request: &MaterialRequest<'_>,
        definition: MaterialDefinition,
        backend: &mut dyn SceneBackend,
    ) -> Result<MaterialHandle, ResourceError> {
        {
            let mut state = self.state();
            if let Some(shared) = Self::find_shared(&mut state, request.info, request.tileset_id) {
                shared.reference_count += 1;
                let material = shared.material.clone();
                drop(state);
                return Ok(self.material_handle(material, SlotRef::Shared));
            }
        }

        let id = self.next_material_id.fetch_add(1, Ordering::Relaxed);
        let ctx = self.context(format!("/shared_material_{id}"));
        let material = create_standalone::<Material>(backend, &definition, &ctx)?;
        let debug_color = self.debug_color();
        let written = material
            .set_material_info(backend, request.info, request.tileset_id)
            .and_then(|()| match debug_color {
                Some(color) => material.set_base_color(backend, color),
                None => Ok(()),
            });
        if let Err(err) = written {
            let _ = material.destroy(backend);
            return Err(err.into());
        }

        let mut state = self.state();
        if let Some(shared) = Self::find_shared(&mut state, request.info, request.tileset_id) {
            let _ = material.destroy(backend);
            shared.reference_count += 1;
            let existing = shared.material.clone();
            drop(state);
            return Ok(self.material_handle(existing, SlotRef::Shared));
        }
        tracing::debug!(
            material = %material.resource_id(),
            tileset_id = request.tileset_id,
            "created shared material"
        );
        state.shared_materials.push(SharedMaterial {
            material: material.clone(),
            info: request.info.clone(),
            tileset_id: request.tileset_id,
            reference_count: 1,
        });
        drop(state);
        Ok(self.material_handle(material, SlotRef::Shared))
    }

    /// Claim a texture from the single global texture pool, or a standalone
    /// one when texture pooling is off. The image is written by the caller.
    pub fn acquire_texture(
        &self,
        backend: &mut dyn SceneBackend,
    ) -> Result<TextureHandle, ResourceError> {
        self.release_dropped_handles(backend);
        let policy = self.state().settings.texture;

        if !policy.enabled {
            let id = self.next_texture_id.fetch_add(1, Ordering::Relaxed);
            let ctx = self.context(format!("/texture_{id}"));
            let texture = create_standalone::<Texture>(backend, &(), &ctx)?;
            self.state().unpooled.textures += 1;
            return Ok(self.texture_handle(texture, SlotRef::Unpooled));
        }

        {
            let mut state = self.state();
            if let Some(pool) = state.texture_pool.as_mut() {
                let (index, texture) = acquire_logged(pool, backend)?;
                drop(state);
                return Ok(self.texture_handle(texture, SlotRef::Pooled(index)));
            }
        }

        let pool_id = self.next_pool_id.fetch_add(1, Ordering::Relaxed);
        let pool = TexturePool::new(backend, pool_id, (), policy.initial_capacity, None)?;
        let mut state = self.state();
        if state.texture_pool.is_some() {
            pool.destroy_all(backend);
        }
        let pool = state.texture_pool.get_or_insert(pool);
        let (index, texture) = acquire_logged(pool, backend)?;
        drop(state);
        Ok(self.texture_handle(texture, SlotRef::Pooled(index)))
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    fn release_to_family<T: PoolFamily>(
        &self,
        resource: &T,
        definition: &T::Definition,
        index: usize,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let pool = T::pools(&mut state)
            .iter_mut()
            .find(|pool| pool.definition() == definition);
        let result = match pool {
            Some(pool) => pool.release(index, resource.resource_id(), backend),
            None => Err(ResourceError::UnknownHandle {
                kind: T::KIND,
                id: resource.resource_id(),
            }),
        };
        result.inspect_err(|err| tracing::error!(kind = T::KIND.label(), %err, "release failed"))
    }

    fn destroy_unpooled<T: PooledResource>(
        resource: &T,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        if backend.is_alive() {
            resource.destroy(backend)?;
        }
        Ok(())
    }

    /// Return a geometry. Pooled geometry is hidden, reset and its slot
    /// freed; standalone geometry is destroyed.
    ///
    /// A handle whose pool no longer exists (after [`clear`](Self::clear))
    /// logs at `error` and returns [`ResourceError::UnknownHandle`].
    pub fn release_geometry(
        &self,
        handle: GeometryHandle,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let (geometry, slot, triangles) = handle.into_parts();
        self.release_geometry_claim(&geometry, slot, triangles, backend)
    }

    fn release_geometry_claim(
        &self,
        geometry: &Geometry,
        slot: SlotRef,
        triangles: u64,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let result = match slot {
            SlotRef::Pooled(index) => {
                self.release_to_family(geometry, geometry.definition(), index, backend)
            }
            SlotRef::Unpooled => {
                let mut state = self.state();
                state.unpooled.geometries = state.unpooled.geometries.saturating_sub(1);
                drop(state);
                Self::destroy_unpooled(geometry, backend)
            }
            SlotRef::Shared => Err(ResourceError::UnknownHandle {
                kind: ResourceKind::Geometry,
                id: geometry.resource_id(),
            }),
        };
        if result.is_ok() {
            let mut state = self.state();
            state.triangles_loaded = state.triangles_loaded.saturating_sub(triangles);
        }
        result
    }

    /// Return a material.
    ///
    /// A shared material loses one reference and is destroyed at zero. A
    /// shared handle with no entry is a caller bug: it logs at `error` and
    /// returns [`ResourceError::UnknownHandle`].
    pub fn release_material(
        &self,
        handle: MaterialHandle,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let (material, slot) = handle.into_parts();
        self.release_material_claim(&material, slot, backend)
    }

    fn release_material_claim(
        &self,
        material: &Material,
        slot: SlotRef,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        match slot {
            SlotRef::Pooled(index) => {
                self.release_to_family(material, material.definition(), index, backend)
            }
            SlotRef::Shared => self.release_shared_material(material, backend),
            SlotRef::Unpooled => {
                let mut state = self.state();
                state.unpooled.materials = state.unpooled.materials.saturating_sub(1);
                drop(state);
                Self::destroy_unpooled(material, backend)
            }
        }
    }

    fn release_shared_material(
        &self,
        material: &Material,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let id = material.resource_id();
        let mut state = self.state();
        let Some(position) = state
            .shared_materials
            .iter()
            .position(|shared| shared.material.resource_id() == id)
        else {
            tracing::error!(material = %id, "released a shared material with no entry");
            return Err(ResourceError::UnknownHandle {
                kind: ResourceKind::Material,
                id,
            });
        };

        let shared = &mut state.shared_materials[position];
        shared.reference_count -= 1;
        if shared.reference_count > 0 {
            return Ok(());
        }
        let removed = state.shared_materials.remove(position);
        drop(state);
        tracing::debug!(material = %id, "removed shared material");
        Self::destroy_unpooled(&removed.material, backend)
    }

    /// Return a texture to the global pool, or destroy a standalone one.
    pub fn release_texture(
        &self,
        handle: TextureHandle,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let (texture, slot) = handle.into_parts();
        self.release_texture_claim(&texture, slot, backend)
    }

    fn release_texture_claim(
        &self,
        texture: &Texture,
        slot: SlotRef,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let id = texture.resource_id();
        match slot {
            SlotRef::Pooled(index) => {
                let mut state = self.state();
                let result = match state.texture_pool.as_mut() {
                    Some(pool) => pool.release(index, id, backend),
                    None => Err(ResourceError::UnknownHandle {
                        kind: ResourceKind::Texture,
                        id,
                    }),
                };
                result.inspect_err(|err| tracing::error!(kind = "texture", %err, "release failed"))
            }
            SlotRef::Unpooled => {
                let mut state = self.state();
                state.unpooled.textures = state.unpooled.textures.saturating_sub(1);
                drop(state);
                Self::destroy_unpooled(texture, backend)
            }
            SlotRef::Shared => Err(ResourceError::UnknownHandle {
                kind: ResourceKind::Texture,
                id,
            }),
        }
    }

    /// Release every claim whose handle was dropped without a `release_*`
    /// call, e.g. when a tileset or a committed tile is dropped.
    ///
    /// Runs at the start of every acquire; tile streamers also call it once
    /// per frame. Returns the number of claims returned.
    pub fn release_dropped_handles(&self, backend: &mut dyn SceneBackend) -> usize {
        let mut released = 0;
        for claim in self.dropped_claims.try_iter() {
            // Failures are logged by the release paths.
            let _ = match &claim {
                DroppedClaim::Geometry {
                    geometry,
                    slot,
                    triangles,
                } => self.release_geometry_claim(geometry, *slot, *triangles, backend),
                DroppedClaim::Material { material, slot } => {
                    self.release_material_claim(material, *slot, backend)
                }
                DroppedClaim::Texture { texture, slot } => {
                    self.release_texture_claim(texture, *slot, backend)
                }
            };
            released += 1;
        }
        if released > 0 {
            tracing::debug!(released, "released dropped handles");
        }
        released
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    /// Occupancy across all pools. Claims of dropped handles still count
    /// until [`release_dropped_handles`](Self::release_dropped_handles) runs.
    pub fn statistics(&self) -> ResourceStatistics {
        let state = self.state();
        let geometries_capacity = state.geometry_pools.iter().map(KeyedPool::capacity).sum();
        let geometries_occupied: usize =
            state.geometry_pools.iter().map(KeyedPool::occupied_count).sum();
        let materials_capacity = state.material_pools.iter().map(KeyedPool::capacity).sum();
        let materials_occupied: usize =
            state.material_pools.iter().map(KeyedPool::occupied_count).sum();
        let (textures_capacity, textures_occupied) = state
            .texture_pool
            .as_ref()
            .map_or((0, 0), |pool| (pool.capacity(), pool.occupied_count()));

        ResourceStatistics {
            geometry_pools: state.geometry_pools.len(),
            material_pools: state.material_pools.len(),
            geometries_capacity,
            geometries_loaded: geometries_occupied + state.unpooled.geometries,
            materials_capacity,
            materials_loaded: materials_occupied
                + state.unpooled.materials
                + state.shared_materials.len(),
            textures_capacity,
            textures_loaded: textures_occupied + state.unpooled.textures,
            shared_materials: state.shared_materials.len(),
            triangles_loaded: state.triangles_loaded,
        }
    }

    /// Reference count of the shared material behind a handle, if any.
    pub fn shared_reference_count(&self, handle: &MaterialHandle) -> Option<u64> {
        let id = handle.resource_id();
        self.state()
            .shared_materials
            .iter()
            .find(|shared| shared.material.resource_id() == id)
            .map(|shared| shared.reference_count)
    }

    /// Drop every pool and shared material.
    ///
    /// Outstanding pooled and shared handles become unknown; releasing them
    /// later reports an error. Unpooled handles stay valid.
    pub fn clear(&self, backend: &mut dyn SceneBackend) {
        self.release_dropped_handles(backend);
        let (geometry_pools, material_pools, texture_pool, shared_materials) = {
            let mut state = self.state();
            state.triangles_loaded = 0;
            (
                std::mem::take(&mut state.geometry_pools),
                std::mem::take(&mut state.material_pools),
                state.texture_pool.take(),
                std::mem::take(&mut state.shared_materials),
            )
        };

        if !backend.is_alive() {
            tracing::warn!("scene backend gone; skipping resource cleanup");
            return;
        }
        for pool in &geometry_pools {
            pool.destroy_all(backend);
        }
        for pool in &material_pools {
            pool.destroy_all(backend);
        }
        if let Some(pool) = &texture_pool {
            pool.destroy_all(backend);
        }
        for shared in &shared_materials {
            let _ = shared.material.destroy(backend);
        }
    }

    /// [`clear`](Self::clear) and destroy the default textures.
    pub fn shutdown(&self, backend: &mut dyn SceneBackend) {
        self.clear(backend);
        if backend.is_alive() {
            let _ = backend.destroy_resource(self.default_textures.white);
            let _ = backend.destroy_resource(self.default_textures.transparent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use strata_content::TextureInfo;
    use strata_scene::{AttributeValue, MemoryBackend};

    use crate::geometry;

    fn settings(capacity: usize) -> ManagerSettings {
        let policy = PoolPolicy {
            enabled: true,
            initial_capacity: capacity,
        };
        ManagerSettings {
            geometry: policy,
            material: policy,
            texture: policy,
            disable_materials: false,
            disable_textures: false,
            random_colors: false,
        }
    }

    fn manager(backend: &mut MemoryBackend, capacity: usize) -> ResourceManager {
        ResourceManager::new(settings(capacity), backend).unwrap()
    }

    /// 100 vertices, 100 triangles, no optional channels.
    fn plain_primitive() -> Primitive {
        let positions = (0..100).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let indices = (0..300).map(|i| i % 100).collect();
        Primitive::new(positions, indices)
    }

    fn imagery_request<'a>(
        info: &'a MaterialInfo,
        features: &'a FeaturesInfo,
    ) -> MaterialRequest<'a> {
        MaterialRequest {
            info,
            features,
            properties: &[],
            imagery_layer_count: 1,
            tileset_id: 1,
            tileset_material: None,
        }
    }

    fn shared_request<'a>(info: &'a MaterialInfo, features: &'a FeaturesInfo) -> MaterialRequest<'a> {
        MaterialRequest {
            imagery_layer_count: 0,
            ..imagery_request(info, features)
        }
    }

    #[test]
    fn test_new_creates_default_textures() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 4);
        let defaults = manager.default_textures();
        assert_eq!(backend.live_count(), 2);
        assert_eq!(backend.resource(defaults.white).unwrap().name, "/default_texture");
        assert_eq!(
            backend.array(defaults.transparent, crate::texture::PIXELS),
            Some(&strata_scene::ArrayValue::Byte(vec![255, 255, 255, 0]))
        );
    }

    #[test]
    fn test_first_geometry_creates_pool_and_takes_slot_zero() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 200);
        let handle = manager
            .acquire_geometry(&plain_primitive(), false, &mut backend)
            .unwrap();

        assert_eq!(handle.slot(), SlotRef::Pooled(0));
        assert_eq!(handle.geometry().definition(), &GeometryDefinition::default());
        assert!(!backend.is_visible(handle.resource_id()));

        let stats = manager.statistics();
        assert_eq!(stats.geometry_pools, 1);
        assert_eq!(stats.geometries_capacity, 200);
        assert_eq!(stats.geometries_loaded, 1);
        assert_eq!(stats.triangles_loaded, 100);
    }

    #[test]
    fn test_exhausted_pool_reports_error() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 3);
        let primitive = plain_primitive();
        let handles: Vec<_> = (0..3)
            .map(|_| manager.acquire_geometry(&primitive, false, &mut backend).unwrap())
            .collect();

        let err = manager
            .acquire_geometry(&primitive, false, &mut backend)
            .unwrap_err();
        assert!(matches!(err, ResourceError::PoolExhausted { capacity: 3, .. }));
        assert_eq!(manager.statistics().geometry_pools, 1);
        assert_eq!(manager.statistics().triangles_loaded, 300);

        for handle in handles {
            manager.release_geometry(handle, &mut backend).unwrap();
        }
        assert_eq!(manager.statistics().triangles_loaded, 0);
        assert!(manager.acquire_geometry(&primitive, false, &mut backend).is_ok());
    }

    #[test]
    fn test_distinct_definitions_get_distinct_pools() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        let plain = plain_primitive();
        let colored = plain_primitive().with_vertex_colors(vec![glam::Vec4::ONE; 100]);

        let a = manager.acquire_geometry(&plain, false, &mut backend).unwrap();
        let b = manager.acquire_geometry(&colored, false, &mut backend).unwrap();
        let c = manager.acquire_geometry(&plain, true, &mut backend).unwrap();

        assert_eq!(manager.statistics().geometry_pools, 3);
        assert_eq!(a.slot(), SlotRef::Pooled(0));
        assert_eq!(b.slot(), SlotRef::Pooled(0));
        assert!(c.geometry().definition().has_normals);
    }

    #[test]
    fn test_release_returns_lowest_slot() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 4);
        let primitive = plain_primitive();
        let first = manager.acquire_geometry(&primitive, false, &mut backend).unwrap();
        let _second = manager.acquire_geometry(&primitive, false, &mut backend).unwrap();
        let first_id = first.resource_id();

        manager.release_geometry(first, &mut backend).unwrap();
        let again = manager.acquire_geometry(&primitive, false, &mut backend).unwrap();
        assert_eq!(again.slot(), SlotRef::Pooled(0));
        assert_eq!(again.resource_id(), first_id);
    }

    #[test]
    fn test_shared_material_reference_counting() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 4);
        let info = MaterialInfo {
            base_color_factor: DVec3::new(0.2, 0.4, 0.6),
            ..MaterialInfo::default()
        };
        let features = FeaturesInfo::default();
        let request = shared_request(&info, &features);

        let handles: Vec<_> = (0..3)
            .map(|_| manager.acquire_material(&request, &mut backend).unwrap())
            .collect();
        let id = handles[0].resource_id();
        assert!(handles.iter().all(|h| h.is_shared() && h.resource_id() == id));
        assert_eq!(manager.shared_reference_count(&handles[0]), Some(3));
        assert_eq!(manager.statistics().material_pools, 0);
        assert_eq!(
            backend.value(id, crate::material::TILESET_ID),
            Some(&AttributeValue::Int64(1))
        );

        let mut handles = handles.into_iter();
        let last = handles.next_back().unwrap();
        for handle in handles {
            manager.release_material(handle, &mut backend).unwrap();
        }
        assert_eq!(manager.shared_reference_count(&last), Some(1));
        assert!(backend.resource(id).is_some());

        manager.release_material(last, &mut backend).unwrap();
        assert_eq!(manager.statistics().shared_materials, 0);
        assert!(backend.resource(id).is_none());
    }

    #[test]
    fn test_shared_materials_are_per_tileset() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 4);
        let info = MaterialInfo::default();
        let features = FeaturesInfo::default();
        let first = manager
            .acquire_material(&shared_request(&info, &features), &mut backend)
            .unwrap();
        let other_tileset = MaterialRequest {
            tileset_id: 2,
            ..shared_request(&info, &features)
        };
        let second = manager.acquire_material(&other_tileset, &mut backend).unwrap();

        assert_ne!(first.resource_id(), second.resource_id());
        assert_eq!(manager.statistics().shared_materials, 2);
    }

    #[test]
    fn test_shared_material_ignores_pooling_flag() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 4);
        manager.set_material_pooling(false).unwrap();
        let info = MaterialInfo::default();
        let features = FeaturesInfo::default();
        let handle = manager
            .acquire_material(&shared_request(&info, &features), &mut backend)
            .unwrap();
        assert!(handle.is_shared());
    }

    #[test]
    fn test_imagery_material_is_pooled_with_defaults_bound() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        let info = MaterialInfo {
            base_color_texture: Some(TextureInfo::default()),
            ..MaterialInfo::default()
        };
        let features = FeaturesInfo::default();
        let handle = manager
            .acquire_material(&imagery_request(&info, &features), &mut backend)
            .unwrap();
        let defaults = manager.default_textures();

        assert_eq!(handle.slot(), SlotRef::Pooled(0));
        assert_eq!(
            backend.value(handle.resource_id(), crate::material::BASE_COLOR_TEXTURE),
            Some(&AttributeValue::UInt64(defaults.white.0))
        );
        assert_eq!(
            backend.value(
                handle.resource_id(),
                &crate::material::imagery_layer_attribute(0)
            ),
            Some(&AttributeValue::UInt64(defaults.transparent.0))
        );
    }

    #[test]
    fn test_disable_textures_makes_material_shareable() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        manager.set_disable_textures(true);
        let info = MaterialInfo::default();
        let features = FeaturesInfo::default();
        let handle = manager
            .acquire_material(&imagery_request(&info, &features), &mut backend)
            .unwrap();
        assert!(handle.is_shared());
    }

    #[test]
    fn test_unpooled_mode_creates_and_destroys() {
        let mut backend = MemoryBackend::new();
        let mut settings = settings(8);
        settings.geometry.enabled = false;
        settings.texture.enabled = false;
        let manager = ResourceManager::new(settings, &mut backend).unwrap();

        let geometry = manager
            .acquire_geometry(&plain_primitive(), false, &mut backend)
            .unwrap();
        let texture = manager.acquire_texture(&mut backend).unwrap();
        assert_eq!(geometry.slot(), SlotRef::Unpooled);
        assert_eq!(
            backend.resource(geometry.resource_id()).unwrap().name,
            "/geometry_0"
        );
        assert_eq!(backend.resource(texture.resource_id()).unwrap().name, "/texture_0");
        assert_eq!(backend.live_count(), 4);
        assert_eq!(
            backend.value(geometry.resource_id(), geometry::TILE_ID),
            Some(&AttributeValue::Int64(geometry::NO_TAG))
        );

        let stats = manager.statistics();
        assert_eq!((stats.geometries_loaded, stats.textures_loaded), (1, 1));
        assert_eq!(stats.geometries_capacity, 0);

        manager.release_geometry(geometry, &mut backend).unwrap();
        manager.release_texture(texture, &mut backend).unwrap();
        assert_eq!(backend.live_count(), 2);
        assert_eq!(manager.statistics(), ResourceStatistics::default());
    }

    #[test]
    fn test_policy_locked_after_first_pool() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        manager.set_geometry_pool_initial_capacity(5).unwrap();
        let _handle = manager
            .acquire_geometry(&plain_primitive(), false, &mut backend)
            .unwrap();

        assert!(matches!(
            manager.set_geometry_pooling(false),
            Err(ResourceError::PolicyLocked(ResourceKind::Geometry))
        ));
        assert!(manager.set_geometry_pool_initial_capacity(10).is_err());
        assert_eq!(manager.statistics().geometries_capacity, 5);
        // Other kinds are still open.
        manager.set_texture_pool_initial_capacity(1).unwrap();
    }

    #[test]
    fn test_clear_invalidates_outstanding_handles() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        let geometry = manager
            .acquire_geometry(&plain_primitive(), false, &mut backend)
            .unwrap();
        let texture = manager.acquire_texture(&mut backend).unwrap();

        manager.clear(&mut backend);
        assert_eq!(backend.live_count(), 2);
        assert_eq!(manager.statistics(), ResourceStatistics::default());

        assert!(matches!(
            manager.release_geometry(geometry, &mut backend),
            Err(ResourceError::UnknownHandle { .. })
        ));
        assert!(manager.release_texture(texture, &mut backend).is_err());
    }

    #[test]
    fn test_release_after_backend_shutdown() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        let geometry = manager
            .acquire_geometry(&plain_primitive(), false, &mut backend)
            .unwrap();
        backend.shutdown();

        manager.release_geometry(geometry, &mut backend).unwrap();
        manager.shutdown(&mut backend);
        assert_eq!(manager.statistics().geometry_pools, 0);
    }

    #[test]
    fn test_dropped_geometry_slot_is_reclaimed() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 1);
        let primitive = plain_primitive();
        let handle = manager.acquire_geometry(&primitive, false, &mut backend).unwrap();
        let id = handle.resource_id();
        backend.write_attribute(id, geometry::TILE_ID, AttributeValue::Int64(4)).unwrap();
        drop(handle);

        // Still counted until the queue is drained.
        assert_eq!(manager.statistics().geometries_loaded, 1);
        let again = manager.acquire_geometry(&primitive, false, &mut backend).unwrap();
        assert_eq!(again.slot(), SlotRef::Pooled(0));
        assert_eq!(again.resource_id(), id);
        assert_eq!(
            backend.value(id, geometry::TILE_ID),
            Some(&AttributeValue::Int64(geometry::NO_TAG))
        );
        assert_eq!(manager.statistics().triangles_loaded, 100);
    }

    #[test]
    fn test_dropped_shared_material_drops_one_reference() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        let info = MaterialInfo::default();
        let features = FeaturesInfo::default();
        let request = shared_request(&info, &features);
        let kept = manager.acquire_material(&request, &mut backend).unwrap();
        let dropped = manager.acquire_material(&request, &mut backend).unwrap();
        assert_eq!(manager.shared_reference_count(&kept), Some(2));

        drop(dropped);
        assert_eq!(manager.release_dropped_handles(&mut backend), 1);
        assert_eq!(manager.shared_reference_count(&kept), Some(1));

        let id = kept.resource_id();
        drop(kept);
        assert_eq!(manager.release_dropped_handles(&mut backend), 1);
        assert_eq!(manager.statistics().shared_materials, 0);
        assert!(backend.resource(id).is_none());
    }

    #[test]
    fn test_released_handles_are_not_queued() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 2);
        let geometry = manager
            .acquire_geometry(&plain_primitive(), false, &mut backend)
            .unwrap();
        let texture = manager.acquire_texture(&mut backend).unwrap();
        manager.release_geometry(geometry, &mut backend).unwrap();
        manager.release_texture(texture, &mut backend).unwrap();

        assert_eq!(manager.release_dropped_handles(&mut backend), 0);
        let stats = manager.statistics();
        assert_eq!((stats.geometries_loaded, stats.textures_loaded), (0, 0));
    }

    /// Fails every `create_resource` after the first `allowed`.
    struct LimitedBackend {
        inner: MemoryBackend,
        allowed: usize,
    }

    impl SceneBackend for LimitedBackend {
        fn is_alive(&self) -> bool {
            self.inner.is_alive()
        }

        fn create_resource(
            &mut self,
            kind: ResourceKind,
            name: &str,
        ) -> Result<ResourceId, strata_scene::SceneError> {
            if self.allowed == 0 {
                return Err(strata_scene::SceneError::BackendShutdown);
            }
            self.allowed -= 1;
            self.inner.create_resource(kind, name)
        }

        fn destroy_resource(&mut self, id: ResourceId) -> Result<(), strata_scene::SceneError> {
            self.inner.destroy_resource(id)
        }

        fn declare_schema(
            &mut self,
            id: ResourceId,
            schema: &strata_scene::AttributeSchema,
        ) -> Result<(), strata_scene::SceneError> {
            self.inner.declare_schema(id, schema)
        }

        fn write_attribute(
            &mut self,
            id: ResourceId,
            name: &str,
            value: AttributeValue,
        ) -> Result<(), strata_scene::SceneError> {
            self.inner.write_attribute(id, name, value)
        }

        fn write_array(
            &mut self,
            id: ResourceId,
            name: &str,
            value: strata_scene::ArrayValue,
        ) -> Result<(), strata_scene::SceneError> {
            self.inner.write_array(id, name, value)
        }

        fn set_visibility(
            &mut self,
            id: ResourceId,
            visible: bool,
        ) -> Result<(), strata_scene::SceneError> {
            self.inner.set_visibility(id, visible)
        }
    }

    #[test]
    fn test_failed_construction_leaves_no_resources() {
        let mut backend = LimitedBackend {
            inner: MemoryBackend::new(),
            allowed: 1,
        };
        assert!(ResourceManager::new(settings(2), &mut backend).is_err());
        assert_eq!(backend.inner.live_count(), 0);
        assert_eq!(backend.inner.counters().created, 1);
    }

    #[test]
    fn test_should_acquire_material() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 1);
        let tileset_material = Some(TilesetMaterialId(3));

        assert!(!manager.should_acquire_material(false, false, None));
        assert!(manager.should_acquire_material(true, false, None));
        assert!(manager.should_acquire_material(false, true, None));
        assert!(manager.should_acquire_material(false, false, tileset_material));

        manager.set_disable_materials(true);
        assert!(!manager.should_acquire_material(true, true, tileset_material));
    }

    #[test]
    fn test_debug_color_only_when_enabled() {
        let mut backend = MemoryBackend::new();
        let manager = manager(&mut backend, 1);
        assert_eq!(manager.debug_color(), None);
        manager.set_random_colors(true);
        let color = manager.debug_color().unwrap();
        assert!(color.cmpge(Vec3::ZERO).all() && color.cmplt(Vec3::ONE).all());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.pools.texture.enabled = false;
        config.pools.geometry.initial_capacity = 12;
        config.debug.random_colors = true;

        let settings = ManagerSettings::from_config(&config);
        assert!(!settings.texture.enabled);
        assert_eq!(settings.geometry.initial_capacity, 12);
        assert_eq!(settings.material.initial_capacity, 200);
        assert!(settings.random_colors);
    }
}
