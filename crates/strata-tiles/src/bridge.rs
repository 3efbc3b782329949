//! Moves prepared tiles into the scene backend and back out again.
//!
//! One bridge per streamed tileset. [`RenderResourcesBridge::prepare_in_background`]
//! runs on decode workers; everything else runs on the main thread, which owns
//! the backend.

use glam::DMat4;
use strata_content::{Aabb, FeatureIdType, ImageData, MaterialInfo, TileContent};
use strata_resources::geometry::{DEFAULT_DISPLAY_COLOR, MATERIAL_LOADING_COLOR};
use strata_resources::{
    GeometryHandle, Material, MaterialHandle, MaterialRequest, PooledResource, ResourceError,
    ResourceManager, TextureHandle, TilesetMaterialId,
};
use strata_scene::{ResourceId, SceneBackend};

use crate::context::StreamingContext;
use crate::error::BridgeError;
use crate::prepare::{PendingTile, PrepareOptions, PreparedPrimitive, prepare_tile};

/// The only imagery layer a tile can carry.
pub const IMAGERY_LAYER: u64 = 0;

/// Per-tileset options fixed at creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TilesetOptions {
    /// Reserve an imagery layer in every material of the tileset.
    pub has_imagery: bool,
    /// Material applied to the whole tileset instead of per-primitive ones.
    pub tileset_material: Option<TilesetMaterialId>,
}

/// Resources held by one committed primitive.
#[derive(Debug)]
pub struct PrimitiveResources {
    geometry: GeometryHandle,
    material: Option<MaterialHandle>,
    textures: Vec<TextureHandle>,
    local_to_global: DMat4,
    local_extent: Aabb,
    pushed_world_matrix: DMat4,
}

impl PrimitiveResources {
    pub fn geometry(&self) -> &GeometryHandle {
        &self.geometry
    }

    /// `None` when materials are disabled or the primitive needs none.
    pub fn material(&self) -> Option<&MaterialHandle> {
        self.material.as_ref()
    }

    /// Base color and feature id textures bound to the material. Imagery is
    /// held by the tile, not here.
    pub fn textures(&self) -> &[TextureHandle] {
        &self.textures
    }

    /// Tile transform composed with the node transform, in earth-fixed
    /// coordinates. Fixed for the primitive's lifetime.
    pub fn local_to_global(&self) -> DMat4 {
        self.local_to_global
    }

    /// Last world matrix written to the backend.
    pub fn world_matrix(&self) -> DMat4 {
        self.pushed_world_matrix
    }

    /// Recompute the renderer-space transform; write it only when it changed.
    fn push_world_matrix(
        &mut self,
        global_to_local: DMat4,
        backend: &mut dyn SceneBackend,
    ) -> Result<bool, BridgeError> {
        let world_matrix = global_to_local * self.local_to_global;
        if world_matrix == self.pushed_world_matrix {
            return Ok(false);
        }
        let world_extent = self.local_extent.transformed(&world_matrix);
        self.geometry.geometry().set_transforms(
            backend,
            self.local_to_global,
            world_matrix,
            &world_extent,
        )?;
        self.pushed_world_matrix = world_matrix;
        Ok(true)
    }
}

#[derive(Debug)]
struct ImageryAttachment {
    texture: TextureHandle,
}

/// Everything a committed tile holds. Hand it back to
/// [`RenderResourcesBridge::release`] when the tile unloads.
///
/// Dropping it instead is safe: its handles queue themselves with the
/// [`ResourceManager`], which frees the slots on its next acquire.
#[derive(Debug)]
pub struct TileRenderResources {
    tileset_id: i64,
    tile_id: i64,
    primitives: Vec<PrimitiveResources>,
    imagery: Option<ImageryAttachment>,
    visible: bool,
}

impl TileRenderResources {
    fn new(tileset_id: i64, tile_id: i64) -> Self {
        Self {
            tileset_id,
            tile_id,
            primitives: Vec::new(),
            imagery: None,
            visible: false,
        }
    }

    pub fn tileset_id(&self) -> i64 {
        self.tileset_id
    }

    /// Id written into every geometry of the tile for picking.
    pub fn tile_id(&self) -> i64 {
        self.tile_id
    }

    /// Committed primitives. Primitives skipped during preparation are absent.
    pub fn primitives(&self) -> &[PrimitiveResources] {
        &self.primitives
    }

    /// Last value passed to [`RenderResourcesBridge::set_tile_visible`].
    /// Tiles start hidden.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_imagery(&self) -> bool {
        self.imagery.is_some()
    }

    /// Sum over the tile's geometries.
    pub fn triangle_count(&self) -> u64 {
        self.primitives
            .iter()
            .map(|primitive| primitive.geometry.triangle_count())
            .sum()
    }

    /// Push every world matrix that changed under `global_to_local`.
    /// Returns the number of geometries written.
    pub fn refresh_transforms(
        &mut self,
        global_to_local: DMat4,
        backend: &mut dyn SceneBackend,
    ) -> Result<usize, BridgeError> {
        let mut pushed = 0;
        for primitive in &mut self.primitives {
            if primitive.push_world_matrix(global_to_local, backend)? {
                pushed += 1;
            }
        }
        Ok(pushed)
    }
}

/// Connects one tileset to the shared [`ResourceManager`] and the scene
/// backend.
///
/// The bridge itself holds no resources; every acquisition belongs to the
/// [`TileRenderResources`] it returns.
pub struct RenderResourcesBridge {
    tileset_id: i64,
    options: TilesetOptions,
    prepare: PrepareOptions,
}

impl RenderResourcesBridge {
    /// Allocate a tileset id from `ctx` and capture its smoothing setting.
    pub fn new(ctx: &StreamingContext, options: TilesetOptions) -> Self {
        Self {
            tileset_id: ctx.allocate_tileset_id(),
            options,
            prepare: PrepareOptions {
                smooth_normals: ctx.smooth_normals(),
            },
        }
    }

    pub fn tileset_id(&self) -> i64 {
        self.tileset_id
    }

    pub fn options(&self) -> TilesetOptions {
        self.options
    }

    /// Settings handed to decode workers.
    pub fn prepare_options(&self) -> PrepareOptions {
        self.prepare
    }

    /// Worker-side half of a load. Never touches the manager or the backend.
    pub fn prepare_in_background(&self, content: &TileContent, transform: DMat4) -> PendingTile {
        prepare_tile(content, transform, self.prepare)
    }

    /// Acquire resources for a prepared tile and write its data.
    ///
    /// Geometry stays hidden until [`set_tile_visible`](Self::set_tile_visible).
    /// If any step fails, everything acquired so far is released again.
    pub fn commit_on_main_thread(
        &self,
        pending: PendingTile,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<TileRenderResources, BridgeError> {
        let mut tile = TileRenderResources::new(self.tileset_id, ctx.allocate_tile_id());
        let PendingTile::Model(model) = pending else {
            return Ok(tile);
        };

        let global_to_local = ctx.coordinates().global_to_local();
        for primitive in model.primitives {
            if let Err(err) =
                self.commit_primitive(&mut tile, primitive, global_to_local, ctx, backend)
            {
                tracing::warn!(
                    tileset_id = self.tileset_id,
                    tile_id = tile.tile_id,
                    %err,
                    "tile commit failed; releasing partial resources"
                );
                let _ = self.release(tile, ctx, backend);
                return Err(err);
            }
        }

        tracing::trace!(
            tileset_id = self.tileset_id,
            tile_id = tile.tile_id,
            primitives = tile.primitives.len(),
            "committed tile"
        );
        Ok(tile)
    }

    fn commit_primitive(
        &self,
        tile: &mut TileRenderResources,
        primitive: PreparedPrimitive,
        global_to_local: DMat4,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        let manager = ctx.resources();
        let geometry = manager.acquire_geometry_for(
            primitive.definition.clone(),
            primitive.triangle_count(),
            backend,
        )?;
        tile.primitives.push(PrimitiveResources {
            geometry,
            material: None,
            textures: Vec::new(),
            local_to_global: primitive.local_to_global,
            local_extent: primitive.local_extent(),
            pushed_world_matrix: DMat4::NAN,
        });
        let Some(committed) = tile.primitives.last_mut() else {
            return Ok(());
        };

        let geometry = committed.geometry.geometry();
        geometry.write_data(backend, &primitive.data)?;
        geometry.set_tile(backend, self.tileset_id, tile.tile_id)?;
        committed.push_world_matrix(global_to_local, backend)?;

        let wants_material = manager.should_acquire_material(
            primitive.material.is_some(),
            self.options.has_imagery,
            self.options.tileset_material,
        );
        let display_color = match (&primitive.material, manager.debug_color()) {
            (_, Some(color)) => color,
            (Some(_), None) if wants_material => MATERIAL_LOADING_COLOR,
            (Some(info), None) => info.base_color_factor.as_vec3(),
            (None, None) => DEFAULT_DISPLAY_COLOR,
        };
        committed
            .geometry
            .geometry()
            .set_display_color(backend, display_color)?;

        if wants_material {
            self.commit_material(committed, &primitive, manager, backend)?;
        }
        Ok(())
    }

    fn commit_material(
        &self,
        committed: &mut PrimitiveResources,
        primitive: &PreparedPrimitive,
        manager: &ResourceManager,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        let default_info = MaterialInfo::default();
        let info = primitive.material.as_ref().unwrap_or(&default_info);
        let request = MaterialRequest {
            info,
            features: &primitive.features,
            properties: &primitive.properties,
            imagery_layer_count: u64::from(self.options.has_imagery),
            tileset_id: self.tileset_id,
            tileset_material: self.options.tileset_material,
        };
        let handle = manager.acquire_material(&request, backend)?;
        let material = handle.material().clone();
        let shared = handle.is_shared();
        committed.material = Some(handle);

        if !shared {
            material.set_material_info(backend, info, self.tileset_id)?;
            if let Some(color) = manager.debug_color() {
                material.set_base_color(backend, color)?;
            }
        }

        let definition = material.definition().clone();
        if definition.has_base_color_texture
            && let Some(image) = &primitive.base_color_image
        {
            let texture = acquire_image_texture(manager, image, &mut committed.textures, backend)?;
            material.set_base_color_texture(backend, texture)?;
        }
        for (index, image) in &primitive.feature_id_images {
            if definition.feature_id_types.get(*index) == Some(&FeatureIdType::Texture) {
                let texture =
                    acquire_image_texture(manager, image, &mut committed.textures, backend)?;
                material.set_feature_id_texture(backend, *index, texture)?;
            }
        }

        committed
            .geometry
            .geometry()
            .bind_material(backend, Some(material.resource_id()))?;
        Ok(())
    }

    /// Release every handle of a tile. Keeps going after a failure and
    /// reports the first one.
    pub fn release(
        &self,
        tile: TileRenderResources,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        let manager = ctx.resources();
        let mut first_error: Option<BridgeError> = None;
        let mut record = |result: Result<(), ResourceError>| {
            if let Err(err) = result
                && first_error.is_none()
            {
                first_error = Some(err.into());
            }
        };

        if let Some(imagery) = tile.imagery {
            record(manager.release_texture(imagery.texture, backend));
        }
        for primitive in tile.primitives {
            record(manager.release_geometry(primitive.geometry, backend));
            if let Some(material) = primitive.material {
                record(manager.release_material(material, backend));
            }
            for texture in primitive.textures {
                record(manager.release_texture(texture, backend));
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Show or hide every geometry of the tile. Materials are unaffected.
    pub fn set_tile_visible(
        &self,
        tile: &mut TileRenderResources,
        visible: bool,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        for primitive in &tile.primitives {
            primitive.geometry.geometry().set_visible(backend, visible)?;
        }
        tile.visible = visible;
        Ok(())
    }

    /// Bind an imagery image to every material of the tile.
    ///
    /// A tile carries at most one imagery layer; a second attach is rejected
    /// until the first is detached.
    pub fn attach_imagery(
        &self,
        tile: &mut TileRenderResources,
        image: &ImageData,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        if !self.options.has_imagery {
            return Err(BridgeError::ImageryDisabled(self.tileset_id));
        }
        if tile.imagery.is_some() {
            tracing::warn!(
                tileset_id = self.tileset_id,
                tile_id = tile.tile_id,
                "only one imagery layer per tile is supported"
            );
            return Err(BridgeError::ImageryLayerOccupied {
                tile_id: tile.tile_id,
            });
        }

        let manager = ctx.resources();
        let texture = manager.acquire_texture(backend)?;
        if let Err(err) = texture.texture().set_image(backend, image) {
            let _ = manager.release_texture(texture, backend);
            return Err(err.into());
        }
        let texture_id = texture.resource_id();
        tile.imagery = Some(ImageryAttachment { texture });

        let bound = imagery_materials(tile).try_for_each(|material| {
            material.set_imagery_layer(backend, IMAGERY_LAYER, texture_id)
        });
        if let Err(err) = bound {
            let _ = self.release_imagery(tile, manager, backend);
            return Err(err.into());
        }
        Ok(())
    }

    /// Release the imagery texture and rebind the transparent default.
    /// Returns `false` if no imagery was attached.
    pub fn detach_imagery(
        &self,
        tile: &mut TileRenderResources,
        ctx: &StreamingContext,
        backend: &mut dyn SceneBackend,
    ) -> Result<bool, BridgeError> {
        if tile.imagery.is_none() {
            return Ok(false);
        }
        let cleared = imagery_materials(tile)
            .try_for_each(|material| material.clear_imagery_layer(backend, IMAGERY_LAYER));
        let released = self.release_imagery(tile, ctx.resources(), backend);
        cleared?;
        released?;
        Ok(true)
    }

    fn release_imagery(
        &self,
        tile: &mut TileRenderResources,
        manager: &ResourceManager,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), BridgeError> {
        match tile.imagery.take() {
            Some(imagery) => Ok(manager.release_texture(imagery.texture, backend)?),
            None => Ok(()),
        }
    }
}

/// Materials of a tile that reserve an imagery layer.
fn imagery_materials(tile: &TileRenderResources) -> impl Iterator<Item = &Material> + '_ {
    tile.primitives
        .iter()
        .filter_map(|primitive| primitive.material.as_ref())
        .map(MaterialHandle::material)
        .filter(|material| material.definition().imagery_layer_count > IMAGERY_LAYER)
}

fn acquire_image_texture(
    manager: &ResourceManager,
    image: &ImageData,
    textures: &mut Vec<TextureHandle>,
    backend: &mut dyn SceneBackend,
) -> Result<ResourceId, BridgeError> {
    let texture = manager.acquire_texture(backend)?;
    let id = texture.resource_id();
    // Held by the tile before the write so a failure still releases it.
    let written = texture.texture().set_image(backend, image);
    textures.push(texture);
    written?;
    Ok(id)
}
