//! Pooled mesh resources.

use glam::{DMat4, Vec2, Vec3, Vec4};
use strata_content::{Aabb, FeaturesInfo, Primitive};
use strata_scene::{
    ArrayValue, AttributeSchema, AttributeType, AttributeValue, ResourceId, ResourceKind,
    SceneBackend, SceneError,
};

use crate::definition::{AttributeInfo, GeometryDefinition};
use crate::pool::{CreateContext, KeyedPool, PooledResource};

pub const FACE_VERTEX_COUNTS: &str = "faceVertexCounts";
pub const FACE_VERTEX_INDICES: &str = "faceVertexIndices";
pub const POINTS: &str = "points";
pub const NORMALS: &str = "normals";
pub const VERTEX_COLORS: &str = "vertexColors";
pub const EXTENT: &str = "extent";
pub const WORLD_EXTENT: &str = "worldExtent";
pub const DISPLAY_COLOR: &str = "displayColor";
pub const DISPLAY_OPACITY: &str = "displayOpacity";
pub const TILESET_ID: &str = "tilesetId";
pub const TILE_ID: &str = "tileId";
pub const LOCAL_TO_GLOBAL: &str = "localToGlobal";
pub const WORLD_MATRIX: &str = "worldMatrix";
pub const DOUBLE_SIDED: &str = "doubleSided";
pub const MATERIAL_BINDING: &str = "materialBinding";

/// Tag written when a resource belongs to no tileset or tile.
pub const NO_TAG: i64 = -1;

/// Display color of geometry whose material is still loading.
pub const MATERIAL_LOADING_COLOR: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// Display color of geometry without a material.
pub const DEFAULT_DISPLAY_COLOR: Vec3 = Vec3::ONE;

/// Name of texcoord set `index`.
pub fn texcoord_attribute(index: u64) -> String {
    format!("st{index}")
}

/// Attribute schema of every geometry built for `definition`.
pub fn geometry_schema(definition: &GeometryDefinition) -> AttributeSchema {
    let mut schema = AttributeSchema::new()
        .with(FACE_VERTEX_COUNTS, AttributeType::IntArray)
        .with(FACE_VERTEX_INDICES, AttributeType::IntArray)
        .with(POINTS, AttributeType::Float3Array)
        .with(EXTENT, AttributeType::Range3d)
        .with(WORLD_EXTENT, AttributeType::Range3d)
        .with(DISPLAY_COLOR, AttributeType::Float3)
        .with(DISPLAY_OPACITY, AttributeType::Float)
        .with(TILESET_ID, AttributeType::Int64)
        .with(TILE_ID, AttributeType::Int64)
        .with(LOCAL_TO_GLOBAL, AttributeType::Matrix4d)
        .with(WORLD_MATRIX, AttributeType::Matrix4d)
        .with(DOUBLE_SIDED, AttributeType::Bool)
        .with(MATERIAL_BINDING, AttributeType::UInt64);

    if definition.has_normals {
        schema.add(NORMALS, AttributeType::Float3Array);
    }
    if definition.has_vertex_colors {
        schema.add(VERTEX_COLORS, AttributeType::Float4Array);
    }
    for set in 0..definition.texcoord_set_count {
        schema.add(texcoord_attribute(set), AttributeType::Float2Array);
    }
    for AttributeInfo { name, ty } in &definition.custom_attributes {
        schema.add(name.clone(), *ty);
    }
    schema
}

/// Vertex and index data of one primitive, flattened on a decode worker.
#[derive(Clone, Debug)]
pub struct GeometryData {
    pub points: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub face_vertex_counts: Vec<i32>,
    pub normals: Option<Vec<Vec3>>,
    /// Primitive sets followed by imagery sets.
    pub texcoords: Vec<Vec<Vec2>>,
    pub vertex_colors: Option<Vec<Vec4>>,
    pub custom_attributes: Vec<(String, ArrayValue)>,
    pub extent: Aabb,
    pub double_sided: bool,
}

impl GeometryData {
    /// `None` when positions, indices or bounds are missing.
    pub fn from_primitive(primitive: &Primitive, smooth_normals: bool) -> Option<Self> {
        if !primitive.is_renderable() {
            return None;
        }
        let extent = primitive.bounds?;

        let mut custom_attributes: Vec<(String, ArrayValue)> = primitive
            .custom_attributes
            .iter()
            .map(|attribute| (attribute.name.clone(), attribute.values.clone()))
            .collect();
        for (index, feature_id) in primitive.features.feature_ids.iter().enumerate() {
            if let Some(values) = feature_id.vertex_values(primitive.positions.len()) {
                custom_attributes.push((
                    FeaturesInfo::attribute_name(index),
                    ArrayValue::Float(values),
                ));
            }
        }

        Some(Self {
            points: primitive.positions.clone(),
            indices: primitive.triangle_indices().to_vec(),
            face_vertex_counts: primitive.face_vertex_counts(),
            normals: primitive.resolved_normals(smooth_normals),
            texcoords: primitive
                .texcoords
                .iter()
                .chain(primitive.imagery_texcoords.iter())
                .cloned()
                .collect(),
            vertex_colors: primitive.vertex_colors.clone(),
            custom_attributes,
            extent,
            double_sided: primitive.double_sided,
        })
    }

    pub fn triangle_count(&self) -> u64 {
        self.face_vertex_counts.len() as u64
    }
}

/// A mesh resource in the scene backend.
#[derive(Clone, Debug)]
pub struct Geometry {
    id: ResourceId,
    definition: GeometryDefinition,
}

impl Geometry {
    pub fn definition(&self) -> &GeometryDefinition {
        &self.definition
    }

    /// Upload vertex data. Channels the definition lacks are not written.
    pub fn write_data(
        &self,
        backend: &mut dyn SceneBackend,
        data: &GeometryData,
    ) -> Result<(), SceneError> {
        let indices = data.indices.iter().map(|&i| i as i32).collect();
        backend.write_array(
            self.id,
            FACE_VERTEX_COUNTS,
            ArrayValue::Int(data.face_vertex_counts.clone()),
        )?;
        backend.write_array(self.id, FACE_VERTEX_INDICES, ArrayValue::Int(indices))?;
        backend.write_array(self.id, POINTS, ArrayValue::Float3(data.points.clone()))?;
        backend.write_attribute(
            self.id,
            EXTENT,
            AttributeValue::Range3d(data.extent.min, data.extent.max),
        )?;
        backend.write_attribute(self.id, DOUBLE_SIDED, AttributeValue::Bool(data.double_sided))?;

        if self.definition.has_normals
            && let Some(normals) = &data.normals
        {
            backend.write_array(self.id, NORMALS, ArrayValue::Float3(normals.clone()))?;
        }
        if self.definition.has_vertex_colors
            && let Some(colors) = &data.vertex_colors
        {
            backend.write_array(self.id, VERTEX_COLORS, ArrayValue::Float4(colors.clone()))?;
        }
        for (set, texcoords) in data
            .texcoords
            .iter()
            .enumerate()
            .take(self.definition.texcoord_set_count as usize)
        {
            backend.write_array(
                self.id,
                &texcoord_attribute(set as u64),
                ArrayValue::Float2(texcoords.clone()),
            )?;
        }
        for (name, values) in &data.custom_attributes {
            let declared = self
                .definition
                .custom_attributes
                .iter()
                .any(|info| info.name == *name && info.ty == values.ty());
            if declared {
                backend.write_array(self.id, name, values.clone())?;
            }
        }
        Ok(())
    }

    pub fn set_tile(
        &self,
        backend: &mut dyn SceneBackend,
        tileset_id: i64,
        tile_id: i64,
    ) -> Result<(), SceneError> {
        backend.write_attribute(self.id, TILESET_ID, AttributeValue::Int64(tileset_id))?;
        backend.write_attribute(self.id, TILE_ID, AttributeValue::Int64(tile_id))
    }

    /// Write the cached earth-fixed transform and the derived renderer-space state.
    pub fn set_transforms(
        &self,
        backend: &mut dyn SceneBackend,
        local_to_global: DMat4,
        world_matrix: DMat4,
        world_extent: &Aabb,
    ) -> Result<(), SceneError> {
        backend.write_attribute(
            self.id,
            LOCAL_TO_GLOBAL,
            AttributeValue::Matrix4d(local_to_global),
        )?;
        backend.write_attribute(
            self.id,
            WORLD_EXTENT,
            AttributeValue::Range3d(world_extent.min, world_extent.max),
        )?;
        self.set_world_matrix(backend, world_matrix)
    }

    pub fn set_world_matrix(
        &self,
        backend: &mut dyn SceneBackend,
        world_matrix: DMat4,
    ) -> Result<(), SceneError> {
        backend.write_attribute(self.id, WORLD_MATRIX, AttributeValue::Matrix4d(world_matrix))
    }

    pub fn set_display_color(
        &self,
        backend: &mut dyn SceneBackend,
        color: Vec3,
    ) -> Result<(), SceneError> {
        backend.write_attribute(self.id, DISPLAY_COLOR, AttributeValue::Float3(color))?;
        backend.write_attribute(self.id, DISPLAY_OPACITY, AttributeValue::Float(1.0))
    }

    /// Bind a material, or unbind with `None`.
    pub fn bind_material(
        &self,
        backend: &mut dyn SceneBackend,
        material: Option<ResourceId>,
    ) -> Result<(), SceneError> {
        let binding = material.map_or(0, |id| id.0);
        backend.write_attribute(self.id, MATERIAL_BINDING, AttributeValue::UInt64(binding))
    }

    pub fn set_visible(&self, backend: &mut dyn SceneBackend, visible: bool) -> Result<(), SceneError> {
        backend.set_visibility(self.id, visible)
    }

    fn reset(&self, backend: &mut dyn SceneBackend) -> Result<(), SceneError> {
        backend.write_array(self.id, FACE_VERTEX_COUNTS, ArrayValue::Int(Vec::new()))?;
        backend.write_array(self.id, FACE_VERTEX_INDICES, ArrayValue::Int(Vec::new()))?;
        backend.write_array(self.id, POINTS, ArrayValue::Float3(Vec::new()))?;
        self.bind_material(backend, None)
    }
}

impl PooledResource for Geometry {
    const KIND: ResourceKind = ResourceKind::Geometry;
    type Definition = GeometryDefinition;

    fn create(
        backend: &mut dyn SceneBackend,
        definition: &GeometryDefinition,
        ctx: &CreateContext,
    ) -> Result<Self, SceneError> {
        let id = backend.create_resource(Self::KIND, &ctx.name)?;
        backend.declare_schema(id, &geometry_schema(definition))?;
        Ok(Self {
            id,
            definition: definition.clone(),
        })
    }

    fn resource_id(&self) -> ResourceId {
        self.id
    }

    /// Geometry stays hidden either way; showing it is a separate step once
    /// the tile is committed.
    fn set_active(&self, backend: &mut dyn SceneBackend, active: bool) -> Result<(), SceneError> {
        backend.set_visibility(self.id, false)?;
        self.set_tile(backend, NO_TAG, NO_TAG)?;
        if !active {
            self.reset(backend)?;
        }
        Ok(())
    }
}

/// One pool of geometries sharing a [`GeometryDefinition`].
pub type GeometryPool = KeyedPool<Geometry>;
