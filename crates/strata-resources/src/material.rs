//! Pooled and shared material resources.

use glam::{Vec3, Vec4};
use strata_content::{AlphaMode, FeatureIdType, MaterialInfo, TextureInfo};
use strata_scene::{
    ArrayValue, AttributeSchema, AttributeType, AttributeValue, ResourceId, ResourceKind,
    SceneBackend, SceneError,
};

use crate::definition::MaterialDefinition;
use crate::geometry::NO_TAG;
use crate::pool::{CreateContext, DefaultTextures, KeyedPool, PooledResource};

pub const BASE_COLOR_FACTOR: &str = "baseColorFactor";
pub const BASE_ALPHA: &str = "baseAlpha";
pub const ALPHA_CUTOFF: &str = "alphaCutoff";
pub const ALPHA_MODE: &str = "alphaMode";
pub const EMISSIVE_FACTOR: &str = "emissiveFactor";
pub const METALLIC_FACTOR: &str = "metallicFactor";
pub const ROUGHNESS_FACTOR: &str = "roughnessFactor";
pub const HAS_VERTEX_COLORS: &str = "hasVertexColors";
pub const TILESET_ID: &str = "tilesetId";
pub const BASE_COLOR_TEXTURE: &str = "baseColorTexture";
pub const TEXTURE_TRANSFORM: &str = "baseColorTextureTransform";
pub const TEXTURE_ROTATION: &str = "baseColorTextureRotation";
pub const TEXCOORD_SET: &str = "baseColorTexcoordSet";
pub const WRAP_S: &str = "baseColorWrapS";
pub const WRAP_T: &str = "baseColorWrapT";
pub const FEATURE_ID_TYPES: &str = "featureIdTypes";
pub const STYLEABLE_PROPERTIES: &str = "styleableProperties";
pub const TILESET_MATERIAL: &str = "tilesetMaterial";

pub fn imagery_layer_attribute(index: u64) -> String {
    format!("imageryLayer{index}")
}

pub fn feature_id_texture_attribute(index: usize) -> String {
    format!("featureIdTexture{index}")
}

/// Attribute schema of every material built for `definition`.
pub fn material_schema(definition: &MaterialDefinition) -> AttributeSchema {
    let mut schema = AttributeSchema::new()
        .with(BASE_COLOR_FACTOR, AttributeType::Float3)
        .with(BASE_ALPHA, AttributeType::Float)
        .with(ALPHA_CUTOFF, AttributeType::Float)
        .with(ALPHA_MODE, AttributeType::Int64)
        .with(EMISSIVE_FACTOR, AttributeType::Float3)
        .with(METALLIC_FACTOR, AttributeType::Float)
        .with(ROUGHNESS_FACTOR, AttributeType::Float)
        .with(HAS_VERTEX_COLORS, AttributeType::Bool)
        .with(TILESET_ID, AttributeType::Int64);

    if definition.has_base_color_texture {
        schema
            .add(BASE_COLOR_TEXTURE, AttributeType::UInt64)
            .add(TEXTURE_TRANSFORM, AttributeType::Float4)
            .add(TEXTURE_ROTATION, AttributeType::Float)
            .add(TEXCOORD_SET, AttributeType::Int64)
            .add(WRAP_S, AttributeType::Int64)
            .add(WRAP_T, AttributeType::Int64);
    }
    for layer in 0..definition.imagery_layer_count {
        schema.add(imagery_layer_attribute(layer), AttributeType::UInt64);
    }
    if !definition.feature_id_types.is_empty() {
        schema.add(FEATURE_ID_TYPES, AttributeType::TokenArray);
    }
    for (index, ty) in definition.feature_id_types.iter().enumerate() {
        if *ty == FeatureIdType::Texture {
            schema.add(feature_id_texture_attribute(index), AttributeType::UInt64);
        }
    }
    if !definition.styleable_properties.is_empty() {
        schema.add(STYLEABLE_PROPERTIES, AttributeType::TokenArray);
    }
    if definition.tileset_material.is_some() {
        schema.add(TILESET_MATERIAL, AttributeType::UInt64);
    }
    schema
}

fn feature_id_token(ty: FeatureIdType) -> String {
    match ty {
        FeatureIdType::Attribute => "attribute",
        FeatureIdType::Implicit => "implicit",
        FeatureIdType::Texture => "texture",
    }
    .to_string()
}

fn alpha_mode_code(mode: AlphaMode) -> i64 {
    match mode {
        AlphaMode::Opaque => 0,
        AlphaMode::Mask => 1,
        AlphaMode::Blend => 2,
    }
}

/// A material resource in the scene backend.
#[derive(Clone, Debug)]
pub struct Material {
    id: ResourceId,
    definition: MaterialDefinition,
    defaults: Option<DefaultTextures>,
}

impl Material {
    pub fn definition(&self) -> &MaterialDefinition {
        &self.definition
    }

    /// Write the scalar factors and, when declared, the texture sampling state.
    pub fn set_material_info(
        &self,
        backend: &mut dyn SceneBackend,
        info: &MaterialInfo,
        tileset_id: i64,
    ) -> Result<(), SceneError> {
        let values = [
            (BASE_COLOR_FACTOR, AttributeValue::Float3(info.base_color_factor.as_vec3())),
            (BASE_ALPHA, AttributeValue::Float(info.base_alpha as f32)),
            (ALPHA_CUTOFF, AttributeValue::Float(info.alpha_cutoff as f32)),
            (ALPHA_MODE, AttributeValue::Int64(alpha_mode_code(info.alpha_mode))),
            (EMISSIVE_FACTOR, AttributeValue::Float3(info.emissive_factor.as_vec3())),
            (METALLIC_FACTOR, AttributeValue::Float(info.metallic_factor as f32)),
            (ROUGHNESS_FACTOR, AttributeValue::Float(info.roughness_factor as f32)),
            (HAS_VERTEX_COLORS, AttributeValue::Bool(info.has_vertex_colors)),
            (TILESET_ID, AttributeValue::Int64(tileset_id)),
        ];
        for (name, value) in values {
            backend.write_attribute(self.id, name, value)?;
        }

        if self.definition.has_base_color_texture
            && let Some(texture) = &info.base_color_texture
        {
            self.set_texture_info(backend, texture)?;
        }
        Ok(())
    }

    fn set_texture_info(
        &self,
        backend: &mut dyn SceneBackend,
        texture: &TextureInfo,
    ) -> Result<(), SceneError> {
        let transform = Vec4::new(
            texture.offset.x as f32,
            texture.offset.y as f32,
            texture.scale.x as f32,
            texture.scale.y as f32,
        );
        let values = [
            (TEXTURE_TRANSFORM, AttributeValue::Float4(transform)),
            (TEXTURE_ROTATION, AttributeValue::Float(texture.rotation as f32)),
            (TEXCOORD_SET, AttributeValue::Int64(texture.set_index as i64)),
            (WRAP_S, AttributeValue::Int64(i64::from(texture.wrap_s))),
            (WRAP_T, AttributeValue::Int64(i64::from(texture.wrap_t))),
        ];
        for (name, value) in values {
            backend.write_attribute(self.id, name, value)?;
        }
        Ok(())
    }

    /// Write the structural descriptors that never change for this definition.
    pub fn set_descriptors(&self, backend: &mut dyn SceneBackend) -> Result<(), SceneError> {
        if !self.definition.feature_id_types.is_empty() {
            let tokens = self
                .definition
                .feature_id_types
                .iter()
                .copied()
                .map(feature_id_token)
                .collect();
            backend.write_array(self.id, FEATURE_ID_TYPES, ArrayValue::Token(tokens))?;
        }
        if !self.definition.styleable_properties.is_empty() {
            let names = self
                .definition
                .styleable_properties
                .iter()
                .map(|property| property.name.clone())
                .collect();
            backend.write_array(self.id, STYLEABLE_PROPERTIES, ArrayValue::Token(names))?;
        }
        if let Some(material) = self.definition.tileset_material {
            let value = AttributeValue::UInt64(material.0);
            backend.write_attribute(self.id, TILESET_MATERIAL, value)?;
        }
        Ok(())
    }

    pub fn set_base_color_texture(
        &self,
        backend: &mut dyn SceneBackend,
        texture: ResourceId,
    ) -> Result<(), SceneError> {
        backend.write_attribute(self.id, BASE_COLOR_TEXTURE, AttributeValue::UInt64(texture.0))
    }

    pub fn set_imagery_layer(
        &self,
        backend: &mut dyn SceneBackend,
        layer: u64,
        texture: ResourceId,
    ) -> Result<(), SceneError> {
        backend.write_attribute(
            self.id,
            &imagery_layer_attribute(layer),
            AttributeValue::UInt64(texture.0),
        )
    }

    /// Rebind the transparent default texture to an imagery layer.
    pub fn clear_imagery_layer(
        &self,
        backend: &mut dyn SceneBackend,
        layer: u64,
    ) -> Result<(), SceneError> {
        match self.defaults {
            Some(defaults) => self.set_imagery_layer(backend, layer, defaults.transparent),
            None => Ok(()),
        }
    }

    pub fn set_feature_id_texture(
        &self,
        backend: &mut dyn SceneBackend,
        index: usize,
        texture: ResourceId,
    ) -> Result<(), SceneError> {
        backend.write_attribute(
            self.id,
            &feature_id_texture_attribute(index),
            AttributeValue::UInt64(texture.0),
        )
    }

    /// Overwrite the base color, used for debug coloring.
    pub fn set_base_color(
        &self,
        backend: &mut dyn SceneBackend,
        color: Vec3,
    ) -> Result<(), SceneError> {
        backend.write_attribute(self.id, BASE_COLOR_FACTOR, AttributeValue::Float3(color))
    }

    fn reset(&self, backend: &mut dyn SceneBackend) -> Result<(), SceneError> {
        self.set_material_info(backend, &MaterialInfo::default(), NO_TAG)?;
        let Some(defaults) = self.defaults else {
            return Ok(());
        };
        if self.definition.has_base_color_texture {
            self.set_base_color_texture(backend, defaults.white)?;
        }
        for layer in 0..self.definition.imagery_layer_count {
            self.set_imagery_layer(backend, layer, defaults.transparent)?;
        }
        for (index, ty) in self.definition.feature_id_types.iter().enumerate() {
            if *ty == FeatureIdType::Texture {
                self.set_feature_id_texture(backend, index, defaults.transparent)?;
            }
        }
        Ok(())
    }
}

impl PooledResource for Material {
    const KIND: ResourceKind = ResourceKind::Material;
    type Definition = MaterialDefinition;

    fn create(
        backend: &mut dyn SceneBackend,
        definition: &MaterialDefinition,
        ctx: &CreateContext,
    ) -> Result<Self, SceneError> {
        let id = backend.create_resource(Self::KIND, &ctx.name)?;
        backend.declare_schema(id, &material_schema(definition))?;
        let material = Self {
            id,
            definition: definition.clone(),
            defaults: ctx.default_textures,
        };
        material.set_descriptors(backend)?;
        Ok(material)
    }

    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn set_active(&self, backend: &mut dyn SceneBackend, active: bool) -> Result<(), SceneError> {
        if active {
            Ok(())
        } else {
            self.reset(backend)
        }
    }
}

/// One pool of materials sharing a [`MaterialDefinition`].
pub type MaterialPool = KeyedPool<Material>;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use strata_content::{FeaturesInfo, PropertyDescriptor, PropertyType};
    use strata_scene::MemoryBackend;

    use crate::definition::TilesetMaterialId;

    fn defaults() -> DefaultTextures {
        DefaultTextures {
            white: ResourceId(900),
            transparent: ResourceId(901),
        }
    }

    fn create(backend: &mut MemoryBackend, definition: &MaterialDefinition) -> Material {
        let ctx = CreateContext {
            name: "/material".to_string(),
            default_textures: Some(defaults()),
        };
        Material::create(backend, definition, &ctx).unwrap()
    }

    fn textured_definition(imagery: u64) -> MaterialDefinition {
        let info = MaterialInfo {
            base_color_texture: Some(TextureInfo::default()),
            ..MaterialInfo::default()
        };
        MaterialDefinition::new(Some(&info), &FeaturesInfo::default(), &[], imagery, None, false)
    }

    #[test]
    fn test_plain_schema_has_no_texture_slots() {
        let schema = material_schema(&MaterialDefinition::default());
        assert!(schema.contains(BASE_COLOR_FACTOR));
        assert!(!schema.contains(BASE_COLOR_TEXTURE));
        assert!(!schema.contains("imageryLayer0"));
    }

    #[test]
    fn test_textured_schema() {
        let schema = material_schema(&textured_definition(2));
        assert_eq!(schema.get(BASE_COLOR_TEXTURE), Some(AttributeType::UInt64));
        assert!(schema.contains("imageryLayer0"));
        assert!(schema.contains("imageryLayer1"));
        assert!(!schema.contains("imageryLayer2"));
    }

    #[test]
    fn test_material_info_written() {
        let mut backend = MemoryBackend::new();
        let material = create(&mut backend, &textured_definition(0));
        let info = MaterialInfo {
            base_color_factor: DVec3::new(0.5, 0.25, 1.0),
            metallic_factor: 0.75,
            base_color_texture: Some(TextureInfo {
                set_index: 1,
                ..TextureInfo::default()
            }),
            ..MaterialInfo::default()
        };
        material.set_material_info(&mut backend, &info, 4).unwrap();

        let id = material.resource_id();
        assert_eq!(
            backend.value(id, BASE_COLOR_FACTOR),
            Some(&AttributeValue::Float3(Vec3::new(0.5, 0.25, 1.0)))
        );
        assert_eq!(backend.value(id, TEXCOORD_SET), Some(&AttributeValue::Int64(1)));
        assert_eq!(backend.value(id, TILESET_ID), Some(&AttributeValue::Int64(4)));
    }

    #[test]
    fn test_reset_rebinds_default_textures() {
        let mut backend = MemoryBackend::new();
        let material = create(&mut backend, &textured_definition(1));
        let id = material.resource_id();

        material.set_base_color_texture(&mut backend, ResourceId(42)).unwrap();
        material.set_imagery_layer(&mut backend, 0, ResourceId(43)).unwrap();
        material.set_active(&mut backend, false).unwrap();

        assert_eq!(
            backend.value(id, BASE_COLOR_TEXTURE),
            Some(&AttributeValue::UInt64(defaults().white.0))
        );
        assert_eq!(
            backend.value(id, "imageryLayer0"),
            Some(&AttributeValue::UInt64(defaults().transparent.0))
        );
        assert_eq!(backend.value(id, TILESET_ID), Some(&AttributeValue::Int64(NO_TAG)));
    }

    #[test]
    fn test_descriptors_written_at_creation() {
        let mut backend = MemoryBackend::new();
        let property = PropertyDescriptor {
            name: "height".to_string(),
            ty: PropertyType::Scalar,
            normalized: false,
        };
        let definition = MaterialDefinition::new(
            None,
            &FeaturesInfo::default(),
            &[property],
            0,
            Some(TilesetMaterialId(77)),
            false,
        );
        let material = create(&mut backend, &definition);
        let id = material.resource_id();
        assert_eq!(
            backend.array(id, STYLEABLE_PROPERTIES),
            Some(&ArrayValue::Token(vec!["height".to_string()]))
        );
        assert_eq!(backend.value(id, TILESET_MATERIAL), Some(&AttributeValue::UInt64(77)));
    }
}
