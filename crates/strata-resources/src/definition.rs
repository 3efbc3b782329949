//! Structural fingerprints of geometry and material content.
//!
//! A definition records which optional data channels a piece of content
//! carries. Content with equal definitions can use the same pool, because the
//! pool's backend resources were declared with exactly those channels.

use std::collections::BTreeSet;

use strata_content::{FeatureIdType, FeaturesInfo, MaterialInfo, Primitive, PropertyDescriptor};
use strata_scene::AttributeType;

/// A custom per-vertex attribute channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeInfo {
    pub name: String,
    pub ty: AttributeType,
}

/// Opaque reference to a material supplied for a whole tileset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TilesetMaterialId(pub u64);

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GeometryDefinition {
    pub has_normals: bool,
    pub has_vertex_colors: bool,
    /// Primitive texcoord sets followed by imagery texcoord sets.
    pub texcoord_set_count: u64,
    pub custom_attributes: BTreeSet<AttributeInfo>,
}

impl GeometryDefinition {
    pub fn new(primitive: &Primitive, smooth_normals: bool) -> Self {
        let mut custom_attributes: BTreeSet<AttributeInfo> = primitive
            .custom_attributes
            .iter()
            .map(|attribute| AttributeInfo {
                name: attribute.name.clone(),
                ty: attribute.values.ty(),
            })
            .collect();
        custom_attributes.extend(feature_id_attributes(&primitive.features));

        Self {
            has_normals: primitive.has_normals(smooth_normals),
            has_vertex_colors: primitive.vertex_colors.is_some(),
            texcoord_set_count: (primitive.texcoords.len() + primitive.imagery_texcoords.len())
                as u64,
            custom_attributes,
        }
    }
}

/// Per-vertex feature id channels. Texture-based sets live in the material.
fn feature_id_attributes(features: &FeaturesInfo) -> impl Iterator<Item = AttributeInfo> + '_ {
    features
        .feature_ids
        .iter()
        .enumerate()
        .filter(|(_, id)| id.ty() != FeatureIdType::Texture)
        .map(|(index, _)| AttributeInfo {
            name: FeaturesInfo::attribute_name(index),
            ty: AttributeType::FloatArray,
        })
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MaterialDefinition {
    pub has_vertex_colors: bool,
    pub has_base_color_texture: bool,
    pub feature_id_types: Vec<FeatureIdType>,
    pub imagery_layer_count: u64,
    pub tileset_material: Option<TilesetMaterialId>,
    pub styleable_properties: Vec<PropertyDescriptor>,
}

impl MaterialDefinition {
    /// `disable_textures` drops the base color texture and all imagery.
    pub fn new(
        material_info: Option<&MaterialInfo>,
        features: &FeaturesInfo,
        styleable_properties: &[PropertyDescriptor],
        imagery_layer_count: u64,
        tileset_material: Option<TilesetMaterialId>,
        disable_textures: bool,
    ) -> Self {
        let has_base_color_texture =
            !disable_textures && material_info.is_some_and(|m| m.base_color_texture.is_some());
        Self {
            has_vertex_colors: material_info.is_some_and(|m| m.has_vertex_colors),
            has_base_color_texture,
            feature_id_types: features.feature_id_types(),
            imagery_layer_count: if disable_textures { 0 } else { imagery_layer_count },
            tileset_material,
            styleable_properties: styleable_properties.to_vec(),
        }
    }

    /// No per-tile variation: one backend material can serve every tile
    /// with equal material info in the same tileset.
    pub fn is_shareable(&self) -> bool {
        !self.has_base_color_texture
            && self.imagery_layer_count == 0
            && self.feature_id_types.is_empty()
            && self.styleable_properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3, Vec4};
    use strata_content::{
        CustomAttribute, FeatureId, FeatureIdSource, PropertyType, TextureInfo,
    };
    use strata_scene::ArrayValue;

    fn triangles(vertex_count: usize, index_count: usize) -> Primitive {
        let positions = (0..vertex_count)
            .map(|i| Vec3::new(i as f32, (i % 3) as f32, 0.0))
            .collect();
        let indices = (0..index_count).map(|i| (i % vertex_count) as u32).collect();
        Primitive::new(positions, indices)
    }

    #[test]
    fn test_plain_mesh_definition() {
        let definition = GeometryDefinition::new(&triangles(100, 300), false);
        assert_eq!(
            definition,
            GeometryDefinition {
                has_normals: false,
                has_vertex_colors: false,
                texcoord_set_count: 0,
                custom_attributes: BTreeSet::new(),
            }
        );
    }

    #[test]
    fn test_equal_shapes_give_equal_definitions() {
        let a = triangles(10, 30).with_texcoords(vec![Vec2::ZERO; 10]);
        let b = triangles(50, 90).with_texcoords(vec![Vec2::ONE; 50]);
        assert_eq!(
            GeometryDefinition::new(&a, false),
            GeometryDefinition::new(&b, false)
        );
    }

    #[test]
    fn test_each_channel_changes_definition() {
        let base = GeometryDefinition::new(&triangles(4, 6), false);

        let normals = triangles(4, 6).with_normals(vec![Vec3::Z; 4]);
        let colors = triangles(4, 6).with_vertex_colors(vec![Vec4::ONE; 4]);
        let imagery = triangles(4, 6).with_imagery_texcoords(vec![Vec2::ZERO; 4]);
        let mut custom = triangles(4, 6);
        custom.custom_attributes.push(CustomAttribute {
            name: "temperature".to_string(),
            values: ArrayValue::Float(vec![0.0; 4]),
        });

        for primitive in [normals, colors, imagery, custom] {
            assert_ne!(GeometryDefinition::new(&primitive, false), base);
        }
    }

    #[test]
    fn test_smoothing_adds_normals() {
        let primitive = triangles(4, 6);
        assert!(!GeometryDefinition::new(&primitive, false).has_normals);
        assert!(GeometryDefinition::new(&primitive, true).has_normals);
    }

    #[test]
    fn test_feature_ids_add_vertex_channels() {
        let features = FeaturesInfo {
            feature_ids: vec![
                FeatureId {
                    source: FeatureIdSource::Implicit,
                    feature_count: 4,
                    null_feature_id: None,
                },
                FeatureId {
                    source: FeatureIdSource::Texture {
                        image: 0,
                        channels: vec![0],
                        set_index: 0,
                    },
                    feature_count: 4,
                    null_feature_id: None,
                },
            ],
        };
        let definition = GeometryDefinition::new(&triangles(4, 6).with_features(features), false);
        let names: Vec<_> = definition
            .custom_attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["featureId0"]);
    }

    #[test]
    fn test_plain_material_is_shareable() {
        let info = MaterialInfo::default();
        let definition =
            MaterialDefinition::new(Some(&info), &FeaturesInfo::default(), &[], 0, None, false);
        assert!(definition.is_shareable());
    }

    #[test]
    fn test_per_tile_variation_is_not_shareable() {
        let textured = MaterialInfo {
            base_color_texture: Some(TextureInfo::default()),
            ..MaterialInfo::default()
        };
        let features = FeaturesInfo::default();

        let texture = MaterialDefinition::new(Some(&textured), &features, &[], 0, None, false);
        assert!(!texture.is_shareable());

        let imagery = MaterialDefinition::new(None, &features, &[], 1, None, false);
        assert!(!imagery.is_shareable());

        let property = PropertyDescriptor {
            name: "height".to_string(),
            ty: PropertyType::Scalar,
            normalized: false,
        };
        let styled = MaterialDefinition::new(None, &features, &[property], 0, None, false);
        assert!(!styled.is_shareable());
    }

    #[test]
    fn test_disabled_textures_drop_texture_channels() {
        let textured = MaterialInfo {
            base_color_texture: Some(TextureInfo::default()),
            ..MaterialInfo::default()
        };
        let definition =
            MaterialDefinition::new(Some(&textured), &FeaturesInfo::default(), &[], 2, None, true);
        assert!(!definition.has_base_color_texture);
        assert_eq!(definition.imagery_layer_count, 0);
        assert!(definition.is_shareable());
    }
}
