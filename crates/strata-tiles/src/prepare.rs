//! Background half of a tile load.
//!
//! Everything here is pure: it reads decoded content and produces owned,
//! move-only payloads. No manager or backend access.

use glam::DMat4;
use strata_content::{
    Aabb, FeatureIdSource, FeaturesInfo, ImageData, MaterialInfo, PropertyDescriptor, TileContent,
};
use strata_resources::{GeometryData, GeometryDefinition};

/// Settings a worker needs to prepare tiles of one tileset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    pub smooth_normals: bool,
}

/// Result of [`prepare_tile`], committed exactly once on the main thread.
#[derive(Debug)]
pub enum PendingTile {
    Model(PreparedModel),
    /// Nothing to draw; commits to a tile with no resources.
    Empty,
}

impl PendingTile {
    pub fn primitive_count(&self) -> usize {
        match self {
            PendingTile::Model(model) => model.primitives.len(),
            PendingTile::Empty => 0,
        }
    }
}

#[derive(Debug)]
pub struct PreparedModel {
    pub primitives: Vec<PreparedPrimitive>,
    /// Primitives dropped for missing positions, indices or bounds.
    pub skipped: usize,
}

/// One renderable primitive with all derived data computed.
#[derive(Debug)]
pub struct PreparedPrimitive {
    pub definition: GeometryDefinition,
    pub data: GeometryData,
    /// Tile transform composed with the primitive's node transform.
    pub local_to_global: DMat4,
    pub material: Option<MaterialInfo>,
    pub base_color_image: Option<ImageData>,
    pub features: FeaturesInfo,
    /// Images of texture-based feature id sets, by feature id index.
    pub feature_id_images: Vec<(usize, ImageData)>,
    pub properties: Vec<PropertyDescriptor>,
}

impl PreparedPrimitive {
    pub fn local_extent(&self) -> Aabb {
        self.data.extent
    }

    pub fn triangle_count(&self) -> u64 {
        self.data.triangle_count()
    }
}

/// Compute definitions and upload-ready data for every renderable primitive.
pub fn prepare_tile(
    content: &TileContent,
    transform: DMat4,
    options: PrepareOptions,
) -> PendingTile {
    let Some(model) = content.model() else {
        return PendingTile::Empty;
    };

    let mut primitives = Vec::with_capacity(model.primitives.len());
    let mut skipped = 0;
    for primitive in &model.primitives {
        let Some(data) = GeometryData::from_primitive(primitive, options.smooth_normals) else {
            skipped += 1;
            continue;
        };

        let feature_id_images = primitive
            .features
            .feature_ids
            .iter()
            .enumerate()
            .filter_map(|(index, feature_id)| match &feature_id.source {
                FeatureIdSource::Texture { image, .. } => {
                    model.images.get(*image).map(|image| (index, image.clone()))
                }
                _ => None,
            })
            .collect();

        primitives.push(PreparedPrimitive {
            definition: GeometryDefinition::new(primitive, options.smooth_normals),
            data,
            local_to_global: transform * primitive.transform,
            material: model.material_of(primitive).cloned(),
            base_color_image: model.base_color_image_of(primitive).cloned(),
            features: primitive.features.clone(),
            feature_id_images,
            properties: primitive.properties.clone(),
        });
    }

    if skipped > 0 {
        tracing::trace!(skipped, "skipped primitives without geometry");
    }
    PendingTile::Model(PreparedModel {
        primitives,
        skipped,
    })
}
