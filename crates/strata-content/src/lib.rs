//! Decoded tile content as delivered by the tile loader, plus the pure
//! derived-data helpers that run on decode workers.

mod bounds;
mod features;
mod model;
mod normals;

pub use bounds::Aabb;
pub use features::{
    FeatureId, FeatureIdSource, FeatureIdType, FeaturesInfo, PropertyDescriptor, PropertyType,
};
pub use model::{
    AlphaMode, CustomAttribute, ImageData, MaterialInfo, Model, Primitive, TextureInfo,
    TileContent, WRAP_CLAMP_TO_EDGE, WRAP_REPEAT,
};
pub use normals::smooth_normals;
