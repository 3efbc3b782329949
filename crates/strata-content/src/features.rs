//! Per-feature metadata carried by a primitive: feature ids and the
//! properties a style can read.

/// How a feature id set is stored in the source content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureIdType {
    /// Per-vertex attribute.
    Attribute,
    /// The vertex index is the feature id.
    Implicit,
    /// Sampled from a texture channel.
    Texture,
}

/// Where the ids of one feature id set come from.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureIdSource {
    Attribute { values: Vec<u32> },
    Implicit,
    Texture {
        image: usize,
        channels: Vec<u8>,
        set_index: u64,
    },
}

/// One feature id set of a primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureId {
    pub source: FeatureIdSource,
    pub feature_count: u64,
    pub null_feature_id: Option<u64>,
}

impl FeatureId {
    pub fn ty(&self) -> FeatureIdType {
        match self.source {
            FeatureIdSource::Attribute { .. } => FeatureIdType::Attribute,
            FeatureIdSource::Implicit => FeatureIdType::Implicit,
            FeatureIdSource::Texture { .. } => FeatureIdType::Texture,
        }
    }

    /// Per-vertex ids as floats, for attribute and implicit sets.
    ///
    /// Returns `None` for texture sets, which are resolved in the material.
    pub fn vertex_values(&self, vertex_count: usize) -> Option<Vec<f32>> {
        match &self.source {
            FeatureIdSource::Attribute { values } => {
                Some(values.iter().map(|&v| v as f32).collect())
            }
            FeatureIdSource::Implicit => Some((0..vertex_count).map(|i| i as f32).collect()),
            FeatureIdSource::Texture { .. } => None,
        }
    }
}

/// All feature id sets of a primitive, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeaturesInfo {
    pub feature_ids: Vec<FeatureId>,
}

impl FeaturesInfo {
    pub fn feature_id_types(&self) -> Vec<FeatureIdType> {
        self.feature_ids.iter().map(FeatureId::ty).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_ids.is_empty()
    }

    /// Name of the per-vertex attribute for the set at `index`.
    pub fn attribute_name(index: usize) -> String {
        format!("featureId{index}")
    }
}

/// Component layout of a styleable property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

/// A metadata property exposed to styling.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: PropertyType,
    pub normalized: bool,
}
