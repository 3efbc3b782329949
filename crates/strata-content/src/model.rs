//! Decoded tile content handed over by the tile loader.

use glam::{DMat4, DVec2, DVec3, Vec2, Vec3, Vec4};
use strata_scene::ArrayValue;

use crate::bounds::Aabb;
use crate::features::{FeaturesInfo, PropertyDescriptor};
use crate::normals::smooth_normals;

/// Decoded content of one tile.
#[derive(Clone, Debug)]
pub enum TileContent {
    Model(Model),
    /// The tile exists for refinement but has nothing to draw.
    Empty,
}

impl TileContent {
    pub fn model(&self) -> Option<&Model> {
        match self {
            TileContent::Model(model) => Some(model),
            TileContent::Empty => None,
        }
    }
}

/// A decoded model: primitives plus the materials and images they reference.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub primitives: Vec<Primitive>,
    pub materials: Vec<MaterialInfo>,
    pub images: Vec<ImageData>,
}

impl Model {
    pub fn triangle_count(&self) -> u64 {
        self.primitives.iter().map(Primitive::triangle_count).sum()
    }

    /// Material referenced by a primitive, if the reference resolves.
    pub fn material_of(&self, primitive: &Primitive) -> Option<&MaterialInfo> {
        primitive.material.and_then(|i| self.materials.get(i))
    }

    /// Base color image referenced by a primitive's material.
    pub fn base_color_image_of(&self, primitive: &Primitive) -> Option<&ImageData> {
        self.material_of(primitive)?
            .base_color_texture
            .as_ref()
            .and_then(|texture| self.images.get(texture.image))
    }
}

/// RGBA8 image data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// An image filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let texels = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: rgba.repeat(texels),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

pub const WRAP_REPEAT: i32 = 10497;
pub const WRAP_CLAMP_TO_EDGE: i32 = 33071;

/// Sampling parameters of a texture reference.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureInfo {
    /// Index into [`Model::images`].
    pub image: usize,
    pub offset: DVec2,
    pub rotation: f64,
    pub scale: DVec2,
    pub set_index: u64,
    pub wrap_s: i32,
    pub wrap_t: i32,
    pub flip_vertical: bool,
}

impl Default for TextureInfo {
    fn default() -> Self {
        Self {
            image: 0,
            offset: DVec2::ZERO,
            rotation: 0.0,
            scale: DVec2::ONE,
            set_index: 0,
            wrap_s: WRAP_REPEAT,
            wrap_t: WRAP_REPEAT,
            flip_vertical: false,
        }
    }
}

/// Material parameters of a primitive.
///
/// Equality over every field is what decides whether two tiles may share a
/// material resource.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialInfo {
    pub alpha_cutoff: f64,
    pub alpha_mode: AlphaMode,
    pub base_alpha: f64,
    pub base_color_factor: DVec3,
    pub emissive_factor: DVec3,
    pub metallic_factor: f64,
    pub roughness_factor: f64,
    pub double_sided: bool,
    pub has_vertex_colors: bool,
    pub base_color_texture: Option<TextureInfo>,
}

impl Default for MaterialInfo {
    fn default() -> Self {
        Self {
            alpha_cutoff: 0.5,
            alpha_mode: AlphaMode::Opaque,
            base_alpha: 1.0,
            base_color_factor: DVec3::ONE,
            emissive_factor: DVec3::ZERO,
            metallic_factor: 0.0,
            roughness_factor: 1.0,
            double_sided: false,
            has_vertex_colors: false,
            base_color_texture: None,
        }
    }
}

/// A named per-vertex attribute the loader passes through untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomAttribute {
    pub name: String,
    pub values: ArrayValue,
}

/// One drawable primitive of a model.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<Vec3>>,
    /// Texture coordinate sets, indexed by set.
    pub texcoords: Vec<Vec<Vec2>>,
    /// Texture coordinate sets generated for imagery draping.
    pub imagery_texcoords: Vec<Vec<Vec2>>,
    pub vertex_colors: Option<Vec<Vec4>>,
    /// Index into [`Model::materials`].
    pub material: Option<usize>,
    pub double_sided: bool,
    /// Local bounds. Primitives without bounds are not drawn.
    pub bounds: Option<Aabb>,
    /// Node transform within the tile.
    pub transform: DMat4,
    pub features: FeaturesInfo,
    pub properties: Vec<PropertyDescriptor>,
    pub custom_attributes: Vec<CustomAttribute>,
}

impl Primitive {
    /// A bare triangle list with bounds computed from the positions.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(&positions);
        Self {
            positions,
            indices,
            normals: None,
            texcoords: Vec::new(),
            imagery_texcoords: Vec::new(),
            vertex_colors: None,
            material: None,
            double_sided: false,
            bounds,
            transform: DMat4::IDENTITY,
            features: FeaturesInfo::default(),
            properties: Vec::new(),
            custom_attributes: Vec::new(),
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_texcoords(mut self, texcoords: Vec<Vec2>) -> Self {
        self.texcoords.push(texcoords);
        self
    }

    pub fn with_imagery_texcoords(mut self, texcoords: Vec<Vec2>) -> Self {
        self.imagery_texcoords.push(texcoords);
        self
    }

    pub fn with_vertex_colors(mut self, colors: Vec<Vec4>) -> Self {
        self.vertex_colors = Some(colors);
        self
    }

    pub fn with_material(mut self, material: usize) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_features(mut self, features: FeaturesInfo) -> Self {
        self.features = features;
        self
    }

    pub fn with_transform(mut self, transform: DMat4) -> Self {
        self.transform = transform;
        self
    }

    /// Positions, at least one whole triangle and bounds are all present.
    pub fn is_renderable(&self) -> bool {
        !self.positions.is_empty() && !self.triangle_indices().is_empty() && self.bounds.is_some()
    }

    /// Indices of whole triangles. A trailing partial triangle is dropped so
    /// the index list always matches [`face_vertex_counts`](Self::face_vertex_counts).
    pub fn triangle_indices(&self) -> &[u32] {
        &self.indices[..self.indices.len() / 3 * 3]
    }

    pub fn triangle_count(&self) -> u64 {
        (self.indices.len() / 3) as u64
    }

    pub fn has_normals(&self, smooth: bool) -> bool {
        self.normals.is_some() || (smooth && !self.indices.is_empty())
    }

    /// Stored normals, or generated smooth normals when `smooth` is set.
    pub fn resolved_normals(&self, smooth: bool) -> Option<Vec<Vec3>> {
        match &self.normals {
            Some(normals) => Some(normals.clone()),
            None if smooth && !self.indices.is_empty() => {
                Some(smooth_normals(&self.positions, self.triangle_indices()))
            }
            None => None,
        }
    }

    /// One entry of `3` per triangle.
    pub fn face_vertex_counts(&self) -> Vec<i32> {
        vec![3; self.indices.len() / 3]
    }
}
