//! Synthetic terrain tiles for the demo.

use glam::{DMat4, DVec3, Vec2, Vec3, Vec4};
use rand::Rng;
use strata_content::{ImageData, MaterialInfo, Model, Primitive, TextureInfo, TileContent};

/// Vertices per tile edge.
const GRID: u32 = 9;

/// Edge length of a tile in meters.
pub const TILE_SIZE: f64 = 256.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileStyle {
    /// Vertex colors, no material.
    Plain,
    /// A flat material shared across tiles.
    Flat,
    /// A base color texture, pooled per tile.
    Textured,
}

impl TileStyle {
    pub fn for_index(index: u64) -> Self {
        match index % 3 {
            0 => TileStyle::Plain,
            1 => TileStyle::Flat,
            _ => TileStyle::Textured,
        }
    }
}

/// Placement of tile `(x, y)` in the tileset's east-north-up frame.
pub fn tile_transform(x: u32, y: u32) -> DMat4 {
    DMat4::from_translation(DVec3::new(f64::from(x) * TILE_SIZE, f64::from(y) * TILE_SIZE, 0.0))
}

/// A height-field patch with random relief.
pub fn terrain_tile(rng: &mut impl Rng, style: TileStyle) -> TileContent {
    let step = TILE_SIZE as f32 / (GRID - 1) as f32;
    let mut positions = Vec::with_capacity((GRID * GRID) as usize);
    let mut texcoords = Vec::with_capacity(positions.capacity());
    for row in 0..GRID {
        for col in 0..GRID {
            let height = rng.gen_range(0.0..12.0);
            positions.push(Vec3::new(col as f32 * step, row as f32 * step, height));
            texcoords.push(Vec2::new(col as f32, row as f32) / (GRID - 1) as f32);
        }
    }

    let mut indices = Vec::with_capacity(((GRID - 1) * (GRID - 1) * 6) as usize);
    for row in 0..GRID - 1 {
        for col in 0..GRID - 1 {
            let i = row * GRID + col;
            indices.extend_from_slice(&[i, i + 1, i + GRID + 1, i, i + GRID + 1, i + GRID]);
        }
    }

    let primitive = Primitive::new(positions, indices).with_texcoords(texcoords);
    let model = match style {
        TileStyle::Plain => {
            let colors = (0..GRID * GRID)
                .map(|_| Vec4::new(rng.gen_range(0.2..0.8), 0.6, 0.3, 1.0))
                .collect();
            Model {
                primitives: vec![primitive.with_vertex_colors(colors)],
                ..Model::default()
            }
        }
        TileStyle::Flat => Model {
            primitives: vec![primitive.with_material(0)],
            materials: vec![MaterialInfo {
                base_color_factor: DVec3::new(0.55, 0.5, 0.4),
                roughness_factor: 0.9,
                ..MaterialInfo::default()
            }],
            images: Vec::new(),
        },
        TileStyle::Textured => {
            let shade = rng.gen_range(64..=255);
            Model {
                primitives: vec![primitive.with_material(0)],
                materials: vec![MaterialInfo {
                    base_color_texture: Some(TextureInfo::default()),
                    ..MaterialInfo::default()
                }],
                images: vec![ImageData::solid(16, 16, [shade, shade, 96, 255])],
            }
        }
    };
    TileContent::Model(model)
}

/// A checkerboard standing in for a draped imagery tile.
pub fn imagery_image(size: u32) -> ImageData {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let value = if (x / 4 + y / 4) % 2 == 0 { 230 } else { 40 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    ImageData {
        width: size,
        height: size,
        pixels,
    }
}
