//! Pooled texture resources. Textures have no structural variation, so one
//! global pool serves every tileset.

use strata_content::ImageData;
use strata_scene::{
    ArrayValue, AttributeSchema, AttributeType, AttributeValue, ResourceId, ResourceKind,
    SceneBackend, SceneError,
};

use crate::pool::{CreateContext, KeyedPool, PooledResource};

pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const PIXELS: &str = "pixels";
pub const FORMAT: &str = "format";

pub const RGBA8: &str = "rgba8";

pub fn texture_schema() -> AttributeSchema {
    AttributeSchema::new()
        .with(WIDTH, AttributeType::UInt64)
        .with(HEIGHT, AttributeType::UInt64)
        .with(PIXELS, AttributeType::ByteArray)
        .with(FORMAT, AttributeType::Token)
}

#[derive(Clone, Debug)]
pub struct Texture {
    id: ResourceId,
}

impl Texture {
    pub fn set_image(
        &self,
        backend: &mut dyn SceneBackend,
        image: &ImageData,
    ) -> Result<(), SceneError> {
        let (width, height) = (u64::from(image.width), u64::from(image.height));
        backend.write_attribute(self.id, WIDTH, AttributeValue::UInt64(width))?;
        backend.write_attribute(self.id, HEIGHT, AttributeValue::UInt64(height))?;
        backend.write_attribute(self.id, FORMAT, AttributeValue::Token(RGBA8.to_string()))?;
        backend.write_array(self.id, PIXELS, ArrayValue::Byte(image.pixels.clone()))
    }

    fn reset(&self, backend: &mut dyn SceneBackend) -> Result<(), SceneError> {
        backend.write_attribute(self.id, WIDTH, AttributeValue::UInt64(0))?;
        backend.write_attribute(self.id, HEIGHT, AttributeValue::UInt64(0))?;
        backend.write_array(self.id, PIXELS, ArrayValue::Byte(Vec::new()))
    }
}

impl PooledResource for Texture {
    const KIND: ResourceKind = ResourceKind::Texture;
    type Definition = ();

    fn create(
        backend: &mut dyn SceneBackend,
        _definition: &(),
        ctx: &CreateContext,
    ) -> Result<Self, SceneError> {
        let id = backend.create_resource(Self::KIND, &ctx.name)?;
        backend.declare_schema(id, &texture_schema())?;
        Ok(Self { id })
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

pub type TexturePool = KeyedPool<Texture>;
