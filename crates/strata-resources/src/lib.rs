//! Structural resource pooling for streamed tiles.
//!
//! Backend resources are expensive to create and their attribute schema is
//! fixed at creation. Pools pre-create resources per structural definition
//! and hand them out on acquire; release resets a resource and returns it.

pub mod definition;
pub mod error;
pub mod geometry;
pub mod manager;
pub mod material;
pub mod pool;
pub mod texture;

pub use definition::{AttributeInfo, GeometryDefinition, MaterialDefinition, TilesetMaterialId};
pub use error::ResourceError;
pub use geometry::{Geometry, GeometryData, GeometryPool};
pub use manager::{
    GeometryHandle, ManagerSettings, MaterialHandle, MaterialRequest, PoolPolicy, ResourceManager,
    ResourceStatistics, SlotRef, TextureHandle,
};
pub use material::{Material, MaterialPool};
pub use pool::{CreateContext, DefaultTextures, KeyedPool, PoolSlot, PooledResource, ResourcePool};
pub use texture::{Texture, TexturePool};
