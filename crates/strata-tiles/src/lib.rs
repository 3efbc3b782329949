//! Tile-to-scene synchronization.
//!
//! Decoded tiles are prepared on worker threads into move-only
//! [`PendingTile`]s, committed on the main thread into pooled backend
//! resources, and released back to the pools on unload. Once per frame every
//! committed tile's transform is recomposed against the current origin.

pub mod bridge;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod prepare;
pub mod streamer;

pub use bridge::{
    IMAGERY_LAYER, PrimitiveResources, RenderResourcesBridge, TileRenderResources, TilesetOptions,
};
pub use context::StreamingContext;
pub use error::BridgeError;
pub use pipeline::{TilePipeline, TileResult, TileTask};
pub use prepare::{PendingTile, PrepareOptions, PreparedModel, PreparedPrimitive, prepare_tile};
pub use streamer::{FrameReport, TileKey, TileStatus, TileStreamer};
