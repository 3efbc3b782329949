use strata_resources::ResourceError;
use strata_scene::SceneError;

use crate::streamer::TileKey;

/// Errors from committing, updating or releasing tiles.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Only one imagery layer per tile is supported.
    #[error("tile {tile_id} already has an imagery layer attached")]
    ImageryLayerOccupied { tile_id: i64 },

    #[error("tileset {0} was created without an imagery layer")]
    ImageryDisabled(i64),

    #[error("tile {0} is not loaded")]
    UnknownTile(TileKey),
}
