use strata_scene::{ResourceId, ResourceKind, SceneError};

/// Errors reported by pools and the resource manager.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// Every slot of the pool is occupied. The tile is not renderable this frame.
    #[error("{kind:?} pool exhausted (capacity {capacity})")]
    PoolExhausted { kind: ResourceKind, capacity: usize },

    /// The handle does not belong to any live pool slot or shared entry.
    #[error("unknown {kind:?} handle for resource {id}")]
    UnknownHandle { kind: ResourceKind, id: ResourceId },

    /// Pooling policy can only change before the first pool of a kind exists.
    #[error("{0:?} pooling policy is locked once a pool exists")]
    PolicyLocked(ResourceKind),

    #[error(transparent)]
    Scene(#[from] SceneError),
}
