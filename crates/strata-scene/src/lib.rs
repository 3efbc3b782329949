//! Scene backend contract for the Strata streaming engine.
//!
//! A [`SceneBackend`] owns renderable resources (geometry, materials and
//! textures). Each resource carries a fixed [`AttributeSchema`] declared once
//! at creation; afterwards only declared attributes may be written. The
//! engine never reads back from the backend.

mod attribute;
mod backend;
mod memory;

pub use attribute::{ArrayValue, AttributeDecl, AttributeSchema, AttributeType, AttributeValue};
pub use backend::{ResourceId, ResourceKind, SceneBackend, SceneError};
pub use memory::{BackendCounters, MemoryBackend, MemoryResource};
