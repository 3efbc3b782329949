//! The write-only contract the streaming engine uses to publish resources.

use crate::attribute::{ArrayValue, AttributeSchema, AttributeType, AttributeValue};

/// Opaque identity of a resource owned by a [`SceneBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The three resource families the engine creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
}

impl ResourceKind {
    /// Lower-case label used in resource names and log output.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Geometry => "geometry",
            ResourceKind::Material => "material",
            ResourceKind::Texture => "texture",
        }
    }
}

/// Errors reported by a scene backend.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),

    #[error("schema already declared for resource {0}")]
    SchemaAlreadyDeclared(ResourceId),

    #[error("attribute `{name}` is not declared on resource {id}")]
    UndeclaredAttribute { id: ResourceId, name: String },

    #[error("attribute `{name}` on resource {id} expects {expected:?}, got {actual:?}")]
    TypeMismatch {
        id: ResourceId,
        name: String,
        expected: AttributeType,
        actual: AttributeType,
    },

    #[error("scene backend is shut down")]
    BackendShutdown,
}

/// A scene-description store that accepts resources and attribute writes.
///
/// All calls happen on the main thread. Implementations decide how writes
/// reach a renderer; the engine only relies on the checks described here.
pub trait SceneBackend {
    /// `false` once the backend has been torn down. Releases that arrive
    /// afterwards must skip backend writes.
    fn is_alive(&self) -> bool;

    /// Create a new empty resource. `name` is a diagnostic path.
    fn create_resource(&mut self, kind: ResourceKind, name: &str) -> Result<ResourceId, SceneError>;

    /// Destroy a resource and everything written to it.
    fn destroy_resource(&mut self, id: ResourceId) -> Result<(), SceneError>;

    /// Declare the fixed attribute set of a resource. Allowed once per resource.
    fn declare_schema(&mut self, id: ResourceId, schema: &AttributeSchema) -> Result<(), SceneError>;

    /// Write a scalar attribute. The name and type must match the schema.
    fn write_attribute(
        &mut self,
        id: ResourceId,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), SceneError>;

    /// Replace an array attribute wholesale.
    fn write_array(&mut self, id: ResourceId, name: &str, value: ArrayValue) -> Result<(), SceneError>;

    /// Toggle whether a resource is drawn.
    fn set_visibility(&mut self, id: ResourceId, visible: bool) -> Result<(), SceneError>;
}
