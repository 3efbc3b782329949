//! In-process [`SceneBackend`] that records every write.
//!
//! Used by tests and the demo binary. It enforces the same schema rules a
//! real store would and keeps counters so callers can assert how much work
//! a frame produced.

use rustc_hash::FxHashMap;

use crate::attribute::{ArrayValue, AttributeSchema, AttributeValue};
use crate::backend::{ResourceId, ResourceKind, SceneBackend, SceneError};

/// Everything written to one resource.
#[derive(Clone, Debug)]
pub struct MemoryResource {
    pub kind: ResourceKind,
    pub name: String,
    pub schema: Option<AttributeSchema>,
    pub visible: bool,
    values: FxHashMap<String, AttributeValue>,
    arrays: FxHashMap<String, ArrayValue>,
}

impl MemoryResource {
    fn new(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            schema: None,
            visible: false,
            values: FxHashMap::default(),
            arrays: FxHashMap::default(),
        }
    }

    /// Last scalar value written under `name`.
    pub fn value(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    /// Last array written under `name`.
    pub fn array(&self, name: &str) -> Option<&ArrayValue> {
        self.arrays.get(name)
    }
}

/// Running totals of backend calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendCounters {
    pub created: u64,
    pub destroyed: u64,
    pub schema_declarations: u64,
    pub value_writes: u64,
    pub array_writes: u64,
    pub visibility_writes: u64,
}

/// A scene backend that keeps all resources in a hash map.
pub struct MemoryBackend {
    resources: FxHashMap<ResourceId, MemoryResource>,
    next_id: u64,
    alive: bool,
    counters: BackendCounters,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            resources: FxHashMap::default(),
            next_id: 1,
            alive: true,
            counters: BackendCounters::default(),
        }
    }

    /// Simulate host teardown. Every later call fails with
    /// [`SceneError::BackendShutdown`].
    pub fn shutdown(&mut self) {
        tracing::debug!(live = self.resources.len(), "memory backend shut down");
        self.alive = false;
    }

    pub fn resource(&self, id: ResourceId) -> Option<&MemoryResource> {
        self.resources.get(&id)
    }

    /// Number of resources not yet destroyed.
    pub fn live_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of live resources of one kind.
    pub fn live_count_of(&self, kind: ResourceKind) -> usize {
        self.resources.values().filter(|r| r.kind == kind).count()
    }

    pub fn counters(&self) -> BackendCounters {
        self.counters
    }

    /// Reset the counters without touching resources.
    pub fn reset_counters(&mut self) {
        self.counters = BackendCounters::default();
    }

    pub fn value(&self, id: ResourceId, name: &str) -> Option<&AttributeValue> {
        self.resources.get(&id).and_then(|r| r.value(name))
    }

    pub fn array(&self, id: ResourceId, name: &str) -> Option<&ArrayValue> {
        self.resources.get(&id).and_then(|r| r.array(name))
    }

    /// `false` for unknown resources.
    pub fn is_visible(&self, id: ResourceId) -> bool {
        self.resources.get(&id).is_some_and(|r| r.visible)
    }

    fn check_alive(&self) -> Result<(), SceneError> {
        if self.alive {
            Ok(())
        } else {
            Err(SceneError::BackendShutdown)
        }
    }

    fn check_declared(
        &self,
        id: ResourceId,
        name: &str,
        actual: crate::AttributeType,
    ) -> Result<(), SceneError> {
        let resource = self
            .resources
            .get(&id)
            .ok_or(SceneError::UnknownResource(id))?;
        let expected = resource
            .schema
            .as_ref()
            .and_then(|schema| schema.get(name))
            .ok_or_else(|| SceneError::UndeclaredAttribute {
                id,
                name: name.to_string(),
            })?;
        if expected != actual {
            return Err(SceneError::TypeMismatch {
                id,
                name: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBackend for MemoryBackend {
    fn is_alive(&self) -> bool {
        self.alive
    }

    fn create_resource(&mut self, kind: ResourceKind, name: &str) -> Result<ResourceId, SceneError> {
        self.check_alive()?;
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.resources.insert(id, MemoryResource::new(kind, name));
        self.counters.created += 1;
        Ok(id)
    }

    fn destroy_resource(&mut self, id: ResourceId) -> Result<(), SceneError> {
        self.check_alive()?;
        self.resources
            .remove(&id)
            .ok_or(SceneError::UnknownResource(id))?;
        self.counters.destroyed += 1;
        Ok(())
    }

    fn declare_schema(&mut self, id: ResourceId, schema: &AttributeSchema) -> Result<(), SceneError> {
        self.check_alive()?;
        let resource = self
            .resources
            .get_mut(&id)
            .ok_or(SceneError::UnknownResource(id))?;
        if resource.schema.is_some() {
            return Err(SceneError::SchemaAlreadyDeclared(id));
        }
        resource.schema = Some(schema.clone());
        self.counters.schema_declarations += 1;
        Ok(())
    }

    fn write_attribute(
        &mut self,
        id: ResourceId,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), SceneError> {
        self.check_alive()?;
        self.check_declared(id, name, value.ty())?;
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.values.insert(name.to_string(), value);
        }
        self.counters.value_writes += 1;
        Ok(())
    }

    fn write_array(&mut self, id: ResourceId, name: &str, value: ArrayValue) -> Result<(), SceneError> {
        self.check_alive()?;
        self.check_declared(id, name, value.ty())?;
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.arrays.insert(name.to_string(), value);
        }
        self.counters.array_writes += 1;
        Ok(())
    }

    fn set_visibility(&mut self, id: ResourceId, visible: bool) -> Result<(), SceneError> {
        self.check_alive()?;
        let resource = self
            .resources
            .get_mut(&id)
            .ok_or(SceneError::UnknownResource(id))?;
        resource.visible = visible;
        self.counters.visibility_writes += 1;
        Ok(())
    }
}
