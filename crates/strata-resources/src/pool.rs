//! Fixed-capacity acquire/release pools of backend resources.
//!
//! A pool is filled once, at construction, and never grows. The only
//! resource-specific behavior is [`PooledResource::set_active`], which runs
//! when a slot changes hands.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use strata_scene::{ResourceId, ResourceKind, SceneBackend, SceneError};

use crate::error::ResourceError;

/// The two built-in textures every material falls back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultTextures {
    /// 1x1 opaque white.
    pub white: ResourceId,
    /// 1x1 transparent white.
    pub transparent: ResourceId,
}

/// Parameters for creating one backend resource.
#[derive(Clone, Debug)]
pub struct CreateContext {
    /// Diagnostic path passed to the backend.
    pub name: String,
    pub default_textures: Option<DefaultTextures>,
}

/// A backend resource that can live in a [`ResourcePool`].
pub trait PooledResource: Clone {
    const KIND: ResourceKind;

    /// Structural key of the pool. `()` for kinds without variation.
    type Definition: Clone + PartialEq + std::fmt::Debug;

    /// Create the backend resource and declare its attribute schema.
    fn create(
        backend: &mut dyn SceneBackend,
        definition: &Self::Definition,
        ctx: &CreateContext,
    ) -> Result<Self, SceneError>;

    fn resource_id(&self) -> ResourceId;

    /// `true` when a slot is handed out, `false` to hide and reset it.
    fn set_active(&self, backend: &mut dyn SceneBackend, active: bool) -> Result<(), SceneError>;

    fn destroy(&self, backend: &mut dyn SceneBackend) -> Result<(), SceneError> {
        backend.destroy_resource(self.resource_id())
    }
}

#[derive(Debug)]
pub struct PoolSlot<T> {
    pub resource: T,
    pub occupied: bool,
}

/// Generic fixed-capacity pool.
///
/// `acquire` always hands out the lowest-index free slot.
#[derive(Debug)]
pub struct ResourcePool<T> {
    slots: Vec<PoolSlot<T>>,
    free: BinaryHeap<Reverse<usize>>,
}

impl<T: PooledResource> ResourcePool<T> {
    /// Wrap already created resources. All slots start unoccupied.
    pub fn new(resources: Vec<T>) -> Self {
        let free = (0..resources.len()).map(Reverse).collect();
        let slots = resources
            .into_iter()
            .map(|resource| PoolSlot {
                resource,
                occupied: false,
            })
            .collect();
        Self { slots, free }
    }

    /// Create `capacity` resources through [`PooledResource::create`].
    ///
    /// On failure every resource created so far is destroyed again.
    pub fn create(
        backend: &mut dyn SceneBackend,
        definition: &T::Definition,
        capacity: usize,
        ctx: impl Fn(usize) -> CreateContext,
    ) -> Result<Self, SceneError> {
        let mut resources = Vec::with_capacity(capacity);
        for index in 0..capacity {
            let created = T::create(backend, definition, &ctx(index))
                .and_then(|resource| resource.set_active(backend, false).map(|()| resource));
            match created {
                Ok(resource) => resources.push(resource),
                Err(err) => {
                    for resource in &resources {
                        let _ = resource.destroy(backend);
                    }
                    return Err(err);
                }
            }
        }
        Ok(Self::new(resources))
    }

    /// Hand out the first unoccupied slot and activate it.
    ///
    /// Fails with [`ResourceError::PoolExhausted`] when every slot is taken.
    /// If activation fails the slot is returned to the free list.
    pub fn acquire(
        &mut self,
        backend: &mut dyn SceneBackend,
    ) -> Result<(usize, T), ResourceError> {
        let Reverse(index) = self.free.pop().ok_or(ResourceError::PoolExhausted {
            kind: T::KIND,
            capacity: self.slots.len(),
        })?;
        let slot = &mut self.slots[index];
        if let Err(err) = slot.resource.set_active(backend, true) {
            self.free.push(Reverse(index));
            return Err(err.into());
        }
        slot.occupied = true;
        Ok((index, slot.resource.clone()))
    }

    /// Return a slot. `id` must match the resource in that slot.
    ///
    /// The slot is freed before the deactivate hook runs; a backend that is
    /// no longer alive is not touched.
    pub fn release(
        &mut self,
        index: usize,
        id: ResourceId,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        let slot = self
            .slots
            .get_mut(index)
            .filter(|slot| slot.occupied && slot.resource.resource_id() == id)
            .ok_or(ResourceError::UnknownHandle { kind: T::KIND, id })?;
        slot.occupied = false;
        self.free.push(Reverse(index));
        if backend.is_alive() {
            slot.resource.set_active(backend, false)?;
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.occupied)
    }

    pub fn slots(&self) -> &[PoolSlot<T>] {
        &self.slots
    }

    /// Destroy every resource, occupied or not. Skipped when the backend is gone.
    pub fn destroy_all(&self, backend: &mut dyn SceneBackend) {
        if !backend.is_alive() {
            return;
        }
        for slot in &self.slots {
            if let Err(err) = slot.resource.destroy(backend) {
                tracing::warn!(kind = ?T::KIND, %err, "failed to destroy pooled resource");
            }
        }
    }
}

/// A pool bound to exactly one definition.
///
/// Construction is where the expensive work happens: every slot's backend
/// resource is created and its schema declared up front.
#[derive(Debug)]
pub struct KeyedPool<T: PooledResource> {
    pool_id: u64,
    definition: T::Definition,
    pool: ResourcePool<T>,
}

impl<T: PooledResource> KeyedPool<T> {
    pub fn new(
        backend: &mut dyn SceneBackend,
        pool_id: u64,
        definition: T::Definition,
        capacity: usize,
        default_textures: Option<DefaultTextures>,
    ) -> Result<Self, SceneError> {
        let kind = T::KIND.label();
        let pool = ResourcePool::create(backend, &definition, capacity, |index| CreateContext {
            name: format!("/{kind}_pool_{pool_id}_object_{index}"),
            default_textures,
        })?;
        tracing::debug!(kind, pool_id, capacity, ?definition, "created pool");
        Ok(Self {
            pool_id,
            definition,
            pool,
        })
    }

    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    pub fn definition(&self) -> &T::Definition {
        &self.definition
    }

    pub fn acquire(&mut self, backend: &mut dyn SceneBackend) -> Result<(usize, T), ResourceError> {
        self.pool.acquire(backend)
    }

    pub fn release(
        &mut self,
        index: usize,
        id: ResourceId,
        backend: &mut dyn SceneBackend,
    ) -> Result<(), ResourceError> {
        self.pool.release(index, id, backend)
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn occupied_count(&self) -> usize {
        self.pool.occupied_count()
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.pool.is_occupied(index)
    }

    pub fn destroy_all(&self, backend: &mut dyn SceneBackend) {
        self.pool.destroy_all(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_scene::{AttributeSchema, AttributeType, AttributeValue, MemoryBackend};

    #[derive(Clone, Debug)]
    struct Stub(ResourceId);

    impl PooledResource for Stub {
        const KIND: ResourceKind = ResourceKind::Geometry;
        type Definition = ();

        fn create(
            backend: &mut dyn SceneBackend,
            _definition: &(),
            ctx: &CreateContext,
        ) -> Result<Self, SceneError> {
            let id = backend.create_resource(Self::KIND, &ctx.name)?;
            let schema = AttributeSchema::new().with("tag", AttributeType::Int64);
            backend.declare_schema(id, &schema)?;
            Ok(Stub(id))
        }

        fn resource_id(&self) -> ResourceId {
            self.0
        }

        fn set_active(
            &self,
            backend: &mut dyn SceneBackend,
            active: bool,
        ) -> Result<(), SceneError> {
            backend.set_visibility(self.0, active)?;
            backend.write_attribute(self.0, "tag", AttributeValue::Int64(-1))
        }
    }

    fn stub_pool(backend: &mut MemoryBackend, capacity: usize) -> ResourcePool<Stub> {
        ResourcePool::create(backend, &(), capacity, |i| CreateContext {
            name: format!("/stub_{i}"),
            default_textures: None,
        })
        .unwrap()
    }

    #[test]
    fn test_create_builds_hidden_resources() {
        let mut backend = MemoryBackend::new();
        let pool = stub_pool(&mut backend, 3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.occupied_count(), 0);
        assert_eq!(backend.live_count(), 3);
        assert_eq!(backend.counters().schema_declarations, 3);
        for slot in pool.slots() {
            assert!(!backend.is_visible(slot.resource.0));
        }
    }

    #[test]
    fn test_first_acquire_returns_slot_zero_active() {
        let mut backend = MemoryBackend::new();
        let mut pool = stub_pool(&mut backend, 2);
        let (index, stub) = pool.acquire(&mut backend).unwrap();
        assert_eq!(index, 0);
        assert!(pool.is_occupied(0));
        assert!(backend.is_visible(stub.0));
    }

    #[test]
    fn test_acquired_handles_are_distinct() {
        let mut backend = MemoryBackend::new();
        let mut pool = stub_pool(&mut backend, 4);
        let mut ids: Vec<_> = (0..4)
            .map(|_| {
                let (_, stub) = pool.acquire(&mut backend).unwrap();
                stub.0
            })
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_exhaustion_leaves_slots_untouched() {
        let mut backend = MemoryBackend::new();
        let mut pool = stub_pool(&mut backend, 2);
        pool.acquire(&mut backend).unwrap();
        pool.acquire(&mut backend).unwrap();
        backend.reset_counters();

        let err = pool.acquire(&mut backend).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::PoolExhausted {
                kind: ResourceKind::Geometry,
                capacity: 2
            }
        ));
        assert_eq!(pool.occupied_count(), 2);
        assert_eq!(backend.counters(), Default::default());
    }

    #[test]
    fn test_release_makes_lowest_slot_reusable() {
        let mut backend = MemoryBackend::new();
        let mut pool = stub_pool(&mut backend, 3);
        let (_, a) = pool.acquire(&mut backend).unwrap();
        let (_, _b) = pool.acquire(&mut backend).unwrap();
        let (_, _c) = pool.acquire(&mut backend).unwrap();

        pool.release(0, a.0, &mut backend).unwrap();
        assert!(!backend.is_visible(a.0));
        assert_eq!(pool.occupied_count(), 2);

        let (index, again) = pool.acquire(&mut backend).unwrap();
        assert_eq!(index, 0);
        assert_eq!(again.0, a.0);
    }

    #[test]
    fn test_double_release_is_rejected() {
        let mut backend = MemoryBackend::new();
        let mut pool = stub_pool(&mut backend, 2);
        let (index, stub) = pool.acquire(&mut backend).unwrap();
        let (_, other) = pool.acquire(&mut backend).unwrap();
        pool.release(index, stub.0, &mut backend).unwrap();

        assert!(matches!(
            pool.release(index, stub.0, &mut backend),
            Err(ResourceError::UnknownHandle { .. })
        ));
        // Wrong identity for an occupied slot.
        assert!(pool.release(1, stub.0, &mut backend).is_err());
        assert!(pool.is_occupied(1));
        assert!(backend.is_visible(other.0));
    }

    #[test]
    fn test_release_after_backend_shutdown() {
        let mut backend = MemoryBackend::new();
        let mut pool = stub_pool(&mut backend, 1);
        let (index, stub) = pool.acquire(&mut backend).unwrap();
        backend.shutdown();
        pool.release(index, stub.0, &mut backend).unwrap();
        assert_eq!(pool.occupied_count(), 0);
        pool.destroy_all(&mut backend);
    }

    #[test]
    fn test_keyed_pool_names_and_definition() {
        let mut backend = MemoryBackend::new();
        let pool = KeyedPool::<Stub>::new(&mut backend, 7, (), 2, None).unwrap();
        assert_eq!(pool.pool_id(), 7);
        assert_eq!(pool.definition(), &());
        assert_eq!(pool.capacity(), 2);
        let first = &pool.pool.slots()[0].resource;
        assert_eq!(
            backend.resource(first.0).unwrap().name,
            "/geometry_pool_7_object_0"
        );

        pool.destroy_all(&mut backend);
        assert_eq!(backend.live_count(), 0);
    }
}
