//! Reference-counted object manager.
//!
//! Every driver-managed resource is an [`Object`]: a typed allocation
//! with an atomic reference count, a back-reference to its type, and an
//! entry in a global liveness registry. The count is the only ownership
//! record; whoever drives it to zero runs the type's delete procedure
//! and unlinks the object.
//!
//! Key responsibilities:
//! - Validate creation parameters against the fixed flag mask.
//! - Keep the increment/decrement fast path lock-free; the registry
//!   mutex guards only O(1) link/unlink.
//! - Guarantee the zero transition is observed by exactly one
//!   dereferencer, so the delete procedure fires exactly once.
//! - Bootstrap the self-describing root type before any other type.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::debug;

use crate::error::ObjectError;

/// Allocation flags.
pub mod flags {
    /// Raise a fatal allocation fault instead of returning an error when
    /// storage cannot be allocated.
    pub const RAISE_ON_FAIL: u32 = 0x0000_0001;
    /// Allocate from the paged pool.
    pub const PAGED: u32 = 0x0000_0002;
    /// Allocate from the non-paged pool.
    pub const NON_PAGED: u32 = 0x0000_0004;
    /// Every bit a caller may set.
    pub const VALID_MASK: u32 = 0x0000_0007;
}

/// Pool class an object is allocated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolKind {
    Paged,
    NonPaged,
}

/// Called exactly once when an object of the type reaches zero
/// references, before the object is unlinked from the registry. Receives
/// the object body, its creation flags, and its size.
pub type DeleteProcedure = Box<dyn Fn(&(dyn Any + Send + Sync), u32, usize) + Send + Sync>;

/// Body of a type object: describes a family of objects.
pub struct TypeDescriptor {
    default_pool: PoolKind,
    delete: Option<DeleteProcedure>,
    live: AtomicI64,
}

impl TypeDescriptor {
    fn new(default_pool: PoolKind, delete: Option<DeleteProcedure>) -> Self {
        Self {
            default_pool,
            delete,
            live: AtomicI64::new(0),
        }
    }

    /// Number of live objects of this type. The root type counts itself.
    pub fn live_objects(&self) -> i64 {
        self.live.load(Ordering::Acquire)
    }

    pub fn default_pool(&self) -> PoolKind {
        self.default_pool
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("default_pool", &self.default_pool)
            .field("has_delete", &self.delete.is_some())
            .field("live", &self.live_objects())
            .finish()
    }
}

/// A type object. Types are themselves objects, described by the root
/// type; the root type describes itself.
pub type TypeObject = Object<TypeDescriptor>;

struct ObjectHeader {
    id: u64,
    refs: AtomicI64,
    flags: u32,
    size: usize,
    pool: PoolKind,
    /// Non-owning, like the original's raw type pointer: the registry's
    /// strong reference keeps a registered type alive, not its objects.
    ty: Weak<ObjectInner<TypeDescriptor>>,
}

struct ObjectInner<T> {
    header: ObjectHeader,
    body: T,
}

/// Header access for heterogeneous registry storage.
trait AnyObject: Send + Sync {
    fn header(&self) -> &ObjectHeader;
    fn body_any(&self) -> &(dyn Any + Send + Sync);
}

impl<T: Send + Sync + 'static> AnyObject for ObjectInner<T> {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn body_any(&self) -> &(dyn Any + Send + Sync) {
        &self.body
    }
}

/// Shared handle to a managed object.
///
/// Cloning a handle copies the pointer and nothing else: the managed
/// reference count moves only through [`ObjectManager::reference`] and
/// [`ObjectManager::dereference`]. Storage is released once the object
/// is logically freed *and* the last handle is gone, so a stale handle
/// can never touch freed memory.
pub struct Object<T> {
    inner: Arc<ObjectInner<T>>,
}

impl<T> Clone for Object<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::ops::Deref for Object<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.body
    }
}

impl<T> Object<T> {
    /// Current reference count. Diagnostic only; it may change under the
    /// caller's feet.
    pub fn ref_count(&self) -> i64 {
        self.inner.header.refs.load(Ordering::Acquire)
    }

    /// Creation flags.
    pub fn flags(&self) -> u32 {
        self.inner.header.flags
    }

    /// Body size, excluding bookkeeping.
    pub fn size(&self) -> usize {
        self.inner.header.size
    }

    /// Pool class the object was allocated from.
    pub fn pool(&self) -> PoolKind {
        self.inner.header.pool
    }

    /// Two handles to the same object.
    pub fn same_object(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T> std::fmt::Debug for Object<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.inner.header.id)
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// The object manager: registry of every live object plus the root type.
pub struct ObjectManager {
    registry: Mutex<HashMap<u64, Arc<dyn AnyObject>>>,
    next_id: AtomicU64,
    root: TypeObject,
}

impl ObjectManager {
    /// Initialize the manager and bootstrap the root type.
    ///
    /// The root type is built in two phases: the type object is
    /// allocated with no type to describe it (nothing exists yet), then
    /// its own type reference is patched to point at itself. Its live
    /// count starts at 1 because the root type is an object of itself.
    pub fn new() -> Self {
        let root_inner = Arc::new_cyclic(|self_ref: &Weak<ObjectInner<TypeDescriptor>>| {
            ObjectInner {
                header: ObjectHeader {
                    id: 1,
                    refs: AtomicI64::new(1),
                    flags: 0,
                    size: size_of::<TypeDescriptor>(),
                    pool: PoolKind::NonPaged,
                    ty: self_ref.clone(),
                },
                body: TypeDescriptor::new(PoolKind::NonPaged, None),
            }
        });
        root_inner.body.live.store(1, Ordering::Release);

        let mut registry: HashMap<u64, Arc<dyn AnyObject>> = HashMap::new();
        registry.insert(1, root_inner.clone());

        Self {
            registry: Mutex::new(registry),
            next_id: AtomicU64::new(2),
            root: Object { inner: root_inner },
        }
    }

    /// The bootstrap root type.
    pub fn root_type(&self) -> &TypeObject {
        &self.root
    }

    /// Allocate a managed object.
    ///
    /// `flags` must stay within [`flags::VALID_MASK`] and may select at
    /// most one pool class. `ty` is required: the only objects without a
    /// described type are created internally while bootstrapping the
    /// root. `extra_refs` must be non-negative; the new object's count
    /// is `1 + extra_refs`.
    pub fn create<T: Send + Sync + 'static>(
        &self,
        body: T,
        obj_flags: u32,
        ty: Option<&TypeObject>,
        extra_refs: i64,
    ) -> Result<Object<T>, ObjectError> {
        if obj_flags & !flags::VALID_MASK != 0 {
            return Err(ObjectError::InvalidArgument("flags outside the valid mask"));
        }
        if obj_flags & flags::PAGED != 0 && obj_flags & flags::NON_PAGED != 0 {
            return Err(ObjectError::InvalidArgument(
                "an object cannot live in both pools",
            ));
        }
        let Some(ty) = ty else {
            // Only the internal root bootstrap may omit the type.
            return Err(ObjectError::InvalidArgument(
                "a type is required once the root type exists",
            ));
        };
        if extra_refs < 0 {
            return Err(ObjectError::InvalidArgument(
                "additional reference count is negative",
            ));
        }

        let pool = if obj_flags & flags::PAGED != 0 {
            PoolKind::Paged
        } else if obj_flags & flags::NON_PAGED != 0 {
            PoolKind::NonPaged
        } else {
            ty.default_pool()
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::new(ObjectInner {
            header: ObjectHeader {
                id,
                refs: AtomicI64::new(1 + extra_refs),
                flags: obj_flags,
                size: size_of::<T>(),
                pool,
                ty: Arc::downgrade(&ty.inner),
            },
            body,
        });

        ty.live.fetch_add(1, Ordering::AcqRel);

        let mut registry = lock(&self.registry);
        registry.insert(id, inner.clone());
        drop(registry);

        Ok(Object { inner })
    }

    /// Create an object type. Types are ordinary objects of the root
    /// type; creation fails exactly like [`ObjectManager::create`].
    pub fn create_type(
        &self,
        default_pool: PoolKind,
        delete: Option<DeleteProcedure>,
    ) -> Result<TypeObject, ObjectError> {
        self.create(
            TypeDescriptor::new(default_pool, delete),
            0,
            Some(&self.root),
            0,
        )
    }

    /// Add one reference.
    pub fn reference<T>(&self, object: &Object<T>) {
        self.reference_ex(object, 1);
    }

    /// Add `count` references, returning the previous count.
    ///
    /// # Panics
    /// A negative `count` is a caller contract violation and panics.
    pub fn reference_ex<T>(&self, object: &Object<T>, count: i64) -> i64 {
        assert!(count >= 0, "negative reference delta");
        object.inner.header.refs.fetch_add(count, Ordering::Relaxed)
    }

    /// Remove one reference; returns whether the object was freed.
    pub fn dereference<T: Send + Sync + 'static>(&self, object: &Object<T>) -> bool {
        self.dereference_ex(object, 1).1
    }

    /// Remove `count` references, returning the previous count and
    /// whether this call freed the object.
    ///
    /// Exactly one concurrent dereferencer observes the zero transition.
    /// That caller runs the type's delete procedure *before* the object
    /// is unlinked from the registry, then decrements the type's live
    /// count, then unlinks under the registry mutex. Storage is released
    /// when the last handle drops.
    ///
    /// # Panics
    /// A negative `count`, or dereferencing below zero, is a caller
    /// contract violation and panics.
    pub fn dereference_ex<T: Send + Sync + 'static>(
        &self,
        object: &Object<T>,
        count: i64,
    ) -> (i64, bool) {
        assert!(count >= 0, "negative dereference delta");
        let header = &object.inner.header;
        let previous = header.refs.fetch_sub(count, Ordering::AcqRel);
        let remaining = previous - count;
        assert!(remaining >= 0, "object {} dereferenced below zero", header.id);

        if remaining != 0 || count == 0 {
            return (previous, false);
        }

        if let Some(ty) = header.ty.upgrade() {
            if let Some(delete) = &ty.body.delete {
                // The object is still registered here; the procedure may
                // observe it in the registry.
                delete(object.inner.body_any(), header.flags, header.size);
            }
            ty.body.live.fetch_sub(1, Ordering::AcqRel);
        }

        let mut registry = lock(&self.registry);
        registry.remove(&header.id);
        drop(registry);

        (previous, true)
    }

    /// The object's type. `None` only if the type itself has already
    /// been torn down, which no well-behaved caller can arrange.
    pub fn type_of<T>(&self, object: &Object<T>) -> Option<TypeObject> {
        object
            .inner
            .header
            .ty
            .upgrade()
            .map(|inner| Object { inner })
    }

    /// Number of objects currently registered, the root type included.
    pub fn registered_objects(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Release every registered object regardless of its reference
    /// count. Delete procedures are not run; this is the bulk teardown
    /// path for driver unload, not an orderly dereference.
    pub fn teardown(&self) {
        let mut registry = lock(&self.registry);
        let drained = registry.len();
        registry.clear();
        drop(registry);
        debug!("object manager teardown released {drained} objects");
    }
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Registry critical sections cannot panic; recover the guard anyway.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_type_describes_itself() {
        let manager = ObjectManager::new();
        let root = manager.root_type().clone();
        let ty = manager.type_of(&root).expect("root type is alive");
        assert!(Object::same_object(&ty, &root));
        assert_eq!(root.live_objects(), 1);
    }

    #[test]
    fn create_requires_a_type_after_bootstrap() {
        let manager = ObjectManager::new();
        let err = manager.create(0u64, 0, None, 0).unwrap_err();
        assert!(matches!(err, ObjectError::InvalidArgument(_)));
    }

    #[test]
    fn both_pool_flags_rejected() {
        let manager = ObjectManager::new();
        let root = manager.root_type().clone();
        let err = manager
            .create(0u64, flags::PAGED | flags::NON_PAGED, Some(&root), 0)
            .unwrap_err();
        assert!(matches!(err, ObjectError::InvalidArgument(_)));
    }
}
