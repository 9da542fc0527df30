//! Per-core free lists of heavy per-request objects.
//!
//! Request and response envelopes and the streams attached to them are
//! recycled through these pools so the per-request hot path allocates
//! nothing once warmed up. Pools are strictly per core (thread local);
//! handles must never move off core.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

/// An object that can live in a per-core pool.
///
/// `free_resources` drops internal references (buffers, streams, maps)
/// without destructing the object itself; `reset` must leave the object in
/// the exact state of a freshly constructed one.
pub trait Recyclable: Default + 'static {
    /// Upper bound of the per-core free list for this type.
    const POOL_CAPACITY: usize = 28_232;

    fn free_resources(&mut self);

    fn reset(&mut self) {}
}

#[derive(Default)]
struct PoolSlot {
    free_list: Vec<Rc<dyn Any>>,
    allocated: u64,
    recycled: u64,
}

thread_local! {
    static POOLS: RefCell<HashMap<TypeId, PoolSlot>> = RefCell::new(HashMap::new());
}

/// Handle to a pooled object.
///
/// Dropping the handle calls `free_resources` and returns the object to
/// this core's free list, unless the list is at capacity (the object is
/// then destructed) or the object is still shared (it is then deallocated
/// when the last reference goes away; a shared object is never recycled).
pub struct Reusable<T: Recyclable> {
    inner: Option<Rc<RefCell<T>>>,
}

impl<T: Recyclable> Reusable<T> {
    /// Acquire an object from this core's pool, or allocate a fresh one.
    pub fn acquire() -> Reusable<T> {
        let recycled = POOLS.with(|pools| {
            let mut pools = pools.borrow_mut();
            let slot = pools.entry(TypeId::of::<T>()).or_default();
            match slot.free_list.pop() {
                Some(any) => {
                    slot.recycled += 1;
                    Some(any)
                },
                None => {
                    slot.allocated += 1;
                    None
                },
            }
        });
        let rc = match recycled.map(|any| any.downcast::<RefCell<T>>()) {
            Some(Ok(rc)) => rc,
            // the free list is keyed by TypeId, a mismatch cannot happen;
            // fall back to a fresh allocation all the same
            Some(Err(_)) | None => Rc::new(RefCell::new(T::default())),
        };
        rc.borrow_mut().reset();
        Reusable { inner: Some(rc) }
    }

    /// A null handle; dereferencing it panics, like a null `Reusable` in
    /// a freshly reset envelope.
    pub fn null() -> Reusable<T> {
        Reusable { inner: None }
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    pub fn get(&self) -> Ref<'_, T> {
        match &self.inner {
            Some(rc) => rc.borrow(),
            None => panic!("dereferenced a null reusable handle"),
        }
    }

    pub fn get_mut(&self) -> RefMut<'_, T> {
        match &self.inner {
            Some(rc) => rc.borrow_mut(),
            None => panic!("dereferenced a null reusable handle"),
        }
    }

    /// The shared cell behind this handle, for type-erased sharing
    /// (e.g. exposing a pooled stream as `Rc<RefCell<dyn InputStream>>`).
    pub fn share_rc(&self) -> Option<Rc<RefCell<T>>> {
        self.inner.clone()
    }
}

impl<T: Recyclable> Clone for Reusable<T> {
    fn clone(&self) -> Reusable<T> {
        Reusable {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Recyclable> Default for Reusable<T> {
    fn default() -> Reusable<T> {
        Reusable::null()
    }
}

impl<T: Recyclable> Drop for Reusable<T> {
    fn drop(&mut self) {
        let Some(rc) = self.inner.take() else {
            return;
        };
        // recycle only when this handle is the unique owner; a shared
        // object is deallocated normally when its last reference drops
        if Rc::strong_count(&rc) != 1 {
            return;
        }
        let Ok(mut obj) = rc.try_borrow_mut() else {
            return;
        };
        obj.free_resources();
        drop(obj);
        // pools are torn down with the core; after that, just deallocate
        let _ = POOLS.try_with(|pools| {
            let mut pools = pools.borrow_mut();
            let slot = pools.entry(TypeId::of::<T>()).or_default();
            if slot.free_list.len() < T::POOL_CAPACITY {
                slot.free_list.push(rc as Rc<dyn Any>);
            }
        });
    }
}

/// Number of objects currently parked in this core's free list for `T`.
pub fn free_list_size<T: Recyclable>() -> usize {
    POOLS.with(|pools| {
        pools
            .borrow()
            .get(&TypeId::of::<T>())
            .map(|slot| slot.free_list.len())
            .unwrap_or(0)
    })
}

/// (allocated, recycled) counters of this core's pool for `T`.
pub fn pool_stats<T: Recyclable>() -> (u64, u64) {
    POOLS.with(|pools| {
        pools
            .borrow()
            .get(&TypeId::of::<T>())
            .map(|slot| (slot.allocated, slot.recycled))
            .unwrap_or((0, 0))
    })
}
