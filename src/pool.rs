//! Per-type instance pool for struct actions.
//!
//! The pool is a batched allocator, not an object cache: instances are built
//! a slab at a time and handed out exactly once. Nothing is ever returned to
//! the pool, so state a handler leaves on its instance dies with the request.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// Default number of instances built per slab.
pub const DEFAULT_POOL_SIZE: usize = 2000;

/// Hands out fresh `T::default()` values, allocating them `size` at a time.
pub struct Pool<T> {
    size: usize,
    slab: Mutex<Vec<T>>,
}

impl<T: Default> Pool<T> {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1), slab: Mutex::new(Vec::new()) }
    }

    /// Takes one zero-initialised instance, refilling the slab when empty.
    pub fn take(&self) -> T {
        let mut slab = self.slab.lock();
        if slab.is_empty() {
            trace!(ty = std::any::type_name::<T>(), size = self.size, "allocating instance slab");
            slab.extend((0..self.size).map(|_| T::default()));
        }
        slab.pop().unwrap_or_default()
    }

    /// Instances allocated but not yet handed out.
    pub fn available(&self) -> usize {
        self.slab.lock().len()
    }
}

/// One pool per action type, shared by every route registering that type.
#[derive(Clone, Default)]
pub(crate) struct Pools {
    pools: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Pools {
    pub(crate) fn get_or_create<T>(&mut self, size: usize) -> Arc<Pool<T>>
    where
        T: Default + Send + 'static,
    {
        let erased = self
            .pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(Pool::<T>::new(size)) as Arc<dyn Any + Send + Sync>);
        match Arc::clone(erased).downcast::<Pool<T>>() {
            Ok(pool) => pool,
            // The map is keyed by TypeId, so the downcast cannot miss.
            Err(_) => Arc::new(Pool::new(size)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    #[test]
    fn instances_are_fresh() {
        let pool = Pool::<Counter>::new(4);
        let mut a = pool.take();
        a.hits += 1;
        let b = pool.take();
        assert_eq!(b.hits, 0);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn refills_when_exhausted() {
        let pool = Pool::<Counter>::new(2);
        pool.take();
        pool.take();
        assert_eq!(pool.available(), 0);
        pool.take();
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn pools_are_shared_per_type() {
        let mut pools = Pools::default();
        let a = pools.get_or_create::<Counter>(8);
        let b = pools.get_or_create::<Counter>(8);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
