use crate::error::{SdnError, SdnResult};

/// Opaque handle into a `Pool`. Reused once its slot is freed, so callers
/// must not keep a handle alive past a `free` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(usize);

/// Bounded, index-reuse arena mirroring the original's `MEMB` allocator:
/// fixed capacity, never evicts, signals `PoolFull` once exhausted.
/// An index-based free list is the natural Rust analogue of the
/// original's pointer-linked free chunks.
pub struct Pool<T> {
    name: &'static str,
    capacity: usize,
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> Pool<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Pool {
            name,
            capacity,
            slots: Vec::with_capacity(capacity.min(64)),
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self, value: T) -> SdnResult<PoolHandle> {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(value);
            return Ok(PoolHandle(idx));
        }
        if self.slots.len() >= self.capacity {
            return Err(SdnError::PoolFull { pool: self.name });
        }
        self.slots.push(Some(value));
        Ok(PoolHandle(self.slots.len() - 1))
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots.get(handle.0).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.0).and_then(|slot| slot.as_mut())
    }

    pub fn free_handle(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.0)?;
        let value = slot.take()?;
        self.free.push(handle.0);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_until_full_then_pool_full() {
        let mut pool: Pool<u32> = Pool::new("test", 2);
        let a = pool.alloc(1).unwrap();
        let _b = pool.alloc(2).unwrap();
        assert_eq!(pool.alloc(3), Err(SdnError::PoolFull { pool: "test" }));
        pool.free_handle(a);
        // freeing makes room again without evicting the surviving entry.
        let c = pool.alloc(4).unwrap();
        assert_eq!(*pool.get(c).unwrap(), 4);
        assert_eq!(*pool.get(_b).unwrap(), 2);
    }

    #[test]
    fn free_then_get_returns_none() {
        let mut pool: Pool<u32> = Pool::new("test", 4);
        let h = pool.alloc(10).unwrap();
        assert_eq!(pool.free_handle(h), Some(10));
        assert!(pool.get(h).is_none());
        assert!(pool.free_handle(h).is_none());
    }

    #[test]
    fn len_reflects_live_entries_only() {
        let mut pool: Pool<u32> = Pool::new("test", 4);
        assert!(pool.is_empty());
        let a = pool.alloc(1).unwrap();
        let _b = pool.alloc(2).unwrap();
        assert_eq!(pool.len(), 2);
        pool.free_handle(a);
        assert_eq!(pool.len(), 1);
    }
}
