//! Fixed-slot object pool for log entry payloads.
//!
//! The volatile log backend stores application-entry payloads in pool slots
//! and keeps only the handle in the log record. Truncation returns the
//! handle to the pool, which preserves the free-exactly-once contract
//! without raw pointer bookkeeping. Slot *size* is fixed at construction;
//! capacity grows by whole chunks so allocation never fails.

/// Handle to one pool slot. Obtained from [`EntryPool::alloc`] and returned
/// via [`EntryPool::free`] exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHandle(u32);

impl PoolHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Object pool of fixed-size byte slots with an O(1) free list.
pub struct EntryPool {
    slot_size: usize,
    chunk_slots: usize,
    chunks: Vec<Box<[u8]>>,
    free_list: Vec<u32>,
    // One flag per slot, indexed by handle. Guards against double free.
    in_use: Vec<bool>,
}

impl EntryPool {
    /// Create a pool whose slots are `slot_size` bytes, growing
    /// `chunk_slots` slots at a time.
    pub fn new(slot_size: usize, chunk_slots: usize) -> Self {
        assert!(slot_size > 0, "pool slot size must be non-zero");
        assert!(chunk_slots > 0, "pool chunk must hold at least one slot");
        Self {
            slot_size,
            chunk_slots,
            chunks: Vec::new(),
            free_list: Vec::new(),
            in_use: Vec::new(),
        }
    }

    /// Allocate a slot, growing the pool by one chunk if none is free.
    pub fn alloc(&mut self) -> PoolHandle {
        if self.free_list.is_empty() {
            self.grow();
        }
        // grow() pushed at least one handle
        let handle = self.free_list.pop().unwrap();
        debug_assert!(!self.in_use[handle as usize]);
        self.in_use[handle as usize] = true;
        PoolHandle(handle)
    }

    /// Return a slot to the pool.
    ///
    /// # Panics
    ///
    /// Panics if the handle is out of range or was already freed; either
    /// means the single-owner contract was broken.
    pub fn free(&mut self, handle: PoolHandle) {
        let idx = handle.index();
        assert!(idx < self.in_use.len(), "pool: freeing unknown handle {idx}");
        assert!(self.in_use[idx], "pool: double free of slot {idx}");
        self.in_use[idx] = false;
        self.free_list.push(handle.0);
    }

    /// Read access to a slot's bytes.
    pub fn slot(&self, handle: PoolHandle) -> &[u8] {
        let (chunk, offset) = self.locate(handle);
        &self.chunks[chunk][offset..offset + self.slot_size]
    }

    /// Write access to a slot's bytes.
    pub fn slot_mut(&mut self, handle: PoolHandle) -> &mut [u8] {
        let (chunk, offset) = self.locate(handle);
        &mut self.chunks[chunk][offset..offset + self.slot_size]
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Number of slots currently handed out.
    pub fn allocated(&self) -> usize {
        self.in_use.iter().filter(|b| **b).count()
    }

    /// Total slots backed by chunks.
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_slots
    }

    fn locate(&self, handle: PoolHandle) -> (usize, usize) {
        let idx = handle.index();
        assert!(idx < self.in_use.len(), "pool: unknown handle {idx}");
        assert!(self.in_use[idx], "pool: access to a freed slot {idx}");
        (idx / self.chunk_slots, (idx % self.chunk_slots) * self.slot_size)
    }

    fn grow(&mut self) {
        let base = self.capacity() as u32;
        self.chunks
            .push(vec![0u8; self.chunk_slots * self.slot_size].into_boxed_slice());
        self.in_use.resize(self.in_use.len() + self.chunk_slots, false);
        for i in (0..self.chunk_slots as u32).rev() {
            self.free_list.push(base + i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_grows_by_chunk() {
        let mut pool = EntryPool::new(64, 4);
        assert_eq!(pool.capacity(), 0);

        let h = pool.alloc();
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.allocated(), 1);

        pool.free(h);
        assert_eq!(pool.allocated(), 0);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn slots_hold_data_independently() {
        let mut pool = EntryPool::new(8, 2);
        let a = pool.alloc();
        let b = pool.alloc();

        pool.slot_mut(a).copy_from_slice(&[1u8; 8]);
        pool.slot_mut(b).copy_from_slice(&[2u8; 8]);

        assert_eq!(pool.slot(a), &[1u8; 8]);
        assert_eq!(pool.slot(b), &[2u8; 8]);
    }

    #[test]
    fn repeated_alloc_free_does_not_leak() {
        let mut pool = EntryPool::new(16, 4);
        for _ in 0..100 {
            let h = pool.alloc();
            pool.free(h);
        }
        assert_eq!(pool.allocated(), 0);
        // A single chunk services the whole cycle.
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_panics() {
        let mut pool = EntryPool::new(16, 4);
        let h = pool.alloc();
        pool.free(h);
        pool.free(h);
    }

    #[test]
    #[should_panic(expected = "freed slot")]
    fn access_after_free_panics() {
        let mut pool = EntryPool::new(16, 4);
        let h = pool.alloc();
        pool.free(h);
        let _ = pool.slot(h);
    }
}
