//! Memory allocator traits, default implementation, and scoped workspace
//!
//! Builders acquire transient device workspace through [`AllocGuard`], which
//! ties the buffer's lifetime to a scope: the allocation is released when the
//! guard drops, on every exit path including early returns and failures.

use crate::error::{Error, Result};

/// Memory allocator trait for runtime backends
pub trait Allocator: Clone + Send + Sync {
    /// Allocate memory of given size
    ///
    /// Returns a device pointer (u64) that can be used for operations.
    /// Allocation is synchronous with respect to the issuing thread.
    fn allocate(&self, size_bytes: usize) -> u64;

    /// Deallocate memory
    fn deallocate(&self, ptr: u64, size_bytes: usize);
}

/// Default allocator that delegates to Runtime methods
#[derive(Clone, Debug)]
pub struct DefaultAllocator<D> {
    device: D,
    allocate_fn: fn(usize, &D) -> u64,
    deallocate_fn: fn(u64, usize, &D),
}

impl<D: Clone + Send + Sync> DefaultAllocator<D> {
    /// Create a new default allocator
    pub fn new(
        device: D,
        allocate_fn: fn(usize, &D) -> u64,
        deallocate_fn: fn(u64, usize, &D),
    ) -> Self {
        Self {
            device,
            allocate_fn,
            deallocate_fn,
        }
    }

    /// Get the device this allocator is associated with
    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: Clone + Send + Sync> Allocator for DefaultAllocator<D> {
    fn allocate(&self, size_bytes: usize) -> u64 {
        (self.allocate_fn)(size_bytes, &self.device)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        (self.deallocate_fn)(ptr, size_bytes, &self.device)
    }
}

/// Scoped device allocation released on drop
///
/// Workspace buffers acquired through this guard are freed on every exit
/// path of the owning call. `release` transfers ownership out of the guard
/// for buffers that outlive the call.
pub struct AllocGuard<'a, A: Allocator> {
    allocator: &'a A,
    ptr: u64,
    size_bytes: usize,
}

impl<'a, A: Allocator> AllocGuard<'a, A> {
    /// Allocate `size_bytes` from `allocator`, owned by the returned guard
    pub fn new(allocator: &'a A, size_bytes: usize) -> Result<Self> {
        let ptr = allocator.allocate(size_bytes);
        Ok(Self {
            allocator,
            ptr,
            size_bytes,
        })
    }

    /// Allocate room for `count` elements of type `T`
    ///
    /// Fails with `OutOfMemory` if the byte size overflows.
    pub fn for_elements<T>(allocator: &'a A, count: usize) -> Result<Self> {
        let size_bytes = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(Error::OutOfMemory { size: usize::MAX })?;
        Self::new(allocator, size_bytes)
    }

    /// Device pointer of the allocation (0 for empty allocations)
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Size of the allocation in bytes
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Transfer ownership of the allocation out of the guard
    ///
    /// The caller becomes responsible for deallocation.
    pub fn release(mut self) -> u64 {
        let ptr = self.ptr;
        self.ptr = 0;
        ptr
    }
}

impl<A: Allocator> Drop for AllocGuard<'_, A> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            self.allocator.deallocate(self.ptr, self.size_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allocator_trait_bounds() {
        fn assert_allocator<A: Allocator>() {}
        assert_allocator::<DefaultAllocator<()>>();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static LIVE: AtomicUsize = AtomicUsize::new(0);

        #[derive(Clone)]
        struct Counting;
        impl Allocator for Counting {
            fn allocate(&self, _size: usize) -> u64 {
                LIVE.fetch_add(1, Ordering::SeqCst);
                0xdead
            }
            fn deallocate(&self, _ptr: u64, _size: usize) {
                LIVE.fetch_sub(1, Ordering::SeqCst);
            }
        }

        let alloc = Counting;
        {
            let guard = AllocGuard::new(&alloc, 64).unwrap();
            assert_eq!(guard.ptr(), 0xdead);
            assert_eq!(LIVE.load(Ordering::SeqCst), 1);
        }
        assert_eq!(LIVE.load(Ordering::SeqCst), 0);
    }
}
