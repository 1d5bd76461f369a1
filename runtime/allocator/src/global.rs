//! The kernel-wide heap instance

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{null_mut, NonNull};

use log::warn;
use spin::Mutex;
use vexa_platform::cpu::InterruptGuard;

use crate::error::{AllocError, Result};
use crate::space::{CleanupReport, SpaceAllocator};
use crate::stats::SpaceStats;
use crate::WORD;

/// [`SpaceAllocator`] shared by the whole kernel
///
/// Every call masks IRQs before taking the lock.
pub struct LockedSpace {
    inner: Mutex<Option<SpaceAllocator>>,
}

impl LockedSpace {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Hand `[low, high)` to the heap
    ///
    /// # Safety
    /// Same contract as [`SpaceAllocator::new`]. Chunks of an earlier
    /// region must no longer be in use.
    pub unsafe fn init(&self, low: usize, high: usize) -> Result<()> {
        let space = SpaceAllocator::new(low, high)?;
        let _irq = InterruptGuard::new();
        *self.inner.lock() = Some(space);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        let _irq = InterruptGuard::new();
        self.inner.lock().is_some()
    }

    /// Allocate `size` bytes, halting the kernel when the request cannot be met
    ///
    /// Oversized requests and exhaustion are fatal and panic. Only an
    /// uninitialized heap is reported as an error.
    pub fn malloc(&self, size: usize) -> Result<NonNull<u8>> {
        match self.try_malloc(size) {
            Err(err @ (AllocError::TooLarge { .. } | AllocError::OutOfMemory { .. })) => {
                panic!("heap: {}", err)
            }
            result => result,
        }
    }

    /// Allocate `size` bytes, handing every failure back to the caller
    pub fn try_malloc(&self, size: usize) -> Result<NonNull<u8>> {
        self.with(|space| space.malloc(size))?
    }

    /// # Safety
    /// `ptr` must come from `malloc` on this heap and not be freed twice.
    pub unsafe fn free(&self, ptr: NonNull<u8>) -> Result<()> {
        self.with(|space| space.free(ptr))
    }

    pub fn cleanup(&self) -> Result<CleanupReport> {
        self.with(SpaceAllocator::cleanup)
    }

    pub fn stats(&self) -> Result<SpaceStats> {
        self.with(|space| space.stats())
    }

    fn with<R>(&self, f: impl FnOnce(&mut SpaceAllocator) -> R) -> Result<R> {
        let _irq = InterruptGuard::new();
        let mut guard = self.inner.lock();
        guard.as_mut().map(f).ok_or(AllocError::Uninitialized)
    }
}

impl Default for LockedSpace {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for LockedSpace {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // chunks are only word aligned
        if layout.align() > WORD {
            return null_mut();
        }
        match self.try_malloc(layout.size()) {
            Ok(ptr) => ptr.as_ptr(),
            Err(_) => null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            if let Err(err) = self.free(ptr) {
                warn!("heap: dealloc({:p}) dropped: {}", ptr, err);
            }
        }
    }
}
