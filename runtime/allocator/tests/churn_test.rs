//! Allocation churn over multi-page regions
//!
//! Exercises the allocator the way the kernel does: many small chunks of
//! mixed sizes, freed out of order, with pages filling and emptying.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use vexa_allocator::*;

struct Region {
    ptr: *mut u8,
    layout: Layout,
}

impl Region {
    fn pages(n: usize) -> Self {
        let layout = Layout::from_size_align(n * PAGE_SIZE, PAGE_SIZE).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        Self { ptr, layout }
    }

    fn heap(&self) -> SpaceAllocator {
        let low = self.ptr as usize;
        unsafe { SpaceAllocator::new(low, low + self.layout.size()).expect("heap init") }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) }
    }
}

/// Deterministic xorshift, enough to shuffle sizes and free order
struct Rng(u32);

impl Rng {
    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }
}

fn fill(ptr: NonNull<u8>, len: usize, byte: u8) {
    unsafe { ptr.as_ptr().write_bytes(byte, len) }
}

fn check(ptr: NonNull<u8>, len: usize, byte: u8) {
    let data = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
    assert!(data.iter().all(|&b| b == byte), "chunk contents clobbered");
}

/// Two-page region starts with one active and one free page
#[test]
fn test_two_page_region() {
    let region = Region::pages(2);
    let heap = region.heap();
    let stats = heap.stats();
    assert_eq!(stats.active_pages, 1);
    assert_eq!(stats.free_pages, 1);
    assert_eq!(stats.total_pages(), 2);
}

/// Live chunks never overlap and keep their contents across churn
#[test]
fn test_churn_keeps_chunks_disjoint() {
    let region = Region::pages(32);
    let mut heap = region.heap();
    let mut rng = Rng(0x1234_5678);
    let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

    for round in 0..2000u32 {
        if live.len() < 48 && rng.next() % 3 != 0 {
            let size = 1 + (rng.next() as usize % 256);
            let ptr = heap.malloc(size).expect("churn allocation");
            assert!(heap.contains(ptr));
            assert_eq!(ptr.as_ptr() as usize % WORD, 0);
            assert!(unsafe { heap.chunk_capacity(ptr) } >= size);
            let byte = round as u8;
            fill(ptr, size, byte);
            live.push((ptr, size, byte));
        } else if !live.is_empty() {
            let victim = rng.next() as usize % live.len();
            let (ptr, size, byte) = live.swap_remove(victim);
            check(ptr, size, byte);
            unsafe { heap.free(ptr) };
        }

        if round % 97 == 0 {
            heap.check_invariants();
        }
    }

    for (ptr, size, byte) in live.drain(..) {
        check(ptr, size, byte);
        unsafe { heap.free(ptr) };
    }
    heap.check_invariants();

    let stats = heap.stats();
    assert_eq!(stats.chunks, 0);
    assert_eq!(stats.allocated, 0);
}

/// Emptying every page and cleaning up returns all but the first page
#[test]
fn test_cleanup_after_full_release() {
    let region = Region::pages(8);
    let mut heap = region.heap();
    let mut chunks = Vec::new();
    for _ in 0..40 {
        chunks.push(heap.malloc(600).unwrap());
    }
    assert!(heap.stats().active_pages > 1);

    for ptr in chunks {
        unsafe { heap.free(ptr) };
    }
    let active = heap.stats().active_pages;
    let report = heap.cleanup();
    assert_eq!(report.pages, active - 1);
    assert_eq!(report.holes, 40);

    let stats = heap.stats();
    assert_eq!(stats.active_pages, 1);
    assert_eq!(stats.free_pages, 7);
    assert_eq!(stats.holes, 0);
    assert_eq!(stats.zero_chunk_pages, 1);
    heap.check_invariants();
}

/// k allocations freed in reverse, then cleanup, restore the initial layout
#[test]
fn test_reverse_release_restores_initial_pages() {
    let region = Region::pages(6);
    let mut heap = region.heap();
    let initial = heap.stats();

    for k in [1usize, 7, 25, 60] {
        let chunks: Vec<_> = (0..k).map(|i| heap.malloc(64 + (i % 5) * 48).unwrap()).collect();
        for ptr in chunks.into_iter().rev() {
            unsafe { heap.free(ptr) };
        }
        heap.cleanup();

        let stats = heap.stats();
        assert_eq!(stats.active_pages, initial.active_pages, "k = {}", k);
        assert_eq!(stats.free_pages, initial.free_pages, "k = {}", k);
        assert_eq!(stats.holes, 0);
        assert_eq!(stats.chunks, 0);
        heap.check_invariants();
    }
}

/// Exhausting the region fails cleanly and the heap stays usable
#[test]
fn test_exhaustion_is_recoverable() {
    let region = Region::pages(3);
    let mut heap = region.heap();
    let mut chunks = Vec::new();
    let err = loop {
        match heap.malloc(MAX_HOLE_SIZE) {
            Ok(ptr) => chunks.push(ptr),
            Err(err) => break err,
        }
    };
    assert_eq!(err, AllocError::OutOfMemory { requested: MAX_HOLE_SIZE });
    assert_eq!(chunks.len(), 3);
    heap.check_invariants();

    let last = chunks.pop().unwrap();
    unsafe { heap.free(last) };
    let again = heap.malloc(MAX_HOLE_SIZE).unwrap();
    assert_eq!(again, last);
    heap.check_invariants();
}

/// Requests are capped at MAX_HOLE_SIZE
#[test]
fn test_request_limit() {
    let region = Region::pages(2);
    let mut heap = region.heap();
    assert!(heap.malloc(MAX_HOLE_SIZE).is_ok());
    assert!(matches!(
        heap.malloc(MAX_HOLE_SIZE + 1),
        Err(AllocError::TooLarge { .. })
    ));
    assert_eq!(heap.stats().chunks, 1);
}

/// Errors render for the kernel log
#[test]
fn test_error_messages() {
    let err = AllocError::TooLarge {
        size: 4000,
        max: MAX_HOLE_SIZE,
    };
    assert_eq!(err.to_string(), "Size too large: 4000 bytes (maximum 3072)");
    assert_eq!(
        AllocError::UnalignedRegion(0x7000_0010).to_string(),
        "Heap region start 0x70000010 is not page aligned"
    );
}
