//! The allocator proper

use core::ptr::{null_mut, NonNull};

use log::{debug, info, trace};

use crate::chunk::{ChunkHeader, HEADER_SIZE};
use crate::error::{AllocError, Result};
use crate::page::PageHeader;
use crate::stats::SpaceStats;
use crate::{align_word, MAX_HOLE_SIZE, MIN_HOLE_SIZE, PAGE_SIZE};

/// What one [`SpaceAllocator::cleanup`] pass reclaimed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Holes dropped because their page had no live chunk
    pub holes: usize,
    /// Pages moved from the active list to the free list
    pub pages: usize,
}

/// Page-based chunk allocator over `[low, high)`
///
/// The first page of the region is always active. Every other page starts on
/// the free list and is claimed when the current page cannot fit a request.
pub struct SpaceAllocator {
    low: usize,
    high: usize,
    first: *mut PageHeader,
    /// Active pages, most recently claimed first; the head is bumped from
    pages: *mut PageHeader,
    npages: usize,
    /// Active pages without live chunks
    nzpages: usize,
    free_pages: *mut PageHeader,
    nfree: usize,
    holes: *mut ChunkHeader,
    nholes: usize,
    nchunks: usize,
    allocated: usize,
}

// SAFETY: the allocator exclusively owns its region; nothing else holds the
// raw pointers it threads through it.
unsafe impl Send for SpaceAllocator {}

impl SpaceAllocator {
    /// Take ownership of `[low, high)` and lay out its pages
    ///
    /// Trailing bytes that do not fill a whole page are left unused.
    ///
    /// # Safety
    /// The region must be valid, writable memory used by nothing else for
    /// the lifetime of the allocator.
    pub unsafe fn new(low: usize, high: usize) -> Result<Self> {
        if low % PAGE_SIZE != 0 {
            return Err(AllocError::UnalignedRegion(low));
        }
        if high < low || high - low < PAGE_SIZE {
            return Err(AllocError::RegionTooSmall { low, high });
        }

        let first = PageHeader::init(low);
        let mut space = Self {
            low,
            high,
            first,
            pages: first,
            npages: 1,
            nzpages: 1,
            free_pages: null_mut(),
            nfree: 0,
            holes: null_mut(),
            nholes: 0,
            nchunks: 0,
            allocated: 0,
        };

        let mut base = low + PAGE_SIZE;
        while high - base >= PAGE_SIZE {
            let page = PageHeader::init(base);
            space.push_free(page);
            base += PAGE_SIZE;
        }

        info!(
            "heap [{:#x}, {:#x}): {} pages, first page active",
            low,
            high,
            space.nfree + 1
        );
        Ok(space)
    }

    /// Allocate a chunk of at least `size` bytes, word aligned
    ///
    /// Holes are reused first-fit. A hole much larger than the request is
    /// split; the chunk is carved from its tail so the hole stays in place.
    pub fn malloc(&mut self, size: usize) -> Result<NonNull<u8>> {
        // MAX_HOLE_SIZE is word aligned, so checking before rounding is exact
        if size > MAX_HOLE_SIZE {
            return Err(AllocError::TooLarge {
                size,
                max: MAX_HOLE_SIZE,
            });
        }
        let size = align_word(size);
        let length = size + HEADER_SIZE;

        // SAFETY: every pointer on the lists addresses memory of our region
        unsafe {
            let chunk = match self.take_hole(size, length) {
                Some(chunk) => chunk,
                None => self.bump(size, length)?,
            };

            let page = &mut *PageHeader::of(chunk as usize);
            if page.nchunks == 0 {
                assert!(self.nzpages > 0, "heap: zero-chunk page count underflow");
                self.nzpages -= 1;
            }
            page.nchunks += 1;
            self.nchunks += 1;
            self.allocated += (*chunk).size;

            let data = ChunkHeader::data(chunk);
            trace!("heap: malloc({}) -> {:p}", size, data);
            Ok(data)
        }
    }

    /// Return a chunk to the hole list
    ///
    /// The hole is reused by later requests. Its page becomes reclaimable
    /// once its last chunk is freed.
    ///
    /// # Safety
    /// `ptr` must come from `malloc` on this allocator and not be freed twice.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        let chunk = ChunkHeader::of(ptr);
        let page = &mut *PageHeader::of(chunk as usize);
        let size = (*chunk).size;

        assert!(self.allocated >= size, "heap: allocated bytes underflow");
        assert!(page.nchunks > 0, "heap: free on a page with no live chunk");
        self.allocated -= size;

        (*chunk).next = self.holes;
        self.holes = chunk;
        self.nholes += 1;

        self.nchunks -= 1;
        page.nchunks -= 1;
        if page.nchunks == 0 {
            self.nzpages += 1;
            assert!(self.nzpages <= self.npages, "heap: zero-chunk page count overflow");
        }
    }

    /// Reclaim pages with no live chunk
    ///
    /// Their holes are dropped from the hole list. Every such page except the
    /// first goes back to the free list; the first page stays active and is
    /// rewound to its start.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        // SAFETY: every pointer on the lists addresses memory of our region
        unsafe {
            let mut prev: *mut ChunkHeader = null_mut();
            let mut hole = self.holes;
            while !hole.is_null() {
                let next = (*hole).next;
                if (*PageHeader::of(hole as usize)).nchunks == 0 {
                    if prev.is_null() {
                        self.holes = next;
                    } else {
                        (*prev).next = next;
                    }
                    self.nholes -= 1;
                    report.holes += 1;
                } else {
                    prev = hole;
                }
                hole = next;
            }

            let mut prev: *mut PageHeader = null_mut();
            let mut page = self.pages;
            while !page.is_null() {
                let next = (*page).next;
                if (*page).nchunks != 0 {
                    prev = page;
                } else if page == self.first {
                    (*page).offset = 0;
                    prev = page;
                } else {
                    if prev.is_null() {
                        self.pages = next;
                    } else {
                        (*prev).next = next;
                    }
                    self.npages -= 1;
                    self.nzpages -= 1;
                    self.push_free(page);
                    report.pages += 1;
                }
                page = next;
            }
        }

        if report.pages > 0 || report.holes > 0 {
            debug!(
                "heap cleanup: {} pages freed, {} holes dropped",
                report.pages, report.holes
            );
        }
        report
    }

    /// Usable bytes of a live chunk, at least what was requested
    ///
    /// # Safety
    /// `ptr` must be a live chunk of this allocator.
    pub unsafe fn chunk_capacity(&self, ptr: NonNull<u8>) -> usize {
        (*ChunkHeader::of(ptr)).size
    }

    /// Whether `ptr` lies inside the managed region
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        addr >= self.low && addr < self.high
    }

    pub fn stats(&self) -> SpaceStats {
        SpaceStats {
            low: self.low,
            high: self.high,
            active_pages: self.npages,
            zero_chunk_pages: self.nzpages,
            free_pages: self.nfree,
            chunks: self.nchunks,
            holes: self.nholes,
            allocated: self.allocated,
        }
    }

    /// Walk every list and check it against the counters
    ///
    /// Panics on the first mismatch.
    pub fn check_invariants(&self) {
        // SAFETY: every pointer on the lists addresses memory of our region
        unsafe {
            let mut active = 0;
            let mut zero = 0;
            let mut chunks = 0;
            let mut first_seen = false;
            let mut page = self.pages;
            while !page.is_null() {
                active += 1;
                chunks += (*page).nchunks;
                if (*page).nchunks == 0 {
                    zero += 1;
                }
                first_seen |= page == self.first;
                assert!(self.owns_page(page), "heap: foreign page on active list");
                page = (*page).next;
            }
            assert!(first_seen, "heap: first page left the active list");
            assert_eq!(active, self.npages, "heap: active page count");
            assert_eq!(zero, self.nzpages, "heap: zero-chunk page count");
            assert_eq!(chunks, self.nchunks, "heap: chunk count");
            assert!(self.nzpages <= self.npages);

            let mut free = 0;
            let mut page = self.free_pages;
            while !page.is_null() {
                free += 1;
                assert_eq!((*page).nchunks, 0, "heap: free page with live chunks");
                page = (*page).next;
            }
            assert_eq!(free, self.nfree, "heap: free page count");

            let mut holes = 0;
            let mut hole = self.holes;
            while !hole.is_null() {
                holes += 1;
                assert!(
                    self.contains(ChunkHeader::data(hole)),
                    "heap: hole outside the region"
                );
                hole = (*hole).next;
            }
            assert_eq!(holes, self.nholes, "heap: hole count");
        }
    }

    unsafe fn take_hole(&mut self, size: usize, length: usize) -> Option<*mut ChunkHeader> {
        let mut prev: *mut ChunkHeader = null_mut();
        let mut hole = self.holes;
        while !hole.is_null() {
            let capacity = (*hole).size;
            if capacity >= size {
                if capacity >= length && capacity - length > MIN_HOLE_SIZE {
                    // carve from the tail, the hole keeps its list position
                    let remaining = capacity - length;
                    (*hole).size = remaining;
                    let addr = ChunkHeader::data(hole).as_ptr() as usize + remaining;
                    return Some(ChunkHeader::place(addr, size));
                }

                if prev.is_null() {
                    self.holes = (*hole).next;
                } else {
                    (*prev).next = (*hole).next;
                }
                (*hole).next = null_mut();
                self.nholes -= 1;
                return Some(hole);
            }
            prev = hole;
            hole = (*hole).next;
        }
        None
    }

    unsafe fn bump(&mut self, size: usize, length: usize) -> Result<*mut ChunkHeader> {
        if !(*self.pages).fits(length) {
            if self.free_pages.is_null() && self.nzpages != 0 {
                self.cleanup();
            }
            // cleanup may have rewound the head page
            if !(*self.pages).fits(length) {
                let page = self.pop_free().ok_or(AllocError::OutOfMemory { requested: size })?;
                (*page).next = self.pages;
                self.pages = page;
                self.npages += 1;
                self.nzpages += 1;
            }
        }

        let addr = (*self.pages).bump(length);
        Ok(ChunkHeader::place(addr, size))
    }

    unsafe fn push_free(&mut self, page: *mut PageHeader) {
        (*page).reset();
        (*page).next = self.free_pages;
        self.free_pages = page;
        self.nfree += 1;
    }

    unsafe fn pop_free(&mut self) -> Option<*mut PageHeader> {
        let page = self.free_pages;
        if page.is_null() {
            return None;
        }
        self.free_pages = (*page).next;
        self.nfree -= 1;
        (*page).reset();
        Some(page)
    }

    fn owns_page(&self, page: *const PageHeader) -> bool {
        let base = PageHeader::base(page);
        base >= self.low && base + PAGE_SIZE <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_region::Region;
    use crate::{CHUNK_HEADER_SIZE, WORD};

    fn space(region: &Region) -> SpaceAllocator {
        unsafe { SpaceAllocator::new(region.low(), region.high()).unwrap() }
    }

    #[test]
    fn test_new_lays_out_pages() {
        let region = Region::pages(2);
        let heap = space(&region);
        let stats = heap.stats();
        assert_eq!(stats.active_pages, 1);
        assert_eq!(stats.zero_chunk_pages, 1);
        assert_eq!(stats.free_pages, 1);
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.holes, 0);
        heap.check_invariants();
    }

    #[test]
    fn test_new_rejects_bad_regions() {
        let region = Region::pages(2);
        let err = unsafe { SpaceAllocator::new(region.low() + WORD, region.high()) };
        assert_eq!(err.err(), Some(AllocError::UnalignedRegion(region.low() + WORD)));

        let err = unsafe { SpaceAllocator::new(region.low(), region.low() + PAGE_SIZE - 1) };
        assert!(matches!(err, Err(AllocError::RegionTooSmall { .. })));
    }

    #[test]
    fn test_partial_trailing_page_is_ignored() {
        let region = Region::pages(3);
        let heap = unsafe { SpaceAllocator::new(region.low(), region.high() - 1).unwrap() };
        assert_eq!(heap.stats().free_pages, 1);
    }

    #[test]
    fn test_first_chunk_bumps_from_page_start() {
        let region = Region::pages(1);
        let mut heap = space(&region);
        let ptr = heap.malloc(100).unwrap();
        assert_eq!(ptr.as_ptr() as usize, region.low() + CHUNK_HEADER_SIZE);
        assert_eq!(ptr.as_ptr() as usize % WORD, 0);
        assert_eq!(unsafe { heap.chunk_capacity(ptr) }, align_word(100));

        let stats = heap.stats();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.zero_chunk_pages, 0);
        assert_eq!(stats.allocated, align_word(100));
        heap.check_invariants();
    }

    #[test]
    fn test_free_then_cleanup_keeps_first_page() {
        let region = Region::pages(2);
        let mut heap = space(&region);
        let ptr = heap.malloc(100).unwrap();
        unsafe { heap.free(ptr) };
        assert_eq!(heap.stats().holes, 1);
        assert_eq!(heap.stats().zero_chunk_pages, 1);

        let report = heap.cleanup();
        assert_eq!(report, CleanupReport { holes: 1, pages: 0 });
        let stats = heap.stats();
        assert_eq!(stats.holes, 0);
        assert_eq!(stats.active_pages, 1);
        heap.check_invariants();

        // rewound: the next chunk lands at the page start again
        let again = heap.malloc(8).unwrap();
        assert_eq!(again, ptr);
    }

    #[test]
    fn test_hole_reused_for_same_size() {
        let region = Region::pages(1);
        let mut heap = space(&region);
        let a = heap.malloc(64).unwrap();
        let _b = heap.malloc(64).unwrap();
        unsafe { heap.free(a) };

        let c = heap.malloc(64).unwrap();
        assert_eq!(c, a);
        assert_eq!(heap.stats().holes, 0);
        heap.check_invariants();
    }

    #[test]
    fn test_small_hole_handed_out_whole() {
        let region = Region::pages(1);
        let mut heap = space(&region);
        let a = heap.malloc(48).unwrap();
        let _guard = heap.malloc(8).unwrap();
        unsafe { heap.free(a) };

        let b = heap.malloc(16).unwrap();
        assert_eq!(b, a);
        assert_eq!(unsafe { heap.chunk_capacity(b) }, 48);
        assert_eq!(heap.stats().allocated, 48 + 8);
    }

    #[test]
    fn test_large_hole_split_from_tail() {
        let region = Region::pages(1);
        let mut heap = space(&region);
        let big = heap.malloc(512).unwrap();
        let _guard = heap.malloc(8).unwrap();
        unsafe { heap.free(big) };

        let small = heap.malloc(64).unwrap();
        let remaining = 512 - (64 + CHUNK_HEADER_SIZE);
        assert_eq!(
            small.as_ptr() as usize,
            big.as_ptr() as usize + remaining + CHUNK_HEADER_SIZE
        );
        // the hole shrank in place
        assert_eq!(heap.stats().holes, 1);
        assert_eq!(unsafe { heap.chunk_capacity(big) }, remaining);
        assert_eq!(unsafe { heap.chunk_capacity(small) }, 64);
        // the carved chunk ends where the hole ended
        assert_eq!(small.as_ptr() as usize + 64, big.as_ptr() as usize + 512);
        heap.check_invariants();
    }

    #[test]
    fn test_split_threshold() {
        let region = Region::pages(1);
        let mut heap = space(&region);
        let size = 64 + CHUNK_HEADER_SIZE + MIN_HOLE_SIZE;
        let a = heap.malloc(size).unwrap();
        let _guard = heap.malloc(8).unwrap();
        unsafe { heap.free(a) };

        // leftover would be exactly MIN_HOLE_SIZE: no split
        let b = heap.malloc(64).unwrap();
        assert_eq!(b, a);
        assert_eq!(heap.stats().holes, 0);
    }

    #[test]
    fn test_size_limits() {
        let region = Region::pages(2);
        let mut heap = space(&region);
        assert!(heap.malloc(MAX_HOLE_SIZE).is_ok());
        assert_eq!(
            heap.malloc(MAX_HOLE_SIZE + 1),
            Err(AllocError::TooLarge {
                size: MAX_HOLE_SIZE + 1,
                max: MAX_HOLE_SIZE
            })
        );
        heap.check_invariants();
    }

    #[test]
    fn test_huge_request_rejected_without_wrapping() {
        let region = Region::pages(2);
        let mut heap = space(&region);
        for size in [usize::MAX, usize::MAX - WORD + 2, usize::MAX / 2] {
            assert_eq!(
                heap.malloc(size),
                Err(AllocError::TooLarge {
                    size,
                    max: MAX_HOLE_SIZE
                })
            );
        }
        let stats = heap.stats();
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.allocated, 0);
        heap.check_invariants();
    }

    #[test]
    fn test_overflow_claims_free_page() {
        let region = Region::pages(2);
        let mut heap = space(&region);
        let a = heap.malloc(MAX_HOLE_SIZE).unwrap();
        let b = heap.malloc(MAX_HOLE_SIZE).unwrap();
        assert_ne!(PageHeader::of(a.as_ptr() as usize), PageHeader::of(b.as_ptr() as usize));

        let stats = heap.stats();
        assert_eq!(stats.active_pages, 2);
        assert_eq!(stats.free_pages, 0);
        assert_eq!(stats.zero_chunk_pages, 0);
        heap.check_invariants();
    }

    #[test]
    fn test_out_of_memory() {
        let region = Region::pages(1);
        let mut heap = space(&region);
        let _a = heap.malloc(MAX_HOLE_SIZE).unwrap();
        assert_eq!(
            heap.malloc(MAX_HOLE_SIZE),
            Err(AllocError::OutOfMemory {
                requested: MAX_HOLE_SIZE
            })
        );
    }

    #[test]
    fn test_bump_runs_cleanup_before_failing() {
        let region = Region::pages(2);
        let mut heap = space(&region);
        let a = heap.malloc(MAX_HOLE_SIZE).unwrap();
        let b = heap.malloc(1000).unwrap();
        unsafe { heap.free(b) };
        assert_eq!(heap.stats().zero_chunk_pages, 1);
        assert_eq!(heap.stats().free_pages, 0);

        // the hole is too small, the head page too full, no page is free
        let c = heap.malloc(MAX_HOLE_SIZE).unwrap();
        assert_eq!(PageHeader::of(c.as_ptr() as usize), PageHeader::of(b.as_ptr() as usize));
        let stats = heap.stats();
        assert_eq!(stats.holes, 0);
        assert_eq!(stats.active_pages, 2);
        assert_eq!(stats.free_pages, 0);
        heap.check_invariants();

        unsafe {
            heap.free(a);
            heap.free(c);
        }
        heap.check_invariants();
    }

    #[test]
    fn test_cleanup_returns_empty_pages() {
        let region = Region::pages(4);
        let mut heap = space(&region);
        let keep = heap.malloc(MAX_HOLE_SIZE).unwrap();
        let x = heap.malloc(MAX_HOLE_SIZE).unwrap();
        let y = heap.malloc(MAX_HOLE_SIZE).unwrap();
        unsafe {
            heap.free(x);
            heap.free(y);
        }
        assert_eq!(heap.stats().active_pages, 3);

        let report = heap.cleanup();
        assert_eq!(report, CleanupReport { holes: 2, pages: 2 });
        let stats = heap.stats();
        assert_eq!(stats.active_pages, 1);
        assert_eq!(stats.free_pages, 3);
        assert_eq!(stats.zero_chunk_pages, 0);
        assert_eq!(stats.chunks, 1);
        heap.check_invariants();

        unsafe { heap.free(keep) };
        heap.check_invariants();
    }

    #[test]
    fn test_malloc_free_pair_is_neutral() {
        let region = Region::pages(2);
        let mut heap = space(&region);
        let _live = heap.malloc(24).unwrap();

        // on a fresh heap the first pair leaves its chunk behind as a hole
        let fresh = heap.stats();
        let primer = heap.malloc(40).unwrap();
        unsafe { heap.free(primer) };
        let primed = heap.stats();
        assert_eq!(primed.holes, fresh.holes + 1);
        assert_eq!(primed.chunks, fresh.chunks);
        assert_eq!(primed.allocated, fresh.allocated);

        // from then on every pair reuses that hole

        for _ in 0..16 {
            let before = heap.stats();
            let ptr = heap.malloc(40).unwrap();
            unsafe { heap.free(ptr) };
            let after = heap.stats();
            assert_eq!(before.chunks, after.chunks);
            assert_eq!(before.holes, after.holes);
            assert_eq!(before.allocated, after.allocated);
        }
        heap.check_invariants();
    }
}
