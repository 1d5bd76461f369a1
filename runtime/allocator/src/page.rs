//! Page descriptors, stored in the last bytes of the page they describe

use core::mem::size_of;
use core::ptr::null_mut;

use crate::PAGE_SIZE;

const PAGE_MASK: usize = !(PAGE_SIZE - 1);

#[repr(C)]
pub(crate) struct PageHeader {
    /// Bump cursor, relative to the page start
    pub offset: usize,
    /// Live chunks carved from this page
    pub nchunks: usize,
    /// Next page on the active or free list
    pub next: *mut PageHeader,
}

/// Usable bytes in front of the descriptor
pub(crate) const CAPACITY: usize = PAGE_SIZE - size_of::<PageHeader>();

impl PageHeader {
    /// Descriptor of the page containing `addr`
    pub fn of(addr: usize) -> *mut PageHeader {
        ((addr & PAGE_MASK) + CAPACITY) as *mut PageHeader
    }

    /// Start address of the page `page` describes
    pub fn base(page: *const PageHeader) -> usize {
        page as usize & PAGE_MASK
    }

    /// Initialize the descriptor of the page starting at `base`
    ///
    /// # Safety
    /// `base` must be page aligned and the whole page owned by the allocator.
    pub unsafe fn init(base: usize) -> *mut PageHeader {
        let page = Self::of(base);
        page.write(PageHeader {
            offset: 0,
            nchunks: 0,
            next: null_mut(),
        });
        page
    }

    /// Forget every chunk, rewinding the cursor to the page start
    pub fn reset(&mut self) {
        self.offset = 0;
        self.nchunks = 0;
        self.next = null_mut();
    }

    /// Whether `length` more bytes fit before the descriptor
    pub fn fits(&self, length: usize) -> bool {
        self.offset + length <= CAPACITY
    }

    /// Carve `length` bytes at the cursor; caller checked `fits`
    pub fn bump(&mut self, length: usize) -> usize {
        let addr = Self::base(self) + self.offset;
        self.offset += length;
        addr
    }
}
