//! Chunk headers

use core::mem::size_of;
use core::ptr::{null_mut, NonNull};

/// Header in front of every chunk
///
/// `size` is the capacity of the data area, excluding the header. It is the
/// only size the allocator trusts: a hole handed out whole keeps its own
/// size even when the request was smaller. `next` links holes; it is
/// meaningless while the chunk is live.
#[repr(C)]
pub(crate) struct ChunkHeader {
    pub size: usize,
    pub next: *mut ChunkHeader,
}

pub(crate) const HEADER_SIZE: usize = size_of::<ChunkHeader>();

impl ChunkHeader {
    /// Write a fresh header at `addr`
    ///
    /// # Safety
    /// `addr` must be word aligned and point at `HEADER_SIZE + size` bytes
    /// owned by the allocator.
    pub unsafe fn place(addr: usize, size: usize) -> *mut ChunkHeader {
        let chunk = addr as *mut ChunkHeader;
        chunk.write(ChunkHeader {
            size,
            next: null_mut(),
        });
        chunk
    }

    /// Data area following the header
    pub fn data(chunk: *mut ChunkHeader) -> NonNull<u8> {
        // SAFETY: chunk is non-null, so chunk + HEADER_SIZE is too
        unsafe { NonNull::new_unchecked((chunk as *mut u8).add(HEADER_SIZE)) }
    }

    /// Header of the chunk whose data starts at `data`
    pub fn of(data: NonNull<u8>) -> *mut ChunkHeader {
        (data.as_ptr() as usize - HEADER_SIZE) as *mut ChunkHeader
    }
}
