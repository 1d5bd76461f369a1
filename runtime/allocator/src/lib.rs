//! Page-based chunk allocator
//!
//! # Purpose
//! Backs all dynamic allocation of the kernel from one fixed region,
//! `[low, high)`, cut into 4 KiB pages.
//!
//! # Design
//! - Every page carries its descriptor in its last bytes, so the page of any
//!   address is found by masking it down to the page boundary.
//! - Chunks are bump-allocated from the most recently claimed active page.
//!   Each chunk has a `{size, next}` header in front of its data.
//! - Freed chunks go on a LIFO hole list threaded through their own memory;
//!   `malloc` scans it before bumping and splits large holes from the tail.
//! - Pages whose last chunk was freed are only reclaimed lazily, by
//!   [`SpaceAllocator::cleanup`], when a bump would otherwise fail.
//!
//! The allocator is not reentrant. [`LockedSpace`] wraps the single kernel
//! instance with a spin lock and masks IRQs around every call.
//!
//! # Testing Strategy
//! - Unit tests: hole reuse, splitting, cleanup, accounting invariants
//! - Integration tests: allocation churn over multi-page regions
//! - Benchmarks: `benches/space.rs` (criterion)

#![no_std]

#[cfg(test)]
extern crate std;

mod chunk;
mod error;
mod global;
mod page;
mod space;
mod stats;

pub use error::{AllocError, Result};
pub use global::LockedSpace;
pub use space::{CleanupReport, SpaceAllocator};
pub use stats::SpaceStats;

use static_assertions::const_assert;

/// Page size (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Largest request `malloc` accepts
pub const MAX_HOLE_SIZE: usize = 3072;

/// A hole is only split when more than this would be left of it
pub const MIN_HOLE_SIZE: usize = 32;

/// Allocation granule and alignment of every chunk
pub const WORD: usize = core::mem::size_of::<usize>();

/// Bytes in front of every chunk's data
pub const CHUNK_HEADER_SIZE: usize = chunk::HEADER_SIZE;

const_assert!(PAGE_SIZE.is_power_of_two());
const_assert!(MAX_HOLE_SIZE % WORD == 0);
// a fresh page always fits the largest request
const_assert!(CHUNK_HEADER_SIZE + MAX_HOLE_SIZE <= page::CAPACITY);

/// Round `size` up to the allocation granule
///
/// Saturates near `usize::MAX` instead of wrapping to zero.
pub const fn align_word(size: usize) -> usize {
    size.saturating_add(WORD - 1) & !(WORD - 1)
}
