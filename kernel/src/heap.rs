//! Kernel heap
//!
//! Every `alloc` allocation in the kernel goes through the page-based chunk
//! allocator over the region the linker script reserves.

use core::ptr::addr_of;

use log::debug;
use vexa_allocator::LockedSpace;

extern "C" {
    static _kheap_low: u8;
    static _kheap_high: u8;
}

#[global_allocator]
static HEAP: LockedSpace = LockedSpace::new();

pub fn init() {
    // SAFETY: linker symbols, only their addresses are taken
    let (low, high) = unsafe { (addr_of!(_kheap_low) as usize, addr_of!(_kheap_high) as usize) };

    // SAFETY: the linker script reserves the region for the heap alone
    if let Err(err) = unsafe { HEAP.init(low, high) } {
        panic!("heap: {}", err);
    }
    if let Ok(stats) = HEAP.stats() {
        debug!("{}", stats);
    }
}
