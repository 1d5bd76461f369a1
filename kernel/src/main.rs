//! Vexa kernel
//!
//! Boots a single Cortex-A9 core (or the ARM926 on the Versatile PB), brings
//! up the heap and the interrupt controller, then echoes every byte received
//! on the console UART. All work after boot happens in [`irq::irq_handler`].
//!
//! # Boot order
//! 1. `_start` (boot.rs): vectors, mode stacks, `.bss`
//! 2. [`kmain`]: console and logger
//! 3. heap from `[_kheap_low, _kheap_high)`
//! 4. controller init, console routed, core IRQs unmasked
//! 5. wait for interrupts forever

#![no_std]
#![no_main]

extern crate alloc;

#[macro_use]
mod debug;

mod boot;
mod config;
mod heap;
mod irq;

use core::panic::PanicInfo;

use log::info;
use vexa_platform::cpu;

/// Called from `_start` on the boot core with a valid stack and zeroed `.bss`
#[no_mangle]
pub extern "C" fn kmain() -> ! {
    debug::init(config::LOG_LEVEL);
    kprintln!("");
    kprintln!("Vexa kernel v{}", env!("CARGO_PKG_VERSION"));
    info!("board: {}", vexa_platform::config::board_name());

    heap::init();

    if let Err(err) = irq::init() {
        panic!("interrupt setup failed: {}", err);
    }
    info!(
        "echoing {:#x} -> {:#x}",
        config::STDIN.base,
        config::STDOUT.base
    );

    loop {
        cpu::wait_for_interrupt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    cpu::mask_interrupts();
    debug::emergency(format_args!("\n*** kernel panic: {}\n", info));
    cpu::halt()
}
