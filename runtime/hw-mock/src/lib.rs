//! Simulated peripherals for host-side testing
//!
//! Register-accurate models of the hardware the Vexa drivers talk to:
//!
//! - [`SimulatedGic`]: Cortex-A9 private peripheral region with the GIC CPU
//!   interface at `+0x100` and the distributor at `+0x1000`
//! - [`SimulatedVic`]: PL190 vectored interrupt controller
//! - [`SimulatedUart`]: PL011 with an injectable receive FIFO
//!
//! Each model implements [`vexa_mmio::RegisterBus`], so drivers run against
//! them unchanged. Every access is appended to a [`Journal`] that several
//! models may share, which lets tests assert on cross-device ordering
//! (device cleared before the controller sees its end-of-interrupt).
//!
//! ## Current Limitations
//!
//! - Single CPU interface (CPU 0); SGIs targeted elsewhere are only journaled
//! - No security extensions or interrupt grouping
//! - Used ONLY for unit and integration tests

mod gic;
mod journal;
mod uart;
mod vic;

pub use gic::{SimulatedGic, CPU_INTERFACE_OFFSET, DISTRIBUTOR_OFFSET};
pub use journal::{Access, AccessKind, Journal};
pub use uart::SimulatedUart;
pub use vic::SimulatedVic;
