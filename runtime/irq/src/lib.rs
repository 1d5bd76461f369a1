//! Vexa interrupt core
//!
//! # Purpose
//! Drives the interrupt controllers of the supported Cortex-A9 boards and
//! provides the single dispatch path the IRQ trap lands in.
//!
//! # Components
//! - [`CpuInterface`]: acknowledge / end-of-interrupt, priority masking
//! - [`Distributor`]: per-line enable, priority, targets, trigger mode, SGIs
//! - [`Pl190`]: legacy vectored controller (Versatile PB)
//! - [`InterruptController`]: the one interface the dispatch path sees,
//!   implemented by [`GicController`] and [`Pl190`]
//! - [`Dispatcher`]: query, filter spurious, route, acknowledge
//! - [`EchoConsole`]: the serial console device wired on both boards
//!
//! # Ordering
//! Distributor before CPU interface, both before IRQs are unmasked at the
//! core. Within one interrupt: device read, device clear, controller
//! end-of-interrupt. The CPU interface runs with EOI mode 0 (a single EOIR
//! write drops priority and deactivates), fixed at compile time.
//!
//! # Testing Strategy
//! - Unit tests: register encodings and driver sequences against
//!   `vexa-hw-mock`
//! - Integration tests: full boot + dispatch scenarios in `tests/`

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

mod console;
mod controller;
mod dispatch;
mod error;
mod gic;
mod gid;
mod types;
mod vic;

pub use console::{EchoConsole, SerialPort};
pub use controller::{GicController, InterruptController};
pub use dispatch::{Dispatch, DispatchStats, Dispatcher, IrqDevice, MAX_ROUTES};
pub use error::{IrqError, Result};
pub use gic::{
    decode_iar, encode_eoir, CpuControl, CpuInterface, CpuInterfaceSnapshot, LOWEST_PRIORITY,
};
pub use gid::{
    encode_sgir, ControllerType, Distributor, DistributorConfig, DistributorControl,
    DistributorSnapshot, Sensitivity, DEFAULT_PRIORITY,
};
pub use types::{ActiveIrq, CpuId, CpuMask, Identification, IrqId};
pub use vic::{Pl190, VIC_LINES};

/// Offset of the GIC CPU interface inside the Cortex-A9 private region
pub const GIC_CPU_INTERFACE_OFFSET: usize = 0x100;

/// Offset of the distributor inside the Cortex-A9 private region
pub const GIC_DISTRIBUTOR_OFFSET: usize = 0x1000;
