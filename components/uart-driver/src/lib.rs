//! PL011 UART Driver
//!
//! Serial driver for ARM PL011 UART hardware: blocking transmit, polled or
//! interrupt-driven receive. Implements [`vexa_irq::SerialPort`] so a port
//! can sit behind the console device on the interrupt dispatch path, and
//! [`core::fmt::Write`] so the kernel logger can print through it.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

mod pl011;

pub use pl011::{Control, Flags, Interrupts, Pl011};
