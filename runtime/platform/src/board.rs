//! Board tables
//!
//! Addresses and interrupt numbers for the two supported QEMU machines.
//! Both tables are always compiled; [`selected`] points at the one chosen by
//! the `board-*` feature.

/// A PL011 instance: register window and its interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartPort {
    pub base: usize,
    pub irq: u32,
}

/// Which interrupt controller the board routes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// Cortex-A9 MPCore: CPU interface and distributor in the private
    /// peripheral region. `fallback_periphbase` is used when the
    /// configuration base register cannot be read (host builds).
    Gic { fallback_periphbase: usize, lines: u32 },
    /// PL190 vectored controller
    Vic { base: usize, lines: u32 },
}

/// Versatile Express with a CoreTile Express A9x4
pub mod vexpress_a9 {
    use super::{ControllerKind, UartPort};

    pub const NAME: &str = "vexpress-a9";

    /// Interrupt lines wired on this board (SGI + PPI + 64 SPIs)
    pub const NIRQS: u32 = 96;

    pub const CONTROLLER: ControllerKind = ControllerKind::Gic {
        fallback_periphbase: 0x1E00_0000,
        lines: NIRQS,
    };

    pub const UART0: UartPort = UartPort { base: 0x1000_9000, irq: 37 };
    pub const UART1: UartPort = UartPort { base: 0x1000_A000, irq: 38 };
    pub const UART2: UartPort = UartPort { base: 0x1000_B000, irq: 39 };
    pub const UART3: UartPort = UartPort { base: 0x1000_C000, irq: 40 };
}

/// Versatile PB (ARM926EJ-S, PL190 VIC)
pub mod versatilepb {
    use super::{ControllerKind, UartPort};

    pub const NAME: &str = "versatilepb";

    pub const NIRQS: u32 = 32;

    pub const VIC_BASE: usize = 0x1014_0000;

    pub const CONTROLLER: ControllerKind = ControllerKind::Vic {
        base: VIC_BASE,
        lines: NIRQS,
    };

    pub const UART0: UartPort = UartPort { base: 0x101F_1000, irq: 12 };
    pub const UART1: UartPort = UartPort { base: 0x101F_2000, irq: 13 };
    pub const UART2: UartPort = UartPort { base: 0x101F_3000, irq: 14 };
}

#[cfg(feature = "board-versatilepb")]
pub use versatilepb as selected;

// Default to the Versatile Express if no board feature is specified
#[cfg(not(feature = "board-versatilepb"))]
pub use vexpress_a9 as selected;
