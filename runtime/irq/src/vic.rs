//! ARM PL190 Vectored Interrupt Controller
//!
//! Used on the Versatile PB, where the controller is an ordinary bus device.
//! Three register banks hang off its base address: control/status at
//! `+0x000`, vector addresses at `+0x100` and vector controls at `+0x200`.
//! Only vector slot 0 is used; any other source is serviced non-vectored.
//! Reference: ARM PrimeCell Vectored Interrupt Controller (PL190) TRM

use log::debug;
use vexa_mmio::RegisterBus;

use crate::controller::InterruptController;
use crate::error::{IrqError, Result};
use crate::types::{ActiveIrq, CpuId, IrqId};

/// PL190 register offsets
const VICIRQSTATUS: usize = 0x000;    // IRQ status after masking
const VICRAWINTR: usize = 0x008;      // Raw interrupt status
const VICINTSELECT: usize = 0x00C;    // 1 = FIQ, 0 = IRQ
const VICINTENABLE: usize = 0x010;    // Write 1 to enable
const VICINTENCLEAR: usize = 0x014;   // Write 1 to disable
const VICSOFTINTCLEAR: usize = 0x01C; // Write 1 to clear software interrupt
const VICVECTADDR: usize = 0x030;     // Read: active vector, write: end of service
const VICDEFVECTADDR: usize = 0x034;  // Default vector address

/// Vector address and vector control banks, 16 slots each
const VICVECTADDR_BANK: usize = 0x100;
const VICVECTCNTL_BANK: usize = 0x200;

/// Vector control bits
const CNTL_ENABLE: u32 = 1 << 5;
const CNTL_SOURCE: u32 = 0x1F;

/// Interrupt sources handled by one PL190
pub const VIC_LINES: u32 = 32;

/// PL190 driver
pub struct Pl190<B> {
    regs: B,
    /// Source installed in vector slot 0 and its tag
    vectored: Option<(IrqId, u32)>,
}

impl<B: RegisterBus> Pl190<B> {
    pub const fn new(regs: B) -> Self {
        Self {
            regs,
            vectored: None,
        }
    }

    /// Mask every source, route everything to IRQ, clear software interrupts
    pub fn init(&mut self) {
        self.regs.write32(VICINTENCLEAR, u32::MAX);
        self.regs.write32(VICINTSELECT, 0);
        self.regs.write32(VICSOFTINTCLEAR, u32::MAX);
        self.regs.write32(VICDEFVECTADDR, 0);
        self.regs.write32(VICVECTCNTL_BANK, 0);
        self.vectored = None;
        debug!("[vic] initialized");
    }

    fn check(irq: IrqId) -> Result<u32> {
        if irq.raw() < VIC_LINES {
            Ok(irq.raw())
        } else {
            Err(IrqError::InvalidIrq {
                irq: irq.raw(),
                lines: VIC_LINES,
            })
        }
    }

    /// Install `tag` in vector slot 0 for `irq` and enable it as an IRQ
    pub fn enable_irq(&mut self, irq: IrqId, tag: u32) -> Result<()> {
        let line = Self::check(irq)?;
        self.regs.write32(VICVECTADDR_BANK, tag);
        self.regs.write32(VICVECTCNTL_BANK, CNTL_ENABLE | (line & CNTL_SOURCE));
        self.regs.clear_bits(VICINTSELECT, 1u32 << line);
        self.regs.write32(VICINTENABLE, 1 << line);
        self.vectored = Some((irq, tag));
        Ok(())
    }

    pub fn disable_irq(&mut self, irq: IrqId) -> Result<()> {
        let line = Self::check(irq)?;
        self.regs.write32(VICINTENCLEAR, 1 << line);
        Ok(())
    }

    pub fn enabled(&self, irq: IrqId) -> bool {
        match Self::check(irq) {
            Ok(line) => self.regs.read32(VICINTENABLE) & (1 << line) != 0,
            Err(_) => false,
        }
    }

    /// Vector of the highest priority active source; begins its service
    pub fn read_active(&mut self) -> u32 {
        self.regs.read32(VICVECTADDR)
    }

    /// End of service for the vector returned by `read_active`
    pub fn acknowledge(&mut self) {
        self.regs.write32(VICVECTADDR, 0);
    }

    pub fn irq_status(&self) -> u32 {
        self.regs.read32(VICIRQSTATUS)
    }

    pub fn raw_status(&self) -> u32 {
        self.regs.read32(VICRAWINTR)
    }
}

impl<B: RegisterBus> InterruptController for Pl190<B> {
    fn init(&mut self) {
        Pl190::init(self)
    }

    /// Never spurious: the PL190 only interrupts the core for a real source.
    /// A vector that is not the installed tag falls back to the lowest
    /// numbered source in IRQ status, or [`IrqId::UNMAPPED`].
    fn current_irq(&mut self) -> Option<ActiveIrq> {
        let vector = self.read_active();
        let irq = match self.vectored {
            Some((irq, tag)) if tag == vector => irq,
            _ => match self.irq_status() {
                0 => IrqId::UNMAPPED,
                status => IrqId::new(status.trailing_zeros()),
            },
        };
        Some(ActiveIrq::new(irq, CpuId::BOOT))
    }

    fn acknowledge(&mut self, _active: ActiveIrq) {
        Pl190::acknowledge(self)
    }

    /// Enable without a vector slot (serviced non-vectored)
    fn enable(&mut self, irq: IrqId) -> Result<()> {
        let line = Self::check(irq)?;
        self.regs.clear_bits(VICINTSELECT, 1u32 << line);
        self.regs.write32(VICINTENABLE, 1 << line);
        Ok(())
    }

    fn disable(&mut self, irq: IrqId) -> Result<()> {
        self.disable_irq(irq)
    }

    fn is_enabled(&self, irq: IrqId) -> bool {
        self.enabled(irq)
    }
}
