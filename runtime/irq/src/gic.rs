//! GIC CPU interface
//!
//! One per core, at PERIPHBASE + 0x100 on the Cortex-A9 MPCore. Reading IAR
//! takes the highest priority pending interrupt (pending -> active); writing
//! the same value back to EOIR completes it (active -> inactive).

use core::fmt;

use bitflags::bitflags;
use log::debug;
use static_assertions::const_assert;
use vexa_mmio::RegisterBus;

use crate::types::{ActiveIrq, CpuId, Identification, IrqId};

/// GICC_CTLR - CPU Interface Control Register
const GICC_CTLR: usize = 0x00;

/// GICC_PMR - Interrupt Priority Mask Register
/// Only interrupts with a priority value strictly below the mask are signaled
const GICC_PMR: usize = 0x04;

/// GICC_BPR - Binary Point Register (preemption grouping)
const GICC_BPR: usize = 0x08;

/// GICC_IAR - Interrupt Acknowledge Register (read has side effects)
/// Bits 0-9: interrupt id, bits 10-12: requesting CPU (SGIs only)
const GICC_IAR: usize = 0x0C;

/// GICC_EOIR - End of Interrupt Register (write-only)
const GICC_EOIR: usize = 0x10;

/// GICC_RPR - Running Priority Register (read-only)
const GICC_RPR: usize = 0x14;

/// GICC_HPPIR - Highest Priority Pending Interrupt Register (read-only)
const GICC_HPPIR: usize = 0x18;

/// GICC_IIDR - CPU Interface Identification Register
const GICC_IIDR: usize = 0xFC;

const IAR_ID_MASK: u32 = 0x3FF;
const IAR_CPU_SHIFT: u32 = 10;
const IAR_CPU_MASK: u32 = 0x7 << IAR_CPU_SHIFT;

/// Priority mask value that lets every priority through
pub const LOWEST_PRIORITY: u8 = 0xFF;

bitflags! {
    /// GICC_CTLR bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuControl: u32 {
        const ENABLE_GRP0 = 1 << 0;
        const ENABLE_GRP1 = 1 << 1;
        /// Secure IAR reads may acknowledge Group 1 interrupts
        const ACK_CTL = 1 << 2;
        const FIQ_EN = 1 << 3;
        const CBPR = 1 << 4;
        /// EOIR only drops priority; deactivation needs a GICC_DIR write
        const EOI_MODE = 1 << 9;
    }
}

const INIT_CONTROL: CpuControl = CpuControl::ENABLE_GRP0
    .union(CpuControl::ENABLE_GRP1)
    .union(CpuControl::ACK_CTL);

// acknowledge_irq is a single EOIR write, which only completes the
// interrupt with EOI mode 0
const_assert!(INIT_CONTROL.bits() & CpuControl::EOI_MODE.bits() == 0);

/// Split an IAR value into interrupt id and requesting CPU
pub const fn decode_iar(iar: u32) -> ActiveIrq {
    ActiveIrq::new(
        IrqId::new(iar & IAR_ID_MASK),
        CpuId::new(((iar & IAR_CPU_MASK) >> IAR_CPU_SHIFT) as u8),
    )
}

/// EOIR value completing `active`; inverse of [`decode_iar`]
pub const fn encode_eoir(active: ActiveIrq) -> u32 {
    (active.irq.raw() & IAR_ID_MASK) | (((active.cpu.raw() as u32) << IAR_CPU_SHIFT) & IAR_CPU_MASK)
}

/// Driver for one GIC CPU interface
pub struct CpuInterface<B> {
    regs: B,
}

impl<B: RegisterBus> CpuInterface<B> {
    /// `regs` must address the CPU interface block (PERIPHBASE + 0x100)
    pub const fn new(regs: B) -> Self {
        Self { regs }
    }

    /// Accept every priority and enable forwarding of both groups
    ///
    /// Must run once per core, after the distributor is initialized and
    /// before IRQs are unmasked at the core.
    pub fn init(&mut self) {
        debug!("[gic] cpu interface {}", self.identification());
        self.regs.write32(GICC_PMR, LOWEST_PRIORITY as u32);
        self.regs.write32(GICC_BPR, 0);
        self.regs.write32(GICC_CTLR, INIT_CONTROL.bits());
    }

    /// Acknowledge the highest priority pending interrupt
    ///
    /// A non-spurious result is now active and must be passed to
    /// [`acknowledge_irq`](Self::acknowledge_irq) exactly once.
    pub fn current_irq(&mut self) -> ActiveIrq {
        decode_iar(self.regs.read32(GICC_IAR))
    }

    /// Priority drop and deactivation in one EOIR write
    pub fn acknowledge_irq(&mut self, active: ActiveIrq) {
        self.regs.write32(GICC_EOIR, encode_eoir(active));
    }

    pub fn set_priority_mask(&mut self, mask: u8) {
        self.regs.write32(GICC_PMR, mask as u32);
    }

    pub fn priority_mask(&self) -> u8 {
        self.regs.read32(GICC_PMR) as u8
    }

    /// Priority of the innermost active interrupt, 0xFF when idle
    pub fn running_priority(&self) -> u8 {
        self.regs.read32(GICC_RPR) as u8
    }

    /// Peek at what the next IAR read would return, without acknowledging
    pub fn highest_pending(&self) -> Option<ActiveIrq> {
        let pending = decode_iar(self.regs.read32(GICC_HPPIR));
        (!pending.irq.is_spurious()).then_some(pending)
    }

    pub fn control(&self) -> CpuControl {
        CpuControl::from_bits_retain(self.regs.read32(GICC_CTLR))
    }

    pub fn identification(&self) -> Identification {
        Identification::from_iidr(self.regs.read32(GICC_IIDR))
    }

    /// Register dump for diagnostics
    ///
    /// Reading IAR acknowledges whatever is pending; a real interrupt taken
    /// this way is completed immediately, so it is consumed, not left active.
    pub fn snapshot(&mut self) -> CpuInterfaceSnapshot {
        let mut snapshot = CpuInterfaceSnapshot {
            control: self.regs.read32(GICC_CTLR),
            priority_mask: self.regs.read32(GICC_PMR),
            binary_point: self.regs.read32(GICC_BPR),
            running_priority: self.regs.read32(GICC_RPR),
            highest_pending: self.regs.read32(GICC_HPPIR),
            acknowledged: 0,
        };
        snapshot.acknowledged = self.regs.read32(GICC_IAR);
        let taken = decode_iar(snapshot.acknowledged);
        if !taken.irq.is_spurious() {
            self.acknowledge_irq(taken);
        }
        snapshot
    }
}

/// Raw CPU interface registers captured by [`CpuInterface::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuInterfaceSnapshot {
    pub control: u32,
    pub priority_mask: u32,
    pub binary_point: u32,
    pub running_priority: u32,
    pub highest_pending: u32,
    pub acknowledged: u32,
}

impl fmt::Display for CpuInterfaceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hppi = decode_iar(self.highest_pending);
        let taken = decode_iar(self.acknowledged);
        writeln!(f, "GIC CPU interface:")?;
        writeln!(f, "  CTLR  = 0x{:08x} {:?}", self.control, CpuControl::from_bits_truncate(self.control))?;
        writeln!(f, "  PMR   = 0x{:02x}", self.priority_mask)?;
        writeln!(f, "  BPR   = 0x{:x}", self.binary_point)?;
        writeln!(f, "  RPR   = 0x{:02x}", self.running_priority)?;
        writeln!(f, "  HPPIR = irq {} cpu {}", hppi.irq, hppi.cpu)?;
        write!(f, "  IAR   = irq {} cpu {} (consumed)", taken.irq, taken.cpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;
    use vexa_hw_mock::SimulatedGic;
    use vexa_mmio::Window;

    fn cpu_interface(gic: &SimulatedGic) -> CpuInterface<Window<&SimulatedGic>> {
        CpuInterface::new(Window::new(gic, crate::GIC_CPU_INTERFACE_OFFSET))
    }

    #[test]
    fn test_eoir_encoding_inverts_iar_decoding() {
        for id in 32..1020u32 {
            for cpu in 0..8u32 {
                let raw = id | (cpu << 10);
                assert_eq!(encode_eoir(decode_iar(raw)), raw);
            }
        }
    }

    #[test]
    fn test_decode_masks_reserved_bits() {
        let active = decode_iar(0xFFFF_E000 | (2 << 10) | 37);
        assert_eq!(active.irq, IrqId::new(37));
        assert_eq!(active.cpu, CpuId::new(2));
    }

    #[test]
    fn test_init_programs_mask_then_control() {
        let gic = SimulatedGic::default();
        let mut cpu = cpu_interface(&gic);
        cpu.init();

        assert_eq!(gic.priority_mask(), 0xFF);
        assert_eq!(gic.cpu_control(), 0b111);
        assert_eq!(cpu.control(), INIT_CONTROL);
        assert!(!cpu.control().contains(CpuControl::EOI_MODE));

        let journal = gic.journal();
        let pmr = journal.position("gic", vexa_hw_mock::AccessKind::Write, 0x100 + GICC_PMR);
        let ctlr = journal.position("gic", vexa_hw_mock::AccessKind::Write, 0x100 + GICC_CTLR);
        assert!(pmr < ctlr);
    }

    #[test]
    fn test_acknowledge_writes_eoir_once() {
        let gic = SimulatedGic::default();
        let mut cpu = cpu_interface(&gic);
        cpu.acknowledge_irq(ActiveIrq::new(IrqId::new(40), CpuId::new(1)));
        assert_eq!(gic.journal().writes_to("gic", 0x100 + GICC_EOIR), vec![40 | (1 << 10)]);
    }

    #[test]
    fn test_priority_mask_round_trip() {
        let gic = SimulatedGic::default();
        let mut cpu = cpu_interface(&gic);
        cpu.set_priority_mask(0x80);
        assert_eq!(cpu.priority_mask(), 0x80);
        assert_eq!(cpu.running_priority(), 0xFF);
        assert_eq!(cpu.highest_pending(), None);
    }

    #[test]
    fn test_snapshot_consumes_pending_interrupt() {
        let gic = SimulatedGic::default();
        gic.write32(0x1000, 0b11);
        gic.write32(0x1000 + 0x104, 1 << 6);
        let mut cpu = cpu_interface(&gic);
        cpu.init();
        gic.assert_line(38);
        gic.lower_line(38);
        gic.write32(0x1000 + 0x204, 1 << 6);

        let snapshot = cpu.snapshot();
        assert_eq!(snapshot.acknowledged, 38);
        assert_eq!(snapshot.highest_pending, 38);
        assert!(!gic.is_active(38));
        assert!(!gic.is_pending(38));
        assert!(snapshot.to_string().contains("IAR   = irq 38"));

        let idle = cpu.snapshot();
        assert!(decode_iar(idle.acknowledged).irq.is_spurious());
        assert_eq!(gic.journal().writes_to("gic", 0x100 + GICC_EOIR), vec![38]);
    }
}
