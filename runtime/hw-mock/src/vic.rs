//! Simulated PL190 vectored interrupt controller

use std::cell::RefCell;

use vexa_mmio::RegisterBus;

use crate::journal::{Access, AccessKind, Journal};

const DEVICE: &str = "vic";

const IRQ_STATUS: usize = 0x00;
const FIQ_STATUS: usize = 0x04;
const RAW_INTR: usize = 0x08;
const INT_SELECT: usize = 0x0C;
const INT_ENABLE: usize = 0x10;
const INT_ENABLE_CLEAR: usize = 0x14;
const SOFT_INT: usize = 0x18;
const SOFT_INT_CLEAR: usize = 0x1C;
const PROTECTION: usize = 0x20;
const VECT_ADDR: usize = 0x30;
const DEF_VECT_ADDR: usize = 0x34;
const VECT_ADDR_BANK: usize = 0x100;
const VECT_CNTL_BANK: usize = 0x200;

const SLOTS: usize = 16;
const CNTL_ENABLE: u32 = 1 << 5;
const CNTL_SOURCE: u32 = 0x1F;

#[derive(Debug, Default)]
struct State {
    raw: u32,
    soft: u32,
    select: u32,
    enable: u32,
    protection: u32,
    default_vector: u32,
    vectors: [u32; SLOTS],
    controls: [u32; SLOTS],
    /// Slot being serviced (VECTADDR read, not yet written)
    in_service: Option<usize>,
    completions: usize,
}

impl State {
    fn irq_status(&self) -> u32 {
        (self.raw | self.soft) & self.enable & !self.select
    }

    fn active_vector(&mut self) -> u32 {
        let status = self.irq_status();
        let slot = (0..SLOTS).find(|&n| {
            let cntl = self.controls[n];
            cntl & CNTL_ENABLE != 0 && status & (1 << (cntl & CNTL_SOURCE)) != 0
        });
        match slot {
            Some(n) => {
                self.in_service = Some(n);
                self.vectors[n]
            }
            None => self.default_vector,
        }
    }

    fn read_word(&mut self, off: usize) -> u32 {
        match off {
            IRQ_STATUS => self.irq_status(),
            FIQ_STATUS => (self.raw | self.soft) & self.enable & self.select,
            RAW_INTR => self.raw | self.soft,
            INT_SELECT => self.select,
            INT_ENABLE => self.enable,
            SOFT_INT => self.soft,
            PROTECTION => self.protection,
            VECT_ADDR => self.active_vector(),
            DEF_VECT_ADDR => self.default_vector,
            0x100..=0x13F => self.vectors[(off - VECT_ADDR_BANK) / 4],
            0x200..=0x23F => self.controls[(off - VECT_CNTL_BANK) / 4],
            _ => 0,
        }
    }

    fn write_word(&mut self, off: usize, value: u32) {
        match off {
            INT_SELECT => self.select = value,
            INT_ENABLE => self.enable |= value,
            INT_ENABLE_CLEAR => self.enable &= !value,
            SOFT_INT => self.soft |= value,
            SOFT_INT_CLEAR => self.soft &= !value,
            PROTECTION => self.protection = value & 1,
            VECT_ADDR => {
                self.in_service = None;
                self.completions += 1;
            }
            DEF_VECT_ADDR => self.default_vector = value,
            0x100..=0x13F => self.vectors[(off - VECT_ADDR_BANK) / 4] = value,
            0x200..=0x23F => self.controls[(off - VECT_CNTL_BANK) / 4] = value & 0x3F,
            _ => {}
        }
    }
}

/// PL190 register file; 32-bit accesses only
pub struct SimulatedVic {
    state: RefCell<State>,
    journal: Journal,
}

impl Default for SimulatedVic {
    fn default() -> Self {
        Self::with_journal(Journal::new())
    }
}

impl SimulatedVic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: RefCell::new(State::default()),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn assert_line(&self, irq: u32) {
        self.state.borrow_mut().raw |= 1 << irq;
    }

    pub fn lower_line(&self, irq: u32) {
        self.state.borrow_mut().raw &= !(1 << irq);
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        self.state.borrow().enable & (1 << irq) != 0
    }

    pub fn is_fiq(&self, irq: u32) -> bool {
        self.state.borrow().select & (1 << irq) != 0
    }

    pub fn vector(&self, slot: usize) -> u32 {
        self.state.borrow().vectors[slot]
    }

    pub fn vector_control(&self, slot: usize) -> u32 {
        self.state.borrow().controls[slot]
    }

    pub fn in_service(&self) -> bool {
        self.state.borrow().in_service.is_some()
    }

    /// Number of VECTADDR writes (end of service)
    pub fn completions(&self) -> usize {
        self.state.borrow().completions
    }
}

impl RegisterBus for SimulatedVic {
    fn read8(&self, offset: usize) -> u8 {
        self.read32(offset & !3) as u8
    }

    fn read16(&self, offset: usize) -> u16 {
        self.read32(offset & !3) as u16
    }

    fn read32(&self, offset: usize) -> u32 {
        let value = self.state.borrow_mut().read_word(offset);
        self.journal.record(Access {
            device: DEVICE,
            kind: AccessKind::Read,
            offset,
            width: 4,
            value,
        });
        value
    }

    fn write8(&self, offset: usize, value: u8) {
        self.write32(offset & !3, value as u32)
    }

    fn write16(&self, offset: usize, value: u16) {
        self.write32(offset & !3, value as u32)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.journal.record(Access {
            device: DEVICE,
            kind: AccessKind::Write,
            offset,
            width: 4,
            value,
        });
        self.state.borrow_mut().write_word(offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_slot_returns_installed_address() {
        let vic = SimulatedVic::new();
        vic.write32(VECT_ADDR_BANK, 0xBABE);
        vic.write32(VECT_CNTL_BANK, CNTL_ENABLE | 12);
        vic.write32(INT_ENABLE, 1 << 12);

        vic.write32(DEF_VECT_ADDR, 0xDEAD);
        assert_eq!(vic.read32(VECT_ADDR), 0xDEAD);

        vic.assert_line(12);
        assert_eq!(vic.read32(IRQ_STATUS), 1 << 12);
        assert_eq!(vic.read32(VECT_ADDR), 0xBABE);
        assert!(vic.in_service());
        vic.write32(VECT_ADDR, 0);
        assert!(!vic.in_service());
        assert_eq!(vic.completions(), 1);
    }

    #[test]
    fn test_fiq_select_hides_irq() {
        let vic = SimulatedVic::new();
        vic.write32(INT_ENABLE, 1 << 3);
        vic.write32(INT_SELECT, 1 << 3);
        vic.assert_line(3);
        assert_eq!(vic.read32(IRQ_STATUS), 0);
        assert_eq!(vic.read32(FIQ_STATUS), 1 << 3);
        vic.write32(INT_ENABLE_CLEAR, 1 << 3);
        assert!(!vic.is_enabled(3));
    }
}
