//! Simulated PL011 UART

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use vexa_mmio::RegisterBus;

use crate::journal::{Access, AccessKind, Journal};

const DEVICE: &str = "uart";

const UARTDR: usize = 0x000;
const UARTFR: usize = 0x018;
const UARTIMSC: usize = 0x038;
const UARTRIS: usize = 0x03C;
const UARTMIS: usize = 0x040;
const UARTICR: usize = 0x044;

const FR_TXFE: u32 = 1 << 7;
const FR_TXFF: u32 = 1 << 5;
const FR_RXFE: u32 = 1 << 4;

const INT_RX: u32 = 1 << 4;
const INT_TX: u32 = 1 << 5;

#[derive(Debug, Default)]
struct State {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    ris: u32,
    imsc: u32,
    tx_full: bool,
    /// Plain read/write registers (CR, LCR_H, IBRD, FBRD, IFLS)
    plain: HashMap<usize, u32>,
}

impl State {
    fn read_word(&mut self, off: usize) -> u32 {
        match off {
            UARTDR => {
                let byte = self.rx.pop_front().unwrap_or(0);
                if self.rx.is_empty() {
                    self.ris &= !INT_RX;
                }
                byte as u32
            }
            UARTFR => {
                let mut flags = 0;
                if self.rx.is_empty() {
                    flags |= FR_RXFE;
                }
                if self.tx_full {
                    flags |= FR_TXFF;
                } else {
                    flags |= FR_TXFE;
                }
                flags
            }
            UARTIMSC => self.imsc,
            UARTRIS => self.ris,
            UARTMIS => self.ris & self.imsc,
            _ => self.plain.get(&off).copied().unwrap_or(0),
        }
    }

    fn write_word(&mut self, off: usize, value: u32) {
        match off {
            UARTDR => {
                self.tx.push(value as u8);
                self.ris |= INT_TX;
            }
            UARTFR | UARTRIS | UARTMIS => {}
            UARTIMSC => self.imsc = value & 0x7FF,
            UARTICR => self.ris &= !value,
            _ => {
                self.plain.insert(off, value);
            }
        }
    }
}

/// PL011 register file with an injectable receive FIFO
pub struct SimulatedUart {
    name: &'static str,
    state: RefCell<State>,
    journal: Journal,
}

impl Default for SimulatedUart {
    fn default() -> Self {
        Self::with_journal(DEVICE, Journal::new())
    }
}

impl SimulatedUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name` tags this port's journal entries (e.g. "uart0", "uart1")
    pub fn with_journal(name: &'static str, journal: Journal) -> Self {
        Self {
            name,
            state: RefCell::new(State::default()),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue received bytes and raise the receive interrupt
    pub fn inject(&self, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.rx.extend(bytes.iter().copied());
        if !state.rx.is_empty() {
            state.ris |= INT_RX;
        }
    }

    pub fn transmitted(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    pub fn pending_rx(&self) -> usize {
        self.state.borrow().rx.len()
    }

    pub fn set_tx_full(&self, full: bool) {
        self.state.borrow_mut().tx_full = full;
    }

    /// Masked interrupt output (what the interrupt controller sees)
    pub fn line_asserted(&self) -> bool {
        let state = self.state.borrow();
        state.ris & state.imsc != 0
    }

    pub fn interrupt_mask(&self) -> u32 {
        self.state.borrow().imsc
    }

    pub fn register(&self, offset: usize) -> u32 {
        self.state.borrow().plain.get(&offset).copied().unwrap_or(0)
    }
}

impl RegisterBus for SimulatedUart {
    fn read8(&self, offset: usize) -> u8 {
        self.read32(offset & !3) as u8
    }

    fn read16(&self, offset: usize) -> u16 {
        self.read32(offset & !3) as u16
    }

    fn read32(&self, offset: usize) -> u32 {
        let value = self.state.borrow_mut().read_word(offset);
        self.journal.record(Access {
            device: self.name,
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
            device: self.name,
            kind: AccessKind::Write,
            offset,
            width: 4,
            value,
        });
        self.state.borrow_mut().write_word(offset, value);
    }
}
