//! Simulated Cortex-A9 interrupt controller (GIC CPU interface + distributor)

use std::cell::RefCell;

use vexa_mmio::RegisterBus;

use crate::journal::{Access, AccessKind, Journal};

/// CPU interface offset inside the private peripheral region
pub const CPU_INTERFACE_OFFSET: usize = 0x100;

/// Distributor offset inside the private peripheral region
pub const DISTRIBUTOR_OFFSET: usize = 0x1000;

const DEVICE: &str = "gic";
const SPURIOUS: u32 = 0x3FF;
const IIDR: u32 = 0x0102_043B;

/// Reset value of the PPI configuration word (fixed by the A9 MPCore)
const PPI_CONFIG: u32 = 0x7DC0_0000;

// CPU interface registers (relative to CPU_INTERFACE_OFFSET)
const GICC_CTLR: usize = 0x00;
const GICC_PMR: usize = 0x04;
const GICC_BPR: usize = 0x08;
const GICC_IAR: usize = 0x0C;
const GICC_EOIR: usize = 0x10;
const GICC_RPR: usize = 0x14;
const GICC_HPPIR: usize = 0x18;
const GICC_IIDR: usize = 0xFC;

// Distributor registers (relative to DISTRIBUTOR_OFFSET)
const GICD_CTLR: usize = 0x000;
const GICD_TYPER: usize = 0x004;
const GICD_IIDR: usize = 0x008;
const GICD_ISENABLER: usize = 0x100;
const GICD_ICENABLER: usize = 0x180;
const GICD_ISPENDR: usize = 0x200;
const GICD_ICPENDR: usize = 0x280;
const GICD_ISACTIVER: usize = 0x300;
const GICD_ICACTIVER: usize = 0x380;
const GICD_IPRIORITYR: usize = 0x400;
const GICD_ITARGETSR: usize = 0x800;
const GICD_ICFGR: usize = 0xC00;
const GICD_PPISR: usize = 0xD00;
const GICD_SPISR: usize = 0xD04;
const GICD_SGIR: usize = 0xF00;

#[derive(Debug, Clone, Copy, Default)]
struct Line {
    enabled: bool,
    pending: bool,
    active: bool,
    asserted: bool,
    priority: u8,
    targets: u8,
    config: u8,
    source_cpu: u8,
}

impl Line {
    fn level_sensitive(&self) -> bool {
        self.config & 0b10 == 0
    }
}

#[derive(Debug)]
struct State {
    lines: Vec<Line>,
    cpus: u8,
    dist_ctlr: u32,
    cpu_ctlr: u32,
    pmr: u32,
    bpr: u32,
    /// Acknowledged, not yet completed: (id, priority), innermost last
    running: Vec<(u32, u8)>,
    sgis: Vec<(u8, u8)>,
}

impl State {
    fn new(lines: u32, cpus: u8) -> Self {
        let lines = (0..lines)
            .map(|id| {
                let config = match id {
                    0..=15 => 0b10,
                    16..=31 => ((PPI_CONFIG >> ((id - 16) * 2)) & 0b11) as u8,
                    _ => 0,
                };
                Line {
                    config,
                    targets: if id < 32 { 0x01 } else { 0 },
                    ..Line::default()
                }
            })
            .collect();
        Self {
            lines,
            cpus,
            dist_ctlr: 0,
            cpu_ctlr: 0,
            pmr: 0,
            bpr: 0,
            running: Vec::new(),
            sgis: Vec::new(),
        }
    }

    fn line(&self, id: usize) -> Option<&Line> {
        self.lines.get(id)
    }

    fn bank_bits(&self, index: usize, bit: impl Fn(&Line) -> bool) -> u32 {
        (0..32)
            .filter(|i| self.line(index * 32 + i).map_or(false, &bit))
            .fold(0, |acc, i| acc | (1 << i))
    }

    fn update_bank(&mut self, index: usize, bits: u32, apply: impl Fn(&mut Line)) {
        for i in 0..32 {
            if bits & (1 << i) != 0 {
                if let Some(line) = self.lines.get_mut(index * 32 + i) {
                    apply(line);
                }
            }
        }
    }

    fn highest_pending(&self) -> Option<usize> {
        if self.dist_ctlr & 0b11 == 0 || self.cpu_ctlr & 0b11 == 0 {
            return None;
        }
        let running = self.running.last().map_or(0x100, |&(_, p)| p as u32);
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.enabled && l.pending && !l.active)
            .filter(|(_, l)| (l.priority as u32) < self.pmr && (l.priority as u32) < running)
            .min_by_key(|(id, l)| (l.priority, *id))
            .map(|(id, _)| id)
    }

    fn iar_value(&self, id: usize) -> u32 {
        let cpu = if id < 16 { self.lines[id].source_cpu as u32 } else { 0 };
        id as u32 | (cpu << 10)
    }

    fn acknowledge(&mut self) -> u32 {
        match self.highest_pending() {
            Some(id) => {
                let value = self.iar_value(id);
                let line = &mut self.lines[id];
                line.pending = false;
                line.active = true;
                let priority = line.priority;
                self.running.push((id as u32, priority));
                value
            }
            None => SPURIOUS,
        }
    }

    fn end_of_interrupt(&mut self, value: u32) {
        let id = value & 0x3FF;
        let Some(line) = self.lines.get_mut(id as usize) else {
            return;
        };
        if !line.active {
            return;
        }
        line.active = false;
        if line.level_sensitive() && line.asserted {
            line.pending = true;
        }
        if let Some(pos) = self.running.iter().rposition(|&(r, _)| r == id) {
            self.running.remove(pos);
        }
    }

    fn raise_sgi(&mut self, value: u32) {
        let filter = (value >> 24) & 0b11;
        let list = ((value >> 16) & 0xFF) as u8;
        let id = (value & 0xF) as usize;
        self.sgis.push((list, id as u8));
        let reaches_cpu0 = match filter {
            0 => list & 0x01 != 0,
            2 => true,
            _ => false,
        };
        if reaches_cpu0 {
            if let Some(line) = self.lines.get_mut(id) {
                line.pending = true;
                line.source_cpu = 0;
            }
        }
    }

    fn read_cpu(&mut self, off: usize) -> u32 {
        match off {
            GICC_CTLR => self.cpu_ctlr,
            GICC_PMR => self.pmr,
            GICC_BPR => self.bpr,
            GICC_IAR => self.acknowledge(),
            GICC_RPR => self.running.last().map_or(0xFF, |&(_, p)| p as u32),
            GICC_HPPIR => self.highest_pending().map_or(SPURIOUS, |id| self.iar_value(id)),
            GICC_IIDR => IIDR,
            _ => 0,
        }
    }

    fn write_cpu(&mut self, off: usize, value: u32) {
        match off {
            GICC_CTLR => self.cpu_ctlr = value & 0x3FF,
            GICC_PMR => self.pmr = value & 0xFF,
            GICC_BPR => self.bpr = value & 0x7,
            GICC_EOIR => self.end_of_interrupt(value),
            _ => {}
        }
    }

    fn read_dist_word(&self, off: usize) -> u32 {
        match off {
            GICD_CTLR => self.dist_ctlr,
            GICD_TYPER => {
                let itlines = (self.lines.len() as u32 / 32).saturating_sub(1);
                itlines | ((self.cpus as u32 - 1) << 5)
            }
            GICD_IIDR => IIDR,
            0x100..=0x1FF => self.bank_bits((off & 0x7F) / 4, |l| l.enabled),
            0x200..=0x2FF => self.bank_bits((off & 0x7F) / 4, |l| l.pending),
            0x300..=0x3FF => self.bank_bits((off & 0x7F) / 4, |l| l.active),
            0xC00..=0xCFF => {
                let first = (off - GICD_ICFGR) / 4 * 16;
                (0..16)
                    .filter_map(|i| self.line(first + i).map(|l| (i, l.config as u32)))
                    .fold(0, |acc, (i, c)| acc | (c << (i * 2)))
            }
            GICD_PPISR => self.bank_bits(0, |l| l.asserted) >> 16,
            0xD04..=0xD7F => self.bank_bits((off - GICD_SPISR) / 4 + 1, |l| l.asserted),
            _ => 0,
        }
    }

    fn write_dist_word(&mut self, off: usize, data: u32, mask: u32) {
        let bits = data & mask;
        match off {
            GICD_CTLR => self.dist_ctlr = ((self.dist_ctlr & !mask) | bits) & 0b11,
            0x100..=0x17F => self.update_bank((off - GICD_ISENABLER) / 4, bits, |l| l.enabled = true),
            0x180..=0x1FF => self.update_bank((off - GICD_ICENABLER) / 4, bits, |l| l.enabled = false),
            0x200..=0x27F => self.update_bank((off - GICD_ISPENDR) / 4, bits, |l| l.pending = true),
            0x280..=0x2FF => self.update_bank((off - GICD_ICPENDR) / 4, bits, |l| l.pending = false),
            0x300..=0x37F => self.update_bank((off - GICD_ISACTIVER) / 4, bits, |l| l.active = true),
            0x380..=0x3FF => self.update_bank((off - GICD_ICACTIVER) / 4, bits, |l| l.active = false),
            0xC00..=0xCFF => {
                let first = (off - GICD_ICFGR) / 4 * 16;
                for i in 0..16 {
                    let id = first + i;
                    // SGI and PPI configuration is read-only
                    if id < 32 || (mask >> (i * 2)) & 0b11 == 0 {
                        continue;
                    }
                    if let Some(line) = self.lines.get_mut(id) {
                        line.config = ((data >> (i * 2)) & 0b11) as u8;
                    }
                }
            }
            GICD_SGIR if mask == u32::MAX => self.raise_sgi(data),
            _ => {}
        }
    }

    fn read_dist_byte(&self, off: usize) -> u8 {
        match off {
            0x400..=0x7FF => self.line(off - GICD_IPRIORITYR).map_or(0, |l| l.priority),
            0x800..=0xBFF => self.line(off - GICD_ITARGETSR).map_or(0, |l| l.targets),
            _ => 0,
        }
    }

    fn write_dist_byte(&mut self, off: usize, value: u8) {
        match off {
            0x400..=0x7FF => {
                if let Some(line) = self.lines.get_mut(off - GICD_IPRIORITYR) {
                    line.priority = value;
                }
            }
            0x800..=0xBFF => {
                let id = off - GICD_ITARGETSR;
                // SGI/PPI targets read as the current CPU
                if id >= 32 {
                    if let Some(line) = self.lines.get_mut(id) {
                        line.targets = value;
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_byte_bank(off: usize) -> bool {
    (GICD_IPRIORITYR..GICD_ICFGR).contains(&off)
}

/// Cortex-A9 private peripheral region with a single CPU interface
///
/// Offsets passed through [`RegisterBus`] are relative to PERIPHBASE: the
/// CPU interface answers at [`CPU_INTERFACE_OFFSET`], the distributor at
/// [`DISTRIBUTOR_OFFSET`]. Everything else reads as zero and ignores writes.
pub struct SimulatedGic {
    state: RefCell<State>,
    journal: Journal,
}

impl Default for SimulatedGic {
    fn default() -> Self {
        Self::new(96, 1)
    }
}

impl SimulatedGic {
    pub fn new(lines: u32, cpus: u8) -> Self {
        Self::with_journal(lines, cpus, Journal::new())
    }

    pub fn with_journal(lines: u32, cpus: u8, journal: Journal) -> Self {
        assert!(lines % 32 == 0 && lines <= 1024, "line count must be a multiple of 32");
        assert!((1..=8).contains(&cpus));
        Self {
            state: RefCell::new(State::new(lines, cpus)),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Drive a device line high (edge lines latch as pending)
    pub fn assert_line(&self, id: u32) {
        let mut state = self.state.borrow_mut();
        let line = &mut state.lines[id as usize];
        line.asserted = true;
        line.pending = true;
    }

    /// Drop a device line; a level line that was not acknowledged stops pending
    pub fn lower_line(&self, id: u32) {
        let mut state = self.state.borrow_mut();
        let line = &mut state.lines[id as usize];
        line.asserted = false;
        if line.level_sensitive() {
            line.pending = false;
        }
    }

    pub fn is_enabled(&self, id: u32) -> bool {
        self.state.borrow().lines[id as usize].enabled
    }

    pub fn is_pending(&self, id: u32) -> bool {
        self.state.borrow().lines[id as usize].pending
    }

    pub fn is_active(&self, id: u32) -> bool {
        self.state.borrow().lines[id as usize].active
    }

    pub fn priority(&self, id: u32) -> u8 {
        self.state.borrow().lines[id as usize].priority
    }

    pub fn targets(&self, id: u32) -> u8 {
        self.state.borrow().lines[id as usize].targets
    }

    /// Raw 2-bit configuration field
    pub fn config(&self, id: u32) -> u8 {
        self.state.borrow().lines[id as usize].config
    }

    pub fn distributor_control(&self) -> u32 {
        self.state.borrow().dist_ctlr
    }

    pub fn cpu_control(&self) -> u32 {
        self.state.borrow().cpu_ctlr
    }

    pub fn priority_mask(&self) -> u32 {
        self.state.borrow().pmr
    }

    /// Software interrupts written to SGIR as (target list, id)
    pub fn raised_sgis(&self) -> Vec<(u8, u8)> {
        self.state.borrow().sgis.clone()
    }

    fn read(&self, offset: usize, width: u8) -> u32 {
        let mut state = self.state.borrow_mut();
        let value = if let Some(off) = cpu_offset(offset) {
            let word = state.read_cpu(off & !3);
            lane(word, off, width)
        } else if let Some(off) = dist_offset(offset) {
            if is_byte_bank(off) {
                (0..width as usize).fold(0, |acc, i| {
                    acc | ((state.read_dist_byte(off + i) as u32) << (8 * i))
                })
            } else {
                lane(state.read_dist_word(off & !3), off, width)
            }
        } else {
            0
        };
        drop(state);
        self.journal.record(Access {
            device: DEVICE,
            kind: AccessKind::Read,
            offset,
            width,
            value,
        });
        value
    }

    fn write(&self, offset: usize, width: u8, value: u32) {
        self.journal.record(Access {
            device: DEVICE,
            kind: AccessKind::Write,
            offset,
            width,
            value,
        });
        let mut state = self.state.borrow_mut();
        if let Some(off) = cpu_offset(offset) {
            if width == 4 {
                state.write_cpu(off, value);
            } else {
                let merged = merge(state.read_cpu_plain(off & !3), off, width, value);
                state.write_cpu(off & !3, merged);
            }
        } else if let Some(off) = dist_offset(offset) {
            if is_byte_bank(off) {
                for i in 0..width as usize {
                    state.write_dist_byte(off + i, (value >> (8 * i)) as u8);
                }
            } else {
                let shift = (off & 3) * 8;
                state.write_dist_word(off & !3, value << shift, width_mask(width) << shift);
            }
        }
    }
}

impl State {
    /// Register value without acknowledge side effects, for sub-word writes
    fn read_cpu_plain(&self, off: usize) -> u32 {
        match off {
            GICC_CTLR => self.cpu_ctlr,
            GICC_PMR => self.pmr,
            GICC_BPR => self.bpr,
            _ => 0,
        }
    }
}

fn cpu_offset(offset: usize) -> Option<usize> {
    (CPU_INTERFACE_OFFSET..CPU_INTERFACE_OFFSET + 0x100)
        .contains(&offset)
        .then(|| offset - CPU_INTERFACE_OFFSET)
}

fn dist_offset(offset: usize) -> Option<usize> {
    (DISTRIBUTOR_OFFSET..DISTRIBUTOR_OFFSET + 0x1000)
        .contains(&offset)
        .then(|| offset - DISTRIBUTOR_OFFSET)
}

fn width_mask(width: u8) -> u32 {
    match width {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => u32::MAX,
    }
}

fn lane(word: u32, off: usize, width: u8) -> u32 {
    (word >> ((off & 3) * 8)) & width_mask(width)
}

fn merge(word: u32, off: usize, width: u8, value: u32) -> u32 {
    let shift = (off & 3) * 8;
    let mask = width_mask(width) << shift;
    (word & !mask) | ((value << shift) & mask)
}

impl RegisterBus for SimulatedGic {
    fn read8(&self, offset: usize) -> u8 {
        self.read(offset, 1) as u8
    }

    fn read16(&self, offset: usize) -> u16 {
        self.read(offset, 2) as u16
    }

    fn read32(&self, offset: usize) -> u32 {
        self.read(offset, 4)
    }

    fn write8(&self, offset: usize, value: u8) {
        self.write(offset, 1, value as u32)
    }

    fn write16(&self, offset: usize, value: u16) {
        self.write(offset, 2, value as u32)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.write(offset, 4, value)
    }
}
