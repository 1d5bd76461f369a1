//! GIC distributor
//!
//! Shared by all cores, at PERIPHBASE + 0x1000 on the Cortex-A9 MPCore.
//! Register banks come in three granularities:
//!
//! - 1 bit per interrupt (enable, pending, active): word at `(id / 32) * 4`,
//!   bit `id % 32`, accessed through separate set and clear banks
//! - 2 bits per interrupt (configuration): word at `(id / 16) * 4`,
//!   shift `(id % 16) * 2`
//! - 8 bits per interrupt (priority, targets): byte at `id`

use core::fmt;

use bitflags::bitflags;
use log::{debug, info};
use vexa_mmio::RegisterBus;

use crate::error::{IrqError, Result};
use crate::types::{CpuMask, Identification, IrqId};

/// GICD_CTLR - Distributor Control Register
const GICD_CTLR: usize = 0x000;

/// GICD_TYPER - Interrupt Controller Type Register
/// Bits 0-4: ITLinesNumber, lines = 32 * (N + 1)
/// Bits 5-7: CPU interfaces - 1
/// Bit 10: security extensions, bits 11-15: lockable SPIs
const GICD_TYPER: usize = 0x004;

/// GICD_IIDR - Distributor Implementer Identification Register
const GICD_IIDR: usize = 0x008;

/// GICD_ISENABLERn / GICD_ICENABLERn - write 1 to enable / disable
const GICD_ISENABLER: usize = 0x100;
const GICD_ICENABLER: usize = 0x180;

/// GICD_ISPENDRn / GICD_ICPENDRn - write 1 to set / clear pending
const GICD_ISPENDR: usize = 0x200;
const GICD_ICPENDR: usize = 0x280;

/// GICD_ISACTIVERn / GICD_ICACTIVERn - write 1 to set / clear active
const GICD_ISACTIVER: usize = 0x300;
const GICD_ICACTIVER: usize = 0x380;

/// GICD_IPRIORITYRn - one byte per interrupt, 0 is the highest priority
const GICD_IPRIORITYR: usize = 0x400;

/// GICD_ITARGETSRn - one byte per interrupt, bit n = CPU interface n
const GICD_ITARGETSR: usize = 0x800;

/// GICD_ICFGRn - two bits per interrupt, bit 1 set = edge triggered
const GICD_ICFGR: usize = 0xC00;

/// PPI / SPI line status (A9 MPCore specific, read-only)
const GICD_PPISR: usize = 0xD00;
const GICD_SPISR: usize = 0xD04;

/// GICD_SGIR - Software Generated Interrupt Register (write-only)
const GICD_SGIR: usize = 0xF00;

const SGIR_FILTER_SHIFT: u32 = 24;
const SGIR_FILTER_LIST: u32 = 0b00;
const SGIR_TARGETS_SHIFT: u32 = 16;
const SGIR_ID_MASK: u32 = 0xF;

/// Priority given to every interrupt by `init`
pub const DEFAULT_PRIORITY: u8 = 0x88;

/// Config word programming 16 SPIs level-sensitive, active-high
const ALL_LEVEL: u32 = 0x5555_5555;

/// Lines covered by a distributor snapshot
const SNAPSHOT_LINES: usize = 128;

bitflags! {
    /// GICD_CTLR bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DistributorControl: u32 {
        const ENABLE_GRP0 = 1 << 0;
        const ENABLE_GRP1 = 1 << 1;
    }
}

/// Trigger mode of an interrupt (2-bit ICFGR field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Sensitivity {
    /// Level-sensitive, active high
    Level = 0b01,
    /// Rising edge
    Edge = 0b11,
}

impl Sensitivity {
    fn from_field(bits: u32) -> Self {
        if bits & 0b10 != 0 {
            Sensitivity::Edge
        } else {
            Sensitivity::Level
        }
    }
}

/// Distributor parameters fixed by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributorConfig {
    /// Interrupt lines wired on the board; clamped to what TYPER reports
    pub lines: u32,
    pub default_priority: u8,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            lines: 96,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

/// Decoded GICD_TYPER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerType {
    pub it_lines_number: u32,
    pub cpu_count: u32,
    pub security_extensions: bool,
    pub lockable_spis: u32,
}

impl ControllerType {
    pub const fn from_typer(typer: u32) -> Self {
        Self {
            it_lines_number: typer & 0x1F,
            cpu_count: ((typer >> 5) & 0x7) + 1,
            security_extensions: typer & (1 << 10) != 0,
            lockable_spis: (typer >> 11) & 0x1F,
        }
    }

    /// Number of interrupt ids the distributor implements
    pub const fn lines(&self) -> u32 {
        32 * (self.it_lines_number + 1)
    }
}

/// SGIR value raising `sgi` on every CPU in `targets`
pub const fn encode_sgir(targets: CpuMask, sgi: u32) -> u32 {
    (SGIR_FILTER_LIST << SGIR_FILTER_SHIFT)
        | ((targets.bits() as u32) << SGIR_TARGETS_SHIFT)
        | (sgi & SGIR_ID_MASK)
}

#[inline]
fn bit_bank(id: u32) -> (usize, u32) {
    ((id / 32) as usize * 4, 1 << (id % 32))
}

#[inline]
fn config_field(id: u32) -> (usize, u32) {
    ((id / 16) as usize * 4, (id % 16) * 2)
}

/// Driver for the interrupt distributor
pub struct Distributor<B> {
    regs: B,
    lines: u32,
    default_priority: u8,
}

impl<B: RegisterBus> Distributor<B> {
    /// `regs` must address the distributor block (PERIPHBASE + 0x1000)
    pub const fn new(regs: B, config: DistributorConfig) -> Self {
        Self {
            regs,
            lines: config.lines,
            default_priority: config.default_priority,
        }
    }

    /// Interrupt lines this driver accepts
    pub fn lines(&self) -> u32 {
        self.lines
    }

    /// Reset every line to a known state and enable forwarding
    ///
    /// SPIs end up level-sensitive, at the default priority, targeted at
    /// CPU 0, disabled, inactive and not pending. Must complete before any
    /// device interrupt is enabled upstream.
    pub fn init(&mut self) {
        let reported = self.controller_type();
        self.lines = self.lines.min(reported.lines());

        self.regs.write32(GICD_CTLR, 0);

        // SGI and PPI configuration is fixed; start at the first SPI word
        for id in (IrqId::FIRST_SPI..self.lines).step_by(16) {
            self.regs.write32(GICD_ICFGR + config_field(id).0, ALL_LEVEL);
        }

        let priorities = u32::from_ne_bytes([self.default_priority; 4]);
        for id in (0..self.lines).step_by(4) {
            self.regs.write32(GICD_IPRIORITYR + id as usize, priorities);
        }

        let cpu0 = u32::from_ne_bytes([CpuMask::CPU0.bits(); 4]);
        for id in (IrqId::FIRST_SPI..self.lines).step_by(4) {
            self.regs.write32(GICD_ITARGETSR + id as usize, cpu0);
        }

        for id in (0..self.lines).step_by(32) {
            let offset = bit_bank(id).0;
            self.regs.write32(GICD_ICENABLER + offset, u32::MAX);
            self.regs.write32(GICD_ICACTIVER + offset, u32::MAX);
            self.regs.write32(GICD_ICPENDR + offset, u32::MAX);
        }

        let control = DistributorControl::ENABLE_GRP0 | DistributorControl::ENABLE_GRP1;
        self.regs.write32(GICD_CTLR, control.bits());

        info!(
            "[gid] {} lines, {} cpu interface(s), priority 0x{:02x}",
            self.lines, reported.cpu_count, self.default_priority
        );
        debug!("[gid] {}", self.identification());
    }

    fn check(&self, irq: IrqId) -> Result<u32> {
        if irq.raw() < self.lines {
            Ok(irq.raw())
        } else {
            Err(IrqError::InvalidIrq {
                irq: irq.raw(),
                lines: self.lines,
            })
        }
    }

    fn test_bit(&self, bank: usize, irq: IrqId) -> bool {
        match self.check(irq) {
            Ok(id) => {
                let (offset, bit) = bit_bank(id);
                self.regs.read32(bank + offset) & bit != 0
            }
            Err(_) => false,
        }
    }

    fn write_bit(&mut self, bank: usize, irq: IrqId) -> Result<()> {
        let (offset, bit) = bit_bank(self.check(irq)?);
        self.regs.write32(bank + offset, bit);
        Ok(())
    }

    /// Forward `irq` to its target CPUs
    pub fn enable(&mut self, irq: IrqId) -> Result<()> {
        self.write_bit(GICD_ISENABLER, irq)
    }

    pub fn disable(&mut self, irq: IrqId) -> Result<()> {
        self.write_bit(GICD_ICENABLER, irq)
    }

    /// Out-of-range ids read as disabled
    pub fn enabled(&self, irq: IrqId) -> bool {
        self.test_bit(GICD_ISENABLER, irq)
    }

    pub fn set_pending(&mut self, irq: IrqId) -> Result<()> {
        self.write_bit(GICD_ISPENDR, irq)
    }

    pub fn clear_pending(&mut self, irq: IrqId) -> Result<()> {
        self.write_bit(GICD_ICPENDR, irq)
    }

    pub fn is_pending(&self, irq: IrqId) -> bool {
        self.test_bit(GICD_ISPENDR, irq)
    }

    pub fn is_active(&self, irq: IrqId) -> bool {
        self.test_bit(GICD_ISACTIVER, irq)
    }

    pub fn set_priority(&mut self, irq: IrqId, priority: u8) -> Result<()> {
        let id = self.check(irq)?;
        self.regs.write8(GICD_IPRIORITYR + id as usize, priority);
        Ok(())
    }

    pub fn priority(&self, irq: IrqId) -> Result<u8> {
        let id = self.check(irq)?;
        Ok(self.regs.read8(GICD_IPRIORITYR + id as usize))
    }

    /// Route an SPI; SGI and PPI target bytes are read-only and ignore this
    pub fn set_targets(&mut self, irq: IrqId, targets: CpuMask) -> Result<()> {
        let id = self.check(irq)?;
        self.regs.write8(GICD_ITARGETSR + id as usize, targets.bits());
        Ok(())
    }

    pub fn targets(&self, irq: IrqId) -> Result<CpuMask> {
        let id = self.check(irq)?;
        Ok(CpuMask::from_bits_retain(self.regs.read8(GICD_ITARGETSR + id as usize)))
    }

    /// Program the trigger mode of an SPI
    pub fn set_sensitivity(&mut self, irq: IrqId, sensitivity: Sensitivity) -> Result<()> {
        let id = self.check(irq)?;
        if !irq.is_spi() {
            return Err(IrqError::ReadOnlySensitivity(id));
        }
        let (offset, shift) = config_field(id);
        self.regs.clear_and_set_bits(
            GICD_ICFGR + offset,
            0b11u32 << shift,
            (sensitivity as u32) << shift,
        );
        Ok(())
    }

    pub fn sensitivity(&self, irq: IrqId) -> Result<Sensitivity> {
        let id = self.check(irq)?;
        let (offset, shift) = config_field(id);
        Ok(Sensitivity::from_field(
            (self.regs.read32(GICD_ICFGR + offset) >> shift) & 0b11,
        ))
    }

    /// Raise SGI `sgi` on the CPUs in `targets` (explicit target list)
    pub fn raise_software_interrupt(&mut self, targets: CpuMask, sgi: IrqId) -> Result<()> {
        if !sgi.is_sgi() {
            return Err(IrqError::NotSgi(sgi.raw()));
        }
        self.regs.write32(GICD_SGIR, encode_sgir(targets, sgi.raw()));
        Ok(())
    }

    pub fn control(&self) -> DistributorControl {
        DistributorControl::from_bits_retain(self.regs.read32(GICD_CTLR))
    }

    pub fn controller_type(&self) -> ControllerType {
        ControllerType::from_typer(self.regs.read32(GICD_TYPER))
    }

    pub fn identification(&self) -> Identification {
        Identification::from_iidr(self.regs.read32(GICD_IIDR))
    }

    /// Register dump for diagnostics (no side effects)
    pub fn snapshot(&self) -> DistributorSnapshot {
        let lines = (self.lines as usize).min(SNAPSHOT_LINES);
        let mut snapshot = DistributorSnapshot {
            control: self.regs.read32(GICD_CTLR),
            controller_type: self.regs.read32(GICD_TYPER),
            lines,
            enabled: [0; SNAPSHOT_LINES / 32],
            pending: [0; SNAPSHOT_LINES / 32],
            active: [0; SNAPSHOT_LINES / 32],
            config: [0; SNAPSHOT_LINES / 16],
            priority: [0; SNAPSHOT_LINES],
            targets: [0; SNAPSHOT_LINES],
            ppi_status: self.regs.read32(GICD_PPISR),
            spi_status: [0; SNAPSHOT_LINES / 32 - 1],
        };
        for word in 0..lines.div_ceil(32) {
            snapshot.enabled[word] = self.regs.read32(GICD_ISENABLER + word * 4);
            snapshot.pending[word] = self.regs.read32(GICD_ISPENDR + word * 4);
            snapshot.active[word] = self.regs.read32(GICD_ISACTIVER + word * 4);
            if word > 0 {
                snapshot.spi_status[word - 1] = self.regs.read32(GICD_SPISR + (word - 1) * 4);
            }
        }
        for word in 0..lines.div_ceil(16) {
            snapshot.config[word] = self.regs.read32(GICD_ICFGR + word * 4);
        }
        for id in 0..lines {
            snapshot.priority[id] = self.regs.read8(GICD_IPRIORITYR + id);
            snapshot.targets[id] = self.regs.read8(GICD_ITARGETSR + id);
        }
        snapshot
    }
}

/// Raw distributor registers captured by [`Distributor::snapshot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributorSnapshot {
    pub control: u32,
    pub controller_type: u32,
    /// Lines captured (at most 128)
    pub lines: usize,
    pub enabled: [u32; SNAPSHOT_LINES / 32],
    pub pending: [u32; SNAPSHOT_LINES / 32],
    pub active: [u32; SNAPSHOT_LINES / 32],
    pub config: [u32; SNAPSHOT_LINES / 16],
    pub priority: [u8; SNAPSHOT_LINES],
    pub targets: [u8; SNAPSHOT_LINES],
    pub ppi_status: u32,
    pub spi_status: [u32; SNAPSHOT_LINES / 32 - 1],
}

impl DistributorSnapshot {
    fn write_bytes(f: &mut fmt::Formatter<'_>, name: &str, bytes: &[u8]) -> fmt::Result {
        for (row, chunk) in bytes.chunks(16).enumerate() {
            write!(f, "  {:<9} [{:3}]", name, row * 16)?;
            for byte in chunk {
                write!(f, " {:02x}", byte)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for DistributorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self.lines.div_ceil(32);
        let typer = ControllerType::from_typer(self.controller_type);
        writeln!(f, "GIC distributor:")?;
        writeln!(
            f,
            "  CTLR  = 0x{:08x} {:?}",
            self.control,
            DistributorControl::from_bits_truncate(self.control)
        )?;
        writeln!(
            f,
            "  TYPER = 0x{:08x} ({} lines, {} cpus, security={}, lspi={})",
            self.controller_type,
            typer.lines(),
            typer.cpu_count,
            typer.security_extensions,
            typer.lockable_spis
        )?;
        for (name, bank) in [("enabled", &self.enabled), ("pending", &self.pending), ("active", &self.active)] {
            write!(f, "  {:<9}", name)?;
            for value in &bank[..words] {
                write!(f, " {:08x}", value)?;
            }
            writeln!(f)?;
        }
        write!(f, "  {:<9}", "config")?;
        for value in &self.config[..self.lines.div_ceil(16)] {
            write!(f, " {:08x}", value)?;
        }
        writeln!(f)?;
        Self::write_bytes(f, "priority", &self.priority[..self.lines])?;
        Self::write_bytes(f, "targets", &self.targets[..self.lines])?;
        write!(f, "  PPISR = 0x{:08x} SPISR =", self.ppi_status)?;
        for value in &self.spi_status[..words.saturating_sub(1)] {
            write!(f, " {:08x}", value)?;
        }
        Ok(())
    }
}
