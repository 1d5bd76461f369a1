//! Interrupt identifiers

use core::fmt;

use bitflags::bitflags;

/// Interrupt line number as reported by the controller
///
/// - SGI (0-15): software generated, raised through the distributor
/// - PPI (16-31): private to one core (local timer, watchdog)
/// - SPI (32-1019): shared peripherals
/// - 1022/1023: spurious, no interrupt to service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct IrqId(u32);

impl IrqId {
    /// Returned by IAR when nothing is pending
    pub const SPURIOUS: IrqId = IrqId(1023);

    /// Returned to a Secure read of IAR when the pending interrupt is Group 1
    pub const SPURIOUS_GROUP1: IrqId = IrqId(1022);

    /// A vector the legacy controller could not map back to a line
    pub const UNMAPPED: IrqId = IrqId(u32::MAX);

    /// First shared peripheral interrupt
    pub const FIRST_SPI: u32 = 32;

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_spurious(self) -> bool {
        matches!(self.0, 1022 | 1023)
    }

    pub const fn is_sgi(self) -> bool {
        self.0 < 16
    }

    pub const fn is_ppi(self) -> bool {
        self.0 >= 16 && self.0 < 32
    }

    pub const fn is_spi(self) -> bool {
        self.0 >= Self::FIRST_SPI && self.0 < 1020
    }
}

impl From<u32> for IrqId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for IrqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CPU interface number (3-bit field of IAR/EOIR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct CpuId(u8);

impl CpuId {
    pub const BOOT: CpuId = CpuId(0);

    pub const fn new(raw: u8) -> Self {
        Self(raw & 0x7)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An interrupt taken by the core, as read from the acknowledge register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveIrq {
    pub irq: IrqId,
    /// Requesting CPU for SGIs, zero otherwise
    pub cpu: CpuId,
}

impl ActiveIrq {
    pub const fn new(irq: IrqId, cpu: CpuId) -> Self {
        Self { irq, cpu }
    }
}

bitflags! {
    /// CPU interfaces an interrupt is forwarded to (one bit per CPU)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuMask: u8 {
        const CPU0 = 1 << 0;
        const CPU1 = 1 << 1;
        const CPU2 = 1 << 2;
        const CPU3 = 1 << 3;
        const CPU4 = 1 << 4;
        const CPU5 = 1 << 5;
        const CPU6 = 1 << 6;
        const CPU7 = 1 << 7;
    }
}

impl CpuMask {
    pub const fn single(cpu: CpuId) -> Self {
        Self::from_bits_retain(1 << cpu.raw())
    }
}

/// Decoded implementer identification register (GICD_IIDR / GICC_IIDR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identification {
    pub implementer: u16,
    pub revision: u8,
    pub architecture: u8,
    pub product: u16,
}

impl Identification {
    pub const fn from_iidr(iidr: u32) -> Self {
        Self {
            implementer: (iidr & 0xFFF) as u16,
            revision: ((iidr >> 12) & 0xF) as u8,
            architecture: ((iidr >> 16) & 0xF) as u8,
            product: (iidr >> 20) as u16,
        }
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "implementer=0x{:03x} product=0x{:03x} arch=v{} rev={}",
            self.implementer, self.product, self.architecture, self.revision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spurious_predicate_is_exact() {
        for raw in 0..1024 {
            let expected = raw == 0x3FE || raw == 0x3FF;
            assert_eq!(IrqId::new(raw).is_spurious(), expected, "id {}", raw);
        }
        assert!(!IrqId::UNMAPPED.is_spurious());
    }

    #[test]
    fn test_classification() {
        assert!(IrqId::new(0).is_sgi());
        assert!(IrqId::new(15).is_sgi());
        assert!(IrqId::new(16).is_ppi());
        assert!(IrqId::new(31).is_ppi());
        assert!(IrqId::new(32).is_spi());
        assert!(!IrqId::SPURIOUS.is_spi());
    }

    #[test]
    fn test_cpu_mask_single() {
        assert_eq!(CpuMask::single(CpuId::new(0)), CpuMask::CPU0);
        assert_eq!(CpuMask::single(CpuId::new(3)), CpuMask::CPU3);
        assert_eq!(CpuId::new(9).raw(), 1);
    }

    #[test]
    fn test_identification_fields() {
        let id = Identification::from_iidr(0x0102_043B);
        assert_eq!(id.implementer, 0x43B);
        assert_eq!(id.architecture, 2);
        assert_eq!(id.product, 0x010);
    }
}
