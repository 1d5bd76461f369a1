//! Memory-mapped register access
//!
//! Every peripheral driver in the workspace talks to hardware through the
//! [`RegisterBus`] trait instead of dereferencing raw addresses itself:
//!
//! - [`Mmio`] is the real thing: one volatile load or store of exactly the
//!   requested width at `base + offset`.
//! - [`Window`] places a driver at a fixed offset inside another bus (the GIC
//!   CPU interface and distributor both live inside the Cortex-A9 private
//!   peripheral region).
//! - Shared references forward to the bus they point at, so several drivers
//!   can be built over one register file.
//!
//! Host tests substitute a simulated register file (see `vexa-hw-mock`).
//!
//! # Access contract
//! The read-modify-write helpers (`set_bits`, `clear_bits`,
//! `clear_and_set_bits`) issue exactly one read followed by exactly one write.
//! Write-only and self-clearing registers must be driven with plain `write*`.
//! Offsets are not range checked.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

use core::ops::{BitAnd, BitOr, Not};
use core::ptr::{read_volatile, write_volatile};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// Register widths supported by the bus (8, 16 and 32 bit)
pub trait RegisterWidth:
    sealed::Sealed
    + Copy
    + PartialEq
    + core::fmt::Debug
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Not<Output = Self>
{
    /// Single access of this width
    fn load<B: RegisterBus + ?Sized>(bus: &B, offset: usize) -> Self;

    /// Single store of this width
    fn store<B: RegisterBus + ?Sized>(bus: &B, offset: usize, value: Self);
}

impl RegisterWidth for u8 {
    #[inline]
    fn load<B: RegisterBus + ?Sized>(bus: &B, offset: usize) -> Self {
        bus.read8(offset)
    }

    #[inline]
    fn store<B: RegisterBus + ?Sized>(bus: &B, offset: usize, value: Self) {
        bus.write8(offset, value)
    }
}

impl RegisterWidth for u16 {
    #[inline]
    fn load<B: RegisterBus + ?Sized>(bus: &B, offset: usize) -> Self {
        bus.read16(offset)
    }

    #[inline]
    fn store<B: RegisterBus + ?Sized>(bus: &B, offset: usize, value: Self) {
        bus.write16(offset, value)
    }
}

impl RegisterWidth for u32 {
    #[inline]
    fn load<B: RegisterBus + ?Sized>(bus: &B, offset: usize) -> Self {
        bus.read32(offset)
    }

    #[inline]
    fn store<B: RegisterBus + ?Sized>(bus: &B, offset: usize, value: Self) {
        bus.write32(offset, value)
    }
}

/// A block of registers addressed by byte offset
///
/// Accesses take `&self`: hardware registers are shared state whose
/// mutation is not visible to the borrow checker anyway.
pub trait RegisterBus {
    fn read8(&self, offset: usize) -> u8;
    fn read16(&self, offset: usize) -> u16;
    fn read32(&self, offset: usize) -> u32;
    fn write8(&self, offset: usize, value: u8);
    fn write16(&self, offset: usize, value: u16);
    fn write32(&self, offset: usize, value: u32);

    /// Read a register of width `T`
    #[inline]
    fn read<T: RegisterWidth>(&self, offset: usize) -> T
    where
        Self: Sized,
    {
        T::load(self, offset)
    }

    /// Write a register of width `T`
    #[inline]
    fn write<T: RegisterWidth>(&self, offset: usize, value: T)
    where
        Self: Sized,
    {
        T::store(self, offset, value)
    }

    /// `reg |= bits`
    #[inline]
    fn set_bits<T: RegisterWidth>(&self, offset: usize, bits: T)
    where
        Self: Sized,
    {
        let value = T::load(self, offset);
        T::store(self, offset, value | bits);
    }

    /// `reg &= !bits`
    #[inline]
    fn clear_bits<T: RegisterWidth>(&self, offset: usize, bits: T)
    where
        Self: Sized,
    {
        let value = T::load(self, offset);
        T::store(self, offset, value & !bits);
    }

    /// `reg = (reg & !clear) | set`
    #[inline]
    fn clear_and_set_bits<T: RegisterWidth>(&self, offset: usize, clear: T, set: T)
    where
        Self: Sized,
    {
        let value = T::load(self, offset);
        T::store(self, offset, (value & !clear) | set);
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    #[inline]
    fn read8(&self, offset: usize) -> u8 {
        (**self).read8(offset)
    }

    #[inline]
    fn read16(&self, offset: usize) -> u16 {
        (**self).read16(offset)
    }

    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    #[inline]
    fn write8(&self, offset: usize, value: u8) {
        (**self).write8(offset, value)
    }

    #[inline]
    fn write16(&self, offset: usize, value: u16) {
        (**self).write16(offset, value)
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// Physical (or identity-mapped) register block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Create a register block at `base`
    ///
    /// # Safety
    /// `base` must point at device memory that stays mapped for the lifetime
    /// of every driver built on this block, and every offset used through it
    /// must stay inside the device's register window.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the block
    pub const fn base(&self) -> usize {
        self.base
    }

    #[inline(always)]
    fn addr(&self, offset: usize) -> usize {
        self.base + offset
    }
}

// SAFETY (all accessors): `Mmio::new` requires the window to be mapped device
// memory, so each volatile access is to a valid address.
impl RegisterBus for Mmio {
    #[inline(always)]
    fn read8(&self, offset: usize) -> u8 {
        unsafe { read_volatile(self.addr(offset) as *const u8) }
    }

    #[inline(always)]
    fn read16(&self, offset: usize) -> u16 {
        unsafe { read_volatile(self.addr(offset) as *const u16) }
    }

    #[inline(always)]
    fn read32(&self, offset: usize) -> u32 {
        unsafe { read_volatile(self.addr(offset) as *const u32) }
    }

    #[inline(always)]
    fn write8(&self, offset: usize, value: u8) {
        unsafe { write_volatile(self.addr(offset) as *mut u8, value) }
    }

    #[inline(always)]
    fn write16(&self, offset: usize, value: u16) {
        unsafe { write_volatile(self.addr(offset) as *mut u16, value) }
    }

    #[inline(always)]
    fn write32(&self, offset: usize, value: u32) {
        unsafe { write_volatile(self.addr(offset) as *mut u32, value) }
    }
}

/// A view of `bus` starting at `offset`
#[derive(Debug, Clone, Copy)]
pub struct Window<B> {
    bus: B,
    offset: usize,
}

impl<B: RegisterBus> Window<B> {
    pub const fn new(bus: B, offset: usize) -> Self {
        Self { bus, offset }
    }

    /// Offset of this window inside the parent bus
    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub fn inner(&self) -> &B {
        &self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }
}

impl<B: RegisterBus> RegisterBus for Window<B> {
    #[inline]
    fn read8(&self, offset: usize) -> u8 {
        self.bus.read8(self.offset + offset)
    }

    #[inline]
    fn read16(&self, offset: usize) -> u16 {
        self.bus.read16(self.offset + offset)
    }

    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        self.bus.read32(self.offset + offset)
    }

    #[inline]
    fn write8(&self, offset: usize, value: u8) {
        self.bus.write8(self.offset + offset, value)
    }

    #[inline]
    fn write16(&self, offset: usize, value: u16) {
        self.bus.write16(self.offset + offset, value)
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        self.bus.write32(self.offset + offset, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::vec::Vec;

    /// Little-endian byte array that records every access
    struct ArrayBus {
        bytes: RefCell<[u8; 64]>,
        log: RefCell<Vec<(char, usize, u32)>>,
    }

    impl ArrayBus {
        fn new() -> Self {
            Self {
                bytes: RefCell::new([0; 64]),
                log: RefCell::new(Vec::new()),
            }
        }

        fn load(&self, offset: usize, width: usize) -> u32 {
            let bytes = self.bytes.borrow();
            let mut value = 0u32;
            for i in 0..width {
                value |= (bytes[offset + i] as u32) << (8 * i);
            }
            self.log.borrow_mut().push(('r', offset, value));
            value
        }

        fn store(&self, offset: usize, width: usize, value: u32) {
            let mut bytes = self.bytes.borrow_mut();
            for i in 0..width {
                bytes[offset + i] = (value >> (8 * i)) as u8;
            }
            self.log.borrow_mut().push(('w', offset, value));
        }
    }

    impl RegisterBus for ArrayBus {
        fn read8(&self, offset: usize) -> u8 {
            self.load(offset, 1) as u8
        }
        fn read16(&self, offset: usize) -> u16 {
            self.load(offset, 2) as u16
        }
        fn read32(&self, offset: usize) -> u32 {
            self.load(offset, 4)
        }
        fn write8(&self, offset: usize, value: u8) {
            self.store(offset, 1, value as u32)
        }
        fn write16(&self, offset: usize, value: u16) {
            self.store(offset, 2, value as u32)
        }
        fn write32(&self, offset: usize, value: u32) {
            self.store(offset, 4, value)
        }
    }

    #[test]
    fn test_widths_share_storage() {
        let bus = ArrayBus::new();
        bus.write32(0x8, 0x1122_3344);
        assert_eq!(bus.read8(0x8), 0x44);
        assert_eq!(bus.read8(0xB), 0x11);
        assert_eq!(bus.read16(0xA), 0x1122);
        assert_eq!(bus.read::<u32>(0x8), 0x1122_3344);
    }

    #[test]
    fn test_set_and_clear_bits() {
        let bus = ArrayBus::new();
        bus.write::<u32>(0x4, 0b1000);
        bus.set_bits(0x4, 0b0011u32);
        assert_eq!(bus.read32(0x4), 0b1011);
        bus.clear_bits(0x4, 0b1001u32);
        assert_eq!(bus.read32(0x4), 0b0010);
    }

    #[test]
    fn test_clear_and_set_bits() {
        let bus = ArrayBus::new();
        bus.write8(0x10, 0xF0);
        bus.clear_and_set_bits(0x10, 0x30u8, 0x05u8);
        assert_eq!(bus.read8(0x10), 0xC5);
    }

    #[test]
    fn test_read_modify_write_is_one_read_one_write() {
        let bus = ArrayBus::new();
        bus.set_bits(0x0, 1u32 << 7);
        let log = bus.log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], ('r', 0x0, 0));
        assert_eq!(log[1], ('w', 0x0, 0x80));
    }

    #[test]
    fn test_plain_write_never_reads() {
        let bus = ArrayBus::new();
        bus.write32(0x20, 0xDEAD_BEEF);
        let log = bus.log.borrow();
        assert_eq!(*log, vec![('w', 0x20, 0xDEAD_BEEF)]);
    }

    #[test]
    fn test_window_offsets_accesses() {
        let bus = ArrayBus::new();
        let window = Window::new(&bus, 0x10);
        window.write32(0x4, 0xA5A5_0000);
        assert_eq!(bus.read32(0x14), 0xA5A5_0000);
        assert_eq!(window.offset(), 0x10);

        let nested = Window::new(window, 0x20);
        nested.write8(0x0, 0x7E);
        assert_eq!(bus.read8(0x30), 0x7E);
    }

    #[test]
    fn test_mmio_on_plain_memory() {
        let mut backing = [0u32; 4];
        let mmio = unsafe { Mmio::new(backing.as_mut_ptr() as usize) };
        mmio.write32(0x4, 0xCAFE_F00D);
        mmio.set_bits(0x8, 0x3u32);
        assert_eq!(mmio.read32(0x4), 0xCAFE_F00D);
        assert_eq!(mmio.read32(0x8), 0x3);
        assert_eq!(backing[1], 0xCAFE_F00D);
    }
}
