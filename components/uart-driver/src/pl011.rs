//! ARM PL011 UART Hardware Interface
//!
//! Reference: ARM PrimeCell UART (PL011) Technical Reference Manual

use core::fmt;

use bitflags::bitflags;
use vexa_irq::SerialPort;
use vexa_mmio::RegisterBus;

/// PL011 UART Register offsets
const UARTDR: usize = 0x000;     // Data Register
const UARTFR: usize = 0x018;     // Flag Register
const UARTCR: usize = 0x030;     // Control Register
const UARTIFLS: usize = 0x034;   // Interrupt FIFO Level Select
const UARTIMSC: usize = 0x038;   // Interrupt Mask Set/Clear
const UARTRIS: usize = 0x03C;    // Raw Interrupt Status
const UARTMIS: usize = 0x040;    // Masked Interrupt Status
const UARTICR: usize = 0x044;    // Interrupt Clear Register

/// TX interrupt at 1/2 full, RX interrupt at 1/8 full
const IFLS_DEFAULT: u32 = 0x02;

bitflags! {
    /// Flag Register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        const BUSY = 1 << 3;
        const RXFE = 1 << 4;
        const TXFF = 1 << 5;
        const RXFF = 1 << 6;
        const TXFE = 1 << 7;
    }
}

bitflags! {
    /// Control Register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        const UARTEN = 1 << 0;
        const TXE = 1 << 8;
        const RXE = 1 << 9;
    }
}

bitflags! {
    /// Interrupt bits (IMSC, RIS, MIS, ICR share the layout)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u32 {
        const RIM = 1 << 0;
        const CTSM = 1 << 1;
        const DCDM = 1 << 2;
        const DSRM = 1 << 3;
        const RX = 1 << 4;
        const TX = 1 << 5;
        const RT = 1 << 6;
        const FE = 1 << 7;
        const PE = 1 << 8;
        const BE = 1 << 9;
        const OE = 1 << 10;
    }
}

const ENABLE: Control = Control::UARTEN.union(Control::TXE).union(Control::RXE);

/// PL011 UART driver
pub struct Pl011<B> {
    regs: B,
}

impl<B: RegisterBus> Pl011<B> {
    /// `regs` must address the UART's register window
    pub const fn new(regs: B) -> Self {
        Self { regs }
    }

    /// Enable the UART with every interrupt masked and cleared
    ///
    /// Line settings (baud rate, framing) are left as the boot firmware or
    /// emulator configured them.
    pub fn init(&mut self) {
        self.regs.clear_bits(UARTCR, ENABLE.bits());
        self.regs.write32(UARTICR, Interrupts::all().bits());
        self.regs.write32(UARTIMSC, 0);
        self.regs.set_bits(UARTCR, ENABLE.bits());
    }

    /// Unmask exactly `irqs` (disables the UART while reprogramming)
    pub fn enable_irqs(&mut self, irqs: Interrupts) {
        self.regs.clear_bits(UARTCR, ENABLE.bits());
        self.regs.write32(UARTICR, Interrupts::all().bits());
        self.regs.write32(UARTIMSC, irqs.bits());
        self.regs.write32(UARTIFLS, IFLS_DEFAULT);
        self.regs.set_bits(UARTCR, ENABLE.bits());
    }

    /// Mask `irqs`, keeping the others
    pub fn disable_irqs(&mut self, irqs: Interrupts) {
        self.regs.clear_bits(UARTCR, ENABLE.bits());
        self.regs.write32(UARTICR, Interrupts::all().bits());
        self.regs.clear_bits(UARTIMSC, irqs.bits());
        self.regs.write32(UARTIFLS, IFLS_DEFAULT);
        self.regs.set_bits(UARTCR, ENABLE.bits());
    }

    /// Clear every asserted source except receive, which only drops once
    /// the FIFO is drained below its trigger level
    pub fn ack_irqs(&mut self) {
        let pending = self.masked_interrupt_status() & !Interrupts::RX;
        self.regs.write32(UARTICR, pending.bits());
    }

    pub fn clear_irqs(&mut self, irqs: Interrupts) {
        self.regs.write32(UARTICR, irqs.bits());
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.regs.read32(UARTFR))
    }

    /// Check if transmit FIFO is full
    pub fn tx_full(&self) -> bool {
        self.flags().contains(Flags::TXFF)
    }

    /// Check if receive FIFO is empty
    pub fn rx_empty(&self) -> bool {
        self.flags().contains(Flags::RXFE)
    }

    /// Write a byte to the UART (blocking)
    pub fn write_byte(&mut self, byte: u8) {
        while self.tx_full() {
            core::hint::spin_loop();
        }
        self.regs.write32(UARTDR, byte as u32);
    }

    /// Read a byte from the UART (non-blocking)
    ///
    /// The flag register is checked first so that DR is only read when it
    /// holds data.
    pub fn read_byte(&mut self) -> Option<u8> {
        if self.rx_empty() {
            None
        } else {
            Some((self.regs.read32(UARTDR) & 0xFF) as u8)
        }
    }

    /// Write a string, LF becomes CR LF
    pub fn send_str(&mut self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }

    pub fn interrupt_mask(&self) -> Interrupts {
        Interrupts::from_bits_truncate(self.regs.read32(UARTIMSC))
    }

    /// Get raw interrupt status
    pub fn interrupt_status(&self) -> Interrupts {
        Interrupts::from_bits_truncate(self.regs.read32(UARTRIS))
    }

    /// Get masked interrupt status
    pub fn masked_interrupt_status(&self) -> Interrupts {
        Interrupts::from_bits_truncate(self.regs.read32(UARTMIS))
    }
}

impl<B: RegisterBus> SerialPort for Pl011<B> {
    fn receive_byte(&mut self) -> Option<u8> {
        self.read_byte()
    }

    fn send_byte(&mut self, byte: u8) {
        self.write_byte(byte)
    }

    fn enable_interrupt_sources(&mut self, mask: u32) {
        self.enable_irqs(Interrupts::from_bits_truncate(mask))
    }

    fn acknowledge_line(&mut self) {
        self.ack_irqs()
    }
}

impl<B: RegisterBus> fmt::Write for Pl011<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.send_str(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;
    use vexa_hw_mock::{AccessKind, SimulatedUart};

    #[test]
    fn test_init_masks_and_enables() {
        let sim = SimulatedUart::new();
        let mut uart = Pl011::new(&sim);
        uart.init();

        assert_eq!(sim.register(UARTCR), ENABLE.bits());
        assert_eq!(sim.interrupt_mask(), 0);
        assert_eq!(sim.journal().writes_to("uart", UARTICR), vec![0x7FF]);
    }

    #[test]
    fn test_enable_irqs_programs_mask_and_fifo_level() {
        let sim = SimulatedUart::new();
        let mut uart = Pl011::new(&sim);
        uart.init();
        uart.enable_irqs(Interrupts::RX);

        assert_eq!(sim.interrupt_mask(), Interrupts::RX.bits());
        assert_eq!(sim.register(UARTIFLS), IFLS_DEFAULT);
        assert_eq!(uart.interrupt_mask(), Interrupts::RX);

        uart.disable_irqs(Interrupts::RX);
        assert_eq!(sim.interrupt_mask(), 0);
    }

    #[test]
    fn test_read_checks_flags_before_data() {
        let sim = SimulatedUart::new();
        let mut uart = Pl011::new(&sim);
        assert_eq!(uart.read_byte(), None);
        assert_eq!(sim.journal().reads_of("uart", UARTDR), 0);

        sim.inject(b"z");
        assert_eq!(uart.read_byte(), Some(b'z'));
        let entries = sim.journal().entries();
        let last_fr = entries
            .iter()
            .rposition(|a| a.kind == AccessKind::Read && a.offset == UARTFR)
            .unwrap();
        let dr = entries
            .iter()
            .position(|a| a.kind == AccessKind::Read && a.offset == UARTDR)
            .unwrap();
        assert!(last_fr < dr);
    }

    #[test]
    fn test_ack_leaves_receive_interrupt() {
        let sim = SimulatedUart::new();
        let mut uart = Pl011::new(&sim);
        uart.enable_irqs(Interrupts::RX | Interrupts::TX);
        sim.inject(b"q");
        uart.write_byte(b'!');
        assert_eq!(uart.masked_interrupt_status(), Interrupts::RX | Interrupts::TX);

        uart.ack_irqs();
        assert_eq!(uart.masked_interrupt_status(), Interrupts::RX);
        assert_eq!(uart.read_byte(), Some(b'q'));
        assert!(!sim.line_asserted());
    }

    #[test]
    fn test_formatted_output_uses_crlf() {
        let sim = SimulatedUart::new();
        let mut uart = Pl011::new(&sim);
        write!(uart, "irq {}\n", 37).unwrap();
        assert_eq!(sim.transmitted(), b"irq 37\r\n".to_vec());
    }

    #[test]
    fn test_send_waits_for_fifo_space() {
        let sim = SimulatedUart::new();
        let uart = Pl011::new(&sim);
        sim.set_tx_full(true);
        assert!(uart.tx_full());
        sim.set_tx_full(false);
        assert!(!uart.tx_full());
        assert!(uart.flags().contains(Flags::TXFE));
    }
}
