//! Serial console device

use crate::dispatch::IrqDevice;

/// What the dispatch path needs from a serial port driver
pub trait SerialPort {
    /// Pop one received byte, `None` when the receive FIFO is empty
    fn receive_byte(&mut self) -> Option<u8>;

    /// Blocks while the transmit FIFO is full
    fn send_byte(&mut self, byte: u8);

    fn enable_interrupt_sources(&mut self, mask: u32);

    /// Clear the port's interrupt output (sources other than receive)
    fn acknowledge_line(&mut self);
}

impl<P: SerialPort + ?Sized> SerialPort for &mut P {
    fn receive_byte(&mut self) -> Option<u8> {
        (**self).receive_byte()
    }

    fn send_byte(&mut self, byte: u8) {
        (**self).send_byte(byte)
    }

    fn enable_interrupt_sources(&mut self, mask: u32) {
        (**self).enable_interrupt_sources(mask)
    }

    fn acknowledge_line(&mut self) {
        (**self).acknowledge_line()
    }
}

/// Echoes what arrives on `input` to `output`, carriage return as CR LF
///
/// On interrupt the pending byte is read before anything is written to
/// either port, then the input line is cleared.
pub struct EchoConsole<I, O> {
    input: I,
    output: O,
    received: usize,
}

impl<I: SerialPort, O: SerialPort> EchoConsole<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self {
            input,
            output,
            received: 0,
        }
    }

    /// Bytes echoed so far
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    fn echo(&mut self, byte: u8) {
        if byte == b'\r' {
            self.output.send_byte(b'\r');
            self.output.send_byte(b'\n');
        } else {
            self.output.send_byte(byte);
        }
    }
}

impl<I: SerialPort, O: SerialPort> IrqDevice for EchoConsole<I, O> {
    fn handle_irq(&mut self) {
        let pending = self.input.receive_byte();
        if let Some(byte) = pending {
            self.received += 1;
            self.echo(byte);
        }
        self.input.acknowledge_line();
    }
}
