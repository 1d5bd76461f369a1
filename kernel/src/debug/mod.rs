//! Debug output and logging

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;
use vexa_mmio::Mmio;
use vexa_platform::cpu::InterruptGuard;
use vexa_uart::Pl011;

use crate::config;

/// Console UART shared by `kprint!` and the logger
static CONSOLE: Mutex<Option<Pl011<Mmio>>> = Mutex::new(None);

static LOGGER: KernelLogger = KernelLogger;

/// Bring up the console port and install the logger
pub fn init(level: LevelFilter) {
    // SAFETY: the board table gives the identity-mapped UART window
    let mut port = Pl011::new(unsafe { Mmio::new(config::STDOUT.base) });
    port.init();
    *CONSOLE.lock() = Some(port);

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Debug writer (uses UART)
///
/// IRQs stay masked while the console lock is held, so the trap path can
/// log without deadlocking against the code it interrupted.
pub struct DebugWriter;

impl Write for DebugWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let _irq = InterruptGuard::new();
        if let Some(port) = CONSOLE.lock().as_mut() {
            port.send_str(s);
        }
        Ok(())
    }
}

/// Last-resort output for the panic path; skips the console if it is held
pub fn emergency(args: fmt::Arguments) {
    if let Some(mut guard) = CONSOLE.try_lock() {
        if let Some(port) = guard.as_mut() {
            let _ = port.write_fmt(args);
        }
    }
}

/// Print macro for kernel
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = write!($crate::debug::DebugWriter, $($arg)*);
    });
}

/// Print with newline macro for kernel
#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = writeln!($crate::debug::DebugWriter, $($arg)*);
    });
}

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            kprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
