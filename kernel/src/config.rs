//! Kernel configuration
//!
//! Compile-time choices made through Cargo features: which UARTs the
//! console uses and how verbose the log is.

use log::LevelFilter;
use vexa_platform::board::{selected, UartPort};

/// Port the console receives on; its interrupt drives the echo
pub const STDIN: UartPort = selected::UART0;

/// Port received bytes are echoed to
#[cfg(feature = "local-echo")]
pub const STDOUT: UartPort = selected::UART0;

#[cfg(not(feature = "local-echo"))]
pub const STDOUT: UartPort = selected::UART1;

/// Most verbose level enabled by a `log-*` feature
pub const LOG_LEVEL: LevelFilter = if cfg!(feature = "log-trace") {
    LevelFilter::Trace
} else if cfg!(feature = "log-debug") {
    LevelFilter::Debug
} else if cfg!(feature = "log-info") {
    LevelFilter::Info
} else if cfg!(feature = "log-warn") {
    LevelFilter::Warn
} else if cfg!(feature = "log-error") {
    LevelFilter::Error
} else {
    LevelFilter::Off
};

/// Vector tag installed for the console line on the PL190
#[cfg(feature = "board-versatilepb")]
pub const CONSOLE_VECTOR_TAG: u32 = 0xBABE;
