use thiserror::Error;

/// Error types for interrupt controller operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IrqError {
    #[error("IRQ {irq} outside the {lines} implemented lines")]
    InvalidIrq { irq: u32, lines: u32 },

    #[error("IRQ {0} is not a software-generated interrupt")]
    NotSgi(u32),

    #[error("Trigger mode of IRQ {0} is fixed by hardware")]
    ReadOnlySensitivity(u32),

    #[error("Route table full ({capacity} entries)")]
    RouteTableFull { capacity: usize },

    #[error("IRQ {0} already has a handler")]
    AlreadyRouted(u32),
}

pub type Result<T> = core::result::Result<T, IrqError>;
