use thiserror::Error;

/// Error types for heap operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("Size too large: {size} bytes (maximum {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Out of memory ({requested} bytes requested, no free page left)")]
    OutOfMemory { requested: usize },

    #[error("Heap region start {0:#x} is not page aligned")]
    UnalignedRegion(usize),

    #[error("Heap region [{low:#x}, {high:#x}) holds no whole page")]
    RegionTooSmall { low: usize, high: usize },

    #[error("Heap used before initialization")]
    Uninitialized,
}

pub type Result<T> = core::result::Result<T, AllocError>;
