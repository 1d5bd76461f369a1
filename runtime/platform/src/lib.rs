//! # Vexa Platform Layer
//!
//! Everything that differs between boards or needs privileged instructions
//! lives here, so the drivers and the allocator stay portable:
//!
//! - [`board`]: peripheral addresses and interrupt numbers per board
//! - [`cpu`]: core id, peripheral base discovery, IRQ masking, halt
//!
//! ## Build Modes
//!
//! ```bash
//! # Versatile Express A9 (default)
//! cargo build
//!
//! # Versatile PB (legacy VIC)
//! cargo build --no-default-features --features board-versatilepb
//! ```
//!
//! On anything other than `target_arch = "arm"` the [`cpu`] primitives are
//! simulated so that host unit tests can run.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod board;
pub mod cpu;

/// Platform configuration and detection
pub mod config {
    #[cfg(all(feature = "board-vexpress-a9", feature = "board-versatilepb"))]
    compile_error!("Select exactly one board: 'board-vexpress-a9' or 'board-versatilepb'.");

    /// Name of the board selected at compile time
    pub fn board_name() -> &'static str {
        crate::board::selected::NAME
    }

    /// Check if we're running on the real core (not a host simulation)
    pub const fn is_target() -> bool {
        cfg!(target_arch = "arm")
    }

    /// Check if the selected board routes interrupts through a GIC
    pub const fn has_gic() -> bool {
        matches!(
            crate::board::selected::CONTROLLER,
            crate::board::ControllerKind::Gic { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        assert!(!config::is_target());
        #[cfg(not(feature = "board-versatilepb"))]
        {
            assert_eq!(config::board_name(), "vexpress-a9");
            assert!(config::has_gic());
        }
        #[cfg(feature = "board-versatilepb")]
        {
            assert_eq!(config::board_name(), "versatilepb");
            assert!(!config::has_gic());
        }
    }
}
