//! Privileged CPU primitives
//!
//! The only place in the workspace that issues coprocessor reads or touches
//! CPSR. On the host the same API is backed by an atomic flag so code that
//! masks interrupts around critical sections can be unit tested.

#[cfg(target_arch = "arm")]
mod imp {
    use core::arch::asm;

    /// CPSR.I: IRQs masked when set
    const CPSR_IRQ_MASK: u32 = 1 << 7;

    /// CBAR holds PERIPHBASE in bits [31:13]
    const CBAR_BASE_MASK: u32 = !((1 << 13) - 1);

    pub fn core_id() -> u32 {
        let mpidr: u32;
        // SAFETY: MPIDR read has no side effects
        unsafe {
            asm!("mrc p15, 0, {}, c0, c0, 5", out(reg) mpidr, options(nomem, nostack, preserves_flags));
        }
        mpidr & 0x3
    }

    pub fn peripheral_base() -> usize {
        let cbar: u32;
        // SAFETY: CBAR read has no side effects
        unsafe {
            asm!("mrc p15, 4, {}, c15, c0, 0", out(reg) cbar, options(nomem, nostack, preserves_flags));
        }
        (cbar & CBAR_BASE_MASK) as usize
    }

    pub fn mask_interrupts() -> bool {
        let cpsr: u32;
        // SAFETY: privileged mode; acts as a compiler barrier (no `nomem`)
        unsafe {
            asm!("mrs {}, cpsr", out(reg) cpsr, options(nostack, preserves_flags));
            asm!("cpsid i", options(nostack, preserves_flags));
        }
        cpsr & CPSR_IRQ_MASK == 0
    }

    pub fn unmask_interrupts() {
        // SAFETY: privileged mode; acts as a compiler barrier
        unsafe {
            asm!("cpsie i", options(nostack, preserves_flags));
        }
    }

    pub fn interrupts_enabled() -> bool {
        let cpsr: u32;
        unsafe {
            asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack, preserves_flags));
        }
        cpsr & CPSR_IRQ_MASK == 0
    }

    pub fn wait_for_interrupt() {
        unsafe {
            asm!("wfi", options(nomem, nostack, preserves_flags));
        }
    }

    pub fn halt() -> ! {
        mask_interrupts();
        loop {
            wait_for_interrupt();
        }
    }
}

#[cfg(not(target_arch = "arm"))]
mod imp {
    use core::sync::atomic::{AtomicBool, Ordering};

    static IRQ_ENABLED: AtomicBool = AtomicBool::new(false);

    pub fn core_id() -> u32 {
        0
    }

    pub fn peripheral_base() -> usize {
        match crate::board::selected::CONTROLLER {
            crate::board::ControllerKind::Gic { fallback_periphbase, .. } => fallback_periphbase,
            crate::board::ControllerKind::Vic { .. } => 0,
        }
    }

    pub fn mask_interrupts() -> bool {
        IRQ_ENABLED.swap(false, Ordering::SeqCst)
    }

    pub fn unmask_interrupts() {
        IRQ_ENABLED.store(true, Ordering::SeqCst);
    }

    pub fn interrupts_enabled() -> bool {
        IRQ_ENABLED.load(Ordering::SeqCst)
    }

    pub fn wait_for_interrupt() {
        core::hint::spin_loop();
    }

    pub fn halt() -> ! {
        panic!("core halted");
    }
}

/// Index of the executing core (MPIDR affinity level 0)
#[inline]
pub fn core_id() -> u32 {
    imp::core_id()
}

/// Base of the Cortex-A9 private peripheral region (SCU, GIC, timers)
#[inline]
pub fn peripheral_base() -> usize {
    imp::peripheral_base()
}

/// Mask IRQs at the core; returns whether they were enabled before
#[inline]
pub fn mask_interrupts() -> bool {
    imp::mask_interrupts()
}

/// Unmask IRQs at the core
#[inline]
pub fn unmask_interrupts() {
    imp::unmask_interrupts()
}

#[inline]
pub fn interrupts_enabled() -> bool {
    imp::interrupts_enabled()
}

/// Sleep until the next interrupt
#[inline]
pub fn wait_for_interrupt() {
    imp::wait_for_interrupt()
}

/// Stop this core for good
///
/// On the host this panics, which lets tests observe fatal paths.
pub fn halt() -> ! {
    imp::halt()
}

/// Keeps IRQs masked while alive; restores the previous state on drop
#[must_use = "interrupts are unmasked again as soon as the guard is dropped"]
pub struct InterruptGuard {
    was_enabled: bool,
}

impl InterruptGuard {
    pub fn new() -> Self {
        Self {
            was_enabled: mask_interrupts(),
        }
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            unmask_interrupts();
        }
    }
}
