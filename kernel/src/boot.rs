//! Reset entry, exception vectors and the IRQ trampoline
//!
//! Both boards are run with an ARMv7-A core (QEMU `-cpu cortex-a8` on the
//! Versatile PB), so the vector base is always set through VBAR.

use core::arch::global_asm;

// Secondary cores of the MPCore park; only core 0 boots.
#[cfg(not(feature = "board-versatilepb"))]
global_asm!(
    ".section .text.boot, \"ax\"",
    ".arm",
    ".global _start",
    "_start:",
    "    mrc p15, 0, r0, c0, c0, 5", // MPIDR
    "    ands r0, r0, #3",
    "    bne _hang",
    "    b _start_common",
);

#[cfg(feature = "board-versatilepb")]
global_asm!(
    ".section .text.boot, \"ax\"",
    ".arm",
    ".global _start",
    "_start:",
    "    b _start_common",
);

global_asm!(
    ".section .text.boot, \"ax\"",
    ".arm",
    "_start_common:",
    "    msr cpsr_c, #0xD3", // SVC mode, IRQ and FIQ masked
    "    ldr r0, =_vectors",
    "    mcr p15, 0, r0, c12, c0, 0", // VBAR
    "    msr cpsr_c, #0xD2", // IRQ mode
    "    ldr sp, =_irq_stack_top",
    "    msr cpsr_c, #0xD3",
    "    ldr sp, =_svc_stack_top",
    "    ldr r0, =_bss_start",
    "    ldr r1, =_bss_end",
    "    mov r2, #0",
    "1:  cmp r0, r1",
    "    strlo r2, [r0], #4",
    "    blo 1b",
    "    bl {kmain}",
    ".global _hang",
    "_hang:",
    "    wfi",
    "    b _hang",
    "",
    ".balign 32",
    "_vectors:",
    "    b _start",  // reset
    "    b _hang",   // undefined instruction
    "    b _hang",   // supervisor call
    "    b _hang",   // prefetch abort
    "    b _hang",   // data abort
    "    nop",
    "    b _irq_entry",
    "    b _hang",   // FIQ
    "",
    // Caller-saved registers only; irq_handler follows the AAPCS.
    "_irq_entry:",
    "    sub lr, lr, #4",
    "    stmfd sp!, {{r0-r3, r12, lr}}",
    "    bl {irq_handler}",
    "    ldmfd sp!, {{r0-r3, r12, pc}}^",
    ".ltorg",
    kmain = sym crate::kmain,
    irq_handler = sym crate::irq::irq_handler,
);
