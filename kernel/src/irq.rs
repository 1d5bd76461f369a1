//! Interrupt wiring
//!
//! Builds the board's controller, routes the console UART through the
//! dispatcher and provides the Rust side of the IRQ trap.

use alloc::boxed::Box;

use log::{info, warn};
use spin::Mutex;
use vexa_irq::{Dispatch, Dispatcher, EchoConsole, InterruptController, IrqId, Result};
use vexa_mmio::Mmio;
use vexa_platform::{board::selected, cpu};
use vexa_uart::{Interrupts, Pl011};

use crate::config;

#[cfg(not(feature = "board-versatilepb"))]
pub type Controller = vexa_irq::GicController<Mmio>;

#[cfg(feature = "board-versatilepb")]
pub type Controller = vexa_irq::Pl190<Mmio>;

type Console = EchoConsole<Pl011<Mmio>, Pl011<Mmio>>;

struct KernelDispatch(Dispatcher<'static, Controller>);

// SAFETY: one core; the dispatcher is installed with IRQs masked and only
// the trap path touches it afterwards.
unsafe impl Send for KernelDispatch {}

static DISPATCH: Mutex<Option<KernelDispatch>> = Mutex::new(None);

#[cfg(not(feature = "board-versatilepb"))]
fn controller() -> Controller {
    let config = vexa_irq::DistributorConfig {
        lines: selected::NIRQS,
        ..Default::default()
    };
    // SAFETY: kmain runs privileged with the private region identity mapped
    unsafe { Controller::discover(config) }
}

#[cfg(feature = "board-versatilepb")]
fn controller() -> Controller {
    // SAFETY: fixed PL190 window from the board table
    Controller::new(unsafe { Mmio::new(selected::VIC_BASE) })
}

#[cfg(not(feature = "board-versatilepb"))]
fn enable_console_line(controller: &mut Controller, irq: IrqId) -> Result<()> {
    controller.enable(irq)
}

#[cfg(feature = "board-versatilepb")]
fn enable_console_line(controller: &mut Controller, irq: IrqId) -> Result<()> {
    controller.enable_irq(irq, config::CONSOLE_VECTOR_TAG)
}

/// Controller first, then the console source, then the core
///
/// Runs with IRQs still masked from reset.
pub fn init() -> Result<()> {
    let mut controller = controller();
    controller.init();

    // SAFETY: board table UART windows, identity mapped
    let mut input = Pl011::new(unsafe { Mmio::new(config::STDIN.base) });
    let output = Pl011::new(unsafe { Mmio::new(config::STDOUT.base) });
    input.init();
    input.enable_irqs(Interrupts::RX);

    let irq = IrqId::new(config::STDIN.irq);
    enable_console_line(&mut controller, irq)?;

    let console: &'static mut Console = Box::leak(Box::new(EchoConsole::new(input, output)));
    let mut dispatcher = Dispatcher::new(controller);
    dispatcher.register(irq, console)?;
    *DISPATCH.lock() = Some(KernelDispatch(dispatcher));

    info!("[irq] console on {} routed", irq);
    cpu::unmask_interrupts();
    Ok(())
}

/// Rust side of the IRQ vector; runs in IRQ mode with IRQs masked
#[no_mangle]
pub extern "C" fn irq_handler() {
    let mut slot = DISPATCH.lock();
    let Some(KernelDispatch(dispatcher)) = slot.as_mut() else {
        return;
    };
    if let Dispatch::Unrouted(irq) = dispatcher.dispatch() {
        warn!("[irq] {} has no handler", irq);
    }
}
