//! Interrupt controller abstraction
//!
//! The dispatch path and the boot code only see [`InterruptController`];
//! which implementation backs it is a board decision.

use vexa_mmio::{Mmio, RegisterBus, Window};

use crate::error::Result;
use crate::gic::CpuInterface;
use crate::gid::{Distributor, DistributorConfig};
use crate::types::{ActiveIrq, IrqId};
use crate::{GIC_CPU_INTERFACE_OFFSET, GIC_DISTRIBUTOR_OFFSET};

/// Operations the dispatch path and boot code need from a controller
pub trait InterruptController {
    /// Bring the controller to a known state with every source disabled
    fn init(&mut self);

    /// Take the interrupt being signaled; `None` when it was spurious
    ///
    /// A `Some` result must be passed to [`acknowledge`](Self::acknowledge)
    /// exactly once, after the device has been serviced.
    fn current_irq(&mut self) -> Option<ActiveIrq>;

    /// Complete an interrupt returned by `current_irq`
    fn acknowledge(&mut self, active: ActiveIrq);

    fn enable(&mut self, irq: IrqId) -> Result<()>;

    fn disable(&mut self, irq: IrqId) -> Result<()>;

    fn is_enabled(&self, irq: IrqId) -> bool;
}

/// Cortex-A9 MPCore GIC: distributor plus this core's CPU interface
pub struct GicController<B> {
    distributor: Distributor<Window<B>>,
    cpu: CpuInterface<Window<B>>,
}

impl<B: RegisterBus + Clone> GicController<B> {
    /// `private_region` addresses PERIPHBASE; both blocks are placed at
    /// their fixed offsets inside it
    pub fn new(private_region: B, config: DistributorConfig) -> Self {
        Self {
            distributor: Distributor::new(
                Window::new(private_region.clone(), GIC_DISTRIBUTOR_OFFSET),
                config,
            ),
            cpu: CpuInterface::new(Window::new(private_region, GIC_CPU_INTERFACE_OFFSET)),
        }
    }
}

impl GicController<Mmio> {
    /// Locate the GIC through the core's configuration base register
    ///
    /// # Safety
    /// Must run in a privileged mode on a Cortex-A9 with the private
    /// peripheral region identity mapped as device memory.
    pub unsafe fn discover(config: DistributorConfig) -> Self {
        let base = vexa_platform::cpu::peripheral_base();
        log::debug!("[gic] PERIPHBASE = {:#010x}", base);
        Self::new(Mmio::new(base), config)
    }
}

impl<B: RegisterBus> GicController<B> {
    pub fn distributor(&self) -> &Distributor<Window<B>> {
        &self.distributor
    }

    pub fn distributor_mut(&mut self) -> &mut Distributor<Window<B>> {
        &mut self.distributor
    }

    pub fn cpu_interface(&self) -> &CpuInterface<Window<B>> {
        &self.cpu
    }

    pub fn cpu_interface_mut(&mut self) -> &mut CpuInterface<Window<B>> {
        &mut self.cpu
    }
}

impl<B: RegisterBus> InterruptController for GicController<B> {
    /// Distributor first, then the CPU interface
    fn init(&mut self) {
        self.distributor.init();
        self.cpu.init();
    }

    fn current_irq(&mut self) -> Option<ActiveIrq> {
        let active = self.cpu.current_irq();
        (!active.irq.is_spurious()).then_some(active)
    }

    fn acknowledge(&mut self, active: ActiveIrq) {
        self.cpu.acknowledge_irq(active);
    }

    fn enable(&mut self, irq: IrqId) -> Result<()> {
        self.distributor.enable(irq)
    }

    fn disable(&mut self, irq: IrqId) -> Result<()> {
        self.distributor.disable(irq)
    }

    fn is_enabled(&self, irq: IrqId) -> bool {
        self.distributor.enabled(irq)
    }
}
