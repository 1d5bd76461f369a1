//! Interrupt dispatch path
//!
//! The IRQ trap lands in [`Dispatcher::dispatch`], which:
//! 1. takes the signaled interrupt from the controller
//! 2. returns at once if it was spurious (no device call, no acknowledge)
//! 3. lets the owning device read and clear its source
//! 4. completes the interrupt at the controller
//!
//! An id with no registered device is acknowledged and dropped.

use log::trace;

use crate::controller::InterruptController;
use crate::error::{IrqError, Result};
use crate::types::IrqId;

/// Devices that can be routed from the dispatch path
pub trait IrqDevice {
    /// Service the device: consume pending data, then clear its interrupt
    /// source. Runs before the controller sees end-of-interrupt.
    fn handle_irq(&mut self);
}

/// Route table capacity
pub const MAX_ROUTES: usize = 8;

/// What one call to [`Dispatcher::dispatch`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Spurious,
    Handled(IrqId),
    /// Acknowledged without a device
    Unrouted(IrqId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub spurious: u64,
    pub handled: u64,
    pub unrouted: u64,
}

struct Route<'d> {
    irq: IrqId,
    device: &'d mut dyn IrqDevice,
}

/// The platform-wide interrupt handler
pub struct Dispatcher<'d, C> {
    controller: C,
    routes: [Option<Route<'d>>; MAX_ROUTES],
    stats: DispatchStats,
}

impl<'d, C: InterruptController> Dispatcher<'d, C> {
    /// Takes an already initialized controller
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            routes: core::array::from_fn(|_| None),
            stats: DispatchStats::default(),
        }
    }

    /// Route `irq` to `device`; does not touch the controller's enable state
    pub fn register(&mut self, irq: IrqId, device: &'d mut dyn IrqDevice) -> Result<()> {
        if self.routes.iter().flatten().any(|route| route.irq == irq) {
            return Err(IrqError::AlreadyRouted(irq.raw()));
        }
        let slot = self
            .routes
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(IrqError::RouteTableFull { capacity: MAX_ROUTES })?;
        *slot = Some(Route { irq, device });
        Ok(())
    }

    /// Drop the route for `irq`; returns whether one existed
    pub fn unregister(&mut self, irq: IrqId) -> bool {
        match self
            .routes
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|route| route.irq == irq))
        {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    pub fn is_routed(&self, irq: IrqId) -> bool {
        self.routes.iter().flatten().any(|route| route.irq == irq)
    }

    /// Handle one interrupt trap
    pub fn dispatch(&mut self) -> Dispatch {
        let Some(active) = self.controller.current_irq() else {
            self.stats.spurious += 1;
            trace!("[irq] spurious");
            return Dispatch::Spurious;
        };

        let outcome = match self
            .routes
            .iter_mut()
            .flatten()
            .find(|route| route.irq == active.irq)
        {
            Some(route) => {
                route.device.handle_irq();
                self.stats.handled += 1;
                Dispatch::Handled(active.irq)
            }
            None => {
                self.stats.unrouted += 1;
                Dispatch::Unrouted(active.irq)
            }
        };

        self.controller.acknowledge(active);
        trace!("[irq] {} cpu {} -> {:?}", active.irq, active.cpu, outcome);
        outcome
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }
}
