//! Controller bring-up and dispatch against the simulated hardware

use std::cell::Cell;

use vexa_hw_mock::{AccessKind, SimulatedGic, SimulatedVic};
use vexa_irq::*;

const GICC_EOIR: usize = 0x110;
const GICD_ISENABLER1: usize = 0x1104;
const GICD_ICENABLER1: usize = 0x1184;

struct Probe<'a> {
    calls: &'a Cell<u32>,
}

impl IrqDevice for Probe<'_> {
    fn handle_irq(&mut self) {
        self.calls.set(self.calls.get() + 1);
    }
}

fn booted(gic: &SimulatedGic) -> GicController<&SimulatedGic> {
    let mut controller = GicController::new(gic, DistributorConfig::default());
    controller.init();
    controller
}

/// Enable then disable id 35 touches exactly bit 3 of the second word
#[test]
fn test_enable_disable_id_35() {
    let gic = SimulatedGic::default();
    let mut controller = booted(&gic);
    let irq = IrqId::new(35);
    gic.journal().clear();

    controller.enable(irq).unwrap();
    assert!(controller.is_enabled(irq));
    controller.disable(irq).unwrap();
    assert!(!controller.is_enabled(irq));

    assert_eq!(gic.journal().writes_to("gic", GICD_ISENABLER1), vec![1 << 3]);
    assert_eq!(gic.journal().writes_to("gic", GICD_ICENABLER1), vec![1 << 3]);
}

/// Every SPI round-trips through enable / disable without side effects
#[test]
fn test_enable_round_trip_every_line() {
    let gic = SimulatedGic::default();
    let mut controller = booted(&gic);
    for raw in 0..96 {
        let irq = IrqId::new(raw);
        controller.enable(irq).unwrap();
        assert!(controller.is_enabled(irq), "irq {}", raw);
        controller.disable(irq).unwrap();
        assert!(!controller.is_enabled(irq), "irq {}", raw);
    }
    assert!(matches!(
        controller.enable(IrqId::new(96)),
        Err(IrqError::InvalidIrq { irq: 96, lines: 96 })
    ));
}

/// Boot leaves SPIs level-sensitive, targeted at CPU 0, disabled
#[test]
fn test_boot_state() {
    let gic = SimulatedGic::default();
    let controller = booted(&gic);
    let distributor = controller.distributor();

    for raw in 32..96 {
        let irq = IrqId::new(raw);
        assert_eq!(distributor.sensitivity(irq).unwrap(), Sensitivity::Level);
        assert_eq!(distributor.targets(irq).unwrap(), CpuMask::CPU0);
        assert_eq!(distributor.priority(irq).unwrap(), DEFAULT_PRIORITY);
        assert!(!distributor.enabled(irq));
        assert!(!distributor.is_pending(irq));
    }
    assert_eq!(gic.priority_mask(), 0xFF);
    assert_eq!(
        distributor.control(),
        DistributorControl::ENABLE_GRP0 | DistributorControl::ENABLE_GRP1
    );
}

/// Routed, unrouted and spurious interrupts through one dispatcher
#[test]
fn test_dispatch_outcomes() {
    let gic = SimulatedGic::default();
    let mut controller = booted(&gic);
    controller.enable(IrqId::new(40)).unwrap();
    controller.enable(IrqId::new(41)).unwrap();

    let calls = Cell::new(0);
    let mut probe = Probe { calls: &calls };
    let mut dispatcher = Dispatcher::new(controller);
    dispatcher.register(IrqId::new(40), &mut probe).unwrap();

    gic.assert_line(40);
    assert_eq!(dispatcher.dispatch(), Dispatch::Handled(IrqId::new(40)));
    gic.lower_line(40);
    assert_eq!(calls.get(), 1);

    gic.assert_line(41);
    assert_eq!(dispatcher.dispatch(), Dispatch::Unrouted(IrqId::new(41)));
    gic.lower_line(41);

    gic.journal().clear();
    assert_eq!(dispatcher.dispatch(), Dispatch::Spurious);
    assert!(gic.journal().writes_to("gic", GICC_EOIR).is_empty());
    assert_eq!(calls.get(), 1);

    let stats = dispatcher.stats();
    assert_eq!((stats.handled, stats.unrouted, stats.spurious), (1, 1, 1));
}

/// Higher priority (lower value) lines are taken first
#[test]
fn test_priority_order() {
    let gic = SimulatedGic::default();
    let mut controller = booted(&gic);
    for raw in [50, 51] {
        controller.enable(IrqId::new(raw)).unwrap();
    }
    controller
        .distributor_mut()
        .set_priority(IrqId::new(51), 0x10)
        .unwrap();

    gic.assert_line(50);
    gic.assert_line(51);
    let first = controller.current_irq().unwrap();
    assert_eq!(first.irq, IrqId::new(51));
    controller.acknowledge(first);
    gic.lower_line(51);

    let second = controller.current_irq().unwrap();
    assert_eq!(second.irq, IrqId::new(50));
    controller.acknowledge(second);
    assert_eq!(gic.journal().writes_to("gic", GICC_EOIR), vec![51, 50]);
}

/// PL190: unknown vectors fall back to the status register
#[test]
fn test_vic_vector_resolution() {
    let vic = SimulatedVic::new();
    let mut pl190 = Pl190::new(&vic);
    pl190.init();
    pl190.enable_irq(IrqId::new(12), 0xBABE).unwrap();
    InterruptController::enable(&mut pl190, IrqId::new(4)).unwrap();

    vic.assert_line(12);
    let active = pl190.current_irq().unwrap();
    assert_eq!(active.irq, IrqId::new(12));
    InterruptController::acknowledge(&mut pl190, active);
    vic.lower_line(12);

    vic.assert_line(4);
    let active = pl190.current_irq().unwrap();
    assert_eq!(active.irq, IrqId::new(4));
    InterruptController::acknowledge(&mut pl190, active);
    vic.lower_line(4);

    let active = pl190.current_irq().unwrap();
    assert_eq!(active.irq, IrqId::UNMAPPED);
    InterruptController::acknowledge(&mut pl190, active);
    assert_eq!(vic.completions(), 3);
    assert!(vic.journal().position("vic", AccessKind::Write, 0x30).is_some());
}
