//! # Simulated Port
//!
//! A host-side `Port` implementation used by tests. There is no real
//! interrupt controller or context-switch assembly to drive on the
//! test host, so `SimPort` tracks the bookkeeping a real port would
//! (tick count, IRQ nesting depth, switch-pending flag) and lets tests
//! assert on it directly instead of observing register state.

use crate::arch::Port;
use core::cell::Cell;

/// Host-side stand-in for [`super::cortex_m4::CortexM4`]. Not used on
/// target hardware.
pub struct SimPort {
    ticks: Cell<u32>,
    irq_depth: Cell<u32>,
    switch_pending: Cell<bool>,
    cpu_hz: u32,
}

impl SimPort {
    pub fn new(cpu_hz: u32) -> Self {
        SimPort {
            ticks: Cell::new(0),
            irq_depth: Cell::new(0),
            switch_pending: Cell::new(false),
            cpu_hz,
        }
    }

    /// Advances the simulated tick counter. Tests call this in place
    /// of a real SysTick interrupt.
    pub fn advance_tick(&self) {
        self.ticks.set(self.ticks.get().wrapping_add(1));
    }

    /// `true` if `trigger_switch` has been called since the last
    /// `clear_switch_pending`.
    pub fn switch_pending(&self) -> bool {
        self.switch_pending.get()
    }

    pub fn clear_switch_pending(&self) {
        self.switch_pending.set(false);
    }
}

impl Port for SimPort {
    fn tick_init(&mut self, _tick_hz: u32, _cpu_hz: u32) {}

    fn tick_now(&self) -> u32 {
        self.ticks.get()
    }

    fn disable_irqs(&self) -> u32 {
        let depth = self.irq_depth.get();
        self.irq_depth.set(depth + 1);
        depth
    }

    fn enable_irqs(&self, prev: u32) {
        self.irq_depth.set(prev);
    }

    fn trigger_switch(&self) {
        self.switch_pending.set(true);
    }

    fn get_cpu_hz(&self) -> u32 {
        self.cpu_hz
    }

    fn name(&self) -> &'static str {
        "sim"
    }

    fn version(&self) -> &'static str {
        "test-harness"
    }

    fn idle_wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_critical_sections_restore_outer_depth() {
        let port = SimPort::new(16_000_000);
        let outer = port.disable_irqs();
        let inner = port.disable_irqs();
        port.enable_irqs(inner);
        port.enable_irqs(outer);
        assert_eq!(port.irq_depth.get(), 0);
    }

    #[test]
    fn trigger_switch_sets_pending_until_cleared() {
        let port = SimPort::new(16_000_000);
        assert!(!port.switch_pending());
        port.trigger_switch();
        assert!(port.switch_pending());
        port.clear_switch_pending();
        assert!(!port.switch_pending());
    }
}
