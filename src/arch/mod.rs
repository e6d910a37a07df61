//! # Architecture Abstraction Layer
//!
//! Defines the [`Port`] contract the kernel schedules against, and
//! provides one production implementation ([`cortex_m4::CortexM4`]) and
//! one host-side implementation ([`sim::SimPort`]) used by tests.
//!
//! `Port` is a plain trait rather than a vtable-based interface: the
//! kernel is generic over `P: Port` and every call monomorphizes, so
//! there is no indirect call on the tick/switch hot path.

pub mod cortex_m4;
pub mod sim;

/// Hardware (or simulated hardware) services the kernel needs to run
/// tasks. A port owns the tick timer and the context-switch mechanism;
/// everything else (task table, scheduling policy, monitoring) is
/// architecture-independent and lives above this trait.
pub trait Port {
    /// Configure and start the periodic tick source. Called once from
    /// `start_scheduler`, before the first task is launched.
    fn tick_init(&mut self, tick_hz: u32, cpu_hz: u32);

    /// Monotonic tick counter maintained by the port's timer. Used for
    /// diagnostics only — the kernel keeps its own tick count driven by
    /// the tick interrupt, not by polling this. Wraps at `u32::MAX`.
    fn tick_now(&self) -> u32;

    /// Disable interrupts for a critical section. Returns an opaque
    /// token that `enable_irqs` consumes to restore the prior state,
    /// so nested critical sections compose correctly.
    fn disable_irqs(&self) -> u32;

    /// Restore the interrupt state captured by `disable_irqs`.
    fn enable_irqs(&self, prev: u32);

    /// Request a context switch. Must be idempotent — calling it twice
    /// before the switch actually runs has the same effect as once.
    fn trigger_switch(&self);

    /// Nominal CPU clock in Hz, for diagnostics.
    fn get_cpu_hz(&self) -> u32;

    /// Short identifying name, e.g. `"cortex-m4"`.
    fn name(&self) -> &'static str;

    /// Port implementation version string.
    fn version(&self) -> &'static str;

    /// Low-power wait for the idle task. A no-op spin is an acceptable
    /// implementation; `wfi` on real hardware.
    fn idle_wait(&self);
}
