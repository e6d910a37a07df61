//! # Critical Sections
//!
//! Interrupt-masking critical sections, generalized over the bound
//! [`Port`](crate::arch::Port) instead of hard-coding
//! `cortex_m::interrupt::free` — the simulated port used by tests has
//! no real interrupt controller to mask, only a nesting counter.

use crate::arch::Port;

/// Runs `f` with interrupts disabled on `port`, restoring the prior
/// interrupt state afterward regardless of nesting depth.
#[inline]
pub fn critical_section<P: Port, F, R>(port: &P, f: F) -> R
where
    F: FnOnce() -> R,
{
    let prev = port.disable_irqs();
    let result = f();
    port.enable_irqs(prev);
    result
}
