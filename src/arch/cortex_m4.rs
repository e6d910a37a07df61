//! # Cortex-M4 Port
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//! Implements context switching via PendSV, SysTick timer configuration,
//! and interrupt management.
//!
//! ## Context Switch Mechanism
//!
//! The Cortex-M4 uses a split-stack model:
//! - **MSP** (Main Stack Pointer): used by the kernel and exception handlers
//! - **PSP** (Process Stack Pointer): used by tasks in Thread mode
//!
//! On exception entry, the hardware automatically stacks R0-R3, R12, LR,
//! PC and xPSR onto the process stack. The PendSV handler manually saves
//! and restores R4-R11, which completes the full context save/restore.
//!
//! ## Interrupt Priorities
//!
//! SysTick and PendSV are both set to the lowest priority (0xFF), so
//! PendSV never preempts an application ISR and SysTick never interferes
//! with higher-priority interrupts.

use crate::arch::Port;
use core::arch::asm;
use core::sync::atomic::{AtomicU32, Ordering};
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::register::primask;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// The production `Port` implementation for ARM Cortex-M4 targets.
pub struct CortexM4;

impl CortexM4 {
    pub const fn new() -> Self {
        CortexM4
    }
}

impl Default for CortexM4 {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for CortexM4 {
    fn tick_init(&mut self, tick_hz: u32, cpu_hz: u32) {
        let mut syst = unsafe { cortex_m::peripheral::SYST::new() };
        let reload = cpu_hz / tick_hz - 1;
        syst.set_reload(reload);
        syst.clear_current();
        syst.set_clock_source(SystClkSource::Core);
        syst.enable_counter();
        syst.enable_interrupt();
        set_interrupt_priorities();
    }

    fn tick_now(&self) -> u32 {
        TICKS.load(Ordering::Relaxed)
    }

    /// Returns `1` if interrupts were active before this call (so
    /// `enable_irqs` should restore them), `0` if they were already
    /// masked — the same primask-bit encoding the hand-rolled `asm!`
    /// version used, now read through `cortex_m::register::primask`.
    fn disable_irqs(&self) -> u32 {
        let was_active = primask::read().is_active();
        cortex_m::interrupt::disable();
        was_active as u32
    }

    fn enable_irqs(&self, prev: u32) {
        if prev != 0 {
            unsafe { cortex_m::interrupt::enable() };
        }
    }

    fn trigger_switch(&self) {
        const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
        unsafe {
            core::ptr::write_volatile(ICSR, 1 << 28);
        }
    }

    fn get_cpu_hz(&self) -> u32 {
        crate::config::SYSTEM_CLOCK_HZ
    }

    fn name(&self) -> &'static str {
        "cortex-m4"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn idle_wait(&self) {
        cortex_m::asm::wfi();
    }
}

/// Sets PendSV and SysTick to the lowest interrupt priority so context
/// switches never preempt an application-level ISR.
fn set_interrupt_priorities() {
    unsafe {
        let shpr3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(shpr3);
        let val = val | (0xFF << 16) | (0xFF << 24);
        core::ptr::write_volatile(shpr3, val);
    }
}

/// Start the first task by switching to PSP and branching to Thread
/// mode. Called once from `start_scheduler` and never returns.
///
/// # Safety
/// Must be called exactly once, with a valid stack pointer produced by
/// [`crate::task::build_initial_stack`].
pub unsafe fn start_first_task(psp: *const u32) -> ! {
    asm!(
        "adds r0, #32",
        "msr psp, r0",
        "movs r0, #2",
        "msr control, r0",
        "isb",
        "pop {{r0-r3, r12}}",
        "pop {{r4}}",
        "pop {{r5}}",
        "pop {{r6}}",
        "cpsie i",
        "bx r5",
        in("r0") psp,
        options(noreturn)
    );
}

/// PendSV exception handler — performs the actual context switch.
///
/// 1. Save R4-R11 onto the current task's stack (PSP)
/// 2. Store the updated PSP into the current task's TCB
/// 3. Ask the scheduler for the next task
/// 4. Load the next task's PSP and restore R4-R11
/// 5. Return from exception
///
/// # Safety
/// Naked, called directly by the NVIC. Must follow the exact Cortex-M4
/// exception entry/exit convention.
#[no_mangle]
#[naked]
pub unsafe extern "C" fn PendSV() {
    asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {save_context}",
        "bl {do_schedule}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "ldr r0, =0xFFFFFFFD",
        "bx r0",
        save_context = sym save_current_context,
        do_schedule = sym do_context_switch,
        options(noreturn)
    );
}

/// Saves the outgoing task's stack pointer. Called from PendSV with
/// interrupts already effectively disabled by exception entry.
#[no_mangle]
unsafe extern "C" fn save_current_context(psp: *mut u32) {
    crate::kernel::on_context_saved(psp);
}

/// Runs the scheduling decision and returns the new task's PSP.
#[no_mangle]
unsafe extern "C" fn do_context_switch() -> *mut u32 {
    crate::kernel::on_schedule()
}

/// SysTick exception handler — the scheduler tick entry point.
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    crate::kernel::on_tick_irq();
}
