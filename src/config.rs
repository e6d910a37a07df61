//! # Kernel Configuration
//!
//! Compile-time constants governing task table sizing, timing, and
//! stack layout. All limits are fixed at compile time — no dynamic
//! allocation.

/// Maximum number of tasks the system can manage simultaneously,
/// including the idle task. This bounds the static TCB array.
/// Increase with care — each real task reserves `stack_words` words
/// (plus one canary guard word) from the shared stack pool.
pub const MAX_TASKS: usize = 12;

/// Number of static priority levels available to the Rate-Monotonic
/// scheduler. Must be `>= MAX_TASKS` since every task needs a distinct
/// slot once priorities are assigned by ascending period.
pub const MAX_PRIORITY_LEVELS: usize = MAX_TASKS;

/// SysTick frequency in Hz. Determines scheduler tick granularity and
/// the unit of `period_ms` / `relative_deadline_ms`.
pub const SYSTICK_FREQ_HZ: u32 = 1000;

/// Default stack allocation, in words, used when a task requests a
/// size outside `[MIN_STACK_SIZE, MAX_STACK_SIZE]`.
pub const DEFAULT_STACK_SIZE: usize = 128;

/// Smallest stack allocation accepted from a caller, in words.
pub const MIN_STACK_SIZE: usize = 32;

/// Largest stack allocation accepted from a caller, in words.
pub const MAX_STACK_SIZE: usize = 512;

/// Words reserved per task for the hardware-stacked exception frame
/// (R0-R3, R12, LR, PC, xPSR) on top of the software-saved callee
/// registers (R4-R11). Part of the port contract: a port that needs
/// more room for its exception frame must grow this.
pub const EXCEPTION_FRAME_WORDS: usize = 8;

/// Words reserved per task for the callee-saved register set
/// (R4-R11) that the `PendSV` handler saves and restores manually.
pub const CALLEE_SAVED_WORDS: usize = 8;

/// Maximum length of a task's display name. Names longer than this
/// are silently truncated, never rejected.
pub const MAX_TASK_NAME_LEN: usize = 16;

/// Whether the tick pipeline verifies stack canaries before doing
/// anything else. Disabling this removes the canary sweep entirely
/// (and with it, the only way this kernel detects stack overflow).
pub const ENABLE_STACK_CANARY: bool = true;

/// Guard value written below each task's stack at creation time.
/// A mismatch observed by the tick handler's canary sweep means the
/// task has overrun its stack; the kernel halts rather than continue
/// running with corrupted memory.
pub const STACK_CANARY: u32 = 0x00FF_0A00;

/// Default CPU clock, in Hz, reported by the Cortex-M4 port when the
/// board hasn't reconfigured its PLL. Matches a typical STM32F4 part
/// running on its internal 16 MHz oscillator.
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;
