//! # periodos — a small preemptive kernel for periodic ARM Cortex-M tasks
//!
//! `periodos` runs a fixed set of periodic tasks under either Earliest
//! Deadline First or Rate-Monotonic scheduling, with deadline-miss
//! reporting and stack-overflow detection via canary words. There is no
//! dynamic task creation after `start_scheduler`, no heap, and no
//! synchronization primitives beyond critical sections — tasks
//! communicate through whatever shared statics the application wires up
//! itself.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Application Tasks                      │
//! ├────────────────────────────────────────────────────────────┤
//! │                  Kernel API (kernel.rs)                     │
//! │   init() · create_periodic() · start_scheduler() · yield_now()
//! ├──────────────┬─────────────────────┬────────────────────────┤
//! │  Scheduler   │   Tick Pipeline     │  Monitor               │
//! │  scheduler.rs│   tick.rs           │  monitor.rs            │
//! │  ─ Edf       │   ─ canary sweep    │  ─ utilization         │
//! │  ─ RateMono. │   ─ release/deadline│  ─ reports             │
//! ├──────────────┴─────────────────────┴────────────────────────┤
//! │           Task Model (task.rs) · Stack Pool (stack.rs)       │
//! │     TCB · TaskState · trampoline · canary-guarded stacks     │
//! ├────────────────────────────────────────────────────────────┤
//! │              Port (arch/mod.rs) — CortexM4 · SimPort         │
//! │        PendSV · SysTick · context switch · stack init        │
//! ├────────────────────────────────────────────────────────────┤
//! │              ARM Cortex-M Hardware (Thumb-2)                 │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - No heap, no `alloc` — pure `core` plus `cortex-m`/`cortex-m-rt`.
//! - A single static stack pool ([`stack`]) bump-allocated at task
//!   creation time, never freed.
//! - A fixed-size task table (`[TaskControlBlock; MAX_TASKS]`).
//!
//! ## Logging
//!
//! The kernel emits diagnostics through the [`log`] facade
//! (`log::{info,warn,error}`). No logger is installed by this crate —
//! without one, every call is a no-op and carries zero runtime cost.
//! An application or its board support package registers a logger if
//! it wants the output.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod error;
pub mod kernel;
pub mod monitor;
pub mod scheduler;
pub mod stack;
pub mod sync;
pub mod task;
pub mod tick;

pub use error::KernelError;
pub use task::{TaskHandle, TaskState};
