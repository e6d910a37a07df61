//! # Kernel Errors
//!
//! A flat, `no_std`-friendly error enum for every fallible kernel
//! operation. Nothing here allocates or carries a backtrace — callers
//! are expected to match on the variant and recover or halt.

use core::fmt;

/// Everything that can go wrong calling into the kernel's public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The task table is already holding `MAX_TASKS` tasks.
    TableFull,
    /// A parameter (period, deadline, stack size, priority) was out of
    /// the accepted range.
    InvalidParameters,
    /// `create_periodic` was called for the idle task a second time.
    DuplicateIdleTask,
    /// The shared stack pool has no room left for the requested size.
    StackPoolExhausted,
    /// `start_scheduler` was called more than once.
    SchedulerAlreadyStarted,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::TableFull => "task table is full",
            KernelError::InvalidParameters => "invalid task parameters",
            KernelError::DuplicateIdleTask => "idle task already created",
            KernelError::StackPoolExhausted => "stack pool exhausted",
            KernelError::SchedulerAlreadyStarted => "scheduler already started",
        };
        f.write_str(msg)
    }
}
