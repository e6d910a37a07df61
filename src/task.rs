//! # Task Control Block
//!
//! Defines the task model: identity, the trampoline that bridges the
//! hardware calling convention to a user task function, and the
//! bookkeeping the scheduler and monitor read every tick.
//!
//! ## Task Lifecycle
//!
//! ```text
//!   ┌─────────┐   release    ┌───────┐   pick_next   ┌─────────┐
//!   │ Blocked │ ───────────► │ Ready │ ────────────► │ Running │
//!   └─────────┘              └───────┘                └────────┘
//!        ▲                       ▲                        │
//!        │                       └── preempt / yield ─────┘
//!        │        job returns, re-armed for next period
//!        └─────────────────────────────────────────────────
//! ```
//!
//! A periodic task's entry function is expected to run its job to
//! completion and return; the trampoline treats that return as "job
//! done for this period" and blocks the task until its next release.

use crate::config::{CALLEE_SAVED_WORDS, EXCEPTION_FRAME_WORDS, MAX_TASK_NAME_LEN};
use crate::stack::StackRegion;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Released and waiting to be picked by the scheduling policy.
    Ready,
    /// Currently executing on the CPU.
    Running,
    /// Waiting for its next periodic release.
    Blocked,
    /// Suspended by the kernel; not considered by `pick_next` until resumed.
    Suspended,
    /// Reserved for a future task-deletion feature. No operation in this
    /// kernel ever produces this state.
    Deleted,
}

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// Opaque handle to a created task. Holds the task's identifying ID
/// (never the table index, which can be reused across... it isn't,
/// tasks are never deleted, but the distinction matters for validation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(pub(crate) usize);

impl TaskHandle {
    /// Handle to the kernel's built-in idle task.
    pub const IDLE: TaskHandle = TaskHandle(0);

    pub fn id(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy)]
struct NameBuf {
    bytes: [u8; MAX_TASK_NAME_LEN],
    len: u8,
}

impl NameBuf {
    const fn empty() -> Self {
        NameBuf {
            bytes: [0; MAX_TASK_NAME_LEN],
            len: 0,
        }
    }

    fn from_str(s: &str) -> Self {
        let mut buf = Self::empty();
        let n = s.len().min(MAX_TASK_NAME_LEN);
        buf.bytes[..n].copy_from_slice(&s.as_bytes()[..n]);
        buf.len = n as u8;
        buf
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Task Control Block — the central per-task record the scheduler,
/// tick pipeline and monitor all operate on.
pub struct TaskControlBlock {
    /// Identity. `0` is reserved for the idle task; every created task
    /// gets a nonzero ID equal to its table index.
    pub task_id: usize,
    /// Whether this table slot holds a live task. The actual free-slot
    /// predicate — kept distinct from `task_id` so the idle task (whose
    /// id is always `0`) can't be mistaken for a free slot.
    pub(crate) occupied: bool,
    name: NameBuf,

    /// User entry point, called by the trampoline with this task's ID.
    entry: extern "C" fn(usize),

    pub state: TaskState,
    /// Static priority, used by the Rate-Monotonic policy (lower value
    /// is assigned to shorter periods at scheduler init). Unused by EDF.
    pub priority: u8,

    pub period_ticks: u32,
    pub relative_deadline_ticks: u32,
    /// Tick at which this task's next job is released. Wraps at
    /// `u32::MAX`; compared against the current tick with wrap-safe
    /// arithmetic (`crate::tick::tick_reached`), never a plain `>=`.
    pub release_time_ticks: u32,
    /// Absolute deadline of the job currently in progress (or the most
    /// recently released one). Same wraparound rules as above.
    pub abs_deadline_ticks: u32,

    /// `true` until the task's first release; suppresses deadline
    /// checks for a job that has never actually run.
    pub fresh: bool,
    /// Set when the current job is detected to have missed its
    /// deadline; cleared on the next release (Design Notes, open
    /// question 2).
    pub current_deadline_missed: bool,

    pub completions: u32,
    pub deadline_misses: u32,
    /// Execution ticks accumulated during the current release.
    pub exec_ticks_in_release: u32,
    /// Execution ticks accumulated over the task's lifetime, for the
    /// monitor's utilization calculation.
    pub exec_ticks_total: u32,
    /// Number of times this task has been switched onto the CPU.
    pub context_switches: u32,
    /// Tick at which this task was last switched onto the CPU.
    pub last_start_tick: u32,

    /// Saved stack pointer (PSP), updated on every context switch.
    pub stack_pointer: *mut u32,
    stack: StackRegion,
}

// Safety: the only raw pointer here (`stack_pointer`) always points into
// this task's own region of the static stack pool, and all mutable
// access to a TCB happens inside a critical section or from the ISR
// that owns the current task.
unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// An unallocated slot, usable as the repeat element when filling
    /// the static task table (`[TaskControlBlock::EMPTY; MAX_TASKS]`).
    pub const EMPTY: TaskControlBlock = TaskControlBlock::empty();

    /// An unallocated slot, used to fill the static task table.
    pub const fn empty() -> Self {
        TaskControlBlock {
            task_id: 0,
            occupied: false,
            name: NameBuf::empty(),
            entry: noop_entry,
            state: TaskState::Suspended,
            priority: 0,
            period_ticks: 0,
            relative_deadline_ticks: 0,
            release_time_ticks: 0,
            abs_deadline_ticks: 0,
            fresh: true,
            current_deadline_missed: false,
            completions: 0,
            deadline_misses: 0,
            exec_ticks_in_release: 0,
            exec_ticks_total: 0,
            context_switches: 0,
            last_start_tick: 0,
            stack_pointer: core::ptr::null_mut(),
            stack: crate::stack::StackRegion::dangling(),
        }
    }

    /// Populates a freshly allocated slot and builds its initial stack
    /// frame so the first context switch lands in the trampoline.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn init(
        &mut self,
        task_id: usize,
        name: &str,
        entry: extern "C" fn(usize),
        priority: u8,
        period_ticks: u32,
        relative_deadline_ticks: u32,
        stack: StackRegion,
    ) {
        self.task_id = task_id;
        self.occupied = true;
        self.name = NameBuf::from_str(name);
        self.entry = entry;
        self.state = TaskState::Ready;
        self.priority = priority;
        self.period_ticks = period_ticks;
        self.relative_deadline_ticks = relative_deadline_ticks;
        self.release_time_ticks = 0;
        self.abs_deadline_ticks = relative_deadline_ticks;
        self.fresh = true;
        self.current_deadline_missed = false;
        self.completions = 0;
        self.deadline_misses = 0;
        self.exec_ticks_in_release = 0;
        self.exec_ticks_total = 0;
        self.context_switches = 0;
        self.last_start_tick = 0;
        self.stack = stack;
        self.stack_pointer = build_initial_stack(stack, task_id, trampoline);
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub(crate) fn entry_fn(&self) -> extern "C" fn(usize) {
        self.entry
    }

    pub fn handle(&self) -> TaskHandle {
        TaskHandle(self.task_id)
    }

    /// Runnable means ready for `pick_next` to consider it: occupied,
    /// not suspended, not blocked.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.occupied && matches!(self.state, TaskState::Ready | TaskState::Running)
    }

    #[inline]
    pub fn canary_intact(&self) -> bool {
        !self.occupied || self.stack.canary_intact()
    }

    /// Utilization in integer percent, `exec_ticks_total * 100 /
    /// period_ticks` scaled by how many periods have elapsed — callers
    /// typically want the per-period figure from the monitor instead.
    pub fn last_period_utilization_pct(&self) -> u32 {
        if self.period_ticks == 0 {
            0
        } else {
            self.exec_ticks_in_release.saturating_mul(100) / self.period_ticks
        }
    }
}

extern "C" fn noop_entry(_task_id: usize) {}

// ---------------------------------------------------------------------------
// Trampoline
// ---------------------------------------------------------------------------

/// Entry point placed in every task's initial stack frame. Runs the
/// user function to completion, records one job completion, then
/// blocks the calling task until its next scheduled release and
/// requests a switch — never returns.
extern "C" fn trampoline(task_id: usize) -> ! {
    loop {
        crate::kernel::run_job(task_id);
    }
}

/// Builds the initial exception frame for a task about to run for the
/// first time, following the Cortex-M4 hardware-stacked-frame layout:
/// eight software-saved registers (R4-R11, all zero) below eight
/// hardware-stacked registers (R0-R3, R12, LR, PC, xPSR). `task_id` is
/// passed in R0 so the trampoline receives it as its first argument.
fn build_initial_stack(
    stack: StackRegion,
    task_id: usize,
    entry: extern "C" fn(usize) -> !,
) -> *mut u32 {
    let total_words = CALLEE_SAVED_WORDS + EXCEPTION_FRAME_WORDS;
    let top = stack.top() as usize;
    let aligned_top = top & !0x7;
    let frame = (aligned_top - total_words * 4) as *mut u32;

    unsafe {
        for i in 0..CALLEE_SAVED_WORDS {
            core::ptr::write(frame.add(i), 0); // R4-R11
        }
        let hw = CALLEE_SAVED_WORDS;
        core::ptr::write(frame.add(hw), task_id as u32); // R0: task_id argument
        core::ptr::write(frame.add(hw + 1), 0); // R1
        core::ptr::write(frame.add(hw + 2), 0); // R2
        core::ptr::write(frame.add(hw + 3), 0); // R3
        core::ptr::write(frame.add(hw + 4), 0); // R12
        core::ptr::write(frame.add(hw + 5), entry as u32); // LR, unused: trampoline never returns
        core::ptr::write(frame.add(hw + 6), entry as u32); // PC
        core::ptr::write(frame.add(hw + 7), 0x0100_0000); // xPSR, Thumb bit set
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack;

    extern "C" fn demo_task(_id: usize) {}

    #[test]
    fn init_marks_slot_occupied_and_ready() {
        let mut tcb = TaskControlBlock::empty();
        assert!(!tcb.occupied);
        let region = stack::allocate(64).unwrap();
        tcb.init(1, "demo", demo_task, 5, 100, 100, region);
        assert!(tcb.occupied);
        assert_eq!(tcb.state, TaskState::Ready);
        assert_eq!(tcb.name(), "demo");
        assert!(tcb.is_runnable());
    }

    #[test]
    fn long_names_are_truncated_not_rejected() {
        let mut tcb = TaskControlBlock::empty();
        let region = stack::allocate(64).unwrap();
        let long_name = "this-name-is-definitely-longer-than-sixteen-bytes";
        tcb.init(2, long_name, demo_task, 1, 10, 10, region);
        assert_eq!(tcb.name().len(), MAX_TASK_NAME_LEN);
    }

    #[test]
    fn unoccupied_slot_reports_canary_intact() {
        let tcb = TaskControlBlock::empty();
        assert!(tcb.canary_intact());
    }
}
