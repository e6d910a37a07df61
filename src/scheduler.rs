//! # Scheduling Policies
//!
//! A pluggable [`SchedulingPolicy`] trait with two implementors: earliest
//! deadline first ([`Edf`], the default) and rate-monotonic
//! ([`RateMonotonic`], the alternate). Both run release detection and
//! deadline-miss detection from `on_tick`, and pick the next task to run
//! from `pick_next`. `Kernel` is generic over the policy, so the choice
//! is a compile-time type parameter with no indirect call on the hot path.

use crate::config::{MAX_PRIORITY_LEVELS, MAX_TASKS};
use crate::task::{TaskControlBlock, TaskState};
use crate::tick::{tick_past, tick_reached};

/// Scheduling decisions a `Kernel` delegates to its bound policy.
pub trait SchedulingPolicy {
    /// Called once, after all tasks are created and before the first
    /// task is launched. Used by policies that need a static ordering
    /// over the final task set (e.g. Rate-Monotonic priority assignment).
    fn init(&mut self, tasks: &mut [TaskControlBlock; MAX_TASKS], count: usize);

    /// Runs release-then-advance and deadline-miss detection for every
    /// occupied task, given the current tick. Returns `true` if a
    /// context switch should be requested.
    fn on_tick(
        &mut self,
        tasks: &mut [TaskControlBlock; MAX_TASKS],
        count: usize,
        current: usize,
        tick_now: u32,
    ) -> bool;

    /// Picks the task that should run next. Must return `0` (the idle
    /// task) if nothing else is runnable.
    fn pick_next(&self, tasks: &[TaskControlBlock; MAX_TASKS], count: usize) -> usize;

    fn name(&self) -> &'static str;
}

/// Runs release detection and deadline-miss detection shared by both
/// policies: RUNNING tasks past their absolute deadline are flagged
/// missed, then any task whose release time has arrived is moved to
/// Ready and re-armed for its next period (release-then-advance: the
/// deadline for the job just released is computed from the *current*
/// release time before it is advanced by one period, which is what
/// keeps this drift-free relative to wall-clock ticks).
fn detect_releases_and_deadlines(
    tasks: &mut [TaskControlBlock; MAX_TASKS],
    count: usize,
    tick_now: u32,
) {
    for tcb in tasks.iter_mut().take(count) {
        if !tcb.occupied || tcb.task_id == 0 {
            continue;
        }

        if tcb.state == TaskState::Running
            && !tcb.fresh
            && tick_past(tick_now, tcb.abs_deadline_ticks)
            && !tcb.current_deadline_missed
        {
            tcb.deadline_misses += 1;
            tcb.current_deadline_missed = true;
            log::warn!(
                "deadline missed: task_id={} tick={} deadline={}",
                tcb.task_id,
                tick_now,
                tcb.abs_deadline_ticks
            );
        }

        if tick_reached(tick_now, tcb.release_time_ticks) {
            tcb.abs_deadline_ticks = tcb
                .release_time_ticks
                .wrapping_add(tcb.relative_deadline_ticks);
            tcb.release_time_ticks = tcb.release_time_ticks.wrapping_add(tcb.period_ticks);
            tcb.exec_ticks_in_release = 0;
            tcb.fresh = false;
            tcb.current_deadline_missed = false;
            if tcb.state != TaskState::Suspended {
                tcb.state = TaskState::Ready;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Earliest Deadline First
// ---------------------------------------------------------------------------

/// Dynamic-priority policy: always runs the ready task with the
/// earliest absolute deadline. The kernel's default policy.
#[derive(Default)]
pub struct Edf;

impl Edf {
    pub const fn new() -> Self {
        Edf
    }
}

impl SchedulingPolicy for Edf {
    fn init(&mut self, _tasks: &mut [TaskControlBlock; MAX_TASKS], _count: usize) {}

    fn on_tick(
        &mut self,
        tasks: &mut [TaskControlBlock; MAX_TASKS],
        count: usize,
        current: usize,
        tick_now: u32,
    ) -> bool {
        detect_releases_and_deadlines(tasks, count, tick_now);
        let candidate = pick_preferred(tasks, count);
        candidate != current
            && (current == 0 || tasks[candidate].abs_deadline_ticks < tasks[current].abs_deadline_ticks)
    }

    fn pick_next(&self, tasks: &[TaskControlBlock; MAX_TASKS], count: usize) -> usize {
        pick_preferred(tasks, count)
    }

    fn name(&self) -> &'static str {
        "edf"
    }
}

fn pick_preferred(tasks: &[TaskControlBlock; MAX_TASKS], count: usize) -> usize {
    let mut best = 0usize;
    let mut best_deadline = u32::MAX;
    for (i, tcb) in tasks.iter().enumerate().take(count) {
        if i == 0 || !tcb.is_runnable() {
            continue;
        }
        if tcb.abs_deadline_ticks < best_deadline {
            best_deadline = tcb.abs_deadline_ticks;
            best = i;
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Rate Monotonic
// ---------------------------------------------------------------------------

/// Static-priority policy: shorter period means higher priority,
/// assigned once at `init` time.
pub struct RateMonotonic {
    /// Task indices ordered by ascending period, recomputed at `init`.
    order: [usize; MAX_TASKS],
    ordered_count: usize,
}

impl RateMonotonic {
    pub const fn new() -> Self {
        RateMonotonic {
            order: [0; MAX_TASKS],
            ordered_count: 0,
        }
    }
}

impl Default for RateMonotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingPolicy for RateMonotonic {
    fn init(&mut self, tasks: &mut [TaskControlBlock; MAX_TASKS], count: usize) {
        let mut order: [usize; MAX_TASKS] = [0; MAX_TASKS];
        let mut n = 0;
        for (i, tcb) in tasks.iter().enumerate().take(count) {
            if tcb.occupied && i != 0 {
                order[n] = i;
                n += 1;
            }
        }
        // Bubble sort by ascending period, matching the original's
        // priority-assignment pass over the task list.
        for a in 0..n {
            for b in 0..n - 1 - a.min(n.saturating_sub(1)) {
                if tasks[order[b]].period_ticks > tasks[order[b + 1]].period_ticks {
                    order.swap(b, b + 1);
                }
            }
        }
        for (rank, &idx) in order.iter().enumerate().take(n) {
            // Highest priority (lowest numeric value) to the shortest period.
            let level = (n - rank).min(MAX_PRIORITY_LEVELS);
            tasks[idx].priority = level as u8;
        }
        self.order = order;
        self.ordered_count = n;
    }

    fn on_tick(
        &mut self,
        tasks: &mut [TaskControlBlock; MAX_TASKS],
        count: usize,
        current: usize,
        tick_now: u32,
    ) -> bool {
        detect_releases_and_deadlines(tasks, count, tick_now);
        let candidate = pick_by_priority(tasks, &self.order, self.ordered_count);
        candidate != current && (current == 0 || tasks[candidate].priority < tasks[current].priority)
    }

    fn pick_next(&self, tasks: &[TaskControlBlock; MAX_TASKS], _count: usize) -> usize {
        pick_by_priority(tasks, &self.order, self.ordered_count)
    }

    fn name(&self) -> &'static str {
        "rate-monotonic"
    }
}

fn pick_by_priority(
    tasks: &[TaskControlBlock; MAX_TASKS],
    order: &[usize; MAX_TASKS],
    ordered_count: usize,
) -> usize {
    for &idx in order.iter().take(ordered_count) {
        if tasks[idx].is_runnable() {
            return idx;
        }
    }
    0
}
