//! # Tick Pipeline
//!
//! The work done on every SysTick interrupt, in a fixed order: sweep
//! stack canaries first (a corrupted stack makes every other piece of
//! state suspect), then hand off to the bound scheduling policy for
//! release detection and deadline-miss detection. No context switch
//! happens here — the tick handler only decides whether one is needed
//! and leaves triggering it to the caller.

use crate::config::{ENABLE_STACK_CANARY, MAX_TASKS};
use crate::scheduler::SchedulingPolicy;
use crate::task::TaskControlBlock;

/// `true` if `now` is at or past `target` on a 32-bit tick counter that
/// wraps at `u32::MAX`, computed via wrapping subtraction rather than a
/// direct `>=` so a wraparound between `target` and `now` doesn't flip
/// the comparison.
#[inline]
pub(crate) fn tick_reached(now: u32, target: u32) -> bool {
    (now.wrapping_sub(target) as i32) >= 0
}

/// Wrap-safe strict "is past", used for deadline-miss detection.
#[inline]
pub(crate) fn tick_past(now: u32, target: u32) -> bool {
    now != target && tick_reached(now, target)
}

/// Runs the canary sweep, halting via `on_overflow` if any occupied
/// task's guard word has been overwritten.
pub fn sweep_canaries(tasks: &[TaskControlBlock; MAX_TASKS], count: usize, on_overflow: impl FnOnce(usize)) {
    if !ENABLE_STACK_CANARY {
        return;
    }
    for (i, tcb) in tasks.iter().enumerate().take(count) {
        if tcb.occupied && !tcb.canary_intact() {
            log::error!("stack canary corrupted: task_id={}", tcb.task_id);
            on_overflow(i);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TASKS;
    use crate::stack;
    use crate::task::{TaskControlBlock, TaskState};

    extern "C" fn demo(_id: usize) {}

    #[test]
    fn a_corrupted_canary_trips_the_overflow_handler_and_only_that_task() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::empty());
        let region_a = stack::allocate(32).unwrap();
        tasks[1].init(1, "a", demo, 1, 10, 10, region_a);
        tasks[1].state = TaskState::Running;
        let region_b = stack::allocate(32).unwrap();
        tasks[2].init(2, "b", demo, 1, 10, 10, region_b);
        tasks[2].state = TaskState::Ready;

        region_a.corrupt();
        assert!(!tasks[1].canary_intact());
        assert!(tasks[2].canary_intact());

        let mut tripped = None;
        sweep_canaries(&tasks, 3, |i| tripped = Some(i));
        assert_eq!(tripped, Some(1));
    }

    #[test]
    fn an_intact_canary_never_trips_the_overflow_handler() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::empty());
        tasks[1].init(1, "a", demo, 1, 10, 10, stack::allocate(32).unwrap());
        let mut tripped = false;
        sweep_canaries(&tasks, 2, |_| tripped = true);
        assert!(!tripped);
    }
}

/// Runs one full tick: canary sweep, then policy dispatch. Returns
/// `true` if the caller should request a context switch.
pub fn run<S: SchedulingPolicy>(
    policy: &mut S,
    tasks: &mut [TaskControlBlock; MAX_TASKS],
    count: usize,
    current: usize,
    tick_now: u32,
    on_overflow: impl FnOnce(usize),
) -> bool {
    sweep_canaries(tasks, count, on_overflow);
    policy.on_tick(tasks, count, current, tick_now)
}
