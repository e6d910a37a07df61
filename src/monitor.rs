//! # Monitoring
//!
//! Read-only system and per-task diagnostics, and a bounded-buffer
//! formatted dump for boards without a heap or a `std::fmt` sink.

use crate::config::MAX_TASKS;
use crate::task::TaskControlBlock;
use core::fmt::{self, Write as _};

/// Aggregate counters for the whole system, separate from any one
/// task's bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct SystemMonitor {
    pub context_switches: u64,
    pub uptime_ticks: u32,
    pub idle_ticks: u32,
    pub task_count: usize,
}

impl SystemMonitor {
    pub const fn new() -> Self {
        SystemMonitor {
            context_switches: 0,
            uptime_ticks: 0,
            idle_ticks: 0,
            task_count: 0,
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-task utilization in integer percent, `exec_ticks_total * 100 /
/// period_ticks`, the same ratio the original monitor's
/// `ulGetTaskUtilization` reports. Accumulates across the task's
/// lifetime, so it can read above 100% for a task that has run several
/// periods since the last `reset_task_accounting`.
pub fn task_utilization_pct(tcb: &TaskControlBlock) -> u32 {
    if tcb.period_ticks == 0 {
        0
    } else {
        tcb.exec_ticks_total.saturating_mul(100) / tcb.period_ticks
    }
}

/// System-wide CPU utilization in integer percent: the sum of every
/// occupied, non-idle task's `task_utilization_pct`, mirroring the
/// original's `ulGetSystemUtilization` (which sums per-task utilization
/// rather than computing a busy/idle ratio).
pub fn system_utilization_pct(tasks: &[TaskControlBlock; MAX_TASKS], count: usize) -> u32 {
    tasks
        .iter()
        .enumerate()
        .take(count)
        .filter(|(i, tcb)| *i != 0 && tcb.occupied)
        .map(|(_, tcb)| task_utilization_pct(tcb))
        .fold(0u32, |acc, pct| acc.saturating_add(pct))
}

/// Writes a one-line human-readable summary of a task into `buf`,
/// truncating rather than overflowing if the buffer is too small.
pub fn format_task_info(tcb: &TaskControlBlock, buf: &mut dyn fmt::Write) -> fmt::Result {
    write!(
        buf,
        "[{:02}] {:<16} state={:?} period={} deadline={} exec={} switches={} completions={} misses={} util={}%",
        tcb.task_id,
        tcb.name(),
        tcb.state,
        tcb.period_ticks,
        tcb.relative_deadline_ticks,
        tcb.exec_ticks_total,
        tcb.context_switches,
        tcb.completions,
        tcb.deadline_misses,
        task_utilization_pct(tcb),
    )
}

/// Writes a one-line system summary into `buf`.
pub fn format_system_info(
    monitor: &SystemMonitor,
    tasks: &[TaskControlBlock; MAX_TASKS],
    started: bool,
    buf: &mut dyn fmt::Write,
) -> fmt::Result {
    write!(
        buf,
        "uptime={} idle={} switches={} tasks={} state={} util={}%",
        monitor.uptime_ticks,
        monitor.idle_ticks,
        monitor.context_switches,
        monitor.task_count,
        started as u8,
        system_utilization_pct(tasks, monitor.task_count),
    )
}

/// A fixed-capacity buffer implementing `core::fmt::Write`, for
/// building diagnostic strings with no heap.
pub struct ReportBuffer<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> ReportBuffer<N> {
    pub const fn new() -> Self {
        ReportBuffer {
            buf: [0; N],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl<const N: usize> Default for ReportBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for ReportBuffer<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = N - self.len;
        let take = s.len().min(remaining);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Resets all per-task accounting fields the monitor reports on,
/// without disturbing scheduling state (state, release/deadline
/// timing). Mirrors the original's `vResetMonitoringData`.
pub fn reset_task_accounting(tasks: &mut [TaskControlBlock; MAX_TASKS], count: usize) {
    for tcb in tasks.iter_mut().take(count) {
        if tcb.occupied {
            tcb.completions = 0;
            tcb.deadline_misses = 0;
            tcb.exec_ticks_in_release = 0;
            tcb.exec_ticks_total = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack;

    extern "C" fn demo(_id: usize) {}

    #[test]
    fn system_utilization_sums_per_task_utilization_excluding_idle() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::empty());
        tasks[0].init(0, "idle", demo, 0, 0, 0, stack::allocate(32).unwrap());
        tasks[0].exec_ticks_total = 1_000_000; // idle's exec time must not count
        tasks[1].init(1, "a", demo, 1, 100, 100, stack::allocate(32).unwrap());
        tasks[1].exec_ticks_total = 30; // 30%
        tasks[2].init(2, "b", demo, 1, 50, 50, stack::allocate(32).unwrap());
        tasks[2].exec_ticks_total = 100; // 200%, can exceed 100 for one task
        assert_eq!(task_utilization_pct(&tasks[1]), 30);
        assert_eq!(task_utilization_pct(&tasks[2]), 200);
        assert_eq!(system_utilization_pct(&tasks, 3), 230);
    }

    #[test]
    fn report_buffer_truncates_rather_than_overflows() {
        let mut buf: ReportBuffer<8> = ReportBuffer::new();
        write!(buf, "0123456789").unwrap();
        assert_eq!(buf.as_str(), "01234567");
    }
}
