//! End-to-end scenarios exercising the kernel's scheduling decisions
//! and bookkeeping against the simulated port. Real context-switch
//! assembly can't run on the test host, so these tests drive the same
//! decision points (`on_tick`, `on_schedule`, `run_job`) the ISRs call
//! on target hardware.

use periodos::arch::sim::SimPort;
use periodos::kernel::Kernel;
use periodos::scheduler::{Edf, RateMonotonic};
use periodos::task::TaskState;

extern "C" fn noop(_task_id: usize) {}

fn new_kernel() -> Kernel<SimPort, Edf> {
    let mut k = Kernel::new(SimPort::new(16_000_000), Edf::new());
    k.init().unwrap();
    k
}

fn advance(k: &mut Kernel<SimPort, Edf>, ticks: u32) {
    for _ in 0..ticks {
        if k.on_tick() {
            k.on_schedule();
        }
    }
}

#[test]
fn edf_dispatches_the_nearer_deadline_first() {
    let mut k = new_kernel();
    let short = k.create_periodic("short", noop, 1, 10, 10, 64).unwrap();
    let long = k.create_periodic("long", noop, 1, 40, 40, 64).unwrap();

    advance(&mut k, 10);

    assert_eq!(k.task_state(short), Some(TaskState::Running));
    assert_eq!(k.task_state(long), Some(TaskState::Ready));
}

#[test]
fn a_task_that_never_releases_does_not_starve_the_idle_task() {
    let mut k = new_kernel();
    advance(&mut k, 5);
    // No tasks created beyond idle: idle should still be current.
    assert_eq!(k.tick_count(), 5);
}

#[test]
fn running_job_past_its_deadline_is_recorded_as_missed() {
    let mut k = new_kernel();
    let h = k.create_periodic("late", noop, 1, 100, 5, 64).unwrap();
    advance(&mut k, 1); // release at tick 0 is detected on the first tick
    // Nothing ever calls run_job to retire it, so it stays Running
    // well past its 5-tick relative deadline.
    advance(&mut k, 10);
    assert!(k.deadline_misses(h) >= 1);
    assert!(k.current_deadline_missed(h));
}

#[test]
fn suspend_and_resume_round_trip_preserves_schedulability() {
    let mut k = new_kernel();
    let h = k.create_periodic("a", noop, 1, 20, 20, 64).unwrap();
    advance(&mut k, 1);
    assert!(k.suspend(h));
    assert_eq!(k.task_state(h), Some(TaskState::Suspended));
    assert!(k.resume(h));
    assert_ne!(k.task_state(h), Some(TaskState::Suspended));
}

#[test]
fn invalid_and_idle_handles_are_rejected_by_every_accessor() {
    use periodos::task::TaskHandle;
    let mut k = new_kernel();
    let bogus = TaskHandle::IDLE;
    assert!(!k.suspend(bogus));
    assert!(!k.resume(bogus));
    assert_eq!(k.task_state(bogus), Some(TaskState::Ready));
}

#[test]
fn rate_monotonic_prefers_the_shortest_period_task() {
    let mut k = Kernel::new(SimPort::new(16_000_000), RateMonotonic::new());
    k.init().unwrap();
    let fast = k.create_periodic("fast", noop, 0, 10, 10, 64).unwrap();
    let slow = k.create_periodic("slow", noop, 0, 50, 50, 64).unwrap();

    // arm() runs RateMonotonic::init(), assigning fast > slow priority,
    // and picks the first task to run before any ticks are driven.
    assert!(k.arm().is_ok());

    for _ in 0..2 {
        if k.on_tick() {
            k.on_schedule();
        }
    }

    assert_eq!(k.task_state(fast), Some(TaskState::Running));
    assert_eq!(k.task_state(slow), Some(TaskState::Ready));
}

#[test]
fn system_report_includes_task_counters() {
    let mut k = new_kernel();
    let mut buf = periodos::monitor::ReportBuffer::<128>::new();
    k.create_periodic("a", noop, 1, 20, 20, 64).unwrap();
    advance(&mut k, 3);
    use core::fmt::Write as _;
    k.system_report(&mut buf).unwrap();
    assert!(buf.as_str().contains("uptime=3"));
}

#[test]
fn system_report_surfaces_scheduler_state() {
    let mut k = new_kernel();
    let mut buf = periodos::monitor::ReportBuffer::<128>::new();
    use core::fmt::Write as _;
    k.system_report(&mut buf).unwrap();
    assert!(buf.as_str().contains("state=0"));

    assert!(k.arm().is_ok());
    let mut buf2 = periodos::monitor::ReportBuffer::<128>::new();
    k.system_report(&mut buf2).unwrap();
    assert!(buf2.as_str().contains("state=1"));
}

#[test]
fn task_report_includes_exec_time_switches_and_utilization() {
    let mut k = new_kernel();
    let h = k.create_periodic("worker", noop, 1, 10, 10, 64).unwrap();
    assert!(k.arm().is_ok());
    advance(&mut k, 5);

    let mut buf = periodos::monitor::ReportBuffer::<160>::new();
    use core::fmt::Write as _;
    k.task_report(h, &mut buf).unwrap();
    let report = buf.as_str();
    assert!(report.contains("exec="));
    assert!(report.contains("switches="));
    assert!(report.contains("util="));
}

#[test]
fn yield_with_same_task_remaining_best_ready_is_a_no_op() {
    let mut k = new_kernel();
    k.create_periodic("solo", noop, 1, 10, 10, 64).unwrap();
    assert!(k.arm().is_ok());
    let switches_before = k.context_switch_count();
    for _ in 0..3 {
        k.yield_now();
    }
    // Nothing else is runnable, so every yield is a no-op: no switch
    // requested, context_switches unaffected by the yield calls.
    assert_eq!(k.context_switch_count(), switches_before);
}

