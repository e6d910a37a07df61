//! # Kernel
//!
//! The generic kernel core, and the concrete global instance that the
//! target build's ISRs and public API bind to. `Kernel<P, S>` is usable
//! standalone (as the tests in this module and in `tests/` do, bound to
//! [`crate::arch::sim::SimPort`]) or through the free functions below,
//! which operate on the single global instance bound to
//! [`crate::arch::cortex_m4::CortexM4`] and [`crate::scheduler::Edf`].
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()              configure the port, create idle task
//!         ├─► kernel::create_periodic()    register tasks (×N)
//!         └─► kernel::start_scheduler()    launch — does not return
//! ```

use crate::arch::cortex_m4::CortexM4;
use crate::arch::Port;
use crate::config::{
    DEFAULT_STACK_SIZE, MAX_STACK_SIZE, MAX_TASKS, MIN_STACK_SIZE, SYSTICK_FREQ_HZ,
};
use crate::error::KernelError;
use crate::monitor::SystemMonitor;
use crate::scheduler::{Edf, SchedulingPolicy};
use crate::stack;
use crate::sync;
use crate::task::{TaskControlBlock, TaskHandle, TaskState};
use crate::tick;
use core::fmt;

extern "C" fn idle_entry(_task_id: usize) {
    // The idle task's body never actually runs through this pointer —
    // `run_job` special-cases index 0 to call `Port::idle_wait` in a
    // loop instead, since idle never "completes" a job.
}

/// Generic kernel: a task table, the scheduling policy bound to it,
/// and the port driving its tick source and context switches.
pub struct Kernel<P: Port, S: SchedulingPolicy> {
    port: P,
    policy: S,
    tasks: [TaskControlBlock; MAX_TASKS],
    task_count: usize,
    current: usize,
    tick_count: u32,
    monitor: SystemMonitor,
    started: bool,
    needs_reschedule: bool,
}

impl<P: Port, S: SchedulingPolicy> Kernel<P, S> {
    pub const fn new(port: P, policy: S) -> Self {
        Kernel {
            port,
            policy,
            tasks: [TaskControlBlock::EMPTY; MAX_TASKS],
            task_count: 0,
            current: 0,
            tick_count: 0,
            monitor: SystemMonitor::new(),
            started: false,
            needs_reschedule: false,
        }
    }

    /// Creates the idle task at slot 0. Must be called once, before any
    /// call to `create_periodic`.
    pub fn init(&mut self) -> Result<(), KernelError> {
        if self.tasks[0].occupied {
            return Err(KernelError::DuplicateIdleTask);
        }
        let region = stack::allocate(MIN_STACK_SIZE)?;
        self.tasks[0].init(0, "idle", idle_entry, u8::MAX, 0, 0, region);
        self.tasks[0].state = TaskState::Ready;
        self.task_count = 1;
        self.monitor.task_count = self.task_count;
        log::info!("kernel initialized, port={}", self.port.name());
        Ok(())
    }

    /// Registers a new periodic task. `stack_words` outside
    /// `[MIN_STACK_SIZE, MAX_STACK_SIZE]` falls back to
    /// `DEFAULT_STACK_SIZE` rather than being rejected.
    pub fn create_periodic(
        &mut self,
        name: &str,
        entry: extern "C" fn(usize),
        priority: u8,
        period_ticks: u32,
        relative_deadline_ticks: u32,
        stack_words: usize,
    ) -> Result<TaskHandle, KernelError> {
        if period_ticks == 0 || relative_deadline_ticks == 0 {
            return Err(KernelError::InvalidParameters);
        }

        let slot = self.find_free_slot().ok_or(KernelError::TableFull)?;
        let words = if (MIN_STACK_SIZE..=MAX_STACK_SIZE).contains(&stack_words) {
            stack_words
        } else {
            DEFAULT_STACK_SIZE
        };
        let region = stack::allocate(words)?;

        self.tasks[slot].init(
            slot,
            name,
            entry,
            priority,
            period_ticks,
            relative_deadline_ticks,
            region,
        );
        self.task_count = self.task_count.max(slot + 1);
        self.monitor.task_count = self.task_count;
        log::info!(
            "task created: id={} name={} period={} deadline={}",
            slot,
            name,
            period_ticks,
            relative_deadline_ticks
        );
        Ok(TaskHandle(slot))
    }

    fn find_free_slot(&self) -> Option<usize> {
        (1..MAX_TASKS).find(|&i| !self.tasks[i].occupied)
    }

    /// Runs the policy's one-time setup, configures the tick source,
    /// and picks the first task to run, without ever launching it.
    /// Split out from `start_scheduler` so tests can drive the
    /// scheduler's decisions without the diverging hardware launch.
    pub fn arm(&mut self) -> Result<(), KernelError> {
        if self.started {
            return Err(KernelError::SchedulerAlreadyStarted);
        }
        if !self.tasks[0].occupied {
            return Err(KernelError::InvalidParameters);
        }
        self.started = true;
        log::info!(
            "starting scheduler: policy={} tasks={}",
            self.policy.name(),
            self.task_count
        );
        self.policy.init(&mut self.tasks, self.task_count);
        self.port.tick_init(SYSTICK_FREQ_HZ, self.port.get_cpu_hz());

        self.current = self.policy.pick_next(&self.tasks, self.task_count);
        self.tasks[self.current].state = TaskState::Running;
        Ok(())
    }

    /// Configures the tick source, runs the policy's one-time setup,
    /// and launches the first task — never returns, on success. Called
    /// a second time (or before an idle task exists), this is a no-op:
    /// control returns to the caller rather than halting.
    pub fn start_scheduler(&mut self) {
        if self.arm().is_err() {
            return;
        }
        self.launch_first_task();
    }

    #[cfg(target_arch = "arm")]
    fn launch_first_task(&self) -> ! {
        let sp = self.tasks[self.current].stack_pointer as *const u32;
        unsafe { crate::arch::cortex_m4::start_first_task(sp) }
    }

    #[cfg(not(target_arch = "arm"))]
    fn launch_first_task(&self) -> ! {
        self.halt();
    }

    fn halt(&self) -> ! {
        loop {
            self.port.idle_wait();
        }
    }

    /// Voluntary yield. A no-op if the current task is still the
    /// policy's preferred candidate (checked before any state is
    /// mutated); otherwise blocks the current task until its next
    /// release and requests a switch.
    pub fn yield_now(&mut self) {
        sync::critical_section(&self.port, || {
            let current = self.current;
            let candidate = self.policy.pick_next(&self.tasks, self.task_count);
            if candidate == current {
                return;
            }
            self.tasks[current].state = TaskState::Blocked;
            self.needs_reschedule = true;
        });
        if self.needs_reschedule {
            self.port.trigger_switch();
        }
    }

    /// Blocks the current task until `tick_count + ticks`.
    pub fn delay(&mut self, ticks: u32) {
        sync::critical_section(&self.port, || {
            let current = self.current;
            if current == 0 {
                return;
            }
            self.tasks[current].release_time_ticks = self.tick_count.wrapping_add(ticks);
            self.tasks[current].state = TaskState::Blocked;
            self.needs_reschedule = true;
        });
        self.port.trigger_switch();
    }

    /// Blocks the current task until `*prev_wake_tick + increment`, then
    /// advances `*prev_wake_tick` by `increment` — the drift-free
    /// periodic-delay pattern, unlike `delay` which is relative to
    /// whenever it happens to be called.
    pub fn delay_until(&mut self, prev_wake_tick: &mut u32, increment: u32) {
        let next = prev_wake_tick.wrapping_add(increment);
        *prev_wake_tick = next;
        sync::critical_section(&self.port, || {
            let current = self.current;
            if current == 0 {
                return;
            }
            self.tasks[current].release_time_ticks = next;
            self.tasks[current].state = TaskState::Blocked;
            self.needs_reschedule = true;
        });
        self.port.trigger_switch();
    }

    /// Suspends a task regardless of its current schedulable state.
    /// Returns `false` for an invalid handle.
    pub fn suspend(&mut self, handle: TaskHandle) -> bool {
        let Some(idx) = self.valid_index(handle) else {
            return false;
        };
        sync::critical_section(&self.port, || {
            self.tasks[idx].state = TaskState::Suspended;
            if idx == self.current {
                self.needs_reschedule = true;
            }
        });
        if self.needs_reschedule {
            self.port.trigger_switch();
        }
        true
    }

    /// Resumes a suspended task. Restores `Ready` if its scheduled
    /// release has already passed, `Blocked` if it's still waiting for
    /// one — derived from comparing the current tick against the
    /// task's `release_time_ticks` rather than remembering the state
    /// it was suspended from.
    pub fn resume(&mut self, handle: TaskHandle) -> bool {
        let Some(idx) = self.valid_index(handle) else {
            return false;
        };
        if self.tasks[idx].state != TaskState::Suspended {
            return false;
        }
        sync::critical_section(&self.port, || {
            self.tasks[idx].state =
                if crate::tick::tick_reached(self.tick_count, self.tasks[idx].release_time_ticks) {
                    TaskState::Ready
                } else {
                    TaskState::Blocked
                };
        });
        true
    }

    fn valid_index(&self, handle: TaskHandle) -> Option<usize> {
        let id = handle.0;
        if id == 0 || id >= self.task_count {
            return None;
        }
        (self.tasks[id].occupied && self.tasks[id].task_id == id).then_some(id)
    }

    /// Runs one tick: canary sweep, then policy dispatch. Call from the
    /// port's tick interrupt. Returns `true` if a switch was requested.
    pub fn on_tick(&mut self) -> bool {
        self.tick_count = self.tick_count.wrapping_add(1);
        self.monitor.uptime_ticks = self.tick_count;
        if self.current == 0 {
            self.monitor.idle_ticks += 1;
        } else {
            self.tasks[self.current].exec_ticks_in_release += 1;
            self.tasks[self.current].exec_ticks_total += 1;
        }

        let current = self.current;
        let tick_now = self.tick_count;
        let switch_needed = tick::run(
            &mut self.policy,
            &mut self.tasks,
            self.task_count,
            current,
            tick_now,
            |_overflowed_idx| loop {
                self.port.idle_wait()
            },
        );
        self.needs_reschedule |= switch_needed;
        self.needs_reschedule
    }

    /// Called from the context-switch ISR once the outgoing task's
    /// stack pointer has been saved.
    pub fn on_context_saved(&mut self, psp: *mut u32) {
        self.tasks[self.current].stack_pointer = psp;
    }

    /// Called from the context-switch ISR to pick and install the next
    /// task, returning its stack pointer.
    pub fn on_schedule(&mut self) -> *mut u32 {
        if self.tasks[self.current].state == TaskState::Running {
            self.tasks[self.current].state = TaskState::Ready;
        }
        let next = self.policy.pick_next(&self.tasks, self.task_count);
        self.tasks[next].state = TaskState::Running;
        self.tasks[next].last_start_tick = self.tick_count;
        self.tasks[next].context_switches += 1;
        self.current = next;
        self.needs_reschedule = false;
        self.monitor.context_switches += 1;
        self.tasks[next].stack_pointer
    }

    /// Runs `task_id`'s entry function to completion and re-blocks it;
    /// called from the trampoline in a loop. Index 0 (idle) never
    /// completes — it waits for an interrupt and returns immediately.
    pub fn run_job(&mut self, task_id: usize) {
        if task_id == 0 {
            self.port.idle_wait();
            return;
        }
        let entry = self.tasks[task_id].entry_fn();
        entry(task_id);
        sync::critical_section(&self.port, || {
            self.tasks[task_id].completions += 1;
            self.tasks[task_id].state = TaskState::Blocked;
            self.needs_reschedule = true;
        });
        self.port.trigger_switch();
    }

    pub fn task_state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.valid_index(handle).map(|i| self.tasks[i].state)
    }

    pub fn completions(&self, handle: TaskHandle) -> u32 {
        self.valid_index(handle).map_or(0, |i| self.tasks[i].completions)
    }

    /// Total execution ticks accumulated by this task, for diagnostics.
    pub fn task_exec_ticks(&self, handle: TaskHandle) -> u32 {
        self.valid_index(handle)
            .map_or(0, |i| self.tasks[i].exec_ticks_total)
    }

    /// Total context switches performed system-wide.
    pub fn context_switch_count(&self) -> u64 {
        self.monitor.context_switches
    }

    pub fn deadline_misses(&self, handle: TaskHandle) -> u32 {
        self.valid_index(handle)
            .map_or(0, |i| self.tasks[i].deadline_misses)
    }

    pub fn current_deadline_missed(&self, handle: TaskHandle) -> bool {
        self.valid_index(handle)
            .is_some_and(|i| self.tasks[i].current_deadline_missed)
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    pub fn monitor(&self) -> &SystemMonitor {
        &self.monitor
    }

    pub fn reset_monitoring(&mut self) {
        crate::monitor::reset_task_accounting(&mut self.tasks, self.task_count);
    }

    pub fn get_port_name(&self) -> &'static str {
        self.port.name()
    }

    pub fn get_port_version(&self) -> &'static str {
        self.port.version()
    }

    pub fn get_cpu_hz(&self) -> u32 {
        self.port.get_cpu_hz()
    }

    pub fn system_report(&self, buf: &mut dyn fmt::Write) -> fmt::Result {
        crate::monitor::format_system_info(&self.monitor, &self.tasks, self.started, buf)
    }

    pub fn task_report(&self, handle: TaskHandle, buf: &mut dyn fmt::Write) -> fmt::Result {
        match self.valid_index(handle) {
            Some(i) => crate::monitor::format_task_info(&self.tasks[i], buf),
            None => buf.write_str("invalid task handle"),
        }
    }
}

// ---------------------------------------------------------------------------
// Global singleton bound to the production port and default policy
// ---------------------------------------------------------------------------

type BoundKernel = Kernel<CortexM4, Edf>;

static mut KERNEL: BoundKernel = Kernel::new(CortexM4::new(), Edf::new());
static mut KERNEL_PTR: *mut BoundKernel = core::ptr::null_mut();

fn with_kernel<R>(f: impl FnOnce(&mut BoundKernel) -> R) -> R {
    unsafe {
        if KERNEL_PTR.is_null() {
            KERNEL_PTR = core::ptr::addr_of_mut!(KERNEL);
        }
        f(&mut *KERNEL_PTR)
    }
}

/// Initializes the kernel and its idle task. Must be called exactly
/// once, before any `create_periodic` call.
pub fn init() -> Result<(), KernelError> {
    with_kernel(|k| k.init())
}

/// Registers a periodic task with the global kernel.
pub fn create_periodic(
    name: &str,
    entry: extern "C" fn(usize),
    priority: u8,
    period_ticks: u32,
    relative_deadline_ticks: u32,
    stack_words: usize,
) -> Result<TaskHandle, KernelError> {
    with_kernel(|k| {
        k.create_periodic(
            name,
            entry,
            priority,
            period_ticks,
            relative_deadline_ticks,
            stack_words,
        )
    })
}

/// Starts the global kernel's scheduler. Never returns on the first
/// call; a re-entrant call (or one before an idle task exists) is a
/// no-op and returns control to the caller.
pub fn start_scheduler() {
    with_kernel(|k| k.start_scheduler())
}

pub fn yield_now() {
    with_kernel(|k| k.yield_now())
}

pub fn delay(ticks: u32) {
    with_kernel(|k| k.delay(ticks))
}

pub fn delay_until(prev_wake_tick: &mut u32, increment: u32) {
    with_kernel(|k| k.delay_until(prev_wake_tick, increment))
}

pub fn suspend(handle: TaskHandle) -> bool {
    with_kernel(|k| k.suspend(handle))
}

pub fn resume(handle: TaskHandle) -> bool {
    with_kernel(|k| k.resume(handle))
}

pub fn task_state(handle: TaskHandle) -> Option<TaskState> {
    with_kernel(|k| k.task_state(handle))
}

pub fn completions(handle: TaskHandle) -> u32 {
    with_kernel(|k| k.completions(handle))
}

pub fn deadline_misses(handle: TaskHandle) -> u32 {
    with_kernel(|k| k.deadline_misses(handle))
}

pub fn task_exec_ticks(handle: TaskHandle) -> u32 {
    with_kernel(|k| k.task_exec_ticks(handle))
}

pub fn context_switch_count() -> u64 {
    with_kernel(|k| k.context_switch_count())
}

pub fn get_port_name() -> &'static str {
    with_kernel(|k| k.get_port_name())
}

pub fn get_port_version() -> &'static str {
    with_kernel(|k| k.get_port_version())
}

pub fn get_cpu_hz() -> u32 {
    with_kernel(|k| k.get_cpu_hz())
}

// ---------------------------------------------------------------------------
// ISR glue called from `arch::cortex_m4`
// ---------------------------------------------------------------------------

pub(crate) fn on_context_saved(psp: *mut u32) {
    with_kernel(|k| k.on_context_saved(psp));
}

pub(crate) fn on_schedule() -> *mut u32 {
    with_kernel(|k| k.on_schedule())
}

pub(crate) fn on_tick_irq() {
    let switch_needed = with_kernel(|k| k.on_tick());
    if switch_needed {
        with_kernel(|k| k.port.trigger_switch());
    }
}

pub(crate) fn run_job(task_id: usize) {
    with_kernel(|k| k.run_job(task_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimPort;
    use crate::scheduler::Edf;

    extern "C" fn demo(_id: usize) {}

    fn booted() -> Kernel<SimPort, Edf> {
        let mut k = Kernel::new(SimPort::new(16_000_000), Edf::new());
        k.init().unwrap();
        k
    }

    #[test]
    fn init_creates_idle_task_once() {
        let mut k = booted();
        assert_eq!(k.init(), Err(KernelError::DuplicateIdleTask));
    }

    #[test]
    fn create_periodic_rejects_zero_period() {
        let mut k = booted();
        let err = k.create_periodic("a", demo, 1, 0, 10, 64).unwrap_err();
        assert_eq!(err, KernelError::InvalidParameters);
    }

    #[test]
    fn create_periodic_assigns_sequential_ids() {
        let mut k = booted();
        let a = k.create_periodic("a", demo, 1, 100, 100, 64).unwrap();
        let b = k.create_periodic("b", demo, 1, 100, 100, 64).unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
    }

    #[test]
    fn out_of_range_stack_size_is_clamped_not_rejected() {
        let mut k = booted();
        let too_small = k.create_periodic("tiny", demo, 1, 100, 100, 4).unwrap();
        let too_big = k
            .create_periodic("huge", demo, 1, 100, 100, MAX_STACK_SIZE + 1)
            .unwrap();
        // Neither call errors; both slots end up occupied and runnable.
        assert!(k.task_state(too_small).is_some());
        assert!(k.task_state(too_big).is_some());
    }

    #[test]
    fn table_full_once_max_tasks_reached() {
        let mut k = booted();
        for _ in 1..MAX_TASKS {
            k.create_periodic("t", demo, 1, 100, 100, 64).unwrap();
        }
        let err = k.create_periodic("overflow", demo, 1, 100, 100, 64).unwrap_err();
        assert_eq!(err, KernelError::TableFull);
    }

    #[test]
    fn suspend_then_resume_restores_ready_after_release_passed() {
        let mut k = booted();
        let h = k.create_periodic("a", demo, 1, 10, 10, 64).unwrap();
        assert!(k.suspend(h));
        assert_eq!(k.task_state(h), Some(TaskState::Suspended));
        assert!(k.resume(h));
        assert_eq!(k.task_state(h), Some(TaskState::Ready));
    }

    #[test]
    fn resume_restores_blocked_when_release_still_future() {
        let mut k = booted();
        let h = k.create_periodic("a", demo, 1, 10, 10, 64).unwrap();
        k.tasks[h.id()].release_time_ticks = 1000;
        assert!(k.suspend(h));
        assert!(k.resume(h));
        assert_eq!(k.task_state(h), Some(TaskState::Blocked));
    }

    #[test]
    fn delay_until_advances_the_reference_tick_by_increment() {
        let mut k = booted();
        let h = k.create_periodic("a", demo, 1, 50, 50, 64).unwrap();
        k.current = h.id();
        let mut prev_wake = 10u32;
        k.delay_until(&mut prev_wake, 5);
        assert_eq!(prev_wake, 15);
        assert_eq!(k.tasks[h.id()].release_time_ticks, 15);
        assert_eq!(k.task_state(h), Some(TaskState::Blocked));
    }

    #[test]
    fn invalid_handle_accessors_return_silent_defaults() {
        let k = booted();
        let bogus = TaskHandle(99);
        assert_eq!(k.task_state(bogus), None);
        assert_eq!(k.completions(bogus), 0);
        assert_eq!(k.deadline_misses(bogus), 0);
        assert_eq!(k.task_exec_ticks(bogus), 0);
        assert!(!k.current_deadline_missed(bogus));
    }

    #[test]
    fn idle_handle_is_never_a_valid_target() {
        let mut k = booted();
        assert!(!k.suspend(TaskHandle::IDLE));
        assert!(!k.resume(TaskHandle::IDLE));
    }

    #[test]
    fn arm_rejects_a_second_call() {
        let mut k = booted();
        assert!(k.arm().is_ok());
        assert_eq!(k.arm(), Err(KernelError::SchedulerAlreadyStarted));
    }

    #[test]
    fn arm_rejects_missing_idle_task() {
        let mut k: Kernel<SimPort, Edf> = Kernel::new(SimPort::new(16_000_000), Edf::new());
        assert_eq!(k.arm(), Err(KernelError::InvalidParameters));
    }

    #[test]
    fn start_scheduler_is_a_no_op_on_re_entry() {
        let mut k = booted();
        assert!(k.arm().is_ok());
        // A second call re-enters arm(), which now fails; start_scheduler
        // must return control to the caller rather than halt.
        k.start_scheduler();
        assert!(k.started);
    }

    #[test]
    fn yield_with_only_task_ready_is_a_no_op() {
        let mut k = booted();
        let h = k.create_periodic("a", demo, 1, 10, 10, 64).unwrap();
        k.current = h.id();
        k.tasks[h.id()].state = TaskState::Running;
        let switches_before = k.monitor.context_switches;
        k.yield_now();
        // pick_next still prefers the same task (nothing else runnable),
        // so no switch is requested and the task stays Running.
        assert!(!k.needs_reschedule);
        assert_eq!(k.monitor.context_switches, switches_before);
        assert_eq!(k.task_state(h), Some(TaskState::Running));
    }

    #[test]
    fn tick_counter_wraps_at_u32_max_and_release_detection_crosses_it() {
        let mut k = booted();
        let h = k.create_periodic("a", demo, 1, 5, 5, 64).unwrap();
        assert!(k.arm().is_ok());
        // Position the task's next release right at the wrap boundary
        // and the tick counter one tick behind it.
        k.tasks[h.id()].release_time_ticks = u32::MAX - 2;
        k.tick_count = u32::MAX - 3;
        k.monitor.uptime_ticks = k.tick_count;

        k.on_tick(); // tick_count -> MAX-2: release detected, re-armed
        assert_eq!(k.tasks[h.id()].release_time_ticks, 2); // wrapped: (MAX-2)+5

        // Drive the counter across the actual MAX -> 0 rollover and
        // confirm the next release is detected correctly on the far side.
        k.on_tick(); // MAX-1
        k.on_tick(); // MAX
        k.on_tick(); // 0
        assert_eq!(k.tick_count, 0);
        k.on_tick(); // 1
        k.on_tick(); // 2: release due again
        assert_eq!(k.tick_count, 2);
        assert_eq!(k.tasks[h.id()].release_time_ticks, 7);
    }

    #[test]
    fn context_switches_grow_by_at_most_one_per_tick_not_per_yield() {
        let mut k = booted();
        let h = k.create_periodic("a", demo, 1, 10, 10, 64).unwrap();
        assert!(k.arm().is_ok());
        // Repeated yields with no other runnable task are all no-ops.
        for _ in 0..5 {
            k.yield_now();
        }
        assert_eq!(k.context_switch_count(), 0);
        let _ = h;
    }
}
