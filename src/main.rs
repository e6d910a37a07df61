//! # periodos Example Firmware
//!
//! Demonstrates four periodic tasks under the default EDF policy:
//!
//! | Task | Period | Deadline | Priority | Behavior |
//! |------|--------|----------|----------|----------|
//! | `sensor_sample_task` | 10 ticks | 10 | 5 | short job, every release |
//! | `control_loop_task` | 20 ticks | 15 | 4 | tighter deadline than its period |
//! | `telemetry_task` | 100 ticks | 100 | 2 | low-rate housekeeping |
//! | `watchdog_kick_task` | 50 ticks | 5 | 3 | must react promptly each release |
//!
//! Each task's entry function runs one job to completion and returns;
//! the kernel's trampoline blocks it until its next scheduled release.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use panic_halt as _;

use periodos::kernel;

// ---------------------------------------------------------------------------
// Task entry points
// ---------------------------------------------------------------------------

/// Reads a simulated sensor. Cheap, frequent, tight deadline.
extern "C" fn sensor_sample_task(_task_id: usize) {
    let mut acc: u32 = 0;
    for _ in 0..200 {
        acc = acc.wrapping_add(1);
    }
    let _ = acc;
}

/// Closes a control loop using the latest sample. Deadline shorter
/// than its period, so it must be dispatched promptly on release.
extern "C" fn control_loop_task(_task_id: usize) {
    let mut acc: u32 = 0;
    for _ in 0..500 {
        acc = acc.wrapping_add(1);
    }
    let _ = acc;
}

/// Low-rate housekeeping: large period, loose deadline.
extern "C" fn telemetry_task(_task_id: usize) {
    let mut acc: u32 = 0;
    for _ in 0..1000 {
        acc = acc.wrapping_add(1);
    }
    let _ = acc;
}

/// Must run very soon after release, simulating a watchdog kick.
extern "C" fn watchdog_kick_task(_task_id: usize) {
    let mut acc: u32 = 0;
    for _ in 0..50 {
        acc = acc.wrapping_add(1);
    }
    let _ = acc;
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Initializes the kernel, creates the periodic
/// tasks, and starts the scheduler. Does not return.
#[entry]
fn main() -> ! {
    kernel::init().expect("kernel init failed");

    kernel::create_periodic("sensor", sensor_sample_task, 5, 10, 10, 128)
        .expect("failed to create sensor_sample_task");

    kernel::create_periodic("control", control_loop_task, 4, 20, 15, 256)
        .expect("failed to create control_loop_task");

    kernel::create_periodic("telemetry", telemetry_task, 2, 100, 100, 128)
        .expect("failed to create telemetry_task");

    kernel::create_periodic("watchdog", watchdog_kick_task, 3, 50, 5, 64)
        .expect("failed to create watchdog_kick_task");

    kernel::start_scheduler();
    // Only reached if start_scheduler found the scheduler already
    // running, which can't happen this early — reaching here at all
    // means something upstream is badly wrong, so just wait.
    loop {
        cortex_m::asm::wfi();
    }
}
