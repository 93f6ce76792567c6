//! Periodic control tick: intent → robot update → gait phase → status.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to an isolated CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! ## Cycle Loop
//! With the `rt` feature the loop sleeps with `clock_nanosleep(TIMER_ABSTIME)`
//! on `CLOCK_MONOTONIC`; otherwise `std::thread::sleep` for the remainder.
//! An overrun is logged, and aborts the loop when configured to.

use crate::gait::GaitDispatcher;
use crate::input::IntentSource;
use crate::robot::Robot;
use crate::trajectory::PoseTrajectoryGenerator;
use exo_common::config::ConfigError;
use exo_common::gait::GaitPhaseId;
use exo_common::hal::transport::{Transport, TransportError};
use exo_common::robot::{ControlConfig, RobotConfig};
use exo_common::status::TickStatus;
use exo_hal::TransportRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (time between expected and actual wake).
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Tick exceeded its budget with `abort_on_overrun` set.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun { actual_ns: i64, budget_ns: i64 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop never faults on it.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup. Without the `rt` feature every step except the stack
/// prefault is a no-op.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub cycle: u64,
    pub phase: GaitPhaseId,
    /// Tick execution time [ns].
    pub duration_ns: i64,
    pub overrun: bool,
    /// Operator asked to quit.
    pub quit: bool,
}

/// Owns the dispatcher and the operator input, and paces the ticks.
pub struct CycleRunner<T: Transport = Box<dyn Transport>> {
    dispatcher: GaitDispatcher<T>,
    intent: Box<dyn IntentSource>,
    stats: CycleStats,
    cycle_time_ns: i64,
    abort_on_overrun: bool,
    status_interval: u64,
    last_overrun: bool,
}

impl CycleRunner {
    /// Build the whole kernel for `config` with the transport it names.
    pub fn from_config(
        config: &RobotConfig,
        registry: &TransportRegistry,
        intent: Box<dyn IntentSource>,
    ) -> Result<Self, CycleError> {
        let robot = Robot::from_registry(config, registry)?;
        let generator = Box::new(PoseTrajectoryGenerator::new(&config.trajectory));
        Ok(Self::new(
            GaitDispatcher::new(robot, generator),
            intent,
            &config.control,
        ))
    }
}

impl<T: Transport> CycleRunner<T> {
    pub fn new(
        dispatcher: GaitDispatcher<T>,
        intent: Box<dyn IntentSource>,
        control: &ControlConfig,
    ) -> Self {
        Self {
            dispatcher,
            intent,
            stats: CycleStats::new(),
            cycle_time_ns: control.cycle_time_us.saturating_mul(1000) as i64,
            abort_on_overrun: control.abort_on_overrun,
            status_interval: control.status_interval.max(1),
            last_overrun: false,
        }
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn dispatcher(&self) -> &GaitDispatcher<T> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut GaitDispatcher<T> {
        &mut self.dispatcher
    }

    /// Status record of the most recent tick.
    pub fn status(&self) -> TickStatus {
        self.dispatcher
            .status(self.stats.cycle_count.saturating_sub(1), self.last_overrun)
    }

    /// Execute one tick with trajectory time `now`.
    pub fn step(&mut self, now: Instant) -> TickReport {
        let started = Instant::now();
        let cycle = self.stats.cycle_count;

        let intent = self.intent.poll(cycle);
        let phase = self.dispatcher.tick(&intent, now);

        let duration_ns = started.elapsed().as_nanos() as i64;
        self.stats.record(duration_ns, 0);
        let overrun = duration_ns > self.cycle_time_ns;
        if overrun {
            self.stats.overruns += 1;
            let n = self.stats.overruns;
            if n <= 10 || n % 1000 == 0 {
                warn!(
                    overrun = n,
                    duration_us = duration_ns / 1000,
                    budget_us = self.cycle_time_ns / 1000,
                    "cycle overrun"
                );
            }
        }
        self.last_overrun = overrun;

        if cycle % self.status_interval == 0 {
            self.publish_status(cycle, overrun);
        }

        TickReport {
            cycle,
            phase,
            duration_ns,
            overrun,
            quit: intent.quit,
        }
    }

    fn publish_status(&self, cycle: u64, overrun: bool) {
        let status = self.dispatcher.status(cycle, overrun);
        match serde_json::to_string(&status) {
            Ok(json) => debug!(cycle, phase = status.phase.name(), status = %json, "status"),
            Err(e) => warn!(cycle, error = %e, "status serialization failed"),
        }
    }

    /// `Some(err)` when the tick must end the loop.
    fn check(&self, report: &TickReport) -> Option<CycleError> {
        (report.overrun && self.abort_on_overrun).then(|| CycleError::CycleOverrun {
            actual_ns: report.duration_ns,
            budget_ns: self.cycle_time_ns,
        })
    }

    /// Run until `running` clears, the operator quits, `max_cycles` ticks
    /// have run or an aborting overrun occurs. The robot is shut down on
    /// every exit path.
    pub fn run(
        &mut self,
        running: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> Result<CycleStats, CycleError> {
        info!(
            cycle_time_us = self.cycle_time_ns / 1000,
            abort_on_overrun = self.abort_on_overrun,
            "entering control loop"
        );

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop(running, max_cycles);
        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop(running, max_cycles);

        self.dispatcher.robot_mut().shutdown();
        info!(
            cycles = self.stats.cycle_count,
            avg_us = self.stats.avg_cycle_ns() / 1000,
            max_us = self.stats.max_cycle_ns / 1000,
            overruns = self.stats.overruns,
            "control loop stopped"
        );
        result.map(|()| self.stats.clone())
    }

    fn keep_going(&self, running: &AtomicBool, max_cycles: Option<u64>) -> bool {
        running.load(Ordering::SeqCst) && max_cycles.is_none_or(|max| self.stats.cycle_count < max)
    }

    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(
        &mut self,
        running: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> Result<(), CycleError> {
        let cycle_duration = std::time::Duration::from_nanos(self.cycle_time_ns as u64);

        while self.keep_going(running, max_cycles) {
            let cycle_start = Instant::now();
            let report = self.step(cycle_start);
            if let Some(err) = self.check(&report) {
                return Err(err);
            }
            if report.quit {
                info!(cycle = report.cycle, "quit requested");
                break;
            }
            if let Some(remaining) = cycle_duration.checked_sub(cycle_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop(
        &mut self,
        running: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while self.keep_going(running, max_cycles) {
            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);

            let report = self.step(Instant::now());
            if let Some(err) = self.check(&report) {
                return Err(err);
            }
            if report.quit {
                info!(cycle = report.cycle, "quit requested");
                break;
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
            let woke = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            self.stats.max_latency_ns = self
                .stats
                .max_latency_ns
                .max(timespec_diff_ns(&woke, &next_wake).abs());
        }
        Ok(())
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// `a - b` in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
