// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::counter;
use super::interval_timer::IntervalTimer;
use super::measure::{measure_with, DEFAULT_MAX_MICROSECONDS};
use std::hint::black_box;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("tick counter frequency is unavailable: {0}")]
    FrequencyUnavailable(&'static str),
    #[error("computed an invalid tick period of {0} nanoseconds")]
    InvalidPeriod(f64),
}

/// How the tick counter relates to wall time on this machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickCalibration {
    nanoseconds_per_tick: f64,
    tick_quantum: u64,
    interval_timer_tick_overhead: u64,
}

impl TickCalibration {
    /// Calibrates against the running machine: period, then quantum, then timer overhead.
    pub fn measure() -> Result<Self, CalibrationError> {
        let nanoseconds_per_tick = compute_nanoseconds_per_tick()?;
        if !nanoseconds_per_tick.is_finite() || nanoseconds_per_tick <= 0.0 {
            return Err(CalibrationError::InvalidPeriod(nanoseconds_per_tick));
        }

        let mut calibration = Self {
            nanoseconds_per_tick,
            tick_quantum: measure_tick_quantum(),
            interval_timer_tick_overhead: 0,
        };
        calibration.interval_timer_tick_overhead =
            measure_with(&calibration, DEFAULT_MAX_MICROSECONDS, || {
                let timer = IntervalTimer::new();
                black_box(timer.elapsed_ticks());
            })
            .ticks;

        debug!(
            nanoseconds_per_tick,
            tick_quantum = calibration.tick_quantum,
            overhead = calibration.interval_timer_tick_overhead,
            "Calibrated the tick counter"
        );
        Ok(calibration)
    }

    pub const fn from_parts(
        nanoseconds_per_tick: f64,
        tick_quantum: u64,
        interval_timer_tick_overhead: u64,
    ) -> Self {
        Self {
            nanoseconds_per_tick,
            tick_quantum,
            interval_timer_tick_overhead,
        }
    }

    pub fn nanoseconds_per_tick(&self) -> f64 {
        self.nanoseconds_per_tick
    }

    /// Smallest non-zero difference observed between back-to-back counter reads.
    pub fn tick_quantum(&self) -> u64 {
        self.tick_quantum
    }

    /// Ticks consumed by starting and immediately reading an [`IntervalTimer`].
    pub fn interval_timer_tick_overhead(&self) -> u64 {
        self.interval_timer_tick_overhead
    }

    /// Rounds to the nearest nanosecond.
    pub fn ticks_to_nanoseconds(&self, ticks: u64) -> i64 {
        (ticks as f64 * self.nanoseconds_per_tick + 0.5) as i64
    }

    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        self.ticks_to_nanoseconds(ticks) as f64 / 1e9
    }

    /// Truncates toward zero. Negative durations map to zero ticks.
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        (1e9 * seconds / self.nanoseconds_per_tick) as u64
    }
}

#[cfg(target_os = "macos")]
#[allow(deprecated)]
fn compute_nanoseconds_per_tick() -> Result<f64, CalibrationError> {
    let mut info = libc::mach_timebase_info { numer: 0, denom: 0 };
    // Safety: `info` is a valid out pointer.
    let rc = unsafe { libc::mach_timebase_info(&mut info) };
    if rc != 0 || info.denom == 0 {
        return Err(CalibrationError::FrequencyUnavailable(
            "mach_timebase_info failed",
        ));
    }
    Ok(info.numer as f64 / info.denom as f64)
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
fn compute_nanoseconds_per_tick() -> Result<f64, CalibrationError> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").unwrap_or_default();
    // The kernel reports bogomips as twice the TSC frequency in MHz.
    let hz = cpuinfo_field(&cpuinfo, "bogomips")
        .map(|mips| mips * 1e6 / 2.0)
        .or_else(|| {
            std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq")
                .ok()
                .and_then(|khz| khz.trim().parse::<f64>().ok())
                .map(|khz| khz * 1e3)
        })
        .or_else(|| cpuinfo_field(&cpuinfo, "cpu MHz").map(|mhz| mhz * 1e6))
        .filter(|hz| *hz > 0.0);

    match hz {
        Some(hz) => Ok(1e9 / hz),
        None => {
            debug!("No advertised processor frequency, timing the tick counter instead");
            measure_against_monotonic_clock()
        }
    }
}

#[cfg(all(
    not(target_os = "macos"),
    not(target_os = "linux"),
    target_arch = "x86_64"
))]
fn compute_nanoseconds_per_tick() -> Result<f64, CalibrationError> {
    measure_against_monotonic_clock()
}

#[cfg(all(not(target_os = "macos"), target_arch = "aarch64"))]
fn compute_nanoseconds_per_tick() -> Result<f64, CalibrationError> {
    let frequency: u64;
    // Safety: the counter frequency register is readable from EL0.
    unsafe {
        core::arch::asm!("mrs {}, cntfrq_el0", out(reg) frequency, options(nomem, nostack));
    }
    if frequency == 0 {
        return measure_against_monotonic_clock();
    }
    Ok(1e9 / frequency as f64)
}

#[cfg(not(any(target_os = "macos", target_arch = "x86_64", target_arch = "aarch64")))]
fn compute_nanoseconds_per_tick() -> Result<f64, CalibrationError> {
    // The fallback counter already counts nanoseconds.
    Ok(1.0)
}

#[cfg(all(not(target_os = "macos"), any(target_arch = "x86_64", target_arch = "aarch64")))]
fn measure_against_monotonic_clock() -> Result<f64, CalibrationError> {
    use std::time::{Duration, Instant};
    const WINDOW: Duration = Duration::from_millis(50);

    let start = Instant::now();
    let start_ticks = counter::start_tick_time();
    while start.elapsed() < WINDOW {
        std::thread::sleep(Duration::from_millis(1));
    }
    let ticks = counter::stop_tick_time().wrapping_sub(start_ticks);
    let elapsed = start.elapsed();
    if ticks == 0 {
        return Err(CalibrationError::FrequencyUnavailable(
            "tick counter did not advance",
        ));
    }
    Ok(elapsed.as_nanos() as f64 / ticks as f64)
}

/// Parses the first `key : value` line of a `/proc/cpuinfo` dump.
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
fn cpuinfo_field(cpuinfo: &str, key: &str) -> Option<f64> {
    cpuinfo.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case(key) {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn measure_tick_quantum() -> u64 {
    const TRIALS: usize = 64;
    const READS: usize = 5;

    let mut quantum = u64::MAX;
    for _ in 0..TRIALS {
        let mut reads = [0u64; READS];
        for read in reads.iter_mut() {
            *read = counter::tick_time();
        }
        for pair in reads.windows(2) {
            let delta = pair[1].wrapping_sub(pair[0]);
            if delta > 0 {
                quantum = quantum.min(delta);
            }
        }
    }
    if quantum == u64::MAX {
        1
    } else {
        quantum
    }
}
