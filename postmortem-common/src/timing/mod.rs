// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tick counter timing.
//!
//! The counter is read with a handful of instructions and no system call, which makes it usable
//! for micro benchmarks and from signal handlers. Converting ticks to wall time needs a
//! calibration that is computed once per process, lazily on first use. Calibration allocates and
//! may read `/proc`, so processes that want timing inside signal handlers should force it early
//! with [`calibration`].

mod calibration;
mod counter;
mod interval_timer;
mod measure;
mod timeout;

pub use calibration::{CalibrationError, TickCalibration};
pub use counter::{start_tick_time, stop_tick_time, tick_time};
pub use interval_timer::IntervalTimer;
pub use measure::{measure_execution_time, ExecutionTime, DEFAULT_MAX_MICROSECONDS};
pub use timeout::TimeoutManager;

use std::sync::OnceLock;
use tracing::error;

static CALIBRATION: OnceLock<TickCalibration> = OnceLock::new();

/// The process-wide calibration. A machine whose counter cannot be calibrated aborts the
/// process: every timing answer would be wrong.
pub fn calibration() -> &'static TickCalibration {
    CALIBRATION.get_or_init(|| match TickCalibration::measure() {
        Ok(calibration) => calibration,
        Err(err) => {
            error!(%err, "Unable to calibrate the tick counter");
            eprintln!("Unable to calibrate the tick counter: {err}");
            std::process::abort()
        }
    })
}

pub fn nanoseconds_per_tick() -> f64 {
    calibration().nanoseconds_per_tick()
}

pub fn tick_quantum() -> u64 {
    calibration().tick_quantum()
}

pub fn interval_timer_tick_overhead() -> u64 {
    calibration().interval_timer_tick_overhead()
}

pub fn ticks_to_nanoseconds(ticks: u64) -> i64 {
    calibration().ticks_to_nanoseconds(ticks)
}

pub fn ticks_to_seconds(ticks: u64) -> f64 {
    calibration().ticks_to_seconds(ticks)
}

pub fn seconds_to_ticks(seconds: f64) -> u64 {
    calibration().seconds_to_ticks(seconds)
}
