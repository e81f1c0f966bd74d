// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::counter::{start_tick_time, stop_tick_time};

/// Measures elapsed ticks from a starting point.
///
/// Reading a timer is async-signal-safe. Converting the result to wall time goes through the
/// process-wide calibration, see [`super::ticks_to_nanoseconds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    start_ticks: Option<u64>,
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalTimer {
    /// A timer that is already running.
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            start_ticks: Some(start_tick_time()),
        }
    }

    pub const fn unstarted() -> Self {
        Self { start_ticks: None }
    }

    /// (Re)starts the timer from now.
    #[inline(always)]
    pub fn start(&mut self) {
        self.start_ticks = Some(start_tick_time());
    }

    pub fn is_started(&self) -> bool {
        self.start_ticks.is_some()
    }

    pub fn start_ticks(&self) -> Option<u64> {
        self.start_ticks
    }

    #[inline(always)]
    pub fn current_ticks() -> u64 {
        stop_tick_time()
    }

    /// Zero for a timer that was never started.
    #[inline(always)]
    pub fn elapsed_ticks(&self) -> u64 {
        match self.start_ticks {
            Some(start) => stop_tick_time().wrapping_sub(start),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ticks_to_seconds;
    use std::time::Duration;

    #[test]
    fn unstarted_timer_reports_nothing() {
        let timer = IntervalTimer::unstarted();
        assert!(!timer.is_started());
        assert_eq!(timer.start_ticks(), None);
        assert_eq!(timer.elapsed_ticks(), 0);
    }

    #[test]
    fn restarting_moves_the_origin() {
        let mut timer = IntervalTimer::new();
        let first = timer.start_ticks().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        timer.start();
        assert!(timer.start_ticks().unwrap() > first);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn sleeping_is_measured_in_seconds() {
        let timer = IntervalTimer::new();
        std::thread::sleep(Duration::from_millis(1500));
        let seconds = ticks_to_seconds(timer.elapsed_ticks());
        assert!(seconds > 1.4, "measured {seconds}s");
        assert!(seconds < 5.0, "measured {seconds}s");
    }
}
