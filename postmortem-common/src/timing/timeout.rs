// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::interval_timer::IntervalTimer;
use std::time::Duration;

/// A deadline measured on the tick counter, usable from a signal handler once the process-wide
/// calibration has been computed.
pub struct TimeoutManager {
    timer: IntervalTimer,
    timeout: Duration,
}

impl TimeoutManager {
    // 4ms per sched slice, give ~4x10 slices for safety
    pub const MINIMUM_REAP_TIME: Duration = Duration::from_millis(160);

    pub fn new(timeout: Duration) -> Self {
        Self {
            timer: IntervalTimer::new(),
            timeout,
        }
    }

    /// Never less than [`Self::MINIMUM_REAP_TIME`], even past the deadline.
    pub fn remaining(&self) -> Duration {
        let elapsed = self.elapsed();
        if elapsed >= self.timeout {
            Self::MINIMUM_REAP_TIME
        } else {
            (self.timeout - elapsed).max(Self::MINIMUM_REAP_TIME)
        }
    }

    pub fn elapsed(&self) -> Duration {
        let nanos = super::ticks_to_nanoseconds(self.timer.elapsed_ticks());
        Duration::from_nanos(nanos.max(0) as u64)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() > self.timeout
    }
}

impl std::fmt::Debug for TimeoutManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutManager")
            .field("start_ticks", &self.timer.start_ticks())
            .field("elapsed", &self.elapsed())
            .field("timeout", &self.timeout)
            .field("remaining", &self.remaining())
            .finish()
    }
}
