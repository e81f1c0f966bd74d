// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::calibration::TickCalibration;
use super::interval_timer::IntervalTimer;

pub const DEFAULT_MAX_MICROSECONDS: u64 = 10_000;
const MAX_MICROSECONDS: u64 = 5_000_000;

const NUM_SAMPLES: usize = 64;
const ESTIMATE_RUNS: usize = 10;
/// A sample must span this many tick quanta to be meaningful.
const MIN_QUANTA_PER_SAMPLE: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTime {
    /// Ticks for a single execution.
    pub ticks: u64,
    /// Whether the fastest sample matched the median before the time budget ran out.
    pub reached_consensus: bool,
}

/// Estimates how many ticks one call of `f` takes.
///
/// Samples are batched so each one spans enough tick quanta to be meaningful. The slowest third
/// and the fastest tenth are re-sampled until the fastest sample equals the median, or
/// `max_microseconds` (capped at five seconds) elapse, in which case the best median seen is
/// returned.
pub fn measure_execution_time<F: FnMut()>(max_microseconds: u64, f: F) -> ExecutionTime {
    measure_with(super::calibration(), max_microseconds, f)
}

pub(crate) fn measure_with<F: FnMut()>(
    calibration: &TickCalibration,
    max_microseconds: u64,
    mut f: F,
) -> ExecutionTime {
    let budget = calibration
        .seconds_to_ticks(max_microseconds.min(MAX_MICROSECONDS) as f64 / 1e6);
    let timer = IntervalTimer::new();

    let estimate = (0..ESTIMATE_RUNS)
        .map(|_| run_batch(&mut f, 1))
        .min()
        .unwrap_or(1)
        .max(1);
    let min_ticks_per_sample = MIN_QUANTA_PER_SAMPLE * calibration.tick_quantum().max(1);
    let iterations = if estimate < min_ticks_per_sample {
        (min_ticks_per_sample + estimate / 2) / estimate
    } else {
        1
    };

    let mut samples = [0u64; NUM_SAMPLES];
    for sample in samples.iter_mut() {
        *sample = take_sample(&mut f, iterations);
    }
    samples.sort_unstable();
    let mut best_median = samples[NUM_SAMPLES / 2];

    loop {
        if samples[0] == samples[NUM_SAMPLES / 2] {
            return ExecutionTime {
                ticks: samples[0],
                reached_consensus: true,
            };
        }
        if timer.elapsed_ticks() > budget {
            return ExecutionTime {
                ticks: best_median,
                reached_consensus: false,
            };
        }

        for sample in samples[NUM_SAMPLES - NUM_SAMPLES / 3..].iter_mut() {
            *sample = take_sample(&mut f, iterations);
        }
        for sample in samples[..NUM_SAMPLES / 10].iter_mut() {
            *sample = take_sample(&mut f, iterations);
        }
        samples.sort_unstable();
        best_median = best_median.min(samples[NUM_SAMPLES / 2]);
    }
}

#[inline(always)]
fn run_batch<F: FnMut()>(f: &mut F, iterations: u64) -> u64 {
    let timer = IntervalTimer::new();
    for _ in 0..iterations {
        f();
    }
    timer.elapsed_ticks()
}

#[inline(always)]
fn take_sample<F: FnMut()>(f: &mut F, iterations: u64) -> u64 {
    (run_batch(f, iterations) + iterations / 2) / iterations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ticks_to_seconds;
    use std::hint::black_box;
    use std::time::Duration;

    #[test]
    fn trivial_work_is_cheap() {
        let result = measure_execution_time(DEFAULT_MAX_MICROSECONDS, || {
            black_box(1 + black_box(2));
        });
        assert!(ticks_to_seconds(result.ticks) < 0.001);
    }

    #[test]
    fn no_op_agrees_and_undercuts_a_busy_loop() {
        let no_op = measure_execution_time(1_000_000, || {
            black_box(());
        });
        assert!(no_op.reached_consensus, "{no_op:?}");

        let busy = measure_execution_time(DEFAULT_MAX_MICROSECONDS, || {
            let mut acc = 0u64;
            for i in 0..1000u64 {
                acc = black_box(acc.wrapping_add(black_box(i)));
            }
            black_box(acc);
        });
        assert!(no_op.ticks < busy.ticks, "{no_op:?} vs {busy:?}");
    }

    #[test]
    fn slow_work_gives_up_with_the_best_median() {
        let mut calls = 0;
        let result = measure_execution_time(100, || {
            calls += 1;
            std::thread::sleep(Duration::from_millis(1));
        });
        // Ten estimates plus one full round of samples.
        assert!(calls >= ESTIMATE_RUNS + NUM_SAMPLES);
        let seconds = ticks_to_seconds(result.ticks);
        assert!(seconds > 0.0005, "measured {seconds}s");
        assert!(seconds < 0.5, "measured {seconds}s");
    }
}
