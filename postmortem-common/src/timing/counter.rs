// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Raw reads of the cheapest monotonic counter the platform offers.
//!
//! | platform          | counter                          |
//! |-------------------|----------------------------------|
//! | macOS             | `mach_absolute_time`             |
//! | x86_64            | time stamp counter (`rdtsc`)     |
//! | aarch64           | virtual counter (`cntvct_el0`)   |
//! | anything else     | `CLOCK_MONOTONIC` in nanoseconds |
//!
//! All readers are async-signal-safe.

use std::sync::atomic::{compiler_fence, Ordering};

#[cfg(target_os = "macos")]
#[allow(deprecated)]
#[inline(always)]
pub fn tick_time() -> u64 {
    // Safety: no preconditions.
    unsafe { libc::mach_absolute_time() }
}

#[cfg(all(not(target_os = "macos"), target_arch = "x86_64"))]
#[inline(always)]
pub fn tick_time() -> u64 {
    // Safety: every x86_64 processor implements rdtsc.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(all(not(target_os = "macos"), target_arch = "aarch64"))]
#[inline(always)]
pub fn tick_time() -> u64 {
    let ticks: u64;
    // Safety: the virtual counter is readable from EL0 on every supported kernel.
    unsafe {
        core::arch::asm!("mrs {}, cntvct_el0", out(reg) ticks, options(nomem, nostack));
    }
    ticks
}

#[cfg(not(any(target_os = "macos", target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
pub fn tick_time() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // Safety: `ts` is a valid out pointer.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    (ts.tv_sec as u64)
        .wrapping_mul(1_000_000_000)
        .wrapping_add(ts.tv_nsec as u64)
}

/// Reads the counter at the beginning of a measured region.
///
/// Earlier instructions are retired before the read and later ones do not start before it.
#[cfg(all(not(target_os = "macos"), target_arch = "x86_64"))]
#[inline(always)]
pub fn start_tick_time() -> u64 {
    use core::arch::x86_64::{_mm_lfence, _rdtsc};
    compiler_fence(Ordering::SeqCst);
    // Safety: lfence and rdtsc are baseline x86_64 instructions.
    let ticks = unsafe {
        _mm_lfence();
        let ticks = _rdtsc();
        _mm_lfence();
        ticks
    };
    compiler_fence(Ordering::SeqCst);
    ticks
}

#[cfg(not(all(not(target_os = "macos"), target_arch = "x86_64")))]
#[inline(always)]
pub fn start_tick_time() -> u64 {
    compiler_fence(Ordering::SeqCst);
    let ticks = tick_time();
    compiler_fence(Ordering::SeqCst);
    ticks
}

/// Reads the counter at the end of a measured region, after every instruction of the region
/// has completed.
#[cfg(all(not(target_os = "macos"), target_arch = "x86_64"))]
#[inline(always)]
pub fn stop_tick_time() -> u64 {
    use core::arch::x86_64::{__rdtscp, _mm_lfence};
    let mut aux = 0u32;
    compiler_fence(Ordering::SeqCst);
    // Safety: `aux` is a valid out pointer, rdtscp is available on every x86_64 processor
    // still in service.
    let ticks = unsafe {
        let ticks = __rdtscp(&mut aux);
        _mm_lfence();
        ticks
    };
    compiler_fence(Ordering::SeqCst);
    ticks
}

#[cfg(not(all(not(target_os = "macos"), target_arch = "x86_64")))]
#[inline(always)]
pub fn stop_tick_time() -> u64 {
    start_tick_time()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_never_goes_backwards_on_one_thread() {
        let mut previous = start_tick_time();
        for _ in 0..10_000 {
            let now = stop_tick_time();
            assert!(now >= previous, "{now} < {previous}");
            previous = now;
        }
    }

    #[test]
    fn counter_advances_across_a_sleep() {
        let before = tick_time();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(tick_time() > before);
    }
}
