// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::errors::ReapError;
use crate::timing::TimeoutManager;
use libc::{_exit, EXIT_FAILURE};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// Reaps `pid` without blocking past the manager's deadline.
///
/// * `Ok(true)`: the child exited and was reaped.
/// * `Ok(false)`: there is no such child, so there is nothing left to reap.
/// * `Err(ReapError::Timeout)`: the child is still running.
// `waitpid` is async-signal-safe per POSIX, this may be called from a signal handler.
pub fn reap_child_non_blocking(
    pid: Pid,
    timeout_manager: &TimeoutManager,
) -> Result<bool, ReapError> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
                if timeout_manager.is_expired() {
                    return Err(ReapError::Timeout);
                }
                // Safety: no preconditions.
                unsafe { libc::sched_yield() };
            }
            Ok(_status) => return Ok(true),
            Err(nix::Error::ECHILD) => return Ok(false),
            Err(nix::Error::EINTR) => continue,
            Err(e) => return Err(ReapError::WaitError(e)),
        }
    }
}

/// Kills the program without raising an abort or calling at_exit
pub fn terminate() -> ! {
    // Safety: No preconditions
    unsafe { _exit(EXIT_FAILURE) }
}
