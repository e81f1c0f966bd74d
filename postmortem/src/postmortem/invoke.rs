// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::process_state::installed_config;
use crate::shared::constants::MESSAGE_CAPACITY;
use crate::signal_safe::{write_fd, BusyGuard, FixedCString};
use libc::c_char;
use nix::errno::Errno;
use nix::sys::signal::{self, kill, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use postmortem_common::timing::TimeoutManager;
use postmortem_common::unix_utils::{alt_fork, raw_execv, reap_child_non_blocking};
use std::ffi::CStr;
use std::sync::atomic::AtomicBool;

/// Exit status of a helper whose exec failed.
pub const EXEC_FAILED_STATUS: i32 = 127;

/// The SIGALRM disposition is process wide, so helpers run one at a time.
static INVOKE_BUSY: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("argument vector is not null terminated")]
    UnterminatedArgv,
    #[error("unable to install the alarm handler: {0}")]
    Alarm(Errno),
    #[error("unable to fork: {0}")]
    Fork(Errno),
    #[error("unable to wait for the helper: {0}")]
    Wait(Errno),
    #[error("helper died from signal {0}")]
    Killed(i32),
    #[error("helper timed out")]
    TimedOut,
}

extern "C" fn wake_up(_signum: libc::c_int) {}

/// Owns the SIGALRM disposition while a helper runs.
struct AlarmGuard {
    previous: SigAction,
}

impl AlarmGuard {
    fn install() -> Result<Self, Errno> {
        // No SA_RESTART: the alarm must interrupt waitpid.
        let action = SigAction::new(
            SigHandler::Handler(wake_up),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // Safety: the handler does nothing.
        let previous = unsafe { signal::sigaction(Signal::SIGALRM, &action) }?;
        Ok(Self { previous })
    }
}

impl Drop for AlarmGuard {
    fn drop(&mut self) {
        let saved = errno::errno();
        // Safety: restores the disposition found at install time.
        unsafe {
            libc::alarm(0);
            let _ = signal::sigaction(Signal::SIGALRM, &self.previous);
        }
        errno::set_errno(saved);
    }
}

/// Runs `path` with `argv` in a child process and waits for it.
///
/// Returns the child's exit status, or -1 if it could not be started, died from a signal or
/// outlived `timeout_seconds` (0 waits forever) and was killed. An exec failure in the child
/// shows up as [`EXEC_FAILED_STATUS`]. Every failure is also reported on the error stream.
///
/// While waiting, `poll` runs about once a second. The child starts a new session when this
/// process owns a terminal, so that the terminal's signals reach only this process.
///
/// Async-signal-safe: the child is forked without atfork handlers and execs directly.
pub fn invoke(
    path: &CStr,
    argv: &[*const c_char],
    timeout_seconds: u32,
    mut poll: Option<&mut dyn FnMut()>,
) -> i32 {
    let error_fd = installed_config().config().error_fd();
    match run_helper(path, argv, timeout_seconds, error_fd, &mut poll) {
        Ok(EXEC_FAILED_STATUS) => {
            write_fd(error_fd, b"FAIL: Crash handler failed to exec\n");
            EXEC_FAILED_STATUS
        }
        Ok(status) => status,
        Err(err) => {
            report_failure(error_fd, err);
            -1
        }
    }
}

fn run_helper(
    path: &CStr,
    argv: &[*const c_char],
    timeout_seconds: u32,
    error_fd: i32,
    poll: &mut Option<&mut dyn FnMut()>,
) -> Result<i32, InvokeError> {
    if argv.last().map_or(true, |last| !last.is_null()) {
        return Err(InvokeError::UnterminatedArgv);
    }
    let _busy = BusyGuard::acquire(&INVOKE_BUSY);
    let alarm = AlarmGuard::install().map_err(InvokeError::Alarm)?;

    let pid = alt_fork();
    if pid < 0 {
        return Err(InvokeError::Fork(Errno::last()));
    }
    if pid == 0 {
        exec_child(path, argv, error_fd);
    }

    let child = Pid::from_raw(pid);
    let mut remaining = timeout_seconds;
    loop {
        if timeout_seconds > 0 {
            // Safety: no preconditions.
            unsafe { libc::alarm(1) };
        }
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, status)) => return Ok(status),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Err(InvokeError::Killed(signal as i32))
            }
            Ok(_) => {}
            Err(Errno::EINTR) => {
                if let Some(poll) = poll.as_deref_mut() {
                    poll();
                }
                if timeout_seconds > 0 {
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                }
            }
            Err(err) => return Err(InvokeError::Wait(err)),
        }
    }

    drop(alarm);
    let _ = kill(child, Signal::SIGKILL);
    let _ = reap_child_non_blocking(
        child,
        &TimeoutManager::new(TimeoutManager::MINIMUM_REAP_TIME),
    );
    Err(InvokeError::TimedOut)
}

fn exec_child(path: &CStr, argv: &[*const c_char], error_fd: i32) -> ! {
    // Safety: only raw system calls run between the fork and the exec or exit.
    unsafe {
        if libc::isatty(0) != 0 {
            libc::setsid();
        }
        let err = raw_execv(path, argv.as_ptr());
        let mut message = FixedCString::<MESSAGE_CAPACITY>::new();
        message
            .push_bytes(b"FAIL: Unable to exec crash handler ")
            .push_cstr(path)
            .push_bytes(b": errno=")
            .push_decimal(err as i64)
            .push_bytes(b"\n");
        write_fd(error_fd, message.as_bytes());
        libc::_exit(EXEC_FAILED_STATUS)
    }
}

fn report_failure(error_fd: i32, err: InvokeError) {
    let mut message = FixedCString::<MESSAGE_CAPACITY>::new();
    match err {
        InvokeError::UnterminatedArgv => {
            message.push_bytes(b"FAIL: Crash handler arguments are not null terminated");
        }
        InvokeError::Alarm(errno) => {
            message
                .push_bytes(b"FAIL: Unable to install alarm handler: errno=")
                .push_decimal(errno as i64);
        }
        InvokeError::Fork(errno) => {
            message
                .push_bytes(b"FAIL: Unable to fork() crash handler: errno=")
                .push_decimal(errno as i64);
        }
        InvokeError::Wait(errno) => {
            message
                .push_bytes(b"FAIL: Unable to wait for crash handler: errno=")
                .push_decimal(errno as i64);
        }
        InvokeError::Killed(signal) => {
            message
                .push_bytes(b"FAIL: Crash handler died: signal=")
                .push_decimal(signal as i64);
        }
        InvokeError::TimedOut => {
            message.push_bytes(b"FAIL: Crash handler timed out");
        }
    }
    message.push_bytes(b"\n");
    write_fd(error_fd, message.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn shell(script: &CStr, timeout_seconds: u32, poll: Option<&mut dyn FnMut()>) -> i32 {
        let argv = [c"/bin/sh".as_ptr(), c"-c".as_ptr(), script.as_ptr(), ptr::null()];
        invoke(c"/bin/sh", &argv, timeout_seconds, poll)
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn exit_status_is_returned() {
        assert_eq!(shell(c"exit 0", 10, None), 0);
        assert_eq!(shell(c"exit 3", 10, None), 3);
        assert_eq!(shell(c"exit 3", 0, None), 3);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn exec_failures_are_reported() {
        let path = c"/nonexistent/postmortem-helper";
        let argv = [path.as_ptr(), ptr::null()];
        assert_eq!(invoke(path, &argv, 10, None), EXEC_FAILED_STATUS);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn killed_helpers_report_failure() {
        assert_eq!(shell(c"kill -9 $$", 10, None), -1);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn slow_helpers_time_out_and_poll() {
        let mut polls = 0;
        let mut count = || polls += 1;
        let poll: &mut dyn FnMut() = &mut count;
        let timer = std::time::Instant::now();
        assert_eq!(shell(c"sleep 30", 2, Some(poll)), -1);
        assert!(timer.elapsed() < std::time::Duration::from_secs(20));
        assert_eq!(polls, 2);
    }

    #[test]
    fn argument_vectors_must_be_terminated() {
        let argv = [c"/bin/true".as_ptr()];
        assert_eq!(invoke(c"/bin/true", &argv, 1, None), -1);
        assert_eq!(invoke(c"/bin/true", &[], 1, None), -1);
    }
}
