// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::argv::build_argv;
use super::command::session_log_command;
use super::invoke::invoke;
use crate::process_state::{
    app_elapsed_seconds, fatal_stack_logging, installed_config, program_name_for_errors,
};
use crate::shared::constants::{MAX_ARGS, SESSION_LOG_HEADER};
use crate::signal_safe::{getenv, write_fd, FixedCString, NUMERIC_BUFFER_SIZE};
use std::ffi::{CStr, CString, OsStr};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::sync::Once;
use tracing::warn;

static SESSION_LOGGING: Once = Once::new();

extern "C" fn log_session_at_exit() {
    log_session_info(None);
}

/// Runs the session command when the process exits normally. Idempotent.
pub fn enable_session_logging() {
    SESSION_LOGGING.call_once(|| {
        // Safety: the handler is a plain function that lives for the whole process.
        if unsafe { libc::atexit(log_session_at_exit) } != 0 {
            warn!("Unable to register the session logger with atexit");
        }
    });
}

/// Runs the session command now, pointing it at `stack_trace` if there is a report. Does nothing
/// unless fatal stack logging is on.
pub fn log_session_info(stack_trace: Option<&Path>) {
    if !fatal_stack_logging() {
        return;
    }
    let stack_trace = stack_trace.and_then(|path| CString::new(path.as_os_str().as_bytes()).ok());
    invoke_session_logger(program_name_for_errors(), stack_trace.as_deref());
}

/// Runs the session command with the crash template when `stack_trace` is given. Returns
/// whether the command ran. Async-signal-safe.
pub fn invoke_session_logger(program: &CStr, stack_trace: Option<&CStr>) -> bool {
    let Some(stored) = session_log_command() else {
        return false;
    };
    let installed = installed_config();
    let command = getenv(installed.session_env_var())
        .filter(|command| !command.is_empty())
        .unwrap_or(stored.command());

    let mut pid = FixedCString::<NUMERIC_BUFFER_SIZE>::new();
    // Safety: no preconditions.
    pid.push_decimal(i64::from(unsafe { libc::getpid() }));
    let mut time = FixedCString::<NUMERIC_BUFFER_SIZE>::new();
    time.push_decimal(app_elapsed_seconds());
    let substitutions = [
        (c"$pid", pid.as_cstr()),
        (c"$time", time.as_cstr()),
        (c"$prog", program),
        (c"$stack", stack_trace.unwrap_or(c"")),
    ];

    let mut argv = [ptr::null(); MAX_ARGS];
    if !build_argv(
        &mut argv,
        command,
        stored.template(stack_trace.is_some()),
        &substitutions,
    ) {
        write_fd(
            installed.config().error_fd(),
            b"Too many arguments to log session command\n",
        );
        return false;
    }
    // Safety: a successful build leaves a string in the first slot.
    let path = unsafe { CStr::from_ptr(argv[0]) };
    let timeout = installed.config().session_timeout().as_secs() as u32;
    invoke(path, &argv, timeout, None);
    true
}

/// Completes a report: appends the session log unless the process is crashing hard, then
/// runs the session command if fatal stack logging is on.
pub fn finish_logging_fatal_stack_trace(
    program: &CStr,
    stack_trace_path: &CStr,
    session_log: Option<&Path>,
    crashing_hard: bool,
) {
    if !crashing_hard {
        if let Some(session_log) = session_log {
            if let Err(err) = append_session_log(stack_trace_path, session_log) {
                warn!(%err, session_log = %session_log.display(), "Unable to append the session log");
            }
        }
    }
    if fatal_stack_logging() {
        invoke_session_logger(program, Some(stack_trace_path));
    }
}

fn append_session_log(report: &CStr, session_log: &Path) -> io::Result<()> {
    let mut log = File::open(session_log)?;
    let mut out = OpenOptions::new()
        .append(true)
        .open(OsStr::from_bytes(report.to_bytes()))?;
    out.write_all(SESSION_LOG_HEADER.as_bytes())?;
    io::copy(&mut log, &mut out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn session_log_is_appended_after_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report");
        let session = dir.path().join("session");
        std::fs::write(&report, "report body\n").unwrap();
        std::fs::write(&session, "> command one\n").unwrap();

        let report_c = CString::new(report.as_os_str().as_bytes()).unwrap();
        append_session_log(&report_c, &session).unwrap();

        let mut contents = String::new();
        File::open(&report)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(
            contents,
            format!("report body\n{SESSION_LOG_HEADER}> command one\n")
        );
    }

    #[test]
    fn missing_session_logs_leave_the_report_alone() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report");
        std::fs::write(&report, "body").unwrap();
        let report_c = CString::new(report.as_os_str().as_bytes()).unwrap();
        assert!(append_session_log(&report_c, &dir.path().join("missing")).is_err());
        assert_eq!(std::fs::read_to_string(&report).unwrap(), "body");
    }
}
