// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The crash report itself. Everything reachable from here must be async-signal-safe, apart
//! from in-process symbolization, which has to be selected explicitly through the trace
//! collection mode.

use super::banner::{banner_width, write_rule, write_title};
use super::log_file::{create_unique_log_file, LogFile};
use crate::postmortem::{finish_logging_fatal_stack_trace, log_process_state_to};
use crate::process_state::{
    extra_log_info, hostname, installed_config, program_info, program_name_for_errors,
    set_app_is_crashing,
};
use crate::shared::configuration::TraceCollection;
use crate::shared::constants::{
    CANNOT_CREATE_LOG_FILE, ERROR_STREAM_EXTRA_LOG_LINES, MAX_CRASH_FRAMES, NO_FRAMES_MESSAGE,
    POSTMORTEM_HEADER, REQUESTED_BECAUSE, UNKNOWN_SYMBOL,
};
use crate::signal_safe::{write_fd, BusyGuard, FdWriter, FixedCString};
use crate::stacktrace::{capture_frames_unsynchronized, symbolic_name, write_frame_line};
use postmortem_common::unix_utils::is_being_traced;
use std::ffi::CStr;
use std::os::fd::RawFd;
use std::sync::atomic::AtomicBool;

static REPORT_BUSY: AtomicBool = AtomicBool::new(false);

/// Reports a fatal condition: marks the process as crashing, writes a report file, runs the
/// postmortem command and prints a banner to the error stream.
///
/// Reports never interleave; a second caller waits for the first to finish. Calling this again
/// from the thread that is already reporting deadlocks.
pub fn log_fatal_process_state(
    reason: Option<&CStr>,
    message: Option<&CStr>,
    extra_log_msg: Option<&CStr>,
) {
    report_process_state(true, reason, message, extra_log_msg);
}

/// Same report as [`log_fatal_process_state`] without marking the process as crashing.
pub fn log_current_process_state(
    reason: Option<&CStr>,
    message: Option<&CStr>,
    extra_log_msg: Option<&CStr>,
) {
    report_process_state(false, reason, message, extra_log_msg);
}

fn write_line(fd: RawFd, bytes: &[u8]) {
    write_fd(fd, bytes);
    write_fd(fd, b"\n");
}

fn report_process_state(
    is_fatal: bool,
    reason: Option<&CStr>,
    message: Option<&CStr>,
    extra_log_msg: Option<&CStr>,
) {
    let _busy = BusyGuard::acquire(&REPORT_BUSY);
    if is_fatal {
        set_app_is_crashing();
    }

    let installed = installed_config();
    let config = installed.config();
    let error_fd = config.error_fd();
    let program = program_name_for_errors();

    if config.trap_into_debugger() && is_being_traced().unwrap_or(false) {
        // Safety: raising and exiting have no preconditions.
        unsafe {
            libc::raise(libc::SIGTRAP);
            libc::_exit(0);
        }
    }

    // Safety: no preconditions.
    let pid = unsafe { libc::getpid() };
    let log_file = match create_unique_log_file(installed.report_dir(), program, pid) {
        Ok(file) => Some(file),
        Err(_) => {
            write_fd(error_fd, CANNOT_CREATE_LOG_FILE.as_bytes());
            None
        }
    };
    if let Some(file) = &log_file {
        write_file_header(file, reason, message, extra_log_msg);
    }

    let width = banner_width(program);
    write_title(error_fd, program, width);
    let _ = program_info().print(&mut FdWriter::new(error_fd));
    if let Some(reason) = reason {
        write_fd(error_fd, REQUESTED_BECAUSE.as_bytes());
        write_line(error_fd, reason.to_bytes());
    }
    if let Some(message) = message {
        write_line(error_fd, message.to_bytes());
    }

    let mut command_ran = false;
    match &log_file {
        Some(file) => {
            write_fd(error_fd, b"writing crash report to [ ");
            write_fd(error_fd, hostname().as_bytes());
            write_fd(error_fd, b":");
            write_fd(error_fd, file.path().to_bytes());
            write_fd(error_fd, b" ] ...");
            let helper_reason = reason.or(message).unwrap_or(c"");
            command_ran = log_process_state_to(is_fatal, file.path(), helper_reason);
            if !command_ran {
                write_in_process_trace(file.fd(), config.trace_collection());
            }
            write_fd(error_fd, b" done.\n");
        }
        None => write_in_process_trace(error_fd, config.trace_collection()),
    }

    let _ = extra_log_info().emit(&mut FdWriter::new(error_fd), ERROR_STREAM_EXTRA_LOG_LINES);
    write_rule(error_fd, width);

    if let (true, Some(file)) = (command_ran, &log_file) {
        finish_logging_fatal_stack_trace(program, file.path(), None, true);
    }
}

fn write_file_header(
    file: &LogFile,
    reason: Option<&CStr>,
    message: Option<&CStr>,
    extra_log_msg: Option<&CStr>,
) {
    if let Some(reason) = reason {
        file.write(REQUESTED_BECAUSE.as_bytes());
        write_line(file.fd(), reason.to_bytes());
    }
    if let Some(message) = message {
        write_line(file.fd(), message.to_bytes());
    }
    let _ = extra_log_info().emit(&mut FdWriter::new(file.fd()), 0);
    if let Some(extra_log_msg) = extra_log_msg {
        write_line(file.fd(), extra_log_msg.to_bytes());
    }
    file.write(POSTMORTEM_HEADER.as_bytes());
}

/// Appends the current thread's frames to `fd` when no postmortem command did it.
fn write_in_process_trace(fd: RawFd, collection: TraceCollection) {
    if collection == TraceCollection::Disabled {
        return;
    }
    let mut frames = [0usize; MAX_CRASH_FRAMES];
    // Safety: holding the report flag keeps other reports from unwinding concurrently.
    let captured = unsafe { capture_frames_unsynchronized(&mut frames, 0) };
    if captured == 0 {
        write_line(fd, NO_FRAMES_MESSAGE.as_bytes());
        return;
    }
    let mut line = FixedCString::<1024>::new();
    for (index, &address) in frames[..captured].iter().enumerate() {
        match collection {
            TraceCollection::WithInProcessSymbols => {
                let symbol = symbolic_name(address);
                write_frame_line(&mut line, index, address, symbol.as_bytes());
            }
            _ => write_frame_line(&mut line, index, address, UNKNOWN_SYMBOL.as_bytes()),
        }
        write_fd(fd, line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek};
    use std::os::fd::AsRawFd;

    #[cfg_attr(miri, ignore)]
    #[test]
    fn unsymbolized_frames_are_numbered() {
        let mut file = tempfile::tempfile().unwrap();
        write_in_process_trace(file.as_raw_fd(), TraceCollection::WithoutSymbols);
        file.rewind().unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert!(!lines.is_empty());
        assert!(lines.len() <= MAX_CRASH_FRAMES);
        assert!(lines[0].starts_with(" #0   0x"), "{}", lines[0]);
        assert!(lines.iter().all(|line| line.ends_with(" in <unknown>")));
    }

    #[test]
    fn disabled_collection_writes_nothing() {
        let mut file = tempfile::tempfile().unwrap();
        write_in_process_trace(file.as_raw_fd(), TraceCollection::Disabled);
        file.rewind().unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
