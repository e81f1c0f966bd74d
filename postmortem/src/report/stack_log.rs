// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::log_file::create_unique_log_file;
use crate::postmortem::{finish_logging_fatal_stack_trace, log_process_state_to};
use crate::process_state::{
    extra_log_info, hostname, installed_config, program_info, program_name_for_errors,
};
use crate::shared::configuration::TraceCollection;
use crate::shared::constants::{
    LOG_STACK_TRACE_REASON, MAX_STACK_DEPTH, STACK_LOG_RULE, STACK_TRACE_FILE_PREFIX,
    STACK_TRACE_RULE,
};
use crate::signal_safe::FdWriter;
use crate::stacktrace::{get_stack_frames, render_addresses, render_trace};
use std::ffi::{CString, OsStr};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes the calling thread's stack to a temporary file under the program's own name and
/// tells the error stream where it went. See [`log_stack_trace_for`].
pub fn log_stack_trace(reason: &str, fatal: bool, session_log: Option<&Path>) {
    let program = program_name_for_errors().to_string_lossy().into_owned();
    log_stack_trace_for(&program, reason, fatal, session_log);
}

/// Writes the calling thread's stack to a temporary file and tells the error stream where it
/// went. Not for use in a signal handler.
///
/// A fatal trace also gets the extra log info, then the session log is appended and the
/// session logger runs if fatal stack logging is on. If no file can be created, everything
/// goes to the error stream instead.
pub fn log_stack_trace_for(program: &str, reason: &str, fatal: bool, session_log: Option<&Path>) {
    let installed = installed_config();
    let mut err = FdWriter::new(installed.config().error_fd());
    let _ = writeln!(
        err,
        "{STACK_LOG_RULE}A stack trace has been requested by {program} because of {reason}"
    );
    let _ = program_info().print(&mut err);

    match create_stack_file(&installed.config().report_dir()) {
        Ok((mut out, path)) => {
            let _ = write!(
                err,
                "The stack can be found in {}:{}\n{STACK_LOG_RULE}",
                String::from_utf8_lossy(hostname().as_bytes()),
                path.display()
            );
            if let Err(error) = write_stack_file(&mut out, program, reason, fatal) {
                warn!(%error, path = %path.display(), "Unable to write the stack trace");
            }
            drop(out);
            if fatal {
                match (
                    CString::new(program),
                    CString::new(path.as_os_str().as_bytes()),
                ) {
                    (Ok(program), Ok(path)) => {
                        finish_logging_fatal_stack_trace(&program, &path, session_log, false)
                    }
                    _ => warn!("Stack trace path or program name contains a NUL byte"),
                }
            }
        }
        Err(error) => {
            debug!(%error, "Unable to create a stack trace file, using the error stream");
            let _ = err.write_all(STACK_LOG_RULE.as_bytes());
            let _ = print_stack_trace(&mut err, program, reason);
            let _ = extra_log_info().emit(&mut err, 0);
        }
    }
    let _ = err.write_all(STACK_LOG_RULE.as_bytes());
}

fn create_stack_file(dir: &Path) -> io::Result<(File, PathBuf)> {
    let prefix = format!(
        "{STACK_TRACE_FILE_PREFIX}_{}",
        program_name_for_errors().to_string_lossy()
    );
    tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(dir)?
        .keep()
        .map_err(|err| err.error)
}

fn write_stack_file(out: &mut File, program: &str, reason: &str, fatal: bool) -> io::Result<()> {
    print_stack_trace(out, program, reason)?;
    if fatal {
        extra_log_info().emit(out, 0)?;
    }
    out.flush()
}

/// Prints the calling thread's stack between two rules, introduced by who asked and why.
///
/// Frames are gathered according to the configured trace collection mode. In external helper
/// mode the postmortem command captures them, falling back to in-process symbols when no
/// command is configured.
pub fn print_stack_trace<W: Write>(w: &mut W, program: &str, reason: &str) -> io::Result<()> {
    write_stack_trace(w, program, reason, MAX_STACK_DEPTH)
}

fn write_stack_trace<W: Write>(
    w: &mut W,
    program: &str,
    reason: &str,
    max_depth: usize,
) -> io::Result<()> {
    w.write_all(STACK_TRACE_RULE.as_bytes())?;
    writeln!(
        w,
        " A stack trace has been requested by {program} because: {reason}"
    )?;
    let lines = match installed_config().config().trace_collection() {
        TraceCollection::Disabled => Vec::new(),
        TraceCollection::WithoutSymbols => render_addresses(&get_stack_frames(max_depth)),
        TraceCollection::WithInProcessSymbols => render_trace(&get_stack_frames(max_depth), false),
        TraceCollection::ExternalHelper => helper_trace_lines(max_depth)
            .unwrap_or_else(|| render_trace(&get_stack_frames(max_depth), false)),
    };
    for line in lines {
        writeln!(w, "{line}")?;
    }
    w.write_all(STACK_TRACE_RULE.as_bytes())?;
    w.flush()
}

/// Lets the postmortem command write this process' stack to a scratch report, then reads up to
/// `max_lines` lines back and removes the file. `None` if the command did not run.
fn helper_trace_lines(max_lines: usize) -> Option<Vec<String>> {
    let installed = installed_config();
    // Safety: no preconditions.
    let pid = unsafe { libc::getpid() };
    let file = match create_unique_log_file(installed.report_dir(), program_name_for_errors(), pid)
    {
        Ok(file) => file,
        Err(error) => {
            debug!(%error, "Unable to create a scratch report for the postmortem command");
            return None;
        }
    };
    let path = PathBuf::from(OsStr::from_bytes(file.path().to_bytes()));
    let ran = log_process_state_to(false, file.path(), LOG_STACK_TRACE_REASON);
    drop(file);

    let lines = if ran {
        read_trace_lines(&path, max_lines).ok()
    } else {
        None
    };
    if let Err(error) = std::fs::remove_file(&path) {
        debug!(%error, path = %path.display(), "Unable to remove the scratch report");
    }
    lines
}

fn read_trace_lines(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    BufReader::new(File::open(path)?)
        .lines()
        .take(max_lines)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_read_back_stops_at_the_line_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..10 {
            writeln!(file, " #{i} frame").unwrap();
        }
        file.flush().unwrap();

        let lines = read_trace_lines(file.path(), 4).unwrap();
        assert_eq!(lines, vec![" #0 frame", " #1 frame", " #2 frame", " #3 frame"]);
        assert_eq!(read_trace_lines(file.path(), 100).unwrap().len(), 10);
        assert!(read_trace_lines(file.path(), 0).unwrap().is_empty());
    }

    #[test]
    fn missing_scratch_reports_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_trace_lines(&dir.path().join("gone"), 4).is_err());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn printed_traces_sit_between_rules() {
        let mut out = Vec::new();
        print_stack_trace(&mut out, "tool", "testing").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], STACK_TRACE_RULE.trim_end());
        assert_eq!(
            lines[1],
            " A stack trace has been requested by tool because: testing"
        );
        assert_eq!(lines[lines.len() - 1], STACK_TRACE_RULE.trim_end());
        assert!(lines[2..lines.len() - 1]
            .iter()
            .all(|line| line.starts_with(" #")));
    }
}
