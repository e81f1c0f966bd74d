// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::ffi::CStr;
use std::time::Duration;

pub const DEFAULT_PROGRAM_NAME: &CStr = c"postmortem";
pub const DEFAULT_POSTMORTEM_ENV_VAR: &str = "PM_POSTMORTEM";
pub const DEFAULT_SESSION_ENV_VAR: &str = "PM_LOGSESSION";
pub const DEFAULT_ERROR_FD: i32 = libc::STDERR_FILENO;
pub const DEFAULT_FATAL_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Prefix of every report file name: `st_<program>.<pid>`.
pub const STACK_TRACE_FILE_PREFIX: &str = "st";

/// Argument vectors, terminating null included.
pub const MAX_ARGS: usize = 32;
pub const MAX_STACK_DEPTH: usize = 4096;
/// Frames captured on the stack when no allocation is allowed.
pub const MAX_CRASH_FRAMES: usize = 128;
pub const PATH_CAPACITY: usize = 1024;
pub const HOST_NAME_CAPACITY: usize = 256;
pub const MESSAGE_CAPACITY: usize = 1024;

pub const MIN_BANNER_WIDTH: usize = 80;
/// Extra log lines echoed to the error stream; the report file gets all of them.
pub const ERROR_STREAM_EXTRA_LOG_LINES: usize = 3;

pub const UNKNOWN_SYMBOL: &str = "<unknown>";
pub const NO_FRAMES_MESSAGE: &str =
    "No frames saved, stack traces probably not supported on this architecture.";
pub const TRUNCATION_NOTICE: &str = "... see full diagnostics in crash report.\n";
pub const REQUESTED_BECAUSE: &str = "This stack trace was requested because: ";
pub const CANNOT_CREATE_LOG_FILE: &str = "Cannot create a log file\n";
pub const HALT_MESSAGE: &str = " terminated";
/// Reason handed to the postmortem command when it only captures this process' stack.
pub const LOG_STACK_TRACE_REASON: &CStr = c"Log Stack Trace";
pub const POSTMORTEM_HEADER: &str = "\nPostmortem Stack Trace\n";
pub const SESSION_LOG_HEADER: &str = "\n\n********** Session Log **********\n\n";
pub const STACK_LOG_RULE: &str =
    "--------------------------------------------------------------\n";
pub const STACK_TRACE_RULE: &str =
    "==============================================================\n";
