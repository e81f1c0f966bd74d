// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg(unix)]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Crash-time diagnostics for a running program.
//!
//! When something goes badly wrong, [`log_fatal_process_state`] writes a report file named
//! `st_<program>.<pid>` in the configured temporary directory, prints a banner to the error
//! stream and runs an optional postmortem command (a debugger script, an uploader) against the
//! process. Everything on that path is async-signal-safe: it neither allocates nor locks, so it
//! can run from a fault handler after the heap is already corrupted.
//!
//! The pieces:
//!
//! * [`signal_safe`]: formatting and I/O primitives the crash path is built from.
//! * stack traces: [`get_stack_frames`], [`resolve`], [`print_stack_frames`] and a replaceable
//!   symbolizer ([`set_stack_trace_callback`]).
//! * process state: [`set_program_info_for_errors`] and [`set_extra_log_info_for_errors`]
//!   register context that every report includes.
//! * external helpers: [`set_process_state_log_command`] and [`set_log_session_command`]
//!   configure the commands run on crashes and at exit, with `$pid`, `$log`, `$time`,
//!   `$reason`, `$prog` and `$stack` substituted into their arguments.
//! * crash handlers: [`register_crash_handlers`] routes fatal signals into a report.
//!
//! Call [`init`] early in `main` so that launch time and tick calibration are settled before
//! anything can crash.

mod collector;
mod postmortem;
mod process_state;
mod report;
mod shared;
pub mod signal_safe;
mod stacktrace;

#[cfg(feature = "collector")]
pub use collector::register_crash_handlers;
pub use collector::{default_signals, signal_from_signum};
pub use postmortem::{
    build_argv, enable_session_logging, finish_logging_fatal_stack_trace, invoke,
    invoke_session_logger, log_process_state_to, log_session_info, set_log_session_command,
    set_process_state_log_command, InvokeError, PreparedCommand, PreparedCommandError,
    COMMAND_PLACEHOLDER, EXEC_FAILED_STATUS,
};
pub use process_state::{
    app_elapsed_seconds, app_launch_time, extra_log_info, fatal_stack_logging,
    get_program_info_for_errors, hostname, init, installed_config, is_app_crashing,
    program_info, program_name_for_errors, set_extra_log_info_for_errors,
    set_fatal_stack_logging, set_program_info_for_errors, set_program_name_for_errors,
    update_config, ExtraLogInfo, InstalledConfig, LogLines, ProgramInfo,
};
pub use report::{
    create_unique_log_file, log_current_process_state, log_fatal_process_state,
    log_stack_trace, log_stack_trace_for, print_stack_trace, LogFile, LogFileError,
};
pub use shared::configuration::{
    CrashHandlerConfiguration, DiagnosticsConfiguration, LogCommand, TraceCollection,
};
pub use shared::constants;
pub use stacktrace::{
    capture_frames, capture_frames_unsynchronized, default_symbolic_name, demangle,
    get_stack_frames, get_stack_trace, print_stack_frames, render_addresses, render_trace,
    resolve, set_stack_trace_callback, stack_trace_callback, symbolic_name, write_frame_line,
    AddressInfo, StackTraceCallback,
};
