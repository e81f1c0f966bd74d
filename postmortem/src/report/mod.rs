// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Crash reports: the exclusive report file, the error stream banner, and the non-crash stack
//! logs written to ordinary temporary files.

mod banner;
mod log_file;
mod process_report;
mod stack_log;

pub use log_file::{create_unique_log_file, LogFile, LogFileError};
pub use process_report::{log_current_process_state, log_fatal_process_state};
pub use stack_log::{log_stack_trace, log_stack_trace_for, print_stack_trace};
