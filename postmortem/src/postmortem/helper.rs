// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::argv::build_argv;
use super::command::process_state_log_command;
use super::invoke::invoke;
use crate::process_state::{app_elapsed_seconds, installed_config};
use crate::shared::constants::MAX_ARGS;
use crate::signal_safe::{getenv, write_fd, FixedCString, NUMERIC_BUFFER_SIZE};
use std::ffi::CStr;
use std::ptr;

/// Runs the process state command against this process, letting it append to `log_path`.
///
/// The command path comes from the configured environment variable when set, otherwise from
/// the stored command. Returns whether the command ran; false when none is configured or its
/// arguments do not fit. Async-signal-safe.
pub fn log_process_state_to(is_fatal: bool, log_path: &CStr, reason: &CStr) -> bool {
    let Some(stored) = process_state_log_command() else {
        return false;
    };
    let installed = installed_config();
    let command = getenv(installed.postmortem_env_var())
        .filter(|command| !command.is_empty())
        .unwrap_or(stored.command());

    let mut pid = FixedCString::<NUMERIC_BUFFER_SIZE>::new();
    // Safety: no preconditions.
    pid.push_decimal(i64::from(unsafe { libc::getpid() }));
    let mut time = FixedCString::<NUMERIC_BUFFER_SIZE>::new();
    time.push_decimal(app_elapsed_seconds());
    let substitutions = [
        (c"$pid", pid.as_cstr()),
        (c"$log", log_path),
        (c"$time", time.as_cstr()),
        (c"$reason", reason),
    ];

    let mut argv = [ptr::null(); MAX_ARGS];
    if !build_argv(&mut argv, command, stored.template(is_fatal), &substitutions) {
        write_fd(
            installed.config().error_fd(),
            b"Too many arguments to postmortem command\n",
        );
        return false;
    }
    // Safety: a successful build leaves a string in the first slot.
    let path = unsafe { CStr::from_ptr(argv[0]) };
    let timeout = installed.config().fatal_timeout().as_secs() as u32;
    invoke(path, &argv, timeout, None);
    true
}
