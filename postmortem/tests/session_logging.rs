// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(unix)]

use postmortem::constants::SESSION_LOG_HEADER;
use postmortem::{
    log_session_info, log_stack_trace_for, set_fatal_stack_logging, set_log_session_command,
    update_config, DiagnosticsConfiguration, LogCommand, TraceCollection,
};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::Mutex;

// Both tests install process-wide commands.
static SERIAL: Mutex<()> = Mutex::new(());

fn install_config(dir: &Path, error_fd: i32) {
    update_config(
        DiagnosticsConfiguration::new(
            error_fd,
            None,
            None,
            Some("PM_SESSION_TEST_LOGGER".to_string()),
            None,
            Some(dir.to_path_buf()),
            TraceCollection::WithoutSymbols,
            false,
        )
        .unwrap(),
    )
    .unwrap();
}

fn shell_template(script: &str, args: &[&str]) -> Vec<String> {
    ["$cmd", "-c", script, "sh"]
        .iter()
        .chain(args)
        .map(|s| s.to_string())
        .collect()
}

#[cfg_attr(miri, ignore)]
#[test]
fn fatal_stack_logs_append_the_session_and_run_the_logger() {
    let _serial = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let errors = tempfile::tempfile().unwrap();
    install_config(dir.path(), errors.as_raw_fd());

    let session_log = dir.path().join("session.log");
    std::fs::write(&session_log, "> opened a file\n").unwrap();
    let logger_output = dir.path().join("logger.out");
    let logger = logger_output.to_string_lossy().into_owned();
    let script = "printf '%s %s\\n' \"$1\" \"$2\" > \"$3\"";
    set_log_session_command(Some(
        LogCommand::new(
            "/bin/sh".to_string(),
            shell_template(script, &["$prog", "none", &logger]),
            shell_template(script, &["$prog", "$stack", &logger]),
        )
        .unwrap(),
    ))
    .unwrap();
    set_fatal_stack_logging(true);

    log_stack_trace_for("session_test", "fatal problem", true, Some(&session_log));
    set_fatal_stack_logging(false);
    set_log_session_command(None).unwrap();

    let logged = std::fs::read_to_string(&logger_output).unwrap();
    let (program, stack) = logged.trim_end().split_once(' ').unwrap();
    assert_eq!(program, "session_test");
    let trace = std::fs::read_to_string(stack).unwrap();
    assert!(trace.contains(" A stack trace has been requested by session_test because: fatal problem\n"));
    assert!(trace.ends_with(&format!("{SESSION_LOG_HEADER}> opened a file\n")), "{trace}");
}

#[cfg_attr(miri, ignore)]
#[test]
fn session_info_is_only_logged_with_fatal_stack_logging() {
    let _serial = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let errors = tempfile::tempfile().unwrap();
    install_config(dir.path(), errors.as_raw_fd());

    let logger_output = dir.path().join("session.out");
    let logger = logger_output.to_string_lossy().into_owned();
    let script = "printf '%s\\n' \"$1\" >> \"$2\"";
    set_log_session_command(Some(
        LogCommand::new(
            "/bin/sh".to_string(),
            shell_template(script, &["$prog", &logger]),
            shell_template(script, &["$stack", &logger]),
        )
        .unwrap(),
    ))
    .unwrap();

    set_fatal_stack_logging(false);
    log_session_info(None);
    assert!(!logger_output.exists());

    set_fatal_stack_logging(true);
    log_session_info(None);
    set_fatal_stack_logging(false);
    set_log_session_command(None).unwrap();

    assert!(std::fs::read_to_string(&logger_output)
        .unwrap()
        .ends_with('\n'));
}
