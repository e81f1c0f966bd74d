// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::configuration::LogCommand;
use std::ffi::{CStr, CString, NulError};
use std::ptr;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::AtomicPtr;

/// A [`LogCommand`] converted ahead of time into the C strings an exec needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    command: CString,
    argv: Vec<CString>,
    crash_argv: Vec<CString>,
}

#[derive(Debug, thiserror::Error)]
pub enum PreparedCommandError {
    #[error("Failed to convert command path to CString: {0}")]
    CommandPathError(NulError),
    #[error("Failed to convert argument to CString: {0}")]
    ArgumentError(NulError),
}

fn to_cstrings(template: &[String]) -> Result<Vec<CString>, PreparedCommandError> {
    template
        .iter()
        .map(|s| CString::new(s.as_str()))
        .collect::<Result<Vec<CString>, NulError>>()
        .map_err(PreparedCommandError::ArgumentError)
}

impl PreparedCommand {
    pub fn new(command: &LogCommand) -> Result<Self, PreparedCommandError> {
        Ok(Self {
            command: CString::new(command.command.as_str())
                .map_err(PreparedCommandError::CommandPathError)?,
            argv: to_cstrings(&command.argv)?,
            crash_argv: to_cstrings(&command.crash_argv)?,
        })
    }

    pub fn command(&self) -> &CStr {
        &self.command
    }

    /// The crash template while the process is going down, the regular one otherwise.
    pub fn template(&self, crashing: bool) -> &[CString] {
        if crashing {
            &self.crash_argv
        } else {
            &self.argv
        }
    }
}

static POSTMORTEM_COMMAND: AtomicPtr<PreparedCommand> = AtomicPtr::new(ptr::null_mut());
static SESSION_LOG_COMMAND: AtomicPtr<PreparedCommand> = AtomicPtr::new(ptr::null_mut());

fn store(slot: &AtomicPtr<PreparedCommand>, command: Option<&LogCommand>) -> anyhow::Result<()> {
    let prepared = match command {
        Some(command) => Box::into_raw(Box::new(PreparedCommand::new(command)?)),
        None => ptr::null_mut(),
    };
    // A report may be reading the previous command, so it is leaked rather than freed.
    slot.swap(prepared, SeqCst);
    Ok(())
}

fn load(slot: &AtomicPtr<PreparedCommand>) -> Option<&'static PreparedCommand> {
    let command = slot.load(SeqCst);
    // Safety: stored commands are leaked, so a non-null pointer stays valid.
    (!command.is_null()).then(|| unsafe { &*command })
}

/// Sets the command that writes the state of this process into a report: typically a
/// debugger attaching to `$pid` and appending to `$log`. `None` removes it.
///
/// Placeholders: `$cmd`, `$pid`, `$log`, `$time` (seconds of CPU time used), `$reason`.
pub fn set_process_state_log_command(command: Option<LogCommand>) -> anyhow::Result<()> {
    store(&POSTMORTEM_COMMAND, command.as_ref())
}

/// Sets the command that records the end of a session. `None` removes it.
///
/// Placeholders: `$cmd`, `$pid`, `$time`, `$prog`, `$stack` (path of the crash report, only
/// meaningful in the crash template).
pub fn set_log_session_command(command: Option<LogCommand>) -> anyhow::Result<()> {
    store(&SESSION_LOG_COMMAND, command.as_ref())
}

pub(crate) fn process_state_log_command() -> Option<&'static PreparedCommand> {
    load(&POSTMORTEM_COMMAND)
}

pub(crate) fn session_log_command() -> Option<&'static PreparedCommand> {
    load(&SESSION_LOG_COMMAND)
}
