// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::shared::constants;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How a report obtains the stack of the failing process.
///
/// Walking the stack of a process that is crashing can itself crash when the stack is corrupt.
/// The cheaper modes exist so that a deployment can downgrade collection without a rebuild.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceCollection {
    Disabled,
    /// Raw return addresses only. Safe inside a signal handler.
    #[default]
    WithoutSymbols,
    /// Symbolizes in the failing process. Symbolization allocates.
    WithInProcessSymbols,
    /// Leaves the stack to the configured postmortem command, which attaches to the process
    /// from outside. Falls back to raw addresses when no command is configured.
    ExternalHelper,
}

/// An external command together with its argument templates.
///
/// Templates are expanded right before the command runs. `$cmd` becomes the command path and
/// placeholders such as `$pid` or `$log` become per-invocation values, see the invoking module
/// for the full list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LogCommand {
    pub command: String,
    /// Used for on-demand invocations.
    pub argv: Vec<String>,
    /// Used when the process is going down.
    pub crash_argv: Vec<String>,
}

impl LogCommand {
    pub fn new(command: String, argv: Vec<String>, crash_argv: Vec<String>) -> anyhow::Result<Self> {
        anyhow::ensure!(!command.is_empty(), "A log command needs a path");
        for (name, template) in [("argv", &argv), ("crash_argv", &crash_argv)] {
            anyhow::ensure!(
                !template.is_empty(),
                "The {name} template of {command} is empty"
            );
            anyhow::ensure!(
                template.len() < constants::MAX_ARGS,
                "The {name} template of {command} has {} entries, at most {} are supported",
                template.len(),
                constants::MAX_ARGS - 1
            );
        }
        Ok(Self {
            command,
            argv,
            crash_argv,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfiguration {
    // Descriptor the banner is written to
    error_fd: i32,
    fatal_timeout: Duration,
    postmortem_env_var: String,
    session_env_var: String,
    session_timeout: Duration,
    // Directory for report files, the system temporary directory when unset
    tmp_dir: Option<PathBuf>,
    trace_collection: TraceCollection,
    trap_into_debugger: bool,
}

impl Default for DiagnosticsConfiguration {
    fn default() -> Self {
        Self {
            error_fd: constants::DEFAULT_ERROR_FD,
            fatal_timeout: constants::DEFAULT_FATAL_TIMEOUT,
            postmortem_env_var: constants::DEFAULT_POSTMORTEM_ENV_VAR.to_string(),
            session_env_var: constants::DEFAULT_SESSION_ENV_VAR.to_string(),
            session_timeout: constants::DEFAULT_SESSION_TIMEOUT,
            tmp_dir: None,
            trace_collection: TraceCollection::default(),
            trap_into_debugger: true,
        }
    }
}

fn ensure_env_var_name(name: &str) -> anyhow::Result<()> {
    anyhow::ensure!(
        !name.is_empty() && !name.contains(['=', '\0']),
        "Invalid environment variable name {name:?}"
    );
    Ok(())
}

fn ensure_whole_seconds(what: &str, timeout: Duration) -> anyhow::Result<()> {
    anyhow::ensure!(
        timeout.as_secs() >= 1 && timeout.as_secs() <= u32::MAX as u64,
        "The {what} timeout must be between one second and {} seconds, got {timeout:?}",
        u32::MAX
    );
    Ok(())
}

impl DiagnosticsConfiguration {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        error_fd: i32,
        fatal_timeout: Option<Duration>,
        postmortem_env_var: Option<String>,
        session_env_var: Option<String>,
        session_timeout: Option<Duration>,
        tmp_dir: Option<PathBuf>,
        trace_collection: TraceCollection,
        trap_into_debugger: bool,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(error_fd >= 0, "Invalid error descriptor {error_fd}");
        let fatal_timeout = fatal_timeout.unwrap_or(constants::DEFAULT_FATAL_TIMEOUT);
        ensure_whole_seconds("postmortem", fatal_timeout)?;
        let session_timeout = session_timeout.unwrap_or(constants::DEFAULT_SESSION_TIMEOUT);
        ensure_whole_seconds("session logging", session_timeout)?;

        let postmortem_env_var = postmortem_env_var
            .unwrap_or_else(|| constants::DEFAULT_POSTMORTEM_ENV_VAR.to_string());
        ensure_env_var_name(&postmortem_env_var)?;
        let session_env_var =
            session_env_var.unwrap_or_else(|| constants::DEFAULT_SESSION_ENV_VAR.to_string());
        ensure_env_var_name(&session_env_var)?;

        if let Some(dir) = &tmp_dir {
            anyhow::ensure!(
                !dir.as_os_str().is_empty()
                    && !std::os::unix::ffi::OsStrExt::as_bytes(dir.as_os_str()).contains(&0),
                "Invalid report directory {dir:?}"
            );
        }

        Ok(Self {
            error_fd,
            fatal_timeout,
            postmortem_env_var,
            session_env_var,
            session_timeout,
            tmp_dir,
            trace_collection,
            trap_into_debugger,
        })
    }

    pub fn error_fd(&self) -> i32 {
        self.error_fd
    }

    pub fn fatal_timeout(&self) -> Duration {
        self.fatal_timeout
    }

    pub fn postmortem_env_var(&self) -> &str {
        &self.postmortem_env_var
    }

    pub fn session_env_var(&self) -> &str {
        &self.session_env_var
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    pub fn tmp_dir(&self) -> &Option<PathBuf> {
        &self.tmp_dir
    }

    /// The configured directory, or the system temporary directory.
    pub fn report_dir(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn trace_collection(&self) -> TraceCollection {
        self.trace_collection
    }

    pub fn trap_into_debugger(&self) -> bool {
        self.trap_into_debugger
    }

    pub fn set_error_fd(&mut self, error_fd: i32) -> anyhow::Result<()> {
        anyhow::ensure!(error_fd >= 0, "Invalid error descriptor {error_fd}");
        self.error_fd = error_fd;
        Ok(())
    }

    pub fn set_trace_collection(&mut self, trace_collection: TraceCollection) {
        self.trace_collection = trace_collection;
    }

    pub fn set_trap_into_debugger(&mut self, trap_into_debugger: bool) {
        self.trap_into_debugger = trap_into_debugger;
    }
}

/// Which signals become crash reports, and on which stack the handler runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashHandlerConfiguration {
    create_alt_stack: bool,
    signals: Vec<i32>,
    use_alt_stack: bool,
}

impl CrashHandlerConfiguration {
    pub fn new(
        create_alt_stack: bool,
        use_alt_stack: bool,
        mut signals: Vec<i32>,
    ) -> anyhow::Result<Self> {
        // Requesting to create, but not use, the altstack is considered paradoxical.
        anyhow::ensure!(
            !create_alt_stack || use_alt_stack,
            "Cannot create an altstack without using it"
        );
        if signals.is_empty() {
            signals = crate::default_signals();
        } else {
            let before_len = signals.len();
            signals.sort();
            signals.dedup();
            anyhow::ensure!(
                before_len == signals.len(),
                "Signals contained duplicate elements"
            );
            signals
                .iter()
                .try_for_each(|x| crate::signal_from_signum(*x).map(|_| ()))?;
        }
        Ok(Self {
            create_alt_stack,
            signals,
            use_alt_stack,
        })
    }

    pub fn create_alt_stack(&self) -> bool {
        self.create_alt_stack
    }

    pub fn use_alt_stack(&self) -> bool {
        self.use_alt_stack
    }

    pub fn signals(&self) -> &Vec<i32> {
        &self.signals
    }
}
