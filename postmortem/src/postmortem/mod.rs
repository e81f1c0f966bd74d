// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Running external helpers: the postmortem command that dumps this process' state, and the
//! session logger that records how a session ended.

mod argv;
mod command;
mod helper;
mod invoke;
mod session;

pub use argv::{build_argv, COMMAND_PLACEHOLDER};
pub use command::{
    set_log_session_command, set_process_state_log_command, PreparedCommand,
    PreparedCommandError,
};
pub use helper::log_process_state_to;
pub use invoke::{invoke, InvokeError, EXEC_FAILED_STATUS};
pub use session::{
    enable_session_logging, finish_logging_fatal_stack_trace, invoke_session_logger,
    log_session_info,
};
