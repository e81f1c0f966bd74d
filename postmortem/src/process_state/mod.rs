// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! State that crash reports read back: registered program info and log lines, the program
//! name, the crash flag and the installed configuration.

mod context;
mod log_info;
mod program_info;

pub use context::{
    app_elapsed_seconds, app_launch_time, fatal_stack_logging, hostname, init, installed_config,
    is_app_crashing, program_name_for_errors, set_fatal_stack_logging,
    set_program_name_for_errors, update_config, InstalledConfig,
};
pub(crate) use context::set_app_is_crashing;
pub use log_info::{extra_log_info, set_extra_log_info_for_errors, ExtraLogInfo, LogLines};
pub use program_info::{
    get_program_info_for_errors, program_info, set_program_info_for_errors, ProgramInfo,
};
