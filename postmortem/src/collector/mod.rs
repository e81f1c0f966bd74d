// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#[cfg(feature = "collector")]
mod signal_handler_manager;

#[cfg(feature = "collector")]
pub use signal_handler_manager::register_crash_handlers;

use nix::sys::signal::Signal;

/// The signals that become crash reports unless the configuration names others.
pub fn default_signals() -> Vec<libc::c_int> {
    vec![
        libc::SIGSEGV,
        libc::SIGBUS,
        libc::SIGILL,
        libc::SIGFPE,
        libc::SIGABRT,
    ]
}

/// Converts a signal number into a [`Signal`].
pub fn signal_from_signum(value: libc::c_int) -> anyhow::Result<Signal> {
    Ok(Signal::try_from(value)?)
}
