// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process primitives that stay usable from a signal handler: they make raw system calls, never
//! run atfork handlers, and never allocate.

mod environ;
mod errors;
mod execve;
mod fork;
mod process;

pub use environ::environ;
pub use errors::ReapError;
pub use execve::raw_execv;
pub use fork::{alt_fork, is_being_traced};
pub use process::{reap_child_non_blocking, terminate};
