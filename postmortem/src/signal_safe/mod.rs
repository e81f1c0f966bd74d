// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Primitives that are safe to call from a signal handler.
//!
//! Nothing in here allocates, takes a lock, consults the locale, or touches `errno` visibly.
//! The crash path builds every string it writes out of these pieces.

mod busy;
mod cstr;
mod decimal;
mod env;
mod fd;
mod fixed;

pub use busy::BusyGuard;
pub use cstr::{copy_bytes, cstr_eq, cstr_eq_prefix, cstr_len};
pub use decimal::{digit_count, write_decimal, write_hex, NUMERIC_BUFFER_SIZE};
pub use env::{getenv, lookup_env};
pub use fd::{write_fd, FdWriter};
pub use fixed::FixedCString;
