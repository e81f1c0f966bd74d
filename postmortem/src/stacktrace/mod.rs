// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Capturing return addresses and turning them into readable frames.

mod render;
mod symbolize;
mod unwind;

pub use render::{
    get_stack_trace, print_stack_frames, render_addresses, render_trace, write_frame_line,
};
pub use symbolize::{
    default_symbolic_name, demangle, resolve, set_stack_trace_callback, stack_trace_callback,
    symbolic_name, AddressInfo, StackTraceCallback,
};
pub use unwind::{capture_frames, capture_frames_unsynchronized, get_stack_frames};
