// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::constants::{HALT_MESSAGE, MIN_BANNER_WIDTH};
use crate::signal_safe::write_fd;
use std::ffi::CStr;
use std::os::fd::RawFd;

const DASHES: &[u8; 64] = b"----------------------------------------------------------------";

fn label_len(program: &CStr) -> usize {
    program.to_bytes().len() + HALT_MESSAGE.len()
}

/// Width of the error stream banner: room for `-- <program> terminated --`, never under 80.
pub fn banner_width(program: &CStr) -> usize {
    MIN_BANNER_WIDTH.max(label_len(program) + 6)
}

pub fn write_dashes(fd: RawFd, count: usize) {
    let mut remaining = count;
    while remaining > 0 {
        let chunk = remaining.min(DASHES.len());
        write_fd(fd, &DASHES[..chunk]);
        remaining -= chunk;
    }
}

/// Writes an empty line, then `<program> terminated` centered in dashes across `width`.
pub fn write_title(fd: RawFd, program: &CStr, width: usize) {
    let label = label_len(program);
    let leading = (width.saturating_sub(label) / 2).saturating_sub(1);
    let trailing = width.saturating_sub(leading + label + 2);
    write_fd(fd, b"\n");
    write_dashes(fd, leading);
    write_fd(fd, b" ");
    write_fd(fd, program.to_bytes());
    write_fd(fd, HALT_MESSAGE.as_bytes());
    write_fd(fd, b" ");
    write_dashes(fd, trailing);
    write_fd(fd, b"\n");
}

/// A full-width line of dashes.
pub fn write_rule(fd: RawFd, width: usize) {
    write_dashes(fd, width);
    write_fd(fd, b"\n");
}
