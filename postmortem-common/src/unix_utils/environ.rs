// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libc::c_char;

#[cfg(not(target_os = "macos"))]
extern "C" {
    #[link_name = "environ"]
    static C_ENVIRON: *const *const c_char;
}

/// The process environment block, a null-terminated array of `NAME=value` strings.
///
/// Reading the block races with `setenv` on other threads; callers on a crash path accept that.
#[cfg(not(target_os = "macos"))]
pub fn environ() -> *const *const c_char {
    // Safety: `environ` is initialized by the C runtime before `main`.
    unsafe { C_ENVIRON }
}

#[cfg(target_os = "macos")]
pub fn environ() -> *const *const c_char {
    extern "C" {
        fn _NSGetEnviron() -> *mut *const *const c_char;
    }
    // Safety: `_NSGetEnviron` always returns a valid pointer to the environment pointer.
    unsafe { *_NSGetEnviron() }
}
