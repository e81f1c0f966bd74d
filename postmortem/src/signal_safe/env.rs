// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::cstr::{cstr_eq_prefix, cstr_len};
use libc::c_char;
use std::ffi::CStr;

/// Finds `name` in a null-terminated `NAME=value` block and returns the value.
///
/// # Safety
/// `env` is null or a null-terminated array of C strings that stay alive for `'a`.
pub unsafe fn lookup_env<'a>(env: *const *const c_char, name: &CStr) -> Option<&'a CStr> {
    if env.is_null() {
        return None;
    }
    let name_len = cstr_len(name.as_ptr());
    let mut entry = env;
    while !(*entry).is_null() {
        let var = *entry;
        if cstr_eq_prefix(var, name.as_ptr(), name_len) && *var.add(name_len) == b'=' as c_char {
            return Some(CStr::from_ptr(var.add(name_len + 1)));
        }
        entry = entry.add(1);
    }
    None
}

/// Reads an environment variable without taking the libc environment lock.
pub fn getenv(name: &CStr) -> Option<&'static CStr> {
    // Safety: the process environment is null terminated. Entries may be replaced by a
    // concurrent setenv, which crash reporting accepts.
    unsafe { lookup_env(postmortem_common::unix_utils::environ(), name) }
}
