// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libc::c_char;

/// Length of a C string, zero for a null pointer.
///
/// # Safety
/// `s` is null or points to a NUL-terminated string.
pub unsafe fn cstr_len(s: *const c_char) -> usize {
    if s.is_null() {
        return 0;
    }
    let mut len = 0;
    while *s.add(len) != 0 {
        len += 1;
    }
    len
}

/// Equality of two C strings. Two null pointers are equal, null never equals a string.
///
/// # Safety
/// Each pointer is null or points to a NUL-terminated string.
pub unsafe fn cstr_eq(a: *const c_char, b: *const c_char) -> bool {
    if a.is_null() || b.is_null() {
        return a == b;
    }
    let mut i = 0;
    loop {
        let (x, y) = (*a.add(i), *b.add(i));
        if x != y {
            return false;
        }
        if x == 0 {
            return true;
        }
        i += 1;
    }
}

/// Like [`cstr_eq`], comparing at most `n` characters.
///
/// # Safety
/// Each pointer is null or points to a NUL-terminated string.
pub unsafe fn cstr_eq_prefix(a: *const c_char, b: *const c_char, n: usize) -> bool {
    if a.is_null() || b.is_null() {
        return a == b;
    }
    for i in 0..n {
        let (x, y) = (*a.add(i), *b.add(i));
        if x != y {
            return false;
        }
        if x == 0 {
            return true;
        }
    }
    true
}

/// Copies `src` into `dst` at `at`, then a NUL.
///
/// Returns the index of the written NUL so copies can be chained, or `None` (writing nothing)
/// when `dst` cannot hold the bytes and the terminator.
pub fn copy_bytes(dst: &mut [u8], at: usize, src: &[u8]) -> Option<usize> {
    let end = at.checked_add(src.len())?;
    if end >= dst.len() {
        return None;
    }
    dst[at..end].copy_from_slice(src);
    dst[end] = 0;
    Some(end)
}
