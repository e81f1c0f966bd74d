// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::decimal::{write_decimal, write_hex, NUMERIC_BUFFER_SIZE};
use libc::c_char;
use std::ffi::CStr;

/// A C string assembled on the stack.
///
/// Appends that do not fit are cut short and the string remembers that it was truncated.
/// Interior NULs end an append, so the contents are always a valid C string.
#[derive(Clone)]
pub struct FixedCString<const N: usize> {
    buf: [u8; N],
    len: usize,
    truncated: bool,
}

impl<const N: usize> Default for FixedCString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FixedCString<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
            truncated: false,
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        // One byte stays reserved for the terminator.
        let capacity = N.saturating_sub(1);
        for &byte in bytes {
            if byte == 0 {
                break;
            }
            if self.len >= capacity {
                self.truncated = true;
                break;
            }
            self.buf[self.len] = byte;
            self.len += 1;
        }
        if self.len < N {
            self.buf[self.len] = 0;
        }
        self
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.push_bytes(s.as_bytes())
    }

    pub fn push_cstr(&mut self, s: &CStr) -> &mut Self {
        self.push_bytes(s.to_bytes())
    }

    pub fn push_decimal(&mut self, x: i64) -> &mut Self {
        let mut digits = [0u8; NUMERIC_BUFFER_SIZE];
        match write_decimal(&mut digits, x) {
            Some(len) => self.push_bytes(&digits[..len]),
            None => self,
        }
    }

    /// Lowercase hex without a prefix, zero padded to `min_width`.
    pub fn push_hex(&mut self, x: u64, min_width: usize) -> &mut Self {
        let mut digits = [0u8; 32];
        match write_hex(&mut digits, x, min_width.min(31)) {
            Some(len) => self.push_bytes(&digits[..len]),
            None => self,
        }
    }

    /// Pads with spaces up to `width` characters.
    pub fn pad_to(&mut self, width: usize) -> &mut Self {
        while self.len < width && !self.truncated {
            self.push_bytes(b" ");
        }
        self
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.truncated = false;
        if N > 0 {
            self.buf[0] = 0;
        }
    }

    /// Drops everything after the first `len` bytes. Clears the truncation mark.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
            self.buf[len] = 0;
        }
        self.truncated = false;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_cstr(&self) -> &CStr {
        CStr::from_bytes_until_nul(&self.buf).unwrap_or(c"")
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.as_cstr().as_ptr()
    }
}

impl<const N: usize> std::fmt::Debug for FixedCString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedCString")
            .field("value", &self.as_cstr())
            .field("truncated", &self.truncated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_path() {
        let mut path = FixedCString::<64>::new();
        path.push_str("/tmp")
            .push_bytes(b"/st_")
            .push_str("prog")
            .push_bytes(b".")
            .push_decimal(4242)
            .push_bytes(b".")
            .push_decimal(1);
        assert_eq!(path.as_cstr(), c"/tmp/st_prog.4242.1");
        assert_eq!(path.len(), 19);
        assert!(!path.is_truncated());
    }

    #[test]
    fn overflow_truncates() {
        let mut s = FixedCString::<8>::new();
        s.push_str("abcdefghij");
        assert_eq!(s.as_bytes(), b"abcdefg");
        assert_eq!(s.as_cstr(), c"abcdefg");
        assert!(s.is_truncated());

        s.clear();
        assert!(s.is_empty());
        assert!(!s.is_truncated());
        assert_eq!(s.as_cstr(), c"");
    }

    #[test]
    fn interior_nul_ends_the_append() {
        let mut s = FixedCString::<16>::new();
        s.push_bytes(b"ab\0cd").push_str("ef");
        assert_eq!(s.as_cstr(), c"abef");
    }

    #[test]
    fn hex_and_padding() {
        let mut s = FixedCString::<64>::new();
        s.push_str(" #").push_decimal(3).pad_to(6);
        s.push_str("0x").push_hex(0x1234, 16);
        assert_eq!(s.as_bytes(), b" #3   0x0000000000001234");
    }

    #[test]
    fn truncate_rewinds_to_a_prefix() {
        let mut s = FixedCString::<8>::new();
        s.push_str("base").push_str(".12345");
        assert!(s.is_truncated());
        s.truncate(4);
        assert_eq!(s.as_cstr(), c"base");
        assert!(!s.is_truncated());
        s.truncate(10);
        assert_eq!(s.as_cstr(), c"base");
    }

    #[test]
    fn zero_sized_buffer_is_always_empty() {
        let mut s = FixedCString::<0>::new();
        s.push_str("x");
        assert!(s.is_truncated());
        assert_eq!(s.as_cstr(), c"");
    }
}
