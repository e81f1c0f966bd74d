// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Holds any `i64` in decimal: up to 19 digits, a sign and the NUL.
pub const NUMERIC_BUFFER_SIZE: usize = 22;

/// Number of characters needed for `x` in decimal, sign included.
pub fn digit_count(x: i64) -> usize {
    let mut count = if x < 0 { 2 } else { 1 };
    let mut rest = x.unsigned_abs();
    while rest >= 10 {
        count += 1;
        rest /= 10;
    }
    count
}

/// Writes `x` in decimal followed by a NUL and returns the number of characters written,
/// terminator excluded. `None` if the buffer is too small.
pub fn write_decimal(buf: &mut [u8], x: i64) -> Option<usize> {
    let len = digit_count(x);
    if len >= buf.len() {
        return None;
    }
    buf[len] = 0;
    let mut rest = x.unsigned_abs();
    let mut i = len;
    loop {
        i -= 1;
        buf[i] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    if x < 0 {
        buf[0] = b'-';
    }
    Some(len)
}

/// Writes `x` in lowercase hex, zero padded to `min_width`, followed by a NUL.
pub fn write_hex(buf: &mut [u8], x: u64, min_width: usize) -> Option<usize> {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut significant = 1;
    while significant < 16 && x >> (4 * significant) != 0 {
        significant += 1;
    }
    let len = significant.max(min_width);
    if len >= buf.len() {
        return None;
    }
    buf[len] = 0;
    for (i, slot) in buf[..len].iter_mut().rev().enumerate() {
        *slot = if i < 16 {
            DIGITS[((x >> (4 * i)) & 0xf) as usize]
        } else {
            b'0'
        };
    }
    Some(len)
}
