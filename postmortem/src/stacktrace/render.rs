// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::symbolize::symbolic_name;
use super::unwind::capture_frames;
use crate::shared::constants::{NO_FRAMES_MESSAGE, UNKNOWN_SYMBOL};
use crate::signal_safe::FixedCString;
use std::io::{self, Write};

/// Width of the frame index column, matching `{:<3}` in [`render_trace`].
const INDEX_WIDTH: usize = 3;

/// One line per frame: ` #<index> 0x<16 hex digits> in <symbol>`.
///
/// With `skip_unknown`, frames named `<unknown>` are left out and do not use up an index. An
/// empty trace renders as a single explanatory line.
pub fn render_trace(frames: &[usize], skip_unknown: bool) -> Vec<String> {
    render_named_trace(frames, skip_unknown, symbolic_name)
}

fn render_named_trace(
    frames: &[usize],
    skip_unknown: bool,
    name: impl Fn(usize) -> String,
) -> Vec<String> {
    if frames.is_empty() {
        return vec![NO_FRAMES_MESSAGE.to_string()];
    }
    frames
        .iter()
        .map(|&address| (address, name(address)))
        .filter(|(_, symbol)| !skip_unknown || symbol != UNKNOWN_SYMBOL)
        .enumerate()
        .map(|(index, (address, symbol))| frame_line(index, address, &symbol))
        .collect()
}

/// Like [`render_trace`] but without looking up symbols.
pub fn render_addresses(frames: &[usize]) -> Vec<String> {
    if frames.is_empty() {
        return vec![NO_FRAMES_MESSAGE.to_string()];
    }
    frames
        .iter()
        .enumerate()
        .map(|(index, &address)| frame_line(index, address, UNKNOWN_SYMBOL))
        .collect()
}

fn frame_line(index: usize, address: usize, symbol: &str) -> String {
    format!(" #{index:<3} {address:#018x} in {symbol}")
}

/// The same line as [`render_trace`], assembled without allocating.
pub fn write_frame_line<const N: usize>(
    line: &mut FixedCString<N>,
    index: usize,
    address: usize,
    symbol: &[u8],
) {
    line.clear();
    line.push_bytes(b" #")
        .push_decimal(index as i64)
        .pad_to(2 + INDEX_WIDTH)
        .push_bytes(b" 0x")
        .push_hex(address as u64, 16)
        .push_bytes(b" in ")
        .push_bytes(symbol)
        .push_bytes(b"\n");
}

pub fn print_stack_frames<W: Write>(
    w: &mut W,
    frames: &[usize],
    skip_unknown: bool,
) -> io::Result<()> {
    for line in render_trace(frames, skip_unknown) {
        writeln!(w, "{line}")?;
    }
    Ok(())
}

/// The calling thread's stack, rendered.
#[inline(never)]
pub fn get_stack_trace(max_depth: usize) -> Vec<String> {
    // Drop this function's own frame.
    render_trace(&capture_frames(max_depth, 1), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn known_function() -> u32 {
        std::hint::black_box(7)
    }

    #[test]
    fn empty_traces_explain_themselves() {
        assert_eq!(render_trace(&[], true), vec![NO_FRAMES_MESSAGE.to_string()]);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn lines_are_numbered_and_aligned() {
        let address = known_function as usize + 1;
        let lines = render_trace(&[address, address], false);
        assert_eq!(lines.len(), 2);
        assert!(
            lines[0].starts_with(&format!(" #0   0x{address:016x} in ")),
            "{}",
            lines[0]
        );
        assert!(lines[1].starts_with(" #1   0x"), "{}", lines[1]);
        assert!(lines[0].contains("known_function+0x1"), "{}", lines[0]);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn unknown_frames_do_not_use_an_index() {
        let known = known_function as usize + 1;
        let lines = render_trace(&[0x10, known, 0x20, known], true);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" #0 "));
        assert!(lines[1].starts_with(" #1 "));

        let lines = render_trace(&[0x10, known], false);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" in <unknown>"), "{}", lines[0]);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn fixed_and_allocating_lines_agree() {
        let address = known_function as usize + 1;
        let symbol = symbolic_name(address);
        let mut line = FixedCString::<512>::new();
        write_frame_line(&mut line, 12, address, symbol.as_bytes());
        let expected = format!("{}\n", render_trace(&[address; 13], false)[12]);
        assert_eq!(line.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn skipping_follows_the_frame_name() {
        let everything_unknown = |_: usize| UNKNOWN_SYMBOL.to_string();
        assert!(render_named_trace(&[0x1000, 0x2000], true, everything_unknown).is_empty());
        assert_eq!(
            render_named_trace(&[0x1000, 0x2000], false, everything_unknown).len(),
            2
        );

        let named = |address: usize| match address {
            0x30 => UNKNOWN_SYMBOL.to_string(),
            _ => format!("custom_{address:x}"),
        };
        assert_eq!(
            render_named_trace(&[0x10, 0x30, 0x20], true, named),
            vec![
                " #0   0x0000000000000010 in custom_10".to_string(),
                " #1   0x0000000000000020 in custom_20".to_string(),
            ]
        );
    }

    #[test]
    fn addresses_render_without_symbols() {
        let lines = render_addresses(&[0x1000, 0xdead_beef]);
        assert_eq!(
            lines,
            vec![
                " #0   0x0000000000001000 in <unknown>".to_string(),
                " #1   0x00000000deadbeef in <unknown>".to_string(),
            ]
        );
        assert_eq!(render_addresses(&[]), vec![NO_FRAMES_MESSAGE.to_string()]);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn printed_frames_end_with_newlines() {
        let mut out = Vec::new();
        print_stack_frames(&mut out, &[known_function as usize + 1], false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(" #0 "));
        assert!(text.ends_with('\n'));
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn current_stack_renders() {
        let lines = get_stack_trace(64);
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|line| line.starts_with(" #")));
    }
}
