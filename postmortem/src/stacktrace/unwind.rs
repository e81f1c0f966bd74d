// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Return addresses of the calling thread, innermost first, after dropping `skip` frames.
#[inline(never)]
pub fn capture_frames(max_depth: usize, skip: usize) -> Vec<usize> {
    let mut frames = Vec::with_capacity(max_depth.min(crate::shared::constants::MAX_STACK_DEPTH));
    let mut to_skip = skip;
    backtrace::trace(|frame| {
        if frames.len() >= max_depth {
            return false;
        }
        if to_skip > 0 {
            to_skip -= 1;
        } else {
            frames.push(frame.ip() as usize);
        }
        true
    });
    frames
}

/// Every return address of the calling thread, up to `max_depth`.
#[inline(never)]
pub fn get_stack_frames(max_depth: usize) -> Vec<usize> {
    capture_frames(max_depth, 0)
}

/// Fills `frames` without allocating and returns how many were captured.
///
/// # Safety
/// Unsynchronized with other unwinders: no other thread may unwind concurrently. The crash path
/// guarantees this by holding the report flag.
#[inline(never)]
pub unsafe fn capture_frames_unsynchronized(frames: &mut [usize], skip: usize) -> usize {
    let mut captured = 0;
    let mut to_skip = skip;
    backtrace::trace_unsynchronized(|frame| {
        if captured >= frames.len() {
            return false;
        }
        if to_skip > 0 {
            to_skip -= 1;
        } else {
            frames[captured] = frame.ip() as usize;
            captured += 1;
        }
        true
    });
    captured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn nested(depth: usize, max_depth: usize) -> Vec<usize> {
        if depth == 0 {
            get_stack_frames(max_depth)
        } else {
            let frames = nested(depth - 1, max_depth);
            std::hint::black_box(frames)
        }
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn capture_sees_the_call_chain() {
        let frames = nested(8, 4096);
        assert!(frames.len() > 8, "{} frames", frames.len());
        assert!(frames.iter().all(|&ip| ip != 0));
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn depth_is_bounded() {
        assert_eq!(nested(8, 3).len(), 3);
        assert!(nested(0, 0).is_empty());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn skipping_drops_innermost_frames() {
        let all = capture_frames(64, 0);
        let skipped = capture_frames(64, 2);
        assert!(skipped.len() + 2 <= all.len() || all.len() == 64);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn unsynchronized_capture_fills_the_buffer() {
        let mut frames = [0usize; 4];
        let captured = unsafe { capture_frames_unsynchronized(&mut frames, 0) };
        assert_eq!(captured, 4);
        assert!(frames.iter().all(|&ip| ip != 0));

        let mut empty: [usize; 0] = [];
        assert_eq!(unsafe { capture_frames_unsynchronized(&mut empty, 0) }, 0);
    }
}
