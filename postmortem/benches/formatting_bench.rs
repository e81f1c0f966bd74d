// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use criterion::{black_box, BenchmarkId, Criterion};
use postmortem::signal_safe::{write_decimal, FixedCString, NUMERIC_BUFFER_SIZE};
use postmortem::{get_stack_frames, render_addresses, render_trace, write_frame_line};

fn bench_decimal(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_decimal");
    for value in [0i64, 4242, i64::MIN] {
        group.bench_with_input(BenchmarkId::from_parameter(value), &value, |b, &value| {
            let mut buf = [0u8; NUMERIC_BUFFER_SIZE];
            b.iter(|| write_decimal(black_box(&mut buf), black_box(value)))
        });
    }
    group.finish();
}

fn bench_frame_lines(c: &mut Criterion) {
    let frames = get_stack_frames(64);
    c.bench_function("write_frame_line", |b| {
        let mut line = FixedCString::<1024>::new();
        b.iter(|| {
            for (index, &address) in frames.iter().enumerate() {
                write_frame_line(&mut line, index, address, b"some::function+0x1f");
                black_box(line.len());
            }
        })
    });
    c.bench_function("render_addresses", |b| {
        b.iter(|| render_addresses(black_box(&frames)))
    });

    let mut group = c.benchmark_group("render_trace");
    group.sample_size(10);
    group.bench_function("symbolized", |b| {
        b.iter(|| render_trace(black_box(&frames), false))
    });
    group.finish();
}

fn bench_capture(c: &mut Criterion) {
    c.bench_function("get_stack_frames", |b| {
        b.iter(|| get_stack_frames(black_box(128)))
    });
}

pub fn formatting_benches(c: &mut Criterion) {
    bench_decimal(c);
    bench_frame_lines(c);
    bench_capture(c);
}
