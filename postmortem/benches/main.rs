// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use criterion::{criterion_group, criterion_main, Criterion};

#[cfg(unix)]
mod formatting_bench;

#[cfg(unix)]
fn active_benches(c: &mut Criterion) {
    formatting_bench::formatting_benches(c);
}

#[cfg(not(unix))]
fn active_benches(_: &mut Criterion) {
    println!("Benchmarks are disabled.");
}

criterion_group!(benches, active_benches);
criterion_main!(benches);
