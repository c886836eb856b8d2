// ctree - current tree reconciliation for data archives
// Copyright (C) 2026 ctree Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Classification benchmarks
//!
//! Archives hold hundreds of thousands of paths, most of them unchanged
//! between two runs. These benches cover that shape plus a batch of moves
//! sharing a handful of hashes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ctree_config::MoveDetection;
use ctree_core::{classify, Snapshot, TreeFormat};
use std::hint::black_box;
use std::path::Path;

/// `size` paths, with every 100th path replaced and every 250th moved
fn snapshots(size: usize) -> (Snapshot, Snapshot) {
    let mut old = Snapshot::new();
    let mut new = Snapshot::new();
    for i in 0..size {
        let path = format!("ftp/data/sample{:07}/reads.cram", i);
        let md5 = format!("{:032x}", i);
        old.insert(path.clone(), md5.clone());
        if i % 250 == 0 {
            new.insert(format!("ftp/moved/sample{:07}/reads.cram", i), md5);
        } else if i % 100 == 0 {
            new.insert(path, format!("{:032x}", i + size));
        } else {
            new.insert(path, md5);
        }
    }
    (old, new)
}

/// Many moved copies of the same few contents
fn duplicate_heavy(size: usize) -> (Snapshot, Snapshot) {
    let mut old = Snapshot::new();
    let mut new = Snapshot::new();
    for i in 0..size {
        let md5 = format!("{:032x}", i % 8);
        old.insert(format!("ftp/old/{:07}.bam", i), md5.clone());
        new.insert(format!("ftp/new/{:07}.bam", i), md5);
    }
    (old, new)
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    for size in [1_000usize, 10_000, 100_000] {
        let (old, new) = snapshots(size);
        group.bench_with_input(BenchmarkId::new("positional", size), &size, |b, _| {
            b.iter(|| classify(black_box(&old), black_box(&new), MoveDetection::Positional))
        });
        group.bench_with_input(BenchmarkId::new("unique", size), &size, |b, _| {
            b.iter(|| classify(black_box(&old), black_box(&new), MoveDetection::Unique))
        });
    }
    group.finish();
}

fn bench_duplicates(c: &mut Criterion) {
    let (old, new) = duplicate_heavy(10_000);
    c.bench_function("classify_duplicate_hashes", |b| {
        b.iter(|| classify(black_box(&old), black_box(&new), MoveDetection::Positional))
    });
}

fn bench_parse(c: &mut Criterion) {
    let (old, _) = snapshots(100_000);
    let rendered = old.render();
    c.bench_function("parse_canonical_100k", |b| {
        b.iter(|| {
            Snapshot::parse_str(black_box(&rendered), TreeFormat::Canonical, Path::new("bench"))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_classify, bench_duplicates, bench_parse);
criterion_main!(benches);
