//! Benchmarks for the reduce hot path.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use edgeload::batch::Batcher;
use edgeload::merge::merge_by_key;
use edgeload_core::encoding::uidpack::{pack, packed_len, unpack};
use edgeload_core::encoding::PostingListBuilder;
use edgeload_core::{MapEntry, Uid};

fn sparse_uids(n: u64) -> Vec<u64> {
    (0..n).map(|i| i * 37 + (i % 7)).collect()
}

/// Benchmark UID block packing.
fn bench_uidpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("uidpack");

    for size in [128u64, 10_000] {
        let uids = sparse_uids(size);
        let mut packed = Vec::with_capacity(packed_len(&uids));
        pack(&uids, &mut packed);

        group.throughput(Throughput::Elements(size));
        group.bench_function(format!("pack_{size}"), |b| {
            let mut out = Vec::with_capacity(packed.len());
            b.iter(|| {
                out.clear();
                pack(black_box(&uids), &mut out);
            });
        });
        group.bench_function(format!("unpack_{size}"), |b| {
            b.iter(|| unpack(black_box(&packed)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark posting-list assembly for one key.
fn bench_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("posting_list_builder");
    let uids = sparse_uids(1_000);
    group.throughput(Throughput::Elements(uids.len() as u64));

    group.bench_function("finish_uid_only_1000", |b| {
        let mut builder = PostingListBuilder::new();
        b.iter(|| {
            for &uid in uids.iter().rev() {
                builder.add_uid(Uid::new(uid));
            }
            builder.finish(Vec::with_capacity).unwrap()
        });
    });

    group.finish();
}

fn shards(count: usize, per_shard: usize) -> Vec<Vec<MapEntry>> {
    (0..count)
        .map(|s| {
            (0..per_shard)
                .map(|i| {
                    let key = format!("key:{:08}", i * count + s).into_bytes();
                    MapEntry::reference(key, Uid::new(i as u64))
                })
                .collect()
        })
        .collect()
}

/// Benchmark the k-way merge feeding the batcher.
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for count in [4usize, 32] {
        let per_shard = 100_000 / count;
        group.throughput(Throughput::Elements((count * per_shard) as u64));
        group.bench_function(format!("merge_batch_{count}_shards"), |b| {
            b.iter_batched(
                || shards(count, per_shard),
                |input| {
                    let sources = input.into_iter().map(Vec::into_iter).collect();
                    Batcher::new(merge_by_key(sources), 1_000)
                        .map(|batch| batch.len())
                        .sum::<usize>()
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_uidpack, bench_builder, bench_merge);
criterion_main!(benches);
