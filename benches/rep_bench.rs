//! Write buffer representation benchmarks.
//!
//! - Insert throughput per strategy
//! - Point lookups on a filled rep
//! - Full ordered scan
//!
//! Run with: `cargo bench --bench rep_bench`

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lsm_memtable::transform::FixedPrefixTransform;
use lsm_memtable::types::{LookupKey, MAX_SEQUENCE_NUMBER};
use lsm_memtable::{
    Arena, InternalKeyComparator, MemTableRep, MemTableRepFactory, RepConfig, RepIterator,
    SliceTransform, ValueType, add_entry,
};
use rand::seq::SliceRandom;

const ENTRIES: usize = 10_000;

const STRATEGIES: [&str; 5] = [
    "skip_list",
    "vector",
    "prefix_hash:4096",
    "hash_linkedlist:4096",
    "cuckoo:4194304",
];

fn keys() -> Vec<Vec<u8>> {
    let mut keys: Vec<Vec<u8>> = (0..ENTRIES)
        .map(|i| format!("t{:03}:row{i:08}", i % 100).into_bytes())
        .collect();
    keys.shuffle(&mut rand::thread_rng());
    keys
}

fn new_rep(factory: &dyn MemTableRepFactory) -> Box<dyn MemTableRep> {
    let transform: Arc<dyn SliceTransform> = Arc::new(FixedPrefixTransform::new(4));
    factory
        .create_memtable_rep(Arc::new(InternalKeyComparator), Arc::new(Arena::new()), Some(transform))
        .unwrap()
}

fn fill(rep: &dyn MemTableRep, keys: &[Vec<u8>]) {
    for (seq, k) in keys.iter().enumerate() {
        add_entry(rep, k, seq as u64 + 1, ValueType::Put, b"value-0123456789");
    }
}

fn bench_insert(c: &mut Criterion) {
    let keys = keys();
    let mut group = c.benchmark_group("rep_insert");
    group.throughput(Throughput::Elements(ENTRIES as u64));

    for text in STRATEGIES {
        let factory = text.parse::<RepConfig>().unwrap().build().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(text), &keys, |b, keys| {
            b.iter_batched(|| new_rep(&*factory), |rep| fill(&*rep, keys), BatchSize::LargeInput)
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let keys = keys();
    let mut group = c.benchmark_group("rep_get");
    group.throughput(Throughput::Elements(1));

    for text in STRATEGIES {
        let factory = text.parse::<RepConfig>().unwrap().build().unwrap();
        let rep = new_rep(&*factory);
        fill(&*rep, &keys);
        rep.mark_read_only();

        let mut next = 0;
        group.bench_function(BenchmarkId::from_parameter(text), |b| {
            b.iter(|| {
                let lookup = LookupKey::new(&keys[next % ENTRIES], MAX_SEQUENCE_NUMBER);
                next += 1;
                let mut found = 0;
                rep.get(&lookup, &mut |_entry: &[u8]| {
                    found += 1;
                    false
                });
                black_box(found)
            })
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let keys = keys();
    let mut group = c.benchmark_group("rep_scan");
    group.throughput(Throughput::Elements(ENTRIES as u64));

    // cuckoo has no ordered iterator
    for text in &STRATEGIES[..4] {
        let factory = text.parse::<RepConfig>().unwrap().build().unwrap();
        let rep = new_rep(&*factory);
        fill(&*rep, &keys);
        rep.mark_read_only();

        group.bench_function(BenchmarkId::from_parameter(text), |b| {
            b.iter(|| {
                let mut iter = rep.iter();
                iter.seek_to_first();
                let mut n = 0;
                while iter.valid() {
                    black_box(iter.key());
                    n += 1;
                    iter.next();
                }
                n
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_scan);
criterion_main!(benches);
