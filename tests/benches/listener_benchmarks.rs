//! # Block Listener Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Header hash (DER + SHA-256) | < 5µs |
//! | Page of 10 from 10k cached blocks | < 1ms |
//! | Record + pointer batch, no fsync | < 50µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use block_listener::{
    compute_block_hash, BlockEvent, BlockHeader, BlockRecord, BlockStore, FileBackedKVStore,
    InMemoryKVStore, ListenerConfig,
};
use chrono::Utc;

fn make_event(number: u64) -> BlockEvent {
    BlockEvent::new(
        BlockHeader {
            number,
            previous_hash: vec![0xAB; 32],
            data_hash: vec![0xCD; 32],
        },
        vec![vec![0u8; 64]; 3],
    )
}

fn bench_block_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("block-hash");

    for hash_len in [0usize, 32, 256] {
        let prev = vec![0x11; hash_len];
        let data = vec![0x22; hash_len];
        group.throughput(Throughput::Bytes((2 * hash_len) as u64));
        group.bench_with_input(BenchmarkId::new("der_sha256", hash_len), &hash_len, |b, _| {
            b.iter(|| compute_block_hash(black_box(1_000_000), &prev, &data))
        });
    }

    group.finish();
}

fn bench_list_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("list-page");
    group.measurement_time(Duration::from_secs(5));

    let store = BlockStore::new(InMemoryKVStore::new(), ListenerConfig::default());
    let now = Utc::now();
    for n in 0..10_000 {
        store
            .put(&BlockRecord::from_event("org1", &make_event(n), now))
            .unwrap();
    }

    for page in [1u64, 500, 1000] {
        group.bench_with_input(BenchmarkId::new("size_10", page), &page, |b, &page| {
            b.iter(|| store.list_page("org1", 10, black_box(page)).unwrap())
        });
    }

    group.finish();
}

fn bench_file_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("file-store-put");
    let dir = tempfile::tempdir().unwrap();
    let config = ListenerConfig::default().with_sync_writes(false);
    let store: BlockStore<FileBackedKVStore> = BlockStore::open(dir.path(), &config).unwrap();
    let now = Utc::now();

    let mut next = 0u64;
    group.bench_function("record_and_pointer", |b| {
        b.iter(|| {
            let record = BlockRecord::from_event("org1", &make_event(next), now);
            next += 1;
            store.put(&record).unwrap()
        })
    });

    group.finish();
    store.close().unwrap();
}

criterion_group!(benches, bench_block_hash, bench_list_page, bench_file_put);
criterion_main!(benches);
