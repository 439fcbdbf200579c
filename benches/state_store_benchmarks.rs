use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use tempfile::TempDir;

use bridge_event_relayer::blockchain::{EventNormalizer, TOKENS_LOCKED};
use bridge_event_relayer::models::{CanonicalTransferRecord, RawLog};
use bridge_event_relayer::state::{InMemoryStore, SqliteStore, StateStore};

fn create_test_record(id: u64) -> CanonicalTransferRecord {
    CanonicalTransferRecord {
        transaction_id: format!("0x{:064x}", id),
        destination_chain_id: 137,
        recipient: format!("0x{:040x}", id),
        amount: format!("{}", (id + 1) * 1_000_000_000_000_000_000),
        source_tx_hash: format!("0x{:064x}", id + 1_000_000),
        block_number: 1000 + id,
    }
}

fn bench_mark_processed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mark_processed");

    for size in [1, 10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, &size| {
            b.iter(|| {
                let mut store = InMemoryStore::new();
                for i in 0..size {
                    let _ = store.mark_processed(black_box(&create_test_record(i)));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("sqlite", size), size, |b, &size| {
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let db_path = temp_dir.path().join("bench_mark.db");
            let mut store = SqliteStore::new(db_path.to_str().unwrap()).expect("Failed to create store");
            let mut next = 0u64;

            b.iter(|| {
                for _ in 0..size {
                    let _ = store.mark_processed(black_box(&create_test_record(next)));
                    next += 1;
                }
            });
        });
    }

    group.finish();
}

fn bench_dedup_lookup(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("bench_lookup.db");
    let mut sqlite = SqliteStore::new(db_path.to_str().unwrap()).expect("Failed to create store");
    let mut memory = InMemoryStore::new();

    for i in 0..1000 {
        let record = create_test_record(i);
        sqlite.mark_processed(&record).expect("Failed to mark record");
        memory.mark_processed(&record).expect("Failed to mark record");
    }

    let mut group = c.benchmark_group("is_processed");

    group.bench_function("memory_hit", |b| {
        b.iter(|| memory.is_processed(&format!("0x{:064x}", black_box(500))));
    });

    group.bench_function("sqlite_hit", |b| {
        b.iter(|| sqlite.is_processed(&format!("0x{:064x}", black_box(500))));
    });

    group.bench_function("sqlite_miss", |b| {
        b.iter(|| sqlite.is_processed(&format!("0x{:064x}", black_box(5_000_000))));
    });

    group.bench_function("sqlite_save_cursor", |b| {
        let mut block = 0u64;
        b.iter(|| {
            block += 1;
            sqlite.save_cursor(black_box(block))
        });
    });

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = EventNormalizer::tokens_locked();
    let log = RawLog {
        address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
        topics: vec![
            TOKENS_LOCKED.topic0(),
            format!("0x{:0>64}", "11".repeat(20)),
            format!("0x{:0>64}", "bb".repeat(20)),
            format!("0x{}", "aa".repeat(32)),
        ],
        data: format!("0x{:064x}{:064x}", 137u64, 1_000_000_000_000_000_000u64),
        block_number: 18_000_000,
        transaction_hash: format!("0x{}", "cd".repeat(32)),
        log_index: 4,
        removed: false,
    };

    c.bench_function("normalize_tokens_locked", |b| {
        b.iter(|| normalizer.normalize(black_box(&log)));
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets = bench_mark_processed, bench_dedup_lookup, bench_normalize
);
criterion_main!(benches);
