//! Benchmarks for the CityPulse record store
//!
//! Run with: cargo bench

use citypulse::store::*;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use tempfile::tempdir;

fn seeded_store(backend: Arc<dyn StorageBackend>, reports: usize) -> RecordStore {
    let store = RecordStore::new(backend);
    for i in 0..reports {
        let kind = if i % 2 == 0 {
            ReportKind::Suggestion
        } else {
            ReportKind::Feedback
        };
        store
            .add_report(NewReport::new(
                format!("user-{}", i % 10),
                kind,
                format!("Report {}", i),
                "Streetlight out near the bus stop",
            ))
            .unwrap();
    }
    store
}

fn bench_add_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_report");

    for size in [0, 100, 1000] {
        group.bench_function(format!("memory_existing_{}", size), |b| {
            b.iter_batched(
                || seeded_store(Arc::new(MemoryBackend::new()), size),
                |store| {
                    store
                        .add_report(black_box(NewReport::new(
                            "user-1",
                            ReportKind::Suggestion,
                            "Bench",
                            "Bench report",
                        )))
                        .unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.bench_function("file_existing_100", |b| {
        let dir = tempdir().unwrap();
        let store = seeded_store(Arc::new(FileBackend::open(dir.path()).unwrap()), 100);
        b.iter(|| {
            store
                .add_report(NewReport::new("u", ReportKind::Feedback, "t", "d"))
                .unwrap()
        });
    });

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");

    for size in [100, 1000] {
        let store = seeded_store(Arc::new(MemoryBackend::new()), size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("get_all_reports_{}", size), |b| {
            b.iter(|| black_box(store.get_all_reports()))
        });

        group.bench_function(format!("get_reports_by_user_{}", size), |b| {
            b.iter(|| black_box(store.get_reports_by_user(black_box("user-3"))))
        });
    }

    group.finish();
}

fn bench_update_status(c: &mut Criterion) {
    let store = seeded_store(Arc::new(MemoryBackend::new()), 1000);
    let id = store.get_all_reports()[500].id.clone();

    c.bench_function("update_report_status_1000", |b| {
        b.iter(|| {
            store
                .update_report_status(black_box(&id), ReportStatus::InProgress)
                .unwrap()
        })
    });
}

fn bench_sqlite(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = seeded_store(
        Arc::new(SqliteBackend::open(dir.path().join("bench.db")).unwrap()),
        100,
    );

    c.bench_function("sqlite_add_alert", |b| {
        b.iter(|| {
            store
                .add_alert(NewAlert::new("authority", "Bench", "Bench alert"))
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_add_report,
    bench_reads,
    bench_update_status,
    bench_sqlite
);
criterion_main!(benches);
