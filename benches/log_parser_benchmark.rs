/// Benchmarks for log parsing and snapshot ingestion
use code_inventory::git::parse_log;
use code_inventory::store::{IngestionStore, SqliteStore};
use code_inventory::types::ExtractedRepository;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::path::PathBuf;
use tokio::runtime::Runtime;

/// Build `count` log lines in the crawler's `--pretty` format
fn synthetic_log(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "{:040x}|||Author {}|||author{}@example.com|||2024-01-{:02}T10:00:00+02:00|||Change number {}",
                i + 1,
                i % 17,
                i % 17,
                i % 28 + 1,
                i
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn benchmark_parse_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_log");

    for commit_count in [100, 1_000, 10_000].iter() {
        let raw = synthetic_log(*commit_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_commits", commit_count)),
            &raw,
            |b, raw| b.iter(|| parse_log(black_box(raw))),
        );
    }

    group.finish();
}

fn benchmark_ingest(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("ingest");
    group.sample_size(20);

    for commit_count in [100, 1_000].iter() {
        let commits = parse_log(&synthetic_log(*commit_count));
        let snapshot = ExtractedRepository {
            path: PathBuf::from("/bench/project"),
            project_name: "project".to_string(),
            initial_commit_sha: commits.last().map(|c| c.sha.clone()),
            has_uncommitted_changes: false,
            commits,
        };

        group.bench_with_input(
            BenchmarkId::new("first_ingest", commit_count),
            &snapshot,
            |b, snapshot| {
                b.iter(|| {
                    rt.block_on(async {
                        let store = SqliteStore::in_memory().await.unwrap();
                        store.upsert_snapshot(black_box(snapshot)).await.unwrap()
                    })
                });
            },
        );

        let warm = rt.block_on(async {
            let store = SqliteStore::in_memory().await.unwrap();
            store.upsert_snapshot(&snapshot).await.unwrap();
            store
        });
        group.bench_with_input(
            BenchmarkId::new("repeat_ingest", commit_count),
            &snapshot,
            |b, snapshot| {
                b.iter(|| rt.block_on(warm.upsert_snapshot(black_box(snapshot))).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_parse_log, benchmark_ingest);
criterion_main!(benches);
