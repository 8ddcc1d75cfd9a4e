//! Benchmarks for checkpoint discovery in large model directories

use bytes::Bytes;
use checkpoint::{format_step, CheckpointResolver, ResolverConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use storage::{LocalStorage, StorageBackend};
use tempfile::TempDir;

fn populate(dir: &TempDir, checkpoints: u64, rt: &tokio::runtime::Runtime) {
    let storage = LocalStorage::new(dir.path());
    rt.block_on(async {
        for step in (1..=checkpoints).map(|i| i * 1000) {
            let stem = format_step(step);
            for suffix in [".index", ".data-00000-of-00001", ".meta"] {
                storage
                    .write(&format!("{}{}", stem, suffix), Bytes::from_static(b"x"))
                    .await
                    .unwrap();
            }
        }
    });
}

fn resolve_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("checkpoint_resolve");

    for checkpoints in [10u64, 100, 1000].iter() {
        // Setup: write the checkpoint files first
        let temp_dir = TempDir::new().unwrap();
        populate(&temp_dir, *checkpoints, &rt);

        let resolver = CheckpointResolver::new(ResolverConfig {
            model_dir: temp_dir.path().to_path_buf(),
            skip_until: Some(checkpoints * 500),
            ..Default::default()
        });

        group.bench_with_input(BenchmarkId::new("all", checkpoints), &resolver, |b, resolver| {
            b.iter(|| rt.block_on(resolver.all()).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("closest", checkpoints), &resolver, |b, resolver| {
            b.iter(|| rt.block_on(resolver.closest(checkpoints * 777)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, resolve_benchmark);
criterion_main!(benches);
