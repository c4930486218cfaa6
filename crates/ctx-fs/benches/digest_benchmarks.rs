use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ctx_fs::io::{self, RobustnessConfig};
use ctx_fs::{NormalizedPath, identify};
use std::fs;
use tempfile::tempdir;

fn write_atomic_benchmark(c: &mut Criterion) {
    c.bench_function("io::write_atomic", |b| {
        let dir = tempdir().unwrap();
        let path = NormalizedPath::new(dir.path().join("CLAUDE.md"));
        let content = "hello world".as_bytes();
        let config = RobustnessConfig {
            enable_fsync: false,
            ..RobustnessConfig::default()
        };

        b.iter(|| {
            io::write_atomic(black_box(&path), black_box(content), config).unwrap();
        })
    });
}

fn identify_benchmark(c: &mut Criterion) {
    c.bench_function("checksum::identify (file)", |b| {
        let dir = tempdir().unwrap();
        let path = dir.path().join("AI_CONTEXT.md");
        fs::write(&path, "# Context\n".repeat(2_000)).unwrap();

        b.iter(|| {
            identify(black_box(&path)).unwrap();
        })
    });

    c.bench_function("checksum::identify (tree of 200 files)", |b| {
        let dir = tempdir().unwrap();
        for i in 0..200 {
            let nested = dir.path().join(format!("group{}", i % 10));
            fs::create_dir_all(&nested).unwrap();
            fs::write(nested.join(format!("rule{}.md", i)), format!("rule {}", i)).unwrap();
        }

        b.iter(|| {
            identify(black_box(dir.path())).unwrap();
        })
    });
}

criterion_group!(benches, write_atomic_benchmark, identify_benchmark);
criterion_main!(benches);
