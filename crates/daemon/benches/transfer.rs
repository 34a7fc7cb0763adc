//! Performance benchmarks for the file paths.
//!
//! These benchmarks measure the hot paths in the daemon:
//! - Client path resolution against the roots
//! - Chunked download streaming at different chunk sizes
//! - Store-only archive creation

use std::fs;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures_util::StreamExt;
use lanshare::files::{ArchiveBuilder, ChunkedTransfer, PathGuard, TempArtifactRegistry};
use tempfile::TempDir;

const FILE_SIZE: usize = 8 * 1024 * 1024;

/// Benchmark path resolution.
fn bench_path_resolution(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("a/b/c/d")).unwrap();
    fs::write(root.join("a/b/c/d/file.txt"), b"x").unwrap();
    let guard = PathGuard::new(vec![root.clone()]);

    let mut group = c.benchmark_group("path_resolution");

    let allowed = format!("{}/a/b/c/d/file.txt", root.display());
    group.bench_function("allowed", |b| {
        b.iter(|| guard.resolve(black_box(&allowed)).unwrap());
    });

    let traversal = format!("{}/a/../../etc/passwd", root.display());
    group.bench_function("traversal", |b| {
        b.iter(|| guard.resolve(black_box(&traversal)).unwrap_err());
    });

    group.bench_function("outside", |b| {
        b.iter(|| guard.resolve(black_box("/etc/passwd")).unwrap_err());
    });

    group.finish();
}

/// Benchmark streaming a file at several chunk sizes.
fn bench_chunked_download(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    fs::write(root.join("big.bin"), vec![0xA5u8; FILE_SIZE]).unwrap();
    let guard = Arc::new(PathGuard::new(vec![root.clone()]));
    let client_path = format!("{}/big.bin", root.display());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("chunked_download");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));
    group.sample_size(20);

    for chunk_size in [64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let transfer = ChunkedTransfer::new(Arc::clone(&guard), chunk_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, _| {
                b.iter(|| {
                    runtime.block_on(async {
                        let download = transfer.stream(&client_path).await.unwrap();
                        let mut stream = Box::pin(download.into_stream());
                        let mut total = 0;
                        while let Some(chunk) = stream.next().await {
                            total += chunk.unwrap().len();
                        }
                        assert_eq!(total, FILE_SIZE);
                    })
                });
            },
        );
    }

    group.finish();
}

/// Benchmark archiving a directory of small files.
fn bench_archive_build(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    let tree = root.join("tree");
    for dir in 0..10 {
        let sub = tree.join(format!("dir{dir}"));
        fs::create_dir_all(&sub).unwrap();
        for file in 0..20 {
            fs::write(sub.join(format!("file{file}.txt")), vec![b'x'; 4096]).unwrap();
        }
    }

    let guard = Arc::new(PathGuard::new(vec![root.clone()]));
    let registry = Arc::new(TempArtifactRegistry::new(root.join("scratch")));
    let builder = ArchiveBuilder::new(guard, Arc::clone(&registry));

    let mut group = c.benchmark_group("archive_build");
    group.throughput(Throughput::Bytes(10 * 20 * 4096));
    group.sample_size(20);

    group.bench_function("200_files_4KB", |b| {
        b.iter(|| {
            let archive = builder.build(black_box(&tree)).unwrap();
            registry.discard(&archive.path);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_path_resolution,
    bench_chunked_download,
    bench_archive_build
);
criterion_main!(benches);
