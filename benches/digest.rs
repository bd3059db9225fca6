//! Benchmarks for content integrity digests.

use criterion::{criterion_group, criterion_main, Criterion};
use genoreg::digest::{directory_digest, file_digest, Blake3FastaChecksum, FastaChecksum};
use std::fs;
use tempfile::TempDir;

fn bench_directory_digest(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    for i in 0..32 {
        let content = vec![b'A' + (i % 26) as u8; 16 * 1024];
        fs::write(dir.path().join(format!("part{i:02}.bin")), content).unwrap();
    }

    c.bench_function("directory_digest_32_files", |b| {
        b.iter(|| directory_digest(std::hint::black_box(dir.path())).unwrap());
    });
}

fn bench_file_digest(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.bin");
    fs::write(&path, vec![0u8; 4 * 1024 * 1024]).unwrap();

    c.bench_function("file_digest_4mb", |b| {
        b.iter(|| file_digest(std::hint::black_box(&path)).unwrap());
    });
}

fn bench_fasta_checksum(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("toy.fa");
    let mut fasta = String::new();
    for chr in 1..=8 {
        fasta.push_str(&format!(">chr{chr}\n"));
        for _ in 0..256 {
            fasta.push_str("ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT\n");
        }
    }
    fs::write(&path, fasta).unwrap();

    c.bench_function("fasta_checksum_8_sequences", |b| {
        b.iter(|| {
            Blake3FastaChecksum
                .fasta_checksum(std::hint::black_box(&path))
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_directory_digest,
    bench_file_digest,
    bench_fasta_checksum
);
criterion_main!(benches);
