use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dedarc::codec::{BlockCompressor, BlockDecompressor, CodecConfig};
use dedarc::hash::hash;

fn sample(len: usize) -> Vec<u8> {
    // text-like data: compressible but not trivially so
    let words = ["archive", "frame", "trailer", "header", "hash", "zstd", "tree", "leaf"];
    let mut out = Vec::with_capacity(len);
    let mut i = 0usize;
    while out.len() < len {
        out.extend_from_slice(words[(i * 7 + i / 3) % words.len()].as_bytes());
        out.push(b' ');
        i += 1;
    }
    out.truncate(len);
    out
}

fn bench_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("fnv1a");
    for size in [4 * 1024, 1024 * 1024] {
        let data = sample(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| hash(black_box(data)))
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let data = sample(4 * 1024 * 1024);
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    for workers in [0u32, 2] {
        let config = CodecConfig { workers, ..CodecConfig::default() };
        let mut compressor = BlockCompressor::new(&config).unwrap();
        group.bench_function(BenchmarkId::new("compress", workers), |b| {
            b.iter(|| compressor.compress(black_box(&data)).unwrap())
        });
    }

    let config = CodecConfig::default();
    let packed = BlockCompressor::new(&config).unwrap().compress(&data).unwrap();
    let mut decompressor = BlockDecompressor::new(&config).unwrap();
    group.bench_function("decompress", |b| {
        b.iter(|| decompressor.decompress(black_box(&packed), data.len()).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_hash, bench_codec);
criterion_main!(benches);
