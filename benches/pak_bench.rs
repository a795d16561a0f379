use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use paktools::confirm::FixedAnswer;
use paktools::header::{encode_header, EntryHeader};
use paktools::io_stream::{PakReader, PakWriter};
use std::io::{self, Cursor};

fn build_archive(files: usize, size: usize) -> Vec<u8> {
    let data = vec![42u8; size];
    let mut writer = PakWriter::new(Vec::new());
    for i in 0..files {
        writer.add_bytes(&format!("file_{i:04}.bin"), &data).unwrap();
    }
    writer.finish().unwrap();
    writer.into_inner()
}

fn bench_header_codec(c: &mut Criterion) {
    let raw = encode_header("テスト.dat", 1234, 0x530).unwrap();

    c.bench_function("encode_header", |b| {
        b.iter(|| encode_header(black_box("テスト.dat"), black_box(1234), black_box(0x530)))
    });
    c.bench_function("decode_header", |b| b.iter(|| EntryHeader::decode(black_box(&raw))));
}

fn bench_write(c: &mut Criterion) {
    let data = vec![42u8; 1024 * 1024];
    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("single_1mb", |b| {
        b.iter(|| {
            let mut writer = PakWriter::new(io::sink());
            writer.add_bytes("bench.bin", black_box(&data)).unwrap();
            writer.finish().unwrap();
        })
    });
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let many_small = build_archive(1000, 100);
    let one_large = build_archive(1, 4 * 1024 * 1024);

    let mut group = c.benchmark_group("read");
    for (label, bytes) in [("1000x100b", &many_small), ("1x4mb", &one_large)] {
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut reader = PakReader::new(Cursor::new(black_box(bytes)), bytes.len() as u64);
                while reader.next_entry(&mut FixedAnswer(false)).unwrap().is_some() {
                    reader.copy_payload(&mut io::sink()).unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_header_codec, bench_write, bench_read);
criterion_main!(benches);
