//! Benchmark: a full mutate+render sweep over a small request with strings,
//! integers, a group-bound block and derived size/checksum fields, plus
//! plain DNP3 framing of a multi-segment payload.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fuzzblocks::legos::dnp3::frames;
use fuzzblocks::{
    BitFieldOptions, BlockOptions, ChecksumAlgorithm, ChecksumOptions, Dnp3Options, Endianness,
    Request, SizeOptions, StringOptions,
};

fn build() -> Request {
    let mut req = Request::new("bench");
    req.push_group(vec![b"GET".to_vec(), b"POST".to_vec(), b"HEAD".to_vec()], Some("verb"))
        .expect("verb");
    req.open_block(
        "line",
        BlockOptions {
            group: Some("verb".to_string()),
            ..Default::default()
        },
    )
    .expect("line");
    req.push_delim(" ", true, None).expect("delim");
    req.push_string("/index.html", StringOptions { max_len: 512, ..Default::default() }, Some("path"))
        .expect("path");
    req.push_word(8080, &BitFieldOptions::default(), Some("port")).expect("port");
    req.close_block().expect("close");
    req.push_size("line", SizeOptions { length: 2, endian: Endianness::Big, ..Default::default() }, None)
        .expect("size");
    req.push_checksum(
        "line",
        ChecksumOptions {
            algorithm: ChecksumAlgorithm::Crc32,
            ..Default::default()
        },
        None,
    )
    .expect("crc");
    req
}

fn bench_sweep(c: &mut Criterion) {
    let mut req = build();
    println!("sweep: {} cases", req.num_mutations());
    c.bench_function("sweep_mutate_render", |b| {
        b.iter(|| {
            let mut total = 0usize;
            while req.mutate() {
                total += black_box(req.render()).len();
            }
            black_box(total)
        })
    });
}

fn bench_dnp3(c: &mut Criterion) {
    let payload: Vec<u8> = (0..4096u32).map(|i| i as u8).collect();
    let opts = Dnp3Options::default();
    c.bench_function("dnp3_frames_4k", |b| b.iter(|| black_box(frames(black_box(&payload), &opts))));
}

criterion_group!(benches, bench_sweep, bench_dnp3);
criterion_main!(benches);
