//! Benchmarks for the wire codec and frame reassembly
//!
//! Covers the hot paths of the short-range link task:
//! - packing the frames the device emits (status, observation)
//! - unpacking the largest inbound frame (training set)
//! - reassembling a stream of MTU-sized writes

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use heartlink::protocol::{FrameAssembler, MAX_FRAME_SIZE, Message, SampleObservation, pack, unpack};
use heartlink::test_utils::clustered_training_set;
use heartlink::{Label, StatusBits};
use std::hint::black_box;

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");
    let mut buf = [0u8; MAX_FRAME_SIZE];

    let status = Message::Status { status: StatusBits::new(0x0B), addr: 0x0A00_0001 };
    group.bench_function("status", |b| b.iter(|| pack(black_box(&status), &mut buf)));

    let observation =
        Message::SampleObservation(SampleObservation { label: Label::Normal, amplitude: 2605, period: 800 });
    group.bench_function("observation", |b| b.iter(|| pack(black_box(&observation), &mut buf)));

    group.finish();
}

fn bench_unpack(c: &mut Criterion) {
    let frame = Message::TrainingSet(clustered_training_set()).to_frame();

    let mut group = c.benchmark_group("unpack");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("training_set", |b| b.iter(|| unpack(black_box(frame.as_bytes()))));
    group.finish();
}

fn bench_reassembly(c: &mut Criterion) {
    let mut stream = Vec::new();
    for _ in 0..32 {
        stream.extend_from_slice(Message::TrainingSet(clustered_training_set()).to_frame().as_bytes());
        stream.extend_from_slice(Message::Instruction(6).to_frame().as_bytes());
    }

    let mut group = c.benchmark_group("reassembly");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("mtu_writes", |b| {
        b.iter(|| {
            let mut assembler = FrameAssembler::new();
            let mut frames = 0usize;
            for write in stream.chunks(128) {
                assembler.push(black_box(write), |r| frames += usize::from(r.is_ok()));
            }
            black_box(frames)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_pack, bench_unpack, bench_reassembly);
criterion_main!(benches);
