//! Jitter buffer hot-path microbenchmarks
//!
//! The push/pop pair runs once per frame on the audio and network threads;
//! at the minimal profile that is every 2.9 ms per side.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use multicast_audio_streamer::audio::buffer::JitterBuffer;
use multicast_audio_streamer::audio::frame::AudioFrame;

fn bench_push_pop(c: &mut Criterion) {
    let frame = AudioFrame::from_samples(&[0i16; 512]);

    c.bench_function("push_pop_capacity_2", |b| {
        let buffer = JitterBuffer::new(2);
        b.iter(|| {
            buffer.push(black_box(frame.clone()));
            black_box(buffer.pop());
        });
    });

    c.bench_function("force_push_under_overflow", |b| {
        let buffer = JitterBuffer::new(2);
        buffer.push(frame.clone());
        buffer.push(frame.clone());
        b.iter(|| {
            // Queue stays full; every push evicts
            black_box(buffer.push(black_box(frame.clone())));
        });
    });
}

fn bench_frame_encoding(c: &mut Criterion) {
    let samples = vec![1234i16; 512];

    c.bench_function("frame_from_samples_512", |b| {
        b.iter(|| AudioFrame::from_samples(black_box(&samples)));
    });

    let frame = AudioFrame::from_samples(&samples);
    c.bench_function("peak_amplitude_512", |b| {
        b.iter(|| black_box(frame.peak_amplitude()));
    });
}

criterion_group!(benches, bench_push_pop, bench_frame_encoding);
criterion_main!(benches);
