//! Benchmarks for streaming demux throughput
//!
//! Measures the parser alone and the full pipeline over synthesized clips at
//! several read chunk sizes.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sampleflow::pipeline::{Callbacks, Demuxer};
use sampleflow_media::mp4::writer::{Mp4Writer, SampleSpec, TrackSpec};
use sampleflow_media::{
    BoxError, ConfigKind, ContainerParser, Extraction, MovieInfo, Mp4Parser, ParserHandler, Sample,
};
use std::io;
use std::time::Duration;

/// Ten seconds of 30 fps video with ~4 KB frames.
fn clip() -> Vec<u8> {
    let samples = (0..300u32)
        .map(|i| SampleSpec::new(vec![(i % 251) as u8; 4096], 512).sync(i % 30 == 0))
        .collect();
    Mp4Writer::new(1000, 10_000)
        .track(
            TrackSpec::video(*b"avc1", 1280, 720, 15360)
                .config(ConfigKind::Avc, vec![0x01, 0x64, 0x00, 0x1f, 0xff, 0xe0, 0x00])
                .samples(samples),
        )
        .build()
}

fn split(data: &[u8], chunk_size: usize) -> Vec<Bytes> {
    let data = Bytes::copy_from_slice(data);
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

struct Sink(usize);

impl ParserHandler for Sink {
    fn on_ready(&mut self, info: &MovieInfo) -> Result<Option<Extraction>, BoxError> {
        Ok(info.video_tracks().next().map(|t| Extraction::track(t.id)))
    }

    fn on_samples(&mut self, _track_id: u32, samples: Vec<Sample>) -> Result<(), BoxError> {
        self.0 += samples.len();
        Ok(())
    }

    fn on_error(&mut self, _error: &sampleflow_media::Error) {}
}

fn bench_parser(c: &mut Criterion) {
    let data = clip();
    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk_size in [1500usize, 64 * 1024] {
        let chunks = split(&data, chunk_size);
        group.bench_with_input(
            BenchmarkId::new("append", chunk_size),
            &chunks,
            |b, chunks| {
                b.iter(|| {
                    let mut parser = Mp4Parser::new();
                    parser.subscribe(Box::new(Sink(0)));
                    let mut offset = 0u64;
                    for chunk in chunks {
                        parser.append_buffer(chunk.clone(), offset).unwrap();
                        offset += chunk.len() as u64;
                    }
                    parser.flush().unwrap();
                    black_box(parser.info().map(|i| i.tracks.len()))
                })
            },
        );
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let data = clip();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.measurement_time(Duration::from_secs(5));

    for chunk_size in [1500usize, 64 * 1024] {
        let chunks = split(&data, chunk_size);
        group.bench_with_input(
            BenchmarkId::new("run", chunk_size),
            &chunks,
            |b, chunks| {
                b.iter(|| {
                    let stream = futures::stream::iter(
                        chunks.iter().cloned().map(Ok::<_, io::Error>),
                    );
                    let mut bytes = 0usize;
                    runtime
                        .block_on(Demuxer::new().run(
                            stream,
                            Callbacks::new(|_| {}, |chunk| bytes += chunk.byte_length()),
                        ))
                        .unwrap();
                    black_box(bytes)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parser, bench_pipeline);
criterion_main!(benches);
