//! Shared fixtures for integration tests.
//!
//! Clips are synthesized with [`Mp4Writer`] so no binary media is checked in.

#![allow(dead_code)]

use bytes::Bytes;
use futures::Stream;
use sampleflow_media::mp4::writer::{Mp4Writer, SampleSpec, TrackSpec};
use sampleflow_media::ConfigKind;
use std::io;
use std::path::{Path, PathBuf};

/// avcC for Constrained Baseline level 3.0 with one SPS and one PPS.
pub const AVCC: &[u8] = &[
    0x01, 0x42, 0xc0, 0x1e, 0xff, 0xe1, 0x00, 0x09, 0x67, 0x42, 0xc0, 0x1e, 0xd9, 0x01, 0x40,
    0x7b, 0x20, 0x01, 0x00, 0x04, 0x68, 0xcb, 0x83, 0xcb,
];

pub const VIDEO_TIMESCALE: u32 = 15360;

/// Samples of an H.264 clip: `fps` frames per second, a key frame every
/// `gop` frames, payload bytes varying with the frame number.
pub fn h264_samples(seconds: u32, fps: u32, gop: u32) -> Vec<SampleSpec> {
    (0..seconds * fps)
        .map(|i| {
            let len = 200 + (i as usize % 7) * 31;
            SampleSpec::new(vec![(i % 251) as u8; len], VIDEO_TIMESCALE / fps).sync(i % gop == 0)
        })
        .collect()
}

/// A 320x240 H.264 clip with an audio track ahead of the video track.
pub fn h264_clip(seconds: u32, faststart: bool) -> Vec<u8> {
    Mp4Writer::new(1000, seconds as u64 * 1000)
        .faststart(faststart)
        .track(
            TrackSpec::audio(48000).samples(
                (0..seconds * 47)
                    .map(|_| SampleSpec::new(vec![0xaa; 64], 1024))
                    .collect(),
            ),
        )
        .track(
            TrackSpec::video(*b"avc1", 320, 240, VIDEO_TIMESCALE)
                .config(ConfigKind::Avc, AVCC.to_vec())
                .samples(h264_samples(seconds, 30, 30)),
        )
        .build()
}

/// A video track whose sample entry carries no recognized config box.
pub fn unsupported_clip() -> Vec<u8> {
    Mp4Writer::new(1000, 1000)
        .track(
            TrackSpec::video(*b"mp4v", 320, 240, 1000)
                .samples(vec![SampleSpec::new(vec![0; 16], 1000)]),
        )
        .build()
}

/// An audio-only file.
pub fn audio_only_clip() -> Vec<u8> {
    Mp4Writer::new(1000, 1000)
        .track(TrackSpec::audio(48000).samples(vec![SampleSpec::new(vec![0; 16], 1024)]))
        .build()
}

/// Split `data` into a stream of `chunk_size` pieces.
pub fn chunked(data: &[u8], chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>> + Unpin {
    let chunks: Vec<io::Result<Bytes>> = data
        .chunks(chunk_size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks)
}

/// Write `data` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}
