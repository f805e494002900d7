//! Progressive MP4 serialization.
//!
//! Produces small self-contained files (`ftyp`, `moov`, one `mdat`) with
//! full sample tables. Used to build fixtures for tests and benchmarks, and
//! by the CLI to synthesize sample clips.
//!
//! Each track stores its samples as a single chunk; tracks are laid out in
//! `mdat` in declaration order.

use super::{ConfigKind, FourCc, HandlerType};
use bytes::{BufMut, BytesMut};
use std::io::Write;

/// One sample to write.
#[derive(Debug, Clone)]
pub struct SampleSpec {
    data: Vec<u8>,
    duration: u32,
    is_sync: bool,
    cts_offset: i32,
}

impl SampleSpec {
    /// A sync sample with the given payload and duration (track timescale).
    pub fn new(data: impl Into<Vec<u8>>, duration: u32) -> Self {
        Self {
            data: data.into(),
            duration,
            is_sync: true,
            cts_offset: 0,
        }
    }

    pub fn sync(mut self, is_sync: bool) -> Self {
        self.is_sync = is_sync;
        self
    }

    /// Composition offset relative to the decode time.
    pub fn cts_offset(mut self, offset: i32) -> Self {
        self.cts_offset = offset;
        self
    }
}

/// One track to write.
#[derive(Debug, Clone)]
pub struct TrackSpec {
    handler: HandlerType,
    format: [u8; 4],
    width: u16,
    height: u16,
    timescale: u32,
    extra_boxes: Vec<(FourCc, Vec<u8>)>,
    samples: Vec<SampleSpec>,
}

impl TrackSpec {
    /// A video track with a visual sample entry of `format`.
    pub fn video(format: [u8; 4], width: u16, height: u16, timescale: u32) -> Self {
        Self {
            handler: HandlerType::Video,
            format,
            width,
            height,
            timescale,
            extra_boxes: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// A stereo 16-bit `mp4a` track. The sample rate equals the timescale.
    pub fn audio(timescale: u32) -> Self {
        Self {
            handler: HandlerType::Audio,
            format: *b"mp4a",
            width: 0,
            height: 0,
            timescale,
            extra_boxes: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// Attach a decoder configuration record to the sample entry.
    pub fn config(self, kind: ConfigKind, record: Vec<u8>) -> Self {
        self.child(kind.box_type(), record)
    }

    /// Attach an arbitrary child box to the sample entry.
    pub fn child(mut self, kind: FourCc, payload: Vec<u8>) -> Self {
        self.extra_boxes.push((kind, payload));
        self
    }

    pub fn samples(mut self, samples: Vec<SampleSpec>) -> Self {
        self.samples = samples;
        self
    }

    fn duration(&self) -> u64 {
        self.samples.iter().map(|s| s.duration as u64).sum()
    }

    fn data_len(&self) -> u64 {
        self.samples.iter().map(|s| s.data.len() as u64).sum()
    }
}

/// Builder for progressive MP4 files.
#[derive(Debug, Clone)]
pub struct Mp4Writer {
    timescale: u32,
    duration: u64,
    faststart: bool,
    tracks: Vec<TrackSpec>,
}

impl Mp4Writer {
    /// Movie timescale and duration as declared in `mvhd`.
    pub fn new(timescale: u32, duration: u64) -> Self {
        Self {
            timescale,
            duration,
            faststart: true,
            tracks: Vec::new(),
        }
    }

    /// Place `moov` before `mdat` (the default) or after it.
    pub fn faststart(mut self, faststart: bool) -> Self {
        self.faststart = faststart;
        self
    }

    /// Add a track. Track IDs are assigned 1, 2, ... in call order.
    pub fn track(mut self, track: TrackSpec) -> Self {
        self.tracks.push(track);
        self
    }

    /// Serialize the whole file.
    pub fn build(&self) -> Vec<u8> {
        let mut ftyp = BytesMut::with_capacity(32);
        write_ftyp(&mut ftyp);

        // Chunk offsets depend on the moov size, which does not depend on
        // the offset values, so measure once with placeholders.
        let placeholder = vec![0u32; self.tracks.len()];
        let moov_len = self.moov(&placeholder).len();
        let mdat_start = if self.faststart {
            ftyp.len() + moov_len
        } else {
            ftyp.len()
        };

        let mut offsets = Vec::with_capacity(self.tracks.len());
        let mut cursor = (mdat_start + 8) as u64;
        for track in &self.tracks {
            offsets.push(cursor as u32);
            cursor += track.data_len();
        }
        let moov = self.moov(&offsets);

        let mut mdat = BytesMut::new();
        let start = open_box(&mut mdat, b"mdat");
        for sample in self.tracks.iter().flat_map(|t| &t.samples) {
            mdat.put_slice(&sample.data);
        }
        close_box(&mut mdat, start);

        let mut out = Vec::with_capacity(ftyp.len() + moov.len() + mdat.len());
        out.extend_from_slice(&ftyp);
        if self.faststart {
            out.extend_from_slice(&moov);
            out.extend_from_slice(&mdat);
        } else {
            out.extend_from_slice(&mdat);
            out.extend_from_slice(&moov);
        }
        out
    }

    /// Serialize into `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        writer.write_all(&self.build())?;
        writer.flush()?;
        Ok(())
    }

    fn moov(&self, chunk_offsets: &[u32]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(1024);
        let moov_start = open_box(&mut buf, b"moov");
        self.write_mvhd(&mut buf);
        for (index, track) in self.tracks.iter().enumerate() {
            write_trak(&mut buf, track, index as u32 + 1, chunk_offsets[index]);
        }
        close_box(&mut buf, moov_start);
        buf
    }

    fn write_mvhd(&self, buf: &mut BytesMut) {
        let start = open_box(buf, b"mvhd");
        buf.put_u32(0); // version/flags
        buf.put_u32(0); // creation time
        buf.put_u32(0); // modification time
        buf.put_u32(self.timescale);
        buf.put_u32(self.duration as u32);
        buf.put_u32(0x00010000); // rate = 1.0
        buf.put_u16(0x0100); // volume = 1.0
        buf.put_u16(0);
        buf.put_u64(0);
        write_matrix(buf);
        for _ in 0..6 {
            buf.put_u32(0); // pre_defined
        }
        buf.put_u32(self.tracks.len() as u32 + 1); // next track ID
        close_box(buf, start);
    }
}

fn open_box(buf: &mut BytesMut, kind: &[u8; 4]) -> usize {
    let start = buf.len();
    buf.put_u32(0); // placeholder size
    buf.put_slice(kind);
    start
}

fn close_box(buf: &mut BytesMut, start: usize) {
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

fn write_ftyp(buf: &mut BytesMut) {
    let start = open_box(buf, b"ftyp");
    buf.put_slice(b"isom"); // major brand
    buf.put_u32(0x200); // minor version
    buf.put_slice(b"isom");
    buf.put_slice(b"avc1");
    close_box(buf, start);
}

fn write_matrix(buf: &mut BytesMut) {
    for value in [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000] {
        buf.put_u32(value);
    }
}

fn write_trak(buf: &mut BytesMut, track: &TrackSpec, track_id: u32, chunk_offset: u32) {
    let trak_start = open_box(buf, b"trak");

    let tkhd = open_box(buf, b"tkhd");
    buf.put_u8(0); // version 0
    buf.put_slice(&[0, 0, 3]); // flags: enabled, in_movie
    buf.put_u32(0); // creation time
    buf.put_u32(0); // modification time
    buf.put_u32(track_id);
    buf.put_u32(0); // reserved
    buf.put_u32(track.duration() as u32);
    buf.put_u64(0); // reserved
    buf.put_u16(0); // layer
    buf.put_u16(0); // alternate group
    buf.put_u16(if track.handler.is_audio() { 0x0100 } else { 0 });
    buf.put_u16(0);
    write_matrix(buf);
    buf.put_u32((track.width as u32) << 16);
    buf.put_u32((track.height as u32) << 16);
    close_box(buf, tkhd);

    let mdia = open_box(buf, b"mdia");

    let mdhd = open_box(buf, b"mdhd");
    buf.put_u32(0); // version/flags
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(track.timescale);
    buf.put_u32(track.duration() as u32);
    buf.put_u16(0x55C4); // language: und
    buf.put_u16(0);
    close_box(buf, mdhd);

    let (handler, name): (&[u8; 4], &[u8]) = if track.handler.is_audio() {
        (b"soun", b"SoundHandler")
    } else {
        (b"vide", b"VideoHandler")
    };
    let hdlr = open_box(buf, b"hdlr");
    buf.put_u32(0); // version/flags
    buf.put_u32(0); // pre_defined
    buf.put_slice(handler);
    buf.put_slice(&[0; 12]);
    buf.put_slice(name);
    buf.put_u8(0);
    close_box(buf, hdlr);

    let minf = open_box(buf, b"minf");
    if track.handler.is_audio() {
        let smhd = open_box(buf, b"smhd");
        buf.put_u32(0);
        buf.put_u32(0); // balance + reserved
        close_box(buf, smhd);
    } else {
        let vmhd = open_box(buf, b"vmhd");
        buf.put_u32(1); // version/flags
        buf.put_slice(&[0; 8]); // graphics mode + opcolor
        close_box(buf, vmhd);
    }

    let dinf = open_box(buf, b"dinf");
    let dref = open_box(buf, b"dref");
    buf.put_u32(0);
    buf.put_u32(1); // entry count
    buf.put_u32(12);
    buf.put_slice(b"url ");
    buf.put_u32(1); // self-contained
    close_box(buf, dref);
    close_box(buf, dinf);

    write_stbl(buf, track, chunk_offset);

    close_box(buf, minf);
    close_box(buf, mdia);
    close_box(buf, trak_start);
}

fn write_stbl(buf: &mut BytesMut, track: &TrackSpec, chunk_offset: u32) {
    let stbl = open_box(buf, b"stbl");

    let stsd = open_box(buf, b"stsd");
    buf.put_u32(0);
    buf.put_u32(1); // entry count
    let entry = open_box(buf, &track.format);
    buf.put_slice(&[0; 6]); // reserved
    buf.put_u16(1); // data reference index
    if track.handler.is_audio() {
        buf.put_u64(0); // reserved
        buf.put_u16(2); // channel count
        buf.put_u16(16); // sample size
        buf.put_u32(0); // pre_defined + reserved
        buf.put_u32(track.timescale.min(0xffff) << 16);
    } else {
        buf.put_slice(&[0; 16]); // pre_defined + reserved
        buf.put_u16(track.width);
        buf.put_u16(track.height);
        buf.put_u32(0x00480000); // 72 dpi
        buf.put_u32(0x00480000);
        buf.put_u32(0); // reserved
        buf.put_u16(1); // frame count
        buf.put_slice(&[0; 32]); // compressor name
        buf.put_u16(0x0018); // depth
        buf.put_i16(-1); // pre_defined
    }
    for (kind, payload) in &track.extra_boxes {
        let child = open_box(buf, &kind.0);
        buf.put_slice(payload);
        close_box(buf, child);
    }
    close_box(buf, entry);
    close_box(buf, stsd);

    // stts: run-length encoded durations
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for sample in &track.samples {
        match runs.last_mut() {
            Some((count, delta)) if *delta == sample.duration => *count += 1,
            _ => runs.push((1, sample.duration)),
        }
    }
    let stts = open_box(buf, b"stts");
    buf.put_u32(0);
    buf.put_u32(runs.len() as u32);
    for (count, delta) in &runs {
        buf.put_u32(*count);
        buf.put_u32(*delta);
    }
    close_box(buf, stts);

    if track.samples.iter().any(|s| s.cts_offset != 0) {
        let signed = track.samples.iter().any(|s| s.cts_offset < 0);
        let ctts = open_box(buf, b"ctts");
        buf.put_u8(if signed { 1 } else { 0 });
        buf.put_slice(&[0, 0, 0]);
        buf.put_u32(track.samples.len() as u32);
        for sample in &track.samples {
            buf.put_u32(1);
            buf.put_i32(sample.cts_offset);
        }
        close_box(buf, ctts);
    }

    if track.samples.iter().any(|s| !s.is_sync) {
        let sync: Vec<u32> = track
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_sync)
            .map(|(i, _)| i as u32 + 1)
            .collect();
        let stss = open_box(buf, b"stss");
        buf.put_u32(0);
        buf.put_u32(sync.len() as u32);
        for number in sync {
            buf.put_u32(number);
        }
        close_box(buf, stss);
    }

    let stsc = open_box(buf, b"stsc");
    buf.put_u32(0);
    if track.samples.is_empty() {
        buf.put_u32(0);
    } else {
        buf.put_u32(1);
        buf.put_u32(1); // first chunk
        buf.put_u32(track.samples.len() as u32);
        buf.put_u32(1); // sample description index
    }
    close_box(buf, stsc);

    let stsz = open_box(buf, b"stsz");
    buf.put_u32(0);
    buf.put_u32(0); // sizes follow per sample
    buf.put_u32(track.samples.len() as u32);
    for sample in &track.samples {
        buf.put_u32(sample.data.len() as u32);
    }
    close_box(buf, stsz);

    let stco = open_box(buf, b"stco");
    buf.put_u32(0);
    if track.samples.is_empty() {
        buf.put_u32(0);
    } else {
        buf.put_u32(1);
        buf.put_u32(chunk_offset);
    }
    close_box(buf, stco);

    close_box(buf, stbl);
}
