//! MP4 container parsing.
//!
//! [`Mp4Parser`] consumes a progressive MP4 incrementally: bytes are appended
//! as they arrive, the `moov` box is parsed as soon as it is complete, and
//! samples of the selected track are delivered once their payload bytes have
//! been buffered.

mod atoms;
mod buffer;
mod codec_config;
mod moov;
mod parser;
mod sample_table;
pub mod writer;

pub use atoms::{child_boxes, BoxHeader, FourCc, HandlerType, RawBox};
pub use buffer::ByteWindow;
pub use codec_config::{codec_string, find_codec_config, CodecConfig, ConfigKind};
pub use parser::{Mp4Parser, MAX_BOX_SIZE};
pub use sample_table::{SampleInfo, SampleTable, SampleTableBuilder, MAX_SAMPLES_PER_TRACK};

use bytes::Bytes;

/// Container-level metadata reported when the parser becomes ready.
#[derive(Debug, Clone)]
pub struct MovieInfo {
    /// Duration in movie timescale units.
    pub duration: u64,
    /// Movie timescale (time units per second).
    pub timescale: u32,
    /// Whether the movie carries an `mvex` box (fragmented MP4).
    pub is_fragmented: bool,
    /// Tracks in `moov` order.
    pub tracks: Vec<TrackDescriptor>,
}

impl MovieInfo {
    /// Get the duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// Video tracks in `moov` order.
    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.tracks.iter().filter(|t| t.kind.is_video())
    }

    pub fn track(&self, id: u32) -> Option<&TrackDescriptor> {
        self.tracks.iter().find(|t| t.id == id)
    }
}

/// One track of the container.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    /// Track ID.
    pub id: u32,
    /// Handler type (video/audio/etc).
    pub kind: HandlerType,
    /// Codec string derived from the first sample entry (e.g. `avc1.64001f`).
    pub codec: String,
    /// Coded width in pixels (video tracks).
    pub width: u32,
    /// Coded height in pixels (video tracks).
    pub height: u32,
    /// Media timescale (ticks per second for this track).
    pub timescale: u32,
    /// Track duration in media timescale.
    pub duration: u64,
    /// Number of samples in the sample table.
    pub sample_count: u32,
    /// Sample description (`stsd`) entries.
    pub sample_entries: Vec<SampleDescription>,
}

impl TrackDescriptor {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            kind: HandlerType::Unknown([0; 4]),
            codec: String::new(),
            width: 0,
            height: 0,
            timescale: 1,
            duration: 0,
            sample_count: 0,
            sample_entries: Vec::new(),
        }
    }

    /// Get duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }
}

/// One `stsd` entry with its child boxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDescription {
    /// Entry format (`avc1`, `hvc1`, `mp4a`, ...).
    pub format: FourCc,
    /// Width from a visual sample entry, 0 otherwise.
    pub width: u16,
    /// Height from a visual sample entry, 0 otherwise.
    pub height: u16,
    /// Child boxes following the fixed entry fields.
    pub children: Vec<RawBox>,
}

impl SampleDescription {
    /// First child box of the given type.
    pub fn child(&self, kind: FourCc) -> Option<&RawBox> {
        self.children.iter().find(|b| b.kind == kind)
    }
}

/// A decodable sample with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub track_id: u32,
    /// Sample number (0-based, decode order).
    pub number: u32,
    /// Decode timestamp in track timescale.
    pub dts: u64,
    /// Composition timestamp in track timescale.
    pub cts: i64,
    /// Duration in track timescale.
    pub duration: u32,
    /// Track timescale.
    pub timescale: u32,
    pub is_sync: bool,
    /// File offset of the payload.
    pub offset: u64,
    pub data: Bytes,
}
