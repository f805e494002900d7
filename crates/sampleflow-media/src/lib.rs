//! Sampleflow-Media: incremental MP4 parsing for the sample pipeline
//!
//! This crate provides the container side of sampleflow: a push-style MP4
//! parser that accepts a file chunk by chunk and reports track metadata and
//! samples through a subscribed handler.
//!
//! # Modules
//!
//! - `demux` - Subscription interface (`ContainerParser`, `ParserHandler`)
//! - `mp4` - MP4 box scanning, moov parsing, sample tables, codec records
//! - `mp4::writer` - Progressive MP4 serialization for fixtures
//!
//! # Architecture
//!
//! The parser never sees the whole file at once. Appended chunks are kept in
//! a byte window of reference-counted segments:
//!
//! 1. Top-level boxes are scanned as their headers arrive; `mdat` is skipped
//! 2. `moov` is parsed once complete and the handler's `on_ready` fires
//! 3. Samples of the extracted track are sliced out of the window (zero-copy
//!    when a sample lies within one segment) and delivered in batches
//! 4. Segments behind both the scan cursor and the next pending sample are
//!    released

pub mod demux;
pub mod error;
pub mod mp4;

pub use demux::{
    ContainerParser, Extraction, ExtractionOptions, ParserHandler, DEFAULT_SAMPLES_PER_BATCH,
};
pub use error::{BoxError, Error, Result};
pub use mp4::{
    find_codec_config, CodecConfig, ConfigKind, FourCc, HandlerType, MovieInfo, Mp4Parser, RawBox,
    Sample, SampleDescription, TrackDescriptor,
};
