//! Sample pipeline: byte stream in, codec configuration and encoded chunks out.
//!
//! A run pumps a byte stream into one [`Mp4Parser`](sampleflow_media::Mp4Parser),
//! resolves the first video track's decoder configuration when the container
//! becomes ready, and forwards every sample of that track as an
//! [`EncodedChunk`].

mod driver;
mod emitter;
mod error;
mod extractor;
mod reader;
mod types;

pub use driver::{Callbacks, Demuxer, PipelineState, RunSummary};
pub use emitter::chunk_from_sample;
pub use error::PipelineError;
pub use extractor::{resolve_track_config, SelectedTrack};
pub use reader::ContainerReader;
pub use types::{ChunkType, EncodedChunk, TrackConfig};
