//! Subscription interface between a container parser and its consumer.
//!
//! A parser accepts one [`ParserHandler`] before any bytes are appended.
//! Handler methods run synchronously inside [`ContainerParser::append_buffer`]
//! and [`ContainerParser::flush`], so a consumer paces the parser simply by
//! not appending the next chunk until the previous call has returned.

use crate::error::BoxError;
use crate::mp4::{MovieInfo, Sample};
use crate::Result;
use bytes::Bytes;

/// Default number of samples per `on_samples` batch.
pub const DEFAULT_SAMPLES_PER_BATCH: usize = 1000;

/// Options for sample extraction on one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Upper bound on samples per `on_samples` call.
    pub samples_per_batch: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            samples_per_batch: DEFAULT_SAMPLES_PER_BATCH,
        }
    }
}

/// Directive returned from [`ParserHandler::on_ready`]: extract this track
/// and start delivering its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    pub track_id: u32,
    pub options: ExtractionOptions,
}

impl Extraction {
    pub fn track(track_id: u32) -> Self {
        Self {
            track_id,
            options: ExtractionOptions::default(),
        }
    }
}

/// Event slots a parser calls back into.
pub trait ParserHandler {
    /// The container structure is known. Returning `Some` restricts
    /// extraction to one track and starts sample delivery in the same turn.
    fn on_ready(&mut self, info: &MovieInfo) -> std::result::Result<Option<Extraction>, BoxError>;

    /// A batch of samples for `track_id`, in decode order.
    fn on_samples(
        &mut self,
        track_id: u32,
        samples: Vec<Sample>,
    ) -> std::result::Result<(), BoxError>;

    /// A structural error occurred. The same error is also returned from the
    /// call that triggered it.
    fn on_error(&mut self, error: &crate::Error);
}

/// An incremental container parser.
pub trait ContainerParser<'h> {
    /// Register the event handler. Must be called before appending.
    fn subscribe(&mut self, handler: Box<dyn ParserHandler + Send + 'h>);

    /// Append the next chunk of the file. `file_start` must equal the total
    /// length of everything appended before.
    fn append_buffer(&mut self, chunk: Bytes, file_start: u64) -> Result<()>;

    /// Restrict sample extraction to `track_id`.
    fn set_extraction_options(&mut self, track_id: u32, options: ExtractionOptions) -> Result<()>;

    /// Begin delivering samples of the extracted track.
    fn start(&mut self);

    /// Signal end of stream: finalize pending structures and deliver every
    /// buffered sample.
    fn flush(&mut self) -> Result<()>;

    /// Container metadata, once ready.
    fn info(&self) -> Option<&MovieInfo>;
}
