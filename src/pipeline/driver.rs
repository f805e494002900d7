use super::emitter::chunk_from_sample;
use super::extractor::resolve_track_config;
use super::reader::ContainerReader;
use super::{EncodedChunk, PipelineError, TrackConfig};
use crate::config::PipelineConfig;
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use sampleflow_media::{
    BoxError, ContainerParser, Extraction, ExtractionOptions, MovieInfo, Mp4Parser, ParserHandler,
    Sample,
};
use serde::Serialize;
use std::io;
use std::sync::Arc;

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Reading,
    ConfigResolved,
    Emitting,
    Closed,
    Failed,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: PipelineState,
    pub bytes_read: u64,
    pub chunks_emitted: u64,
    pub key_chunks: u64,
    pub config_resolved: bool,
}

/// Consumer callbacks for one run.
pub struct Callbacks<'a> {
    /// Called exactly once, before any chunk.
    pub on_config: Box<dyn FnMut(TrackConfig) + Send + 'a>,
    /// Called once per sample, in parser order.
    pub on_chunk: Box<dyn FnMut(EncodedChunk) + Send + 'a>,
}

impl<'a> Callbacks<'a> {
    pub fn new(
        on_config: impl FnMut(TrackConfig) + Send + 'a,
        on_chunk: impl FnMut(EncodedChunk) + Send + 'a,
    ) -> Self {
        Self {
            on_config: Box::new(on_config),
            on_chunk: Box::new(on_chunk),
        }
    }
}

/// Turns byte streams into configuration and chunk callbacks.
#[derive(Debug, Clone, Default)]
pub struct Demuxer {
    options: ExtractionOptions,
}

impl Demuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ExtractionOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_options(ExtractionOptions {
            samples_per_batch: config.samples_per_batch,
        })
    }

    /// Run the pipeline over `stream` to completion.
    ///
    /// Resolves once the stream is exhausted and every buffered sample has
    /// been emitted, or fails on the first stream, parse, or configuration
    /// error. Dropping the future cancels the run.
    pub async fn run<'a, S>(
        &self,
        stream: S,
        callbacks: Callbacks<'a>,
    ) -> Result<RunSummary, PipelineError>
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        let progress = Arc::new(Mutex::new(RunSummary::default()));

        let mut parser = Mp4Parser::new();
        parser.subscribe(Box::new(Coordinator {
            progress: Arc::clone(&progress),
            callbacks,
            options: self.options,
            track_id: None,
        }));

        transition(&progress, PipelineState::Reading);
        let mut reader = ContainerReader::new(parser);
        let result = reader.pump(stream).await;
        let bytes_read = reader.position();
        drop(reader);

        let mut summary = progress.lock();
        summary.bytes_read = bytes_read;
        match result {
            Ok(_) => {
                summary.state = PipelineState::Closed;
                tracing::info!(
                    bytes = summary.bytes_read,
                    chunks = summary.chunks_emitted,
                    key_chunks = summary.key_chunks,
                    "pipeline run complete"
                );
                Ok(summary.clone())
            }
            Err(err) => {
                summary.state = PipelineState::Failed;
                tracing::debug!(bytes = bytes_read, error = %err, "pipeline run failed");
                Err(err)
            }
        }
    }
}

fn transition(progress: &Mutex<RunSummary>, state: PipelineState) {
    let mut summary = progress.lock();
    tracing::debug!(from = ?summary.state, to = ?state, "pipeline state");
    summary.state = state;
}

/// Parser subscriber that resolves configuration and emits chunks.
struct Coordinator<'a> {
    progress: Arc<Mutex<RunSummary>>,
    callbacks: Callbacks<'a>,
    options: ExtractionOptions,
    track_id: Option<u32>,
}

impl ParserHandler for Coordinator<'_> {
    fn on_ready(&mut self, info: &MovieInfo) -> Result<Option<Extraction>, BoxError> {
        let selected = resolve_track_config(info)?;

        {
            let mut summary = self.progress.lock();
            summary.config_resolved = true;
        }
        transition(&self.progress, PipelineState::ConfigResolved);
        (self.callbacks.on_config)(selected.config);

        self.track_id = Some(selected.track_id);
        transition(&self.progress, PipelineState::Emitting);
        Ok(Some(Extraction {
            track_id: selected.track_id,
            options: self.options,
        }))
    }

    fn on_samples(&mut self, track_id: u32, samples: Vec<Sample>) -> Result<(), BoxError> {
        if self.track_id != Some(track_id) {
            tracing::warn!(
                track_id,
                count = samples.len(),
                "ignoring samples for a track that is not being extracted"
            );
            return Ok(());
        }

        let mut emitted = 0u64;
        let mut keys = 0u64;
        for sample in samples {
            let chunk = chunk_from_sample(sample);
            emitted += 1;
            if chunk.is_key() {
                keys += 1;
            }
            (self.callbacks.on_chunk)(chunk);
        }

        let mut summary = self.progress.lock();
        summary.chunks_emitted += emitted;
        summary.key_chunks += keys;
        Ok(())
    }

    fn on_error(&mut self, error: &sampleflow_media::Error) {
        tracing::error!(error = %error, "container parse error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sampleflow_media::mp4::writer::{Mp4Writer, SampleSpec, TrackSpec};
    use sampleflow_media::ConfigKind;

    fn clip() -> Vec<u8> {
        Mp4Writer::new(1000, 100)
            .track(
                TrackSpec::video(*b"avc1", 64, 48, 1000)
                    .config(ConfigKind::Avc, vec![1, 0x42, 0xc0, 0x0a, 0xff])
                    .samples(vec![
                        SampleSpec::new(vec![1; 10], 50),
                        SampleSpec::new(vec![2; 10], 50).sync(false),
                    ]),
            )
            .build()
    }

    fn stream_of(data: Vec<u8>, chunk: usize) -> impl Stream<Item = io::Result<Bytes>> + Unpin {
        let chunks: Vec<io::Result<Bytes>> = data
            .chunks(chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures::stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let mut configs = 0;
        let mut chunks = Vec::new();
        let summary = Demuxer::new()
            .run(
                stream_of(clip(), 17),
                Callbacks::new(|_| configs += 1, |c| chunks.push(c)),
            )
            .await
            .unwrap();

        assert_eq!(configs, 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(summary.state, PipelineState::Closed);
        assert_eq!(summary.chunks_emitted, 2);
        assert_eq!(summary.key_chunks, 1);
        assert!(summary.config_resolved);
        assert_eq!(summary.bytes_read, clip().len() as u64);
    }

    #[tokio::test]
    async fn test_empty_stream_closes_without_callbacks() {
        let mut called = false;
        let mut chunked = false;
        let summary = Demuxer::new()
            .run(
                futures::stream::iter(Vec::<io::Result<Bytes>>::new()),
                Callbacks::new(|_| called = true, |_| chunked = true),
            )
            .await
            .unwrap();
        assert!(!called && !chunked);
        assert_eq!(summary.state, PipelineState::Closed);
        assert_eq!(summary.bytes_read, 0);
        assert!(!summary.config_resolved);
    }

    #[tokio::test]
    async fn test_missing_config_is_typed() {
        let data = Mp4Writer::new(1000, 100)
            .track(TrackSpec::video(*b"mp4v", 64, 48, 1000).samples(vec![SampleSpec::new(vec![0; 4], 100)]))
            .build();
        let err = Demuxer::new()
            .run(stream_of(data, 64), Callbacks::new(|_| {}, |_| {}))
            .await
            .unwrap_err();
        assert_matches!(err, PipelineError::MissingCodecConfig { track_id: 1 });
    }
}
