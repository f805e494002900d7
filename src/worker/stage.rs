//! Consumers of resolved configuration and encoded chunks.

use crate::config::{EncoderConfig, RenderTarget};
use crate::pipeline::{EncodedChunk, TrackConfig};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

/// Totals reported by a stage when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub chunks: u64,
    pub key_chunks: u64,
    pub bytes: u64,
}

impl StageReport {
    fn record(&mut self, chunk: &EncodedChunk) {
        self.chunks += 1;
        if chunk.is_key() {
            self.key_chunks += 1;
        }
        self.bytes += chunk.byte_length() as u64;
    }
}

/// The decode/render/encode seam.
///
/// `configure` is called once before the first `push`; `finish` once after
/// the last.
pub trait FrameStage {
    fn configure(&mut self, track: &TrackConfig, encoder: &EncoderConfig) -> Result<()>;

    fn push(&mut self, chunk: EncodedChunk) -> Result<()>;

    fn finish(&mut self) -> Result<StageReport>;
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum LogLine<'a> {
    Config {
        track: &'a TrackConfig,
        encoder: &'a EncoderConfig,
        target: RenderTarget,
    },
    Chunk(&'a EncodedChunk),
}

/// Writes one JSON object per line: a `config` event, then `chunk` events.
pub struct ChunkLogStage<W: Write> {
    out: W,
    report: StageReport,
}

impl<W: Write> ChunkLogStage<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            report: StageReport::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &LogLine<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, line).context("Failed to serialize log line")?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> FrameStage for ChunkLogStage<W> {
    fn configure(&mut self, track: &TrackConfig, encoder: &EncoderConfig) -> Result<()> {
        let target = encoder.target()?;
        self.write_line(&LogLine::Config {
            track,
            encoder,
            target,
        })
    }

    fn push(&mut self, chunk: EncodedChunk) -> Result<()> {
        self.report.record(&chunk);
        self.write_line(&LogLine::Chunk(&chunk))
    }

    fn finish(&mut self) -> Result<StageReport> {
        self.out.flush().context("Failed to flush chunk log")?;
        Ok(self.report.clone())
    }
}

/// Tallies chunks without producing output.
#[derive(Debug, Default)]
pub struct CountingStage {
    canvas: Option<RenderTarget>,
    config: Option<TrackConfig>,
    report: StageReport,
}

impl CountingStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stage that renders onto a fixed-size host canvas.
    pub fn for_canvas(canvas: RenderTarget) -> Self {
        Self {
            canvas: Some(canvas),
            ..Self::default()
        }
    }

    pub fn config(&self) -> Option<&TrackConfig> {
        self.config.as_ref()
    }
}

impl FrameStage for CountingStage {
    fn configure(&mut self, track: &TrackConfig, encoder: &EncoderConfig) -> Result<()> {
        if self.config.is_some() {
            anyhow::bail!("Stage configured twice");
        }
        let target = self.canvas.map_or_else(|| encoder.target(), Ok)?;
        tracing::debug!(
            codec = %track.codec,
            source_width = track.coded_width,
            source_height = track.coded_height,
            target_width = target.width,
            target_height = target.height,
            output = %encoder.codec,
            "stage configured"
        );
        self.config = Some(track.clone());
        Ok(())
    }

    fn push(&mut self, chunk: EncodedChunk) -> Result<()> {
        if self.config.is_none() {
            anyhow::bail!("Chunk received before configuration");
        }
        self.report.record(&chunk);
        Ok(())
    }

    fn finish(&mut self) -> Result<StageReport> {
        Ok(self.report.clone())
    }
}
