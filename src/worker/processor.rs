use super::stage::{FrameStage, StageReport};
use crate::config::EncoderConfig;
use crate::pipeline::{Callbacks, Demuxer, RunSummary};
use anyhow::Result;
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::io;

/// Result of feeding one file through a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub summary: RunSummary,
    pub stage: StageReport,
}

struct StageSlot<'s, F> {
    stage: &'s mut F,
    error: Option<anyhow::Error>,
}

impl<F: FrameStage> StageSlot<'_, F> {
    fn apply(&mut self, op: impl FnOnce(&mut F) -> Result<()>) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = op(&mut *self.stage) {
            tracing::warn!(error = %err, "stage rejected input");
            self.error = Some(err);
        }
    }
}

/// Drives a [`Demuxer`] into a [`FrameStage`].
#[derive(Debug, Clone, Default)]
pub struct VideoProcessor {
    demuxer: Demuxer,
}

impl VideoProcessor {
    pub fn new(demuxer: Demuxer) -> Self {
        Self { demuxer }
    }

    /// Demux `stream` and hand its configuration and chunks to `stage`.
    ///
    /// Stage failures do not interrupt demuxing; the first one fails the
    /// call once the run has finished.
    pub async fn start<S, F>(
        &self,
        stream: S,
        encoder: &EncoderConfig,
        stage: &mut F,
    ) -> Result<ProcessReport>
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
        F: FrameStage + Send,
    {
        let slot = Mutex::new(StageSlot { stage, error: None });

        let callbacks = Callbacks::new(
            |track| slot.lock().apply(|stage| stage.configure(&track, encoder)),
            |chunk| slot.lock().apply(|stage| stage.push(chunk)),
        );
        let summary = self.demuxer.run(stream, callbacks).await?;

        let slot = slot.into_inner();
        if let Some(err) = slot.error {
            return Err(err.context("Render stage failed"));
        }
        let stage = slot.stage.finish()?;

        Ok(ProcessReport { summary, stage })
    }
}
