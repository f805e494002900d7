//! Host-message worker.
//!
//! A host sends one [`WorkerRequest`] per line naming a file and a render
//! target; the worker demuxes the file through a [`FrameStage`] and answers
//! with one [`WorkerReply`] line.

mod processor;
mod stage;

pub use processor::{ProcessReport, VideoProcessor};
pub use stage::{ChunkLogStage, CountingStage, FrameStage, StageReport};

use crate::config::{Config, RenderTarget};
use crate::pipeline::Demuxer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

/// A request to process one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub file: PathBuf,
    /// Host canvas the frames are rendered onto
    pub canvas: RenderTarget,
    /// Encoder preset overriding the configured one
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub chunks: u64,
}

impl WorkerReply {
    pub fn done(chunks: u64) -> Self {
        Self {
            status: ReplyStatus::Done,
            message: None,
            chunks,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: Some(message.into()),
            chunks: 0,
        }
    }
}

pub struct Worker {
    config: Config,
}

impl Worker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Process one request. Failures become error replies.
    pub async fn handle(&self, request: WorkerRequest) -> WorkerReply {
        match self.process(&request).await {
            Ok(report) => {
                tracing::info!(
                    file = ?request.file,
                    chunks = report.summary.chunks_emitted,
                    "request done"
                );
                WorkerReply::done(report.summary.chunks_emitted)
            }
            Err(err) => {
                tracing::error!(file = ?request.file, "request failed: {:#}", err);
                WorkerReply::error(format!("{:#}", err))
            }
        }
    }

    async fn process(&self, request: &WorkerRequest) -> Result<ProcessReport> {
        let encoder = match &request.preset {
            Some(name) => self.config.encoder.with_preset(name)?,
            None => self.config.encoder.clone(),
        };

        let file = tokio::fs::File::open(&request.file)
            .await
            .with_context(|| format!("Failed to open {:?}", request.file))?;
        let stream = ReaderStream::with_capacity(file, self.config.pipeline.read_chunk_size);

        let mut stage = CountingStage::for_canvas(request.canvas);
        VideoProcessor::new(Demuxer::from_config(&self.config.pipeline))
            .start(stream, &encoder, &mut stage)
            .await
    }

    /// Answer line-delimited JSON requests from `reader` until it closes.
    /// Returns the number of requests handled.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut handled = 0;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let reply = match serde_json::from_str::<WorkerRequest>(&line) {
                Ok(request) => self.handle(request).await,
                Err(err) => {
                    tracing::warn!("Malformed request: {}", err);
                    WorkerReply::error(format!("Malformed request: {}", err))
                }
            };

            let mut out = serde_json::to_vec(&reply)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
            handled += 1;
        }

        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_json() {
        assert_eq!(
            serde_json::to_string(&WorkerReply::done(3)).unwrap(),
            r#"{"status":"done","chunks":3}"#
        );
        let err = serde_json::to_value(WorkerReply::error("boom")).unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["message"], "boom");
    }

    #[test]
    fn test_request_preset_optional() {
        let request: WorkerRequest = serde_json::from_str(
            r#"{"file":"/tmp/a.mp4","canvas":{"width":320,"height":240}}"#,
        )
        .unwrap();
        assert_eq!(request.preset, None);
        assert_eq!(request.canvas.width, 320);
    }

    #[tokio::test]
    async fn test_missing_file_is_error_reply() {
        let worker = Worker::new(Config::default());
        let reply = worker
            .handle(WorkerRequest {
                file: PathBuf::from("/nonexistent/clip.mp4"),
                canvas: RenderTarget {
                    width: 320,
                    height: 240,
                },
                preset: None,
            })
            .await;
        assert_eq!(reply.status, ReplyStatus::Error);
        assert!(reply.message.unwrap().contains("Failed to open"));
    }
}
