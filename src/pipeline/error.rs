use std::io;
use thiserror::Error;

/// Reasons a pipeline run fails.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The byte stream itself failed.
    #[error("Stream read failed: {0}")]
    Stream(#[source] io::Error),

    /// The container parser rejected the input.
    #[error("Parse error: {0}")]
    Parse(#[source] sampleflow_media::Error),

    #[error("No video track found")]
    NoVideoTrack,

    #[error("Track {track_id}: avcC/hvcC/vpcC/av1C box not found")]
    MissingCodecConfig { track_id: u32 },
}

impl From<sampleflow_media::Error> for PipelineError {
    /// Pipeline errors raised inside parser callbacks come back wrapped in
    /// `Error::Handler`; unwrap them to their original variant.
    fn from(err: sampleflow_media::Error) -> Self {
        match err {
            sampleflow_media::Error::Handler(inner) => match inner.downcast::<PipelineError>() {
                Ok(pipeline) => *pipeline,
                Err(other) => PipelineError::Parse(sampleflow_media::Error::Handler(other)),
            },
            other => PipelineError::Parse(other),
        }
    }
}
