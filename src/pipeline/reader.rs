use super::PipelineError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use sampleflow_media::ContainerParser;
use std::io;

/// Pumps a byte stream into a container parser.
///
/// The next chunk is only requested after the previous append returned, so
/// parser callbacks pace the source.
pub struct ContainerReader<P> {
    parser: P,
    position: u64,
}

impl<P> ContainerReader<P> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            position: 0,
        }
    }

    /// Bytes appended so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Append every chunk of `stream`, then flush. Returns the total byte count.
    pub async fn pump<'h, S>(&mut self, mut stream: S) -> Result<u64, PipelineError>
    where
        P: ContainerParser<'h>,
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PipelineError::Stream)?;
            if chunk.is_empty() {
                continue;
            }
            let len = chunk.len() as u64;
            self.parser.append_buffer(chunk, self.position)?;
            self.position += len;
            tracing::trace!(position = self.position, "appended chunk");
        }

        self.parser.flush()?;
        Ok(self.position)
    }
}
