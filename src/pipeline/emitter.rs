use super::{ChunkType, EncodedChunk};
use sampleflow_media::Sample;

/// Convert a parser sample into a chunk, moving its payload.
pub fn chunk_from_sample(sample: Sample) -> EncodedChunk {
    let (timestamp_us, duration_us) = if sample.timescale == 0 {
        (0.0, 0.0)
    } else {
        let timescale = sample.timescale as f64;
        (
            sample.cts as f64 * 1e6 / timescale,
            sample.duration as f64 * 1e6 / timescale,
        )
    };

    EncodedChunk {
        kind: if sample.is_sync {
            ChunkType::Key
        } else {
            ChunkType::Delta
        },
        timestamp_us,
        duration_us,
        payload: sample.data,
    }
}
