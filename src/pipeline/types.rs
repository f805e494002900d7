use bytes::Bytes;
use serde::{Serialize, Serializer};

/// Decoder configuration for the selected video track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackConfig {
    /// Codec string (e.g. `avc1.42c01e`)
    pub codec: String,
    pub coded_width: u32,
    pub coded_height: u32,
    /// Raw configuration record (avcC/hvcC/vpcC/av1C payload)
    #[serde(serialize_with = "serialize_hex")]
    pub description: Bytes,
    /// Movie duration in seconds
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Key,
    Delta,
}

/// One encoded sample ready for a decoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedChunk {
    #[serde(rename = "type")]
    pub kind: ChunkType,
    /// Presentation time in microseconds
    pub timestamp_us: f64,
    /// Duration in microseconds
    pub duration_us: f64,
    #[serde(rename = "byte_length", serialize_with = "serialize_len")]
    pub payload: Bytes,
}

impl EncodedChunk {
    pub fn is_key(&self) -> bool {
        self.kind == ChunkType::Key
    }

    pub fn byte_length(&self) -> usize {
        self.payload.len()
    }
}

fn serialize_hex<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

fn serialize_len<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(bytes.len() as u64)
}
