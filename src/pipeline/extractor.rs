use super::{PipelineError, TrackConfig};
use sampleflow_media::{find_codec_config, ConfigKind, MovieInfo};

/// The track chosen for extraction and its decoder configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTrack {
    pub track_id: u32,
    pub kind: ConfigKind,
    pub config: TrackConfig,
}

/// Pick the first video track and resolve its configuration record.
pub fn resolve_track_config(info: &MovieInfo) -> Result<SelectedTrack, PipelineError> {
    let track = info
        .video_tracks()
        .next()
        .ok_or(PipelineError::NoVideoTrack)?;

    let record = find_codec_config(&track.sample_entries).ok_or(
        PipelineError::MissingCodecConfig {
            track_id: track.id,
        },
    )?;

    tracing::debug!(
        track_id = track.id,
        codec = %track.codec,
        record = ?record.kind,
        record_len = record.record.len(),
        "resolved decoder configuration"
    );

    Ok(SelectedTrack {
        track_id: track.id,
        kind: record.kind,
        config: TrackConfig {
            codec: track.codec.clone(),
            coded_width: track.width,
            coded_height: track.height,
            description: record.record,
            duration_secs: info.duration_secs(),
        },
    })
}
