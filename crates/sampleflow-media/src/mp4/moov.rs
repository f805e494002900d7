//! Parsing of a fully buffered `moov` box into track metadata and sample tables.

use super::atoms::{child_boxes, FieldReader};
use super::codec_config::codec_string;
use super::{
    FourCc, HandlerType, MovieInfo, RawBox, SampleDescription, SampleTable, SampleTableBuilder,
    TrackDescriptor,
};
use crate::Result;
use bytes::Bytes;

/// Fixed VisualSampleEntry fields preceding child boxes.
const VISUAL_ENTRY_FIELDS: usize = 78;
/// Fixed AudioSampleEntry (version 0) fields preceding child boxes.
const AUDIO_ENTRY_FIELDS: usize = 28;

/// Parsed movie: public metadata plus one sample table per track.
#[derive(Debug)]
pub(crate) struct Movie {
    pub info: MovieInfo,
    pub tables: Vec<SampleTable>,
}

/// Parse the payload of a `moov` box.
pub(crate) fn parse_moov(payload: Bytes) -> Result<Movie> {
    let mut info = MovieInfo {
        duration: 0,
        timescale: 1000,
        is_fragmented: false,
        tracks: Vec::new(),
    };
    let mut tables = Vec::new();

    for child in child_boxes(&payload)? {
        match child.kind {
            FourCc::MVHD => parse_mvhd(&child, &mut info)?,
            FourCc::MVEX => info.is_fragmented = true,
            FourCc::TRAK => {
                let (track, table) = parse_trak(&child)?;
                tracing::trace!(
                    track_id = track.id,
                    handler = ?track.kind,
                    codec = %track.codec,
                    samples = table.len(),
                    "parsed trak"
                );
                info.tracks.push(track);
                tables.push(table);
            }
            _ => {}
        }
    }

    Ok(Movie { info, tables })
}

fn parse_mvhd(atom: &RawBox, info: &mut MovieInfo) -> Result<()> {
    let mut r = FieldReader::new(atom.kind, &atom.payload);
    if r.full_box_version()? == 1 {
        r.skip(16)?;
        info.timescale = r.u32()?;
        info.duration = r.u64()?;
    } else {
        r.skip(8)?;
        info.timescale = r.u32()?;
        info.duration = r.u32()? as u64;
    }
    Ok(())
}

fn parse_trak(trak: &RawBox) -> Result<(TrackDescriptor, SampleTable)> {
    let mut track = TrackDescriptor::new(0);
    let mut table = SampleTable::default();
    let mut tkhd_size = (0, 0);

    for child in child_boxes(&trak.payload)? {
        match child.kind {
            FourCc::TKHD => tkhd_size = parse_tkhd(&child, &mut track)?,
            FourCc::MDIA => table = parse_mdia(&child, &mut track)?,
            _ => {}
        }
    }

    // Prefer the coded size from the sample entry; fall back to tkhd.
    let coded = track
        .sample_entries
        .first()
        .map(|e| (e.width as u32, e.height as u32))
        .filter(|&(w, h)| w > 0 && h > 0);
    (track.width, track.height) = coded.unwrap_or(tkhd_size);
    track.sample_count = table.len() as u32;
    track.codec = track
        .sample_entries
        .first()
        .map(|e| codec_string(e.format, &e.children))
        .unwrap_or_default();

    Ok((track, table))
}

/// Returns the presentation size (16.16 fixed point, integer part).
fn parse_tkhd(atom: &RawBox, track: &mut TrackDescriptor) -> Result<(u32, u32)> {
    let mut r = FieldReader::new(atom.kind, &atom.payload);
    if r.full_box_version()? == 1 {
        r.skip(16)?;
        track.id = r.u32()?;
        r.skip(4 + 8)?;
    } else {
        r.skip(8)?;
        track.id = r.u32()?;
        r.skip(4 + 4)?;
    }
    // reserved(8) layer(2) alternate_group(2) volume(2) reserved(2) matrix(36)
    r.skip(8 + 2 + 2 + 2 + 2 + 36)?;
    let width = r.u32()? >> 16;
    let height = r.u32()? >> 16;
    Ok((width, height))
}

fn parse_mdia(mdia: &RawBox, track: &mut TrackDescriptor) -> Result<SampleTable> {
    let children = child_boxes(&mdia.payload)?;

    // hdlr decides how stsd entries are laid out, so read it first.
    for child in &children {
        match child.kind {
            FourCc::MDHD => parse_mdhd(child, track)?,
            FourCc::HDLR => {
                let mut r = FieldReader::new(child.kind, &child.payload);
                r.skip(8)?;
                track.kind = HandlerType::from_bytes(r.fourcc()?);
            }
            _ => {}
        }
    }

    let mut table = SampleTable::default();
    for child in &children {
        if child.kind == FourCc::MINF {
            for stbl in child_boxes(&child.payload)? {
                if stbl.kind == FourCc::STBL {
                    table = parse_stbl(&stbl, track)?;
                }
            }
        }
    }
    Ok(table)
}

fn parse_mdhd(atom: &RawBox, track: &mut TrackDescriptor) -> Result<()> {
    let mut r = FieldReader::new(atom.kind, &atom.payload);
    if r.full_box_version()? == 1 {
        r.skip(16)?;
        track.timescale = r.u32()?;
        track.duration = r.u64()?;
    } else {
        r.skip(8)?;
        track.timescale = r.u32()?;
        track.duration = r.u32()? as u64;
    }
    Ok(())
}

fn parse_stbl(stbl: &RawBox, track: &mut TrackDescriptor) -> Result<SampleTable> {
    let mut builder = SampleTableBuilder::new();

    for child in child_boxes(&stbl.payload)? {
        let mut r = FieldReader::new(child.kind, &child.payload);
        match child.kind {
            FourCc::STSD => {
                track.sample_entries = parse_stsd(&child, track.kind)?;
            }
            FourCc::STTS => {
                r.full_box_version()?;
                let count = r.entry_count(8)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push((r.u32()?, r.u32()?));
                }
                builder.set_stts(entries);
            }
            FourCc::CTTS => {
                let version = r.full_box_version()?;
                let count = r.entry_count(8)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let n = r.u32()?;
                    // Version 0 offsets are unsigned but are written as
                    // signed by many muxers; both read the same bits.
                    let offset = if version == 0 {
                        r.u32()? as i32
                    } else {
                        r.i32()?
                    };
                    entries.push((n, offset));
                }
                builder.set_ctts(entries);
            }
            FourCc::STSS => {
                r.full_box_version()?;
                let count = r.entry_count(4)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(r.u32()?);
                }
                builder.set_sync_samples(entries);
            }
            FourCc::STSC => {
                r.full_box_version()?;
                let count = r.entry_count(12)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push((r.u32()?, r.u32()?, r.u32()?));
                }
                builder.set_stsc(entries);
            }
            FourCc::STSZ => {
                r.full_box_version()?;
                let uniform = r.u32()?;
                let count = if uniform == 0 {
                    r.entry_count(4)?
                } else {
                    r.u32()? as usize
                };
                let mut sizes = Vec::new();
                if uniform == 0 {
                    sizes.reserve(count);
                    for _ in 0..count {
                        sizes.push(r.u32()?);
                    }
                }
                builder.set_stsz(uniform, count as u32, sizes);
            }
            FourCc::STCO => {
                r.full_box_version()?;
                let count = r.entry_count(4)?;
                let mut offsets = Vec::with_capacity(count);
                for _ in 0..count {
                    offsets.push(r.u32()? as u64);
                }
                builder.set_chunk_offsets(offsets);
            }
            FourCc::CO64 => {
                r.full_box_version()?;
                let count = r.entry_count(8)?;
                let mut offsets = Vec::with_capacity(count);
                for _ in 0..count {
                    offsets.push(r.u64()?);
                }
                builder.set_chunk_offsets(offsets);
            }
            _ => {}
        }
    }

    builder.build()
}

fn parse_stsd(stsd: &RawBox, handler: HandlerType) -> Result<Vec<SampleDescription>> {
    let mut r = FieldReader::new(stsd.kind, &stsd.payload);
    r.full_box_version()?;
    let declared = r.u32()? as usize;

    let entries = child_boxes(&stsd.payload.slice(8..))?;
    if entries.len() != declared {
        tracing::debug!(
            declared,
            found = entries.len(),
            "stsd entry count mismatch"
        );
    }

    entries
        .into_iter()
        .map(|entry| parse_sample_entry(entry, handler))
        .collect()
}

fn parse_sample_entry(entry: RawBox, handler: HandlerType) -> Result<SampleDescription> {
    let mut description = SampleDescription {
        format: entry.kind,
        width: 0,
        height: 0,
        children: Vec::new(),
    };

    let fields = match handler {
        HandlerType::Video => VISUAL_ENTRY_FIELDS,
        HandlerType::Audio => AUDIO_ENTRY_FIELDS,
        _ => return Ok(description),
    };

    let mut r = FieldReader::new(entry.kind, &entry.payload);
    if handler.is_video() {
        // reserved(6) data_ref_index(2) pre_defined/reserved(16)
        r.skip(24)?;
        description.width = r.u16()?;
        description.height = r.u16()?;
    }
    if entry.payload.len() < fields {
        return Err(crate::Error::InvalidMp4(format!(
            "sample entry {} is {} bytes, shorter than its {} fixed bytes",
            entry.kind,
            entry.payload.len(),
            fields
        )));
    }
    description.children = child_boxes(&entry.payload.slice(fields..))?;
    Ok(description)
}
