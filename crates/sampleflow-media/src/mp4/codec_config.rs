//! Codec configuration records (avcC, hvcC, vpcC, av1C) and codec strings.

use super::{FourCc, RawBox, SampleDescription};
use bytes::Bytes;

/// Kind of decoder configuration record carried by a sample entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfigKind {
    Avc,
    Hevc,
    Vp9,
    Av1,
}

impl ConfigKind {
    /// Lookup order when one sample entry carries several records.
    pub const PRECEDENCE: [ConfigKind; 4] = [Self::Avc, Self::Hevc, Self::Vp9, Self::Av1];

    pub fn box_type(&self) -> FourCc {
        match self {
            Self::Avc => FourCc::AVCC,
            Self::Hevc => FourCc::HVCC,
            Self::Vp9 => FourCc::VPCC,
            Self::Av1 => FourCc::AV1C,
        }
    }
}

/// A decoder configuration record: the config box payload without its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    pub kind: ConfigKind,
    pub record: Bytes,
}

/// Find the first recognized configuration record across `entries`.
///
/// Entries are scanned in order; inside one entry the kinds are tried in
/// [`ConfigKind::PRECEDENCE`] order and the first hit wins.
pub fn find_codec_config(entries: &[SampleDescription]) -> Option<CodecConfig> {
    entries.iter().find_map(|entry| {
        ConfigKind::PRECEDENCE.iter().find_map(|kind| {
            entry.child(kind.box_type()).map(|b| CodecConfig {
                kind: *kind,
                record: b.payload.clone(),
            })
        })
    })
}

/// Build an RFC 6381 style codec string for a sample entry.
///
/// Falls back to the bare entry format when no usable record is present.
pub fn codec_string(format: FourCc, children: &[RawBox]) -> String {
    let base = format.as_str();
    let record = |kind: FourCc| {
        children
            .iter()
            .find(|b| b.kind == kind)
            .map(|b| &b.payload[..])
    };

    let detail = match &format.0 {
        b"avc1" | b"avc2" | b"avc3" | b"avc4" => record(FourCc::AVCC).and_then(avc_detail),
        b"hvc1" | b"hev1" => record(FourCc::HVCC).and_then(hevc_detail),
        b"vp08" | b"vp09" => record(FourCc::VPCC).and_then(vp9_detail),
        b"av01" => record(FourCc::AV1C).and_then(av1_detail),
        _ => None,
    };

    match detail {
        Some(detail) => format!("{}.{}", base, detail),
        None => base.to_string(),
    }
}

fn avc_detail(avcc: &[u8]) -> Option<String> {
    let [_, profile, compat, level, ..] = avcc else {
        return None;
    };
    Some(format!("{:02x}{:02x}{:02x}", profile, compat, level))
}

fn hevc_detail(hvcc: &[u8]) -> Option<String> {
    if hvcc.len() < 13 {
        return None;
    }
    let profile_space = hvcc[1] >> 6;
    let tier = (hvcc[1] >> 5) & 1;
    let profile_idc = hvcc[1] & 0x1f;
    let compat = u32::from_be_bytes([hvcc[2], hvcc[3], hvcc[4], hvcc[5]]).reverse_bits();
    let constraints = &hvcc[6..12];
    let level_idc = hvcc[12];

    let space = match profile_space {
        1 => "A",
        2 => "B",
        3 => "C",
        _ => "",
    };
    let mut out = format!(
        "{}{}.{:x}.{}{}",
        space,
        profile_idc,
        compat,
        if tier == 0 { 'L' } else { 'H' },
        level_idc
    );

    // Trailing zero constraint bytes are omitted.
    let used = constraints
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    for byte in &constraints[..used] {
        out.push_str(&format!(".{:x}", byte));
    }
    Some(out)
}

fn vp9_detail(vpcc: &[u8]) -> Option<String> {
    // version(1) + flags(3), then profile, level, bitDepth:4 | chroma:3 | range:1
    if vpcc.len() < 7 {
        return None;
    }
    let profile = vpcc[4];
    let level = vpcc[5];
    let bit_depth = vpcc[6] >> 4;
    Some(format!("{:02}.{:02}.{:02}", profile, level, bit_depth))
}

fn av1_detail(av1c: &[u8]) -> Option<String> {
    if av1c.len() < 3 {
        return None;
    }
    let seq_profile = av1c[1] >> 5;
    let seq_level_idx = av1c[1] & 0x1f;
    let tier = if av1c[2] & 0x80 != 0 { 'H' } else { 'M' };
    let high_bitdepth = av1c[2] & 0x40 != 0;
    let twelve_bit = av1c[2] & 0x20 != 0;
    let bit_depth = match (seq_profile, high_bitdepth, twelve_bit) {
        (2, true, true) => 12,
        (_, true, _) => 10,
        _ => 8,
    };
    Some(format!(
        "{}.{:02}{}.{:02}",
        seq_profile, seq_level_idx, tier, bit_depth
    ))
}
