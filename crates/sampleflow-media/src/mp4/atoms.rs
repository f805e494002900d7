//! Box (atom) headers, four-character codes and bounds-checked field access.

use crate::{Error, Result};
use bytes::Bytes;

/// Four-character box type code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MOOF: Self = Self(*b"moof");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const MVEX: Self = Self(*b"mvex");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STTS: Self = Self(*b"stts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const CTTS: Self = Self(*b"ctts");
    pub const AVCC: Self = Self(*b"avcC");
    pub const HVCC: Self = Self(*b"hvcC");
    pub const VPCC: Self = Self(*b"vpcC");
    pub const AV1C: Self = Self(*b"av1C");
    pub const ESDS: Self = Self(*b"esds");

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Debug for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCc({})", self.as_str())
    }
}

/// Parsed box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Box type code.
    pub kind: FourCc,
    /// Total box size including the header. `None` means the box runs to
    /// the end of the enclosing data.
    pub size: Option<u64>,
    /// Size of the header (8 or 16 bytes).
    pub header_len: u8,
}

impl BoxHeader {
    /// Parse a box header from the start of `data`.
    ///
    /// Returns `Ok(None)` when `data` is too short to hold the header.
    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        if data.len() < 8 {
            return Ok(None);
        }
        let size32 = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let kind = FourCc([data[4], data[5], data[6], data[7]]);

        let header = match size32 {
            0 => Self {
                kind,
                size: None,
                header_len: 8,
            },
            1 => {
                if data.len() < 16 {
                    return Ok(None);
                }
                let mut ext = [0u8; 8];
                ext.copy_from_slice(&data[8..16]);
                Self {
                    kind,
                    size: Some(u64::from_be_bytes(ext)),
                    header_len: 16,
                }
            }
            n => Self {
                kind,
                size: Some(n as u64),
                header_len: 8,
            },
        };

        if let Some(size) = header.size {
            if size < header.header_len as u64 {
                return Err(Error::InvalidMp4(format!(
                    "box {} declares size {} smaller than its header",
                    kind, size
                )));
            }
        }

        Ok(Some(header))
    }

    /// Payload size (size minus header), if the size is known.
    pub fn payload_size(&self) -> Option<u64> {
        self.size.map(|s| s - self.header_len as u64)
    }
}

/// File offset one past a box of `size` bytes starting at `start`.
///
/// Sizes come straight from the file, so an end beyond `u64::MAX` is
/// reported as a malformed box instead of wrapping.
pub fn box_end(start: u64, size: u64, kind: FourCc) -> Result<u64> {
    start.checked_add(size).ok_or_else(|| {
        Error::InvalidMp4(format!(
            "box {} at offset {} declares size {} past the end of the 64-bit range",
            kind, start, size
        ))
    })
}

/// A child box kept as raw payload bytes (header stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBox {
    pub kind: FourCc,
    pub payload: Bytes,
}

/// Split a fully buffered container payload into its child boxes.
///
/// Returned payloads are zero-copy slices of `data`.
pub fn child_boxes(data: &Bytes) -> Result<Vec<RawBox>> {
    let mut boxes = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let header = BoxHeader::parse(&data[pos..])?.ok_or_else(|| {
            Error::InvalidMp4(format!(
                "{} trailing bytes do not form a box header",
                data.len() - pos
            ))
        })?;
        let size = match header.size {
            Some(size) => size,
            None => (data.len() - pos) as u64,
        };
        let end = box_end(pos as u64, size, header.kind)?;
        if end > data.len() as u64 {
            return Err(Error::InvalidMp4(format!(
                "box {} overruns its parent by {} bytes",
                header.kind,
                end - data.len() as u64
            )));
        }
        let end = end as usize;
        boxes.push(RawBox {
            kind: header.kind,
            payload: data.slice(pos + header.header_len as usize..end),
        });
        pos = end;
    }

    Ok(boxes)
}

/// Handler type for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum HandlerType {
    Video,
    Audio,
    Hint,
    Meta,
    Text,
    Unknown([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            b"soun" => Self::Audio,
            b"hint" => Self::Hint,
            b"meta" => Self::Meta,
            b"text" => Self::Text,
            _ => Self::Unknown(bytes),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

/// Bounds-checked big-endian reader over one box payload.
///
/// Every read past the end reports which box was short instead of panicking.
pub(crate) struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    kind: FourCc,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(kind: FourCc, data: &'a [u8]) -> Self {
        Self { data, pos: 0, kind }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::InvalidMp4(format!(
                "{} truncated: need {} bytes at offset {}, have {}",
                self.kind,
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    pub(crate) fn fourcc(&mut self) -> Result<[u8; 4]> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Read a full-box version/flags word, returning the version.
    pub(crate) fn full_box_version(&mut self) -> Result<u8> {
        let version = self.u8()?;
        self.skip(3)?;
        Ok(version)
    }

    /// Read an entry count and check that `entry_size * count` bytes follow.
    pub(crate) fn entry_count(&mut self, entry_size: usize) -> Result<usize> {
        let count = self.u32()? as usize;
        let needed = count.checked_mul(entry_size).unwrap_or(usize::MAX);
        if needed > self.remaining() {
            return Err(Error::InvalidMp4(format!(
                "{} declares {} entries but only {} bytes follow",
                self.kind,
                count,
                self.remaining()
            )));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_compact_header() {
        let data = [0, 0, 0, 24, b'f', b't', b'y', b'p'];
        let header = BoxHeader::parse(&data).unwrap().unwrap();
        assert_eq!(header.kind, FourCc::FTYP);
        assert_eq!(header.size, Some(24));
        assert_eq!(header.header_len, 8);
        assert_eq!(header.payload_size(), Some(16));
    }

    #[test]
    fn test_parse_large_header_needs_extension() {
        let mut data = vec![0, 0, 0, 1, b'm', b'd', b'a', b't'];
        assert!(BoxHeader::parse(&data).unwrap().is_none());

        data.extend_from_slice(&(1u64 << 33).to_be_bytes());
        let header = BoxHeader::parse(&data).unwrap().unwrap();
        assert_eq!(header.size, Some(1 << 33));
        assert_eq!(header.header_len, 16);
    }

    #[test]
    fn test_parse_open_ended_header() {
        let data = [0, 0, 0, 0, b'm', b'd', b'a', b't'];
        let header = BoxHeader::parse(&data).unwrap().unwrap();
        assert_eq!(header.size, None);
        assert_eq!(header.payload_size(), None);
    }

    #[test]
    fn test_undersized_box_is_rejected() {
        let data = [0, 0, 0, 4, b'f', b'r', b'e', b'e'];
        assert_matches!(BoxHeader::parse(&data), Err(Error::InvalidMp4(_)));
    }

    #[test]
    fn test_child_boxes_slices_payloads() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 10, b'a', b'v', b'c', b'C', 1, 2]);
        data.extend_from_slice(&[0, 0, 0, 8, b'f', b'r', b'e', b'e']);
        let children = child_boxes(&Bytes::from(data)).unwrap();

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].kind, FourCc::AVCC);
        assert_eq!(&children[0].payload[..], &[1, 2]);
        assert!(children[1].payload.is_empty());
    }

    #[test]
    fn test_child_box_overrun_is_rejected() {
        let data = Bytes::from_static(&[0, 0, 0, 40, b'a', b'v', b'c', b'C', 1, 2]);
        assert_matches!(child_boxes(&data), Err(Error::InvalidMp4(_)));
    }

    #[test]
    fn test_child_box_end_overflow_is_rejected() {
        let mut data = vec![0, 0, 0, 8, b'f', b'r', b'e', b'e'];
        data.extend_from_slice(&[0, 0, 0, 1, b'f', b'r', b'e', b'e']);
        data.extend_from_slice(&u64::MAX.to_be_bytes());
        let err = child_boxes(&Bytes::from(data)).unwrap_err();
        assert_matches!(err, Error::InvalidMp4(msg) if msg.contains("64-bit range"));
    }

    #[test]
    fn test_field_reader_reports_box() {
        let mut reader = FieldReader::new(FourCc::STTS, &[0, 0, 0, 5]);
        let err = reader.entry_count(8).unwrap_err();
        assert!(err.to_string().contains("stts"));
    }

    #[test]
    fn test_handler_type() {
        assert!(HandlerType::from_bytes(*b"vide").is_video());
        assert!(HandlerType::from_bytes(*b"soun").is_audio());
        assert_eq!(
            HandlerType::from_bytes(*b"abcd"),
            HandlerType::Unknown(*b"abcd")
        );
    }
}
