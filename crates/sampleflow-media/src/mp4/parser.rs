//! Incremental MP4 parser.

use super::atoms::{box_end, BoxHeader};
use super::buffer::ByteWindow;
use super::moov::{parse_moov, Movie};
use super::{FourCc, MovieInfo, Sample};
use crate::demux::{ContainerParser, ExtractionOptions, ParserHandler};
use crate::{Error, Result};
use bytes::Bytes;

/// Maximum size of a box that must be buffered whole (64 MB) to prevent OOM
/// on malformed files. `mdat` is never buffered whole and is exempt.
pub const MAX_BOX_SIZE: u64 = 64 * 1024 * 1024;

/// Where the top-level box scan stands.
#[derive(Debug, Clone, Copy)]
enum Scan {
    /// Waiting for a box header at this offset.
    At(u64),
    /// A box without a declared size starts here and runs to end of stream.
    OpenEnded { offset: u64, header: BoxHeader },
}

#[derive(Debug)]
struct TrackExtraction {
    track_id: u32,
    table_index: usize,
    options: ExtractionOptions,
    /// Next sample number to collect.
    next: usize,
    min_offsets: Vec<u64>,
    pending: Vec<Sample>,
}

/// Parsed container handle fed by [`ContainerParser::append_buffer`].
pub struct Mp4Parser<'h> {
    window: ByteWindow,
    handler: Option<Box<dyn ParserHandler + Send + 'h>>,
    scan: Scan,
    movie: Option<Movie>,
    extraction: Option<TrackExtraction>,
    started: bool,
    flushed: bool,
    warned_fragments: bool,
}

impl Default for Mp4Parser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h> Mp4Parser<'h> {
    pub fn new() -> Self {
        Self {
            window: ByteWindow::new(),
            handler: None,
            scan: Scan::At(0),
            movie: None,
            extraction: None,
            started: false,
            flushed: false,
            warned_fragments: false,
        }
    }

    /// Bytes currently held in memory.
    pub fn buffered_bytes(&self) -> u64 {
        self.window.buffered()
    }

    /// Total bytes appended so far.
    pub fn bytes_received(&self) -> u64 {
        self.window.end()
    }

    fn append_inner(&mut self, chunk: Bytes, file_start: u64) -> Result<()> {
        if self.flushed {
            return Err(Error::Flushed);
        }
        self.window.push(chunk, file_start)?;
        self.scan_boxes()?;
        self.deliver(false)?;
        self.release();
        Ok(())
    }

    fn flush_inner(&mut self) -> Result<()> {
        if self.flushed {
            return Err(Error::Flushed);
        }
        self.flushed = true;
        self.scan_boxes()?;

        if let Scan::OpenEnded { offset, header } = self.scan {
            if header.kind == FourCc::MOOV && self.movie.is_none() {
                let start = offset + header.header_len as u64;
                let payload = self
                    .window
                    .read(start, self.window.end() - start)
                    .ok_or_else(|| Error::invalid_mp4("open-ended moov is no longer buffered"))?;
                self.on_moov(payload)?;
            }
        }

        if self.movie.is_none() {
            if self.window.end() == 0 {
                tracing::debug!("empty stream flushed");
                return Ok(());
            }
            if let Scan::At(offset) = self.scan {
                let mut raw = [0u8; 16];
                let n = self.window.peek(offset, &mut raw);
                if let Ok(Some(header)) = BoxHeader::parse(&raw[..n]) {
                    if header.kind == FourCc::MOOV {
                        return Err(Error::Truncated {
                            needed: header.size.unwrap_or(0),
                            available: self.window.end() - offset,
                        });
                    }
                }
            }
            return Err(Error::MissingAtom("moov"));
        }

        self.deliver(true)
    }

    /// Walk top-level boxes as far as the buffered bytes allow.
    fn scan_boxes(&mut self) -> Result<()> {
        while let Scan::At(offset) = self.scan {
            let mut raw = [0u8; 16];
            let n = self.window.peek(offset, &mut raw);
            let Some(header) = BoxHeader::parse(&raw[..n])? else {
                return Ok(());
            };

            let Some(size) = header.size else {
                tracing::trace!(kind = %header.kind, offset, "open-ended top-level box");
                self.scan = Scan::OpenEnded { offset, header };
                return Ok(());
            };

            if header.kind == FourCc::MOOV && self.movie.is_none() {
                if size > MAX_BOX_SIZE {
                    return Err(Error::InvalidMp4(format!(
                        "moov size {} exceeds maximum {}",
                        size, MAX_BOX_SIZE
                    )));
                }
                let end = box_end(offset, size, header.kind)?;
                let start = offset + header.header_len as u64;
                let Some(payload) = self.window.read(start, size - header.header_len as u64)
                else {
                    return Ok(());
                };
                self.scan = Scan::At(end);
                self.on_moov(payload)?;
                continue;
            }

            if header.kind == FourCc::MOOF && !self.warned_fragments {
                self.warned_fragments = true;
                tracing::warn!(offset, "fragmented MP4: samples in moof/mdat pairs are not extracted");
            }
            tracing::trace!(kind = %header.kind, offset, size, "top-level box");
            self.scan = Scan::At(box_end(offset, size, header.kind)?);
        }
        Ok(())
    }

    fn on_moov(&mut self, payload: Bytes) -> Result<()> {
        let movie = parse_moov(payload)?;
        tracing::debug!(
            tracks = movie.info.tracks.len(),
            duration = movie.info.duration,
            timescale = movie.info.timescale,
            "movie ready"
        );

        let info = &self.movie.insert(movie).info;
        let directive = match self.handler.as_mut() {
            Some(handler) => handler.on_ready(info).map_err(Error::Handler)?,
            None => None,
        };

        if let Some(extraction) = directive {
            self.set_extraction_options(extraction.track_id, extraction.options)?;
            self.start();
        }
        Ok(())
    }

    /// Collect every next sample whose bytes are buffered and hand full
    /// batches to the handler.
    fn deliver(&mut self, at_end: bool) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        let (Some(movie), Some(ex)) = (self.movie.as_ref(), self.extraction.as_mut()) else {
            return Ok(());
        };
        let timescale = movie.info.tracks[ex.table_index].timescale;
        let table = &movie.tables[ex.table_index];
        let batch = ex.options.samples_per_batch.max(1);

        while let Some(info) = table.get(ex.next) {
            let Some(data) = self.window.read(info.offset, info.size as u64) else {
                break;
            };
            ex.pending.push(Sample {
                track_id: ex.track_id,
                number: info.number,
                dts: info.dts,
                cts: info.cts,
                duration: info.duration,
                timescale,
                is_sync: info.is_sync,
                offset: info.offset,
                data,
            });
            ex.next += 1;

            if ex.pending.len() >= batch || ex.next == table.len() {
                let samples = std::mem::take(&mut ex.pending);
                if let Some(handler) = self.handler.as_mut() {
                    handler
                        .on_samples(ex.track_id, samples)
                        .map_err(Error::Handler)?;
                }
            }
        }

        if at_end {
            if !ex.pending.is_empty() {
                let samples = std::mem::take(&mut ex.pending);
                if let Some(handler) = self.handler.as_mut() {
                    handler
                        .on_samples(ex.track_id, samples)
                        .map_err(Error::Handler)?;
                }
            }
            if ex.next < table.len() {
                return Err(Error::IncompleteSamples {
                    track_id: ex.track_id,
                    delivered: ex.next as u64,
                    declared: table.len() as u64,
                });
            }
        }
        Ok(())
    }

    /// Drop buffered segments no pending sample or box header can need.
    fn release(&mut self) {
        if self.movie.is_none() {
            return;
        }
        let Some(ex) = self.extraction.as_ref() else {
            return;
        };
        let scan_floor = match self.scan {
            Scan::At(offset) => offset,
            Scan::OpenEnded { .. } => u64::MAX,
        };
        let floor = scan_floor.min(ex.min_offsets[ex.next]);
        if floor > self.window.start() {
            self.window.release_before(floor);
        }
    }

    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if !matches!(err, Error::Handler(_)) {
                if let Some(handler) = self.handler.as_mut() {
                    handler.on_error(err);
                }
            }
        }
        result
    }
}

impl<'h> ContainerParser<'h> for Mp4Parser<'h> {
    fn subscribe(&mut self, handler: Box<dyn ParserHandler + Send + 'h>) {
        self.handler = Some(handler);
    }

    fn append_buffer(&mut self, chunk: Bytes, file_start: u64) -> Result<()> {
        let result = self.append_inner(chunk, file_start);
        self.report(result)
    }

    fn set_extraction_options(&mut self, track_id: u32, options: ExtractionOptions) -> Result<()> {
        let movie = self
            .movie
            .as_ref()
            .ok_or_else(|| Error::unsupported("extraction options set before the movie is ready"))?;
        let table_index = movie
            .info
            .tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or_else(|| Error::invalid_mp4(format!("no track with id {}", track_id)))?;

        tracing::debug!(track_id, samples = movie.tables[table_index].len(), "extracting track");
        self.extraction = Some(TrackExtraction {
            track_id,
            table_index,
            options,
            next: 0,
            min_offsets: movie.tables[table_index].suffix_min_offsets(),
            pending: Vec::new(),
        });
        Ok(())
    }

    fn start(&mut self) {
        self.started = true;
    }

    fn flush(&mut self) -> Result<()> {
        let result = self.flush_inner();
        self.report(result)
    }

    fn info(&self) -> Option<&MovieInfo> {
        self.movie.as_ref().map(|m| &m.info)
    }
}
