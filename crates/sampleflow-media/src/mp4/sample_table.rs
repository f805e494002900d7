//! MP4 sample table resolution.
//!
//! Sample tables describe how samples (frames) are organized in the file:
//! - stts: sample durations (decoding time)
//! - ctts: composition time offsets (for B-frames)
//! - stss: sync sample table (keyframes)
//! - stsc: sample-to-chunk mapping
//! - stsz: sample sizes
//! - stco/co64: chunk offsets

use crate::{Error, Result};

/// Most samples one track may declare.
pub const MAX_SAMPLES_PER_TRACK: u32 = 1 << 24;

/// A resolved sample with everything needed to cut it out of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Sample number (0-based, in decode order).
    pub number: u32,
    /// File offset where sample data starts.
    pub offset: u64,
    /// Sample size in bytes.
    pub size: u32,
    /// Decode timestamp in media timescale.
    pub dts: u64,
    /// Composition timestamp in media timescale (dts + ctts offset).
    pub cts: i64,
    /// Sample duration in media timescale.
    pub duration: u32,
    /// Whether this sample is a sync sample.
    pub is_sync: bool,
    /// 1-based index into the track's sample descriptions.
    pub description_index: u32,
}

/// Resolved sample table for one track.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub samples: Vec<SampleInfo>,
}

impl SampleTable {
    pub fn builder() -> SampleTableBuilder {
        SampleTableBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, number: usize) -> Option<&SampleInfo> {
        self.samples.get(number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleInfo> {
        self.samples.iter()
    }

    /// Smallest file offset among samples `from..`, per starting index.
    ///
    /// Entry `i` is the lowest offset any sample at or after `i` still needs,
    /// with a trailing `u64::MAX` sentinel for "nothing left".
    pub fn suffix_min_offsets(&self) -> Vec<u64> {
        let mut mins = vec![u64::MAX; self.samples.len() + 1];
        for i in (0..self.samples.len()).rev() {
            mins[i] = mins[i + 1].min(self.samples[i].offset);
        }
        mins
    }
}

/// Collects raw table entries from an `stbl` and resolves them into samples.
#[derive(Debug, Default)]
pub struct SampleTableBuilder {
    // (count, delta)
    stts_entries: Vec<(u32, u32)>,
    // (count, offset)
    ctts_entries: Vec<(u32, i32)>,
    // 1-based sample numbers; None when stss is absent
    sync_samples: Option<Vec<u32>>,
    // (first_chunk, samples_per_chunk, sample_description_index)
    stsc_entries: Vec<(u32, u32, u32)>,
    uniform_size: u32,
    sample_count: u32,
    sample_sizes: Vec<u32>,
    chunk_offsets: Vec<u64>,
}

impl SampleTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stts(&mut self, entries: Vec<(u32, u32)>) {
        self.stts_entries = entries;
    }

    pub fn set_ctts(&mut self, entries: Vec<(u32, i32)>) {
        self.ctts_entries = entries;
    }

    pub fn set_sync_samples(&mut self, samples: Vec<u32>) {
        self.sync_samples = Some(samples);
    }

    pub fn set_stsc(&mut self, entries: Vec<(u32, u32, u32)>) {
        self.stsc_entries = entries;
    }

    /// Set stsz data. `sizes` is empty when `uniform_size` is non-zero.
    pub fn set_stsz(&mut self, uniform_size: u32, sample_count: u32, sizes: Vec<u32>) {
        self.uniform_size = uniform_size;
        self.sample_count = sample_count;
        self.sample_sizes = sizes;
    }

    /// Set chunk offsets (from stco or co64).
    pub fn set_chunk_offsets(&mut self, offsets: Vec<u64>) {
        self.chunk_offsets = offsets;
    }

    /// Resolve every sample.
    ///
    /// The declared sample count must fit in the chunk map (`stsc` over
    /// `stco`/`co64`) and every sample must end inside the 64-bit file range.
    pub fn build(self) -> Result<SampleTable> {
        let sample_count = self.sample_count as usize;
        if sample_count == 0 || self.chunk_offsets.is_empty() {
            return Ok(SampleTable::default());
        }
        if self.sample_count > MAX_SAMPLES_PER_TRACK {
            return Err(Error::InvalidMp4(format!(
                "stsz declares {} samples, more than the limit of {}",
                self.sample_count, MAX_SAMPLES_PER_TRACK
            )));
        }
        let capacity = self.chunk_map_capacity();
        if capacity < self.sample_count as u64 {
            return Err(Error::InvalidMp4(format!(
                "stsz declares {} samples but the chunk map holds {}",
                self.sample_count, capacity
            )));
        }

        let mut samples = Vec::with_capacity(sample_count);
        let mut durations = expand_runs(&self.stts_entries);
        let mut cts_offsets = expand_runs(&self.ctts_entries);
        let mut sync = self.sync_samples.as_ref().map(|s| s.iter().peekable());
        let mut dts = 0u64;
        let mut number = 0u32;

        'chunks: for (entry_idx, &(first_chunk, per_chunk, desc_idx)) in
            self.stsc_entries.iter().enumerate()
        {
            let last_chunk = self
                .stsc_entries
                .get(entry_idx + 1)
                .map(|next| next.0.saturating_sub(1))
                .unwrap_or(self.chunk_offsets.len() as u32);

            for chunk in first_chunk.max(1)..=last_chunk {
                let Some(&chunk_base) = self.chunk_offsets.get(chunk as usize - 1) else {
                    break 'chunks;
                };
                let mut offset = chunk_base;
                for _ in 0..per_chunk {
                    if number as usize >= sample_count {
                        break 'chunks;
                    }
                    let size = if self.uniform_size > 0 {
                        self.uniform_size
                    } else {
                        self.sample_sizes.get(number as usize).copied().unwrap_or(0)
                    };
                    let end = offset.checked_add(size as u64).ok_or_else(|| {
                        Error::InvalidMp4(format!(
                            "sample {} at offset {} with size {} overflows the file range",
                            number, offset, size
                        ))
                    })?;
                    let duration = durations.next().unwrap_or(0);
                    let cts_offset = cts_offsets.next().unwrap_or(0);
                    let is_sync = match sync.as_mut() {
                        // No stss means every sample is a sync sample.
                        None => true,
                        Some(iter) => {
                            while iter.next_if(|&&n| n < number + 1).is_some() {}
                            iter.next_if(|&&n| n == number + 1).is_some()
                        }
                    };

                    samples.push(SampleInfo {
                        number,
                        offset,
                        size,
                        dts,
                        cts: dts as i64 + cts_offset as i64,
                        duration,
                        is_sync,
                        description_index: desc_idx,
                    });

                    offset = end;
                    dts += duration as u64;
                    number += 1;
                }
            }
        }

        Ok(SampleTable { samples })
    }

    /// Number of samples the chunk map can place, saturating on overflow.
    fn chunk_map_capacity(&self) -> u64 {
        let chunks = self.chunk_offsets.len() as u64;
        let mut total = 0u64;
        for (i, &(first_chunk, per_chunk, _)) in self.stsc_entries.iter().enumerate() {
            let first = first_chunk.max(1) as u64;
            let last = self
                .stsc_entries
                .get(i + 1)
                .map(|next| (next.0 as u64).saturating_sub(1))
                .unwrap_or(chunks)
                .min(chunks);
            if last >= first {
                total = total.saturating_add((last - first + 1).saturating_mul(per_chunk as u64));
            }
        }
        total
    }
}

fn expand_runs<T: Copy>(runs: &[(u32, T)]) -> impl Iterator<Item = T> + '_ {
    runs.iter()
        .flat_map(|&(count, value)| std::iter::repeat(value).take(count as usize))
}
