//! Read-only view over an embedded PCM asset.

use bytemuck::{Pod, Zeroable};

use crate::{Error, Result};

const BYTES_PER_SAMPLE: usize = 2;

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct ChunkHeader {
    id: [u8; 4],
    len: [u8; 4],
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct FmtChunk {
    format: [u8; 2],
    channels: [u8; 2],
    sample_rate: [u8; 4],
    byte_rate: [u8; 4],
    block_align: [u8; 2],
    bits_per_sample: [u8; 2],
}

const PCM_FORMAT: u16 = 1;

fn read<T: Pod>(data: &[u8], offset: usize) -> Option<T> {
    let end = offset.checked_add(core::mem::size_of::<T>())?;
    data.get(offset..end).map(bytemuck::pod_read_unaligned)
}

/// Mono signed 16 bit little endian samples with a read cursor.
///
/// The cursor only moves forward, and only by the number of samples `take`
/// actually returned.
#[derive(Clone)]
pub struct WaveformSource<'a> {
    pcm: &'a [u8],
    total_samples: usize,
    cursor: usize,
    sample_rate: Option<u32>,
}

impl<'a> WaveformSource<'a> {
    /// Skips a fixed size container header and treats the rest as samples.
    ///
    /// An asset shorter than the header has no samples. A trailing odd byte
    /// is ignored.
    pub fn new(asset: &'a [u8], header_len: usize) -> Self {
        let pcm = asset.get(header_len..).unwrap_or(&[]);
        Self::from_pcm(pcm)
    }

    /// Raw sample bytes without any header.
    pub fn from_pcm(pcm: &'a [u8]) -> Self {
        Self {
            pcm,
            total_samples: pcm.len() / BYTES_PER_SAMPLE,
            cursor: 0,
            sample_rate: None,
        }
    }

    /// Walks the RIFF chunks of a wave file and exposes its `data` chunk.
    ///
    /// Only mono 16 bit PCM is accepted. A `data` chunk that claims more bytes
    /// than the asset holds is clamped to the asset.
    pub fn from_wav(asset: &'a [u8]) -> Result<Self> {
        let riff: ChunkHeader = read(asset, 0).ok_or(Error::MalformedAsset)?;
        if &riff.id != b"RIFF" || asset.get(8..12) != Some(b"WAVE".as_slice()) {
            return Err(Error::MalformedAsset);
        }

        let mut offset = 12;
        let mut format: Option<FmtChunk> = None;
        while let Some(chunk) = read::<ChunkHeader>(asset, offset) {
            let body = offset + core::mem::size_of::<ChunkHeader>();
            let len = u32::from_le_bytes(chunk.len) as usize;
            match &chunk.id {
                b"fmt " => {
                    let fmt: FmtChunk = read(asset, body).ok_or(Error::MalformedAsset)?;
                    if u16::from_le_bytes(fmt.format) != PCM_FORMAT
                        || u16::from_le_bytes(fmt.channels) != 1
                        || u16::from_le_bytes(fmt.bits_per_sample) != config::FORMAT_BITS_PER_SAMPLE
                    {
                        return Err(Error::UnsupportedFormat);
                    }
                    format = Some(fmt);
                }
                b"data" => {
                    let fmt = format.ok_or(Error::MalformedAsset)?;
                    let end = body.saturating_add(len).min(asset.len());
                    let mut source = Self::from_pcm(&asset[body..end]);
                    source.sample_rate = Some(u32::from_le_bytes(fmt.sample_rate));
                    return Ok(source);
                }
                _ => {}
            }
            // Chunks are padded to an even length.
            offset = body.saturating_add(len).saturating_add(len & 1);
        }
        Err(Error::MalformedAsset)
    }

    /// Returns up to `n` samples starting at the cursor and advances the
    /// cursor past them. Fewer (possibly zero) samples signal exhaustion.
    pub fn take(&mut self, n: usize) -> Samples<'a> {
        let count = n.min(self.remaining());
        let start = self.cursor * BYTES_PER_SAMPLE;
        let bytes = &self.pcm[start..start + count * BYTES_PER_SAMPLE];
        self.cursor += count;
        Samples { bytes }
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.total_samples - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.total_samples
    }

    /// Sample rate declared by the container, if there was one.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Moves the cursor back to the first sample.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

/// A run of samples returned by [`WaveformSource::take`].
#[derive(Clone)]
pub struct Samples<'a> {
    bytes: &'a [u8],
}

impl Iterator for Samples<'_> {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let (sample, rest) = self.bytes.split_first_chunk::<BYTES_PER_SAMPLE>()?;
        self.bytes = rest;
        Some(i16::from_le_bytes(*sample))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.bytes.len() / BYTES_PER_SAMPLE;
        (len, Some(len))
    }
}

impl ExactSizeIterator for Samples<'_> {}
