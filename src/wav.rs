use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use log::warn;

use spdifd_macros::{ToBytes, riff_chunk};

pub const WAVE_FORMAT_PCM: u16 = 1;

/// Size of the canonical RIFF/WAVE header written by [`WavWriter`].
pub const WAV_HEADER_SIZE: u64 = 44;

/// A RIFF sub-chunk with a four-byte id and a little-endian body.
pub trait RiffChunk {
    fn chunk_id(&self) -> &[u8; 4];
    fn chunk_data(&self) -> Vec<u8>;

    fn write_all<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let data = self.chunk_data();
        writer.write_all(self.chunk_id())?;
        writer.write_all(&(data.len() as u32).to_le_bytes())?;
        writer.write_all(&data)?;
        if data.len() % 2 == 1 {
            writer.write_all(&[0])?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, ToBytes)]
#[riff_chunk(b"fmt ")]
pub struct FormatChunk {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatChunk {
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        let block_align = channels * 2;
        Self {
            format_tag: WAVE_FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: 16,
        }
    }

    /// Whether bursts of `burst_alignment` bytes hold whole PCM frames.
    pub fn fits_bursts(&self, burst_alignment: usize) -> bool {
        self.block_align != 0 && burst_alignment % self.block_align as usize == 0
    }
}

/// RIFF/WAVE writer for 16-bit PCM carrying an IEC 61937 stream.
///
/// Sizes are patched in [`finish`](WavWriter::finish); streams beyond 4 GiB keep the
/// maximum size in the header.
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    format: FormatChunk,
    data_written: u64,
}

impl<W: Write + Seek> WavWriter<W> {
    /// Creates the writer and emits the header with placeholder sizes.
    ///
    /// `burst_alignment` is the size every burst written later is a multiple of;
    /// it must hold a whole number of PCM frames.
    pub fn new(writer: W, format: FormatChunk, burst_alignment: usize) -> io::Result<Self> {
        if format.channels == 0 || format.channels % 2 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "IEC 61937 in WAVE needs an even number of channels",
            ));
        }
        if !format.fits_bursts(burst_alignment) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{burst_alignment} byte bursts do not fill whole {} channel frames",
                    format.channels
                ),
            ));
        }

        let mut writer = BufWriter::new(writer);
        writer.write_all(&crate::join_bytes_le!(*b"RIFF", 0u32, *b"WAVE"))?;
        format.write_all(&mut writer)?;
        writer.write_all(&crate::join_bytes_le!(*b"data", 0u32))?;

        Ok(Self {
            writer,
            format,
            data_written: 0,
        })
    }

    /// Appends one burst of link bytes.
    pub fn write_data(&mut self, data: &[u8]) -> io::Result<()> {
        debug_assert_eq!(data.len() % self.format.block_align as usize, 0);
        self.writer.write_all(data)?;
        self.data_written += data.len() as u64;
        Ok(())
    }

    /// Patches the RIFF and data chunk sizes.
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        let end = self.writer.stream_position()?;

        let riff_size = clamp_size(end - 8);
        let data_size = clamp_size(self.data_written);

        self.writer.seek(SeekFrom::Start(4))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(WAV_HEADER_SIZE - 4))?;
        self.writer.write_all(&data_size.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    pub fn data_written(&self) -> u64 {
        self.data_written
    }
}

fn clamp_size(size: u64) -> u32 {
    u32::try_from(size).unwrap_or_else(|_| {
        warn!("WAVE size field overflow, {size} bytes written");
        u32::MAX
    })
}
