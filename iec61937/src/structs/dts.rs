//! DTS core and extension substream headers.
//!
//! ## Sync Patterns
//!
//! | Packing          | Bytes                   |
//! |------------------|-------------------------|
//! | 16-bit BE        | `7F FE 80 01`           |
//! | 16-bit LE        | `FE 7F 01 80`           |
//! | 14-bit BE        | `1F FF E8 00 07 Fx`     |
//! | 14-bit LE        | `FF 1F 00 E8 Fx 07`     |
//! | substream (HD)   | `64 58 20 25`           |
//!
//! The core header is parsed after normalizing the first bytes to 16-bit
//! big-endian packing.

use crate::process::ByteOrder;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::convert::unpack_14bit;
use crate::utils::errors::HeaderError;

/// Bytes of normalized core header needed by [`DtsHeader::parse`].
pub const DTS_HEADER_SIZE: usize = 14;

/// Bytes of 14-bit packed input holding [`DTS_HEADER_SIZE`] normalized bytes.
pub const DTS_HEADER_SIZE_14BIT: usize = 16;

/// Bytes needed by [`DtsSubstreamHeader::parse`].
pub const DTS_SUBSTREAM_HEADER_SIZE: usize = 10;

pub const DTS_SUBSTREAM_SYNC: [u8; 4] = [0x64, 0x58, 0x20, 0x25];

const DTS_SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];

const DTS_AMODE_CHANNELS: [u8; 16] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 6, 6, 7, 8, 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtsSyncType {
    Core16BitBe,
    Core16BitLe,
    Core14BitBe,
    Core14BitLe,
    Substream,
}

impl DtsSyncType {
    pub fn detect(buf: &[u8]) -> Option<Self> {
        match buf {
            [0x7F, 0xFE, 0x80, 0x01, ..] => Some(Self::Core16BitBe),
            [0xFE, 0x7F, 0x01, 0x80, ..] => Some(Self::Core16BitLe),
            [0x1F, 0xFF, 0xE8, 0x00, 0x07, b5, ..] if b5 & 0xF0 == 0xF0 => {
                Some(Self::Core14BitBe)
            }
            [0xFF, 0x1F, 0x00, 0xE8, b4, 0x07, ..] if b4 & 0xF0 == 0xF0 => {
                Some(Self::Core14BitLe)
            }
            [0x64, 0x58, 0x20, 0x25, ..] => Some(Self::Substream),
            _ => None,
        }
    }

    pub fn is_core(self) -> bool {
        self != Self::Substream
    }

    pub fn is_14bit(self) -> bool {
        matches!(self, Self::Core14BitBe | Self::Core14BitLe)
    }

    /// Byte order of the 16-bit words in the source stream.
    pub fn source_order(self) -> ByteOrder {
        match self {
            Self::Core16BitLe | Self::Core14BitLe => ByteOrder::Little,
            Self::Core16BitBe | Self::Core14BitBe | Self::Substream => ByteOrder::Big,
        }
    }
}

/// Parsed DTS core frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtsHeader {
    pub sync: DtsSyncType,
    /// Core frame size in bytes of the source packing.
    pub frame_size: usize,
    /// Samples per channel in the frame.
    pub frame_length: u32,
    pub sample_rate: u32,
    pub amode: u8,
    pub lfe: bool,
}

impl DtsHeader {
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        let sync = DtsSyncType::detect(buf).ok_or_else(|| {
            HeaderError::InvalidDtsSync(
                buf.get(..4)
                    .map_or(0, |b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            )
        })?;

        let needed = match sync {
            DtsSyncType::Substream => return Err(HeaderError::MissingDtsCore),
            DtsSyncType::Core14BitBe | DtsSyncType::Core14BitLe => DTS_HEADER_SIZE_14BIT,
            DtsSyncType::Core16BitBe | DtsSyncType::Core16BitLe => DTS_HEADER_SIZE,
        };
        if buf.len() < needed {
            return Err(HeaderError::TooShort {
                needed,
                available: buf.len(),
            });
        }

        let mut header = [0u8; DTS_HEADER_SIZE];
        match sync {
            DtsSyncType::Core16BitBe => header.copy_from_slice(&buf[..DTS_HEADER_SIZE]),
            DtsSyncType::Core16BitLe => {
                for (dst, src) in header.chunks_exact_mut(2).zip(buf.chunks_exact(2)) {
                    dst[0] = src[1];
                    dst[1] = src[0];
                }
            }
            _ => {
                unpack_14bit(
                    &mut header,
                    &buf[..DTS_HEADER_SIZE_14BIT],
                    sync.source_order(),
                    ByteOrder::Big,
                )
                .map_err(|_| HeaderError::TooShort {
                    needed,
                    available: buf.len(),
                })?;
            }
        }

        let mut reader = BsIoSliceReader::from_slice(&header);
        reader.skip_n(32)?; // sync
        reader.skip_n(1 + 5 + 1)?; // ftype, short, cpf
        let nblks = reader.get_n::<u8>(7)?;
        let fsize = reader.get_n::<u16>(14)?;
        let amode = reader.get_n::<u8>(6)?;
        let sfreq = reader.get_n::<u8>(4)?;
        reader.skip_n(5)?; // rate
        reader.skip_n(1 + 1 + 1 + 1 + 1)?; // fixed, dynf, timef, auxf, hdcd
        reader.skip_n(3 + 1 + 1)?; // ext_audio_id, ext_audio, aspf
        let lff = reader.get_n::<u8>(2)?;

        if nblks < 5 {
            return Err(HeaderError::InvalidBlockCount(nblks));
        }
        if fsize < 95 {
            return Err(HeaderError::InvalidFrameSize(fsize));
        }

        let sample_rate = DTS_SAMPLE_RATES[sfreq as usize];
        if sample_rate == 0 {
            return Err(HeaderError::InvalidDtsSampleRate(sfreq));
        }

        let mut frame_size = fsize as usize + 1;
        if sync.is_14bit() {
            frame_size = frame_size * 16 / 14;
        }

        Ok(Self {
            sync,
            frame_size,
            frame_length: (nblks as u32 + 1) * 32,
            sample_rate,
            amode,
            lfe: lff != 0,
        })
    }

    pub fn channels(&self) -> u8 {
        DTS_AMODE_CHANNELS.get(self.amode as usize).copied().unwrap_or(0) + self.lfe as u8
    }
}

/// Parsed DTS-HD extension substream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtsSubstreamHeader {
    pub index: u8,
    pub header_size: usize,
    pub frame_size: usize,
}

impl DtsSubstreamHeader {
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if DtsSyncType::detect(buf) != Some(DtsSyncType::Substream) {
            return Err(HeaderError::InvalidDtsSync(buf.get(..4).map_or(0, |b| {
                u32::from_be_bytes([b[0], b[1], b[2], b[3]])
            })));
        }
        if buf.len() < DTS_SUBSTREAM_HEADER_SIZE {
            return Err(HeaderError::TooShort {
                needed: DTS_SUBSTREAM_HEADER_SIZE,
                available: buf.len(),
            });
        }

        let mut reader = BsIoSliceReader::from_slice(&buf[..DTS_SUBSTREAM_HEADER_SIZE]);
        reader.skip_n(32 + 8)?; // sync, user defined
        let index = reader.get_n::<u8>(2)?;
        let (header_bits, size_bits) = if reader.get()? { (12, 20) } else { (8, 16) };
        let header_size = reader.get_n::<u16>(header_bits)? as usize + 1;
        let frame_size = reader.get_n::<u32>(size_bits)? as usize + 1;

        Ok(Self {
            index,
            header_size,
            frame_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frames::{dts_core_frame, dts_substream, swap_pairs};
    use crate::utils::convert::pack_14bit;

    #[test]
    fn core_16bit_big_endian() -> anyhow::Result<()> {
        let frame = dts_core_frame(15, 1007, 13, 1);
        let header = DtsHeader::parse(&frame)?;

        assert_eq!(header.sync, DtsSyncType::Core16BitBe);
        assert_eq!(header.frame_size, 1008);
        assert_eq!(header.frame_length, 512);
        assert_eq!(header.sample_rate, 48000);
        assert_eq!(header.amode, 9);
        assert_eq!(header.channels(), 6);
        Ok(())
    }

    #[test]
    fn all_core_packings_agree() -> anyhow::Result<()> {
        let frame = dts_core_frame(31, 2015, 8, 0);
        let reference = DtsHeader::parse(&frame)?;
        assert_eq!(reference.frame_length, 1024);
        assert_eq!(reference.sample_rate, 44100);

        let le = DtsHeader::parse(&swap_pairs(&frame))?;
        assert_eq!(le.sync, DtsSyncType::Core16BitLe);
        assert_eq!(le.sync.source_order(), ByteOrder::Little);
        assert_eq!(le.frame_size, reference.frame_size);

        for order in [ByteOrder::Big, ByteOrder::Little] {
            let packed = pack_14bit(&frame, order);
            let header = DtsHeader::parse(&packed)?;
            assert!(header.sync.is_14bit());
            assert_eq!(header.sync.source_order(), order);
            assert_eq!(header.frame_size, 2016 * 16 / 14);
            assert_eq!(header.frame_size, packed.len());
            assert_eq!(header.frame_length, reference.frame_length);
        }
        Ok(())
    }

    #[test]
    fn rejects_bad_cores() {
        assert!(matches!(
            DtsHeader::parse(&dts_core_frame(4, 1007, 13, 0)),
            Err(HeaderError::InvalidBlockCount(4))
        ));
        assert!(matches!(
            DtsHeader::parse(&dts_core_frame(15, 94, 13, 0)),
            Err(HeaderError::InvalidFrameSize(94))
        ));
        assert!(matches!(
            DtsHeader::parse(&dts_core_frame(15, 1007, 4, 0)),
            Err(HeaderError::InvalidDtsSampleRate(4))
        ));
        assert!(matches!(
            DtsHeader::parse(&[0x7F, 0xFE, 0x80, 0x01, 0xFC]),
            Err(HeaderError::TooShort { .. })
        ));
        assert!(matches!(
            DtsHeader::parse(&dts_substream(200)),
            Err(HeaderError::MissingDtsCore)
        ));
    }

    #[test]
    fn substream_header() -> anyhow::Result<()> {
        let substream = dts_substream(3000);
        let header = DtsSubstreamHeader::parse(&substream)?;

        assert_eq!(header.frame_size, 3000);
        assert_eq!(header.frame_size, substream.len());
        assert_eq!(header.header_size, 16);
        Ok(())
    }
}
