//! AC-3 and E-AC-3 (A/52) syncframe headers.
//!
//! Both formats share the `0x0B77` syncword and place `bsid` in the top five bits
//! of byte 5. `bsid <= 10` selects the AC-3 syntax (`syncinfo` + `bsi`), `bsid`
//! 11 to 16 selects the E-AC-3 syntax.

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::HeaderError;

pub const A52_SYNC_WORD: u16 = 0x0B77;

/// Bytes needed to parse either header syntax.
pub const A52_HEADER_SIZE: usize = 8;

/// Audio blocks per AC-3 syncframe.
pub const AC3_BLOCKS: u32 = 6;

/// Samples per audio block.
pub const A52_BLOCK_SAMPLES: u32 = 256;

const AC3_SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];

const EAC3_REDUCED_SAMPLE_RATES: [u32; 3] = [24000, 22050, 16000];

const EAC3_BLOCKS: [u32; 4] = [1, 2, 3, 6];

/// AC-3 bitrate in kbit/s, indexed by `frmsizecod / 2`.
const AC3_BITRATES: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

/// Words per syncframe, indexed by `frmsizecod / 2`, one table per `fscod`.
const AC3_FRAME_WORDS: [[u16; 19]; 3] = [
    [
        64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 640, 768, 896, 1024, 1152,
        1280,
    ],
    [
        69, 87, 104, 121, 139, 174, 208, 243, 278, 348, 417, 487, 557, 696, 835, 975, 1114, 1253,
        1393,
    ],
    [
        96, 120, 144, 168, 192, 240, 288, 336, 384, 480, 576, 672, 768, 960, 1152, 1344, 1536,
        1728, 1920,
    ],
];

/// Full-bandwidth channels per `acmod`.
const ACMOD_CHANNELS: [u8; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eac3StreamType {
    Independent,
    Dependent,
    Ac3Convert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum A52Kind {
    Ac3,
    Eac3 {
        stream_type: Eac3StreamType,
        substream_id: u8,
    },
}

/// Parsed A/52 syncframe header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A52Header {
    pub kind: A52Kind,
    pub bsid: u8,
    /// Bitstream mode. Always 0 for E-AC-3, which carries it deeper in the BSI.
    pub bsmod: u8,
    pub acmod: u8,
    pub lfe: bool,
    /// Syncframe size in bytes.
    pub frame_size: usize,
    pub blocks: u32,
    pub samples: u32,
    pub sample_rate: u32,
    /// Bitrate in bit/s.
    pub bitrate: u32,
}

impl A52Header {
    /// Checks for the A/52 syncword at the start of `buf`.
    pub fn has_sync(buf: &[u8]) -> bool {
        buf.len() >= 2 && u16::from_be_bytes([buf[0], buf[1]]) == A52_SYNC_WORD
    }

    /// Parses the header at the start of `buf`.
    ///
    /// Only the first [`A52_HEADER_SIZE`] bytes are read; the caller checks that the
    /// buffer holds `frame_size` bytes.
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < A52_HEADER_SIZE {
            return Err(HeaderError::TooShort {
                needed: A52_HEADER_SIZE,
                available: buf.len(),
            });
        }

        let sync = u16::from_be_bytes([buf[0], buf[1]]);
        if sync != A52_SYNC_WORD {
            return Err(HeaderError::InvalidA52Sync(sync));
        }

        match buf[5] >> 3 {
            bsid @ 0..=10 => Self::parse_ac3(&buf[..A52_HEADER_SIZE], bsid),
            11..=16 => Self::parse_eac3(&buf[..A52_HEADER_SIZE]),
            bsid => Err(HeaderError::UnsupportedBsid(bsid)),
        }
    }

    fn parse_ac3(buf: &[u8], bsid: u8) -> Result<Self, HeaderError> {
        let mut reader = BsIoSliceReader::from_slice(buf);

        reader.skip_n(32)?; // syncword, crc1
        let fscod = reader.get_n::<u8>(2)?;
        let frmsizecod = reader.get_n::<u8>(6)?;
        reader.skip_n(5)?; // bsid
        let bsmod = reader.get_n::<u8>(3)?;
        let acmod = reader.get_n::<u8>(3)?;

        if fscod == 3 {
            return Err(HeaderError::ReservedSampleRateCode);
        }
        if frmsizecod >= 38 {
            return Err(HeaderError::InvalidFrameSizeCode(frmsizecod));
        }

        if acmod & 1 != 0 && acmod != 1 {
            reader.skip_n(2)?; // cmixlev
        }
        if acmod & 4 != 0 {
            reader.skip_n(2)?; // surmixlev
        }
        if acmod == 2 {
            reader.skip_n(2)?; // dsurmod
        }
        let lfe = reader.get()?;

        let index = (frmsizecod >> 1) as usize;
        let mut words = AC3_FRAME_WORDS[fscod as usize][index] as usize;
        if fscod == 1 && frmsizecod & 1 != 0 {
            words += 1;
        }

        // Half and quarter rate streams.
        let shift = bsid.max(8) - 8;

        Ok(Self {
            kind: A52Kind::Ac3,
            bsid,
            bsmod,
            acmod,
            lfe,
            frame_size: words * 2,
            blocks: AC3_BLOCKS,
            samples: AC3_BLOCKS * A52_BLOCK_SAMPLES,
            sample_rate: AC3_SAMPLE_RATES[fscod as usize] >> shift,
            bitrate: (AC3_BITRATES[index] * 1000) >> shift,
        })
    }

    fn parse_eac3(buf: &[u8]) -> Result<Self, HeaderError> {
        let mut reader = BsIoSliceReader::from_slice(buf);

        reader.skip_n(16)?; // syncword
        let stream_type = match reader.get_n::<u8>(2)? {
            0 => Eac3StreamType::Independent,
            1 => Eac3StreamType::Dependent,
            2 => Eac3StreamType::Ac3Convert,
            _ => return Err(HeaderError::ReservedStreamType),
        };
        let substream_id = reader.get_n::<u8>(3)?;
        let frmsiz = reader.get_n::<u16>(11)?;

        let (sample_rate, blocks) = match reader.get_n::<u8>(2)? {
            3 => {
                let fscod2 = reader.get_n::<u8>(2)?;
                if fscod2 == 3 {
                    return Err(HeaderError::ReservedReducedSampleRateCode);
                }
                (EAC3_REDUCED_SAMPLE_RATES[fscod2 as usize], 6)
            }
            fscod => {
                let numblkscod = reader.get_n::<u8>(2)?;
                (
                    AC3_SAMPLE_RATES[fscod as usize],
                    EAC3_BLOCKS[numblkscod as usize],
                )
            }
        };

        let acmod = reader.get_n::<u8>(3)?;
        let lfe = reader.get()?;
        let bsid = reader.get_n::<u8>(5)?;

        let frame_size = (frmsiz as usize + 1) * 2;
        let samples = blocks * A52_BLOCK_SAMPLES;

        Ok(Self {
            kind: A52Kind::Eac3 {
                stream_type,
                substream_id,
            },
            bsid,
            bsmod: 0,
            acmod,
            lfe,
            frame_size,
            blocks,
            samples,
            sample_rate,
            bitrate: (frame_size as u64 * 8 * sample_rate as u64 / samples as u64) as u32,
        })
    }

    pub fn is_eac3(&self) -> bool {
        matches!(self.kind, A52Kind::Eac3 { .. })
    }

    pub fn is_dependent(&self) -> bool {
        matches!(
            self.kind,
            A52Kind::Eac3 {
                stream_type: Eac3StreamType::Dependent,
                ..
            }
        )
    }

    pub fn channels(&self) -> u8 {
        ACMOD_CHANNELS[self.acmod as usize & 7] + self.lfe as u8
    }
}
