//! MLP / Dolby TrueHD access unit headers.
//!
//! ## Sync Patterns
//!
//! **Major Sync** (`0xF8726FBA` / `0xF8726FBB` at byte 4): stream configuration,
//! repeated at least every 128 access units.
//! **Minor Sync**: every access unit starts with a check nibble, the 12-bit access
//! unit length in 16-bit words and the 16-bit `input_timing` field.
//!
//! ## Format Types
//!
//! - **FBA Format** (`0xF8726FBA`): Dolby TrueHD
//! - **FBB Format** (`0xF8726FBB`): Meridian MLP

use crate::utils::errors::HeaderError;

/// Major sync pattern for FBA (Dolby) format streams.
pub const MAJOR_SYNC_FBA: u32 = 0xF8_72_6F_BA;

/// Major sync pattern for FBB (Meridian) format streams.
pub const MAJOR_SYNC_FBB: u32 = 0xF8_72_6F_BB;

/// Common prefix of both major sync patterns.
pub const MAJOR_SYNC_PREFIX: [u8; 3] = [0xF8, 0x72, 0x6F];

/// Base number of samples per access unit at 44.1/48 kHz.
pub const BASE_SAMPLES_PER_AU: u32 = 40;

/// Smallest access unit the encapsulator accepts.
pub const MLP_MIN_ACCESS_UNIT: usize = 10;

/// Stream parameters announced by a major sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MajorSync {
    pub format_sync: u32,
    /// `audio_sampling_frequency` code (4 bits).
    pub ratebits: u8,
}

impl MajorSync {
    /// Samples per access unit for this sampling frequency.
    pub fn samples_per_au(&self) -> u32 {
        BASE_SAMPLES_PER_AU << (self.ratebits & 3)
    }

    pub fn sampling_frequency(&self) -> Option<u32> {
        let base = match self.ratebits & 8 {
            0 => 48000,
            _ => 44100,
        };
        match self.ratebits {
            0..=2 | 8..=10 => Some(base << (self.ratebits & 7)),
            _ => None,
        }
    }

    pub fn is_truehd(&self) -> bool {
        self.format_sync == MAJOR_SYNC_FBA
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncInfo {
    Minor,
    Major(MajorSync),
    /// Major sync prefix followed by an unknown format byte.
    UnknownFormat(u8),
}

/// Parsed access unit header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessUnitHeader {
    /// Declared access unit length in bytes.
    pub length: usize,
    pub input_timing: u16,
    pub sync: SyncInfo,
}

impl AccessUnitHeader {
    /// Parses the minor sync and, when present, the start of the major sync.
    ///
    /// Requires [`MLP_MIN_ACCESS_UNIT`] bytes.
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < MLP_MIN_ACCESS_UNIT {
            return Err(HeaderError::TooShort {
                needed: MLP_MIN_ACCESS_UNIT,
                available: buf.len(),
            });
        }

        let length = ((u16::from_be_bytes([buf[0], buf[1]]) & 0xFFF) as usize) << 1;
        let input_timing = u16::from_be_bytes([buf[2], buf[3]]);

        let sync = if buf[4..7] == MAJOR_SYNC_PREFIX {
            let format_sync = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
            match format_sync {
                MAJOR_SYNC_FBA => SyncInfo::Major(MajorSync {
                    format_sync,
                    ratebits: buf[8] >> 4,
                }),
                MAJOR_SYNC_FBB => SyncInfo::Major(MajorSync {
                    format_sync,
                    ratebits: buf[9] >> 4,
                }),
                _ => SyncInfo::UnknownFormat(buf[7]),
            }
        } else {
            SyncInfo::Minor
        };

        Ok(Self {
            length,
            input_timing,
            sync,
        })
    }

    pub fn major_sync(&self) -> Option<&MajorSync> {
        match &self.sync {
            SyncInfo::Major(major) => Some(major),
            _ => None,
        }
    }
}

/// Length of the `major_sync_info` block following the format sync, in bytes.
///
/// Needs the first 31 bytes of a major sync access unit.
pub fn major_sync_info_len(buf: &[u8]) -> Option<usize> {
    let len = if buf.get(29)? & 0x01 == 0 {
        26
    } else {
        28 + ((buf.get(30)? >> 3) & 0x1E) as usize
    };

    Some(len)
}

/// Number of substreams announced by a major sync access unit.
pub fn major_sync_substreams(buf: &[u8]) -> Option<usize> {
    Some((buf.get(20)? >> 4) as usize)
}

/// Verifies the check nibble over the access unit header and substream directory.
///
/// Returns `None` when `buf` does not yet hold the whole directory.
pub fn check_nibble(buf: &[u8], substreams: usize) -> Option<bool> {
    let mut parity = buf.get(..4)?.iter().fold(0u8, |acc, b| acc ^ b);
    let mut offset = 4;

    if buf.get(4..7)? == MAJOR_SYNC_PREFIX {
        offset += major_sync_info_len(buf)? + 2;
    }

    for _ in 0..substreams {
        let words = if buf.get(offset)? & 0x80 != 0 { 4 } else { 2 };
        parity = buf
            .get(offset..offset + words)?
            .iter()
            .fold(parity, |acc, b| acc ^ b);
        offset += words;
    }

    Some(((parity >> 4) ^ parity) & 0xF == 0xF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frames::truehd_access_unit;

    #[test]
    fn major_sync_fields() -> anyhow::Result<()> {
        let unit = truehd_access_unit(Some(0), 0x1234, 200);
        let header = AccessUnitHeader::parse(&unit)?;

        assert_eq!(header.length, 200);
        assert_eq!(header.input_timing, 0x1234);
        let major = header
            .major_sync()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("major sync not detected"))?;
        assert!(major.is_truehd());
        assert_eq!(major.samples_per_au(), 40);
        assert_eq!(major.sampling_frequency(), Some(48000));
        Ok(())
    }

    #[test]
    fn rate_bits_select_samples_per_unit() -> anyhow::Result<()> {
        for (ratebits, samples, rate) in [(1, 80, 96000), (2, 160, 192000), (8, 40, 44100)] {
            let unit = truehd_access_unit(Some(ratebits), 0, 64);
            let header = AccessUnitHeader::parse(&unit)?;
            let major = header.major_sync().copied();
            assert_eq!(major.map(|m| m.samples_per_au()), Some(samples));
            assert_eq!(major.and_then(|m| m.sampling_frequency()), Some(rate));
        }
        Ok(())
    }

    #[test]
    fn fbb_rate_bits_come_from_byte_nine() -> anyhow::Result<()> {
        let mut unit = truehd_access_unit(Some(0), 0, 64);
        unit[7] = 0xBB;
        unit[8] = 0x20;
        unit[9] = 0x10;

        let header = AccessUnitHeader::parse(&unit)?;
        let major = header.major_sync().copied();
        assert_eq!(major.map(|m| m.ratebits), Some(1));
        assert_eq!(major.map(|m| m.is_truehd()), Some(false));
        Ok(())
    }

    #[test]
    fn minor_and_unknown_syncs() -> anyhow::Result<()> {
        let unit = truehd_access_unit(None, 40, 64);
        assert_eq!(AccessUnitHeader::parse(&unit)?.sync, SyncInfo::Minor);

        let mut unit = truehd_access_unit(Some(0), 40, 64);
        unit[7] = 0xBC;
        assert_eq!(
            AccessUnitHeader::parse(&unit)?.sync,
            SyncInfo::UnknownFormat(0xBC)
        );

        assert!(AccessUnitHeader::parse(&unit[..9]).is_err());
        Ok(())
    }

    #[test]
    fn check_nibble_covers_substream_directory() {
        // Header parity 0x0F over the first four bytes, one 2-byte directory entry.
        let unit = [0x0F, 0x00, 0x00, 0x00, 0x12, 0x12, 0xAA];
        assert_eq!(check_nibble(&unit, 1), Some(true));
        assert_eq!(check_nibble(&unit, 0), Some(true));

        let corrupt = [0x0E, 0x00, 0x00, 0x00, 0x12, 0x12, 0xAA];
        assert_eq!(check_nibble(&corrupt, 1), Some(false));

        assert_eq!(check_nibble(&unit[..5], 1), None);
    }
}
