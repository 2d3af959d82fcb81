use std::fmt::Display;

use log::Level;

use crate::utils::errors::EncapsulateError;

/// Raw elementary stream framing.
///
/// Provides the [`Extractor`](extract::Extractor) for finding sync patterns and
/// extracting individual [`Frame`](extract::Frame) objects from continuous bitstream data.
pub mod extract;

/// Fixed-capacity IEC 61937 burst construction.
///
/// Provides the [`PacketWriter`](writer::PacketWriter) and the finished
/// [`OutputPacket`](writer::OutputPacket).
pub mod writer;

/// Per-stream encapsulation state machine.
///
/// Provides the [`Encapsulator`](encapsulate::Encapsulator) that routes frames to the
/// codec-specific burst builders below.
pub mod encapsulate;

pub mod ac3;
pub mod dts;
pub mod dtshd;
pub mod eac3;
pub mod truehd;

/// Sample rate of an IEC 60958 link carrying two 16-bit channels.
pub const IEC958_RATE: u32 = 48_000;

/// Bytes per IEC 60958 frame of a two-channel link.
pub const IEC958_FRAME_BYTES: u32 = 4;

/// Compressed formats accepted by the encapsulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Ac3,
    Eac3,
    Dts,
    TrueHd,
    Mlp,
}

impl Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Codec::Ac3 => "AC-3",
            Codec::Eac3 => "E-AC-3",
            Codec::Dts => "DTS",
            Codec::TrueHd => "TrueHD",
            Codec::Mlp => "MLP",
        };
        write!(f, "{name}")
    }
}

/// Byte order of the 16-bit words on the link.
///
/// `Little` corresponds to the SPDIFL sample format, `Big` to SPDIFB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    #[inline(always)]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    #[inline(always)]
    pub fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }

    pub fn from_big_endian(big_endian: bool) -> Self {
        if big_endian {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

impl Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOrder::Little => write!(f, "little-endian"),
            ByteOrder::Big => write!(f, "big-endian"),
        }
    }
}

/// IEC 61937 burst data types (`Pc` bits 0-6).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    Ac3 = 0x01,
    Dts1 = 0x0B,
    Dts2 = 0x0C,
    Dts3 = 0x0D,
    DtsHd = 0x11,
    Eac3 = 0x15,
    TrueHd = 0x16,
}

impl DataType {
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Looks up the data type from a full `Pc` word, ignoring the type-dependent
    /// upper byte.
    pub fn from_pc(pc: u16) -> Option<Self> {
        Some(match pc & 0x7F {
            0x01 => DataType::Ac3,
            0x0B => DataType::Dts1,
            0x0C => DataType::Dts2,
            0x0D => DataType::Dts3,
            0x11 => DataType::DtsHd,
            0x15 => DataType::Eac3,
            0x16 => DataType::TrueHd,
            _ => return None,
        })
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Ac3 => "AC-3",
            DataType::Dts1 => "DTS type I",
            DataType::Dts2 => "DTS type II",
            DataType::Dts3 => "DTS type III",
            DataType::DtsHd => "DTS-HD",
            DataType::Eac3 => "E-AC-3",
            DataType::TrueHd => "MAT",
        };
        write!(f, "{name}")
    }
}

/// Per-stream encapsulation settings.
///
/// ```rust
/// use iec61937::process::{ByteOrder, Codec, StreamConfig};
///
/// let config = StreamConfig::new(Codec::Dts)
///     .with_output_rate(192_000)
///     .with_byte_order(ByteOrder::Big);
///
/// assert!(config.is_high_bitrate());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub codec: Codec,
    pub byte_order: ByteOrder,
    /// Sample rate of the link. DTS above 48 kHz is sent as DTS-HD.
    pub output_rate: u32,
    /// Bytes per link frame, used for the DTS-HD sample count.
    pub bytes_per_frame: u32,
    /// Validation problems at or above this severity are returned as errors.
    pub fail_level: Level,
}

impl StreamConfig {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            byte_order: ByteOrder::default(),
            output_rate: IEC958_RATE,
            bytes_per_frame: IEC958_FRAME_BYTES,
            fail_level: Level::Error,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_output_rate(mut self, output_rate: u32) -> Self {
        self.output_rate = output_rate;
        self
    }

    pub fn with_bytes_per_frame(mut self, bytes_per_frame: u32) -> Self {
        self.bytes_per_frame = bytes_per_frame;
        self
    }

    pub fn with_fail_level(mut self, fail_level: Level) -> Self {
        self.fail_level = fail_level;
        self
    }

    pub fn is_high_bitrate(&self) -> bool {
        self.output_rate > IEC958_RATE
    }

    /// Size that every burst of the stream is a multiple of.
    ///
    /// DTS bursts are at least 512 link frames long and grow in powers of two.
    pub fn burst_alignment(&self) -> usize {
        match self.codec {
            Codec::Ac3 => ac3::AC3_BURST_SIZE,
            Codec::Eac3 => eac3::EAC3_BURST_SIZE,
            Codec::Dts => (512 * IEC958_FRAME_BYTES) as usize,
            Codec::TrueHd | Codec::Mlp => truehd::MAT_PACKET_SIZE,
        }
    }

    pub fn validate(&self) -> Result<(), EncapsulateError> {
        if self.output_rate == 0 {
            return Err(EncapsulateError::InvalidConfig("output rate must be non-zero"));
        }
        if self.bytes_per_frame == 0 || !self.bytes_per_frame.is_multiple_of(2) {
            return Err(EncapsulateError::InvalidConfig(
                "bytes per frame must be a non-zero multiple of 2",
            ));
        }
        Ok(())
    }
}

/// Outcome of feeding one frame to a codec encapsulator.
#[derive(Debug)]
pub enum Verdict {
    Packet(writer::OutputPacket),
    NeedMore,
}

#[test]
fn config_validation() {
    assert!(StreamConfig::new(Codec::Ac3).validate().is_ok());
    assert!(
        StreamConfig::new(Codec::Ac3)
            .with_output_rate(0)
            .validate()
            .is_err()
    );
    assert!(
        StreamConfig::new(Codec::Dts)
            .with_bytes_per_frame(3)
            .validate()
            .is_err()
    );
    assert!(!StreamConfig::new(Codec::Dts).is_high_bitrate());
}

#[test]
fn burst_alignment_per_codec() {
    assert_eq!(StreamConfig::new(Codec::Ac3).burst_alignment(), 6144);
    assert_eq!(StreamConfig::new(Codec::Eac3).burst_alignment(), 24576);
    assert_eq!(StreamConfig::new(Codec::Dts).burst_alignment(), 2048);
    assert_eq!(
        StreamConfig::new(Codec::Dts)
            .with_output_rate(192_000)
            .burst_alignment(),
        2048
    );
    assert_eq!(StreamConfig::new(Codec::Mlp).burst_alignment(), 61440);
}

#[test]
fn data_type_lookup_ignores_subtype() {
    assert_eq!(DataType::from_pc(0x0701), Some(DataType::Ac3));
    assert_eq!(DataType::from_pc(0x0211), Some(DataType::DtsHd));
    assert_eq!(DataType::from_pc(0x0016), Some(DataType::TrueHd));
    assert_eq!(DataType::from_pc(0x0000), None);
}
