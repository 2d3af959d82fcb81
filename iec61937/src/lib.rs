//! IEC 61937 encapsulation of compressed audio elementary streams.
//!
//! ## Technical Overview
//!
//! Compressed audio (AC-3, E-AC-3, DTS, DTS-HD, Dolby TrueHD/MLP) is carried over
//! S/PDIF and HDMI links as a sequence of *bursts*. Each burst starts with an 8-byte
//! preamble (`Pa = 0xF872`, `Pb = 0x4E1F`, `Pc` = data type, `Pd` = payload length)
//! followed by the payload and zero stuffing up to the repetition period of the
//! codec. A receiver treats the stream as 16-bit stereo PCM until it locks on the
//! preamble.
//!
//! ### Burst Types
//!
//! | Codec  | Data type            | Period (IEC 60958 frames) | Length unit |
//! |--------|----------------------|---------------------------|-------------|
//! | AC-3   | `0x01 \| bsmod << 8` | 1536                      | bits        |
//! | E-AC-3 | `0x15`               | 6144                      | bytes       |
//! | DTS    | `0x0B`/`0x0C`/`0x0D` | 512/1024/2048             | bits        |
//! | DTS-HD | `0x11 \| subtype << 8` | 512..16384              | bytes       |
//! | TrueHD | `0x16`               | 15360 (MAT frame)         | bytes       |
//!
//! ## Quick Start
//!
//! 1. Extract syncframes from a raw bitstream using [`process::extract::Extractor`]
//! 2. Wrap them into bursts with [`process::encapsulate::Encapsulator`]
//!
//! ```rust,no_run
//! use iec61937::process::encapsulate::Encapsulator;
//! use iec61937::process::extract::Extractor;
//! use iec61937::process::{ByteOrder, Codec, StreamConfig};
//!
//! let config = StreamConfig::new(Codec::Ac3).with_byte_order(ByteOrder::Little);
//! let mut extractor = Extractor::new(Codec::Ac3);
//! let mut encapsulator = Encapsulator::new(config)?;
//!
//! extractor.push_bytes(&std::fs::read("stream.ac3")?);
//! extractor.finish();
//!
//! for frame in extractor {
//!     let Ok(frame) = frame else { continue };
//!     if let Some(packet) = encapsulator.push(&frame.to_elementary(None))? {
//!         println!("burst of {} bytes, data type {:#06X}", packet.len(), packet.data_type());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Encapsulation pipeline.
///
/// 1. **Frame Extraction** ([`process::extract`]): splits a raw elementary stream into
///    syncframes using sync pattern detection.
///
/// 2. **Packet Writing** ([`process::writer`]): fixed-capacity burst buffers with the
///    IEC 61937 preamble.
///
/// 3. **Encapsulation** ([`process::encapsulate`]): per-codec aggregation into bursts.
pub mod process;

/// Syncframe headers of the supported codecs.
///
/// - **A/52** ([`structs::a52`]): AC-3 and E-AC-3 syncinfo/BSI
/// - **DTS** ([`structs::dts`]): core and substream headers in all packings
/// - **MLP** ([`structs::mlp`]): TrueHD access unit and major sync
/// - **Frames** ([`structs::frame`]): the elementary frame handed to the encapsulator
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **Word packing** ([`utils::convert`]): 14-bit/16-bit DTS word repacking
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;

#[cfg(test)]
pub(crate) mod test_frames;
