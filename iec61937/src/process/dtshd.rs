//! DTS-HD (type IV) bursts for links running above 48 kHz.
//!
//! The whole frame, core plus extension substreams, travels behind a 10-byte
//! start code and a length word. The repetition period scales with the link rate;
//! when a frame does not fit, the stream falls back to sending cores only and
//! stays there.

use log::{debug, info};

use crate::process::dts::split_core;
use crate::process::writer::{HEADER_SIZE, LengthUnit, OutputPacket, PacketWriter};
use crate::process::{ByteOrder, DataType, IEC958_FRAME_BYTES, StreamConfig};
use crate::structs::frame::ElementaryFrame;
use crate::utils::errors::EncapsulateError;

pub const DTSHD_START_CODE: [u8; 10] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFE, 0xFE,
];

/// Start code plus the payload length word.
const DTSHD_PREFIX_SIZE: usize = DTSHD_START_CODE.len() + 2;

#[derive(Debug, Default)]
pub struct DtsHdState {
    core_only: bool,
}

impl DtsHdState {
    /// Whether extension substreams are being dropped.
    pub fn core_only(&self) -> bool {
        self.core_only
    }

    pub fn reset(&mut self) {
        self.core_only = false;
    }
}

/// DTS-HD subtype (`Pc` bits 8-10) for a repetition period in link frames.
pub fn subtype_for(period: u32) -> Result<u16, EncapsulateError> {
    match period {
        512 => Ok(0),
        1024 => Ok(1),
        2048 => Ok(2),
        4096 => Ok(3),
        8192 => Ok(4),
        16384 => Ok(5),
        other => Err(EncapsulateError::UnmappedDtsHdPeriod(other)),
    }
}

pub fn encapsulate(
    state: &mut DtsHdState,
    frame: &ElementaryFrame,
    config: &StreamConfig,
) -> Result<OutputPacket, EncapsulateError> {
    let (header, core) = split_core(frame.data)?;

    let period = (config.output_rate as u64 * header.frame_length as u64
        / header.sample_rate as u64) as u32;
    let subtype = subtype_for(period)?;

    let capacity = (period * IEC958_FRAME_BYTES) as usize;
    let mut payload = frame.data;
    let mut in_size = DTSHD_PREFIX_SIZE + payload.len();

    if state.core_only || in_size + HEADER_SIZE > capacity {
        payload = core;
        in_size = DTSHD_PREFIX_SIZE + payload.len();
        if in_size + HEADER_SIZE > capacity {
            return Err(EncapsulateError::SizeMismatch {
                size: in_size + HEADER_SIZE,
                available: capacity,
            });
        }

        if !state.core_only {
            info!(
                "DTS-HD frame of {} bytes exceeds the {capacity} byte burst, sending cores only",
                frame.len()
            );
            state.core_only = true;
        }
    }

    let mut writer = PacketWriter::begin(
        capacity,
        (capacity / config.bytes_per_frame as usize) as u32,
        frame.timing,
        config.byte_order,
    )?;
    writer.write_bytes(&DTSHD_START_CODE, ByteOrder::Big);
    writer.write_u16(payload.len() as u16);
    writer.write_bytes(payload, header.sync.source_order());
    writer.add_duration(frame.duration);

    // Some receivers need the length code to end in 0x8.
    let written = writer.offset() - HEADER_SIZE;
    let align = (written + HEADER_SIZE).next_multiple_of(16) - HEADER_SIZE;
    if align > written && align - written <= writer.remaining() {
        writer.write_padding(align - written);
    }

    debug!(
        "DTS-HD burst: period {period}, subtype {subtype}, {} payload bytes",
        payload.len()
    );

    Ok(writer.finalize(DataType::DtsHd.code() | (subtype << 8), LengthUnit::Bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Codec;
    use crate::test_frames::{dts_core_frame, dts_substream};

    fn config(output_rate: u32) -> StreamConfig {
        StreamConfig::new(Codec::Dts)
            .with_output_rate(output_rate)
            .with_byte_order(ByteOrder::Big)
    }

    #[test]
    fn burst_layout_and_alignment() -> anyhow::Result<()> {
        let mut state = DtsHdState::default();
        let data = dts_core_frame(15, 1005, 13, 0);
        assert_eq!(data.len(), 1006);

        let packet = encapsulate(
            &mut state,
            &ElementaryFrame::new(&data, 512),
            &config(192_000),
        )?;

        assert_eq!(packet.len(), 8192);
        assert_eq!(packet.sample_count, 2048);
        assert_eq!(packet.data_type(), 0x0211);
        assert_eq!(packet.kind(), Some(DataType::DtsHd));
        assert_eq!(packet.payload_length(), 1032);
        assert_eq!(packet.payload_length() & 0xF, 0x8);
        assert_eq!(&packet.payload()[..10], &DTSHD_START_CODE);
        assert_eq!(&packet.payload()[10..12], &[0x03, 0xEE]);
        assert_eq!(&packet.payload()[12..12 + 1006], &data[..]);
        Ok(())
    }

    #[test]
    fn little_endian_link_swaps_start_code() -> anyhow::Result<()> {
        let mut state = DtsHdState::default();
        let data = dts_core_frame(15, 1007, 13, 0);
        let config = config(192_000).with_byte_order(ByteOrder::Little);

        let packet = encapsulate(&mut state, &ElementaryFrame::new(&data, 512), &config)?;
        assert_eq!(&packet.data[..6], &[0x72, 0xF8, 0x1F, 0x4E, 0x11, 0x02]);
        assert_eq!(&packet.payload()[..2], &[0x00, 0x01]);
        assert_eq!(&packet.payload()[8..12], &[0xFE, 0xFE, 0xF0, 0x03]);
        assert_eq!(&packet.payload()[12..14], &[0xFE, 0x7F]);
        Ok(())
    }

    #[test]
    fn substreams_ride_along() -> anyhow::Result<()> {
        let mut state = DtsHdState::default();
        let mut data = dts_core_frame(15, 1007, 13, 0);
        data.extend(dts_substream(2000));

        let packet = encapsulate(
            &mut state,
            &ElementaryFrame::new(&data, 512),
            &config(192_000),
        )?;
        assert_eq!(&packet.payload()[10..12], &3008u16.to_be_bytes());
        assert!(!state.core_only());
        Ok(())
    }

    #[test]
    fn downgrade_to_core_is_sticky() -> anyhow::Result<()> {
        let mut state = DtsHdState::default();

        let mut large = dts_core_frame(15, 1007, 13, 0);
        large.extend(dts_substream(3500));
        let packet = encapsulate(
            &mut state,
            &ElementaryFrame::new(&large, 512),
            &config(96_000),
        )?;
        assert_eq!(packet.len(), 4096);
        assert_eq!(packet.data_type(), 0x0111);
        assert_eq!(&packet.payload()[10..12], &1008u16.to_be_bytes());
        assert!(state.core_only());

        let mut small = dts_core_frame(15, 1007, 13, 0);
        small.extend(dts_substream(100));
        let packet = encapsulate(
            &mut state,
            &ElementaryFrame::new(&small, 512),
            &config(96_000),
        )?;
        assert_eq!(&packet.payload()[10..12], &1008u16.to_be_bytes());

        state.reset();
        let packet = encapsulate(
            &mut state,
            &ElementaryFrame::new(&small, 512),
            &config(96_000),
        )?;
        assert_eq!(&packet.payload()[10..12], &1108u16.to_be_bytes());
        Ok(())
    }

    #[test]
    fn unmapped_period_is_rejected() {
        let mut state = DtsHdState::default();
        let data = dts_core_frame(15, 1007, 13, 0);

        assert!(matches!(
            encapsulate(
                &mut state,
                &ElementaryFrame::new(&data, 512),
                &config(100_000)
            ),
            Err(EncapsulateError::UnmappedDtsHdPeriod(1066))
        ));
    }

    #[test]
    fn core_that_never_fits_is_rejected() {
        let mut state = DtsHdState::default();
        let data = dts_core_frame(15, 4079, 13, 0);

        assert!(matches!(
            encapsulate(
                &mut state,
                &ElementaryFrame::new(&data, 512),
                &config(96_000)
            ),
            Err(EncapsulateError::SizeMismatch {
                size: 4100,
                available: 4096
            })
        ));
        assert!(!state.core_only());
    }
}
