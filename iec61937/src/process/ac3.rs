//! AC-3 bursts: one syncframe per 1536-frame period.

use log::{debug, trace};

use crate::process::writer::{HEADER_SIZE, LengthUnit, OutputPacket, PacketWriter};
use crate::process::{ByteOrder, DataType, IEC958_FRAME_BYTES, StreamConfig};
use crate::structs::a52::{A52Header, AC3_BLOCKS, A52_BLOCK_SAMPLES};
use crate::structs::frame::ElementaryFrame;
use crate::utils::errors::EncapsulateError;

/// Link frames per AC-3 burst.
pub const AC3_FRAME_SAMPLES: u32 = AC3_BLOCKS * A52_BLOCK_SAMPLES;

/// AC-3 burst size in bytes.
pub const AC3_BURST_SIZE: usize = (AC3_FRAME_SAMPLES * IEC958_FRAME_BYTES) as usize;

pub fn encapsulate(
    frame: &ElementaryFrame,
    config: &StreamConfig,
) -> Result<OutputPacket, EncapsulateError> {
    let mut data = frame.data;

    if data.len() < 6 || data.len() > AC3_BURST_SIZE || frame.sample_count != AC3_FRAME_SAMPLES {
        let header = A52Header::parse(data)?;
        if header.is_eac3() {
            return Err(EncapsulateError::UnexpectedEac3);
        }
        if header.frame_size > data.len() {
            return Err(EncapsulateError::SizeMismatch {
                size: header.frame_size,
                available: data.len(),
            });
        }

        debug!(
            "AC-3 frame of {} bytes ({} samples declared) truncated to {} bytes",
            data.len(),
            frame.sample_count,
            header.frame_size
        );
        data = &data[..header.frame_size];
    }

    if data.len() + HEADER_SIZE > AC3_BURST_SIZE {
        return Err(EncapsulateError::SizeMismatch {
            size: data.len() + HEADER_SIZE,
            available: AC3_BURST_SIZE,
        });
    }

    let mut writer = PacketWriter::begin(
        AC3_BURST_SIZE,
        AC3_FRAME_SAMPLES,
        frame.timing,
        config.byte_order,
    )?;
    writer.write_bytes(data, ByteOrder::Big);
    writer.add_duration(frame.duration);

    let bsmod = (data[5] & 0x07) as u16;
    trace!("AC-3 burst: {} payload bytes, bsmod {bsmod}", data.len());

    Ok(writer.finalize(DataType::Ac3.code() | (bsmod << 8), LengthUnit::Bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Codec;
    use crate::test_frames::{ac3_frame, eac3_frame};

    fn config(byte_order: ByteOrder) -> StreamConfig {
        StreamConfig::new(Codec::Ac3).with_byte_order(byte_order)
    }

    #[test]
    fn canonical_ac3_burst() -> anyhow::Result<()> {
        let data = ac3_frame(0, 8, 0, 2, false);
        assert_eq!(data.len(), 256);

        let frame = ElementaryFrame::new(&data, 1536)
            .with_timing(Some(9000), None)
            .with_duration(1536);
        let packet = encapsulate(&frame, &config(ByteOrder::Little))?;

        assert_eq!(packet.len(), 6144);
        assert_eq!(&packet.data[..8], &[0x72, 0xF8, 0x1F, 0x4E, 0x01, 0x00, 0x00, 0x08]);
        assert_eq!(&packet.data[8..10], &[0x77, 0x0B]);
        assert!(packet.data[8 + 256..].iter().all(|&b| b == 0));
        assert_eq!(packet.sample_count, 1536);
        assert_eq!(packet.timing.pts, Some(9000));
        assert_eq!(packet.duration, 1536);
        Ok(())
    }

    #[test]
    fn bsmod_lands_in_data_type() -> anyhow::Result<()> {
        let data = ac3_frame(0, 8, 7, 1, false);
        let packet = encapsulate(&ElementaryFrame::new(&data, 1536), &config(ByteOrder::Big))?;

        assert_eq!(packet.data_type(), 0x0701);
        assert_eq!(&packet.data[8..10], &[0x0B, 0x77]);
        assert_eq!(packet.payload_length(), 256 * 8);
        Ok(())
    }

    #[test]
    fn oversized_buffer_is_truncated_to_header_size() -> anyhow::Result<()> {
        let mut data = ac3_frame(0, 8, 0, 2, false);
        data.extend_from_slice(&[0xEE; 100]);

        let packet = encapsulate(&ElementaryFrame::new(&data, 0), &config(ByteOrder::Big))?;
        assert_eq!(packet.payload_length(), 256 * 8);
        assert!(packet.data[8 + 256..].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn rejects_mismatched_frames() {
        let eac3 = eac3_frame(0, 0, 3, 128);
        assert!(matches!(
            encapsulate(&ElementaryFrame::new(&eac3, 0), &config(ByteOrder::Little)),
            Err(EncapsulateError::UnexpectedEac3)
        ));

        let data = ac3_frame(0, 8, 0, 2, false);
        assert!(matches!(
            encapsulate(&ElementaryFrame::new(&data[..200], 0), &config(ByteOrder::Little)),
            Err(EncapsulateError::SizeMismatch { size: 256, .. })
        ));

        assert!(matches!(
            encapsulate(&ElementaryFrame::new(&[0x0B, 0x77], 1536), &config(ByteOrder::Little)),
            Err(EncapsulateError::MalformedHeader(_))
        ));

        // 640 kbit/s at 32 kHz still fits; the padded copy does not.
        let data = ac3_frame(2, 36, 0, 2, false);
        assert_eq!(data.len(), 3840);
        assert!(
            encapsulate(&ElementaryFrame::new(&data, 1536), &config(ByteOrder::Little)).is_ok()
        );
        let mut huge = vec![0u8; AC3_BURST_SIZE - 4];
        huge[..8].copy_from_slice(&data[..8]);
        assert!(matches!(
            encapsulate(&ElementaryFrame::new(&huge, 1536), &config(ByteOrder::Little)),
            Err(EncapsulateError::SizeMismatch { .. })
        ));
    }
}
