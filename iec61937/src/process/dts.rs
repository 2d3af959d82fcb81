//! DTS type I/II/III bursts carrying the core of each frame.

use log::trace;

use crate::process::writer::{HEADER_SIZE, LengthUnit, OutputPacket, PacketWriter};
use crate::process::{DataType, IEC958_FRAME_BYTES, StreamConfig};
use crate::structs::dts::DtsHeader;
use crate::structs::frame::ElementaryFrame;
use crate::utils::convert::unpack_14bit;
use crate::utils::errors::EncapsulateError;

/// Burst data type for a core of `frame_length` samples.
pub fn data_type_for(frame_length: u32) -> Result<DataType, EncapsulateError> {
    match frame_length {
        512 => Ok(DataType::Dts1),
        1024 => Ok(DataType::Dts2),
        2048 => Ok(DataType::Dts3),
        other => Err(EncapsulateError::UnsupportedDtsFrameLength(other)),
    }
}

/// Parses the core header and returns it with the core bytes of `data`.
pub(crate) fn split_core(data: &[u8]) -> Result<(DtsHeader, &[u8]), EncapsulateError> {
    let header = DtsHeader::parse(data)?;
    if header.frame_size > data.len() {
        return Err(EncapsulateError::SizeMismatch {
            size: header.frame_size,
            available: data.len(),
        });
    }
    Ok((header, &data[..header.frame_size]))
}

pub fn encapsulate(
    frame: &ElementaryFrame,
    config: &StreamConfig,
) -> Result<OutputPacket, EncapsulateError> {
    let (header, core) = split_core(frame.data)?;
    let data_type = data_type_for(header.frame_length)?;

    let capacity = (header.frame_length * IEC958_FRAME_BYTES) as usize;
    if core.len() < frame.len() {
        trace!(
            "DTS frame of {} bytes sent as its {} byte core",
            frame.len(),
            core.len()
        );
    }

    // 14-bit input shrinks when repacked, so only its raw size is bounded.
    let needed = if header.sync.is_14bit() {
        core.len()
    } else {
        core.len() + HEADER_SIZE
    };
    if needed > capacity {
        return Err(EncapsulateError::SizeMismatch {
            size: needed,
            available: capacity,
        });
    }

    let source = header.sync.source_order();
    let mut writer = PacketWriter::begin(
        capacity,
        header.frame_length,
        frame.timing,
        config.byte_order,
    )?;
    if header.sync.is_14bit() {
        let order = writer.byte_order();
        writer.write_with(|dst| unpack_14bit(dst, core, source, order))?;
    } else {
        writer.write_bytes(core, source);
    }
    writer.add_duration(frame.duration);

    Ok(writer.finalize(data_type.code(), LengthUnit::Bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ByteOrder, Codec};
    use crate::test_frames::{dts_core_frame, dts_substream, swap_pairs};
    use crate::utils::convert::pack_14bit;

    fn config(byte_order: ByteOrder) -> StreamConfig {
        StreamConfig::new(Codec::Dts).with_byte_order(byte_order)
    }

    #[test]
    fn type_one_burst() -> anyhow::Result<()> {
        let data = dts_core_frame(15, 1007, 13, 1);
        let frame = ElementaryFrame::new(&data, 512).with_timing(Some(42), Some(40));
        let packet = encapsulate(&frame, &config(ByteOrder::Little))?;

        assert_eq!(packet.len(), 2048);
        assert_eq!(packet.sample_count, 512);
        assert_eq!(&packet.data[..8], &[0x72, 0xF8, 0x1F, 0x4E, 0x0B, 0x00, 0x80, 0x1F]);
        assert_eq!(&packet.data[8..12], &[0xFE, 0x7F, 0x01, 0x80]);
        assert_eq!(packet.timing.dts, Some(40));
        Ok(())
    }

    #[test]
    fn frame_length_selects_type() -> anyhow::Result<()> {
        for (nblks, fsize, kind, capacity) in [
            (31, 2015, DataType::Dts2, 4096),
            (63, 3999, DataType::Dts3, 8192),
        ] {
            let data = dts_core_frame(nblks, fsize, 13, 0);
            let packet = encapsulate(&ElementaryFrame::new(&data, 0), &config(ByteOrder::Big))?;
            assert_eq!(packet.kind(), Some(kind));
            assert_eq!(packet.len(), capacity);
            assert_eq!(packet.payload_length() as usize, (fsize as usize + 1) * 8);
        }

        assert!(matches!(
            encapsulate(
                &ElementaryFrame::new(&dts_core_frame(7, 500, 13, 0), 0),
                &config(ByteOrder::Big)
            ),
            Err(EncapsulateError::UnsupportedDtsFrameLength(256))
        ));
        Ok(())
    }

    #[test]
    fn little_endian_source_is_swapped_into_big_endian_link() -> anyhow::Result<()> {
        let data = swap_pairs(&dts_core_frame(15, 1007, 13, 0));
        let packet = encapsulate(&ElementaryFrame::new(&data, 512), &config(ByteOrder::Big))?;
        assert_eq!(&packet.data[8..12], &[0x7F, 0xFE, 0x80, 0x01]);
        Ok(())
    }

    #[test]
    fn fourteen_bit_core_is_repacked() -> anyhow::Result<()> {
        let core = dts_core_frame(15, 1007, 13, 0);

        for source in [ByteOrder::Big, ByteOrder::Little] {
            let packed = pack_14bit(&core, source);
            let packet =
                encapsulate(&ElementaryFrame::new(&packed, 512), &config(ByteOrder::Big))?;
            assert_eq!(packet.kind(), Some(DataType::Dts1));
            assert_eq!(packet.payload_length(), 1008 * 8);
            assert_eq!(&packet.payload()[..1008], &core[..]);
        }
        Ok(())
    }

    #[test]
    fn only_the_core_is_sent() -> anyhow::Result<()> {
        let mut data = dts_core_frame(15, 1007, 13, 0);
        data.extend(dts_substream(400));

        let packet = encapsulate(&ElementaryFrame::new(&data, 512), &config(ByteOrder::Big))?;
        assert_eq!(packet.payload_length(), 1008 * 8);
        assert!(packet.payload()[1008..].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn rejects_cores_that_do_not_fit() {
        let data = dts_core_frame(15, 1007, 13, 0);
        assert!(matches!(
            encapsulate(&ElementaryFrame::new(&data[..600], 512), &config(ByteOrder::Big)),
            Err(EncapsulateError::SizeMismatch { size: 1008, .. })
        ));

        let data = dts_core_frame(15, 2047, 13, 0);
        assert!(matches!(
            encapsulate(&ElementaryFrame::new(&data, 512), &config(ByteOrder::Big)),
            Err(EncapsulateError::SizeMismatch { size: 2056, available: 2048 })
        ));

        assert!(matches!(
            encapsulate(&ElementaryFrame::new(&dts_substream(400), 512), &config(ByteOrder::Big)),
            Err(EncapsulateError::MalformedHeader(_))
        ));
    }
}
