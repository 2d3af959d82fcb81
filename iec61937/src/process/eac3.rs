//! E-AC-3 bursts: six audio blocks per 6144-frame period.
//!
//! Syncframes with fewer than six blocks are aggregated into one burst. An input
//! frame may carry an independent syncframe followed by one dependent substream,
//! which travels in the same burst.

use log::{debug, trace};

use crate::process::writer::{LengthUnit, PacketWriter};
use crate::process::{ByteOrder, DataType, IEC958_FRAME_BYTES, StreamConfig, Verdict};
use crate::structs::a52::{A52Header, AC3_BLOCKS, A52_BLOCK_SAMPLES};
use crate::structs::frame::ElementaryFrame;
use crate::utils::errors::EncapsulateError;

/// Link frames per E-AC-3 burst.
pub const EAC3_FRAME_SAMPLES: u32 = 4 * AC3_BLOCKS * A52_BLOCK_SAMPLES;

/// E-AC-3 burst size in bytes.
pub const EAC3_BURST_SIZE: usize = (EAC3_FRAME_SAMPLES * IEC958_FRAME_BYTES) as usize;

/// Partially filled burst carried between frames.
#[derive(Debug, Default)]
pub struct Eac3State {
    pending: Option<PacketWriter>,
    blocks: u32,
}

impl Eac3State {
    /// Audio blocks collected in the pending burst.
    pub fn blocks(&self) -> u32 {
        self.blocks
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.blocks = 0;
    }
}

/// Checks the syncframe layout and returns the block count of the first header.
fn validate(data: &[u8]) -> Result<u32, EncapsulateError> {
    let first = A52Header::parse(data)?;
    if first.frame_size > data.len() {
        return Err(EncapsulateError::SizeMismatch {
            size: first.frame_size,
            available: data.len(),
        });
    }

    if data.len() > first.frame_size {
        let rest = &data[first.frame_size..];
        let dependent = match A52Header::parse(rest) {
            Ok(header) if header.is_dependent() => header,
            _ => return Err(EncapsulateError::MissingDependentSubstream(rest.len())),
        };
        if dependent.frame_size > rest.len() {
            return Err(EncapsulateError::SizeMismatch {
                size: dependent.frame_size,
                available: rest.len(),
            });
        }
        if data.len() > first.frame_size + dependent.frame_size {
            return Err(EncapsulateError::MissingDependentSubstream(
                data.len() - first.frame_size - dependent.frame_size,
            ));
        }
        trace!(
            "E-AC-3 frame carries a {} byte dependent substream",
            dependent.frame_size
        );
    }

    Ok(first.blocks)
}

/// Appends one frame to the pending burst.
///
/// An error discards the pending burst.
pub fn encapsulate(
    state: &mut Eac3State,
    frame: &ElementaryFrame,
    config: &StreamConfig,
) -> Result<Verdict, EncapsulateError> {
    let blocks = validate(frame.data).inspect_err(|_| state.reset())?;

    let mut writer = match state.pending.take() {
        Some(writer) => writer,
        None => PacketWriter::begin(
            EAC3_BURST_SIZE,
            EAC3_FRAME_SAMPLES,
            frame.timing,
            config.byte_order,
        )?,
    };

    if frame.len() > writer.remaining() {
        state.reset();
        return Err(EncapsulateError::SizeMismatch {
            size: frame.len(),
            available: writer.remaining(),
        });
    }

    writer.write_bytes(frame.data, ByteOrder::Big);
    writer.add_duration(frame.duration);
    state.blocks += blocks;

    match state.blocks {
        total if total < AC3_BLOCKS => {
            trace!("E-AC-3 burst holds {total} of {AC3_BLOCKS} blocks");
            state.pending = Some(writer);
            Ok(Verdict::NeedMore)
        }
        AC3_BLOCKS => {
            state.blocks = 0;
            debug!("E-AC-3 burst complete at offset {}", writer.offset());
            Ok(Verdict::Packet(
                writer.finalize(DataType::Eac3.code(), LengthUnit::Bytes),
            ))
        }
        total => {
            state.reset();
            Err(EncapsulateError::TooManyBlocks(total))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Codec;
    use crate::test_frames::{ac3_frame, eac3_frame};

    fn config() -> StreamConfig {
        StreamConfig::new(Codec::Eac3)
    }

    #[test]
    fn six_single_block_frames_make_one_burst() -> anyhow::Result<()> {
        let mut state = Eac3State::default();
        let data = eac3_frame(0, 0, 0, 100);

        for i in 0..5 {
            let frame = ElementaryFrame::new(&data, 256)
                .with_timing(Some(i * 256), None)
                .with_duration(256);
            assert!(matches!(
                encapsulate(&mut state, &frame, &config())?,
                Verdict::NeedMore
            ));
            assert_eq!(state.blocks(), i as u32 + 1);
        }

        let frame = ElementaryFrame::new(&data, 256).with_duration(256);
        let Verdict::Packet(packet) = encapsulate(&mut state, &frame, &config())? else {
            anyhow::bail!("expected a burst after six blocks");
        };

        assert_eq!(packet.len(), 24576);
        assert_eq!(packet.sample_count, 6144);
        assert_eq!(packet.kind(), Some(DataType::Eac3));
        assert_eq!(packet.payload_length(), 6 * 200);
        assert_eq!(&packet.data[..8], &[0x72, 0xF8, 0x1F, 0x4E, 0x15, 0x00, 0xB0, 0x04]);
        assert_eq!(&packet.data[8..10], &[0x77, 0x0B]);
        assert_eq!(&packet.data[208..210], &[0x77, 0x0B]);
        assert_eq!(packet.timing.pts, Some(0));
        assert_eq!(packet.duration, 6 * 256);
        assert!(state.is_idle());
        assert_eq!(state.blocks(), 0);
        Ok(())
    }

    #[test]
    fn six_block_frame_with_dependent_substream() -> anyhow::Result<()> {
        let mut state = Eac3State::default();
        let mut data = eac3_frame(0, 0, 3, 300);
        data.extend(eac3_frame(1, 0, 3, 200));

        let Verdict::Packet(packet) =
            encapsulate(&mut state, &ElementaryFrame::new(&data, 1536), &config())?
        else {
            anyhow::bail!("six-block frame must complete a burst");
        };
        assert_eq!(packet.payload_length(), 1000);
        assert_eq!(&packet.data[8 + 600..8 + 602], &[0x77, 0x0B]);
        Ok(())
    }

    #[test]
    fn ac3_core_with_dependent_substream() -> anyhow::Result<()> {
        let mut state = Eac3State::default();
        let mut data = ac3_frame(0, 8, 0, 2, false);
        data.extend(eac3_frame(1, 0, 3, 64));

        assert!(matches!(
            encapsulate(&mut state, &ElementaryFrame::new(&data, 1536), &config())?,
            Verdict::Packet(_)
        ));
        Ok(())
    }

    #[test]
    fn block_total_above_six_is_rejected() -> anyhow::Result<()> {
        let mut state = Eac3State::default();
        let three = eac3_frame(0, 0, 2, 120);
        let six = eac3_frame(0, 0, 3, 120);

        encapsulate(&mut state, &ElementaryFrame::new(&three, 768), &config())?;
        assert!(matches!(
            encapsulate(&mut state, &ElementaryFrame::new(&six, 1536), &config()),
            Err(EncapsulateError::TooManyBlocks(9))
        ));
        assert!(state.is_idle());
        Ok(())
    }

    #[test]
    fn trailing_bytes_must_be_a_dependent_substream() {
        let mut state = Eac3State::default();

        let mut data = eac3_frame(0, 0, 3, 100);
        data.extend(eac3_frame(0, 1, 3, 50));
        assert!(matches!(
            encapsulate(&mut state, &ElementaryFrame::new(&data, 1536), &config()),
            Err(EncapsulateError::MissingDependentSubstream(100))
        ));

        let mut data = eac3_frame(0, 0, 3, 100);
        data.extend(eac3_frame(1, 0, 3, 50));
        data.extend_from_slice(&[0; 6]);
        assert!(matches!(
            encapsulate(&mut state, &ElementaryFrame::new(&data, 1536), &config()),
            Err(EncapsulateError::MissingDependentSubstream(6))
        ));

        let data = eac3_frame(0, 0, 3, 100);
        assert!(matches!(
            encapsulate(&mut state, &ElementaryFrame::new(&data[..150], 1536), &config()),
            Err(EncapsulateError::SizeMismatch { size: 200, .. })
        ));
        assert!(state.is_idle());
    }

    #[test]
    fn malformed_frame_drops_pending_burst() -> anyhow::Result<()> {
        let mut state = Eac3State::default();
        let data = eac3_frame(0, 0, 0, 100);

        encapsulate(&mut state, &ElementaryFrame::new(&data, 256), &config())?;
        encapsulate(&mut state, &ElementaryFrame::new(&data, 256), &config())?;
        assert_eq!(state.blocks(), 2);

        assert!(matches!(
            encapsulate(&mut state, &ElementaryFrame::new(&[0u8; 64], 256), &config()),
            Err(EncapsulateError::MalformedHeader(_))
        ));
        assert!(state.is_idle());
        assert_eq!(state.blocks(), 0);
        Ok(())
    }

    #[test]
    fn burst_overflow_is_rejected() -> anyhow::Result<()> {
        let mut state = Eac3State::default();
        let big = eac3_frame(0, 0, 0, 2048);

        for _ in 0..5 {
            encapsulate(&mut state, &ElementaryFrame::new(&big, 256), &config())?;
        }
        let mut huge = eac3_frame(0, 0, 0, 2048);
        huge.extend(eac3_frame(1, 0, 0, 2040));
        assert!(matches!(
            encapsulate(&mut state, &ElementaryFrame::new(&huge, 256), &config()),
            Err(EncapsulateError::SizeMismatch { .. })
        ));
        assert!(state.is_idle());
        assert_eq!(state.blocks(), 0);
        Ok(())
    }
}
