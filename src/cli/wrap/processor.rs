use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::sync::mpsc;

use crate::stream::StreamInfo;
use iec61937::process::encapsulate::Encapsulator;
use iec61937::process::extract::Extractor;
use iec61937::process::writer::OutputPacket;
use iec61937::utils::errors::ExtractError;

/// Running totals of the frames fed to the encapsulator.
#[derive(Debug, Default)]
pub struct FrameCounters {
    pub frames: u64,
    /// Sum of the frame sample counts, also the pts of the next frame.
    pub samples: u64,
    pub stream_info: Option<StreamInfo>,
}

pub struct ProcessFramesContext<'a> {
    pub extractor: &'a mut Extractor,
    pub encapsulator: &'a mut Encapsulator,
    pub counters: &'a mut FrameCounters,
    pub strict_mode: bool,
    pub tx: &'a mpsc::Sender<OutputPacket>,
    pub pb_clone: &'a Option<ProgressBar>,
}

/// Drains the extractor into the encapsulator and sends finished bursts.
///
/// Returns `Ok(true)` when the receiving side has gone away.
pub fn process_frames(ctx: &mut ProcessFramesContext) -> Result<bool> {
    loop {
        match ctx.extractor.next() {
            Some(Ok(frame)) => {
                ctx.counters.frames += 1;
                if let Some(pb) = ctx.pb_clone {
                    pb.set_position(ctx.counters.frames);
                }

                if ctx.counters.stream_info.is_none() {
                    match StreamInfo::probe(ctx.extractor.codec(), frame.as_ref()) {
                        Ok(info) => {
                            log::info!(
                                "{} stream: {} Hz, {} samples per frame",
                                info.codec,
                                info.sample_rate,
                                info.samples_per_frame
                            );
                            ctx.counters.stream_info = Some(info);
                        }
                        Err(e) => log::debug!("No stream parameters in frame {}: {e}", ctx.counters.frames),
                    }
                }

                let pts = ctx.counters.samples as i64;
                ctx.counters.samples += frame.sample_count as u64;

                match ctx.encapsulator.push(&frame.to_elementary(Some(pts))) {
                    Ok(Some(packet)) => {
                        if ctx.tx.send(packet).is_err() {
                            return Ok(true);
                        }
                    }
                    Ok(None) => {}
                    Err(e) if e.is_fatal() || ctx.strict_mode => {
                        return Err(e)
                            .with_context(|| format!("Frame {} rejected", ctx.counters.frames));
                    }
                    Err(_) => {
                        if let Some(pb) = ctx.pb_clone {
                            pb.set_message("processing (some frames rejected)");
                        }
                    }
                }
            }
            Some(Err(ExtractError::InsufficientData))
                if ctx.strict_mode && ctx.extractor.is_finished() =>
            {
                return Err(ExtractError::InsufficientData).with_context(|| {
                    format!("Truncated frame at end of input after frame {}", ctx.counters.frames)
                });
            }
            Some(Err(ExtractError::InsufficientData)) | None => break,
            Some(Err(e)) => {
                return Err(e).with_context(|| {
                    format!("Corrupt input after frame {}", ctx.counters.frames)
                });
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iec61937::process::{Codec, DataType, StreamConfig};
    use log::Level;

    /// 256-byte AC-3 frame at 48 kHz, 64 kbit/s, 2/0.
    fn ac3_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 256];
        frame[..8].copy_from_slice(&[0x0B, 0x77, 0x00, 0x00, 0x08, 0x40, 0x40, 0x00]);
        frame
    }

    #[test]
    fn bursts_are_sent_in_order() -> Result<()> {
        let mut extractor = Extractor::new(Codec::Ac3);
        let mut encapsulator = Encapsulator::new(StreamConfig::new(Codec::Ac3))?;
        let mut counters = FrameCounters::default();
        let (tx, rx) = mpsc::channel();

        extractor.push_bytes(&ac3_frame().repeat(3));
        extractor.finish();

        let mut ctx = ProcessFramesContext {
            extractor: &mut extractor,
            encapsulator: &mut encapsulator,
            counters: &mut counters,
            strict_mode: false,
            tx: &tx,
            pb_clone: &None,
        };
        assert!(!process_frames(&mut ctx)?);
        drop(tx);

        let packets: Vec<_> = rx.iter().collect();
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|p| p.kind() == Some(DataType::Ac3)));
        assert_eq!(packets[2].timing.pts, Some(3072));

        assert_eq!(counters.frames, 3);
        assert_eq!(counters.samples, 4608);
        assert_eq!(counters.stream_info.map(|i| i.sample_rate), Some(48000));
        Ok(())
    }

    /// Two whole frames followed by the start of a third.
    fn truncated_stream() -> Vec<u8> {
        let mut data = ac3_frame().repeat(2);
        data.extend_from_slice(&ac3_frame()[..100]);
        data
    }

    fn run(strict_mode: bool) -> (Result<bool>, FrameCounters) {
        let mut extractor = Extractor::new(Codec::Ac3);
        if strict_mode {
            extractor.set_fail_level(Level::Warn);
        }
        let mut encapsulator =
            Encapsulator::new(StreamConfig::new(Codec::Ac3)).expect("valid AC-3 config");
        let mut counters = FrameCounters::default();
        let (tx, _rx) = mpsc::channel();

        extractor.push_bytes(&truncated_stream());
        let mut ctx = ProcessFramesContext {
            extractor: &mut extractor,
            encapsulator: &mut encapsulator,
            counters: &mut counters,
            strict_mode,
            tx: &tx,
            pb_clone: &None,
        };
        let before_eof = process_frames(&mut ctx);
        assert!(matches!(before_eof, Ok(false)));

        ctx.extractor.finish();
        let result = process_frames(&mut ctx);
        (result, counters)
    }

    #[test]
    fn truncated_final_frame_is_dropped() {
        let (result, counters) = run(false);
        assert!(matches!(result, Ok(false)));
        assert_eq!(counters.frames, 2);
    }

    #[test]
    fn strict_mode_rejects_truncated_final_frame() {
        let (result, counters) = run(true);
        let Err(error) = result else {
            panic!("strict mode must report the truncated frame");
        };
        assert!(error.to_string().contains("Truncated frame"));
        assert_eq!(counters.frames, 2);
    }

    #[test]
    fn closed_receiver_stops_processing() -> Result<()> {
        let mut extractor = Extractor::new(Codec::Ac3);
        let mut encapsulator = Encapsulator::new(StreamConfig::new(Codec::Ac3))?;
        let mut counters = FrameCounters::default();
        let (tx, rx) = mpsc::channel();
        drop(rx);

        extractor.push_bytes(&ac3_frame().repeat(2));
        extractor.finish();

        let mut ctx = ProcessFramesContext {
            extractor: &mut extractor,
            encapsulator: &mut encapsulator,
            counters: &mut counters,
            strict_mode: false,
            tx: &tx,
            pb_clone: &None,
        };
        assert!(process_frames(&mut ctx)?);
        assert_eq!(counters.frames, 1);
        Ok(())
    }
}
