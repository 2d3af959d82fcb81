use log::{Level, debug, warn};

use crate::process::dtshd::DtsHdState;
use crate::process::eac3::Eac3State;
use crate::process::truehd::MatState;
use crate::process::writer::OutputPacket;
use crate::process::{Codec, StreamConfig, Verdict, ac3, dts, dtshd, eac3};
use crate::structs::frame::ElementaryFrame;
use crate::utils::errors::EncapsulateError;

/// Counters kept over the lifetime of an [`Encapsulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncapsulatorStats {
    pub frames_in: u64,
    pub packets_out: u64,
    pub frames_rejected: u64,
    pub bytes_out: u64,
}

#[derive(Debug)]
enum CodecState {
    Ac3,
    Eac3(Eac3State),
    Dts,
    DtsHd(DtsHdState),
    TrueHd(Box<MatState>),
}

impl CodecState {
    fn reset(&mut self) {
        match self {
            CodecState::Ac3 | CodecState::Dts => {}
            CodecState::Eac3(state) => state.reset(),
            CodecState::DtsHd(state) => state.reset(),
            CodecState::TrueHd(state) => state.reset(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CodecState::Ac3 => "AC-3",
            CodecState::Eac3(_) => "E-AC-3",
            CodecState::Dts => "DTS",
            CodecState::DtsHd(_) => "DTS-HD",
            CodecState::TrueHd(_) => "MAT",
        }
    }
}

/// Turns elementary frames of one stream into IEC 61937 bursts.
///
/// The burst format is fixed when the stream is opened: DTS on a link above
/// 48 kHz is sent as DTS-HD, TrueHD and MLP both travel in MAT frames.
///
/// ```rust
/// use iec61937::process::encapsulate::Encapsulator;
/// use iec61937::process::{Codec, StreamConfig};
/// use iec61937::structs::frame::ElementaryFrame;
///
/// let mut encapsulator = Encapsulator::new(StreamConfig::new(Codec::Eac3))?;
/// assert_eq!(encapsulator.burst_format(), "E-AC-3");
///
/// // Rejected frames are reported and leave the stream ready for the next one.
/// assert!(encapsulator.push(&ElementaryFrame::new(&[0u8; 16], 256)).is_err());
/// assert_eq!(encapsulator.stats().frames_rejected, 1);
/// # Ok::<(), iec61937::utils::errors::EncapsulateError>(())
/// ```
#[derive(Debug)]
pub struct Encapsulator {
    config: StreamConfig,
    state: CodecState,
    stats: EncapsulatorStats,
}

impl Encapsulator {
    pub fn new(config: StreamConfig) -> Result<Self, EncapsulateError> {
        config.validate()?;

        let state = match config.codec {
            Codec::Ac3 => CodecState::Ac3,
            Codec::Eac3 => CodecState::Eac3(Eac3State::default()),
            Codec::Dts if config.is_high_bitrate() => CodecState::DtsHd(DtsHdState::default()),
            Codec::Dts => CodecState::Dts,
            Codec::TrueHd | Codec::Mlp => {
                CodecState::TrueHd(Box::new(MatState::try_new(config.fail_level)?))
            }
        };
        debug!(
            "Opened {} stream as {} bursts, {} link at {} Hz",
            config.codec,
            state.name(),
            config.byte_order,
            config.output_rate
        );

        Ok(Self {
            config,
            state,
            stats: EncapsulatorStats::default(),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stats(&self) -> EncapsulatorStats {
        self.stats
    }

    /// Name of the burst format the stream is sent as.
    pub fn burst_format(&self) -> &'static str {
        self.state.name()
    }

    /// Sets the failure level for validation problems.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: Level) {
        self.config.fail_level = level;
        if let CodecState::TrueHd(state) = &mut self.state {
            state.set_fail_level(level);
        }
    }

    /// Feeds one frame.
    ///
    /// Returns `Ok(None)` while a burst is still being aggregated. On error all
    /// aggregation state is dropped before the error is returned.
    pub fn push(
        &mut self,
        frame: &ElementaryFrame,
    ) -> Result<Option<OutputPacket>, EncapsulateError> {
        self.stats.frames_in += 1;

        let config = &self.config;
        let result = match &mut self.state {
            CodecState::Ac3 => ac3::encapsulate(frame, config).map(Verdict::Packet),
            CodecState::Eac3(state) => eac3::encapsulate(state, frame, config),
            CodecState::Dts => dts::encapsulate(frame, config).map(Verdict::Packet),
            CodecState::DtsHd(state) => {
                dtshd::encapsulate(state, frame, config).map(Verdict::Packet)
            }
            CodecState::TrueHd(state) => state.push(frame, config.byte_order),
        };

        match result {
            Ok(Verdict::Packet(packet)) => {
                self.stats.packets_out += 1;
                self.stats.bytes_out += packet.len() as u64;
                Ok(Some(packet))
            }
            Ok(Verdict::NeedMore) => Ok(None),
            Err(error) => {
                self.stats.frames_rejected += 1;
                warn!("Dropping {} frame of {} bytes: {error}", self.config.codec, frame.len());
                self.flush();
                Err(error)
            }
        }
    }

    /// Whether frames are buffered for a burst that is not complete yet.
    pub fn has_pending(&self) -> bool {
        match &self.state {
            CodecState::Eac3(state) => !state.is_idle(),
            CodecState::TrueHd(state) => state.filled() > 0,
            CodecState::Ac3 | CodecState::Dts | CodecState::DtsHd(_) => false,
        }
    }

    /// Discards any partially aggregated burst and per-stream history.
    pub fn flush(&mut self) {
        self.state.reset();
    }
}
