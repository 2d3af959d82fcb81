//! TrueHD and MLP bursts built from MAT frames.
//!
//! A MAT frame is 61424 bytes of access units interleaved with three fixed codes.
//! Gaps in `input_timing` become zero padding, so every access unit occupies its
//! nominal 2560 bytes of link time and 24 units at 48 kHz fill one burst.
//!
//! Two frame buffers alternate: the finished one is copied into the burst while
//! the remainder of the current access unit lands in the other.

use log::{Level, debug, trace};

use crate::log_or_err;
use crate::process::writer::{LengthUnit, OutputPacket, PacketWriter};
use crate::process::{ByteOrder, DataType, Verdict};
use crate::structs::frame::{ElementaryFrame, FrameTiming};
use crate::structs::mlp::{AccessUnitHeader, MLP_MIN_ACCESS_UNIT, SyncInfo};
use crate::utils::errors::EncapsulateError;

/// MAT frame size in bytes, codes included.
pub const MAT_FRAME_SIZE: usize = 61424;

/// Burst size in bytes. The 16 bytes past the MAT frame are an inter-frame gap.
pub const MAT_PACKET_SIZE: usize = 61440;

pub const MAT_PACKET_SAMPLES: u32 = (MAT_PACKET_SIZE / 16) as u32;

/// Access units per MAT frame at the base rate.
pub const MAT_FRAMES_PER_PACKET: u32 = 24;

/// Largest access unit the 12-bit length field can describe.
pub const MLP_MAX_ACCESS_UNIT: usize = 0xFFF * 2;

/// Link bytes per 40-sample access unit. Divisible by every samples-per-unit value.
const MAT_UNIT_BYTES: i64 = 2560;

const MAT_START_CODE: [u8; 20] = [
    0x07, 0x9E, 0x00, 0x03, 0x84, 0x01, 0x01, 0x01, 0x80, 0x00, 0x56, 0xA5, 0x3B, 0xF4, 0x81,
    0x83, 0x49, 0x80, 0x77, 0xE0,
];

const MAT_MIDDLE_CODE: [u8; 12] = [
    0xC3, 0xC1, 0x42, 0x49, 0x3B, 0xFA, 0x82, 0x83, 0x49, 0x80, 0x77, 0xE0,
];

const MAT_END_CODE: [u8; 16] = [
    0xC3, 0xC2, 0xC0, 0xC4, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x97,
    0x11,
];

#[derive(Debug)]
struct MatCode {
    pos: usize,
    bytes: &'static [u8],
}

const MAT_CODES: [MatCode; 3] = [
    MatCode {
        pos: 0,
        bytes: &MAT_START_CODE,
    },
    MatCode {
        pos: 30708,
        bytes: &MAT_MIDDLE_CODE,
    },
    MatCode {
        pos: MAT_FRAME_SIZE - MAT_END_CODE.len(),
        bytes: &MAT_END_CODE,
    },
];

/// Per-stream MAT assembly state.
#[derive(Debug)]
pub struct MatState {
    buffers: [Vec<u8>; 2],
    active: usize,
    filled: usize,
    samples_per_frame: Option<u32>,
    /// Bytes the previous access unit occupied, codes included. Zero before the
    /// first unit.
    prev_size: usize,
    prev_timing: u16,
    frame_count: u32,
    pending_timing: Option<FrameTiming>,
    duration: u64,
    fail_level: Level,
}

impl MatState {
    /// Allocates both MAT frame buffers.
    pub fn try_new(fail_level: Level) -> Result<Self, EncapsulateError> {
        let mut buffers = [Vec::new(), Vec::new()];
        for buffer in &mut buffers {
            buffer.try_reserve_exact(MAT_FRAME_SIZE)?;
            buffer.resize(MAT_FRAME_SIZE, 0);
        }

        Ok(Self {
            buffers,
            active: 0,
            filled: 0,
            samples_per_frame: None,
            prev_size: 0,
            prev_timing: 0,
            frame_count: 0,
            pending_timing: None,
            duration: 0,
            fail_level,
        })
    }

    /// Drops all stream progress. The buffers are kept.
    pub fn reset(&mut self) {
        self.active = 0;
        self.filled = 0;
        self.samples_per_frame = None;
        self.prev_size = 0;
        self.prev_timing = 0;
        self.frame_count = 0;
        self.pending_timing = None;
        self.duration = 0;
    }

    pub fn set_fail_level(&mut self, level: Level) {
        self.fail_level = level;
    }

    /// Access units added since the last burst, capped at [`MAT_FRAMES_PER_PACKET`].
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn samples_per_frame(&self) -> Option<u32> {
        self.samples_per_frame
    }

    /// Bytes written into the current MAT frame.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Adds one access unit, returning a burst when it completes a MAT frame.
    pub fn push(
        &mut self,
        frame: &ElementaryFrame,
        byte_order: ByteOrder,
    ) -> Result<Verdict, EncapsulateError> {
        let data = frame.data;
        if data.len() < MLP_MIN_ACCESS_UNIT {
            return Err(EncapsulateError::AccessUnitTooShort(data.len()));
        }
        if data.len() > MLP_MAX_ACCESS_UNIT {
            return Err(EncapsulateError::SizeMismatch {
                size: data.len(),
                available: MLP_MAX_ACCESS_UNIT,
            });
        }

        let header = AccessUnitHeader::parse(data)?;
        match header.sync {
            SyncInfo::Major(major) => {
                let samples = major.samples_per_au();
                if self.samples_per_frame != Some(samples) {
                    debug!("TrueHD samples per frame: {samples}");
                }
                self.samples_per_frame = Some(samples);
                self.frame_count = 0;
            }
            SyncInfo::UnknownFormat(format) => {
                debug!("Skipping access unit with unknown major sync format {format:#04X}");
                return Ok(Verdict::NeedMore);
            }
            SyncInfo::Minor => {}
        }
        let samples_per_frame = self
            .samples_per_frame
            .ok_or(EncapsulateError::MissingMajorSync)?;

        let timing = header.input_timing;
        let mut padding = 0;
        if self.prev_size > 0 {
            let delta_samples = timing.wrapping_sub(self.prev_timing) as i64;
            let delta_bytes = delta_samples * MAT_UNIT_BYTES / samples_per_frame as i64;
            let wanted = delta_bytes - self.prev_size as i64;
            trace!("delta_samples: {delta_samples}, delta_bytes: {delta_bytes}");

            if wanted < 0 || wanted >= (MAT_FRAME_SIZE / 2) as i64 {
                log_or_err!(
                    self,
                    Level::Warn,
                    EncapsulateError::TimingDiscontinuity {
                        prev: self.prev_timing,
                        current: timing,
                        samples_per_frame,
                    }
                );
            } else {
                padding = wanted as usize;
            }
        }

        let mut next = MAT_CODES
            .iter()
            .position(|code| self.filled <= code.pos)
            .ok_or(EncapsulateError::MatCodeFailure(self.filled))?;

        self.pending_timing.get_or_insert(frame.timing);

        let mut counted = false;
        let mut total_size = data.len();
        let mut rest = data;
        let mut packet = None;

        while padding > 0 || !rest.is_empty() || MAT_CODES[next].pos == self.filled {
            if MAT_CODES[next].pos == self.filled {
                let code = MAT_CODES[next].bytes;
                self.buffers[self.active][self.filled..self.filled + code.len()]
                    .copy_from_slice(code);
                self.filled += code.len();
                let mut code_remaining = code.len();

                next += 1;
                if next == MAT_CODES.len() {
                    next = 0;
                    // The unit belongs to the burst its data ends in.
                    if rest.is_empty() {
                        self.duration += frame.duration;
                        counted = true;
                    }
                    packet = Some(self.emit(byte_order)?);
                    code_remaining += MAT_PACKET_SIZE - MAT_FRAME_SIZE;
                    if !rest.is_empty() {
                        self.pending_timing = Some(frame.timing);
                    }
                }

                // Code bytes count as padding first, the rest as part of this unit.
                let spent = padding.min(code_remaining);
                padding -= spent;
                total_size += code_remaining - spent;
            }

            if padding > 0 {
                let len = (MAT_CODES[next].pos - self.filled).min(padding);
                self.buffers[self.active][self.filled..self.filled + len].fill(0);
                self.filled += len;
                padding -= len;

                if padding > 0 {
                    continue;
                }
            }

            if !rest.is_empty() {
                let len = (MAT_CODES[next].pos - self.filled).min(rest.len());
                self.buffers[self.active][self.filled..self.filled + len]
                    .copy_from_slice(&rest[..len]);
                self.filled += len;
                rest = &rest[len..];
            }
        }

        if !counted {
            self.duration += frame.duration;
        }
        self.prev_size = total_size;
        self.prev_timing = timing;
        if self.frame_count < MAT_FRAMES_PER_PACKET {
            self.frame_count += 1;
        }

        trace!(
            "TrueHD frame inserted, total size {total_size}, buffer position {}",
            self.filled
        );

        match packet {
            Some(packet) => {
                self.frame_count = 0;
                Ok(Verdict::Packet(packet))
            }
            None => Ok(Verdict::NeedMore),
        }
    }

    /// Wraps the active MAT frame in a burst and switches buffers.
    fn emit(&mut self, byte_order: ByteOrder) -> Result<OutputPacket, EncapsulateError> {
        let timing = self.pending_timing.take().unwrap_or_default();
        let mut writer =
            PacketWriter::begin(MAT_PACKET_SIZE, MAT_PACKET_SAMPLES, timing, byte_order)?;
        writer.write_bytes(&self.buffers[self.active], ByteOrder::Big);
        writer.add_duration(std::mem::take(&mut self.duration));

        debug!("MAT frame complete after {} access units", self.frame_count + 1);

        self.active ^= 1;
        self.filled = 0;

        Ok(writer.finalize(DataType::TrueHd.code(), LengthUnit::Bytes))
    }
}
