use std::collections::VecDeque;
use std::sync::Arc;

use log::{Level, debug, trace};

use crate::log_or_err;
use crate::process::Codec;
use crate::structs::a52::{A52_HEADER_SIZE, A52Header};
use crate::structs::dts::{
    DTS_HEADER_SIZE_14BIT, DTS_SUBSTREAM_HEADER_SIZE, DtsHeader, DtsSubstreamHeader, DtsSyncType,
};
use crate::structs::frame::ElementaryFrame;
use crate::structs::mlp::{
    AccessUnitHeader, BASE_SAMPLES_PER_AU, MAJOR_SYNC_PREFIX, MLP_MIN_ACCESS_UNIT, check_nibble,
    major_sync_substreams,
};
use crate::utils::errors::{ExtractError, HeaderError};

/// Bytes kept at the end of the buffer when no sync is found, so a syncword split
/// across two pushes is still seen.
const SYNC_SEARCH_KEEP: usize = 8;

/// Bytes of the following frame checked after an A/52 or DTS frame.
const NEXT_SYNC_LEN: usize = 6;

/// Splits a raw elementary stream into syncframes.
///
/// Sync patterns are searched per codec; the frame length comes from the parsed
/// header. An E-AC-3 dependent substream or a DTS-HD extension substream directly
/// behind a frame is returned as part of it. TrueHD access units are checked with
/// the nibble parity over the unit header and substream directory.
///
/// # Example
///
/// ```rust,no_run
/// use iec61937::process::Codec;
/// use iec61937::process::extract::Extractor;
///
/// let mut extractor = Extractor::new(Codec::Dts);
///
/// extractor.push_bytes(&std::fs::read("stream.dts")?);
/// extractor.finish();
///
/// for frame in &mut extractor {
///     let frame = frame?;
///     println!("{} bytes, {} samples", frame.as_ref().len(), frame.sample_count);
/// }
/// println!("{} corrupt frames skipped", extractor.error_count());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// Without [`finish`](Extractor::finish) the last frame of the buffer is held back
/// until the start of the next one confirms its length.
#[derive(Debug)]
pub struct Extractor {
    codec: Codec,
    buffer: VecDeque<u8>,
    locked: bool,
    in_sync: bool,
    eof: bool,
    io_counter: usize,
    mlp: MlpSync,
    error_count: usize,
    frames_processed: usize,
    fail_level: Level,
}

#[derive(Debug, Clone, Copy)]
struct MlpSync {
    substreams: usize,
    samples_per_au: u32,
}

impl Extractor {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            buffer: VecDeque::with_capacity(64 * 1024),
            locked: false,
            in_sync: false,
            eof: false,
            io_counter: 0,
            mlp: MlpSync {
                substreams: 0,
                samples_per_au: BASE_SAMPLES_PER_AU,
            },
            error_count: 0,
            frames_processed: 0,
            fail_level: Level::Error,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Adds raw bitstream data to the internal buffer.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend(data);
        self.io_counter += 1;
    }

    /// Marks the end of input so the final frame is released.
    pub fn finish(&mut self) {
        self.eof = true;
        self.io_counter += 1;
    }

    /// Whether [`finish`](Extractor::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.eof
    }

    /// Sets the failure level for corrupt frames.
    ///
    /// At `log::Level::Warn` (strict mode) a corrupt frame is returned as an error
    /// instead of being logged and skipped.
    pub fn set_fail_level(&mut self, level: Level) {
        self.fail_level = level;
    }

    /// Frames dropped after the stream was in sync.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    fn resync(&mut self) -> Result<(), ExtractError> {
        self.locked = false;

        let buf = self.buffer.make_contiguous();
        match find_sync(self.codec, buf) {
            Some(offset) => {
                if offset > 0 {
                    trace!("Skipped {offset} bytes looking for {} sync", self.codec);
                }
                self.consume_front(offset);
                self.locked = true;
                Ok(())
            }
            None => {
                let keep = if self.eof { 0 } else { SYNC_SEARCH_KEEP };
                let drop = self.buffer.len().saturating_sub(keep);
                self.consume_front(drop);
                self.insufficient()
            }
        }
    }

    fn consume_front(&mut self, cnt: usize) {
        self.buffer.drain(..cnt);
    }

    fn insufficient(&mut self) -> Result<(), ExtractError> {
        self.io_counter = self.io_counter.saturating_sub(1);
        Err(ExtractError::InsufficientData)
    }

    fn iter_insufficient(&mut self) -> Option<Result<Frame, ExtractError>> {
        self.io_counter = self.io_counter.saturating_sub(1);
        Some(Err(ExtractError::InsufficientData))
    }

    fn report(&self, error: ExtractError) -> Result<(), ExtractError> {
        log_or_err!(self, Level::Warn, error);
        Ok(())
    }

    /// Length and sample count of the frame at the start of the buffer.
    ///
    /// `Ok(None)` means more input is needed to decide.
    fn measure(&mut self) -> Result<Option<(usize, u32)>, ExtractError> {
        let eof = self.eof;
        let in_sync = self.in_sync;
        let buf: &[u8] = self.buffer.make_contiguous();

        match self.codec {
            Codec::Ac3 | Codec::Eac3 => measure_a52(buf, self.codec, eof),
            Codec::Dts => measure_dts(buf, eof),
            Codec::TrueHd | Codec::Mlp => measure_mlp(buf, &mut self.mlp, in_sync),
        }
    }
}

fn find_sync(codec: Codec, buf: &[u8]) -> Option<usize> {
    match codec {
        Codec::Ac3 | Codec::Eac3 => buf.windows(2).position(|w| A52Header::has_sync(w)),
        Codec::Dts => (0..buf.len().saturating_sub(NEXT_SYNC_LEN - 1))
            .find(|&i| DtsSyncType::detect(&buf[i..]).is_some_and(DtsSyncType::is_core)),
        Codec::TrueHd | Codec::Mlp => buf
            .windows(4)
            .enumerate()
            .skip(4)
            .find(|(_, w)| w[..3] == MAJOR_SYNC_PREFIX && (w[3] == 0xBA || w[3] == 0xBB))
            .map(|(i, _)| i - 4),
    }
}

fn measure_a52(buf: &[u8], codec: Codec, eof: bool) -> Result<Option<(usize, u32)>, ExtractError> {
    if buf.len() < A52_HEADER_SIZE {
        return Ok(None);
    }

    let header = A52Header::parse(buf)?;
    match codec {
        Codec::Ac3 if header.is_eac3() => {
            return Err(ExtractError::CodecMismatch {
                found: "E-AC-3",
                expected: "AC-3",
            });
        }
        _ if header.is_dependent() => return Err(ExtractError::InvalidSyncPattern),
        _ => {}
    }

    let mut len = header.frame_size;
    if buf.len() < len {
        return Ok(None);
    }

    if codec == Codec::Eac3 {
        let rest = &buf[len..];
        if rest.len() < A52_HEADER_SIZE && !eof {
            return Ok(None);
        }
        if let Ok(dependent) = A52Header::parse(rest)
            && dependent.is_dependent()
        {
            if rest.len() < dependent.frame_size {
                if !eof {
                    return Ok(None);
                }
            } else {
                len += dependent.frame_size;
            }
        }
    }

    if !eof {
        if buf.len() < len + 2 {
            return Ok(None);
        }
        if !A52Header::has_sync(&buf[len..]) {
            return Err(ExtractError::InvalidSyncPattern);
        }
    }

    Ok(Some((len, header.samples)))
}

fn measure_dts(buf: &[u8], eof: bool) -> Result<Option<(usize, u32)>, ExtractError> {
    if buf.len() < DTS_HEADER_SIZE_14BIT {
        return Ok(None);
    }

    let header = DtsHeader::parse(buf)?;
    let mut len = header.frame_size;
    if buf.len() < len {
        return Ok(None);
    }

    let rest = &buf[len..];
    if rest.len() < DTS_SUBSTREAM_HEADER_SIZE && !eof {
        return Ok(None);
    }
    if DtsSyncType::detect(rest) == Some(DtsSyncType::Substream) {
        let substream = DtsSubstreamHeader::parse(rest)?;
        if rest.len() < substream.frame_size {
            if !eof {
                return Ok(None);
            }
        } else {
            len += substream.frame_size;
        }
    }

    if !eof {
        if buf.len() < len + NEXT_SYNC_LEN {
            return Ok(None);
        }
        if !DtsSyncType::detect(&buf[len..]).is_some_and(DtsSyncType::is_core) {
            return Err(ExtractError::InvalidSyncPattern);
        }
    }

    Ok(Some((len, header.frame_length)))
}

fn measure_mlp(
    buf: &[u8],
    sync: &mut MlpSync,
    in_sync: bool,
) -> Result<Option<(usize, u32)>, ExtractError> {
    if buf.len() < MLP_MIN_ACCESS_UNIT {
        return Ok(None);
    }

    let header = AccessUnitHeader::parse(buf)?;
    if header.length < MLP_MIN_ACCESS_UNIT {
        return Err(HeaderError::InvalidAccessUnitLength(header.length).into());
    }

    let mut substreams = sync.substreams;
    let mut samples_per_au = sync.samples_per_au;
    if let Some(major) = header.major_sync() {
        let Some(found) = major_sync_substreams(buf) else {
            return Ok(None);
        };
        if in_sync && found != sync.substreams {
            return Err(ExtractError::SubstreamMismatch {
                found,
                expected: sync.substreams,
            });
        }
        substreams = found;
        samples_per_au = major.samples_per_au();
    } else if !in_sync {
        return Err(ExtractError::InvalidSyncPattern);
    }

    match check_nibble(buf, substreams) {
        None => return Ok(None),
        Some(false) => return Err(ExtractError::ParityCheckFailed),
        Some(true) => {}
    }

    if buf.len() < header.length {
        return Ok(None);
    }

    sync.substreams = substreams;
    sync.samples_per_au = samples_per_au;
    Ok(Some((header.length, samples_per_au)))
}

impl Iterator for Extractor {
    type Item = Result<Frame, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_counter == 0 {
            return None;
        }

        loop {
            if !self.locked && self.resync().is_err() {
                return None;
            }

            let error = match self.measure() {
                Ok(Some((len, sample_count))) => {
                    let data: Vec<u8> = self.buffer.drain(..len).collect();
                    self.in_sync = true;
                    self.frames_processed += 1;

                    return Some(Ok(Frame {
                        data: data.into(),
                        sample_count,
                    }));
                }
                Ok(None) if !self.eof => return self.iter_insufficient(),
                // A candidate that cannot complete before the end of input.
                Ok(None) => ExtractError::InsufficientData,
                Err(error) => error,
            };

            self.locked = false;
            if self.buffer.is_empty() {
                continue;
            }
            self.consume_front(1);

            if std::mem::replace(&mut self.in_sync, false) {
                self.error_count += 1;
                if let Err(error) = self.report(error) {
                    return Some(Err(error));
                }
            } else {
                debug!("Rejected {} sync candidate: {error}", self.codec);
            }
        }
    }
}

/// A single syncframe extracted from a bitstream.
///
/// Frame data can be accessed through the [`AsRef<[u8]>`] implementation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Arc<[u8]>,
    /// Audio samples per channel the frame decodes to.
    pub sample_count: u32,
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Frame {
    /// Checks for a TrueHD/MLP major sync at bytes 4-6.
    pub fn is_major_sync(&self) -> bool {
        self.data.get(4..7) == Some(&MAJOR_SYNC_PREFIX[..])
    }

    /// Borrows the frame for the encapsulator, with `pts` used for both timestamps
    /// and the sample count as duration.
    pub fn to_elementary(&self, pts: Option<i64>) -> ElementaryFrame<'_> {
        ElementaryFrame::new(&self.data, self.sample_count)
            .with_timing(pts, pts)
            .with_duration(self.sample_count as u64)
    }
}
