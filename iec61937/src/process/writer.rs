//! IEC 61937 burst construction.
//!
//! A burst is a fixed-size buffer: an 8-byte preamble (`Pa`, `Pb`, `Pc`, `Pd`), the
//! payload written as 16-bit words in the link byte order, and zero stuffing up to
//! the repetition period.

use crate::process::{ByteOrder, DataType};
use crate::structs::frame::FrameTiming;
use crate::utils::errors::EncapsulateError;

/// Burst preamble size in bytes.
pub const HEADER_SIZE: usize = 8;

/// Burst sync word `Pa`.
pub const SYNC_WORD_1: u16 = 0xF872;

/// Burst sync word `Pb`.
pub const SYNC_WORD_2: u16 = 0x4E1F;

/// Unit of the `Pd` length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Bytes,
    Bits,
}

impl LengthUnit {
    fn multiplier(self) -> usize {
        match self {
            LengthUnit::Bytes => 1,
            LengthUnit::Bits => 8,
        }
    }
}

/// In-progress burst with a write cursor.
///
/// The cursor starts past the preamble and never exceeds the capacity; writing
/// beyond it is a caller bug and panics.
#[derive(Debug)]
pub struct PacketWriter {
    buf: Vec<u8>,
    offset: usize,
    byte_order: ByteOrder,
    sample_count: u32,
    timing: FrameTiming,
    duration: u64,
}

impl PacketWriter {
    /// Allocates a zeroed burst of `capacity` bytes.
    pub fn begin(
        capacity: usize,
        sample_count: u32,
        timing: FrameTiming,
        byte_order: ByteOrder,
    ) -> Result<Self, EncapsulateError> {
        if capacity <= HEADER_SIZE || !capacity.is_multiple_of(4) {
            return Err(EncapsulateError::InvalidCapacity(capacity));
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)?;
        buf.resize(capacity, 0);

        Ok(Self {
            buf,
            offset: HEADER_SIZE,
            byte_order,
            sample_count,
            timing,
            duration: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn add_duration(&mut self, duration: u64) {
        self.duration += duration;
    }

    /// Copies `data`, swapping byte pairs when `source` differs from the link order.
    ///
    /// A trailing odd byte becomes the high byte of one more 16-bit word.
    pub fn write_bytes(&mut self, data: &[u8], source: ByteOrder) {
        let even = data.len() & !1;
        let written = data.len() + (data.len() & 1);
        assert!(
            written <= self.remaining(),
            "burst overrun: {written} bytes at offset {} of {}",
            self.offset,
            self.buf.len()
        );

        let dst = &mut self.buf[self.offset..self.offset + even];
        if source == self.byte_order {
            dst.copy_from_slice(&data[..even]);
        } else {
            for (out, pair) in dst.chunks_exact_mut(2).zip(data.chunks_exact(2)) {
                out[0] = pair[1];
                out[1] = pair[0];
            }
        }
        self.offset += even;

        if even < data.len() {
            self.write_u16((data[even] as u16) << 8);
        }
    }

    /// Writes one 16-bit word in the link byte order.
    pub fn write_u16(&mut self, value: u16) {
        assert!(self.remaining() >= 2, "burst overrun at offset {}", self.offset);
        let bytes = self.byte_order.u16_bytes(value);
        self.buf[self.offset..self.offset + 2].copy_from_slice(&bytes);
        self.offset += 2;
    }

    pub fn write_padding(&mut self, len: usize) {
        assert!(len <= self.remaining(), "burst overrun at offset {}", self.offset);
        self.buf[self.offset..self.offset + len].fill(0);
        self.offset += len;
    }

    /// Lets `fill` write directly into the unwritten tail and advances by the
    /// length it reports.
    pub fn write_with<E, F>(&mut self, fill: F) -> Result<usize, E>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, E>,
    {
        let written = fill(&mut self.buf[self.offset..])?;
        assert!(written <= self.remaining(), "burst overrun at offset {}", self.offset);
        self.offset += written;
        Ok(written)
    }

    /// Writes the preamble and stuffing and hands the burst over.
    ///
    /// `data_type` is the full `Pc` word.
    pub fn finalize(mut self, data_type: u16, unit: LengthUnit) -> OutputPacket {
        assert!(data_type != 0, "burst without data type");
        assert!(self.offset > HEADER_SIZE, "empty burst");

        let length = ((self.offset - HEADER_SIZE) * unit.multiplier()) as u16;
        let order = self.byte_order;
        for (i, word) in [SYNC_WORD_1, SYNC_WORD_2, data_type, length]
            .into_iter()
            .enumerate()
        {
            self.buf[i * 2..i * 2 + 2].copy_from_slice(&order.u16_bytes(word));
        }
        self.buf[self.offset..].fill(0);

        OutputPacket {
            data: self.buf,
            byte_order: order,
            sample_count: self.sample_count,
            timing: self.timing,
            duration: self.duration,
        }
    }
}

/// Finished burst ready for the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPacket {
    pub data: Vec<u8>,
    pub byte_order: ByteOrder,
    /// Link frames the burst occupies, per codec convention.
    pub sample_count: u32,
    pub timing: FrameTiming,
    pub duration: u64,
}

impl OutputPacket {
    fn word(&self, index: usize) -> u16 {
        self.byte_order
            .read_u16([self.data[index * 2], self.data[index * 2 + 1]])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Full `Pc` word, including the type-dependent upper byte.
    pub fn data_type(&self) -> u16 {
        self.word(2)
    }

    pub fn kind(&self) -> Option<DataType> {
        DataType::from_pc(self.data_type())
    }

    /// Raw `Pd` value, in bits or bytes depending on the data type.
    pub fn payload_length(&self) -> u16 {
        self.word(3)
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_SIZE..]
    }
}

impl AsRef<[u8]> for OutputPacket {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
