//! Repacking between 14-bit and 16-bit DTS word streams.
//!
//! A 14-bit packed DTS stream stores 14 payload bits in each 16-bit word, the two
//! spare bits holding a sign extension of bit 13. IEC 61937 carries the payload
//! densely packed in 16-bit words.

use crate::process::ByteOrder;
use crate::utils::errors::EncapsulateError;

/// Number of densely packed bytes produced from `src_len` bytes of 14-bit words.
pub const fn unpacked_14bit_len(src_len: usize) -> usize {
    (src_len / 2) * 14 / 8
}

/// Unpacks 14-bit words from `src` into a dense big-endian bitstream written to
/// `dst` as 16-bit words in `dst_order`.
///
/// A trailing odd byte is placed in the high half of a final 16-bit word, so the
/// returned length is always even. A trailing odd source byte is ignored.
pub fn unpack_14bit(
    dst: &mut [u8],
    src: &[u8],
    src_order: ByteOrder,
    dst_order: ByteOrder,
) -> Result<usize, EncapsulateError> {
    let produced = unpacked_14bit_len(src.len());
    let written = produced + (produced & 1);
    if written > dst.len() {
        return Err(EncapsulateError::SizeMismatch {
            size: written,
            available: dst.len(),
        });
    }

    let swap = dst_order == ByteOrder::Little;
    let mut acc = 0u32;
    let mut bits = 0u32;
    let mut n = 0;

    for word in src.chunks_exact(2) {
        acc = (acc << 14) | (src_order.read_u16([word[0], word[1]]) & 0x3FFF) as u32;
        bits += 14;

        while bits >= 8 {
            bits -= 8;
            dst[if swap { n ^ 1 } else { n }] = (acc >> bits) as u8;
            acc &= (1 << bits) - 1;
            n += 1;
        }
    }

    if n < written {
        dst[if swap { n ^ 1 } else { n }] = 0;
    }

    Ok(written)
}

/// Packs a dense big-endian bitstream into 14-bit words written in `dst_order`.
///
/// Bit 13 of every word is sign-extended into the two spare bits. The final word
/// is zero-filled on the right when the input is not a multiple of 14 bits.
pub fn pack_14bit(src: &[u8], dst_order: ByteOrder) -> Vec<u8> {
    let total_bits = src.len() * 8;
    let mut out = Vec::with_capacity(total_bits.div_ceil(14) * 2);

    let mut acc = 0u32;
    let mut bits = 0u32;
    let flush = |word: u16, out: &mut Vec<u8>| {
        let word = if word & 0x2000 != 0 { word | 0xC000 } else { word };
        out.extend_from_slice(&dst_order.u16_bytes(word));
    };

    for &byte in src {
        acc = (acc << 8) | byte as u32;
        bits += 8;

        if bits >= 14 {
            bits -= 14;
            flush(((acc >> bits) & 0x3FFF) as u16, &mut out);
            acc &= (1 << bits) - 1;
        }
    }

    if bits > 0 {
        flush(((acc << (14 - bits)) & 0x3FFF) as u16, &mut out);
    }

    out
}
