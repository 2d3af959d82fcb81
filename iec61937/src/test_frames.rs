//! Synthetic syncframes for unit tests.

use bitstream_io::{BigEndian, BitWrite, BitWriter};

use crate::structs::a52::A52Header;
use crate::structs::mlp::{MAJOR_SYNC_FBA, check_nibble};

fn fill_payload(frame: &mut [u8], from: usize) {
    for (i, byte) in frame.iter_mut().enumerate().skip(from) {
        *byte = ((i * 7 + 3) % 251) as u8;
    }
}

fn finish(writer: BitWriter<Vec<u8>, BigEndian>) -> Vec<u8> {
    let mut writer = writer;
    writer.byte_align().expect("byte align");
    writer.into_writer()
}

pub fn swap_pairs(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for pair in out.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}

/// AC-3 syncframe with `bsid` 8, sized from its own header.
pub fn ac3_frame(fscod: u8, frmsizecod: u8, bsmod: u8, acmod: u8, lfe: bool) -> Vec<u8> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.write_unsigned_var(16, 0x0B77u16).expect("syncword");
    w.write_unsigned_var(16, 0u16).expect("crc1");
    w.write_unsigned_var(2, fscod).expect("fscod");
    w.write_unsigned_var(6, frmsizecod).expect("frmsizecod");
    w.write_unsigned_var(5, 8u8).expect("bsid");
    w.write_unsigned_var(3, bsmod).expect("bsmod");
    w.write_unsigned_var(3, acmod).expect("acmod");
    if acmod & 1 != 0 && acmod != 1 {
        w.write_unsigned_var(2, 0u8).expect("cmixlev");
    }
    if acmod & 4 != 0 {
        w.write_unsigned_var(2, 0u8).expect("surmixlev");
    }
    if acmod == 2 {
        w.write_unsigned_var(2, 0u8).expect("dsurmod");
    }
    w.write_bit(lfe).expect("lfeon");
    let mut frame = finish(w);
    frame.resize(8, 0);

    let size = A52Header::parse(&frame).map_or(8, |h| h.frame_size);
    frame.resize(size, 0);
    fill_payload(&mut frame, 8);
    frame
}

/// E-AC-3 syncframe at 48 kHz with `bsid` 16 and `words` 16-bit words.
pub fn eac3_frame(strmtyp: u8, substream_id: u8, numblkscod: u8, words: u16) -> Vec<u8> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.write_unsigned_var(16, 0x0B77u16).expect("syncword");
    w.write_unsigned_var(2, strmtyp).expect("strmtyp");
    w.write_unsigned_var(3, substream_id).expect("substreamid");
    w.write_unsigned_var(11, words - 1).expect("frmsiz");
    w.write_unsigned_var(2, 0u8).expect("fscod");
    w.write_unsigned_var(2, numblkscod).expect("numblkscod");
    w.write_unsigned_var(3, 2u8).expect("acmod");
    w.write_bit(false).expect("lfeon");
    w.write_unsigned_var(5, 16u8).expect("bsid");
    let mut frame = finish(w);

    frame.resize(words as usize * 2, 0);
    fill_payload(&mut frame, 8);
    frame
}

/// 16-bit big-endian DTS core frame of `fsize + 1` bytes with `amode` 9.
pub fn dts_core_frame(nblks: u8, fsize: u16, sfreq: u8, lff: u8) -> Vec<u8> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.write_unsigned_var(32, 0x7FFE_8001u32).expect("sync");
    w.write_bit(true).expect("ftype");
    w.write_unsigned_var(5, 31u8).expect("short");
    w.write_bit(false).expect("cpf");
    w.write_unsigned_var(7, nblks).expect("nblks");
    w.write_unsigned_var(14, fsize).expect("fsize");
    w.write_unsigned_var(6, 9u8).expect("amode");
    w.write_unsigned_var(4, sfreq).expect("sfreq");
    w.write_unsigned_var(5, 15u8).expect("rate");
    w.write_unsigned_var(5, 0u8).expect("flags");
    w.write_unsigned_var(3, 0u8).expect("ext_audio_id");
    w.write_bit(false).expect("ext_audio");
    w.write_bit(false).expect("aspf");
    w.write_unsigned_var(2, lff).expect("lff");
    let mut frame = finish(w);

    frame.resize(fsize as usize + 1, 0);
    fill_payload(&mut frame, 14);
    frame
}

/// DTS-HD extension substream of `size` bytes.
pub fn dts_substream(size: usize) -> Vec<u8> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.write_unsigned_var(32, 0x6458_2025u32).expect("sync");
    w.write_unsigned_var(8, 0u8).expect("user defined");
    w.write_unsigned_var(2, 0u8).expect("index");
    w.write_bit(false).expect("header size type");
    w.write_unsigned_var(8, 15u8).expect("header size");
    w.write_unsigned_var(16, (size - 1) as u16).expect("frame size");
    let mut frame = finish(w);

    frame.resize(size, 0);
    fill_payload(&mut frame, 16);
    frame
}

/// TrueHD access unit of `len` bytes with one substream and a valid check nibble.
///
/// `ratebits` selects a major sync unit.
pub fn truehd_access_unit(ratebits: Option<u8>, input_timing: u16, len: usize) -> Vec<u8> {
    let mut unit = vec![0u8; len];
    let words = (len / 2) as u16 & 0xFFF;

    let directory = match ratebits {
        Some(ratebits) => {
            unit[4..8].copy_from_slice(&MAJOR_SYNC_FBA.to_be_bytes());
            unit[8] = ratebits << 4;
            unit[20] = 0x10;
            32
        }
        None => 4,
    };
    fill_payload(&mut unit, directory + 2);

    unit[0] = (words >> 8) as u8;
    unit[1] = words as u8;
    unit[2..4].copy_from_slice(&input_timing.to_be_bytes());

    let parity = unit[..4]
        .iter()
        .chain(&unit[directory..directory + 2])
        .fold(0u8, |acc, b| acc ^ b);
    unit[0] |= ((0xF ^ (parity >> 4) ^ parity) & 0xF) << 4;

    debug_assert_eq!(check_nibble(&unit, 1), Some(true));
    unit
}
