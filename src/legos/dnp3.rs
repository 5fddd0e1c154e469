//! DNP3 link-layer framing.
//!
//! The payload is cut into segments of at most 250 bytes. Each segment is
//! emitted as
//!
//! ```text
//! 05 64 | len | control | dst (LE u16) | src (LE u16) | crc16(header) LE
//! frag  | { crc16(chunk) LE | chunk }*   (chunks of at most 16 bytes)
//! ```
//!
//! where `len` is the segment length and `frag` carries the segment index
//! modulo 64 in its low six bits, with `0x40` set on the first segment and
//! `0x80` set on the last.

use crate::blocks::{BlockOptions, ChecksumOptions, Encoder};
use crate::checksum::{crc16, ChecksumAlgorithm};
use crate::codec::Endianness;
use crate::error::SpecError;
use crate::primitives::BitFieldOptions;
use crate::request::Request;
use byteorder::{ByteOrder, LittleEndian};

pub const SEGMENT_LEN: usize = 250;
pub const CHUNK_LEN: usize = 16;
pub const START: [u8; 2] = [0x05, 0x64];
pub const FIRST_SEGMENT: u8 = 0x40;
pub const LAST_SEGMENT: u8 = 0x80;
pub const SEQUENCE_MASK: u8 = 0x3F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dnp3Options {
    pub control: u8,
    pub destination: u16,
    pub source: u16,
}

impl Default for Dnp3Options {
    fn default() -> Self {
        Dnp3Options {
            control: 0x44,
            destination: 0,
            source: 0,
        }
    }
}

/// Fragmentation flag byte for segment `index` of `count`.
pub fn frag_flags(index: usize, count: usize) -> u8 {
    let mut flags = (index & SEQUENCE_MASK as usize) as u8;
    if index == 0 {
        flags |= FIRST_SEGMENT;
    }
    if index + 1 == count {
        flags |= LAST_SEGMENT;
    }
    flags
}

fn put_crc16(out: &mut Vec<u8>, data: &[u8]) {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, crc16(data));
    out.extend_from_slice(&buf);
}

/// Frame `payload` into link-layer packets, one per segment.
pub fn frames(payload: &[u8], opts: &Dnp3Options) -> Vec<Vec<u8>> {
    let count = payload.chunks(SEGMENT_LEN).count();
    payload
        .chunks(SEGMENT_LEN)
        .enumerate()
        .map(|(i, segment)| {
            let mut p = Vec::with_capacity(11 + segment.len() + 2 * segment.len().div_ceil(CHUNK_LEN));
            p.extend_from_slice(&START);
            p.push(segment.len() as u8);
            p.push(opts.control);
            let mut addr = [0u8; 4];
            LittleEndian::write_u16(&mut addr[..2], opts.destination);
            LittleEndian::write_u16(&mut addr[2..], opts.source);
            p.extend_from_slice(&addr);
            let header = p.clone();
            put_crc16(&mut p, &header);
            p.push(frag_flags(i, count));
            for chunk in segment.chunks(CHUNK_LEN) {
                put_crc16(&mut p, chunk);
                p.extend_from_slice(chunk);
            }
            p
        })
        .collect()
}

/// Block encoder: prefix the block's bytes with their CRC16.
fn crc16_prefix(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    put_crc16(&mut out, data);
    out.extend_from_slice(data);
    out
}

/// Declare the framed payload as block `name`. At default state it renders
/// to the concatenation of [`frames`]; the control byte and both addresses
/// are fuzzable and the header CRC follows them.
pub(crate) fn build(
    req: &mut Request,
    name: &str,
    payload: &[u8],
    opts: &Dnp3Options,
) -> Result<(), SpecError> {
    let field = BitFieldOptions::default();
    let count = payload.chunks(SEGMENT_LEN).count();

    req.open_block(name, BlockOptions::default())?;
    for (i, segment) in payload.chunks(SEGMENT_LEN).enumerate() {
        let header = format!("{}.header{}", name, i);
        req.open_block(&header, BlockOptions::default())?;
        req.push_binary("05 64", None)?;
        req.push_static(vec![segment.len() as u8], None)?;
        let control = format!("{}.control{}", name, i);
        let dst = format!("{}.dst{}", name, i);
        let src = format!("{}.src{}", name, i);
        req.push_byte(opts.control, &field, Some(control.as_str()))?;
        req.push_word(opts.destination, &field, Some(dst.as_str()))?;
        req.push_word(opts.source, &field, Some(src.as_str()))?;
        req.close_block()?;
        req.push_checksum(
            &header,
            ChecksumOptions {
                algorithm: ChecksumAlgorithm::Crc16,
                length: 2,
                endian: Endianness::Little,
            },
            None,
        )?;
        req.push_static(vec![frag_flags(i, count)], None)?;
        for (x, chunk) in segment.chunks(CHUNK_LEN).enumerate() {
            let chunk_opts = BlockOptions {
                encoder: Some(crc16_prefix as Encoder),
                ..Default::default()
            };
            req.open_block(&format!("{}.chunk{}.{}", name, i, x), chunk_opts)?;
            req.push_static(chunk.to_vec(), None)?;
            req.close_block()?;
        }
    }
    req.close_block()?;
    Ok(())
}
