//! Integer packing for bit fields and sizers.
//!
//! A field is `width` bits wide and is emitted either as raw bytes
//! (`ceil(width / 8)` bytes, value in the low bits, configurable endianness)
//! or as zero-padded decimal ASCII digits.

use crate::error::SpecError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

impl FromStr for Endianness {
    type Err = SpecError;

    /// Accepts the struct-module style markers `<`, `>`, `!` as well as `little` / `big`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" | "little" => Ok(Endianness::Little),
            ">" | "!" | "big" => Ok(Endianness::Big),
            other => Err(SpecError::invalid(format!("unknown endianness '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Binary,
    Ascii,
}

impl FromStr for Format {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Format::Binary),
            "ascii" => Ok(Format::Ascii),
            other => Err(SpecError::invalid(format!("unknown format '{}'", other))),
        }
    }
}

/// All-ones value of `width` bits.
pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

pub fn byte_len(width: u32) -> usize {
    ((width + 7) / 8) as usize
}

/// Interpret the low `width` bits of `raw` as two's complement.
pub fn sign_extend(raw: u64, width: u32) -> i64 {
    match width {
        0 => 0,
        w if w >= 64 => raw as i64,
        w => {
            let shift = 64 - w;
            ((raw << shift) as i64) >> shift
        }
    }
}

/// Pack `v` into `len` bytes. Lengths above 8 are zero-extended.
pub fn u64_to_bytes(v: u64, len: usize, endian: Endianness) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    match endian {
        Endianness::Big => match len {
            0 => {}
            1 => buf[0] = v as u8,
            2 => BigEndian::write_u16(&mut buf, v as u16),
            4 => BigEndian::write_u32(&mut buf, v as u32),
            8 => BigEndian::write_u64(&mut buf, v),
            _ => {
                let mut b = [0u8; 8];
                BigEndian::write_u64(&mut b, v);
                if len < 8 {
                    buf.copy_from_slice(&b[8 - len..]);
                } else {
                    buf[len - 8..].copy_from_slice(&b);
                }
            }
        },
        Endianness::Little => match len {
            0 => {}
            1 => buf[0] = v as u8,
            2 => LittleEndian::write_u16(&mut buf, v as u16),
            4 => LittleEndian::write_u32(&mut buf, v as u32),
            8 => LittleEndian::write_u64(&mut buf, v),
            _ => {
                let mut b = [0u8; 8];
                LittleEndian::write_u64(&mut b, v);
                let n = len.min(8);
                buf[..n].copy_from_slice(&b[..n]);
            }
        },
    }
    buf
}

/// Decimal digits of `value`, zero-padded to `pad` characters (sign included).
pub fn ascii_digits(value: i128, pad: usize) -> Vec<u8> {
    format!("{:0pad$}", value, pad = pad).into_bytes()
}

fn decimal_width(v: u128) -> usize {
    v.to_string().len()
}

/// How a bit field (or a sizer's output) lays out its integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntLayout {
    pub width: u32,
    pub endian: Endianness,
    pub format: Format,
    pub signed: bool,
}

impl IntLayout {
    pub fn new(width: u32, endian: Endianness, format: Format, signed: bool) -> Self {
        IntLayout {
            width,
            endian,
            format,
            signed,
        }
    }

    /// Characters needed to print the largest magnitude of this field in ASCII.
    pub fn ascii_width(&self) -> usize {
        if self.signed && self.width > 0 {
            decimal_width(1u128 << (self.width - 1)) + 1
        } else {
            decimal_width(mask(self.width) as u128)
        }
    }

    /// Numeric value of `raw` as seen through this layout.
    pub fn interpret(&self, raw: u64) -> i128 {
        let raw = raw & mask(self.width);
        if self.signed {
            sign_extend(raw, self.width) as i128
        } else {
            raw as i128
        }
    }

    pub fn encode(&self, raw: u64) -> Vec<u8> {
        match self.format {
            Format::Binary => {
                u64_to_bytes(raw & mask(self.width), byte_len(self.width), self.endian)
            }
            Format::Ascii => ascii_digits(self.interpret(raw), self.ascii_width()),
        }
    }
}
