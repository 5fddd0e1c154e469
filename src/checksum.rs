//! Checksum algorithms used by checksum blocks and the DNP3 framer.

use crate::codec::{u64_to_bytes, Endianness};
use crate::error::SpecError;
use md5::Md5;
use sha1::{Digest, Sha1};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Crc16,
    Crc32,
    Adler32,
    Md5,
    Sha1,
}

impl FromStr for ChecksumAlgorithm {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crc16" => Ok(ChecksumAlgorithm::Crc16),
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            "adler32" => Ok(ChecksumAlgorithm::Adler32),
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha1" => Ok(ChecksumAlgorithm::Sha1),
            other => Err(SpecError::invalid(format!(
                "unsupported checksum algorithm '{}'",
                other
            ))),
        }
    }
}

impl ChecksumAlgorithm {
    /// Digest width in bytes when no explicit length is requested.
    pub fn native_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Crc16 => 2,
            ChecksumAlgorithm::Crc32 | ChecksumAlgorithm::Adler32 => 4,
            ChecksumAlgorithm::Md5 => 16,
            ChecksumAlgorithm::Sha1 => 20,
        }
    }

    /// Digest `data` into `length` bytes (0 = native width).
    ///
    /// CRC/Adler values are integers and honour `endian`; MD5/SHA1 are byte
    /// strings that are truncated or zero-padded to `length`.
    pub fn digest(&self, data: &[u8], length: usize, endian: Endianness) -> Vec<u8> {
        let len = if length == 0 { self.native_len() } else { length };
        match self {
            ChecksumAlgorithm::Crc16 => u64_to_bytes(crc16(data) as u64, len, endian),
            ChecksumAlgorithm::Crc32 => u64_to_bytes(crc32(data) as u64, len, endian),
            ChecksumAlgorithm::Adler32 => u64_to_bytes(adler32(data) as u64, len, endian),
            ChecksumAlgorithm::Md5 => fit(md5(data).to_vec(), len),
            ChecksumAlgorithm::Sha1 => fit(sha1(data).to_vec(), len),
        }
    }
}

fn fit(mut digest: Vec<u8>, len: usize) -> Vec<u8> {
    digest.resize(len, 0);
    digest
}

/// Mirror the low `bits` bits of `v`.
fn reflect(v: u32, bits: u32) -> u32 {
    let mut out = 0;
    for b in 0..bits {
        if v & (1 << (bits - 1 - b)) != 0 {
            out |= 1 << b;
        }
    }
    out
}

const CRC16_POLY: u32 = 0x1021;

/// CCITT CRC16, bit-by-bit with augmented zero bits.
///
/// Each input byte is reflected and shifted MSB-first into a zero-initialised
/// register; 16 zero bits are then shifted through and the register is
/// reflected. Equivalent to CRC-16/KERMIT (`"123456789"` -> `0x2189`).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0;
    for &byte in data {
        let c = reflect(byte as u32, 8);
        let mut j = 0x80;
        while j != 0 {
            let carry = crc & 0x8000;
            crc = (crc << 1) & 0xFFFF;
            if c & j != 0 {
                crc |= 1;
            }
            if carry != 0 {
                crc ^= CRC16_POLY;
            }
            j >>= 1;
        }
    }
    for _ in 0..16 {
        let carry = crc & 0x8000;
        crc = (crc << 1) & 0xFFFF;
        if carry != 0 {
            crc ^= CRC16_POLY;
        }
    }
    reflect(crc, 16) as u16
}

pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

pub fn adler32(data: &[u8]) -> u32 {
    adler::adler32_slice(data)
}

pub fn md5(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md5::digest(data));
    out
}

pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Sha1::digest(data));
    out
}
