//! Deterministic mutation corpora for integers, strings and delimiters.
//!
//! Corpora are fixed, ordered and de-duplicated so that every sweep over a
//! request visits the same cases in the same order.

use crate::codec::mask;
use crate::primitives::Encoding;
use std::collections::HashSet;

/// Default lengths for long single-unit runs in the string corpus.
pub const DEFAULT_LONG_STRING_LENGTHS: &[usize] = &[
    128, 255, 256, 257, 511, 512, 513, 1023, 1024, 2048, 2049, 4095, 4096, 4097, 5000, 10000,
    20000, 32762, 32763, 32764, 32765, 32766, 32767, 65535,
];

/// Units repeated to the long lengths above.
const LONG_RUN_UNITS: &[&str] = &[
    "A", "B", "1", "<", ">", "'", "\"", "/", "\\", "?", "=", "a=", "&", ".", ",", "(", ")", "]",
    "[", "%", "*", "-", "+", "{", "}", "\x14",
];

/// Bytes that break common encodings (BOMs, overlong/invalid UTF-8, surrogates).
const ENCODING_BREAKERS: &[&[u8]] = &[
    b"\xfe\xff",
    b"\xff\xfe",
    b"\xef\xbb\xbf",
    b"\xc0\xaf",
    b"\xe0\x80\xaf",
    b"\xed\xa0\x80",
    b"\xf4\x90\x80\x80",
    b"\x00",
    b"\x00\x00\x00\x00",
    b"%00",
    b"%u0000",
];

const DELIMITERS: &[&str] = &[
    " ", "\t", "!", "@", "#", "$", "%", "^", "&", "*", "(", ")", "-", "_", "+", "=", ":", ";",
    "'", "\"", "/", "\\", "?", "<", ">", ".", ",", "\r", "\n",
];

/// Integer boundary corpus for a `width`-bit field.
///
/// Around each of `0, max/2, max/3, max/4, max/8, max/16, max/32, max` the
/// values `b-2 ..= b+2` that fit the field, first-seen order.
pub fn integer_boundaries(width: u32) -> Vec<u64> {
    let max = mask(width);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for b in [0, max / 2, max / 3, max / 4, max / 8, max / 16, max / 32, max] {
        for delta in -2i128..=2 {
            let v = b as i128 + delta;
            if v < 0 || v > max as i128 {
                continue;
            }
            let v = v as u64;
            if seen.insert(v) {
                out.push(v);
            }
        }
    }
    out
}

/// One string-corpus entry, materialised on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Text passed through the field's encoding.
    Text(String),
    /// `unit` repeated `count` times, then encoded.
    Run { unit: String, count: usize },
    /// Raw bytes, bypassing the encoding.
    Raw(Vec<u8>),
    /// `byte` repeated `count` times, raw.
    RawRun { byte: u8, count: usize },
}

impl Candidate {
    pub fn materialize(&self, encoding: Encoding) -> Vec<u8> {
        match self {
            Candidate::Text(s) => encoding.encode(s),
            Candidate::Run { unit, count } => encoding.encode(unit).repeat(*count),
            Candidate::Raw(b) => b.clone(),
            Candidate::RawRun { byte, count } => vec![*byte; *count],
        }
    }
}

/// String corpus for a field whose default is `original`.
pub fn string_corpus(original: &str, long_lengths: &[usize]) -> Vec<Candidate> {
    let mut out = vec![
        Candidate::Text(String::new()),
        Candidate::Run { unit: original.to_string(), count: 2 },
        Candidate::Run { unit: original.to_string(), count: 10 },
        Candidate::Run { unit: original.to_string(), count: 100 },
        Candidate::Text(format!("{}\0", original)),
    ];

    for unit in ["%n", "%s", "%x", "\"%n\"", "\"%s\""] {
        for count in [100, 500] {
            out.push(Candidate::Run { unit: unit.to_string(), count });
        }
    }

    for s in [
        "|touch /tmp/FUZZ",
        ";touch /tmp/FUZZ;",
        "|notepad",
        ";notepad;",
        "\nnotepad\n",
        "`id`",
        "$(id)",
        "&& id",
    ] {
        out.push(Candidate::Text(s.to_string()));
    }

    out.push(Candidate::Text(format!("/.:/{}\0\0", "A".repeat(5000))));
    out.push(Candidate::Text(format!("/.../{}\0\0", "B".repeat(5000))));
    out.push(Candidate::Run { unit: "/.../".to_string(), count: 5000 });
    out.push(Candidate::Text(format!("{}etc/passwd", "../".repeat(64))));
    out.push(Candidate::Text(format!("{}boot.ini", "..\\".repeat(64))));
    out.push(Candidate::Run { unit: "\r\n".to_string(), count: 100 });
    out.push(Candidate::Run { unit: "<>".to_string(), count: 500 });

    for unit in LONG_RUN_UNITS {
        for &count in long_lengths {
            out.push(Candidate::Run { unit: unit.to_string(), count });
        }
    }

    for b in ENCODING_BREAKERS {
        out.push(Candidate::Raw(b.to_vec()));
    }
    for byte in [0xFE, 0xFF, 0x00] {
        for &count in long_lengths.iter().take(3) {
            out.push(Candidate::RawRun { byte, count });
        }
    }
    out
}

/// Delimiter corpus for a delimiter whose default is `original`.
pub fn delim_corpus(original: &[u8]) -> Vec<Vec<u8>> {
    let mut cands: Vec<Vec<u8>> = Vec::new();
    for n in [2, 5, 10, 25, 100, 500, 1000] {
        cands.push(original.repeat(n));
    }
    cands.push(Vec::new());
    if original == b" " {
        cands.push(b"\t".to_vec());
        cands.push(b"\t\t".to_vec());
        cands.push(b"\t".repeat(100));
    }
    for d in DELIMITERS {
        cands.push(d.as_bytes().to_vec());
    }
    cands.push(b"\t ".repeat(100));
    cands.push(b"\t\r\n".repeat(100));
    cands.push(b": ".repeat(100));
    cands.push(b":7".repeat(100));
    for n in [64, 128, 512] {
        cands.push(b"\r\n".repeat(n));
    }

    let mut seen = HashSet::new();
    cands.retain(|c| seen.insert(c.clone()));
    cands
}
