//! Parse raw-hex notation into bytes using PEST.

use crate::error::SpecError;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct HexParser;

/// Parse loose hex into bytes.
///
/// `0x`, `\x`, spaces, tabs, newlines and commas are separators and are
/// dropped; the remaining digits are read in pairs. A trailing unpaired
/// digit becomes a byte of its own (`"123"` is `[0x12, 0x03]`).
pub fn parse_binary(source: &str) -> Result<Vec<u8>, SpecError> {
    let pairs = HexParser::parse(Rule::binary, source)
        .map_err(|e| SpecError::invalid(format!("raw hex: {}", e)))?;
    let binary = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SpecError::invalid("raw hex: empty parse"))?;

    let mut digits = Vec::new();
    for inner in binary.into_inner() {
        if inner.as_rule() == Rule::hex_digit {
            let d = inner
                .as_str()
                .chars()
                .next()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| SpecError::invalid(format!("raw hex: bad digit {:?}", inner.as_str())))?;
            digits.push(d as u8);
        }
    }
    Ok(digits
        .chunks(2)
        .map(|pair| pair.iter().fold(0u8, |acc, d| (acc << 4) | d))
        .collect())
}
