//! Format rendered test cases for display.

use std::fmt::Write;

const BYTES_PER_LINE: u64 = 16;

/// Hex dump of `data`, with offsets starting at `addr`.
///
/// Lines break whenever the running address is a multiple of 16, so an
/// unaligned `addr` gives a short first line. Each line is
/// `"%04x: "`, two-digit hex bytes, then the printable-ASCII gutter
/// (`.` for anything outside `0x20..=0x7e`). The final line is padded so
/// that its gutter lines up with the lines above.
pub fn hex_dump(data: &[u8], addr: u64) -> String {
    let mut out = String::new();
    let mut line: Vec<u8> = Vec::with_capacity(BYTES_PER_LINE as usize);
    let mut addr = addr;

    for &byte in data {
        if addr % BYTES_PER_LINE == 0 && !line.is_empty() {
            push_gutter(&mut out, &line);
            out.push('\n');
            line.clear();
        }
        if line.is_empty() {
            let _ = write!(out, "{:04x}: ", addr);
        }
        let _ = write!(out, "{:02x} ", byte);
        line.push(byte);
        addr += 1;
    }

    if !line.is_empty() {
        let remainder = addr % BYTES_PER_LINE;
        if remainder != 0 {
            out.push_str(&"   ".repeat((BYTES_PER_LINE - remainder) as usize));
        }
        push_gutter(&mut out, &line);
    }
    out
}

fn push_gutter(out: &mut String, line: &[u8]) {
    out.push(' ');
    out.extend(line.iter().map(|&b| {
        if (0x20..=0x7e).contains(&b) {
            b as char
        } else {
            '.'
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_full_line() {
        let data: Vec<u8> = (0x41..0x51).collect();
        let dump = hex_dump(&data, 0);
        assert_eq!(
            dump,
            "0000: 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f 50  ABCDEFGHIJKLMNOP"
        );
    }

    #[test]
    fn short_last_line_is_padded() {
        let mut data = vec![b'x'; 16];
        data.extend_from_slice(&[0x00, b'y']);
        let dump = hex_dump(&data, 0);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("0010: 00 79 "));
        assert!(lines[1].ends_with(" .y"));
        assert_eq!(lines[0].len(), lines[1].len() + 14);
    }

    #[test]
    fn unaligned_start() {
        let dump = hex_dump(b"abcd", 14);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "000e: 61 62  ab");
        assert!(lines[1].starts_with("0010: 63 64 "));
    }

    #[test]
    fn empty() {
        assert_eq!(hex_dump(&[], 0), "");
    }
}
