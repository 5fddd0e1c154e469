//! Raw-hex fuzz target: feed arbitrary text to the hex parser.
//! The parser must not panic; it returns bytes or InvalidParameter.
//! Build with: cargo fuzz run binary_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(bytes) = fuzzblocks::parse_binary(s) {
        let digits = s.chars().filter(|c| c.is_ascii_hexdigit()).count();
        assert!(bytes.len() <= digits.div_ceil(2));
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run binary_fuzz");
}
