//! DNP3 fuzz target: frame arbitrary payloads both directly and through the
//! lego, and check that the two agree.
//! Build with: cargo fuzz run dnp3_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use fuzzblocks::legos::dnp3::frames;
    use fuzzblocks::{Dnp3Options, Lego, Request};

    let opts = Dnp3Options::default();
    let direct = frames(data, &opts).concat();
    let mut req = Request::new("fuzz");
    if req.push_lego(&Lego::Dnp3(opts), data).is_ok() {
        assert_eq!(req.render(), direct);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run dnp3_fuzz");
}
