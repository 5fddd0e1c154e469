//! Property tests: raw-hex separators, render idempotence, size/checksum
//! derivation and DNP3 framing over arbitrary inputs.

use fuzzblocks::checksum::crc16;
use fuzzblocks::legos::dnp3::{frames, SEGMENT_LEN, SEQUENCE_MASK};
use fuzzblocks::{
    parse_binary, BitFieldOptions, BlockOptions, ChecksumAlgorithm, ChecksumOptions,
    Dnp3Options, Endianness, Lego, Request, SizeOptions, StringOptions,
};
use proptest::prelude::*;

const SEPARATORS: &[&str] = &["", " ", "\t", ",", "0x", "\\x", "\r\n", ", 0x"];

fn hex_digit() -> impl Strategy<Value = char> {
    prop::sample::select("0123456789abcdefABCDEF".chars().collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn prop_hex_separators_are_ignored(
        tokens in prop::collection::vec((prop::sample::select(SEPARATORS.to_vec()), hex_digit()), 0..64)
    ) {
        let mut noisy = String::new();
        let mut plain = String::new();
        for (sep, digit) in &tokens {
            noisy.push_str(sep);
            noisy.push(*digit);
            plain.push(*digit);
        }
        let expected = parse_binary(&plain).unwrap();
        prop_assert_eq!(parse_binary(&noisy).unwrap(), expected.clone());
        prop_assert_eq!(expected.len(), (plain.len() + 1) / 2);
    }

    #[test]
    fn prop_render_is_idempotent(
        text in "[a-z]{0,12}",
        byte in any::<u8>(),
        steps in 0usize..40,
    ) {
        let mut req = Request::new("p");
        req.open_block("body", BlockOptions::default()).unwrap();
        req.push_string(&text, StringOptions { max_len: 16, ..Default::default() }, Some("s")).unwrap();
        req.push_byte(byte, &BitFieldOptions::default(), Some("b")).unwrap();
        req.close_block().unwrap();
        req.push_size("body", SizeOptions::default(), None).unwrap();
        for _ in 0..steps {
            req.mutate();
        }
        prop_assert_eq!(req.render(), req.render());
    }

    #[test]
    fn prop_size_and_checksum_track_payload(payload in prop::collection::vec(any::<u8>(), 0..300)) {
        let mut req = Request::new("p");
        req.open_block("body", BlockOptions::default()).unwrap();
        req.push_static(payload.clone(), None).unwrap();
        req.close_block().unwrap();
        req.push_size("body", SizeOptions::default(), None).unwrap();
        req.push_checksum(
            "body",
            ChecksumOptions { algorithm: ChecksumAlgorithm::Crc16, length: 0, endian: Endianness::Big },
            None,
        ).unwrap();
        let out = req.render();
        let n = payload.len();
        prop_assert_eq!(&out[..n], &payload[..]);
        prop_assert_eq!(&out[n..n + 4], &(n as u32).to_le_bytes()[..]);
        prop_assert_eq!(&out[n + 4..], &crc16(&payload).to_be_bytes()[..]);
    }

    #[test]
    fn prop_dnp3_segments(payload in prop::collection::vec(any::<u8>(), 0..800)) {
        let opts = Dnp3Options::default();
        let f = frames(&payload, &opts);
        prop_assert_eq!(f.len(), payload.len().div_ceil(SEGMENT_LEN));
        for (i, frame) in f.iter().enumerate() {
            prop_assert_eq!(frame[10] & SEQUENCE_MASK, (i % 64) as u8);
            prop_assert_eq!(frame[10] & 0x40 != 0, i == 0);
            prop_assert_eq!(frame[10] & 0x80 != 0, i + 1 == f.len());
        }

        let mut req = Request::new("p");
        req.push_lego(&Lego::Dnp3(opts), &payload).unwrap();
        prop_assert_eq!(req.render(), f.concat());
    }

    #[test]
    fn prop_dnp3_flags_past_sequence_wrap(segments in 1usize..300, tail in 1usize..=SEGMENT_LEN) {
        let payload = vec![0xA5u8; (segments - 1) * SEGMENT_LEN + tail];
        let f = frames(&payload, &Dnp3Options::default());
        prop_assert_eq!(f.len(), segments);
        for (i, frame) in f.iter().enumerate() {
            prop_assert_eq!(frame[10] & SEQUENCE_MASK, (i % 64) as u8);
            prop_assert_eq!(frame[10] & 0x40 != 0, i == 0);
            prop_assert_eq!(frame[10] & 0x80 != 0, i + 1 == segments);
        }
    }
}
