//! Construction-time errors: every failed declaration is reported by the call
//! that made it and leaves the request unchanged.

use fuzzblocks::{
    BitFieldOptions, BlockOptions, ChecksumAlgorithm, ChecksumOptions, Context, Dependency,
    Encoding, LegacyOp, Lego, RandomOptions, RepeatOptions, Request, SizeOptions, SpecError,
    Value,
};

fn base() -> Request {
    let mut req = Request::new("req");
    req.push_byte(1, &BitFieldOptions::default(), Some("n")).expect("byte");
    req.open_block("body", BlockOptions::default()).expect("open");
    req.push_static(b"abc".to_vec(), None).expect("static");
    req.close_block().expect("close");
    req
}

fn invalid<T>(r: Result<T, SpecError>) -> bool {
    matches!(r, Err(SpecError::InvalidParameter(_)))
}

/// Observable state used to check that a failed call changed nothing.
fn snapshot(req: &Request) -> (Vec<String>, Vec<u8>, u64, usize) {
    (
        req.names().into_iter().map(String::from).collect(),
        req.render(),
        req.num_mutations(),
        req.depth(),
    )
}

#[test]
fn test_duplicate_field_name() {
    let mut req = base();
    let before = snapshot(&req);
    assert_eq!(
        req.push_static(b"z".to_vec(), Some("n")),
        Err(SpecError::DuplicateName("n".into()))
    );
    assert_eq!(
        req.open_block("body", BlockOptions::default()),
        Err(SpecError::DuplicateName("body".into()))
    );
    assert_eq!(
        req.push_size("body", SizeOptions::default(), Some("n")),
        Err(SpecError::DuplicateName("n".into()))
    );
    assert_eq!(snapshot(&req), before);
}

#[test]
fn test_duplicate_request_name() {
    let mut ctx = Context::new();
    ctx.init("r").expect("init");
    assert!(matches!(ctx.init("r"), Err(SpecError::DuplicateName(_))));
    assert!(matches!(ctx.switch("nope"), Err(SpecError::NotFound(_))));
}

#[test]
fn test_modifier_against_open_block_is_dangling() {
    let mut req = base();
    req.open_block("open", BlockOptions::default()).expect("open");
    req.push_static(b"x".to_vec(), None).expect("static");
    let before = snapshot(&req);

    let size = req.push_size("open", SizeOptions::default(), None);
    assert_eq!(size, Err(SpecError::DanglingReference("open".into())));
    let sum = req.push_checksum("open", ChecksumOptions::default(), None);
    assert_eq!(sum, Err(SpecError::DanglingReference("open".into())));
    let rep = req.push_repeat("open", RepeatOptions::range(1, 2), None);
    assert_eq!(rep, Err(SpecError::DanglingReference("open".into())));
    assert_eq!(snapshot(&req), before);

    req.close_block().expect("close");
    assert!(req.push_size("open", SizeOptions::default(), None).is_ok());
}

#[test]
fn test_modifier_against_unknown_name() {
    let mut req = base();
    assert_eq!(
        req.push_checksum("missing", ChecksumOptions::default(), None),
        Err(SpecError::NotFound("missing".into()))
    );
}

#[test]
fn test_modifier_target_must_be_a_block() {
    let mut req = base();
    assert!(matches!(
        req.push_size("n", SizeOptions::default(), None),
        Err(SpecError::InvalidParameter(_))
    ));
}

#[test]
fn test_cross_request_reference_rejected() {
    let mut ctx = Context::new();
    let a = ctx.init("a").expect("init a");
    a.open_block("blk", BlockOptions::default()).expect("open");
    a.close_block().expect("close");
    let b = ctx.init("b").expect("init b");
    assert_eq!(
        b.push_size("blk", SizeOptions::default(), None),
        Err(SpecError::NotFound("blk".into()))
    );
}

#[test]
fn test_close_without_open() {
    let mut req = base();
    assert_eq!(req.close_block(), Err(SpecError::EmptyStack));
    let mut ctx = Context::new();
    assert_eq!(ctx.close_block(), Err(SpecError::NoCurrentRequest));
}

#[test]
fn test_block_group_and_dependency_resolution() {
    let mut req = base();
    let before = snapshot(&req);
    let with_group = |g: &str| BlockOptions {
        group: Some(g.to_string()),
        ..Default::default()
    };
    assert_eq!(
        req.open_block("b1", with_group("nope")),
        Err(SpecError::NotFound("nope".into()))
    );
    assert!(matches!(
        req.open_block("b1", with_group("n")),
        Err(SpecError::InvalidParameter(_))
    ));
    let dep = |d: Dependency| BlockOptions {
        dep: Some(d),
        ..Default::default()
    };
    assert_eq!(
        req.open_block("b1", dep(Dependency::new("ghost", 1u8))),
        Err(SpecError::NotFound("ghost".into()))
    );
    assert!(matches!(
        req.open_block("b1", dep(Dependency::new("body", 1u8))),
        Err(SpecError::InvalidParameter(_))
    ));
    assert!(matches!(
        req.open_block("b1", dep(Dependency::one_of("n", Vec::new()))),
        Err(SpecError::InvalidParameter(_))
    ));
    assert_eq!(snapshot(&req), before);
}

#[test]
fn test_invalid_parameters() {
    let mut req = base();
    let before = snapshot(&req);

    assert!(invalid(req.push_binary("05 zz", Some("hex"))));
    assert!(invalid(req.push_bit_field(0, 0, &BitFieldOptions::default(), None)));
    assert!(invalid(req.push_bit_field(0, 65, &BitFieldOptions::default(), None)));
    assert!(invalid(req.push_group(Vec::new(), Some("g"))));
    assert!(invalid(req.push_random(Vec::new(), &RandomOptions::new(5, 1), None)));
    assert!(invalid(req.push_repeat("body", RepeatOptions::range(3, 1), None)));
    let both = RepeatOptions {
        fuzzable: true,
        ..RepeatOptions::variable("n")
    };
    assert!(invalid(req.push_repeat("body", both, None)));
    let not_int = RepeatOptions::variable("body");
    assert!(invalid(req.push_repeat("body", not_int, None)));
    assert!(invalid(req.update("body", Value::UInt(1))));
    assert!(invalid(req.update("n", Value::Bytes(vec![1]))));
    assert_eq!(snapshot(&req), before);

    assert!(invalid("crc64".parse::<ChecksumAlgorithm>()));
    assert!(invalid("=~".parse::<fuzzblocks::Compare>()));
    assert!(invalid(Dependency::new("n", 1u8).compare("<>")));
    assert!(invalid("ebcdic".parse::<Encoding>()));
    assert!(invalid("xdr".parse::<Lego>()));
}

#[test]
fn test_unknown_field_lookups() {
    let mut req = base();
    assert_eq!(req.update("ghost", Value::UInt(1)), Err(SpecError::NotFound("ghost".into())));
    assert_eq!(req.value("ghost"), Err(SpecError::NotFound("ghost".into())));
    assert!(req.get("ghost").is_none());
    assert_eq!(req.value("n"), Ok(Value::UInt(1)));
}

#[test]
fn test_legacy_operations_are_unsupported() {
    let mut req = base();
    let before = snapshot(&req);
    match req.declare_legacy(LegacyOp::BlockSize("binary_block_size_intel_halfword".into())) {
        Err(SpecError::Unsupported { operation, hint }) => {
            assert_eq!(operation, "binary_block_size_intel_halfword");
            assert!(hint.contains("Size"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        req.declare_legacy(LegacyOp::StringVariant("string_repeat".into())),
        Err(SpecError::Unsupported { .. })
    ));
    assert!(matches!(
        req.declare_legacy(LegacyOp::XdrString),
        Err(SpecError::Unsupported { .. })
    ));
    assert_eq!(snapshot(&req), before);
}

#[test]
fn test_failed_lego_rolls_back() {
    let mut req = base();
    // generated names follow the name-table size: this one will be LEGO_00000003
    req.push_static(b"".to_vec(), Some("LEGO_00000003.header0")).expect("static");
    let before = snapshot(&req);
    assert_eq!(
        req.push_lego(&Lego::Dnp3(Default::default()), b"payload"),
        Err(SpecError::DuplicateName("LEGO_00000003.header0".into()))
    );
    assert_eq!(snapshot(&req), before);
    assert!(req.get("LEGO_00000003").is_none());

    let mut req = base();
    req.push_static(b"".to_vec(), Some("LEGO_00000003")).expect("static");
    assert_eq!(
        req.push_lego(&Lego::Dnp3(Default::default()), b"payload"),
        Err(SpecError::DuplicateName("LEGO_00000003".into()))
    );
}

#[test]
fn test_error_messages() {
    assert_eq!(SpecError::EmptyStack.to_string(), "no open block to close");
    assert_eq!(
        SpecError::DanglingReference("b".into()).to_string(),
        "dangling reference: block 'b' is still open"
    );
}
