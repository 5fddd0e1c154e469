//! # fuzzblocks: Block-Based Fuzzing Specifications
//!
//! Describe a protocol message as a tree of blocks and primitive fields,
//! then walk a deterministic sweep of malformed variants of it: every call to
//! [`Request::mutate`] moves exactly one field away from its default, and
//! [`Request::render`] serialises the current state.
//!
//! ## Building blocks
//!
//! - **Primitives**: `static`, `delim`, `string`, `bit_field` (with `byte`,
//!   `word`, `dword`, `qword` presets), `group`, `random`
//! - **Blocks**: named containers opened and closed like a stack, optionally
//!   bound to a group, gated on another field's value, or post-processed by
//!   an encoder
//! - **Modifiers**: `size`, `checksum` (crc16, crc32, adler32, md5, sha1) and
//!   `repeat`, each derived from an already closed block
//! - **Legos**: ready-made composite blocks, e.g. DNP3 link-layer framing
//!
//! ## Example
//!
//! ```
//! use fuzzblocks::{BitFieldOptions, BlockOptions, Context, SizeOptions, StringOptions};
//!
//! let mut ctx = Context::new();
//! let req = ctx.init("hello").unwrap();
//! req.open_block("body", BlockOptions::default()).unwrap();
//! req.push_string("HELO", StringOptions::default(), Some("verb")).unwrap();
//! req.push_delim(" ", true, None).unwrap();
//! req.push_byte(7, &BitFieldOptions::default(), Some("id")).unwrap();
//! req.close_block().unwrap();
//! req.push_size("body", SizeOptions { length: 2, ..Default::default() }, Some("len")).unwrap();
//!
//! assert_eq!(req.render(), b"HELO \x07\x06\x00".to_vec());
//! let cases = req.num_mutations();
//! let mut seen = 0;
//! while req.mutate() {
//!     let _case = req.render();
//!     seen += 1;
//! }
//! assert_eq!(seen, cases);
//! ```

pub mod blocks;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod context;
pub mod dump;
pub mod error;
pub mod legos;
pub mod library;
pub mod mutation;
pub mod parser;
pub mod primitives;
pub mod request;
pub mod value;

pub use blocks::{
    BlockOptions, ChecksumOptions, Compare, Dependency, Encoder, NodeId, RepeatOptions,
    SizeOptions, SizeTransform,
};
pub use checksum::{crc16, ChecksumAlgorithm};
pub use codec::{Endianness, Format};
pub use config::EngineConfig;
pub use context::Context;
pub use dump::hex_dump;
pub use error::SpecError;
pub use legos::{Dnp3Options, Lego};
pub use mutation::Mutate;
pub use parser::parse_binary;
pub use primitives::{
    BitFieldOptions, Encoding, Primitive, RandomOptions, StringOptions,
};
pub use request::{LegacyOp, Modifier, Request};
pub use value::Value;
