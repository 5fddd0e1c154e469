//! Primitive fields: the leaves of a request tree.
//!
//! Every primitive has a default value, a current value and (when fuzzable)
//! a finite, deterministic list of mutation candidates walked by
//! [`Mutate::mutate`]. Exhausted primitives keep their last value until
//! [`Mutate::reset`] restores the default.

use crate::codec::{mask, sign_extend, Endianness, Format, IntLayout};
use crate::error::SpecError;
use crate::library::{delim_corpus, integer_boundaries, string_corpus, Candidate};
use crate::mutation::Mutate;
use crate::value::Value;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::str::FromStr;

/// Character encoding for string primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Ascii,
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl FromStr for Encoding {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "ascii" => Ok(Encoding::Ascii),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-16-le" | "utf-16le" => Ok(Encoding::Utf16Le),
            "utf-16-be" | "utf-16be" => Ok(Encoding::Utf16Be),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            _ => Err(SpecError::invalid(format!("unknown string encoding '{}'", s))),
        }
    }
}

impl Encoding {
    /// Encode text; characters outside the repertoire become `?`.
    pub fn encode(&self, s: &str) -> Vec<u8> {
        match self {
            Encoding::Ascii => s.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }).collect(),
            Encoding::Latin1 => s
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u32 as u8 } else { b'?' })
                .collect(),
            Encoding::Utf8 => s.as_bytes().to_vec(),
            Encoding::Utf16Le => s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
            Encoding::Utf16Be => s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
        }
    }
}

/// Fixed bytes, never mutated.
#[derive(Debug, Clone)]
pub struct Static {
    original: Vec<u8>,
    value: Vec<u8>,
}

impl Static {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        let value = value.into();
        Static {
            original: value.clone(),
            value,
        }
    }
}

/// Separator such as `" "`, `":"` or `"\r\n"`.
#[derive(Debug, Clone)]
pub struct Delim {
    original: Vec<u8>,
    value: Vec<u8>,
    library: Vec<Vec<u8>>,
    mutant_index: u64,
}

impl Delim {
    pub fn new(value: impl Into<Vec<u8>>, fuzzable: bool) -> Self {
        let value = value.into();
        let library = if fuzzable { delim_corpus(&value) } else { Vec::new() };
        Delim {
            original: value.clone(),
            value,
            library,
            mutant_index: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StringOptions {
    /// Fixed rendered size: shorter values are padded, longer ones truncated.
    pub size: Option<usize>,
    pub padding: u8,
    pub encoding: Encoding,
    pub fuzzable: bool,
    /// Truncate corpus entries to this many bytes (0 = unlimited).
    pub max_len: usize,
}

impl Default for StringOptions {
    fn default() -> Self {
        StringOptions {
            size: None,
            padding: 0,
            encoding: Encoding::Ascii,
            fuzzable: true,
            max_len: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StringPrimitive {
    original: Vec<u8>,
    value: Vec<u8>,
    opts: StringOptions,
    library: Vec<Candidate>,
    mutant_index: u64,
}

impl StringPrimitive {
    pub fn new(value: &str, opts: StringOptions, long_lengths: &[usize]) -> Self {
        let original = opts.encoding.encode(value);
        let library = if !opts.fuzzable {
            Vec::new()
        } else if opts.max_len > 0 {
            let mut seen = HashSet::new();
            string_corpus(value, long_lengths)
                .into_iter()
                .map(|c| {
                    let mut bytes = c.materialize(opts.encoding);
                    bytes.truncate(opts.max_len);
                    bytes
                })
                .filter(|b| seen.insert(b.clone()))
                .map(Candidate::Raw)
                .collect()
        } else {
            string_corpus(value, long_lengths)
        };
        StringPrimitive {
            value: original.clone(),
            original,
            opts,
            library,
            mutant_index: 0,
        }
    }

    fn render(&self) -> Vec<u8> {
        let mut out = self.value.clone();
        if let Some(size) = self.opts.size {
            out.resize(size, self.opts.padding);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct BitFieldOptions {
    pub endian: Endianness,
    pub format: Format,
    pub signed: bool,
    /// Enumerate every representable value (when the width allows it).
    pub full_range: bool,
    pub fuzzable: bool,
}

impl Default for BitFieldOptions {
    fn default() -> Self {
        BitFieldOptions {
            endian: Endianness::Little,
            format: Format::Binary,
            signed: false,
            full_range: false,
            fuzzable: true,
        }
    }
}

#[derive(Debug, Clone)]
enum IntLibrary {
    /// Every value `0..count`.
    Full(u64),
    Values(Vec<u64>),
}

impl IntLibrary {
    fn len(&self) -> u64 {
        match self {
            IntLibrary::Full(n) => *n,
            IntLibrary::Values(v) => v.len() as u64,
        }
    }

    fn get(&self, i: u64) -> u64 {
        match self {
            IntLibrary::Full(_) => i,
            IntLibrary::Values(v) => v[i as usize],
        }
    }
}

/// Integer field of 1..=64 bits.
#[derive(Debug, Clone)]
pub struct BitField {
    layout: IntLayout,
    original: u64,
    value: u64,
    library: IntLibrary,
    mutant_index: u64,
}

impl BitField {
    /// `value` is the raw two's-complement bit pattern; bits above `width` are dropped.
    pub fn new(
        value: u64,
        width: u32,
        opts: &BitFieldOptions,
        full_range_max_width: u32,
    ) -> Result<Self, SpecError> {
        if width == 0 || width > 64 {
            return Err(SpecError::invalid(format!(
                "bit field width must be 1..=64, got {}",
                width
            )));
        }
        let library = if !opts.fuzzable {
            IntLibrary::Values(Vec::new())
        } else if opts.full_range && width <= full_range_max_width.min(63) {
            IntLibrary::Full(1u64 << width)
        } else {
            IntLibrary::Values(integer_boundaries(width))
        };
        let value = value & mask(width);
        Ok(BitField {
            layout: IntLayout::new(width, opts.endian, opts.format, opts.signed),
            original: value,
            value,
            library,
            mutant_index: 0,
        })
    }

    pub fn layout(&self) -> &IntLayout {
        &self.layout
    }

    pub fn raw(&self) -> u64 {
        self.value
    }

    pub(crate) fn set_raw(&mut self, raw: u64) {
        self.value = raw & mask(self.layout.width);
    }

    fn current(&self) -> Value {
        if self.layout.signed {
            Value::Int(sign_extend(self.value, self.layout.width))
        } else {
            Value::UInt(self.value)
        }
    }
}

/// Ordered list of raw alternatives, e.g. valid opcodes.
#[derive(Debug, Clone)]
pub struct Group {
    values: Vec<Vec<u8>>,
    value: Vec<u8>,
    mutant_index: u64,
}

impl Group {
    pub fn new(values: Vec<Vec<u8>>) -> Result<Self, SpecError> {
        let value = values
            .first()
            .cloned()
            .ok_or_else(|| SpecError::invalid("group needs at least one value"))?;
        Ok(Group {
            values,
            value,
            mutant_index: 0,
        })
    }

    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }

    /// Make `values[index]` current (used by group-bound blocks).
    pub(crate) fn select(&mut self, index: usize) {
        if let Some(v) = self.values.get(index) {
            self.value = v.clone();
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomOptions {
    pub min_length: usize,
    pub max_length: usize,
    /// Number of random payloads before reverting (`None` = engine default).
    pub max_mutations: Option<u64>,
    pub fuzzable: bool,
    /// Walk lengths `min, min+step, ...` instead of drawing them.
    pub step: Option<usize>,
}

impl RandomOptions {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        RandomOptions {
            min_length,
            max_length,
            max_mutations: None,
            fuzzable: true,
            step: None,
        }
    }
}

/// Pseudo-random blob, deterministic per candidate index.
#[derive(Debug, Clone)]
pub struct RandomData {
    original: Vec<u8>,
    value: Vec<u8>,
    min_length: usize,
    max_length: usize,
    max_mutations: u64,
    fuzzable: bool,
    step: Option<usize>,
    seed: u64,
    mutant_index: u64,
}

impl RandomData {
    pub fn new(
        value: impl Into<Vec<u8>>,
        opts: &RandomOptions,
        default_mutations: u64,
        seed: u64,
    ) -> Result<Self, SpecError> {
        if opts.min_length > opts.max_length {
            return Err(SpecError::invalid(format!(
                "random min_length {} exceeds max_length {}",
                opts.min_length, opts.max_length
            )));
        }
        if opts.step == Some(0) {
            return Err(SpecError::invalid("random step must be positive"));
        }
        let max_mutations = match opts.step {
            Some(step) => ((opts.max_length - opts.min_length) / step + 1) as u64,
            None => opts.max_mutations.unwrap_or(default_mutations),
        };
        let value = value.into();
        Ok(RandomData {
            original: value.clone(),
            value,
            min_length: opts.min_length,
            max_length: opts.max_length,
            max_mutations,
            fuzzable: opts.fuzzable,
            step: opts.step,
            seed,
            mutant_index: 0,
        })
    }

    fn candidate(&self, index: u64) -> Vec<u8> {
        let mut rng =
            ChaCha8Rng::seed_from_u64(self.seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let len = match self.step {
            Some(step) => self.min_length + index as usize * step,
            None => rng.gen_range(self.min_length..=self.max_length),
        };
        let mut out = vec![0u8; len];
        rng.fill_bytes(&mut out);
        out
    }
}

/// Closed set of primitive kinds.
#[derive(Debug, Clone)]
pub enum Primitive {
    Static(Static),
    Delim(Delim),
    String(StringPrimitive),
    BitField(BitField),
    Group(Group),
    Random(RandomData),
}

impl Primitive {
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Static(_) => "static",
            Primitive::Delim(_) => "delim",
            Primitive::String(_) => "string",
            Primitive::BitField(_) => "bit_field",
            Primitive::Group(_) => "group",
            Primitive::Random(_) => "random",
        }
    }

    pub fn render(&self) -> Vec<u8> {
        match self {
            Primitive::Static(p) => p.value.clone(),
            Primitive::Delim(p) => p.value.clone(),
            Primitive::String(p) => p.render(),
            Primitive::BitField(p) => p.layout.encode(p.value),
            Primitive::Group(p) => p.value.clone(),
            Primitive::Random(p) => p.value.clone(),
        }
    }

    /// Current value, as seen by dependency gates and `Request::value`.
    pub fn value(&self) -> Value {
        match self {
            Primitive::Static(p) => Value::Bytes(p.value.clone()),
            Primitive::Delim(p) => Value::Bytes(p.value.clone()),
            Primitive::String(p) => Value::Bytes(p.value.clone()),
            Primitive::BitField(p) => p.current(),
            Primitive::Group(p) => Value::Bytes(p.value.clone()),
            Primitive::Random(p) => Value::Bytes(p.value.clone()),
        }
    }

    /// Overwrite the current value. Integers go to bit fields, bytes to everything else.
    pub fn set_value(&mut self, value: Value) -> Result<(), SpecError> {
        match (self, value) {
            (Primitive::BitField(p), v) => match v.as_i128() {
                Some(n) => {
                    p.set_raw(n as u64);
                    Ok(())
                }
                None => Err(SpecError::invalid("bit field expects an integer value")),
            },
            (Primitive::Static(p), Value::Bytes(b)) => {
                p.value = b;
                Ok(())
            }
            (Primitive::Delim(p), Value::Bytes(b)) => {
                p.value = b;
                Ok(())
            }
            (Primitive::String(p), Value::Bytes(b)) => {
                p.value = b;
                Ok(())
            }
            (Primitive::Group(p), Value::Bytes(b)) => {
                p.value = b;
                Ok(())
            }
            (Primitive::Random(p), Value::Bytes(b)) => {
                p.value = b;
                Ok(())
            }
            (p, v) => Err(SpecError::invalid(format!(
                "cannot assign {} to a {} primitive",
                v,
                p.kind()
            ))),
        }
    }

    pub fn as_bit_field(&self) -> Option<&BitField> {
        match self {
            Primitive::BitField(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Primitive::Group(g) => Some(g),
            _ => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Primitive::Group(g) => Some(g),
            _ => None,
        }
    }
}

impl Mutate for Primitive {
    fn num_mutations(&self) -> u64 {
        match self {
            Primitive::Static(_) => 0,
            Primitive::Delim(p) => p.library.len() as u64,
            Primitive::String(p) => p.library.len() as u64,
            Primitive::BitField(p) => p.library.len(),
            Primitive::Group(p) => p.values.len() as u64,
            Primitive::Random(p) if p.fuzzable => p.max_mutations,
            Primitive::Random(_) => 0,
        }
    }

    fn mutant_index(&self) -> u64 {
        match self {
            Primitive::Static(_) => 0,
            Primitive::Delim(p) => p.mutant_index,
            Primitive::String(p) => p.mutant_index,
            Primitive::BitField(p) => p.mutant_index,
            Primitive::Group(p) => p.mutant_index,
            Primitive::Random(p) => p.mutant_index,
        }
    }

    fn mutate(&mut self) -> bool {
        let index = self.mutant_index();
        if index >= self.num_mutations() {
            return false;
        }
        match self {
            Primitive::Static(_) => return false,
            Primitive::Delim(p) => {
                p.value = p.library[index as usize].clone();
                p.mutant_index += 1;
            }
            Primitive::String(p) => {
                p.value = p.library[index as usize].materialize(p.opts.encoding);
                p.mutant_index += 1;
            }
            Primitive::BitField(p) => {
                p.value = p.library.get(index);
                p.mutant_index += 1;
            }
            Primitive::Group(p) => {
                p.value = p.values[index as usize].clone();
                p.mutant_index += 1;
            }
            Primitive::Random(p) => {
                p.value = p.candidate(index);
                p.mutant_index += 1;
            }
        }
        true
    }

    fn reset(&mut self) {
        match self {
            Primitive::Static(p) => p.value = p.original.clone(),
            Primitive::Delim(p) => {
                p.value = p.original.clone();
                p.mutant_index = 0;
            }
            Primitive::String(p) => {
                p.value = p.original.clone();
                p.mutant_index = 0;
            }
            Primitive::BitField(p) => {
                p.value = p.original;
                p.mutant_index = 0;
            }
            Primitive::Group(p) => {
                p.value = p.values[0].clone();
                p.mutant_index = 0;
            }
            Primitive::Random(p) => {
                p.value = p.original.clone();
                p.mutant_index = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(p: &mut Primitive) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while p.mutate() {
            out.push(p.render());
        }
        out
    }

    #[test]
    fn static_never_mutates() {
        let mut p = Primitive::Static(Static::new(b"abc".to_vec()));
        assert_eq!(p.num_mutations(), 0);
        assert!(!p.mutate());
        assert_eq!(p.render(), b"abc".to_vec());
    }

    #[test]
    fn bit_field_full_range() {
        let opts = BitFieldOptions {
            full_range: true,
            ..Default::default()
        };
        let mut p = Primitive::BitField(BitField::new(7, 4, &opts, 16).unwrap());
        assert_eq!(p.num_mutations(), 16);
        let seen = sweep(&mut p);
        assert_eq!(seen.len(), 16);
        assert_eq!(seen[0], vec![0]);
        assert_eq!(seen[15], vec![15]);
        p.reset();
        assert_eq!(p.render(), vec![7]);
    }

    #[test]
    fn full_range_falls_back_when_too_wide() {
        let opts = BitFieldOptions {
            full_range: true,
            ..Default::default()
        };
        let p = Primitive::BitField(BitField::new(0, 32, &opts, 16).unwrap());
        assert_eq!(p.num_mutations(), integer_boundaries(32).len() as u64);
    }

    #[test]
    fn bit_field_width_rejected() {
        let opts = BitFieldOptions::default();
        assert!(BitField::new(0, 0, &opts, 16).is_err());
        assert!(BitField::new(0, 65, &opts, 16).is_err());
    }

    #[test]
    fn signed_ascii_value() {
        let opts = BitFieldOptions {
            signed: true,
            format: Format::Ascii,
            ..Default::default()
        };
        let p = Primitive::BitField(BitField::new((-3i64) as u64, 8, &opts, 16).unwrap());
        assert_eq!(p.value(), Value::Int(-3));
        assert_eq!(p.render(), b"-003".to_vec());
    }

    #[test]
    fn string_fixed_size_and_encoding() {
        let opts = StringOptions {
            size: Some(6),
            padding: b'.',
            encoding: Encoding::Utf16Le,
            ..Default::default()
        };
        let p = Primitive::String(StringPrimitive::new("ab", opts, &[8]));
        assert_eq!(p.render(), b"a\0b\0..".to_vec());
    }

    #[test]
    fn string_max_len_truncates_and_dedups() {
        let opts = StringOptions {
            max_len: 4,
            ..Default::default()
        };
        let mut p = Primitive::String(StringPrimitive::new("x", opts, &[128, 256]));
        let seen = sweep(&mut p);
        assert!(seen.iter().all(|s| s.len() <= 4));
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), seen.len());
    }

    #[test]
    fn group_cycles_in_order() {
        let mut p = Primitive::Group(Group::new(vec![b"GET".to_vec(), b"POST".to_vec()]).unwrap());
        assert_eq!(p.num_mutations(), 2);
        assert_eq!(sweep(&mut p), vec![b"GET".to_vec(), b"POST".to_vec()]);
        p.reset();
        assert_eq!(p.render(), b"GET".to_vec());
        assert!(Group::new(Vec::new()).is_err());
    }

    #[test]
    fn random_is_bounded_and_deterministic() {
        let opts = RandomOptions {
            max_mutations: Some(10),
            ..RandomOptions::new(2, 5)
        };
        let mut a = Primitive::Random(RandomData::new(b"orig".to_vec(), &opts, 25, 42).unwrap());
        let first = sweep(&mut a);
        assert_eq!(first.len(), 10);
        assert!(first.iter().all(|v| (2..=5).contains(&v.len())));
        a.reset();
        assert_eq!(a.render(), b"orig".to_vec());
        assert_eq!(sweep(&mut a), first);
    }

    #[test]
    fn random_step_walks_lengths() {
        let opts = RandomOptions {
            step: Some(2),
            ..RandomOptions::new(1, 6)
        };
        let mut p = Primitive::Random(RandomData::new(Vec::new(), &opts, 25, 0).unwrap());
        let lens: Vec<usize> = sweep(&mut p).iter().map(|v| v.len()).collect();
        assert_eq!(lens, vec![1, 3, 5]);
    }

    #[test]
    fn set_value_type_checks() {
        let mut p = Primitive::BitField(BitField::new(0, 8, &BitFieldOptions::default(), 16).unwrap());
        p.set_value(Value::UInt(0x1FF)).unwrap();
        assert_eq!(p.render(), vec![0xFF]);
        assert!(p.set_value(Value::Bytes(vec![1])).is_err());
        let mut s = Primitive::Static(Static::new(b"a".to_vec()));
        assert!(s.set_value(Value::UInt(1)).is_err());
    }
}
