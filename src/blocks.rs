//! Blocks and modifier blocks (size, checksum, repeat).
//!
//! A request stores all of its nodes in one arena; blocks hold the ids of
//! their children and modifiers hold the id of the block they derive from.
//! Ids are resolved once, when the node is declared.

use crate::checksum::ChecksumAlgorithm;
use crate::codec::{ascii_digits, mask, u64_to_bytes, Endianness, Format};
use crate::error::SpecError;
use crate::mutation::Mutate;
use crate::primitives::{BitField, BitFieldOptions, Primitive};
use crate::value::Value;
use std::str::FromStr;

/// Post-render transform applied to a block's concatenated children.
pub type Encoder = fn(&[u8]) -> Vec<u8>;

/// Arithmetic applied to a computed size before it is serialised.
pub type SizeTransform = fn(i64) -> i64;

/// Index of a node in its request's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl FromStr for Compare {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Compare::Eq),
            "!=" => Ok(Compare::Ne),
            ">" => Ok(Compare::Gt),
            ">=" => Ok(Compare::Ge),
            "<" => Ok(Compare::Lt),
            "<=" => Ok(Compare::Le),
            other => Err(SpecError::invalid(format!(
                "unsupported comparison operator '{}'",
                other
            ))),
        }
    }
}

/// Render a block only while another field's current value satisfies a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub field: String,
    pub compare: Compare,
    pub values: Vec<Value>,
}

impl Dependency {
    /// `field == value`.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Dependency {
            field: field.into(),
            compare: Compare::Eq,
            values: vec![value.into()],
        }
    }

    /// `field` is one of `values` (or, with `!=`, none of them).
    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Dependency {
            field: field.into(),
            compare: Compare::Eq,
            values,
        }
    }

    /// Replace the operator, parsed from `==`, `!=`, `>`, `>=`, `<`, `<=`.
    pub fn compare(mut self, op: &str) -> Result<Self, SpecError> {
        self.compare = op.parse()?;
        Ok(self)
    }

    pub fn holds(&self, current: &Value) -> bool {
        use std::cmp::Ordering::*;
        match self.compare {
            Compare::Eq => self.values.iter().any(|v| current.matches(v)),
            Compare::Ne => !self.values.iter().any(|v| current.matches(v)),
            op => self.values.iter().all(|v| match (current.compare(v), op) {
                (Some(Greater), Compare::Gt) => true,
                (Some(Greater | Equal), Compare::Ge) => true,
                (Some(Less), Compare::Lt) => true,
                (Some(Less | Equal), Compare::Le) => true,
                _ => false,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockOptions {
    /// Name of a group primitive; the block's sweep repeats once per group value.
    pub group: Option<String>,
    pub encoder: Option<Encoder>,
    pub dep: Option<Dependency>,
}

#[derive(Debug, Clone)]
pub(crate) struct Gate {
    pub(crate) field: NodeId,
    pub(crate) dep: Dependency,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub(crate) children: Vec<NodeId>,
    pub(crate) group: Option<NodeId>,
    pub(crate) encoder: Option<Encoder>,
    pub(crate) gate: Option<Gate>,
}

impl Block {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone)]
pub struct SizeOptions {
    /// Added to the measured length.
    pub offset: i64,
    /// Output width in bytes (binary) or zero-pad width (ascii); 0 = automatic.
    pub length: usize,
    pub endian: Endianness,
    pub format: Format,
    /// Count the size field's own output.
    pub inclusive: bool,
    pub signed: bool,
    pub math: Option<SizeTransform>,
    /// Also sweep the emitted size through the integer corpus.
    pub fuzzable: bool,
}

impl Default for SizeOptions {
    fn default() -> Self {
        SizeOptions {
            offset: 0,
            length: 4,
            endian: Endianness::Little,
            format: Format::Binary,
            inclusive: false,
            signed: false,
            math: None,
            fuzzable: false,
        }
    }
}

/// Emits the rendered length of its target block.
#[derive(Debug, Clone)]
pub struct Size {
    pub(crate) target: NodeId,
    opts: SizeOptions,
    fuzz: Option<Primitive>,
    fuzzed: bool,
}

impl Size {
    pub(crate) fn new(target: NodeId, opts: SizeOptions) -> Result<Self, SpecError> {
        let fuzz = if opts.fuzzable {
            let width = match opts.length {
                0 => 32,
                n => (n * 8).min(64) as u32,
            };
            let field_opts = BitFieldOptions {
                endian: opts.endian,
                format: opts.format,
                signed: opts.signed,
                full_range: false,
                fuzzable: true,
            };
            Some(Primitive::BitField(BitField::new(0, width, &field_opts, 0)?))
        } else {
            None
        };
        Ok(Size {
            target,
            opts,
            fuzz,
            fuzzed: false,
        })
    }

    /// Serialise the size for a target that rendered to `target_len` bytes.
    pub fn render(&self, target_len: usize) -> Vec<u8> {
        if self.fuzzed {
            if let Some(f) = &self.fuzz {
                return f.render();
            }
        }
        let base = target_len as i64 + self.opts.offset;
        if !self.opts.inclusive {
            return self.encode(base);
        }
        // Own width can depend on the value (auto width, ascii): settle on a fixed point.
        let mut own = if self.opts.length > 0 && self.opts.format == Format::Binary {
            self.opts.length
        } else {
            0
        };
        for _ in 0..4 {
            let out = self.encode(base + own as i64);
            if out.len() == own {
                return out;
            }
            own = out.len();
        }
        self.encode(base + own as i64)
    }

    fn encode(&self, size: i64) -> Vec<u8> {
        let size = self.opts.math.map_or(size, |f| f(size));
        match self.opts.format {
            Format::Binary => {
                let len = match self.opts.length {
                    0 => auto_width(size),
                    n => n,
                };
                let bits = (len * 8).min(64) as u32;
                u64_to_bytes(size as u64 & mask(bits), len, self.opts.endian)
            }
            Format::Ascii => {
                let v = if self.opts.signed {
                    size as i128
                } else {
                    size as u64 as i128
                };
                ascii_digits(v, self.opts.length)
            }
        }
    }
}

/// Smallest of 1, 2, 4, 8 bytes holding `size` unsigned.
fn auto_width(size: i64) -> usize {
    if size < 0 {
        return 8;
    }
    match size as u64 {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFFFF_FFFF => 4,
        _ => 8,
    }
}

impl Mutate for Size {
    fn num_mutations(&self) -> u64 {
        self.fuzz.as_ref().map_or(0, |f| f.num_mutations())
    }

    fn mutant_index(&self) -> u64 {
        self.fuzz.as_ref().map_or(0, |f| f.mutant_index())
    }

    fn mutate(&mut self) -> bool {
        let advanced = match &mut self.fuzz {
            Some(f) => f.mutate(),
            None => false,
        };
        if advanced {
            self.fuzzed = true;
        }
        advanced
    }

    fn reset(&mut self) {
        if let Some(f) = &mut self.fuzz {
            f.reset();
        }
        self.fuzzed = false;
    }
}

#[derive(Debug, Clone)]
pub struct ChecksumOptions {
    pub algorithm: ChecksumAlgorithm,
    /// Output width in bytes; 0 = the algorithm's native width.
    pub length: usize,
    pub endian: Endianness,
}

impl Default for ChecksumOptions {
    fn default() -> Self {
        ChecksumOptions {
            algorithm: ChecksumAlgorithm::Crc32,
            length: 0,
            endian: Endianness::Little,
        }
    }
}

/// Digest of the target block, recomputed on every render and never fuzzed.
#[derive(Debug, Clone)]
pub struct Checksum {
    pub(crate) target: NodeId,
    opts: ChecksumOptions,
}

impl Checksum {
    pub(crate) fn new(target: NodeId, opts: ChecksumOptions) -> Self {
        Checksum { target, opts }
    }

    pub fn render(&self, data: &[u8]) -> Vec<u8> {
        self.opts
            .algorithm
            .digest(data, self.opts.length, self.opts.endian)
    }
}

#[derive(Debug, Clone)]
pub struct RepeatOptions {
    pub min_reps: usize,
    /// Upper bound of the sweep; with `variable`, a cap on the count
    /// (`None` = the engine's `max_repeat`).
    pub max_reps: Option<usize>,
    pub step: usize,
    /// Integer field whose current value is the repetition count.
    pub variable: Option<String>,
    pub fuzzable: bool,
}

impl RepeatOptions {
    /// Sweep the count over `min, min+step, ..., max`.
    pub fn range(min_reps: usize, max_reps: usize) -> Self {
        RepeatOptions {
            min_reps,
            max_reps: Some(max_reps),
            step: 1,
            variable: None,
            fuzzable: true,
        }
    }

    /// Take the count from an integer field.
    pub fn variable(field: impl Into<String>) -> Self {
        RepeatOptions {
            min_reps: 0,
            max_reps: None,
            step: 1,
            variable: Some(field.into()),
            fuzzable: false,
        }
    }
}

/// Emits its target's render `count` times.
#[derive(Debug, Clone)]
pub struct Repeat {
    pub(crate) target: NodeId,
    pub(crate) variable: Option<NodeId>,
    min_reps: usize,
    max_reps: Option<usize>,
    /// Ceiling for variable-driven counts.
    cap: usize,
    step: usize,
    fuzzable: bool,
    reps: usize,
    mutant_index: u64,
}

impl Repeat {
    pub(crate) fn new(
        target: NodeId,
        variable: Option<NodeId>,
        opts: &RepeatOptions,
        max_repeat: usize,
    ) -> Result<Self, SpecError> {
        if opts.step == 0 {
            return Err(SpecError::invalid("repeat step must be positive"));
        }
        if variable.is_some() && opts.fuzzable {
            return Err(SpecError::invalid(
                "repeat cannot be both variable-driven and fuzzable",
            ));
        }
        match opts.max_reps {
            None if variable.is_none() => {
                return Err(SpecError::invalid("repeat needs max_reps or a variable"))
            }
            Some(max) if max < opts.min_reps => {
                return Err(SpecError::invalid(format!(
                    "repeat max_reps {} is below min_reps {}",
                    max, opts.min_reps
                )))
            }
            _ => {}
        }
        Ok(Repeat {
            target,
            variable,
            min_reps: opts.min_reps,
            max_reps: opts.max_reps,
            cap: opts.max_reps.unwrap_or(max_repeat),
            step: opts.step,
            fuzzable: opts.fuzzable,
            reps: opts.min_reps,
            mutant_index: 0,
        })
    }

    /// Repetition count given the bound variable's current value (if any).
    pub fn count(&self, variable: Option<&Value>) -> usize {
        match variable {
            Some(v) => {
                let n = v.as_i128().unwrap_or(0).max(0);
                usize::try_from(n).unwrap_or(usize::MAX).min(self.cap)
            }
            None => self.reps,
        }
    }
}

impl Mutate for Repeat {
    fn num_mutations(&self) -> u64 {
        match (self.fuzzable, self.max_reps) {
            (true, Some(max)) => ((max - self.min_reps) / self.step + 1) as u64,
            _ => 0,
        }
    }

    fn mutant_index(&self) -> u64 {
        self.mutant_index
    }

    fn mutate(&mut self) -> bool {
        if self.mutant_index >= self.num_mutations() {
            return false;
        }
        self.reps = self.min_reps + self.mutant_index as usize * self.step;
        self.mutant_index += 1;
        true
    }

    fn reset(&mut self) {
        self.reps = self.min_reps;
        self.mutant_index = 0;
    }
}

/// Anything that can live in a request tree.
#[derive(Debug, Clone)]
pub enum Node {
    Block(Block),
    Primitive(Primitive),
    Size(Size),
    Checksum(Checksum),
    Repeat(Repeat),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Block(_) => "block",
            Node::Primitive(p) => p.kind(),
            Node::Size(_) => "size",
            Node::Checksum(_) => "checksum",
            Node::Repeat(_) => "repeat",
        }
    }

    pub(crate) fn as_mutate(&self) -> Option<&dyn Mutate> {
        match self {
            Node::Primitive(p) => Some(p),
            Node::Size(s) => Some(s),
            Node::Repeat(r) => Some(r),
            Node::Block(_) | Node::Checksum(_) => None,
        }
    }

    pub(crate) fn as_mutate_mut(&mut self) -> Option<&mut dyn Mutate> {
        match self {
            Node::Primitive(p) => Some(p),
            Node::Size(s) => Some(s),
            Node::Repeat(r) => Some(r),
            Node::Block(_) | Node::Checksum(_) => None,
        }
    }
}

/// Arena slot: a node plus its (optional) name.
#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) name: Option<String>,
    pub(crate) node: Node,
}

impl Item {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}
