//! A single message specification: the node arena, the name table, the
//! open-block stack, and the runtime API (`mutate`, `render`, `update`).
//!
//! Construction follows a strict validate-then-attach order. Every
//! declaration resolves and checks all of its inputs first; only a fully
//! valid declaration touches the arena, so a failed call leaves the request
//! exactly as it was.

use crate::blocks::{
    Block, BlockOptions, Checksum, ChecksumOptions, Dependency, Gate, Item, Node, NodeId,
    Repeat, RepeatOptions, Size, SizeOptions,
};
use crate::codec::Endianness;
use crate::config::EngineConfig;
use crate::error::SpecError;
use crate::legos::Lego;
use crate::mutation::Sweep;
use crate::parser::parse_binary;
use crate::primitives::{
    BitField, BitFieldOptions, Delim, Encoding, Group, Primitive, RandomData, RandomOptions,
    Static, StringOptions, StringPrimitive,
};
use crate::value::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

/// The implicit root block of every request.
const ROOT: NodeId = NodeId(0);

/// A derived block declared against an already closed block.
#[derive(Debug, Clone)]
pub enum Modifier {
    Size { target: String, opts: SizeOptions },
    Checksum { target: String, opts: ChecksumOptions },
    Repeat { target: String, opts: RepeatOptions },
}

impl Modifier {
    fn target(&self) -> &str {
        match self {
            Modifier::Size { target, .. }
            | Modifier::Checksum { target, .. }
            | Modifier::Repeat { target, .. } => target,
        }
    }
}

/// Declarations kept for source compatibility with older specifications;
/// every one of them is refused with [`SpecError::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyOp {
    /// String variants such as `string_lf`, `string_repeat`, `string_variable`.
    StringVariant(String),
    /// XDR-encoded strings.
    XdrString,
    /// Fixed-layout block-size helpers such as `binary_block_size_intel_halfword`.
    BlockSize(String),
}

impl LegacyOp {
    fn describe(&self) -> (String, &'static str) {
        match self {
            LegacyOp::StringVariant(name) => (name.clone(), "not implemented"),
            LegacyOp::XdrString => ("xdr_string".to_string(), "use an XDR lego"),
            LegacyOp::BlockSize(name) => (name.clone(), "use a Size modifier"),
        }
    }
}

/// Arena marks restored when a composite declaration fails halfway.
struct Checkpoint {
    items: usize,
    stack: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Request {
    name: String,
    items: Vec<Item>,
    names: HashMap<String, NodeId>,
    stack: Vec<NodeId>,
    sweep: Option<Sweep>,
    mutant_index: u64,
    config: EngineConfig,
}

impl Request {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, EngineConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: EngineConfig) -> Self {
        let name = name.into();
        debug!(request = %name, "request created");
        Request {
            items: vec![Item {
                name: Some(name.clone()),
                node: Node::Block(Block::default()),
            }],
            name,
            names: HashMap::new(),
            stack: Vec::new(),
            sweep: None,
            mutant_index: 0,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Look up a named node.
    pub fn get(&self, name: &str) -> Option<&Item> {
        self.names.get(name).map(|id| &self.items[id.0])
    }

    /// All field names, in declaration order.
    pub fn names(&self) -> Vec<&str> {
        let mut named: Vec<(&NodeId, &String)> =
            self.names.iter().map(|(name, id)| (id, name)).collect();
        named.sort();
        named.into_iter().map(|(_, name)| name.as_str()).collect()
    }

    /// Number of blocks currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    // ---- construction --------------------------------------------------

    fn check_name(&self, name: Option<&str>) -> Result<(), SpecError> {
        match name {
            Some(n) if self.names.contains_key(n) => Err(SpecError::DuplicateName(n.to_string())),
            _ => Ok(()),
        }
    }

    fn lookup(&self, name: &str) -> Result<NodeId, SpecError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| SpecError::NotFound(name.to_string()))
    }

    /// Append a validated node under the innermost open block.
    fn attach(&mut self, name: Option<&str>, node: Node) -> NodeId {
        self.invalidate_sweep();
        let id = NodeId(self.items.len());
        let parent = self.stack.last().copied().unwrap_or(ROOT);
        self.items.push(Item {
            name: name.map(str::to_string),
            node,
        });
        if let Node::Block(b) = &mut self.items[parent.0].node {
            b.children.push(id);
        }
        if let Some(n) = name {
            self.names.insert(n.to_string(), id);
        }
        id
    }

    /// New nodes change the plan; restore defaults so the next sweep starts clean.
    fn invalidate_sweep(&mut self) {
        if let Some(mut sweep) = self.sweep.take() {
            sweep.reset(&mut self.items);
            self.mutant_index = 0;
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            items: self.items.len(),
            stack: self.stack.clone(),
        }
    }

    fn rollback(&mut self, cp: Checkpoint) {
        let mark = cp.items;
        self.items.truncate(mark);
        self.names.retain(|_, id| id.0 < mark);
        for item in &mut self.items {
            if let Node::Block(b) = &mut item.node {
                b.children.retain(|c| c.0 < mark);
            }
        }
        self.stack = cp.stack;
    }

    fn resolve_group(&self, name: &str) -> Result<NodeId, SpecError> {
        let id = self.lookup(name)?;
        match &self.items[id.0].node {
            Node::Primitive(Primitive::Group(_)) => Ok(id),
            other => Err(SpecError::invalid(format!(
                "block group '{}' is a {}, not a group",
                name,
                other.kind()
            ))),
        }
    }

    fn resolve_gate(&self, dep: Dependency) -> Result<Gate, SpecError> {
        let field = self.lookup(&dep.field)?;
        if !matches!(self.items[field.0].node, Node::Primitive(_)) {
            return Err(SpecError::invalid(format!(
                "dependency field '{}' is not a primitive",
                dep.field
            )));
        }
        if dep.values.is_empty() {
            return Err(SpecError::invalid(format!(
                "dependency on '{}' has no values",
                dep.field
            )));
        }
        Ok(Gate { field, dep })
    }

    /// A modifier target must be an existing, closed block.
    fn resolve_target(&self, name: &str) -> Result<NodeId, SpecError> {
        let id = self.lookup(name)?;
        if self.stack.contains(&id) {
            return Err(SpecError::DanglingReference(name.to_string()));
        }
        match &self.items[id.0].node {
            Node::Block(_) => Ok(id),
            other => Err(SpecError::invalid(format!(
                "modifier target '{}' is a {}, not a block",
                name,
                other.kind()
            ))),
        }
    }

    fn resolve_variable(&self, name: &str) -> Result<NodeId, SpecError> {
        let id = self.lookup(name)?;
        match &self.items[id.0].node {
            Node::Primitive(Primitive::BitField(_)) => Ok(id),
            other => Err(SpecError::invalid(format!(
                "repeat variable '{}' is a {}, not an integer field",
                name,
                other.kind()
            ))),
        }
    }

    /// Open a block as a child of the innermost open block (or the root).
    pub fn open_block(&mut self, name: &str, opts: BlockOptions) -> Result<NodeId, SpecError> {
        self.check_name(Some(name))?;
        let group = opts.group.as_deref().map(|g| self.resolve_group(g)).transpose()?;
        let gate = opts.dep.map(|d| self.resolve_gate(d)).transpose()?;
        let id = self.attach(
            Some(name),
            Node::Block(Block {
                children: Vec::new(),
                group,
                encoder: opts.encoder,
                gate,
            }),
        );
        self.stack.push(id);
        debug!(request = %self.name, block = name, depth = self.stack.len(), "block opened");
        Ok(id)
    }

    /// Close the most recently opened block.
    pub fn close_block(&mut self) -> Result<NodeId, SpecError> {
        let id = self.stack.pop().ok_or(SpecError::EmptyStack)?;
        debug!(request = %self.name, block = ?self.items[id.0].name, "block closed");
        Ok(id)
    }

    pub fn declare_primitive(
        &mut self,
        primitive: Primitive,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.check_name(name)?;
        Ok(self.attach(name, Node::Primitive(primitive)))
    }

    pub fn declare_modifier(
        &mut self,
        modifier: Modifier,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.check_name(name)?;
        let target = self.resolve_target(modifier.target())?;
        let node = match modifier {
            Modifier::Size { opts, .. } => Node::Size(Size::new(target, opts)?),
            Modifier::Checksum { opts, .. } => Node::Checksum(Checksum::new(target, opts)),
            Modifier::Repeat { opts, .. } => {
                let variable = opts
                    .variable
                    .as_deref()
                    .map(|v| self.resolve_variable(v))
                    .transpose()?;
                Node::Repeat(Repeat::new(target, variable, &opts, self.config.max_repeat)?)
            }
        };
        let kind = node.kind();
        let id = self.attach(name, node);
        debug!(
            request = %self.name,
            modifier = kind,
            target = ?self.items[target.0].name,
            "modifier declared"
        );
        Ok(id)
    }

    /// Legacy declarations are rejected up front rather than at render time.
    pub fn declare_legacy(&mut self, op: LegacyOp) -> Result<NodeId, SpecError> {
        let (operation, hint) = op.describe();
        Err(SpecError::Unsupported {
            operation,
            hint: hint.to_string(),
        })
    }

    pub fn push_static(
        &mut self,
        value: impl Into<Vec<u8>>,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.declare_primitive(Primitive::Static(Static::new(value)), name)
    }

    /// Static bytes written in loose hex notation (`"05 64"`, `"0x05,0x64"`, `"\x05\x64"`).
    pub fn push_binary(&mut self, hex: &str, name: Option<&str>) -> Result<NodeId, SpecError> {
        let bytes = parse_binary(hex)?;
        self.push_static(bytes, name)
    }

    pub fn push_delim(
        &mut self,
        value: impl Into<Vec<u8>>,
        fuzzable: bool,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.declare_primitive(Primitive::Delim(Delim::new(value, fuzzable)), name)
    }

    pub fn push_string(
        &mut self,
        value: &str,
        opts: StringOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let p = StringPrimitive::new(value, opts, &self.config.long_string_lengths);
        self.declare_primitive(Primitive::String(p), name)
    }

    /// A string followed by a static NUL terminator.
    pub fn push_cstring(&mut self, value: &str, name: Option<&str>) -> Result<NodeId, SpecError> {
        let id = self.push_string(value, StringOptions::default(), name)?;
        self.push_static(vec![0u8], None)?;
        Ok(id)
    }

    /// A UTF-16LE string.
    pub fn push_unistring(&mut self, value: &str, name: Option<&str>) -> Result<NodeId, SpecError> {
        let opts = StringOptions {
            encoding: Encoding::Utf16Le,
            ..Default::default()
        };
        self.push_string(value, opts, name)
    }

    pub fn push_bit_field(
        &mut self,
        value: u64,
        width: u32,
        opts: &BitFieldOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let p = BitField::new(value, width, opts, self.config.full_range_max_width)?;
        self.declare_primitive(Primitive::BitField(p), name)
    }

    pub fn push_byte(
        &mut self,
        value: u8,
        opts: &BitFieldOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.push_bit_field(value as u64, 8, opts, name)
    }

    pub fn push_word(
        &mut self,
        value: u16,
        opts: &BitFieldOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.push_bit_field(value as u64, 16, opts, name)
    }

    pub fn push_dword(
        &mut self,
        value: u32,
        opts: &BitFieldOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.push_bit_field(value as u64, 32, opts, name)
    }

    pub fn push_qword(
        &mut self,
        value: u64,
        opts: &BitFieldOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.push_bit_field(value, 64, opts, name)
    }

    /// Little-endian 32-bit field.
    pub fn push_intel_word(
        &mut self,
        value: u32,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let opts = BitFieldOptions {
            endian: Endianness::Little,
            ..Default::default()
        };
        self.push_dword(value, &opts, name)
    }

    /// Little-endian 16-bit field.
    pub fn push_intel_half_word(
        &mut self,
        value: u16,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let opts = BitFieldOptions {
            endian: Endianness::Little,
            ..Default::default()
        };
        self.push_word(value, &opts, name)
    }

    /// Big-endian 32-bit field.
    pub fn push_big_word(
        &mut self,
        value: u32,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let opts = BitFieldOptions {
            endian: Endianness::Big,
            ..Default::default()
        };
        self.push_dword(value, &opts, name)
    }

    pub fn push_group(
        &mut self,
        values: Vec<Vec<u8>>,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        self.declare_primitive(Primitive::Group(Group::new(values)?), name)
    }

    pub fn push_random(
        &mut self,
        value: impl Into<Vec<u8>>,
        opts: &RandomOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let seed = self.config.random_seed ^ (self.items.len() as u64).rotate_left(32);
        let p = RandomData::new(value, opts, self.config.random_mutations, seed)?;
        self.declare_primitive(Primitive::Random(p), name)
    }

    pub fn push_size(
        &mut self,
        target: &str,
        opts: SizeOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let target = target.to_string();
        self.declare_modifier(Modifier::Size { target, opts }, name)
    }

    pub fn push_checksum(
        &mut self,
        target: &str,
        opts: ChecksumOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let target = target.to_string();
        self.declare_modifier(Modifier::Checksum { target, opts }, name)
    }

    pub fn push_repeat(
        &mut self,
        target: &str,
        opts: RepeatOptions,
        name: Option<&str>,
    ) -> Result<NodeId, SpecError> {
        let target = target.to_string();
        self.declare_modifier(Modifier::Repeat { target, opts }, name)
    }

    /// Expand a lego into a new, already closed block and return its generated name.
    pub fn push_lego(&mut self, lego: &Lego, payload: &[u8]) -> Result<String, SpecError> {
        let name = format!("LEGO_{:08x}", self.names.len());
        self.check_name(Some(name.as_str()))?;
        let cp = self.checkpoint();
        let depth = self.stack.len();
        let built = lego.build(self, &name, payload).and_then(|()| {
            if self.stack.len() == depth {
                Ok(())
            } else {
                Err(SpecError::invalid(format!("lego '{}' left blocks open", name)))
            }
        });
        if let Err(e) = built {
            self.rollback(cp);
            return Err(e);
        }
        debug!(request = %self.name, lego = %name, kind = lego.kind(), "lego expanded");
        Ok(name)
    }

    // ---- runtime -------------------------------------------------------

    /// Advance the sweep by one test case.
    ///
    /// Returns `false` once every field is exhausted; all fields are then back
    /// at their defaults and the next call starts the identical sweep again.
    pub fn mutate(&mut self) -> bool {
        let mut sweep = self
            .sweep
            .take()
            .unwrap_or_else(|| Sweep::plan(&self.items, ROOT));
        let advanced = sweep.step(&mut self.items);
        if advanced {
            self.mutant_index += 1;
            if let Some(id) = sweep.current() {
                let item = &self.items[id.0];
                trace!(
                    request = %self.name,
                    case = self.mutant_index,
                    field = ?item.name,
                    sub_index = item.node.as_mutate().map_or(0, |m| m.mutant_index()),
                    "mutated"
                );
            }
        } else {
            sweep.reset(&mut self.items);
            debug!(request = %self.name, cases = self.mutant_index, "sweep exhausted");
            self.mutant_index = 0;
        }
        self.sweep = Some(sweep);
        advanced
    }

    /// Total number of test cases in one sweep.
    pub fn num_mutations(&self) -> u64 {
        match &self.sweep {
            Some(sweep) => sweep.num_mutations(&self.items),
            None => Sweep::plan(&self.items, ROOT).num_mutations(&self.items),
        }
    }

    /// Index of the current test case (0 before the first `mutate`).
    pub fn mutant_index(&self) -> u64 {
        self.mutant_index
    }

    /// Name of the field currently away from its default, if it has one.
    pub fn mutant(&self) -> Option<&str> {
        let id = self.sweep.as_ref()?.current()?;
        if self.mutant_index == 0 {
            return None;
        }
        self.items[id.0].name()
    }

    /// Restore every field to its default and rewind the sweep.
    pub fn reset(&mut self) {
        for item in &mut self.items {
            if let Some(m) = item.node.as_mutate_mut() {
                m.reset();
            }
        }
        self.sweep = None;
        self.mutant_index = 0;
    }

    /// Overwrite a primitive's current value until the next reset.
    pub fn update(&mut self, name: &str, value: Value) -> Result<(), SpecError> {
        let id = self.lookup(name)?;
        match &mut self.items[id.0].node {
            Node::Primitive(p) => p.set_value(value),
            other => Err(SpecError::invalid(format!(
                "'{}' is a {}, only primitives can be updated",
                name,
                other.kind()
            ))),
        }
    }

    /// Current value of a primitive.
    pub fn value(&self, name: &str) -> Result<Value, SpecError> {
        let id = self.lookup(name)?;
        match &self.items[id.0].node {
            Node::Primitive(p) => Ok(p.value()),
            other => Err(SpecError::invalid(format!(
                "'{}' is a {}, not a primitive",
                name,
                other.kind()
            ))),
        }
    }

    /// Render the whole request for the current mutation state.
    pub fn render(&self) -> Vec<u8> {
        RenderPass::new(&self.items).node(ROOT)
    }

    /// Render one named block (or field) as it would appear in the full render.
    pub fn render_node(&self, name: &str) -> Result<Vec<u8>, SpecError> {
        let id = self.lookup(name)?;
        let mut pass = RenderPass::new(&self.items);
        pass.node(ROOT);
        Ok(pass.target(id))
    }
}

/// One depth-first render. Block outputs are memoised so modifiers see
/// exactly what their target emitted earlier in the same pass.
struct RenderPass<'a> {
    items: &'a [Item],
    rendered: HashMap<NodeId, Vec<u8>>,
}

impl<'a> RenderPass<'a> {
    fn new(items: &'a [Item]) -> Self {
        RenderPass {
            items,
            rendered: HashMap::new(),
        }
    }

    fn node(&mut self, id: NodeId) -> Vec<u8> {
        let items = self.items;
        match &items[id.0].node {
            Node::Block(b) => {
                let out = self.block(b);
                self.rendered.insert(id, out.clone());
                out
            }
            Node::Primitive(p) => p.render(),
            Node::Size(s) => {
                let len = self.target(s.target).len();
                s.render(len)
            }
            Node::Checksum(c) => {
                let data = self.target(c.target);
                c.render(&data)
            }
            Node::Repeat(r) => {
                let current = r.variable.map(|v| self.value_of(v));
                let count = r.count(current.as_ref());
                let unit = self.target(r.target);
                let count = match unit.len().checked_mul(count) {
                    Some(_) => count,
                    None => usize::MAX / unit.len(),
                };
                unit.repeat(count)
            }
        }
    }

    fn block(&mut self, b: &Block) -> Vec<u8> {
        if let Some(gate) = &b.gate {
            if !gate.dep.holds(&self.value_of(gate.field)) {
                return Vec::new();
            }
        }
        let mut out = Vec::new();
        for &child in &b.children {
            out.extend(self.node(child));
        }
        match b.encoder {
            Some(encode) => encode(&out),
            None => out,
        }
    }

    fn target(&mut self, id: NodeId) -> Vec<u8> {
        match self.rendered.get(&id) {
            Some(bytes) => bytes.clone(),
            None => self.node(id),
        }
    }

    fn value_of(&self, id: NodeId) -> Value {
        match &self.items[id.0].node {
            Node::Primitive(p) => p.value(),
            _ => Value::Bytes(Vec::new()),
        }
    }
}
