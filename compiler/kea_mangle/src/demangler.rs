//! Decoder for the stable mangling scheme.
//!
//! The grammar is postfix: operands appear before the operators that
//! consume them, so decoding is one forward pass over the payload
//! driving a node stack. Each operator pops the operands it needs,
//! builds nodes in the arena and pushes one result. After the last byte
//! the stack holds the symbol's parts, which [`demangle_global`]
//! assembles under a `Global` root:
//!
//! ```text
//! $s 4main 3foo yy F
//!    |     |    || `- Function: pops type parts, name, context
//!    |     |    |`-- empty argument list
//!    |     |    `--- empty return type
//!    |     `-------- Identifier "foo"
//!    `-------------- Identifier "main" (becomes the module context)
//! ```
//!
//! Untrusted input is the normal case, so three budgets bound the work:
//! total nodes (scaled by input length), the depth of any built tree,
//! and back-reference repeat counts. Every failure is a typed
//! [`DemangleError`]; malformed bytes never panic.

use std::ops::Range;

use smallvec::SmallVec;

use crate::error::{Budget, DemangleError};
use crate::flavor::{recognized_prefix, Dialect, ManglingFlavor};
use crate::kind::{func_spec, Kind, VALUE_WITNESSES};
use crate::legacy;
use crate::node::{NodeArena, NodeId};
use crate::punycode;
use crate::substitution::{self, MAX_REPEAT_COUNT};
use crate::text;

/// Upper bound on the depth of any tree the decoder builds. The printer
/// and the remangler recurse over decoded trees, so this also caps
/// their stack use.
pub(crate) const MAX_DEPTH: usize = 1024;

/// Node budget floor; short inputs still get this many nodes.
const MIN_NODE_BUDGET: usize = 4096;

/// Budgeted nodes per payload byte.
const NODES_PER_BYTE: usize = 32;

/// Largest bit width accepted for sized builtin types. The remangler
/// enforces the same bound when encoding.
pub(crate) const MAX_BUILTIN_WIDTH: u64 = 4096;

/// Decodes a symbol payload (prefix already stripped) and assembles the
/// parts under a `Global` root.
pub(crate) fn demangle_global(
    arena: &mut NodeArena,
    payload: &str,
) -> Result<NodeId, DemangleError> {
    let mut demangler = Demangler::new(arena, payload);
    demangler.parse_all()?;
    demangler.assemble_global()
}

/// Decodes a bare type mangling: no prefix, no `Global` wrapper. The
/// topmost node parsed is the result.
pub(crate) fn demangle_type(arena: &mut NodeArena, payload: &str) -> Result<NodeId, DemangleError> {
    let mut demangler = Demangler::new(arena, payload);
    demangler.parse_all()?;
    demangler
        .pop()
        .ok_or(DemangleError::GrammarViolation {
            offset: 0,
            expected: "a type mangling",
        })
}

// -- Entry points --

/// A demangled symbol: the arena holding the tree, its root, and the
/// flavor the prefix selected.
#[derive(Debug)]
pub struct Demangled {
    /// Arena owning every node of the tree.
    pub arena: NodeArena,
    /// The `Global` root, or the type root for bare type manglings.
    pub root: NodeId,
    /// Flavor recognized from the prefix. Historical stable prefixes
    /// and the legacy runtime form decode as the default flavor.
    pub flavor: ManglingFlavor,
}

/// Demangles one full symbol, prefix included.
///
/// # Errors
///
/// [`DemangleError::NotMangled`] without a recognized prefix,
/// [`DemangleError::UnsupportedDialect`] for the legacy general
/// grammar, and the decoder's own errors for a malformed payload.
pub fn demangle_symbol_as_node(symbol: &str) -> Result<Demangled, DemangleError> {
    let mut arena = NodeArena::new();
    let (root, flavor) = demangle_symbol_into(&mut arena, symbol)?;
    Ok(Demangled {
        arena,
        root,
        flavor,
    })
}

/// Demangles a bare type mangling (no prefix) into an owned tree.
///
/// # Errors
///
/// The decoder's errors for a malformed payload.
pub fn demangle_type_as_node(mangled: &str) -> Result<Demangled, DemangleError> {
    let mut arena = NodeArena::new();
    let root = demangle_type(&mut arena, mangled)?;
    Ok(Demangled {
        arena,
        root,
        flavor: ManglingFlavor::default(),
    })
}

fn demangle_symbol_into(
    arena: &mut NodeArena,
    symbol: &str,
) -> Result<(NodeId, ManglingFlavor), DemangleError> {
    let prefix = recognized_prefix(symbol).ok_or(DemangleError::NotMangled)?;
    let payload = &symbol[prefix.len..];
    match prefix.dialect {
        Dialect::Stable(flavor) => Ok((demangle_global(arena, payload)?, flavor)),
        Dialect::StableHistoric => Ok((
            demangle_global(arena, payload)?,
            ManglingFlavor::default(),
        )),
        Dialect::LegacyNominal => Ok((
            legacy::demangle_runtime_name(arena, payload)?,
            ManglingFlavor::default(),
        )),
        Dialect::Legacy => Err(DemangleError::UnsupportedDialect { prefix: "_T" }),
    }
}

/// Reusable decoding state for callers demangling in bulk: one arena
/// serves every call, keeping its allocations. Node ids from earlier
/// calls are invalidated by the next one.
#[derive(Debug, Default)]
pub struct Context {
    arena: NodeArena,
}

impl Context {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `symbol` (prefix included) into this context's arena.
    ///
    /// # Errors
    ///
    /// Same as [`demangle_symbol_as_node`].
    pub fn demangle_symbol(&mut self, symbol: &str) -> Result<NodeId, DemangleError> {
        self.arena.reset();
        demangle_symbol_into(&mut self.arena, symbol).map(|(root, _)| root)
    }

    /// Decodes a bare type mangling into this context's arena.
    ///
    /// # Errors
    ///
    /// Same as [`demangle_type_as_node`].
    pub fn demangle_type(&mut self, mangled: &str) -> Result<NodeId, DemangleError> {
        self.arena.reset();
        demangle_type(&mut self.arena, mangled)
    }

    /// The arena holding the most recently decoded tree.
    #[must_use]
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }
}

struct Demangler<'a, 'b> {
    input: &'a [u8],
    pos: usize,
    arena: &'b mut NodeArena,
    stack: Vec<NodeId>,
    substitutions: Vec<NodeId>,
    words: SmallVec<[Range<usize>; 8]>,
    /// Depth of each node created by this run, indexed from `first_node`.
    depths: Vec<u16>,
    first_node: usize,
    node_budget: usize,
    nodes_created: usize,
}

impl<'a, 'b> Demangler<'a, 'b> {
    fn new(arena: &'b mut NodeArena, payload: &'a str) -> Self {
        let node_budget = MIN_NODE_BUDGET.max(payload.len().saturating_mul(NODES_PER_BYTE));
        let first_node = arena.len();
        Demangler {
            input: payload.as_bytes(),
            pos: 0,
            arena,
            stack: Vec::new(),
            substitutions: Vec::new(),
            words: SmallVec::new(),
            depths: Vec::new(),
            first_node,
            node_budget,
            nodes_created: 0,
        }
    }

    // -- Cursor --

    fn peek(&self) -> u8 {
        self.input.get(self.pos).copied().unwrap_or(0)
    }

    /// Consumes and returns the next byte, or 0 at (or on an embedded)
    /// NUL, without advancing past it.
    fn next_byte(&mut self) -> u8 {
        let byte = self.peek();
        if byte != 0 {
            self.pos += 1;
        }
        byte
    }

    fn next_if(&mut self, byte: u8) -> bool {
        if self.peek() == byte {
            self.pos += 1;
            return true;
        }
        false
    }

    /// Rewinds one byte. Only valid directly after a successful
    /// `next_byte`.
    fn push_back(&mut self) {
        debug_assert!(self.pos > 0);
        self.pos = self.pos.saturating_sub(1);
    }

    fn violation(&self, expected: &'static str) -> DemangleError {
        DemangleError::GrammarViolation {
            offset: self.pos,
            expected,
        }
    }

    // -- Numbers --

    /// Parses a decimal run if one starts here. `None` means the next
    /// byte is not a digit; an error means the number overflows.
    fn try_natural(&mut self) -> Result<Option<u64>, DemangleError> {
        if !self.peek().is_ascii_digit() {
            return Ok(None);
        }
        let mut value: u64 = 0;
        while self.peek().is_ascii_digit() {
            let digit = u64::from(self.next_byte() - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| self.violation("a representable number"))?;
        }
        Ok(Some(value))
    }

    fn natural(&mut self) -> Result<u64, DemangleError> {
        match self.try_natural()? {
            Some(value) => Ok(value),
            None => Err(self.violation("a number")),
        }
    }

    /// Parses the `INDEX` form: `_` is 0, `<n>_` is n + 1.
    fn index(&mut self) -> Result<u64, DemangleError> {
        if self.next_if(b'_') {
            return Ok(0);
        }
        let value = self.natural()?;
        if !self.next_if(b'_') {
            return Err(self.violation("an index terminator"));
        }
        value
            .checked_add(1)
            .ok_or_else(|| self.violation("a representable index"))
    }

    // -- Budgeted node creation --

    fn charge(&mut self) -> Result<(), DemangleError> {
        if self.nodes_created >= self.node_budget {
            return Err(DemangleError::BudgetExceeded {
                budget: Budget::Nodes,
                limit: self.node_budget,
            });
        }
        self.nodes_created += 1;
        Ok(())
    }

    fn depth_of(&self, id: NodeId) -> u16 {
        self.depths
            .get(id.index().wrapping_sub(self.first_node))
            .copied()
            .unwrap_or(1)
    }

    fn record(&mut self, id: NodeId, depth: u16) -> Result<NodeId, DemangleError> {
        if usize::from(depth) > MAX_DEPTH {
            return Err(DemangleError::BudgetExceeded {
                budget: Budget::Depth,
                limit: MAX_DEPTH,
            });
        }
        debug_assert_eq!(id.index() - self.first_node, self.depths.len());
        self.depths.push(depth);
        Ok(id)
    }

    fn set_depth(&mut self, id: NodeId, depth: u16) {
        let slot = id.index().wrapping_sub(self.first_node);
        if let Some(entry) = self.depths.get_mut(slot) {
            *entry = depth;
        }
    }

    fn create(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        self.charge()?;
        let id = self.arena.create(kind);
        self.record(id, 1)
    }

    fn create_index(&mut self, kind: Kind, index: u64) -> Result<NodeId, DemangleError> {
        self.charge()?;
        let id = self.arena.create_with_index(kind, index);
        self.record(id, 1)
    }

    fn create_text(
        &mut self,
        kind: Kind,
        text: impl Into<Box<str>>,
    ) -> Result<NodeId, DemangleError> {
        self.charge()?;
        let id = self.arena.create_with_text(kind, text);
        self.record(id, 1)
    }

    fn create_with_child(&mut self, kind: Kind, child: NodeId) -> Result<NodeId, DemangleError> {
        self.charge()?;
        let depth = self.depth_of(child).saturating_add(1);
        let id = self.arena.create_with_child(kind, child);
        self.record(id, depth)
    }

    fn create_with_children(
        &mut self,
        kind: Kind,
        children: &[NodeId],
    ) -> Result<NodeId, DemangleError> {
        self.charge()?;
        let mut depth = 1u16;
        for &child in children {
            depth = depth.max(self.depth_of(child).saturating_add(1));
        }
        let id = self.arena.create_with_children(kind, children.iter().copied());
        self.record(id, depth)
    }

    fn create_index_with_child(
        &mut self,
        kind: Kind,
        index: u64,
        child: NodeId,
    ) -> Result<NodeId, DemangleError> {
        self.charge()?;
        let depth = self.depth_of(child).saturating_add(1);
        let id = self.arena.create_with_index(kind, index);
        self.arena.add_child(id, child);
        self.record(id, depth)
    }

    fn create_type(&mut self, child: NodeId) -> Result<NodeId, DemangleError> {
        self.create_with_child(Kind::Type, child)
    }

    /// Appends an already-built node to an already-built parent,
    /// keeping the depth table current.
    fn adopt(&mut self, parent: NodeId, child: NodeId) -> Result<(), DemangleError> {
        let depth = self
            .depth_of(parent)
            .max(self.depth_of(child).saturating_add(1));
        if usize::from(depth) > MAX_DEPTH {
            return Err(DemangleError::BudgetExceeded {
                budget: Budget::Depth,
                limit: MAX_DEPTH,
            });
        }
        self.arena.add_child(parent, child);
        self.set_depth(parent, depth);
        Ok(())
    }

    // -- Node stack --

    fn push(&mut self, node: NodeId) {
        self.stack.push(node);
    }

    fn pop(&mut self) -> Option<NodeId> {
        self.stack.pop()
    }

    fn pop_kind(&mut self, kind: Kind) -> Option<NodeId> {
        match self.stack.last() {
            Some(&top) if self.arena.kind(top) == kind => self.stack.pop(),
            _ => None,
        }
    }

    fn pop_if(&mut self, accepts: impl Fn(Kind) -> bool) -> Option<NodeId> {
        match self.stack.last() {
            Some(&top) if accepts(self.arena.kind(top)) => self.stack.pop(),
            _ => None,
        }
    }

    fn pop_type(&mut self) -> Result<NodeId, DemangleError> {
        self.pop_kind(Kind::Type)
            .ok_or_else(|| self.violation("a type"))
    }

    /// Pops a type and unwraps it to the node it carries.
    fn pop_type_and_child(&mut self) -> Result<NodeId, DemangleError> {
        let ty = self.pop_type()?;
        self.arena
            .first_child(ty)
            .ok_or_else(|| self.violation("a non-empty type"))
    }

    /// Pops a type whose carried node is a nominal or alias, and
    /// returns that node.
    fn pop_type_and_any_generic(&mut self) -> Result<NodeId, DemangleError> {
        let ty = self
            .pop_kind(Kind::Type)
            .ok_or_else(|| self.violation("a nominal type"))?;
        self.arena
            .first_child(ty)
            .filter(|&child| self.arena.kind(child).is_any_generic())
            .ok_or_else(|| self.violation("a nominal type"))
    }

    fn pop_decl_name(&mut self) -> Result<NodeId, DemangleError> {
        self.pop_if(Kind::is_decl_name)
            .ok_or_else(|| self.violation("a declaration name"))
    }

    fn pop_entity(&mut self) -> Result<NodeId, DemangleError> {
        self.pop_if(Kind::is_entity)
            .ok_or_else(|| self.violation("an entity"))
    }

    /// Pops a module, accepting a plain identifier in module position.
    fn pop_module(&mut self) -> Result<Option<NodeId>, DemangleError> {
        if let Some(ident) = self.pop_kind(Kind::Identifier) {
            self.charge()?;
            let module = self.arena.copy_with_kind(ident, Kind::Module);
            return self.record(module, 1).map(Some);
        }
        Ok(self.pop_kind(Kind::Module))
    }

    fn pop_context(&mut self) -> Result<NodeId, DemangleError> {
        if let Some(module) = self.pop_module()? {
            return Ok(module);
        }
        if let Some(ty) = self.pop_kind(Kind::Type) {
            return self
                .arena
                .first_child(ty)
                .filter(|&child| self.arena.kind(child).is_context())
                .ok_or_else(|| self.violation("a context type"));
        }
        self.pop_if(Kind::is_context)
            .ok_or_else(|| self.violation("a context"))
    }

    fn add_substitution(&mut self, node: NodeId) {
        self.substitutions.push(node);
    }

    // -- Top level --

    fn parse_all(&mut self) -> Result<(), DemangleError> {
        while self.pos < self.input.len() {
            let node = self.demangle_operator()?;
            self.push(node);
        }
        if self.stack.is_empty() {
            return Err(self.violation("a non-empty mangling"));
        }
        Ok(())
    }

    /// Builds the `Global` root from the finished stack. Suffix
    /// attributes lead; a partial-apply forwarder adopts everything
    /// mangled before it; bare `Type` wrappers are dropped.
    fn assemble_global(&mut self) -> Result<NodeId, DemangleError> {
        let mut attributes: SmallVec<[NodeId; 2]> = SmallVec::new();
        while let Some(attribute) = self.pop_if(Kind::is_function_attribute) {
            attributes.push(attribute);
        }
        let mut globals: SmallVec<[NodeId; 4]> = SmallVec::new();
        let mut adopter: Option<NodeId> = None;
        for attribute in attributes {
            match adopter {
                Some(parent) => self.adopt(parent, attribute)?,
                None => globals.push(attribute),
            }
            if matches!(
                self.arena.kind(attribute),
                Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder
            ) {
                adopter = Some(attribute);
            }
        }
        let members = std::mem::take(&mut self.stack);
        for member in members {
            let member = if self.arena.kind(member) == Kind::Type {
                self.arena.first_child(member).unwrap_or(member)
            } else {
                member
            };
            match adopter {
                Some(parent) => self.adopt(parent, member)?,
                None => globals.push(member),
            }
        }
        if globals.is_empty() {
            return Err(self.violation("a global symbol"));
        }
        self.create_with_children(Kind::Global, &globals)
    }

    // -- Operator dispatch --

    fn demangle_operator(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'A' => self.demangle_multi_substitutions(),
            b'B' => self.demangle_builtin_type(),
            b'C' => self.demangle_any_generic_type(Kind::Class),
            b'D' => {
                let ty = self.pop_type()?;
                self.create_with_child(Kind::TypeMangling, ty)
            }
            b'E' => self.demangle_extension(),
            b'F' => self.demangle_plain_function(),
            b'G' => self.demangle_bound_generic_type(),
            b'I' => self.demangle_impl_function_type(),
            b'K' => self.create(Kind::ThrowsAnnotation),
            b'L' => self.demangle_local_identifier(),
            b'M' => self.demangle_metadata(),
            b'N' => self.create_with_popped_type(Kind::TypeMetadata),
            b'O' => self.demangle_any_generic_type(Kind::Enum),
            b'P' => self.demangle_any_generic_type(Kind::Protocol),
            b'Q' => self.demangle_archetype(),
            b'R' => self.demangle_generic_requirement(),
            b'S' => self.demangle_standard_substitution(),
            b'T' => self.demangle_thunk_or_specialization(),
            b'V' => self.demangle_any_generic_type(Kind::Structure),
            b'W' => self.demangle_witness(),
            b'X' => self.demangle_special_type(),
            b'Y' => self.demangle_function_annotation(),
            b'Z' => {
                let entity = self.pop_entity()?;
                self.create_with_child(Kind::Static, entity)
            }
            b'a' => self.demangle_any_generic_type(Kind::TypeAlias),
            b'c' => self.pop_function_type(Kind::FunctionType),
            b'd' => self.create(Kind::VariadicMarker),
            b'f' => self.demangle_function_entity(),
            b'h' => self.demangle_type_attribute(Kind::Shared),
            b'i' => self.demangle_subscript(),
            b'l' => self.demangle_generic_signature(false),
            b'm' => {
                let ty = self.pop_type()?;
                let metatype = self.create_with_child(Kind::Metatype, ty)?;
                self.create_type(metatype)
            }
            b'n' => self.demangle_type_attribute(Kind::Owned),
            b'o' => self.demangle_operator_identifier(),
            b'p' => self.demangle_protocol_list_type(),
            b'q' => {
                let param = self.demangle_generic_param_index()?;
                self.create_type(param)
            }
            b'r' => self.demangle_generic_signature(true),
            b's' => self.create_text(Kind::Module, substitution::STDLIB_MODULE),
            b't' => self.pop_tuple_type(),
            b'u' => self.demangle_dependent_generic_type(),
            b'v' => self.demangle_variable(),
            b'w' => self.demangle_value_witness(),
            b'x' => {
                let param = self.dependent_generic_param(0, 0)?;
                self.create_type(param)
            }
            b'y' => self.create(Kind::EmptyList),
            b'z' => self.demangle_type_attribute(Kind::InOut),
            b'_' => self.create(Kind::FirstElementMarker),
            0 => Err(self.violation("an operator")),
            _ => {
                self.push_back();
                self.demangle_identifier()
            }
        }
    }

    // -- Identifiers and words --

    fn demangle_identifier(&mut self) -> Result<NodeId, DemangleError> {
        let mut has_word_substitutions = false;
        let mut is_punycoded = false;
        if !self.peek().is_ascii_digit() {
            return Err(self.violation("an identifier"));
        }
        if self.peek() == b'0' {
            self.next_byte();
            if self.peek() == b'0' {
                self.next_byte();
                is_punycoded = true;
            } else {
                has_word_substitutions = true;
            }
        }
        let mut identifier: Vec<u8> = Vec::new();
        loop {
            while has_word_substitutions && self.peek().is_ascii_alphabetic() {
                let byte = self.next_byte();
                let index = if byte.is_ascii_lowercase() {
                    usize::from(byte - b'a')
                } else {
                    // an uppercase reference is the last one in the run
                    has_word_substitutions = false;
                    usize::from(byte - b'A')
                };
                let Some(range) = self.words.get(index).cloned() else {
                    return Err(self.violation("a recorded word index"));
                };
                identifier.extend_from_slice(&self.input[range]);
            }
            if self.next_if(b'0') {
                break;
            }
            let run_length = match self.try_natural()? {
                Some(length) if length > 0 => length,
                _ => return Err(self.violation("a text-run length")),
            };
            if is_punycoded {
                self.next_if(b'_');
            }
            let run_length = usize::try_from(run_length).unwrap_or(usize::MAX);
            let end = match self.pos.checked_add(run_length) {
                Some(end) if end <= self.input.len() => end,
                _ => return Err(self.violation("identifier text within the input")),
            };
            if is_punycoded {
                let run = &self.input[self.pos..end];
                let decoded = std::str::from_utf8(run)
                    .ok()
                    .and_then(punycode::decode_utf8);
                let Some(decoded) = decoded else {
                    return Err(self.violation("valid punycode"));
                };
                identifier.extend_from_slice(decoded.as_bytes());
            } else {
                identifier.extend_from_slice(&self.input[self.pos..end]);
                self.record_words(self.pos, end);
            }
            self.pos = end;
            if !has_word_substitutions {
                break;
            }
        }
        if identifier.is_empty() {
            return Err(self.violation("a non-empty identifier"));
        }
        let text = String::from_utf8(identifier)
            .map_err(|_| self.violation("well-formed identifier text"))?;
        let text = self.restore_raw_spelling(text)?;
        let node = self.create_text(Kind::Identifier, text)?;
        self.add_substitution(node);
        Ok(node)
    }

    /// Records the word boundaries of a just-copied text run for later
    /// back-references, mirroring the encoder's scan.
    fn record_words(&mut self, start: usize, end: usize) {
        let mut word_start: Option<usize> = None;
        let mut pos = start;
        while pos <= end {
            let byte = if pos < end { self.input[pos] } else { 0 };
            if let Some(begin) = word_start {
                if pos == end || text::is_word_end(byte, self.input[pos - 1]) {
                    let length = pos - begin;
                    if length >= 2 && self.words.len() < text::MAX_WORDS {
                        self.words.push(begin..pos);
                    }
                    word_start = None;
                }
            }
            if word_start.is_none() && pos < end && text::is_word_start(byte) {
                word_start = Some(pos);
            }
            pos += 1;
        }
    }

    /// Strips the backtick wrapper of a raw identifier and restores its
    /// protected spaces.
    fn restore_raw_spelling(&self, text: String) -> Result<String, DemangleError> {
        if text.len() < 2 || !text.starts_with('`') || !text.ends_with('`') {
            return Ok(text);
        }
        let restored = text[1..text.len() - 1].replace('\u{00A0}', " ");
        if restored.is_empty() {
            return Err(self.violation("a non-empty raw identifier"));
        }
        Ok(restored)
    }

    fn demangle_operator_identifier(&mut self) -> Result<NodeId, DemangleError> {
        let ident = self
            .pop_kind(Kind::Identifier)
            .ok_or_else(|| self.violation("an operator identifier"))?;
        let text = self
            .arena
            .text(ident)
            .map(str::to_owned)
            .ok_or_else(|| self.violation("operator text"))?;
        let mut spelled = String::with_capacity(text.len());
        for c in text.chars() {
            if !c.is_ascii() {
                spelled.push(c);
                continue;
            }
            let Some(symbol) = text::mangled_to_operator_char(c) else {
                return Err(self.violation("an operator letter"));
            };
            spelled.push(symbol);
        }
        let kind = match self.next_byte() {
            b'i' => Kind::InfixOperator,
            b'p' => Kind::PrefixOperator,
            b'P' => Kind::PostfixOperator,
            _ => return Err(self.violation("an operator fixity")),
        };
        self.create_text(kind, spelled)
    }

    // -- Substitutions --

    fn demangle_multi_substitutions(&mut self) -> Result<NodeId, DemangleError> {
        let mut repeat: Option<u64> = None;
        loop {
            match self.next_byte() {
                byte @ b'a'..=b'z' => {
                    // lowercase: more references follow in this run
                    self.push_substitutions(usize::from(byte - b'a'), repeat.take().unwrap_or(1))?;
                }
                byte @ b'A'..=b'Z' => {
                    self.push_substitutions(usize::from(byte - b'A'), repeat.unwrap_or(1))?;
                    return self.pop().ok_or_else(|| self.violation("a substitution"));
                }
                b'_' => {
                    // the pending number is a large index, not a repeat
                    let index = match repeat {
                        Some(count) => count.saturating_add(27),
                        None => 26,
                    };
                    let index = usize::try_from(index).unwrap_or(usize::MAX);
                    self.push_substitutions(index, 1)?;
                    return self.pop().ok_or_else(|| self.violation("a substitution"));
                }
                b'0'..=b'9' => {
                    self.push_back();
                    let count = self.natural()?;
                    if count > MAX_REPEAT_COUNT {
                        return Err(DemangleError::BudgetExceeded {
                            budget: Budget::RepeatCount,
                            limit: usize::try_from(MAX_REPEAT_COUNT).unwrap_or(usize::MAX),
                        });
                    }
                    repeat = Some(count);
                }
                _ => return Err(self.violation("a substitution reference")),
            }
        }
    }

    fn push_substitutions(&mut self, index: usize, count: u64) -> Result<(), DemangleError> {
        let Some(&node) = self.substitutions.get(index) else {
            return Err(self.violation("a recorded substitution index"));
        };
        for _ in 0..count {
            self.stack.push(node);
        }
        Ok(())
    }

    fn demangle_standard_substitution(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'o' => self.create_text(Kind::Module, substitution::FOREIGN_MODULE),
            b'C' => self.create_text(Kind::Module, substitution::FOREIGN_SYNTHESIZED_MODULE),
            b'g' => self.demangle_sugared_optional(),
            0 => Err(self.violation("a standard substitution")),
            _ => {
                self.push_back();
                let mut repeat = 1u64;
                if self.peek().is_ascii_digit() {
                    repeat = self.natural()?;
                    if repeat > MAX_REPEAT_COUNT {
                        return Err(DemangleError::BudgetExceeded {
                            budget: Budget::RepeatCount,
                            limit: usize::try_from(MAX_REPEAT_COUNT).unwrap_or(usize::MAX),
                        });
                    }
                }
                let second_level = self.next_if(b'c');
                let code = self.next_byte();
                let node = self.create_standard_type(code, second_level)?;
                for _ in 1..repeat {
                    self.stack.push(node);
                }
                Ok(node)
            }
        }
    }

    fn create_standard_type(
        &mut self,
        code: u8,
        second_level: bool,
    ) -> Result<NodeId, DemangleError> {
        let Some((kind, name)) = substitution::standard_type(code, second_level) else {
            return Err(self.violation("a standard type code"));
        };
        let module = self.create_text(Kind::Module, substitution::standard_module(second_level))?;
        let name = self.create_text(Kind::Identifier, name)?;
        let nominal = self.create_with_children(kind, &[module, name])?;
        self.create_type(nominal)
    }

    /// `<T> Sg`: sugar for `Optional<T>`. Unlike the fixed standard
    /// substitutions this registers in the local table.
    fn demangle_sugared_optional(&mut self) -> Result<NodeId, DemangleError> {
        let wrapped = self.pop_type()?;
        let module = self.create_text(Kind::Module, substitution::STDLIB_MODULE)?;
        let name = self.create_text(Kind::Identifier, "Optional")?;
        let nominal = self.create_with_children(Kind::Enum, &[module, name])?;
        let nominal_ty = self.create_type(nominal)?;
        let arguments = self.create_with_child(Kind::TypeList, wrapped)?;
        let bound = self.create_with_children(Kind::BoundGenericEnum, &[nominal_ty, arguments])?;
        let ty = self.create_type(bound)?;
        self.add_substitution(ty);
        Ok(ty)
    }

    // -- Nominal types and contexts --

    fn demangle_any_generic_type(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let name = self.pop_decl_name()?;
        let context = self.pop_context()?;
        let nominal = self.create_with_children(kind, &[context, name])?;
        let ty = self.create_type(nominal)?;
        self.add_substitution(ty);
        Ok(ty)
    }

    fn demangle_extension(&mut self) -> Result<NodeId, DemangleError> {
        let signature = self.pop_kind(Kind::DependentGenericSignature);
        let module = self
            .pop_module()?
            .ok_or_else(|| self.violation("an extension module"))?;
        let extended = self.pop_type_and_any_generic()?;
        let mut children: SmallVec<[NodeId; 3]> = SmallVec::new();
        children.push(module);
        children.push(extended);
        children.extend(signature);
        self.create_with_children(Kind::Extension, &children)
    }

    fn demangle_bound_generic_type(&mut self) -> Result<NodeId, DemangleError> {
        let mut arguments: SmallVec<[NodeId; 4]> = SmallVec::new();
        while let Some(argument) = self.pop_kind(Kind::Type) {
            arguments.push(argument);
        }
        if self.pop_kind(Kind::EmptyList).is_none() {
            return Err(self.violation("a generic argument list"));
        }
        arguments.reverse();
        let nominal = self.pop_type_and_any_generic()?;
        let kind = match self.arena.kind(nominal) {
            Kind::Class => Kind::BoundGenericClass,
            Kind::Structure => Kind::BoundGenericStructure,
            Kind::Enum => Kind::BoundGenericEnum,
            Kind::Protocol => Kind::BoundGenericProtocol,
            Kind::TypeAlias => Kind::BoundGenericTypeAlias,
            _ => return Err(self.violation("a generic nominal type")),
        };
        let nominal_ty = self.create_type(nominal)?;
        let list = self.create_with_children(Kind::TypeList, &arguments)?;
        let bound = self.create_with_children(kind, &[nominal_ty, list])?;
        let ty = self.create_type(bound)?;
        self.add_substitution(ty);
        Ok(ty)
    }

    // -- Builtin and structural types --

    fn demangle_builtin_type(&mut self) -> Result<NodeId, DemangleError> {
        let name: String = match self.next_byte() {
            b'b' => "Builtin.BridgeObject".into(),
            b'B' => "Builtin.UnsafeValueBuffer".into(),
            b'c' => "Builtin.RawUnsafeContinuation".into(),
            b'D' => "Builtin.DefaultActorStorage".into(),
            b'e' => "Builtin.Executor".into(),
            b'j' => "Builtin.Job".into(),
            b'o' => "Builtin.NativeObject".into(),
            b'O' => "Builtin.UnknownObject".into(),
            b'p' => "Builtin.RawPointer".into(),
            b't' => "Builtin.SILToken".into(),
            b'w' => "Builtin.Word".into(),
            b'i' => {
                let width = self.builtin_width()?;
                format!("Builtin.Int{width}")
            }
            b'f' => {
                let width = self.builtin_width()?;
                format!("Builtin.FPIEEE{width}")
            }
            b'v' => {
                let count = self.builtin_width()?;
                let element = self.pop_type_and_child()?;
                let suffix = match self.arena.kind(element) {
                    Kind::BuiltinTypeName => self
                        .arena
                        .text(element)
                        .and_then(|text| text.strip_prefix("Builtin."))
                        .map(str::to_owned),
                    _ => None,
                };
                let Some(suffix) = suffix else {
                    return Err(self.violation("a builtin vector element"));
                };
                format!("Builtin.Vec{count}x{suffix}")
            }
            _ => return Err(self.violation("a builtin type code")),
        };
        let node = self.create_text(Kind::BuiltinTypeName, name)?;
        self.create_type(node)
    }

    fn builtin_width(&mut self) -> Result<u64, DemangleError> {
        self.index()?
            .checked_sub(1)
            .filter(|width| (1..=MAX_BUILTIN_WIDTH).contains(width))
            .ok_or_else(|| self.violation("a builtin bit width"))
    }

    fn demangle_type_attribute(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let child = self.pop_type_and_child()?;
        let node = self.create_with_child(kind, child)?;
        self.create_type(node)
    }

    fn demangle_special_type(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'w' => self.demangle_type_attribute(Kind::Weak),
            b'o' => self.demangle_type_attribute(Kind::Unowned),
            b'u' => self.demangle_type_attribute(Kind::Unmanaged),
            _ => Err(self.violation("a special type code")),
        }
    }

    fn demangle_function_annotation(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'a' => self.create(Kind::AsyncAnnotation),
            b'b' => self.create(Kind::ConcurrentFunctionType),
            _ => Err(self.violation("a function annotation")),
        }
    }

    fn pop_tuple_type(&mut self) -> Result<NodeId, DemangleError> {
        let mut elements: SmallVec<[NodeId; 4]> = SmallVec::new();
        if self.pop_kind(Kind::EmptyList).is_none() {
            loop {
                let first = self.pop_kind(Kind::FirstElementMarker).is_some();
                let variadic = self.pop_kind(Kind::VariadicMarker);
                let name = match self.pop_kind(Kind::Identifier) {
                    Some(ident) => {
                        self.charge()?;
                        let renamed = self.arena.copy_with_kind(ident, Kind::TupleElementName);
                        Some(self.record(renamed, 1)?)
                    }
                    None => None,
                };
                let ty = self.pop_type()?;
                let mut parts: SmallVec<[NodeId; 3]> = SmallVec::new();
                parts.extend(variadic);
                parts.extend(name);
                parts.push(ty);
                elements.push(self.create_with_children(Kind::TupleElement, &parts)?);
                if first {
                    break;
                }
            }
            elements.reverse();
        }
        let tuple = self.create_with_children(Kind::Tuple, &elements)?;
        self.create_type(tuple)
    }

    fn demangle_protocol_list_type(&mut self) -> Result<NodeId, DemangleError> {
        let mut protocols: SmallVec<[NodeId; 4]> = SmallVec::new();
        if self.pop_kind(Kind::EmptyList).is_none() {
            loop {
                let first = self.pop_kind(Kind::FirstElementMarker).is_some();
                protocols.push(self.pop_protocol()?);
                if first {
                    break;
                }
            }
            protocols.reverse();
        }
        let list = self.create_with_children(Kind::TypeList, &protocols)?;
        let protocol_list = self.create_with_child(Kind::ProtocolList, list)?;
        self.create_type(protocol_list)
    }

    fn pop_protocol(&mut self) -> Result<NodeId, DemangleError> {
        if let Some(ty) = self.pop_kind(Kind::Type) {
            let valid = self
                .arena
                .first_child(ty)
                .is_some_and(|child| self.arena.kind(child) == Kind::Protocol);
            if !valid {
                return Err(self.violation("a protocol type"));
            }
            return Ok(ty);
        }
        let name = self.pop_decl_name()?;
        let context = self.pop_context()?;
        let protocol = self.create_with_children(Kind::Protocol, &[context, name])?;
        self.create_type(protocol)
    }

    // -- Function types and entities --

    fn pop_function_type(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let throws = self.pop_kind(Kind::ThrowsAnnotation);
        let concurrent = self.pop_kind(Kind::ConcurrentFunctionType);
        let is_async = self.pop_kind(Kind::AsyncAnnotation);
        let arguments = self.pop_function_params(Kind::ArgumentTuple)?;
        let return_type = self.pop_function_params(Kind::ReturnType)?;
        let mut children: SmallVec<[NodeId; 5]> = SmallVec::new();
        children.extend(throws);
        children.extend(concurrent);
        children.extend(is_async);
        children.push(arguments);
        children.push(return_type);
        let function = self.create_with_children(kind, &children)?;
        self.create_type(function)
    }

    fn pop_function_params(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let params = if self.pop_kind(Kind::EmptyList).is_some() {
            let tuple = self.create(Kind::Tuple)?;
            self.create_type(tuple)?
        } else {
            self.pop_type()?
        };
        self.create_with_child(kind, params)
    }

    /// Pops the label list of a function whose type is already built.
    /// An empty list marker means "has parameters, all unlabeled"; a
    /// zero-parameter function carries no list at all.
    fn pop_function_param_labels(
        &mut self,
        ty: NodeId,
    ) -> Result<Option<NodeId>, DemangleError> {
        if self.pop_kind(Kind::EmptyList).is_some() {
            return Ok(Some(self.create(Kind::LabelList)?));
        }
        if self.arena.kind(ty) != Kind::Type {
            return Ok(None);
        }
        let Some(mut function) = self.arena.first_child(ty) else {
            return Ok(None);
        };
        if self.arena.kind(function) == Kind::DependentGenericType {
            let inner = self
                .arena
                .child(function, 1)
                .and_then(|t| self.arena.first_child(t));
            let Some(inner) = inner else {
                return Ok(None);
            };
            function = inner;
        }
        if self.arena.kind(function) != Kind::FunctionType {
            return Ok(None);
        }
        let mut slot = 0;
        while matches!(
            self.arena.child(function, slot).map(|c| self.arena.kind(c)),
            Some(Kind::ThrowsAnnotation | Kind::ConcurrentFunctionType | Kind::AsyncAnnotation)
        ) {
            slot += 1;
        }
        let params = self
            .arena
            .child(function, slot)
            .and_then(|arguments| self.arena.first_child(arguments))
            .and_then(|params_ty| self.arena.first_child(params_ty));
        let Some(params) = params else {
            return Ok(None);
        };
        let count = if self.arena.kind(params) == Kind::Tuple {
            self.arena.children(params).len()
        } else {
            1
        };
        if count == 0 {
            return Ok(None);
        }
        let mut labels: SmallVec<[NodeId; 4]> = SmallVec::new();
        for _ in 0..count {
            let label = self
                .pop_if(|kind| matches!(kind, Kind::Identifier | Kind::FirstElementMarker))
                .ok_or_else(|| self.violation("a parameter label"))?;
            labels.push(label);
        }
        labels.reverse();
        let list = self.create_with_children(Kind::LabelList, &labels)?;
        Ok(Some(list))
    }

    fn demangle_plain_function(&mut self) -> Result<NodeId, DemangleError> {
        let signature = self.pop_kind(Kind::DependentGenericSignature);
        let mut ty = self.pop_function_type(Kind::FunctionType)?;
        let labels = self.pop_function_param_labels(ty)?;
        if let Some(signature) = signature {
            let dependent =
                self.create_with_children(Kind::DependentGenericType, &[signature, ty])?;
            ty = self.create_type(dependent)?;
        }
        let name = self.pop_decl_name()?;
        let context = self.pop_context()?;
        let mut children: SmallVec<[NodeId; 4]> = SmallVec::new();
        children.push(context);
        children.push(name);
        children.extend(labels);
        children.push(ty);
        self.create_with_children(Kind::Function, &children)
    }

    fn demangle_variable(&mut self) -> Result<NodeId, DemangleError> {
        let ty = self.pop_type()?;
        let name = self.pop_decl_name()?;
        let context = self.pop_context()?;
        let variable = self.create_with_children(Kind::Variable, &[context, name, ty])?;
        self.demangle_accessor(variable)
    }

    fn demangle_subscript(&mut self) -> Result<NodeId, DemangleError> {
        let ty = self.pop_type()?;
        let labels = self.pop_function_param_labels(ty)?;
        let context = self.pop_context()?;
        let mut children: SmallVec<[NodeId; 3]> = SmallVec::new();
        children.push(context);
        children.extend(labels);
        children.push(ty);
        let subscript = self.create_with_children(Kind::Subscript, &children)?;
        self.demangle_accessor(subscript)
    }

    fn demangle_accessor(&mut self, entity: NodeId) -> Result<NodeId, DemangleError> {
        let kind = match self.next_byte() {
            b'p' => return Ok(entity),
            b'g' => Kind::Getter,
            b's' => Kind::Setter,
            b'r' => Kind::ReadAccessor,
            b'M' => Kind::ModifyAccessor,
            b'w' => Kind::WillSet,
            b'W' => Kind::DidSet,
            _ => return Err(self.violation("an accessor kind")),
        };
        self.create_with_child(kind, entity)
    }

    fn demangle_function_entity(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'C' => self.demangle_initializer_entity(Kind::Allocator),
            b'c' => self.demangle_initializer_entity(Kind::Constructor),
            b'd' => {
                let context = self.pop_context()?;
                self.create_with_child(Kind::Destructor, context)
            }
            b'D' => {
                let context = self.pop_context()?;
                self.create_with_child(Kind::Deallocator, context)
            }
            b'U' => self.demangle_closure_entity(Kind::ExplicitClosure),
            b'u' => self.demangle_closure_entity(Kind::ImplicitClosure),
            b'A' => {
                let position = self.index()?;
                let number = self.create_index(Kind::Number, position)?;
                let context = self.pop_context()?;
                self.create_with_children(Kind::DefaultArgumentInitializer, &[context, number])
            }
            _ => Err(self.violation("a function entity kind")),
        }
    }

    fn demangle_initializer_entity(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let private_name = self.pop_kind(Kind::PrivateDeclName);
        let ty = self.pop_type()?;
        let labels = self.pop_function_param_labels(ty)?;
        let context = self.pop_context()?;
        let mut children: SmallVec<[NodeId; 4]> = SmallVec::new();
        children.push(context);
        children.extend(labels);
        children.push(ty);
        children.extend(private_name);
        self.create_with_children(kind, &children)
    }

    fn demangle_closure_entity(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let position = self.index()?;
        let number = self.create_index(Kind::Number, position)?;
        let ty = self.pop_type()?;
        let context = self.pop_context()?;
        self.create_with_children(kind, &[context, number, ty])
    }

    fn demangle_local_identifier(&mut self) -> Result<NodeId, DemangleError> {
        if self.next_if(b'L') {
            let discriminator = self
                .pop_kind(Kind::Identifier)
                .ok_or_else(|| self.violation("a private discriminator"))?;
            let name = self.pop_decl_name()?;
            return self.create_with_children(Kind::PrivateDeclName, &[discriminator, name]);
        }
        if self.next_if(b'l') {
            let discriminator = self
                .pop_kind(Kind::Identifier)
                .ok_or_else(|| self.violation("a private discriminator"))?;
            return self.create_with_child(Kind::PrivateDeclName, discriminator);
        }
        let position = self.index()?;
        let number = self.create_index(Kind::Number, position)?;
        let name = self.pop_decl_name()?;
        self.create_with_children(Kind::LocalDeclName, &[number, name])
    }

    // -- Generics --

    fn demangle_dependent_generic_type(&mut self) -> Result<NodeId, DemangleError> {
        let signature = self
            .pop_kind(Kind::DependentGenericSignature)
            .ok_or_else(|| self.violation("a generic signature"))?;
        let ty = self.pop_type()?;
        let dependent = self.create_with_children(Kind::DependentGenericType, &[signature, ty])?;
        self.create_type(dependent)
    }

    fn demangle_generic_signature(
        &mut self,
        explicit_counts: bool,
    ) -> Result<NodeId, DemangleError> {
        let mut counts: SmallVec<[NodeId; 2]> = SmallVec::new();
        if explicit_counts {
            while !self.next_if(b'l') {
                let count = if self.next_if(b'z') {
                    0
                } else {
                    self.index()?
                        .checked_add(1)
                        .ok_or_else(|| self.violation("a representable parameter count"))?
                };
                counts.push(self.create_index(Kind::DependentGenericParamCount, count)?);
            }
            if counts.is_empty() {
                return Err(self.violation("a generic parameter count"));
            }
        } else {
            counts.push(self.create_index(Kind::DependentGenericParamCount, 1)?);
        }
        let mut requirements: SmallVec<[NodeId; 4]> = SmallVec::new();
        while let Some(requirement) = self.pop_if(Kind::is_requirement) {
            requirements.push(requirement);
        }
        requirements.reverse();
        let mut children = counts;
        children.extend(requirements);
        self.create_with_children(Kind::DependentGenericSignature, &children)
    }

    fn demangle_generic_param_index(&mut self) -> Result<NodeId, DemangleError> {
        if self.next_if(b'd') {
            let depth = self
                .index()?
                .checked_add(1)
                .ok_or_else(|| self.violation("a representable depth"))?;
            let index = self.index()?;
            return self.dependent_generic_param(depth, index);
        }
        if self.next_if(b'z') {
            return self.dependent_generic_param(0, 0);
        }
        let index = self
            .index()?
            .checked_add(1)
            .ok_or_else(|| self.violation("a representable parameter index"))?;
        self.dependent_generic_param(0, index)
    }

    fn dependent_generic_param(&mut self, depth: u64, index: u64) -> Result<NodeId, DemangleError> {
        let depth_node = self.create_index(Kind::Index, depth)?;
        let index_node = self.create_index(Kind::Index, index)?;
        self.create_with_children(Kind::DependentGenericParamType, &[depth_node, index_node])
    }

    fn demangle_generic_requirement(&mut self) -> Result<NodeId, DemangleError> {
        enum Constraint {
            Conformance,
            BaseClass,
            SameType,
            Layout,
        }
        enum Operand {
            Generic,
            Popped,
        }
        let (constraint, operand) = match self.next_byte() {
            b'p' => (Constraint::Conformance, Operand::Popped),
            b't' => (Constraint::SameType, Operand::Popped),
            b's' => (Constraint::SameType, Operand::Generic),
            b'b' => (Constraint::BaseClass, Operand::Generic),
            b'l' => (Constraint::Layout, Operand::Generic),
            0 => return Err(self.violation("a requirement")),
            _ => {
                self.push_back();
                (Constraint::Conformance, Operand::Generic)
            }
        };
        let constrained = match operand {
            Operand::Generic => {
                let param = self.demangle_generic_param_index()?;
                self.create_type(param)?
            }
            Operand::Popped => self.pop_type()?,
        };
        match constraint {
            Constraint::Conformance => {
                let protocol = self.pop_protocol()?;
                self.create_with_children(
                    Kind::DependentGenericConformanceRequirement,
                    &[constrained, protocol],
                )
            }
            Constraint::SameType => {
                let other = self.pop_type()?;
                self.create_with_children(
                    Kind::DependentGenericSameTypeRequirement,
                    &[constrained, other],
                )
            }
            Constraint::BaseClass => {
                let base = self.pop_type()?;
                self.create_with_children(
                    Kind::DependentGenericBaseClassRequirement,
                    &[constrained, base],
                )
            }
            Constraint::Layout => {
                let code = self.next_byte();
                if !matches!(code, b'C' | b'D' | b'T') {
                    return Err(self.violation("a layout constraint code"));
                }
                let name = self.create_text(Kind::Identifier, char::from(code).to_string())?;
                self.create_with_children(
                    Kind::DependentGenericLayoutRequirement,
                    &[constrained, name],
                )
            }
        }
    }

    fn demangle_archetype(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'y' => {
                let base = self.demangle_generic_param_index()?;
                self.dependent_member_simple(base)
            }
            b'z' => {
                let base = self.dependent_generic_param(0, 0)?;
                self.dependent_member_simple(base)
            }
            b'Y' => {
                let base = self.demangle_generic_param_index()?;
                self.dependent_member_compound(base)
            }
            b'Z' => {
                let base = self.dependent_generic_param(0, 0)?;
                self.dependent_member_compound(base)
            }
            _ => Err(self.violation("an archetype code")),
        }
    }

    fn dependent_member_simple(&mut self, base: NodeId) -> Result<NodeId, DemangleError> {
        let member = self.pop_assoc_type_name()?;
        let base_ty = self.create_type(base)?;
        let dependent = self.create_with_children(Kind::DependentMemberType, &[base_ty, member])?;
        let ty = self.create_type(dependent)?;
        self.add_substitution(ty);
        Ok(ty)
    }

    fn dependent_member_compound(&mut self, base: NodeId) -> Result<NodeId, DemangleError> {
        let mut members: SmallVec<[NodeId; 4]> = SmallVec::new();
        loop {
            let first = self.pop_kind(Kind::FirstElementMarker).is_some();
            members.push(self.pop_assoc_type_name()?);
            if first {
                break;
            }
        }
        let mut current = base;
        for member in members.iter().rev().copied() {
            let base_ty = self.create_type(current)?;
            current = self.create_with_children(Kind::DependentMemberType, &[base_ty, member])?;
        }
        let ty = self.create_type(current)?;
        self.add_substitution(ty);
        Ok(ty)
    }

    fn pop_assoc_type_name(&mut self) -> Result<NodeId, DemangleError> {
        let protocol = match self.pop_kind(Kind::Type) {
            Some(ty) => {
                let valid = self
                    .arena
                    .first_child(ty)
                    .is_some_and(|child| self.arena.kind(child) == Kind::Protocol);
                if !valid {
                    return Err(self.violation("a protocol qualifier"));
                }
                Some(ty)
            }
            None => None,
        };
        let name = self
            .pop_kind(Kind::Identifier)
            .ok_or_else(|| self.violation("an associated type name"))?;
        let mut parts: SmallVec<[NodeId; 2]> = SmallVec::new();
        parts.push(name);
        parts.extend(protocol);
        self.create_with_children(Kind::DependentAssociatedTypeRef, &parts)
    }

    // -- Lowered function types --

    fn demangle_impl_function_type(&mut self) -> Result<NodeId, DemangleError> {
        let escaping = if self.next_if(b'e') {
            Some(self.create(Kind::ImplEscaping)?)
        } else {
            None
        };
        let callee = match self.next_byte() {
            b'y' => "@callee_unowned",
            b'g' => "@callee_guaranteed",
            b'x' => "@callee_owned",
            b't' => "@convention(thin)",
            _ => return Err(self.violation("a callee convention")),
        };
        let callee = self.create_text(Kind::ImplConvention, callee)?;
        let mut slots: SmallVec<[(Kind, NodeId); 6]> = SmallVec::new();
        while let Some(convention) = self.impl_parameter_convention() {
            let node = self.create_text(Kind::ImplConvention, convention)?;
            slots.push((Kind::ImplParameter, node));
        }
        while let Some(convention) = self.impl_result_convention() {
            let node = self.create_text(Kind::ImplConvention, convention)?;
            slots.push((Kind::ImplResult, node));
        }
        if !self.next_if(b'_') {
            return Err(self.violation("an impl-function terminator"));
        }
        // types were mangled in signature order, so the topmost type on
        // the stack belongs to the last convention
        let mut types: SmallVec<[NodeId; 6]> = SmallVec::new();
        for _ in 0..slots.len() {
            types.push(self.pop_type()?);
        }
        types.reverse();
        let mut children: SmallVec<[NodeId; 8]> = SmallVec::new();
        children.extend(escaping);
        children.push(callee);
        for ((kind, convention), ty) in slots.into_iter().zip(types) {
            children.push(self.create_with_children(kind, &[convention, ty])?);
        }
        let function = self.create_with_children(Kind::ImplFunctionType, &children)?;
        self.create_type(function)
    }

    fn impl_parameter_convention(&mut self) -> Option<&'static str> {
        let convention = match self.peek() {
            b'i' => "@in",
            b'l' => "@inout",
            b'n' => "@in_guaranteed",
            b'x' => "@owned",
            b'g' => "@guaranteed",
            b'd' => "@unowned",
            _ => return None,
        };
        self.next_byte();
        Some(convention)
    }

    fn impl_result_convention(&mut self) -> Option<&'static str> {
        let convention = match self.peek() {
            b'r' => "@out",
            b'o' => "@owned",
            b'd' => "@unowned",
            b'a' => "@autoreleased",
            _ => return None,
        };
        self.next_byte();
        Some(convention)
    }

    // -- Metadata, witnesses, conformances --

    fn create_with_popped_type(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let ty = self.pop_type()?;
        self.create_with_child(kind, ty)
    }

    fn demangle_metadata(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'a' => self.create_with_popped_type(Kind::TypeMetadataAccessFunction),
            b'f' => self.create_with_popped_type(Kind::FullTypeMetadata),
            b'L' => self.create_with_popped_type(Kind::TypeMetadataLazyCache),
            b'm' => self.create_with_popped_type(Kind::Metaclass),
            b'n' => self.create_with_popped_type(Kind::NominalTypeDescriptor),
            b'o' => self.create_with_popped_type(Kind::ClassMetadataBaseOffset),
            b'c' => {
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_child(Kind::ProtocolConformanceDescriptor, conformance)
            }
            _ => Err(self.violation("a metadata kind")),
        }
    }

    fn pop_protocol_conformance(&mut self) -> Result<NodeId, DemangleError> {
        let module = self
            .pop_module()?
            .ok_or_else(|| self.violation("a conformance module"))?;
        let protocol = self.pop_protocol()?;
        let ty = self.pop_type()?;
        self.create_with_children(Kind::ProtocolConformance, &[ty, protocol, module])
    }

    fn demangle_witness(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'C' => {
                let entity = self.pop_entity()?;
                self.create_with_child(Kind::EnumCase, entity)
            }
            b'V' => self.create_with_popped_type(Kind::ValueWitnessTable),
            b'v' => {
                let directness = match self.next_byte() {
                    b'd' => 0,
                    b'i' => 1,
                    _ => return Err(self.violation("a field-offset directness")),
                };
                let directness = self.create_index(Kind::Directness, directness)?;
                let entity = self.pop_entity()?;
                self.create_with_children(Kind::FieldOffset, &[directness, entity])
            }
            b'P' => {
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_child(Kind::ProtocolWitnessTable, conformance)
            }
            b'a' => {
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_child(Kind::ProtocolWitnessTableAccessor, conformance)
            }
            b'G' => {
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_child(Kind::GenericProtocolWitnessTable, conformance)
            }
            b'I' => {
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_child(
                    Kind::GenericProtocolWitnessTableInstantiationFunction,
                    conformance,
                )
            }
            b'l' => {
                let ty = self.pop_type()?;
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_children(
                    Kind::LazyProtocolWitnessTableAccessor,
                    &[ty, conformance],
                )
            }
            b'L' => {
                let ty = self.pop_type()?;
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_children(
                    Kind::LazyProtocolWitnessTableCacheVariable,
                    &[ty, conformance],
                )
            }
            b'b' => {
                let protocol_ty = self.pop_type()?;
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_children(
                    Kind::BaseWitnessTableAccessor,
                    &[conformance, protocol_ty],
                )
            }
            _ => Err(self.violation("a witness kind")),
        }
    }

    fn demangle_value_witness(&mut self) -> Result<NodeId, DemangleError> {
        let code = [self.next_byte(), self.next_byte()];
        let ordinal = VALUE_WITNESSES
            .iter()
            .position(|&(wire, _)| wire.as_bytes() == code);
        let Some(ordinal) = ordinal else {
            return Err(self.violation("a value witness code"));
        };
        let ty = self.pop_type()?;
        let ordinal = u64::try_from(ordinal).unwrap_or(u64::MAX);
        self.create_index_with_child(Kind::ValueWitness, ordinal, ty)
    }

    // -- Thunks and specializations --

    fn demangle_thunk_or_specialization(&mut self) -> Result<NodeId, DemangleError> {
        match self.next_byte() {
            b'A' => self.create(Kind::PartialApplyForwarder),
            b'a' => self.create(Kind::PartialApplyObjCForwarder),
            b'o' => self.create(Kind::ObjCAttribute),
            b'O' => self.create(Kind::NonObjCAttribute),
            b'D' => self.create(Kind::DynamicAttribute),
            b'd' => self.create(Kind::DirectMethodReferenceAttribute),
            b'm' => self.create(Kind::MergedFunction),
            b'j' => {
                let entity = self.pop_entity()?;
                self.create_with_child(Kind::DispatchThunk, entity)
            }
            b'q' => {
                let entity = self.pop_entity()?;
                self.create_with_child(Kind::MethodDescriptor, entity)
            }
            b'W' => {
                let entity = self.pop_entity()?;
                let conformance = self.pop_protocol_conformance()?;
                self.create_with_children(Kind::ProtocolWitness, &[conformance, entity])
            }
            b'R' => self.demangle_reabstraction(Kind::ReabstractionThunkHelper),
            b'r' => self.demangle_reabstraction(Kind::ReabstractionThunk),
            b'g' => self.demangle_generic_specialization(Kind::GenericSpecialization),
            b'G' => {
                self.demangle_generic_specialization(Kind::GenericSpecializationNotReAbstracted)
            }
            b's' => {
                self.demangle_generic_specialization(Kind::GenericSpecializationPrespecialized)
            }
            b'p' => self.demangle_generic_specialization(Kind::GenericPartialSpecialization),
            b'P' => self
                .demangle_generic_specialization(Kind::GenericPartialSpecializationNotReAbstracted),
            b'f' => self.demangle_function_specialization(),
            _ => Err(self.violation("a thunk or specialization kind")),
        }
    }

    fn demangle_reabstraction(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let signature = self.pop_kind(Kind::DependentGenericSignature);
        let to_type = self.pop_type()?;
        let from_type = self.pop_type()?;
        let mut children: SmallVec<[NodeId; 3]> = SmallVec::new();
        children.extend(signature);
        children.push(from_type);
        children.push(to_type);
        self.create_with_children(kind, &children)
    }

    fn demangle_spec_attributes(&mut self) -> Result<(bool, u64), DemangleError> {
        let serialized = self.next_if(b'q');
        let pass = self.next_byte();
        if !pass.is_ascii_digit() {
            return Err(self.violation("a specialization pass id"));
        }
        Ok((serialized, u64::from(pass - b'0')))
    }

    fn demangle_generic_specialization(&mut self, kind: Kind) -> Result<NodeId, DemangleError> {
        let (serialized, pass) = self.demangle_spec_attributes()?;
        let mut arguments: SmallVec<[NodeId; 4]> = SmallVec::new();
        if self.pop_kind(Kind::EmptyList).is_none() {
            loop {
                let first = self.pop_kind(Kind::FirstElementMarker).is_some();
                arguments.push(self.pop_type()?);
                if first {
                    break;
                }
            }
            arguments.reverse();
        }
        let mut children: SmallVec<[NodeId; 6]> = SmallVec::new();
        if serialized {
            children.push(self.create(Kind::IsSerialized)?);
        }
        children.push(self.create_index(Kind::SpecializationPassID, pass)?);
        for argument in arguments {
            children.push(self.create_with_child(Kind::GenericSpecializationParam, argument)?);
        }
        self.create_with_children(kind, &children)
    }

    fn demangle_function_specialization(&mut self) -> Result<NodeId, DemangleError> {
        let (serialized, pass) = self.demangle_spec_attributes()?;
        let mut children: SmallVec<[NodeId; 6]> = SmallVec::new();
        if serialized {
            children.push(self.create(Kind::IsSerialized)?);
        }
        children.push(self.create_index(Kind::SpecializationPassID, pass)?);
        let mut ordinal = 0u64;
        while !self.next_if(b'_') {
            if self.peek() == 0 {
                return Err(self.violation("a specialization parameter"));
            }
            children.push(
                self.demangle_func_spec_param(Kind::FunctionSignatureSpecializationParam, ordinal)?,
            );
            ordinal += 1;
        }
        if !self.next_if(b'n') {
            children.push(
                self.demangle_func_spec_param(Kind::FunctionSignatureSpecializationReturn, 0)?,
            );
        }
        self.create_with_children(Kind::FunctionSignatureSpecialization, &children)
    }

    fn demangle_func_spec_param(
        &mut self,
        kind: Kind,
        ordinal: u64,
    ) -> Result<NodeId, DemangleError> {
        let mut parts: SmallVec<[NodeId; 2]> = SmallVec::new();
        match self.next_byte() {
            b'n' => {}
            b'd' => {
                let mut value = func_spec::DEAD;
                if self.next_if(b'G') {
                    value |= func_spec::OWNED_TO_GUARANTEED;
                }
                if self.next_if(b'X') {
                    value |= func_spec::EXPLODED;
                }
                parts.push(
                    self.create_index(Kind::FunctionSignatureSpecializationParamKind, value)?,
                );
            }
            b'g' => {
                let mut value = func_spec::OWNED_TO_GUARANTEED;
                if self.next_if(b'X') {
                    value |= func_spec::EXPLODED;
                }
                parts.push(
                    self.create_index(Kind::FunctionSignatureSpecializationParamKind, value)?,
                );
            }
            b'x' => {
                parts.push(self.create_index(
                    Kind::FunctionSignatureSpecializationParamKind,
                    func_spec::EXPLODED,
                )?);
            }
            b'p' => {
                if !self.next_if(b'i') {
                    return Err(self.violation("a constant-propagation kind"));
                }
                parts.push(self.create_index(
                    Kind::FunctionSignatureSpecializationParamKind,
                    func_spec::CONSTANT_PROP_INTEGER,
                )?);
                let mut digits = String::new();
                while self.peek().is_ascii_digit() {
                    digits.push(char::from(self.next_byte()));
                }
                if digits.is_empty() {
                    return Err(self.violation("a propagated constant"));
                }
                parts.push(
                    self.create_text(Kind::FunctionSignatureSpecializationParamPayload, digits)?,
                );
            }
            _ => return Err(self.violation("a specialization parameter kind")),
        }
        if kind == Kind::FunctionSignatureSpecializationParam {
            self.charge()?;
            let mut depth = 1u16;
            for &part in &parts {
                depth = depth.max(self.depth_of(part).saturating_add(1));
            }
            let id = self.arena.create_with_index(kind, ordinal);
            for &part in &parts {
                self.arena.add_child(id, part);
            }
            self.record(id, depth)
        } else {
            self.create_with_children(kind, &parts)
        }
    }
}
