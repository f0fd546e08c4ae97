//! Symbol classification: the questions a build pipeline asks about a
//! mangled name without wanting the whole tree back.
//!
//! Every function here takes the full symbol text, prefix included, and
//! answers `false`/`None` for anything that does not demangle. A suffix
//! match alone never decides thunk-hood; the tree does.

use crate::flavor::is_mangled_name;
use crate::kind::Kind;
use crate::node::{NodeArena, NodeId};
use crate::remangler::mangle_node;
use crate::Demangled;

/// Suffixes a thunk symbol can end with. A match is only a candidate;
/// confirmation is structural.
const THUNK_SUFFIXES: [&str; 8] = ["TA", "Ta", "To", "TO", "TR", "Tr", "TW", "fC"];

fn demangled(symbol: &str) -> Option<Demangled> {
    match crate::demangle_symbol_as_node(symbol) {
        Ok(tree) => Some(tree),
        Err(err) => {
            tracing::debug!(symbol, %err, "classification saw an undemanglable name");
            None
        }
    }
}

/// Whether `symbol` names a thunk: a partial-apply forwarder, an
/// ObjC/non-ObjC bridging entry, a reabstraction thunk, a protocol
/// witness, or an allocating constructor.
#[must_use]
pub fn is_thunk_symbol(symbol: &str) -> bool {
    if !is_mangled_name(symbol) {
        return false;
    }
    if !THUNK_SUFFIXES.iter().any(|suffix| symbol.ends_with(suffix)) {
        return false;
    }
    let Some(tree) = demangled(symbol) else {
        return false;
    };
    let Some(top) = tree.arena.first_child(tree.root) else {
        return false;
    };
    matches!(
        tree.arena.kind(top),
        Kind::PartialApplyForwarder
            | Kind::PartialApplyObjCForwarder
            | Kind::ObjCAttribute
            | Kind::NonObjCAttribute
            | Kind::ReabstractionThunk
            | Kind::ReabstractionThunkHelper
            | Kind::ProtocolWitness
            | Kind::Allocator
    )
}

/// The symbol a thunk forwards to, where it can be derived by text
/// alone: bridging thunks drop their suffix, allocating constructors
/// become the initializing constructor. Forwarders, witnesses and
/// reabstraction thunks have no derivable target.
#[must_use]
pub fn thunk_target(symbol: &str) -> Option<String> {
    if !is_thunk_symbol(symbol) {
        return None;
    }
    if let Some(base) = symbol
        .strip_suffix("To")
        .or_else(|| symbol.strip_suffix("TO"))
    {
        return Some(base.to_owned());
    }
    if let Some(base) = symbol.strip_suffix("fC") {
        return Some(format!("{base}fc"));
    }
    None
}

/// Whether the symbol's entry point uses the native calling convention.
///
/// Runtime-facing entries do not: metadata accessors, value witnesses,
/// witness-table accessors and instantiation functions, and ObjC
/// bridging entries. Anything that fails to demangle answers `false`.
#[must_use]
pub fn has_native_calling_convention(symbol: &str) -> bool {
    let Some(tree) = demangled(symbol) else {
        return false;
    };
    let Some(top) = tree.arena.first_child(tree.root) else {
        return false;
    };
    !matches!(
        tree.arena.kind(top),
        Kind::TypeMetadataAccessFunction
            | Kind::ValueWitness
            | Kind::ProtocolWitnessTableAccessor
            | Kind::LazyProtocolWitnessTableAccessor
            | Kind::GenericProtocolWitnessTableInstantiationFunction
            | Kind::BaseWitnessTableAccessor
            | Kind::ObjCAttribute
    )
}

/// The module that defines `symbol`, when one is named: the first
/// module reached from the symbol's entity, skipping attribute nodes
/// whose parameters could name other modules.
#[must_use]
pub fn symbol_module(symbol: &str) -> Option<String> {
    let tree = demangled(symbol)?;
    let arena = &tree.arena;
    let children = arena.children(tree.root);
    let start = children
        .iter()
        .copied()
        .find(|&child| !arena.kind(child).is_function_attribute())
        .or_else(|| {
            // A partial-apply forwarder adopts its target instead of
            // standing next to it.
            children.iter().copied().find(|&child| {
                matches!(
                    arena.kind(child),
                    Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder
                )
            })
        })?;
    let module = first_module(arena, start)?;
    arena.text(module).map(str::to_owned)
}

fn first_module(arena: &NodeArena, node: NodeId) -> Option<NodeId> {
    if arena.kind(node) == Kind::Module {
        return Some(node);
    }
    arena
        .children(node)
        .iter()
        .find_map(|&child| first_module(arena, child))
}

/// Drops the leading specialization mark from `symbol` and remangles
/// the unspecialized original. `None` when the symbol carries no
/// specialization or does not demangle.
#[must_use]
pub fn strip_specialization(symbol: &str) -> Option<String> {
    let Demangled {
        mut arena,
        root,
        flavor,
    } = demangled(symbol)?;
    let children = arena.children(root);
    let position = children
        .iter()
        .position(|&child| arena.kind(child).is_specialization())?;
    let mut rest = children.to_vec();
    rest.remove(position);
    let global = arena.create_with_children(Kind::Global, rest);
    match mangle_node(&arena, global, flavor) {
        Ok(stripped) => Some(stripped),
        Err(err) => {
            tracing::debug!(symbol, %err, "stripped symbol did not remangle");
            None
        }
    }
}
