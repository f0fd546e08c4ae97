//! The legacy `_Tt` runtime dialect: nominal type names only.
//!
//! The runtime spells a nominal type as `_Tt`, a run of nesting kinds
//! (`C` class, `V` struct, `O` enum), a length-prefixed module name and
//! one length-prefixed name per kind, outermost first:
//! `_TtCC5MyApp5Outer5Inner`. Decode and encode cover exactly this
//! subset; the general legacy grammar is recognized elsewhere and
//! reported as an unsupported dialect.

use smallvec::SmallVec;

use crate::demangler::MAX_DEPTH;
use crate::error::{Budget, DemangleError, MangleError};
use crate::kind::Kind;
use crate::node::{NodeArena, NodeId};
use crate::text;

fn violation(offset: usize, expected: &'static str) -> DemangleError {
    DemangleError::GrammarViolation { offset, expected }
}

fn not_expressible() -> MangleError {
    MangleError::UnsupportedDialect {
        dialect: "legacy nominal",
    }
}

/// Decodes the payload after a `_Tt` prefix into a `Global` over the
/// nominal type.
pub(crate) fn demangle_runtime_name(
    arena: &mut NodeArena,
    payload: &str,
) -> Result<NodeId, DemangleError> {
    let bytes = payload.as_bytes();
    let mut pos = 0;
    let mut kinds: SmallVec<[Kind; 4]> = SmallVec::new();
    while let Some(&byte) = bytes.get(pos) {
        let kind = match byte {
            b'C' => Kind::Class,
            b'V' => Kind::Structure,
            b'O' => Kind::Enum,
            _ => break,
        };
        kinds.push(kind);
        pos += 1;
    }
    if kinds.is_empty() {
        return Err(violation(pos, "a nominal kind (C, V or O)"));
    }
    if kinds.len() > MAX_DEPTH {
        return Err(DemangleError::BudgetExceeded {
            budget: Budget::Depth,
            limit: MAX_DEPTH,
        });
    }
    let module = read_name(payload, &mut pos)?;
    let mut node = arena.create_with_text(Kind::Module, module);
    for kind in kinds {
        let name = read_name(payload, &mut pos)?;
        let name = arena.create_with_text(Kind::Identifier, name);
        node = arena.create_with_children(kind, [node, name]);
    }
    if pos != payload.len() {
        return Err(violation(pos, "the end of the runtime name"));
    }
    Ok(arena.create_with_child(Kind::Global, node))
}

fn read_name<'a>(payload: &'a str, pos: &mut usize) -> Result<&'a str, DemangleError> {
    let bytes = payload.as_bytes();
    let start = *pos;
    let mut length = 0usize;
    while let Some(&byte) = bytes.get(*pos) {
        if !byte.is_ascii_digit() {
            break;
        }
        length = length
            .checked_mul(10)
            .and_then(|sum| sum.checked_add(usize::from(byte - b'0')))
            .ok_or_else(|| violation(start, "a representable name length"))?;
        *pos += 1;
    }
    if *pos == start || length == 0 {
        return Err(violation(start, "a length-prefixed name"));
    }
    let end = (*pos)
        .checked_add(length)
        .filter(|&end| end <= payload.len())
        .ok_or_else(|| violation(start, "a name that fits the input"))?;
    let name = payload
        .get(*pos..end)
        .ok_or_else(|| violation(*pos, "a name on a character boundary"))?;
    *pos = end;
    Ok(name)
}

/// Encodes a nominal-type tree in the `_Tt` runtime form.
///
/// Accepts a `Global` (or bare type) wrapping classes, structs and
/// enums nested under a module, with plain ASCII names throughout.
/// Anything else is not expressible in this dialect.
pub fn remangle_runtime_name(arena: &NodeArena, node: NodeId) -> Result<String, MangleError> {
    let mut kinds: SmallVec<[u8; 8]> = SmallVec::new();
    let mut names: SmallVec<[&str; 8]> = SmallVec::new();
    let mut current = peel(arena, node);
    let module = loop {
        let code = match arena.kind(current) {
            Kind::Module => break current,
            Kind::Class => b'C',
            Kind::Structure => b'V',
            Kind::Enum => b'O',
            _ => return Err(not_expressible()),
        };
        let [context, name] = *arena.children(current) else {
            return Err(not_expressible());
        };
        if arena.kind(name) != Kind::Identifier {
            return Err(not_expressible());
        }
        kinds.push(code);
        names.push(plain_name(arena, name)?);
        current = context;
    };
    if kinds.is_empty() {
        return Err(not_expressible());
    }
    let module = plain_name(arena, module)?;
    let mut out = String::from("_Tt");
    for &code in kinds.iter().rev() {
        out.push(char::from(code));
    }
    append_name(&mut out, module);
    for &name in names.iter().rev() {
        append_name(&mut out, name);
    }
    Ok(out)
}

/// Steps through `Global`, `TypeMangling` and `Type` wrappers to the
/// nominal underneath.
fn peel(arena: &NodeArena, node: NodeId) -> NodeId {
    let mut current = node;
    loop {
        match arena.kind(current) {
            Kind::Global | Kind::TypeMangling | Kind::Type => {
                match *arena.children(current) {
                    [only] => current = only,
                    _ => return current,
                }
            }
            _ => return current,
        }
    }
}

fn plain_name<'a>(arena: &'a NodeArena, node: NodeId) -> Result<&'a str, MangleError> {
    arena
        .text(node)
        .filter(|name| text::is_plain_identifier(name))
        .ok_or_else(not_expressible)
}

fn append_name(out: &mut String, name: &str) {
    out.push_str(&name.len().to_string());
    out.push_str(name);
}
