//! Arena-allocated demangle trees.
//!
//! Nodes live in a [`NodeArena`] and reference each other by [`NodeId`]
//! (an index), never by pointer. One arena backs one demangle or mangle
//! operation; `reset` recycles the allocation for the next symbol, which
//! is what makes a long-lived [`crate::Context`] cheap.
//!
//! Children are always created before the parent that adopts them, so a
//! child id is numerically smaller than its parent's. Cycles are
//! therefore unrepresentable. Subtree sharing is legal and occurs when
//! the decoder materializes a back-reference; consumers treat nodes as
//! immutable values (kind changes copy the node).

use smallvec::SmallVec;

use crate::error::MangleError;
use crate::kind::{Kind, PayloadContract};

/// Handle to a node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Data a node may carry besides its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Nothing; structure is children-only.
    None,
    /// An unsigned integer.
    Index(u64),
    /// Owned text.
    Text(Box<str>),
}

#[derive(Debug)]
struct NodeData {
    kind: Kind,
    payload: Payload,
    children: SmallVec<[NodeId; 4]>,
}

/// Arena owning every node of one operation.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<NodeData>,
}

impl NodeArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        NodeArena { nodes: Vec::new() }
    }

    /// Number of live nodes. Decode budgets are checked against this.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops all nodes but keeps the allocation for reuse.
    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        debug_assert!(self.nodes.len() < u32::MAX as usize);
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(data);
        id
    }

    /// Creates a childless, payload-free node.
    pub fn create(&mut self, kind: Kind) -> NodeId {
        self.push(NodeData {
            kind,
            payload: Payload::None,
            children: SmallVec::new(),
        })
    }

    /// Creates a node carrying an integer payload.
    pub fn create_with_index(&mut self, kind: Kind, index: u64) -> NodeId {
        self.push(NodeData {
            kind,
            payload: Payload::Index(index),
            children: SmallVec::new(),
        })
    }

    /// Creates a node carrying text.
    pub fn create_with_text(&mut self, kind: Kind, text: impl Into<Box<str>>) -> NodeId {
        self.push(NodeData {
            kind,
            payload: Payload::Text(text.into()),
            children: SmallVec::new(),
        })
    }

    /// Creates a node with a single child.
    pub fn create_with_child(&mut self, kind: Kind, child: NodeId) -> NodeId {
        let mut children = SmallVec::new();
        children.push(child);
        self.push(NodeData {
            kind,
            payload: Payload::None,
            children,
        })
    }

    /// Creates a node adopting `children` in order.
    pub fn create_with_children<I>(&mut self, kind: Kind, children: I) -> NodeId
    where
        I: IntoIterator<Item = NodeId>,
    {
        let children: SmallVec<[NodeId; 4]> = children.into_iter().collect();
        self.push(NodeData {
            kind,
            payload: Payload::None,
            children,
        })
    }

    /// Copies `id` (payload and children included) under a new kind.
    pub fn copy_with_kind(&mut self, id: NodeId, kind: Kind) -> NodeId {
        let data = &self.nodes[id.index()];
        let copied = NodeData {
            kind,
            payload: data.payload.clone(),
            children: data.children.clone(),
        };
        self.push(copied)
    }

    /// Appends `child` to `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            child < parent,
            "child {child:?} must be created before parent {parent:?}"
        );
        self.nodes[parent.index()].children.push(child);
    }

    /// The node's kind.
    #[inline]
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Kind {
        self.nodes[id.index()].kind
    }

    /// The node's payload.
    #[inline]
    #[must_use]
    pub fn payload(&self, id: NodeId) -> &Payload {
        &self.nodes[id.index()].payload
    }

    /// Text payload, if this node carries one.
    #[inline]
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.index()].payload {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Integer payload, if this node carries one.
    #[inline]
    #[must_use]
    pub fn index(&self, id: NodeId) -> Option<u64> {
        match self.nodes[id.index()].payload {
            Payload::Index(index) => Some(index),
            _ => None,
        }
    }

    /// The node's children, in order.
    #[inline]
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Child at `position`.
    #[inline]
    #[must_use]
    pub fn child(&self, id: NodeId, position: usize) -> Option<NodeId> {
        self.nodes[id.index()].children.get(position).copied()
    }

    /// First child, if any.
    #[inline]
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.child(id, 0)
    }

    /// Last child, if any.
    #[inline]
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].children.last().copied()
    }

    // -- Structural comparison --
    //
    // Back-references share subtrees, so naive recursive comparison of
    // two demangle trees can revisit the same pair of nodes through
    // many paths. The worklist memoizes verified pairs and carries a
    // step cap; running into the cap reports "not equal", which costs
    // an encoder a substitution but never produces a wrong symbol.

    /// Structural equality of two subtrees, possibly across arenas.
    #[must_use]
    pub fn structural_eq(&self, lhs: NodeId, other: &NodeArena, rhs: NodeId) -> bool {
        const STEP_CAP: usize = 1 << 20;
        let same_arena = std::ptr::eq(self, other);
        let mut verified = rustc_hash::FxHashSet::default();
        let mut worklist = vec![(lhs, rhs)];
        let mut steps = 0usize;
        while let Some((a, b)) = worklist.pop() {
            steps += 1;
            if steps > STEP_CAP {
                return false;
            }
            if same_arena && a == b {
                continue;
            }
            if !verified.insert((a, b)) {
                continue;
            }
            let da = &self.nodes[a.index()];
            let db = &other.nodes[b.index()];
            if da.kind != db.kind
                || da.payload != db.payload
                || da.children.len() != db.children.len()
            {
                return false;
            }
            worklist.extend(da.children.iter().copied().zip(db.children.iter().copied()));
        }
        true
    }

    /// Structural hash of a subtree, memoized per node in `cache`.
    ///
    /// Equal subtrees hash equal; the converse is checked with
    /// [`NodeArena::structural_eq`] by callers.
    #[must_use]
    pub fn structural_hash(
        &self,
        id: NodeId,
        cache: &mut rustc_hash::FxHashMap<NodeId, u64>,
    ) -> u64 {
        use std::hash::{Hash, Hasher};
        if let Some(&hash) = cache.get(&id) {
            return hash;
        }
        // Children always carry smaller ids than their parents, so
        // hashing the reachable set in ascending id order hashes every
        // child before the node that owns it.
        let mut order: Vec<NodeId> = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();
        let mut visit = vec![id];
        while let Some(node) = visit.pop() {
            if cache.contains_key(&node) || !seen.insert(node) {
                continue;
            }
            order.push(node);
            visit.extend(self.children(node).iter().copied());
        }
        // The subtree root has the largest id of the reachable set, so
        // it is hashed last and the final `result` belongs to it.
        order.sort_unstable();
        let mut result = 0;
        for node in order {
            let data = &self.nodes[node.index()];
            let mut hasher = rustc_hash::FxHasher::default();
            data.kind.hash(&mut hasher);
            match &data.payload {
                Payload::None => 0u8.hash(&mut hasher),
                Payload::Index(index) => {
                    1u8.hash(&mut hasher);
                    index.hash(&mut hasher);
                }
                Payload::Text(text) => {
                    2u8.hash(&mut hasher);
                    text.hash(&mut hasher);
                }
            }
            for child in &data.children {
                cache.get(child).copied().unwrap_or_default().hash(&mut hasher);
            }
            result = hasher.finish();
            cache.insert(node, result);
        }
        result
    }

    // -- Validation and debugging --

    /// Checks the payload/child-count contract of every node reachable
    /// from `root`.
    pub fn validate(&self, root: NodeId) -> Result<(), MangleError> {
        let mut visit = vec![root];
        let mut seen = rustc_hash::FxHashSet::default();
        while let Some(id) = visit.pop() {
            if !seen.insert(id) {
                continue;
            }
            let data = &self.nodes[id.index()];
            let (payload, children) = data.kind.contract();
            let payload_ok = matches!(
                (payload, &data.payload),
                (PayloadContract::NoPayload, Payload::None)
                    | (PayloadContract::Index, Payload::Index(_))
                    | (PayloadContract::Text, Payload::Text(_))
            );
            if !payload_ok {
                return Err(MangleError::MalformedTree {
                    detail: "payload class violates the kind's contract",
                });
            }
            if !children.admits(data.children.len()) {
                return Err(MangleError::MalformedTree {
                    detail: "child count violates the kind's contract",
                });
            }
            visit.extend(data.children.iter().copied());
        }
        Ok(())
    }

    /// Renders the subtree in the two-space-indented `kind=` format the
    /// tool's tree output uses.
    #[must_use]
    pub fn dump(&self, root: NodeId) -> String {
        use std::fmt::Write;
        const MAX_DUMP_DEPTH: usize = 1024;
        let mut out = String::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            for _ in 0..depth {
                out.push_str("  ");
            }
            if depth >= MAX_DUMP_DEPTH {
                out.push_str("...\n");
                continue;
            }
            let data = &self.nodes[id.index()];
            let _ = write!(out, "kind={:?}", data.kind);
            match &data.payload {
                Payload::None => {}
                Payload::Index(index) => {
                    let _ = write!(out, ", index={index}");
                }
                Payload::Text(text) => {
                    let _ = write!(out, ", text=\"{text}\"");
                }
            }
            out.push('\n');
            for &child in data.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int32_structure(arena: &mut NodeArena) -> NodeId {
        let module = arena.create_with_text(Kind::Module, "Kea");
        let name = arena.create_with_text(Kind::Identifier, "Int32");
        let nominal = arena.create_with_children(Kind::Structure, [module, name]);
        arena.create_with_child(Kind::Type, nominal)
    }

    #[test]
    fn create_and_navigate() {
        let mut arena = NodeArena::new();
        let ty = int32_structure(&mut arena);
        assert_eq!(arena.kind(ty), Kind::Type);
        let nominal = arena.first_child(ty).map(|n| arena.kind(n));
        assert_eq!(nominal, Some(Kind::Structure));
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn reset_recycles() {
        let mut arena = NodeArena::new();
        let _ = int32_structure(&mut arena);
        arena.reset();
        assert!(arena.is_empty());
        let again = int32_structure(&mut arena);
        assert_eq!(arena.kind(again), Kind::Type);
    }

    #[test]
    fn structural_eq_matches_equal_trees() {
        let mut a = NodeArena::new();
        let mut b = NodeArena::new();
        let ta = int32_structure(&mut a);
        let tb = int32_structure(&mut b);
        assert!(a.structural_eq(ta, &b, tb));

        let other = b.create_with_text(Kind::Identifier, "Int64");
        assert!(!a.structural_eq(ta, &b, other));
    }

    #[test]
    fn structural_hash_agrees_with_eq() {
        let mut arena = NodeArena::new();
        let first = int32_structure(&mut arena);
        let second = int32_structure(&mut arena);
        let mut cache = rustc_hash::FxHashMap::default();
        assert_eq!(
            arena.structural_hash(first, &mut cache),
            arena.structural_hash(second, &mut cache)
        );
        assert!(arena.structural_eq(first, &arena, second));
    }

    #[test]
    fn shared_subtrees_compare_quickly() {
        // A doubling chain of shared children; pair memoization keeps
        // this linear rather than exponential.
        let mut arena = NodeArena::new();
        let mut node = arena.create_with_text(Kind::Identifier, "leaf");
        for _ in 0..64 {
            node = arena.create_with_children(Kind::Tuple, [node, node]);
        }
        assert!(arena.structural_eq(node, &arena, node));
    }

    #[test]
    fn validate_catches_contract_violations() {
        let mut arena = NodeArena::new();
        let ty = int32_structure(&mut arena);
        assert!(arena.validate(ty).is_ok());

        // Identifier must not carry children.
        let ident = arena.create_with_text(Kind::Identifier, "x");
        let stray = arena.create(Kind::EmptyList);
        // Force the violation through the raw API.
        let bad = arena.create_with_children(Kind::Type, [ident, stray]);
        assert!(arena.validate(bad).is_err());
    }

    #[test]
    fn dump_format() {
        let mut arena = NodeArena::new();
        let ty = int32_structure(&mut arena);
        let global = arena.create_with_child(Kind::Global, ty);
        let dump = arena.dump(global);
        assert_eq!(
            dump,
            "kind=Global\n  kind=Type\n    kind=Structure\n      kind=Module, text=\"Kea\"\n      kind=Identifier, text=\"Int32\"\n"
        );
    }
}
