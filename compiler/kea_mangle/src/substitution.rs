//! Substitution machinery shared by the decoder and the encoders.
//!
//! Two independent layers keep symbols short:
//!
//! * **Standard substitutions** (`S<c>`, `Sc<c>`): a fixed table of
//!   types from the core libraries. These never occupy an index in the
//!   local table, in either direction.
//! * **Local substitutions** (`A...`): every identifier and nominal
//!   the decoder materializes gets the next index; the encoder keeps
//!   the mirror table so both sides agree on numbering.
//!
//! [`SubstitutionMerging`] implements the output-side run coalescing
//! (`AB` + `C` becomes `AbC`, `AB` + `B` becomes `A2B`), rewriting the
//! tail of the output buffer in place.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::kind::Kind;
use crate::node::{NodeArena, NodeId};

/// The standard library module. Mangles as the operator `s`.
pub const STDLIB_MODULE: &str = "Kea";
/// The concurrency library module, reachable via `Sc<c>`.
pub const CONCURRENCY_MODULE: &str = "KeaConcurrency";
/// Module for types imported from foreign headers (`So`).
pub const FOREIGN_MODULE: &str = "__C";
/// Module for compiler-synthesized foreign declarations (`SC`).
pub const FOREIGN_SYNTHESIZED_MODULE: &str = "__C_Synthesized";

/// Largest accepted repeat count in substitution runs and repeated
/// standard substitutions. Bounds the node fan-out a short input can
/// request.
pub(crate) const MAX_REPEAT_COUNT: u64 = 2047;

// -- Standard type tables --

/// First-level table: `S<c>` resolves against [`STDLIB_MODULE`].
const STANDARD_TYPES: &[(u8, Kind, &str)] = &[
    (b'a', Kind::Structure, "Array"),
    (b'b', Kind::Structure, "Bool"),
    (b'D', Kind::Structure, "Dictionary"),
    (b'd', Kind::Structure, "Double"),
    (b'f', Kind::Structure, "Float"),
    (b'h', Kind::Structure, "Set"),
    (b'i', Kind::Structure, "Int"),
    (b'J', Kind::Structure, "Character"),
    (b'N', Kind::Structure, "ClosedRange"),
    (b'n', Kind::Structure, "Range"),
    (b'O', Kind::Structure, "ObjectIdentifier"),
    (b'P', Kind::Structure, "UnsafePointer"),
    (b'p', Kind::Structure, "UnsafeMutablePointer"),
    (b'R', Kind::Structure, "UnsafeBufferPointer"),
    (b'r', Kind::Structure, "UnsafeMutableBufferPointer"),
    (b'S', Kind::Structure, "String"),
    (b's', Kind::Structure, "Substring"),
    (b'u', Kind::Structure, "UInt"),
    (b'V', Kind::Structure, "UnsafeRawPointer"),
    (b'v', Kind::Structure, "UnsafeMutableRawPointer"),
    (b'W', Kind::Structure, "UnsafeRawBufferPointer"),
    (b'w', Kind::Structure, "UnsafeMutableRawBufferPointer"),
    (b'q', Kind::Enum, "Optional"),
    (b'B', Kind::Protocol, "BinaryFloatingPoint"),
    (b'E', Kind::Protocol, "Encodable"),
    (b'e', Kind::Protocol, "Decodable"),
    (b'F', Kind::Protocol, "FloatingPoint"),
    (b'G', Kind::Protocol, "RandomNumberGenerator"),
    (b'H', Kind::Protocol, "Hashable"),
    (b'j', Kind::Protocol, "Numeric"),
    (b'K', Kind::Protocol, "BidirectionalCollection"),
    (b'k', Kind::Protocol, "RandomAccessCollection"),
    (b'L', Kind::Protocol, "Comparable"),
    (b'l', Kind::Protocol, "Collection"),
    (b'M', Kind::Protocol, "MutableCollection"),
    (b'Q', Kind::Protocol, "Equatable"),
    (b'T', Kind::Protocol, "Sequence"),
    (b't', Kind::Protocol, "IteratorProtocol"),
    (b'U', Kind::Protocol, "UnsignedInteger"),
    (b'X', Kind::Protocol, "RangeExpression"),
    (b'x', Kind::Protocol, "Strideable"),
    (b'Y', Kind::Protocol, "RawRepresentable"),
    (b'y', Kind::Protocol, "StringProtocol"),
    (b'Z', Kind::Protocol, "SignedInteger"),
    (b'z', Kind::Protocol, "BinaryInteger"),
];

/// Second-level table: `Sc<c>` resolves against [`CONCURRENCY_MODULE`].
const CONCURRENCY_TYPES: &[(u8, Kind, &str)] = &[
    (b'A', Kind::Protocol, "Actor"),
    (b'C', Kind::Structure, "CheckedContinuation"),
    (b'c', Kind::Structure, "UnsafeContinuation"),
    (b'E', Kind::Structure, "CancellationError"),
    (b'e', Kind::Structure, "UnownedSerialExecutor"),
    (b'F', Kind::Protocol, "Executor"),
    (b'f', Kind::Protocol, "SerialExecutor"),
    (b'G', Kind::Structure, "TaskGroup"),
    (b'g', Kind::Structure, "ThrowingTaskGroup"),
    (b'I', Kind::Protocol, "AsyncIteratorProtocol"),
    (b'i', Kind::Protocol, "AsyncSequence"),
    (b'J', Kind::Structure, "UnownedJob"),
    (b'M', Kind::Structure, "MainActor"),
    (b'P', Kind::Structure, "TaskPriority"),
    (b'S', Kind::Structure, "AsyncStream"),
    (b's', Kind::Structure, "AsyncThrowingStream"),
    (b'T', Kind::Structure, "Task"),
    (b't', Kind::Structure, "UnsafeCurrentTask"),
];

fn level_table(second_level: bool) -> &'static [(u8, Kind, &'static str)] {
    if second_level {
        CONCURRENCY_TYPES
    } else {
        STANDARD_TYPES
    }
}

/// Module the given table level resolves names in.
#[must_use]
pub(crate) fn standard_module(second_level: bool) -> &'static str {
    if second_level {
        CONCURRENCY_MODULE
    } else {
        STDLIB_MODULE
    }
}

/// Decodes a standard-substitution character into its nominal kind and
/// name, or `None` for unassigned characters.
#[must_use]
pub(crate) fn standard_type(chr: u8, second_level: bool) -> Option<(Kind, &'static str)> {
    level_table(second_level)
        .iter()
        .find(|&&(c, _, _)| c == chr)
        .map(|&(_, kind, name)| (kind, name))
}

/// Encodes a nominal from one of the known modules back into its
/// substitution character. `second_level` is true for the concurrency
/// library.
#[must_use]
pub(crate) fn standard_type_char(kind: Kind, name: &str, second_level: bool) -> Option<u8> {
    level_table(second_level)
        .iter()
        .find(|&&(_, k, n)| k == kind && n == name)
        .map(|&(c, _, _)| c)
}

// -- Encoder substitution table --

#[derive(Debug, Clone, Copy)]
struct Entry {
    node: NodeId,
    /// Compare by text payload alone. Module and identifier mentions
    /// of the same text share one index, mirroring how the decoder
    /// rebinds an identifier entry as a module.
    as_text: bool,
}

/// Mirror of the decoder's substitution numbering, kept by encoders.
///
/// Lookup is hash-first: text entries hash their payload, structural
/// entries hash the whole subtree (memoized per node). The table is
/// scoped to one mangling operation; call [`SubstitutionTable::reset`]
/// between symbols when reusing the allocation.
#[derive(Debug, Default)]
pub(crate) struct SubstitutionTable {
    entries: Vec<Entry>,
    buckets: FxHashMap<u64, SmallVec<[u32; 2]>>,
    hash_cache: FxHashMap<NodeId, u64>,
}

impl SubstitutionTable {
    pub(crate) fn new() -> Self {
        SubstitutionTable::default()
    }

    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.buckets.clear();
        self.hash_cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry_hash(&mut self, arena: &NodeArena, node: NodeId, as_text: bool) -> u64 {
        use std::hash::{Hash, Hasher};
        if as_text {
            let mut hasher = rustc_hash::FxHasher::default();
            arena.text(node).hash(&mut hasher);
            hasher.finish()
        } else {
            arena.structural_hash(node, &mut self.hash_cache)
        }
    }

    fn entries_match(
        &self,
        arena: &NodeArena,
        entry: Entry,
        node: NodeId,
        as_text: bool,
    ) -> bool {
        if entry.as_text != as_text {
            return false;
        }
        if as_text {
            arena.text(entry.node) == arena.text(node)
        } else {
            arena.structural_eq(entry.node, arena, node)
        }
    }

    /// Index of an existing entry equal to `node`, if any.
    pub(crate) fn find(&mut self, arena: &NodeArena, node: NodeId, as_text: bool) -> Option<usize> {
        let hash = self.entry_hash(arena, node, as_text);
        let bucket = self.buckets.get(&hash)?;
        bucket
            .iter()
            .find(|&&ordinal| {
                self.entries_match(arena, self.entries[ordinal as usize], node, as_text)
            })
            .map(|&ordinal| ordinal as usize)
    }

    /// Registers `node` under the next free index and returns it.
    pub(crate) fn add(&mut self, arena: &NodeArena, node: NodeId, as_text: bool) -> usize {
        let hash = self.entry_hash(arena, node, as_text);
        let ordinal = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries.push(Entry { node, as_text });
        self.buckets.entry(hash).or_default().push(ordinal);
        ordinal as usize
    }
}

// -- Substitution merging --

/// Coalesces adjacent local-substitution manglings in an output buffer.
///
/// A run like `AaB` applies indices 0 then 1; `A2B` applies index 1
/// twice. The merger remembers where the previous substitution landed
/// in the buffer and rewrites its final letter when the next one can
/// join the run. Any unrelated write to the buffer invalidates the
/// remembered position, so runs never merge across other manglings.
#[derive(Debug, Default)]
pub(crate) struct SubstitutionMerging {
    /// Buffer offset of the last substitution's final segment, which is
    /// an optional repeat count followed by one letter.
    last_position: usize,
    last_size: usize,
    last_repeats: u64,
    last_is_standard: bool,
}

impl SubstitutionMerging {
    pub(crate) fn new() -> Self {
        SubstitutionMerging::default()
    }

    pub(crate) fn reset(&mut self) {
        self.last_repeats = 0;
    }

    /// Tries to merge `letter` into the preceding substitution run in
    /// `buffer`. Returns false when the caller must mangle it as a
    /// fresh `A<letter>` or `S<letter>`; the merger then tracks that
    /// fresh mangling, so callers must write it unconditionally.
    pub(crate) fn try_merge(&mut self, buffer: &mut String, letter: u8, standard: bool) -> bool {
        debug_assert!(
            letter.is_ascii_uppercase() || (standard && letter.is_ascii_lowercase()),
            "local substitution letters are upper case"
        );
        if self.last_repeats > 0
            && self.last_repeats < MAX_REPEAT_COUNT
            && buffer.len() == self.last_position + self.last_size
            && self.last_is_standard == standard
        {
            let last_letter = buffer.as_bytes()[buffer.len() - 1];
            if last_letter != letter && !standard {
                // Different substitution: turn the run's final letter
                // lower case and continue it, AB + C -> AbC.
                self.last_position = buffer.len();
                self.last_repeats = 1;
                self.last_size = 1;
                buffer.pop();
                buffer.push(last_letter.to_ascii_lowercase() as char);
                buffer.push(letter as char);
                return true;
            }
            if last_letter == letter {
                // Same substitution: bump the repeat count in place,
                // AB + B -> A2B, S2i + i -> S3i.
                use std::fmt::Write;
                self.last_repeats += 1;
                buffer.truncate(self.last_position);
                let _ = write!(buffer, "{}{}", self.last_repeats, letter as char);
                self.last_size = buffer.len() - self.last_position;
                return true;
            }
        }
        // Not mergeable; the caller writes `A<letter>`/`S<letter>` and
        // the segment we track is the letter after the operator.
        self.last_position = buffer.len() + 1;
        self.last_repeats = 1;
        self.last_size = 1;
        self.last_is_standard = standard;
        false
    }
}
