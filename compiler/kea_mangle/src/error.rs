//! Error types for decoding and encoding.
//!
//! Decoding (untrusted input) and encoding (compiler-built trees) fail
//! differently and carry different context, so they get separate enums.
//! Both are plain values; nothing here panics. Entry points that promise
//! a total interface (`demangle_symbol_as_string`, the classifiers)
//! convert these into their echo/`None`/`false` surfaces at the edge.

use thiserror::Error;

/// Which hardening budget a malformed or adversarial input exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Tree depth limit (decoder, printer and remangler each enforce it).
    Depth,
    /// Total allocated node limit, scaled by input length.
    Nodes,
    /// Back-reference repeat count limit.
    RepeatCount,
}

impl std::fmt::Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Budget::Depth => "tree depth",
            Budget::Nodes => "node count",
            Budget::RepeatCount => "repeat count",
        };
        f.write_str(name)
    }
}

/// Failure while decoding a mangled symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemangleError {
    /// The input does not follow the grammar at `offset`.
    #[error("malformed mangling at byte {offset}: expected {expected}")]
    GrammarViolation {
        /// Byte offset into the payload (after the prefix) of the violation.
        offset: usize,
        /// What the active production needed next.
        expected: &'static str,
    },

    /// A hardening budget was exhausted before the input was consumed.
    #[error("{budget} budget exceeded (limit {limit})")]
    BudgetExceeded {
        /// The exhausted budget.
        budget: Budget,
        /// The configured limit.
        limit: usize,
    },

    /// The prefix belongs to a dialect this decoder does not implement.
    #[error("unsupported mangling dialect with prefix {prefix:?}")]
    UnsupportedDialect {
        /// The recognized but unimplemented prefix.
        prefix: &'static str,
    },

    /// No recognized mangling prefix at all.
    #[error("not a mangled symbol")]
    NotMangled,
}

/// Failure while encoding a node tree back into a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MangleError {
    /// The tree contains a kind the encoder has no production for, or a
    /// kind in a position the grammar cannot express.
    #[error("cannot mangle node kind {kind} here")]
    UnsupportedNodeKind {
        /// Debug name of the offending kind.
        kind: &'static str,
    },

    /// The tree violates a shape contract (wrong payload class or child
    /// count for its kind).
    #[error("malformed tree: {detail}")]
    MalformedTree {
        /// What the shape check found.
        detail: &'static str,
    },

    /// A hardening budget was exhausted while walking the tree.
    #[error("{budget} budget exceeded (limit {limit})")]
    BudgetExceeded {
        /// The exhausted budget.
        budget: Budget,
        /// The configured limit.
        limit: usize,
    },

    /// The tree is not expressible in the requested output dialect.
    #[error("tree is not expressible in the {dialect} dialect")]
    UnsupportedDialect {
        /// Human name of the output dialect.
        dialect: &'static str,
    },

    /// Verification re-decoded and re-encoded the output and got a
    /// different string. Always an internal consistency bug.
    #[error("round-trip mismatch: {original:?} re-mangled as {remangled:?}")]
    RoundTrip {
        /// What the encoder produced.
        original: String,
        /// What decode-then-encode produced.
        remangled: String,
    },
}
