//! Low-level mangled-text writer.
//!
//! [`Mangler`] owns the output buffer and the two compression tables
//! that span a whole symbol: the word table for identifier text and the
//! local substitution table. The remangler drives it through `append_*`
//! calls; the writer itself knows nothing about node kinds. The legacy
//! `_Tt` encoder does not use it, since that dialect has no
//! compression.
//!
//! # Identifier forms
//!
//! ```text
//! 3foo                     plain: length, then text
//! 0A7Manager               word-substituted: '0', then letters and runs
//! 003exa                   punycoded: '00', length, encoded body
//! 0019thename_ohaIJBIAcia  raw (backtick) identifiers ride the
//!                          punycode form with U+0020 mapped to U+00A0
//! ```
//!
//! A text run never starts with a digit; the length in front of it
//! would absorb the digit on the way back in. Identifiers violating
//! that (or empty ones) are rejected rather than mangled ambiguously.

use std::fmt::Write as _;
use std::ops::Range;

use smallvec::SmallVec;

use crate::error::MangleError;
use crate::node::{NodeArena, NodeId};
use crate::punycode;
use crate::substitution::{SubstitutionMerging, SubstitutionTable};
use crate::text::{self, MAX_WORDS};

/// Instrumentation hooks for mangling.
///
/// All methods default to no-ops; implement the ones of interest and
/// pass the observer to
/// [`mangle_node_with_observer`](crate::remangler::mangle_node_with_observer).
pub trait ManglingObserver {
    /// An already-registered entity was emitted as a back-reference.
    fn substitution_reused(&mut self, index: usize) {
        let _ = index;
    }

    /// A mangled entity registered a fresh substitution index.
    fn substitution_added(&mut self, index: usize) {
        let _ = index;
    }

    /// A word reference replaced `word` inside an identifier.
    fn word_substituted(&mut self, word: &str) {
        let _ = word;
    }
}

/// No-op observer.
impl ManglingObserver for () {}

struct WordReplacement {
    /// Byte position within the identifier being mangled.
    pos: usize,
    /// Index into the word table, or `usize::MAX` for the end sentinel.
    word: usize,
}

/// The output writer. One instance serves one symbol at a time;
/// [`Mangler::begin_mangling`] recycles it.
pub(crate) struct Mangler<'o> {
    buffer: String,
    /// Ranges into `buffer` holding the words seen so far. During
    /// [`Mangler::append_identifier`] freshly discovered words are
    /// temporarily identifier-relative and rebased as their text run is
    /// copied out.
    words: Vec<Range<usize>>,
    substitutions: SubstitutionTable,
    merging: SubstitutionMerging,
    observer: Option<&'o mut dyn ManglingObserver>,
}

impl<'o> Mangler<'o> {
    pub(crate) fn new() -> Self {
        Mangler {
            buffer: String::new(),
            words: Vec::new(),
            substitutions: SubstitutionTable::new(),
            merging: SubstitutionMerging::new(),
            observer: None,
        }
    }

    pub(crate) fn with_observer(observer: &'o mut dyn ManglingObserver) -> Self {
        let mut mangler = Mangler::new();
        mangler.observer = Some(observer);
        mangler
    }

    /// Clears all per-symbol state. Prefixes are appended by the root
    /// emitter, so bare type manglings use the same entry point.
    pub(crate) fn begin_mangling(&mut self) {
        self.buffer.clear();
        self.words.clear();
        self.substitutions.reset();
        self.merging.reset();
    }

    /// Takes the finished mangling out of the writer.
    pub(crate) fn finalize(&mut self) -> String {
        self.words.clear();
        self.substitutions.reset();
        self.merging.reset();
        std::mem::take(&mut self.buffer)
    }

    /// Appends literal operator characters.
    pub(crate) fn append_operator(&mut self, op: &str) {
        self.buffer.push_str(op);
    }

    /// Appends a decimal NATURAL.
    pub(crate) fn append_natural(&mut self, value: u64) {
        let _ = write!(self.buffer, "{value}");
    }

    /// Appends an INDEX: `_` for 0, otherwise the value minus one
    /// followed by `_`.
    pub(crate) fn append_index(&mut self, index: u64) {
        if index == 0 {
            self.buffer.push('_');
        } else {
            self.append_natural(index - 1);
            self.buffer.push('_');
        }
    }

    // -- Substitutions --

    /// Emits a back-reference if `node` is already registered.
    pub(crate) fn try_substitution(
        &mut self,
        arena: &NodeArena,
        node: NodeId,
        as_text: bool,
    ) -> bool {
        let Some(index) = self.substitutions.find(arena, node, as_text) else {
            return false;
        };
        if index >= 26 {
            self.buffer.push('A');
            self.append_index(u64::try_from(index - 26).unwrap_or(u64::MAX));
        } else if let Ok(ordinal) = u8::try_from(index) {
            let letter = b'A' + ordinal;
            if !self.merging.try_merge(&mut self.buffer, letter, false) {
                self.buffer.push('A');
                self.buffer.push(letter as char);
            }
        }
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.substitution_reused(index);
        }
        true
    }

    /// Registers `node` under the next substitution index.
    pub(crate) fn add_substitution(&mut self, arena: &NodeArena, node: NodeId, as_text: bool) {
        let index = self.substitutions.add(arena, node, as_text);
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.substitution_added(index);
        }
    }

    /// Emits a standard substitution. Second-level characters resolve
    /// in the concurrency library and never participate in merging.
    pub(crate) fn append_standard_substitution(&mut self, letter: u8, second_level: bool) {
        if second_level {
            self.buffer.push('S');
            self.buffer.push('c');
            self.buffer.push(letter as char);
        } else if !self.merging.try_merge(&mut self.buffer, letter, true) {
            self.buffer.push('S');
            self.buffer.push(letter as char);
        }
    }

    // -- Identifiers --

    /// Mangles one identifier in whichever of the four forms fits.
    pub(crate) fn append_identifier(&mut self, ident: &str) -> Result<(), MangleError> {
        if ident.is_empty() {
            return Err(MangleError::MalformedTree {
                detail: "empty identifier",
            });
        }
        if !ident.bytes().all(text::is_valid_symbol_char) {
            return self.append_encoded_identifier(ident);
        }
        if ident.as_bytes()[0].is_ascii_digit() {
            return Err(MangleError::MalformedTree {
                detail: "identifier starts with a digit",
            });
        }
        self.append_word_substituted(ident);
        Ok(())
    }

    /// The `00` form: punycoded body, raw identifiers wrapped in
    /// backticks with spaces mapped into the private band's reach.
    fn append_encoded_identifier(&mut self, ident: &str) -> Result<(), MangleError> {
        let wrapped;
        let source = if text::is_raw_identifier(ident) {
            wrapped = format!("`{}`", ident.replace(' ', "\u{00A0}"));
            wrapped.as_str()
        } else {
            ident
        };
        let Some(body) = punycode::encode_utf8(source, true) else {
            return Err(MangleError::MalformedTree {
                detail: "identifier contains unencodable scalars",
            });
        };
        self.buffer.push_str("00");
        self.append_natural(u64::try_from(body.len()).unwrap_or(u64::MAX));
        if body.as_bytes().first().is_some_and(|&b| b.is_ascii_digit() || b == b'_') {
            self.buffer.push('_');
        }
        self.buffer.push_str(&body);
        Ok(())
    }

    fn word_text<'a>(&'a self, index: usize, ident: &'a str, words_in_buffer: usize) -> &'a str {
        let range = self.words[index].clone();
        if index < words_in_buffer {
            &self.buffer[range]
        } else {
            &ident[range]
        }
    }

    /// Scans for known words, records new ones, and writes the plain or
    /// `0`-prefixed form.
    fn append_word_substituted(&mut self, ident: &str) {
        let bytes = ident.as_bytes();
        let words_in_buffer = self.words.len();
        let mut replacements: SmallVec<[WordReplacement; 8]> = SmallVec::new();

        // Pass 1: find word boundaries, look each word up in the table
        // (buffer words first, then words earlier in this identifier).
        let mut word_start: Option<usize> = None;
        for pos in 0..=bytes.len() {
            if let Some(start) = word_start {
                let ends = pos == bytes.len() || text::is_word_end(bytes[pos], bytes[pos - 1]);
                if ends {
                    let word = &ident[start..pos];
                    let known = (0..self.words.len())
                        .find(|&i| self.word_text(i, ident, words_in_buffer) == word);
                    if let Some(index) = known {
                        replacements.push(WordReplacement { pos: start, word: index });
                    } else if pos - start >= 2 && self.words.len() < MAX_WORDS {
                        self.words.push(start..pos);
                    }
                    word_start = None;
                }
            }
            if word_start.is_none() && pos < bytes.len() && text::is_word_start(bytes[pos]) {
                word_start = Some(pos);
            }
        }

        if !replacements.is_empty() {
            self.buffer.push('0');
        }
        // End sentinel so the loop below flushes trailing text.
        replacements.push(WordReplacement {
            pos: ident.len(),
            word: usize::MAX,
        });

        // Pass 2: alternate text runs and word references. New words
        // are rebased to buffer coordinates as their run is copied.
        let mut pos = 0;
        let mut next_new_word = words_in_buffer;
        let last_replacement = replacements.len().saturating_sub(2);
        for (ordinal, replacement) in replacements.iter().enumerate() {
            if pos < replacement.pos {
                debug_assert!(!bytes[pos].is_ascii_digit(), "text run starts with a digit");
                self.append_natural(u64::try_from(replacement.pos - pos).unwrap_or(u64::MAX));
                while pos < replacement.pos {
                    if next_new_word < self.words.len() && self.words[next_new_word].start == pos {
                        let len = self.words[next_new_word].len();
                        let start = self.buffer.len();
                        self.words[next_new_word] = start..start + len;
                        next_new_word += 1;
                    }
                    self.buffer.push(bytes[pos] as char);
                    pos += 1;
                }
            }
            if replacement.word == usize::MAX {
                continue;
            }
            if self.observer.is_some() {
                let word = self.word_text(replacement.word, ident, words_in_buffer).to_owned();
                if let Some(observer) = self.observer.as_deref_mut() {
                    observer.word_substituted(&word);
                }
            }
            pos += self.words[replacement.word].len();
            if let Ok(index) = u8::try_from(replacement.word) {
                if ordinal < last_replacement {
                    self.buffer.push((b'a' + index) as char);
                } else {
                    // The run's final reference is upper case; a '0'
                    // closes the identifier when nothing follows it.
                    self.buffer.push((b'A' + index) as char);
                    if pos == ident.len() {
                        self.buffer.push('0');
                    }
                }
            }
        }
    }
}
