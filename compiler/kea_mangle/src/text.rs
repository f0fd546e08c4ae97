//! Character classes and identifier text utilities.
//!
//! The word-splitting rules here are shared by the encoder and the
//! decoder. Both sides must discover exactly the same words in exactly
//! the same order, or word back-references stop lining up; keeping the
//! scan in one place is what guarantees that.

use std::ops::Range;

/// Bytes that may appear in a mangled symbol without escaping.
#[inline]
#[must_use]
pub fn is_valid_symbol_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

/// Whether `text` can be emitted as a plain length-prefixed identifier.
///
/// Plain identifiers are ASCII `[A-Za-z0-9_]` and must not begin with a
/// digit (the digit would be swallowed by the length prefix).
#[must_use]
pub fn is_plain_identifier(text: &str) -> bool {
    let bytes = text.as_bytes();
    match bytes.first() {
        None => false,
        Some(b) if b.is_ascii_digit() => false,
        Some(_) => bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'_'),
    }
}

/// Whether `text` is a raw identifier: one containing ASCII characters
/// that are illegal in ordinary identifier position (spaces,
/// punctuation). Raw identifiers get backtick-delimited before escaping.
#[must_use]
pub fn is_raw_identifier(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_ascii() && !c.is_ascii_alphanumeric() && c != '_' && c != '$')
}

/// First byte of a word inside an identifier.
#[inline]
#[must_use]
pub fn is_word_start(byte: u8) -> bool {
    !byte.is_ascii_digit() && byte != b'_'
}

/// Whether `byte` terminates a word whose previous byte was `prev`.
#[inline]
#[must_use]
pub fn is_word_end(byte: u8, prev: u8) -> bool {
    byte == b'_' || (byte.is_ascii_uppercase() && !prev.is_ascii_uppercase())
}

/// Most words either side of an identifier mangling will track.
///
/// Word references are spelled with one of 26 letters, so entries past
/// this limit are never recorded.
pub(crate) const MAX_WORDS: usize = 26;

/// Iterator over the maximal word ranges of an identifier.
///
/// `"FooBar_baz2qux"` yields `Foo`, `Bar`, `baz2qux`. Single-byte words
/// are yielded too; substitution-table callers filter those out.
#[derive(Debug)]
pub struct Words<'a> {
    bytes: &'a [u8],
    pos: usize,
}

/// Splits `text` into word ranges.
#[must_use]
pub fn split_words(text: &str) -> Words<'_> {
    Words {
        bytes: text.as_bytes(),
        pos: 0,
    }
}

impl Iterator for Words<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        // Skip bytes that cannot start a word.
        while self.pos < self.bytes.len() && !is_word_start(self.bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len()
            && !is_word_end(self.bytes[self.pos], self.bytes[self.pos - 1])
        {
            self.pos += 1;
        }
        Some(start..self.pos)
    }
}

// -- Operator spellings --
//
// Operator identifiers mangle each symbol character to a lowercase
// letter. The table covers exactly the characters operators may use.

/// Maps an operator source character to its mangled letter.
#[must_use]
pub fn operator_char_to_mangled(c: char) -> Option<char> {
    Some(match c {
        '&' => 'a',
        '@' => 'c',
        '/' => 'd',
        '=' => 'e',
        '>' => 'g',
        '<' => 'l',
        '*' => 'm',
        '!' => 'n',
        '|' => 'o',
        '+' => 'p',
        '?' => 'q',
        '%' => 'r',
        '-' => 's',
        '~' => 't',
        '^' => 'x',
        '.' => 'z',
        _ => return None,
    })
}

/// Maps a mangled operator letter back to its source character.
#[must_use]
pub fn mangled_to_operator_char(c: char) -> Option<char> {
    Some(match c {
        'a' => '&',
        'c' => '@',
        'd' => '/',
        'e' => '=',
        'g' => '>',
        'l' => '<',
        'm' => '*',
        'n' => '!',
        'o' => '|',
        'p' => '+',
        'q' => '?',
        'r' => '%',
        's' => '-',
        't' => '~',
        'x' => '^',
        'z' => '.',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_of(text: &str) -> Vec<&str> {
        split_words(text).map(|r| &text[r]).collect()
    }

    #[test]
    fn plain_identifiers() {
        assert!(is_plain_identifier("foo"));
        assert!(is_plain_identifier("_x9"));
        assert!(is_plain_identifier("Foo2Bar"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2x"));
        assert!(!is_plain_identifier("a b"));
        assert!(!is_plain_identifier("Ω"));
    }

    #[test]
    fn raw_identifiers() {
        assert!(is_raw_identifier("the name"));
        assert!(is_raw_identifier("a+b"));
        assert!(!is_raw_identifier("Ω"));
        assert!(!is_raw_identifier("plain_name"));
        assert!(!is_raw_identifier("$0"));
    }

    #[test]
    fn camel_case_words() {
        assert_eq!(words_of("FooBar"), ["Foo", "Bar"]);
        assert_eq!(words_of("fooBarBaz"), ["foo", "Bar", "Baz"]);
        assert_eq!(words_of("HTTPServer"), ["HTTPServer"]);
    }

    #[test]
    fn underscores_and_digits() {
        assert_eq!(words_of("snake_case"), ["snake", "case"]);
        assert_eq!(words_of("Foo2Bar"), ["Foo2", "Bar"]);
        assert_eq!(words_of("__x"), ["x"]);
        assert_eq!(words_of("42"), Vec::<&str>::new());
    }

    #[test]
    fn operator_table_round_trips() {
        for c in ['&', '@', '/', '=', '>', '<', '*', '!', '|', '+', '?', '%', '-', '~', '^', '.']
        {
            let Some(mangled) = operator_char_to_mangled(c) else {
                panic!("no mangled form for {c:?}");
            };
            assert_eq!(mangled_to_operator_char(mangled), Some(c));
        }
        assert_eq!(operator_char_to_mangled('b'), None);
        assert_eq!(mangled_to_operator_char('b'), None);
    }
}
