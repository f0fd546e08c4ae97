//! Mangling prefixes and dialect recognition.
//!
//! Current symbols start with `$s` (default) or `$e` (embedded). Three
//! historical prefixes are recognized for decoding only: `_T0` and `_S`
//! carry a stable-scheme payload behind an old prefix, `_Tt` introduces
//! the legacy runtime form for nominal types, and bare `_T` marks the
//! legacy general grammar (recognized, reported as unsupported).

/// Which current scheme a symbol (or an encoder) uses.
///
/// Embedded differs from default only in its prefix and in which
/// verification paths apply; the payload grammar is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManglingFlavor {
    /// The default scheme, prefix `$s`.
    #[default]
    Default,
    /// The embedded scheme, prefix `$e`.
    Embedded,
}

impl ManglingFlavor {
    /// The wire prefix this flavor emits.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            ManglingFlavor::Default => PREFIX_DEFAULT,
            ManglingFlavor::Embedded => PREFIX_EMBEDDED,
        }
    }
}

/// Prefix of default-flavor symbols.
pub const PREFIX_DEFAULT: &str = "$s";
/// Prefix of embedded-flavor symbols.
pub const PREFIX_EMBEDDED: &str = "$e";

/// Dialect selected by a recognized prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Current scheme; remangling reproduces the same prefix.
    Stable(ManglingFlavor),
    /// Stable payload behind a retired prefix (`_T0`, `_S`). Decoded
    /// as default flavor; remangling canonicalizes to `$s`.
    StableHistoric,
    /// Legacy runtime form for nominal types (`_Tt`).
    LegacyNominal,
    /// The legacy general grammar (`_T`). Recognized but not decoded.
    Legacy,
}

/// A prefix match at the start of a candidate symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizedPrefix {
    /// The dialect the prefix selects.
    pub dialect: Dialect,
    /// Prefix length in bytes.
    pub len: usize,
}

/// Recognizes the mangling prefix of `symbol`, if any.
///
/// Longer prefixes win: `_Tt` and `_T0` are checked before `_T`.
#[must_use]
pub fn recognized_prefix(symbol: &str) -> Option<RecognizedPrefix> {
    let table: [(&str, Dialect); 6] = [
        (PREFIX_DEFAULT, Dialect::Stable(ManglingFlavor::Default)),
        (PREFIX_EMBEDDED, Dialect::Stable(ManglingFlavor::Embedded)),
        ("_T0", Dialect::StableHistoric),
        ("_Tt", Dialect::LegacyNominal),
        ("_T", Dialect::Legacy),
        ("_S", Dialect::StableHistoric),
    ];
    for (prefix, dialect) in table {
        if symbol.starts_with(prefix) {
            return Some(RecognizedPrefix {
                dialect,
                len: prefix.len(),
            });
        }
    }
    None
}

/// Whether `symbol` starts with a recognized prefix followed by at
/// least one payload character.
#[must_use]
pub fn is_mangled_name(symbol: &str) -> bool {
    recognized_prefix(symbol).is_some_and(|p| symbol.len() > p.len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_prefixes() {
        assert_eq!(
            recognized_prefix("$s4main3fooyyF"),
            Some(RecognizedPrefix {
                dialect: Dialect::Stable(ManglingFlavor::Default),
                len: 2
            })
        );
        assert_eq!(
            recognized_prefix("$e4main3fooyyF").map(|p| p.dialect),
            Some(Dialect::Stable(ManglingFlavor::Embedded))
        );
    }

    #[test]
    fn historic_and_legacy_prefixes() {
        assert_eq!(
            recognized_prefix("_T04main3fooyyF").map(|p| (p.dialect, p.len)),
            Some((Dialect::StableHistoric, 3))
        );
        assert_eq!(
            recognized_prefix("_TtC5MyApp7MyClass").map(|p| (p.dialect, p.len)),
            Some((Dialect::LegacyNominal, 3))
        );
        assert_eq!(
            recognized_prefix("_TF4mainX").map(|p| p.dialect),
            Some(Dialect::Legacy)
        );
        assert_eq!(
            recognized_prefix("_SSS").map(|p| (p.dialect, p.len)),
            Some((Dialect::StableHistoric, 2))
        );
    }

    #[test]
    fn unprefixed_rejected() {
        assert_eq!(recognized_prefix("main"), None);
        assert!(!is_mangled_name("main"));
        assert!(!is_mangled_name("$s"));
        assert!(is_mangled_name("$sSi"));
    }
}
