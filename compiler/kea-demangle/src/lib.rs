//! Library behind the `kea-demangle` binary.
//!
//! The binary itself is a thin argument loop; everything it prints is
//! produced here so the behavior stays testable. Names given on the
//! command line go through [`process_name`], free text piped on stdin
//! goes through [`scan_line`] one line at a time.

use std::borrow::Cow;
use std::sync::Once;

use kea_mangle::flavor::Dialect;
use kea_mangle::{
    demangle_symbol_as_node, demangle_type_as_node, has_native_calling_convention,
    is_mangled_name, is_thunk_symbol, mangle_node, recognized_prefix, remangle_runtime_name,
    render, strip_specialization, thunk_target, Demangled, DemangleOptions,
};

/// Placeholder printed when `-type` input does not decode.
const INVALID_TYPE: &str = "<<invalid type>>";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing; safe to call multiple times.
///
/// Only installs a subscriber when `KEA_LOG` is set, so the tool stays
/// silent by default. `KEA_LOG=kea_mangle=debug` shows decode failures.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("KEA_LOG").is_ok() {
            let filter = EnvFilter::from_env("KEA_LOG");
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

// -- Options --

/// How much of each demangling is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// `<mangled> ---> <demangled>`.
    #[default]
    Standard,
    /// The demangled text alone.
    Compact,
    /// Header and node-tree dump followed by the standard line.
    Expand,
    /// Header and node-tree dump alone.
    TreeOnly,
}

/// Parsed command-line flags.
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    pub mode: OutputMode,
    /// Inputs are bare type manglings rather than full symbols.
    pub type_names: bool,
    /// Print the remangled origin of specialized functions.
    pub strip_specialization: bool,
    /// Remangle each demangling and fail on any byte difference.
    pub test_remangle: bool,
    /// Emit the `_Tt` runtime form for nominal-type symbols.
    pub remangle_legacy: bool,
    /// Remangle each name into its canonical stable spelling.
    pub remangle_new: bool,
    /// Annotate each demangling with a `{...}` classification column.
    pub classify: bool,
    pub display: DemangleOptions,
}

/// Splits `args` into flags and positional names.
///
/// # Errors
///
/// A message naming the offending flag or value, for the binary to
/// report alongside its usage text.
pub fn parse_args(args: &[String]) -> Result<(ToolOptions, Vec<String>), String> {
    let mut options = ToolOptions::default();
    let mut names = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-expand" => options.mode = OutputMode::Expand,
            "-compact" => options.mode = OutputMode::Compact,
            "-tree-only" => options.mode = OutputMode::TreeOnly,
            "-type" => options.type_names = true,
            "-no-sugar" => options.display.synthesize_sugar_on_types = false,
            "-simplified" => options.display = DemangleOptions::simplified(),
            "-strip-specialization" => options.strip_specialization = true,
            "-test-remangle" => options.test_remangle = true,
            "-remangle-legacy" => options.remangle_legacy = true,
            "-remangle-new" => options.remangle_new = true,
            "-classify" => options.classify = true,
            _ => {
                if let Some(value) = arg.strip_prefix("-display-stdlib-module=") {
                    options.display.display_stdlib_module = parse_toggle(arg, value)?;
                } else if let Some(value) = arg.strip_prefix("-display-objc-module=") {
                    options.display.display_objc_module = parse_toggle(arg, value)?;
                } else if let Some(value) = arg.strip_prefix("-show-closure-signature=") {
                    options.display.show_closure_signature = parse_toggle(arg, value)?;
                } else if let Some(value) = arg.strip_prefix("-display-local-name-contexts=") {
                    options.display.display_local_name_contexts = parse_toggle(arg, value)?;
                } else if let Some(value) = arg.strip_prefix("-hiding-module=") {
                    options.display.hiding_module = Some(value.into());
                } else if arg.starts_with('-') && arg.len() > 1 {
                    return Err(format!("unknown flag '{arg}'"));
                } else {
                    names.push(arg.clone());
                }
            }
        }
    }
    if options.type_names && names.is_empty() {
        return Err("the -type flag requires explicit names; it cannot scan stdin".to_owned());
    }
    Ok((options, names))
}

fn parse_toggle(flag: &str, value: &str) -> Result<bool, String> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("'{flag}' expects true or false")),
    }
}

// -- Per-name processing --

/// Everything the tool has to say about one input name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOutput {
    /// Lines for stdout.
    Text(String),
    /// A `-test-remangle` failure; the binary reports it and exits
    /// nonzero.
    Mismatch { remangled: String, original: String },
}

/// Whether a positional argument deserves the blank-argument warning.
///
/// A lone `_` or an empty string is almost always an unset shell
/// variable, so the binary warns before echoing it back.
#[must_use]
pub fn is_blank_argument(name: &str) -> bool {
    name.is_empty() || name == "_"
}

/// Demangles one command-line name under `options`.
///
/// Names that do not decode come back verbatim; only a remangling
/// mismatch is distinguished from ordinary output.
#[must_use]
pub fn process_name(name: &str, options: &ToolOptions) -> NameOutput {
    if options.type_names {
        return NameOutput::Text(type_output(name, options));
    }
    let shown = effective_name(name);
    symbol_output(&shown, name, options, options.mode)
}

/// Output for one symbol, shared by the argument loop and the stdin
/// scanner (which forces compact mode).
///
/// The tree modes open with a `Demangling for <name>` header and the
/// node dump. The remangling flags then replace the normal `--->`
/// line, and `-tree-only` suppresses it outright.
fn symbol_output(
    shown: &str,
    original: &str,
    options: &ToolOptions,
    mode: OutputMode,
) -> NameOutput {
    let decoded = decode_symbol(shown);
    let mut out = String::new();
    if let Some(decoded) = &decoded {
        if matches!(mode, OutputMode::Expand | OutputMode::TreeOnly) {
            out.push_str("Demangling for ");
            out.push_str(shown);
            out.push('\n');
            out.push_str(&decoded.arena.dump(decoded.root));
        }
    }
    if options.test_remangle {
        let Some(decoded) = &decoded else {
            return NameOutput::Text(original.to_owned());
        };
        return match remangle_check(shown, original, decoded) {
            NameOutput::Text(text) => {
                out.push_str(&text);
                NameOutput::Text(finished(out))
            }
            mismatch => mismatch,
        };
    }
    if options.remangle_legacy {
        let Some(decoded) = &decoded else {
            return NameOutput::Text(original.to_owned());
        };
        match remangle_runtime_name(&decoded.arena, decoded.root) {
            Ok(runtime) => out.push_str(&runtime),
            Err(err) => {
                tracing::debug!(symbol = shown, %err, "no runtime form");
                out.push_str(original);
            }
        }
        return NameOutput::Text(finished(out));
    }
    if mode == OutputMode::TreeOnly {
        if decoded.is_some() {
            return NameOutput::Text(finished(out));
        }
        return NameOutput::Text(original.to_owned());
    }
    if options.remangle_new {
        let Some(decoded) = &decoded else {
            return NameOutput::Text(original.to_owned());
        };
        match mangle_node(&decoded.arena, decoded.root, decoded.flavor) {
            Ok(remangled) => out.push_str(&remangled),
            Err(err) => {
                tracing::debug!(symbol = shown, %err, "could not remangle");
                out.push_str(original);
            }
        }
        return NameOutput::Text(finished(out));
    }
    if options.strip_specialization {
        match strip_specialization(shown) {
            Some(origin) => out.push_str(&origin),
            None => out.push_str(original),
        }
        return NameOutput::Text(finished(out));
    }
    let column = classification_column(shown, decoded.is_some(), options);
    let Some(decoded) = &decoded else {
        if column.is_empty() {
            return NameOutput::Text(original.to_owned());
        }
        return NameOutput::Text(match mode {
            OutputMode::Compact => format!("{column}{shown}"),
            _ => format!("{shown} ---> {column}{shown}"),
        });
    };
    let display = render(&decoded.arena, decoded.root, &options.display)
        .unwrap_or_else(|| shown.to_owned());
    match mode {
        OutputMode::Compact => {
            out.push_str(&column);
            out.push_str(&display);
        }
        _ => {
            out.push_str(shown);
            out.push_str(" ---> ");
            out.push_str(&column);
            out.push_str(&display);
        }
    }
    NameOutput::Text(finished(out))
}

/// Normalizes one command-line name.
///
/// Drops the spare underscore some toolchains prepend to `__`-prefixed
/// symbols, and retries bare `s`/`S`/`e` spellings with `$` in front
/// since shells eat the `$` of an unquoted symbol.
fn effective_name(name: &str) -> Cow<'_, str> {
    let name = match name.strip_prefix('_') {
        Some(rest) if rest.starts_with('_') => rest,
        _ => name,
    };
    if recognized_prefix(name).is_none() && name.starts_with(['s', 'S', 'e']) {
        Cow::Owned(format!("${name}"))
    } else {
        Cow::Borrowed(name)
    }
}

fn decode_symbol(symbol: &str) -> Option<Demangled> {
    match demangle_symbol_as_node(symbol) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::debug!(symbol, %err, "not demangled");
            None
        }
    }
}

/// Runs the `-test-remangle` comparison for one decoded symbol.
///
/// Only stable-grammar prefixes participate. Historic spellings
/// remangle to `$s`, so the original prefix is grafted back on before
/// the byte comparison; legacy dialects are echoed unchanged.
fn remangle_check(shown: &str, original: &str, decoded: &Demangled) -> NameOutput {
    let Some(prefix) = recognized_prefix(shown) else {
        return NameOutput::Text(original.to_owned());
    };
    if !matches!(prefix.dialect, Dialect::Stable(_) | Dialect::StableHistoric) {
        return NameOutput::Text(original.to_owned());
    }
    let remangled = match mangle_node(&decoded.arena, decoded.root, decoded.flavor) {
        Ok(remangled) => remangled,
        Err(err) => {
            tracing::debug!(symbol = shown, %err, "remangle failed");
            return NameOutput::Text(original.to_owned());
        }
    };
    let adjusted = if remangled.starts_with(&shown[..prefix.len]) {
        remangled
    } else {
        let canonical = recognized_prefix(&remangled).map_or(0, |p| p.len);
        format!("{}{}", &shown[..prefix.len], &remangled[canonical..])
    };
    if adjusted == shown {
        // Double-underscore inputs print back in their original spelling.
        if original.strip_prefix('_') == Some(shown) {
            return NameOutput::Text(original.to_owned());
        }
        NameOutput::Text(adjusted)
    } else {
        NameOutput::Mismatch {
            remangled: adjusted,
            original: shown.to_owned(),
        }
    }
}

/// Builds the `-classify` column, `{...} ` or empty.
///
/// `N` marks text that is not a mangled name at all. `T:` marks a
/// thunk, with its target appended when one can be derived. `C` marks
/// a decoded symbol that does not use the native calling convention.
fn classification_column(symbol: &str, decoded: bool, options: &ToolOptions) -> String {
    if !options.classify {
        return String::new();
    }
    let mut tags = String::new();
    if !is_mangled_name(symbol) {
        tags.push('N');
    }
    if is_thunk_symbol(symbol) {
        if !tags.is_empty() {
            tags.push(',');
        }
        tags.push_str("T:");
        if let Some(target) = thunk_target(symbol) {
            tags.push_str(&target);
        }
    }
    if decoded && !has_native_calling_convention(symbol) {
        if !tags.is_empty() {
            tags.push(',');
        }
        tags.push('C');
    }
    if tags.is_empty() {
        String::new()
    } else {
        format!("{{{tags}}} ")
    }
}

fn type_output(name: &str, options: &ToolOptions) -> String {
    let decoded = match demangle_type_as_node(name) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::debug!(mangling = name, %err, "type did not decode");
            None
        }
    };
    let display = decoded
        .as_ref()
        .and_then(|d| render(&d.arena, d.root, &options.display))
        .unwrap_or_else(|| INVALID_TYPE.to_owned());
    match (options.mode, &decoded) {
        (OutputMode::Compact, _) | (OutputMode::TreeOnly, None) => display,
        (OutputMode::TreeOnly, Some(decoded)) => finished(format!(
            "Demangling for {name}\n{}",
            decoded.arena.dump(decoded.root)
        )),
        (OutputMode::Expand, Some(decoded)) => format!(
            "Demangling for {name}\n{}{name} ---> {display}",
            decoded.arena.dump(decoded.root)
        ),
        (OutputMode::Standard | OutputMode::Expand, _) => format!("{name} ---> {display}"),
    }
}

/// Drops the trailing newline a node dump leaves behind.
fn finished(mut out: String) -> String {
    while out.ends_with('\n') {
        out.pop();
    }
    out
}

// -- Stdin scanning --

/// Rewrites one line of free text, demangling in place.
///
/// A candidate is a maximal run of `[A-Za-z0-9_$.]` that starts with a
/// recognized mangling prefix and carries at least one character after
/// it; everything else passes through untouched. This is what lets
/// crash logs and `nm` output be piped straight in.
#[must_use]
pub fn scan_line(line: &str, options: &ToolOptions) -> NameOutput {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut copied = 0;
    let mut at = 0;
    while at < bytes.len() {
        if !is_symbol_byte(bytes[at]) {
            at += 1;
            continue;
        }
        let start = at;
        while at < bytes.len() && is_symbol_byte(bytes[at]) {
            at += 1;
        }
        let run = &line[start..at];
        if !is_mangled_name(run) {
            continue;
        }
        out.push_str(&line[copied..start]);
        match substitution(run, options) {
            NameOutput::Text(text) => out.push_str(&text),
            mismatch @ NameOutput::Mismatch { .. } => return mismatch,
        }
        copied = at;
    }
    out.push_str(&line[copied..]);
    NameOutput::Text(out)
}

// Candidate runs are pure ASCII, so byte positions are char
// boundaries and the slicing above stays valid UTF-8.
fn is_symbol_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'$' | b'.')
}

/// In-place replacement for one stdin candidate. Compact mode is
/// forced regardless of the flags, since a `--->` line or a tree dump
/// has no place inside running text.
fn substitution(run: &str, options: &ToolOptions) -> NameOutput {
    symbol_output(run, run, options, OutputMode::Compact)
}
