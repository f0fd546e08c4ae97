//! End-to-end checks of the command-line surface, driven through the
//! library API so nothing has to spawn a binary.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use kea_demangle::{parse_args, process_name, scan_line, NameOutput, OutputMode, ToolOptions};
use pretty_assertions::assert_eq;

fn parsed_options(args: &[&str]) -> ToolOptions {
    let args: Vec<String> = args.iter().map(|&arg| arg.to_owned()).collect();
    match parse_args(&args) {
        Ok((options, _)) => options,
        Err(err) => panic!("flags did not parse: {err}"),
    }
}

fn text(output: NameOutput) -> String {
    match output {
        NameOutput::Text(text) => text,
        NameOutput::Mismatch {
            remangled,
            original,
        } => panic!("unexpected mismatch: {remangled} vs {original}"),
    }
}

// ── Output modes ────────────────────────────────────────

#[test]
fn default_output_pairs_mangled_and_demangled() {
    assert_eq!(
        text(process_name("$s4main3fooyyF", &ToolOptions::default())),
        "$s4main3fooyyF ---> main.foo() -> ()"
    );
}

#[test]
fn compact_output_is_the_demangling_alone() {
    let options = parsed_options(&["-compact"]);
    assert_eq!(
        text(process_name("$s4main3fooyyF", &options)),
        "main.foo() -> ()"
    );
}

#[test]
fn the_last_mode_flag_wins() {
    let options = parsed_options(&["-compact", "-tree-only"]);
    assert_eq!(options.mode, OutputMode::TreeOnly);
}

#[test]
fn tree_only_prints_the_node_tree() {
    let options = parsed_options(&["-tree-only"]);
    let out = text(process_name("$s4main3fooyyF", &options));
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("Demangling for $s4main3fooyyF"));
    assert_eq!(lines.next(), Some("kind=Global"));
    assert!(out.contains("kind=Function"), "got:\n{out}");
    assert!(out.contains("text=\"foo\""), "got:\n{out}");
    assert!(!out.ends_with('\n'));
}

#[test]
fn expand_frames_the_tree_with_header_and_demangling() {
    let options = parsed_options(&["-expand"]);
    let out = text(process_name("$s4main3fooyyF", &options));
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("Demangling for $s4main3fooyyF"));
    assert_eq!(lines.next(), Some("kind=Global"));
    assert_eq!(out.lines().last(), Some("$s4main3fooyyF ---> main.foo() -> ()"));
}

// ── Input normalization ─────────────────────────────────

#[test]
fn unparseable_names_echo_verbatim() {
    for name in ["main.foo", "$sZZZZ", "printf", "_ZN3foo3barEv"] {
        assert_eq!(text(process_name(name, &ToolOptions::default())), name);
    }
}

#[test]
fn shell_eaten_dollar_signs_are_recovered() {
    assert_eq!(
        text(process_name("s4main3fooyyF", &ToolOptions::default())),
        "$s4main3fooyyF ---> main.foo() -> ()"
    );
}

#[test]
fn a_spare_leading_underscore_is_dropped() {
    assert_eq!(
        text(process_name("__T04main3fooyyF", &ToolOptions::default())),
        "_T04main3fooyyF ---> main.foo() -> ()"
    );
}

#[test]
fn runtime_names_demangle() {
    assert_eq!(
        text(process_name("_TtC5MyApp7MyClass", &ToolOptions::default())),
        "_TtC5MyApp7MyClass ---> MyApp.MyClass"
    );
}

// ── Type mode ───────────────────────────────────────────

#[test]
fn type_mode_decodes_bare_manglings() {
    let options = parsed_options(&["-type", "Si"]);
    assert_eq!(text(process_name("Si", &options)), "Si ---> Kea.Int");
}

#[test]
fn type_mode_marks_invalid_payloads() {
    let options = parsed_options(&["-type", "A"]);
    assert_eq!(text(process_name("A", &options)), "A ---> <<invalid type>>");
    let compact = parsed_options(&["-type", "-compact", "A"]);
    assert_eq!(text(process_name("A", &compact)), "<<invalid type>>");
}

#[test]
fn type_mode_honors_sugar_flags() {
    let sugared = parsed_options(&["-type", "-compact", "SiSg"]);
    assert_eq!(text(process_name("SiSg", &sugared)), "Kea.Int?");
    let plain = parsed_options(&["-type", "-compact", "-no-sugar", "SiSg"]);
    assert_eq!(
        text(process_name("SiSg", &plain)),
        "Kea.Optional<Kea.Int>"
    );
}

// ── Display toggles ─────────────────────────────────────

#[test]
fn stdlib_qualifiers_can_be_hidden() {
    let options = parsed_options(&["-compact", "-display-stdlib-module=false"]);
    assert_eq!(
        text(process_name("$s4main3optyySiSgF", &options)),
        "main.opt(Int?) -> ()"
    );
}

#[test]
fn a_module_can_be_hidden_by_name() {
    let options = parsed_options(&["-compact", "-hiding-module=main"]);
    assert_eq!(
        text(process_name("$s4main3optyySiSgF", &options)),
        "opt(Kea.Int?) -> ()"
    );
}

#[test]
fn objc_qualifiers_can_be_hidden() {
    let options = parsed_options(&["-compact", "-display-objc-module=false"]);
    assert_eq!(
        text(process_name("$sSo8NSObjectCN", &options)),
        "type metadata for NSObject"
    );
}

#[test]
fn closure_signatures_can_be_suppressed() {
    let options = parsed_options(&["-compact", "-show-closure-signature=false"]);
    assert_eq!(
        text(process_name("$s4main3runyyFyycfU_", &options)),
        "closure #1 in main.run() -> ()"
    );
}

#[test]
fn simplified_output_drops_signatures() {
    let options = parsed_options(&["-compact", "-simplified"]);
    assert_eq!(
        text(process_name("$s4main5greet4withySS_tF", &options)),
        "main.greet(with:)"
    );
    assert_eq!(
        text(process_name("$s4main3optyySiSgF", &options)),
        "main.opt(_:)"
    );
}

// ── Classification ──────────────────────────────────────

#[test]
fn bridging_thunks_carry_their_target() {
    let options = parsed_options(&["-classify"]);
    assert_eq!(
        text(process_name("$s4main3fooyyFTo", &options)),
        "$s4main3fooyyFTo ---> {T:$s4main3fooyyF,C} @objc main.foo() -> ()"
    );
}

#[test]
fn forwarders_tag_as_thunks_with_an_empty_target() {
    let options = parsed_options(&["-classify"]);
    assert_eq!(
        text(process_name("$s4main3fooyyFTA", &options)),
        "$s4main3fooyyFTA ---> {T:} partial apply forwarder for main.foo() -> ()"
    );
}

#[test]
fn runtime_entries_tag_the_calling_convention() {
    let options = parsed_options(&["-classify"]);
    assert_eq!(
        text(process_name("$s4main3BarCMa", &options)),
        "$s4main3BarCMa ---> {C} type metadata accessor for main.Bar"
    );
}

#[test]
fn unmangled_text_is_tagged_as_such() {
    let options = parsed_options(&["-classify"]);
    assert_eq!(
        text(process_name("main.foo", &options)),
        "main.foo ---> {N} main.foo"
    );
}

#[test]
fn ordinary_symbols_get_no_column() {
    let options = parsed_options(&["-classify"]);
    assert_eq!(
        text(process_name("$s4main3fooyyF", &options)),
        "$s4main3fooyyF ---> main.foo() -> ()"
    );
}

// ── Remangling modes ────────────────────────────────────

#[test]
fn canonical_spellings_remangle_to_themselves() {
    let options = parsed_options(&["-test-remangle"]);
    for name in ["$s4main3fooyyF", "$s4main3optyySiSgF", "$s4main1xSivg"] {
        assert_eq!(text(process_name(name, &options)), name);
    }
}

#[test]
fn historic_prefixes_keep_their_spelling() {
    let options = parsed_options(&["-test-remangle"]);
    assert_eq!(
        text(process_name("_T04main3fooyyF", &options)),
        "_T04main3fooyyF"
    );
    assert_eq!(
        text(process_name("__T04main3fooyyF", &options)),
        "__T04main3fooyyF"
    );
}

#[test]
fn legacy_dialects_are_echoed_unchanged() {
    let options = parsed_options(&["-test-remangle"]);
    assert_eq!(
        text(process_name("_TtC5MyApp7MyClass", &options)),
        "_TtC5MyApp7MyClass"
    );
}

#[test]
fn longhand_spellings_are_reported_as_mismatches() {
    let options = parsed_options(&["-test-remangle"]);
    match process_name("$s4main3fooyy4main3BarCF", &options) {
        NameOutput::Mismatch {
            remangled,
            original,
        } => {
            assert_eq!(remangled, "$s4main3fooyyAA3BarCF");
            assert_eq!(original, "$s4main3fooyy4main3BarCF");
        }
        NameOutput::Text(text) => panic!("expected a mismatch, got: {text}"),
    }
}

#[test]
fn legacy_remangling_covers_nominal_symbols() {
    let options = parsed_options(&["-remangle-legacy"]);
    assert_eq!(
        text(process_name("$s4main3BarC", &options)),
        "_TtC4main3Bar"
    );
    assert_eq!(
        text(process_name("$s4main3fooyyF", &options)),
        "$s4main3fooyyF"
    );
}

#[test]
fn remangle_new_canonicalizes_spellings() {
    let options = parsed_options(&["-remangle-new"]);
    assert_eq!(
        text(process_name("_T04main3fooyyF", &options)),
        "$s4main3fooyyF"
    );
    assert_eq!(
        text(process_name("$s4main3fooyy4main3BarCF", &options)),
        "$s4main3fooyyAA3BarCF"
    );
    assert_eq!(text(process_name("printf", &options)), "printf");
}

#[test]
fn stripping_a_specialization_prints_its_origin() {
    let options = parsed_options(&["-strip-specialization"]);
    assert_eq!(
        text(process_name("$s4main2idyxxlFSi_Tg5", &options)),
        "$s4main2idyxxlF"
    );
    assert_eq!(
        text(process_name("$s4main3fooyyF", &options)),
        "$s4main3fooyyF"
    );
    let kept = parsed_options(&["-compact"]);
    assert_eq!(
        text(process_name("$s4main2idyxxlFSi_Tg5", &kept)),
        "generic specialization <Kea.Int> of main.id<A>(A) -> A"
    );
}

// ── Stdin scanning ──────────────────────────────────────

#[test]
fn scanning_rewrites_symbols_in_place() {
    assert_eq!(
        text(scan_line("0x10 $s4main3fooyyF frame 3", &ToolOptions::default())),
        "0x10 main.foo() -> () frame 3"
    );
}

#[test]
fn scanning_handles_several_symbols_per_line() {
    assert_eq!(
        text(scan_line(
            "$s4main3fooyyF calls _TtC5MyApp7MyClass",
            &ToolOptions::default()
        )),
        "main.foo() -> () calls MyApp.MyClass"
    );
}

#[test]
fn scanning_leaves_ordinary_text_alone() {
    for line in [
        "no symbols here 123",
        "maybe $sZZZZ here",
        "printf took 4ms",
        "",
    ] {
        assert_eq!(text(scan_line(line, &ToolOptions::default())), line);
    }
}

#[test]
fn scanning_skips_bare_prefixes() {
    let options = parsed_options(&["-classify"]);
    assert_eq!(
        text(scan_line("_T marks the spot", &options)),
        "_T marks the spot"
    );
}

#[test]
fn scanning_respects_punctuation_boundaries() {
    assert_eq!(
        text(scan_line("($s4main1xSivg)", &ToolOptions::default())),
        "(main.x.getter : Kea.Int)"
    );
}

#[test]
fn scanning_propagates_remangle_mismatches() {
    let options = parsed_options(&["-test-remangle"]);
    match scan_line("at $s4main3fooyy4main3BarCF", &options) {
        NameOutput::Mismatch { remangled, .. } => {
            assert_eq!(remangled, "$s4main3fooyyAA3BarCF");
        }
        NameOutput::Text(text) => panic!("expected a mismatch, got: {text}"),
    }
}
