use pretty_assertions::assert_eq;

use super::*;
use crate::demangler::{demangle_global, demangle_type};

fn decoded(payload: &str) -> (NodeArena, NodeId) {
    let mut arena = NodeArena::new();
    match demangle_global(&mut arena, payload) {
        Ok(root) => (arena, root),
        Err(err) => panic!("failed to demangle {payload:?}: {err}"),
    }
}

fn rendered_with(payload: &str, options: &DemangleOptions) -> String {
    let (arena, root) = decoded(payload);
    match render(&arena, root, options) {
        Some(output) => output,
        None => panic!("no display form for {payload:?}"),
    }
}

fn rendered(payload: &str) -> String {
    rendered_with(payload, &DemangleOptions::default())
}

fn rendered_type(payload: &str) -> String {
    let mut arena = NodeArena::new();
    let root = match demangle_type(&mut arena, payload) {
        Ok(root) => root,
        Err(err) => panic!("failed to demangle {payload:?}: {err}"),
    };
    match render(&arena, root, &DemangleOptions::default()) {
        Some(output) => output,
        None => panic!("no display form for {payload:?}"),
    }
}

/// Asserts the default rendering of each payload.
fn assert_displays(cases: &[(&str, &str)]) {
    for &(payload, expected) in cases {
        assert_eq!(rendered(payload), expected, "for {payload}");
    }
}

// ── Entities ────────────────────────────────────────────

#[test]
fn functions_and_operators_display() {
    assert_displays(&[
        ("4main3fooyyF", "main.foo() -> ()"),
        ("4main6squareyS2iF", "main.square(Kea.Int) -> Kea.Int"),
        ("4main5greet4withySS_tF", "main.greet(with: Kea.String) -> ()"),
        ("4main3fooyyAA3BarCF", "main.foo(main.Bar) -> ()"),
        ("4main3inc1xySiz_tF", "main.inc(x: inout Kea.Int) -> ()"),
        ("4main1poiyS2i_SitF", "main.+ infix(Kea.Int, Kea.Int) -> Kea.Int"),
        ("4main1tyyKF", "main.t() throws -> ()"),
        ("4main1ayyYaF", "main.a() async -> ()"),
    ]);
}

#[test]
fn storage_and_accessors_display() {
    assert_displays(&[
        ("4main1xSivg", "main.x.getter : Kea.Int"),
        ("4main1xSivs", "main.x.setter : Kea.Int"),
        ("4main1gSivpZ", "static main.g : Kea.Int"),
        ("4main1wSiXwvp", "main.w : weak Kea.Int"),
        (
            "4main3BoxCyS2icig",
            "main.Box.subscript.getter : (Kea.Int) -> Kea.Int",
        ),
    ]);
}

#[test]
fn initializers_and_deinitializers_display() {
    assert_displays(&[
        ("4main3FooVACycfC", "main.Foo.init() -> main.Foo"),
        ("4main3FooCfd", "main.Foo.deinit"),
        ("4main3FooCfD", "main.Foo.__deallocating_deinit"),
    ]);
}

#[test]
fn local_entities_name_their_contexts() {
    assert_displays(&[
        (
            "4main3runyyFyycfU_",
            "closure #1 () -> () in main.run() -> ()",
        ),
        (
            "4main3runyyF5innerL_yyF",
            "inner #1 () -> () in main.run() -> ()",
        ),
        (
            "4main3baryySi_SitFfA_",
            "default argument 0 of main.bar(Kea.Int, Kea.Int) -> ()",
        ),
        (
            "4main4pvar33_0123456789abcdef0123456789abcdefLLSivp",
            "main.(pvar in _0123456789abcdef0123456789abcdef) : Kea.Int",
        ),
    ]);
}

#[test]
fn extension_members_qualify_through_the_extension() {
    assert_eq!(
        rendered("Si4mainE1xSivp"),
        "(extension in main):Kea.Int.x : Kea.Int"
    );
}

#[test]
fn raw_identifiers_keep_their_backticks() {
    assert_eq!(
        rendered("4main0019thename_ohaIJBIAciaSivp"),
        "main.`the name` : Kea.Int"
    );
}

// ── Types and generics ──────────────────────────────────

#[test]
fn generic_signatures_display() {
    assert_displays(&[
        ("4main2idyxxlF", "main.id<A>(A) -> A"),
        (
            "4main4sortyySayxGSLRzlF",
            "main.sort<A where A: Kea.Comparable>([A]) -> ()",
        ),
        (
            "4main5firsty7ElementSTQzxSTRzlF",
            "main.first<A where A: Kea.Sequence>(A) -> A.Element",
        ),
    ]);
}

#[test]
fn stdlib_sugar_covers_optionals_arrays_and_dictionaries() {
    assert_displays(&[
        ("4main3optyySiSgF", "main.opt(Kea.Int?) -> ()"),
        ("4main1dyySDySiSSGF", "main.d([Kea.Int : Kea.String]) -> ()"),
    ]);
}

#[test]
fn sugar_can_be_turned_off() {
    let options = DemangleOptions {
        synthesize_sugar_on_types: false,
        ..DemangleOptions::default()
    };
    assert_eq!(
        rendered_with("4main3optyySiSgF", &options),
        "main.opt(Kea.Optional<Kea.Int>) -> ()"
    );
}

#[test]
fn protocol_compositions_display() {
    assert_eq!(
        rendered("4main1fyyAA1P_AA1QpF"),
        "main.f(main.P & main.Q) -> ()"
    );
}

#[test]
fn builtin_and_standalone_types_display() {
    assert_eq!(rendered("Bi64_D"), "Builtin.Int64");
    assert_eq!(rendered("Bf16_Bv4_D"), "Builtin.Vec4xFPIEEE16");
    assert_eq!(rendered("SimD"), "Kea.Int.Type");
    assert_eq!(rendered_type("Si"), "Kea.Int");
    assert_eq!(rendered_type("SayxG"), "[A]");
}

// ── Metadata, witnesses and thunks ──────────────────────

#[test]
fn metadata_and_witness_entries_display() {
    assert_displays(&[
        ("4main3BarCN", "type metadata for main.Bar"),
        ("4main3BarCMa", "type metadata accessor for main.Bar"),
        (
            "4main3FooVAA1PAAWP",
            "protocol witness table for main.Foo : main.P in main",
        ),
        ("4main3FooVwxx", "destroy value witness for main.Foo"),
        ("4main3FooVWV", "value witness table for main.Foo"),
        ("4main1xSivpWvd", "direct field offset for main.x : Kea.Int"),
    ]);
}

#[test]
fn thunks_display() {
    assert_displays(&[
        (
            "4main3fooyyFTA",
            "partial apply forwarder for main.foo() -> ()",
        ),
        ("4main3fooyyFTm", "merged main.foo() -> ()"),
        ("4main3fooyyFTj", "dispatch thunk of main.foo() -> ()"),
        ("4main3fooyyFTq", "method descriptor for main.foo() -> ()"),
        (
            "S2iIgir_S2iIgnr_TR",
            "reabstraction thunk helper from @callee_guaranteed (@in Kea.Int) -> (@out Kea.Int) \
             to @callee_guaranteed (@in_guaranteed Kea.Int) -> (@out Kea.Int)",
        ),
    ]);
}

#[test]
fn specializations_display() {
    assert_displays(&[
        (
            "4main2idyxxlFSi_Tg5",
            "generic specialization <Kea.Int> of main.id<A>(A) -> A",
        ),
        (
            "4main3fooyySiFTf4d_n",
            "function signature specialization <Arg[0] = Dead> of main.foo(Kea.Int) -> ()",
        ),
        (
            "4main3fooyySiFTfq4pi42_n",
            "function signature specialization <serialized, Arg[0] = [Constant Propagated \
             Integer : 42]> of main.foo(Kea.Int) -> ()",
        ),
    ]);
}

// ── Options ─────────────────────────────────────────────

#[test]
fn stdlib_qualifiers_can_be_hidden() {
    let options = DemangleOptions {
        display_stdlib_module: false,
        ..DemangleOptions::default()
    };
    assert_eq!(rendered_with("4main3optyySiSgF", &options), "main.opt(Int?) -> ()");
}

#[test]
fn foreign_module_qualifiers_can_be_hidden() {
    assert_eq!(rendered("So8NSObjectCN"), "type metadata for __C.NSObject");
    let options = DemangleOptions {
        display_objc_module: false,
        ..DemangleOptions::default()
    };
    assert_eq!(
        rendered_with("So8NSObjectCN", &options),
        "type metadata for NSObject"
    );
}

#[test]
fn a_module_can_be_hidden_by_name() {
    let options = DemangleOptions {
        hiding_module: Some("main".into()),
        ..DemangleOptions::default()
    };
    assert_eq!(
        rendered_with("4main3optyySiSgF", &options),
        "opt(Kea.Int?) -> ()"
    );
}

#[test]
fn simplified_form_drops_signatures() {
    let options = DemangleOptions::simplified();
    assert_eq!(
        rendered_with("4main5greet4withySS_tF", &options),
        "main.greet(with:)"
    );
    assert_eq!(rendered_with("4main3optyySiSgF", &options), "main.opt(_:)");
    assert_eq!(rendered_with("4main1xSivg", &options), "main.x.getter");
}

#[test]
fn local_contexts_can_be_suppressed() {
    let options = DemangleOptions {
        display_local_name_contexts: false,
        ..DemangleOptions::default()
    };
    assert_eq!(
        rendered_with("4main3runyyFyycfU_", &options),
        "closure #1 () -> ()"
    );
}

#[test]
fn closure_signatures_can_be_hidden() {
    assert_eq!(
        rendered("4main3runyyFyycfU_"),
        "closure #1 () -> () in main.run() -> ()"
    );
    let options = DemangleOptions {
        show_closure_signature: false,
        ..DemangleOptions::default()
    };
    assert_eq!(
        rendered_with("4main3runyyFyycfU_", &options),
        "closure #1 in main.run() -> ()"
    );
}

#[test]
fn qualified_local_names_keep_contexts() {
    let options = DemangleOptions {
        display_local_name_contexts: false,
        qualify_local_names: true,
        ..DemangleOptions::default()
    };
    assert_eq!(
        rendered_with("4main3runyyF5innerL_yyF", &options),
        "inner #1 () -> () in main.run() -> ()"
    );
}

// ── Rejected trees ──────────────────────────────────────

#[test]
fn shapes_outside_the_grammar_have_no_display() {
    let options = DemangleOptions::default();

    let mut arena = NodeArena::new();
    let marker = arena.create(Kind::FirstElementMarker);
    assert_eq!(render(&arena, marker, &options), None);

    let mut arena = NodeArena::new();
    let tuple = arena.create(Kind::Tuple);
    let ty = arena.create_with_child(Kind::Type, tuple);
    let witness = arena.create_with_index(Kind::ValueWitness, 99);
    arena.add_child(witness, ty);
    assert_eq!(render(&arena, witness, &options), None);
}

#[test]
fn runaway_nesting_has_no_display() {
    let mut arena = NodeArena::new();
    let mut node = arena.create(Kind::Tuple);
    for _ in 0..1200 {
        let ty = arena.create_with_child(Kind::Type, node);
        node = arena.create_with_child(Kind::Metatype, ty);
    }
    assert_eq!(render(&arena, node, &DemangleOptions::default()), None);
}
