use pretty_assertions::assert_eq;

use crate::demangler::{demangle_global, demangle_type, MAX_DEPTH};
use crate::error::{Budget, MangleError};
use crate::flavor::ManglingFlavor;
use crate::kind::Kind;
use crate::mangler::ManglingObserver;
use crate::node::{NodeArena, NodeId};

use super::{demangle_required, mangle_node, mangle_node_with_observer, verify_round_trip};

fn decoded(payload: &str) -> (NodeArena, NodeId) {
    let mut arena = NodeArena::new();
    match demangle_global(&mut arena, payload) {
        Ok(root) => (arena, root),
        Err(err) => panic!("failed to demangle {payload:?}: {err}"),
    }
}

fn reencoded(payload: &str) -> String {
    let (arena, root) = decoded(payload);
    match mangle_node(&arena, root, ManglingFlavor::Default) {
        Ok(output) => output,
        Err(err) => panic!("failed to remangle {payload:?}: {err}"),
    }
}

/// Asserts that decoding and re-encoding reproduces each payload
/// byte for byte.
fn assert_stable(payloads: &[&str]) {
    for &payload in payloads {
        assert_eq!(reencoded(payload), format!("$s{payload}"), "for {payload}");
    }
}

// ── Byte-identical round trips ──────────────────────────

#[test]
fn entities_reencode_byte_identically() {
    assert_stable(&[
        "4main3fooyyF",
        "4main3fooyyAA3BarCF",
        "4main6squareyS2iF",
        "4main5greet4withySS_tF",
        "4main1xSivg",
        "4main1gSivpZ",
        "4main3FooVACycfC",
        "4main3FooCfd",
        "4main3BoxCyS2icig",
        "4main3runyyFyycfU_",
        "4main3baryySi_SitFfA_",
        "4main3runyyF5innerL_yyF",
        "4main4pvar33_0123456789abcdef0123456789abcdefLLSivp",
    ]);
}

#[test]
fn names_reencode_byte_identically() {
    // Operator spellings, word references and punycode all come back
    // out through the same identifier machinery they went in through.
    assert_stable(&[
        "4main1poiyS2i_SitF",
        "9AlphaBeta0A5GammaSivp",
        "4main003exayyF",
    ]);
}

#[test]
fn types_and_generics_reencode_byte_identically() {
    assert_stable(&[
        "4main3optyySiSgF",
        "4main1fyyAA1XV_A2DtF",
        "4main1fyyAA1P_AA1QpF",
        "4main2idyxxlF",
        "4main4sortyySayxGSLRzlF",
        "4main5firsty7ElementSTQzxSTRzlF",
        "Si4mainE1xSivp",
        "4main1wSiXwvp",
    ]);
}

#[test]
fn metadata_and_witnesses_reencode_byte_identically() {
    assert_stable(&[
        "4main3BarCN",
        "4main3BarCMa",
        "4main3FooVAA1PAAWP",
        "4main3FooVwxx",
        "4main1xSivpWvd",
    ]);
}

#[test]
fn thunks_and_specializations_reencode_byte_identically() {
    assert_stable(&[
        "4main3fooyyFTA",
        "4main3fooyyFTm",
        "4main3fooyyFTj",
        "S2iIgir_S2iIgnr_TR",
        "4main2idyxxlFSi_Tg5",
        "4main3fooyySiFTf4d_n",
        "4main3fooyySiFTfq4pi42_n",
    ]);
}

#[test]
fn standard_library_symbol_reencodes() {
    // Int32 has no short code, so the module operator carries it.
    assert_stable(&["s5Int32V"]);
}

#[test]
fn bare_type_manglings_reencode() {
    for payload in ["Si", "SayxG", "SimD", "Bi64_D", "Bf16_Bv4_D", "S2iIgir_D"] {
        let mut arena = NodeArena::new();
        let root = match demangle_type(&mut arena, payload) {
            Ok(root) => root,
            Err(err) => panic!("failed to demangle {payload:?}: {err}"),
        };
        let output = match mangle_node(&arena, root, ManglingFlavor::Default) {
            Ok(output) => output,
            Err(err) => panic!("failed to remangle {payload:?}: {err}"),
        };
        assert_eq!(output, payload, "for {payload}");
    }
}

#[test]
fn embedded_flavor_uses_its_prefix() {
    let (arena, root) = decoded("4main3fooyyF");
    assert_eq!(
        mangle_node(&arena, root, ManglingFlavor::Embedded),
        Ok(String::from("$e4main3fooyyF"))
    );
}

// ── Canonicalized spellings ─────────────────────────────

#[test]
fn repeated_nominal_canonicalizes_to_a_back_reference() {
    // The module and type share one spelling, so the second mention
    // becomes a substitution instead of a word reference.
    assert_eq!(reencoded("4Meow0A0C"), "$s4MeowAAC");
}

#[test]
fn explicit_optional_respells_as_sugar() {
    assert_eq!(reencoded("4main3optyySqySiGF"), "$s4main3optyySiSgF");
}

#[test]
fn explicit_empty_parameter_tuple_respells_as_y() {
    assert_eq!(reencoded("4main3fooyytF"), "$s4main3fooyyF");
}

#[test]
fn depth_zero_generic_parameter_respells_as_x() {
    assert_eq!(reencoded("4main2idyqzqzlF"), "$s4main2idyxxlF");
}

#[test]
fn explicit_single_parameter_signature_respells_as_l() {
    assert_eq!(reencoded("4main2idyxxr_lF"), "$s4main2idyxxlF");
}

// ── Verification ────────────────────────────────────────

#[test]
fn verify_round_trip_accepts_decoder_output() {
    let (arena, root) = decoded("4main5firsty7ElementSTQzxSTRzlF");
    assert_eq!(
        verify_round_trip(&arena, root, ManglingFlavor::Default),
        Ok(())
    );
}

#[test]
fn verify_round_trip_flags_unlabeled_parameters() {
    // A one-parameter function without a label list encodes, but the
    // decoder reads the output differently, so verification fails.
    let mut arena = NodeArena::new();
    let module = arena.create_with_text(Kind::Module, "main");
    let name = arena.create_with_text(Kind::Identifier, "f");
    let kea = arena.create_with_text(Kind::Module, "Kea");
    let int_name = arena.create_with_text(Kind::Identifier, "Int");
    let int = arena.create_with_children(Kind::Structure, [kea, int_name]);
    let int_ty = arena.create_with_child(Kind::Type, int);
    let arguments = arena.create_with_child(Kind::ArgumentTuple, int_ty);
    let unit = arena.create(Kind::Tuple);
    let unit_ty = arena.create_with_child(Kind::Type, unit);
    let returns = arena.create_with_child(Kind::ReturnType, unit_ty);
    let function_ty = arena.create_with_children(Kind::FunctionType, [arguments, returns]);
    let ty = arena.create_with_child(Kind::Type, function_ty);
    let function = arena.create_with_children(Kind::Function, [module, name, ty]);
    let root = arena.create_with_child(Kind::Global, function);

    let Err(MangleError::RoundTrip { original, remangled }) =
        verify_round_trip(&arena, root, ManglingFlavor::Default)
    else {
        panic!("expected a round-trip failure");
    };
    assert_eq!(original, "$s4main1fySiF");
    assert!(remangled.starts_with("<undecodable:"), "got {remangled}");
}

// ── Rejected trees ──────────────────────────────────────

#[test]
fn nodes_without_a_production_are_rejected() {
    let mut arena = NodeArena::new();
    let index = arena.create_with_index(Kind::Index, 7);
    assert_eq!(
        mangle_node(&arena, index, ManglingFlavor::Default),
        Err(MangleError::UnsupportedNodeKind { kind: "Index" })
    );
    let escaping = arena.create(Kind::ImplEscaping);
    assert_eq!(
        mangle_node(&arena, escaping, ManglingFlavor::Default),
        Err(MangleError::UnsupportedNodeKind {
            kind: "ImplEscaping",
        })
    );
}

#[test]
fn value_witness_ordinal_out_of_range_is_malformed() {
    let mut arena = NodeArena::new();
    let kea = arena.create_with_text(Kind::Module, "Kea");
    let int_name = arena.create_with_text(Kind::Identifier, "Int");
    let int = arena.create_with_children(Kind::Structure, [kea, int_name]);
    let int_ty = arena.create_with_child(Kind::Type, int);
    let witness = arena.create_with_index(Kind::ValueWitness, 99);
    arena.add_child(witness, int_ty);
    let root = arena.create_with_child(Kind::Global, witness);
    assert_eq!(
        mangle_node(&arena, root, ManglingFlavor::Default),
        Err(MangleError::MalformedTree {
            detail: "a value witness ordinal",
        })
    );
}

#[test]
fn specialization_pass_id_must_fit_one_digit() {
    let mut arena = NodeArena::new();
    let pass = arena.create_with_index(Kind::SpecializationPassID, 12);
    let spec = arena.create_with_children(Kind::FunctionSignatureSpecialization, [pass]);
    let root = arena.create_with_child(Kind::Global, spec);
    assert_eq!(
        mangle_node(&arena, root, ManglingFlavor::Default),
        Err(MangleError::MalformedTree {
            detail: "a specialization pass id beyond one digit",
        })
    );
}

#[test]
fn runaway_nesting_hits_depth_budget() {
    let mut arena = NodeArena::new();
    let unit = arena.create(Kind::Tuple);
    let mut ty = arena.create_with_child(Kind::Type, unit);
    for _ in 0..1200 {
        let metatype = arena.create_with_child(Kind::Metatype, ty);
        ty = arena.create_with_child(Kind::Type, metatype);
    }
    assert_eq!(
        mangle_node(&arena, ty, ManglingFlavor::Default),
        Err(MangleError::BudgetExceeded {
            budget: Budget::Depth,
            limit: MAX_DEPTH,
        })
    );
}

// ── Observation and required decoding ───────────────────

#[test]
fn observer_counts_substitution_traffic() {
    #[derive(Default)]
    struct Counter {
        added: usize,
        reused: usize,
    }
    impl ManglingObserver for Counter {
        fn substitution_added(&mut self, _index: usize) {
            self.added += 1;
        }
        fn substitution_reused(&mut self, _index: usize) {
            self.reused += 1;
        }
    }

    let (arena, root) = decoded("4main3fooyyAA3BarCF");
    let mut counter = Counter::default();
    let output = mangle_node_with_observer(&arena, root, ManglingFlavor::Default, &mut counter);
    assert_eq!(output, Ok(String::from("$s4main3fooyyAA3BarCF")));
    assert_eq!(counter.added, 4);
    assert_eq!(counter.reused, 1);
}

#[test]
fn demangle_required_accepts_well_formed_output() {
    let demangled = demangle_required("$s4main3fooyyF");
    assert_eq!(demangled.arena.kind(demangled.root), Kind::Global);
    assert_eq!(demangled.flavor, ManglingFlavor::Default);
}

#[test]
#[should_panic(expected = "re-decoding mangler output")]
fn demangle_required_panics_on_garbage() {
    demangle_required("not a symbol");
}
