//! Property-based tests for the mangling round trip.
//!
//! These tests use proptest in three directions:
//! 1. Random entity trees in the decoder's canonical shape encode to a
//!    symbol that decodes back to a structurally equal tree.
//! 2. Encoding is stable: decode-then-encode of any produced symbol
//!    yields the same string again.
//! 3. Totality: arbitrary byte strings and arbitrary node trees may be
//!    rejected with an error, but must never panic.
//!
//! Deterministic deep-input tests at the end check that the hardening
//! budgets fire instead of exhausting the stack.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use kea_mangle::{
    demangle_symbol_as_node, demangle_symbol_as_string, demangle_type_as_node,
    has_native_calling_convention, is_thunk_symbol, mangle_node, render, strip_specialization,
    symbol_module, thunk_target, verify_round_trip, Budget, DemangleError, DemangleOptions, Kind,
    MangleError, ManglingFlavor, NodeArena, NodeId,
};
use proptest::prelude::*;

// -- Tree blueprints --

/// A type in the shape the decoder produces: every node wrapped in
/// `Kind::Type`, tuples made of `TupleElement` nodes, bound generics
/// carrying their base as a child type.
#[derive(Clone, Debug)]
enum TypeSpec {
    Nominal {
        module: String,
        path: Vec<(Kind, String)>,
    },
    Bound {
        module: String,
        name: String,
        kind: Kind,
        args: Vec<TypeSpec>,
    },
    Tuple(Vec<TypeSpec>),
    Function {
        throws: bool,
        is_async: bool,
        params: Vec<TypeSpec>,
        result: Box<TypeSpec>,
    },
    Metatype(Box<TypeSpec>),
}

/// A mangled global: a plain function or a storage entity.
///
/// `labels` mirrors the decoder's label-list contract: `None` for a
/// zero-parameter function, `Some(vec![])` for parameters that are all
/// unlabeled, otherwise one entry per parameter.
#[derive(Clone, Debug)]
enum EntitySpec {
    Function {
        module: String,
        name: String,
        labels: Option<Vec<Option<String>>>,
        throws: bool,
        is_async: bool,
        params: Vec<TypeSpec>,
        result: TypeSpec,
    },
    Storage {
        module: String,
        name: String,
        ty: TypeSpec,
        accessor: Option<Kind>,
        is_static: bool,
    },
}

// -- Tree construction --

fn build_type(arena: &mut NodeArena, spec: &TypeSpec) -> NodeId {
    match spec {
        TypeSpec::Nominal { module, path } => {
            let mut context = arena.create_with_text(Kind::Module, module.as_str());
            for (kind, name) in path {
                let ident = arena.create_with_text(Kind::Identifier, name.as_str());
                context = arena.create_with_children(*kind, [context, ident]);
            }
            arena.create_with_child(Kind::Type, context)
        }
        TypeSpec::Bound {
            module,
            name,
            kind,
            args,
        } => {
            let base = build_type(
                arena,
                &TypeSpec::Nominal {
                    module: module.clone(),
                    path: vec![(*kind, name.clone())],
                },
            );
            let mut arguments = Vec::new();
            for arg in args {
                arguments.push(build_type(arena, arg));
            }
            let list = arena.create_with_children(Kind::TypeList, arguments);
            let bound_kind = match kind {
                Kind::Enum => Kind::BoundGenericEnum,
                Kind::Class => Kind::BoundGenericClass,
                _ => Kind::BoundGenericStructure,
            };
            let bound = arena.create_with_children(bound_kind, [base, list]);
            arena.create_with_child(Kind::Type, bound)
        }
        TypeSpec::Tuple(elements) => {
            let mut ids = Vec::new();
            for element in elements {
                let ty = build_type(arena, element);
                ids.push(arena.create_with_child(Kind::TupleElement, ty));
            }
            let tuple = arena.create_with_children(Kind::Tuple, ids);
            arena.create_with_child(Kind::Type, tuple)
        }
        TypeSpec::Function {
            throws,
            is_async,
            params,
            result,
        } => {
            let function = build_function_type(arena, *throws, *is_async, params, result);
            arena.create_with_child(Kind::Type, function)
        }
        TypeSpec::Metatype(inner) => {
            let ty = build_type(arena, inner);
            let meta = arena.create_with_child(Kind::Metatype, ty);
            arena.create_with_child(Kind::Type, meta)
        }
    }
}

/// Builds a `FunctionType` node. A lone tuple parameter is wrapped in a
/// one-element argument tuple so that the parameter count stays one.
fn build_function_type(
    arena: &mut NodeArena,
    throws: bool,
    is_async: bool,
    params: &[TypeSpec],
    result: &TypeSpec,
) -> NodeId {
    let mut children = Vec::new();
    if throws {
        children.push(arena.create(Kind::ThrowsAnnotation));
    }
    if is_async {
        children.push(arena.create(Kind::AsyncAnnotation));
    }
    let arguments = match params {
        [] => {
            let tuple = arena.create(Kind::Tuple);
            arena.create_with_child(Kind::Type, tuple)
        }
        [only] => {
            let ty = build_type(arena, only);
            if matches!(only, TypeSpec::Tuple(_)) {
                let element = arena.create_with_child(Kind::TupleElement, ty);
                let tuple = arena.create_with_children(Kind::Tuple, [element]);
                arena.create_with_child(Kind::Type, tuple)
            } else {
                ty
            }
        }
        many => build_type(arena, &TypeSpec::Tuple(many.to_vec())),
    };
    children.push(arena.create_with_child(Kind::ArgumentTuple, arguments));
    let ret = build_type(arena, result);
    children.push(arena.create_with_child(Kind::ReturnType, ret));
    arena.create_with_children(Kind::FunctionType, children)
}

fn build_global(spec: &EntitySpec) -> (NodeArena, NodeId) {
    let mut arena = NodeArena::new();
    let entity = match spec {
        EntitySpec::Function {
            module,
            name,
            labels,
            throws,
            is_async,
            params,
            result,
        } => {
            let context = arena.create_with_text(Kind::Module, module.as_str());
            let decl_name = arena.create_with_text(Kind::Identifier, name.as_str());
            let mut children = vec![context, decl_name];
            if let Some(labels) = labels {
                let mut entries = Vec::new();
                for label in labels {
                    entries.push(match label {
                        Some(text) => arena.create_with_text(Kind::Identifier, text.as_str()),
                        None => arena.create(Kind::FirstElementMarker),
                    });
                }
                children.push(arena.create_with_children(Kind::LabelList, entries));
            }
            let function = build_function_type(&mut arena, *throws, *is_async, params, result);
            children.push(arena.create_with_child(Kind::Type, function));
            arena.create_with_children(Kind::Function, children)
        }
        EntitySpec::Storage {
            module,
            name,
            ty,
            accessor,
            is_static,
        } => {
            let context = arena.create_with_text(Kind::Module, module.as_str());
            let decl_name = arena.create_with_text(Kind::Identifier, name.as_str());
            let value_ty = build_type(&mut arena, ty);
            let variable =
                arena.create_with_children(Kind::Variable, [context, decl_name, value_ty]);
            let accessed = match accessor {
                Some(kind) => arena.create_with_child(*kind, variable),
                None => variable,
            };
            if *is_static {
                arena.create_with_child(Kind::Static, accessed)
            } else {
                accessed
            }
        }
    };
    let root = arena.create_with_child(Kind::Global, entity);
    (arena, root)
}

// -- Generation strategies --

/// Generate a declaration name: usually plain ASCII, occasionally a
/// name that needs the Punycode escape.
fn identifier_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        6 => prop::string::string_regex("[a-z][A-Za-z0-9]{0,11}").expect("valid regex"),
        2 => prop::string::string_regex("[A-Z][A-Za-z0-9_]{0,11}").expect("valid regex"),
        1 => prop_oneof![
            Just("café".to_string()),
            Just("übung".to_string()),
            Just("名前".to_string()),
        ],
    ]
}

fn module_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][A-Za-z0-9]{0,9}").expect("valid regex")
}

fn nominal_kind_strategy() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::Structure),
        Just(Kind::Enum),
        Just(Kind::Class),
    ]
}

/// Generate a type, recursing up to `depth` levels below the root.
fn type_spec_strategy(depth: u32) -> BoxedStrategy<TypeSpec> {
    let standard = |name: &str| TypeSpec::Nominal {
        module: "Kea".to_string(),
        path: vec![(Kind::Structure, name.to_string())],
    };
    let leaf = prop_oneof![
        2 => prop_oneof![
            Just(standard("Int")),
            Just(standard("Bool")),
            Just(standard("String")),
            Just(standard("Double")),
        ],
        3 => (
            module_strategy(),
            prop::collection::vec((nominal_kind_strategy(), identifier_strategy()), 1..=2),
        )
            .prop_map(|(module, path)| TypeSpec::Nominal { module, path }),
    ];
    if depth == 0 {
        return leaf.boxed();
    }
    let inner = type_spec_strategy(depth - 1);
    prop_oneof![
        4 => leaf,
        2 => prop::collection::vec(inner.clone(), 0..4).prop_map(TypeSpec::Tuple),
        1 => inner.clone().prop_map(|arg| TypeSpec::Bound {
            module: "Kea".to_string(),
            name: "Optional".to_string(),
            kind: Kind::Enum,
            args: vec![arg],
        }),
        1 => (
            module_strategy(),
            identifier_strategy(),
            nominal_kind_strategy(),
            prop::collection::vec(inner.clone(), 1..=2),
        )
            .prop_map(|(module, name, kind, args)| TypeSpec::Bound { module, name, kind, args }),
        1 => (
            any::<bool>(),
            any::<bool>(),
            prop::collection::vec(inner.clone(), 0..3),
            inner.clone(),
        )
            .prop_map(|(throws, is_async, params, result)| TypeSpec::Function {
                throws,
                is_async,
                params,
                result: Box::new(result),
            }),
        1 => inner.prop_map(|ty| TypeSpec::Metatype(Box::new(ty))),
    ]
    .boxed()
}

/// Generate a label list matching a parameter count.
fn labels_strategy(count: usize) -> BoxedStrategy<Option<Vec<Option<String>>>> {
    if count == 0 {
        return Just(None).boxed();
    }
    prop_oneof![
        1 => Just(Some(Vec::new())),
        3 => prop::collection::vec(prop::option::of(identifier_strategy()), count..=count)
            .prop_map(Some),
    ]
    .boxed()
}

fn function_entity_strategy() -> impl Strategy<Value = EntitySpec> {
    (
        module_strategy(),
        identifier_strategy(),
        prop::collection::vec(type_spec_strategy(2), 0..4),
        type_spec_strategy(2),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_flat_map(|(module, name, params, result, throws, is_async)| {
            let labels = labels_strategy(params.len());
            (
                Just(module),
                Just(name),
                Just(params),
                Just(result),
                Just(throws),
                Just(is_async),
                labels,
            )
        })
        .prop_map(
            |(module, name, params, result, throws, is_async, labels)| EntitySpec::Function {
                module,
                name,
                labels,
                throws,
                is_async,
                params,
                result,
            },
        )
}

fn storage_entity_strategy() -> impl Strategy<Value = EntitySpec> {
    (
        module_strategy(),
        identifier_strategy(),
        type_spec_strategy(2),
        prop_oneof![
            2 => Just(None),
            1 => Just(Some(Kind::Getter)),
            1 => Just(Some(Kind::Setter)),
        ],
        any::<bool>(),
    )
        .prop_map(|(module, name, ty, accessor, is_static)| EntitySpec::Storage {
            module,
            name,
            ty,
            accessor,
            is_static,
        })
}

fn entity_strategy() -> impl Strategy<Value = EntitySpec> {
    prop_oneof![
        3 => function_entity_strategy(),
        1 => storage_entity_strategy(),
    ]
}

fn flavor_strategy() -> impl Strategy<Value = ManglingFlavor> {
    prop_oneof![
        Just(ManglingFlavor::Default),
        Just(ManglingFlavor::Embedded),
    ]
}

// -- Round-trip properties --

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    /// Encoding a canonical tree and decoding the result reproduces the
    /// tree, bit for bit in structure, under either flavor.
    #[test]
    fn prop_entity_trees_round_trip(spec in entity_strategy(), flavor in flavor_strategy()) {
        let (arena, root) = build_global(&spec);
        let mangled = match mangle_node(&arena, root, flavor) {
            Ok(mangled) => mangled,
            Err(err) => return Err(TestCaseError::fail(format!(
                "failed to mangle {}: {err}",
                arena.dump(root)
            ))),
        };
        let decoded = match demangle_symbol_as_node(&mangled) {
            Ok(decoded) => decoded,
            Err(err) => return Err(TestCaseError::fail(format!(
                "failed to demangle {mangled}: {err}"
            ))),
        };
        prop_assert_eq!(decoded.flavor, flavor, "flavor changed for {}", &mangled);
        prop_assert!(
            arena.structural_eq(root, &decoded.arena, decoded.root),
            "round trip changed the tree for {}:\n{}\nbecame\n{}",
            &mangled,
            arena.dump(root),
            decoded.arena.dump(decoded.root)
        );
    }

    /// The encoder is a fixed point of decode-then-encode.
    #[test]
    fn prop_remangling_is_stable(spec in entity_strategy(), flavor in flavor_strategy()) {
        let (arena, root) = build_global(&spec);
        let first = match mangle_node(&arena, root, flavor) {
            Ok(first) => first,
            Err(err) => return Err(TestCaseError::fail(format!(
                "failed to mangle {}: {err}",
                arena.dump(root)
            ))),
        };
        let decoded = match demangle_symbol_as_node(&first) {
            Ok(decoded) => decoded,
            Err(err) => return Err(TestCaseError::fail(format!(
                "failed to demangle {first}: {err}"
            ))),
        };
        let second = match mangle_node(&decoded.arena, decoded.root, decoded.flavor) {
            Ok(second) => second,
            Err(err) => return Err(TestCaseError::fail(format!(
                "failed to remangle {first}: {err}"
            ))),
        };
        prop_assert_eq!(&first, &second, "remangling drifted");
        prop_assert!(verify_round_trip(&arena, root, flavor).is_ok());
    }

    /// Every canonical entity tree has a display form.
    #[test]
    fn prop_entity_trees_have_a_display(spec in entity_strategy()) {
        let (arena, root) = build_global(&spec);
        let options = DemangleOptions::default();
        prop_assert!(
            render(&arena, root, &options).is_some(),
            "no display for\n{}",
            arena.dump(root)
        );
    }
}

// -- Totality under fuzzing --

/// Kinds mixed freely into nonsense trees for the encoder.
fn scrap_kind_strategy() -> impl Strategy<Value = Kind> {
    prop::sample::select(vec![
        Kind::Global,
        Kind::Type,
        Kind::Tuple,
        Kind::TupleElement,
        Kind::Identifier,
        Kind::Module,
        Kind::Function,
        Kind::Variable,
        Kind::Structure,
        Kind::Enum,
        Kind::Protocol,
        Kind::LabelList,
        Kind::FirstElementMarker,
        Kind::EmptyList,
        Kind::FunctionType,
        Kind::ArgumentTuple,
        Kind::ReturnType,
        Kind::Static,
        Kind::Getter,
        Kind::Metatype,
        Kind::BoundGenericStructure,
        Kind::TypeList,
        Kind::Number,
        Kind::ValueWitness,
        Kind::Allocator,
        Kind::ProtocolWitness,
    ])
}

#[derive(Clone, Debug)]
enum ScrapPayload {
    None,
    Index(u64),
    Text(String),
}

fn scrap_node_strategy() -> impl Strategy<Value = (Kind, ScrapPayload, usize)> {
    (
        scrap_kind_strategy(),
        prop_oneof![
            2 => Just(ScrapPayload::None),
            1 => (0u64..64).prop_map(ScrapPayload::Index),
            1 => prop::string::string_regex("[a-z]{1,6}")
                .expect("valid regex")
                .prop_map(ScrapPayload::Text),
        ],
        0usize..3,
    )
}

/// Folds a node list into a tree, bottom up, children drawn from the
/// already-built suffix.
fn build_scrap(nodes: &[(Kind, ScrapPayload, usize)]) -> Option<(NodeArena, NodeId)> {
    let mut arena = NodeArena::new();
    let mut stack: Vec<NodeId> = Vec::new();
    for (kind, payload, arity) in nodes {
        let id = match payload {
            ScrapPayload::None => arena.create(*kind),
            ScrapPayload::Index(index) => arena.create_with_index(*kind, *index),
            ScrapPayload::Text(text) => arena.create_with_text(*kind, text.as_str()),
        };
        let take = (*arity).min(stack.len());
        for child in stack.split_off(stack.len() - take) {
            arena.add_child(id, child);
        }
        stack.push(id);
    }
    let root = stack.pop()?;
    Some((arena, root))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    /// The decoder and the classifiers accept any string without
    /// panicking, mangled or not.
    #[test]
    fn prop_decoder_is_total(input in "[ -~]{0,200}") {
        let _ = demangle_symbol_as_node(&input);
        let _ = demangle_type_as_node(&input);
        let _ = demangle_symbol_as_string(&input, &DemangleOptions::default());
        let _ = is_thunk_symbol(&input);
        let _ = thunk_target(&input);
        let _ = symbol_module(&input);
        let _ = has_native_calling_convention(&input);
        let _ = strip_specialization(&input);
    }

    /// Same, for inputs that pass the prefix check and exercise the
    /// grammar proper.
    #[test]
    fn prop_decoder_is_total_on_prefixed_input(payload in "[A-Za-z0-9_]{0,384}") {
        for prefix in ["$s", "$e", "_T0", "_Tt", "_T"] {
            let symbol = format!("{prefix}{payload}");
            let _ = demangle_symbol_as_node(&symbol);
            let _ = demangle_symbol_as_string(&symbol, &DemangleOptions::default());
            let _ = symbol_module(&symbol);
        }
    }

    /// The encoder rejects nonsense trees with an error, never a panic.
    #[test]
    fn prop_encoder_is_total_on_scrap_trees(
        nodes in prop::collection::vec(scrap_node_strategy(), 1..24)
    ) {
        let Some((arena, root)) = build_scrap(&nodes) else {
            return Ok(());
        };
        if let Ok(mangled) = mangle_node(&arena, root, ManglingFlavor::Default) {
            let _ = demangle_symbol_as_node(&mangled);
        }
    }

    /// Nesting operators repeated past any plausible tree depth hit the
    /// depth budget rather than the stack.
    #[test]
    fn prop_deep_nesting_is_rejected(depth in 1100usize..6000) {
        let symbol = format!("$sSi{}", "m".repeat(depth));
        prop_assert_eq!(
            match demangle_symbol_as_node(&symbol) {
                Err(DemangleError::BudgetExceeded { budget, .. }) => Some(budget),
                _ => None,
            },
            Some(Budget::Depth)
        );
    }
}

// -- Deterministic budget checks --

#[test]
fn optional_chains_past_the_depth_budget_fail_cleanly() {
    let symbol = format!("$sSi{}", "Sg".repeat(8000));
    assert!(matches!(
        demangle_symbol_as_node(&symbol),
        Err(DemangleError::BudgetExceeded {
            budget: Budget::Depth,
            ..
        })
    ));
}

#[test]
fn tuple_wrapping_past_the_depth_budget_fails_cleanly() {
    let symbol = format!("$sSi{}", "_t".repeat(6000));
    assert!(matches!(
        demangle_symbol_as_node(&symbol),
        Err(DemangleError::BudgetExceeded {
            budget: Budget::Depth,
            ..
        })
    ));
}

#[test]
fn encoding_a_very_deep_tree_fails_cleanly() {
    let mut arena = NodeArena::new();
    let module = arena.create_with_text(Kind::Module, "Kea");
    let name = arena.create_with_text(Kind::Identifier, "Int");
    let nominal = arena.create_with_children(Kind::Structure, [module, name]);
    let mut ty = arena.create_with_child(Kind::Type, nominal);
    for _ in 0..4000 {
        let meta = arena.create_with_child(Kind::Metatype, ty);
        ty = arena.create_with_child(Kind::Type, meta);
    }
    let global = arena.create_with_child(Kind::Global, ty);
    assert!(matches!(
        mangle_node(&arena, global, ManglingFlavor::Default),
        Err(MangleError::BudgetExceeded {
            budget: Budget::Depth,
            ..
        })
    ));
}

#[test]
fn a_64k_substitution_run_is_rejected_without_panicking() {
    let symbol = format!("$s{}", "A".repeat(65534));
    assert!(demangle_symbol_as_node(&symbol).is_err());
}

#[test]
fn a_64k_digit_run_is_rejected_without_panicking() {
    let symbol = format!("$s{}", "9".repeat(65534));
    assert!(demangle_symbol_as_node(&symbol).is_err());
}
