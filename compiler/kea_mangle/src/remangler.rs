//! Tree-to-text encoding: turning demangle trees back into symbols.
//!
//! The encoder replays the decoder's grammar in reverse. Children are
//! emitted in the order the decoder popped them, and a substitution is
//! recorded at exactly the points the decoder records one, so
//! back-references land on the same indices in both directions.
//! Decoding a symbol and re-encoding the tree reproduces the input
//! byte for byte, up to a handful of spellings the encoder
//! canonicalizes: `Sg` for a standard-library optional, `x`/`z` for
//! depth-zero generic parameters, `l` for a one-parameter signature,
//! and `y` for an empty parameter tuple.
//!
//! [`mangle_node`] checks that property on every successful encode in
//! debug builds and panics on a mismatch. [`verify_round_trip`] makes
//! the same check available as a plain `Result` for callers that want
//! it in release builds too.

use smallvec::SmallVec;

use crate::demangler::{self, MAX_BUILTIN_WIDTH, MAX_DEPTH};
use crate::error::{Budget, MangleError};
use crate::flavor::ManglingFlavor;
use crate::kind::{func_spec, Kind, VALUE_WITNESSES};
use crate::mangler::{Mangler, ManglingObserver};
use crate::node::{NodeArena, NodeId};
use crate::substitution;
use crate::text;

/// Encodes `node` as a complete symbol in the given flavor.
///
/// A `Global` root is emitted with the flavor's prefix; any other root
/// is emitted as a bare type mangling. In debug builds the output is
/// re-decoded and re-encoded before being returned, and any difference
/// panics: that only happens on an encoder or decoder bug, or on a
/// hand-built tree whose shape the grammar cannot express.
pub fn mangle_node(
    arena: &NodeArena,
    node: NodeId,
    flavor: ManglingFlavor,
) -> Result<String, MangleError> {
    let mut writer = Mangler::new();
    mangle_verified(arena, node, flavor, &mut writer)
}

/// Like [`mangle_node`], reporting substitution traffic to `observer`.
pub fn mangle_node_with_observer(
    arena: &NodeArena,
    node: NodeId,
    flavor: ManglingFlavor,
    observer: &mut dyn ManglingObserver,
) -> Result<String, MangleError> {
    let mut writer = Mangler::with_observer(observer);
    mangle_verified(arena, node, flavor, &mut writer)
}

/// Encodes `node`, re-decodes the output, re-encodes the decoded tree
/// and reports any difference as [`MangleError::RoundTrip`].
///
/// [`mangle_node`] runs this automatically in debug builds; release
/// callers that still want the guarantee call it directly.
pub fn verify_round_trip(
    arena: &NodeArena,
    node: NodeId,
    flavor: ManglingFlavor,
) -> Result<(), MangleError> {
    let mut writer = Mangler::new();
    let output = mangle_with(arena, node, flavor, &mut writer)?;
    round_trip(arena, node, flavor, &output)
}

/// Decodes a symbol this crate's encoders produced, panicking on any
/// failure.
///
/// Only for verifying mangler output; untrusted input goes through
/// [`crate::demangle_symbol_as_node`] and handles the error.
pub fn demangle_required(symbol: &str) -> crate::Demangled {
    match crate::demangle_symbol_as_node(symbol) {
        Ok(demangled) => demangled,
        Err(error) => panic!("re-decoding mangler output {symbol:?} failed: {error}"),
    }
}

fn mangle_verified(
    arena: &NodeArena,
    node: NodeId,
    flavor: ManglingFlavor,
    writer: &mut Mangler<'_>,
) -> Result<String, MangleError> {
    let output = mangle_with(arena, node, flavor, writer)?;
    #[cfg(debug_assertions)]
    if let Err(error) = round_trip(arena, node, flavor, &output) {
        panic!("{error}");
    }
    Ok(output)
}

fn mangle_with(
    arena: &NodeArena,
    node: NodeId,
    flavor: ManglingFlavor,
    writer: &mut Mangler<'_>,
) -> Result<String, MangleError> {
    writer.begin_mangling();
    let mut remangler = Remangler {
        arena,
        writer: &mut *writer,
        flavor,
        depth: 0,
    };
    remangler.mangle(node)?;
    Ok(writer.finalize())
}

fn round_trip(
    arena: &NodeArena,
    node: NodeId,
    flavor: ManglingFlavor,
    output: &str,
) -> Result<(), MangleError> {
    let mut fresh = NodeArena::new();
    let decoded = if arena.kind(node) == Kind::Global {
        let payload = output.strip_prefix(flavor.prefix()).unwrap_or(output);
        demangler::demangle_global(&mut fresh, payload)
    } else {
        demangler::demangle_type(&mut fresh, output)
    };
    let root = match decoded {
        Ok(root) => root,
        Err(error) => {
            return Err(MangleError::RoundTrip {
                original: output.to_owned(),
                remangled: format!("<undecodable: {error}>"),
            });
        }
    };
    let mut writer = Mangler::new();
    let remangled = mangle_with(&fresh, root, flavor, &mut writer)?;
    if remangled != output {
        return Err(MangleError::RoundTrip {
            original: output.to_owned(),
            remangled,
        });
    }
    Ok(())
}

fn no_production(kind: &'static str) -> MangleError {
    MangleError::UnsupportedNodeKind { kind }
}

fn impl_callee_letter(text: &str) -> Option<&'static str> {
    Some(match text {
        "@callee_unowned" => "y",
        "@callee_guaranteed" => "g",
        "@callee_owned" => "x",
        "@convention(thin)" => "t",
        _ => return None,
    })
}

fn impl_parameter_letter(text: &str) -> Option<&'static str> {
    Some(match text {
        "@in" => "i",
        "@inout" => "l",
        "@in_guaranteed" => "n",
        "@owned" => "x",
        "@guaranteed" => "g",
        "@unowned" => "d",
        _ => return None,
    })
}

fn impl_result_letter(text: &str) -> Option<&'static str> {
    Some(match text {
        "@out" => "r",
        "@owned" => "o",
        "@unowned" => "d",
        "@autoreleased" => "a",
        _ => return None,
    })
}

struct Remangler<'a, 'm, 'o> {
    arena: &'a NodeArena,
    writer: &'m mut Mangler<'o>,
    flavor: ManglingFlavor,
    depth: usize,
}

impl<'a> Remangler<'a, '_, '_> {
    fn malformed(&self, detail: &'static str) -> MangleError {
        MangleError::MalformedTree { detail }
    }

    fn child(&self, node: NodeId, position: usize) -> Result<NodeId, MangleError> {
        self.arena
            .child(node, position)
            .ok_or(MangleError::MalformedTree {
                detail: "a production is missing an operand",
            })
    }

    fn text_of(&self, node: NodeId) -> Result<&'a str, MangleError> {
        self.arena.text(node).ok_or(MangleError::MalformedTree {
            detail: "a text payload is missing",
        })
    }

    fn index_of(&self, node: NodeId) -> Result<u64, MangleError> {
        self.arena.index(node).ok_or(MangleError::MalformedTree {
            detail: "an index payload is missing",
        })
    }

    fn mangle(&mut self, node: NodeId) -> Result<(), MangleError> {
        if self.depth >= MAX_DEPTH {
            return Err(MangleError::BudgetExceeded {
                budget: Budget::Depth,
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let result = self.mangle_any(node);
        self.depth -= 1;
        result
    }

    fn mangle_any(&mut self, node: NodeId) -> Result<(), MangleError> {
        match self.arena.kind(node) {
            // Structure
            Kind::Global => self.mangle_global(node),
            Kind::Type => {
                let inner = self.child(node, 0)?;
                self.mangle(inner)
            }
            Kind::TypeMangling => {
                let ty = self.child(node, 0)?;
                self.mangle(ty)?;
                self.writer.append_operator("D");
                Ok(())
            }
            Kind::TypeList => self.mangle_type_list(node),
            Kind::EmptyList => {
                self.writer.append_operator("y");
                Ok(())
            }
            Kind::FirstElementMarker => {
                self.writer.append_operator("_");
                Ok(())
            }
            Kind::VariadicMarker => {
                self.writer.append_operator("d");
                Ok(())
            }
            Kind::Index => Err(no_production("Index")),
            Kind::Number => Err(no_production("Number")),

            // Names
            Kind::Identifier | Kind::TupleElementName => self.mangle_identifier_text(node),
            Kind::LocalDeclName => {
                let number = self.child(node, 0)?;
                let name = self.child(node, 1)?;
                self.mangle(name)?;
                self.writer.append_operator("L");
                let position = self.index_of(number)?;
                self.writer.append_index(position);
                Ok(())
            }
            Kind::PrivateDeclName => {
                if let Some(name) = self.arena.child(node, 1) {
                    let discriminator = self.child(node, 0)?;
                    self.mangle(name)?;
                    self.mangle(discriminator)?;
                    self.writer.append_operator("LL");
                } else {
                    let discriminator = self.child(node, 0)?;
                    self.mangle(discriminator)?;
                    self.writer.append_operator("Ll");
                }
                Ok(())
            }
            Kind::PrefixOperator => self.mangle_operator_name(node, "op"),
            Kind::InfixOperator => self.mangle_operator_name(node, "oi"),
            Kind::PostfixOperator => self.mangle_operator_name(node, "oP"),

            // Contexts
            Kind::Module => self.mangle_module(node),
            Kind::Class => self.mangle_nominal(node, "C"),
            Kind::Structure => self.mangle_nominal(node, "V"),
            Kind::Enum => self.mangle_nominal(node, "O"),
            Kind::Protocol => self.mangle_nominal(node, "P"),
            Kind::TypeAlias => self.mangle_nominal(node, "a"),
            Kind::Extension => {
                let module = self.child(node, 0)?;
                let extended = self.child(node, 1)?;
                self.mangle(extended)?;
                self.mangle(module)?;
                if let Some(signature) = self.arena.child(node, 2) {
                    self.mangle(signature)?;
                }
                self.writer.append_operator("E");
                Ok(())
            }

            // Entities
            Kind::Function => self.mangle_function(node),
            Kind::Variable | Kind::Subscript => self.mangle_storage(node, "p"),
            Kind::Getter => self.mangle_accessor(node, "g"),
            Kind::Setter => self.mangle_accessor(node, "s"),
            Kind::ReadAccessor => self.mangle_accessor(node, "r"),
            Kind::ModifyAccessor => self.mangle_accessor(node, "M"),
            Kind::WillSet => self.mangle_accessor(node, "w"),
            Kind::DidSet => self.mangle_accessor(node, "W"),
            Kind::Constructor => self.mangle_initializer(node, "fc"),
            Kind::Allocator => self.mangle_initializer(node, "fC"),
            Kind::Destructor => {
                let context = self.child(node, 0)?;
                self.mangle(context)?;
                self.writer.append_operator("fd");
                Ok(())
            }
            Kind::Deallocator => {
                let context = self.child(node, 0)?;
                self.mangle(context)?;
                self.writer.append_operator("fD");
                Ok(())
            }
            Kind::Static => {
                let entity = self.child(node, 0)?;
                self.mangle(entity)?;
                self.writer.append_operator("Z");
                Ok(())
            }
            Kind::ExplicitClosure => self.mangle_closure(node, "fU"),
            Kind::ImplicitClosure => self.mangle_closure(node, "fu"),
            Kind::DefaultArgumentInitializer => {
                let context = self.child(node, 0)?;
                let number = self.child(node, 1)?;
                self.mangle(context)?;
                self.writer.append_operator("fA");
                let position = self.index_of(number)?;
                self.writer.append_index(position);
                Ok(())
            }
            Kind::LabelList => self.mangle_label_list(node),

            // Types
            Kind::FunctionType => {
                self.mangle_function_signature(node)?;
                self.writer.append_operator("c");
                Ok(())
            }
            Kind::ArgumentTuple => Err(no_production("ArgumentTuple")),
            Kind::ReturnType => Err(no_production("ReturnType")),
            Kind::Tuple => self.mangle_tuple(node),
            Kind::TupleElement => self.mangle_tuple_element(node),
            Kind::Metatype => {
                let ty = self.child(node, 0)?;
                self.mangle(ty)?;
                self.writer.append_operator("m");
                Ok(())
            }
            Kind::InOut => self.mangle_type_attribute(node, "z"),
            Kind::Shared => self.mangle_type_attribute(node, "h"),
            Kind::Owned => self.mangle_type_attribute(node, "n"),
            Kind::Weak => self.mangle_type_attribute(node, "Xw"),
            Kind::Unowned => self.mangle_type_attribute(node, "Xo"),
            Kind::Unmanaged => self.mangle_type_attribute(node, "Xu"),
            Kind::ProtocolList => self.mangle_protocol_list(node),
            Kind::BoundGenericClass
            | Kind::BoundGenericStructure
            | Kind::BoundGenericEnum
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericTypeAlias => self.mangle_bound_generic(node),
            Kind::BuiltinTypeName => {
                let name = self.text_of(node)?;
                self.mangle_builtin(name)
            }
            Kind::AsyncAnnotation => {
                self.writer.append_operator("Ya");
                Ok(())
            }
            Kind::ThrowsAnnotation => {
                self.writer.append_operator("K");
                Ok(())
            }
            Kind::ConcurrentFunctionType => {
                self.writer.append_operator("Yb");
                Ok(())
            }

            // Generics
            Kind::DependentGenericSignature => self.mangle_generic_signature(node),
            Kind::DependentGenericParamCount => Err(no_production("DependentGenericParamCount")),
            Kind::DependentGenericParamType => {
                let (depth, index) = self.param_indices(node)?;
                if depth == 0 && index == 0 {
                    self.writer.append_operator("x");
                } else {
                    self.writer.append_operator("q");
                    self.append_generic_param(depth, index);
                }
                Ok(())
            }
            Kind::DependentGenericType => {
                let signature = self.child(node, 0)?;
                let ty = self.child(node, 1)?;
                self.mangle(ty)?;
                self.mangle(signature)?;
                self.writer.append_operator("u");
                Ok(())
            }
            Kind::DependentGenericConformanceRequirement => {
                let constrained = self.child(node, 0)?;
                let protocol = self.child(node, 1)?;
                self.mangle_protocol_operand(protocol)?;
                match self.constrained_param(constrained) {
                    Some((depth, index)) => {
                        self.writer.append_operator("R");
                        self.append_generic_param(depth, index);
                    }
                    None => {
                        self.mangle(constrained)?;
                        self.writer.append_operator("Rp");
                    }
                }
                Ok(())
            }
            Kind::DependentGenericSameTypeRequirement => {
                let constrained = self.child(node, 0)?;
                let other = self.child(node, 1)?;
                self.mangle(other)?;
                match self.constrained_param(constrained) {
                    Some((depth, index)) => {
                        self.writer.append_operator("Rs");
                        self.append_generic_param(depth, index);
                    }
                    None => {
                        self.mangle(constrained)?;
                        self.writer.append_operator("Rt");
                    }
                }
                Ok(())
            }
            Kind::DependentGenericBaseClassRequirement => {
                let constrained = self.child(node, 0)?;
                let base = self.child(node, 1)?;
                self.mangle(base)?;
                let Some((depth, index)) = self.constrained_param(constrained) else {
                    return Err(self.malformed("a base-class constraint operand"));
                };
                self.writer.append_operator("Rb");
                self.append_generic_param(depth, index);
                Ok(())
            }
            Kind::DependentGenericLayoutRequirement => {
                let constrained = self.child(node, 0)?;
                let code = self.child(node, 1)?;
                let Some((depth, index)) = self.constrained_param(constrained) else {
                    return Err(self.malformed("a layout constraint operand"));
                };
                self.writer.append_operator("Rl");
                self.append_generic_param(depth, index);
                let text = self.text_of(code)?;
                if !matches!(text, "C" | "D" | "T") {
                    return Err(self.malformed("a layout constraint code"));
                }
                self.writer.append_operator(text);
                Ok(())
            }
            Kind::DependentMemberType => self.mangle_dependent_member(node),
            Kind::DependentAssociatedTypeRef => {
                let name = self.child(node, 0)?;
                self.mangle_identifier_text(name)?;
                if let Some(protocol) = self.arena.child(node, 1) {
                    self.mangle(protocol)?;
                }
                Ok(())
            }

            // Lowered function types
            Kind::ImplFunctionType => self.mangle_impl_function(node),
            Kind::ImplParameter => Err(no_production("ImplParameter")),
            Kind::ImplResult => Err(no_production("ImplResult")),
            Kind::ImplConvention => Err(no_production("ImplConvention")),
            Kind::ImplEscaping => Err(no_production("ImplEscaping")),

            // Metadata and witnesses
            Kind::TypeMetadata => self.mangle_with_popped_type(node, "N"),
            Kind::TypeMetadataAccessFunction => self.mangle_with_popped_type(node, "Ma"),
            Kind::NominalTypeDescriptor => self.mangle_with_popped_type(node, "Mn"),
            Kind::ClassMetadataBaseOffset => self.mangle_with_popped_type(node, "Mo"),
            Kind::FullTypeMetadata => self.mangle_with_popped_type(node, "Mf"),
            Kind::TypeMetadataLazyCache => self.mangle_with_popped_type(node, "ML"),
            Kind::Metaclass => self.mangle_with_popped_type(node, "Mm"),
            Kind::ProtocolConformance => self.mangle_protocol_conformance(node),
            Kind::ProtocolConformanceDescriptor => self.mangle_with_popped_type(node, "Mc"),
            Kind::ProtocolWitnessTable => self.mangle_with_popped_type(node, "WP"),
            Kind::ProtocolWitnessTableAccessor => self.mangle_with_popped_type(node, "Wa"),
            Kind::GenericProtocolWitnessTable => self.mangle_with_popped_type(node, "WG"),
            Kind::GenericProtocolWitnessTableInstantiationFunction => {
                self.mangle_with_popped_type(node, "WI")
            }
            Kind::LazyProtocolWitnessTableAccessor => {
                let ty = self.child(node, 0)?;
                let conformance = self.child(node, 1)?;
                self.mangle(conformance)?;
                self.mangle(ty)?;
                self.writer.append_operator("Wl");
                Ok(())
            }
            Kind::LazyProtocolWitnessTableCacheVariable => {
                let ty = self.child(node, 0)?;
                let conformance = self.child(node, 1)?;
                self.mangle(conformance)?;
                self.mangle(ty)?;
                self.writer.append_operator("WL");
                Ok(())
            }
            Kind::BaseWitnessTableAccessor => {
                let conformance = self.child(node, 0)?;
                let protocol_ty = self.child(node, 1)?;
                self.mangle(conformance)?;
                self.mangle(protocol_ty)?;
                self.writer.append_operator("Wb");
                Ok(())
            }
            Kind::ValueWitness => {
                let ty = self.child(node, 0)?;
                self.mangle(ty)?;
                let ordinal = self.index_of(node)?;
                let code = usize::try_from(ordinal)
                    .ok()
                    .and_then(|position| VALUE_WITNESSES.get(position))
                    .map(|&(wire, _)| wire)
                    .ok_or_else(|| self.malformed("a value witness ordinal"))?;
                self.writer.append_operator("w");
                self.writer.append_operator(code);
                Ok(())
            }
            Kind::ValueWitnessTable => self.mangle_with_popped_type(node, "WV"),
            Kind::FieldOffset => {
                let directness = self.child(node, 0)?;
                let entity = self.child(node, 1)?;
                self.mangle(entity)?;
                self.writer.append_operator("Wv");
                match self.index_of(directness)? {
                    0 => self.writer.append_operator("d"),
                    1 => self.writer.append_operator("i"),
                    _ => return Err(self.malformed("a field-offset directness")),
                }
                Ok(())
            }
            Kind::Directness => Err(no_production("Directness")),
            Kind::EnumCase => self.mangle_with_popped_type(node, "WC"),

            // Thunks
            Kind::ObjCAttribute => {
                self.writer.append_operator("To");
                Ok(())
            }
            Kind::NonObjCAttribute => {
                self.writer.append_operator("TO");
                Ok(())
            }
            Kind::DynamicAttribute => {
                self.writer.append_operator("TD");
                Ok(())
            }
            Kind::DirectMethodReferenceAttribute => {
                self.writer.append_operator("Td");
                Ok(())
            }
            Kind::MergedFunction => {
                self.writer.append_operator("Tm");
                Ok(())
            }
            Kind::PartialApplyForwarder => self.mangle_partial_apply(node, "TA"),
            Kind::PartialApplyObjCForwarder => self.mangle_partial_apply(node, "Ta"),
            Kind::ReabstractionThunk => self.mangle_reabstraction(node, "Tr"),
            Kind::ReabstractionThunkHelper => self.mangle_reabstraction(node, "TR"),
            Kind::ProtocolWitness => {
                let conformance = self.child(node, 0)?;
                let entity = self.child(node, 1)?;
                self.mangle(conformance)?;
                self.mangle(entity)?;
                self.writer.append_operator("TW");
                Ok(())
            }
            Kind::DispatchThunk => self.mangle_with_popped_type(node, "Tj"),
            Kind::MethodDescriptor => self.mangle_with_popped_type(node, "Tq"),

            // Specializations
            Kind::GenericSpecialization => self.mangle_generic_specialization(node, "Tg"),
            Kind::GenericSpecializationNotReAbstracted => {
                self.mangle_generic_specialization(node, "TG")
            }
            Kind::GenericSpecializationPrespecialized => {
                self.mangle_generic_specialization(node, "Ts")
            }
            Kind::GenericPartialSpecialization => self.mangle_generic_specialization(node, "Tp"),
            Kind::GenericPartialSpecializationNotReAbstracted => {
                self.mangle_generic_specialization(node, "TP")
            }
            Kind::GenericSpecializationParam => Err(no_production("GenericSpecializationParam")),
            Kind::FunctionSignatureSpecialization => self.mangle_function_specialization(node),
            Kind::FunctionSignatureSpecializationParam => {
                Err(no_production("FunctionSignatureSpecializationParam"))
            }
            Kind::FunctionSignatureSpecializationParamKind => {
                Err(no_production("FunctionSignatureSpecializationParamKind"))
            }
            Kind::FunctionSignatureSpecializationParamPayload => {
                Err(no_production("FunctionSignatureSpecializationParamPayload"))
            }
            Kind::FunctionSignatureSpecializationReturn => {
                Err(no_production("FunctionSignatureSpecializationReturn"))
            }
            Kind::SpecializationPassID => Err(no_production("SpecializationPassID")),
            Kind::IsSerialized => Err(no_production("IsSerialized")),
        }
    }

    // -- Global assembly --

    fn mangle_global(&mut self, node: NodeId) -> Result<(), MangleError> {
        self.writer.append_operator(self.flavor.prefix());
        self.mangle_global_members(node)
    }

    /// Members lead, suffix attributes trail. The decoder pops the
    /// attributes off first and stores them ahead of the members, so a
    /// run of attribute children is flushed in reverse right after the
    /// member that follows it. Partial-apply forwarders adopt their
    /// sub-symbol with the same layout.
    fn mangle_global_members(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let mut pending = 0usize;
        for (position, &child) in children.iter().enumerate() {
            let kind = arena.kind(child);
            let deferred = kind.is_function_attribute()
                && !matches!(
                    kind,
                    Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder
                );
            if deferred {
                pending += 1;
                continue;
            }
            self.mangle(child)?;
            for &attribute in children[position - pending..position].iter().rev() {
                self.mangle(attribute)?;
            }
            pending = 0;
        }
        let trailing = children.len() - pending;
        for &attribute in children[trailing..].iter().rev() {
            self.mangle(attribute)?;
        }
        Ok(())
    }

    // -- Names --

    /// Emits a name, reusing an earlier textual mention when one
    /// exists. Every fresh spelling becomes a table entry, mirroring
    /// the decoder registering every identifier it reads.
    fn mangle_identifier_text(&mut self, node: NodeId) -> Result<(), MangleError> {
        if self.writer.try_substitution(self.arena, node, true) {
            return Ok(());
        }
        let text = self.text_of(node)?;
        self.writer.append_identifier(text)?;
        self.writer.add_substitution(self.arena, node, true);
        Ok(())
    }

    /// Operator names spell each symbol character as a lowercase
    /// letter; the fixity operator stays outside the substitution.
    fn mangle_operator_name(&mut self, node: NodeId, fixity: &str) -> Result<(), MangleError> {
        if !self.writer.try_substitution(self.arena, node, true) {
            let text = self.text_of(node)?;
            let mut spelled = String::with_capacity(text.len());
            for c in text.chars() {
                if !c.is_ascii() {
                    spelled.push(c);
                    continue;
                }
                let Some(letter) = text::operator_char_to_mangled(c) else {
                    return Err(self.malformed("an operator character"));
                };
                spelled.push(letter);
            }
            self.writer.append_identifier(&spelled)?;
            self.writer.add_substitution(self.arena, node, true);
        }
        self.writer.append_operator(fixity);
        Ok(())
    }

    fn mangle_module(&mut self, node: NodeId) -> Result<(), MangleError> {
        match self.text_of(node)? {
            substitution::STDLIB_MODULE => {
                self.writer.append_operator("s");
                Ok(())
            }
            substitution::FOREIGN_MODULE => {
                self.writer.append_operator("So");
                Ok(())
            }
            substitution::FOREIGN_SYNTHESIZED_MODULE => {
                self.writer.append_operator("SC");
                Ok(())
            }
            _ => self.mangle_identifier_text(node),
        }
    }

    // -- Nominal types --

    fn mangle_nominal(&mut self, node: NodeId, operator: &str) -> Result<(), MangleError> {
        if let Some((letter, second_level)) = self.standard_nominal(node) {
            self.writer.append_standard_substitution(letter, second_level);
            return Ok(());
        }
        if self.writer.try_substitution(self.arena, node, false) {
            return Ok(());
        }
        let context = self.child(node, 0)?;
        let name = self.child(node, 1)?;
        self.mangle(context)?;
        self.mangle(name)?;
        self.writer.append_operator(operator);
        self.writer.add_substitution(self.arena, node, false);
        Ok(())
    }

    /// Nominals from the standard libraries get fixed codes instead of
    /// table entries, checked before the general table in both
    /// directions.
    fn standard_nominal(&self, node: NodeId) -> Option<(u8, bool)> {
        let context = self.arena.child(node, 0)?;
        if self.arena.kind(context) != Kind::Module {
            return None;
        }
        let second_level = match self.arena.text(context)? {
            substitution::STDLIB_MODULE => false,
            substitution::CONCURRENCY_MODULE => true,
            _ => return None,
        };
        let name = self.arena.child(node, 1)?;
        if self.arena.kind(name) != Kind::Identifier {
            return None;
        }
        let letter =
            substitution::standard_type_char(self.arena.kind(node), self.arena.text(name)?, second_level)?;
        Some((letter, second_level))
    }

    /// Protocols in operand position: no trailing `P`, no table entry.
    fn mangle_protocol_operand(&mut self, node: NodeId) -> Result<(), MangleError> {
        let protocol = if self.arena.kind(node) == Kind::Type {
            self.child(node, 0)?
        } else {
            node
        };
        if self.arena.kind(protocol) != Kind::Protocol {
            return Err(self.malformed("a protocol operand"));
        }
        if let Some((letter, second_level)) = self.standard_nominal(protocol) {
            self.writer.append_standard_substitution(letter, second_level);
            return Ok(());
        }
        if self.writer.try_substitution(self.arena, protocol, false) {
            return Ok(());
        }
        let context = self.child(protocol, 0)?;
        let name = self.child(protocol, 1)?;
        self.mangle(context)?;
        self.mangle(name)
    }

    fn mangle_bound_generic(&mut self, node: NodeId) -> Result<(), MangleError> {
        if self.writer.try_substitution(self.arena, node, false) {
            return Ok(());
        }
        let nominal_ty = self.child(node, 0)?;
        let arguments = self.child(node, 1)?;
        if let Some(wrapped) = self.sugared_optional_argument(node, nominal_ty, arguments) {
            self.mangle(wrapped)?;
            self.writer.append_operator("Sg");
        } else {
            self.mangle(nominal_ty)?;
            self.writer.append_operator("y");
            let arena = self.arena;
            for &argument in arena.children(arguments) {
                self.mangle(argument)?;
            }
            self.writer.append_operator("G");
        }
        self.writer.add_substitution(self.arena, node, false);
        Ok(())
    }

    /// A standard-library `Optional` over one argument round-trips
    /// through the `Sg` shorthand.
    fn sugared_optional_argument(
        &self,
        node: NodeId,
        nominal_ty: NodeId,
        arguments: NodeId,
    ) -> Option<NodeId> {
        if self.arena.kind(node) != Kind::BoundGenericEnum {
            return None;
        }
        let nominal = self.arena.first_child(nominal_ty)?;
        if self.arena.kind(nominal) != Kind::Enum {
            return None;
        }
        let module = self.arena.child(nominal, 0)?;
        if self.arena.kind(module) != Kind::Module
            || self.arena.text(module) != Some(substitution::STDLIB_MODULE)
        {
            return None;
        }
        let name = self.arena.child(nominal, 1)?;
        if self.arena.text(name) != Some("Optional") {
            return None;
        }
        let list = self.arena.children(arguments);
        if list.len() != 1 {
            return None;
        }
        list.first().copied()
    }

    // -- Structural types --

    fn mangle_type_list(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let elements = arena.children(node);
        if elements.is_empty() {
            self.writer.append_operator("y");
            return Ok(());
        }
        for (position, &element) in elements.iter().enumerate() {
            self.mangle(element)?;
            if position == 0 {
                self.writer.append_operator("_");
            }
        }
        Ok(())
    }

    fn mangle_tuple(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let elements = arena.children(node);
        if elements.is_empty() {
            self.writer.append_operator("yt");
            return Ok(());
        }
        for (position, &element) in elements.iter().enumerate() {
            self.mangle(element)?;
            if position == 0 {
                self.writer.append_operator("_");
            }
        }
        self.writer.append_operator("t");
        Ok(())
    }

    fn mangle_tuple_element(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let Some((&ty, parts)) = children.split_last() else {
            return Err(self.malformed("a tuple element without a type"));
        };
        let mut variadic = false;
        let mut name = None;
        for &part in parts {
            match arena.kind(part) {
                Kind::VariadicMarker => variadic = true,
                Kind::TupleElementName => name = Some(part),
                _ => return Err(self.malformed("a tuple element part")),
            }
        }
        self.mangle(ty)?;
        if let Some(name) = name {
            self.mangle_identifier_text(name)?;
        }
        if variadic {
            self.writer.append_operator("d");
        }
        Ok(())
    }

    fn mangle_type_attribute(&mut self, node: NodeId, operator: &str) -> Result<(), MangleError> {
        let inner = self.child(node, 0)?;
        self.mangle(inner)?;
        self.writer.append_operator(operator);
        Ok(())
    }

    fn mangle_protocol_list(&mut self, node: NodeId) -> Result<(), MangleError> {
        let list = self.child(node, 0)?;
        let arena = self.arena;
        let members = arena.children(list);
        if members.is_empty() {
            self.writer.append_operator("y");
        } else {
            for (position, &member) in members.iter().enumerate() {
                self.mangle_protocol_operand(member)?;
                if position == 0 {
                    self.writer.append_operator("_");
                }
            }
        }
        self.writer.append_operator("p");
        Ok(())
    }

    fn mangle_builtin(&mut self, name: &str) -> Result<(), MangleError> {
        if self.depth >= MAX_DEPTH {
            return Err(MangleError::BudgetExceeded {
                budget: Budget::Depth,
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let result = self.mangle_builtin_inner(name);
        self.depth -= 1;
        result
    }

    fn mangle_builtin_inner(&mut self, name: &str) -> Result<(), MangleError> {
        let fixed = match name {
            "Builtin.BridgeObject" => Some("Bb"),
            "Builtin.UnsafeValueBuffer" => Some("BB"),
            "Builtin.RawUnsafeContinuation" => Some("Bc"),
            "Builtin.DefaultActorStorage" => Some("BD"),
            "Builtin.Executor" => Some("Be"),
            "Builtin.Job" => Some("Bj"),
            "Builtin.NativeObject" => Some("Bo"),
            "Builtin.UnknownObject" => Some("BO"),
            "Builtin.RawPointer" => Some("Bp"),
            "Builtin.SILToken" => Some("Bt"),
            "Builtin.Word" => Some("Bw"),
            _ => None,
        };
        if let Some(code) = fixed {
            self.writer.append_operator(code);
            return Ok(());
        }
        if let Some(width) = name.strip_prefix("Builtin.Int") {
            return self.mangle_builtin_width("Bi", width);
        }
        if let Some(width) = name.strip_prefix("Builtin.FPIEEE") {
            return self.mangle_builtin_width("Bf", width);
        }
        if let Some(vector) = name.strip_prefix("Builtin.Vec") {
            let Some((count, element)) = vector.split_once('x') else {
                return Err(self.malformed("a builtin vector spelling"));
            };
            let mut element_name = String::with_capacity(8 + element.len());
            element_name.push_str("Builtin.");
            element_name.push_str(element);
            self.mangle_builtin(&element_name)?;
            return self.mangle_builtin_width("Bv", count);
        }
        Err(self.malformed("a builtin type name"))
    }

    fn mangle_builtin_width(&mut self, code: &str, digits: &str) -> Result<(), MangleError> {
        let width: u64 = digits
            .parse()
            .map_err(|_| self.malformed("a builtin bit width"))?;
        if width == 0 || width > MAX_BUILTIN_WIDTH {
            return Err(self.malformed("a builtin bit width"));
        }
        self.writer.append_operator(code);
        self.writer.append_index(width + 1);
        Ok(())
    }

    // -- Functions and entities --

    /// The parameter-and-result part of a `FunctionType`, without any
    /// trailing operator. Children were stored in pop order, so the
    /// wire order is their reverse.
    fn mangle_function_signature(&mut self, function: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(function);
        for &child in children.iter().rev() {
            match arena.kind(child) {
                Kind::ReturnType | Kind::ArgumentTuple => self.mangle_function_params(child)?,
                Kind::AsyncAnnotation => self.writer.append_operator("Ya"),
                Kind::ConcurrentFunctionType => self.writer.append_operator("Yb"),
                Kind::ThrowsAnnotation => self.writer.append_operator("K"),
                _ => return Err(self.malformed("a function type part")),
            }
        }
        Ok(())
    }

    fn mangle_function_params(&mut self, params: NodeId) -> Result<(), MangleError> {
        let ty = self.child(params, 0)?;
        let empty = self
            .arena
            .first_child(ty)
            .is_some_and(|inner| {
                self.arena.kind(inner) == Kind::Tuple && self.arena.children(inner).is_empty()
            });
        if empty {
            self.writer.append_operator("y");
            Ok(())
        } else {
            self.mangle(ty)
        }
    }

    /// Function-like entities carry their type without the `c`
    /// operator; a generic signature rides between the type and the
    /// entity code.
    fn mangle_entity_type(&mut self, ty: NodeId) -> Result<(), MangleError> {
        if self.arena.kind(ty) != Kind::Type {
            return Err(self.malformed("an entity type"));
        }
        let inner = self.child(ty, 0)?;
        match self.arena.kind(inner) {
            Kind::FunctionType => self.mangle_function_signature(inner),
            Kind::DependentGenericType => {
                let signature = self.child(inner, 0)?;
                let dependent_ty = self.child(inner, 1)?;
                let function = self.child(dependent_ty, 0)?;
                if self.arena.kind(function) != Kind::FunctionType {
                    return Err(self.malformed("a generic entity type"));
                }
                self.mangle_function_signature(function)?;
                self.mangle(signature)
            }
            _ => Err(self.malformed("an entity function type")),
        }
    }

    fn mangle_label_list(&mut self, list: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let labels = arena.children(list);
        if labels.is_empty() {
            self.writer.append_operator("y");
            return Ok(());
        }
        for &label in labels {
            self.mangle(label)?;
        }
        Ok(())
    }

    fn mangle_function(&mut self, node: NodeId) -> Result<(), MangleError> {
        let context = self.child(node, 0)?;
        let name = self.child(node, 1)?;
        let ty = self
            .arena
            .last_child(node)
            .ok_or_else(|| self.malformed("a function without a type"))?;
        self.mangle(context)?;
        self.mangle(name)?;
        if self.arena.children(node).len() == 4 {
            let labels = self.child(node, 2)?;
            self.mangle_label_list(labels)?;
        }
        self.mangle_entity_type(ty)?;
        self.writer.append_operator("F");
        Ok(())
    }

    fn mangle_storage(&mut self, entity: NodeId, accessor: &str) -> Result<(), MangleError> {
        match self.arena.kind(entity) {
            Kind::Variable => {
                let context = self.child(entity, 0)?;
                let name = self.child(entity, 1)?;
                let ty = self.child(entity, 2)?;
                self.mangle(context)?;
                self.mangle(name)?;
                self.mangle(ty)?;
                self.writer.append_operator("v");
            }
            Kind::Subscript => {
                let context = self.child(entity, 0)?;
                let ty = self
                    .arena
                    .last_child(entity)
                    .ok_or_else(|| self.malformed("a subscript without a type"))?;
                self.mangle(context)?;
                if self.arena.children(entity).len() == 3 {
                    let labels = self.child(entity, 1)?;
                    self.mangle_label_list(labels)?;
                }
                self.mangle(ty)?;
                self.writer.append_operator("i");
            }
            _ => return Err(self.malformed("an accessor over a non-storage entity")),
        }
        self.writer.append_operator(accessor);
        Ok(())
    }

    fn mangle_accessor(&mut self, node: NodeId, accessor: &str) -> Result<(), MangleError> {
        let storage = self.child(node, 0)?;
        self.mangle_storage(storage, accessor)
    }

    fn mangle_initializer(&mut self, node: NodeId, operator: &str) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let context = self.child(node, 0)?;
        self.mangle(context)?;
        let mut position = 1;
        if children
            .get(1)
            .is_some_and(|&child| arena.kind(child) == Kind::LabelList)
        {
            self.mangle_label_list(children[1])?;
            position = 2;
        }
        let ty = self.child(node, position)?;
        self.mangle(ty)?;
        if let Some(&private_name) = children.get(position + 1) {
            self.mangle(private_name)?;
        }
        self.writer.append_operator(operator);
        Ok(())
    }

    fn mangle_closure(&mut self, node: NodeId, operator: &str) -> Result<(), MangleError> {
        let context = self.child(node, 0)?;
        let number = self.child(node, 1)?;
        let ty = self.child(node, 2)?;
        self.mangle(context)?;
        self.mangle(ty)?;
        self.writer.append_operator(operator);
        let position = self.index_of(number)?;
        self.writer.append_index(position);
        Ok(())
    }

    // -- Generics --

    fn mangle_generic_signature(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let counts = children
            .iter()
            .take_while(|&&child| arena.kind(child) == Kind::DependentGenericParamCount)
            .count();
        if counts == 0 {
            return Err(self.malformed("a generic parameter count"));
        }
        for &requirement in &children[counts..] {
            self.mangle(requirement)?;
        }
        if counts == 1 && self.index_of(children[0])? == 1 {
            self.writer.append_operator("l");
            return Ok(());
        }
        self.writer.append_operator("r");
        for &count in &children[..counts] {
            match self.index_of(count)? {
                0 => self.writer.append_operator("z"),
                n => self.writer.append_index(n - 1),
            }
        }
        self.writer.append_operator("l");
        Ok(())
    }

    fn param_indices(&self, node: NodeId) -> Result<(u64, u64), MangleError> {
        let depth = self.child(node, 0)?;
        let index = self.child(node, 1)?;
        Ok((self.index_of(depth)?, self.index_of(index)?))
    }

    /// When a requirement constrains a plain generic parameter, the
    /// operand is spelled inline after the requirement operator.
    fn constrained_param(&self, ty: NodeId) -> Option<(u64, u64)> {
        if self.arena.kind(ty) != Kind::Type {
            return None;
        }
        let param = self.arena.first_child(ty)?;
        if self.arena.kind(param) != Kind::DependentGenericParamType {
            return None;
        }
        let depth = self.arena.child(param, 0).and_then(|n| self.arena.index(n))?;
        let index = self.arena.child(param, 1).and_then(|n| self.arena.index(n))?;
        Some((depth, index))
    }

    fn append_generic_param(&mut self, depth: u64, index: u64) {
        match (depth, index) {
            (0, 0) => self.writer.append_operator("z"),
            (0, index) => self.writer.append_index(index - 1),
            (depth, index) => {
                self.writer.append_operator("d");
                self.writer.append_index(depth - 1);
                self.writer.append_index(index);
            }
        }
    }

    fn mangle_dependent_member(&mut self, node: NodeId) -> Result<(), MangleError> {
        if self.writer.try_substitution(self.arena, node, false) {
            return Ok(());
        }
        // innermost association first on the wire
        let mut chain: SmallVec<[NodeId; 4]> = SmallVec::new();
        let mut current = node;
        let base = loop {
            chain.push(self.child(current, 1)?);
            let base_ty = self.child(current, 0)?;
            let inner = self.child(base_ty, 0)?;
            if self.arena.kind(inner) == Kind::DependentMemberType {
                current = inner;
            } else {
                break inner;
            }
        };
        let compound = chain.len() > 1;
        for (position, &member) in chain.iter().rev().enumerate() {
            self.mangle(member)?;
            if compound && position == 0 {
                self.writer.append_operator("_");
            }
        }
        if self.arena.kind(base) != Kind::DependentGenericParamType {
            return Err(self.malformed("a dependent member base"));
        }
        let (depth, index) = self.param_indices(base)?;
        match (compound, depth, index) {
            (false, 0, 0) => self.writer.append_operator("Qz"),
            (false, ..) => {
                self.writer.append_operator("Qy");
                self.append_generic_param(depth, index);
            }
            (true, 0, 0) => self.writer.append_operator("QZ"),
            (true, ..) => {
                self.writer.append_operator("QY");
                self.append_generic_param(depth, index);
            }
        }
        self.writer.add_substitution(self.arena, node, false);
        Ok(())
    }

    // -- Lowered function types --

    fn mangle_impl_function(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let escaping = children
            .first()
            .is_some_and(|&child| arena.kind(child) == Kind::ImplEscaping);
        let callee_position = usize::from(escaping);
        let callee = self.child(node, callee_position)?;
        for &slot in &children[callee_position + 1..] {
            let ty = self.child(slot, 1)?;
            self.mangle(ty)?;
        }
        self.writer.append_operator("I");
        if escaping {
            self.writer.append_operator("e");
        }
        let callee_letter = impl_callee_letter(self.text_of(callee)?)
            .ok_or_else(|| self.malformed("a callee convention"))?;
        self.writer.append_operator(callee_letter);
        for &slot in &children[callee_position + 1..] {
            let convention = self.child(slot, 0)?;
            let text = self.text_of(convention)?;
            let letter = match arena.kind(slot) {
                Kind::ImplParameter => impl_parameter_letter(text),
                Kind::ImplResult => impl_result_letter(text),
                _ => return Err(self.malformed("an impl slot")),
            }
            .ok_or_else(|| self.malformed("an impl convention"))?;
            self.writer.append_operator(letter);
        }
        self.writer.append_operator("_");
        Ok(())
    }

    // -- Witnesses and conformances --

    /// Single-operand productions: the child, then the operator.
    fn mangle_with_popped_type(&mut self, node: NodeId, operator: &str) -> Result<(), MangleError> {
        let operand = self.child(node, 0)?;
        self.mangle(operand)?;
        self.writer.append_operator(operator);
        Ok(())
    }

    fn mangle_protocol_conformance(&mut self, node: NodeId) -> Result<(), MangleError> {
        let ty = self.child(node, 0)?;
        let protocol = self.child(node, 1)?;
        let module = self.child(node, 2)?;
        self.mangle(ty)?;
        self.mangle_protocol_operand(protocol)?;
        self.mangle(module)
    }

    // -- Thunks and specializations --

    fn mangle_partial_apply(&mut self, node: NodeId, operator: &str) -> Result<(), MangleError> {
        self.mangle_global_members(node)?;
        self.writer.append_operator(operator);
        Ok(())
    }

    fn mangle_reabstraction(&mut self, node: NodeId, operator: &str) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        match *children {
            [from, to] => {
                self.mangle(from)?;
                self.mangle(to)?;
            }
            [signature, from, to] => {
                self.mangle(from)?;
                self.mangle(to)?;
                self.mangle(signature)?;
            }
            _ => return Err(self.malformed("a reabstraction thunk shape")),
        }
        self.writer.append_operator(operator);
        Ok(())
    }

    fn mangle_generic_specialization(
        &mut self,
        node: NodeId,
        operator: &str,
    ) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let mut serialized = false;
        let mut pass = None;
        let mut first_argument = true;
        for &child in children {
            match arena.kind(child) {
                Kind::IsSerialized => serialized = true,
                Kind::SpecializationPassID => pass = Some(self.index_of(child)?),
                Kind::GenericSpecializationParam => {
                    let argument = self.child(child, 0)?;
                    self.mangle(argument)?;
                    if first_argument {
                        self.writer.append_operator("_");
                        first_argument = false;
                    }
                }
                _ => return Err(self.malformed("a specialization part")),
            }
        }
        if first_argument {
            self.writer.append_operator("y");
        }
        self.writer.append_operator(operator);
        if serialized {
            self.writer.append_operator("q");
        }
        let pass = pass.ok_or_else(|| self.malformed("a specialization pass id"))?;
        if pass > 9 {
            return Err(self.malformed("a specialization pass id beyond one digit"));
        }
        self.writer.append_natural(pass);
        Ok(())
    }

    fn mangle_function_specialization(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let mut serialized = false;
        let mut pass = None;
        let mut parameters: SmallVec<[NodeId; 4]> = SmallVec::new();
        let mut return_spec = None;
        for &child in children {
            match arena.kind(child) {
                Kind::IsSerialized => serialized = true,
                Kind::SpecializationPassID => pass = Some(self.index_of(child)?),
                Kind::FunctionSignatureSpecializationParam => parameters.push(child),
                Kind::FunctionSignatureSpecializationReturn => return_spec = Some(child),
                _ => return Err(self.malformed("a specialization part")),
            }
        }
        self.writer.append_operator("Tf");
        if serialized {
            self.writer.append_operator("q");
        }
        let pass = pass.ok_or_else(|| self.malformed("a specialization pass id"))?;
        if pass > 9 {
            return Err(self.malformed("a specialization pass id beyond one digit"));
        }
        self.writer.append_natural(pass);
        for &parameter in &parameters {
            self.mangle_func_spec_parts(parameter)?;
        }
        self.writer.append_operator("_");
        match return_spec {
            Some(spec) => self.mangle_func_spec_parts(spec),
            None => {
                self.writer.append_operator("n");
                Ok(())
            }
        }
    }

    fn mangle_func_spec_parts(&mut self, node: NodeId) -> Result<(), MangleError> {
        let arena = self.arena;
        let children = arena.children(node);
        let Some((&kind_node, rest)) = children.split_first() else {
            self.writer.append_operator("n");
            return Ok(());
        };
        let value = self.index_of(kind_node)?;
        if value & func_spec::DEAD != 0 {
            let known =
                func_spec::DEAD | func_spec::OWNED_TO_GUARANTEED | func_spec::EXPLODED;
            if value & !known != 0 {
                return Err(self.malformed("a specialization parameter kind"));
            }
            self.writer.append_operator("d");
            if value & func_spec::OWNED_TO_GUARANTEED != 0 {
                self.writer.append_operator("G");
            }
            if value & func_spec::EXPLODED != 0 {
                self.writer.append_operator("X");
            }
        } else if value & func_spec::OWNED_TO_GUARANTEED != 0 {
            if value & !(func_spec::OWNED_TO_GUARANTEED | func_spec::EXPLODED) != 0 {
                return Err(self.malformed("a specialization parameter kind"));
            }
            self.writer.append_operator("g");
            if value & func_spec::EXPLODED != 0 {
                self.writer.append_operator("X");
            }
        } else if value == func_spec::EXPLODED {
            self.writer.append_operator("x");
        } else if value == func_spec::CONSTANT_PROP_INTEGER {
            let payload = rest
                .first()
                .ok_or_else(|| self.malformed("a propagated constant"))?;
            let digits = self.text_of(*payload)?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(self.malformed("a propagated constant"));
            }
            self.writer.append_operator("pi");
            self.writer.append_operator(digits);
        } else {
            return Err(self.malformed("a specialization parameter kind"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
