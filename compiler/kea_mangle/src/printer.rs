//! Tree-to-text display: rendering demangle trees as readable names.
//!
//! The printer walks a tree produced by the demangler and builds the
//! human-readable form: `main.greet(with: Kea.String) -> ()` instead of
//! `$s4main5greet4withySS_tF`. Output is driven by [`DemangleOptions`];
//! the defaults match what the standalone tool prints, and
//! [`DemangleOptions::simplified`] is the abbreviated form used where
//! space is tight.
//!
//! Rendering is total over well-formed trees. A hand-built tree whose
//! shape the grammar cannot produce (a function entity without a
//! function type, a value witness with an out-of-range ordinal) has no
//! display form and [`render`] returns `None` rather than guessing.
//! The walk carries its own depth counter so a pathological tree is cut
//! off at the same bound the demangler enforces.

use crate::demangler::MAX_DEPTH;
use crate::kind::{func_spec, Kind, VALUE_WITNESSES};
use crate::node::{NodeArena, NodeId};
use crate::substitution::{FOREIGN_MODULE, FOREIGN_SYNTHESIZED_MODULE, STDLIB_MODULE};
use crate::text;

/// Display options for [`render`].
///
/// Options only change presentation: which module qualifiers appear,
/// whether stdlib generics print as sugar, and how much of a function
/// signature is shown. They never change what a symbol means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemangleOptions {
    /// Print stdlib `Optional`/`Array`/`Dictionary` applications as
    /// `T?`, `[T]` and `[K : V]`.
    pub synthesize_sugar_on_types: bool,
    /// Qualify standard-library names with `Kea.`.
    pub display_stdlib_module: bool,
    /// Qualify imported C/Objective-C names with their synthetic module.
    pub display_objc_module: bool,
    /// Append ` in <context>` to local names even when local contexts
    /// are otherwise suppressed.
    pub qualify_local_names: bool,
    /// Append ` in <context>` to closures and other function-local
    /// entities.
    pub display_local_name_contexts: bool,
    /// Print full signatures. When false, functions shorten to
    /// `name(label:label:)` and detached entity types are dropped.
    pub show_function_argument_types: bool,
    /// Print the type signature of closures. Has no effect while
    /// argument types are suppressed.
    pub show_closure_signature: bool,
    /// Suppress the qualifier for this module wherever it would appear.
    pub hiding_module: Option<Box<str>>,
}

impl Default for DemangleOptions {
    fn default() -> Self {
        DemangleOptions {
            synthesize_sugar_on_types: true,
            display_stdlib_module: true,
            display_objc_module: true,
            qualify_local_names: false,
            display_local_name_contexts: true,
            show_function_argument_types: true,
            show_closure_signature: true,
            hiding_module: None,
        }
    }
}

impl DemangleOptions {
    /// The abbreviated form: no argument types, no stdlib qualifiers,
    /// no local contexts. `main.greet(with:)` instead of the full
    /// signature.
    #[must_use]
    pub fn simplified() -> Self {
        DemangleOptions {
            synthesize_sugar_on_types: true,
            display_stdlib_module: false,
            display_objc_module: false,
            qualify_local_names: false,
            display_local_name_contexts: false,
            show_function_argument_types: false,
            show_closure_signature: true,
            hiding_module: None,
        }
    }
}

/// Renders `node` as a readable name.
///
/// Returns `None` when the tree has no display form: a shape the
/// grammar cannot produce, or nesting past the recursion bound. Trees
/// built by the demangler always render.
#[must_use]
pub fn render(arena: &NodeArena, node: NodeId, options: &DemangleOptions) -> Option<String> {
    let mut printer = Printer {
        arena,
        options,
        out: String::new(),
        depth: 0,
    };
    match printer.print(node) {
        Ok(()) => Some(printer.out),
        Err(Unprintable) => None,
    }
}

/// The tree cannot be displayed; carried as `Err` through the walk.
struct Unprintable;

type Printed = Result<(), Unprintable>;

struct Printer<'a> {
    arena: &'a NodeArena,
    options: &'a DemangleOptions,
    out: String,
    depth: usize,
}

impl<'a> Printer<'a> {
    fn put(&mut self, piece: &str) {
        self.out.push_str(piece);
    }

    fn put_number(&mut self, value: u64) {
        self.out.push_str(&value.to_string());
    }

    fn child(&self, node: NodeId, position: usize) -> Result<NodeId, Unprintable> {
        self.arena.child(node, position).ok_or(Unprintable)
    }

    fn text_of(&self, node: NodeId) -> Result<&'a str, Unprintable> {
        self.arena.text(node).ok_or(Unprintable)
    }

    fn index_of(&self, node: NodeId) -> Result<u64, Unprintable> {
        self.arena.index(node).ok_or(Unprintable)
    }

    /// Unwraps a `Type` node to the type it carries.
    fn type_payload(&self, node: NodeId) -> Result<NodeId, Unprintable> {
        if self.arena.kind(node) != Kind::Type {
            return Err(Unprintable);
        }
        self.arena.first_child(node).ok_or(Unprintable)
    }

    fn print(&mut self, node: NodeId) -> Printed {
        if self.depth >= MAX_DEPTH {
            return Err(Unprintable);
        }
        self.depth += 1;
        let result = self.print_any(node);
        self.depth -= 1;
        result
    }

    fn print_any(&mut self, node: NodeId) -> Printed {
        match self.arena.kind(node) {
            // -- Structure --
            Kind::Global => self.print_global_members(self.arena.children(node)),
            Kind::Type | Kind::TypeMangling | Kind::ArgumentTuple | Kind::ReturnType => {
                let inner = self.child(node, 0)?;
                self.print(inner)
            }
            Kind::TypeList => self.print_separated(self.arena.children(node), ", "),
            Kind::EmptyList | Kind::FirstElementMarker | Kind::VariadicMarker => Err(Unprintable),
            Kind::Index | Kind::Number => {
                let value = self.index_of(node)?;
                self.put_number(value);
                Ok(())
            }

            // -- Names --
            Kind::Identifier
            | Kind::LocalDeclName
            | Kind::PrivateDeclName
            | Kind::PrefixOperator
            | Kind::InfixOperator
            | Kind::PostfixOperator => self.print_decl_name(node),

            // -- Contexts and nominal types --
            Kind::Module => {
                let name = self.text_of(node)?;
                self.put(name);
                Ok(())
            }
            Kind::Class | Kind::Structure | Kind::Enum | Kind::Protocol | Kind::TypeAlias => {
                let context = self.child(node, 0)?;
                let name = self.child(node, 1)?;
                self.print_context_prefix(context)?;
                self.print_decl_name(name)
            }
            Kind::Extension => self.print_extension(node),

            // -- Entities --
            Kind::Function => self.print_function_entity(node),
            Kind::Variable | Kind::Subscript => self.print_storage(node, None),
            Kind::Constructor | Kind::Allocator => self.print_initializer(node),
            Kind::Destructor => self.print_nullary_member(node, "deinit"),
            Kind::Deallocator => self.print_nullary_member(node, "__deallocating_deinit"),
            Kind::Static => {
                self.put("static ");
                let entity = self.child(node, 0)?;
                self.print(entity)
            }
            Kind::ExplicitClosure => self.print_closure(node, "closure"),
            Kind::ImplicitClosure => self.print_closure(node, "implicit closure"),
            Kind::DefaultArgumentInitializer => {
                let context = self.child(node, 0)?;
                let position = self.index_of(self.child(node, 1)?)?;
                self.put("default argument ");
                self.put_number(position);
                self.put(" of ");
                self.print(context)
            }
            Kind::Getter => self.print_accessor(node, ".getter"),
            Kind::Setter => self.print_accessor(node, ".setter"),
            Kind::ReadAccessor => self.print_accessor(node, ".read"),
            Kind::ModifyAccessor => self.print_accessor(node, ".modify"),
            Kind::WillSet => self.print_accessor(node, ".willset"),
            Kind::DidSet => self.print_accessor(node, ".didset"),
            Kind::LabelList => Err(Unprintable),

            // -- Types --
            Kind::FunctionType => self.print_function_type(node, None),
            Kind::Tuple => {
                self.put("(");
                self.print_separated(self.arena.children(node), ", ")?;
                self.put(")");
                Ok(())
            }
            Kind::TupleElement => self.print_tuple_element(node),
            Kind::TupleElementName | Kind::BuiltinTypeName => {
                let name = self.text_of(node)?;
                self.put(name);
                Ok(())
            }
            Kind::Metatype => {
                let ty = self.child(node, 0)?;
                self.print(ty)?;
                self.put(".Type");
                Ok(())
            }
            Kind::InOut => self.print_type_attribute(node, "inout "),
            Kind::Shared => self.print_type_attribute(node, "__shared "),
            Kind::Owned => self.print_type_attribute(node, "__owned "),
            Kind::Weak => self.print_type_attribute(node, "weak "),
            Kind::Unowned => self.print_type_attribute(node, "unowned "),
            Kind::Unmanaged => self.print_type_attribute(node, "unowned(unsafe) "),
            Kind::ProtocolList => {
                let members = self.child(node, 0)?;
                if self.arena.children(members).is_empty() {
                    self.put("Any");
                    return Ok(());
                }
                self.print_separated(self.arena.children(members), " & ")
            }
            Kind::BoundGenericClass
            | Kind::BoundGenericStructure
            | Kind::BoundGenericEnum
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericTypeAlias => self.print_bound_generic(node),
            Kind::AsyncAnnotation => {
                self.put("async");
                Ok(())
            }
            Kind::ThrowsAnnotation => {
                self.put("throws");
                Ok(())
            }
            Kind::ConcurrentFunctionType => {
                self.put("@Sendable");
                Ok(())
            }

            // -- Generics --
            Kind::DependentGenericSignature => self.print_generic_signature(node),
            Kind::DependentGenericParamCount => {
                let value = self.index_of(node)?;
                self.put_number(value);
                Ok(())
            }
            Kind::DependentGenericParamType => {
                let depth = self.index_of(self.child(node, 0)?)?;
                let index = self.index_of(self.child(node, 1)?)?;
                self.put_generic_param_name(depth, index);
                Ok(())
            }
            Kind::DependentGenericType => {
                let signature = self.child(node, 0)?;
                let ty = self.child(node, 1)?;
                self.print(signature)?;
                self.print(ty)
            }
            Kind::DependentGenericConformanceRequirement
            | Kind::DependentGenericBaseClassRequirement => {
                let constrained = self.child(node, 0)?;
                let constraint = self.child(node, 1)?;
                self.print(constrained)?;
                self.put(": ");
                self.print(constraint)
            }
            Kind::DependentGenericSameTypeRequirement => {
                let constrained = self.child(node, 0)?;
                let other = self.child(node, 1)?;
                self.print(constrained)?;
                self.put(" == ");
                self.print(other)
            }
            Kind::DependentGenericLayoutRequirement => {
                let constrained = self.child(node, 0)?;
                let code = self.text_of(self.child(node, 1)?)?;
                self.print(constrained)?;
                self.put(": ");
                self.put(match code {
                    "C" => "AnyObject",
                    "D" => "_NativeClass",
                    "T" => "_Trivial",
                    _ => return Err(Unprintable),
                });
                Ok(())
            }
            Kind::DependentMemberType => {
                let base = self.child(node, 0)?;
                let member = self.child(node, 1)?;
                self.print(base)?;
                self.put(".");
                self.print(member)
            }
            Kind::DependentAssociatedTypeRef => {
                let name = self.text_of(self.child(node, 0)?)?;
                self.put(name);
                Ok(())
            }

            // -- Lowered function types --
            Kind::ImplFunctionType => self.print_impl_function(node),
            Kind::ImplParameter | Kind::ImplResult => {
                let convention = self.text_of(self.child(node, 0)?)?;
                let ty = self.child(node, 1)?;
                self.put(convention);
                self.put(" ");
                self.print(ty)
            }
            Kind::ImplConvention => {
                let convention = self.text_of(node)?;
                self.put(convention);
                Ok(())
            }
            Kind::ImplEscaping => {
                self.put("@escaping");
                Ok(())
            }

            // -- Metadata and witnesses --
            Kind::TypeMetadata => self.print_prefixed(node, "type metadata for "),
            Kind::TypeMetadataAccessFunction => {
                self.print_prefixed(node, "type metadata accessor for ")
            }
            Kind::NominalTypeDescriptor => {
                self.print_prefixed(node, "nominal type descriptor for ")
            }
            Kind::ClassMetadataBaseOffset => {
                self.print_prefixed(node, "class metadata base offset for ")
            }
            Kind::FullTypeMetadata => self.print_prefixed(node, "full type metadata for "),
            Kind::TypeMetadataLazyCache => {
                self.print_prefixed(node, "lazy cache variable for type metadata for ")
            }
            Kind::Metaclass => self.print_prefixed(node, "metaclass for "),
            Kind::ProtocolConformance => self.print_conformance(node),
            Kind::ProtocolConformanceDescriptor => {
                self.print_prefixed(node, "protocol conformance descriptor for ")
            }
            Kind::ProtocolWitnessTable => {
                self.print_prefixed(node, "protocol witness table for ")
            }
            Kind::ProtocolWitnessTableAccessor => {
                self.print_prefixed(node, "protocol witness table accessor for ")
            }
            Kind::LazyProtocolWitnessTableAccessor => self.print_lazy_witness_entry(
                node,
                "lazy protocol witness table accessor for type ",
            ),
            Kind::LazyProtocolWitnessTableCacheVariable => self.print_lazy_witness_entry(
                node,
                "lazy protocol witness table cache variable for type ",
            ),
            Kind::GenericProtocolWitnessTable => {
                self.print_prefixed(node, "generic protocol witness table for ")
            }
            Kind::GenericProtocolWitnessTableInstantiationFunction => self.print_prefixed(
                node,
                "instantiation function for generic protocol witness table for ",
            ),
            Kind::BaseWitnessTableAccessor => {
                let conformance = self.child(node, 0)?;
                let protocol = self.child(node, 1)?;
                self.put("base witness table accessor for ");
                self.print(protocol)?;
                self.put(" in ");
                self.print(conformance)
            }
            Kind::ValueWitness => {
                let ordinal = usize::try_from(self.index_of(node)?).map_err(|_| Unprintable)?;
                let Some(&(_, name)) = VALUE_WITNESSES.get(ordinal) else {
                    return Err(Unprintable);
                };
                let ty = self.child(node, 0)?;
                self.put(name);
                self.put(" value witness for ");
                self.print(ty)
            }
            Kind::ValueWitnessTable => self.print_prefixed(node, "value witness table for "),
            Kind::FieldOffset => {
                let directness = self.index_of(self.child(node, 0)?)?;
                let entity = self.child(node, 1)?;
                self.put(match directness {
                    0 => "direct ",
                    1 => "indirect ",
                    _ => return Err(Unprintable),
                });
                self.put("field offset for ");
                self.print(entity)
            }
            Kind::Directness => {
                let value = self.index_of(node)?;
                self.put(match value {
                    0 => "direct",
                    1 => "indirect",
                    _ => return Err(Unprintable),
                });
                Ok(())
            }
            Kind::EnumCase => self.print_prefixed(node, "enum case for "),

            // -- Thunks and attributes --
            Kind::ObjCAttribute => {
                self.put("@objc");
                Ok(())
            }
            Kind::NonObjCAttribute => {
                self.put("@nonobjc");
                Ok(())
            }
            Kind::DynamicAttribute => {
                self.put("dynamic");
                Ok(())
            }
            Kind::DirectMethodReferenceAttribute => {
                self.put("direct method reference");
                Ok(())
            }
            Kind::MergedFunction => {
                self.put("merged");
                Ok(())
            }
            Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder => {
                self.put(match self.arena.kind(node) {
                    Kind::PartialApplyObjCForwarder => "partial apply ObjC forwarder",
                    _ => "partial apply forwarder",
                });
                let children = self.arena.children(node);
                if !children.is_empty() {
                    self.put(" for ");
                    self.print_global_members(children)?;
                }
                Ok(())
            }
            Kind::ReabstractionThunk => self.print_reabstraction(node, "reabstraction thunk"),
            Kind::ReabstractionThunkHelper => {
                self.print_reabstraction(node, "reabstraction thunk helper")
            }
            Kind::ProtocolWitness => {
                let conformance = self.child(node, 0)?;
                let entity = self.child(node, 1)?;
                self.put("protocol witness for ");
                self.print(entity)?;
                self.put(" in conformance ");
                self.print(conformance)
            }
            Kind::DispatchThunk => self.print_prefixed(node, "dispatch thunk of "),
            Kind::MethodDescriptor => self.print_prefixed(node, "method descriptor for "),

            // -- Specializations --
            Kind::GenericSpecialization => {
                self.print_generic_specialization(node, "generic specialization")
            }
            Kind::GenericSpecializationNotReAbstracted => self.print_generic_specialization(
                node,
                "generic not re-abstracted specialization",
            ),
            Kind::GenericSpecializationPrespecialized => {
                self.print_generic_specialization(node, "generic pre-specialization")
            }
            Kind::GenericPartialSpecialization => {
                self.print_generic_specialization(node, "generic partial specialization")
            }
            Kind::GenericPartialSpecializationNotReAbstracted => self
                .print_generic_specialization(
                    node,
                    "generic not re-abstracted partial specialization",
                ),
            Kind::GenericSpecializationParam => {
                let ty = self.child(node, 0)?;
                self.print(ty)
            }
            Kind::FunctionSignatureSpecialization => {
                self.print_function_signature_specialization(node)
            }
            Kind::FunctionSignatureSpecializationParam
            | Kind::FunctionSignatureSpecializationParamKind
            | Kind::FunctionSignatureSpecializationParamPayload
            | Kind::FunctionSignatureSpecializationReturn
            | Kind::SpecializationPassID => Err(Unprintable),
            Kind::IsSerialized => {
                self.put("serialized");
                Ok(())
            }
        }
    }

    // -- Global assembly --

    /// Prints attribute children as prefixes, then the members they
    /// apply to. `Global` and the partial-apply forwarders share this
    /// child layout.
    fn print_global_members(&mut self, children: &[NodeId]) -> Printed {
        let mut position = 0;
        while let Some(&attribute) = children.get(position) {
            let kind = self.arena.kind(attribute);
            let adopts = matches!(
                kind,
                Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder
            );
            if !kind.is_function_attribute() || adopts {
                break;
            }
            self.print(attribute)?;
            self.put(if kind.is_specialization() { " of " } else { " " });
            position += 1;
        }
        self.print_separated(&children[position..], " ")
    }

    fn print_separated(&mut self, nodes: &[NodeId], separator: &str) -> Printed {
        for (position, &node) in nodes.iter().enumerate() {
            if position > 0 {
                self.put(separator);
            }
            self.print(node)?;
        }
        Ok(())
    }

    fn print_prefixed(&mut self, node: NodeId, prefix: &str) -> Printed {
        self.put(prefix);
        let subject = self.child(node, 0)?;
        self.print(subject)
    }

    // -- Names and contexts --

    fn print_decl_name(&mut self, name: NodeId) -> Printed {
        match self.arena.kind(name) {
            Kind::Identifier => {
                let text = self.text_of(name)?;
                if text::is_raw_identifier(text) {
                    self.put("`");
                    self.put(text);
                    self.put("`");
                } else {
                    self.put(text);
                }
                Ok(())
            }
            Kind::PrefixOperator => self.print_operator_name(name, " prefix"),
            Kind::InfixOperator => self.print_operator_name(name, " infix"),
            Kind::PostfixOperator => self.print_operator_name(name, " postfix"),
            Kind::LocalDeclName => {
                let position = self.index_of(self.child(name, 0)?)?;
                let inner = self.child(name, 1)?;
                self.print_decl_name(inner)?;
                self.put(" #");
                self.put_number(position.saturating_add(1));
                Ok(())
            }
            Kind::PrivateDeclName => {
                let discriminator = self.text_of(self.child(name, 0)?)?;
                self.put("(");
                if let Some(inner) = self.arena.child(name, 1) {
                    self.print_decl_name(inner)?;
                    self.put(" ");
                }
                self.put("in ");
                self.put(discriminator);
                self.put(")");
                Ok(())
            }
            _ => Err(Unprintable),
        }
    }

    fn print_operator_name(&mut self, name: NodeId, fixity: &str) -> Printed {
        let spelling = self.text_of(name)?;
        self.put(spelling);
        self.put(fixity);
        Ok(())
    }

    fn module_is_hidden(&self, name: &str) -> bool {
        if let Some(hidden) = &self.options.hiding_module {
            if hidden.as_ref() == name {
                return true;
            }
        }
        if !self.options.display_stdlib_module && name == STDLIB_MODULE {
            return true;
        }
        !self.options.display_objc_module
            && (name == FOREIGN_MODULE || name == FOREIGN_SYNTHESIZED_MODULE)
    }

    /// Prints `context.`; a hidden module qualifier prints as nothing.
    fn print_context_prefix(&mut self, context: NodeId) -> Printed {
        if self.arena.kind(context) == Kind::Module {
            let name = self.text_of(context)?;
            if !self.module_is_hidden(name) {
                self.put(name);
                self.put(".");
            }
            return Ok(());
        }
        self.print(context)?;
        self.put(".");
        Ok(())
    }

    /// Starts an entity: prints the context qualifier, or defers a
    /// function-local context so it can trail as ` in <context>`.
    fn begin_entity(&mut self, context: NodeId) -> Result<Option<NodeId>, Unprintable> {
        let kind = self.arena.kind(context);
        if kind.is_entity() && !kind.is_any_generic() {
            return Ok(Some(context));
        }
        self.print_context_prefix(context)?;
        Ok(None)
    }

    fn finish_entity(&mut self, deferred: Option<NodeId>) -> Printed {
        let Some(context) = deferred else {
            return Ok(());
        };
        if !self.options.display_local_name_contexts && !self.options.qualify_local_names {
            return Ok(());
        }
        self.put(" in ");
        self.print(context)
    }

    fn print_extension(&mut self, node: NodeId) -> Printed {
        let module = self.text_of(self.child(node, 0)?)?;
        let extended = self.child(node, 1)?;
        self.put("(extension in ");
        self.put(module);
        self.put("):");
        self.print(extended)?;
        if let Some(signature) = self.arena.child(node, 2) {
            self.print(signature)?;
        }
        Ok(())
    }

    // -- Entities --

    fn print_function_entity(&mut self, node: NodeId) -> Printed {
        let (context, name, labels, ty) = match *self.arena.children(node) {
            [context, name, ty] => (context, name, None, ty),
            [context, name, labels, ty] => (context, name, Some(labels), ty),
            _ => return Err(Unprintable),
        };
        let deferred = self.begin_entity(context)?;
        self.print_decl_name(name)?;
        if self.arena.kind(name) == Kind::LocalDeclName {
            self.put(" ");
        }
        self.print_entity_signature(ty, labels)?;
        self.finish_entity(deferred)
    }

    fn print_storage(&mut self, node: NodeId, accessor: Option<&str>) -> Printed {
        let (context, name, ty) = match (self.arena.kind(node), self.arena.children(node)) {
            (Kind::Variable, &[context, name, ty]) => (context, Some(name), ty),
            (Kind::Subscript, &[context, ty] | &[context, _, ty]) => (context, None, ty),
            _ => return Err(Unprintable),
        };
        let deferred = self.begin_entity(context)?;
        match name {
            Some(name) => self.print_decl_name(name)?,
            None => self.put("subscript"),
        }
        if let Some(suffix) = accessor {
            self.put(suffix);
        }
        if self.options.show_function_argument_types {
            self.put(" : ");
            self.print(ty)?;
        }
        self.finish_entity(deferred)
    }

    fn print_accessor(&mut self, node: NodeId, suffix: &str) -> Printed {
        let storage = self.child(node, 0)?;
        match self.arena.kind(storage) {
            Kind::Variable | Kind::Subscript => self.print_storage(storage, Some(suffix)),
            _ => Err(Unprintable),
        }
    }

    fn print_initializer(&mut self, node: NodeId) -> Printed {
        let Some((&context, rest)) = self.arena.children(node).split_first() else {
            return Err(Unprintable);
        };
        let deferred = self.begin_entity(context)?;
        let mut labels = None;
        let mut ty = None;
        let mut private_name = None;
        for &part in rest {
            match self.arena.kind(part) {
                Kind::LabelList => labels = Some(part),
                Kind::Type => ty = Some(part),
                Kind::PrivateDeclName => private_name = Some(part),
                _ => return Err(Unprintable),
            }
        }
        match private_name {
            Some(private_name) => {
                let discriminator = self.text_of(self.child(private_name, 0)?)?;
                self.put("(init in ");
                self.put(discriminator);
                self.put(")");
            }
            None => self.put("init"),
        }
        let ty = ty.ok_or(Unprintable)?;
        self.print_entity_signature(ty, labels)?;
        self.finish_entity(deferred)
    }

    fn print_nullary_member(&mut self, node: NodeId, name: &str) -> Printed {
        let context = self.child(node, 0)?;
        let deferred = self.begin_entity(context)?;
        self.put(name);
        self.finish_entity(deferred)
    }

    fn print_closure(&mut self, node: NodeId, introducer: &str) -> Printed {
        let context = self.child(node, 0)?;
        let position = self.index_of(self.child(node, 1)?)?;
        let ty = self.child(node, 2)?;
        self.put(introducer);
        self.put(" #");
        self.put_number(position.saturating_add(1));
        if self.options.show_function_argument_types && self.options.show_closure_signature {
            self.put(" ");
            self.print(ty)?;
        }
        self.finish_entity(Some(context))
    }

    // -- Function signatures --

    /// Prints the signature of a function-shaped entity: an optional
    /// generic signature, the parameter list with labels woven in, and
    /// the result. In abbreviated form only `(label:label:)` appears.
    fn print_entity_signature(&mut self, ty: NodeId, labels: Option<NodeId>) -> Printed {
        let payload = self.type_payload(ty)?;
        let (signature, function) = match self.arena.kind(payload) {
            Kind::DependentGenericType => {
                let signature = self.child(payload, 0)?;
                let inner = self.type_payload(self.child(payload, 1)?)?;
                (Some(signature), inner)
            }
            _ => (None, payload),
        };
        if self.arena.kind(function) != Kind::FunctionType {
            return Err(Unprintable);
        }
        if !self.options.show_function_argument_types {
            return self.print_label_stub(function, labels);
        }
        if let Some(signature) = signature {
            self.print(signature)?;
        }
        self.print_function_type(function, labels)
    }

    fn print_function_type(&mut self, function: NodeId, labels: Option<NodeId>) -> Printed {
        let mut throws = false;
        let mut concurrent = false;
        let mut is_async = false;
        let mut arguments = None;
        let mut result = None;
        for &part in self.arena.children(function) {
            match self.arena.kind(part) {
                Kind::ThrowsAnnotation => throws = true,
                Kind::ConcurrentFunctionType => concurrent = true,
                Kind::AsyncAnnotation => is_async = true,
                Kind::ArgumentTuple => arguments = Some(part),
                Kind::ReturnType => result = Some(part),
                _ => return Err(Unprintable),
            }
        }
        let arguments = arguments.ok_or(Unprintable)?;
        let result = result.ok_or(Unprintable)?;
        self.print_parameters(arguments, labels)?;
        if concurrent {
            self.put(" @Sendable");
        }
        if is_async {
            self.put(" async");
        }
        if throws {
            self.put(" throws");
        }
        self.put(" -> ");
        self.print(result)
    }

    fn print_parameters(&mut self, arguments: NodeId, labels: Option<NodeId>) -> Printed {
        let ty = self.child(arguments, 0)?;
        let payload = self.type_payload(ty)?;
        self.put("(");
        if self.arena.kind(payload) == Kind::Tuple {
            let elements = self.arena.children(payload);
            for (position, &element) in elements.iter().enumerate() {
                if position > 0 {
                    self.put(", ");
                }
                self.print_parameter_label(labels, position)?;
                self.print(element)?;
            }
        } else {
            self.print_parameter_label(labels, 0)?;
            self.print(ty)?;
        }
        self.put(")");
        Ok(())
    }

    fn print_parameter_label(&mut self, labels: Option<NodeId>, position: usize) -> Printed {
        let Some(list) = labels else { return Ok(()) };
        let Some(&label) = self.arena.children(list).get(position) else {
            return Ok(());
        };
        if self.arena.kind(label) == Kind::Identifier {
            let text = self.text_of(label)?;
            self.put(text);
            self.put(": ");
        }
        Ok(())
    }

    /// The `name(label:label:)` form: one slot per parameter, `_` for
    /// an unlabeled one.
    fn print_label_stub(&mut self, function: NodeId, labels: Option<NodeId>) -> Printed {
        let mut arity = 0;
        for &part in self.arena.children(function) {
            if self.arena.kind(part) == Kind::ArgumentTuple {
                let payload = self.type_payload(self.child(part, 0)?)?;
                arity = if self.arena.kind(payload) == Kind::Tuple {
                    self.arena.children(payload).len()
                } else {
                    1
                };
            }
        }
        self.put("(");
        for position in 0..arity {
            let label = labels.and_then(|list| self.arena.children(list).get(position).copied());
            match label {
                Some(label) if self.arena.kind(label) == Kind::Identifier => {
                    let text = self.text_of(label)?;
                    self.put(text);
                }
                _ => self.put("_"),
            }
            self.put(":");
        }
        self.put(")");
        Ok(())
    }

    fn print_tuple_element(&mut self, element: NodeId) -> Printed {
        let mut variadic = false;
        let mut name = None;
        let mut ty = None;
        for &part in self.arena.children(element) {
            match self.arena.kind(part) {
                Kind::VariadicMarker => variadic = true,
                Kind::TupleElementName => name = Some(part),
                Kind::Type => ty = Some(part),
                _ => return Err(Unprintable),
            }
        }
        if let Some(name) = name {
            let text = self.text_of(name)?;
            self.put(text);
            self.put(": ");
        }
        self.print(ty.ok_or(Unprintable)?)?;
        if variadic {
            self.put("...");
        }
        Ok(())
    }

    fn print_type_attribute(&mut self, node: NodeId, prefix: &str) -> Printed {
        self.put(prefix);
        let ty = self.child(node, 0)?;
        self.print(ty)
    }

    // -- Generic and bound generic types --

    fn put_generic_param_name(&mut self, depth: u64, index: u64) {
        let letter = char::from(b'A' + u8::try_from(index % 26).unwrap_or(0));
        self.out.push(letter);
        if index >= 26 {
            self.put_number(index / 26);
        }
        if depth > 0 {
            self.put_number(depth);
        }
    }

    fn print_generic_signature(&mut self, signature: NodeId) -> Printed {
        let children = self.arena.children(signature);
        let depths = children
            .iter()
            .take_while(|&&child| self.arena.kind(child) == Kind::DependentGenericParamCount)
            .count();
        let (counts, requirements) = children.split_at(depths);
        self.put("<");
        let mut first = true;
        let mut depth = 0u64;
        for &count in counts {
            let count = self.index_of(count)?;
            for index in 0..count {
                if !first {
                    self.put(", ");
                }
                first = false;
                self.put_generic_param_name(depth, index);
            }
            depth += 1;
        }
        if !requirements.is_empty() {
            self.put(" where ");
            self.print_separated(requirements, ", ")?;
        }
        self.put(">");
        Ok(())
    }

    /// The name of a stdlib nominal applied directly under the standard
    /// module, used to decide sugared spellings.
    fn stdlib_base_name(&self, base: NodeId) -> Option<&'a str> {
        let nominal = self.arena.first_child(base)?;
        if !self.arena.kind(nominal).is_any_generic() {
            return None;
        }
        let context = self.arena.child(nominal, 0)?;
        if self.arena.kind(context) != Kind::Module
            || self.arena.text(context) != Some(STDLIB_MODULE)
        {
            return None;
        }
        self.arena.text(self.arena.child(nominal, 1)?)
    }

    /// Whether a sugared optional operand needs parentheses, as in
    /// `(() -> ())?`.
    fn needs_parens_in_sugar(&self, ty: NodeId) -> bool {
        let Ok(payload) = self.type_payload(ty) else {
            return false;
        };
        match self.arena.kind(payload) {
            Kind::FunctionType | Kind::ImplFunctionType | Kind::DependentGenericType => true,
            Kind::ProtocolList => self
                .arena
                .first_child(payload)
                .is_some_and(|members| self.arena.children(members).len() > 1),
            _ => false,
        }
    }

    fn print_bound_generic(&mut self, node: NodeId) -> Printed {
        let base = self.child(node, 0)?;
        let arguments = self.child(node, 1)?;
        if self.options.synthesize_sugar_on_types {
            let kind = self.arena.kind(node);
            let argument_nodes = self.arena.children(arguments);
            match (self.stdlib_base_name(base), argument_nodes) {
                (Some("Optional"), &[operand]) if kind == Kind::BoundGenericEnum => {
                    let parenthesize = self.needs_parens_in_sugar(operand);
                    if parenthesize {
                        self.put("(");
                    }
                    self.print(operand)?;
                    if parenthesize {
                        self.put(")");
                    }
                    self.put("?");
                    return Ok(());
                }
                (Some("Array"), &[element]) if kind == Kind::BoundGenericStructure => {
                    self.put("[");
                    self.print(element)?;
                    self.put("]");
                    return Ok(());
                }
                (Some("Dictionary"), &[key, value]) if kind == Kind::BoundGenericStructure => {
                    self.put("[");
                    self.print(key)?;
                    self.put(" : ");
                    self.print(value)?;
                    self.put("]");
                    return Ok(());
                }
                _ => {}
            }
        }
        self.print(base)?;
        self.put("<");
        self.print_separated(self.arena.children(arguments), ", ")?;
        self.put(">");
        Ok(())
    }

    // -- Lowered function types --

    fn print_impl_function(&mut self, node: NodeId) -> Printed {
        let children = self.arena.children(node);
        let mut position = 0;
        if children
            .first()
            .is_some_and(|&first| self.arena.kind(first) == Kind::ImplEscaping)
        {
            self.put("@escaping ");
            position += 1;
        }
        let callee = *children.get(position).ok_or(Unprintable)?;
        if self.arena.kind(callee) != Kind::ImplConvention {
            return Err(Unprintable);
        }
        self.print(callee)?;
        position += 1;
        self.put(" (");
        let mut slot = 0;
        for &part in &children[position..] {
            if self.arena.kind(part) != Kind::ImplParameter {
                break;
            }
            if slot > 0 {
                self.put(", ");
            }
            self.print(part)?;
            slot += 1;
            position += 1;
        }
        self.put(") -> (");
        slot = 0;
        for &part in &children[position..] {
            if self.arena.kind(part) != Kind::ImplResult {
                return Err(Unprintable);
            }
            if slot > 0 {
                self.put(", ");
            }
            self.print(part)?;
            slot += 1;
        }
        self.put(")");
        Ok(())
    }

    // -- Witnesses and conformances --

    fn print_conformance(&mut self, node: NodeId) -> Printed {
        let ty = self.child(node, 0)?;
        let protocol = self.child(node, 1)?;
        let module = self.text_of(self.child(node, 2)?)?;
        self.print(ty)?;
        self.put(" : ");
        self.print(protocol)?;
        self.put(" in ");
        self.put(module);
        Ok(())
    }

    fn print_lazy_witness_entry(&mut self, node: NodeId, prefix: &str) -> Printed {
        let ty = self.child(node, 0)?;
        let conformance = self.child(node, 1)?;
        self.put(prefix);
        self.print(ty)?;
        self.put(" and conformance ");
        self.print(conformance)
    }

    // -- Thunks and specializations --

    fn print_reabstraction(&mut self, node: NodeId, phrase: &str) -> Printed {
        self.put(phrase);
        let (signature, from, to) = match *self.arena.children(node) {
            [from, to] => (None, from, to),
            [signature, from, to] => (Some(signature), from, to),
            _ => return Err(Unprintable),
        };
        if let Some(signature) = signature {
            self.put(" ");
            self.print(signature)?;
        }
        self.put(" from ");
        self.print(from)?;
        self.put(" to ");
        self.print(to)
    }

    fn print_generic_specialization(&mut self, node: NodeId, phrase: &str) -> Printed {
        self.put(phrase);
        self.put(" <");
        let mut first = true;
        for &part in self.arena.children(node) {
            match self.arena.kind(part) {
                Kind::IsSerialized => {
                    self.put_specialization_separator(&mut first);
                    self.put("serialized");
                }
                Kind::SpecializationPassID => {}
                Kind::GenericSpecializationParam => {
                    self.put_specialization_separator(&mut first);
                    self.print(part)?;
                }
                _ => return Err(Unprintable),
            }
        }
        self.put(">");
        Ok(())
    }

    fn print_function_signature_specialization(&mut self, node: NodeId) -> Printed {
        self.put("function signature specialization <");
        let mut first = true;
        for &part in self.arena.children(node) {
            match self.arena.kind(part) {
                Kind::IsSerialized => {
                    self.put_specialization_separator(&mut first);
                    self.put("serialized");
                }
                Kind::SpecializationPassID => {}
                Kind::FunctionSignatureSpecializationParam => {
                    if self.arena.children(part).is_empty() {
                        continue;
                    }
                    let ordinal = self.index_of(part)?;
                    self.put_specialization_separator(&mut first);
                    self.put("Arg[");
                    self.put_number(ordinal);
                    self.put("] = ");
                    self.print_func_spec_parts(part)?;
                }
                Kind::FunctionSignatureSpecializationReturn => {
                    self.put_specialization_separator(&mut first);
                    self.put("Return = ");
                    self.print_func_spec_parts(part)?;
                }
                _ => return Err(Unprintable),
            }
        }
        self.put(">");
        Ok(())
    }

    fn put_specialization_separator(&mut self, first: &mut bool) {
        if !*first {
            self.put(", ");
        }
        *first = false;
    }

    fn print_func_spec_parts(&mut self, param: NodeId) -> Printed {
        let kind_node = self.child(param, 0)?;
        let value = self.index_of(kind_node)?;
        if value == func_spec::CONSTANT_PROP_INTEGER {
            let payload = self.text_of(self.child(param, 1)?)?;
            self.put("[Constant Propagated Integer : ");
            self.put(payload);
            self.put("]");
            return Ok(());
        }
        let mut remaining = value;
        let mut first = true;
        for (flag, label) in [
            (func_spec::DEAD, "Dead"),
            (func_spec::OWNED_TO_GUARANTEED, "Owned To Guaranteed"),
            (func_spec::EXPLODED, "Exploded"),
        ] {
            if remaining & flag != 0 {
                if !first {
                    self.put(" and ");
                }
                first = false;
                self.put(label);
                remaining &= !flag;
            }
        }
        if remaining != 0 || first {
            return Err(Unprintable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
