//! Node kinds and their shape contracts.
//!
//! Every node in a demangle tree carries a [`Kind`]. The kind determines
//! which payload class the node may carry and how many children it may
//! have; those rules live in [`Kind::contract`] and are checked by
//! `node::validate` rather than being scattered through consumers.
//!
//! Predicates like [`Kind::is_context`] mirror the grammar's categories:
//! a production that says "pop a context" accepts exactly the kinds for
//! which `is_context` returns true.

/// Payload class a kind is allowed to carry.
///
/// A node never carries both a text and an index payload; kinds whose
/// payload is `NoPayload` express all structure through children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadContract {
    /// No payload; structure is children-only.
    NoPayload,
    /// Owned text (identifiers, module names, operator spellings).
    Text,
    /// Unsigned integer (indices, discriminators, witness codes).
    Index,
}

/// Allowed child count for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildContract {
    /// Exactly `n` children.
    Exact(u8),
    /// At least `n` children.
    AtLeast(u8),
    /// Between `lo` and `hi` children, inclusive.
    Between(u8, u8),
    /// Any number of children, including none.
    Any,
}

impl ChildContract {
    /// Whether `count` satisfies this contract.
    #[must_use]
    pub fn admits(self, count: usize) -> bool {
        match self {
            ChildContract::Exact(n) => count == usize::from(n),
            ChildContract::AtLeast(n) => count >= usize::from(n),
            ChildContract::Between(lo, hi) => {
                (usize::from(lo)..=usize::from(hi)).contains(&count)
            }
            ChildContract::Any => true,
        }
    }
}

/// The kind of a demangle-tree node.
///
/// The set is closed: the demangler only ever produces these kinds, and
/// the remangler and printer match on them exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    // -- Structure --
    Global,
    Type,
    TypeMangling,
    TypeList,
    EmptyList,
    FirstElementMarker,
    VariadicMarker,
    Index,
    Number,

    // -- Names --
    Identifier,
    LocalDeclName,
    PrivateDeclName,
    PrefixOperator,
    InfixOperator,
    PostfixOperator,

    // -- Contexts and nominal types --
    Module,
    Class,
    Structure,
    Enum,
    Protocol,
    TypeAlias,
    Extension,

    // -- Entities --
    Function,
    Variable,
    Subscript,
    Constructor,
    Allocator,
    Destructor,
    Deallocator,
    Static,
    ExplicitClosure,
    ImplicitClosure,
    DefaultArgumentInitializer,
    Getter,
    Setter,
    ReadAccessor,
    ModifyAccessor,
    WillSet,
    DidSet,
    LabelList,

    // -- Types --
    FunctionType,
    ArgumentTuple,
    ReturnType,
    Tuple,
    TupleElement,
    TupleElementName,
    Metatype,
    InOut,
    Shared,
    Owned,
    Weak,
    Unowned,
    Unmanaged,
    ProtocolList,
    BoundGenericClass,
    BoundGenericStructure,
    BoundGenericEnum,
    BoundGenericProtocol,
    BoundGenericTypeAlias,
    BuiltinTypeName,
    AsyncAnnotation,
    ThrowsAnnotation,
    ConcurrentFunctionType,

    // -- Generics --
    DependentGenericSignature,
    DependentGenericParamCount,
    DependentGenericParamType,
    DependentGenericType,
    DependentGenericConformanceRequirement,
    DependentGenericSameTypeRequirement,
    DependentGenericLayoutRequirement,
    DependentGenericBaseClassRequirement,
    DependentMemberType,
    DependentAssociatedTypeRef,

    // -- Lowered function types --
    ImplFunctionType,
    ImplParameter,
    ImplResult,
    ImplConvention,
    ImplEscaping,

    // -- Metadata and witnesses --
    TypeMetadata,
    TypeMetadataAccessFunction,
    NominalTypeDescriptor,
    ClassMetadataBaseOffset,
    FullTypeMetadata,
    TypeMetadataLazyCache,
    Metaclass,
    ProtocolConformance,
    ProtocolConformanceDescriptor,
    ProtocolWitnessTable,
    ProtocolWitnessTableAccessor,
    LazyProtocolWitnessTableAccessor,
    LazyProtocolWitnessTableCacheVariable,
    GenericProtocolWitnessTable,
    GenericProtocolWitnessTableInstantiationFunction,
    BaseWitnessTableAccessor,
    ValueWitness,
    ValueWitnessTable,
    FieldOffset,
    Directness,
    EnumCase,

    // -- Thunks and attributes --
    ObjCAttribute,
    NonObjCAttribute,
    DynamicAttribute,
    DirectMethodReferenceAttribute,
    PartialApplyForwarder,
    PartialApplyObjCForwarder,
    ReabstractionThunk,
    ReabstractionThunkHelper,
    ProtocolWitness,
    DispatchThunk,
    MethodDescriptor,
    MergedFunction,

    // -- Specializations --
    GenericSpecialization,
    GenericSpecializationNotReAbstracted,
    GenericSpecializationPrespecialized,
    GenericPartialSpecialization,
    GenericPartialSpecializationNotReAbstracted,
    GenericSpecializationParam,
    FunctionSignatureSpecialization,
    FunctionSignatureSpecializationParam,
    FunctionSignatureSpecializationParamKind,
    FunctionSignatureSpecializationParamPayload,
    FunctionSignatureSpecializationReturn,
    SpecializationPassID,
    IsSerialized,
}

impl Kind {
    /// Kinds that can appear on the context chain of an entity.
    #[must_use]
    pub fn is_context(self) -> bool {
        matches!(
            self,
            Kind::Module
                | Kind::Class
                | Kind::Structure
                | Kind::Enum
                | Kind::Protocol
                | Kind::TypeAlias
                | Kind::Extension
                | Kind::Function
                | Kind::Variable
                | Kind::Subscript
                | Kind::Constructor
                | Kind::Allocator
                | Kind::Destructor
                | Kind::Deallocator
                | Kind::Static
                | Kind::ExplicitClosure
                | Kind::ImplicitClosure
                | Kind::DefaultArgumentInitializer
                | Kind::Getter
                | Kind::Setter
                | Kind::ReadAccessor
                | Kind::ModifyAccessor
                | Kind::WillSet
                | Kind::DidSet
        )
    }

    /// Kinds acceptable where the grammar pops "a declaration name".
    #[must_use]
    pub fn is_decl_name(self) -> bool {
        matches!(
            self,
            Kind::Identifier
                | Kind::LocalDeclName
                | Kind::PrivateDeclName
                | Kind::PrefixOperator
                | Kind::InfixOperator
                | Kind::PostfixOperator
        )
    }

    /// Nominal-type and alias kinds (the `C`/`V`/`O`/`P`/`a` family).
    #[must_use]
    pub fn is_any_generic(self) -> bool {
        matches!(
            self,
            Kind::Class | Kind::Structure | Kind::Enum | Kind::Protocol | Kind::TypeAlias
        )
    }

    /// Entity kinds: things with a context chain that name program objects.
    #[must_use]
    pub fn is_entity(self) -> bool {
        matches!(
            self,
            Kind::Function
                | Kind::Variable
                | Kind::Subscript
                | Kind::Constructor
                | Kind::Allocator
                | Kind::Destructor
                | Kind::Deallocator
                | Kind::Static
                | Kind::ExplicitClosure
                | Kind::ImplicitClosure
                | Kind::DefaultArgumentInitializer
                | Kind::Getter
                | Kind::Setter
                | Kind::ReadAccessor
                | Kind::ModifyAccessor
                | Kind::WillSet
                | Kind::DidSet
        ) || self.is_any_generic()
    }

    /// Suffix operators that attach to a whole symbol rather than to the
    /// node stack. These become the leading children of `Global`.
    #[must_use]
    pub fn is_function_attribute(self) -> bool {
        matches!(
            self,
            Kind::ObjCAttribute
                | Kind::NonObjCAttribute
                | Kind::DynamicAttribute
                | Kind::DirectMethodReferenceAttribute
                | Kind::MergedFunction
                | Kind::PartialApplyForwarder
                | Kind::PartialApplyObjCForwarder
                | Kind::GenericSpecialization
                | Kind::GenericSpecializationNotReAbstracted
                | Kind::GenericSpecializationPrespecialized
                | Kind::GenericPartialSpecialization
                | Kind::GenericPartialSpecializationNotReAbstracted
                | Kind::FunctionSignatureSpecialization
        )
    }

    /// Generic-requirement kinds collected by signature productions.
    #[must_use]
    pub fn is_requirement(self) -> bool {
        matches!(
            self,
            Kind::DependentGenericConformanceRequirement
                | Kind::DependentGenericSameTypeRequirement
                | Kind::DependentGenericLayoutRequirement
                | Kind::DependentGenericBaseClassRequirement
        )
    }

    /// Specialization kinds a `-strip-specialization` pass removes.
    #[must_use]
    pub fn is_specialization(self) -> bool {
        matches!(
            self,
            Kind::GenericSpecialization
                | Kind::GenericSpecializationNotReAbstracted
                | Kind::GenericSpecializationPrespecialized
                | Kind::GenericPartialSpecialization
                | Kind::GenericPartialSpecializationNotReAbstracted
                | Kind::FunctionSignatureSpecialization
        )
    }

    /// The payload and child-count contract for this kind.
    #[must_use]
    pub fn contract(self) -> (PayloadContract, ChildContract) {
        use ChildContract as C;
        use PayloadContract as P;
        match self {
            // Structure
            Kind::Global => (P::NoPayload, C::AtLeast(1)),
            Kind::Type
            | Kind::TypeMangling
            | Kind::ProtocolList
            | Kind::ArgumentTuple
            | Kind::ReturnType => (P::NoPayload, C::Exact(1)),
            Kind::TypeList | Kind::Tuple | Kind::LabelList => (P::NoPayload, C::Any),
            Kind::EmptyList | Kind::FirstElementMarker | Kind::VariadicMarker => {
                (P::NoPayload, C::Exact(0))
            }
            Kind::Index | Kind::Number => (P::Index, C::Exact(0)),

            // Names
            Kind::Identifier
            | Kind::TupleElementName
            | Kind::BuiltinTypeName
            | Kind::PrefixOperator
            | Kind::InfixOperator
            | Kind::PostfixOperator
            | Kind::ImplConvention => (P::Text, C::Exact(0)),
            Kind::LocalDeclName => (P::NoPayload, C::Exact(2)),
            Kind::PrivateDeclName => (P::NoPayload, C::Between(1, 2)),

            // Contexts and nominals
            Kind::Module => (P::Text, C::Exact(0)),
            Kind::Class | Kind::Structure | Kind::Enum | Kind::Protocol | Kind::TypeAlias => {
                (P::NoPayload, C::Exact(2))
            }
            Kind::Extension => (P::NoPayload, C::Between(2, 3)),

            // Entities
            Kind::Function => (P::NoPayload, C::Between(3, 4)),
            Kind::Variable => (P::NoPayload, C::Exact(3)),
            Kind::Subscript => (P::NoPayload, C::Between(2, 3)),
            Kind::Constructor | Kind::Allocator => (P::NoPayload, C::Between(2, 4)),
            Kind::Destructor | Kind::Deallocator => (P::NoPayload, C::Exact(1)),
            Kind::Static
            | Kind::Getter
            | Kind::Setter
            | Kind::ReadAccessor
            | Kind::ModifyAccessor
            | Kind::WillSet
            | Kind::DidSet => (P::NoPayload, C::Exact(1)),
            Kind::ExplicitClosure | Kind::ImplicitClosure => (P::NoPayload, C::Exact(3)),
            Kind::DefaultArgumentInitializer => (P::NoPayload, C::Exact(2)),

            // Types
            Kind::FunctionType => (P::NoPayload, C::Between(2, 5)),
            Kind::TupleElement => (P::NoPayload, C::Between(1, 3)),
            Kind::Metatype
            | Kind::InOut
            | Kind::Shared
            | Kind::Owned
            | Kind::Weak
            | Kind::Unowned
            | Kind::Unmanaged => (P::NoPayload, C::Exact(1)),
            Kind::BoundGenericClass
            | Kind::BoundGenericStructure
            | Kind::BoundGenericEnum
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericTypeAlias => (P::NoPayload, C::Exact(2)),
            Kind::AsyncAnnotation | Kind::ThrowsAnnotation | Kind::ConcurrentFunctionType => {
                (P::NoPayload, C::Exact(0))
            }

            // Generics
            Kind::DependentGenericSignature => (P::NoPayload, C::AtLeast(1)),
            Kind::DependentGenericParamCount => (P::Index, C::Exact(0)),
            Kind::DependentGenericParamType | Kind::DependentGenericType => {
                (P::NoPayload, C::Exact(2))
            }
            Kind::DependentGenericConformanceRequirement
            | Kind::DependentGenericSameTypeRequirement
            | Kind::DependentGenericLayoutRequirement
            | Kind::DependentGenericBaseClassRequirement
            | Kind::DependentMemberType => (P::NoPayload, C::Exact(2)),
            Kind::DependentAssociatedTypeRef => (P::NoPayload, C::Between(1, 2)),

            // Lowered function types
            Kind::ImplFunctionType => (P::NoPayload, C::AtLeast(1)),
            Kind::ImplParameter | Kind::ImplResult => (P::NoPayload, C::Exact(2)),
            Kind::ImplEscaping => (P::NoPayload, C::Exact(0)),

            // Metadata and witnesses
            Kind::TypeMetadata
            | Kind::TypeMetadataAccessFunction
            | Kind::NominalTypeDescriptor
            | Kind::ClassMetadataBaseOffset
            | Kind::FullTypeMetadata
            | Kind::TypeMetadataLazyCache
            | Kind::Metaclass
            | Kind::ValueWitnessTable => (P::NoPayload, C::Exact(1)),
            Kind::ProtocolConformance => (P::NoPayload, C::Exact(3)),
            Kind::ProtocolConformanceDescriptor
            | Kind::ProtocolWitnessTable
            | Kind::ProtocolWitnessTableAccessor
            | Kind::GenericProtocolWitnessTable
            | Kind::GenericProtocolWitnessTableInstantiationFunction => {
                (P::NoPayload, C::Exact(1))
            }
            Kind::LazyProtocolWitnessTableAccessor
            | Kind::LazyProtocolWitnessTableCacheVariable
            | Kind::BaseWitnessTableAccessor => (P::NoPayload, C::Exact(2)),
            Kind::ValueWitness => (P::Index, C::Exact(1)),
            Kind::FieldOffset => (P::NoPayload, C::Exact(2)),
            Kind::Directness => (P::Index, C::Exact(0)),
            Kind::EnumCase => (P::NoPayload, C::Exact(1)),

            // Thunks and attributes
            Kind::ObjCAttribute
            | Kind::NonObjCAttribute
            | Kind::DynamicAttribute
            | Kind::DirectMethodReferenceAttribute
            | Kind::MergedFunction
            | Kind::IsSerialized => (P::NoPayload, C::Exact(0)),
            Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder => {
                (P::NoPayload, C::Any)
            }
            Kind::ReabstractionThunk | Kind::ReabstractionThunkHelper => {
                (P::NoPayload, C::Between(2, 3))
            }
            Kind::ProtocolWitness => (P::NoPayload, C::Exact(2)),
            Kind::DispatchThunk | Kind::MethodDescriptor => (P::NoPayload, C::Exact(1)),

            // Specializations
            Kind::GenericSpecialization
            | Kind::GenericSpecializationNotReAbstracted
            | Kind::GenericSpecializationPrespecialized
            | Kind::GenericPartialSpecialization
            | Kind::GenericPartialSpecializationNotReAbstracted
            | Kind::FunctionSignatureSpecialization => (P::NoPayload, C::AtLeast(1)),
            Kind::GenericSpecializationParam => (P::NoPayload, C::Exact(1)),
            Kind::FunctionSignatureSpecializationParam => (P::Index, C::Between(0, 2)),
            Kind::FunctionSignatureSpecializationReturn => (P::NoPayload, C::Between(1, 2)),
            Kind::FunctionSignatureSpecializationParamKind => (P::Index, C::Exact(0)),
            Kind::FunctionSignatureSpecializationParamPayload => (P::Text, C::Exact(0)),
            Kind::SpecializationPassID => (P::Index, C::Exact(0)),
        }
    }
}

/// Value witness wire codes and display names, in payload order: a
/// `ValueWitness` node's index payload is a position in this table.
pub(crate) const VALUE_WITNESSES: &[(&str, &str)] = &[
    ("CP", "initializeBufferWithCopyOfBuffer"),
    ("cp", "initializeWithCopy"),
    ("ca", "assignWithCopy"),
    ("tk", "initializeWithTake"),
    ("ta", "assignWithTake"),
    ("xx", "destroy"),
    ("xg", "getExtraInhabitantIndex"),
    ("xs", "storeExtraInhabitants"),
    ("ug", "getEnumTag"),
    ("up", "destructiveProjectEnumData"),
    ("ui", "destructiveInjectEnumTag"),
    ("et", "getEnumTagSinglePayload"),
    ("st", "storeEnumTagSinglePayload"),
];

/// Values carried by `FunctionSignatureSpecializationParamKind`. The
/// upper values are flags and may be combined; the constant-prop kinds
/// stand alone and are followed by a payload child.
pub(crate) mod func_spec {
    pub(crate) const CONSTANT_PROP_INTEGER: u64 = 2;
    pub(crate) const DEAD: u64 = 64;
    pub(crate) const OWNED_TO_GUARANTEED: u64 = 128;
    pub(crate) const EXPLODED: u64 = 256;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_includes_modules_and_entities() {
        assert!(Kind::Module.is_context());
        assert!(Kind::Class.is_context());
        assert!(Kind::Getter.is_context());
        assert!(!Kind::Type.is_context());
        assert!(!Kind::Identifier.is_context());
    }

    #[test]
    fn decl_names() {
        assert!(Kind::Identifier.is_decl_name());
        assert!(Kind::PrivateDeclName.is_decl_name());
        assert!(Kind::InfixOperator.is_decl_name());
        assert!(!Kind::Module.is_decl_name());
    }

    #[test]
    fn function_attributes_cover_specializations() {
        assert!(Kind::PartialApplyForwarder.is_function_attribute());
        assert!(Kind::GenericSpecialization.is_function_attribute());
        assert!(Kind::FunctionSignatureSpecialization.is_function_attribute());
        assert!(!Kind::Function.is_function_attribute());
    }

    #[test]
    fn contracts_constrain_payloads() {
        assert_eq!(Kind::Identifier.contract().0, PayloadContract::Text);
        assert_eq!(Kind::Index.contract().0, PayloadContract::Index);
        assert_eq!(Kind::Global.contract().0, PayloadContract::NoPayload);
    }

    #[test]
    fn child_contract_admits() {
        assert!(ChildContract::Exact(2).admits(2));
        assert!(!ChildContract::Exact(2).admits(3));
        assert!(ChildContract::AtLeast(1).admits(5));
        assert!(ChildContract::Between(1, 2).admits(2));
        assert!(!ChildContract::Between(1, 2).admits(0));
        assert!(ChildContract::Any.admits(0));
    }
}
