//! Constructor discovery and inheritance scanning — consumed, not implemented,
//! by the resolution engine (spec.md §6: `TypeIntrospector`, `InheritanceIndex`).
//!
//! Rust has no runtime reflection, so these traits are backed by data recorded
//! ahead of time by [`crate::registration::ContainerBuilder`] rather than by
//! scanning assemblies. The engine only ever calls through the trait objects
//! below, so a caller can supply a different backing (e.g. one driven by a
//! derive macro) without touching `resolver.rs`/`instantiator.rs`.

use std::sync::Arc;

use crate::service_name::{ContractName, TypeRef};
use crate::AnyArc;

/// Per-parameter markers the source reads off constructor attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamAttributes(u8);

impl ParamAttributes {
    pub const OPTIONAL: ParamAttributes = ParamAttributes(0b0001);
    pub const CAN_BE_NULL: ParamAttributes = ParamAttributes(0b0010);
    pub const FROM_RESOURCE: ParamAttributes = ParamAttributes(0b0100);

    pub const fn empty() -> Self {
        ParamAttributes(0)
    }

    pub fn contains(self, other: ParamAttributes) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ParamAttributes {
    type Output = ParamAttributes;
    fn bitor(self, rhs: ParamAttributes) -> ParamAttributes {
        ParamAttributes(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ParamAttributes {
    fn bitor_assign(&mut self, rhs: ParamAttributes) {
        self.0 |= rhs.0;
    }
}

/// Metadata about one constructor parameter.
#[derive(Clone)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub type_ref: TypeRef,
    pub has_default_value: bool,
    pub default_value: Option<AnyArc>,
    pub attributes: ParamAttributes,
    /// Contract names attached to this parameter (e.g. `#[contract("c1")]`).
    pub contracts: Vec<ContractName>,
    /// Name of the embedded resource this parameter should be bound to, if
    /// `attributes` contains `FROM_RESOURCE`.
    pub resource_name: Option<&'static str>,
}

impl ParameterInfo {
    pub fn new(name: &'static str, type_ref: TypeRef) -> Self {
        Self {
            name,
            type_ref,
            has_default_value: false,
            default_value: None,
            attributes: ParamAttributes::empty(),
            contracts: Vec::new(),
            resource_name: None,
        }
    }

    pub fn with_default(mut self, value: AnyArc) -> Self {
        self.has_default_value = true;
        self.default_value = Some(value);
        self
    }

    pub fn optional(mut self) -> Self {
        self.attributes |= ParamAttributes::OPTIONAL;
        self
    }

    pub fn can_be_null(mut self) -> Self {
        self.attributes |= ParamAttributes::CAN_BE_NULL;
        self
    }

    pub fn from_resource(mut self, name: &'static str) -> Self {
        self.attributes |= ParamAttributes::FROM_RESOURCE;
        self.resource_name = Some(name);
        self
    }

    pub fn with_contracts(mut self, contracts: Vec<ContractName>) -> Self {
        self.contracts = contracts;
        self
    }
}

/// A discovered constructor: its formal parameters plus a closure that
/// invokes it given already-resolved argument values in parameter order.
pub struct ConstructorInfo {
    pub params: Vec<ParameterInfo>,
    pub invoke: Arc<dyn Fn(&[AnyArc]) -> AnyArc + Send + Sync>,
}

/// Errors `get_constructor` can report, matching spec.md §4.5/§7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorError {
    NoPublicConstructor,
    ManyPublicConstructors,
}

impl std::fmt::Display for ConstructorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructorError::NoPublicConstructor => write!(f, "no public ctors"),
            ConstructorError::ManyPublicConstructors => write!(f, "many public ctors"),
        }
    }
}

/// The narrow reflective surface the resolution engine relies on.
///
/// Spec.md §1 places reflection itself out of scope; this trait is the seam
/// the engine talks through. [`crate::registration::ContainerBuilder`] builds
/// the default implementation from explicit registrations.
pub trait TypeIntrospector: Send + Sync {
    fn get_constructor(&self, type_ref: TypeRef) -> Result<Arc<ConstructorInfo>, ConstructorError>;

    /// True for primitives / simple value types the container refuses to construct.
    fn is_simple_type(&self, type_ref: TypeRef) -> bool;

    /// True for delegate/function-pointer types, rejected by `instantiate_implementation`.
    fn is_delegate(&self, type_ref: TypeRef) -> bool;

    /// Splits an enumerable request (`Vec<T>`-shaped) into its element type.
    fn unwrap_enumerable(&self, type_ref: TypeRef) -> (TypeRef, bool);

    /// True if `type_ref` is an open generic definition.
    ///
    /// Rust types registered through [`crate::registration::ContainerBuilder`]
    /// are always concrete, so the bundled introspector always answers
    /// `false`; retained for interface fidelity with spec.md §4.5.
    fn is_open_generic(&self, type_ref: TypeRef) -> bool {
        let _ = type_ref;
        false
    }

    /// Attempts to close an open generic implementation against a concrete
    /// requested type. Always `None` with the bundled introspector (see
    /// [`Self::is_open_generic`]).
    fn try_close_by_pattern(
        &self,
        open: TypeRef,
        pattern: TypeRef,
        concrete: TypeRef,
    ) -> Option<TypeRef> {
        let _ = (open, pattern, concrete);
        None
    }

    /// Fetches an embedded resource declared on a `FromResource`-marked
    /// `Stream` parameter.
    fn get_manifest_resource_stream(&self, type_ref: TypeRef, name: &str) -> Option<Vec<u8>>;

    /// True if `type_ref` carries a `PerRequest` lifestyle marker (forbids `resolve`).
    fn is_per_request(&self, type_ref: TypeRef) -> bool {
        let _ = type_ref;
        false
    }

    /// True if `type_ref` was registered as an interface/trait contract
    /// rather than a constructible implementation — routes `instantiate`
    /// through `instantiate_interface` instead of `instantiate_implementation`.
    fn is_abstract(&self, type_ref: TypeRef) -> bool {
        let _ = type_ref;
        false
    }
}

/// Scans for concrete implementations of an abstract/interface type.
///
/// Out of scope per spec.md §1 ("the assembly-scanner and inheritance-hierarchy
/// index"); consumed here as a narrow trait.
pub trait InheritanceIndex: Send + Sync {
    fn inheritors_of(&self, type_ref: TypeRef) -> Vec<TypeRef>;

    /// Maps an internal dispatch identity (e.g. an interface-binding marker
    /// type) back to the concrete implementation type a caller registered.
    /// Identity for anything that isn't such a stand-in.
    fn underlying_implementation(&self, type_ref: TypeRef) -> TypeRef {
        type_ref
    }
}
