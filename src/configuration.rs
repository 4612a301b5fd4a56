//! Service configuration records and the registry that looks them up.
//!
//! Spec.md §1 places "the configuration builder API" out of scope; the core
//! consumes a finished, immutable [`ConfigurationRegistry`]. This module
//! defines the record shape (`ServiceConfiguration`, spec.md §3) and the
//! trait the engine queries; [`crate::registration::ContainerBuilder`]
//! produces the concrete registry used by the bundled [`Container`](crate::container::Container).

use std::collections::HashMap;
use std::sync::Arc;

use crate::container::Container;
use crate::error::DiResult;
use crate::service_name::{ContractName, ServiceName, TypeRef};
use crate::AnyArc;

/// A per-parameter override, keyed by parameter name on
/// [`ServiceConfiguration::parameter_overrides`].
pub enum ParameterOverride {
    /// A constant value to bind directly.
    ValueAssigned(AnyArc),
    /// A sub-factory invoked to build the argument.
    Factory(Arc<dyn Fn(&Container) -> DiResult<AnyArc> + Send + Sync>),
    /// Resolve a specific implementation type instead of the declared one.
    ImplementationType(TypeRef),
}

/// All recognized, independent configuration options for one `(type,
/// contracts)` service identity (spec.md §3).
#[derive(Default)]
pub struct ServiceConfiguration {
    /// A concrete instance to reuse; mutually exclusive with the factory fields.
    pub implementation_assigned: Option<AnyArc>,
    /// `(Container) -> object`.
    pub factory: Option<Arc<dyn Fn(&Container) -> DiResult<AnyArc> + Send + Sync>>,
    /// `(Container, requesting parent type) -> object`; the produced
    /// service's identity incorporates the parent type as an extra contract.
    pub factory_with_target: Option<Arc<dyn Fn(&Container, Option<TypeRef>) -> DiResult<AnyArc> + Send + Sync>>,
    /// Explicit candidate list, overriding automatic inheritance scan.
    pub implementation_types: Option<Vec<TypeRef>>,
    pub ignored_implementation: bool,
    pub dont_use: bool,
    pub container_owns_instance: bool,
    /// Post-construction predicate used to drop unwanted results.
    pub instance_filter: Option<Arc<dyn Fn(&AnyArc) -> bool + Send + Sync>>,
    /// Names to resolve in addition to constructor parameters.
    pub implicit_dependencies: Vec<ServiceName>,
    pub parameter_overrides: HashMap<&'static str, ParameterOverride>,
    /// Union explicit `implementation_types` with scanned inheritors.
    pub use_autosearch: bool,
    /// Stand-in for the source's `PerRequest` lifestyle marker: forbids `resolve`.
    pub per_request: bool,
    /// Post-construction hook run once by [`crate::runner::Runner`], in
    /// dependency order. Rust has no way to ask an `Arc<dyn Any>` "do you
    /// implement a runnable interface", so the hook is registered explicitly
    /// instead of discovered by downcasting.
    pub run_hook: Option<Arc<dyn Fn(&AnyArc) + Send + Sync>>,
    /// Stand-in for the source's annotated-slot `DependenciesInjector`:
    /// injects into an already-constructed instance via `Container::build_up`.
    pub build_up_hook: Option<Arc<dyn Fn(&Container, &AnyArc) -> DiResult<()> + Send + Sync>>,
    /// Disposal hook run by `Container::dispose` for instances this
    /// configuration marked `container_owns_instance`.
    pub dispose_hook: Option<Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>>,
    /// Async alternative to `dispose_hook`, run by `Container::dispose_async`.
    /// Mutually exclusive with `dispose_hook` in practice; both are honored
    /// if set, in that order.
    pub async_dispose: Option<Arc<dyn crate::lifecycle::AsyncDisposable>>,
}

impl ServiceConfiguration {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Immutable lookup: `(type, contract stack) -> ServiceConfiguration?`
/// (spec.md §4's `ConfigurationRegistry`).
///
/// `get` also reports which of the queried contracts it actually consulted
/// to select the configuration — the engine has no other way to learn this,
/// since contract-scoped overlay resolution is internal to the registry.
pub trait ConfigurationRegistry: Send + Sync {
    fn get(
        &self,
        type_ref: TypeRef,
        contracts: &[ContractName],
    ) -> (Option<Arc<ServiceConfiguration>>, Vec<ContractName>);

    /// If `contract` is a union alias, its member contracts.
    fn union_members(&self, contract: &ContractName) -> Option<Vec<ContractName>>;
}
