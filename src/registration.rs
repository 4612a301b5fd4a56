//! `ContainerBuilder`: the explicit, ahead-of-time registration API that
//! stands in for the source's assembly scanner (spec.md §1 places scanning
//! itself out of scope). Produces the concrete `ConfigurationRegistry`,
//! `TypeIntrospector`, and `InheritanceIndex` the bundled [`Container`] runs
//! against.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::AHashSet;
use once_cell::sync::Lazy;

use crate::configuration::{ConfigurationRegistry, ServiceConfiguration};
use crate::container::Container;
use crate::error::DiResult;
use crate::introspection::{ConstructorError, ConstructorInfo, InheritanceIndex, TypeIntrospector};
use crate::observer::DiObserver;
use crate::service_name::{ContractName, ContractStack, TypeRef};
use crate::AnyArc;

/// Per-(interface, implementation) marker type, used only to give each
/// coercion its own `TypeRef` identity in the inheritance index — never
/// constructed. `Any::downcast` can only recover a `Sized` target, so a
/// trait object can't be the resolved type itself; instead the coercion's
/// factory produces `Arc::new(coerced) as AnyArc` where `coerced: Arc<I>`,
/// and callers recover it through [`Container::resolve_trait`].
struct InterfaceBinding<I: ?Sized + 'static, Impl: 'static> {
    _interface: std::marker::PhantomData<fn() -> *const I>,
    _impl: std::marker::PhantomData<Impl>,
}

struct ConfigEntry {
    type_ref: TypeRef,
    required: ContractStack,
    config: Arc<ServiceConfiguration>,
}

struct DefaultRegistry {
    entries: Vec<ConfigEntry>,
    unions: HashMap<ContractName, Vec<ContractName>>,
}

impl ConfigurationRegistry for DefaultRegistry {
    fn get(&self, type_ref: TypeRef, contracts: &[ContractName]) -> (Option<Arc<ServiceConfiguration>>, Vec<ContractName>) {
        let mut best: Option<&ConfigEntry> = None;
        for entry in &self.entries {
            if entry.type_ref != type_ref {
                continue;
            }
            let matches = entry.required.iter().all(|r| contracts.iter().any(|c| c == r));
            if !matches {
                continue;
            }
            if best.map(|b| entry.required.len() > b.required.len()).unwrap_or(true) {
                best = Some(entry);
            }
        }
        match best {
            Some(entry) => (Some(entry.config.clone()), entry.required.iter().cloned().collect()),
            None => (None, Vec::new()),
        }
    }

    fn union_members(&self, contract: &ContractName) -> Option<Vec<ContractName>> {
        self.unions.get(contract).cloned()
    }
}

struct DefaultIntrospector {
    constructors: HashMap<TypeRef, Arc<ConstructorInfo>>,
    simple_types: AHashSet<TypeRef>,
    abstract_types: AHashSet<TypeRef>,
    enumerable_of: HashMap<TypeRef, TypeRef>,
}

impl TypeIntrospector for DefaultIntrospector {
    fn get_constructor(&self, type_ref: TypeRef) -> Result<Arc<ConstructorInfo>, ConstructorError> {
        self.constructors.get(&type_ref).cloned().ok_or(ConstructorError::NoPublicConstructor)
    }

    fn is_simple_type(&self, type_ref: TypeRef) -> bool {
        self.simple_types.contains(&type_ref)
    }

    fn is_delegate(&self, _type_ref: TypeRef) -> bool {
        false
    }

    fn unwrap_enumerable(&self, type_ref: TypeRef) -> (TypeRef, bool) {
        match self.enumerable_of.get(&type_ref) {
            Some(element) => (*element, true),
            None => (type_ref, false),
        }
    }

    fn get_manifest_resource_stream(&self, _type_ref: TypeRef, _name: &str) -> Option<Vec<u8>> {
        None
    }

    fn is_abstract(&self, type_ref: TypeRef) -> bool {
        self.abstract_types.contains(&type_ref)
    }
}

struct DefaultInheritanceIndex {
    inheritors: HashMap<TypeRef, Vec<TypeRef>>,
    marker_to_impl: HashMap<TypeRef, TypeRef>,
}

impl InheritanceIndex for DefaultInheritanceIndex {
    fn inheritors_of(&self, type_ref: TypeRef) -> Vec<TypeRef> {
        self.inheritors.get(&type_ref).cloned().unwrap_or_default()
    }

    fn underlying_implementation(&self, type_ref: TypeRef) -> TypeRef {
        self.marker_to_impl.get(&type_ref).copied().unwrap_or(type_ref)
    }
}

/// Accumulates registrations, then [`build`](ContainerBuilder::build)s an
/// immutable [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    entries: Vec<ConfigEntry>,
    unions: HashMap<ContractName, Vec<ContractName>>,
    constructors: HashMap<TypeRef, Arc<ConstructorInfo>>,
    simple_types: AHashSet<TypeRef>,
    abstract_types: AHashSet<TypeRef>,
    enumerable_of: HashMap<TypeRef, TypeRef>,
    inheritors: HashMap<TypeRef, Vec<TypeRef>>,
    marker_to_impl: HashMap<TypeRef, TypeRef>,
    observers: Vec<Arc<dyn DiObserver>>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.seed_primitive_types();
        builder
    }

    fn seed_primitive_types(&mut self) {
        static DEFAULT_SIMPLE_TYPES: Lazy<AHashSet<TypeRef>> = Lazy::new(|| {
            macro_rules! seed {
                ($($t:ty),+ $(,)?) => {{
                    let mut set = AHashSet::default();
                    $(set.insert(TypeRef::of::<$t>());)+
                    set
                }};
            }
            seed!(bool, char, String, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64)
        });
        self.simple_types.extend(DEFAULT_SIMPLE_TYPES.iter().copied());
    }

    /// Registers `T`'s constructor: its parameters, in order, plus a closure
    /// that builds `T` from already-resolved argument values.
    pub fn register_constructor<T: 'static>(
        &mut self,
        params: Vec<crate::introspection::ParameterInfo>,
        invoke: impl Fn(&[AnyArc]) -> AnyArc + Send + Sync + 'static,
    ) -> &mut Self {
        self.constructors.insert(TypeRef::of::<T>(), Arc::new(ConstructorInfo { params, invoke: Arc::new(invoke) }));
        self
    }

    /// Registers `configuration` for `T`, scoped to `contracts` (empty for
    /// the unscoped default). Later registrations with a more specific
    /// (longer) contract requirement win ties at lookup time.
    pub fn register_configuration<T: 'static>(&mut self, contracts: &[&str], configuration: ServiceConfiguration) -> DiResult<&mut Self> {
        let required: ContractStack = contracts.iter().map(|c| ContractName::new(*c)).collect::<DiResult<_>>()?;
        self.entries.push(ConfigEntry { type_ref: TypeRef::of::<T>(), required, config: Arc::new(configuration) });
        Ok(self)
    }

    /// Marks trait `I` as an interface with `Impl` as one of its
    /// implementations: resolving `I` considers `Impl` a candidate,
    /// resolving `Impl` via `coerce` into `Arc<I>` once `Impl` itself
    /// resolves. See [`Container::resolve_trait`]/[`Container::resolve_all_trait`]
    /// for the corresponding lookup.
    pub fn register_interface<I: ?Sized + 'static, Impl: 'static>(
        &mut self,
        coerce: impl Fn(Arc<Impl>) -> Arc<I> + Send + Sync + 'static,
    ) -> &mut Self {
        let interface_type = TypeRef::of::<I>();
        if self.abstract_types.insert(interface_type) {
            // `instantiate` only reaches the `is_abstract` dispatch once a
            // configuration exists for the type at all (`resolve_build`
            // errors out on `None` before that check runs), so `I` itself
            // needs a bare default entry the first time it's seen.
            self.entries.push(ConfigEntry { type_ref: interface_type, required: ContractStack::new(), config: Arc::new(ServiceConfiguration::new()) });
        }
        let binding_type = TypeRef::of::<InterfaceBinding<I, Impl>>();
        self.inheritors.entry(interface_type).or_default().push(binding_type);
        self.marker_to_impl.insert(binding_type, TypeRef::of::<Impl>());

        let mut config = ServiceConfiguration::new();
        config.factory = Some(Arc::new(move |container: &Container| {
            let instance = container.resolve::<Impl>(&[]).try_instance()?;
            let coerced: Arc<I> = coerce(instance);
            Ok(Arc::new(coerced) as AnyArc)
        }));
        self.entries.push(ConfigEntry { type_ref: binding_type, required: ContractStack::new(), config: Arc::new(config) });
        self
    }

    /// Marks `T` a primitive the engine refuses to construct on its own.
    pub fn register_simple_type<T: 'static>(&mut self) -> &mut Self {
        self.simple_types.insert(TypeRef::of::<T>());
        self
    }

    /// Marks `Vec<T>` as the enumerable wrapper for `T`, so constructor
    /// parameters typed `Vec<T>` resolve every registered `T` instead of one.
    pub fn register_enumerable<T: 'static>(&mut self) -> &mut Self {
        self.enumerable_of.insert(TypeRef::of::<Vec<T>>(), TypeRef::of::<T>());
        self
    }

    /// Registers `name` as a union alias over `members`; resolving a
    /// contract stack ending in `name` expands into one resolution per
    /// member (spec.md §4.1/§4.4 step 7).
    pub fn register_union(&mut self, name: &str, members: &[&str]) -> DiResult<&mut Self> {
        let key = ContractName::new(name)?;
        let values: Vec<ContractName> = members.iter().map(|m| ContractName::new(*m)).collect::<DiResult<_>>()?;
        self.unions.insert(key, values);
        Ok(self)
    }

    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    /// Builds just the configuration registry, discarding the rest —
    /// for overlaying onto an existing container via `Container::clone_with`
    /// rather than producing a standalone one.
    pub fn into_registry(self) -> Arc<dyn ConfigurationRegistry> {
        Arc::new(DefaultRegistry { entries: self.entries, unions: self.unions })
    }

    pub fn build(self) -> Container {
        let registry = Arc::new(DefaultRegistry { entries: self.entries, unions: self.unions });
        let introspector = Arc::new(DefaultIntrospector {
            constructors: self.constructors,
            simple_types: self.simple_types,
            abstract_types: self.abstract_types,
            enumerable_of: self.enumerable_of,
        });
        let inheritance = Arc::new(DefaultInheritanceIndex { inheritors: self.inheritors, marker_to_impl: self.marker_to_impl });
        Container::new(registry, introspector, inheritance, self.observers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_configuration_is_found() {
        let mut builder = ContainerBuilder::new();
        builder.register_configuration::<u32>(&[], ServiceConfiguration::new()).unwrap();
        let registry = DefaultRegistry { entries: builder.entries, unions: builder.unions };
        let (config, consulted) = registry.get(TypeRef::of::<u32>(), &[]);
        assert!(config.is_some());
        assert!(consulted.is_empty());
    }

    #[test]
    fn more_specific_entry_wins() {
        let mut builder = ContainerBuilder::new();
        builder.register_configuration::<u32>(&[], ServiceConfiguration::new()).unwrap();
        let mut specific = ServiceConfiguration::new();
        specific.dont_use = true;
        builder.register_configuration::<u32>(&["primary"], specific).unwrap();
        let registry = DefaultRegistry { entries: builder.entries, unions: builder.unions };
        let primary = ContractName::new("primary").unwrap();
        let (config, consulted) = registry.get(TypeRef::of::<u32>(), &[primary]);
        assert!(config.unwrap().dont_use);
        assert_eq!(consulted.len(), 1);
    }
}
