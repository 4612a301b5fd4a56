//! The public resolution surface: `Container`.
//!
//! Holds the collaborators the engine treats as narrow, injected interfaces
//! (spec.md §1) — a configuration registry, a type introspector, an
//! inheritance index — plus the cache and observers, and exposes
//! `resolve`/`create`/`get_implementations_of`/`build_up`/`dispose`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::arguments::ArgumentsMap;
use crate::builder::ContainerService;
use crate::cache::ServiceCache;
use crate::configuration::{ConfigurationRegistry, ServiceConfiguration};
use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::introspection::{InheritanceIndex, TypeIntrospector};
use crate::log::render_log;
use crate::observer::DiObserver;
use crate::resolved::{ResolvedService, ResolvedTrait};
use crate::resolver::resolve_core;
use crate::service_name::{ContractName, ServiceName, TypeRef};
use crate::AnyArc;

/// The resolution engine's root. Cheap to clone (everything behind `Arc`);
/// a clone shares the same cache and therefore the same singletons.
#[derive(Clone)]
pub struct Container {
    registry: Arc<dyn ConfigurationRegistry>,
    introspector: Arc<dyn TypeIntrospector>,
    inheritance: Arc<dyn InheritanceIndex>,
    cache: Arc<ServiceCache>,
    observers: Arc<Vec<Arc<dyn DiObserver>>>,
}

impl Container {
    pub fn new(
        registry: Arc<dyn ConfigurationRegistry>,
        introspector: Arc<dyn TypeIntrospector>,
        inheritance: Arc<dyn InheritanceIndex>,
        observers: Vec<Arc<dyn DiObserver>>,
    ) -> Self {
        Self {
            registry,
            introspector,
            inheritance,
            cache: Arc::new(ServiceCache::new()),
            observers: Arc::new(observers),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<dyn ConfigurationRegistry> {
        &self.registry
    }

    pub(crate) fn introspector(&self) -> &Arc<dyn TypeIntrospector> {
        &self.introspector
    }

    pub(crate) fn inheritance(&self) -> &Arc<dyn InheritanceIndex> {
        &self.inheritance
    }

    pub(crate) fn cache(&self) -> &Arc<ServiceCache> {
        &self.cache
    }

    /// Resolves `T`, contract-scoped by `contracts`. This call itself never
    /// fails — it hands back a lazy [`ResolvedService`] whose value
    /// accessors (`instance`/`instances`) panic with the construction log
    /// on a bad outcome; `try_instance`/`try_instances` report the same
    /// thing as a `Result` instead. Contrast with [`Container::create`],
    /// which fails eagerly.
    pub fn resolve<T: 'static>(&self, contracts: &[&str]) -> ResolvedService<T> {
        match self.resolve_sealed_lazy(TypeRef::of::<T>(), contracts, false, None) {
            Ok(sealed) => ResolvedService::sealed(sealed),
            Err(e) => ResolvedService::rejected(e),
        }
    }

    /// Like `resolve`, but always constructs a fresh instance (never reads
    /// or writes the singleton cache) and accepts per-call argument
    /// overrides. Unlike `resolve`, this fails eagerly.
    pub fn create<T: 'static>(&self, contracts: &[&str], arguments: ArgumentsMap) -> DiResult<Arc<T>> {
        let sealed = self.resolve_sealed(TypeRef::of::<T>(), contracts, true, Some(Arc::new(arguments)))?;
        downcast(sealed.single_instance()?)
    }

    /// Resolves interface `I` (registered via `ContainerBuilder::register_interface`)
    /// to its implementation(s), coerced to `Arc<I>`. Lazy, like `resolve`
    /// — see [`ResolvedTrait`].
    ///
    /// `resolve::<I>` can't do this directly: `Any::downcast` only recovers
    /// a `Sized` target, and `I` itself is typically `dyn Trait`.
    pub fn resolve_trait<I: ?Sized + 'static>(&self, contracts: &[&str]) -> ResolvedTrait<I> {
        match self.resolve_sealed_lazy(TypeRef::of::<I>(), contracts, false, None) {
            Ok(sealed) => ResolvedTrait::sealed(sealed),
            Err(e) => ResolvedTrait::rejected(e),
        }
    }

    /// Candidate implementation types for interface `T` — the scanned
    /// inheritors plus any explicitly configured `implementation_types`,
    /// without resolving any of them.
    pub fn get_implementations_of<T: ?Sized + 'static>(&self) -> Vec<TypeRef> {
        let type_ref = TypeRef::of::<T>();
        let mut candidates: Vec<TypeRef> = self
            .inheritance
            .inheritors_of(type_ref)
            .into_iter()
            .map(|t| self.inheritance.underlying_implementation(t))
            .collect();
        if let (Some(config), _) = self.registry.get(type_ref, &[]) {
            if let Some(explicit) = &config.implementation_types {
                for t in explicit {
                    if !candidates.contains(t) {
                        candidates.push(*t);
                    }
                }
            }
        }
        candidates
    }

    /// Injects into an already-constructed instance via its registered
    /// `build_up_hook` (spec.md §6's `build_up`, standing in for the
    /// source's annotated-slot `DependenciesInjector` — Rust has no runtime
    /// field reflection to drive that automatically). A no-op, not an
    /// error, if `T` has no such hook registered.
    pub fn build_up<T: 'static>(&self, target: &Arc<T>, contracts: &[&str]) -> DiResult<()> {
        let type_ref = TypeRef::of::<T>();
        let names: Vec<ContractName> = contracts.iter().map(|c| ContractName::new(*c)).collect::<Result<_, DiError>>()?;
        let (config, _) = self.registry.get(type_ref, &names);
        if let Some(config) = config {
            if let Some(hook) = &config.build_up_hook {
                let any: AnyArc = target.clone();
                hook(self, &any)?;
            }
        }
        Ok(())
    }

    /// Produces a sibling container sharing the type index (introspector,
    /// inheritance index) and the static-scope singleton cache, but with
    /// `overlay` consulted before the base registry (spec.md §6's `clone`).
    /// Overlaying rather than copying keeps the already-cached singletons
    /// shared between parent and sibling, matching "static-scope cache".
    pub fn clone_with(&self, overlay: Arc<dyn ConfigurationRegistry>) -> Self {
        Self {
            registry: Arc::new(LayeredRegistry { overlay, base: self.registry.clone() }),
            introspector: self.introspector.clone(),
            inheritance: self.inheritance.clone(),
            cache: self.cache.clone(),
            observers: self.observers.clone(),
        }
    }

    /// Disposes every container-owned cached instance via its registered
    /// `dispose_hook`, in reverse `TopSortIndex` order (parents before the
    /// dependencies they hold onto). Errors from individual hooks are
    /// collected rather than short-circuiting, so one misbehaving
    /// disposable can't prevent the rest from running.
    pub fn dispose(&self) -> DiResult<()> {
        let mut failures = Vec::new();
        let mut services = self.cache.all_sorted();
        services.reverse();
        for service in services {
            if !service.container_owns_instance || !service.is_ok() {
                continue;
            }
            let (config, _) = self.registry.get(service.service_name.type_ref, &service.final_used_contracts);
            let Some(hook) = config.as_ref().and_then(|c| c.dispose_hook.clone()) else { continue };
            for instance in &service.instances {
                if let Err(err) = hook(instance) {
                    failures.push(err.to_string());
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Aggregate(failures))
        }
    }

    /// Async counterpart to [`Container::dispose`], for services whose
    /// configuration carries an [`crate::AsyncDisposable`] instead of a
    /// synchronous `dispose_hook`. Runs in the same reverse-`TopSortIndex`
    /// order; hooks run sequentially, not concurrently, so a parent is
    /// never torn down while a dependency it still references is disposing.
    pub async fn dispose_async(&self) -> DiResult<()> {
        let mut failures = Vec::new();
        let mut services = self.cache.all_sorted();
        services.reverse();
        for service in services {
            if !service.container_owns_instance || !service.is_ok() {
                continue;
            }
            let (config, _) = self.registry.get(service.service_name.type_ref, &service.final_used_contracts);
            let Some(disposable) = config.as_ref().and_then(|c| c.async_dispose.clone()) else { continue };
            if let Err(err) = disposable.dispose_async().await {
                failures.push(err.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Aggregate(failures))
        }
    }

    /// Eager form: a malformed contract stack or a bad-status resolution
    /// both return `Err` immediately. Backs `create`.
    fn resolve_sealed(
        &self,
        type_ref: TypeRef,
        contracts: &[&str],
        create_new: bool,
        arguments: Option<Arc<ArgumentsMap>>,
    ) -> DiResult<Arc<ContainerService>> {
        let sealed = self.resolve_sealed_lazy(type_ref, contracts, create_new, arguments)?;
        if !sealed.is_ok() {
            return Err(sealed_error(sealed.as_ref()));
        }
        Ok(sealed)
    }

    /// Lazy form: a malformed contract stack is reported as `Err` (there is
    /// no sealed tree to wrap it in), but a bad-status resolution is
    /// returned as `Ok` carrying the failed tree — the caller decides
    /// whether/when to turn that into a panic. Backs `resolve`/`resolve_trait`.
    fn resolve_sealed_lazy(
        &self,
        type_ref: TypeRef,
        contracts: &[&str],
        create_new: bool,
        arguments: Option<Arc<ArgumentsMap>>,
    ) -> DiResult<Arc<ContainerService>> {
        let names: Vec<ContractName> = contracts
            .iter()
            .map(|c| ContractName::new(*c))
            .collect::<Result<_, DiError>>()?;
        let name = ServiceName::parse(type_ref, &names)?;
        Ok(self.run_resolution(name, create_new, arguments))
    }

    /// Runs `resolve_core` for one top-level call, wrapped by the
    /// `resolving`/`resolved`/`factory_panic` observer hooks. A factory
    /// closure registered via `ContainerBuilder::register_constructor` can
    /// itself panic (e.g. an `unwrap()` on a bad downcast); that panic is
    /// reported to observers and then resumed, never swallowed.
    fn run_resolution(
        &self,
        name: ServiceName,
        create_new: bool,
        arguments: Option<Arc<ArgumentsMap>>,
    ) -> Arc<ContainerService> {
        for o in self.observers.iter() {
            o.resolving(&name);
        }
        let start = Instant::now();
        let mut ctx = ResolutionContext::new();
        match std::panic::catch_unwind(AssertUnwindSafe(|| resolve_core(self, name.clone(), create_new, arguments, &mut ctx))) {
            Ok(sealed) => {
                let elapsed = start.elapsed();
                for o in self.observers.iter() {
                    o.resolved(&name, elapsed);
                }
                sealed
            }
            Err(payload) => {
                let message = panic_message(&payload);
                for o in self.observers.iter() {
                    o.factory_panic(&name, &message);
                }
                std::panic::resume_unwind(payload);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "factory panicked with a non-string payload".to_string()
    }
}

/// Consults `overlay` first, falling back to `base` when the overlay has no
/// configuration for a `(type, contracts)` pair — the composite registry
/// behind [`Container::clone_with`].
struct LayeredRegistry {
    overlay: Arc<dyn ConfigurationRegistry>,
    base: Arc<dyn ConfigurationRegistry>,
}

impl ConfigurationRegistry for LayeredRegistry {
    fn get(&self, type_ref: TypeRef, contracts: &[ContractName]) -> (Option<Arc<ServiceConfiguration>>, Vec<ContractName>) {
        let (config, consulted) = self.overlay.get(type_ref, contracts);
        if config.is_some() {
            return (config, consulted);
        }
        self.base.get(type_ref, contracts)
    }

    fn union_members(&self, contract: &ContractName) -> Option<Vec<ContractName>> {
        self.overlay.union_members(contract).or_else(|| self.base.union_members(contract))
    }
}

pub(crate) fn downcast<T: 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>().map_err(|_| DiError::TypeMismatch(TypeRef::of::<T>().display_name()))
}

/// Classifies a failed resolution's root cause from its construction log,
/// recovering `Circular`/`WrongLifestyle`/`DepthExceeded` where the
/// top-level error message carries one of their markers, and falling back
/// to the general-purpose `Unresolved` otherwise. The markers survive
/// verbatim as an error rolls up from a deeply-nested dependency to the
/// root (`ServiceBuilder::add_dependency`), so this works at any depth.
pub(crate) fn sealed_error(sealed: &ContainerService) -> DiError {
    if let Some(msg) = &sealed.error_message {
        if let Some(path) = msg.strip_prefix("cyclic dependency ") {
            return DiError::Circular(path.to_string());
        }
        if msg.contains("is per-request scoped") {
            return DiError::WrongLifestyle(sealed.service_name.type_ref.display_name());
        }
        if msg.starts_with("resolution depth exceeded") {
            return DiError::DepthExceeded(crate::resolver::MAX_RESOLUTION_DEPTH);
        }
    }
    DiError::Unresolved { type_name: sealed.service_name.type_ref.display_name(), log: render_log(sealed) }
}
