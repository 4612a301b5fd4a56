//! The `resolve_core` algorithm (spec.md §4.4): configuration lookup,
//! contract push, cache slot acquisition, dispatch to union expansion or
//! instantiation, and unwind/seal.

use std::sync::Arc;

use crate::arguments::ArgumentsMap;
use crate::builder::{ContainerService, ServiceBuilder};
use crate::cache::{next_top_sort_index, Acquire};
use crate::configuration::ServiceConfiguration;
use crate::container::Container;
use crate::context::ResolutionContext;
use crate::instantiator;
use crate::service_name::{ContractName, ServiceName};

/// Defensive bound on dependency nesting, independent of cycle detection
/// (a long acyclic chain would otherwise recurse unbounded).
pub(crate) const MAX_RESOLUTION_DEPTH: usize = 64;

/// Entry point for one `(name, create_new, arguments)` resolution within an
/// in-flight request. Recurses for every constructor parameter.
pub(crate) fn resolve_core(
    container: &Container,
    name: ServiceName,
    create_new: bool,
    arguments: Option<Arc<ArgumentsMap>>,
    ctx: &mut ResolutionContext,
) -> Arc<ContainerService> {
    if ctx.stack.len() >= MAX_RESOLUTION_DEPTH {
        return Arc::new(ContainerService::error_node(
            name,
            format!("resolution depth exceeded ({MAX_RESOLUTION_DEPTH})"),
        ));
    }

    // Step 1: cycle check. Not cached under the cyclic key.
    if !ctx.constructing.insert(name.clone()) {
        let mut path: Vec<&str> = ctx.stack.iter().map(|t| t.display_name()).collect();
        path.push(name.type_ref.display_name());
        return Arc::new(ContainerService::error_node(name, format!("cyclic dependency {}", path.join(" -> "))));
    }

    let result = resolve_with_contracts(container, name.clone(), create_new, arguments, ctx);

    ctx.constructing.remove(&name);
    result
}

/// Step 2: push the requested contracts, ensuring they are popped on every
/// exit path.
fn resolve_with_contracts(
    container: &Container,
    name: ServiceName,
    create_new: bool,
    arguments: Option<Arc<ArgumentsMap>>,
    ctx: &mut ResolutionContext,
) -> Arc<ContainerService> {
    let push = ctx.contracts.push(&name.contracts);
    if !push.ok {
        let stack = crate::service_name::format_stack(&ctx.contracts.snapshot());
        let duplicated = push.duplicated.expect("push failure always reports the duplicate");
        let message = format!("contract [{}] already declared, stack {}", duplicated.as_str(), stack);
        return Arc::new(ContainerService::error_node(name, message));
    }

    let result = resolve_dispatch(container, name, create_new, arguments, ctx);

    ctx.contracts.pop(push.pushed);
    result
}

/// Steps 3–4: configuration lookup and declared-name computation, then
/// either build fresh (`create_new`) or arbitrate a cache slot.
fn resolve_dispatch(
    container: &Container,
    name: ServiceName,
    create_new: bool,
    arguments: Option<Arc<ArgumentsMap>>,
    ctx: &mut ResolutionContext,
) -> Arc<ContainerService> {
    let (config, consulted) = container.registry().get(name.type_ref, &ctx.contracts.snapshot());

    let mut declared_contracts = ctx.contracts.snapshot();
    let mut preconsulted: Vec<ContractName> = consulted;

    if let Some(cfg) = &config {
        if cfg.factory_with_target.is_some() {
            if let Some(parent) = ctx.requesting_type() {
                if let Ok(parent_contract) = ContractName::new(parent.display_name()) {
                    if !declared_contracts.iter().any(|c| c == &parent_contract) {
                        declared_contracts.push(parent_contract.clone());
                    }
                    preconsulted.push(parent_contract);
                }
            }
            // Open question resolved in DESIGN.md: a top-level
            // `factory_with_target` (empty stack) passes `None` as parent,
            // which is an accepted interpretation, not an error.
        }
    }

    let declared_name = ServiceName { type_ref: name.type_ref, contracts: declared_contracts };

    if create_new {
        return resolve_build(container, declared_name, config, true, arguments, preconsulted, ctx);
    }

    // Step 5: singleton-path slot acquisition.
    let slot = container.cache().get_or_create(&declared_name);
    match slot.acquire_instantiate_lock() {
        Acquire::AlreadyDone(service) => service,
        Acquire::Acquired => {
            let sealed = resolve_build(container, declared_name, config, false, arguments, preconsulted, ctx);
            let to_store = if ctx.analyze_dependencies_only { None } else { Some(sealed.clone()) };
            slot.release_instantiate_lock(to_store);
            sealed
        }
    }
}

/// Steps 6–8: builder setup, union-expansion-or-instantiate dispatch, and
/// unwind/seal.
fn resolve_build(
    container: &Container,
    declared_name: ServiceName,
    config: Option<Arc<ServiceConfiguration>>,
    create_new: bool,
    arguments: Option<Arc<ArgumentsMap>>,
    preconsulted: Vec<ContractName>,
    ctx: &mut ResolutionContext,
) -> Arc<ContainerService> {
    let mut builder = ServiceBuilder::new(declared_name.clone(), declared_name.contracts.clone(), create_new);
    builder.configuration = config.clone();
    builder.arguments = arguments.clone();
    for c in preconsulted {
        builder.mark_contract_used(c);
    }

    ctx.stack.push(declared_name.type_ref);

    match &config {
        None => builder.set_error(format!("no implementations for {}", declared_name.type_ref.display_name())),
        Some(_) => dispatch_configured(container, &mut builder, create_new, arguments, ctx),
    }

    ctx.stack.pop();
    builder.end_resolve_dependencies();
    Arc::new(builder.seal(next_top_sort_index()))
}

fn dispatch_configured(
    container: &Container,
    builder: &mut ServiceBuilder,
    create_new: bool,
    arguments: Option<Arc<ArgumentsMap>>,
    ctx: &mut ResolutionContext,
) {
    if let Some(expansion) = ctx.contracts.try_expand_unions(&**container.registry()) {
        for alt in expansion.alternatives {
            let child_name = ServiceName { type_ref: builder.service_name.type_ref, contracts: alt };
            let child = resolve_core(container, child_name, create_new, arguments.clone(), ctx);
            builder.union_in(&child);
            if !child.is_ok() {
                break;
            }
        }
        ctx.contracts.push(&expansion.popped_suffix);
    } else {
        instantiator::instantiate(container, builder, create_new, arguments, ctx);
    }
}
