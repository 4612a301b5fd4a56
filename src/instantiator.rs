//! Turns a configured [`ServiceBuilder`] into 0..N produced instances.
//!
//! Implements spec.md §4.5: the precondition table, `instantiate_interface`,
//! `instantiate_implementation`, and `instantiate_dependency`.

use std::sync::Arc;

use crate::arguments::ArgumentsMap;
use crate::builder::{ContainerService, DependencyRecord, ServiceBuilder, ServiceStatus};
use crate::cache::{next_top_sort_index, Acquire};
use crate::configuration::ParameterOverride;
use crate::container::Container;
use crate::context::ResolutionContext;
use crate::introspection::ParamAttributes;
use crate::resolver::resolve_core;
use crate::service_name::{ServiceName, TypeRef};
use crate::AnyArc;

pub(crate) fn instantiate(
    container: &Container,
    builder: &mut ServiceBuilder,
    create_new: bool,
    arguments: Option<Arc<ArgumentsMap>>,
    ctx: &mut ResolutionContext,
) {
    let type_ref = builder.service_name.type_ref;
    let introspector = container.introspector();

    if introspector.is_simple_type(type_ref) {
        builder.set_error("can't create simple type");
        return;
    }

    if type_ref == TypeRef::of::<Container>() {
        builder.instances.push(Arc::new(container.clone()) as AnyArc);
        return;
    }

    if let Some(cfg) = builder.configuration.clone() {
        if let Some(instance) = &cfg.implementation_assigned {
            builder.instances.push(instance.clone());
            return;
        }
        if let Some(factory) = &cfg.factory {
            match factory(container) {
                Ok(instance) => builder.instances.push(instance),
                Err(e) => builder.set_error(e.to_string()),
            }
            return;
        }
        if let Some(factory) = &cfg.factory_with_target {
            let parent = ctx.grandparent_type();
            match factory(container, parent) {
                Ok(instance) => builder.instances.push(instance),
                Err(e) => builder.set_error(e.to_string()),
            }
            return;
        }
        if cfg.per_request && !create_new {
            builder.set_error(format!("{} is per-request scoped; use a factory instead", type_ref.display_name()));
            return;
        }
    }

    if introspector.is_open_generic(type_ref) {
        builder.set_error("can't create open generic");
        return;
    }

    if introspector.is_abstract(type_ref) {
        instantiate_interface(container, builder, create_new, arguments, ctx);
    } else {
        instantiate_implementation(container, builder, create_new, ctx);
    }

    if let Some(cfg) = &builder.configuration {
        if let Some(filter) = &cfg.instance_filter {
            let before = builder.instances.len();
            builder.instances.retain(|i| filter(i));
            let dropped = before - builder.instances.len();
            if dropped > 0 {
                builder.dropped_by_filter += dropped;
            }
        }
    }
}

fn instantiate_interface(
    container: &Container,
    builder: &mut ServiceBuilder,
    create_new: bool,
    arguments: Option<Arc<ArgumentsMap>>,
    ctx: &mut ResolutionContext,
) {
    let type_ref = builder.service_name.type_ref;
    let explicit = builder.configuration.as_ref().and_then(|c| c.implementation_types.clone());
    let use_autosearch = builder.configuration.as_ref().map(|c| c.use_autosearch).unwrap_or(true);

    let mut candidates: Vec<TypeRef> = explicit.clone().unwrap_or_default();
    if explicit.is_none() || use_autosearch {
        for candidate in container.inheritance().inheritors_of(type_ref) {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    if candidates.is_empty() {
        builder.set_error(format!("no implementations for {}", type_ref.display_name()));
        return;
    }

    for candidate in candidates {
        let child_name = ServiceName::plain(candidate);
        let child = resolve_core(container, child_name, create_new, arguments.clone(), ctx);
        builder.union_in(&child);
        if !child.is_ok() {
            break;
        }
    }

    builder.end_resolve_dependencies();
}

fn instantiate_implementation(
    container: &Container,
    builder: &mut ServiceBuilder,
    create_new: bool,
    ctx: &mut ResolutionContext,
) {
    let type_ref = builder.service_name.type_ref;

    if builder.configuration.as_ref().map(|c| c.dont_use).unwrap_or(false) {
        builder.dropped_by_filter += 1;
        return;
    }

    let introspector = container.introspector();
    if introspector.is_delegate(type_ref) {
        builder.set_error(format!("{} is a delegate type, not constructible", type_ref.display_name()));
        return;
    }

    let constructor = match introspector.get_constructor(type_ref) {
        Ok(c) => c,
        Err(e) => {
            builder.set_error(e.to_string());
            return;
        }
    };

    let mut actual_arguments: Vec<AnyArc> = Vec::with_capacity(constructor.params.len());
    let mut used_param_overrides: Vec<&'static str> = Vec::new();

    for param in &constructor.params {
        match instantiate_dependency(container, builder, param, ctx) {
            DependencyOutcome::Value(value, record) => {
                used_param_overrides.push(param.name);
                builder.add_dependency(record);
                actual_arguments.push(value);
            }
            DependencyOutcome::Fatal(record) => {
                builder.add_dependency(record);
                if !ctx.analyze_dependencies_only {
                    builder.end_resolve_dependencies();
                    return;
                }
                actual_arguments.push(Arc::new(()) as AnyArc);
            }
        }
    }

    if let Some(cfg) = builder.configuration.clone() {
        for dep_name in &cfg.implicit_dependencies {
            let child = resolve_core(container, dep_name.clone(), false, None, ctx);
            let ok = child.is_ok();
            builder.add_dependency(DependencyRecord {
                name: dep_name.clone(),
                value: None,
                comment: Some("implicit".to_string()),
                status: child.status,
            });
            builder.union_in(&child);
            if !ok && !ctx.analyze_dependencies_only {
                builder.end_resolve_dependencies();
                return;
            }
        }

        let unused: Vec<&str> = cfg
            .parameter_overrides
            .keys()
            .filter(|k| !used_param_overrides.contains(k))
            .copied()
            .collect();
        if !unused.is_empty() {
            builder.set_error(format!("unused dependency configurations [{}]", unused.join(",")));
            return;
        }
    }

    builder.end_resolve_dependencies();

    if ctx.analyze_dependencies_only {
        return;
    }

    if !create_new && builder.declared_contracts.len() != builder.used_contracts.len() {
        let final_name = builder.final_name();
        let slot = container.cache().get_or_create(&final_name);
        match slot.acquire_instantiate_lock() {
            Acquire::AlreadyDone(cached) if cached.is_ok() => {
                builder.instances = cached.get_all_values();
            }
            Acquire::AlreadyDone(_) => {
                // The narrower identity's own resolution failed; fall through
                // and construct under this request instead of reusing it.
                let instance = (constructor.invoke)(&actual_arguments);
                builder.instances.push(instance);
            }
            Acquire::Acquired => {
                let instance = (constructor.invoke)(&actual_arguments);
                builder.instances.push(instance);
                let shadow = ContainerService::shadow_ok(final_name, builder.instances.clone(), next_top_sort_index());
                slot.release_instantiate_lock(Some(Arc::new(shadow)));
            }
        }
        return;
    }

    let instance = (constructor.invoke)(&actual_arguments);
    builder.instances.push(instance);
}

enum DependencyOutcome {
    Value(AnyArc, DependencyRecord),
    Fatal(DependencyRecord),
}

fn instantiate_dependency(
    container: &Container,
    builder: &ServiceBuilder,
    param: &crate::introspection::ParameterInfo,
    ctx: &mut ResolutionContext,
) -> DependencyOutcome {
    let plain_name = ServiceName::plain(param.type_ref);

    // Step 1: explicit per-call argument.
    if let Some(args) = &builder.arguments {
        if let Some(value) = args.get(param.name) {
            return DependencyOutcome::Value(
                value.clone(),
                DependencyRecord { name: plain_name, value: Some(value.clone()), comment: Some("argument".to_string()), status: ServiceStatus::Ok },
            );
        }
    }

    // Step 2/3: parameter override.
    if let Some(cfg) = &builder.configuration {
        if let Some(over) = cfg.parameter_overrides.get(param.name) {
            match over {
                ParameterOverride::ValueAssigned(value) => {
                    return DependencyOutcome::Value(
                        value.clone(),
                        DependencyRecord { name: plain_name, value: Some(value.clone()), comment: Some("override".to_string()), status: ServiceStatus::Ok },
                    );
                }
                ParameterOverride::Factory(factory) => {
                    return match factory(container) {
                        Ok(value) => DependencyOutcome::Value(
                            value.clone(),
                            DependencyRecord { name: plain_name, value: Some(value), comment: Some("override-factory".to_string()), status: ServiceStatus::Ok },
                        ),
                        Err(e) => DependencyOutcome::Fatal(DependencyRecord {
                            name: plain_name,
                            value: None,
                            comment: Some(e.to_string()),
                            status: ServiceStatus::Error,
                        }),
                    };
                }
                ParameterOverride::ImplementationType(type_ref) => {
                    let child_name = ServiceName::plain(*type_ref);
                    let child = resolve_core(container, child_name, false, None, ctx);
                    return finish_dependency(child, param, plain_name);
                }
            }
        }
    }

    // Step 4: embedded-resource parameter.
    if param.attributes.contains(ParamAttributes::FROM_RESOURCE) {
        if let Some(name) = param.resource_name {
            if let Some(bytes) = container.introspector().get_manifest_resource_stream(param.type_ref, name) {
                let value: AnyArc = Arc::new(bytes);
                return DependencyOutcome::Value(
                    value.clone(),
                    DependencyRecord { name: plain_name, value: Some(value), comment: Some("resource".to_string()), status: ServiceStatus::Ok },
                );
            }
            return DependencyOutcome::Fatal(DependencyRecord {
                name: plain_name,
                value: None,
                comment: Some(format!("embedded resource {name} not found")),
                status: ServiceStatus::Error,
            });
        }
    }

    // Step 5: compose the dependency's identity.
    let (element_type, is_enumerable) = container.introspector().unwrap_enumerable(param.type_ref);
    let dependency_name = match ServiceName::parse(element_type, &param.contracts) {
        Ok(name) => name,
        Err(e) => {
            return DependencyOutcome::Fatal(DependencyRecord {
                name: plain_name,
                value: None,
                comment: Some(e.to_string()),
                status: ServiceStatus::Error,
            })
        }
    };

    // Step 6: primitive-typed parameter without configuration.
    if container.introspector().is_simple_type(element_type) {
        if param.has_default_value {
            let value = param.default_value.clone().expect("has_default_value implies default_value");
            return DependencyOutcome::Value(
                value.clone(),
                DependencyRecord { name: plain_name, value: Some(value), comment: Some("default".to_string()), status: ServiceStatus::Ok },
            );
        }
        return DependencyOutcome::Fatal(DependencyRecord {
            name: plain_name,
            value: None,
            comment: Some(format!("parameter [{}] is not configured", param.name)),
            status: ServiceStatus::Error,
        });
    }

    // Step 7: recurse.
    let child = resolve_core(container, dependency_name, false, None, ctx);

    if is_enumerable {
        if !child.is_ok() {
            let status = if child.status == ServiceStatus::NotResolved { ServiceStatus::Error } else { child.status };
            return DependencyOutcome::Fatal(DependencyRecord { name: child.service_name.clone(), value: None, comment: child.error_message.clone(), status });
        }
        let values = child.get_all_values();
        let value: AnyArc = Arc::new(values);
        return DependencyOutcome::Value(
            value.clone(),
            DependencyRecord { name: child.service_name.clone(), value: Some(value), comment: None, status: ServiceStatus::Ok },
        );
    }

    finish_dependency(child, param, plain_name)
}

fn finish_dependency(
    child: Arc<crate::builder::ContainerService>,
    param: &crate::introspection::ParameterInfo,
    plain_name: ServiceName,
) -> DependencyOutcome {
    if !child.is_ok() {
        if child.status == ServiceStatus::NotResolved {
            if param.has_default_value {
                let value = param.default_value.clone().expect("has_default_value implies default_value");
                return DependencyOutcome::Value(
                    value.clone(),
                    DependencyRecord { name: plain_name, value: Some(value), comment: Some("default".to_string()), status: ServiceStatus::Ok },
                );
            }
            if param.attributes.contains(ParamAttributes::OPTIONAL) || param.attributes.contains(ParamAttributes::CAN_BE_NULL) {
                return DependencyOutcome::Value(
                    Arc::new(()) as AnyArc,
                    DependencyRecord { name: plain_name, value: None, comment: Some("optional".to_string()), status: ServiceStatus::Ok },
                );
            }
        }
        let status = if child.status == ServiceStatus::NotResolved { ServiceStatus::Error } else { child.status };
        let comment = child.error_message.clone().or_else(|| {
            (status == ServiceStatus::Error).then(|| format!("parameter [{}] is not configured", param.name))
        });
        return DependencyOutcome::Fatal(DependencyRecord { name: child.service_name.clone(), value: None, comment, status });
    }

    match child.single_instance() {
        Ok(value) => DependencyOutcome::Value(
            value.clone(),
            DependencyRecord { name: child.service_name.clone(), value: Some(value), comment: None, status: ServiceStatus::Ok },
        ),
        Err(e) => DependencyOutcome::Fatal(DependencyRecord {
            name: child.service_name.clone(),
            value: None,
            comment: Some(e.to_string()),
            status: ServiceStatus::Error,
        }),
    }
}
