//! The per-node state machine under construction, and its sealed form.
//!
//! Implements spec.md §3/§4: `ServiceStatus`, `ServiceBuilder`, and the
//! immutable `ContainerService` a builder seals into.

use std::sync::Arc;

use crate::configuration::ServiceConfiguration;
use crate::service_name::{ContractStack, ServiceName};
use crate::AnyArc;

/// Monotonic status: `NotResolved -> Ok | Error | DependencyError`.
///
/// Once a builder leaves `NotResolved` for anything but `Ok`, later
/// dependencies may still be appended (for the construction log) but can
/// never revive it to `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    NotResolved,
    Ok,
    Error,
    DependencyError,
}

impl ServiceStatus {
    fn is_terminal_bad(self) -> bool {
        matches!(self, ServiceStatus::Error | ServiceStatus::DependencyError)
    }
}

/// One recorded dependency edge, for the construction log and for
/// `end_resolve_dependencies`'s roll-up of child status.
pub struct DependencyRecord {
    pub name: ServiceName,
    pub value: Option<AnyArc>,
    pub comment: Option<String>,
    pub status: ServiceStatus,
}

/// A node under construction.
///
/// Exactly the fields of spec.md §3's `ServiceBuilder`: identity, the
/// contract stack as it stood at entry, the chosen configuration, per-call
/// arguments, the `create_new` (fresh vs. singleton-cached) flag, the
/// dependency list, which of the declared contracts were actually
/// consulted, status/error, and the produced instances.
pub struct ServiceBuilder {
    pub service_name: ServiceName,
    pub declared_contracts: ContractStack,
    pub configuration: Option<Arc<ServiceConfiguration>>,
    pub create_new: bool,
    pub arguments: Option<Arc<crate::arguments::ArgumentsMap>>,
    pub dependencies: Vec<DependencyRecord>,
    pub used_contracts: ContractStack,
    pub status: ServiceStatus,
    pub error_message: Option<String>,
    pub instances: Vec<AnyArc>,
    pub instantiated: bool,
    pub dropped_by_filter: usize,
}

impl ServiceBuilder {
    pub fn new(service_name: ServiceName, declared_contracts: ContractStack, create_new: bool) -> Self {
        Self {
            service_name,
            declared_contracts,
            configuration: None,
            create_new,
            arguments: None,
            dependencies: Vec::new(),
            used_contracts: ContractStack::new(),
            status: ServiceStatus::NotResolved,
            error_message: None,
            instances: Vec::new(),
            instantiated: false,
            dropped_by_filter: 0,
        }
    }

    /// Moves `NotResolved` to `Error` with a message; a no-op once the
    /// builder already left `NotResolved` (monotonic transition).
    pub fn set_error(&mut self, message: impl Into<String>) {
        if self.status == ServiceStatus::NotResolved {
            self.status = ServiceStatus::Error;
            self.error_message = Some(message.into());
        }
    }

    /// Records a dependency edge; if its status is bad, this builder's
    /// `NotResolved` status rolls up to `DependencyError`, carrying the
    /// dependency's own comment forward so the root cause (e.g. a cycle
    /// detected several levels down) survives in the top-level error
    /// message instead of being visible only in a buried dependency record.
    pub fn add_dependency(&mut self, record: DependencyRecord) {
        if record.status.is_terminal_bad() && self.status == ServiceStatus::NotResolved {
            self.status = ServiceStatus::DependencyError;
            self.error_message = record.comment.clone();
        }
        self.dependencies.push(record);
    }

    /// Merges a linked child's instances/status/used-contracts into this
    /// builder (used by union expansion and interface-candidate linking).
    pub fn union_in(&mut self, child: &ContainerService) {
        self.instances.extend(child.instances.iter().cloned());
        for c in &child.final_used_contracts {
            if !self.used_contracts.iter().any(|existing| existing == c) {
                self.used_contracts.push(c.clone());
            }
        }
        if child.status.is_terminal_bad() && self.status == ServiceStatus::NotResolved {
            self.status = child.status;
            self.error_message = child.error_message.clone();
        }
    }

    /// Marks a contract as consulted during this builder's resolution.
    pub fn mark_contract_used(&mut self, contract: crate::service_name::ContractName) {
        if !self.used_contracts.iter().any(|existing| existing == &contract) {
            self.used_contracts.push(contract);
        }
    }

    /// Finalizes status: if nothing has gone wrong, promotes `NotResolved`
    /// to `Ok`. Called once all dependencies/instances are recorded.
    pub fn end_resolve_dependencies(&mut self) {
        if self.status == ServiceStatus::NotResolved {
            self.status = ServiceStatus::Ok;
        }
        self.instantiated = true;
    }

    /// The `(type, final_used_contracts)` identity used for singleton
    /// cache installation (spec.md §3 invariant 2).
    pub fn final_name(&self) -> ServiceName {
        ServiceName { type_ref: self.service_name.type_ref, contracts: self.used_contracts.clone() }
    }

    /// Seals the builder into its immutable, cacheable form.
    pub fn seal(self, top_sort_index: u64) -> ContainerService {
        let container_owns_instance = self
            .configuration
            .as_ref()
            .map(|c| c.container_owns_instance)
            .unwrap_or(false);
        ContainerService {
            service_name: self.service_name,
            declared_contracts: self.declared_contracts,
            final_used_contracts: self.used_contracts,
            status: self.status,
            error_message: self.error_message,
            instances: self.instances,
            dependencies: self.dependencies,
            container_owns_instance,
            top_sort_index,
            shadow: false,
        }
    }
}

/// An immutable, cached resolution result (spec.md §3's sealed builder).
pub struct ContainerService {
    pub service_name: ServiceName,
    pub declared_contracts: ContractStack,
    pub final_used_contracts: ContractStack,
    pub status: ServiceStatus,
    pub error_message: Option<String>,
    pub instances: Vec<AnyArc>,
    pub dependencies: Vec<DependencyRecord>,
    pub container_owns_instance: bool,
    pub top_sort_index: u64,
    /// Set only for the final-name cache-collapse entry `instantiate_implementation`
    /// writes under `final_name()` (spec.md §4.5 steps 10-11) — a second,
    /// narrower-identity cache slot sharing instances already owned by the
    /// service's declared-name entry. `ServiceCache::all_sorted` filters
    /// these out so `Runner`/`Container::dispose` each see one entry per
    /// physical instance instead of running its hooks twice.
    pub shadow: bool,
}

impl ContainerService {
    pub fn is_ok(&self) -> bool {
        self.status == ServiceStatus::Ok
    }

    /// Builds a one-off, uncached error node (used for cycle detection,
    /// spec.md §4.4 step 1 — "it is not cached under the cyclic key").
    pub fn error_node(service_name: ServiceName, message: String) -> Self {
        Self {
            declared_contracts: service_name.contracts.clone(),
            service_name,
            final_used_contracts: ContractStack::new(),
            status: ServiceStatus::Error,
            error_message: Some(message),
            instances: Vec::new(),
            dependencies: Vec::new(),
            container_owns_instance: false,
            top_sort_index: 0,
            shadow: false,
        }
    }

    /// Builds the narrower-identity cache entry for the final-name collapse:
    /// same instances, never dispose/run-hook owning (the declared-name seal
    /// already owns those).
    pub(crate) fn shadow_ok(final_name: ServiceName, instances: Vec<AnyArc>, top_sort_index: u64) -> Self {
        Self {
            declared_contracts: final_name.contracts.clone(),
            final_used_contracts: final_name.contracts.clone(),
            service_name: final_name,
            status: ServiceStatus::Ok,
            error_message: None,
            instances,
            dependencies: Vec::new(),
            container_owns_instance: false,
            top_sort_index,
            shadow: true,
        }
    }

    /// The single produced instance, or an error for zero/many.
    pub fn single_instance(&self) -> crate::error::DiResult<AnyArc> {
        match self.instances.len() {
            1 => Ok(self.instances[0].clone()),
            0 => Err(crate::error::DiError::NotFound(self.service_name.type_ref.display_name())),
            _ => Err(crate::error::DiError::ManyImplementations(self.service_name.type_ref.display_name())),
        }
    }

    pub fn get_all_values(&self) -> Vec<AnyArc> {
        self.instances.clone()
    }
}
