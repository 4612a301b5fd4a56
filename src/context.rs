//! Per-request scratch state threaded through one call to `resolve`/`create`.
//!
//! Spec.md §4.3/§5: a `ResolutionContext` is created fresh for every public
//! entry point and is never shared across threads — the only state shared
//! across concurrent resolvers lives in [`crate::cache::ServiceCache`].

use ahash::AHashSet;

use crate::contracts::ContractsList;
use crate::service_name::{ServiceName, TypeRef};

/// Per-request scratch: the cycle detector, the active-builder stack (for
/// error messages and `factory_with_target`'s parent lookup), and the
/// active contract stack.
pub struct ResolutionContext {
    pub(crate) constructing: AHashSet<ServiceName>,
    pub(crate) stack: Vec<TypeRef>,
    pub(crate) contracts: ContractsList,
    pub(crate) analyze_dependencies_only: bool,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self {
            constructing: AHashSet::new(),
            stack: Vec::new(),
            contracts: ContractsList::new(),
            analyze_dependencies_only: false,
        }
    }

    pub fn analyze_only() -> Self {
        let mut ctx = Self::new();
        ctx.analyze_dependencies_only = true;
        ctx
    }

    /// The type of the builder one level up from the one currently at the
    /// top of the stack (spec.md §4.5's `ctx.stack[-2]`), if any.
    pub(crate) fn grandparent_type(&self) -> Option<TypeRef> {
        if self.stack.len() >= 2 {
            Some(self.stack[self.stack.len() - 2])
        } else {
            None
        }
    }

    /// The type requesting the node about to be built — i.e. the top of the
    /// stack before that node is pushed (spec.md §4.4 step 4).
    pub(crate) fn requesting_type(&self) -> Option<TypeRef> {
        self.stack.last().copied()
    }
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new()
    }
}
