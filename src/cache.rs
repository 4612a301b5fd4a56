//! The concurrent, per-key cache and the at-most-one-instantiation protocol.
//!
//! Implements spec.md §4.2 / §5: one mutex + condvar per cache *slot* (not
//! one lock for the whole cache), so concurrent resolutions of unrelated
//! services never contend, while two resolvers racing for the same key
//! serialize on that key's slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::builder::ContainerService;
use crate::service_name::ServiceName;

static TOP_SORT: AtomicU64 = AtomicU64::new(0);

/// Assigns the next monotonic top-sort index, used to order post-construction
/// initialization (spec.md §4.6) and disposal (spec.md §3 "Lifecycles").
pub(crate) fn next_top_sort_index() -> u64 {
    TOP_SORT.fetch_add(1, Ordering::SeqCst)
}

/// Outcome of [`CacheSlot::acquire_instantiate_lock`].
pub(crate) enum Acquire {
    /// The caller holds the slot and must call `release_instantiate_lock` on
    /// every exit path.
    Acquired,
    /// Another thread already finished; here is the sealed result.
    AlreadyDone(Arc<ContainerService>),
}

struct SlotState {
    locked: bool,
    instantiated: bool,
    service: Option<Arc<ContainerService>>,
}

/// One cache entry's synchronization primitive plus memoized result.
pub(crate) struct CacheSlot {
    state: Mutex<SlotState>,
    cv: Condvar,
}

impl CacheSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState { locked: false, instantiated: false, service: None }),
            cv: Condvar::new(),
        }
    }

    /// Blocks until either this caller wins the right to instantiate, or an
    /// already-running instantiation has finished.
    pub(crate) fn acquire_instantiate_lock(&self) -> Acquire {
        let mut state = self.state.lock();
        loop {
            if state.instantiated {
                return Acquire::AlreadyDone(state.service.clone().expect("sealed service present"));
            }
            if !state.locked {
                state.locked = true;
                return Acquire::Acquired;
            }
            self.cv.wait(&mut state);
        }
    }

    /// Installs the sealed result (or `None` in analyze-only mode), marks
    /// the slot done, and wakes every waiter.
    pub(crate) fn release_instantiate_lock(&self, service: Option<Arc<ContainerService>>) {
        let mut state = self.state.lock();
        state.service = service;
        state.instantiated = true;
        state.locked = false;
        self.cv.notify_all();
    }

    /// Blocks until instantiated, then reports whether the result is `Ok`.
    #[allow(dead_code)]
    pub(crate) fn wait_for_resolve(&self) -> bool {
        let mut state = self.state.lock();
        while !state.instantiated {
            self.cv.wait(&mut state);
        }
        state.service.as_ref().map(|s| s.is_ok()).unwrap_or(false)
    }
}

/// Concurrent map `ServiceName -> CacheSlot`, with atomic insert-if-absent.
pub(crate) struct ServiceCache {
    slots: Mutex<HashMap<ServiceName, Arc<CacheSlot>, ahash::RandomState>>,
}

impl ServiceCache {
    pub(crate) fn new() -> Self {
        Self { slots: Mutex::new(HashMap::default()) }
    }

    pub(crate) fn get_or_create(&self, name: &ServiceName) -> Arc<CacheSlot> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(name) {
            return slot.clone();
        }
        let slot = Arc::new(CacheSlot::new());
        slots.insert(name.clone(), slot.clone());
        slot
    }

    /// Already-sealed services only — used by `get_implementations_of` style
    /// introspection and by tests; never blocks.
    pub(crate) fn peek(&self, name: &ServiceName) -> Option<Arc<ContainerService>> {
        let slots = self.slots.lock();
        slots.get(name).and_then(|slot| {
            let state = slot.state.lock();
            state.service.clone()
        })
    }

    /// Every sealed, non-shadow service currently cached, ordered by
    /// `top_sort_index` ascending — children are always sealed (and so
    /// appear) before the parents that depend on them, since a parent's
    /// seal only happens after all of its dependencies have resolved.
    /// Final-name cache-collapse entries (`ContainerService::shadow_ok`)
    /// are excluded: they share instances with their declared-name entry,
    /// which already owns disposal/run-hook duties for those instances.
    pub(crate) fn all_sorted(&self) -> Vec<Arc<ContainerService>> {
        let slots = self.slots.lock();
        let mut services: Vec<Arc<ContainerService>> =
            slots.values().filter_map(|slot| slot.state.lock().service.clone()).filter(|s| !s.shadow).collect();
        services.sort_by_key(|s| s.top_sort_index);
        services
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ServiceBuilder, ServiceStatus};
    use crate::service_name::TypeRef;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    fn sealed_ok() -> Arc<ContainerService> {
        let name = ServiceName::plain(TypeRef::of::<u32>());
        let mut b = ServiceBuilder::new(name, Default::default(), false);
        b.instances.push(Arc::new(42u32));
        b.end_resolve_dependencies();
        assert_eq!(b.status, ServiceStatus::Ok);
        Arc::new(b.seal(0))
    }

    #[test]
    fn second_acquirer_sees_already_done() {
        let slot = CacheSlot::new();
        assert!(matches!(slot.acquire_instantiate_lock(), Acquire::Acquired));
        slot.release_instantiate_lock(Some(sealed_ok()));
        assert!(matches!(slot.acquire_instantiate_lock(), Acquire::AlreadyDone(_)));
    }

    #[test]
    fn exactly_one_constructor_call_under_contention() {
        let cache = Arc::new(ServiceCache::new());
        let name = ServiceName::plain(TypeRef::of::<u32>());
        let call_count = Arc::new(AtomicUsize::new(0));
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cache = cache.clone();
                let name = name.clone();
                let call_count = call_count.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let slot = cache.get_or_create(&name);
                    match slot.acquire_instantiate_lock() {
                        Acquire::Acquired => {
                            call_count.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(10));
                            slot.release_instantiate_lock(Some(sealed_ok()));
                        }
                        Acquire::AlreadyDone(_) => {}
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
