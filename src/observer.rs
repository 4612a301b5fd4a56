//! Diagnostic observers for dependency injection traceability.
//!
//! Hooks for observing resolution events, for structured tracing and
//! debugging of resolution chains.

use std::time::Duration;

use crate::service_name::ServiceName;

/// Observer for dependency injection resolution events.
///
/// Called once per top-level `resolve`/`create` call. Keep implementations
/// lightweight — these run synchronously on the resolving thread, and
/// `resolving`/`resolved` bracket the whole resolution, including every
/// recursive dependency it constructs.
///
/// # Examples
///
/// ```
/// use reflective_di::{DiObserver, ServiceName};
/// use std::time::Duration;
///
/// struct TracingObserver {
///     prefix: String,
/// }
///
/// impl DiObserver for TracingObserver {
///     fn resolving(&self, name: &ServiceName) {
///         println!("[{}] resolving {}", self.prefix, name);
///     }
///
///     fn resolved(&self, name: &ServiceName, duration: Duration) {
///         println!("[{}] resolved {} in {:?}", self.prefix, name, duration);
///     }
///
///     fn factory_panic(&self, name: &ServiceName, message: &str) {
///         println!("[{}] panic in {}: {}", self.prefix, name, message);
///     }
/// }
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a top-level resolution starts. Use this to start
    /// timing measurements and emit trace events.
    fn resolving(&self, name: &ServiceName);

    /// Called after a top-level resolution finishes, successfully or not
    /// (check the log via `Container::resolve(..).log()` for the outcome).
    ///
    /// `duration` is the time elapsed since the matching `resolving` call.
    fn resolved(&self, name: &ServiceName, duration: Duration);

    /// Called when a registered factory closure panics during resolution.
    /// The panic is still propagated after this call — observers only get
    /// to see it go by, not to suppress it.
    fn factory_panic(&self, name: &ServiceName, message: &str);
}

/// Built-in observer that logs events to stdout/stderr.
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self { prefix: "[reflective-di]".to_string() }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, name: &ServiceName) {
        println!("{} resolving: {}", self.prefix, name);
    }

    fn resolved(&self, name: &ServiceName, duration: Duration) {
        println!("{} resolved: {} in {:?}", self.prefix, name, duration);
    }

    fn factory_panic(&self, name: &ServiceName, message: &str) {
        eprintln!("{} panic while resolving {}: {}", self.prefix, name, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_name::TypeRef;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn logging_observer_does_not_panic() {
        let observer = LoggingObserver::new();
        let name = ServiceName::plain(TypeRef::of::<u32>());
        observer.resolving(&name);
        observer.resolved(&name, Duration::from_millis(1));
        observer.factory_panic(&name, "boom");
    }

    struct CountingObserver {
        resolving: AtomicUsize,
        resolved: AtomicUsize,
        panicked: AtomicUsize,
    }

    impl DiObserver for CountingObserver {
        fn resolving(&self, _name: &ServiceName) {
            self.resolving.fetch_add(1, Ordering::SeqCst);
        }

        fn resolved(&self, _name: &ServiceName, _duration: Duration) {
            self.resolved.fetch_add(1, Ordering::SeqCst);
        }

        fn factory_panic(&self, _name: &ServiceName, _message: &str) {
            self.panicked.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn container_reports_resolving_and_resolved_once_per_top_level_call() {
        use crate::{ContainerBuilder, ServiceConfiguration};

        struct Widget;

        let counters = Arc::new(CountingObserver {
            resolving: AtomicUsize::new(0),
            resolved: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        });

        let mut builder = ContainerBuilder::new();
        builder.register_constructor::<Widget>(vec![], |_| Arc::new(Widget) as _);
        builder.register_configuration::<Widget>(&[], ServiceConfiguration::new()).unwrap();
        builder.add_observer(counters.clone());
        let container = builder.build();

        let _ = container.resolve::<Widget>(&[]).instance();

        assert_eq!(counters.resolving.load(Ordering::SeqCst), 1);
        assert_eq!(counters.resolved.load(Ordering::SeqCst), 1);
        assert_eq!(counters.panicked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn container_reports_factory_panic_and_still_propagates_it() {
        use crate::{ContainerBuilder, ServiceConfiguration};
        use std::panic::AssertUnwindSafe;

        struct Widget;

        let counters = Arc::new(CountingObserver {
            resolving: AtomicUsize::new(0),
            resolved: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        });

        let mut builder = ContainerBuilder::new();
        builder.register_constructor::<Widget>(vec![], |_| panic!("constructor exploded"));
        builder.register_configuration::<Widget>(&[], ServiceConfiguration::new()).unwrap();
        builder.add_observer(counters.clone());
        let container = builder.build();

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| container.resolve::<Widget>(&[]).instance()));

        assert!(result.is_err());
        assert_eq!(counters.panicked.load(Ordering::SeqCst), 1);
        assert_eq!(counters.resolved.load(Ordering::SeqCst), 0);
    }
}
